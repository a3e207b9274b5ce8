//! Numeric series transforms used by the conversion pipeline.
//!
//! Every function here is pure: it takes a series (or scalar) and returns a
//! new value without touching its input, so each stage can be tested on its own.

use std::ops::RangeInclusive;

/// ADC full-scale divisor (2^23).
pub const ADC_FULL_SCALE: f64 = 8_388_608.0;

/// ADC reference voltage (V).
pub const REFERENCE_VOLTAGE: f64 = 2.5;

/// Standard gravity (m/s^2 per g).
pub const STANDARD_GRAVITY: f64 = 9.80665;

/// Convert a raw count to acceleration in g for a sensor of the given sensitivity (V/g).
#[inline]
pub fn count_to_g(count: i32, sensitivity: f64) -> f64 {
    count as f64 * (REFERENCE_VOLTAGE / ADC_FULL_SCALE) * (1.0 / sensitivity)
}

/// Convert acceleration in g to m/s^2.
#[inline]
pub fn g_to_metric(g: f64) -> f64 {
    g * STANDARD_GRAVITY
}

/// Convert metres to centimetres.
#[inline]
pub fn m_to_cm(m: f64) -> f64 {
    m * 100.0
}

/// Apply a scalar conversion to every value of a series.
pub fn map_series(series: &[f64], f: impl Fn(f64) -> f64) -> Vec<f64> {
    series.iter().map(|&v| f(v)).collect()
}

/// Pad a series with `pad` zeros at both ends.
pub fn zero_pad(series: &[f64], pad: usize) -> Vec<f64> {
    let mut padded = Vec::with_capacity(series.len() + 2 * pad);
    padded.resize(pad, 0.0);
    padded.extend_from_slice(series);
    padded.resize(series.len() + 2 * pad, 0.0);
    padded
}

/// Pad a timestamp column with `pad` null markers at both ends.
pub fn pad_timestamps(timestamps: &[String], pad: usize) -> Vec<Option<String>> {
    let mut padded = Vec::with_capacity(timestamps.len() + 2 * pad);
    padded.resize(pad, None);
    padded.extend(timestamps.iter().cloned().map(Some));
    padded.resize(timestamps.len() + 2 * pad, None);
    padded
}

/// Largest slice [`pairwise_sum`] adds without splitting.
const PAIRWISE_BLOCK: usize = 128;

/// Pairwise summation of a series.
///
/// Slices of up to 128 values are added with eight interleaved accumulators;
/// longer slices are split in two at a multiple of eight and summed
/// recursively. Rounding error grows with `log n` instead of `n`.
pub fn pairwise_sum(series: &[f64]) -> f64 {
    let n = series.len();
    if n < 8 {
        return series.iter().fold(0.0, |acc, &v| acc + v);
    }

    if n <= PAIRWISE_BLOCK {
        let mut acc = [0.0; 8];
        acc.copy_from_slice(&series[..8]);
        let blocks = n - n % 8;
        for chunk in series[8..blocks].chunks_exact(8) {
            for (a, &v) in acc.iter_mut().zip(chunk) {
                *a += v;
            }
        }
        let sum =
            ((acc[0] + acc[1]) + (acc[2] + acc[3])) + ((acc[4] + acc[5]) + (acc[6] + acc[7]));
        return series[blocks..].iter().fold(sum, |acc, &v| acc + v);
    }

    let mut half = n / 2;
    half -= half % 8;
    pairwise_sum(&series[..half]) + pairwise_sum(&series[half..])
}

/// Arithmetic mean of a series (0 for an empty series).
pub fn mean(series: &[f64]) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    pairwise_sum(series) / series.len() as f64
}

/// Subtract the mean from every value (constant detrend).
pub fn detrend_constant(series: &[f64]) -> Vec<f64> {
    let m = mean(series);
    series.iter().map(|&v| v - m).collect()
}

/// Cumulative trapezoidal integration with a fixed sample interval.
///
/// `y[0] = 0` and `y[i] = y[i-1] + dt * (x[i-1] + x[i]) / 2`; the output has
/// the same length as the input.
pub fn integrate_trapezoid(series: &[f64], dt: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(series.len());
    if series.is_empty() {
        return out;
    }

    let mut acc = 0.0;
    out.push(acc);
    for pair in series.windows(2) {
        acc += dt * (pair[0] + pair[1]) / 2.0;
        out.push(acc);
    }
    out
}

/// Index range kept by truncation, clamped to the series length.
///
/// Returns `None` if no sample of the series falls inside `[start, end]`.
pub fn truncation_range(len: usize, start: usize, end: usize) -> Option<RangeInclusive<usize>> {
    if len == 0 || start >= len || start > end {
        return None;
    }
    Some(start..=end.min(len - 1))
}

/// Keep the closed index range `[start, end]` of a series and reindex from 0.
pub fn truncate<T: Clone>(series: &[T], start: usize, end: usize) -> Vec<T> {
    match truncation_range(series.len(), start, end) {
        Some(range) => series[range].to_vec(),
        None => Vec::new(),
    }
}

/// Round half to even at the given number of decimal places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round_ties_even() / scale
}

/// Peak of a series: whichever of min and max has the larger magnitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakStat {
    /// Index of the first occurrence of the peak value.
    pub index: usize,
    pub value: f64,
    /// `value` rounded to four decimal places.
    pub rounded: f64,
}

/// Decimal places kept in a rounded peak.
pub const PEAK_DECIMALS: i32 = 4;

impl PeakStat {
    /// Compute the peak of a series. Ties in magnitude go to the maximum.
    ///
    /// Returns `None` for an empty series.
    pub fn from_series(series: &[f64]) -> Option<Self> {
        let mut iter = series.iter().copied().enumerate();
        let (first_idx, first) = iter.next()?;

        let (mut min_idx, mut min_val) = (first_idx, first);
        let (mut max_idx, mut max_val) = (first_idx, first);

        for (i, v) in iter {
            if v < min_val {
                min_idx = i;
                min_val = v;
            }
            if v > max_val {
                max_idx = i;
                max_val = v;
            }
        }

        let (index, value) = if min_val.abs() > max_val.abs() {
            (min_idx, min_val)
        } else {
            (max_idx, max_val)
        };

        Some(Self {
            index,
            value,
            rounded: round_to(value, PEAK_DECIMALS),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_to_g() {
        assert_eq!(count_to_g(-39527, 1.25), -0.009423971176147461);
        assert_eq!(count_to_g(8250, 1.25), 0.0019669532775878906);
        assert_eq!(count_to_g(0, 0.625), 0.0);
        assert_eq!(count_to_g(1000, 0.625), 2.0 * count_to_g(1000, 1.25));
    }

    #[test]
    fn test_g_to_metric() {
        assert_eq!(g_to_metric(0.07916), 0.7762944139999999);
        assert_eq!(m_to_cm(0.5), 50.0);
    }

    #[test]
    fn test_zero_pad() {
        let series = vec![1.0, -2.0, 3.0];
        let padded = zero_pad(&series, 500);
        assert_eq!(padded.len(), series.len() + 1000);
        assert!(padded[..500].iter().all(|&v| v == 0.0));
        assert!(padded[503..].iter().all(|&v| v == 0.0));
        assert_eq!(&padded[500..503], &series[..]);
    }

    #[test]
    fn test_pad_timestamps() {
        let stamps = vec!["a".to_string(), "b".to_string()];
        let padded = pad_timestamps(&stamps, 3);
        assert_eq!(padded.len(), 8);
        assert!(padded[..3].iter().all(Option::is_none));
        assert!(padded[5..].iter().all(Option::is_none));
        assert_eq!(padded[3].as_deref(), Some("a"));
        assert_eq!(padded[4].as_deref(), Some("b"));
    }

    #[test]
    fn test_pairwise_sum() {
        assert_eq!(pairwise_sum(&[]), 0.0);
        assert_eq!(pairwise_sum(&[1.5, 2.0, -0.5]), 3.0);

        let tenths: Vec<f64> = (0..20).map(|i| i as f64 * 0.1).collect();
        assert_eq!(pairwise_sum(&tenths), 19.0);

        // 10_000 x 0.1: a running sum drifts to 1000.0000000001588
        let repeated = vec![0.1; 10_000];
        let naive: f64 = repeated.iter().sum();
        let pairwise = pairwise_sum(&repeated);
        assert_eq!(pairwise, 999.9999999999999);
        assert!((pairwise - 1000.0).abs() < (naive - 1000.0).abs());
    }

    #[test]
    fn test_detrend_constant() {
        let detrended = detrend_constant(&[1.0, 2.0, 3.0, 6.0]);
        assert_eq!(detrended, vec![-2.0, -1.0, 0.0, 3.0]);
        assert!(mean(&detrended).abs() < 1e-15);
        assert!(detrend_constant(&[]).is_empty());
    }

    #[test]
    fn test_integrate_trapezoid() {
        let input = [
            -0.000393, -0.000286, -0.000049, -0.000147, -0.000438, -0.00053, -0.000383, 0.000026,
            0.000019, -0.000225,
        ];
        let expected = [
            0.0, -0.000003, -0.000005, -0.000006, -0.000009, -0.000014, -0.000018, -0.00002,
            -0.00002, -0.000021,
        ];

        let output = integrate_trapezoid(&input, 0.01);
        assert_eq!(output.len(), input.len());
        assert_eq!(output[0], 0.0);
        for (out, exp) in output.iter().zip(expected.iter()) {
            assert_eq!(round_to(*out, 6), round_to(*exp, 6));
        }
    }

    #[test]
    fn test_integrate_differentiates_back_to_midpoints() {
        let input: Vec<f64> = (0..200).map(|i| (i as f64 * 0.1).sin()).collect();
        let dt = 0.01;
        let integrated = integrate_trapezoid(&input, dt);

        for i in 1..input.len() {
            let derivative = (integrated[i] - integrated[i - 1]) / dt;
            let midpoint = (input[i - 1] + input[i]) / 2.0;
            assert!((derivative - midpoint).abs() < 1e-9);
        }
        assert!(integrate_trapezoid(&[], dt).is_empty());
    }

    #[test]
    fn test_truncate() {
        let series: Vec<usize> = (0..48_000).collect();
        let truncated = truncate(&series, 6000, 40_500);
        assert_eq!(truncated.len(), 40_500 - 6000 + 1);
        assert_eq!(truncated[0], 6000);
        assert_eq!(*truncated.last().unwrap(), 40_500);

        let short: Vec<usize> = (0..7000).collect();
        assert_eq!(truncate(&short, 6000, 40_500).len(), 1000);
        assert!(truncate(&short, 7000, 40_500).is_empty());
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(-0.16880180775299947, 4), -0.1688);
        assert_eq!(round_to(1.23456, 4), 1.2346);
        assert_eq!(round_to(0.00005, 4), 0.0);
        assert_eq!(round_to(2.5, 0), 2.0);
        assert_eq!(round_to(3.5, 0), 4.0);
    }

    #[test]
    fn test_peak_stat_prefers_larger_magnitude() {
        let peak = PeakStat::from_series(&[0.1, -0.5, 0.3, -0.5]).unwrap();
        assert_eq!(peak.index, 1);
        assert_eq!(peak.value, -0.5);

        let peak = PeakStat::from_series(&[0.1, 0.6, -0.2]).unwrap();
        assert_eq!(peak.index, 1);
        assert_eq!(peak.value, 0.6);
    }

    #[test]
    fn test_peak_stat_tie_goes_to_max() {
        let peak = PeakStat::from_series(&[-1.0, 0.0, 1.0]).unwrap();
        assert_eq!(peak.index, 2);
        assert_eq!(peak.value, 1.0);
    }

    #[test]
    fn test_peak_stat_bounds_every_value() {
        let series: Vec<f64> = (0..500).map(|i| (i as f64 * 0.37).sin() * (i as f64)).collect();
        let peak = PeakStat::from_series(&series).unwrap();
        assert!(series.iter().all(|v| peak.value.abs() >= v.abs()));
        assert_eq!(peak.rounded, round_to(peak.value, 4));
        assert!(PeakStat::from_series(&[]).is_none());
    }
}

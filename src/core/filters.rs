//! Digital Butterworth filter design and causal filtering.
//!
//! Filters are designed in zero-pole-gain form: the analog Butterworth
//! prototype is frequency-transformed (low-pass to band-pass or high-pass),
//! mapped to the z-plane with the bilinear transform, and expanded into
//! transfer-function polynomials `b`/`a`. Filtering runs a single forward pass
//! in Direct Form II Transposed starting from zero state, so the output lags
//! the input in phase.

use std::f64::consts::PI;

use log::debug;
use num_complex::Complex64;
use thiserror::Error;

/// Errors that can occur during filter design.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FilterError {
    #[error("Filter order must be at least 1, got {0}")]
    InvalidOrder(usize),

    #[error("Invalid sample rate: {0} Hz")]
    InvalidSampleRate(f64),

    #[error("{name} frequency {hz} Hz must lie strictly between 0 and the Nyquist frequency {nyquist} Hz")]
    DegenerateFrequency {
        name: &'static str,
        hz: f64,
        nyquist: f64,
    },

    #[error("Band edges must be increasing, got {low} Hz and {high} Hz")]
    InvalidBand { low: f64, high: f64 },

    #[error("Designed filter is unstable")]
    Unstable,
}

/// Result type for filter design.
pub type Result<T> = std::result::Result<T, FilterError>;

/// Digital filter in zero-pole-gain form.
#[derive(Debug, Clone)]
struct Zpk {
    zeros: Vec<Complex64>,
    poles: Vec<Complex64>,
    gain: f64,
}

/// Transfer function coefficients `b` (numerator) and `a` (denominator) of an IIR filter.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferFunction {
    b: Vec<f64>,
    a: Vec<f64>,
}

impl TransferFunction {
    /// Numerator coefficients.
    pub fn numerator(&self) -> &[f64] {
        &self.b
    }

    /// Denominator coefficients (`a[0]` is 1 for designed filters).
    pub fn denominator(&self) -> &[f64] {
        &self.a
    }

    /// Apply the filter causally to `input`, starting from zero state.
    pub fn filter(&self, input: &[f64]) -> Vec<f64> {
        let n = self.a.len().max(self.b.len());
        let a0 = self.a[0];
        let mut b = vec![0.0; n];
        let mut a = vec![0.0; n];
        for (dst, src) in b.iter_mut().zip(&self.b) {
            *dst = src / a0;
        }
        for (dst, src) in a.iter_mut().zip(&self.a) {
            *dst = src / a0;
        }

        let mut state = vec![0.0; n.saturating_sub(1)];
        let mut output = Vec::with_capacity(input.len());

        for &x in input {
            let y = match state.first() {
                Some(&z0) => b[0] * x + z0,
                None => b[0] * x,
            };

            let last = state.len();
            for i in 0..last {
                let carried = if i + 1 < last { state[i + 1] } else { 0.0 };
                state[i] = carried + b[i + 1] * x - a[i + 1] * y;
            }

            output.push(y);
        }

        output
    }
}

/// Check that `order` and `sample_rate` can be used for a design.
fn check_common(order: usize, sample_rate: f64) -> Result<()> {
    if order == 0 {
        return Err(FilterError::InvalidOrder(order));
    }
    if !sample_rate.is_finite() || sample_rate <= 0.0 {
        return Err(FilterError::InvalidSampleRate(sample_rate));
    }
    Ok(())
}

/// Normalize a frequency by the Nyquist frequency, rejecting values outside (0, 1).
fn normalize(name: &'static str, hz: f64, sample_rate: f64) -> Result<f64> {
    let nyquist = 0.5 * sample_rate;
    let wn = hz / nyquist;
    if !wn.is_finite() || wn <= 0.0 || wn >= 1.0 {
        return Err(FilterError::DegenerateFrequency { name, hz, nyquist });
    }
    Ok(wn)
}

/// Design a digital Butterworth band-pass filter.
///
/// # Arguments
///
/// * `order` - Order of the low-pass prototype (the band-pass has twice as many poles)
/// * `low_hz` - Lower band edge in Hz
/// * `high_hz` - Upper band edge in Hz
/// * `sample_rate` - Sampling frequency in Hz
pub fn butter_bandpass(
    order: usize,
    low_hz: f64,
    high_hz: f64,
    sample_rate: f64,
) -> Result<TransferFunction> {
    check_common(order, sample_rate)?;
    let low = normalize("Low cutoff", low_hz, sample_rate)?;
    let high = normalize("High cutoff", high_hz, sample_rate)?;
    if low >= high {
        return Err(FilterError::InvalidBand {
            low: low_hz,
            high: high_hz,
        });
    }

    let (w_low, w_high) = (prewarp(low), prewarp(high));
    let bandwidth = w_high - w_low;
    let center = (w_low * w_high).sqrt();

    let analog = lowpass_to_bandpass(butter_prototype(order), center, bandwidth);
    let tf = to_transfer_function(bilinear(analog))?;
    debug!("butterworth band-pass coefficients - b: {:?}, a: {:?}", tf.b, tf.a);
    Ok(tf)
}

/// Design a digital Butterworth high-pass filter.
pub fn butter_highpass(order: usize, cutoff_hz: f64, sample_rate: f64) -> Result<TransferFunction> {
    check_common(order, sample_rate)?;
    let wn = normalize("Cutoff", cutoff_hz, sample_rate)?;

    let analog = lowpass_to_highpass(butter_prototype(order), prewarp(wn));
    let tf = to_transfer_function(bilinear(analog))?;
    debug!("butterworth high-pass coefficients - b: {:?}, a: {:?}", tf.b, tf.a);
    Ok(tf)
}

/// Sampling frequency of the normalized design domain (Nyquist = 1).
const DESIGN_FS: f64 = 2.0;

/// Pre-warp a normalized frequency for the bilinear transform.
fn prewarp(wn: f64) -> f64 {
    2.0 * DESIGN_FS * (PI * wn / DESIGN_FS).tan()
}

/// Analog Butterworth low-pass prototype with unit cutoff.
fn butter_prototype(order: usize) -> Zpk {
    let n = order as i64;
    let poles = (0..order as i64)
        .map(|k| {
            let m = -n + 1 + 2 * k;
            -Complex64::from_polar(1.0, PI * m as f64 / (2 * n) as f64)
        })
        .collect();

    Zpk {
        zeros: Vec::new(),
        poles,
        gain: 1.0,
    }
}

/// Transform a low-pass prototype into a band-pass filter around `center` with width `bandwidth`.
fn lowpass_to_bandpass(lp: Zpk, center: f64, bandwidth: f64) -> Zpk {
    let degree = lp.poles.len() - lp.zeros.len();
    let wo2 = Complex64::new(center * center, 0.0);

    let split = |roots: &[Complex64]| -> Vec<Complex64> {
        let scaled: Vec<Complex64> = roots.iter().map(|r| r * bandwidth / 2.0).collect();
        let upper = scaled.iter().map(|r| r + (r * r - wo2).sqrt());
        let lower = scaled.iter().map(|r| r - (r * r - wo2).sqrt());
        upper.chain(lower).collect()
    };

    let mut zeros = split(&lp.zeros);
    zeros.extend(std::iter::repeat(Complex64::new(0.0, 0.0)).take(degree));

    Zpk {
        zeros,
        poles: split(&lp.poles),
        gain: lp.gain * bandwidth.powi(degree as i32),
    }
}

/// Transform a low-pass prototype into a high-pass filter with cutoff `wo`.
fn lowpass_to_highpass(lp: Zpk, wo: f64) -> Zpk {
    let degree = lp.poles.len() - lp.zeros.len();

    let num: Complex64 = lp.zeros.iter().map(|z| -z).product();
    let den: Complex64 = lp.poles.iter().map(|p| -p).product();
    let gain = lp.gain * (num / den).re;

    let mut zeros: Vec<Complex64> = lp.zeros.iter().map(|z| wo / *z).collect();
    zeros.extend(std::iter::repeat(Complex64::new(0.0, 0.0)).take(degree));

    Zpk {
        zeros,
        poles: lp.poles.iter().map(|p| wo / *p).collect(),
        gain,
    }
}

/// Map an analog filter to the z-plane with the bilinear transform.
fn bilinear(analog: Zpk) -> Zpk {
    let fs2 = 2.0 * DESIGN_FS;
    let degree = analog.poles.len() - analog.zeros.len();

    let num: Complex64 = analog.zeros.iter().map(|z| fs2 - *z).product();
    let den: Complex64 = analog.poles.iter().map(|p| fs2 - *p).product();

    let mut zeros: Vec<Complex64> = analog.zeros.iter().map(|z| (fs2 + *z) / (fs2 - *z)).collect();
    zeros.extend(std::iter::repeat(Complex64::new(-1.0, 0.0)).take(degree));

    Zpk {
        zeros,
        poles: analog.poles.iter().map(|p| (fs2 + *p) / (fs2 - *p)).collect(),
        gain: analog.gain * (num / den).re,
    }
}

/// Coefficients of the monic polynomial with the given roots, highest power first.
fn poly(roots: &[Complex64]) -> Vec<Complex64> {
    let mut coeffs = vec![Complex64::new(1.0, 0.0)];
    for root in roots {
        let mut next = vec![Complex64::new(0.0, 0.0); coeffs.len() + 1];
        for (i, c) in coeffs.iter().enumerate() {
            next[i] += c;
            next[i + 1] -= c * root;
        }
        coeffs = next;
    }
    coeffs
}

/// Expand a digital zpk filter into real transfer-function polynomials.
fn to_transfer_function(digital: Zpk) -> Result<TransferFunction> {
    if digital.poles.iter().any(|p| !(p.norm() < 1.0)) {
        return Err(FilterError::Unstable);
    }

    let b: Vec<f64> = poly(&digital.zeros)
        .iter()
        .map(|c| (c * digital.gain).re)
        .collect();
    let a: Vec<f64> = poly(&digital.poles).iter().map(|c| c.re).collect();

    if b.iter().chain(a.iter()).any(|v| !v.is_finite()) {
        return Err(FilterError::Unstable);
    }

    Ok(TransferFunction { b, a })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: &[f64], expected: &[f64], tol: f64) {
        assert_eq!(actual.len(), expected.len());
        for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
            assert!((a - e).abs() < tol, "coefficient {}: {} != {}", i, a, e);
        }
    }

    #[test]
    fn test_bandpass_coefficients() {
        let tf = butter_bandpass(2, 0.05, 40.0, 100.0).unwrap();
        assert_close(
            tf.numerator(),
            &[0.63748352, 0.0, -1.27496704, 0.0, 0.63748352],
            1e-8,
        );
        assert_close(
            tf.denominator(),
            &[1.0, -0.85279266, -0.87204231, 0.31384784, 0.41101232],
            1e-8,
        );
    }

    #[test]
    fn test_highpass_coefficients() {
        let tf = butter_highpass(2, 0.05, 100.0).unwrap();
        assert_close(tf.numerator(), &[0.99778102, -1.99556205, 0.99778102], 1e-8);
        assert_close(tf.denominator(), &[1.0, -1.99555712, 0.99556697], 1e-8);
    }

    #[test]
    fn test_first_order_highpass() {
        let tf = butter_highpass(1, 25.0, 100.0).unwrap();
        assert_eq!(tf.numerator().len(), 2);
        assert_eq!(tf.denominator().len(), 2);
        // zero at z = 1 blocks DC
        let dc: f64 = tf.numerator().iter().sum();
        assert!(dc.abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_parameters() {
        assert_eq!(
            butter_bandpass(0, 0.05, 40.0, 100.0),
            Err(FilterError::InvalidOrder(0))
        );
        assert!(matches!(
            butter_bandpass(2, 0.0, 40.0, 100.0),
            Err(FilterError::DegenerateFrequency { .. })
        ));
        assert!(matches!(
            butter_bandpass(2, 0.05, 50.0, 100.0),
            Err(FilterError::DegenerateFrequency { .. })
        ));
        assert!(matches!(
            butter_bandpass(2, 30.0, 20.0, 100.0),
            Err(FilterError::InvalidBand { .. })
        ));
        assert!(matches!(
            butter_highpass(2, 0.05, 0.0),
            Err(FilterError::InvalidSampleRate(_))
        ));
        assert!(matches!(
            butter_highpass(2, f64::NAN, 100.0),
            Err(FilterError::DegenerateFrequency { .. })
        ));
    }

    #[test]
    fn test_filter_direct_form() {
        // y[n] = 0.5 x[n] + 0.5 x[n-1] + 0.25 y[n-1]
        let tf = TransferFunction {
            b: vec![0.5, 0.5],
            a: vec![1.0, -0.25],
        };
        let y = tf.filter(&[1.0, 0.0, 0.0, 2.0]);
        assert_close(&y, &[0.5, 0.625, 0.15625, 1.0390625], 1e-15);
    }

    #[test]
    fn test_filter_normalizes_by_a0() {
        let tf = TransferFunction {
            b: vec![2.0],
            a: vec![2.0],
        };
        assert_eq!(tf.filter(&[1.0, -3.0]), vec![1.0, -3.0]);
    }

    #[test]
    fn test_filter_is_causal() {
        let tf = butter_bandpass(2, 0.05, 40.0, 100.0).unwrap();
        let mut impulse = vec![0.0; 64];
        impulse[10] = 1.0;
        let y = tf.filter(&impulse);
        assert_eq!(y.len(), impulse.len());
        assert!(y[..10].iter().all(|&v| v == 0.0));
        assert!((y[10] - tf.numerator()[0]).abs() < 1e-15);
    }

    #[test]
    fn test_highpass_removes_constant() {
        let tf = butter_highpass(2, 0.05, 100.0).unwrap();
        let y = tf.filter(&vec![1.0; 20_000]);
        assert!(y.last().unwrap().abs() < 1e-3);
    }
}

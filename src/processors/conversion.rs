//! Conversion of one sensor channel's raw counts into acceleration, velocity
//! and displacement.
//!
//! The conversion is a fixed, order-sensitive chain of stages:
//!
//! 1. count → g (sensor sensitivity from the sensor table)
//! 2. zero pad both ends
//! 3. constant detrend → `offset_g`, then `acc_ms2`
//! 4. band-pass → `bandpassed_g`, `bandpassed_ms2`
//! 5. trapezoid integration → `velocity_ms`
//! 6. truncation to the analysis window
//! 7. detrend → `detrended_velocity_ms` / `_cms`
//! 8. integration and detrend → `displacement_m`, `detrended_displacement_m`
//! 9. high-pass → `highpassed_displacement_m` / `_cm`
//! 10. peaks of the four reported columns
//!
//! Every stage produces a new series; earlier series are kept in the result.

use std::fmt;

use log::{debug, info};
use thiserror::Error;

use crate::core::filters::{butter_bandpass, butter_highpass, FilterError, TransferFunction};
use crate::core::loaders::RawSeries;
use crate::core::transforms::{
    count_to_g, detrend_constant, g_to_metric, integrate_trapezoid, m_to_cm, map_series,
    pad_timestamps, truncate, truncation_range, zero_pad, PeakStat,
};

use super::sensor_code::{lookup_channel, SensorIdentity};

/// Low cutoff of the band-pass and high-pass filters (Hz).
pub const LOWCUT_HZ: f64 = 0.05;

/// High cutoff of the band-pass filter (Hz).
pub const HIGHCUT_HZ: f64 = 40.0;

/// Sampling frequency of the recorders (Hz).
pub const SAMPLE_RATE_HZ: f64 = 100.0;

/// Butterworth filter order.
pub const FILTER_ORDER: usize = 2;

/// Zero samples prepended and appended before filtering.
pub const ZERO_PAD_LENGTH: usize = 500;

/// Leading samples of the padded series discarded after integration.
pub const IGNORED_LEADING_SAMPLES: usize = 6000;

/// End of the retained window, before the zero pad is added to it.
pub const WINDOW_END: usize = 40_000;

/// Numeric parameters of the per-sensor conversion.
///
/// Callers outside the crate only ever see the instrument constants above;
/// the fields are crate-private so no configuration path can alter them.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionParams {
    pub(crate) lowcut_hz: f64,
    pub(crate) highcut_hz: f64,
    pub(crate) sample_rate_hz: f64,
    pub(crate) filter_order: usize,
    pub(crate) zero_pad_length: usize,
    pub(crate) ignored_leading_samples: usize,
    pub(crate) window_end: usize,
}

impl Default for ConversionParams {
    fn default() -> Self {
        Self {
            lowcut_hz: LOWCUT_HZ,
            highcut_hz: HIGHCUT_HZ,
            sample_rate_hz: SAMPLE_RATE_HZ,
            filter_order: FILTER_ORDER,
            zero_pad_length: ZERO_PAD_LENGTH,
            ignored_leading_samples: IGNORED_LEADING_SAMPLES,
            window_end: WINDOW_END,
        }
    }
}

impl ConversionParams {
    pub fn lowcut_hz(&self) -> f64 {
        self.lowcut_hz
    }

    pub fn highcut_hz(&self) -> f64 {
        self.highcut_hz
    }

    pub fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }

    /// Time between samples in seconds.
    #[inline]
    pub fn dt(&self) -> f64 {
        1.0 / self.sample_rate_hz
    }

    /// Last index (inclusive) kept by truncation.
    #[inline]
    pub fn truncation_end(&self) -> usize {
        self.window_end + self.zero_pad_length
    }

    /// Length of a truncated series when the input is long enough to fill the window.
    #[inline]
    pub fn truncated_length(&self) -> usize {
        (self.truncation_end() + 1).saturating_sub(self.ignored_leading_samples)
    }
}

/// Errors that abort the conversion of a single sensor channel.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConversionError {
    #[error("No sensitivity known for sensor {sensor}")]
    InvalidSensitivity { sensor: String },

    #[error("Filter design failed for sensor {sensor}: {source}")]
    FilterDesignFailure {
        sensor: String,
        #[source]
        source: FilterError,
    },

    #[error("Sensor {sensor}: series of {len} samples does not reach the analysis window")]
    EmptyWindow { sensor: String, len: usize },

    #[error("Sensor {sensor}: non-finite value in {column}")]
    NonFinite { sensor: String, column: SeriesColumn },
}

impl ConversionError {
    /// Code with channel of the sensor whose conversion failed.
    pub fn sensor(&self) -> &str {
        match self {
            ConversionError::InvalidSensitivity { sensor }
            | ConversionError::FilterDesignFailure { sensor, .. }
            | ConversionError::EmptyWindow { sensor, .. }
            | ConversionError::NonFinite { sensor, .. } => sensor,
        }
    }
}

/// Result type for conversion operations.
pub type Result<T> = std::result::Result<T, ConversionError>;

/// Named derived series of a sensor conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeriesColumn {
    G,
    OffsetG,
    AccMs2,
    BandpassedG,
    BandpassedMs2,
    VelocityMs,
    DetrendedVelocityMs,
    DetrendedVelocityCms,
    DisplacementM,
    DetrendedDisplacementM,
    HighpassedDisplacementM,
    HighpassedDisplacementCm,
}

impl SeriesColumn {
    /// All derived columns, in stage order.
    pub const ALL: [SeriesColumn; 12] = [
        SeriesColumn::G,
        SeriesColumn::OffsetG,
        SeriesColumn::AccMs2,
        SeriesColumn::BandpassedG,
        SeriesColumn::BandpassedMs2,
        SeriesColumn::VelocityMs,
        SeriesColumn::DetrendedVelocityMs,
        SeriesColumn::DetrendedVelocityCms,
        SeriesColumn::DisplacementM,
        SeriesColumn::DetrendedDisplacementM,
        SeriesColumn::HighpassedDisplacementM,
        SeriesColumn::HighpassedDisplacementCm,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SeriesColumn::G => "g",
            SeriesColumn::OffsetG => "offset_g",
            SeriesColumn::AccMs2 => "acc_ms2",
            SeriesColumn::BandpassedG => "bandpassed_g",
            SeriesColumn::BandpassedMs2 => "bandpassed_ms2",
            SeriesColumn::VelocityMs => "velocity_ms",
            SeriesColumn::DetrendedVelocityMs => "detrended_velocity_ms",
            SeriesColumn::DetrendedVelocityCms => "detrended_velocity_cms",
            SeriesColumn::DisplacementM => "displacement_m",
            SeriesColumn::DetrendedDisplacementM => "detrended_displacement_m",
            SeriesColumn::HighpassedDisplacementM => "highpassed_displacement_m",
            SeriesColumn::HighpassedDisplacementCm => "highpassed_displacement_cm",
        }
    }
}

impl fmt::Display for SeriesColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Derived series of one sensor channel over the truncated analysis window.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSeriesSet {
    /// Timestamp tokens; `None` where the zero pad reaches into the window.
    pub timestamps: Vec<Option<String>>,
    pub g: Vec<f64>,
    pub offset_g: Vec<f64>,
    pub acc_ms2: Vec<f64>,
    pub bandpassed_g: Vec<f64>,
    pub bandpassed_ms2: Vec<f64>,
    pub velocity_ms: Vec<f64>,
    pub detrended_velocity_ms: Vec<f64>,
    pub detrended_velocity_cms: Vec<f64>,
    pub displacement_m: Vec<f64>,
    pub detrended_displacement_m: Vec<f64>,
    pub highpassed_displacement_m: Vec<f64>,
    pub highpassed_displacement_cm: Vec<f64>,
}

impl SensorSeriesSet {
    /// Number of samples in every column.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Borrow a derived column by name.
    pub fn column(&self, column: SeriesColumn) -> &[f64] {
        match column {
            SeriesColumn::G => &self.g,
            SeriesColumn::OffsetG => &self.offset_g,
            SeriesColumn::AccMs2 => &self.acc_ms2,
            SeriesColumn::BandpassedG => &self.bandpassed_g,
            SeriesColumn::BandpassedMs2 => &self.bandpassed_ms2,
            SeriesColumn::VelocityMs => &self.velocity_ms,
            SeriesColumn::DetrendedVelocityMs => &self.detrended_velocity_ms,
            SeriesColumn::DetrendedVelocityCms => &self.detrended_velocity_cms,
            SeriesColumn::DisplacementM => &self.displacement_m,
            SeriesColumn::DetrendedDisplacementM => &self.detrended_displacement_m,
            SeriesColumn::HighpassedDisplacementM => &self.highpassed_displacement_m,
            SeriesColumn::HighpassedDisplacementCm => &self.highpassed_displacement_cm,
        }
    }
}

/// Peaks of the four reported columns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorPeaks {
    pub offset_acc: PeakStat,
    pub bandpassed_acc: PeakStat,
    pub velocity: PeakStat,
    pub displacement: PeakStat,
}

/// Columns whose peaks are reported, in report order.
pub const REPORTED_COLUMNS: [SeriesColumn; 4] = [
    SeriesColumn::OffsetG,
    SeriesColumn::BandpassedG,
    SeriesColumn::DetrendedVelocityCms,
    SeriesColumn::HighpassedDisplacementCm,
];

/// Completed conversion of one sensor channel.
#[derive(Debug, Clone)]
pub struct SensorConversion {
    pub identity: SensorIdentity,
    /// Event timestamp the data belongs to
    pub event: String,
    pub sensitivity: f64,
    pub series: SensorSeriesSet,
    pub peaks: SensorPeaks,
}

/// Sensitivity (V/g) of a sensor channel from the sensor table.
pub fn sensitivity_for(code_with_channel: &str) -> Result<f64> {
    lookup_channel(code_with_channel)
        .map(|channel| channel.mount.sensitivity())
        .ok_or_else(|| ConversionError::InvalidSensitivity {
            sensor: code_with_channel.to_string(),
        })
}

/// Designed filters, shared by every sensor of a run.
#[derive(Debug, Clone)]
pub struct ConversionPipeline {
    params: ConversionParams,
    bandpass: TransferFunction,
    highpass: TransferFunction,
}

impl ConversionPipeline {
    /// Design the band-pass and high-pass filters of the instrument.
    pub fn new() -> std::result::Result<Self, FilterError> {
        Self::with_params(ConversionParams::default())
    }

    pub(crate) fn with_params(params: ConversionParams) -> std::result::Result<Self, FilterError> {
        let bandpass = butter_bandpass(
            params.filter_order,
            params.lowcut_hz,
            params.highcut_hz,
            params.sample_rate_hz,
        )?;
        let highpass = butter_highpass(params.filter_order, params.lowcut_hz, params.sample_rate_hz)?;

        Ok(Self {
            params,
            bandpass,
            highpass,
        })
    }

    pub fn params(&self) -> &ConversionParams {
        &self.params
    }

    pub fn bandpass(&self) -> &TransferFunction {
        &self.bandpass
    }

    pub fn highpass(&self) -> &TransferFunction {
        &self.highpass
    }

    /// Convert one sensor channel.
    ///
    /// # Arguments
    ///
    /// * `raw` - Merged raw series of the channel
    /// * `identity` - Identity of the channel
    /// * `event` - Event timestamp, kept with the result
    ///
    /// # Errors
    ///
    /// Fails for sensors outside the sensor table, for series too short to
    /// reach the analysis window, and when a reported series contains a
    /// non-finite value.
    pub fn convert(
        &self,
        raw: &RawSeries,
        identity: &SensorIdentity,
        event: &str,
    ) -> Result<SensorConversion> {
        let sensor = identity.code_with_channel.as_str();
        let p = &self.params;
        let dt = p.dt();

        let sensitivity = sensitivity_for(sensor)?;

        let g: Vec<f64> = raw.counts().map(|c| count_to_g(c, sensitivity)).collect();
        let timestamps: Vec<String> = raw.samples.iter().map(|s| s.timestamp.clone()).collect();

        let g = zero_pad(&g, p.zero_pad_length);
        let timestamps = pad_timestamps(&timestamps, p.zero_pad_length);

        let start = p.ignored_leading_samples;
        let end = p.truncation_end();
        if truncation_range(g.len(), start, end).is_none() {
            return Err(ConversionError::EmptyWindow {
                sensor: sensor.to_string(),
                len: raw.len(),
            });
        }

        let offset_g = detrend_constant(&g);
        let acc_ms2 = map_series(&offset_g, g_to_metric);

        let bandpassed_g = self.bandpass.filter(&offset_g);
        let bandpassed_ms2 = self.bandpass.filter(&acc_ms2);
        let velocity_ms = integrate_trapezoid(&bandpassed_ms2, dt);

        let window = |series: &[f64]| truncate(series, start, end);
        let timestamps = truncate(&timestamps, start, end);
        let g = window(&g);
        let offset_g = window(&offset_g);
        let acc_ms2 = window(&acc_ms2);
        let bandpassed_g = window(&bandpassed_g);
        let bandpassed_ms2 = window(&bandpassed_ms2);
        let velocity_ms = window(&velocity_ms);

        let detrended_velocity_ms = detrend_constant(&velocity_ms);
        let detrended_velocity_cms = map_series(&detrended_velocity_ms, m_to_cm);

        let displacement_m = integrate_trapezoid(&detrended_velocity_ms, dt);
        let detrended_displacement_m = detrend_constant(&displacement_m);

        let highpassed_displacement_m = self.highpass.filter(&detrended_displacement_m);
        let highpassed_displacement_cm = map_series(&highpassed_displacement_m, m_to_cm);

        let series = SensorSeriesSet {
            timestamps,
            g,
            offset_g,
            acc_ms2,
            bandpassed_g,
            bandpassed_ms2,
            velocity_ms,
            detrended_velocity_ms,
            detrended_velocity_cms,
            displacement_m,
            detrended_displacement_m,
            highpassed_displacement_m,
            highpassed_displacement_cm,
        };

        let peaks = peaks_of(&series, sensor)?;
        debug!(
            "{}: {} samples in window, peaks {:?}",
            sensor,
            series.len(),
            peaks
        );
        info!(
            "{}: acc {} g, bandpassed {} g, vel {} cm/s, disp {} cm",
            sensor,
            peaks.offset_acc.rounded,
            peaks.bandpassed_acc.rounded,
            peaks.velocity.rounded,
            peaks.displacement.rounded
        );

        Ok(SensorConversion {
            identity: identity.clone(),
            event: event.to_string(),
            sensitivity,
            series,
            peaks,
        })
    }
}

/// Peak of one reported column, rejecting non-finite series.
fn column_peak(series: &SensorSeriesSet, column: SeriesColumn, sensor: &str) -> Result<PeakStat> {
    let values = series.column(column);
    let non_finite = || ConversionError::NonFinite {
        sensor: sensor.to_string(),
        column,
    };

    if values.iter().any(|v| !v.is_finite()) {
        return Err(non_finite());
    }
    PeakStat::from_series(values).ok_or_else(non_finite)
}

fn peaks_of(series: &SensorSeriesSet, sensor: &str) -> Result<SensorPeaks> {
    let [acc, bandpassed, velocity, displacement] = REPORTED_COLUMNS;
    Ok(SensorPeaks {
        offset_acc: column_peak(series, acc, sensor)?,
        bandpassed_acc: column_peak(series, bandpassed, sensor)?,
        velocity: column_peak(series, velocity, sensor)?,
        displacement: column_peak(series, displacement, sensor)?,
    })
}

/// Convert one sensor channel with a freshly designed pipeline.
///
/// Filter design failures are reported against the sensor being converted.
pub fn convert_sensor(
    raw: &RawSeries,
    identity: &SensorIdentity,
    event: &str,
) -> Result<SensorConversion> {
    convert_sensor_with(raw, identity, event, &ConversionParams::default())
}

pub(crate) fn convert_sensor_with(
    raw: &RawSeries,
    identity: &SensorIdentity,
    event: &str,
    params: &ConversionParams,
) -> Result<SensorConversion> {
    let pipeline = ConversionPipeline::with_params(params.clone()).map_err(|e| {
        ConversionError::FilterDesignFailure {
            sensor: identity.code_with_channel.clone(),
            source: e,
        }
    })?;
    pipeline.convert(raw, identity, event)
}

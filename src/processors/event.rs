//! Processing of one recorded event: every sensor file of an event directory
//! through ordering, loading, conversion and the stats table.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use rayon::prelude::*;
use regex::Regex;
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::core::loaders::{load_merged, RawSeries};
use crate::core::writers::{write_column_maxima_csv, write_series_csv, write_stats_csv};

use super::conversion::{ConversionError, ConversionParams, ConversionPipeline, SensorConversion};
use super::sorting::{
    discover_sensor_files, event_span, group_by_channel, order_files, EventSpan, SensorFileGroup,
};
use super::stats::{StatsCollector, StatsError, StatsSummary};

const EVENT_PATTERN: &str = r"^(\d{4})-(\d{2})-(\d{2})T(\d{2})(\d{2})(\d{2})$";

fn event_pattern() -> std::result::Result<&'static Regex, EventError> {
    static PATTERN: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(EVENT_PATTERN))
        .as_ref()
        .map_err(|e| EventError::Pattern(e.clone()))
}

fn is_leap_year(year: u32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: u32, month: u32) -> u32 {
    match month {
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 31,
    }
}

/// Errors for event timestamps entered by the operator.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("Invalid event timestamp {0:?}, expected YYYY-MM-DDTHHMMSS")]
    InvalidTimestamp(String),

    #[error("Invalid event pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Event timestamp in the form `YYYY-MM-DDTHHMMSS`, e.g. `2019-09-26T135930`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventTimestamp {
    raw: String,
    fields: [u32; 6],
}

impl EventTimestamp {
    pub fn parse(input: &str) -> std::result::Result<Self, EventError> {
        let invalid = || EventError::InvalidTimestamp(input.to_string());
        let caps = event_pattern()?
            .captures(input.trim())
            .ok_or_else(invalid)?;

        let mut fields = [0u32; 6];
        for (i, field) in fields.iter_mut().enumerate() {
            *field = caps[i + 1].parse().map_err(|_| invalid())?;
        }

        let [year, month, day, hour, minute, second] = fields;
        if !(1..=12).contains(&month)
            || day == 0
            || day > days_in_month(year, month)
            || hour > 23
            || minute > 59
            || second > 59
        {
            return Err(invalid());
        }

        Ok(Self {
            raw: input.trim().to_string(),
            fields,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Report header form, `MM/DD/YY HH:MM:SS`.
    pub fn readable(&self) -> String {
        let [year, month, day, hour, minute, second] = self.fields;
        format!(
            "{:02}/{:02}/{:02} {:02}:{:02}:{:02}",
            month,
            day,
            year % 100,
            hour,
            minute,
            second
        )
    }
}

impl FromStr for EventTimestamp {
    type Err = EventError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for EventTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Why a single sensor produced no result.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FailureCause {
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Stats(#[from] StatsError),
}

/// A sensor whose conversion failed while the rest of the event completed.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorFailure {
    pub sensor: String,
    pub cause: FailureCause,
}

impl fmt::Display for SensorFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.sensor, self.cause)
    }
}

type Outcome = std::result::Result<SensorConversion, SensorFailure>;

/// Outcome of processing one event.
#[derive(Debug)]
pub struct EventReport {
    pub event: EventTimestamp,
    pub span: EventSpan,
    /// Completed conversions, in channel order
    pub conversions: Vec<SensorConversion>,
    pub failures: Vec<SensorFailure>,
    pub summary: StatsSummary,
}

impl EventReport {
    pub fn sensors_converted(&self) -> usize {
        self.conversions.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Process every sensor file with the configured extension in `dir`.
pub fn process_event(
    dir: &Path,
    event: &EventTimestamp,
    config: &PipelineConfig,
) -> Result<EventReport> {
    let extension = &config.processing.file_extension;
    let files = discover_sensor_files(dir, extension)
        .with_context(|| format!("Failed to list sensor files in {}", dir.display()))?;

    if files.is_empty() {
        bail!("No .{} sensor files found in {}", extension, dir.display());
    }
    info!("Found {} sensor files in {}", files.len(), dir.display());

    process_files(&files, event, config)
}

/// Process an explicit list of sensor files belonging to one event.
///
/// Ordering, pairing and loading errors abort the event. Conversion errors
/// are collected per sensor and the remaining sensors still complete.
pub fn process_files<P: AsRef<Path>>(
    files: &[P],
    event: &EventTimestamp,
    config: &PipelineConfig,
) -> Result<EventReport> {
    process_files_with(files, event, config, &ConversionParams::default())
}

pub(crate) fn process_files_with<P: AsRef<Path>>(
    files: &[P],
    event: &EventTimestamp,
    config: &PipelineConfig,
    params: &ConversionParams,
) -> Result<EventReport> {
    let ordered = order_files(files).context("Failed to order sensor files")?;
    let (span, first_token) = event_span(&ordered)?;
    debug!("Event span {:?} starting at {}", span, first_token);

    let groups = group_by_channel(&ordered).context("Failed to pair sensor files")?;
    let inputs = load_groups(&groups, config.processing.parallel)?;

    let collector = StatsCollector::new();
    let outcomes: Vec<Outcome> = match ConversionPipeline::with_params(params.clone()) {
        Ok(pipeline) => {
            debug!(
                "Band-pass b={:?} a={:?}",
                pipeline.bandpass().numerator(),
                pipeline.bandpass().denominator()
            );
            debug!(
                "High-pass b={:?} a={:?}",
                pipeline.highpass().numerator(),
                pipeline.highpass().denominator()
            );
            let run = |(group, raw): &(&SensorFileGroup, RawSeries)| {
                convert_and_record(&pipeline, &collector, group, raw, event)
            };
            if config.processing.parallel {
                inputs.par_iter().map(run).collect()
            } else {
                inputs.iter().map(run).collect()
            }
        }
        Err(e) => inputs
            .iter()
            .map(|(group, _)| {
                Err(SensorFailure {
                    sensor: group.identity.code_with_channel.clone(),
                    cause: ConversionError::FilterDesignFailure {
                        sensor: group.identity.code_with_channel.clone(),
                        source: e.clone(),
                    }
                    .into(),
                })
            })
            .collect(),
    };

    let mut conversions = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(conversion) => conversions.push(conversion),
            Err(failure) => {
                warn!("Sensor {} failed: {}", failure.sensor, failure.cause);
                failures.push(failure);
            }
        }
    }

    let summary = collector.finish(config.output.plot_headroom);
    info!(
        "Event {}: {} sensors converted, {} failed",
        event,
        conversions.len(),
        failures.len()
    );

    Ok(EventReport {
        event: event.clone(),
        span,
        conversions,
        failures,
        summary,
    })
}

fn load_group(group: &SensorFileGroup) -> Result<(&SensorFileGroup, RawSeries)> {
    let raw = load_merged(&group.files)
        .with_context(|| format!("Failed to load sensor {}", group.identity))?;
    debug!(
        "Loaded {} samples for {} from {} files",
        raw.len(),
        group.identity,
        group.files.len()
    );
    Ok((group, raw))
}

fn load_groups(groups: &[SensorFileGroup], parallel: bool) -> Result<Vec<(&SensorFileGroup, RawSeries)>> {
    if parallel {
        groups.par_iter().map(load_group).collect()
    } else {
        groups.iter().map(load_group).collect()
    }
}

fn convert_and_record(
    pipeline: &ConversionPipeline,
    collector: &StatsCollector,
    group: &SensorFileGroup,
    raw: &RawSeries,
    event: &EventTimestamp,
) -> Outcome {
    let sensor = &group.identity.code_with_channel;
    let failure = |cause: FailureCause| SensorFailure {
        sensor: sensor.clone(),
        cause,
    };

    let conversion = pipeline
        .convert(raw, &group.identity, event.as_str())
        .map_err(|e| failure(e.into()))?;
    collector
        .record_peaks(sensor, &conversion.peaks)
        .map_err(|e| failure(e.into()))?;
    Ok(conversion)
}

/// Write the stats table, column maxima and (if enabled) per-sensor series.
///
/// Returns the paths of every file written.
pub fn write_event_outputs(
    report: &EventReport,
    output_dir: &Path,
    config: &PipelineConfig,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    let stats_path = output_dir.join("stats_table.csv");
    write_stats_csv(&stats_path, &report.summary)?;
    written.push(stats_path);

    let maxima_path = output_dir.join("column_maxima.csv");
    write_column_maxima_csv(&maxima_path, &report.summary)?;
    written.push(maxima_path);

    if config.output.write_series {
        for conversion in &report.conversions {
            let path = output_dir.join(format!(
                "{}_{}_series.csv",
                report.event, conversion.identity.code_with_channel
            ));
            write_series_csv(&path, &conversion.series)?;
            written.push(path);
        }
    }

    info!("Wrote {} files to {}", written.len(), output_dir.display());
    Ok(written)
}

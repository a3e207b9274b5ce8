//! Loader for raw accelerometer count series.
//!
//! Sensor text files hold one header line followed by one sample per line.
//! Each data line is a single field containing a timestamp token and an
//! integer count separated by a space:
//!
//! ```text
//! TIMESERIES ALZ_001_00_B4Fx_D, 360000 samples, 100 sps, 2019-09-26T10:00:00.000000, TSPAIR, INTEGER, Counts
//! 2019-09-26T10:00:00.000000  -39527
//! 2019-09-26T10:00:00.010000  8250
//! ```

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use thiserror::Error;

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("Malformed row at line {line}: {row:?}")]
    MalformedRow { line: u64, row: String },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// One raw sample: timestamp token and ADC count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSample {
    /// Timestamp token, carried through unparsed.
    pub timestamp: String,
    /// Raw ADC count.
    pub count: i32,
}

/// An ordered sequence of raw samples for one sensor channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSeries {
    pub samples: Vec<RawSample>,
    /// Files the samples were loaded from, in order.
    pub sources: Vec<PathBuf>,
}

impl RawSeries {
    /// Creates a series from samples with no source file.
    pub fn from_samples(samples: Vec<RawSample>) -> Self {
        Self {
            samples,
            sources: Vec::new(),
        }
    }

    /// Creates a series from bare counts with synthetic timestamps.
    pub fn from_counts(counts: &[i32]) -> Self {
        let samples = counts
            .iter()
            .enumerate()
            .map(|(i, &count)| RawSample {
                timestamp: i.to_string(),
                count,
            })
            .collect();
        Self::from_samples(samples)
    }

    /// Returns the number of samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the series holds no samples.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Iterates over the raw counts.
    pub fn counts(&self) -> impl Iterator<Item = i32> + '_ {
        self.samples.iter().map(|s| s.count)
    }

    /// Appends another series, e.g. the following hour of the same channel.
    pub fn extend(&mut self, other: RawSeries) {
        self.samples.extend(other.samples);
        self.sources.extend(other.sources);
    }

    /// Concatenates series in order into one series.
    pub fn merge<I: IntoIterator<Item = RawSeries>>(parts: I) -> Self {
        let mut merged = RawSeries::default();
        for part in parts {
            merged.extend(part);
        }
        merged
    }
}

/// Split one row into its timestamp and count tokens.
///
/// Splits on the first space only; the count token may carry padding.
pub fn parse_row(row: &str) -> Option<RawSample> {
    let (timestamp, count) = row.split_once(' ')?;
    if timestamp.is_empty() {
        return None;
    }
    let count: i32 = count.trim().parse().ok()?;
    Some(RawSample {
        timestamp: timestamp.to_string(),
        count,
    })
}

/// Parse a raw series from any reader. The first line is a header and is skipped.
///
/// # Errors
///
/// Returns `MalformedRow` for a row that does not split into a timestamp and
/// a valid 32-bit count.
pub fn parse_raw_series<R: Read>(reader: R) -> Result<Vec<RawSample>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(b'\t')
        .quoting(false)
        .from_reader(reader);

    let mut samples = Vec::with_capacity(48_000);

    for result in reader.records() {
        let record = result?;
        let line = record.position().map_or(0, |p| p.line());
        let row = record.get(0).unwrap_or_default();

        let sample = parse_row(row).ok_or_else(|| LoaderError::MalformedRow {
            line,
            row: row.to_string(),
        })?;

        if record.len() > 1 {
            return Err(LoaderError::MalformedRow {
                line,
                row: record.iter().collect::<Vec<_>>().join("\t"),
            });
        }

        samples.push(sample);
    }

    Ok(samples)
}

/// Load a raw series from a sensor text file.
///
/// # Arguments
///
/// * `path` - Path to the sensor text file
///
/// # Errors
///
/// Returns an error if the file cannot be read, contains a malformed row, or
/// holds no samples.
pub fn load_raw_series<P: AsRef<Path>>(path: P) -> Result<RawSeries> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let samples = parse_raw_series(BufReader::new(file))?;

    if samples.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    Ok(RawSeries {
        samples,
        sources: vec![path.to_path_buf()],
    })
}

/// Load and merge the files of one sensor channel, in the given order.
pub fn load_merged<P: AsRef<Path>>(paths: &[P]) -> Result<RawSeries> {
    let parts = paths
        .iter()
        .map(load_raw_series)
        .collect::<Result<Vec<_>>>()?;
    Ok(RawSeries::merge(parts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "TIMESERIES ALZ_001_00_B4Fx_D, 3 samples, 100 sps, TSPAIR, INTEGER, Counts";

    #[test]
    fn test_parse_row() {
        let sample = parse_row("2019-09-26T10:00:00.000000 -39527").unwrap();
        assert_eq!(sample.timestamp, "2019-09-26T10:00:00.000000");
        assert_eq!(sample.count, -39527);

        // double space separator leaves padding on the count token
        let sample = parse_row("2019-09-26T10:00:00.010000  8250").unwrap();
        assert_eq!(sample.count, 8250);

        assert!(parse_row("2019-09-26T10:00:00.000000").is_none());
        assert!(parse_row("2019-09-26T10:00:00.000000 1 2").is_none());
        assert!(parse_row("2019-09-26T10:00:00.000000 12.5").is_none());
        assert!(parse_row("2019-09-26T10:00:00.000000 99999999999").is_none());
        assert!(parse_row(" 12").is_none());
    }

    #[test]
    fn test_parse_raw_series_skips_header() -> Result<()> {
        let text = format!(
            "{}\n2019-09-26T10:00:00.000000 -39527\n2019-09-26T10:00:00.010000 8250\n",
            HEADER
        );
        let samples = parse_raw_series(text.as_bytes())?;
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].count, -39527);
        assert_eq!(samples[1].timestamp, "2019-09-26T10:00:00.010000");
        Ok(())
    }

    #[test]
    fn test_parse_raw_series_malformed() {
        let text = format!("{}\n2019-09-26T10:00:00.000000 12\nbogus\n", HEADER);
        match parse_raw_series(text.as_bytes()) {
            Err(LoaderError::MalformedRow { line, row }) => {
                assert_eq!(line, 3);
                assert_eq!(row, "bogus");
            }
            other => panic!("expected MalformedRow, got {:?}", other),
        }

        let text = format!("{}\n2019-09-26T10:00:00.000000 abc\n", HEADER);
        assert!(matches!(
            parse_raw_series(text.as_bytes()),
            Err(LoaderError::MalformedRow { .. })
        ));
    }

    #[test]
    fn test_load_raw_series() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        writeln!(file, "2019-09-26T10:00:00.000000 1").unwrap();
        writeln!(file, "2019-09-26T10:00:00.010000 2").unwrap();
        writeln!(file, "2019-09-26T10:00:00.020000 3").unwrap();
        file.flush().unwrap();

        let series = load_raw_series(file.path())?;
        assert_eq!(series.len(), 3);
        assert_eq!(series.counts().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(series.sources, vec![file.path().to_path_buf()]);
        Ok(())
    }

    #[test]
    fn test_load_raw_series_empty() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        file.flush().unwrap();

        assert!(matches!(
            load_raw_series(file.path()),
            Err(LoaderError::EmptyFile(_))
        ));
    }

    #[test]
    fn test_load_merged_keeps_order() -> Result<()> {
        let mut first = NamedTempFile::new().unwrap();
        writeln!(first, "{}", HEADER).unwrap();
        writeln!(first, "2019-09-26T10:59:59.990000 10").unwrap();
        first.flush().unwrap();

        let mut second = NamedTempFile::new().unwrap();
        writeln!(second, "{}", HEADER).unwrap();
        writeln!(second, "2019-09-26T11:00:00.000000 20").unwrap();
        writeln!(second, "2019-09-26T11:00:00.010000 30").unwrap();
        second.flush().unwrap();

        let merged = load_merged(&[first.path(), second.path()])?;
        assert_eq!(merged.counts().collect::<Vec<_>>(), vec![10, 20, 30]);
        assert_eq!(merged.sources.len(), 2);
        Ok(())
    }

    #[test]
    fn test_from_counts() {
        let series = RawSeries::from_counts(&[0, 5, -5]);
        assert_eq!(series.len(), 3);
        assert!(!series.is_empty());
        assert_eq!(series.samples[2].timestamp, "2");
    }
}

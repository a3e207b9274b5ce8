//! CSV writers for converted series and peak statistics.
//!
//! - Per-sensor series: index, timestamp and the twelve derived columns
//! - Stats table: one row per sensor channel, blank cells where no peak exists
//! - Column maxima: signed maximum and plot limit per stats column

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use thiserror::Error;

use crate::processors::conversion::{SensorSeriesSet, SeriesColumn};
use crate::processors::stats::{StatsColumn, StatsSummary};

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A derived column does not have one value per timestamp.
    #[error("column '{column}' has {found} values, expected {expected}")]
    LengthMismatch {
        column: SeriesColumn,
        expected: usize,
        found: usize,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Opens a CSV writer at `path`, creating parent directories.
fn create_csv_writer(path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    ensure_parent_dirs(path)?;
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(csv::Writer::from_writer(BufWriter::new(file)))
}

fn write_row<I, T>(writer: &mut csv::Writer<BufWriter<File>>, path: &Path, record: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    writer
        .write_record(record)
        .map_err(|e| WriteError::CsvError {
            path: path.display().to_string(),
            source: e,
        })
}

fn finish(mut writer: csv::Writer<BufWriter<File>>, path: &Path) -> Result<()> {
    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })
}

/// Blank cell for a missing value.
fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Write the derived series of one sensor to CSV.
///
/// Columns are `index`, `timestamp` (blank inside the zero pad) and the
/// twelve derived series in stage order. Values are written with full
/// round-trip precision.
///
/// # Errors
///
/// Returns an error if:
/// - A column's length differs from the number of timestamps
/// - Parent directories cannot be created
/// - File cannot be created or written to
pub fn write_series_csv(path: &Path, series: &SensorSeriesSet) -> Result<()> {
    let expected = series.len();
    let columns = SeriesColumn::ALL
        .iter()
        .map(|&column| {
            let values = series.column(column);
            if values.len() == expected {
                Ok(values)
            } else {
                Err(WriteError::LengthMismatch {
                    column,
                    expected,
                    found: values.len(),
                })
            }
        })
        .collect::<Result<Vec<&[f64]>>>()?;

    let mut writer = create_csv_writer(path)?;

    let mut header = vec!["index", "timestamp"];
    header.extend(SeriesColumn::ALL.iter().map(|c| c.name()));
    write_row(&mut writer, path, &header)?;

    for (i, timestamp) in series.timestamps.iter().enumerate() {
        let mut record = Vec::with_capacity(columns.len() + 2);
        record.push(i.to_string());
        record.push(timestamp.clone().unwrap_or_default());
        record.extend(columns.iter().map(|col| col[i].to_string()));
        write_row(&mut writer, path, &record)?;
    }

    finish(writer, path)
}

/// Write the stats table to CSV.
///
/// Header: `Ch,ID,Floor,Axis,Offset Acc (g),Acc (g),Vel (cm/s),Disp (cm)`.
/// Sensors without recorded peaks keep blank numeric cells.
pub fn write_stats_csv(path: &Path, summary: &StatsSummary) -> Result<()> {
    let mut writer = create_csv_writer(path)?;

    let mut header = vec!["Ch", "ID", "Floor", "Axis"];
    header.extend(StatsColumn::ALL.iter().map(|c| c.header()));
    write_row(&mut writer, path, &header)?;

    for row in summary.rows() {
        let mut record = vec![
            row.channel.to_string(),
            row.id.to_string(),
            row.floor.to_string(),
            row.axis.to_string(),
        ];
        record.extend(StatsColumn::ALL.iter().map(|&c| cell(row.get(c))));
        write_row(&mut writer, path, &record)?;
    }

    finish(writer, path)
}

/// Write the maximum rounded peak and plot limit of each stats column.
pub fn write_column_maxima_csv(path: &Path, summary: &StatsSummary) -> Result<()> {
    let mut writer = create_csv_writer(path)?;
    write_row(&mut writer, path, ["column", "max", "plot_limit"])?;

    for (column, max) in summary.column_maxima() {
        write_row(
            &mut writer,
            path,
            [
                column.header().to_string(),
                cell(max),
                cell(summary.plot_limit(column)),
            ],
        )?;
    }

    finish(writer, path)
}

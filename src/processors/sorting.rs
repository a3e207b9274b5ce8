//! Canonical ordering and pairing of sensor files for an event.
//!
//! An event window lies either inside a single recording hour (one file per
//! sensor channel) or straddles an hour boundary (two files per channel, one
//! per hour). Files are ordered by the fixed sensor code priority so that the
//! downstream table always follows the report layout.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::sensor_code::{
    parse_identity, time_info, SensorCodeError, SensorIdentity, TimeInfo, SENSOR_CHANNELS,
    SENSOR_CODES,
};

/// Errors that can occur during file ordering and pairing.
#[derive(Debug, Error)]
pub enum SortingError {
    #[error("Event must span one or two recording hours, found {count} distinct timestamps")]
    UnsupportedEventSpan { count: usize },

    #[error(transparent)]
    SensorCode(#[from] SensorCodeError),

    #[error("Sensor {sensor} has {found} files, expected {expected}")]
    MissingPair {
        sensor: String,
        found: usize,
        expected: usize,
    },

    #[error("Failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for sorting operations.
pub type Result<T> = std::result::Result<T, SortingError>;

/// Number of recording hours covered by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSpan {
    SingleHour,
    TwoHours,
}

impl EventSpan {
    /// Files expected per sensor channel.
    pub fn files_per_channel(&self) -> usize {
        match self {
            EventSpan::SingleHour => 1,
            EventSpan::TwoHours => 2,
        }
    }
}

/// Files belonging to one sensor channel, in merge order.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorFileGroup {
    pub identity: SensorIdentity,
    pub files: Vec<PathBuf>,
}

fn file_name_key(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Index of the priority code a file belongs to.
fn code_rank(path: &Path) -> Result<usize> {
    let identity = parse_identity(path)?;
    SENSOR_CODES
        .iter()
        .position(|code| identity.code_with_channel.starts_with(code))
        .ok_or(SortingError::SensorCode(SensorCodeError::InvalidSensorCode(
            identity.code_with_channel,
        )))
}

/// Sort files by sensor code priority, lexicographically by file name within a code.
///
/// # Errors
///
/// Returns `InvalidSensorCode` for a file whose code is not in the priority list.
pub fn sort_by_sensor_code<P: AsRef<Path>>(files: &[P]) -> Result<Vec<PathBuf>> {
    let mut keyed = files
        .iter()
        .map(|f| {
            let path = f.as_ref();
            Ok((code_rank(path)?, file_name_key(path), path.to_path_buf()))
        })
        .collect::<Result<Vec<_>>>()?;

    keyed.sort();
    Ok(keyed.into_iter().map(|(_, _, path)| path).collect())
}

/// Determine whether the files cover one or two recording hours.
///
/// Returns the span and the timestamp token of the earliest hour.
pub fn event_span<P: AsRef<Path>>(files: &[P]) -> Result<(EventSpan, String)> {
    let times = files
        .iter()
        .map(|f| time_info(f.as_ref()))
        .collect::<std::result::Result<BTreeSet<TimeInfo>, _>>()?;

    // `TimeInfo` orders by hour first, then by token.
    let mut iter = times.iter();
    match (times.len(), iter.next()) {
        (1, Some(first)) => Ok((EventSpan::SingleHour, first.token.clone())),
        (2, Some(first)) => Ok((EventSpan::TwoHours, first.token.clone())),
        (count, _) => Err(SortingError::UnsupportedEventSpan { count }),
    }
}

/// Order a sensor file set into canonical report order.
///
/// For a single-hour event the files are sorted by sensor code. For an event
/// spanning two hours, the files of the earlier hour come first, followed by
/// all remaining files, each group sorted by sensor code.
///
/// # Errors
///
/// Returns `UnsupportedEventSpan` when the files carry neither one nor two
/// distinct timestamp tokens.
pub fn order_files<P: AsRef<Path>>(files: &[P]) -> Result<Vec<PathBuf>> {
    let (span, first_token) = event_span(files)?;

    match span {
        EventSpan::SingleHour => sort_by_sensor_code(files),
        EventSpan::TwoHours => {
            let (first, rest): (Vec<PathBuf>, Vec<PathBuf>) = files
                .iter()
                .map(|f| f.as_ref().to_path_buf())
                .partition(|path| file_name_key(path).starts_with(first_token.as_str()));

            let mut ordered = sort_by_sensor_code(&first)?;
            ordered.extend(sort_by_sensor_code(&rest)?);
            Ok(ordered)
        }
    }
}

/// Group ordered files by sensor channel, in sensor table order.
///
/// Within a group the files are sorted by name, which puts the earlier hour
/// first because file names lead with the timestamp token. Channels with no
/// files are skipped.
///
/// # Errors
///
/// Returns `MissingPair` when a channel does not have one file per recording
/// hour, and `InvalidSensorCode` for files outside the sensor table.
pub fn group_by_channel<P: AsRef<Path>>(files: &[P]) -> Result<Vec<SensorFileGroup>> {
    let (span, _) = event_span(files)?;
    let expected = span.files_per_channel();

    let mut identified = files
        .iter()
        .map(|f| {
            let path = f.as_ref().to_path_buf();
            let identity = parse_identity(&path)?;
            if identity.known_channel().is_none() {
                return Err(SortingError::SensorCode(SensorCodeError::InvalidSensorCode(
                    identity.code_with_channel,
                )));
            }
            Ok((identity, path))
        })
        .collect::<Result<Vec<_>>>()?;

    identified.sort_by_key(|(_, path)| file_name_key(path));

    let mut groups = Vec::with_capacity(SENSOR_CHANNELS.len());
    for entry in SENSOR_CHANNELS.iter() {
        let members: Vec<&(SensorIdentity, PathBuf)> = identified
            .iter()
            .filter(|(identity, _)| identity.code_with_channel == entry.code_with_channel)
            .collect();

        let Some((identity, _)) = members.first() else {
            continue;
        };

        if members.len() != expected {
            return Err(SortingError::MissingPair {
                sensor: entry.code_with_channel.to_string(),
                found: members.len(),
                expected,
            });
        }

        groups.push(SensorFileGroup {
            identity: identity.clone(),
            files: members.iter().map(|(_, path)| path.clone()).collect(),
        });
    }

    Ok(groups)
}

/// List sensor files with the given extension in an event directory.
pub fn discover_sensor_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| SortingError::ReadDir {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case(extension))
                    .unwrap_or(false)
        })
        .collect();

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    fn event_files(token: &str) -> Vec<String> {
        SENSOR_CHANNELS
            .iter()
            .map(|c| format!("{}.ALZ.{:03}.{}.txt", token, c.channel, c.code_with_channel))
            .collect()
    }

    fn codes(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|f| parse_identity(f).unwrap().code_with_channel)
            .collect()
    }

    #[test]
    fn test_sort_by_sensor_code_short() {
        let unordered = vec![
            "20190926100000.ALZ.022.FFN.txt",
            "20190926100000.ALZ.019.B4Fx.txt",
            "20190926100000.ALZ.002.N39y.txt",
            "20190926100000.ALZ.004.S39x.txt",
            "20190926100000.ALZ.001.N39x.txt",
            "20190926100000.ALZ.013.N12x.txt",
        ];

        let ordered = sort_by_sensor_code(&unordered).unwrap();
        assert_eq!(
            codes(&ordered),
            vec!["N39x", "N39y", "S39x", "N12x", "B4Fx", "FFN"]
        );
    }

    #[test]
    fn test_order_single_hour_matches_table() {
        let mut files = event_files("20190926100000");
        files.reverse();

        let ordered = order_files(&files).unwrap();
        let expected: Vec<String> = SENSOR_CHANNELS
            .iter()
            .map(|c| c.code_with_channel.to_string())
            .collect();
        assert_eq!(codes(&ordered), expected);
    }

    #[test]
    fn test_order_two_hours() {
        let mut files = event_files("20190926110000");
        files.extend(event_files("20190926100000"));
        files.swap(3, 30);

        let ordered = order_files(&files).unwrap();
        assert_eq!(ordered.len(), 48);

        for (i, path) in ordered.iter().enumerate() {
            let info = time_info(path).unwrap();
            let expected_hour = if i < 24 { "10" } else { "11" };
            assert_eq!(info.hour, expected_hour, "position {}", i);
        }
        assert_eq!(codes(&ordered[..24]), codes(&ordered[24..]));
    }

    #[test]
    fn test_order_is_idempotent_and_total() {
        let mut files = event_files("20190926110000");
        files.extend(event_files("20190926100000"));

        let once = order_files(&files).unwrap();
        let twice = order_files(&once).unwrap();
        assert_eq!(once, twice);

        let mut input: Vec<PathBuf> = files.iter().map(PathBuf::from).collect();
        let mut output = once.clone();
        input.sort();
        output.sort();
        assert_eq!(input, output);
    }

    #[test]
    fn test_order_unsupported_span() {
        let files = vec![
            "20190926100000.ALZ.001.N39x.txt",
            "20190926110000.ALZ.001.N39x.txt",
            "20190926120000.ALZ.001.N39x.txt",
        ];
        assert!(matches!(
            order_files(&files),
            Err(SortingError::UnsupportedEventSpan { count: 3 })
        ));

        let empty: Vec<PathBuf> = Vec::new();
        assert!(matches!(
            order_files(&empty),
            Err(SortingError::UnsupportedEventSpan { count: 0 })
        ));
    }

    #[test]
    fn test_order_rejects_unknown_code() {
        let files = vec![
            "20190926100000.ALZ.001.N39x.txt",
            "20190926100000.ALZ.001.Q77x.txt",
        ];
        assert!(matches!(
            order_files(&files),
            Err(SortingError::SensorCode(SensorCodeError::InvalidSensorCode(_)))
        ));
    }

    #[test]
    fn test_group_by_channel_pairs() {
        let mut files = event_files("20190926110000");
        files.extend(event_files("20190926100000"));
        let ordered = order_files(&files).unwrap();

        let groups = group_by_channel(&ordered).unwrap();
        assert_eq!(groups.len(), 24);

        let b4fx = &groups[18];
        assert_eq!(b4fx.identity.code_with_channel, "B4Fx");
        assert_eq!(b4fx.files.len(), 2);
        assert_eq!(time_info(&b4fx.files[0]).unwrap().hour, "10");
        assert_eq!(time_info(&b4fx.files[1]).unwrap().hour, "11");
    }

    #[test]
    fn test_group_by_channel_missing_pair() {
        let mut files = event_files("20190926110000");
        files.extend(event_files("20190926100000"));
        files.retain(|f| f != "20190926110000.ALZ.007.N24x.txt");

        assert!(matches!(
            group_by_channel(&files),
            Err(SortingError::MissingPair { ref sensor, found: 1, expected: 2 }) if sensor == "N24x"
        ));
    }

    #[test]
    fn test_group_by_channel_subset() {
        let files = vec![
            "20190926100000.ALZ.019.B4Fx.txt",
            "20190926100000.ALZ.001.N39x.txt",
        ];
        let groups = group_by_channel(&files).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].identity.code_with_channel, "N39x");
        assert_eq!(groups[1].files.len(), 1);
    }

    #[test]
    fn test_discover_sensor_files() {
        let temp_dir = TempDir::new().unwrap();
        File::create(temp_dir.path().join("20190926100000.ALZ.001.N39x.txt")).unwrap();
        File::create(temp_dir.path().join("20190926100000.ALZ.001.N39x.m")).unwrap();
        File::create(temp_dir.path().join("notes.TXT")).unwrap();

        let files = discover_sensor_files(temp_dir.path(), "txt").unwrap();
        assert_eq!(files.len(), 2);

        assert!(discover_sensor_files(&temp_dir.path().join("missing"), "txt").is_err());
    }
}

//! Sensor identity parsing and the fixed sensor channel table.
//!
//! Sensor text files are named `<timestamp>.<site>.<device>.<code><channel>.<ext>`,
//! e.g. `20190926100000.ALZ.001.B4Fx.txt`. Structural sensors carry a lowercase
//! channel suffix (`x`, `y`, `z`); far-field sensors (`FFN`, `FFW`, `FFZ`) do not.

use std::fmt;
use std::path::Path;

use thiserror::Error;

/// Errors that can occur while deriving sensor metadata from a file name.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SensorCodeError {
    #[error("Invalid sensor code: {0}")]
    InvalidSensorCode(String),

    #[error("Invalid timestamp token in file name: {0}")]
    InvalidTimestampToken(String),
}

/// Result type for sensor code operations.
pub type Result<T> = std::result::Result<T, SensorCodeError>;

/// Sensor codes in canonical report order.
pub const SENSOR_CODES: [&str; 8] = ["N39", "S39", "N24", "S24", "N12", "S12", "B4F", "FF"];

/// Measurement axis of a sensor channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a sensor is mounted, which fixes its calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mount {
    /// Basement or far-field ground sensor.
    Ground,
    /// Sensor on an upper floor of the structure.
    UpperFloor,
}

impl Mount {
    /// Sensor sensitivity in V/g.
    pub fn sensitivity(&self) -> f64 {
        match self {
            Mount::Ground => 1.25,
            Mount::UpperFloor => 0.625,
        }
    }
}

/// One row of the fixed sensor channel table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorChannel {
    /// Report channel number (1-based)
    pub channel: u8,
    pub code: &'static str,
    pub code_with_channel: &'static str,
    pub floor_code: &'static str,
    pub axis: Axis,
    pub mount: Mount,
}

const fn channel(
    channel: u8,
    code: &'static str,
    code_with_channel: &'static str,
    floor_code: &'static str,
    axis: Axis,
    mount: Mount,
) -> SensorChannel {
    SensorChannel {
        channel,
        code,
        code_with_channel,
        floor_code,
        axis,
        mount,
    }
}

/// All installed sensor channels, in report order.
pub const SENSOR_CHANNELS: [SensorChannel; 24] = [
    channel(1, "N39", "N39x", "L40", Axis::X, Mount::UpperFloor),
    channel(2, "N39", "N39y", "L40", Axis::Y, Mount::UpperFloor),
    channel(3, "N39", "N39z", "L40", Axis::Z, Mount::UpperFloor),
    channel(4, "S39", "S39x", "L40", Axis::X, Mount::UpperFloor),
    channel(5, "S39", "S39y", "L40", Axis::Y, Mount::UpperFloor),
    channel(6, "S39", "S39z", "L40", Axis::Z, Mount::UpperFloor),
    channel(7, "N24", "N24x", "L25", Axis::X, Mount::UpperFloor),
    channel(8, "N24", "N24y", "L25", Axis::Y, Mount::UpperFloor),
    channel(9, "N24", "N24z", "L25", Axis::Z, Mount::UpperFloor),
    channel(10, "S24", "S24x", "L25", Axis::X, Mount::UpperFloor),
    channel(11, "S24", "S24y", "L25", Axis::Y, Mount::UpperFloor),
    channel(12, "S24", "S24z", "L25", Axis::Z, Mount::UpperFloor),
    channel(13, "N12", "N12x", "L13", Axis::X, Mount::UpperFloor),
    channel(14, "N12", "N12y", "L13", Axis::Y, Mount::UpperFloor),
    channel(15, "N12", "N12z", "L13", Axis::Z, Mount::UpperFloor),
    channel(16, "S12", "S12x", "L13", Axis::X, Mount::UpperFloor),
    channel(17, "S12", "S12y", "L13", Axis::Y, Mount::UpperFloor),
    channel(18, "S12", "S12z", "L13", Axis::Z, Mount::UpperFloor),
    channel(19, "B4F", "B4Fx", "B4", Axis::X, Mount::Ground),
    channel(20, "B4F", "B4Fy", "B4", Axis::Y, Mount::Ground),
    channel(21, "B4F", "B4Fz", "B4", Axis::Z, Mount::Ground),
    channel(22, "FFN", "FFN", "GF", Axis::X, Mount::Ground),
    channel(23, "FFW", "FFW", "GF", Axis::Y, Mount::Ground),
    channel(24, "FFZ", "FFZ", "GF", Axis::Z, Mount::Ground),
];

/// Look up a channel in the sensor table by its code with channel (e.g. `B4Fx`).
pub fn lookup_channel(code_with_channel: &str) -> Option<&'static SensorChannel> {
    SENSOR_CHANNELS
        .iter()
        .find(|c| c.code_with_channel == code_with_channel)
}

/// Identity of a sensor channel, derived from a file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SensorIdentity {
    /// Bare sensor code, e.g. `B4F`
    pub code: String,
    /// Sensor code with channel suffix, e.g. `B4Fx`
    pub code_with_channel: String,
    /// Digits of the code, e.g. `4` (empty for far-field sensors)
    pub floor: String,
    pub axis: Axis,
}

impl SensorIdentity {
    /// Build an identity from a code with channel token such as `S39z` or `FFW`.
    pub fn from_code_with_channel(token: &str) -> Result<Self> {
        let last = token
            .chars()
            .last()
            .ok_or_else(|| SensorCodeError::InvalidSensorCode(token.to_string()))?;

        let code = if last.is_ascii_lowercase() {
            &token[..token.len() - last.len_utf8()]
        } else {
            token
        };

        if code.is_empty() {
            return Err(SensorCodeError::InvalidSensorCode(token.to_string()));
        }

        Ok(Self {
            code: code.to_string(),
            code_with_channel: token.to_string(),
            floor: floor_digits(code),
            axis: axis(token)?,
        })
    }

    /// Floor code for this sensor, e.g. `L40`, `B4`, `GF`.
    pub fn floor_code(&self) -> Result<String> {
        floor_code(&self.code_with_channel)
    }

    /// Table entry for this sensor, if it is one of the installed channels.
    pub fn known_channel(&self) -> Option<&'static SensorChannel> {
        lookup_channel(&self.code_with_channel)
    }
}

impl fmt::Display for SensorIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code_with_channel)
    }
}

/// Return the file name component of `path` as a string.
fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
}

/// Derive the sensor identity from a file name or path.
///
/// The extension is stripped and the last dot-delimited segment of the
/// remaining stem is the code-with-channel token.
///
/// # Errors
///
/// Returns `InvalidSensorCode` if the token is empty or its axis cannot be
/// determined.
pub fn parse_identity<P: AsRef<Path>>(path: P) -> Result<SensorIdentity> {
    let path = path.as_ref();
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    let token = stem.rsplit('.').next().unwrap_or_default();
    SensorIdentity::from_code_with_channel(token)
}

/// Concatenate all decimal digits of a sensor code.
pub fn floor_digits(code: &str) -> String {
    code.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Floor code of a sensor code with channel.
///
/// `F…` sensors are on the ground floor (`GF`); `N…`/`S…` sensors sit below
/// the level they report, so their floor is the sensor floor plus one
/// (`N39x` → `L40`); `B…` sensors are in the basement (`B4Fx` → `B4`).
pub fn floor_code(code_with_channel: &str) -> Result<String> {
    let invalid = || SensorCodeError::InvalidSensorCode(code_with_channel.to_string());

    match code_with_channel.chars().next() {
        Some('F') => Ok("GF".to_string()),
        Some('N') | Some('S') => {
            let floor: u32 = floor_digits(code_with_channel)
                .parse()
                .map_err(|_| invalid())?;
            Ok(format!("L{}", floor + 1))
        }
        Some('B') => {
            let digits = floor_digits(code_with_channel);
            if digits.is_empty() {
                return Err(invalid());
            }
            Ok(format!("B{}", digits))
        }
        _ => Err(invalid()),
    }
}

/// Axis of a sensor code with channel.
///
/// A lowercase `x`/`y`/`z` suffix maps to the matching axis; far-field codes
/// map their trailing direction letter `N`/`W`/`Z` to `X`/`Y`/`Z`.
pub fn axis(code_with_channel: &str) -> Result<Axis> {
    match code_with_channel.chars().last() {
        Some('x') | Some('N') => Ok(Axis::X),
        Some('y') | Some('W') => Ok(Axis::Y),
        Some('z') | Some('Z') => Ok(Axis::Z),
        _ => Err(SensorCodeError::InvalidSensorCode(
            code_with_channel.to_string(),
        )),
    }
}

/// Hour-of-day and full timestamp token of a sensor file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeInfo {
    /// Two-digit hour, e.g. `"10"`
    pub hour: String,
    /// Full 14-digit timestamp token, e.g. `"20190926100000"`
    pub token: String,
}

/// Extract the hour and timestamp token from the leading segment of a file name.
pub fn time_info<P: AsRef<Path>>(path: P) -> Result<TimeInfo> {
    let name = file_name(path.as_ref());
    let token = name.split('.').next().unwrap_or_default();

    if token.len() != 14 || !token.chars().all(|c| c.is_ascii_digit()) {
        return Err(SensorCodeError::InvalidTimestampToken(name.to_string()));
    }

    Ok(TimeInfo {
        hour: token[8..10].to_string(),
        token: token.to_string(),
    })
}

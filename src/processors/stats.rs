//! Peak statistics table for an event.
//!
//! Statistics are gathered in two phases. A [`StatsCollector`] accepts peaks
//! from any number of threads; [`StatsCollector::finish`] consumes it and
//! returns the [`StatsSummary`], which is the only type that exposes column
//! maxima. Maxima can therefore never be read from a partially filled table.

use std::fmt;
use std::sync::Mutex;

use log::debug;
use thiserror::Error;

use super::conversion::SensorPeaks;
use super::sensor_code::{Axis, SENSOR_CHANNELS};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StatsError {
    #[error("Sensor {0} is not in the stats table")]
    UnknownChannel(String),
}

pub type Result<T> = std::result::Result<T, StatsError>;

/// Peak columns of the stats table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatsColumn {
    OffsetAcc,
    Acc,
    Vel,
    Disp,
}

impl StatsColumn {
    pub const ALL: [StatsColumn; 4] = [
        StatsColumn::OffsetAcc,
        StatsColumn::Acc,
        StatsColumn::Vel,
        StatsColumn::Disp,
    ];

    /// Column header as it appears in the report table.
    pub fn header(&self) -> &'static str {
        match self {
            StatsColumn::OffsetAcc => "Offset Acc (g)",
            StatsColumn::Acc => "Acc (g)",
            StatsColumn::Vel => "Vel (cm/s)",
            StatsColumn::Disp => "Disp (cm)",
        }
    }
}

impl fmt::Display for StatsColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

/// One row of the stats table.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsRow {
    pub channel: u8,
    /// Code with channel, e.g. `N39x`
    pub id: &'static str,
    pub floor: &'static str,
    pub axis: Axis,
    pub offset_acc: Option<f64>,
    pub acc: Option<f64>,
    pub vel: Option<f64>,
    pub disp: Option<f64>,
}

impl StatsRow {
    pub fn get(&self, column: StatsColumn) -> Option<f64> {
        match column {
            StatsColumn::OffsetAcc => self.offset_acc,
            StatsColumn::Acc => self.acc,
            StatsColumn::Vel => self.vel,
            StatsColumn::Disp => self.disp,
        }
    }

    fn record(&mut self, peaks: &SensorPeaks) {
        self.offset_acc = Some(peaks.offset_acc.rounded);
        self.acc = Some(peaks.bandpassed_acc.rounded);
        self.vel = Some(peaks.velocity.rounded);
        self.disp = Some(peaks.displacement.rounded);
    }

    pub fn is_recorded(&self) -> bool {
        StatsColumn::ALL.iter().all(|c| self.get(*c).is_some())
    }
}

/// Stats table with one row per installed sensor channel, in channel order.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsTable {
    rows: Vec<StatsRow>,
}

impl Default for StatsTable {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsTable {
    /// Table pre-populated from the sensor table with empty peak cells.
    pub fn new() -> Self {
        let rows = SENSOR_CHANNELS
            .iter()
            .map(|c| StatsRow {
                channel: c.channel,
                id: c.code_with_channel,
                floor: c.floor_code,
                axis: c.axis,
                offset_acc: None,
                acc: None,
                vel: None,
                disp: None,
            })
            .collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[StatsRow] {
        &self.rows
    }

    pub fn row(&self, code_with_channel: &str) -> Option<&StatsRow> {
        self.rows.iter().find(|r| r.id == code_with_channel)
    }

    /// Store the rounded peaks of one sensor in its row.
    pub fn record_peaks(&mut self, code_with_channel: &str, peaks: &SensorPeaks) -> Result<()> {
        let row = self
            .rows
            .iter_mut()
            .find(|r| r.id == code_with_channel)
            .ok_or_else(|| StatsError::UnknownChannel(code_with_channel.to_string()))?;
        row.record(peaks);
        Ok(())
    }

    /// Number of rows holding peaks.
    pub fn recorded(&self) -> usize {
        self.rows.iter().filter(|r| r.is_recorded()).count()
    }
}

/// Thread-safe collection phase of the stats table.
#[derive(Debug, Default)]
pub struct StatsCollector {
    table: Mutex<StatsTable>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the peaks of one sensor. Safe to call from several threads.
    pub fn record_peaks(&self, code_with_channel: &str, peaks: &SensorPeaks) -> Result<()> {
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        table.record_peaks(code_with_channel, peaks)?;
        debug!("Recorded peaks for {}", code_with_channel);
        Ok(())
    }

    /// Close the collection phase.
    pub fn finish(self, plot_headroom: f64) -> StatsSummary {
        let table = self.table.into_inner().unwrap_or_else(|e| e.into_inner());
        StatsSummary::new(table, plot_headroom)
    }
}

/// Completed stats table with its column maxima.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSummary {
    table: StatsTable,
    plot_headroom: f64,
}

impl StatsSummary {
    pub fn new(table: StatsTable, plot_headroom: f64) -> Self {
        Self {
            table,
            plot_headroom,
        }
    }

    pub fn table(&self) -> &StatsTable {
        &self.table
    }

    pub fn rows(&self) -> &[StatsRow] {
        self.table.rows()
    }

    /// Largest rounded peak of a column, or `None` if no sensor was recorded.
    ///
    /// The comparison is on signed values, so a column of negative peaks
    /// yields its value closest to zero.
    pub fn column_max(&self, column: StatsColumn) -> Option<f64> {
        self.table
            .rows()
            .iter()
            .filter_map(|r| r.get(column))
            .reduce(f64::max)
    }

    /// Y-axis limit for plots of a column: the signed column maximum scaled
    /// by the headroom factor. A column of negative peaks gives a negative limit.
    pub fn plot_limit(&self, column: StatsColumn) -> Option<f64> {
        self.column_max(column).map(|max| max * self.plot_headroom)
    }

    /// Column maxima in column order.
    pub fn column_maxima(&self) -> Vec<(StatsColumn, Option<f64>)> {
        StatsColumn::ALL
            .iter()
            .map(|&c| (c, self.column_max(c)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transforms::PeakStat;
    use rayon::prelude::*;

    fn peak(value: f64) -> PeakStat {
        PeakStat::from_series(&[value]).unwrap()
    }

    fn peaks(acc: f64, bandpassed: f64, vel: f64, disp: f64) -> SensorPeaks {
        SensorPeaks {
            offset_acc: peak(acc),
            bandpassed_acc: peak(bandpassed),
            velocity: peak(vel),
            displacement: peak(disp),
        }
    }

    #[test]
    fn test_table_prepopulated() {
        let table = StatsTable::new();
        assert_eq!(table.rows().len(), 24);
        assert_eq!(table.recorded(), 0);

        let first = &table.rows()[0];
        assert_eq!(first.channel, 1);
        assert_eq!(first.id, "N39x");
        assert_eq!(first.floor, "L40");
        assert_eq!(first.axis, Axis::X);
        assert_eq!(first.get(StatsColumn::Vel), None);

        let last = &table.rows()[23];
        assert_eq!(last.id, "FFZ");
        assert_eq!(last.floor, "GF");
    }

    #[test]
    fn test_record_peaks_rounds() {
        let mut table = StatsTable::new();
        table
            .record_peaks("B4Fy", &peaks(0.023841, -0.0151987, 0.246295, -0.1688018))
            .unwrap();

        let row = table.row("B4Fy").unwrap();
        assert_eq!(row.offset_acc, Some(0.0238));
        assert_eq!(row.acc, Some(-0.0152));
        assert_eq!(row.vel, Some(0.2463));
        assert_eq!(row.disp, Some(-0.1688));
        assert!(row.is_recorded());
        assert_eq!(table.recorded(), 1);
    }

    #[test]
    fn test_record_unknown_channel() {
        let mut table = StatsTable::new();
        let err = table
            .record_peaks("B5Fx", &peaks(0.1, 0.1, 0.1, 0.1))
            .unwrap_err();
        assert_eq!(err, StatsError::UnknownChannel("B5Fx".to_string()));
    }

    #[test]
    fn test_column_max_and_plot_limit() {
        let collector = StatsCollector::new();
        collector
            .record_peaks("N39x", &peaks(0.01, 0.02, 1.5, -0.4))
            .unwrap();
        collector
            .record_peaks("S12z", &peaks(0.03, -0.05, 0.5, -0.2))
            .unwrap();

        let summary = collector.finish(1.15);
        assert_eq!(summary.column_max(StatsColumn::OffsetAcc), Some(0.03));
        assert_eq!(summary.column_max(StatsColumn::Acc), Some(0.02));
        assert_eq!(summary.column_max(StatsColumn::Vel), Some(1.5));
        assert_eq!(summary.column_max(StatsColumn::Disp), Some(-0.2));

        let limit = summary.plot_limit(StatsColumn::Vel).unwrap();
        assert!((limit - 1.725).abs() < 1e-12);
        let limit = summary.plot_limit(StatsColumn::Disp).unwrap();
        assert!((limit + 0.23).abs() < 1e-12);
    }

    #[test]
    fn test_empty_summary_has_no_maxima() {
        let summary = StatsCollector::new().finish(1.15);
        assert!(summary
            .column_maxima()
            .iter()
            .all(|(_, max)| max.is_none()));
        assert_eq!(summary.plot_limit(StatsColumn::Acc), None);
    }

    #[test]
    fn test_concurrent_recording() {
        let collector = StatsCollector::new();

        SENSOR_CHANNELS.par_iter().for_each(|channel| {
            let v = channel.channel as f64 / 100.0;
            collector
                .record_peaks(channel.code_with_channel, &peaks(v, v, v, -v))
                .unwrap();
        });

        let summary = collector.finish(1.15);
        assert_eq!(summary.table().recorded(), 24);
        assert_eq!(summary.column_max(StatsColumn::OffsetAcc), Some(0.24));
        assert_eq!(summary.column_max(StatsColumn::Disp), Some(-0.01));
    }
}

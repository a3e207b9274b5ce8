//! Data processing modules.

pub mod conversion;
pub mod event;
pub mod sensor_code;
pub mod sorting;
pub mod stats;

// Re-export key types for convenience
pub use conversion::{
    convert_sensor, sensitivity_for, ConversionError, ConversionParams, ConversionPipeline,
    SensorConversion, SensorPeaks, SensorSeriesSet, SeriesColumn,
};
pub use event::{
    process_event, process_files, write_event_outputs, EventError, EventReport, EventTimestamp,
    FailureCause, SensorFailure,
};
pub use sensor_code::{
    lookup_channel, parse_identity, time_info, Axis, SensorChannel, SensorCodeError,
    SensorIdentity, SENSOR_CHANNELS,
};
pub use sorting::{
    discover_sensor_files, event_span, group_by_channel, order_files, sort_by_sensor_code,
    EventSpan, SensorFileGroup, SortingError,
};
pub use stats::{StatsCollector, StatsColumn, StatsError, StatsRow, StatsSummary, StatsTable};

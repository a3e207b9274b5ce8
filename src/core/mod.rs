//! Core data types, numeric stages and I/O.

pub mod filters;
pub mod loaders;
pub mod transforms;
pub mod writers;

pub use filters::{butter_bandpass, butter_highpass, FilterError, TransferFunction};
pub use loaders::{load_merged, load_raw_series, LoaderError, RawSample, RawSeries};
pub use transforms::PeakStat;
pub use writers::{write_column_maxima_csv, write_series_csv, write_stats_csv, WriteError};

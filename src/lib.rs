//! Conversion of building accelerometer records into acceleration, velocity
//! and displacement.
//!
//! This crate provides tools for:
//! - Ordering and pairing the sensor files of a recorded event
//! - Loading raw ADC count series
//! - Converting counts through band-pass filtering and double integration
//! - Collecting per-sensor peaks into a stats table (parallelized)
//!
//! # Example
//!
//! ```no_run
//! use acc_convert::processors::event::{process_event, EventTimestamp};
//! use acc_convert::PipelineConfig;
//! use std::path::Path;
//!
//! let event = EventTimestamp::parse("2019-09-26T135930").unwrap();
//! let dir = Path::new("events/2019-09-26T135930");
//! let report = process_event(dir, &event, &PipelineConfig::default()).unwrap();
//! println!("{} sensors converted", report.sensors_converted());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;

pub use config::{OutputConfig, PipelineConfig, ProcessingConfig};
pub use core::loaders::{RawSample, RawSeries};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! `gnssrecorder` - Record GNSS and motion-sensor sessions into GeoPackage files
//!
//! This library buffers location fixes, raw GNSS measurement batches,
//! satellite status snapshots and motion-sensor samples from concurrent
//! producers, correlates satellite measurements with the fix that closes
//! them, and writes everything through a single writer thread into one
//! GeoPackage per recording session.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod correlation;
pub mod error;
pub mod event;
pub mod logging;
pub mod session;
pub mod stats;
pub mod storage;
pub mod writer;

pub use config::Config;
pub use correlation::{CorrelationBuffer, CorrelationPolicy};
pub use error::{Error, Result};
pub use event::{
    Constellation, GnssClock, GnssEvent, GnssMeasurement, LocationFix, MeasurementBatch,
    SatelliteKey, SatelliteStatus, SensorKind, SensorSample,
};
pub use logging::init_logging;
pub use session::Recorder;
pub use stats::StatsSnapshot;
pub use storage::{inspect, RecordStore, RowId, Storage, StoreOpener, StoreSummary};

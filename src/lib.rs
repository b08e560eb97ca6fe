//! Stridekit - On-device step detection engine for triaxial accelerometer streams
//!
//! Stridekit turns a raw stream of timestamped 3-axis acceleration samples
//! into discrete step events through a deterministic four-stage pipeline:
//! low-pass filtering → stillness gating → peak/valley tracking → adaptive
//! threshold and cadence validation.
//!
//! The engine is a pure, single-threaded state machine: no I/O, no
//! persistence, no platform dependency. Hosts feed samples with
//! [`StepDetector::ingest`] and read the running count, current threshold,
//! and stillness state back through accessors.

pub mod config;
pub mod detector;
pub mod error;
pub mod extremum;
pub mod filter;
pub mod stillness;
pub mod threshold;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::DetectorConfig;
pub use detector::StepDetector;
pub use error::DetectError;
pub use types::{SampleRecord, StepEvent};

/// Stridekit version embedded in CLI reports
pub const STRIDEKIT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for CLI reports
pub const PRODUCER_NAME: &str = "stridekit";

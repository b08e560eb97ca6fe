//! Core types for the Stridekit engine
//!
//! This module defines the records that cross the engine boundary: raw
//! sample records as they arrive off a sensor stream, and the step events
//! the engine emits on acceptance.

use serde::{Deserialize, Serialize};

/// One timestamped accelerometer reading, as carried on the wire.
///
/// The acceleration vector is kept as a variable-length list rather than a
/// fixed triple so that truncated sensor records remain representable; the
/// engine rejects anything shorter than three components with
/// [`DetectError::InvalidInput`](crate::DetectError::InvalidInput).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleRecord {
    /// Monotonic timestamp in milliseconds.
    pub timestamp_ms: u64,
    /// Acceleration components in the sensor's native unit (x, y, z).
    pub accel: Vec<f64>,
}

impl SampleRecord {
    pub fn new(timestamp_ms: u64, x: f64, y: f64, z: f64) -> Self {
        Self {
            timestamp_ms,
            accel: vec![x, y, z],
        }
    }
}

/// An accepted step, emitted once per counter increment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepEvent {
    /// Timestamp of the confirming peak (ms).
    pub timestamp_ms: u64,
    /// Running step total after this step.
    pub step_count: u32,
    /// Peak-minus-valley amplitude that validated this step.
    pub amplitude: f64,
    /// Adaptive threshold that validated this step. This is the value in
    /// force before the step's own amplitude entered the rolling history,
    /// so it can differ from the engine's threshold right after acceptance.
    pub threshold: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_record_round_trips_through_json() {
        let record = SampleRecord::new(1200, 0.1, -0.2, 9.8);
        let json = serde_json::to_string(&record).unwrap();
        let loaded: SampleRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.timestamp_ms, 1200);
        assert_eq!(loaded.accel, vec![0.1, -0.2, 9.8]);
    }

    #[test]
    fn truncated_sample_record_still_parses() {
        // Short vectors must be representable so the engine can classify
        // them as InvalidInput instead of the parser dropping them.
        let loaded: SampleRecord =
            serde_json::from_str(r#"{"timestamp_ms":5,"accel":[1.0,2.0]}"#).unwrap();
        assert_eq!(loaded.accel.len(), 2);
    }
}

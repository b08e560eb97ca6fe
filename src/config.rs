//! Engine configuration
//!
//! All tuning constants of the detection algorithm live here as an explicit
//! immutable value handed to [`StepDetector::new`](crate::StepDetector::new),
//! so alternate tunings can be tested without touching the engine.

use serde::{Deserialize, Serialize};

/// Configuration for the step detection engine.
///
/// `Default` carries the canonical tuning; every threshold and window below
/// was measured against real gait recordings, so deviate with care.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Exponential smoothing factor per axis (weight of history, 0-1).
    pub smoothing_alpha: f64,
    /// Threshold in force before any amplitude history exists.
    pub initial_threshold: f64,
    /// Lower clamp on the adaptive threshold.
    pub min_threshold: f64,
    /// Upper clamp on the adaptive threshold.
    pub max_threshold: f64,
    /// Minimum time between steps in milliseconds (rejects double-counting).
    pub min_step_interval_ms: u64,
    /// Maximum time between steps in milliseconds (broken cadence beyond).
    pub max_step_interval_ms: u64,
    /// Magnitude variance below which the device is considered motionless.
    pub stillness_variance_threshold: f64,
    /// Number of magnitude samples in the stillness window.
    pub stillness_window: usize,
    /// Continuous low-variance time before transitioning to "still" (ms).
    pub stillness_time_ms: u64,
    /// Number of amplitudes in the rolling threshold history.
    pub amplitude_history: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            smoothing_alpha: 0.8,
            initial_threshold: 1.3,
            min_threshold: 1.0,
            max_threshold: 3.0,
            min_step_interval_ms: 300,
            max_step_interval_ms: 2000,
            stillness_variance_threshold: 0.2,
            stillness_window: 20,
            stillness_time_ms: 3000,
            amplitude_history: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tuning_is_internally_consistent() {
        let config = DetectorConfig::default();
        assert!(config.min_threshold <= config.initial_threshold);
        assert!(config.initial_threshold <= config.max_threshold);
        assert!(config.min_step_interval_ms < config.max_step_interval_ms);
        assert!(config.smoothing_alpha > 0.0 && config.smoothing_alpha < 1.0);
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = DetectorConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let loaded: DetectorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.stillness_window, config.stillness_window);
        assert_eq!(loaded.max_step_interval_ms, config.max_step_interval_ms);
    }
}

//! Engine orchestration
//!
//! This module composes the four stages into the public step detection
//! engine: filter → stillness gate → peak/valley tracking → adaptive
//! threshold and cadence validation. Samples flow through one at a time in
//! acquisition order; an accepted peak is the only externally observable
//! event, alongside the running counter and threshold accessors.

use serde::{Deserialize, Serialize};

use crate::config::DetectorConfig;
use crate::error::DetectError;
use crate::extremum::{Extremum, ExtremumTracker};
use crate::filter::LowPassFilter;
use crate::stillness::StillnessMonitor;
use crate::threshold::AdaptiveThreshold;
use crate::types::{SampleRecord, StepEvent};

/// Streaming step detection engine.
///
/// Single-threaded and synchronous: each [`ingest`](Self::ingest) call is a
/// bounded-time state transition with no I/O and no allocation beyond the
/// fixed-capacity buffers built at construction. Callers feeding samples
/// from one thread while reading state from another must serialize access
/// externally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDetector {
    config: DetectorConfig,
    filter: LowPassFilter,
    stillness: StillnessMonitor,
    extremum: ExtremumTracker,
    threshold: AdaptiveThreshold,
    prev_magnitude: f64,
    time_of_this_peak: u64,
    time_of_last_peak: u64,
    last_step_time_ms: u64,
    step_count: u32,
}

impl Default for StepDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

impl StepDetector {
    /// Create a detector with the given tuning.
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            filter: LowPassFilter::new(config.smoothing_alpha),
            stillness: StillnessMonitor::new(
                config.stillness_window,
                config.stillness_variance_threshold,
                config.stillness_time_ms,
            ),
            extremum: ExtremumTracker::default(),
            threshold: AdaptiveThreshold::new(
                config.initial_threshold,
                config.min_threshold,
                config.max_threshold,
                config.amplitude_history,
            ),
            prev_magnitude: 0.0,
            time_of_this_peak: 0,
            time_of_last_peak: 0,
            last_step_time_ms: 0,
            step_count: 0,
            config,
        }
    }

    /// Process one accelerometer sample.
    ///
    /// Returns `Ok(Some(event))` when the sample completed an accepted step,
    /// `Ok(None)` for every normal negative outcome (no peak, device still,
    /// cadence out of range, amplitude below threshold), and
    /// [`DetectError::InvalidInput`] for samples with fewer than three
    /// components. On error no engine state is mutated.
    pub fn ingest(
        &mut self,
        accel: &[f64],
        timestamp_ms: u64,
    ) -> Result<Option<StepEvent>, DetectError> {
        if accel.len() < 3 {
            return Err(DetectError::InvalidInput(accel.len()));
        }

        let magnitude = self.filter.apply([accel[0], accel[1], accel[2]]);

        if self.stillness.update(magnitude, timestamp_ms) {
            // A stale partial rise must not be misread as a step once
            // movement resumes. The counter and threshold survive.
            self.extremum.reset();
            return Ok(None);
        }

        // First sample only primes the previous-magnitude slot.
        if self.prev_magnitude == 0.0 {
            self.prev_magnitude = magnitude;
            return Ok(None);
        }

        let mut event = None;
        if self.extremum.update(magnitude, self.prev_magnitude) == Some(Extremum::Peak) {
            event = self.evaluate_peak(timestamp_ms);
        }

        self.prev_magnitude = magnitude;
        Ok(event)
    }

    /// Cadence and amplitude validation for a confirmed peak.
    fn evaluate_peak(&mut self, timestamp_ms: u64) -> Option<StepEvent> {
        self.time_of_last_peak = self.time_of_this_peak;
        self.time_of_this_peak = timestamp_ms;

        let interval = self.time_of_this_peak.saturating_sub(self.time_of_last_peak);
        let amplitude = self.extremum.peak() - self.extremum.valley();

        if interval >= self.config.min_step_interval_ms
            && interval <= self.config.max_step_interval_ms
        {
            if amplitude >= self.threshold.value() {
                self.step_count += 1;
                self.last_step_time_ms = timestamp_ms;
                let threshold = self.threshold.value();
                self.threshold.update(amplitude);
                return Some(StepEvent {
                    timestamp_ms,
                    step_count: self.step_count,
                    amplitude,
                    threshold,
                });
            }
            // Amplitude below threshold: not a validated step cycle, so the
            // amplitude does not enter the history either.
        } else if interval > self.config.max_step_interval_ms {
            // Broken cadence. Keep the threshold adapting across gait
            // pauses, but do not count.
            self.threshold.update(amplitude);
        }
        None
    }

    /// Process a batch of sample records in order, collecting accepted
    /// steps. Malformed records are dropped, matching the recovery the
    /// error contract prescribes for hosts.
    pub fn process_batch(&mut self, records: &[SampleRecord]) -> Vec<StepEvent> {
        let mut events = Vec::new();
        for record in records {
            if let Ok(Some(event)) = self.ingest(&record.accel, record.timestamp_ms) {
                events.push(event);
            }
        }
        events
    }

    /// Running step total. Never decreases except through [`reset`](Self::reset).
    pub fn step_count(&self) -> u32 {
        self.step_count
    }

    /// Adaptive threshold currently in force, for diagnostics and tuning.
    pub fn current_threshold(&self) -> f64 {
        self.threshold.value()
    }

    /// Whether the device is currently classified as still.
    pub fn is_still(&self) -> bool {
        self.stillness.is_still()
    }

    /// Tuning this detector was built with.
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Clear all engine state back to construction defaults.
    pub fn reset(&mut self) {
        self.filter.reset();
        self.stillness.reset();
        self.extremum.reset();
        self.threshold.reset();
        self.prev_magnitude = 0.0;
        self.time_of_this_peak = 0;
        self.time_of_last_peak = 0;
        self.last_step_time_ms = 0;
        self.step_count = 0;
    }

    /// Serialize the full engine state so a host can persist a counting
    /// session and resume it later.
    pub fn to_json(&self) -> Result<String, DetectError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Restore an engine from a snapshot produced by [`to_json`](Self::to_json).
    pub fn from_json(json: &str) -> Result<Self, DetectError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Drive the detector so the smoothed magnitude follows `targets`
    /// exactly, by inverting the per-axis filter on the z axis.
    fn drive(detector: &mut StepDetector, targets: &[(u64, f64)]) -> Vec<StepEvent> {
        let alpha = detector.config().smoothing_alpha;
        let mut prev = 0.0;
        let mut events = Vec::new();
        for &(timestamp_ms, target) in targets {
            let raw = (target - alpha * prev) / (1.0 - alpha);
            if let Some(event) = detector.ingest(&[0.0, 0.0, raw], timestamp_ms).unwrap() {
                events.push(event);
            }
            prev = target;
        }
        events
    }

    /// 2s of flat gravity followed by a z-axis sinusoid, sampled at 50 Hz.
    fn walking_samples(amplitude: f64, walk_ms: u64) -> Vec<SampleRecord> {
        let mut samples = Vec::new();
        let mut t = 0u64;
        while t < 2000 {
            samples.push(SampleRecord::new(t, 0.0, 0.0, 9.8));
            t += 20;
        }
        while t < 2000 + walk_ms {
            let phase = (t - 2000) as f64 / 1000.0 * 2.0 * std::f64::consts::PI * 2.0;
            samples.push(SampleRecord::new(t, 0.0, 0.0, 9.8 + amplitude * phase.sin()));
            t += 20;
        }
        samples
    }

    #[test]
    fn accepts_steps_from_sinusoidal_walk() {
        let mut detector = StepDetector::default();
        let samples = walking_samples(3.5, 5000);
        let events = detector.process_batch(&samples);

        // 2 Hz for 5 seconds is ten peaks; the first lands outside the
        // cadence ceiling because no peak preceded it.
        assert!(
            (8..=11).contains(&detector.step_count()),
            "expected ~10 steps, got {}",
            detector.step_count()
        );
        assert_eq!(detector.step_count(), events.last().unwrap().step_count);

        // Peak-valley amplitudes of ~4.7 settle the threshold in the >= 4 band.
        let threshold = detector.current_threshold();
        assert!(
            (1.99..=2.31).contains(&threshold),
            "threshold {} outside expected band",
            threshold
        );
        assert!(!detector.is_still());
    }

    #[test]
    fn malformed_samples_are_rejected_without_mutation() {
        let mut detector = StepDetector::default();
        for i in 0..3u64 {
            let result = detector.ingest(&[1.0, 2.0], i * 20);
            assert!(matches!(result, Err(DetectError::InvalidInput(2))));
        }
        assert_eq!(detector.step_count(), 0);
        assert!((detector.current_threshold() - 1.3).abs() < 1e-12);
        assert!(!detector.is_still());

        // The rejected samples must not have primed the filter: the engine
        // behaves exactly like a fresh one on the same valid stream.
        let samples = walking_samples(3.5, 3000);
        let dirty = detector.process_batch(&samples);
        let fresh = StepDetector::default().process_batch(&samples);
        assert_eq!(dirty, fresh);
    }

    #[test]
    fn peaks_closer_than_cadence_floor_count_once() {
        let mut detector = StepDetector::default();
        let events = drive(
            &mut detector,
            &[
                (400, 5.0),
                (450, 6.0),
                (500, 7.0),
                (550, 6.5), // peak, interval 550ms: accepted
                (600, 5.5),
                (650, 5.0),
                (700, 6.0),
                (750, 7.0),
                (800, 6.0), // peak, interval 250ms: too fast
            ],
        );
        assert_eq!(detector.step_count(), 1);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp_ms, 550);
        assert!((events[0].amplitude - 2.0).abs() < 1e-9);
    }

    #[test]
    fn peak_beyond_cadence_ceiling_never_counts() {
        let mut detector = StepDetector::default();
        drive(
            &mut detector,
            &[
                (400, 5.0),
                (450, 6.0),
                (500, 7.0),
                (550, 6.5), // accepted
                (600, 5.5),
                (650, 5.0),
                (2700, 6.0),
                (2750, 7.0),
                (2800, 6.5), // peak, interval 2250ms: broken cadence
            ],
        );
        assert_eq!(detector.step_count(), 1);
        // The broken-cadence amplitude still feeds the history, but with
        // fewer than four entries the threshold itself is untouched.
        assert!((detector.current_threshold() - 1.3).abs() < 1e-12);
    }

    #[test]
    fn amplitude_below_threshold_is_rejected() {
        let mut detector = StepDetector::default();
        let events = drive(
            &mut detector,
            &[
                (400, 5.5),
                (450, 5.2),
                (500, 5.0),
                (550, 5.1),
                (600, 5.3),
                (650, 5.5),
                (700, 5.4), // peak of amplitude 0.5, below the 1.3 floor
            ],
        );
        assert!(events.is_empty());
        assert_eq!(detector.step_count(), 0);
    }

    #[test]
    fn stillness_suppresses_detection() {
        let mut detector = StepDetector::default();
        let mut t = 0u64;
        while t <= 5000 {
            detector.ingest(&[0.0, 0.0, 9.8], t).unwrap();
            t += 20;
        }
        assert!(detector.is_still());
        assert_eq!(detector.step_count(), 0);

        // Large oscillation: no step may be accepted while the stillness
        // state has not yet cleared.
        for i in 0..40u64 {
            t += 20;
            let z = if i % 2 == 0 { 18.0 } else { 2.0 };
            let was_still = detector.is_still();
            let event = detector.ingest(&[0.0, 0.0, z], t).unwrap();
            if was_still {
                assert!(event.is_none());
                assert_eq!(detector.step_count(), 0);
            }
        }
        assert!(!detector.is_still(), "oscillation should clear stillness");
    }

    #[test]
    fn counter_is_monotonic_over_noisy_input() {
        let mut detector = StepDetector::default();
        let mut seed = 0x2545f491u64;
        let mut last_count = 0;
        for i in 0..2000u64 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let noise = ((seed >> 33) as f64 / (1u64 << 31) as f64 - 0.5) * 8.0;
            detector.ingest(&[0.3, -0.2, 9.8 + noise], i * 20).unwrap();
            assert!(detector.step_count() >= last_count);
            last_count = detector.step_count();
        }
    }

    #[test]
    fn reset_restores_a_fresh_engine() {
        let samples = walking_samples(3.5, 4000);

        let mut detector = StepDetector::default();
        detector.process_batch(&samples);
        assert!(detector.step_count() > 0);

        detector.reset();
        assert_eq!(detector.step_count(), 0);
        assert!((detector.current_threshold() - 1.3).abs() < 1e-12);
        assert!(!detector.is_still());

        // Replaying the identical stream must reproduce a fresh engine's
        // events exactly.
        let replayed = detector.process_batch(&samples);
        let fresh = StepDetector::default().process_batch(&samples);
        assert_eq!(replayed, fresh);
    }

    #[test]
    fn snapshot_restores_detection_behavior() {
        let samples = walking_samples(3.5, 6000);
        let (first_half, second_half) = samples.split_at(samples.len() / 2);

        let mut original = StepDetector::default();
        original.process_batch(first_half);

        let snapshot = original.to_json().unwrap();
        let mut restored = StepDetector::from_json(&snapshot).unwrap();
        assert_eq!(restored.step_count(), original.step_count());

        let original_events = original.process_batch(second_half);
        let restored_events = restored.process_batch(second_half);
        assert_eq!(original_events, restored_events);
    }

    #[test]
    fn batch_processing_skips_malformed_records() {
        let mut detector = StepDetector::default();
        let mut samples = walking_samples(3.5, 5000);
        samples.insert(
            30,
            SampleRecord {
                timestamp_ms: 600,
                accel: vec![1.0],
            },
        );
        let events = detector.process_batch(&samples);
        assert!(!events.is_empty());
        assert_eq!(detector.step_count(), events.last().unwrap().step_count);
    }

    #[test]
    fn step_event_reports_the_threshold_that_validated_it() {
        let mut detector = StepDetector::default();

        // Six step cycles of amplitude 6.0, one peak every 400ms. The first
        // four accepted amplitudes only fill the history; the fifth
        // acceptance recomputes the threshold into the >= 4 band.
        let mut targets = vec![(300u64, 5.0)];
        let mut t = 300u64;
        for _ in 0..6 {
            for value in [8.0, 11.0, 8.0, 5.0] {
                t += 100;
                targets.push((t, value));
            }
        }
        let events = drive(&mut detector, &targets);

        assert_eq!(events.len(), 6);
        for event in &events[..5] {
            assert!((event.threshold - 1.3).abs() < 1e-12);
        }
        // The fifth step was validated against 1.3 even though its own
        // amplitude pushed the engine threshold to 2.3; the sixth sees the
        // recomputed value.
        assert!((events[5].threshold - 2.3).abs() < 1e-12);
        assert!((detector.current_threshold() - 2.3).abs() < 1e-12);
    }

    #[test]
    fn out_of_order_timestamps_do_not_panic() {
        let mut detector = StepDetector::default();
        let timestamps = [1000u64, 900, 950, 1100, 800, 1200];
        for (i, &t) in timestamps.iter().enumerate() {
            let z = 9.8 + if i % 2 == 0 { 2.0 } else { -2.0 };
            detector.ingest(&[0.0, 0.0, z], t).unwrap();
        }
    }

    #[test]
    fn custom_tuning_is_honored() {
        let config = DetectorConfig {
            min_step_interval_ms: 100,
            ..DetectorConfig::default()
        };
        let mut detector = StepDetector::new(config);
        let events = drive(
            &mut detector,
            &[
                (400, 5.0),
                (450, 6.0),
                (500, 7.0),
                (550, 6.5),
                (600, 5.5),
                (650, 5.0),
                (700, 6.0),
                (750, 7.0),
                (800, 6.0), // interval 250ms passes the relaxed floor
            ],
        );
        assert_eq!(events.len(), 2);
        assert_eq!(detector.step_count(), 2);
    }
}

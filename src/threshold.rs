//! Adaptive threshold stage
//!
//! Maintains a short rolling history of validated peak-valley amplitudes and
//! re-derives the acceptance threshold from their mean through a fixed band
//! map. Banding instead of a continuous formula keeps the threshold from
//! chasing every stride-to-stride wobble.

use serde::{Deserialize, Serialize};

/// Rolling amplitude history driving the step acceptance threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveThreshold {
    history: Vec<f64>,
    capacity: usize,
    initial: f64,
    min: f64,
    max: f64,
    value: f64,
}

impl AdaptiveThreshold {
    pub fn new(initial: f64, min: f64, max: f64, capacity: usize) -> Self {
        Self {
            history: Vec::with_capacity(capacity),
            capacity,
            initial,
            min,
            max,
            value: initial,
        }
    }

    /// Current threshold, always within the configured [min, max] range.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Feed one peak-valley amplitude into the history.
    ///
    /// While the history is still filling, the amplitude is only recorded.
    /// Once full, the mean of the stored amplitudes picks a new threshold
    /// level from the band map, the result is clamped, and the history
    /// slides forward by one slot.
    pub fn update(&mut self, amplitude: f64) {
        if self.history.len() < self.capacity {
            self.history.push(amplitude);
            return;
        }

        let mean: f64 = self.history.iter().sum::<f64>() / self.history.len() as f64;
        self.value = Self::band(mean).clamp(self.min, self.max);

        self.history.remove(0);
        self.history.push(amplitude);
    }

    /// Amplitude band map. Levels above the clamp range are intentional:
    /// they pin the threshold at max for vigorous gaits.
    fn band(mean: f64) -> f64 {
        if mean >= 8.0 {
            4.3
        } else if mean >= 7.0 {
            3.3
        } else if mean >= 4.0 {
            2.3
        } else if mean >= 3.0 {
            2.0
        } else {
            1.3
        }
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.value = self.initial;
    }
}

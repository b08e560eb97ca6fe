//! Stillness stage
//!
//! Rolling-variance classifier that decides whether the device is resting.
//! While the device is judged still, the detector short-circuits and no
//! peak can be accepted, which keeps pocket jostle and table vibration from
//! trickling into the step count.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Motion/rest classifier over a fixed-capacity magnitude window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StillnessMonitor {
    window: VecDeque<f64>,
    capacity: usize,
    variance_threshold: f64,
    stillness_time_ms: u64,
    last_movement_ms: u64,
    still: bool,
}

impl StillnessMonitor {
    pub fn new(capacity: usize, variance_threshold: f64, stillness_time_ms: u64) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            variance_threshold,
            stillness_time_ms,
            last_movement_ms: 0,
            still: false,
        }
    }

    /// Feed one smoothed magnitude and return whether the device is now
    /// classified as still.
    ///
    /// Classification is deferred (treated as moving) until the window has
    /// filled; there is not enough history to judge variance before that.
    /// Once full, sustained low variance for at least the configured
    /// stillness time transitions to "still"; any variance spike records a
    /// movement and transitions back immediately.
    pub fn update(&mut self, magnitude: f64, timestamp_ms: u64) -> bool {
        self.window.push_back(magnitude);
        while self.window.len() > self.capacity {
            self.window.pop_front();
        }

        if self.window.len() < self.capacity {
            return self.still;
        }

        let mean: f64 = self.window.iter().sum::<f64>() / self.window.len() as f64;
        let variance: f64 = self
            .window
            .iter()
            .map(|v| (v - mean) * (v - mean))
            .sum::<f64>()
            / self.window.len() as f64;

        if variance < self.variance_threshold {
            if timestamp_ms.saturating_sub(self.last_movement_ms) > self.stillness_time_ms {
                self.still = true;
            }
        } else {
            self.last_movement_ms = timestamp_ms;
            self.still = false;
        }

        self.still
    }

    pub fn is_still(&self) -> bool {
        self.still
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.last_movement_ms = 0;
        self.still = false;
    }
}

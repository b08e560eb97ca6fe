//! Filter stage
//!
//! Per-axis exponential smoothing followed by magnitude computation. The
//! heavy history weighting (α = 0.8 by default) suppresses high-frequency
//! sensor noise before the signal reaches the extremum tracker.

use serde::{Deserialize, Serialize};

/// Per-axis low-pass filter producing a smoothed magnitude scalar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LowPassFilter {
    alpha: f64,
    filtered: [f64; 3],
}

impl LowPassFilter {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            filtered: [0.0; 3],
        }
    }

    /// Smooth one 3-axis sample and return the Euclidean norm of the
    /// filtered vector.
    pub fn apply(&mut self, raw: [f64; 3]) -> f64 {
        for (filtered, component) in self.filtered.iter_mut().zip(raw) {
            *filtered = self.alpha * *filtered + (1.0 - self.alpha) * component;
        }
        (self.filtered[0] * self.filtered[0]
            + self.filtered[1] * self.filtered[1]
            + self.filtered[2] * self.filtered[2])
            .sqrt()
    }

    pub fn reset(&mut self) {
        self.filtered = [0.0; 3];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_is_attenuated_from_zero_state() {
        let mut filter = LowPassFilter::new(0.8);
        // filtered = 0.8 * 0 + 0.2 * raw
        let magnitude = filter.apply([0.0, 0.0, 10.0]);
        assert!((magnitude - 2.0).abs() < 1e-12);
    }

    #[test]
    fn constant_input_converges_to_its_magnitude() {
        let mut filter = LowPassFilter::new(0.8);
        let mut magnitude = 0.0;
        for _ in 0..200 {
            magnitude = filter.apply([3.0, 0.0, 4.0]);
        }
        assert!((magnitude - 5.0).abs() < 1e-6);
    }

    #[test]
    fn smoothing_attenuates_alternating_noise() {
        let mut filter = LowPassFilter::new(0.8);
        // Warm up on the baseline, then alternate +/-1 around it.
        for _ in 0..100 {
            filter.apply([0.0, 0.0, 9.8]);
        }
        let mut min = f64::MAX;
        let mut max = f64::MIN;
        for i in 0..50 {
            let z = if i % 2 == 0 { 10.8 } else { 8.8 };
            let magnitude = filter.apply([0.0, 0.0, z]);
            min = min.min(magnitude);
            max = max.max(magnitude);
        }
        // Raw swing is 2.0; the filtered swing must be well under half that.
        assert!(max - min < 1.0, "swing {} not attenuated", max - min);
    }

    #[test]
    fn reset_returns_to_zero_state() {
        let mut filter = LowPassFilter::new(0.8);
        filter.apply([1.0, 2.0, 3.0]);
        filter.reset();
        let magnitude = filter.apply([0.0, 0.0, 10.0]);
        assert!((magnitude - 2.0).abs() < 1e-12);
    }
}

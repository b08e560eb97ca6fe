//! Peak/valley stage
//!
//! Local-extremum tracker over the smoothed magnitude signal. Direction-run
//! counting makes the tracker robust to single-sample jitter: a rise only
//! qualifies as the front of a genuine peak if it lasted at least two
//! consecutive samples.

use serde::{Deserialize, Serialize};

/// Extremum confirmed by the tracker on one sample transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extremum {
    Peak,
    Valley,
}

/// Direction-run tracker producing confirmed peaks and valleys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtremumTracker {
    rising: bool,
    run_length: u32,
    ended_run_length: u32,
    peak: f64,
    valley: f64,
}

impl Default for ExtremumTracker {
    fn default() -> Self {
        Self {
            rising: false,
            run_length: 0,
            ended_run_length: 0,
            peak: 0.0,
            valley: 0.0,
        }
    }
}

impl ExtremumTracker {
    /// Feed the current and previous magnitudes and report whether this
    /// transition confirmed an extremum.
    ///
    /// A peak fires on the rising-to-falling transition when the rising run
    /// that just ended covered at least two samples; the peak value is the
    /// previous magnitude (the local maximum itself). A valley is the mirror
    /// transition with no run-length guard.
    pub fn update(&mut self, new: f64, old: f64) -> Option<Extremum> {
        let was_rising = self.rising;

        if new >= old {
            self.rising = true;
            self.run_length += 1;
        } else {
            self.ended_run_length = self.run_length;
            self.run_length = 0;
            self.rising = false;
        }

        if !self.rising && was_rising && self.ended_run_length >= 2 {
            self.peak = old;
            Some(Extremum::Peak)
        } else if self.rising && !was_rising {
            self.valley = old;
            Some(Extremum::Valley)
        } else {
            None
        }
    }

    /// Value of the most recently confirmed peak.
    pub fn peak(&self) -> f64 {
        self.peak
    }

    /// Value of the most recently recorded valley.
    pub fn valley(&self) -> f64 {
        self.valley
    }

    /// Clear run state and stored extrema. Called when the device goes
    /// still, so a stale partial rise cannot be misread as a step once
    /// movement resumes.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

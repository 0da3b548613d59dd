//! # One-Pole Lowpass
//!
//! Sits on the feedback path of [`SimpleDelay`](crate::effects::delay::SimpleDelay)
//! so each trip around the loop loses a little more top end, the way tape
//! and bucket-brigade echoes do.
//!
//! Written as a leaky integrator that moves a fraction of the way from its
//! last output towards the input:
//!
//! ```text
//! y[n] = x[n] + pole * (y[n-1] - x[n])
//! pole = e^(-2π * cutoff / sample_rate)
//! ```
//!
//! A pole of 0 is a wire. The slope is 6 dB/octave, gentle next to a
//! [`Biquad`](super::biquad::Biquad)'s 12.

use std::f32::consts::TAU;

/// Cutoffs below this push the pole too close to 1.
const MIN_CUTOFF_HZ: f32 = 20.0;

/// Single-channel 6 dB/octave lowpass.
#[derive(Debug, Clone, Default)]
pub struct OnePoleFilter {
    pole: f32,
    /// Last output.
    state: f32,
}

impl OnePoleFilter {
    /// A filter that passes audio through until a cutoff is set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the cutoff. Values outside `[20 Hz, 0.49 * sample_rate]` are
    /// pulled back into that range.
    pub fn set_cutoff(&mut self, cutoff_hz: f32, sample_rate: f32) {
        let cutoff = cutoff_hz.min(sample_rate * 0.49).max(MIN_CUTOFF_HZ);
        self.pole = (-TAU * cutoff / sample_rate).exp();
    }

    /// Turn the filter back into a wire. Its history is kept.
    pub fn set_passthrough(&mut self) {
        self.pole = 0.0;
    }

    pub fn is_passthrough(&self) -> bool {
        self.pole == 0.0
    }

    /// Filter one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.state = input + self.pole * (self.state - input);
        self.state
    }

    pub fn reset(&mut self) {
        self.state = 0.0;
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────

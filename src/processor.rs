//! # The Processor Lifecycle
//!
//! Every unit in this crate follows the same three-call contract that a
//! plugin shell or test harness drives:
//!
//! 1. `prepare(sample_rate, num_channels)` once the audio configuration is
//!    known, and again whenever it changes. This is the only place memory is
//!    allocated. All time-based state (write pointers, LFO phase, filter
//!    registers) starts from zero afterwards.
//! 2. `process(buffer)` once per audio block. The buffer is a slice of
//!    per-channel sample slices, transformed in place. This is the shape
//!    nih-plug's `Buffer::as_slice()` returns, so a plugin can hand its
//!    buffer straight through.
//! 3. `reset()` when playback stops: silence the history without
//!    reallocating.

use crate::error::DspResult;

/// A per-sample audio transform with a prepare/process lifecycle.
pub trait Processor {
    /// Allocate state for `num_channels` channels at `sample_rate` Hz.
    fn prepare(&mut self, sample_rate: f32, num_channels: usize) -> DspResult<()>;

    /// Transform `buffer` in place.
    ///
    /// Must be real-time safe: no allocation, no locking, no logging.
    /// Channels beyond the prepared count are left untouched.
    fn process(&mut self, buffer: &mut [&mut [f32]]);

    /// Clear audio history (delay buffers, filter memory).
    fn reset(&mut self);
}

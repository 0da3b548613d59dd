//! Error types shared by every processor in the crate.
//!
//! Errors are only ever produced by configuration calls (`configure`,
//! `prepare`) and parameter setters. `process()` never fails: a unit that
//! rejected its last parameter update keeps running on its previous valid
//! state, or passes audio through untouched (filters), until a valid update
//! arrives.

use thiserror::Error;

/// Everything that can go wrong while configuring a DSP unit.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DspError {
    /// The unit can't be built with the requested sizes or sample rate.
    /// Fatal for that instance until it is reconfigured.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: &'static str },

    /// The audio buffer layout doesn't match what the unit supports.
    #[error("channel mismatch: expected {expected} channel(s), got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },

    /// A delay request that doesn't fit inside the allocated history.
    #[error("delay of {requested} samples is out of range (max {max})")]
    DelayOutOfRange { requested: f32, max: f32 },

    /// A filter parameter that would produce unstable or undefined
    /// coefficients (Q <= 0, frequency at or above Nyquist, ...).
    #[error("invalid filter parameter `{name}`: {value}")]
    InvalidFilterParameter { name: &'static str, value: f32 },

    /// Any other control value outside its documented range.
    #[error("invalid parameter `{name}`: {value}")]
    InvalidParameter { name: &'static str, value: f32 },
}

/// Result type for configuration and parameter calls.
pub type DspResult<T> = Result<T, DspError>;

/// Checks a sample rate handed to `prepare()`.
pub(crate) fn check_sample_rate(sample_rate: f32) -> DspResult<()> {
    if sample_rate.is_finite() && sample_rate > 0.0 {
        Ok(())
    } else {
        Err(DspError::InvalidConfiguration {
            reason: "sample rate must be positive and finite",
        })
    }
}

/// Checks a channel count handed to `prepare()`.
pub(crate) fn check_channels(num_channels: usize) -> DspResult<()> {
    if num_channels == 0 {
        Err(DspError::InvalidConfiguration {
            reason: "at least one channel is required",
        })
    } else {
        Ok(())
    }
}

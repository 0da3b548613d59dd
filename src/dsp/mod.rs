//! # DSP Primitives
//!
//! The two engines everything else in the crate is built from, plus the
//! small filters that ride along with them:
//!
//! - **`delay_line`**: a multichannel ring buffer with fractional,
//!   linearly interpolated reads. Every echo, chorus and pitch shifter in
//!   [`crate::effects`] is one of these with a different rule for choosing
//!   the read delay.
//!
//! - **`biquad`**: Audio EQ Cookbook coefficient design and the
//!   second-order recurrence in three structural forms.
//!
//! - **`allpass`**: first-order and nested all-pass sections for phase
//!   rotation.
//!
//! - **`one_pole`**: the one-pole lowpass used to darken feedback repeats.
//!
//! - **`interp`**: interpolation and index-wrapping helpers shared by the
//!   above.

pub mod allpass;
pub mod biquad;
pub mod delay_line;
pub mod interp;
pub mod one_pole;

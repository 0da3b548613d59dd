//! # Loveless DSP: Delay Lines and Biquads for Real-Time Audio
//!
//! A library of per-sample audio building blocks written against
//! [nih-plug](https://github.com/robbert-vdh/nih-plug)'s conventions, so any
//! of them can be dropped into a plugin's `process()`. Two engines do the
//! real work:
//!
//! - a **fractional delay line** ([`DelayLine`]): a ring buffer with
//!   interpolated reads, behind every echo, chorus, flanger and pitch
//!   shifter here;
//! - a **biquad** ([`Biquad`]): Audio EQ Cookbook coefficients run through
//!   Direct Form I, Direct Form II or Transposed Direct Form II.
//!
//! Everything implements [`Processor`]: `prepare` allocates, `process`
//! transforms a block in place, `reset` silences history.
//!
//! ## Signal Flow of a Feedback Delay
//!
//! ```text
//! Input ──┬───────────────────────────────── × (1 - mix) ───┐
//!         │                                                 │
//!         └──►(+)──► [DelayLine] ──┬──► × mix ─────────────►(+)──► Output
//!              ▲                   │
//!              │                   ▼
//!              └── × feedback ◄── [OnePoleFilter]
//! ```
//!
//! Modulated delays replace the fixed read delay with an LFO sweep; the
//! pitch shifter replaces it with a constant slide.
//!
//! ## Threading
//!
//! Units are configured through `&mut self` setters, so a unit is owned by
//! one thread at a time. To retune a filter from a control thread while the
//! audio thread runs it, send new [`FilterParams`] through a
//! [`param_channel`] and call [`Biquad::apply_pending`] at the top of each
//! block.

pub mod control;
pub mod dsp;
pub mod effects;
pub mod error;
pub mod params;
pub mod processor;

pub use control::{param_channel, ParamReceiver, ParamSender};
pub use dsp::allpass::{FirstOrderAllpass, NestedAllpass};
pub use dsp::biquad::{Biquad, Coefficients, FilterParams, FilterType, Topology};
pub use dsp::delay_line::DelayLine;
pub use dsp::one_pole::OnePoleFilter;
pub use effects::delay::{DelayTime, SimpleDelay};
pub use effects::echo::{EchoMode, FeedbackEcho, StereoEcho};
pub use effects::modulated::{Lfo, LfoShape, ModulatedDelay};
pub use effects::pitch::PitchShifter;
pub use error::{DspError, DspResult};
pub use processor::Processor;

//! # Delay-Line Pitch Shifter
//!
//! Instead of sweeping the delay back and forth like a vibrato, the pitch
//! shifter slides it in one direction at a constant rate and lets it wrap
//! around the buffer:
//!
//! ```text
//! delay[n + 1] = wrap(delay[n] + delay_rate, span)
//! delay_rate   = 1 - 2^(semitones / 12)
//! ```
//!
//! A read head whose delay shrinks by one sample per sample moves through
//! the history twice as fast as it was recorded: one octave up. Growing by
//! half a sample per sample plays it at half speed: one octave down. The
//! wrap is an audible click once per window; smoothing it (two crossfaded
//! heads) is left to a caller that needs it.
//!
//! Shifting down, the delay grows from wherever it starts, so it is started
//! `span * -delay_rate` samples in (wrapped into the window) to stay away
//! from the point where the read head would pass the write head.

use nih_plug::nih_log;

use crate::dsp::delay_line::DelayLine;
use crate::dsp::interp::wrap_delay;
use crate::error::{check_channels, check_sample_rate, DspError, DspResult};
use crate::params::{ms_to_samples, percent_to_unit, pitch_delay_rate, SEMITONES};
use crate::processor::Processor;

/// Window used when none is given.
pub const DEFAULT_WINDOW_MS: f32 = 50.0;

/// Constant-slew fractional delay that transposes its input.
#[derive(Debug, Clone)]
pub struct PitchShifter {
    /// History the read head slides through. One slot longer than the window.
    line: DelayLine,
    sample_rate: f32,
    /// Window length, turned into samples at `prepare()`.
    window_ms: f32,
    semitones: f32,
    /// `1 - 2^(semitones / 12)`. Negative shifts up, positive shifts down.
    delay_rate: f32,
    /// Current read delay per channel, in samples.
    delays: Vec<f32>,
    /// Dry/wet blend in `[0, 1]`. Fully wet by default.
    mix: f32,
}

impl PitchShifter {
    /// A fully wet shifter transposing by `semitones` (within ±24), over a
    /// [`DEFAULT_WINDOW_MS`] window.
    ///
    /// Nothing is allocated until `prepare()`.
    pub fn new(semitones: f32) -> DspResult<Self> {
        let semitones = SEMITONES.check("semitones", semitones)?;
        Ok(Self {
            line: DelayLine::new(),
            sample_rate: 0.0,
            window_ms: DEFAULT_WINDOW_MS,
            semitones,
            delay_rate: pitch_delay_rate(semitones),
            delays: Vec::new(),
            mix: 1.0,
        })
    }

    /// Shift up by `semitones` (sign ignored).
    pub fn up(semitones: f32) -> DspResult<Self> {
        Self::new(semitones.abs())
    }

    /// Shift down by `semitones` (sign ignored).
    pub fn down(semitones: f32) -> DspResult<Self> {
        Self::new(-semitones.abs())
    }

    /// Current transposition in semitones.
    pub fn semitones(&self) -> f32 {
        self.semitones
    }

    /// Change of read delay per sample.
    pub fn delay_rate(&self) -> f32 {
        self.delay_rate
    }

    /// Change the transposition. Takes effect from the next sample; the read
    /// delays are not restarted, so the head keeps sliding from where it is.
    ///
    /// Outside ±24 semitones (or NaN) is rejected and the old shift kept.
    pub fn set_semitones(&mut self, semitones: f32) -> DspResult<()> {
        self.semitones = SEMITONES.check("semitones", semitones)?;
        self.delay_rate = pitch_delay_rate(self.semitones);
        Ok(())
    }

    /// Length of the sliding window. Takes effect at the next `prepare`.
    pub fn set_window_ms(&mut self, ms: f32) -> DspResult<()> {
        if !ms.is_finite() || !(1.0..=1000.0).contains(&ms) {
            return Err(DspError::InvalidParameter {
                name: "window_ms",
                value: ms,
            });
        }
        self.window_ms = ms;
        Ok(())
    }

    /// Dry/wet blend as a percentage in `[0, 100]`.
    pub fn set_mix(&mut self, percent: f32) -> DspResult<()> {
        self.mix = percent_to_unit("mix", percent)?;
        Ok(())
    }

    /// Samples the read delay wraps within.
    pub fn span(&self) -> f32 {
        self.line.max_delay()
    }

    /// The read delay `channel` will use for its next sample, in `[0, span)`.
    ///
    /// # Panics
    /// If `channel` wasn't part of the last `prepare()`, including before
    /// the first one.
    pub fn delay(&self, channel: usize) -> f32 {
        self.delays[channel]
    }

    /// Slot of the history `channel` will write next.
    ///
    /// # Panics
    /// Same as [`delay()`](Self::delay).
    pub fn write_index(&self, channel: usize) -> usize {
        self.line.write_index(channel)
    }

    /// Where the read delay starts after `prepare()` and `reset()`.
    fn initial_delay(&self) -> f32 {
        let span = self.span();
        if self.delay_rate > 0.0 && span > 0.0 {
            wrap_delay(span * -self.delay_rate, span)
        } else {
            0.0
        }
    }
}

impl Processor for PitchShifter {
    fn prepare(&mut self, sample_rate: f32, num_channels: usize) -> DspResult<()> {
        check_sample_rate(sample_rate)?;
        check_channels(num_channels)?;

        let window = ms_to_samples(self.window_ms, sample_rate).ceil() as usize;
        self.line.configure(window.max(1) + 1, num_channels)?;
        self.sample_rate = sample_rate;
        self.delays = vec![self.initial_delay(); num_channels];

        nih_log!(
            "pitch shifter prepared: {sample_rate} Hz, {num_channels} channel(s), {:+} st over {} samples",
            self.semitones,
            self.span()
        );
        Ok(())
    }

    fn process(&mut self, buffer: &mut [&mut [f32]]) {
        let span = self.span();
        let channels = buffer.len().min(self.line.num_channels());

        for (channel, samples) in buffer.iter_mut().take(channels).enumerate() {
            for sample in samples.iter_mut() {
                let input = *sample;

                // Push first so a delay of 0 reads the sample just written.
                self.line.push(channel, input);
                let shifted = self.line.read(channel, self.delays[channel]);

                // Slide the read head. Going up, the delay shrinks past 0
                // and wraps to the far end of the window; going down, it
                // grows past `span` and wraps back to 0. Either way it lands
                // in `[0, span)`.
                self.delays[channel] = wrap_delay(self.delays[channel] + self.delay_rate, span);

                *sample = input * (1.0 - self.mix) + shifted * self.mix;
            }
        }
    }

    fn reset(&mut self) {
        self.line.clear();
        let initial = self.initial_delay();
        self.delays.fill(initial);
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────

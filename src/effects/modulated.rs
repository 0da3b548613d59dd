//! # Modulated Delay (Chorus, Flanger, Vibrato, Barberpole)
//!
//! All four effects are one delay line whose read position is swept by a
//! low-frequency oscillator:
//!
//! ```text
//! delay(t) = predelay + base + depth * shape(2π * rate * t)
//! ```
//!
//! A moving read head plays the stored audio slightly faster or slower
//! than it was recorded, which bends its pitch up and down. Mixed with the
//! dry signal that turns into chorus (10-30 ms, gentle depth) or flanging
//! (1-5 ms, with feedback). Heard on its own (100 % wet) it is vibrato. A
//! sawtooth sweep instead of a sine gives the endlessly rising or falling
//! "barberpole" flanger.
//!
//! Delays here are fractional, so every read is interpolated. The line is
//! written first and read second: a modulated delay of 0 samples returns
//! the current input. Feedback re-enters through the previous sample's
//! wet output.

use std::f32::consts::TAU;

use nih_plug::nih_log;

use super::delay::capacity_for;
use crate::dsp::delay_line::DelayLine;
use crate::error::{check_channels, check_sample_rate, DspError, DspResult};
use crate::params::{
    map_rate, ms_to_samples, percent_to_unit, FEEDBACK_PERCENT, FLANGER_RATE_HZ,
    MODULATION_RATE_HZ,
};
use crate::processor::Processor;

/// LFO waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LfoShape {
    #[default]
    Sine,
    /// `2 * (phase - floor(phase + 0.5))`, a ramp from -1 to 1.
    Sawtooth,
}

impl LfoShape {
    /// Value at `phase` (in cycles), in `[-1, 1]`.
    #[inline]
    pub fn at(self, phase: f32) -> f32 {
        match self {
            LfoShape::Sine => (TAU * phase).sin(),
            LfoShape::Sawtooth => 2.0 * (phase - (phase + 0.5).floor()),
        }
    }
}

/// A phase accumulator driving the modulation.
///
/// The phase is `rate * t` in cycles, advanced by `rate / sample_rate` per
/// sample and kept in `[0, 1)`.
#[derive(Debug, Clone, Default)]
pub struct Lfo {
    /// In cycles, `[0, 1)`.
    phase: f32,
    /// Finite and non-negative.
    rate_hz: f32,
    shape: LfoShape,
}

impl Lfo {
    /// An LFO at phase 0. `rate_hz` is checked like
    /// [`set_rate()`](Self::set_rate).
    pub fn new(shape: LfoShape, rate_hz: f32) -> DspResult<Self> {
        Ok(Self {
            phase: 0.0,
            rate_hz: check_rate(rate_hz)?,
            shape,
        })
    }

    /// Current phase in cycles, in `[0, 1)`.
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Current rate in Hz.
    pub fn rate(&self) -> f32 {
        self.rate_hz
    }

    /// Change the rate, keeping the phase. 0 Hz freezes the sweep.
    ///
    /// A negative or non-finite rate would run the phase backwards or turn
    /// it into NaN, so it is rejected and the old rate kept.
    pub fn set_rate(&mut self, rate_hz: f32) -> DspResult<()> {
        self.rate_hz = check_rate(rate_hz)?;
        Ok(())
    }

    /// Output at the current phase, shifted by `offset` cycles.
    #[inline]
    pub fn value(&self, offset: f32) -> f32 {
        self.shape.at(self.phase + offset)
    }

    /// Step one sample forward at `sample_rate`.
    #[inline]
    pub fn advance(&mut self, sample_rate: f32) {
        self.phase = (self.phase + self.rate_hz / sample_rate).fract();
    }

    /// Back to phase 0.
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}

fn check_rate(rate_hz: f32) -> DspResult<f32> {
    if rate_hz.is_finite() && rate_hz >= 0.0 {
        Ok(rate_hz)
    } else {
        Err(DspError::InvalidParameter {
            name: "rate_hz",
            value: rate_hz,
        })
    }
}

/// An LFO-swept fractional delay with feedback and dry/wet mix.
#[derive(Debug, Clone)]
pub struct ModulatedDelay {
    line: DelayLine,
    /// One oscillator for all channels; spread offsets its phase per channel.
    lfo: Lfo,
    /// 0.0 until `prepare()`.
    sample_rate: f32,
    /// `(slowest, fastest)` in Hz, what 0 % and 100 % rate map to.
    rate_band: (f32, f32),

    /// Longest total delay the line is sized for.
    max_delay_ms: f32,
    /// Centre of the sweep.
    base_ms: f32,
    /// How far the sweep swings either side of the centre.
    depth_ms: f32,
    /// Fixed offset ahead of the sweep.
    predelay_ms: f32,

    /// 0.0 - 0.95
    feedback: f32,
    /// 0.0 - 1.0
    mix: f32,
    /// LFO phase offset between neighbouring channels, in cycles.
    spread: f32,

    /// Previous wet sample per channel, for the feedback path.
    last_wet: Vec<f32>,
}

impl ModulatedDelay {
    /// A modulated delay sized for `max_delay_ms`, sweeping its rate over
    /// `rate_band` (Hz). It starts at the bottom of the band with no delay,
    /// no feedback and an even mix.
    ///
    /// The band must satisfy `0 <= slowest <= fastest`, both finite.
    pub fn new(shape: LfoShape, rate_band: (f32, f32), max_delay_ms: f32) -> DspResult<Self> {
        if !max_delay_ms.is_finite() || max_delay_ms <= 0.0 {
            return Err(DspError::InvalidConfiguration {
                reason: "maximum delay must be positive",
            });
        }
        let (slowest, fastest) = rate_band;
        if !(fastest.is_finite() && (0.0..=fastest).contains(&slowest)) {
            return Err(DspError::InvalidConfiguration {
                reason: "rate band must run from a non-negative rate up to a finite one",
            });
        }
        Ok(Self {
            line: DelayLine::new(),
            lfo: Lfo::new(shape, slowest)?,
            sample_rate: 0.0,
            rate_band,
            max_delay_ms,
            base_ms: 0.0,
            depth_ms: 0.0,
            predelay_ms: 0.0,
            feedback: 0.0,
            mix: 0.5,
            spread: 0.0,
            last_wet: Vec::new(),
        })
    }

    /// Builds a preset from constants already known to be in range.
    fn preset(
        shape: LfoShape,
        band: (f32, f32),
        base_ms: f32,
        depth_ms: f32,
        rate_percent: f32,
        feedback_percent: f32,
        mix_percent: f32,
    ) -> Self {
        Self {
            line: DelayLine::new(),
            lfo: Lfo {
                phase: 0.0,
                rate_hz: map_rate(rate_percent / 100.0, band),
                shape,
            },
            sample_rate: 0.0,
            rate_band: band,
            max_delay_ms: 50.0,
            base_ms,
            depth_ms,
            predelay_ms: 0.0,
            feedback: feedback_percent / 100.0,
            mix: mix_percent / 100.0,
            spread: 0.0,
            last_wet: Vec::new(),
        }
    }

    /// 15 ms ± 5 ms, slow sweep, half wet, quarter-cycle stereo spread.
    pub fn chorus() -> Self {
        let mut c = Self::preset(LfoShape::Sine, MODULATION_RATE_HZ, 15.0, 5.0, 10.0, 0.0, 50.0);
        c.spread = 0.25;
        c
    }

    /// 2.5 ms ± 2 ms with strong feedback, in the narrower flanger band.
    pub fn flanger() -> Self {
        Self::preset(LfoShape::Sine, FLANGER_RATE_HZ, 2.5, 2.0, 5.0, 50.0, 50.0)
    }

    /// 5 ms ± 3 ms, fully wet: pitch wobble without the dry signal.
    pub fn vibrato() -> Self {
        Self::preset(LfoShape::Sine, MODULATION_RATE_HZ, 5.0, 3.0, 50.0, 0.0, 100.0)
    }

    /// Sawtooth-swept flanger.
    pub fn barberpole() -> Self {
        Self::preset(LfoShape::Sawtooth, MODULATION_RATE_HZ, 5.0, 4.0, 2.0, 40.0, 50.0)
    }

    /// The shared oscillator, for inspecting phase and rate.
    pub fn lfo(&self) -> &Lfo {
        &self.lfo
    }

    /// LFO rate as a percentage of the unit's rate band.
    pub fn set_rate(&mut self, percent: f32) -> DspResult<()> {
        let unit = percent_to_unit("rate", percent)?;
        self.lfo.set_rate(map_rate(unit, self.rate_band))
    }

    /// Centre of the sweep. `predelay + base + depth` must fit the maximum
    /// delay; otherwise [`DspError::DelayOutOfRange`] and nothing changes.
    pub fn set_base_delay_ms(&mut self, ms: f32) -> DspResult<()> {
        self.set_times(ms, self.depth_ms, self.predelay_ms)
    }

    /// Swing either side of the centre. Checked like
    /// [`set_base_delay_ms()`](Self::set_base_delay_ms).
    pub fn set_depth_ms(&mut self, ms: f32) -> DspResult<()> {
        self.set_times(self.base_ms, ms, self.predelay_ms)
    }

    /// Fixed offset ahead of the sweep. Checked like
    /// [`set_base_delay_ms()`](Self::set_base_delay_ms).
    pub fn set_predelay_ms(&mut self, ms: f32) -> DspResult<()> {
        self.set_times(self.base_ms, self.depth_ms, ms)
    }

    fn set_times(&mut self, base_ms: f32, depth_ms: f32, predelay_ms: f32) -> DspResult<()> {
        for (name, value) in [
            ("base_delay_ms", base_ms),
            ("depth_ms", depth_ms),
            ("predelay_ms", predelay_ms),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(DspError::InvalidParameter { name, value });
            }
        }

        let peak = predelay_ms + base_ms + depth_ms;
        if peak > self.max_delay_ms {
            return Err(DspError::DelayOutOfRange {
                requested: peak,
                max: self.max_delay_ms,
            });
        }

        self.base_ms = base_ms;
        self.depth_ms = depth_ms;
        self.predelay_ms = predelay_ms;
        Ok(())
    }

    /// Feedback as a percentage, at most 95.
    pub fn set_feedback(&mut self, percent: f32) -> DspResult<()> {
        self.feedback = FEEDBACK_PERCENT.check("feedback", percent)? / 100.0;
        Ok(())
    }

    /// Dry/wet blend as a percentage in `[0, 100]`.
    pub fn set_mix(&mut self, percent: f32) -> DspResult<()> {
        self.mix = percent_to_unit("mix", percent)?;
        Ok(())
    }

    /// LFO phase offset between channels; 100 % is half a cycle.
    pub fn set_stereo_spread(&mut self, percent: f32) -> DspResult<()> {
        self.spread = percent_to_unit("spread", percent)? * 0.5;
        Ok(())
    }

    /// The modulated delay of `channel` at the current LFO phase, in samples.
    /// Clamped to what the line holds; 0 before `prepare()`.
    pub fn current_delay(&self, channel: usize) -> f32 {
        let offset = self.spread * channel as f32;
        let ms = self.predelay_ms + self.base_ms + self.depth_ms * self.lfo.value(offset);
        ms_to_samples(ms, self.sample_rate).clamp(0.0, self.line.max_delay())
    }
}

impl Processor for ModulatedDelay {
    fn prepare(&mut self, sample_rate: f32, num_channels: usize) -> DspResult<()> {
        check_sample_rate(sample_rate)?;
        check_channels(num_channels)?;

        let capacity = capacity_for(self.max_delay_ms / 1000.0, sample_rate);
        self.line.configure(capacity, num_channels)?;
        self.last_wet = vec![0.0; num_channels];
        self.lfo.reset();
        self.sample_rate = sample_rate;

        nih_log!(
            "modulated delay prepared: {sample_rate} Hz, {num_channels} channel(s), {:.2} Hz LFO",
            self.lfo.rate()
        );
        Ok(())
    }

    fn process(&mut self, buffer: &mut [&mut [f32]]) {
        let channels = buffer.len().min(self.line.num_channels());
        let Some(len) = buffer.iter().take(channels).map(|c| c.len()).max() else {
            return;
        };

        // The LFO is shared, so walk the block sample by sample, every
        // channel at the same phase. A channel shorter than the rest simply
        // drops out once it runs out of samples.
        for i in 0..len {
            for (channel, samples) in buffer.iter_mut().take(channels).enumerate() {
                let Some(&input) = samples.get(i) else {
                    continue;
                };
                let delay = self.current_delay(channel);

                self.line
                    .push(channel, input + self.last_wet[channel] * self.feedback);
                let wet = self.line.read(channel, delay);
                self.last_wet[channel] = wet;

                samples[i] = input * (1.0 - self.mix) + wet * self.mix;
            }
            self.lfo.advance(self.sample_rate);
        }
    }

    fn reset(&mut self) {
        self.line.clear();
        self.last_wet.fill(0.0);
        self.lfo.reset();
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────

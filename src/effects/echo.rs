//! # Echoes
//!
//! Two echo structures built on [`DelayLine`]:
//!
//! - [`FeedbackEcho`]: the general comb filter with independent
//!   feedforward and feedback taps,
//!
//!   ```text
//!   y[n] = b0 * x[n] + bM * x[n - dM] - aW * y[n - dW]
//!   ```
//!
//!   It keeps one history of inputs and one of outputs. The feedback path
//!   is a true IIR loop and only decays when `|aW| < 1`.
//!
//! - [`StereoEcho`]: two feedback delays, one per side. In
//!   [`EchoMode::PingPong`] each side's repeats are fed into the *other*
//!   side's line, so echoes bounce left, right, left...

use nih_plug::{nih_log, nih_warn};

use super::delay::{capacity_for, DelayTime};
use crate::dsp::delay_line::DelayLine;
use crate::error::{check_sample_rate, DspError, DspResult};
use crate::params::{percent_to_unit, FEEDBACK_PERCENT, MAX_DELAY_SECONDS};
use crate::processor::Processor;

/// How a [`FeedbackEcho`] tap length was set: as a time, resolved against
/// the sample rate at `prepare()`, or directly in samples.
#[derive(Debug, Clone, Copy, PartialEq)]
enum TapLength {
    Time(DelayTime),
    Samples(f32),
}

impl TapLength {
    fn to_samples(self, sample_rate: f32) -> DspResult<f32> {
        match self {
            TapLength::Time(time) => time.to_samples(sample_rate),
            TapLength::Samples(samples) => Ok(samples),
        }
    }
}

fn check_gain(name: &'static str, value: f32) -> DspResult<f32> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DspError::InvalidParameter { name, value })
    }
}

/// Feedforward plus feedback comb filter.
#[derive(Debug, Clone)]
pub struct FeedbackEcho {
    /// History of `x`, read by the feedforward tap.
    inputs: DelayLine,
    /// History of `y`, read by the feedback tap.
    outputs: DelayLine,
    /// 0.0 until `prepare()`.
    sample_rate: f32,
    max_delay_seconds: f32,

    /// Direct gain.
    b0: f32,
    /// Feedforward tap gain.
    bm: f32,
    /// Feedback tap gain, subtracted.
    aw: f32,

    feedforward_tap: TapLength,
    feedback_tap: TapLength,
    /// dM in samples, >= 0.
    feedforward_samples: f32,
    /// dW in samples, >= 1.
    feedback_samples: f32,
}

impl Default for FeedbackEcho {
    fn default() -> Self {
        Self {
            inputs: DelayLine::new(),
            outputs: DelayLine::new(),
            sample_rate: 0.0,
            max_delay_seconds: MAX_DELAY_SECONDS,
            b0: 1.0,
            bm: 0.5,
            aw: 0.5,
            feedforward_tap: TapLength::Time(DelayTime::Milliseconds(250.0)),
            feedback_tap: TapLength::Time(DelayTime::Milliseconds(500.0)),
            feedforward_samples: 0.0,
            feedback_samples: 1.0,
        }
    }
}

impl FeedbackEcho {
    /// `y[n] = x[n] + 0.5 x[n - 250 ms] - 0.5 y[n - 500 ms]`, with room for
    /// [`MAX_DELAY_SECONDS`] on either tap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Like [`new()`](Self::new) with room for `seconds` on either tap. Both
    /// taps default to 250 ms, or to `seconds` if that is shorter.
    pub fn with_max_delay(seconds: f32) -> DspResult<Self> {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(DspError::InvalidConfiguration {
                reason: "maximum delay must be positive",
            });
        }
        let default_ms = (seconds * 1000.0).min(250.0);
        Ok(Self {
            max_delay_seconds: seconds,
            feedforward_tap: TapLength::Time(DelayTime::Milliseconds(default_ms)),
            feedback_tap: TapLength::Time(DelayTime::Milliseconds(default_ms)),
            ..Self::default()
        })
    }

    /// Set `b0`, `bM` and `aW`.
    ///
    /// `|aW| >= 1` is accepted, but the feedback loop will no longer decay
    /// and may grow without bound; [`is_stable()`](Self::is_stable) reports
    /// it.
    pub fn set_gains(&mut self, b0: f32, bm: f32, aw: f32) -> DspResult<()> {
        let b0 = check_gain("b0", b0)?;
        let bm = check_gain("bm", bm)?;
        let aw = check_gain("aw", aw)?;
        if aw.abs() >= 1.0 {
            nih_warn!("echo feedback gain {aw} is potentially unstable");
        }
        self.b0 = b0;
        self.bm = bm;
        self.aw = aw;
        Ok(())
    }

    /// `(b0, bM, aW)`.
    pub fn gains(&self) -> (f32, f32, f32) {
        (self.b0, self.bm, self.aw)
    }

    /// The feedback loop decays only while `|aW| < 1`.
    pub fn is_stable(&self) -> bool {
        self.aw.abs() < 1.0
    }

    /// Input tap delay `dM`. Zero is allowed.
    pub fn set_feedforward_delay_ms(&mut self, ms: f32) -> DspResult<()> {
        let time = DelayTime::Milliseconds(ms);
        time.check(self.max_delay_seconds)?;
        self.set_taps(TapLength::Time(time), self.feedback_tap)
    }

    /// Output tap delay `dW`. Shorter than one sample is treated as one
    /// sample, since `y[n]` can't feed back into itself.
    pub fn set_feedback_delay_ms(&mut self, ms: f32) -> DspResult<()> {
        let time = DelayTime::Milliseconds(ms);
        time.check(self.max_delay_seconds)?;
        self.set_taps(self.feedforward_tap, TapLength::Time(time))
    }

    /// Input tap delay `dM` in samples, fractional allowed. Kept as a sample
    /// count across later `prepare()` calls, whatever the rate.
    ///
    /// Negative or non-finite counts are rejected. After `prepare()`, so are
    /// counts beyond the unit's maximum delay; before it, that check waits
    /// for `prepare()`.
    pub fn set_feedforward_delay_samples(&mut self, samples: f32) -> DspResult<()> {
        let tap = check_tap_samples(samples)?;
        self.set_taps(tap, self.feedback_tap)
    }

    /// Output tap delay `dW` in samples. Checked like
    /// [`set_feedforward_delay_samples()`](Self::set_feedforward_delay_samples),
    /// then raised to one sample like
    /// [`set_feedback_delay_ms()`](Self::set_feedback_delay_ms).
    pub fn set_feedback_delay_samples(&mut self, samples: f32) -> DspResult<()> {
        let tap = check_tap_samples(samples)?;
        self.set_taps(self.feedforward_tap, tap)
    }

    /// `(dM, dW)` in samples (valid after `prepare()`).
    pub fn delay_samples(&self) -> (f32, f32) {
        (self.feedforward_samples, self.feedback_samples)
    }

    /// Store both taps, or neither. Once prepared, both are resolved to
    /// samples first and the update is dropped if either doesn't fit.
    fn set_taps(&mut self, feedforward: TapLength, feedback: TapLength) -> DspResult<()> {
        if self.sample_rate > 0.0 {
            let (dm, dw) = self.resolve(feedforward, feedback)?;
            self.feedforward_samples = dm;
            self.feedback_samples = dw;
        }
        self.feedforward_tap = feedforward;
        self.feedback_tap = feedback;
        Ok(())
    }

    /// `(dM, dW)` in samples at the current rate, with `dW >= 1`.
    fn resolve(&self, feedforward: TapLength, feedback: TapLength) -> DspResult<(f32, f32)> {
        let max = self.max_delay_seconds * self.sample_rate;
        let fit = |samples: f32| {
            if samples > max {
                Err(DspError::DelayOutOfRange {
                    requested: samples,
                    max,
                })
            } else {
                Ok(samples)
            }
        };

        let dm = fit(feedforward.to_samples(self.sample_rate)?)?;
        let dw = fit(feedback.to_samples(self.sample_rate)?)?.max(1.0);
        Ok((dm, dw))
    }
}

fn check_tap_samples(samples: f32) -> DspResult<TapLength> {
    if samples.is_finite() && samples >= 0.0 {
        Ok(TapLength::Samples(samples))
    } else {
        Err(DspError::InvalidParameter {
            name: "delay_samples",
            value: samples,
        })
    }
}

impl Processor for FeedbackEcho {
    fn prepare(&mut self, sample_rate: f32, num_channels: usize) -> DspResult<()> {
        check_sample_rate(sample_rate)?;

        let capacity = capacity_for(self.max_delay_seconds, sample_rate);
        self.inputs.configure(capacity, num_channels)?;
        self.outputs.configure(capacity, num_channels)?;
        self.sample_rate = sample_rate;
        let (dm, dw) = self.resolve(self.feedforward_tap, self.feedback_tap)?;
        self.feedforward_samples = dm;
        self.feedback_samples = dw;

        nih_log!(
            "feedback echo prepared: {sample_rate} Hz, {num_channels} channel(s), {capacity} samples"
        );
        Ok(())
    }

    fn process(&mut self, buffer: &mut [&mut [f32]]) {
        let channels = buffer.len().min(self.inputs.num_channels());
        let (dm, dw) = (self.feedforward_samples, self.feedback_samples - 1.0);

        for (channel, samples) in buffer.iter_mut().take(channels).enumerate() {
            for sample in samples.iter_mut() {
                let x = *sample;

                // Input history includes x[n], so dM = 0 reads x[n] itself.
                self.inputs.push(channel, x);
                let x_delayed = self.inputs.read(channel, dm);

                // Output history ends at y[n-1]; read before writing y[n].
                let y_delayed = self.outputs.read(channel, dw);

                let y = self.b0 * x + self.bm * x_delayed - self.aw * y_delayed;
                self.outputs.push(channel, y);
                *sample = y;
            }
        }
    }

    fn reset(&mut self) {
        self.inputs.clear();
        self.outputs.clear();
    }
}

/// How the two sides of a [`StereoEcho`] feed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EchoMode {
    /// Each side repeats into itself.
    #[default]
    Independent,
    /// Each side repeats into the opposite side.
    PingPong,
}

/// A two-channel feedback delay with separate left and right times.
#[derive(Debug, Clone)]
pub struct StereoEcho {
    /// Channel 0 is left, channel 1 right.
    line: DelayLine,
    /// 0.0 until `prepare()`.
    sample_rate: f32,
    max_delay_seconds: f32,
    mode: EchoMode,

    /// Left and right delay times as set.
    times: [DelayTime; 2],
    /// Per side, in samples, at least one.
    delay_samples: [f32; 2],

    /// Feedback gain in `[0, 0.95]`.
    feedback: f32,
    /// Dry/wet blend in `[0, 1]`.
    mix: f32,
}

impl Default for StereoEcho {
    fn default() -> Self {
        Self {
            line: DelayLine::new(),
            sample_rate: 0.0,
            max_delay_seconds: MAX_DELAY_SECONDS,
            mode: EchoMode::default(),
            times: [DelayTime::Milliseconds(375.0), DelayTime::Milliseconds(500.0)],
            delay_samples: [1.0; 2],
            feedback: FEEDBACK_PERCENT.default / 100.0,
            mix: 0.5,
        }
    }
}

impl StereoEcho {
    /// A 375 ms / 500 ms echo with 40 % feedback and an even mix.
    pub fn new(mode: EchoMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Shorthand for `new(EchoMode::PingPong)`.
    pub fn ping_pong() -> Self {
        Self::new(EchoMode::PingPong)
    }

    pub fn mode(&self) -> EchoMode {
        self.mode
    }

    /// Switch routing. Repeats already in the lines keep their side and
    /// follow the new routing from their next trip.
    pub fn set_mode(&mut self, mode: EchoMode) {
        self.mode = mode;
    }

    /// Delay times of the left and right lines.
    pub fn set_delay_times(&mut self, left: DelayTime, right: DelayTime) -> DspResult<()> {
        left.check(self.max_delay_seconds)?;
        right.check(self.max_delay_seconds)?;
        self.times = [left, right];
        self.resolve_delays()
    }

    /// Free-running left and right times, in milliseconds.
    pub fn set_delay_ms(&mut self, left_ms: f32, right_ms: f32) -> DspResult<()> {
        self.set_delay_times(
            DelayTime::Milliseconds(left_ms),
            DelayTime::Milliseconds(right_ms),
        )
    }

    /// Left and right delays in samples (valid after `prepare()`).
    pub fn delay_samples(&self) -> [f32; 2] {
        self.delay_samples
    }

    /// Feedback as a percentage, at most 95 so repeats always die out.
    pub fn set_feedback(&mut self, percent: f32) -> DspResult<()> {
        self.feedback = FEEDBACK_PERCENT.check("feedback", percent)? / 100.0;
        Ok(())
    }

    /// Dry/wet blend as a percentage in `[0, 100]`.
    pub fn set_mix(&mut self, percent: f32) -> DspResult<()> {
        self.mix = percent_to_unit("mix", percent)?;
        Ok(())
    }

    fn resolve_delays(&mut self) -> DspResult<()> {
        if self.sample_rate > 0.0 {
            for (samples, time) in self.delay_samples.iter_mut().zip(&self.times) {
                *samples = time.to_samples(self.sample_rate)?.max(1.0);
            }
        }
        Ok(())
    }
}

impl Processor for StereoEcho {
    fn prepare(&mut self, sample_rate: f32, num_channels: usize) -> DspResult<()> {
        check_sample_rate(sample_rate)?;
        if num_channels != 2 {
            return Err(DspError::ChannelMismatch {
                expected: 2,
                actual: num_channels,
            });
        }

        let capacity = capacity_for(self.max_delay_seconds, sample_rate);
        self.line.configure(capacity, 2)?;
        self.sample_rate = sample_rate;
        self.resolve_delays()?;

        nih_log!("stereo echo ({:?}) prepared: {sample_rate} Hz", self.mode);
        Ok(())
    }

    fn process(&mut self, buffer: &mut [&mut [f32]]) {
        if self.line.num_channels() != 2 {
            return;
        }
        // Extra channels beyond the first two are left alone.
        let [left, right, ..] = buffer else {
            return;
        };

        // Reading before pushing, the newest sample is already one sample
        // old, so a delay of `d` reads `d - 1` back.
        let read_left = self.delay_samples[0] - 1.0;
        let read_right = self.delay_samples[1] - 1.0;

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let (in_l, in_r) = (*l, *r);

            // 1. READ both sides.
            let delayed_l = self.line.read(0, read_left);
            let delayed_r = self.line.read(1, read_right);

            // 2. ROUTE the repeats. Ping-pong swaps them, so what just came
            //    out on the left goes back in on the right.
            let (return_l, return_r) = match self.mode {
                EchoMode::Independent => (delayed_l, delayed_r),
                EchoMode::PingPong => (delayed_r, delayed_l),
            };
            // 3. WRITE input plus the scaled repeat.
            self.line.push(0, in_l + return_l * self.feedback);
            self.line.push(1, in_r + return_r * self.feedback);

            // 4. MIX each side with what it just read.
            *l = in_l * (1.0 - self.mix) + delayed_l * self.mix;
            *r = in_r * (1.0 - self.mix) + delayed_r * self.mix;
        }
    }

    fn reset(&mut self) {
        self.line.clear();
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────

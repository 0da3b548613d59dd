//! # Simple Delay
//!
//! The classic feedback delay, with an optional lowpass on the feedback
//! path so that each repeat comes back a little darker.
//!
//! ```text
//! Input ──┬────────────────────────────────────── × (1 - mix) ──┐
//!         │                                                     │
//!         └──►(+)──► [Delay Line] ──┬──► [Lowpass] ─► × feedback ┐
//!              ▲                    │                            │
//!              └────────────────────│────────────────────────────┘
//!                                   └──── × mix ───────────────►(+)──► Output
//! ```
//!
//! The delay time is either free (milliseconds) or tempo-synced, in which
//! case it is truncated to whole samples: `floor((60 / bpm) * beats * sr)`.
//!
//! Per sample and channel, the delayed value is read *before* the new one
//! is written, so a delay of `d` returns the line input from `d` samples
//! ago. The shortest delay is therefore one sample.

use nih_plug::nih_log;

use crate::dsp::delay_line::DelayLine;
use crate::dsp::one_pole::OnePoleFilter;
use crate::error::{check_channels, check_sample_rate, DspError, DspResult};
use crate::params::{
    ms_to_samples, percent_to_unit, tempo_to_samples, DAMPING_HZ, DELAY_TIME_MS,
    FEEDBACK_PERCENT, MAX_DELAY_SECONDS, TEMPO_BPM,
};
use crate::processor::Processor;

/// How a delay time is specified.
///
/// Kept in musical or physical units rather than samples, so the same
/// setting survives a sample-rate change: the unit converts it again in
/// `prepare()`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DelayTime {
    /// Free time, 0 - 2000 ms.
    Milliseconds(f32),
    /// `note_division` in beats: 1.0 is a quarter note, 0.5 an eighth.
    Tempo { bpm: f32, note_division: f32 },
}

impl DelayTime {
    /// Length in seconds, independent of the sample rate.
    pub fn seconds(&self) -> f32 {
        match *self {
            DelayTime::Milliseconds(ms) => ms / 1000.0,
            DelayTime::Tempo { bpm, note_division } => 60.0 / bpm * note_division,
        }
    }

    /// Length in samples at `sample_rate`. Tempo-synced times are whole
    /// samples; free times may be fractional.
    pub fn to_samples(&self, sample_rate: f32) -> DspResult<f32> {
        match *self {
            DelayTime::Milliseconds(ms) => Ok(ms_to_samples(ms, sample_rate)),
            DelayTime::Tempo { bpm, note_division } => {
                tempo_to_samples(bpm, note_division, sample_rate).map(|s| s as f32)
            }
        }
    }

    /// Check the time is well formed and no longer than `max_seconds`.
    ///
    /// Milliseconds must lie in [`DELAY_TIME_MS`]; tempo needs a BPM in
    /// [`TEMPO_BPM`] and a positive note division. Either way the result
    /// has to fit the unit's history, otherwise
    /// [`DspError::DelayOutOfRange`] (reported in milliseconds).
    pub(crate) fn check(&self, max_seconds: f32) -> DspResult<()> {
        match *self {
            DelayTime::Milliseconds(ms) => {
                DELAY_TIME_MS.check("delay_ms", ms)?;
            }
            DelayTime::Tempo { bpm, note_division } => {
                TEMPO_BPM.check("bpm", bpm)?;
                if !note_division.is_finite() || note_division <= 0.0 {
                    return Err(DspError::InvalidParameter {
                        name: "note_division",
                        value: note_division,
                    });
                }
            }
        }

        // Both forms must also fit the history the unit allocated.
        let seconds = self.seconds();
        if seconds > max_seconds {
            return Err(DspError::DelayOutOfRange {
                requested: seconds * 1000.0,
                max: max_seconds * 1000.0,
            });
        }
        Ok(())
    }
}

/// Ring buffer length that holds `max_seconds` at `sample_rate`, plus the
/// slot the interpolating read needs.
pub(crate) fn capacity_for(max_seconds: f32, sample_rate: f32) -> usize {
    (max_seconds * sample_rate).ceil() as usize + 2
}

/// A feedback delay with dry/wet mix and feedback damping.
#[derive(Debug, Clone)]
pub struct SimpleDelay {
    /// One ring buffer per channel, sized in `prepare()` for
    /// `max_delay_seconds`.
    line: DelayLine,
    /// One lowpass per channel. Independent filters keep the stereo image
    /// intact: a repeat on the left never leaks into the right's filter.
    dampers: Vec<OnePoleFilter>,
    /// 0.0 until `prepare()`; setters only store times until then.
    sample_rate: f32,
    /// Fixed at construction, since it decides the allocation.
    max_delay_seconds: f32,

    delay_time: DelayTime,
    /// `delay_time` at the current sample rate, at least one sample.
    delay_samples: f32,

    /// 0.0 - 0.95
    feedback: f32,
    /// 0.0 - 1.0
    mix: f32,
    /// `None` leaves repeats as bright as the input.
    damping_hz: Option<f32>,
}

impl Default for SimpleDelay {
    fn default() -> Self {
        Self {
            line: DelayLine::new(),
            dampers: Vec::new(),
            sample_rate: 0.0,
            max_delay_seconds: MAX_DELAY_SECONDS,
            delay_time: DelayTime::Milliseconds(500.0),
            delay_samples: 1.0,
            feedback: FEEDBACK_PERCENT.default / 100.0,
            mix: 0.5,
            damping_hz: Some(DAMPING_HZ.default),
        }
    }
}

impl SimpleDelay {
    /// 500 ms, 40 % feedback, half wet, damped at 8 kHz, with 2.1 s of
    /// history.
    pub fn new() -> Self {
        Self::default()
    }

    /// A delay that can hold up to `seconds` of audio.
    pub fn with_max_delay(seconds: f32) -> DspResult<Self> {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(DspError::InvalidConfiguration {
                reason: "maximum delay must be positive",
            });
        }
        Ok(Self {
            max_delay_seconds: seconds,
            delay_time: DelayTime::Milliseconds((seconds * 1000.0).min(500.0)),
            ..Self::default()
        })
    }

    /// The delay as it was set, in its own units.
    pub fn delay_time(&self) -> DelayTime {
        self.delay_time
    }

    /// The current delay in samples (valid after `prepare()`).
    pub fn delay_samples(&self) -> f32 {
        self.delay_samples
    }

    /// Free delay time in milliseconds.
    pub fn set_delay_ms(&mut self, ms: f32) -> DspResult<()> {
        self.set_delay_time(DelayTime::Milliseconds(ms))
    }

    /// Tempo-synced delay: `note_division` beats at `bpm`.
    pub fn set_tempo(&mut self, bpm: f32, note_division: f32) -> DspResult<()> {
        self.set_delay_time(DelayTime::Tempo { bpm, note_division })
    }

    /// Set the delay in either form.
    ///
    /// Rejected times leave the previous delay in effect. Before
    /// `prepare()` the time is only stored; its sample count is worked out
    /// once the sample rate is known. Anything shorter than one sample is
    /// raised to one sample, since the repeat can't arrive before the
    /// input that caused it.
    pub fn set_delay_time(&mut self, time: DelayTime) -> DspResult<()> {
        time.check(self.max_delay_seconds)?;
        self.delay_time = time;
        if self.sample_rate > 0.0 {
            self.delay_samples = time.to_samples(self.sample_rate)?.max(1.0);
        }
        Ok(())
    }

    /// Feedback in percent, 0 - 95.
    pub fn set_feedback(&mut self, percent: f32) -> DspResult<()> {
        self.feedback = FEEDBACK_PERCENT.check("feedback", percent)? / 100.0;
        Ok(())
    }

    /// Dry/wet mix in percent.
    pub fn set_mix(&mut self, percent: f32) -> DspResult<()> {
        self.mix = percent_to_unit("mix", percent)?;
        Ok(())
    }

    /// Lowpass cutoff on the feedback path, or `None` for undamped repeats.
    pub fn set_damping(&mut self, cutoff_hz: Option<f32>) -> DspResult<()> {
        if let Some(hz) = cutoff_hz {
            DAMPING_HZ.check("damping_hz", hz)?;
        }
        self.damping_hz = cutoff_hz;
        self.apply_damping();
        Ok(())
    }

    fn apply_damping(&mut self) {
        for damper in &mut self.dampers {
            match self.damping_hz {
                Some(hz) => damper.set_cutoff(hz, self.sample_rate),
                None => damper.set_passthrough(),
            }
        }
    }

    /// How many samples of echo tail follow the input going silent.
    ///
    /// Each repeat is `feedback` times the previous one, so after `N`
    /// repeats the level is `feedback^N`. Solving `feedback^N = 0.001`
    /// (-60 dB) gives `N = -3 / log10(feedback)`.
    pub fn tail_samples(&self) -> u32 {
        if self.feedback > 0.001 {
            let repeats = -3.0 / self.feedback.log10();
            (repeats * self.delay_samples) as u32
        } else {
            self.delay_samples as u32
        }
    }
}

impl Processor for SimpleDelay {
    fn prepare(&mut self, sample_rate: f32, num_channels: usize) -> DspResult<()> {
        check_sample_rate(sample_rate)?;
        check_channels(num_channels)?;

        let capacity = capacity_for(self.max_delay_seconds, sample_rate);
        self.line.configure(capacity, num_channels)?;
        self.dampers = vec![OnePoleFilter::new(); num_channels];
        self.sample_rate = sample_rate;
        self.apply_damping();
        self.delay_samples = self.delay_time.to_samples(sample_rate)?.max(1.0);

        nih_log!(
            "simple delay prepared: {sample_rate} Hz, {num_channels} channel(s), {capacity} samples"
        );
        Ok(())
    }

    fn process(&mut self, buffer: &mut [&mut [f32]]) {
        let channels = buffer.len().min(self.line.num_channels());
        let read_delay = self.delay_samples - 1.0;

        for (channel, samples) in buffer.iter_mut().take(channels).enumerate() {
            let damper = &mut self.dampers[channel];
            for sample in samples.iter_mut() {
                let input = *sample;

                // 1. READ before writing. The newest sample in the line is
                //    from the previous step, so `d - 1` back from it is the
                //    line input from exactly `d` samples ago.
                let delayed = self.line.read(channel, read_delay);

                // 2. DAMP and SCALE the repeat. Every trip round the loop
                //    passes through the lowpass again, so the fifth repeat
                //    is filtered five times and sounds darker than the
                //    first. Feedback <= 0.95 makes each trip quieter.
                let feedback = damper.process(delayed) * self.feedback;

                // 3. WRITE input plus repeat. This recursion is what turns
                //    one echo into echoes of echoes.
                self.line.push(channel, input + feedback);

                // 4. MIX dry and wet. The wet side is the undamped read:
                //    damping only colours what goes back into the loop.
                *sample = input * (1.0 - self.mix) + delayed * self.mix;
            }
        }
    }

    fn reset(&mut self) {
        self.line.clear();
        for damper in &mut self.dampers {
            damper.reset();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────

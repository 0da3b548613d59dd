//! # Delay Line (Ring Buffer)
//!
//! A delay line stores recent audio samples and lets you read them back
//! after a specified time delay. Every time-based unit in this crate
//! (simple delay, echoes, chorus/flanger/vibrato, pitch shifting) is built
//! on it.
//!
//! ## How a Ring Buffer Works
//!
//! Picture a circular tape loop. A write head records incoming audio onto
//! the tape and a read head plays it back from a point further behind.
//! The distance between the two heads is the delay time.
//!
//! In code the "tape" is a `Vec<f32>` per channel and the write head is an
//! index. Per sample and channel:
//!
//! 1. [`push()`](DelayLine::push) stores the sample at `write_index` and
//!    advances `write_index` by one, wrapping to 0 at `capacity`.
//! 2. [`pop()`](DelayLine::pop) reads back the sample pushed `delay`
//!    steps before the most recent one.
//!
//! That ordering (push, then pop) means a delay of 0 returns the sample
//! that was just written, and a delay of `d` returns the input from `d`
//! samples ago. Units with a feedback path need the delayed value *before*
//! they can compute what to write; they read with `delay - 1` first and
//! push afterwards, which gives the same `x[n - d]`.
//!
//! ## Linear Interpolation
//!
//! When the delay isn't a whole number of samples (441.3 samples is a
//! 10.007 ms delay at 44100 Hz) we blend the two neighbouring samples:
//!
//! ```text
//! result = sample_a * (1 - frac) + sample_b * frac
//! ```
//!
//! For a delay of 441.3, `sample_a` sits 441 samples back (weight 0.7) and
//! `sample_b` 442 samples back (weight 0.3). Because `sample_b` is one step
//! further back than the whole-sample delay, the largest usable delay is
//! `capacity - 1`: both neighbours must still be inside the history.

use nih_plug::nih_debug_assert;

use super::interp::{lerp, split_delay};
use crate::error::{DspError, DspResult};

/// A multichannel ring buffer with a shared delay setting.
///
/// Memory is allocated once in [`configure()`](Self::configure). Changing
/// the delay never allocates; only the read position moves.
#[derive(Debug, Clone, Default)]
pub struct DelayLine {
    /// One history buffer per channel, each `capacity` samples long.
    buffers: Vec<Vec<f32>>,

    /// Per-channel index of the next slot to be written.
    write_index: Vec<usize>,

    capacity: usize,

    /// Delay used by [`pop()`](Self::pop), in (fractional) samples.
    delay: f32,
}

impl DelayLine {
    /// An empty, unconfigured delay line.
    pub fn new() -> Self {
        Self::default()
    }

    /// A delay line already configured for `capacity` samples and
    /// `num_channels` channels.
    pub fn with_capacity(capacity: usize, num_channels: usize) -> DspResult<Self> {
        let mut line = Self::new();
        line.configure(capacity, num_channels)?;
        Ok(line)
    }

    /// Allocate `num_channels` buffers of `capacity` samples each, filled with
    /// silence. Resets write positions and the delay to zero.
    pub fn configure(&mut self, capacity: usize, num_channels: usize) -> DspResult<()> {
        if capacity == 0 {
            return Err(DspError::InvalidConfiguration {
                reason: "delay line capacity must be at least one sample",
            });
        }
        if num_channels == 0 {
            return Err(DspError::InvalidConfiguration {
                reason: "delay line needs at least one channel",
            });
        }

        self.buffers = vec![vec![0.0; capacity]; num_channels];
        self.write_index = vec![0; num_channels];
        self.capacity = capacity;
        self.delay = 0.0;
        Ok(())
    }

    /// Number of samples each channel can hold. Zero until configured.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of independent histories. Zero until configured, which is
    /// what lets the effect front-ends skip processing on an unprepared
    /// line.
    pub fn num_channels(&self) -> usize {
        self.buffers.len()
    }

    /// The longest delay that can be read without aliasing: `capacity - 1`.
    pub fn max_delay(&self) -> f32 {
        self.capacity.saturating_sub(1) as f32
    }

    /// The delay currently used by [`pop()`](Self::pop).
    pub fn delay(&self) -> f32 {
        self.delay
    }

    /// Index of the slot `channel` will write next.
    ///
    /// After `N` pushes since the last `configure()` or `clear()`, this is
    /// `N % capacity`.
    ///
    /// # Panics
    /// If `channel >= num_channels()`, including on a line that was never
    /// configured.
    pub fn write_index(&self, channel: usize) -> usize {
        self.write_index[channel]
    }

    /// Set the delay used by [`pop()`](Self::pop).
    ///
    /// Accepts `0 <= samples <= max_delay()`. Anything else is rejected with
    /// [`DspError::DelayOutOfRange`] and the previous delay stays in effect.
    pub fn set_delay(&mut self, samples: f32) -> DspResult<()> {
        let max = self.max_delay();
        if !(0.0..=max).contains(&samples) {
            return Err(DspError::DelayOutOfRange {
                requested: samples,
                max,
            });
        }

        self.delay = samples;
        Ok(())
    }

    /// Store `sample` for `channel` and advance its write position.
    ///
    /// # Panics
    /// If `channel >= num_channels()`.
    #[inline]
    pub fn push(&mut self, channel: usize, sample: f32) {
        let index = self.write_index[channel];
        self.buffers[channel][index] = sample;
        self.write_index[channel] = (index + 1) % self.capacity;
    }

    /// Read `channel` at the current delay.
    ///
    /// Returns silence for a channel that doesn't exist, like
    /// [`read()`](Self::read).
    #[inline]
    pub fn pop(&self, channel: usize) -> f32 {
        self.read(channel, self.delay)
    }

    /// Read `channel` at an explicit (fractional) delay.
    ///
    /// # Arguments
    ///
    /// * `channel` - Which history to read. A channel that was never
    ///   configured reads as silence (and trips a debug assertion), so a
    ///   unit driven before `prepare()` stays quiet instead of panicking.
    /// * `delay_samples` - How far back to look, measured from the most
    ///   recently pushed sample. Clamped to `[0, max_delay()]`; NaN reads
    ///   the newest sample.
    ///
    /// # How the index math works
    ///
    /// The newest sample is at `write_index - 1`. To step `N` further back on
    /// a ring of `C` slots without going negative:
    ///
    /// ```text
    /// index_a = (write_index + C - 1 - N) % C
    /// index_b = (index_a + C - 1) % C
    /// ```
    ///
    /// Example: `write_index = 5`, `N = 10`, `C = 100` gives
    /// `index_a = 94`, which is 10 steps behind slot 4 (the newest sample).
    /// `index_b = 93` is the next-older neighbour the fraction blends
    /// towards.
    ///
    /// Adding `C` before subtracting keeps the arithmetic in `usize`:
    /// `N <= C - 1`, so `write_index + C - 1 - N` is never negative.
    #[inline]
    pub fn read(&self, channel: usize, delay_samples: f32) -> f32 {
        nih_debug_assert!(
            channel < self.buffers.len(),
            "read from unconfigured delay line channel {}",
            channel
        );
        let Some(buffer) = self.buffers.get(channel) else {
            return 0.0;
        };

        // A NaN delay would turn into a garbage index; treat it as "now".
        let delay = if delay_samples.is_nan() {
            0.0
        } else {
            delay_samples.clamp(0.0, self.max_delay())
        };
        let (delay_int, delay_frac) = split_delay(delay);

        let capacity = self.capacity;
        let index_a = (self.write_index[channel] + capacity - 1 - delay_int) % capacity;
        let index_b = (index_a + capacity - 1) % capacity;

        // frac = 0 returns sample_a exactly, so whole-sample delays are
        // bit-exact copies of the input.
        lerp(buffer[index_a], buffer[index_b], delay_frac)
    }

    /// Clear all history to silence and reset write positions. Keeps the
    /// allocation and the delay setting.
    pub fn clear(&mut self) {
        for buffer in &mut self.buffers {
            buffer.fill(0.0);
        }
        self.write_index.fill(0);
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn mono(capacity: usize) -> DelayLine {
        DelayLine::with_capacity(capacity, 1).unwrap()
    }

    #[test]
    fn test_configure_rejects_empty_sizes() {
        assert!(matches!(
            DelayLine::with_capacity(0, 1),
            Err(DspError::InvalidConfiguration { .. })
        ));
        assert!(matches!(
            DelayLine::with_capacity(16, 0),
            Err(DspError::InvalidConfiguration { .. })
        ));
    }

    /// With a delay of zero, pop() right after push() gives back exactly
    /// what was pushed.
    #[test]
    fn test_zero_delay_is_identity() {
        let mut dl = mono(8);
        for x in [0.75, -0.25, 1.0, 0.125, 3.5, -2.0, 0.0, 9.0, 4.0, 5.0] {
            dl.push(0, x);
            assert_eq!(dl.pop(0), x);
        }
    }

    #[test]
    fn test_write_and_read_exact() {
        let mut dl = mono(100);
        dl.push(0, 0.75);
        dl.push(0, 0.0);

        let result = dl.read(0, 1.0);
        assert!((result - 0.75).abs() < 1e-6, "Expected 0.75, got {result}");
    }

    #[test]
    fn test_interpolation() {
        let mut dl = mono(100);
        dl.push(0, 0.0);
        dl.push(0, 1.0);

        // 0.5 samples back sits halfway between the newest (1.0) and the
        // one before it (0.0).
        let result = dl.read(0, 0.5);
        assert!((result - 0.5).abs() < 1e-6, "Expected 0.5, got {result}");
    }

    /// Writing C + k samples into a ring of C slots and reading any d < C
    /// returns the sample pushed d steps before the newest.
    #[test]
    fn test_wrap_around_every_delay() {
        let capacity = 7;
        for extra in 0..(2 * capacity) {
            let mut dl = mono(capacity);
            let total = capacity + extra;
            for i in 0..total {
                dl.push(0, i as f32);
            }
            for d in 0..capacity {
                let expected = (total - 1 - d) as f32;
                let got = dl.read(0, d as f32);
                assert_eq!(got, expected, "capacity {capacity}, {total} writes, delay {d}");
            }
        }
    }

    /// For a rising sequence, a fractional read must land between its two
    /// neighbouring whole-sample reads.
    #[test]
    fn test_interpolation_bounds_monotonic_input() {
        let mut dl = mono(64);
        for i in 0..100 {
            dl.push(0, (i as f32).sqrt());
        }

        for n in 0..62 {
            let newer = dl.read(0, n as f32);
            let older = dl.read(0, (n + 1) as f32);
            for f in [0.1, 0.25, 0.5, 0.75, 0.9] {
                let value = dl.read(0, n as f32 + f);
                assert!(
                    value <= newer && value >= older,
                    "delay {n}+{f}: {value} not within [{older}, {newer}]"
                );
            }
        }
    }

    #[test]
    fn test_set_delay_range() {
        let mut dl = mono(100);
        assert!(dl.set_delay(99.0).is_ok());
        assert_eq!(dl.delay(), 99.0);

        assert_eq!(
            dl.set_delay(100.0),
            Err(DspError::DelayOutOfRange {
                requested: 100.0,
                max: 99.0
            })
        );
        assert!(dl.set_delay(-1.0).is_err());
        assert!(dl.set_delay(f32::NAN).is_err());
        // Rejected requests keep the previous delay.
        assert_eq!(dl.delay(), 99.0);
    }

    #[test]
    fn test_channels_are_independent() {
        let mut dl = DelayLine::with_capacity(10, 2).unwrap();
        dl.set_delay(2.0).unwrap();
        for i in 0..5 {
            dl.push(0, i as f32);
            dl.push(1, -(i as f32) * 10.0);
        }
        assert_eq!(dl.pop(0), 2.0);
        assert_eq!(dl.pop(1), -20.0);
    }

    /// An unconfigured line has no history to read from and answers with
    /// silence on every channel.
    #[test]
    fn test_unconfigured_reads_are_silent() {
        let dl = DelayLine::new();
        assert_eq!(dl.num_channels(), 0);
        assert_eq!(dl.pop(0), 0.0);
        assert_eq!(dl.read(3, 10.0), 0.0);

        let stereo = DelayLine::with_capacity(8, 2).unwrap();
        assert_eq!(stereo.read(2, 1.0), 0.0);
    }

    #[test]
    #[should_panic]
    fn test_write_index_of_missing_channel_panics() {
        DelayLine::new().write_index(0);
    }

    #[test]
    fn test_write_index_wraps() {
        let mut dl = mono(4);
        for _ in 0..6 {
            dl.push(0, 1.0);
        }
        assert_eq!(dl.write_index(0), 2);
    }

    #[test]
    fn test_clear() {
        let mut dl = mono(10);
        dl.push(0, 0.5);
        dl.clear();

        assert_eq!(dl.write_index(0), 0);
        for d in 0..10 {
            assert_eq!(dl.read(0, d as f32), 0.0, "Expected silence after clear");
        }
    }

    /// The 1-second scenario: a 2.0 pushed after 24000 ones comes out
    /// exactly 24000 samples later.
    #[test]
    fn test_half_capacity_delay_scenario() {
        let mut dl = DelayLine::with_capacity(48000, 1).unwrap();
        dl.set_delay(24000.0).unwrap();

        for _ in 0..24000 {
            dl.push(0, 1.0);
        }
        dl.push(0, 2.0);
        assert_eq!(dl.pop(0), 1.0, "24001st pop should still read the ones");

        let mut seen_two_at = None;
        for i in 1..=24000 {
            dl.push(0, 0.0);
            if dl.pop(0) == 2.0 {
                seen_two_at = Some(i);
                break;
            }
        }
        assert_eq!(seen_two_at, Some(24000));
    }
}

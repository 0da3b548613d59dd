//! # Parameters and Unit Conversions
//!
//! Every setter in this crate takes physically meaningful units: Hz, dB,
//! percent (0-100), milliseconds, semitones or BPM. This module holds the
//! ranges those setters accept and the conversions from those units into
//! the sample-domain values the DSP code actually works with.
//!
//! Each [`ParamRange`] plays the role of one knob declaration: a minimum, a
//! maximum and a sensible default. There is no smoothing or automation
//! here; a setter either accepts a value or rejects it.

use nih_plug::util;

use crate::error::{DspError, DspResult};

/// The accepted range and default of one control.
///
/// Think of it as the declaration of a knob on a hardware unit: where it
/// stops at each end, and where it sits when the unit is switched on.
/// Unlike a plugin parameter there is no smoothing and no normalised
/// 0-1 mapping; setters receive the value in its own unit and either
/// accept it ([`check`](Self::check)) or pull it into range
/// ([`clamp`](Self::clamp)).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    /// Smallest accepted value, inclusive.
    pub min: f32,
    /// Largest accepted value, inclusive.
    pub max: f32,
    /// Value a freshly built unit starts with. Also what
    /// [`clamp`](Self::clamp) returns for NaN.
    pub default: f32,
}

impl ParamRange {
    /// Declare a range. `const` so ranges can live in `pub const` items.
    pub const fn new(min: f32, max: f32, default: f32) -> Self {
        Self { min, max, default }
    }

    /// Whether `value` is finite and lies in `[min, max]`.
    ///
    /// NaN and the infinities are never contained: a NaN compares false
    /// against both bounds, so it has to be excluded explicitly.
    pub fn contains(&self, value: f32) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }

    /// Pull `value` into `[min, max]`.
    ///
    /// `f32::clamp` would pass NaN straight through, and a NaN that reaches
    /// a delay or filter state poisons every sample after it, so NaN maps
    /// to the default instead.
    ///
    /// ```text
    /// FEEDBACK_PERCENT.clamp(120.0) == 95.0
    /// FEEDBACK_PERCENT.clamp(NaN)   == 40.0
    /// ```
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            self.default
        } else {
            value.clamp(self.min, self.max)
        }
    }

    /// Return `value` unchanged if it lies in range, otherwise an
    /// [`DspError::InvalidParameter`] naming the control.
    pub fn check(&self, name: &'static str, value: f32) -> DspResult<f32> {
        if self.contains(value) {
            Ok(value)
        } else {
            Err(DspError::InvalidParameter { name, value })
        }
    }
}

/// Percent-style controls (mix, depth, rate amount).
pub const PERCENT: ParamRange = ParamRange::new(0.0, 100.0, 50.0);

/// Feedback amount in percent. Capped below 100 % so repeats always decay.
pub const FEEDBACK_PERCENT: ParamRange = ParamRange::new(0.0, 95.0, 40.0);

/// Free-running delay time, in milliseconds. Every millisecond-based
/// [`DelayTime`](crate::effects::delay::DelayTime) is checked against it,
/// on top of each unit's own maximum.
pub const DELAY_TIME_MS: ParamRange = ParamRange::new(0.0, 2000.0, 500.0);

/// Cutoff of the one-pole damping filter on feedback paths.
pub const DAMPING_HZ: ParamRange = ParamRange::new(20.0, 20000.0, 8000.0);

/// Tempo for tempo-synced delays.
pub const TEMPO_BPM: ParamRange = ParamRange::new(20.0, 999.0, 120.0);

/// Gain of peaking and shelving filters, in dB.
pub const FILTER_GAIN_DB: ParamRange = ParamRange::new(-48.0, 48.0, 0.0);

/// Pitch shift amount.
pub const SEMITONES: ParamRange = ParamRange::new(-24.0, 24.0, 0.0);

/// Headroom allocated for delay-based units, in seconds. Covers the longest
/// delay time plus a margin.
pub const MAX_DELAY_SECONDS: f32 = 2.1;

/// LFO rate band shared by chorus, vibrato and barberpole.
pub const MODULATION_RATE_HZ: (f32, f32) = (0.1, 10.0);

/// The narrower band the flanger sweeps in.
pub const FLANGER_RATE_HZ: (f32, f32) = (0.1, 5.0);

/// Milliseconds to (fractional) samples: `ms * sample_rate / 1000`.
///
/// The most common conversion in time-based DSP. At 44.1 kHz:
///
/// ```text
///   10 ms ->   441 samples
///  500 ms -> 22050 samples
/// 2000 ms -> 88200 samples
/// ```
///
/// The result is usually fractional (10.007 ms is 441.3 samples), which is
/// why the delay line reads with interpolation.
pub fn ms_to_samples(ms: f32, sample_rate: f32) -> f32 {
    ms * sample_rate / 1000.0
}

/// Percent (0-100) to a unit value (0-1), rejecting anything outside
/// 0-100 with an error that names the control.
pub fn percent_to_unit(name: &'static str, percent: f32) -> DspResult<f32> {
    PERCENT.check(name, percent).map(|p| p / 100.0)
}

/// Tempo-synced delay length in whole samples.
///
/// `note_division` is measured in beats: 1.0 is a quarter note at the given
/// tempo, 0.5 an eighth, 0.75 a dotted eighth. The result is truncated,
/// never rounded: `floor((60 / bpm) * note_division * sample_rate)`.
pub fn tempo_to_samples(bpm: f32, note_division: f32, sample_rate: f32) -> DspResult<usize> {
    let bpm = TEMPO_BPM.check("bpm", bpm)?;
    if !note_division.is_finite() || note_division <= 0.0 {
        return Err(DspError::InvalidParameter {
            name: "note_division",
            value: note_division,
        });
    }

    Ok(((60.0 / bpm) * note_division * sample_rate).floor() as usize)
}

/// Map a unit value (0-1) linearly into `[min_hz, max_hz]`.
///
/// Rate knobs are presented as 0-100 %; the band they cover depends on
/// the effect. Half way on the flanger band (0.1-5 Hz) is 2.55 Hz.
pub fn map_rate(unit: f32, (min_hz, max_hz): (f32, f32)) -> f32 {
    min_hz + unit * (max_hz - min_hz)
}

/// Playback speed ratio for a pitch shift: `2^(semitones / 12)`.
///
/// Twelve semitones make an octave, and an octave doubles the frequency,
/// so +12 is 2.0, -12 is 0.5 and +7 (a fifth) is about 1.498.
pub fn semitones_to_ratio(semitones: f32) -> f32 {
    2.0_f32.powf(semitones / 12.0)
}

/// How much a pitch shifter's delay changes per sample: `1 - 2^(semitones / 12)`.
///
/// Negative for upward shifts (the read head catches up with the write
/// head), positive for downward shifts (it falls behind).
pub fn pitch_delay_rate(semitones: f32) -> f32 {
    1.0 - semitones_to_ratio(semitones)
}

/// The cookbook's `A = 10^(gain_db / 40)`, the square root of the linear gain.
///
/// `db_to_gain` computes `10^(db / 20)`; halving the dB value first gives
/// the `/ 40` exponent. The square root appears because a peaking or
/// shelving biquad splits its gain between the numerator (`* A`) and the
/// denominator (`/ A`).
pub fn db_to_amplitude_a(gain_db: f32) -> f32 {
    util::db_to_gain(gain_db / 2.0)
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ms_to_samples() {
        assert!((ms_to_samples(500.0, 44100.0) - 22050.0).abs() < 1e-3);
        assert!((ms_to_samples(10.007, 44100.0) - 441.3087).abs() < 1e-2);
    }

    #[test]
    fn test_percent_normalises_and_rejects() {
        assert!((percent_to_unit("mix", 25.0).unwrap() - 0.25).abs() < 1e-6);
        assert!(percent_to_unit("mix", 101.0).is_err());
        assert!(percent_to_unit("mix", -1.0).is_err());
        assert!(percent_to_unit("mix", f32::NAN).is_err());
    }

    /// 60 / 140 * 44100 = 18900.000.. and 60 / 130 * 44100 = 20353.846..
    /// The second one must truncate, not round up to 20354.
    #[test]
    fn test_tempo_truncates() {
        assert_eq!(tempo_to_samples(120.0, 1.0, 48000.0).unwrap(), 24000);
        assert_eq!(tempo_to_samples(130.0, 1.0, 44100.0).unwrap(), 20353);
        assert_eq!(tempo_to_samples(120.0, 0.5, 48000.0).unwrap(), 12000);
        assert!(tempo_to_samples(0.0, 1.0, 48000.0).is_err());
        assert!(tempo_to_samples(120.0, 0.0, 48000.0).is_err());
    }

    #[test]
    fn test_rate_mapping_covers_band() {
        assert!((map_rate(0.0, MODULATION_RATE_HZ) - 0.1).abs() < 1e-6);
        assert!((map_rate(1.0, MODULATION_RATE_HZ) - 10.0).abs() < 1e-6);
        assert!((map_rate(0.5, FLANGER_RATE_HZ) - 2.55).abs() < 1e-6);
    }

    #[test]
    fn test_pitch_rate_signs() {
        assert!(pitch_delay_rate(0.0).abs() < 1e-6);
        assert!((pitch_delay_rate(12.0) + 1.0).abs() < 1e-6);
        assert!((pitch_delay_rate(-12.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_amplitude_a() {
        assert!((db_to_amplitude_a(0.0) - 1.0).abs() < 1e-6);
        // 40 dB of gain is a factor of 100, so A = 10.
        assert!((db_to_amplitude_a(40.0) - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_range_clamp_and_check() {
        assert_eq!(FEEDBACK_PERCENT.clamp(120.0), 95.0);
        assert_eq!(FEEDBACK_PERCENT.clamp(f32::NAN), 40.0);
        assert!(FEEDBACK_PERCENT.check("feedback", 96.0).is_err());
        assert_eq!(FEEDBACK_PERCENT.check("feedback", 50.0), Ok(50.0));
    }
}

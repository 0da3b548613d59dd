//! # All-Pass Sections
//!
//! All-pass filters leave the magnitude of every frequency alone and only
//! rotate its phase. On their own they are inaudible; mixed with the dry
//! signal, cascaded, or placed in feedback loops they become phasers,
//! dispersion and reverb diffusion.
//!
//! - [`FirstOrderAllpass`]: `H(z) = (g + z^-1) / (1 + g z^-1)`.
//! - [`NestedAllpass`]: a first-order lattice all-pass whose delay element
//!   is followed by a second first-order all-pass. Substituting an all-pass
//!   for the delay of an all-pass keeps the whole thing all-pass, so the
//!   result has unity gain everywhere with a steeper phase curve.
//!
//! Both run fine with `|g| < 1`; larger coefficients are rejected.

use std::f32::consts::PI;

use crate::error::{check_channels, check_sample_rate, DspError, DspResult};
use crate::processor::Processor;

fn check_gain(name: &'static str, value: f32) -> DspResult<f32> {
    if value.is_finite() && value.abs() < 1.0 {
        Ok(value)
    } else {
        Err(DspError::InvalidFilterParameter { name, value })
    }
}

/// Per-channel memory of one first-order section.
#[derive(Debug, Clone, Copy, Default)]
struct SectionState {
    x1: f32,
    y1: f32,
}

/// A multichannel first-order all-pass.
#[derive(Debug, Clone, Default)]
pub struct FirstOrderAllpass {
    g: f32,
    states: Vec<SectionState>,
}

impl FirstOrderAllpass {
    /// A section with coefficient `g`, which must lie inside `(-1, 1)`.
    pub fn new(g: f32) -> DspResult<Self> {
        Ok(Self {
            g: check_gain("g", g)?,
            states: Vec::new(),
        })
    }

    /// The coefficient that puts the -90° phase point at `frequency`.
    ///
    /// ```text
    /// t = tan(π * frequency / sample_rate)
    /// g = (t - 1) / (t + 1)
    /// ```
    pub fn coefficient_for(frequency: f32, sample_rate: f32) -> DspResult<f32> {
        if !frequency.is_finite() || frequency <= 0.0 || frequency >= sample_rate / 2.0 {
            return Err(DspError::InvalidFilterParameter {
                name: "frequency",
                value: frequency,
            });
        }
        let t = (PI * frequency / sample_rate).tan();
        Ok((t - 1.0) / (t + 1.0))
    }

    pub fn coefficient(&self) -> f32 {
        self.g
    }

    /// Change `g`. Out-of-range values are rejected and the old one kept.
    pub fn set_coefficient(&mut self, g: f32) -> DspResult<()> {
        self.g = check_gain("g", g)?;
        Ok(())
    }

    /// Filter one sample of `channel`.
    ///
    /// # Panics
    /// If `channel` is beyond the prepared channel count.
    #[inline]
    pub fn process_sample(&mut self, x: f32, channel: usize) -> f32 {
        let state = &mut self.states[channel];
        // y[n] = g x[n] + x[n-1] - g y[n-1]
        let y = self.g * x + state.x1 - self.g * state.y1;
        state.x1 = x;
        state.y1 = y;
        y
    }
}

impl Processor for FirstOrderAllpass {
    fn prepare(&mut self, sample_rate: f32, num_channels: usize) -> DspResult<()> {
        check_sample_rate(sample_rate)?;
        check_channels(num_channels)?;
        self.states = vec![SectionState::default(); num_channels];
        Ok(())
    }

    fn process(&mut self, buffer: &mut [&mut [f32]]) {
        let channels = buffer.len().min(self.states.len());
        for (channel, samples) in buffer.iter_mut().take(channels).enumerate() {
            for sample in samples.iter_mut() {
                *sample = self.process_sample(*sample, channel);
            }
        }
    }

    fn reset(&mut self) {
        self.states.fill(SectionState::default());
    }
}

/// The two registers of the nested structure.
#[derive(Debug, Clone, Copy, Default)]
struct NestedState {
    /// Outer section's delayed internal node.
    prev_w: f32,
    /// Inner section's state.
    prev_v: f32,
}

/// Two first-order all-pass sections, the inner one sitting inside the
/// outer one's delay path. Per sample:
///
/// ```text
/// v     = prev_w - g2 * prev_v
/// inner = g2 * v + prev_v
/// w     = x - g1 * inner
/// y     = g1 * w + inner
/// ```
///
/// The outer section's delay becomes `z^-1 * A2(z)`, with
/// `A2(z) = (g2 + z^-1) / (1 + g2 z^-1)` the inner section. That delay is
/// itself all-pass, so the whole has unity magnitude at every frequency for
/// any `|g1|, |g2| < 1`, and `y[0] = g1`.
///
/// Not to be confused with the three-register form
/// `y = x + g2 * prev_v`, `v = prev_w1 - g2 * prev_v`, `w1 = x - g1 * prev_w2`,
/// whose response `1 + g2 z^-2 / ((1 + g2 z^-1)(1 + g1 z^-2))` boosts some
/// frequencies and cuts others.
#[derive(Debug, Clone, Default)]
pub struct NestedAllpass {
    g1: f32,
    g2: f32,
    states: Vec<NestedState>,
}

impl NestedAllpass {
    /// Outer gain `g1`, inner gain `g2`, both inside `(-1, 1)`.
    pub fn new(g1: f32, g2: f32) -> DspResult<Self> {
        Ok(Self {
            g1: check_gain("g1", g1)?,
            g2: check_gain("g2", g2)?,
            states: Vec::new(),
        })
    }

    /// `(g1, g2)`.
    pub fn coefficients(&self) -> (f32, f32) {
        (self.g1, self.g2)
    }

    /// Update both gains. Neither changes if either is out of range.
    pub fn set_coefficients(&mut self, g1: f32, g2: f32) -> DspResult<()> {
        let g1 = check_gain("g1", g1)?;
        let g2 = check_gain("g2", g2)?;
        self.g1 = g1;
        self.g2 = g2;
        Ok(())
    }

    /// Filter one sample of `channel`.
    ///
    /// # Panics
    /// If `channel` is beyond the prepared channel count.
    #[inline]
    pub fn process_sample(&mut self, x: f32, channel: usize) -> f32 {
        let state = &mut self.states[channel];

        // Inner section, fed by the outer section's delayed node.
        let v = state.prev_w - self.g2 * state.prev_v;
        let inner = self.g2 * v + state.prev_v;
        state.prev_v = v;

        // Outer section, with the inner output standing in for its delay.
        let w = x - self.g1 * inner;
        state.prev_w = w;
        self.g1 * w + inner
    }
}

impl Processor for NestedAllpass {
    fn prepare(&mut self, sample_rate: f32, num_channels: usize) -> DspResult<()> {
        check_sample_rate(sample_rate)?;
        check_channels(num_channels)?;
        self.states = vec![NestedState::default(); num_channels];
        Ok(())
    }

    fn process(&mut self, buffer: &mut [&mut [f32]]) {
        let channels = buffer.len().min(self.states.len());
        for (channel, samples) in buffer.iter_mut().take(channels).enumerate() {
            for sample in samples.iter_mut() {
                *sample = self.process_sample(*sample, channel);
            }
        }
    }

    fn reset(&mut self) {
        self.states.fill(NestedState::default());
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::test_util::{process_channels, rms, sine};

    const SR: f32 = 48000.0;

    #[test]
    fn test_rejects_unstable_gains() {
        assert!(FirstOrderAllpass::new(1.0).is_err());
        assert!(FirstOrderAllpass::new(f32::NAN).is_err());
        assert!(NestedAllpass::new(0.5, -1.2).is_err());

        let mut nested = NestedAllpass::new(0.5, 0.3).unwrap();
        assert!(nested.set_coefficients(0.2, 1.5).is_err());
        assert_eq!(nested.coefficients(), (0.5, 0.3));
    }

    #[test]
    fn test_first_order_preserves_rms() {
        let g = FirstOrderAllpass::coefficient_for(1000.0, SR).unwrap();
        let mut ap = FirstOrderAllpass::new(g).unwrap();
        ap.prepare(SR, 1).unwrap();

        for freq in [100.0, 1000.0, 6000.0] {
            ap.reset();
            let mut block = vec![sine(freq, SR, 9600)];
            let rms_in = rms(&block[0][4800..]);
            process_channels(&mut ap, &mut block);
            let rms_out = rms(&block[0][4800..]);
            assert!(
                (rms_out / rms_in - 1.0).abs() < 1e-2,
                "{freq} Hz: rms in {rms_in}, out {rms_out}"
            );
        }
    }

    /// At the break frequency a first-order all-pass lags by 90°, so the
    /// output is in quadrature with the input and their correlation is ~0.
    #[test]
    fn test_first_order_quadrature_at_break_frequency() {
        let g = FirstOrderAllpass::coefficient_for(1000.0, SR).unwrap();
        let mut ap = FirstOrderAllpass::new(g).unwrap();
        ap.prepare(SR, 1).unwrap();

        let input = sine(1000.0, SR, 9600);
        let output: Vec<f32> = input.iter().map(|&x| ap.process_sample(x, 0)).collect();
        let correlation: f32 = input[4800..]
            .iter()
            .zip(&output[4800..])
            .map(|(a, b)| a * b)
            .sum::<f32>()
            / 4800.0;
        assert!(correlation.abs() < 1e-2, "correlation {correlation}");
    }

    #[test]
    fn test_nested_preserves_rms() {
        let mut ap = NestedAllpass::new(0.6, -0.4).unwrap();
        ap.prepare(SR, 1).unwrap();

        for freq in [50.0, 750.0, 3000.0, 12000.0] {
            ap.reset();
            let mut block = vec![sine(freq, SR, 9600)];
            let rms_in = rms(&block[0][4800..]);
            process_channels(&mut ap, &mut block);
            let rms_out = rms(&block[0][4800..]);
            assert!(
                (rms_out / rms_in - 1.0).abs() < 1e-2,
                "{freq} Hz: rms in {rms_in}, out {rms_out}"
            );
        }
    }

    /// The impulse response of an all-pass carries exactly the energy of
    /// the impulse.
    #[test]
    fn test_nested_impulse_energy_is_unity() {
        let mut ap = NestedAllpass::new(0.7, 0.5).unwrap();
        ap.prepare(SR, 1).unwrap();

        let energy: f32 = (0..4000)
            .map(|i| {
                let y = ap.process_sample(if i == 0 { 1.0 } else { 0.0 }, 0);
                y * y
            })
            .sum();
        assert!((energy - 1.0).abs() < 1e-4, "impulse energy {energy}");
    }

    /// The three-register form described on [`NestedAllpass`] leaks
    /// energy into the impulse response; the lattice doesn't.
    #[test]
    fn test_three_register_form_is_not_allpass() {
        let (g1, g2) = (0.25_f32, 0.5_f32);

        let (mut prev_w1, mut prev_w2, mut prev_v) = (0.0_f32, 0.0_f32, 0.0_f32);
        let mut shortcut = Vec::with_capacity(4000);
        for i in 0..4000 {
            let x = if i == 0 { 1.0 } else { 0.0 };
            let w1 = x - g1 * prev_w2;
            let w2 = prev_w1;
            let v = w2 - g2 * prev_v;
            shortcut.push(g2 * prev_v + x);
            prev_w1 = w1;
            prev_w2 = w2;
            prev_v = v;
        }
        assert_eq!(&shortcut[..4], &[1.0, 0.0, 0.5, -0.25]);
        let leaked: f32 = shortcut.iter().map(|y| y * y).sum();
        assert!((leaked - 1.3137).abs() < 1e-3, "three-register energy {leaked}");

        let mut ap = NestedAllpass::new(g1, g2).unwrap();
        ap.prepare(SR, 1).unwrap();
        let energy: f32 = (0..4000)
            .map(|i| {
                let y = ap.process_sample(if i == 0 { 1.0 } else { 0.0 }, 0);
                y * y
            })
            .sum();
        assert!((energy - 1.0).abs() < 1e-4, "lattice energy {energy}");
    }

    #[test]
    fn test_nested_first_output_is_g1() {
        let mut ap = NestedAllpass::new(0.25, 0.5).unwrap();
        ap.prepare(SR, 2).unwrap();
        assert_eq!(ap.process_sample(1.0, 0), 0.25);
        // Channel 1 has its own registers.
        assert_eq!(ap.process_sample(1.0, 1), 0.25);
    }
}

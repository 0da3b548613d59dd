//! # Biquad Filter
//!
//! A biquad is a second-order IIR filter: two poles, two zeros, five
//! multiplies per sample. Its coefficients come from the Audio EQ Cookbook
//! (Robert Bristow-Johnson), which maps musical controls to the
//! recurrence:
//!
//! ```text
//! w0    = 2π * frequency / sample_rate
//! alpha = sin(w0) / (2 * Q)
//! A     = 10^(gain_db / 40)            (peaking and shelving only)
//!
//! a0*y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
//! ```
//!
//! One [`FilterType`] enum selects the formula; one [`Coefficients::design`]
//! function implements them all.
//!
//! ## Three Ways to Wire the Same Filter
//!
//! The same transfer function can be computed with differently arranged
//! delay registers ([`Topology`]):
//!
//! - **Direct Form I**: remembers two inputs and two outputs. Uses the raw
//!   (unnormalised) coefficients and divides by `a0` while evaluating.
//! - **Direct Form II**: a single two-register state `w`. Uses
//!   `a0`-normalised coefficients.
//! - **Direct Form II Transposed** (the default): two running partial sums.
//!   Uses `a0`-normalised coefficients and behaves best when coefficients
//!   change while audio is running.
//!
//! ## Stability
//!
//! The filter is only stable while both poles stay inside the unit circle.
//! Q must be positive and the frequency strictly between 0 and Nyquist;
//! anything else is rejected with [`DspError::InvalidFilterParameter`] and
//! the filter passes audio through unchanged until it gets a valid update.

use std::f64::consts::PI;

use nih_plug::{nih_log, nih_warn};

use crate::control::ParamReceiver;
use crate::error::{check_channels, check_sample_rate, DspError, DspResult};
use crate::params::{db_to_amplitude_a, FILTER_GAIN_DB};
use crate::processor::Processor;

/// Which cookbook response to design.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    Lowpass,
    Highpass,
    /// Constant 0 dB peak gain.
    Bandpass,
    Notch,
    Allpass,
    Peaking,
    LowShelf,
    HighShelf,
}

impl FilterType {
    /// All variants, in declaration order.
    pub const ALL: [FilterType; 8] = [
        FilterType::Lowpass,
        FilterType::Highpass,
        FilterType::Bandpass,
        FilterType::Notch,
        FilterType::Allpass,
        FilterType::Peaking,
        FilterType::LowShelf,
        FilterType::HighShelf,
    ];

    /// Whether `gain_db` affects this response.
    pub fn uses_gain(self) -> bool {
        matches!(
            self,
            FilterType::Peaking | FilterType::LowShelf | FilterType::HighShelf
        )
    }
}

/// Structural realisation of the recurrence. All three compute the same
/// transfer function and differ only in what they remember between samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Topology {
    DirectFormI,
    DirectFormII,
    #[default]
    TransposedDirectFormII,
}

impl Topology {
    /// All variants, in declaration order.
    pub const ALL: [Topology; 3] = [
        Topology::DirectFormI,
        Topology::DirectFormII,
        Topology::TransposedDirectFormII,
    ];

    /// Direct Form I evaluates with raw coefficients; the other two store
    /// them already divided by `a0`.
    pub fn normalizes(self) -> bool {
        !matches!(self, Topology::DirectFormI)
    }
}

/// The musical controls of a biquad.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterParams {
    /// Cutoff or centre frequency in Hz.
    pub frequency: f32,
    /// Resonance. `1/√2` gives a Butterworth (maximally flat) low/highpass;
    /// higher values narrow the band and raise the peak at the cutoff.
    pub q: f32,
    /// Boost or cut in dB. Only read by peaking and shelving filters, and
    /// only range-checked for them.
    pub gain_db: f32,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            frequency: 1000.0,
            q: std::f32::consts::FRAC_1_SQRT_2,
            gain_db: 0.0,
        }
    }
}

impl FilterParams {
    /// Check the parameters for a `filter_type` filter running at
    /// `sample_rate`.
    ///
    /// - `frequency` must lie strictly between 0 and Nyquist.
    /// - `q` must be finite and positive.
    /// - `gain_db` must lie in [`FILTER_GAIN_DB`], but only when
    ///   [`FilterType::uses_gain()`]; a lowpass ignores whatever it holds.
    ///
    /// Pass `f32::INFINITY` as the sample rate to run only the rate
    /// independent checks.
    pub fn validate(&self, filter_type: FilterType, sample_rate: f32) -> DspResult<()> {
        let nyquist = sample_rate / 2.0;
        if !self.frequency.is_finite() || self.frequency <= 0.0 || self.frequency >= nyquist {
            return Err(DspError::InvalidFilterParameter {
                name: "frequency",
                value: self.frequency,
            });
        }
        if !self.q.is_finite() || self.q <= 0.0 {
            return Err(DspError::InvalidFilterParameter {
                name: "q",
                value: self.q,
            });
        }
        if filter_type.uses_gain() && !FILTER_GAIN_DB.contains(self.gain_db) {
            return Err(DspError::InvalidFilterParameter {
                name: "gain_db",
                value: self.gain_db,
            });
        }
        Ok(())
    }
}

/// One biquad coefficient set. `a0` is kept so both normalisation
/// conventions can be represented.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    /// Feedforward gain on `x[n]`.
    pub b0: f32,
    /// Feedforward gain on `x[n-1]`.
    pub b1: f32,
    /// Feedforward gain on `x[n-2]`.
    pub b2: f32,
    /// Output scale. 1 once normalised.
    pub a0: f32,
    /// Feedback gain on `y[n-1]`, subtracted.
    pub a1: f32,
    /// Feedback gain on `y[n-2]`, subtracted.
    pub a2: f32,
}

impl Coefficients {
    /// `y[n] = x[n]`.
    pub const IDENTITY: Coefficients = Coefficients {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a0: 1.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Raw (unnormalised) cookbook coefficients for `filter_type`.
    ///
    /// Everything is computed in `f64` and rounded to `f32` at the end, so
    /// low cutoffs at high sample rates keep their precision. Fails with
    /// [`DspError::InvalidFilterParameter`] if
    /// [`FilterParams::validate()`] does.
    pub fn design(
        filter_type: FilterType,
        params: &FilterParams,
        sample_rate: f32,
    ) -> DspResult<Self> {
        params.validate(filter_type, sample_rate)?;

        let w0 = 2.0 * PI * params.frequency as f64 / sample_rate as f64;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * params.q as f64);
        let a = db_to_amplitude_a(params.gain_db) as f64;

        let (b0, b1, b2, a0, a1, a2) = match filter_type {
            FilterType::Lowpass => {
                let b1 = 1.0 - cos_w0;
                let b0 = b1 / 2.0;
                (b0, b1, b0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
            FilterType::Highpass => {
                let b0 = (1.0 + cos_w0) / 2.0;
                (b0, -(1.0 + cos_w0), b0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
            FilterType::Bandpass => (alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha),
            FilterType::Notch => (
                1.0,
                -2.0 * cos_w0,
                1.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterType::Allpass => (
                1.0 - alpha,
                -2.0 * cos_w0,
                1.0 + alpha,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterType::Peaking => (
                1.0 + alpha * a,
                -2.0 * cos_w0,
                1.0 - alpha * a,
                1.0 + alpha / a,
                -2.0 * cos_w0,
                1.0 - alpha / a,
            ),
            FilterType::LowShelf => {
                let shelf = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 + shelf),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 - shelf),
                    (a + 1.0) + (a - 1.0) * cos_w0 + shelf,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
                    (a + 1.0) + (a - 1.0) * cos_w0 - shelf,
                )
            }
            FilterType::HighShelf => {
                let shelf = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 + shelf),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 - shelf),
                    (a + 1.0) - (a - 1.0) * cos_w0 + shelf,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                    (a + 1.0) - (a - 1.0) * cos_w0 - shelf,
                )
            }
        };

        Ok(Self {
            b0: b0 as f32,
            b1: b1 as f32,
            b2: b2 as f32,
            a0: a0 as f32,
            a1: a1 as f32,
            a2: a2 as f32,
        })
    }

    /// Divide everything by `a0`, leaving `a0 = 1`.
    pub fn normalized(&self) -> Self {
        let inv = 1.0 / self.a0;
        Self {
            b0: self.b0 * inv,
            b1: self.b1 * inv,
            b2: self.b2 * inv,
            a0: 1.0,
            a1: self.a1 * inv,
            a2: self.a2 * inv,
        }
    }

    /// Pole radius for a complex-conjugate pole pair: `sqrt(|a2 / a0|)`.
    pub fn pole_radius(&self) -> f32 {
        (self.a2 / self.a0).abs().sqrt()
    }

    /// Both poles strictly inside the unit circle (stability triangle).
    pub fn is_stable(&self) -> bool {
        let n = self.normalized();
        n.a2.abs() < 1.0 && n.a1.abs() < 1.0 + n.a2
    }

    /// Magnitude response `|H(e^jw)|` at `frequency` Hz.
    pub fn magnitude_at(&self, frequency: f32, sample_rate: f32) -> f32 {
        let w = 2.0 * PI * frequency as f64 / sample_rate as f64;
        let (c1, s1) = (w.cos(), w.sin());
        let (c2, s2) = ((2.0 * w).cos(), (2.0 * w).sin());

        let (b0, b1, b2) = (self.b0 as f64, self.b1 as f64, self.b2 as f64);
        let (a0, a1, a2) = (self.a0 as f64, self.a1 as f64, self.a2 as f64);

        // e^-jw = cos w - j sin w
        let num_re = b0 + b1 * c1 + b2 * c2;
        let num_im = -(b1 * s1 + b2 * s2);
        let den_re = a0 + a1 * c1 + a2 * c2;
        let den_im = -(a1 * s1 + a2 * s2);

        ((num_re * num_re + num_im * num_im) / (den_re * den_re + den_im * den_im)).sqrt() as f32
    }
}

/// Per-channel filter memory for one topology. The variant always matches
/// the owning [`Biquad`]'s topology.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Registers {
    DirectFormI { x1: f32, x2: f32, y1: f32, y2: f32 },
    DirectFormII { w1: f32, w2: f32 },
    Transposed { r1: f32, r2: f32 },
}

impl Registers {
    fn new(topology: Topology) -> Self {
        match topology {
            Topology::DirectFormI => Registers::DirectFormI {
                x1: 0.0,
                x2: 0.0,
                y1: 0.0,
                y2: 0.0,
            },
            Topology::DirectFormII => Registers::DirectFormII { w1: 0.0, w2: 0.0 },
            Topology::TransposedDirectFormII => Registers::Transposed { r1: 0.0, r2: 0.0 },
        }
    }

    /// Run one sample through the recurrence and advance the registers.
    #[inline]
    fn tick(&mut self, c: &Coefficients, x: f32) -> f32 {
        match self {
            // The recurrence written out as-is. Raw coefficients, so the
            // sum is divided by a0 here.
            Registers::DirectFormI { x1, x2, y1, y2 } => {
                let y = (c.b0 * x + c.b1 * *x1 + c.b2 * *x2 - c.a1 * *y1 - c.a2 * *y2) / c.a0;

                // Shift both histories by one sample.
                *x2 = *x1;
                *x1 = x;
                *y2 = *y1;
                *y1 = y;
                y
            }
            // Poles first, then zeros, sharing one delayed signal `w`:
            //
            //   w[n] = x[n] - a1*w[n-1] - a2*w[n-2]
            //   y[n] = b0*w[n] + b1*w[n-1] + b2*w[n-2]
            Registers::DirectFormII { w1, w2 } => {
                let w = x - c.a1 * *w1 - c.a2 * *w2;
                let y = c.b0 * w + c.b1 * *w1 + c.b2 * *w2;
                *w2 = *w1;
                *w1 = w;
                y
            }
            // Each register holds a partial sum of future output:
            // r1 is what y[n+1] gets beyond b0*x[n+1], r2 the same for
            // y[n+2]. The output is the direct term plus r1; then both sums
            // take their share of this sample.
            Registers::Transposed { r1, r2 } => {
                let y = c.b0 * x + *r1;
                *r1 = c.b1 * x - c.a1 * y + *r2;
                *r2 = c.b2 * x - c.a2 * y;
                y
            }
        }
    }
}

/// A multichannel biquad. Coefficients are shared by all channels; each
/// channel keeps its own registers, which persist across blocks.
#[derive(Debug, Clone)]
pub struct Biquad {
    filter_type: FilterType,
    topology: Topology,
    params: FilterParams,

    /// Active coefficients, in the convention `topology` expects.
    coefficients: Coefficients,

    registers: Vec<Registers>,
    sample_rate: f32,

    /// Set after a rejected parameter update; audio passes through untouched.
    bypassed: bool,
}

impl Biquad {
    /// A `filter_type` filter in the default topology (Transposed Direct
    /// Form II) with [`FilterParams::default()`]: 1 kHz, Butterworth Q,
    /// 0 dB. It passes audio through until `prepare()`.
    pub fn new(filter_type: FilterType) -> Self {
        Self::with_topology(filter_type, Topology::default())
    }

    /// Like [`new()`](Self::new), in an explicit topology.
    pub fn with_topology(filter_type: FilterType, topology: Topology) -> Self {
        Self {
            filter_type,
            topology,
            params: FilterParams::default(),
            coefficients: Coefficients::IDENTITY,
            registers: Vec::new(),
            sample_rate: 0.0,
            bypassed: false,
        }
    }

    /// Builder-style initial parameters, applied at `prepare()`.
    pub fn with_params(mut self, params: FilterParams) -> Self {
        self.params = params;
        self
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// The last parameters that were accepted. A rejected update never
    /// shows up here.
    pub fn params(&self) -> FilterParams {
        self.params
    }

    /// The coefficients `process()` runs, raw for Direct Form I and
    /// normalised otherwise. [`Coefficients::IDENTITY`] before `prepare()`.
    pub fn coefficients(&self) -> Coefficients {
        self.coefficients
    }

    /// Whether the last update was rejected, leaving the filter as a wire.
    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }

    /// Switch filter type, keeping frequency, Q and gain.
    pub fn set_filter_type(&mut self, filter_type: FilterType) -> DspResult<()> {
        self.filter_type = filter_type;
        self.set_params(self.params)
    }

    /// Switch realisation. Filter memory starts over from silence.
    pub fn set_topology(&mut self, topology: Topology) -> DspResult<()> {
        self.topology = topology;
        let channels = self.registers.len();
        self.registers = vec![Registers::new(topology); channels];
        self.set_params(self.params)
    }

    /// Move the cutoff or centre frequency, in Hz.
    pub fn set_frequency(&mut self, frequency: f32) -> DspResult<()> {
        self.set_params(FilterParams {
            frequency,
            ..self.params
        })
    }

    /// Change the resonance. Must be positive.
    pub fn set_q(&mut self, q: f32) -> DspResult<()> {
        self.set_params(FilterParams { q, ..self.params })
    }

    /// Change the boost or cut in dB. Stored for every filter type, but only
    /// range-checked (and heard) for peaking and shelving filters.
    pub fn set_gain(&mut self, gain_db: f32) -> DspResult<()> {
        self.set_params(FilterParams {
            gain_db,
            ..self.params
        })
    }

    /// Validate `params` and recompute the coefficients.
    ///
    /// Before `prepare()` only the sample-rate independent checks can run;
    /// the full design happens once the sample rate is known. On rejection
    /// the last valid parameters are kept and the filter is bypassed.
    pub fn set_params(&mut self, params: FilterParams) -> DspResult<()> {
        self.apply(params).inspect_err(|err| {
            nih_warn!("biquad parameter rejected, bypassing: {err}");
        })
    }

    /// Apply the newest parameter set queued from another thread, if any.
    /// Meant to be called once at the start of a block, before `process()`.
    /// Rejections bypass the filter like [`set_params()`](Self::set_params)
    /// but are not logged.
    pub fn apply_pending(&mut self, receiver: &mut ParamReceiver<FilterParams>) -> DspResult<()> {
        match receiver.latest() {
            Some(params) => self.apply(params),
            None => Ok(()),
        }
    }

    /// [`set_params()`](Self::set_params) without the warning.
    fn apply(&mut self, params: FilterParams) -> DspResult<()> {
        if self.sample_rate == 0.0 {
            params.validate(self.filter_type, f32::INFINITY)?;
            self.params = params;
            return Ok(());
        }

        match Coefficients::design(self.filter_type, &params, self.sample_rate) {
            Ok(raw) => {
                self.params = params;
                self.coefficients = if self.topology.normalizes() {
                    raw.normalized()
                } else {
                    raw
                };
                // The registers stopped being updated when the bypass began,
                // so whatever they hold belongs to audio long gone.
                if self.bypassed {
                    self.reset();
                    self.bypassed = false;
                }
                Ok(())
            }
            Err(err) => {
                self.bypassed = true;
                Err(err)
            }
        }
    }

    /// Filter one sample of `channel`.
    ///
    /// # Panics
    /// If `channel` is beyond the prepared channel count.
    #[inline]
    pub fn process_sample(&mut self, x: f32, channel: usize) -> f32 {
        if self.bypassed {
            return x;
        }
        self.registers[channel].tick(&self.coefficients, x)
    }
}

impl Processor for Biquad {
    fn prepare(&mut self, sample_rate: f32, num_channels: usize) -> DspResult<()> {
        check_sample_rate(sample_rate)?;
        check_channels(num_channels)?;

        self.sample_rate = sample_rate;
        self.registers = vec![Registers::new(self.topology); num_channels];
        nih_log!(
            "biquad {:?}/{:?} prepared: {sample_rate} Hz, {num_channels} channel(s)",
            self.filter_type,
            self.topology
        );

        self.set_params(self.params)
    }

    fn process(&mut self, buffer: &mut [&mut [f32]]) {
        if self.bypassed {
            return;
        }

        for (channel, samples) in buffer.iter_mut().enumerate() {
            let Some(registers) = self.registers.get_mut(channel) else {
                continue;
            };
            for sample in samples.iter_mut() {
                *sample = registers.tick(&self.coefficients, *sample);
            }
        }
    }

    fn reset(&mut self) {
        let topology = self.topology;
        self.registers.fill(Registers::new(topology));
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::param_channel;
    use crate::processor::test_util::{process_channels, rms, sine};

    const SR: f32 = 48000.0;

    fn prepared(filter_type: FilterType, topology: Topology, params: FilterParams) -> Biquad {
        let mut f = Biquad::with_topology(filter_type, topology).with_params(params);
        f.prepare(SR, 1).unwrap();
        f
    }

    fn butterworth(frequency: f32) -> FilterParams {
        FilterParams {
            frequency,
            ..FilterParams::default()
        }
    }

    /// A unit step through a 1 kHz lowpass settles at unity gain.
    #[test]
    fn test_lowpass_step_settles_to_unity() {
        let mut f = prepared(FilterType::Lowpass, Topology::default(), butterworth(1000.0));

        let mut output = 0.0;
        for _ in 0..2000 {
            output = f.process_sample(1.0, 0);
        }
        assert!((output - 1.0).abs() < 1e-3, "Lowpass should pass DC, got {output}");
    }

    /// The cookbook lowpass has a zero exactly at Nyquist.
    #[test]
    fn test_lowpass_attenuates_nyquist() {
        let mut f = prepared(FilterType::Lowpass, Topology::default(), butterworth(1000.0));

        let mut max_output = 0.0_f32;
        for i in 0..4000 {
            let input = if i % 2 == 0 { 1.0 } else { -1.0 };
            let out = f.process_sample(input, 0);
            if i > 2000 {
                max_output = max_output.max(out.abs());
            }
        }
        assert!(max_output < 1e-3, "Nyquist should be removed, got {max_output}");
    }

    #[test]
    fn test_highpass_is_the_inverse() {
        let mut f = prepared(FilterType::Highpass, Topology::default(), butterworth(1000.0));

        let mut output = 0.0;
        for _ in 0..4000 {
            output = f.process_sample(1.0, 0);
        }
        assert!(output.abs() < 1e-3, "Highpass should block DC, got {output}");

        f.reset();
        let mut max_output = 0.0_f32;
        for i in 0..4000 {
            let input = if i % 2 == 0 { 1.0 } else { -1.0 };
            let out = f.process_sample(input, 0);
            if i > 2000 {
                max_output = max_output.max(out.abs());
            }
        }
        assert!(
            (max_output - 1.0).abs() < 1e-2,
            "Highpass should pass Nyquist, got {max_output}"
        );
    }

    /// An all-pass changes phase, never level.
    #[test]
    fn test_allpass_preserves_rms() {
        let mut f = prepared(FilterType::Allpass, Topology::default(), butterworth(1000.0));

        for freq in [200.0, 1000.0, 3000.0, 9000.0] {
            f.reset();
            let input = sine(freq, SR, 9600);
            let output: Vec<f32> = input.iter().map(|&x| f.process_sample(x, 0)).collect();

            let rms_in = rms(&input[4800..]);
            let rms_out = rms(&output[4800..]);
            assert!(
                (rms_out / rms_in - 1.0).abs() < 1e-2,
                "{freq} Hz: rms in {rms_in}, out {rms_out}"
            );
        }
    }

    #[test]
    fn test_notch_removes_centre_frequency() {
        let mut f = prepared(FilterType::Notch, Topology::default(), butterworth(1000.0));
        let input = sine(1000.0, SR, 9600);
        let output: Vec<f32> = input.iter().map(|&x| f.process_sample(x, 0)).collect();
        let level = rms(&output[6000..]);
        assert!(level < 0.01, "Notch should remove 1 kHz, got rms {level}");
    }

    /// All three realisations compute the same filter.
    #[test]
    fn test_topologies_agree() {
        let input: Vec<f32> = (0..4096)
            .map(|i| {
                let t = i as f32;
                (t * 0.013).sin() * 0.6 + (t * 0.41).sin() * 0.3 + if i % 97 == 0 { 0.5 } else { 0.0 }
            })
            .collect();

        for filter_type in FilterType::ALL {
            let params = FilterParams {
                frequency: 2500.0,
                q: 1.2,
                gain_db: 9.0,
            };
            let outputs: Vec<Vec<f32>> = Topology::ALL
                .iter()
                .map(|&topology| {
                    let mut f = prepared(filter_type, topology, params);
                    input.iter().map(|&x| f.process_sample(x, 0)).collect()
                })
                .collect();

            for (i, ((a, b), c)) in outputs[0]
                .iter()
                .zip(&outputs[1])
                .zip(&outputs[2])
                .enumerate()
            {
                assert!(
                    (a - b).abs() < 1e-3 && (a - c).abs() < 1e-3,
                    "{filter_type:?} sample {i}: DF1 {a}, DF2 {b}, TDF2 {c}"
                );
            }
        }
    }

    #[test]
    fn test_normalisation_conventions() {
        let df1 = prepared(FilterType::Peaking, Topology::DirectFormI, butterworth(1000.0));
        let tdf2 = prepared(
            FilterType::Peaking,
            Topology::TransposedDirectFormII,
            butterworth(1000.0),
        );

        assert!(df1.coefficients().a0 != 1.0, "DF1 keeps the raw a0");
        assert_eq!(tdf2.coefficients().a0, 1.0);
        let normalized = df1.coefficients().normalized();
        assert!((normalized.b0 - tdf2.coefficients().b0).abs() < 1e-6);
        assert!((normalized.a2 - tdf2.coefficients().a2).abs() < 1e-6);
    }

    #[test]
    fn test_peaking_and_shelf_gains() {
        let params = FilterParams {
            frequency: 1000.0,
            q: 0.707,
            gain_db: 12.0,
        };
        let linear = 10.0_f32.powf(12.0 / 20.0);

        let peak = Coefficients::design(FilterType::Peaking, &params, SR).unwrap();
        assert!((peak.magnitude_at(1000.0, SR) - linear).abs() < 1e-3);
        assert!((peak.magnitude_at(0.0, SR) - 1.0).abs() < 1e-3);

        let low = Coefficients::design(FilterType::LowShelf, &params, SR).unwrap();
        assert!((low.magnitude_at(0.0, SR) - linear).abs() < 1e-3);
        assert!((low.magnitude_at(SR / 2.0, SR) - 1.0).abs() < 1e-3);

        let high = Coefficients::design(FilterType::HighShelf, &params, SR).unwrap();
        assert!((high.magnitude_at(0.0, SR) - 1.0).abs() < 1e-3);
        assert!((high.magnitude_at(SR / 2.0, SR) - linear).abs() < 1e-3);
    }

    #[test]
    fn test_designs_are_stable() {
        for filter_type in FilterType::ALL {
            for frequency in [50.0, 200.0, 2000.0, 15000.0, 22000.0] {
                for q in [0.3, 0.707, 4.0, 10.0] {
                    let params = FilterParams {
                        frequency,
                        q,
                        gain_db: -6.0,
                    };
                    let c = Coefficients::design(filter_type, &params, SR).unwrap();
                    assert!(c.is_stable(), "{filter_type:?} {frequency} Hz Q {q}");
                    assert!(c.pole_radius() < 1.0);
                }
            }
        }
    }

    /// Gain is only range-checked where it is used.
    #[test]
    fn test_gain_checked_only_when_used() {
        let loud = FilterParams {
            gain_db: 100.0,
            ..FilterParams::default()
        };
        assert!(loud.validate(FilterType::Lowpass, SR).is_ok());
        assert!(loud.validate(FilterType::Notch, SR).is_ok());
        for filter_type in [FilterType::Peaking, FilterType::LowShelf, FilterType::HighShelf] {
            assert_eq!(
                loud.validate(filter_type, SR),
                Err(DspError::InvalidFilterParameter {
                    name: "gain_db",
                    value: 100.0
                }),
                "{filter_type:?}"
            );
        }

        let mut f = prepared(FilterType::Highpass, Topology::default(), butterworth(1000.0));
        assert!(f.set_gain(100.0).is_ok());
        assert!(!f.is_bypassed());
        assert!(f.set_filter_type(FilterType::HighShelf).is_err());
        assert!(f.is_bypassed());
    }

    /// Leaving bypass starts from silence, not from the registers left
    /// behind when the bypass began.
    #[test]
    fn test_leaving_bypass_clears_registers() {
        for topology in Topology::ALL {
            let mut f = prepared(FilterType::Lowpass, topology, butterworth(1000.0));
            for _ in 0..64 {
                f.process_sample(1.0, 0);
            }

            assert!(f.set_frequency(-1.0).is_err());
            assert_eq!(f.process_sample(0.3, 0), 0.3);

            f.set_frequency(1000.0).unwrap();
            for i in 0..16 {
                let out = f.process_sample(0.0, 0);
                assert_eq!(out, 0.0, "{topology:?} sample {i} rang with stale state");
            }
        }
    }

    #[test]
    fn test_invalid_parameters_bypass() {
        let mut f = prepared(FilterType::Lowpass, Topology::default(), butterworth(1000.0));

        assert_eq!(
            f.set_q(0.0),
            Err(DspError::InvalidFilterParameter { name: "q", value: 0.0 })
        );
        assert!(f.is_bypassed());
        // The rejected Q is not kept.
        assert!((f.params().q - 0.707).abs() < 1e-3);

        let mut block = vec![vec![0.5, -0.25, 1.0]];
        process_channels(&mut f, &mut block);
        assert_eq!(block[0], vec![0.5, -0.25, 1.0], "bypassed filter is identity");

        assert!(f.set_frequency(SR / 2.0).is_err());
        assert!(f.set_frequency(-5.0).is_err());
        assert!(f.set_q(f32::NAN).is_err());

        f.set_frequency(500.0).unwrap();
        assert!(!f.is_bypassed());
        assert_eq!(f.params().frequency, 500.0);
    }

    /// A cutoff that is fine at 48 kHz is above Nyquist at 16 kHz.
    #[test]
    fn test_prepare_revalidates_against_new_rate() {
        let mut f = Biquad::new(FilterType::Lowpass).with_params(butterworth(12000.0));
        assert!(f.prepare(48000.0, 1).is_ok());
        assert!(f.prepare(16000.0, 1).is_err());
        assert!(f.is_bypassed());
    }

    #[test]
    fn test_channels_share_coefficients_not_state() {
        let mut f = Biquad::new(FilterType::Lowpass).with_params(butterworth(1000.0));
        f.prepare(SR, 2).unwrap();

        let mut block = vec![vec![1.0; 64], vec![0.0; 64]];
        process_channels(&mut f, &mut block);
        assert!(block[0][63] > 0.1);
        assert!(block[1].iter().all(|&s| s == 0.0), "silent channel stays silent");

        // State carries over to the next block.
        let mut next = vec![vec![1.0; 1], vec![0.0; 1]];
        process_channels(&mut f, &mut next);
        assert!(next[0][0] > 0.9, "registers were reset between blocks");
    }

    #[test]
    fn test_apply_pending_from_control_thread() {
        let mut f = prepared(FilterType::Lowpass, Topology::default(), butterworth(1000.0));
        let (mut tx, mut rx) = param_channel::<FilterParams>(4);

        let handle = std::thread::spawn(move || {
            tx.send(butterworth(2000.0)).unwrap();
            tx.send(butterworth(3000.0)).unwrap();
        });
        handle.join().unwrap();

        f.apply_pending(&mut rx).unwrap();
        assert_eq!(f.params().frequency, 3000.0);
        assert!(f.apply_pending(&mut rx).is_ok());
    }
}

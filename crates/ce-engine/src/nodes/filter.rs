//! Biquad filters.
//!
//! Coefficients use the Audio EQ Cookbook formulas. Following Web Audio,
//! lowpass and highpass interpret `q` as resonance in dB while bandpass
//! uses it as a plain quality factor.

use std::f64::consts::PI;

use ce_ir::{AudioBlock, BLOCK_SIZE};

use super::{param_block, Modulation, ProcessContext};
use crate::param::{Param, ParamId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKind {
    Lowpass,
    Highpass,
    Bandpass,
}

/// Normalised biquad coefficients (a0 = 1).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    pub fn new(kind: FilterKind, cutoff: f64, q: f64, sample_rate: f64) -> Self {
        let nyquist = sample_rate * 0.5;
        let cutoff = cutoff.clamp(10.0, nyquist * 0.98);
        let omega = 2.0 * PI * cutoff / sample_rate;
        let (sin_omega, cos_omega) = omega.sin_cos();

        let q = match kind {
            FilterKind::Lowpass | FilterKind::Highpass => 10f64.powf(q / 20.0),
            FilterKind::Bandpass => q,
        }
        .max(1e-3);
        let alpha = sin_omega / (2.0 * q);

        let (b0, b1, b2) = match kind {
            FilterKind::Lowpass => {
                let b = (1.0 - cos_omega) / 2.0;
                (b, 1.0 - cos_omega, b)
            }
            FilterKind::Highpass => {
                let b = (1.0 + cos_omega) / 2.0;
                (b, -(1.0 + cos_omega), b)
            }
            FilterKind::Bandpass => (alpha, 0.0, -alpha),
        };
        let a0 = 1.0 + alpha;
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: (-2.0 * cos_omega) / a0,
            a2: (1.0 - alpha) / a0,
        }
    }
}

/// Direct form I state for one channel.
#[derive(Clone, Copy, Debug, Default)]
struct BiquadState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadState {
    #[inline]
    fn tick(&mut self, c: &BiquadCoeffs, x: f64) -> f64 {
        let y = c.b0 * x + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        // flush denormals
        self.y1 = if y.abs() < 1e-20 { 0.0 } else { y };
        self.y1
    }
}

#[derive(Debug)]
pub struct Biquad {
    pub kind: FilterKind,
    pub frequency: Param,
    pub q: Param,
    state: [BiquadState; 2],
    freq_values: [f32; BLOCK_SIZE],
    q_values: [f32; BLOCK_SIZE],
}

impl Biquad {
    pub fn new(kind: FilterKind, frequency: f32, q: f32) -> Self {
        Self {
            kind,
            frequency: Param::new(frequency),
            q: Param::new(q),
            state: [BiquadState::default(); 2],
            freq_values: [0.0; BLOCK_SIZE],
            q_values: [0.0; BLOCK_SIZE],
        }
    }

    pub(super) fn process(
        &mut self,
        cx: &ProcessContext,
        input: &AudioBlock,
        mods: &Modulation,
        out: &mut AudioBlock,
    ) {
        param_block(&mut self.frequency, ParamId::Frequency, cx, mods, &mut self.freq_values);
        param_block(&mut self.q, ParamId::Q, cx, mods, &mut self.q_values);
        let sr = cx.sample_rate as f64;

        let constant = self.freq_values.iter().all(|&f| f == self.freq_values[0])
            && self.q_values.iter().all(|&q| q == self.q_values[0]);
        let mut coeffs = self.coeffs_at(0, sr);

        let [left_state, right_state] = &mut self.state;
        let (left, right) = out.split_mut();
        for i in 0..BLOCK_SIZE {
            if !constant && i > 0 {
                coeffs = BiquadCoeffs::new(
                    self.kind,
                    self.freq_values[i] as f64,
                    self.q_values[i] as f64,
                    sr,
                );
            }
            left[i] = left_state.tick(&coeffs, input.channel(0)[i] as f64) as f32;
            right[i] = right_state.tick(&coeffs, input.channel(1)[i] as f64) as f32;
        }
    }

    fn coeffs_at(&self, i: usize, sample_rate: f64) -> BiquadCoeffs {
        BiquadCoeffs::new(
            self.kind,
            self.freq_values[i] as f64,
            self.q_values[i] as f64,
            sample_rate,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 44_100.0;

    fn tone(freq: f32, frame: u64) -> AudioBlock {
        let mut block = AudioBlock::new();
        for i in 0..BLOCK_SIZE {
            let t = (frame + i as u64) as f32 / SR;
            let s = (t * freq * std::f32::consts::TAU).sin();
            block.channel_mut(0)[i] = s;
            block.channel_mut(1)[i] = s;
        }
        block
    }

    fn steady_peak(filter: &mut Biquad, freq: f32) -> f32 {
        let mut out = AudioBlock::new();
        let mut peak = 0.0f32;
        for b in 0..64u64 {
            let frame = b * BLOCK_SIZE as u64;
            let cx = ProcessContext { frame, sample_rate: SR };
            filter.process(&cx, &tone(freq, frame), &Modulation::new(), &mut out);
            if b > 32 {
                peak = peak.max(out.peak());
            }
        }
        peak
    }

    #[test]
    fn lowpass_attenuates_highs() {
        let mut lp = Biquad::new(FilterKind::Lowpass, 500.0, 0.0);
        let peak = steady_peak(&mut lp, 8_000.0);
        assert!(peak < 0.1, "peak should be attenuated, got {}", peak);
    }

    #[test]
    fn lowpass_passes_lows() {
        let mut lp = Biquad::new(FilterKind::Lowpass, 4_000.0, 0.0);
        let peak = steady_peak(&mut lp, 100.0);
        assert!(peak > 0.9, "passband should be near unity, got {}", peak);
    }

    #[test]
    fn highpass_attenuates_lows() {
        let mut hp = Biquad::new(FilterKind::Highpass, 4_000.0, 0.0);
        let peak = steady_peak(&mut hp, 60.0);
        assert!(peak < 0.05, "got {}", peak);
    }

    #[test]
    fn bandpass_unity_at_centre() {
        let mut bp = Biquad::new(FilterKind::Bandpass, 1_000.0, 5.0);
        let centre = steady_peak(&mut bp, 1_000.0);
        let mut bp = Biquad::new(FilterKind::Bandpass, 1_000.0, 5.0);
        let off = steady_peak(&mut bp, 5_000.0);
        assert!(centre > 0.9, "centre {}", centre);
        assert!(off < 0.2, "off-centre {}", off);
    }

    #[test]
    fn cutoff_above_nyquist_is_clamped() {
        let c = BiquadCoeffs::new(FilterKind::Lowpass, 30_000.0, 1.0, 16_000.0);
        assert!(c.b0.is_finite() && c.a1.is_finite() && c.a2.is_finite());
    }
}

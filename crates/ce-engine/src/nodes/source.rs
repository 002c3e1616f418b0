//! Oscillators and looping noise playback.

use std::sync::Arc;

use ce_ir::{AudioBlock, BLOCK_SIZE};

use super::{param_block, Modulation, ProcessContext};
use crate::param::{Param, ParamId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

/// When a source node is audible: from `start` (inclusive) to `stop` (exclusive).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SourceSchedule {
    pub start: Option<u64>,
    pub stop: Option<u64>,
}

impl SourceSchedule {
    pub fn is_active(&self, frame: u64) -> bool {
        match self.start {
            Some(start) => frame >= start && self.stop.map_or(true, |stop| frame < stop),
            None => false,
        }
    }

    /// True once the source can never sound again.
    pub fn has_ended(&self, frame: u64) -> bool {
        self.stop.is_some_and(|stop| frame >= stop)
    }
}

/// Band-limited (PolyBLEP) periodic oscillator.
#[derive(Debug)]
pub struct Oscillator {
    pub waveform: Waveform,
    pub frequency: Param,
    /// Detune in cents.
    pub detune: Param,
    pub schedule: SourceSchedule,
    phase: f64,
    freq_values: [f32; BLOCK_SIZE],
    detune_values: [f32; BLOCK_SIZE],
}

impl Oscillator {
    pub fn new(waveform: Waveform, frequency: f32) -> Self {
        Self {
            waveform,
            frequency: Param::new(frequency),
            detune: Param::new(0.0),
            schedule: SourceSchedule::default(),
            phase: 0.0,
            freq_values: [0.0; BLOCK_SIZE],
            detune_values: [0.0; BLOCK_SIZE],
        }
    }

    pub(super) fn process(&mut self, cx: &ProcessContext, mods: &Modulation, out: &mut AudioBlock) {
        param_block(&mut self.frequency, ParamId::Frequency, cx, mods, &mut self.freq_values);
        param_block(&mut self.detune, ParamId::Detune, cx, mods, &mut self.detune_values);
        let detuned = self.detune_values.iter().any(|&c| c != 0.0);
        let inv_sr = 1.0 / cx.sample_rate as f64;

        let (left, right) = out.split_mut();
        for i in 0..BLOCK_SIZE {
            if !self.schedule.is_active(cx.frame + i as u64) {
                left[i] = 0.0;
                right[i] = 0.0;
                continue;
            }
            let mut freq = self.freq_values[i] as f64;
            if detuned {
                freq *= (self.detune_values[i] as f64 / 1200.0).exp2();
            }
            let dt = freq * inv_sr;
            let sample = render_wave(self.waveform, self.phase, dt.abs()) as f32;
            left[i] = sample;
            right[i] = sample;
            self.phase = (self.phase + dt).rem_euclid(1.0);
        }
    }
}

fn render_wave(waveform: Waveform, phase: f64, dt: f64) -> f64 {
    match waveform {
        Waveform::Sine => (phase * std::f64::consts::TAU).sin(),
        Waveform::Sawtooth => 2.0 * phase - 1.0 - poly_blep(phase, dt),
        Waveform::Square => {
            let naive = if phase < 0.5 { 1.0 } else { -1.0 };
            naive + poly_blep(phase, dt) - poly_blep((phase + 0.5).rem_euclid(1.0), dt)
        }
        Waveform::Triangle => {
            if phase < 0.5 {
                4.0 * phase - 1.0
            } else {
                3.0 - 4.0 * phase
            }
        }
    }
}

/// Polynomial band-limited step correction around phase discontinuities.
fn poly_blep(t: f64, dt: f64) -> f64 {
    if dt <= 0.0 {
        0.0
    } else if t < dt {
        let t = t / dt;
        t + t - t * t - 1.0
    } else if t > 1.0 - dt {
        let t = (t - 1.0) / dt;
        t * t + t + t + 1.0
    } else {
        0.0
    }
}

/// Loops a shared mono noise buffer from a per-node offset.
#[derive(Debug)]
pub struct NoiseSource {
    buffer: Arc<[f32]>,
    pos: usize,
    pub schedule: SourceSchedule,
}

impl NoiseSource {
    pub fn new(buffer: Arc<[f32]>, offset: usize) -> Self {
        let pos = if buffer.is_empty() { 0 } else { offset % buffer.len() };
        Self {
            buffer,
            pos,
            schedule: SourceSchedule::default(),
        }
    }

    pub(super) fn process(&mut self, cx: &ProcessContext, out: &mut AudioBlock) {
        let len = self.buffer.len();
        let (left, right) = out.split_mut();
        for i in 0..BLOCK_SIZE {
            if len == 0 || !self.schedule.is_active(cx.frame + i as u64) {
                left[i] = 0.0;
                right[i] = 0.0;
                continue;
            }
            let s = self.buffer[self.pos];
            left[i] = s;
            right[i] = s;
            self.pos += 1;
            if self.pos == len {
                self.pos = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48_000.0;

    fn render(osc: &mut Oscillator, frame: u64) -> AudioBlock {
        let mut out = AudioBlock::new();
        osc.process(&ProcessContext { frame, sample_rate: SR }, &Modulation::new(), &mut out);
        out
    }

    #[test]
    fn unstarted_oscillator_is_silent() {
        let mut osc = Oscillator::new(Waveform::Sine, 440.0);
        assert!(render(&mut osc, 0).is_silent());
    }

    #[test]
    fn sine_peaks_near_unity() {
        let mut osc = Oscillator::new(Waveform::Sine, 375.0);
        osc.schedule.start = Some(0);
        // 128 frames at 375 Hz / 48 kHz is exactly one cycle
        let out = render(&mut osc, 0);
        assert!(out.peak() > 0.99 && out.peak() <= 1.0, "peak {}", out.peak());
        assert!((out.channel(0)[32] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn stop_silences_from_stop_frame() {
        let mut osc = Oscillator::new(Waveform::Square, 100.0);
        osc.schedule.start = Some(0);
        osc.schedule.stop = Some(64);
        let out = render(&mut osc, 0);
        assert!(out.channel(0)[10].abs() > 0.5);
        assert!(out.channel(0)[64..].iter().all(|&s| s == 0.0));
        assert!(osc.schedule.has_ended(64));
    }

    #[test]
    fn detune_one_octave_doubles_rate() {
        let mut plain = Oscillator::new(Waveform::Sawtooth, 375.0);
        plain.schedule.start = Some(0);
        let mut up = Oscillator::new(Waveform::Sawtooth, 187.5);
        up.detune = Param::new(1200.0);
        up.schedule.start = Some(0);
        let a = render(&mut plain, 0);
        let b = render(&mut up, 0);
        for i in 0..BLOCK_SIZE {
            assert!((a.channel(0)[i] - b.channel(0)[i]).abs() < 1e-3, "frame {}", i);
        }
    }

    #[test]
    fn sawtooth_stays_in_range() {
        let mut osc = Oscillator::new(Waveform::Sawtooth, 3_000.0);
        osc.schedule.start = Some(0);
        for block in 0..8 {
            let out = render(&mut osc, block * BLOCK_SIZE as u64);
            assert!(out.peak() <= 1.1, "peak {}", out.peak());
        }
    }

    #[test]
    fn noise_loops_buffer() {
        let buffer: Arc<[f32]> = Arc::from(vec![0.1, 0.2, 0.3]);
        let mut noise = NoiseSource::new(buffer, 1);
        noise.schedule.start = Some(0);
        let mut out = AudioBlock::new();
        noise.process(&ProcessContext { frame: 0, sample_rate: SR }, &mut out);
        assert_eq!(out.channel(0)[0], 0.2);
        assert_eq!(out.channel(0)[1], 0.3);
        assert_eq!(out.channel(0)[2], 0.1);
        assert_eq!(out.channel(1)[2], 0.1);
    }

    #[test]
    fn noise_waits_for_start() {
        let buffer: Arc<[f32]> = Arc::from(vec![1.0; 16]);
        let mut noise = NoiseSource::new(buffer, 0);
        noise.schedule.start = Some(100);
        let mut out = AudioBlock::new();
        noise.process(&ProcessContext { frame: 0, sample_rate: SR }, &mut out);
        assert_eq!(out.channel(0)[99], 0.0);
        assert_eq!(out.channel(0)[100], 1.0);
    }
}

//! Pass-through spectrum analyser with byte-scaled output.

use std::sync::Arc;

use ce_ir::{AudioBlock, BLOCK_SIZE};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

pub const FFT_SIZE: usize = 256;
pub const FREQUENCY_BINS: usize = FFT_SIZE / 2;

const SMOOTHING: f32 = 0.8;
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;
/// Refresh the spectrum roughly at display rate.
const REFRESH_HZ: f32 = 60.0;

pub struct Analyser {
    fft: Arc<dyn Fft<f32>>,
    window: [f32; FFT_SIZE],
    ring: [f32; FFT_SIZE],
    write: usize,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    smoothed: [f32; FREQUENCY_BINS],
    bytes: [u8; FREQUENCY_BINS],
    interval: u32,
    countdown: u32,
}

impl std::fmt::Debug for Analyser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyser")
            .field("interval", &self.interval)
            .finish()
    }
}

impl Analyser {
    pub fn new(sample_rate: f32) -> Self {
        let fft = FftPlanner::<f32>::new().plan_fft_forward(FFT_SIZE);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        let mut window = [0.0; FFT_SIZE];
        for (n, w) in window.iter_mut().enumerate() {
            let x = std::f32::consts::TAU * n as f32 / FFT_SIZE as f32;
            *w = 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos();
        }
        let interval = ((sample_rate / REFRESH_HZ / BLOCK_SIZE as f32).round() as u32).max(1);
        Self {
            fft,
            window,
            ring: [0.0; FFT_SIZE],
            write: 0,
            buffer: vec![Complex::new(0.0, 0.0); FFT_SIZE],
            scratch,
            smoothed: [0.0; FREQUENCY_BINS],
            bytes: [0; FREQUENCY_BINS],
            interval,
            countdown: interval,
        }
    }

    /// Latest magnitudes, 0 at -100 dB up to 255 at -30 dB.
    pub fn bytes(&self) -> &[u8; FREQUENCY_BINS] {
        &self.bytes
    }

    pub(super) fn process(&mut self, input: &AudioBlock, out: &mut AudioBlock) {
        out.clone_from(input);
        for i in 0..BLOCK_SIZE {
            self.ring[self.write] = input.mono_at(i);
            self.write = (self.write + 1) % FFT_SIZE;
        }
        self.countdown -= 1;
        if self.countdown == 0 {
            self.countdown = self.interval;
            self.refresh();
        }
    }

    /// Recompute the byte spectrum from the most recent `FFT_SIZE` samples.
    pub fn refresh(&mut self) {
        for n in 0..FFT_SIZE {
            let s = self.ring[(self.write + n) % FFT_SIZE];
            self.buffer[n] = Complex::new(s * self.window[n], 0.0);
        }
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let scale = 1.0 / FFT_SIZE as f32;
        let range = MAX_DECIBELS - MIN_DECIBELS;
        for k in 0..FREQUENCY_BINS {
            let magnitude = self.buffer[k].norm() * scale;
            let v = SMOOTHING * self.smoothed[k] + (1.0 - SMOOTHING) * magnitude;
            self.smoothed[k] = if v.is_finite() { v } else { 0.0 };
            let db = if self.smoothed[k] > 0.0 {
                20.0 * self.smoothed[k].log10()
            } else {
                MIN_DECIBELS
            };
            let scaled = 255.0 * (db - MIN_DECIBELS) / range;
            self.bytes[k] = scaled.clamp(0.0, 255.0) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone_block(bin: usize, frame: usize, amp: f32) -> AudioBlock {
        let mut block = AudioBlock::new();
        for i in 0..BLOCK_SIZE {
            let phase = std::f32::consts::TAU * bin as f32 * (frame + i) as f32 / FFT_SIZE as f32;
            let s = amp * phase.sin();
            block.channel_mut(0)[i] = s;
            block.channel_mut(1)[i] = s;
        }
        block
    }

    #[test]
    fn silence_reads_zero() {
        let mut a = Analyser::new(44_100.0);
        let mut out = AudioBlock::new();
        for _ in 0..10 {
            a.process(&AudioBlock::new(), &mut out);
        }
        assert!(a.bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn tone_lights_its_bin() {
        let mut a = Analyser::new(44_100.0);
        let mut out = AudioBlock::new();
        for b in 0..40 {
            a.process(&tone_block(16, b * BLOCK_SIZE, 0.5), &mut out);
        }
        let bytes = a.bytes();
        assert!(bytes[16] > 200, "bin 16 = {}", bytes[16]);
        assert!(bytes[16] > bytes[60]);
    }

    #[test]
    fn input_passes_through() {
        let mut a = Analyser::new(44_100.0);
        let input = tone_block(3, 0, 0.25);
        let mut out = AudioBlock::new();
        a.process(&input, &mut out);
        assert_eq!(out.channel(1)[7], input.channel(1)[7]);
    }
}

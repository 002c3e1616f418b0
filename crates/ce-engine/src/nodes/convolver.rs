//! Stereo convolution reverb.
//!
//! Uniformly partitioned overlap-save: the impulse is split into
//! [`PARTITION`]-sized pieces whose spectra are multiplied against a
//! frequency-domain history of input frames. Output trails input by one
//! partition.

use std::sync::Arc;

use ce_ir::{AudioBlock, BLOCK_SIZE};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

pub const PARTITION: usize = 1024;
const FFT_LEN: usize = PARTITION * 2;

const GAIN_CALIBRATION: f32 = 0.00125;
const GAIN_CALIBRATION_SAMPLE_RATE: f32 = 44_100.0;
const MIN_POWER: f32 = 0.000125;

/// Scale applied to an impulse so that differently loud responses sound alike.
pub fn normalization_scale(channels: &[&[f32]], sample_rate: f32) -> f32 {
    let len = channels.iter().map(|c| c.len()).max().unwrap_or(0);
    let mut power = 0.0f64;
    for ch in channels {
        power += ch.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>();
    }
    let count = (channels.len() * len) as f64;
    let mut rms = if count > 0.0 { (power / count).sqrt() as f32 } else { 0.0 };
    if !rms.is_finite() || rms < MIN_POWER {
        rms = MIN_POWER;
    }
    let mut scale = GAIN_CALIBRATION / rms;
    if sample_rate > 0.0 {
        scale *= GAIN_CALIBRATION_SAMPLE_RATE / sample_rate;
    }
    scale
}

/// One channel's partitions and running state.
struct Lane {
    partitions: Vec<Vec<Complex<f32>>>,
    history: Vec<Vec<Complex<f32>>>,
    head: usize,
    window: Vec<f32>,
    pending: Vec<f32>,
    ready: Vec<f32>,
}

impl Lane {
    fn new(impulse: &[f32], scale: f32, fft: &dyn Fft<f32>, scratch: &mut [Complex<f32>]) -> Self {
        let partitions: Vec<Vec<Complex<f32>>> = impulse
            .chunks(PARTITION)
            .map(|chunk| {
                let mut spectrum = vec![Complex::new(0.0, 0.0); FFT_LEN];
                for (dst, &s) in spectrum.iter_mut().zip(chunk) {
                    *dst = Complex::new(s * scale, 0.0);
                }
                fft.process_with_scratch(&mut spectrum, scratch);
                spectrum
            })
            .collect();
        let history = vec![vec![Complex::new(0.0, 0.0); FFT_LEN]; partitions.len()];
        Self {
            partitions,
            history,
            head: 0,
            window: vec![0.0; FFT_LEN],
            pending: vec![0.0; PARTITION],
            ready: vec![0.0; PARTITION],
        }
    }

    fn run_partition(&mut self, kernels: &mut Kernels) {
        if self.partitions.is_empty() {
            return;
        }
        self.window.copy_within(PARTITION.., 0);
        self.window[PARTITION..].copy_from_slice(&self.pending);

        for (w, &s) in kernels.work.iter_mut().zip(self.window.iter()) {
            *w = Complex::new(s, 0.0);
        }
        kernels.forward.process_with_scratch(&mut kernels.work, &mut kernels.scratch);
        self.history[self.head].copy_from_slice(&kernels.work);

        let count = self.partitions.len();
        kernels.acc.fill(Complex::new(0.0, 0.0));
        for (k, partition) in self.partitions.iter().enumerate() {
            let frame = &self.history[(self.head + count - k) % count];
            for ((a, x), h) in kernels.acc.iter_mut().zip(frame.iter()).zip(partition.iter()) {
                *a += x * h;
            }
        }
        self.head = (self.head + 1) % count;

        kernels.inverse.process_with_scratch(&mut kernels.acc, &mut kernels.scratch);
        let norm = 1.0 / FFT_LEN as f32;
        for (r, a) in self.ready.iter_mut().zip(kernels.acc[PARTITION..].iter()) {
            *r = a.re * norm;
        }
    }
}

struct Kernels {
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    work: Vec<Complex<f32>>,
    acc: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

pub struct Convolver {
    lanes: [Lane; 2],
    kernels: Kernels,
    pos: usize,
}

impl std::fmt::Debug for Convolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Convolver")
            .field("partitions", &self.lanes[0].partitions.len())
            .field("pos", &self.pos)
            .finish()
    }
}

impl Convolver {
    /// Build from a stereo impulse. With `normalize` the impulse is scaled
    /// the same way a Web Audio convolver does it.
    pub fn new(left: &[f32], right: &[f32], sample_rate: f32, normalize: bool) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(FFT_LEN);
        let inverse = planner.plan_fft_inverse(FFT_LEN);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        let mut scratch = vec![Complex::new(0.0, 0.0); scratch_len];

        let scale = if normalize {
            normalization_scale(&[left, right], sample_rate)
        } else {
            1.0
        };
        let lanes = [
            Lane::new(left, scale, forward.as_ref(), &mut scratch),
            Lane::new(right, scale, forward.as_ref(), &mut scratch),
        ];
        Self {
            lanes,
            kernels: Kernels {
                forward,
                inverse,
                work: vec![Complex::new(0.0, 0.0); FFT_LEN],
                acc: vec![Complex::new(0.0, 0.0); FFT_LEN],
                scratch,
            },
            pos: 0,
        }
    }

    /// Frames between input and its first output.
    pub fn latency(&self) -> usize {
        PARTITION
    }

    pub fn partitions(&self) -> usize {
        self.lanes[0].partitions.len()
    }

    pub(super) fn process(&mut self, input: &AudioBlock, out: &mut AudioBlock) {
        for i in 0..BLOCK_SIZE {
            for ch in 0..2 {
                let lane = &mut self.lanes[ch];
                out.channel_mut(ch)[i] = lane.ready[self.pos];
                lane.pending[self.pos] = input.channel(ch)[i];
            }
            self.pos += 1;
            if self.pos == PARTITION {
                self.pos = 0;
                for lane in self.lanes.iter_mut() {
                    lane.run_partition(&mut self.kernels);
                }
            }
        }
    }
}

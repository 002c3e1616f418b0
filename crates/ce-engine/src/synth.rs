//! Sample-buffer generators and small graph recipes shared by layers.

use std::sync::Arc;

use rand::Rng;

use crate::context::AudioContext;
use crate::graph::NodeKey;
use crate::nodes::{FilterKind, Waveform};
use crate::param::ParamId;

/// Length of the shared looping noise buffer.
pub const NOISE_SECONDS: f32 = 2.0;

/// Early-reflection segment of the synthesized reverb impulse.
pub const EARLY_REFLECTION_SECONDS: f32 = 0.1;

/// Decay exponent of the reverb tail.
pub const REVERB_DECAY: f32 = 3.0;

/// Table size for [`distortion_curve`].
pub const DISTORTION_CURVE_SAMPLES: usize = 44_100;

/// Uniform white noise in [-1, 1).
pub fn white_noise<R: Rng + ?Sized>(rng: &mut R, len: usize) -> Vec<f32> {
    (0..len).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
}

/// The looping buffer every noise source plays from.
pub fn noise_buffer<R: Rng + ?Sized>(rng: &mut R, sample_rate: u32) -> Arc<[f32]> {
    let len = (sample_rate as f32 * NOISE_SECONDS) as usize;
    Arc::from(white_noise(rng, len))
}

/// Stereo reverb impulse: a short early-reflection burst followed by a
/// diffuse tail decaying as `(1 - t)^decay`. The right channel sits a
/// little lower than the left.
pub fn reverb_impulse<R: Rng + ?Sized>(
    rng: &mut R,
    sample_rate: u32,
    seconds: f32,
    decay: f32,
) -> [Vec<f32>; 2] {
    let len = (sample_rate as f32 * seconds.max(0.0)) as usize;
    let early = ((sample_rate as f32 * EARLY_REFLECTION_SECONDS) as usize).max(1);
    let mut channels = [Vec::with_capacity(len), Vec::with_capacity(len)];
    for (ch, data) in channels.iter_mut().enumerate() {
        let side = if ch == 1 { 0.95 } else { 1.0 };
        for i in 0..len {
            let envelope = if i < early {
                (1.0 - i as f32 / early as f32).powf(0.5)
            } else {
                (1.0 - i as f32 / len as f32).powf(decay)
            };
            data.push(rng.gen_range(-1.0f32..1.0) * envelope * side);
        }
    }
    channels
}

/// Soft-clipping transfer curve; `amount` is roughly 0..100.
pub fn distortion_curve(amount: f32) -> Arc<[f32]> {
    let deg = std::f32::consts::PI / 180.0;
    let n = DISTORTION_CURVE_SAMPLES;
    (0..n)
        .map(|i| {
            let x = (i * 2) as f32 / n as f32 - 1.0;
            ((3.0 + amount) * x * 20.0 * deg) / (std::f32::consts::PI + amount * x.abs())
        })
        .collect()
}

/// `tanh(x * amount)` sampled over [-1, 1).
pub fn tanh_curve(amount: f32, samples: usize) -> Arc<[f32]> {
    (0..samples)
        .map(|i| {
            let x = (i * 2) as f32 / samples as f32 - 1.0;
            (x * amount).tanh()
        })
        .collect()
}

/// A started noise source feeding a biquad. Connect `filter` onward.
#[derive(Clone, Copy, Debug)]
pub struct FilteredNoise {
    pub source: NodeKey,
    pub filter: NodeKey,
}

impl FilteredNoise {
    pub fn nodes(&self) -> [NodeKey; 2] {
        [self.source, self.filter]
    }
}

pub fn filtered_noise(ctx: &mut AudioContext, kind: FilterKind, frequency: f32, q: f32) -> FilteredNoise {
    let source = ctx.noise();
    let filter = ctx.biquad(kind, frequency, q);
    ctx.connect(source, filter);
    let now = ctx.now();
    ctx.start_source(source, now);
    FilteredNoise { source, filter }
}

/// A started sine LFO scaled by `depth`, added onto `target`'s `param`.
#[derive(Clone, Copy, Debug)]
pub struct Lfo {
    pub osc: NodeKey,
    pub depth: NodeKey,
}

impl Lfo {
    pub fn nodes(&self) -> [NodeKey; 2] {
        [self.osc, self.depth]
    }
}

pub fn lfo(ctx: &mut AudioContext, rate: f32, depth: f32, target: NodeKey, param: ParamId) -> Lfo {
    let osc = ctx.oscillator(Waveform::Sine, rate);
    let amount = ctx.gain(depth);
    ctx.connect(osc, amount);
    ctx.connect_param(amount, target, param);
    let now = ctx.now();
    ctx.start_source(osc, now);
    Lfo { osc, depth: amount }
}

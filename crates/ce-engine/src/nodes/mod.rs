//! Signal processors that live inside the graph.
//!
//! Every node renders one stereo [`AudioBlock`] per quantum. Sources ignore
//! their input; effects transform it. Parameter modulation arrives as a
//! per-frame buffer that is added on top of the node's own automation.

mod analyser;
mod convolver;
mod delay;
mod dynamics;
mod filter;
mod source;

pub use analyser::{Analyser, FFT_SIZE, FREQUENCY_BINS};
pub use convolver::Convolver;
pub use delay::{Delay, DelayLine, Widener};
pub use dynamics::{Compressor, CompressorSettings};
pub use filter::{Biquad, BiquadCoeffs, FilterKind};
pub use source::{NoiseSource, Oscillator, SourceSchedule, Waveform};

use std::sync::Arc;

use ce_ir::{AudioBlock, BLOCK_SIZE};

use crate::param::{Param, ParamId};

/// Per-block information every processor needs.
#[derive(Clone, Copy, Debug)]
pub struct ProcessContext {
    /// Absolute frame of the first sample in the block.
    pub frame: u64,
    pub sample_rate: f32,
}

/// Audio-rate modulation gathered from param connections for one node.
pub struct Modulation {
    buffers: [[f32; BLOCK_SIZE]; ParamId::COUNT],
    active: [bool; ParamId::COUNT],
}

impl Default for Modulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Modulation {
    pub const fn new() -> Self {
        Self {
            buffers: [[0.0; BLOCK_SIZE]; ParamId::COUNT],
            active: [false; ParamId::COUNT],
        }
    }

    pub fn reset(&mut self) {
        self.active = [false; ParamId::COUNT];
    }

    /// Sum the mono mix of `source` into the modulation buffer for `id`.
    pub fn add(&mut self, id: ParamId, source: &AudioBlock) {
        let idx = id.index();
        let buf = &mut self.buffers[idx];
        if !self.active[idx] {
            buf.fill(0.0);
            self.active[idx] = true;
        }
        for (i, v) in buf.iter_mut().enumerate() {
            *v += source.mono_at(i);
        }
    }

    pub fn is_active(&self, id: ParamId) -> bool {
        self.active[id.index()]
    }

    /// Add any modulation for `id` onto already-computed param values.
    pub fn apply(&self, id: ParamId, values: &mut [f32; BLOCK_SIZE]) {
        let idx = id.index();
        if !self.active[idx] {
            return;
        }
        for (v, m) in values.iter_mut().zip(self.buffers[idx].iter()) {
            *v += *m;
        }
    }
}

/// Render a parameter's automation plus modulation for one block.
pub(crate) fn param_block(
    param: &mut Param,
    id: ParamId,
    cx: &ProcessContext,
    mods: &Modulation,
    out: &mut [f32; BLOCK_SIZE],
) {
    param.fill(cx.frame, out);
    mods.apply(id, out);
}

/// Multiplies its input by an automatable gain.
#[derive(Debug)]
pub struct Gain {
    pub gain: Param,
    values: [f32; BLOCK_SIZE],
}

impl Gain {
    pub fn new(gain: f32) -> Self {
        Self {
            gain: Param::new(gain),
            values: [0.0; BLOCK_SIZE],
        }
    }

    fn process(&mut self, cx: &ProcessContext, input: &AudioBlock, mods: &Modulation, out: &mut AudioBlock) {
        param_block(&mut self.gain, ParamId::Gain, cx, mods, &mut self.values);
        out.clone_from(input);
        out.apply_gain_curve(&self.values);
    }
}

/// Maps each sample through a transfer curve, like a Web Audio shaper.
#[derive(Debug)]
pub struct WaveShaper {
    curve: Arc<[f32]>,
}

impl WaveShaper {
    pub fn new(curve: Arc<[f32]>) -> Self {
        Self { curve }
    }

    pub fn shape(&self, x: f32) -> f32 {
        let n = self.curve.len();
        match n {
            0 => x,
            1 => self.curve[0],
            _ => {
                let pos = (n - 1) as f32 * (x + 1.0) * 0.5;
                if pos <= 0.0 {
                    return self.curve[0];
                }
                if pos >= (n - 1) as f32 {
                    return self.curve[n - 1];
                }
                let i = pos as usize;
                let frac = pos - i as f32;
                self.curve[i] + (self.curve[i + 1] - self.curve[i]) * frac
            }
        }
    }

    fn process(&mut self, input: &AudioBlock, out: &mut AudioBlock) {
        for ch in 0..2 {
            let src = input.channel(ch);
            for (o, x) in out.channel_mut(ch).iter_mut().zip(src.iter()) {
                *o = self.shape(*x);
            }
        }
    }
}

/// Equal-power stereo panner.
#[derive(Debug)]
pub struct StereoPanner {
    pub pan: Param,
    values: [f32; BLOCK_SIZE],
}

impl StereoPanner {
    pub fn new(pan: f32) -> Self {
        Self {
            pan: Param::new(pan),
            values: [0.0; BLOCK_SIZE],
        }
    }

    fn process(&mut self, cx: &ProcessContext, input: &AudioBlock, mods: &Modulation, out: &mut AudioBlock) {
        param_block(&mut self.pan, ParamId::Pan, cx, mods, &mut self.values);
        let (left, right) = out.split_mut();
        for i in 0..BLOCK_SIZE {
            let pan = self.values[i].clamp(-1.0, 1.0);
            let in_l = input.channel(0)[i];
            let in_r = input.channel(1)[i];
            if pan <= 0.0 {
                let x = (pan + 1.0) * std::f32::consts::FRAC_PI_2;
                left[i] = in_l + in_r * x.cos();
                right[i] = in_r * x.sin();
            } else {
                let x = pan * std::f32::consts::FRAC_PI_2;
                left[i] = in_l * x.cos();
                right[i] = in_r + in_l * x.sin();
            }
        }
    }
}

/// Every node kind the graph can hold.
pub enum Processor {
    /// Final sum delivered to the output device.
    Destination,
    Gain(Gain),
    Oscillator(Oscillator),
    Noise(NoiseSource),
    Biquad(Biquad),
    Delay(Delay),
    Widener(Widener),
    Shaper(WaveShaper),
    Panner(StereoPanner),
    Convolver(Convolver),
    Compressor(Compressor),
    Analyser(Analyser),
}

impl Processor {
    pub fn name(&self) -> &'static str {
        match self {
            Processor::Destination => "destination",
            Processor::Gain(_) => "gain",
            Processor::Oscillator(_) => "oscillator",
            Processor::Noise(_) => "noise",
            Processor::Biquad(_) => "biquad",
            Processor::Delay(_) => "delay",
            Processor::Widener(_) => "widener",
            Processor::Shaper(_) => "waveshaper",
            Processor::Panner(_) => "panner",
            Processor::Convolver(_) => "convolver",
            Processor::Compressor(_) => "compressor",
            Processor::Analyser(_) => "analyser",
        }
    }

    /// Delay nodes read last block's input, which lets them close feedback loops.
    pub fn is_deferred(&self) -> bool {
        matches!(self, Processor::Delay(_))
    }

    pub fn param(&self, id: ParamId) -> Option<&Param> {
        match (self, id) {
            (Processor::Gain(g), ParamId::Gain) => Some(&g.gain),
            (Processor::Oscillator(o), ParamId::Frequency) => Some(&o.frequency),
            (Processor::Oscillator(o), ParamId::Detune) => Some(&o.detune),
            (Processor::Biquad(b), ParamId::Frequency) => Some(&b.frequency),
            (Processor::Biquad(b), ParamId::Q) => Some(&b.q),
            (Processor::Delay(d), ParamId::DelayTime) => Some(&d.time),
            (Processor::Panner(p), ParamId::Pan) => Some(&p.pan),
            _ => None,
        }
    }

    pub fn param_mut(&mut self, id: ParamId) -> Option<&mut Param> {
        match (self, id) {
            (Processor::Gain(g), ParamId::Gain) => Some(&mut g.gain),
            (Processor::Oscillator(o), ParamId::Frequency) => Some(&mut o.frequency),
            (Processor::Oscillator(o), ParamId::Detune) => Some(&mut o.detune),
            (Processor::Biquad(b), ParamId::Frequency) => Some(&mut b.frequency),
            (Processor::Biquad(b), ParamId::Q) => Some(&mut b.q),
            (Processor::Delay(d), ParamId::DelayTime) => Some(&mut d.time),
            (Processor::Panner(p), ParamId::Pan) => Some(&mut p.pan),
            _ => None,
        }
    }

    /// Source scheduling, for node kinds that have one.
    pub fn schedule_mut(&mut self) -> Option<&mut SourceSchedule> {
        match self {
            Processor::Oscillator(o) => Some(&mut o.schedule),
            Processor::Noise(n) => Some(&mut n.schedule),
            _ => None,
        }
    }

    pub fn process(
        &mut self,
        cx: &ProcessContext,
        input: &AudioBlock,
        mods: &Modulation,
        out: &mut AudioBlock,
    ) {
        match self {
            Processor::Destination => out.clone_from(input),
            Processor::Gain(g) => g.process(cx, input, mods, out),
            Processor::Oscillator(o) => o.process(cx, mods, out),
            Processor::Noise(n) => n.process(cx, out),
            Processor::Biquad(b) => b.process(cx, input, mods, out),
            Processor::Delay(d) => d.process(cx, mods, out),
            Processor::Widener(w) => w.process(cx, input, out),
            Processor::Shaper(s) => s.process(input, out),
            Processor::Panner(p) => p.process(cx, input, mods, out),
            Processor::Convolver(c) => c.process(input, out),
            Processor::Compressor(c) => c.process(input, out),
            Processor::Analyser(a) => a.process(input, out),
        }
    }

    /// Second pass for deferred nodes: hand them this block's input.
    pub fn commit(&mut self, cx: &ProcessContext, input: &AudioBlock) {
        if let Processor::Delay(d) = self {
            d.commit(cx, input);
        }
    }
}

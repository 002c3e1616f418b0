//! Mechanical layers: machinery hum, hydraulics, creaking hull, beeps.

use ce_ir::{LayerSpec, Mood};

use super::{end_event, strike, tone};
use crate::context::AudioContext;
use crate::layer::{layer_basics, Layer, LayerCore, LayerCx, FADE_FLOOR};
use crate::nodes::{FilterKind, Waveform};
use crate::param::ParamId;
use crate::synth;

const TICK: u16 = 0;

/// Resonant machine hum: a wobbling sawtooth through a narrow band and a
/// comb filter tuned to its period.
pub struct Mechanical {
    core: LayerCore,
}

impl Mechanical {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self { core: LayerCore::new(spec, mood) }
    }
}

impl Layer for Mechanical {
    layer_basics!("mechanical");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        let f = self.core.spec.frequency_or(60.0);
        let osc = tone(cx, Waveform::Sawtooth, f);
        synth::lfo(cx, 0.3, f * 0.02, osc, ParamId::Frequency);
        let band = cx.biquad(FilterKind::Bandpass, f * 4.0, 10.0);
        let comb = cx.delay(1.0, 1.0 / f);
        let feedback = cx.gain(0.8);
        let out = cx.out();
        cx.connect(osc, band);
        cx.connect(band, out);
        cx.connect(band, comb);
        cx.connect(comb, feedback);
        cx.connect(feedback, comb);
        cx.connect(comb, out);
        self.core.note_event();
    }
}

/// Pneumatic hiss followed by a low clunk, every 3-7 s.
pub struct Hydraulic {
    core: LayerCore,
}

impl Hydraulic {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self { core: LayerCore::new(spec, mood) }
    }

    fn cycle(&mut self, cx: &mut LayerCx<'_>) {
        let now = cx.now();
        let hiss = synth::filtered_noise(cx, FilterKind::Highpass, 2000.0, 1.0);
        let hiss_env = cx.voice_gain(0.0);
        cx.connect(hiss.filter, hiss_env);
        super::swell(cx, hiss_env, 0.08, now, 0.1, 0.5);
        end_event(cx, &[hiss.source], &[hiss.filter, hiss_env], now + 0.5);

        let clunk = tone(cx, Waveform::Sawtooth, 80.0);
        cx.exp_ramp(clunk, ParamId::Frequency, 40.0, now + 0.1);
        let band = cx.biquad(FilterKind::Bandpass, 60.0, 5.0);
        let clunk_env = cx.voice_gain(0.0);
        cx.connect(clunk, band);
        cx.connect(band, clunk_env);
        strike(cx, clunk_env, 0.2, now, 0.1);
        end_event(cx, &[clunk], &[band, clunk_env], now + 0.1);

        self.core.note_event();
        let next = cx.random_range(3.0, 7.0);
        self.core.schedule(cx, next, TICK);
    }
}

impl Layer for Hydraulic {
    layer_basics!("hydraulic");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        self.cycle(cx);
    }

    fn on_timer(&mut self, _tag: u16, cx: &mut LayerCx<'_>) {
        self.cycle(cx);
    }
}

/// Hull creak: a distorted sawtooth sagging in pitch.
pub struct MetalStress {
    core: LayerCore,
}

impl MetalStress {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self { core: LayerCore::new(spec, mood) }
    }

    fn creak(&mut self, cx: &mut LayerCx<'_>) {
        let now = cx.now();
        let start = 100.0 + cx.random() as f32 * 100.0;
        let osc = tone(cx, Waveform::Sawtooth, start);
        cx.linear_ramp(osc, ParamId::Frequency, start * 0.7, now + 0.5);
        let band = cx.biquad(FilterKind::Bandpass, start * 2.0, 20.0);
        let shaper = cx.shaper(synth::distortion_curve(10.0));
        let env = cx.voice_gain(0.0);
        cx.connect(osc, band);
        cx.connect(band, shaper);
        cx.connect(shaper, env);
        cx.set_value_at(env, ParamId::Gain, 0.0, now);
        cx.linear_ramp(env, ParamId::Gain, 0.1, now + 0.05);
        cx.linear_ramp(env, ParamId::Gain, 0.05, now + 0.3);
        cx.exp_ramp(env, ParamId::Gain, FADE_FLOOR, now + 0.5);
        end_event(cx, &[osc], &[band, shaper, env], now + 0.5);

        self.core.note_event();
        let next = cx.random_range(3.0, 10.0);
        self.core.schedule(cx, next, TICK);
    }
}

impl Layer for MetalStress {
    layer_basics!("metal_stress");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        self.creak(cx);
    }

    fn on_timer(&mut self, _tag: u16, cx: &mut LayerCx<'_>) {
        self.creak(cx);
    }
}

static BEEP_FREQUENCIES: [f32; 3] = [440.0, 880.0, 1320.0];

/// Short square blips stepping through a list of pitches.
pub struct SystemBeep {
    core: LayerCore,
    index: usize,
}

impl SystemBeep {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self {
            core: LayerCore::new(spec, mood),
            index: 0,
        }
    }

    fn beep(&mut self, cx: &mut LayerCx<'_>) {
        let frequencies = self.core.spec.frequencies_or(&BEEP_FREQUENCIES);
        let f = frequencies[self.index % frequencies.len()];
        self.index += 1;

        let now = cx.now();
        let osc = tone(cx, Waveform::Square, f);
        let lowpass = cx.biquad(FilterKind::Lowpass, f * 2.0, 1.0);
        let env = cx.voice_gain(0.1);
        cx.connect(osc, lowpass);
        cx.connect(lowpass, env);
        cx.set_value_at(env, ParamId::Gain, 0.1, now);
        cx.set_value_at(env, ParamId::Gain, 0.0, now + 0.05);
        end_event(cx, &[osc], &[lowpass, env], now + 0.05);

        self.core.note_event();
        let next = cx.random_range(0.5, 2.5);
        self.core.schedule(cx, next, TICK);
    }
}

impl Layer for SystemBeep {
    layer_basics!("system_beep");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        self.beep(cx);
    }

    fn on_timer(&mut self, _tag: u16, cx: &mut LayerCx<'_>) {
        self.beep(cx);
    }
}

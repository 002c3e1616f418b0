//! Foundation layers: sustained low tones and slow bodily rhythms.

use arrayvec::ArrayVec;
use ce_ir::{chord_offset, transpose, LayerSpec, Mood};

use super::{end_event, tone};
use crate::context::AudioContext;
use crate::graph::NodeKey;
use crate::layer::{layer_basics, Layer, LayerCore, LayerCx};
use crate::nodes::{FilterKind, Waveform};
use crate::param::ParamId;
use crate::synth;

const TICK: u16 = 0;

/// A detuned sine with a slow, slightly randomised vibrato.
pub struct Drone {
    core: LayerCore,
}

impl Drone {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self { core: LayerCore::new(spec, mood) }
    }
}

impl Layer for Drone {
    layer_basics!("drone");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        let f = self.core.spec.frequency_or(55.0);
        let osc = cx.oscillator(Waveform::Sine, f);
        cx.set_value(osc, ParamId::Detune, self.core.spec.detune_or(0.0));
        let out = cx.out();
        cx.connect(osc, out);
        let now = cx.now();
        cx.start_source(osc, now);

        let rate = 0.1 + cx.random() as f32 * 0.05;
        synth::lfo(cx, rate, f * 0.01, osc, ParamId::Frequency);
        self.core.note_event();
    }
}

/// Sub-bass sine breathing at 0.03 Hz.
pub struct Sub {
    core: LayerCore,
}

impl Sub {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self { core: LayerCore::new(spec, mood) }
    }
}

impl Layer for Sub {
    layer_basics!("sub");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        let f = self.core.spec.frequency_or(27.5);
        let osc = tone(cx, Waveform::Sine, f);
        let out = cx.out();
        cx.connect(osc, out);
        synth::lfo(cx, 0.03, f * 0.005, osc, ParamId::Frequency);
        self.core.note_event();
    }
}

static PAD_FREQUENCIES: [f32; 3] = [220.0, 330.0, 440.0];

const PAD_VOICES: usize = 8;
const PAD_CHECK_SECONDS: f64 = 2.0;
const PAD_GLIDE_SECONDS: f64 = 1.0;

/// Filtered sawtooth chord that follows the chord clock.
///
/// Voice `i` plays frequency `i` shifted by note `i` of the current chord.
/// A chord update is picked up by the next periodic check, which glides
/// every voice to its new pitch.
pub struct Pad {
    core: LayerCore,
    voices: ArrayVec<(NodeKey, f32), PAD_VOICES>,
    voiced: usize,
}

impl Pad {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self {
            core: LayerCore::new(spec, mood),
            voices: ArrayVec::new(),
            voiced: 0,
        }
    }

    fn pitch(&self, base: f32, voice: usize) -> f32 {
        let offset = chord_offset(self.core.mood, self.core.chord_index(), voice);
        transpose(base, offset as f32)
    }
}

impl Layer for Pad {
    layer_basics!("pad");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        let frequencies = self.core.spec.frequencies_or(&PAD_FREQUENCIES);
        self.voiced = self.core.chord_index();
        for (i, &base) in frequencies.iter().take(PAD_VOICES).enumerate() {
            let osc = tone(cx, Waveform::Sawtooth, self.pitch(base, i));
            let filter = cx.biquad(FilterKind::Lowpass, 1000.0 + i as f32 * 200.0, 2.0);
            let level = cx.voice_gain(0.3);
            cx.connect(osc, filter);
            cx.connect(filter, level);
            synth::lfo(cx, 0.2 + i as f32 * 0.1, 300.0, filter, ParamId::Frequency);
            self.voices.push((osc, base));
        }
        self.core.note_event();
        self.core.schedule(cx, PAD_CHECK_SECONDS, TICK);
    }

    fn on_timer(&mut self, _tag: u16, cx: &mut LayerCx<'_>) {
        if self.voiced != self.core.chord_index() {
            self.voiced = self.core.chord_index();
            let now = cx.now();
            for i in 0..self.voices.len() {
                let (osc, base) = self.voices[i];
                let target = self.pitch(base, i);
                cx.hold(osc, ParamId::Frequency);
                cx.linear_ramp(osc, ParamId::Frequency, target, now + PAD_GLIDE_SECONDS);
            }
            self.core.note_event();
        }
        self.core.schedule(cx, PAD_CHECK_SECONDS, TICK);
    }
}

const HEARTBEAT_PERIOD: f64 = 1.2;

/// Lub-dub: two falling sine thumps 0.2 s apart every 1.2 s.
pub struct Heartbeat {
    core: LayerCore,
}

impl Heartbeat {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self { core: LayerCore::new(spec, mood) }
    }

    fn beat(&mut self, cx: &mut LayerCx<'_>, at: f64) {
        let f = self.core.spec.frequency_or(60.0);
        let osc = cx.oscillator(Waveform::Sine, f);
        cx.set_value_at(osc, ParamId::Frequency, f, at);
        cx.exp_ramp(osc, ParamId::Frequency, f * 0.5, at + 0.2);
        let env = cx.voice_gain(0.0);
        cx.connect(osc, env);
        super::swell(cx, env, 0.3, at, 0.05, 0.3);

        let sub = cx.oscillator(Waveform::Sine, f * 0.5);
        let sub_env = cx.voice_gain(0.0);
        cx.connect(sub, sub_env);
        super::strike(cx, sub_env, 0.2, at, 0.3);

        cx.start_source(osc, at);
        cx.start_source(sub, at);
        end_event(cx, &[osc, sub], &[env, sub_env], at + 0.3);
        self.core.note_event();
    }

    fn pulse(&mut self, cx: &mut LayerCx<'_>) {
        let now = cx.now();
        self.beat(cx, now);
        self.beat(cx, now + 0.2);
        self.core.schedule(cx, HEARTBEAT_PERIOD, TICK);
    }
}

impl Layer for Heartbeat {
    layer_basics!("heartbeat");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        self.pulse(cx);
    }

    fn on_timer(&mut self, _tag: u16, cx: &mut LayerCx<'_>) {
        self.pulse(cx);
    }
}

const BREATH_CYCLE: f64 = 4.0;

/// Swept band of noise: a 1.5 s inhale, short hold, 2 s exhale.
pub struct Breathing {
    core: LayerCore,
}

impl Breathing {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self { core: LayerCore::new(spec, mood) }
    }

    fn breathe(&mut self, cx: &mut LayerCx<'_>) {
        let now = cx.now();
        let noise = synth::filtered_noise(cx, FilterKind::Lowpass, 400.0, 1.0);
        let band = cx.biquad(FilterKind::Bandpass, 300.0, 1.0);
        cx.linear_ramp(band, ParamId::Frequency, 500.0, now + 1.5);
        cx.linear_ramp(band, ParamId::Frequency, 300.0, now + 3.5);
        let env = cx.voice_gain(0.0);
        cx.connect(noise.filter, band);
        cx.connect(band, env);
        cx.set_value_at(env, ParamId::Gain, 0.0, now);
        cx.linear_ramp(env, ParamId::Gain, 0.15, now + 1.5);
        cx.set_value_at(env, ParamId::Gain, 0.15, now + 1.8);
        cx.linear_ramp(env, ParamId::Gain, 0.0, now + 3.5);
        end_event(cx, &[noise.source], &[noise.filter, band, env], now + 3.5);
        self.core.note_event();
        self.core.schedule(cx, BREATH_CYCLE, TICK);
    }
}

impl Layer for Breathing {
    layer_basics!("breathing");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        self.breathe(cx);
    }

    fn on_timer(&mut self, _tag: u16, cx: &mut LayerCx<'_>) {
        self.breathe(cx);
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{lifecycle, Harness};
    use super::*;
    use crate::layer::LayerUpdate;

    #[test]
    fn drone_plays_and_releases() {
        lifecycle(LayerSpec::new("drone").frequency(55.0).detune(-10.0).gain(0.2), Mood::Tense, 1.0);
    }

    #[test]
    fn sub_plays_and_releases() {
        let h = lifecycle(LayerSpec::new("sub").frequency(27.5).gain(0.2), Mood::Peaceful, 1.0);
        assert_eq!(h.events(), 1);
    }

    #[test]
    fn heartbeat_counts_two_beats_per_cycle() {
        let mut h = Harness::start(LayerSpec::new("heartbeat").frequency(60.0).gain(0.12), Mood::Tense);
        h.run(2.5);
        // cycles at 0, 1.2 and 2.4 s
        assert_eq!(h.events(), 6);
        assert!(h.peak > 0.0);
    }

    #[test]
    fn heartbeat_releases() {
        lifecycle(LayerSpec::new("heartbeat").gain(0.12), Mood::Tense, 2.0);
    }

    #[test]
    fn breathing_every_four_seconds() {
        let mut h = Harness::start(LayerSpec::new("breathing").gain(0.05), Mood::Tense);
        h.run(8.5);
        assert_eq!(h.events(), 3);
        h.stop(0.2);
        h.run(0.5);
        assert_eq!(h.nodes(), 0);
    }

    #[test]
    fn pad_one_voice_per_frequency() {
        let spec = LayerSpec::new("pad").frequencies(&[220.0, 330.0, 440.0, 550.0]).gain(0.04);
        let h = Harness::start(spec, Mood::Peaceful);
        // amp + 4 x (osc, filter, gain, lfo osc, lfo depth)
        assert_eq!(h.nodes(), 1 + 4 * 5);
        lifecycle(spec, Mood::Peaceful, 1.0);
    }

    #[test]
    fn pad_revoices_on_next_check_only() {
        let spec = LayerSpec::new("pad").frequencies(&[220.0]).gain(0.04);
        let mut h = Harness::start(spec, Mood::Peaceful);
        h.run(2.5);
        assert_eq!(h.events(), 1);

        h.layer.update(&LayerUpdate { chord_index: 1 });
        assert_eq!(h.layer.core().chord_index(), 1);
        // nothing changes before the check at 4 s
        assert_eq!(h.events(), 1);
        h.run(2.0);
        assert_eq!(h.events(), 2);
        h.run(2.0);
        assert_eq!(h.events(), 2);
    }

    #[test]
    fn pad_glides_to_chord_root() {
        let spec = LayerSpec::new("pad").frequencies(&[220.0]).gain(0.04);
        let mut h = Harness::start(spec, Mood::Peaceful);
        h.layer.update(&LayerUpdate { chord_index: 1 });
        h.run(4.0);
        let osc = h.ctx.graph().inputs(h.layer.core().amp().unwrap())[0].from;
        let osc = h.ctx.graph().inputs(osc)[0].from;
        let osc = h.ctx.graph().inputs(osc)[0].from;
        // peaceful chord 1 starts a fourth up
        let expected = transpose(220.0, 5.0);
        let f = h.ctx.param_value(osc, ParamId::Frequency).unwrap();
        assert!((f - expected).abs() < 0.5, "{} vs {}", f, expected);
    }
}

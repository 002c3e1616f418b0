//! Atmospheric layers: air, noise and distant voices.

use arrayvec::ArrayVec;
use ce_ir::{LayerSpec, Mood};

use super::end_event;
use crate::context::AudioContext;
use crate::graph::NodeKey;
use crate::layer::{layer_basics, Layer, LayerCore, LayerCx, MAX_LAYER_TIMERS};
use crate::nodes::{FilterKind, Waveform};
use crate::param::ParamId;
use crate::synth;

const TICK: u16 = 0;

const SHIMMER_VOICES: usize = 4;

/// High sines drifting across the stereo field, each fading in and out
/// on its own schedule.
pub struct Shimmer {
    core: LayerCore,
    envelopes: ArrayVec<NodeKey, SHIMMER_VOICES>,
}

impl Shimmer {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self {
            core: LayerCore::new(spec, mood),
            envelopes: ArrayVec::new(),
        }
    }
}

impl Layer for Shimmer {
    layer_basics!("shimmer");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        let base = self.core.spec.base_freq_or(880.0);
        for i in 0..SHIMMER_VOICES {
            let f = base + cx.random() as f32 * 1000.0;
            let osc = super::tone(cx, Waveform::Sine, f);
            let env = cx.gain(0.0);
            let panner = cx.panner(0.0);
            let out = cx.out();
            cx.connect(osc, env);
            cx.connect(env, panner);
            cx.connect(panner, out);
            let rate = 0.05 + cx.random() as f32 * 0.1;
            synth::lfo(cx, rate, 1.0, panner, ParamId::Pan);
            self.envelopes.push(env);
            self.core.schedule(cx, i as f64 * 2.0, i as u16);
        }
    }

    fn on_timer(&mut self, tag: u16, cx: &mut LayerCx<'_>) {
        let Some(&env) = self.envelopes.get(tag as usize) else {
            return;
        };
        let now = cx.now();
        cx.hold(env, ParamId::Gain);
        cx.linear_ramp(env, ParamId::Gain, 0.5, now + 2.0);
        cx.linear_ramp(env, ParamId::Gain, 0.0, now + 5.0);
        self.core.note_event();
        let next = cx.random_range(8.0, 12.0);
        self.core.schedule(cx, next, tag);
    }
}

static WHISPER_FREQUENCIES: [f32; 3] = [1100.0, 1650.0, 2200.0];

/// Narrow noise bands that swell like distant voices.
pub struct Whisper {
    core: LayerCore,
}

impl Whisper {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self { core: LayerCore::new(spec, mood) }
    }
}

impl Layer for Whisper {
    layer_basics!("whisper");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        let voices = self.core.spec.frequencies_or(&WHISPER_FREQUENCIES).len();
        if voices > MAX_LAYER_TIMERS {
            log::warn!("whisper: {} frequencies, only the first {} swell", voices, MAX_LAYER_TIMERS);
        }
        for i in 0..voices.min(MAX_LAYER_TIMERS) {
            self.core.schedule(cx, i as f64 * 2.0, i as u16);
        }
    }

    fn on_timer(&mut self, tag: u16, cx: &mut LayerCx<'_>) {
        let frequencies = self.core.spec.frequencies_or(&WHISPER_FREQUENCIES);
        let Some(&f) = frequencies.get(tag as usize) else {
            return;
        };
        let now = cx.now();
        let noise = synth::filtered_noise(cx, FilterKind::Bandpass, f, 50.0);
        let env = cx.voice_gain(0.0);
        cx.connect(noise.filter, env);
        cx.set_value_at(env, ParamId::Gain, 0.0, now);
        cx.linear_ramp(env, ParamId::Gain, 0.05, now + 1.0);
        cx.linear_ramp(env, ParamId::Gain, 0.0, now + 3.0);
        end_event(cx, &[noise.source], &[noise.filter, env], now + 3.0);
        self.core.note_event();
        let next = cx.random_range(5.0, 10.0);
        self.core.schedule(cx, next, tag);
    }
}

/// A slow lowpass sweep of noise every 5 s.
pub struct Breath {
    core: LayerCore,
}

impl Breath {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self { core: LayerCore::new(spec, mood) }
    }

    fn exhale(&mut self, cx: &mut LayerCx<'_>) {
        let now = cx.now();
        let noise = synth::filtered_noise(cx, FilterKind::Lowpass, 500.0, 2.0);
        let sweep = cx.biquad(FilterKind::Lowpass, 500.0, 1.0);
        cx.linear_ramp(sweep, ParamId::Frequency, 700.0, now + 2.0);
        cx.linear_ramp(sweep, ParamId::Frequency, 500.0, now + 4.0);
        let env = cx.voice_gain(0.0);
        cx.connect(noise.filter, sweep);
        cx.connect(sweep, env);
        cx.set_value_at(env, ParamId::Gain, 0.0, now);
        cx.linear_ramp(env, ParamId::Gain, 0.1, now + 2.0);
        cx.linear_ramp(env, ParamId::Gain, 0.0, now + 4.0);
        end_event(cx, &[noise.source], &[noise.filter, sweep, env], now + 4.0);
        self.core.note_event();
        self.core.schedule(cx, 5.0, TICK);
    }
}

impl Layer for Breath {
    layer_basics!("breath");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        self.exhale(cx);
    }

    fn on_timer(&mut self, _tag: u16, cx: &mut LayerCx<'_>) {
        self.exhale(cx);
    }
}

/// Ventilation hum: dark noise with a gentle 0.2 Hz level wobble.
pub struct AirFlow {
    core: LayerCore,
}

impl AirFlow {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self { core: LayerCore::new(spec, mood) }
    }
}

impl Layer for AirFlow {
    layer_basics!("air_flow");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        let noise = synth::filtered_noise(cx, FilterKind::Lowpass, 300.0, 0.5);
        let level = cx.voice_gain(self.core.spec.gain_or(0.02));
        cx.connect(noise.filter, level);
        synth::lfo(cx, 0.2, 0.02, level, ParamId::Gain);
        self.core.note_event();
    }
}

/// Garbled radio traffic: bursts of band-limited noise through a
/// saturating shaper.
pub struct CommChatter {
    core: LayerCore,
}

impl CommChatter {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self { core: LayerCore::new(spec, mood) }
    }

    fn chatter(&mut self, cx: &mut LayerCx<'_>) {
        let now = cx.now();
        let center = 1000.0 + cx.random() as f32 * 1000.0;
        let noise = synth::filtered_noise(cx, FilterKind::Bandpass, center, 10.0);
        let env = cx.gain(0.0);
        let shaper = cx.shaper(synth::tanh_curve(5.0, 256));
        let highpass = cx.biquad(FilterKind::Highpass, 300.0, 1.0);
        let out = cx.out();
        cx.connect(noise.filter, env);
        cx.connect(env, shaper);
        cx.connect(shaper, highpass);
        cx.connect(highpass, out);

        let duration = 2.0 + cx.random() * 2.0;
        let mut t = 0.0;
        while t < duration {
            let level = cx.random() as f32 * 0.03;
            cx.set_value_at(env, ParamId::Gain, level, now + t);
            t += 0.05 + cx.random() * 0.1;
            cx.set_value_at(env, ParamId::Gain, 0.0, now + t);
            t += cx.random() * 0.1;
        }
        end_event(cx, &[noise.source], &[noise.filter, env, shaper, highpass], now + duration);
        self.core.note_event();
        let next = cx.random_range(8.0, 18.0) + cx.random_range(0.0, 5.0);
        self.core.schedule(cx, next, TICK);
    }
}

impl Layer for CommChatter {
    layer_basics!("comm_chatter");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        let first = cx.random_range(0.0, 5.0);
        self.core.schedule(cx, first, TICK);
    }

    fn on_timer(&mut self, _tag: u16, cx: &mut LayerCx<'_>) {
        self.chatter(cx);
    }
}

/// Broadband hiss whose level is nudged every 100-300 ms.
pub struct Static {
    core: LayerCore,
    level: Option<NodeKey>,
}

impl Static {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self {
            core: LayerCore::new(spec, mood),
            level: None,
        }
    }
}

impl Layer for Static {
    layer_basics!("static");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        let noise = synth::filtered_noise(cx, FilterKind::Bandpass, 2000.0, 1.0);
        let level = cx.voice_gain(self.core.gain);
        cx.connect(noise.filter, level);
        self.level = Some(level);
        let next = cx.random_range(0.1, 0.3);
        self.core.schedule(cx, next, TICK);
    }

    fn on_timer(&mut self, _tag: u16, cx: &mut LayerCx<'_>) {
        let Some(level) = self.level else { return };
        let target = self.core.gain * (0.5 + cx.random() as f32 * 0.5);
        let now = cx.now();
        cx.linear_ramp(level, ParamId::Gain, target, now + 0.1);
        self.core.note_event();
        let next = cx.random_range(0.1, 0.3);
        self.core.schedule(cx, next, TICK);
    }
}

/// Crackling radio noise with occasional loud bursts.
pub struct RadioStatic {
    core: LayerCore,
    env: Option<NodeKey>,
}

impl RadioStatic {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self {
            core: LayerCore::new(spec, mood),
            env: None,
        }
    }
}

impl Layer for RadioStatic {
    layer_basics!("radio_static");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        let noise = synth::filtered_noise(cx, FilterKind::Bandpass, 2500.0, 5.0);
        let highpass = cx.biquad(FilterKind::Highpass, 500.0, 1.0);
        let env = cx.voice_gain(0.0);
        cx.connect(noise.filter, highpass);
        cx.connect(highpass, env);
        self.env = Some(env);
        let next = cx.random_range(0.05, 0.2);
        self.core.schedule(cx, next, TICK);
    }

    fn on_timer(&mut self, _tag: u16, cx: &mut LayerCx<'_>) {
        let Some(env) = self.env else { return };
        let g = self.core.gain;
        let now = cx.now();
        let target = cx.random() as f32 * g;
        cx.linear_ramp(env, ParamId::Gain, target, now + 0.1);
        if cx.random() < 0.1 {
            cx.set_value_at(env, ParamId::Gain, g * 0.8, now + 0.1);
            cx.linear_ramp(env, ParamId::Gain, target, now + 0.2);
        }
        self.core.note_event();
        let next = cx.random_range(0.05, 0.2);
        self.core.schedule(cx, next, TICK);
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{lifecycle, Harness};
    use super::*;

    #[test]
    fn shimmer_voices_fade_on_staggered_timers() {
        let mut h = Harness::start(LayerSpec::new("shimmer").base_freq(880.0).gain(0.025), Mood::Peaceful);
        assert_eq!(h.layer.core().pending_timers(), 4);
        // voices fire at 0, 2, 4 and 6 s
        h.run(6.5);
        assert_eq!(h.events(), 4);
        assert!(h.peak > 0.0);
    }

    #[test]
    fn shimmer_releases() {
        lifecycle(LayerSpec::new("shimmer").gain(0.025), Mood::Peaceful, 3.0);
    }

    #[test]
    fn whisper_staggers_one_swell_per_frequency() {
        let spec = LayerSpec::new("whisper").frequencies(&[1100.0, 1650.0, 2200.0]).gain(0.015);
        let mut h = Harness::start(spec, Mood::Peaceful);
        h.run(4.5);
        assert_eq!(h.events(), 3);
        lifecycle(spec, Mood::Peaceful, 3.0);
    }

    #[test]
    fn breath_cycles_every_five_seconds() {
        let mut h = Harness::start(LayerSpec::new("breath").gain(0.02), Mood::Peaceful);
        h.run(10.5);
        assert_eq!(h.events(), 3);
    }

    #[test]
    fn breath_releases() {
        lifecycle(LayerSpec::new("breath").gain(0.02), Mood::Peaceful, 2.0);
    }

    #[test]
    fn air_flow_is_continuous() {
        let h = lifecycle(LayerSpec::new("air_flow").gain(0.02), Mood::Peaceful, 1.0);
        assert_eq!(h.events(), 1);
    }

    #[test]
    fn comm_chatter_first_burst_within_five_seconds() {
        let mut h = Harness::start(LayerSpec::new("comm_chatter").gain(0.01), Mood::Peaceful);
        assert_eq!(h.events(), 0);
        h.run(5.1);
        assert_eq!(h.events(), 1);
    }

    #[test]
    fn comm_chatter_releases() {
        lifecycle(LayerSpec::new("comm_chatter").gain(0.01), Mood::Peaceful, 8.0);
    }

    #[test]
    fn static_retargets_often() {
        let mut h = Harness::start(LayerSpec::new("static").gain(0.025), Mood::Tense);
        h.run(3.0);
        assert!((10..=30).contains(&h.events()), "{}", h.events());
        lifecycle(LayerSpec::new("static").gain(0.025), Mood::Tense, 1.0);
    }

    #[test]
    fn radio_static_retargets_often() {
        let mut h = Harness::start(LayerSpec::new("radio_static").gain(0.02), Mood::Tense);
        h.run(2.0);
        assert!((10..=40).contains(&h.events()), "{}", h.events());
        lifecycle(LayerSpec::new("radio_static").gain(0.02), Mood::Tense, 1.0);
    }
}

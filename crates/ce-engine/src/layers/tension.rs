//! Tension layers: gates, alarms, sweeps and rumbles.

use ce_ir::{LayerSpec, Mood};

use super::{end_event, strike, tone};
use crate::context::AudioContext;
use crate::graph::NodeKey;
use crate::layer::{layer_basics, Layer, LayerCore, LayerCx, FADE_FLOOR};
use crate::nodes::{FilterKind, Waveform};
use crate::param::ParamId;
use crate::synth;

const TICK: u16 = 0;

/// Continuous oscillator behind a gain gate opened by a timer.
fn gated(cx: &mut LayerCx<'_>, source: NodeKey) -> NodeKey {
    let gate = cx.voice_gain(0.0);
    cx.connect(source, gate);
    gate
}

/// A square wave gated into short swells twice a second.
pub struct Pulse {
    core: LayerCore,
    gate: Option<NodeKey>,
}

impl Pulse {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self {
            core: LayerCore::new(spec, mood),
            gate: None,
        }
    }

    fn pulse(&mut self, cx: &mut LayerCx<'_>) {
        let Some(gate) = self.gate else { return };
        let now = cx.now();
        cx.set_value_at(gate, ParamId::Gain, 0.0, now);
        cx.linear_ramp(gate, ParamId::Gain, 0.5, now + 0.05);
        cx.linear_ramp(gate, ParamId::Gain, 0.0, now + 0.1);
        self.core.note_event();
        self.core.schedule(cx, 0.5, TICK);
    }
}

impl Layer for Pulse {
    layer_basics!("pulse");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        let osc = tone(cx, Waveform::Square, self.core.spec.frequency_or(110.0));
        self.gate = Some(gated(cx, osc));
        self.pulse(cx);
    }

    fn on_timer(&mut self, _tag: u16, cx: &mut LayerCx<'_>) {
        self.pulse(cx);
    }
}

static DISSONANCE_FREQUENCIES: [f32; 3] = [220.0, 233.08, 246.94];

/// Randomly detuned sawtooths ring-modulated by sines one percent sharp.
pub struct Dissonance {
    core: LayerCore,
}

impl Dissonance {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self { core: LayerCore::new(spec, mood) }
    }
}

impl Layer for Dissonance {
    layer_basics!("dissonance");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        for &f in self.core.spec.frequencies_or(&DISSONANCE_FREQUENCIES) {
            let osc = tone(cx, Waveform::Sawtooth, f);
            let detune = cx.random_range(-15.0, 15.0) as f32;
            cx.set_value(osc, ParamId::Detune, detune);
            let modulator = tone(cx, Waveform::Sine, f * 1.01);
            let ring = cx.gain(0.0);
            let level = cx.voice_gain(0.3);
            cx.connect_param(modulator, ring, ParamId::Gain);
            cx.connect(osc, ring);
            cx.connect(ring, level);
        }
        self.core.note_event();
    }
}

/// A wailing square beeped once a second.
pub struct Warning {
    core: LayerCore,
    gate: Option<NodeKey>,
}

impl Warning {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self {
            core: LayerCore::new(spec, mood),
            gate: None,
        }
    }

    fn beep(&mut self, cx: &mut LayerCx<'_>) {
        let Some(gate) = self.gate else { return };
        let now = cx.now();
        cx.set_value_at(gate, ParamId::Gain, 0.3, now);
        cx.set_value_at(gate, ParamId::Gain, 0.0, now + 0.2);
        self.core.note_event();
        self.core.schedule(cx, 1.0, TICK);
    }
}

impl Layer for Warning {
    layer_basics!("warning");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        let f = self.core.spec.frequency_or(440.0);
        let osc = tone(cx, Waveform::Square, f);
        synth::lfo(cx, 2.0, f * 0.5, osc, ParamId::Frequency);
        self.gate = Some(gated(cx, osc));
        self.beep(cx);
    }

    fn on_timer(&mut self, _tag: u16, cx: &mut LayerCx<'_>) {
        self.beep(cx);
    }
}

/// Rapid-fire bandpassed square blips, ten per second.
pub struct Alarm {
    core: LayerCore,
    gate: Option<NodeKey>,
}

impl Alarm {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self {
            core: LayerCore::new(spec, mood),
            gate: None,
        }
    }

    fn blip(&mut self, cx: &mut LayerCx<'_>) {
        let Some(gate) = self.gate else { return };
        let now = cx.now();
        cx.set_value_at(gate, ParamId::Gain, 0.1, now);
        cx.set_value_at(gate, ParamId::Gain, 0.0, now + 0.05);
        self.core.note_event();
        self.core.schedule(cx, 0.1, TICK);
    }
}

impl Layer for Alarm {
    layer_basics!("alarm");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        let f = self.core.spec.frequency_or(880.0);
        let osc = tone(cx, Waveform::Square, f);
        let band = cx.biquad(FilterKind::Bandpass, f, 5.0);
        cx.connect(osc, band);
        self.gate = Some(gated(cx, band));
        self.blip(cx);
    }

    fn on_timer(&mut self, _tag: u16, cx: &mut LayerCx<'_>) {
        self.blip(cx);
    }
}

const CLUSTER_VOICES: usize = 5;

/// Five sawtooths scattered around a centre pitch, each with its own vibrato.
pub struct Cluster {
    core: LayerCore,
}

impl Cluster {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self { core: LayerCore::new(spec, mood) }
    }
}

impl Layer for Cluster {
    layer_basics!("cluster");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        let base = self.core.spec.base_freq_or(440.0);
        let spread = self.core.spec.spread_or(50.0);
        for _ in 0..CLUSTER_VOICES {
            let f = base + (cx.random() as f32 - 0.5) * spread;
            let osc = tone(cx, Waveform::Sawtooth, f);
            let level = cx.voice_gain(0.04);
            cx.connect(osc, level);
            let rate = 3.0 + cx.random() as f32 * 2.0;
            synth::lfo(cx, rate, f * 0.005, osc, ParamId::Frequency);
        }
        self.core.note_event();
    }
}

/// A falling chirp and an answering ping every 3 s.
pub struct RadarSweep {
    core: LayerCore,
}

impl RadarSweep {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self { core: LayerCore::new(spec, mood) }
    }

    fn sweep(&mut self, cx: &mut LayerCx<'_>) {
        let now = cx.now();
        let chirp = tone(cx, Waveform::Sine, 2000.0);
        cx.exp_ramp(chirp, ParamId::Frequency, 200.0, now + 0.5);
        let chirp_env = cx.gain(0.0);
        let band = cx.biquad(FilterKind::Bandpass, 1000.0, 10.0);
        let out = cx.out();
        cx.connect(chirp, chirp_env);
        cx.connect(chirp_env, band);
        cx.connect(band, out);
        strike(cx, chirp_env, 0.1, now, 0.5);
        end_event(cx, &[chirp], &[chirp_env, band], now + 0.5);

        let ping = cx.oscillator(Waveform::Sine, 1000.0);
        let ping_env = cx.voice_gain(0.0);
        cx.connect(ping, ping_env);
        cx.set_value_at(ping_env, ParamId::Gain, 0.0, now + 0.5);
        cx.linear_ramp(ping_env, ParamId::Gain, 0.2, now + 0.51);
        cx.exp_ramp(ping_env, ParamId::Gain, FADE_FLOOR, now + 0.8);
        cx.start_source(ping, now + 0.5);
        end_event(cx, &[ping], &[ping_env], now + 0.8);

        self.core.note_event();
        self.core.schedule(cx, 3.0, TICK);
    }
}

impl Layer for RadarSweep {
    layer_basics!("radar_sweep");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        self.sweep(cx);
    }

    fn on_timer(&mut self, _tag: u16, cx: &mut LayerCx<'_>) {
        self.sweep(cx);
    }
}

const RISER_SECONDS: f64 = 8.0;
const RISER_GAP: f64 = 5.0;

/// An eight-second rising sweep with an accelerating tremolo.
pub struct TensionRiser {
    core: LayerCore,
}

impl TensionRiser {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self { core: LayerCore::new(spec, mood) }
    }

    fn rise(&mut self, cx: &mut LayerCx<'_>) {
        let now = cx.now();
        let end = now + RISER_SECONDS;
        let osc = tone(cx, Waveform::Sawtooth, 55.0);
        cx.exp_ramp(osc, ParamId::Frequency, 440.0, end);
        let lowpass = cx.biquad(FilterKind::Lowpass, 100.0, 10.0);
        cx.exp_ramp(lowpass, ParamId::Frequency, 5000.0, end);
        let env = cx.voice_gain(0.0);
        cx.connect(osc, lowpass);
        cx.connect(lowpass, env);
        cx.set_value_at(env, ParamId::Gain, 0.0, now);
        cx.linear_ramp(env, ParamId::Gain, self.core.gain, now + RISER_SECONDS * 0.8);
        cx.exp_ramp(env, ParamId::Gain, FADE_FLOOR, end);

        let tremolo = synth::lfo(cx, 0.5, 0.1, env, ParamId::Gain);
        cx.exp_ramp(tremolo.osc, ParamId::Frequency, 10.0, end);
        end_event(cx, &[osc, tremolo.osc], &[tremolo.depth, lowpass, env], end);

        self.core.note_event();
        self.core.schedule(cx, RISER_SECONDS + RISER_GAP, TICK);
    }
}

impl Layer for TensionRiser {
    layer_basics!("tension_riser");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        let first = cx.random_range(0.0, 10.0);
        self.core.schedule(cx, first, TICK);
    }

    fn on_timer(&mut self, _tag: u16, cx: &mut LayerCx<'_>) {
        self.rise(cx);
    }
}

/// Beating 60/61 Hz sines throbbing under a 0.5 Hz amplitude LFO.
pub struct AnxietyPulse {
    core: LayerCore,
}

impl AnxietyPulse {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self { core: LayerCore::new(spec, mood) }
    }
}

impl Layer for AnxietyPulse {
    layer_basics!("anxiety_pulse");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        let throb = cx.voice_gain(self.core.gain);
        let lfo = tone(cx, Waveform::Sine, 0.5);
        cx.connect_param(lfo, throb, ParamId::Gain);

        let base = tone(cx, Waveform::Sine, 60.0);
        let beat = tone(cx, Waveform::Sine, 61.0);
        let mixer = cx.gain(0.5);
        cx.connect(base, throb);
        cx.connect(beat, mixer);
        cx.connect(mixer, throb);
        self.core.note_event();
    }
}

/// A sawtooth swooping up and down through a resonant band.
pub struct Siren {
    core: LayerCore,
}

impl Siren {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self { core: LayerCore::new(spec, mood) }
    }
}

impl Layer for Siren {
    layer_basics!("siren");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        let f = self.core.spec.frequency_or(1000.0);
        let osc = tone(cx, Waveform::Sawtooth, f);
        synth::lfo(cx, 0.5, f * 0.3, osc, ParamId::Frequency);
        let band = cx.biquad(FilterKind::Bandpass, f, 10.0);
        let out = cx.out();
        cx.connect(osc, band);
        cx.connect(band, out);
        self.core.note_event();
    }
}

const RUMBLE_SECONDS: f64 = 4.0;

/// Distant explosions: dark noise with a wobbling sub, every 10-20 s.
pub struct ExplosionRumble {
    core: LayerCore,
}

impl ExplosionRumble {
    pub fn new(_ctx: &mut AudioContext, spec: LayerSpec, mood: Mood) -> Self {
        Self { core: LayerCore::new(spec, mood) }
    }

    fn rumble(&mut self, cx: &mut LayerCx<'_>) {
        let now = cx.now();
        let end = now + RUMBLE_SECONDS;
        let noise = synth::filtered_noise(cx, FilterKind::Lowpass, 60.0, 2.0);
        let noise_env = cx.voice_gain(0.0);
        cx.connect(noise.filter, noise_env);
        strike(cx, noise_env, 0.3, now, RUMBLE_SECONDS);

        let pitch = 30.0 + cx.random() as f32 * 20.0;
        let sub = tone(cx, Waveform::Sine, pitch);
        let wobble = synth::lfo(cx, 0.5, 5.0, sub, ParamId::Frequency);
        let sub_env = cx.voice_gain(0.0);
        cx.connect(sub, sub_env);
        strike(cx, sub_env, 0.4, now, RUMBLE_SECONDS);

        end_event(
            cx,
            &[noise.source, sub, wobble.osc],
            &[noise.filter, noise_env, wobble.depth, sub_env],
            end,
        );
        self.core.note_event();
        let next = cx.random_range(10.0, 20.0);
        self.core.schedule(cx, next, TICK);
    }
}

impl Layer for ExplosionRumble {
    layer_basics!("explosion_rumble");

    fn build(&mut self, cx: &mut LayerCx<'_>) {
        let first = cx.random_range(0.0, 5.0);
        self.core.schedule(cx, first, TICK);
    }

    fn on_timer(&mut self, _tag: u16, cx: &mut LayerCx<'_>) {
        self.rumble(cx);
    }
}

//! The 35 layer variants, grouped by family.
//!
//! Every variant follows the same shape: a struct holding its
//! [`LayerCore`](crate::layer::LayerCore) plus whatever node handles or
//! sequencing state it needs across events, a `build` that wires the
//! continuous part of the sound and arms the first timer, and an
//! `on_timer` that plays one event and re-arms itself.

pub mod atmospheric;
pub mod foundation;
pub mod mechanical;
pub mod musical;
pub mod tension;

use crate::factory::{LayerCtor, LayerFactory};
use crate::graph::NodeKey;
use crate::layer::{Layer, LayerCx, FADE_FLOOR};
use crate::nodes::Waveform;
use crate::param::ParamId;

/// Every built-in variant, by type tag.
pub(crate) const BUILTIN: [(&str, LayerCtor); 35] = [
    ("drone", |ctx, spec, mood| boxed(foundation::Drone::new(ctx, spec, mood))),
    ("sub", |ctx, spec, mood| boxed(foundation::Sub::new(ctx, spec, mood))),
    ("pad", |ctx, spec, mood| boxed(foundation::Pad::new(ctx, spec, mood))),
    ("heartbeat", |ctx, spec, mood| boxed(foundation::Heartbeat::new(ctx, spec, mood))),
    ("breathing", |ctx, spec, mood| boxed(foundation::Breathing::new(ctx, spec, mood))),
    ("shimmer", |ctx, spec, mood| boxed(atmospheric::Shimmer::new(ctx, spec, mood))),
    ("whisper", |ctx, spec, mood| boxed(atmospheric::Whisper::new(ctx, spec, mood))),
    ("breath", |ctx, spec, mood| boxed(atmospheric::Breath::new(ctx, spec, mood))),
    ("air_flow", |ctx, spec, mood| boxed(atmospheric::AirFlow::new(ctx, spec, mood))),
    ("comm_chatter", |ctx, spec, mood| boxed(atmospheric::CommChatter::new(ctx, spec, mood))),
    ("static", |ctx, spec, mood| boxed(atmospheric::Static::new(ctx, spec, mood))),
    ("radio_static", |ctx, spec, mood| boxed(atmospheric::RadioStatic::new(ctx, spec, mood))),
    ("mechanical", |ctx, spec, mood| boxed(mechanical::Mechanical::new(ctx, spec, mood))),
    ("hydraulic", |ctx, spec, mood| boxed(mechanical::Hydraulic::new(ctx, spec, mood))),
    ("metal_stress", |ctx, spec, mood| boxed(mechanical::MetalStress::new(ctx, spec, mood))),
    ("system_beep", |ctx, spec, mood| boxed(mechanical::SystemBeep::new(ctx, spec, mood))),
    ("harmonic", |ctx, spec, mood| boxed(musical::Harmonic::new(ctx, spec, mood))),
    ("arpeggio", |ctx, spec, mood| boxed(musical::Arpeggio::new(ctx, spec, mood))),
    ("bass_line", |ctx, spec, mood| boxed(musical::BassLine::new(ctx, spec, mood))),
    ("chime", |ctx, spec, mood| boxed(musical::Chime::new(ctx, spec, mood))),
    ("lead", |ctx, spec, mood| boxed(musical::Lead::new(ctx, spec, mood))),
    ("rhythm", |ctx, spec, mood| boxed(musical::Rhythm::new(ctx, spec, mood))),
    ("percussion", |ctx, spec, mood| boxed(musical::Percussion::new(ctx, spec, mood))),
    ("power_chord", |ctx, spec, mood| boxed(musical::PowerChord::new(ctx, spec, mood))),
    ("brass_stab", |ctx, spec, mood| boxed(musical::BrassStab::new(ctx, spec, mood))),
    ("pulse", |ctx, spec, mood| boxed(tension::Pulse::new(ctx, spec, mood))),
    ("dissonance", |ctx, spec, mood| boxed(tension::Dissonance::new(ctx, spec, mood))),
    ("warning", |ctx, spec, mood| boxed(tension::Warning::new(ctx, spec, mood))),
    ("alarm", |ctx, spec, mood| boxed(tension::Alarm::new(ctx, spec, mood))),
    ("cluster", |ctx, spec, mood| boxed(tension::Cluster::new(ctx, spec, mood))),
    ("radar_sweep", |ctx, spec, mood| boxed(tension::RadarSweep::new(ctx, spec, mood))),
    ("tension_riser", |ctx, spec, mood| boxed(tension::TensionRiser::new(ctx, spec, mood))),
    ("anxiety_pulse", |ctx, spec, mood| boxed(tension::AnxietyPulse::new(ctx, spec, mood))),
    ("siren", |ctx, spec, mood| boxed(tension::Siren::new(ctx, spec, mood))),
    ("explosion_rumble", |ctx, spec, mood| boxed(tension::ExplosionRumble::new(ctx, spec, mood))),
];

fn boxed<L: Layer + 'static>(layer: L) -> Box<dyn Layer> {
    Box::new(layer)
}

pub(crate) fn register_builtin(factory: &mut LayerFactory) {
    for (kind, ctor) in BUILTIN {
        // tags are non-empty literals
        let _ = factory.register(kind, ctor);
    }
}

/// An oscillator started now.
pub(crate) fn tone(cx: &mut LayerCx<'_>, waveform: Waveform, frequency: f32) -> NodeKey {
    let osc = cx.oscillator(waveform, frequency);
    let now = cx.now();
    cx.start_source(osc, now);
    osc
}

/// Stop `sources` at `at` and drop the rest of the event's nodes with them.
pub(crate) fn end_event(cx: &mut LayerCx<'_>, sources: &[NodeKey], rest: &[NodeKey], at: f64) {
    for &source in sources {
        cx.stop_source(source, at);
    }
    cx.expire(rest, at);
}

/// Gain envelope: silent at `at`, linear rise to `peak` after `attack`,
/// exponential decay to the floor at `at + end`.
pub(crate) fn swell(cx: &mut LayerCx<'_>, env: NodeKey, peak: f32, at: f64, attack: f64, end: f64) {
    cx.set_value_at(env, ParamId::Gain, 0.0, at);
    cx.linear_ramp(env, ParamId::Gain, peak, at + attack);
    cx.exp_ramp(env, ParamId::Gain, FADE_FLOOR, at + end);
}

/// Gain envelope: `peak` at `at`, exponential decay to the floor at `at + end`.
pub(crate) fn strike(cx: &mut LayerCx<'_>, env: NodeKey, peak: f32, at: f64, end: f64) {
    cx.set_value_at(env, ParamId::Gain, peak, at);
    cx.exp_ramp(env, ParamId::Gain, FADE_FLOOR, at + end);
}

#[cfg(test)]
pub(crate) mod testing {
    //! Drives a single layer on its own context, dispatching timers the
    //! way the engine does.

    use super::*;
    use ce_ir::{LayerSpec, Mood};
    use crate::context::{AudioContext, LayerKey, TimerTarget};
    use crate::layer::{LayerState, RELEASE_TAG};

    pub const SR: u32 = 8_000;

    pub struct Harness {
        pub ctx: AudioContext,
        pub layer: Box<dyn Layer>,
        pub key: LayerKey,
        pub peak: f32,
    }

    impl Harness {
        pub fn new(spec: LayerSpec, mood: Mood) -> Self {
            let mut ctx = AudioContext::new(SR, Some(11));
            let factory = LayerFactory::new();
            let layer = factory
                .create(&mut ctx, &spec, mood)
                .unwrap_or_else(|| panic!("unknown kind {}", spec.kind));
            Self {
                ctx,
                layer,
                key: LayerKey::from(slotmap::KeyData::from_ffi(7)),
                peak: 0.0,
            }
        }

        pub fn start(spec: LayerSpec, mood: Mood) -> Self {
            let mut h = Self::new(spec, mood);
            let dest = h.ctx.destination();
            let mut cx = LayerCx::new(&mut h.ctx, h.key, None);
            assert!(h.layer.start(&mut cx, dest));
            drop(cx);
            h
        }

        pub fn stop(&mut self, fade: f64) -> bool {
            let mut cx = LayerCx::new(&mut self.ctx, self.key, self.layer.core().amp());
            self.layer.stop(&mut cx, fade)
        }

        /// Render `seconds` of audio, tracking the output peak. Timers due
        /// by the final frame have fired on return.
        pub fn run(&mut self, seconds: f64) {
            let until = self.ctx.frame() + self.ctx.frames(seconds);
            loop {
                self.dispatch();
                if self.ctx.frame() >= until {
                    break;
                }
                let peak = self.ctx.render().peak();
                self.peak = self.peak.max(peak);
            }
        }

        fn dispatch(&mut self) {
            while let Some((_, target)) = self.ctx.pop_due_timer() {
                if let TimerTarget::Layer { tag, .. } = target {
                    if tag == RELEASE_TAG {
                        self.ctx.graph_mut().remove_owned_by(self.key);
                        self.layer.core_mut().mark_released();
                    } else if self.layer.core().is_playing() {
                        self.layer.core_mut().fired(tag);
                        let amp = self.layer.core().amp();
                        let mut cx = LayerCx::new(&mut self.ctx, self.key, amp);
                        self.layer.on_timer(tag, &mut cx);
                    }
                }
            }
        }

        pub fn events(&self) -> u64 {
            self.layer.events()
        }

        pub fn nodes(&self) -> usize {
            self.ctx.graph().owned_by(self.key)
        }
    }

    /// Start, play for `seconds`, stop, and check the layer goes quiet and
    /// releases everything it owns.
    pub fn lifecycle(spec: LayerSpec, mood: Mood, seconds: f64) -> Harness {
        let mut h = Harness::start(spec, mood);
        h.run(seconds);
        assert!(h.peak > 0.0, "{} never made a sound", spec.kind);
        assert!(h.peak.is_finite() && h.peak < 4.0, "{} peak {}", spec.kind, h.peak);
        assert!(h.stop(0.5));
        let frozen = h.events();
        h.run(0.5);
        assert_eq!(h.layer.state(), LayerState::Released, "{} not released at fade end", spec.kind);
        assert_eq!(h.events(), frozen, "{} kept playing after stop", spec.kind);
        assert_eq!(h.nodes(), 0, "{} leaked nodes", spec.kind);
        assert_eq!(h.ctx.pending_timers(), 0, "{} left timers armed", spec.kind);
        h
    }
}

//! The layer contract shared by every sound-generating variant.
//!
//! A layer owns an amplitude node and whatever sub-graph its `build` step
//! creates. Nodes are tagged with the layer's key as they are created, so
//! the whole sub-graph can be released in one call once the fade-out has
//! elapsed. Self-rescheduling loops are timers armed through
//! [`LayerCore::schedule`]; `stop` cancels all of them at once.

use std::ops::{Deref, DerefMut};

use ce_ir::{LayerSpec, Mood};

use crate::context::{AudioContext, LayerKey, TimerTarget};
use crate::graph::NodeKey;
use crate::param::ParamId;
use crate::timer::TimerKey;

/// Timer tag reserved for the post-fade release.
pub const RELEASE_TAG: u16 = u16::MAX;

/// Fade-in applied by `start`.
pub const ATTACK_SECONDS: f64 = 2.0;

/// Fade-out used when no duration is given.
pub const DEFAULT_FADE_SECONDS: f64 = 2.0;

/// Target of the exponential fade-out.
pub const FADE_FLOOR: f32 = 0.001;

/// Most timers one layer keeps armed at a time.
pub const MAX_LAYER_TIMERS: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerState {
    Idle,
    Playing,
    Stopping,
    Released,
}

/// Broadcast from the engine to every active layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerUpdate {
    pub chord_index: usize,
}

/// State every layer carries regardless of variant.
#[derive(Debug)]
pub struct LayerCore {
    pub spec: LayerSpec,
    pub mood: Mood,
    /// Level the amplitude node fades in to.
    pub gain: f32,
    amp: Option<NodeKey>,
    state: LayerState,
    timers: heapless::Vec<(u16, TimerKey), MAX_LAYER_TIMERS>,
    chord_index: usize,
    events: u64,
}

impl LayerCore {
    pub fn new(spec: LayerSpec, mood: Mood) -> Self {
        Self {
            spec,
            mood,
            gain: spec.gain_or_default(),
            amp: None,
            state: LayerState::Idle,
            timers: heapless::Vec::new(),
            chord_index: 0,
            events: 0,
        }
    }

    pub fn state(&self) -> LayerState {
        self.state
    }

    pub fn amp(&self) -> Option<NodeKey> {
        self.amp
    }

    pub fn is_playing(&self) -> bool {
        self.state == LayerState::Playing
    }

    /// Chord most recently broadcast to this layer.
    pub fn chord_index(&self) -> usize {
        self.chord_index
    }

    pub fn set_chord_index(&mut self, index: usize) {
        self.chord_index = index;
    }

    /// Sound events produced so far.
    pub fn events(&self) -> u64 {
        self.events
    }

    pub fn note_event(&mut self) {
        self.events += 1;
    }

    /// Arm timer `tag` to fire after `delay` seconds. An already armed
    /// timer with the same tag is replaced. Does nothing unless playing.
    pub fn schedule(&mut self, cx: &mut LayerCx<'_>, delay: f64, tag: u16) -> bool {
        if self.state != LayerState::Playing || tag == RELEASE_TAG {
            return false;
        }
        if let Some(pos) = self.timers.iter().position(|(t, _)| *t == tag) {
            let (_, old) = self.timers.swap_remove(pos);
            cx.cancel_timer(old);
        }
        let layer = cx.layer();
        let key = cx.schedule(delay, TimerTarget::Layer { layer, tag });
        if self.timers.push((tag, key)).is_err() {
            log::warn!("{} layer has too many timers; dropping tag {}", self.spec.kind, tag);
            cx.cancel_timer(key);
            return false;
        }
        true
    }

    /// Forget the handle of a timer that just fired.
    pub fn fired(&mut self, tag: u16) {
        if let Some(pos) = self.timers.iter().position(|(t, _)| *t == tag) {
            self.timers.swap_remove(pos);
        }
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    fn cancel_timers(&mut self, ctx: &mut AudioContext) {
        for (_, key) in self.timers.iter() {
            ctx.cancel_timer(*key);
        }
        self.timers.clear();
    }

    pub(crate) fn mark_released(&mut self) {
        self.state = LayerState::Released;
    }
}

/// A scoped view of the audio context for one layer.
///
/// While it lives, every node created through it is owned by the layer.
pub struct LayerCx<'a> {
    ctx: &'a mut AudioContext,
    layer: LayerKey,
    out: Option<NodeKey>,
}

impl<'a> LayerCx<'a> {
    pub fn new(ctx: &'a mut AudioContext, layer: LayerKey, out: Option<NodeKey>) -> Self {
        ctx.set_owner(Some(layer));
        Self { ctx, layer, out }
    }

    pub fn layer(&self) -> LayerKey {
        self.layer
    }

    /// Where the layer's sounds go: its amplitude node once started.
    pub fn out(&self) -> NodeKey {
        self.out.unwrap_or_else(|| self.ctx.destination())
    }

    /// Gain node at `level`, connected to the layer output.
    pub fn voice_gain(&mut self, level: f32) -> NodeKey {
        let g = self.ctx.gain(level);
        let out = self.out();
        self.ctx.connect(g, out);
        g
    }
}

impl Deref for LayerCx<'_> {
    type Target = AudioContext;

    fn deref(&self) -> &AudioContext {
        self.ctx
    }
}

impl DerefMut for LayerCx<'_> {
    fn deref_mut(&mut self) -> &mut AudioContext {
        self.ctx
    }
}

impl Drop for LayerCx<'_> {
    fn drop(&mut self) {
        self.ctx.set_owner(None);
    }
}

/// A sound-generating unit with its own lifecycle.
pub trait Layer: Send {
    /// Type tag used by the factory and the track catalogue.
    fn kind(&self) -> &'static str;
    fn core(&self) -> &LayerCore;
    fn core_mut(&mut self) -> &mut LayerCore;

    /// Allocate the variant's sub-graph and arm its loops. Called once,
    /// right after the amplitude node is in place.
    fn build(&mut self, cx: &mut LayerCx<'_>);

    /// A timer armed with `tag` fired. Only called while playing.
    fn on_timer(&mut self, _tag: u16, _cx: &mut LayerCx<'_>) {}

    /// Harmonic updates take effect on the next scheduled event.
    fn update(&mut self, update: &LayerUpdate) {
        self.core_mut().set_chord_index(update.chord_index);
    }

    fn state(&self) -> LayerState {
        self.core().state()
    }

    fn events(&self) -> u64 {
        self.core().events()
    }

    /// Fade in toward the configured gain and build. No-op unless idle.
    fn start(&mut self, cx: &mut LayerCx<'_>, destination: NodeKey) -> bool {
        if self.core().state != LayerState::Idle {
            return false;
        }
        let gain = self.core().gain;
        let amp = cx.gain(0.0);
        cx.connect(amp, destination);
        let now = cx.now();
        cx.set_value_at(amp, ParamId::Gain, 0.0, now);
        cx.linear_ramp(amp, ParamId::Gain, gain, now + ATTACK_SECONDS);
        cx.out = Some(amp);

        let core = self.core_mut();
        core.amp = Some(amp);
        core.state = LayerState::Playing;
        log::debug!("start {} layer (gain {})", self.kind(), gain);
        self.build(cx);
        true
    }

    /// Cancel every pending timer, fade out over `fade` seconds, and arm
    /// the release. No-op unless playing.
    fn stop(&mut self, cx: &mut LayerCx<'_>, fade: f64) -> bool {
        if self.core().state != LayerState::Playing {
            return false;
        }
        let fade = if fade.is_finite() { fade.max(0.0) } else { DEFAULT_FADE_SECONDS };
        self.core_mut().cancel_timers(cx);
        if let Some(amp) = self.core().amp {
            let now = cx.now();
            cx.hold(amp, ParamId::Gain);
            cx.exp_ramp(amp, ParamId::Gain, FADE_FLOOR, now + fade);
        }
        let layer = cx.layer();
        cx.schedule(fade, TimerTarget::Layer { layer, tag: RELEASE_TAG });
        self.core_mut().state = LayerState::Stopping;
        log::debug!("stop {} layer over {:.2}s", self.kind(), fade);
        true
    }
}

/// Implements the accessor half of [`Layer`] for a struct with a `core` field.
macro_rules! layer_basics {
    ($kind:literal) => {
        fn kind(&self) -> &'static str {
            $kind
        }

        fn core(&self) -> &$crate::layer::LayerCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut $crate::layer::LayerCore {
            &mut self.core
        }
    };
}

pub(crate) use layer_basics;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::Waveform;

    /// Minimal variant: one oscillator and a ticking loop.
    struct Ticker {
        core: LayerCore,
    }

    impl Layer for Ticker {
        layer_basics!("ticker");

        fn build(&mut self, cx: &mut LayerCx<'_>) {
            let osc = cx.oscillator(Waveform::Sine, 220.0);
            let out = cx.out();
            cx.connect(osc, out);
            let now = cx.now();
            cx.start_source(osc, now);
            self.core.schedule(cx, 0.05, 1);
        }

        fn on_timer(&mut self, tag: u16, cx: &mut LayerCx<'_>) {
            self.core.note_event();
            self.core.schedule(cx, 0.05, tag);
        }
    }

    fn ticker() -> Ticker {
        Ticker { core: LayerCore::new(LayerSpec::new("ticker").gain(0.5), Mood::Peaceful) }
    }

    fn layer_key() -> LayerKey {
        LayerKey::from(slotmap::KeyData::from_ffi(3))
    }

    /// Render until `frame`, dispatching layer timers like the engine does.
    fn run(ctx: &mut AudioContext, layer: &mut Ticker, until: u64) {
        while ctx.frame() < until {
            while let Some((_, target)) = ctx.pop_due_timer() {
                if let TimerTarget::Layer { tag, .. } = target {
                    if tag != RELEASE_TAG && layer.core().is_playing() {
                        layer.core_mut().fired(tag);
                        let mut cx = LayerCx::new(ctx, layer_key(), layer.core().amp());
                        layer.on_timer(tag, &mut cx);
                    }
                }
            }
            ctx.render();
        }
    }

    #[test]
    fn start_is_idempotent() {
        let mut ctx = AudioContext::new(12_800, Some(1));
        let dest = ctx.destination();
        let mut layer = ticker();
        {
            let mut cx = LayerCx::new(&mut ctx, layer_key(), None);
            assert!(layer.start(&mut cx, dest));
        }
        let nodes = ctx.graph().len();
        {
            let mut cx = LayerCx::new(&mut ctx, layer_key(), None);
            assert!(!layer.start(&mut cx, dest));
        }
        assert_eq!(ctx.graph().len(), nodes);
        assert_eq!(ctx.graph().owned_by(layer_key()), 2);
        assert_eq!(ctx.owner(), None);
    }

    #[test]
    fn fades_in_over_attack() {
        let mut ctx = AudioContext::new(12_800, Some(1));
        let dest = ctx.destination();
        let mut layer = ticker();
        let mut cx = LayerCx::new(&mut ctx, layer_key(), None);
        layer.start(&mut cx, dest);
        drop(cx);
        let amp = layer.core().amp().unwrap();
        assert_eq!(ctx.param_value(amp, ParamId::Gain), Some(0.0));
        run(&mut ctx, &mut layer, 12_800);
        let v = ctx.param_value(amp, ParamId::Gain).unwrap();
        assert!((v - 0.25).abs() < 0.01, "{}", v);
    }

    #[test]
    fn stop_cancels_loops_and_freezes_events() {
        let mut ctx = AudioContext::new(12_800, Some(1));
        let dest = ctx.destination();
        let mut layer = ticker();
        {
            let mut cx = LayerCx::new(&mut ctx, layer_key(), None);
            layer.start(&mut cx, dest);
        }
        run(&mut ctx, &mut layer, 6_400);
        assert!(layer.events() > 5);
        {
            let mut cx = LayerCx::new(&mut ctx, layer_key(), None);
            assert!(layer.stop(&mut cx, 1.0));
            assert!(!layer.stop(&mut cx, 5.0));
        }
        assert_eq!(layer.core().pending_timers(), 0);
        assert_eq!(layer.state(), LayerState::Stopping);
        let frozen = layer.events();
        run(&mut ctx, &mut layer, 6_400 + 3 * 12_800);
        assert_eq!(layer.events(), frozen);
    }

    #[test]
    fn stop_before_start_is_noop() {
        let mut ctx = AudioContext::new(12_800, Some(1));
        let mut layer = ticker();
        let mut cx = LayerCx::new(&mut ctx, layer_key(), None);
        assert!(!layer.stop(&mut cx, 1.0));
        drop(cx);
        assert_eq!(ctx.pending_timers(), 0);
    }

    #[test]
    fn rearming_a_tag_replaces_it() {
        let mut ctx = AudioContext::new(12_800, Some(1));
        let dest = ctx.destination();
        let mut layer = ticker();
        let mut cx = LayerCx::new(&mut ctx, layer_key(), None);
        layer.start(&mut cx, dest);
        layer.core.schedule(&mut cx, 1.0, 1);
        layer.core.schedule(&mut cx, 2.0, 1);
        drop(cx);
        assert_eq!(layer.core().pending_timers(), 1);
        assert_eq!(ctx.pending_timers(), 1);
    }
}

//! The audio context: sample clock, signal graph, timers and randomness.
//!
//! Everything time-related runs on the frame counter. Seconds passed to
//! the automation helpers are absolute context times, the same convention
//! as `now() + offset` in a browser audio context.

use std::sync::Arc;

use ce_ir::{AudioBlock, BLOCK_SIZE};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use slotmap::new_key_type;

use crate::graph::{NodeKey, SignalGraph};
use crate::music::EngineTask;
use crate::nodes::{
    Analyser, Biquad, Compressor, CompressorSettings, Convolver, Delay, FilterKind, Gain,
    NoiseSource, Oscillator, Processor, StereoPanner, Waveform, WaveShaper, Widener,
};
use crate::param::ParamId;
use crate::synth;
use crate::timer::{TimerKey, TimerQueue};

new_key_type! {
    /// Handle to a running layer; also tags the graph nodes it owns.
    pub struct LayerKey;
}

/// Who a timer wakes up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerTarget {
    Layer { layer: LayerKey, tag: u16 },
    Engine(EngineTask),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextState {
    Running,
    Suspended,
}

pub struct AudioContext {
    sample_rate: u32,
    frame: u64,
    state: ContextState,
    graph: SignalGraph,
    timers: TimerQueue<TimerTarget>,
    rng: Pcg32,
    noise: Arc<[f32]>,
    silence: AudioBlock,
    owner: Option<LayerKey>,
}

impl AudioContext {
    /// A running context. `seed` fixes the RNG; `None` draws from OS entropy.
    pub fn new(sample_rate: u32, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => Pcg32::seed_from_u64(seed),
            None => Pcg32::from_entropy(),
        };
        let noise = synth::noise_buffer(&mut rng, sample_rate);
        Self {
            sample_rate,
            frame: 0,
            state: ContextState::Running,
            graph: SignalGraph::new(),
            timers: TimerQueue::new(),
            rng,
            noise,
            silence: AudioBlock::new(),
            owner: None,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames rendered so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Context time in seconds.
    pub fn now(&self) -> f64 {
        self.frame as f64 / self.sample_rate as f64
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn suspend(&mut self) {
        self.state = ContextState::Suspended;
    }

    pub fn resume(&mut self) {
        self.state = ContextState::Running;
    }

    /// Duration in seconds to a whole number of frames.
    pub fn frames(&self, seconds: f64) -> u64 {
        if seconds.is_finite() && seconds > 0.0 {
            (seconds * self.sample_rate as f64).round() as u64
        } else {
            0
        }
    }

    /// Absolute context time to a frame; never earlier than the current frame.
    fn frame_at(&self, at: f64) -> u64 {
        self.frames(at).max(self.frame)
    }

    pub fn graph(&self) -> &SignalGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SignalGraph {
        &mut self.graph
    }

    pub fn destination(&self) -> NodeKey {
        self.graph.destination()
    }

    pub(crate) fn set_owner(&mut self, owner: Option<LayerKey>) {
        self.owner = owner;
    }

    pub fn owner(&self) -> Option<LayerKey> {
        self.owner
    }

    fn add(&mut self, processor: Processor) -> NodeKey {
        self.graph.add(processor, self.owner)
    }

    pub fn gain(&mut self, value: f32) -> NodeKey {
        self.add(Processor::Gain(Gain::new(value)))
    }

    /// An unstarted oscillator.
    pub fn oscillator(&mut self, waveform: Waveform, frequency: f32) -> NodeKey {
        self.add(Processor::Oscillator(Oscillator::new(waveform, frequency)))
    }

    /// An unstarted noise source reading the shared buffer from a random point.
    pub fn noise(&mut self) -> NodeKey {
        let offset = if self.noise.is_empty() {
            0
        } else {
            self.rng.gen_range(0..self.noise.len())
        };
        let source = NoiseSource::new(Arc::clone(&self.noise), offset);
        self.add(Processor::Noise(source))
    }

    pub fn biquad(&mut self, kind: FilterKind, frequency: f32, q: f32) -> NodeKey {
        self.add(Processor::Biquad(Biquad::new(kind, frequency, q)))
    }

    pub fn delay(&mut self, max_seconds: f32, seconds: f32) -> NodeKey {
        let sr = self.sample_rate as f32;
        self.add(Processor::Delay(Delay::new(max_seconds, seconds, sr)))
    }

    pub fn shaper(&mut self, curve: Arc<[f32]>) -> NodeKey {
        self.add(Processor::Shaper(WaveShaper::new(curve)))
    }

    pub fn panner(&mut self, pan: f32) -> NodeKey {
        self.add(Processor::Panner(StereoPanner::new(pan)))
    }

    pub fn widener(&mut self, left_seconds: f32, right_seconds: f32) -> NodeKey {
        let sr = self.sample_rate as f32;
        self.add(Processor::Widener(Widener::new(left_seconds, right_seconds, sr)))
    }

    pub fn convolver(&mut self, left: &[f32], right: &[f32], normalize: bool) -> NodeKey {
        let sr = self.sample_rate as f32;
        self.add(Processor::Convolver(Convolver::new(left, right, sr, normalize)))
    }

    pub fn compressor(&mut self, settings: CompressorSettings) -> NodeKey {
        let sr = self.sample_rate as f32;
        self.add(Processor::Compressor(Compressor::new(settings, sr)))
    }

    pub fn analyser(&mut self) -> NodeKey {
        let sr = self.sample_rate as f32;
        self.add(Processor::Analyser(Analyser::new(sr)))
    }

    pub fn connect(&mut self, from: NodeKey, to: NodeKey) -> bool {
        self.graph.connect(from, to)
    }

    pub fn connect_param(&mut self, from: NodeKey, to: NodeKey, param: ParamId) -> bool {
        self.graph.connect_param(from, to, param)
    }

    /// Start a source node at context time `at`.
    pub fn start_source(&mut self, key: NodeKey, at: f64) {
        let frame = self.frame_at(at);
        if let Some(schedule) = self.graph.processor_mut(key).and_then(|p| p.schedule_mut()) {
            schedule.start.get_or_insert(frame);
        }
    }

    /// Stop a source node at `at`; the node is dropped once stopped.
    pub fn stop_source(&mut self, key: NodeKey, at: f64) {
        let frame = self.frame_at(at);
        let Some(schedule) = self.graph.processor_mut(key).and_then(|p| p.schedule_mut()) else {
            return;
        };
        schedule.stop = Some(schedule.stop.map_or(frame, |f| f.min(frame)));
        self.graph.set_expiry(key, frame);
    }

    /// Drop `keys` from the graph once the clock passes `at`.
    pub fn expire(&mut self, keys: &[NodeKey], at: f64) {
        let frame = self.frame_at(at);
        for &key in keys {
            self.graph.set_expiry(key, frame);
        }
    }

    /// Jump a parameter to `value` at `at`.
    pub fn set_value_at(&mut self, key: NodeKey, id: ParamId, value: f32, at: f64) {
        let frame = self.frame_at(at);
        let now = self.frame;
        if let Some(p) = self.graph.param_mut(key, id) {
            p.set_value_at(value, frame, now);
        }
    }

    /// Set a parameter right now, keeping later automation.
    pub fn set_value(&mut self, key: NodeKey, id: ParamId, value: f32) {
        let now = self.now();
        self.set_value_at(key, id, value, now);
    }

    pub fn linear_ramp(&mut self, key: NodeKey, id: ParamId, value: f32, at: f64) {
        let frame = self.frame_at(at);
        let now = self.frame;
        if let Some(p) = self.graph.param_mut(key, id) {
            p.linear_ramp_to(value, frame, now);
        }
    }

    pub fn exp_ramp(&mut self, key: NodeKey, id: ParamId, value: f32, at: f64) {
        let frame = self.frame_at(at);
        let now = self.frame;
        if let Some(p) = self.graph.param_mut(key, id) {
            p.exponential_ramp_to(value, frame, now);
        }
    }

    /// Freeze a parameter at its current value, dropping pending automation.
    pub fn hold(&mut self, key: NodeKey, id: ParamId) {
        let now = self.frame;
        if let Some(p) = self.graph.param_mut(key, id) {
            p.hold_at(now);
        }
    }

    pub fn cancel(&mut self, key: NodeKey, id: ParamId, at: f64) {
        let frame = self.frame_at(at);
        if let Some(p) = self.graph.param_mut(key, id) {
            p.cancel_from(frame);
        }
    }

    /// Current value of a parameter, including pending automation.
    pub fn param_value(&self, key: NodeKey, id: ParamId) -> Option<f32> {
        self.graph.param(key, id).map(|p| p.value_at(self.frame))
    }

    /// Fire `target` after `delay` seconds; at least one frame in the future.
    pub fn schedule(&mut self, delay: f64, target: TimerTarget) -> TimerKey {
        let due = self.frame + self.frames(delay).max(1);
        self.timers.schedule(due, target)
    }

    pub fn cancel_timer(&mut self, key: TimerKey) -> bool {
        self.timers.cancel(key)
    }

    pub fn timer_pending(&self, key: TimerKey) -> bool {
        self.timers.is_pending(key)
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub(crate) fn pop_due_timer(&mut self) -> Option<(TimerKey, TimerTarget)> {
        if self.state == ContextState::Suspended {
            return None;
        }
        self.timers.pop_due(self.frame)
    }

    /// Uniform in [0, 1).
    pub fn random(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Uniform in [lo, hi).
    pub fn random_range(&mut self, lo: f64, hi: f64) -> f64 {
        if hi > lo {
            self.rng.gen_range(lo..hi)
        } else {
            lo
        }
    }

    pub fn rng(&mut self) -> &mut Pcg32 {
        &mut self.rng
    }

    /// Render the next block. Suspended contexts output silence and keep
    /// their clock still.
    pub fn render(&mut self) -> &AudioBlock {
        if self.state == ContextState::Suspended {
            return &self.silence;
        }
        let frame = self.frame;
        self.frame += BLOCK_SIZE as u64;
        self.graph.reap(frame);
        self.graph.process(frame, self.sample_rate as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    const SR: u32 = 12_800;

    fn ctx() -> AudioContext {
        AudioContext::new(SR, Some(42))
    }

    #[test]
    fn clock_advances_per_block() {
        let mut ctx = ctx();
        ctx.render();
        ctx.render();
        assert_eq!(ctx.frame(), 2 * BLOCK_SIZE as u64);
        assert!((ctx.now() - 0.02).abs() < 1e-9);
    }

    #[test]
    fn suspended_context_is_silent_and_frozen() {
        let mut ctx = ctx();
        let osc = ctx.oscillator(Waveform::Square, 0.0);
        let dest = ctx.destination();
        ctx.connect(osc, dest);
        ctx.start_source(osc, 0.0);
        ctx.suspend();
        assert!(ctx.render().is_silent());
        assert_eq!(ctx.frame(), 0);
        ctx.resume();
        assert!(!ctx.render().is_silent());
    }

    #[test]
    fn timers_fire_in_order_and_not_early() {
        let mut ctx = ctx();
        let layer = LayerKey::from(KeyData::from_ffi(1));
        ctx.schedule(0.02, TimerTarget::Layer { layer, tag: 2 });
        ctx.schedule(0.01, TimerTarget::Layer { layer, tag: 1 });
        assert!(ctx.pop_due_timer().is_none());
        ctx.render();
        assert!(matches!(
            ctx.pop_due_timer(),
            Some((_, TimerTarget::Layer { tag: 1, .. }))
        ));
        assert!(ctx.pop_due_timer().is_none());
        ctx.render();
        assert!(matches!(
            ctx.pop_due_timer(),
            Some((_, TimerTarget::Layer { tag: 2, .. }))
        ));
    }

    #[test]
    fn zero_delay_timer_waits_a_frame() {
        let mut ctx = ctx();
        ctx.schedule(0.0, TimerTarget::Engine(EngineTask::ChordClock));
        assert!(ctx.pop_due_timer().is_none());
        ctx.render();
        assert!(ctx.pop_due_timer().is_some());
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut ctx = ctx();
        let key = ctx.schedule(0.01, TimerTarget::Engine(EngineTask::ChordClock));
        assert!(ctx.cancel_timer(key));
        ctx.render();
        ctx.render();
        assert!(ctx.pop_due_timer().is_none());
        assert!(!ctx.cancel_timer(key));
    }

    #[test]
    fn stopped_source_is_reaped() {
        let mut ctx = ctx();
        let osc = ctx.oscillator(Waveform::Sine, 100.0);
        ctx.start_source(osc, 0.0);
        ctx.stop_source(osc, 0.01);
        ctx.render();
        assert!(ctx.graph().contains(osc));
        ctx.render();
        assert!(!ctx.graph().contains(osc));
    }

    #[test]
    fn ramps_use_absolute_times() {
        let mut ctx = ctx();
        let g = ctx.gain(0.0);
        let now = ctx.now();
        ctx.linear_ramp(g, ParamId::Gain, 1.0, now + 1.0);
        for _ in 0..50 {
            ctx.render();
        }
        // 50 blocks = 0.5 s at 12.8 kHz
        let v = ctx.param_value(g, ParamId::Gain).unwrap();
        assert!((v - 0.5).abs() < 1e-3, "{}", v);
    }

    #[test]
    fn owner_tags_new_nodes() {
        let mut ctx = ctx();
        let layer = LayerKey::from(KeyData::from_ffi(5));
        ctx.set_owner(Some(layer));
        ctx.gain(1.0);
        ctx.noise();
        ctx.set_owner(None);
        ctx.gain(1.0);
        assert_eq!(ctx.graph().owned_by(layer), 2);
    }

    #[test]
    fn seeded_contexts_agree() {
        let mut a = AudioContext::new(SR, Some(9));
        let mut b = AudioContext::new(SR, Some(9));
        assert_eq!(a.random(), b.random());
        assert_eq!(a.random_range(3.0, 4.0), b.random_range(3.0, 4.0));
    }
}

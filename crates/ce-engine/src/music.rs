//! The orchestrator: track selection, crossfades and the chord clock.
//!
//! The engine owns the audio context, the master gain, the effects chain
//! and every live layer. All scheduling happens on the context's sample
//! clock: [`MusicEngine::render_block`] fires due timers, then renders one
//! block. Offline callers drive the clock with [`MusicEngine::advance`].

use std::collections::HashMap;

use ce_ir::{AudioBlock, GameState, Mood, BLOCK_SIZE};
use slotmap::SlotMap;

use crate::config::{EngineConfig, EngineError};
use crate::context::{AudioContext, ContextState, LayerKey, TimerTarget};
use crate::effects::EffectsChain;
use crate::factory::LayerFactory;
use crate::graph::NodeKey;
use crate::layer::{Layer, LayerCx, LayerUpdate, DEFAULT_FADE_SECONDS, RELEASE_TAG};
use crate::nodes::Processor;
use crate::param::ParamId;
use crate::timer::TimerKey;

const VOLUME_RAMP_SECONDS: f64 = 0.1;
const MIN_VOLUME: f32 = 0.001;

/// Work the engine schedules for itself on the context clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineTask {
    /// Advance the chord and re-arm.
    ChordClock,
    /// Deferred second half of a crossfade.
    StartTrack(&'static str),
}

/// Snapshot of what is playing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackInfo {
    /// Catalogue key of the current track.
    pub name: &'static str,
    pub title: &'static str,
    pub mood: Mood,
    pub is_playing: bool,
    pub active_layer_count: usize,
}

/// Everything `init` builds.
struct Runtime {
    ctx: AudioContext,
    master: NodeKey,
    analyser: NodeKey,
    effects: EffectsChain,
}

struct LayerEntry {
    id: String,
    layer: Box<dyn Layer>,
}

pub struct MusicEngine {
    config: EngineConfig,
    factory: LayerFactory,
    /// `None` until `init` succeeds.
    runtime: Option<Runtime>,
    /// Every layer that still owns nodes, including ones fading out.
    layers: SlotMap<LayerKey, LayerEntry>,
    /// Layers addressable by id.
    active: HashMap<String, LayerKey>,
    current_track: &'static str,
    playing: bool,
    volume: f32,
    chord_index: usize,
    chord_clock: Option<TimerKey>,
    pending_start: Option<TimerKey>,
    block: AudioBlock,
}

impl Default for MusicEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl MusicEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_factory(config, LayerFactory::new())
    }

    /// An engine that builds layers from `factory` instead of the
    /// built-in registry.
    pub fn with_factory(config: EngineConfig, factory: LayerFactory) -> Self {
        let volume = config.initial_volume.clamp(0.0, 1.0);
        Self {
            config,
            factory,
            runtime: None,
            layers: SlotMap::with_key(),
            active: HashMap::new(),
            current_track: ce_ir::DEFAULT_TRACK,
            playing: false,
            volume,
            chord_index: 0,
            chord_clock: None,
            pending_start: None,
            block: AudioBlock::new(),
        }
    }

    /// Build the output graph. Calling it again once initialised does
    /// nothing.
    pub fn init(&mut self) -> Result<(), EngineError> {
        if self.runtime.is_some() {
            return Ok(());
        }
        self.config.validate()?;

        let mut ctx = AudioContext::new(self.config.sample_rate, self.config.seed);
        let master = ctx.gain(self.volume);
        let effects = EffectsChain::new(&mut ctx, self.config.reverb_seconds);
        let analyser = ctx.analyser();
        let destination = ctx.destination();
        ctx.connect(master, effects.input());
        ctx.connect(effects.output(), analyser);
        ctx.connect(analyser, destination);

        log::info!(
            "music engine ready at {} Hz ({} nodes)",
            self.config.sample_rate,
            ctx.graph().len()
        );
        self.runtime = Some(Runtime { ctx, master, analyser, effects });
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.runtime.is_some()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn factory_mut(&mut self) -> &mut LayerFactory {
        &mut self.factory
    }

    /// The audio context, once initialised.
    pub fn context(&self) -> Option<&AudioContext> {
        self.runtime.as_ref().map(|rt| &rt.ctx)
    }

    /// Seconds of audio rendered so far.
    pub fn now(&self) -> f64 {
        self.context().map_or(0.0, AudioContext::now)
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn current_track(&self) -> &'static str {
        self.current_track
    }

    pub fn chord_index(&self) -> usize {
        self.chord_index
    }

    /// Ids of the addressable layers, sorted.
    pub fn active_layer_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.active.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Layers still holding graph nodes, including ones fading out.
    pub fn live_layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Start `track`, crossfading if another track is playing.
    pub fn play(&mut self, track: &str) {
        let Some(rt) = self.runtime.as_mut() else {
            return;
        };
        let Some(def) = ce_ir::track(track) else {
            log::warn!("unknown track {:?}", track);
            return;
        };
        if self.playing && self.current_track == def.key {
            return;
        }
        if rt.ctx.state() == ContextState::Suspended {
            rt.ctx.resume();
        }

        if self.playing {
            self.crossfade_to(def.key, self.config.crossfade_seconds);
        } else {
            self.start_track(def.key);
        }
        self.playing = true;
        self.current_track = def.key;
        self.arm_chord_clock();
    }

    /// Start the exploration theme.
    pub fn play_default(&mut self) {
        self.play(ce_ir::DEFAULT_TRACK);
    }

    /// Start one layer per spec of `track`, ids `"{track}_{ordinal}"`.
    pub fn start_track(&mut self, track: &str) {
        if self.runtime.is_none() {
            return;
        }
        let Some(def) = ce_ir::track(track) else {
            log::warn!("unknown track {:?}", track);
            return;
        };
        for (i, spec) in def.layers.iter().enumerate() {
            let id = format!("{}_{}", def.key, i);
            self.stop_layer(&id);

            let Some(rt) = self.runtime.as_mut() else {
                return;
            };
            let Some(layer) = self.factory.create(&mut rt.ctx, spec, def.mood) else {
                continue;
            };
            let key = self.layers.insert(LayerEntry { id: id.clone(), layer });
            if let Some(entry) = self.layers.get_mut(key) {
                let mut cx = LayerCx::new(&mut rt.ctx, key, None);
                entry.layer.start(&mut cx, rt.master);
            }
            self.active.insert(id, key);
        }
        log::info!("started track {} ({})", def.key, def.title);
    }

    /// Fade the current track's layers out over `duration` seconds and
    /// start `track` halfway through.
    pub fn crossfade_to(&mut self, track: &str, duration: f64) {
        if self.runtime.is_none() {
            return;
        }
        let Some(def) = ce_ir::track(track) else {
            log::warn!("unknown track {:?}", track);
            return;
        };
        let duration = if duration.is_finite() { duration.max(0.0) } else { self.config.crossfade_seconds };

        let prefix = format!("{}_", self.current_track);
        let outgoing: Vec<LayerKey> = self
            .active
            .iter()
            .filter(|(id, _)| id.starts_with(&prefix))
            .map(|(_, key)| *key)
            .collect();
        for key in outgoing {
            self.stop_entry(key, duration);
        }

        let Some(rt) = self.runtime.as_mut() else {
            return;
        };
        if let Some(pending) = self.pending_start.take() {
            rt.ctx.cancel_timer(pending);
        }
        let start = TimerTarget::Engine(EngineTask::StartTrack(def.key));
        self.pending_start = Some(rt.ctx.schedule(duration / 2.0, start));
        log::info!("crossfade {} -> {} over {:.1}s", self.current_track, def.key, duration);
        self.current_track = def.key;
        self.playing = true;
    }

    /// Fade every layer out over two seconds and stop the chord clock.
    pub fn stop(&mut self) {
        if !self.playing {
            return;
        }
        let keys: Vec<LayerKey> = self.active.values().copied().collect();
        for key in keys {
            self.stop_entry(key, DEFAULT_FADE_SECONDS);
        }
        if let Some(rt) = self.runtime.as_mut() {
            for timer in [self.chord_clock.take(), self.pending_start.take()].into_iter().flatten() {
                rt.ctx.cancel_timer(timer);
            }
        }
        self.playing = false;
        log::info!("stopped {}", self.current_track);
    }

    /// Stop the layer with `id` and forget it immediately.
    pub fn stop_layer(&mut self, id: &str) -> bool {
        match self.active.remove(id) {
            Some(key) => {
                self.stop_entry(key, DEFAULT_FADE_SECONDS);
                true
            }
            None => false,
        }
    }

    /// Step to the next chord of the current mood and tell every layer.
    pub fn change_chord(&mut self) {
        let Some(def) = ce_ir::track(self.current_track) else {
            return;
        };
        let len = ce_ir::progression(def.mood).len();
        if len == 0 {
            return;
        }
        self.chord_index = (self.chord_index + 1) % len;
        let update = LayerUpdate { chord_index: self.chord_index };
        for key in self.active.values() {
            if let Some(entry) = self.layers.get_mut(*key) {
                entry.layer.update(&update);
            }
        }
        log::debug!("chord {} of {}", self.chord_index, len);
    }

    /// Clamp to 0..=1 and glide the master gain there.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = if volume.is_finite() { volume.clamp(0.0, 1.0) } else { 0.0 };
        if let Some(rt) = self.runtime.as_mut() {
            let now = rt.ctx.now();
            let target = self.volume.max(MIN_VOLUME);
            rt.ctx.exp_ramp(rt.master, ParamId::Gain, target, now + VOLUME_RAMP_SECONDS);
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Follow a game-state snapshot: switch track if the rule picks a
    /// different one, and darken the filter as health drops.
    pub fn update_game_state(&mut self, state: &GameState) {
        if self.runtime.is_none() {
            return;
        }
        let target = ce_ir::select_track(state);
        if target != self.current_track {
            self.play(target);
        }
        if let Some(rt) = self.runtime.as_mut() {
            rt.effects.update_filter_intensity(&mut rt.ctx, state.intensity());
        }
    }

    pub fn set_wet_mix(&mut self, wet: f32) {
        if let Some(rt) = self.runtime.as_mut() {
            rt.effects.set_wet_mix(&mut rt.ctx, wet);
        }
    }

    pub fn effects(&self) -> Option<&EffectsChain> {
        self.runtime.as_ref().map(|rt| &rt.effects)
    }

    /// Latest analyser magnitudes, one byte per bin.
    pub fn visualization_data(&self) -> Option<&[u8]> {
        let rt = self.runtime.as_ref()?;
        match rt.ctx.graph().processor(rt.analyser)? {
            Processor::Analyser(analyser) => Some(analyser.bytes().as_slice()),
            _ => None,
        }
    }

    pub fn current_track_info(&self) -> TrackInfo {
        let def = ce_ir::track(self.current_track);
        TrackInfo {
            name: self.current_track,
            title: def.map_or("Unknown", |d| d.title),
            mood: def.map_or(Mood::Peaceful, |d| d.mood),
            is_playing: self.playing,
            active_layer_count: self.active.len(),
        }
    }

    /// Freeze the clock. Output is silence until `resume`.
    pub fn pause(&mut self) {
        if let Some(rt) = self.runtime.as_mut() {
            if self.playing {
                rt.ctx.suspend();
            }
        }
    }

    pub fn resume(&mut self) {
        if let Some(rt) = self.runtime.as_mut() {
            if rt.ctx.state() == ContextState::Suspended {
                rt.ctx.resume();
            }
        }
    }

    pub fn is_paused(&self) -> bool {
        self.context().is_some_and(|ctx| ctx.state() == ContextState::Suspended)
    }

    /// Render the next block. Timers due by the end of the block fire
    /// before this returns, so engine state always matches `now()`.
    pub fn render_block(&mut self) -> &AudioBlock {
        self.dispatch_timers();
        match self.runtime.as_mut() {
            Some(rt) => self.block.clone_from(rt.ctx.render()),
            None => return &self.block,
        }
        self.dispatch_timers();
        &self.block
    }

    /// Render at least `seconds` of audio, discarding it. Returns the
    /// output peak.
    pub fn advance(&mut self, seconds: f64) -> f32 {
        let Some(rt) = self.runtime.as_ref() else {
            return 0.0;
        };
        let blocks = rt.ctx.frames(seconds).div_ceil(BLOCK_SIZE as u64);
        let mut peak = 0.0f32;
        for _ in 0..blocks {
            peak = peak.max(self.render_block().peak());
        }
        peak
    }

    fn arm_chord_clock(&mut self) {
        if self.chord_clock.is_some() {
            return;
        }
        if let Some(rt) = self.runtime.as_mut() {
            let period = self.config.chord_interval_ms as f64 / 1000.0;
            self.chord_clock = Some(rt.ctx.schedule(period, TimerTarget::Engine(EngineTask::ChordClock)));
        }
    }

    fn stop_entry(&mut self, key: LayerKey, fade: f64) -> bool {
        let (Some(rt), Some(entry)) = (self.runtime.as_mut(), self.layers.get_mut(key)) else {
            return false;
        };
        let amp = entry.layer.core().amp();
        let mut cx = LayerCx::new(&mut rt.ctx, key, amp);
        entry.layer.stop(&mut cx, fade)
    }

    fn dispatch_timers(&mut self) {
        loop {
            let Some(rt) = self.runtime.as_mut() else {
                return;
            };
            let Some((timer, target)) = rt.ctx.pop_due_timer() else {
                return;
            };
            match target {
                TimerTarget::Layer { layer, tag } => self.layer_timer(layer, tag),
                TimerTarget::Engine(task) => self.engine_task(timer, task),
            }
        }
    }

    fn layer_timer(&mut self, key: LayerKey, tag: u16) {
        let Some(rt) = self.runtime.as_mut() else {
            return;
        };
        if tag == RELEASE_TAG {
            let freed = rt.ctx.graph_mut().remove_owned_by(key);
            if let Some(mut entry) = self.layers.remove(key) {
                entry.layer.core_mut().mark_released();
                if self.active.get(&entry.id) == Some(&key) {
                    self.active.remove(&entry.id);
                }
                log::debug!("released {} ({} nodes)", entry.id, freed);
            }
            return;
        }

        let Some(entry) = self.layers.get_mut(key) else {
            return;
        };
        if !entry.layer.core().is_playing() {
            return;
        }
        entry.layer.core_mut().fired(tag);
        let amp = entry.layer.core().amp();
        let mut cx = LayerCx::new(&mut rt.ctx, key, amp);
        entry.layer.on_timer(tag, &mut cx);
    }

    fn engine_task(&mut self, timer: TimerKey, task: EngineTask) {
        match task {
            EngineTask::ChordClock => {
                if self.chord_clock != Some(timer) {
                    return;
                }
                self.chord_clock = None;
                self.change_chord();
                self.arm_chord_clock();
            }
            EngineTask::StartTrack(track) => {
                if self.pending_start != Some(timer) {
                    return;
                }
                self.pending_start = None;
                self.start_track(track);
            }
        }
    }
}

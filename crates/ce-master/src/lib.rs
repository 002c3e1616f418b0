//! Host for the Cosmic Explorer music engine.
//!
//! [`Controller`] runs a [`MusicEngine`] on its own thread feeding a cpal
//! stream. The game side talks to it through lock-free queues: commands
//! go in, analyser snapshots come back. Offline rendering to WAV lives in
//! [`render`].

pub mod render;
mod wav;

use ce_audio::{AudioError, AudioOutput, CpalOutput};
use ce_engine::{block_frames, EngineConfig, EngineError, MusicEngine};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;

pub use ce_engine::nodes::FREQUENCY_BINS;
pub use ce_engine::{Frame, TrackInfo};
pub use ce_ir::GameState;
pub use render::{render_scenario, render_track, Rendered, ScenarioStep};
pub use wav::{frames_to_wav, write_wav};

const COMMAND_CAPACITY: usize = 64;
const SNAPSHOT_CAPACITY: usize = 4;
/// Blocks between analyser snapshots (~20 per second at 44.1 kHz).
const SNAPSHOT_INTERVAL: u64 = 16;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error("engine init failed: {0}")]
    Engine(#[from] EngineError),
    #[error("playback is already running")]
    AlreadyRunning,
    #[error("audio thread exited during startup")]
    ThreadExited,
    #[error("unknown track {0:?}")]
    UnknownTrack(String),
    #[error("invalid scenario step {0:?} (expected SECONDS:HEALTH[:pod|repair|combat])")]
    InvalidStep(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Requests the audio thread applies before its next block.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    Play(&'static str),
    Stop,
    Pause,
    Resume,
    SetVolume(f32),
    GameState(GameState),
    WetMix(f32),
}

/// What the audio thread reports back.
#[derive(Clone, Copy, Debug)]
pub struct Snapshot {
    pub bins: [u8; FREQUENCY_BINS],
    pub info: TrackInfo,
    /// Commands the engine had applied when this was taken.
    pub applied: u64,
}

pub struct Controller {
    config: EngineConfig,
    master_volume: f32,
    music_volume: f32,
    current_track: Option<&'static str>,
    latest: Option<Snapshot>,
    /// Commands queued since `start`.
    sent: u64,
    playback: Option<PlaybackHandle>,
}

struct PlaybackHandle {
    commands: HeapProd<Command>,
    snapshots: HeapCons<Snapshot>,
    stop_signal: Arc<AtomicBool>,
    sample_rate: u32,
    thread: Option<JoinHandle<()>>,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Controller {
    /// The sample rate in `config` is replaced by the device's on `start`.
    pub fn new(config: EngineConfig) -> Self {
        let music_volume = config.initial_volume.clamp(0.0, 1.0);
        Self {
            config,
            master_volume: 1.0,
            music_volume,
            current_track: None,
            latest: None,
            sent: 0,
            playback: None,
        }
    }

    // --- Audio thread lifecycle ---

    /// Open the output device and start the engine thread. Device and
    /// engine errors surface here, once.
    pub fn start(&mut self) -> Result<u32, ControllerError> {
        if self.playback.is_some() {
            return Err(ControllerError::AlreadyRunning);
        }
        let (commands, command_rx) = HeapRb::<Command>::new(COMMAND_CAPACITY).split();
        let (snapshot_tx, snapshots) = HeapRb::<Snapshot>::new(SNAPSHOT_CAPACITY).split();
        let stop_signal = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        self.sent = 0;
        self.latest = None;

        let config = self.config.clone();
        let volume = self.effective_volume();
        let stop = stop_signal.clone();
        let thread = std::thread::Builder::new()
            .name("ce-audio".into())
            .spawn(move || audio_thread(config, volume, command_rx, snapshot_tx, stop, ready_tx))?;

        let sample_rate = match ready_rx.recv() {
            Ok(Ok(rate)) => rate,
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(ControllerError::ThreadExited);
            }
        };
        log::info!("audio thread running at {} Hz", sample_rate);

        self.playback = Some(PlaybackHandle {
            commands,
            snapshots,
            stop_signal,
            sample_rate,
            thread: Some(thread),
        });
        Ok(sample_rate)
    }

    /// Stop the engine thread and close the device.
    pub fn shutdown(&mut self) {
        if let Some(mut pb) = self.playback.take() {
            pb.stop_signal.store(true, Ordering::Relaxed);
            if let Some(handle) = pb.thread.take() {
                let _ = handle.join();
            }
            log::info!("audio thread stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.playback.is_some()
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.playback.as_ref().map(|pb| pb.sample_rate)
    }

    // --- Music ---

    pub fn play(&mut self, track: &str) {
        let Some(def) = ce_ir::track(track) else {
            log::warn!("unknown track {:?}", track);
            return;
        };
        if self.send(Command::Play(def.key)) {
            self.current_track = Some(def.key);
        }
    }

    pub fn play_default(&mut self) {
        self.play(ce_ir::DEFAULT_TRACK);
    }

    pub fn stop(&mut self) {
        self.send(Command::Stop);
    }

    pub fn pause(&mut self) {
        self.send(Command::Pause);
    }

    pub fn resume(&mut self) {
        self.send(Command::Resume);
    }

    pub fn update_game_state(&mut self, state: GameState) {
        self.send(Command::GameState(state));
    }

    /// Switch to the region's theme track if it differs from the current one.
    pub fn change_region(&mut self, theme: &str) {
        let track = ce_ir::track_for_region(theme);
        if self.current_track != Some(track) {
            log::debug!("region {:?} -> {}", theme, track);
            self.play(track);
        }
    }

    pub fn set_wet_mix(&mut self, wet: f32) {
        self.send(Command::WetMix(wet));
    }

    // --- Volume ---

    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = clamp_volume(volume);
        self.send(Command::SetVolume(self.effective_volume()));
    }

    pub fn set_music_volume(&mut self, volume: f32) {
        self.music_volume = clamp_volume(volume);
        self.send(Command::SetVolume(self.effective_volume()));
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    pub fn music_volume(&self) -> f32 {
        self.music_volume
    }

    /// Level the engine's master gain is driven to.
    pub fn effective_volume(&self) -> f32 {
        self.master_volume * self.music_volume
    }

    // --- Feedback ---

    /// Drain pending snapshots, keeping the newest.
    pub fn poll(&mut self) -> Option<&Snapshot> {
        while let Some(snapshot) = self.playback.as_mut().and_then(|pb| pb.snapshots.try_pop()) {
            self.observe(snapshot);
        }
        self.latest.as_ref()
    }

    /// Snapshots taken before the engine caught up with our commands
    /// don't override the track we last asked for.
    fn observe(&mut self, snapshot: Snapshot) {
        if snapshot.applied >= self.sent {
            self.current_track = Some(snapshot.info.name);
        }
        self.latest = Some(snapshot);
    }

    pub fn visualization_data(&mut self) -> Option<&[u8]> {
        self.poll().map(|s| s.bins.as_slice())
    }

    pub fn current_track_info(&mut self) -> Option<TrackInfo> {
        self.poll().map(|s| s.info)
    }

    pub fn current_track(&self) -> Option<&'static str> {
        self.current_track
    }

    fn send(&mut self, command: Command) -> bool {
        let Some(pb) = self.playback.as_mut() else {
            log::debug!("ignoring {:?}: audio thread not running", command);
            return false;
        };
        if pb.commands.try_push(command).is_err() {
            log::warn!("command queue full; dropped {:?}", command);
            return false;
        }
        self.sent += 1;
        true
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_finite() {
        volume.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn apply(engine: &mut MusicEngine, command: Command) {
    match command {
        Command::Play(track) => engine.play(track),
        Command::Stop => engine.stop(),
        Command::Pause => engine.pause(),
        Command::Resume => engine.resume(),
        Command::SetVolume(v) => engine.set_volume(v),
        Command::GameState(state) => engine.update_game_state(&state),
        Command::WetMix(w) => engine.set_wet_mix(w),
    }
}

fn audio_thread(
    config: EngineConfig,
    volume: f32,
    mut commands: HeapCons<Command>,
    mut snapshots: HeapProd<Snapshot>,
    stop_signal: Arc<AtomicBool>,
    ready: mpsc::SyncSender<Result<u32, ControllerError>>,
) {
    let (mut output, consumer) = match CpalOutput::new() {
        Ok(pair) => pair,
        Err(e) => {
            let _ = ready.send(Err(e.into()));
            return;
        }
    };
    let sample_rate = output.sample_rate();
    let mut engine = MusicEngine::new(config.with_sample_rate(sample_rate));
    if let Err(e) = engine.init() {
        let _ = ready.send(Err(e.into()));
        return;
    }
    engine.set_volume(volume);
    if let Err(e) = output.build_stream(consumer).and_then(|()| output.start()) {
        let _ = ready.send(Err(e.into()));
        return;
    }
    let _ = ready.send(Ok(sample_rate));

    let mut blocks: u64 = 0;
    let mut applied: u64 = 0;
    while !stop_signal.load(Ordering::Relaxed) {
        while let Some(command) = commands.try_pop() {
            apply(&mut engine, command);
            applied += 1;
        }

        let block = engine.render_block();
        #[cfg(feature = "alloc_check")]
        assert_no_alloc::assert_no_alloc(|| {
            for frame in block_frames(block, 1.0) {
                output.write_spin(frame);
            }
        });
        #[cfg(not(feature = "alloc_check"))]
        for frame in block_frames(block, 1.0) {
            output.write_spin(frame);
        }

        blocks += 1;
        if blocks % SNAPSHOT_INTERVAL == 0 {
            if let Some(data) = engine.visualization_data() {
                let mut bins = [0u8; FREQUENCY_BINS];
                bins.copy_from_slice(&data[..FREQUENCY_BINS]);
                // a full queue means nobody is polling; skip
                let info = engine.current_track_info();
                let _ = snapshots.try_push(Snapshot { bins, info, applied });
            }
        }
    }

    engine.stop();
    let _ = output.stop();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_is_master_times_music() {
        let mut controller = Controller::default();
        assert_eq!(controller.effective_volume(), 0.5);
        controller.set_master_volume(0.5);
        controller.set_music_volume(0.8);
        assert!((controller.effective_volume() - 0.4).abs() < 1e-6);
        controller.set_master_volume(4.0);
        controller.set_music_volume(f32::NAN);
        assert_eq!(controller.master_volume(), 1.0);
        assert_eq!(controller.effective_volume(), 0.0);
    }

    #[test]
    fn commands_before_start_are_dropped() {
        let mut controller = Controller::default();
        controller.play("combat");
        controller.change_region("industrial");
        assert!(!controller.is_running());
        assert_eq!(controller.current_track(), None);
        assert!(controller.visualization_data().is_none());
        assert!(controller.current_track_info().is_none());
    }

    fn snapshot(track: &'static str, applied: u64) -> Snapshot {
        Snapshot {
            bins: [0; FREQUENCY_BINS],
            info: TrackInfo {
                name: track,
                title: "",
                mood: ce_ir::Mood::Peaceful,
                is_playing: true,
                active_layer_count: 0,
            },
            applied,
        }
    }

    #[test]
    fn stale_snapshot_keeps_requested_track() {
        let mut controller = Controller::default();
        controller.current_track = Some("station");
        controller.sent = 3;

        controller.observe(snapshot("exploration", 2));
        assert_eq!(controller.current_track(), Some("station"));
        assert_eq!(controller.latest.map(|s| s.info.name), Some("exploration"));

        // game-state switches made by the engine show up once it has caught up
        controller.observe(snapshot("danger", 3));
        assert_eq!(controller.current_track(), Some("danger"));
    }

    #[test]
    fn commands_drive_the_engine() {
        let mut engine = MusicEngine::new(
            EngineConfig::default()
                .with_sample_rate(8_000)
                .with_seed(9)
                .with_reverb_seconds(0.5),
        );
        engine.init().unwrap();
        apply(&mut engine, Command::Play("station"));
        assert_eq!(engine.current_track(), "station");
        apply(&mut engine, Command::SetVolume(0.25));
        assert_eq!(engine.volume(), 0.25);
        apply(&mut engine, Command::Pause);
        assert!(engine.is_paused());
        apply(&mut engine, Command::Resume);
        apply(&mut engine, Command::GameState(GameState { in_combat: true, ..GameState::default() }));
        assert_eq!(engine.current_track(), "combat");
        apply(&mut engine, Command::Stop);
        assert!(!engine.is_playing());
    }
}

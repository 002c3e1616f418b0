//! End-to-end sessions on the engine's virtual clock.

use ce_engine::{EngineConfig, MusicEngine};
use ce_ir::GameState;

fn engine() -> MusicEngine {
    let config = EngineConfig::default()
        .with_sample_rate(8_000)
        .with_seed(77)
        .with_reverb_seconds(0.5);
    let mut engine = MusicEngine::new(config);
    engine.init().unwrap();
    engine
}

fn state(health: f32) -> GameState {
    GameState { health, ..GameState::default() }
}

#[test]
fn every_track_plays_and_releases_cleanly() {
    for track in ce_ir::tracks() {
        let mut engine = engine();
        let base = engine.context().unwrap().graph().len();
        engine.play(track.key);
        assert_eq!(engine.current_track_info().active_layer_count, track.layers.len());

        let peak = engine.advance(4.0);
        assert!(peak > 0.0, "{} is silent", track.key);
        assert!(peak.is_finite() && peak < 4.0, "{} peak {}", track.key, peak);

        engine.stop();
        engine.advance(2.0);
        assert_eq!(engine.live_layer_count(), 0, "{} still fading at 2 s", track.key);
        let ctx = engine.context().unwrap();
        assert_eq!(ctx.graph().len(), base, "{} leaked nodes", track.key);
        assert_eq!(ctx.pending_timers(), 0, "{} left timers armed", track.key);
    }
}

#[test]
fn game_session_follows_priorities() {
    let mut engine = engine();
    engine.play("exploration");
    engine.advance(2.0);

    engine.update_game_state(&GameState { in_combat: true, ..state(90.0) });
    assert_eq!(engine.current_track(), "combat");
    engine.advance(4.0);

    // low health outranks combat
    engine.update_game_state(&GameState { in_combat: true, ..state(25.0) });
    assert_eq!(engine.current_track(), "danger");
    engine.advance(4.0);

    // repair outranks combat once health is back
    engine.update_game_state(&GameState { at_repair_location: true, in_combat: true, ..state(60.0) });
    assert_eq!(engine.current_track(), "station");
    engine.advance(4.0);

    // pod outranks everything
    engine.update_game_state(&GameState { in_pod_mode: true, ..state(10.0) });
    assert_eq!(engine.current_track(), "pod");
    engine.advance(4.0);

    let info = engine.current_track_info();
    assert_eq!(info.name, "pod");
    assert_eq!(info.active_layer_count, ce_ir::track("pod").unwrap().layers.len());
    assert!(engine.active_layer_ids().iter().all(|id| id.starts_with("pod_")));
}

#[test]
fn repeated_snapshots_do_not_restart_the_track() {
    let mut engine = engine();
    engine.play("exploration");
    engine.update_game_state(&GameState { in_combat: true, ..state(100.0) });
    engine.advance(2.0);
    let live = engine.live_layer_count();
    for _ in 0..10 {
        engine.update_game_state(&GameState { in_combat: true, ..state(100.0) });
        engine.advance(0.1);
    }
    assert_eq!(engine.current_track(), "combat");
    assert!(engine.live_layer_count() <= live);
}

#[test]
fn region_themes_map_to_tracks() {
    assert_eq!(ce_ir::track_for_region("industrial"), "station");
    assert_eq!(ce_ir::track_for_region("hostile"), "danger");
    assert_eq!(ce_ir::track_for_region("combat"), "combat");
    assert_eq!(ce_ir::track_for_region("nebula"), "exploration");

    let mut engine = engine();
    engine.play(ce_ir::track_for_region("station"));
    assert_eq!(engine.current_track(), "station");
}

#[test]
fn pause_mid_crossfade_holds_everything() {
    let mut engine = engine();
    engine.play("exploration");
    engine.advance(1.0);
    engine.play("danger");
    engine.pause();
    let live = engine.live_layer_count();
    engine.advance(10.0);
    assert_eq!(engine.live_layer_count(), live);

    engine.resume();
    engine.advance(3.5);
    let ids = engine.active_layer_ids();
    assert_eq!(ids.len(), ce_ir::track("danger").unwrap().layers.len());
    assert!(ids.iter().all(|id| id.starts_with("danger_")));
}

#[test]
fn seeded_engines_render_identically() {
    let render = || {
        let mut engine = engine();
        engine.play("combat");
        let mut samples = Vec::new();
        for _ in 0..200 {
            samples.extend_from_slice(engine.render_block().channel(0));
        }
        samples
    };
    assert_eq!(render(), render());
}

//! Offline WAV export through the host crate.

use ce_engine::EngineConfig;
use ce_master::{render_scenario, render_track, ScenarioStep};

fn config() -> EngineConfig {
    EngineConfig::default()
        .with_sample_rate(11_025)
        .with_seed(5)
        .with_reverb_seconds(1.0)
}

#[test]
fn track_renders_to_valid_wav() {
    let rendered = render_track(config(), "exploration", 4.0).unwrap();
    let wav = rendered.to_wav().unwrap();
    assert_eq!(&wav[0..4], b"RIFF");
    assert_eq!(&wav[8..12], b"WAVE");
    assert_eq!(wav.len(), 44 + 4 * 44_100);
    assert!(rendered.peak() > 0.001);
    // the fade-in starts from silence
    assert_eq!(rendered.frames[0], ce_engine::Frame::silence());
}

#[test]
fn scenario_render_records_switches() {
    let steps: Vec<ScenarioStep> = ["2:100:combat", "6:15", "9:100:repair"]
        .iter()
        .map(|s| s.parse().unwrap())
        .collect();
    let rendered = render_scenario(config(), &steps, 10.0).unwrap();
    let tracks: Vec<&str> = rendered.track_changes.iter().map(|(_, t)| *t).collect();
    assert_eq!(tracks, ["exploration", "combat", "danger", "station"]);
    let (at, _) = rendered.track_changes[1];
    assert!((2.0..2.1).contains(&at), "{}", at);
    assert!(rendered.peak() > 0.001);
}

//! Offline rendering on the engine's virtual clock.

use std::str::FromStr;

use ce_engine::{block_frames, EngineConfig, Frame, MusicEngine};
use ce_ir::GameState;

use crate::ControllerError;

/// A game-state snapshot applied once the clock reaches `at` seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScenarioStep {
    pub at: f64,
    pub state: GameState,
}

/// `SECONDS:HEALTH[:pod|repair|combat]...`, e.g. `"20:25:combat"`.
impl FromStr for ScenarioStep {
    type Err = ControllerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ControllerError::InvalidStep(s.to_string());
        let mut parts = s.trim().split(':');
        let at: f64 = parts.next().and_then(|p| p.trim().parse().ok()).ok_or_else(invalid)?;
        let health: f32 = parts.next().and_then(|p| p.trim().parse().ok()).ok_or_else(invalid)?;
        if !at.is_finite() || at < 0.0 || !health.is_finite() {
            return Err(invalid());
        }
        let mut state = GameState { health, ..GameState::default() };
        for flag in parts {
            match flag.trim() {
                "pod" => state.in_pod_mode = true,
                "repair" => state.at_repair_location = true,
                "combat" => state.in_combat = true,
                _ => return Err(invalid()),
            }
        }
        Ok(Self { at, state })
    }
}

/// Rendered audio plus the track switches that happened along the way.
#[derive(Debug, Default)]
pub struct Rendered {
    pub frames: Vec<Frame>,
    pub sample_rate: u32,
    /// (seconds, track key) for the opening track and every switch.
    pub track_changes: Vec<(f64, &'static str)>,
}

impl Rendered {
    pub fn to_wav(&self) -> std::io::Result<Vec<u8>> {
        crate::wav::frames_to_wav(&self.frames, self.sample_rate)
    }

    pub fn peak(&self) -> f32 {
        self.frames
            .iter()
            .map(|f| {
                let (l, r) = f.to_f32();
                l.abs().max(r.abs())
            })
            .fold(0.0, f32::max)
    }
}

/// Play `track` for `seconds`.
pub fn render_track(config: EngineConfig, track: &str, seconds: f64) -> Result<Rendered, ControllerError> {
    if ce_ir::track(track).is_none() {
        return Err(ControllerError::UnknownTrack(track.to_string()));
    }
    render(config, track, &[], seconds)
}

/// Start on exploration and feed `steps` in order of their times.
pub fn render_scenario(
    config: EngineConfig,
    steps: &[ScenarioStep],
    seconds: f64,
) -> Result<Rendered, ControllerError> {
    render(config, ce_ir::DEFAULT_TRACK, steps, seconds)
}

fn render(
    config: EngineConfig,
    track: &str,
    steps: &[ScenarioStep],
    seconds: f64,
) -> Result<Rendered, ControllerError> {
    let sample_rate = config.sample_rate;
    let mut engine = MusicEngine::new(config);
    engine.init()?;
    engine.play(track);

    let mut steps = steps.to_vec();
    steps.sort_by(|a, b| a.at.total_cmp(&b.at));
    let mut steps = steps.into_iter().peekable();

    let total = (seconds.max(0.0) * sample_rate as f64) as usize;
    let mut out = Rendered {
        frames: Vec::with_capacity(total),
        sample_rate,
        track_changes: vec![(0.0, engine.current_track())],
    };

    while out.frames.len() < total {
        let now = engine.now();
        while let Some(step) = steps.next_if(|s| s.at <= now) {
            engine.update_game_state(&step.state);
            let current = engine.current_track();
            if out.track_changes.last().map(|(_, t)| *t) != Some(current) {
                log::info!("{:.1}s: switched to {}", now, current);
                out.track_changes.push((now, current));
            }
        }
        let remaining = total - out.frames.len();
        out.frames.extend(block_frames(engine.render_block(), 1.0).take(remaining));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::default()
            .with_sample_rate(8_000)
            .with_seed(3)
            .with_reverb_seconds(0.5)
    }

    #[test]
    fn parses_scenario_steps() {
        let step: ScenarioStep = "12.5:25:combat:repair".parse().unwrap();
        assert_eq!(step.at, 12.5);
        assert_eq!(step.state.health, 25.0);
        assert!(step.state.in_combat && step.state.at_repair_location);
        assert!(!step.state.in_pod_mode);

        assert!("12".parse::<ScenarioStep>().is_err());
        assert!("x:100".parse::<ScenarioStep>().is_err());
        assert!("1:100:warp".parse::<ScenarioStep>().is_err());
        assert!("-1:100".parse::<ScenarioStep>().is_err());
    }

    #[test]
    fn track_render_is_audible_and_bounded() {
        let rendered = render_track(config(), "station", 3.0).unwrap();
        assert_eq!(rendered.frames.len(), 24_000);
        let peak = rendered.peak();
        assert!(peak > 0.001 && peak < 1.0, "{}", peak);
        assert_eq!(rendered.to_wav().unwrap().len(), 44 + 24_000 * 4);
    }

    #[test]
    fn unknown_track_is_an_error() {
        assert!(matches!(
            render_track(config(), "lounge", 1.0),
            Err(ControllerError::UnknownTrack(_))
        ));
    }

    #[test]
    fn scenario_follows_game_state() {
        let steps = [
            "1:100:combat".parse().unwrap(),
            "3:20:combat".parse().unwrap(),
            "5:80:pod".parse().unwrap(),
        ];
        let rendered = render_scenario(config(), &steps, 6.0).unwrap();
        let tracks: Vec<&str> = rendered.track_changes.iter().map(|(_, t)| *t).collect();
        assert_eq!(tracks, ["exploration", "combat", "danger", "pod"]);
    }
}

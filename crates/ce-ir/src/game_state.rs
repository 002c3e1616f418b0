//! Game-state snapshot and the track selection rule.

/// Health below this selects the danger track.
pub const DANGER_HEALTH: f32 = 30.0;

/// The slice of game state the music engine listens to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GameState {
    /// Player health, 0..=100.
    pub health: f32,
    pub in_pod_mode: bool,
    pub at_repair_location: bool,
    pub in_combat: bool,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            health: 100.0,
            in_pod_mode: false,
            at_repair_location: false,
            in_combat: false,
        }
    }
}

impl GameState {
    /// Filter intensity derived from missing health, clamped to 0..=1.
    pub fn intensity(&self) -> f32 {
        if !self.health.is_finite() {
            return 0.0;
        }
        (1.0 - self.health / 100.0).clamp(0.0, 1.0)
    }
}

/// Pick the track for a snapshot. Checked in priority order:
/// pod, low health, repair location, combat, exploration.
pub fn select_track(state: &GameState) -> &'static str {
    if state.in_pod_mode {
        "pod"
    } else if state.health < DANGER_HEALTH {
        "danger"
    } else if state.at_repair_location {
        "station"
    } else if state.in_combat {
        "combat"
    } else {
        "exploration"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(health: f32, pod: bool, repair: bool, combat: bool) -> GameState {
        GameState {
            health,
            in_pod_mode: pod,
            at_repair_location: repair,
            in_combat: combat,
        }
    }

    #[test]
    fn pod_outranks_everything() {
        assert_eq!(select_track(&state(20.0, true, false, true)), "pod");
        assert_eq!(select_track(&state(100.0, true, true, false)), "pod");
    }

    #[test]
    fn low_health_outranks_combat() {
        assert_eq!(select_track(&state(20.0, false, false, true)), "danger");
        assert_eq!(select_track(&state(29.9, false, true, false)), "danger");
    }

    #[test]
    fn repair_location_is_station() {
        assert_eq!(select_track(&state(80.0, false, true, false)), "station");
        assert_eq!(select_track(&state(80.0, false, true, true)), "station");
    }

    #[test]
    fn combat_then_exploration() {
        assert_eq!(select_track(&state(30.0, false, false, true)), "combat");
        assert_eq!(select_track(&GameState::default()), "exploration");
    }

    #[test]
    fn intensity_is_missing_health() {
        assert_eq!(state(100.0, false, false, false).intensity(), 0.0);
        assert!((state(25.0, false, false, false).intensity() - 0.75).abs() < 1e-6);
        assert_eq!(state(-50.0, false, false, false).intensity(), 1.0);
        assert_eq!(state(f32::NAN, false, false, false).intensity(), 0.0);
    }
}

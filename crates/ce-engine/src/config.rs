//! Engine configuration and initialisation errors.

use ce_ir::{CHORD_CHANGE_INTERVAL_MS, DEFAULT_CROSSFADE_SECS};
use thiserror::Error;

/// Tunables fixed at engine construction.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Length of the synthesized reverb impulse.
    pub reverb_seconds: f32,
    /// Chord clock period.
    pub chord_interval_ms: u64,
    /// Crossfade length used by `play` when switching tracks.
    pub crossfade_seconds: f64,
    /// Master volume before any `set_volume` call.
    pub initial_volume: f32,
    /// Fixed RNG seed. `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            reverb_seconds: 5.0,
            chord_interval_ms: CHORD_CHANGE_INTERVAL_MS,
            crossfade_seconds: DEFAULT_CROSSFADE_SECS,
            initial_volume: 0.5,
            seed: None,
        }
    }
}

impl EngineConfig {
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_reverb_seconds(mut self, seconds: f32) -> Self {
        self.reverb_seconds = seconds;
        self
    }

    /// Reject settings the renderer cannot work with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(8_000..=192_000).contains(&self.sample_rate) {
            return Err(EngineError::SampleRate(self.sample_rate));
        }
        if !self.reverb_seconds.is_finite() || self.reverb_seconds <= 0.0 {
            return Err(EngineError::InvalidConfig("reverb_seconds must be positive"));
        }
        if self.chord_interval_ms == 0 {
            return Err(EngineError::InvalidConfig("chord_interval_ms must be non-zero"));
        }
        if !self.crossfade_seconds.is_finite() || self.crossfade_seconds < 0.0 {
            return Err(EngineError::InvalidConfig("crossfade_seconds must be non-negative"));
        }
        Ok(())
    }
}

/// Failures surfaced from `MusicEngine::init`.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("unsupported sample rate {0} Hz")]
    SampleRate(u32),
    #[error("invalid engine config: {0}")]
    InvalidConfig(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(EngineConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_zero_sample_rate() {
        let cfg = EngineConfig::default().with_sample_rate(0);
        assert_eq!(cfg.validate(), Err(EngineError::SampleRate(0)));
    }

    #[test]
    fn rejects_empty_reverb() {
        let cfg = EngineConfig::default().with_reverb_seconds(0.0);
        assert!(matches!(cfg.validate(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn error_messages_name_the_problem() {
        let msg = EngineError::SampleRate(7).to_string();
        assert!(msg.contains("7 Hz"), "got {}", msg);
    }
}

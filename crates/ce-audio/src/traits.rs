//! Audio output trait and error types.

use ce_engine::Frame;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output device available")]
    NoDevice,
    #[error("device init error: {0}")]
    DeviceInit(String),
    #[error("stream create error: {0}")]
    StreamCreate(String),
    #[error("playback error: {0}")]
    Playback(String),
}

/// Trait for audio output backends.
pub trait AudioOutput {
    /// Device sample rate; the engine renders at this rate.
    fn sample_rate(&self) -> u32;

    /// Queue frames without blocking. Returns how many were accepted.
    fn write(&mut self, frames: &[Frame]) -> usize;

    fn start(&mut self) -> Result<(), AudioError>;

    fn stop(&mut self) -> Result<(), AudioError>;
}

//! Playback engine for the Cosmic Explorer soundtrack.
//!
//! A small Web-Audio-style runtime (signal graph, parameter automation,
//! sample-clock timers) underneath 35 procedural layer variants, a shared
//! effects chain and the [`MusicEngine`] that picks tracks from game state.

pub mod config;
pub mod context;
pub mod effects;
pub mod factory;
mod frame;
pub mod graph;
pub mod layer;
pub mod layers;
pub mod music;
pub mod nodes;
pub mod param;
pub mod synth;
pub mod timer;

pub use config::{EngineConfig, EngineError};
pub use context::{AudioContext, ContextState, LayerKey, TimerTarget};
pub use effects::EffectsChain;
pub use factory::{FactoryError, LayerCtor, LayerFactory};
pub use frame::{block_frames, Frame};
pub use graph::{NodeKey, SignalGraph};
pub use layer::{Layer, LayerCore, LayerCx, LayerState, LayerUpdate};
pub use music::{EngineTask, MusicEngine, TrackInfo};
pub use timer::{TimerKey, TimerQueue};

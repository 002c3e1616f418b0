//! Core data model for the Cosmic Explorer adaptive music engine.
//!
//! This crate holds everything that is pure data or pure computation:
//! the track catalogue, the per-mood harmonic tables, music theory
//! helpers, the game-state track selection rule and the fixed-size
//! audio block the renderer passes between nodes.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod audio_buffer;
mod curve;
mod game_state;
mod harmony;
mod layer_spec;
mod mood;
mod theory;
mod tracks;

pub use audio_buffer::{AudioBlock, BLOCK_SIZE, CHANNELS};
pub use curve::{interpolate, CurveKind, MIN_EXPONENTIAL_VALUE};
pub use game_state::{select_track, GameState, DANGER_HEALTH};
pub use harmony::{
    arpeggio_pattern, bass_pattern, chord, chord_offset, percussion_pattern, progression, scale,
    Chord, BPM, CHORD_CHANGE_INTERVAL_MS, DEFAULT_CROSSFADE_SECS, NOTES_PER_CHORD,
};
pub use layer_spec::{LayerParams, LayerSpec, DEFAULT_LAYER_GAIN};
pub use mood::Mood;
pub use theory::{
    bpm_to_ms, frequency_to_midi, midi_to_frequency, quantize_time, transpose, A4_FREQUENCY,
    A4_MIDI,
};
pub use tracks::{track, track_for_region, tracks, TrackDefinition, DEFAULT_TRACK};

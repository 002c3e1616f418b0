//! Per-mood harmonic tables: chord progressions, scales and patterns.
//!
//! All intervals are semitone offsets from the track's root. Lookups never
//! fail: unknown names fall back to the peaceful tables and indices wrap.

use crate::Mood;

/// Wall-clock cadence of the shared chord clock.
pub const CHORD_CHANGE_INTERVAL_MS: u64 = 8000;

/// Crossfade length used when switching tracks.
pub const DEFAULT_CROSSFADE_SECS: f64 = 3.0;

/// Nominal tempo for beat-quantised helpers.
pub const BPM: f64 = 60.0;

pub const NOTES_PER_CHORD: usize = 5;

/// One chord as semitone offsets from the root.
pub type Chord = [i8; NOTES_PER_CHORD];

const PEACEFUL_PROGRESSION: [Chord; 8] = [
    [0, 4, 7, 11, 14],  // Imaj9
    [5, 9, 12, 16, 19], // IVmaj9
    [7, 11, 14, 17, 21],
    [2, 5, 9, 12, 17],
    [9, 12, 16, 19, 23],
    [4, 7, 11, 14, 19],
    [5, 9, 12, 16, 20],
    [0, 4, 7, 11, 14],
];

const MYSTERIOUS_PROGRESSION: [Chord; 8] = [
    [0, 3, 7, 10, 14], // im9
    [5, 8, 12, 15, 20],
    [7, 10, 14, 17, 22],
    [3, 7, 10, 14, 18],
    [8, 11, 15, 18, 22],
    [1, 5, 8, 11, 15], // Neapolitan
    [10, 13, 17, 20, 24],
    [0, 3, 7, 10, 15],
];

const TENSE_PROGRESSION: [Chord; 8] = [
    [0, 3, 6, 9, 12], // diminished stack
    [2, 5, 8, 11, 13],
    [7, 10, 13, 16, 19],
    [1, 4, 7, 10, 13],
    [8, 11, 14, 17, 20],
    [3, 6, 9, 12, 15],
    [5, 8, 11, 14, 17],
    [0, 3, 6, 9, 11],
];

const EPIC_PROGRESSION: [Chord; 8] = [
    [0, 7, 12, 16, 19],
    [-2, 5, 10, 14, 17],
    [5, 12, 17, 21, 24],
    [3, 10, 15, 19, 22],
    [7, 14, 19, 23, 26],
    [2, 9, 14, 18, 21],
    [-5, 2, 7, 11, 14],
    [0, 7, 12, 16, 19],
];

const PEACEFUL_SCALE: [i8; 7] = [0, 2, 4, 5, 7, 9, 11]; // major
const MYSTERIOUS_SCALE: [i8; 7] = [0, 2, 3, 5, 7, 8, 10]; // natural minor
const TENSE_SCALE: [i8; 8] = [0, 1, 3, 4, 6, 7, 9, 10]; // half-whole diminished
const EPIC_SCALE: [i8; 7] = [0, 2, 3, 5, 7, 8, 11]; // harmonic minor

const PEACEFUL_BASS: [i8; 8] = [0, 0, 5, 5, 7, 7, 5, 5];
const MYSTERIOUS_BASS: [i8; 8] = [0, 0, -2, 0, 3, 3, 5, 3];
const TENSE_BASS: [i8; 8] = [0, 1, 0, -1, 0, 1, 3, 1];
const EPIC_BASS: [i8; 8] = [0, 0, 0, 0, -2, -2, 5, 5];

const PEACEFUL_ARPEGGIO: [i8; 8] = [0, 4, 7, 11, 14, 11, 7, 4];
const MYSTERIOUS_ARPEGGIO: [i8; 8] = [0, 3, 7, 10, 14, 10, 7, 3];
const TENSE_ARPEGGIO: [i8; 8] = [0, 3, 6, 9, 6, 3, 0, -3];
const EPIC_ARPEGGIO: [i8; 8] = [0, 7, 12, 16, 19, 16, 12, 7];

const COMBAT_PERCUSSION: [bool; 8] = [true, false, false, true, false, true, false, false];
const EPIC_PERCUSSION: [bool; 8] = [true, false, true, false, true, false, true, false];

/// The eight-chord progression for a mood.
pub fn progression(mood: Mood) -> &'static [Chord] {
    match mood {
        Mood::Peaceful => &PEACEFUL_PROGRESSION,
        Mood::Mysterious => &MYSTERIOUS_PROGRESSION,
        Mood::Tense => &TENSE_PROGRESSION,
        Mood::Epic => &EPIC_PROGRESSION,
    }
}

/// Chord `index` of the mood's progression, wrapping.
pub fn chord(mood: Mood, index: usize) -> &'static Chord {
    let prog = progression(mood);
    &prog[index % prog.len()]
}

/// Semitone offset of note `note` within chord `chord_index`. Both indices wrap.
pub fn chord_offset(mood: Mood, chord_index: usize, note: usize) -> i32 {
    let notes = chord(mood, chord_index);
    notes[note % notes.len()] as i32
}

pub fn scale(mood: Mood) -> &'static [i8] {
    match mood {
        Mood::Peaceful => &PEACEFUL_SCALE,
        Mood::Mysterious => &MYSTERIOUS_SCALE,
        Mood::Tense => &TENSE_SCALE,
        Mood::Epic => &EPIC_SCALE,
    }
}

pub fn bass_pattern(mood: Mood) -> &'static [i8] {
    match mood {
        Mood::Peaceful => &PEACEFUL_BASS,
        Mood::Mysterious => &MYSTERIOUS_BASS,
        Mood::Tense => &TENSE_BASS,
        Mood::Epic => &EPIC_BASS,
    }
}

/// Arpeggio pattern by name (a mood name). Unknown names use peaceful.
pub fn arpeggio_pattern(name: &str) -> &'static [i8] {
    match Mood::from_name(name) {
        Mood::Peaceful => &PEACEFUL_ARPEGGIO,
        Mood::Mysterious => &MYSTERIOUS_ARPEGGIO,
        Mood::Tense => &TENSE_ARPEGGIO,
        Mood::Epic => &EPIC_ARPEGGIO,
    }
}

/// Eight-step hit pattern. `"epic"` is straight eighths; anything else is
/// the syncopated combat figure.
pub fn percussion_pattern(name: &str) -> &'static [bool] {
    match name {
        "epic" => &EPIC_PERCUSSION,
        _ => &COMBAT_PERCUSSION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_progression_has_eight_chords() {
        for mood in Mood::ALL {
            assert_eq!(progression(mood).len(), 8, "{}", mood);
        }
    }

    #[test]
    fn chord_offset_wraps_both_indices() {
        assert_eq!(chord_offset(Mood::Peaceful, 0, 1), 4);
        assert_eq!(chord_offset(Mood::Peaceful, 8, 6), chord_offset(Mood::Peaceful, 0, 1));
        assert_eq!(chord_offset(Mood::Epic, 1, 0), -2);
    }

    #[test]
    fn tense_scale_is_octatonic() {
        assert_eq!(scale(Mood::Tense).len(), 8);
        assert_eq!(scale(Mood::Peaceful).len(), 7);
    }

    #[test]
    fn unknown_arpeggio_falls_back_to_peaceful() {
        assert_eq!(arpeggio_pattern("nonsense"), arpeggio_pattern("peaceful"));
        assert_eq!(arpeggio_pattern("epic")[1], 7);
    }

    #[test]
    fn percussion_patterns_differ() {
        assert_eq!(percussion_pattern("combat").iter().filter(|&&h| h).count(), 3);
        assert_eq!(percussion_pattern("epic").iter().filter(|&&h| h).count(), 4);
        assert_eq!(percussion_pattern("unknown"), percussion_pattern("combat"));
    }

    #[test]
    fn bass_patterns_start_on_root() {
        for mood in Mood::ALL {
            assert_eq!(bass_pattern(mood)[0], 0);
        }
    }
}

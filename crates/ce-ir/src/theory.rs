//! Equal-temperament conversions and tempo helpers.

pub const A4_MIDI: f32 = 69.0;
pub const A4_FREQUENCY: f32 = 440.0;

/// MIDI note number to frequency in Hz (12-TET, A4 = 440 Hz).
pub fn midi_to_frequency(note: f32) -> f32 {
    A4_FREQUENCY * libm::exp2f((note - A4_MIDI) / 12.0)
}

/// Frequency in Hz to the nearest MIDI note number.
pub fn frequency_to_midi(freq: f32) -> i32 {
    if freq <= 0.0 {
        return 0;
    }
    libm::roundf(12.0 * libm::log2f(freq / A4_FREQUENCY) + A4_MIDI) as i32
}

/// Shift `freq` by a (possibly fractional) number of semitones.
pub fn transpose(freq: f32, semitones: f32) -> f32 {
    freq * libm::exp2f(semitones / 12.0)
}

/// Length of one beat subdivision at `bpm`, in milliseconds.
pub fn bpm_to_ms(bpm: f64, subdivision: u32) -> f64 {
    if bpm <= 0.0 || subdivision == 0 {
        return 0.0;
    }
    60_000.0 / bpm / subdivision as f64
}

/// Snap `seconds` to the nearest beat subdivision at `bpm`.
pub fn quantize_time(seconds: f64, bpm: f64, subdivision: u32) -> f64 {
    let step = bpm_to_ms(bpm, subdivision) / 1000.0;
    if step <= 0.0 {
        return seconds;
    }
    libm::round(seconds / step) * step
}

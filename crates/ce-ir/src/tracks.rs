//! The static track catalogue.
//!
//! Each track pairs a mood with an ordered list of layer specs. Layer
//! ordinals (their index in `layers`) become part of the runtime layer id,
//! so reordering a list changes ids but not behaviour.

use crate::{LayerSpec, Mood};

/// A named musical configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackDefinition {
    /// Catalogue key, e.g. `"combat"`.
    pub key: &'static str,
    /// Display title, e.g. `"Battle Stations"`.
    pub title: &'static str,
    pub mood: Mood,
    pub layers: &'static [LayerSpec],
}

/// Track played when none is named.
pub const DEFAULT_TRACK: &str = "exploration";

static EXPLORATION: [LayerSpec; 11] = [
    LayerSpec::new("drone").frequency(55.0).detune(0.0).gain(0.12),
    LayerSpec::new("drone").frequency(82.5).detune(-5.0).gain(0.08),
    LayerSpec::new("sub").frequency(27.5).gain(0.15),
    LayerSpec::new("pad").frequencies(&[220.0, 330.0, 440.0, 550.0]).gain(0.04),
    LayerSpec::new("pad").frequencies(&[165.0, 247.5, 330.0]).gain(0.03),
    LayerSpec::new("harmonic").base_freq(110.0).harmonics(&[1.0, 2.0, 3.0, 5.0, 7.0]).gain(0.02),
    LayerSpec::new("arpeggio").base_freq(440.0).pattern("peaceful").gain(0.02),
    LayerSpec::new("bass_line").base_freq(55.0).pattern("peaceful").gain(0.08),
    LayerSpec::new("shimmer").base_freq(880.0).gain(0.025),
    LayerSpec::new("whisper").frequencies(&[1100.0, 1650.0, 2200.0]).gain(0.015),
    LayerSpec::new("breath").gain(0.02),
];

static STATION: [LayerSpec; 11] = [
    LayerSpec::new("drone").frequency(110.0).detune(0.0).gain(0.08),
    LayerSpec::new("sub").frequency(55.0).gain(0.1),
    LayerSpec::new("pad").frequencies(&[261.63, 329.63, 392.0, 523.25]).gain(0.06),
    LayerSpec::new("harmonic").base_freq(220.0).harmonics(&[1.0, 2.0, 3.0, 4.0]).gain(0.03),
    LayerSpec::new("mechanical").frequency(60.0).gain(0.04),
    LayerSpec::new("mechanical").frequency(90.0).gain(0.02),
    LayerSpec::new("hydraulic").gain(0.03),
    LayerSpec::new("chime").frequencies(&[523.25, 659.25, 783.99, 1046.5]).gain(0.02),
    LayerSpec::new("arpeggio").base_freq(261.63).pattern("peaceful").gain(0.015),
    LayerSpec::new("comm_chatter").gain(0.01),
    LayerSpec::new("air_flow").gain(0.02),
];

static DANGER: [LayerSpec; 12] = [
    LayerSpec::new("drone").frequency(55.0).detune(-10.0).gain(0.15),
    LayerSpec::new("drone").frequency(41.25).detune(5.0).gain(0.1),
    LayerSpec::new("sub").frequency(27.5).gain(0.2),
    LayerSpec::new("pulse").frequency(110.0).gain(0.08),
    LayerSpec::new("pulse").frequency(82.5).gain(0.05),
    LayerSpec::new("bass_line").base_freq(55.0).pattern("tense").gain(0.1),
    LayerSpec::new("dissonance").frequencies(&[220.0, 233.08, 246.94]).gain(0.04),
    LayerSpec::new("dissonance").frequencies(&[110.0, 116.54, 123.47]).gain(0.03),
    LayerSpec::new("cluster").base_freq(440.0).spread(50.0).gain(0.02),
    LayerSpec::new("warning").frequency(440.0).gain(0.025),
    LayerSpec::new("radar_sweep").gain(0.02),
    LayerSpec::new("tension_riser").gain(0.03),
];

static COMBAT: [LayerSpec; 14] = [
    LayerSpec::new("drone").frequency(55.0).detune(0.0).gain(0.2),
    LayerSpec::new("drone").frequency(82.5).detune(0.0).gain(0.15),
    LayerSpec::new("sub").frequency(27.5).gain(0.25),
    LayerSpec::new("sub").frequency(41.25).gain(0.15),
    LayerSpec::new("pulse").frequency(110.0).gain(0.12),
    LayerSpec::new("rhythm").frequency(220.0).gain(0.08),
    LayerSpec::new("percussion").pattern("combat").gain(0.1),
    LayerSpec::new("bass_line").base_freq(55.0).pattern("epic").gain(0.15),
    LayerSpec::new("power_chord").frequencies(&[110.0, 165.0, 220.0]).gain(0.08),
    LayerSpec::new("brass_stab").frequencies(&[220.0, 330.0, 440.0]).gain(0.05),
    LayerSpec::new("lead").frequencies(&[440.0, 550.0, 660.0]).gain(0.04),
    LayerSpec::new("arpeggio").base_freq(880.0).pattern("epic").gain(0.03),
    LayerSpec::new("explosion_rumble").gain(0.02),
    LayerSpec::new("siren").frequency(1000.0).gain(0.015),
];

static POD: [LayerSpec; 12] = [
    LayerSpec::new("drone").frequency(110.0).detune(-20.0).gain(0.08),
    LayerSpec::new("drone").frequency(73.5).detune(10.0).gain(0.06),
    LayerSpec::new("heartbeat").frequency(60.0).gain(0.12),
    LayerSpec::new("breathing").gain(0.05),
    LayerSpec::new("alarm").frequency(880.0).gain(0.02),
    LayerSpec::new("alarm").frequency(660.0).gain(0.015),
    LayerSpec::new("system_beep").frequencies(&[440.0, 880.0, 1320.0]).gain(0.02),
    LayerSpec::new("static").gain(0.025),
    LayerSpec::new("radio_static").gain(0.02),
    LayerSpec::new("metal_stress").gain(0.03),
    LayerSpec::new("bass_line").base_freq(55.0).pattern("tense").gain(0.05),
    LayerSpec::new("anxiety_pulse").gain(0.04),
];

static TRACKS: [TrackDefinition; 5] = [
    TrackDefinition {
        key: "exploration",
        title: "Deep Space Exploration",
        mood: Mood::Peaceful,
        layers: &EXPLORATION,
    },
    TrackDefinition {
        key: "station",
        title: "Station Ambience",
        mood: Mood::Peaceful,
        layers: &STATION,
    },
    TrackDefinition {
        key: "danger",
        title: "Imminent Threat",
        mood: Mood::Tense,
        layers: &DANGER,
    },
    TrackDefinition {
        key: "combat",
        title: "Battle Stations",
        mood: Mood::Epic,
        layers: &COMBAT,
    },
    TrackDefinition {
        key: "pod",
        title: "Emergency Pod",
        mood: Mood::Tense,
        layers: &POD,
    },
];

/// Every track in catalogue order.
pub fn tracks() -> &'static [TrackDefinition] {
    &TRACKS
}

/// Look up a track by key.
pub fn track(key: &str) -> Option<&'static TrackDefinition> {
    TRACKS.iter().find(|t| t.key == key)
}

/// Map a region's music theme onto a track key. Unknown themes explore.
pub fn track_for_region(theme: &str) -> &'static str {
    match theme {
        "station" | "industrial" => "station",
        "danger" | "hostile" => "danger",
        "combat" => "combat",
        _ => "exploration",
    }
}

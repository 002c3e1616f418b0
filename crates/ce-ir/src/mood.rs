//! Musical moods.

use core::fmt;

/// Selects the chord progression, scale and bass/arpeggio patterns a track uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Mood {
    #[default]
    Peaceful,
    Mysterious,
    Tense,
    Epic,
}

impl Mood {
    pub const ALL: [Mood; 4] = [Mood::Peaceful, Mood::Mysterious, Mood::Tense, Mood::Epic];

    /// Parse a mood name. Unknown names fall back to `Peaceful`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "mysterious" => Mood::Mysterious,
            "tense" => Mood::Tense,
            "epic" => Mood::Epic,
            _ => Mood::Peaceful,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Mood::Peaceful => "peaceful",
            Mood::Mysterious => "mysterious",
            Mood::Tense => "tense",
            Mood::Epic => "epic",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

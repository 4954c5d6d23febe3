//! # Musical Tuning Module
//!
//! This module maps frequencies onto the twelve-tone equal-tempered scale
//! with the reference pitch fixed at A4 = 440 Hz. It is the bridge between
//! the peak finder (which speaks Hz) and the chord matcher (which speaks
//! pitch classes).
//!
//! ## Features
//! - Pitch classes as a compact 0..11 value (C = 0) with sharp and flat spellings
//! - Nearest-note lookup with cents deviation from the retuned pitch
//! - Note name parsing ("C4", "F#3", "Bb2") for command-line input
//! - Equal temperament frequency calculations

use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;

/// Reference frequency of A4 in Hz.
pub const A4_FREQUENCY: f64 = 440.0;

/// Semitones from C0 up to A4.
const A4_SEMITONES_FROM_C0: i32 = 57;

const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];
const FLAT_NAMES: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// Name reported for the sentinel note produced from an unusable frequency.
pub const UNKNOWN_NOTE_NAME: &str = "Unknown";

/// Which of the two enharmonic names to show for a black key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize)]
pub enum Spelling {
    #[default]
    Sharp,
    Flat,
}

/// One of the twelve chromatic pitch classes, C = 0 through B = 11.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PitchClass(u8);

impl PitchClass {
    pub const C: PitchClass = PitchClass(0);
    pub const A: PitchClass = PitchClass(9);

    /// Builds a pitch class from its 0..11 index.
    pub fn new(index: u8) -> Option<Self> {
        (index < 12).then_some(Self(index))
    }

    /// Wraps any semitone count (relative to C) into a pitch class.
    pub fn from_semitone(semitone: i32) -> Self {
        Self(semitone.rem_euclid(12) as u8)
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn transpose(self, semitones: i32) -> Self {
        Self::from_semitone(self.0 as i32 + semitones)
    }

    /// Bit for this pitch class in a 12-bit pitch-class set.
    pub fn mask(self) -> u16 {
        1 << self.0
    }

    pub fn name(self, spelling: Spelling) -> &'static str {
        match spelling {
            Spelling::Sharp => SHARP_NAMES[self.0 as usize],
            Spelling::Flat => FLAT_NAMES[self.0 as usize],
        }
    }

    /// True for the white keys, which have a single spelling.
    pub fn is_natural(self) -> bool {
        SHARP_NAMES[self.0 as usize] == FLAT_NAMES[self.0 as usize]
    }

    /// Combined display name such as "C#/Db"; naturals return a single name.
    pub fn alias(self) -> String {
        if self.is_natural() {
            self.name(Spelling::Sharp).to_string()
        } else {
            format!("{}/{}", self.name(Spelling::Sharp), self.name(Spelling::Flat))
        }
    }
}

impl serde::Serialize for PitchClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.0)
    }
}

/// A musical note retuned to its exact equal-tempered frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    /// `None` only for the sentinel returned for unusable input.
    pub pitch_class: Option<PitchClass>,
    pub spelling: Spelling,
    pub octave: i32,
    /// Equal-tempered frequency of the note in Hz (not the measured one).
    pub frequency: f64,
    /// How far the measured frequency was from `frequency`, in cents.
    pub cents: f64,
}

impl Note {
    /// The sentinel note: name "Unknown", octave 0, frequency 0.
    pub fn unknown() -> Self {
        Self {
            pitch_class: None,
            spelling: Spelling::Sharp,
            octave: 0,
            frequency: 0.0,
            cents: 0.0,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.pitch_class.is_none()
    }

    /// Pitch-class name in this note's spelling, without the octave.
    pub fn name(&self) -> &'static str {
        match self.pitch_class {
            Some(pc) => pc.name(self.spelling),
            None => UNKNOWN_NOTE_NAME,
        }
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            write!(f, "{}", UNKNOWN_NOTE_NAME)
        } else {
            write!(f, "{}{}", self.name(), self.octave)
        }
    }
}

impl Serialize for Note {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Note", 5)?;
        state.serialize_field("name", self.name())?;
        state.serialize_field("pitchClass", &self.pitch_class)?;
        state.serialize_field("octave", &self.octave)?;
        state.serialize_field("frequencyHz", &self.frequency)?;
        state.serialize_field("cents", &self.cents)?;
        state.end()
    }
}

/// Finds the equal-tempered note closest to a given frequency.
///
/// The fractional distance from A4 in semitones is rounded to the nearest
/// whole semitone; the returned note carries the exact frequency of that
/// semitone and the leftover deviation in cents.
///
/// # Arguments
/// * `frequency` - Input frequency in Hz
///
/// # Returns
/// * The nearest `Note`, or the `Unknown` sentinel when `frequency` is
///   not a finite positive number
pub fn closest_note(frequency: f64) -> Note {
    if !frequency.is_finite() || frequency <= 0.0 {
        return Note::unknown();
    }

    let semitones_from_a4 = 12.0 * (frequency / A4_FREQUENCY).log2();
    let nearest = semitones_from_a4.round();
    let semitones_from_c0 = nearest as i32 + A4_SEMITONES_FROM_C0;

    Note {
        pitch_class: Some(PitchClass::from_semitone(semitones_from_c0)),
        spelling: Spelling::Sharp,
        octave: semitones_from_c0.div_euclid(12),
        frequency: A4_FREQUENCY * 2.0_f64.powf(nearest / 12.0),
        cents: (semitones_from_a4 - nearest) * 100.0,
    }
}

/// Equal-tempered frequency of a pitch class in a given octave.
pub fn note_frequency(pitch_class: PitchClass, octave: i32) -> f64 {
    let semitones_from_a4 = octave * 12 + pitch_class.index() as i32 - A4_SEMITONES_FROM_C0;
    A4_FREQUENCY * 2.0_f64.powf(semitones_from_a4 as f64 / 12.0)
}

/// Calculates the deviation from a target frequency in cents.
///
/// Positive values are sharp, negative values are flat. 100 cents make a
/// semitone and 1200 an octave.
pub fn cents_deviation(frequency: f64, target_frequency: f64) -> f64 {
    1200.0 * (frequency / target_frequency).log2()
}

/// Parses a note name such as "A4", "c#3", "Bb2" or "E-1".
///
/// Accidentals that cross an octave boundary are resolved by pitch, so
/// "Cb4" yields B3 and "B#3" yields C4.
///
/// # Returns
/// * `Some(note)` - The parsed note at its equal-tempered frequency
/// * `None` - The text is not a note name
pub fn parse_note(text: &str) -> Option<Note> {
    let mut chars = text.trim().chars().peekable();

    let letter_semitone = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let (accidental, spelling) = match chars.peek().copied() {
        Some('#') | Some('♯') => {
            chars.next();
            (1, Spelling::Sharp)
        }
        Some('b') | Some('♭') => {
            chars.next();
            (-1, Spelling::Flat)
        }
        _ => (0, Spelling::Sharp),
    };

    let octave: i32 = chars.collect::<String>().parse().ok()?;
    let semitones_from_c0 = octave * 12 + letter_semitone + accidental;
    let pitch_class = PitchClass::from_semitone(semitones_from_c0);

    Some(Note {
        pitch_class: Some(pitch_class),
        spelling,
        octave: semitones_from_c0.div_euclid(12),
        frequency: note_frequency(pitch_class, semitones_from_c0.div_euclid(12)),
        cents: 0.0,
    })
}

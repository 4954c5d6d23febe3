//! # Chord Matching Module
//!
//! Names the harmony formed by a handful of detected notes by scoring every
//! (root, quality) pair against a fixed table of chord templates.
//!
//! ## Scoring
//! - Every note weighs `1 / max(frequency, bass_floor)`, so the bass counts most
//! - A note inside the template adds `2 * weight`, a note outside it subtracts `0.5 * weight`
//! - Each essential degree (root, third, fifth) of the template that is not
//!   sounding costs a flat 2.0
//! - A template must match at least `min(2, template size)` notes to be considered
//!
//! Roots are tried in descending weight order and templates in table order.
//! A later candidate only wins with a strictly greater score, so exactly equal
//! scores resolve to the lowest root and the earliest template.

use crate::config::DetectorConfig;
use crate::tuning::{Note, PitchClass, Spelling};
use log::{debug, trace};
use once_cell::sync::Lazy;

/// A chord degree relative to the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degree {
    Root,
    Second,
    MinorThird,
    MajorThird,
    Fourth,
    FlatFifth,
    Fifth,
    SharpFifth,
    Sixth,
    MinorSeventh,
    MajorSeventh,
}

impl Degree {
    pub const fn semitones(self) -> i32 {
        match self {
            Degree::Root => 0,
            Degree::Second => 2,
            Degree::MinorThird => 3,
            Degree::MajorThird => 4,
            Degree::Fourth => 5,
            Degree::FlatFifth => 6,
            Degree::Fifth => 7,
            Degree::SharpFifth => 8,
            Degree::Sixth => 9,
            Degree::MinorSeventh => 10,
            Degree::MajorSeventh => 11,
        }
    }

    /// Formula label, e.g. "b3".
    pub const fn label(self) -> &'static str {
        match self {
            Degree::Root => "1",
            Degree::Second => "2",
            Degree::MinorThird => "b3",
            Degree::MajorThird => "3",
            Degree::Fourth => "4",
            Degree::FlatFifth => "b5",
            Degree::Fifth => "5",
            Degree::SharpFifth => "#5",
            Degree::Sixth => "6",
            Degree::MinorSeventh => "b7",
            Degree::MajorSeventh => "7",
        }
    }

    /// Root, thirds and fifths define a chord; everything else colours it.
    pub const fn is_essential(self) -> bool {
        matches!(
            self,
            Degree::Root
                | Degree::MinorThird
                | Degree::MajorThird
                | Degree::FlatFifth
                | Degree::Fifth
                | Degree::SharpFifth
        )
    }
}

/// A chord quality and the degrees it is built from.
#[derive(Debug, Clone)]
pub struct ChordTemplate {
    /// Suffix appended to the root name ("" for major, "m" for minor, ...).
    pub quality: &'static str,
    pub degrees: &'static [Degree],
    formula: String,
}

impl ChordTemplate {
    fn new(quality: &'static str, degrees: &'static [Degree]) -> Self {
        let formula = degrees
            .iter()
            .map(|d| d.label())
            .collect::<Vec<_>>()
            .join("-");
        Self {
            quality,
            degrees,
            formula,
        }
    }

    /// Degree labels joined with dashes, e.g. "1-b3-5".
    pub fn formula(&self) -> &str {
        &self.formula
    }

    /// Pitch classes of this chord built on `root`.
    pub fn pitch_classes(&self, root: PitchClass) -> impl Iterator<Item = PitchClass> + '_ {
        self.degrees.iter().map(move |d| root.transpose(d.semitones()))
    }

    fn mask(&self, root: PitchClass) -> u16 {
        self.pitch_classes(root).fold(0, |mask, pc| mask | pc.mask())
    }
}

/// The chord template table, in tie-break order.
pub static CHORD_TEMPLATES: Lazy<Vec<ChordTemplate>> = Lazy::new(|| {
    use Degree::*;
    vec![
        ChordTemplate::new("", &[Root, MajorThird, Fifth]),
        ChordTemplate::new("m", &[Root, MinorThird, Fifth]),
        ChordTemplate::new("7", &[Root, MajorThird, Fifth, MinorSeventh]),
        ChordTemplate::new("maj7", &[Root, MajorThird, Fifth, MajorSeventh]),
        ChordTemplate::new("m7", &[Root, MinorThird, Fifth, MinorSeventh]),
        ChordTemplate::new("dim", &[Root, MinorThird, FlatFifth]),
        ChordTemplate::new("aug", &[Root, MajorThird, SharpFifth]),
        ChordTemplate::new("5", &[Root, Fifth]),
        ChordTemplate::new("sus4", &[Root, Fourth, Fifth]),
        ChordTemplate::new("sus2", &[Root, Second, Fifth]),
        ChordTemplate::new("6", &[Root, MajorThird, Fifth, Sixth]),
        ChordTemplate::new("m6", &[Root, MinorThird, Fifth, Sixth]),
    ]
});

/// The outcome of chord matching.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChordMatch {
    /// Chord name such as "Am" or "F#7"; empty when nothing was matched.
    pub name: String,
    /// Degree formula such as "1-b3-5"; "1" for a lone note.
    pub formula: String,
    pub root: Option<PitchClass>,
    /// Template quality, `None` for the empty and single-note outcomes.
    pub quality: Option<&'static str>,
    pub score: f64,
}

impl ChordMatch {
    fn unison(note: &WeightedNote) -> Self {
        Self {
            name: note.pitch_class.name(note.spelling).to_string(),
            formula: "1".to_string(),
            root: Some(note.pitch_class),
            quality: None,
            score: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct WeightedNote {
    pitch_class: PitchClass,
    spelling: Spelling,
    weight: f64,
}

/// Identifies the chord formed by `notes` with the default configuration.
pub fn identify(notes: &[Note]) -> ChordMatch {
    identify_with(&DetectorConfig::default(), notes)
}

/// Identifies the chord formed by `notes`.
///
/// # Returns
/// * An empty match for no notes
/// * The note's name with formula "1" for a single note, or the bass
///   note's name when no template scores above zero. Either way the note
///   keeps its own spelling, as chord roots do.
/// * Otherwise the best scoring template
pub fn identify_with(config: &DetectorConfig, notes: &[Note]) -> ChordMatch {
    let mut weighted: Vec<WeightedNote> = notes
        .iter()
        .filter_map(|note| {
            note.pitch_class.map(|pitch_class| WeightedNote {
                pitch_class,
                spelling: note.spelling,
                weight: 1.0 / note.frequency.max(config.bass_floor_hz),
            })
        })
        .collect();

    match weighted.len() {
        0 => return ChordMatch::default(),
        1 => return ChordMatch::unison(&weighted[0]),
        _ => {}
    }

    // Stable sort: equally weighted notes keep their input order.
    weighted.sort_by(|a, b| b.weight.total_cmp(&a.weight));

    let mut roots: Vec<&WeightedNote> = Vec::with_capacity(weighted.len());
    for note in &weighted {
        if !roots.iter().any(|r| r.pitch_class == note.pitch_class) {
            roots.push(note);
        }
    }

    let mut best: Option<ChordMatch> = None;
    for root in roots {
        trace!("Trying root {} (weight {:.6})", root.pitch_class.alias(), root.weight);
        for template in CHORD_TEMPLATES.iter() {
            let Some(score) = score_template(template, root.pitch_class, &weighted) else {
                continue;
            };
            trace!(
                "{}{} scored {:.6}",
                root.pitch_class.name(root.spelling),
                template.quality,
                score
            );
            if best.as_ref().is_none_or(|b| score > b.score) {
                best = Some(ChordMatch {
                    name: format!("{}{}", root.pitch_class.name(root.spelling), template.quality),
                    formula: template.formula().to_string(),
                    root: Some(root.pitch_class),
                    quality: Some(template.quality),
                    score,
                });
            }
        }
    }

    match best {
        Some(chord) if chord.score > 0.0 => {
            debug!("Identified {} ({}) score {:.6}", chord.name, chord.formula, chord.score);
            chord
        }
        _ => {
            debug!("No template scored above zero, falling back to the bass note");
            ChordMatch::unison(&weighted[0])
        }
    }
}

/// Scores one (root, template) pair, or `None` if too few notes match.
fn score_template(template: &ChordTemplate, root: PitchClass, notes: &[WeightedNote]) -> Option<f64> {
    let chord_mask = template.mask(root);

    let mut score = 0.0;
    let mut matched = 0;
    let mut sounding: u16 = 0;
    for note in notes {
        let bit = note.pitch_class.mask();
        if chord_mask & bit != 0 {
            score += 2.0 * note.weight;
            matched += 1;
            sounding |= bit;
        } else {
            score -= 0.5 * note.weight;
        }
    }

    if matched < template.degrees.len().min(2) {
        return None;
    }

    let missing = template
        .degrees
        .iter()
        .filter(|d| d.is_essential())
        .filter(|d| sounding & root.transpose(d.semitones()).mask() == 0)
        .count();

    Some(score - 2.0 * missing as f64)
}

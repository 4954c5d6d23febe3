// chord-core/src/lib.rs

//! The core logic for the live chord detector.
//! This crate turns a magnitude spectrum snapshot into the name of the chord
//! (or single note) being played. It is completely headless and keeps no
//! state between detection calls.
//!
//! The pipeline is peak finding ([`pitch`]) → note mapping ([`tuning`]) →
//! chord matching ([`chords`]). [`fft`], [`audio`] and [`worker`] cover the
//! capture-side plumbing needed to feed it from raw samples.

pub mod audio;
pub mod chords;
pub mod config;
pub mod fft;
pub mod pitch;
pub mod tuning;
pub mod worker;

pub use chords::{ChordMatch, identify};
pub use config::DetectorConfig;
pub use pitch::{Peak, find_peaks};
pub use tuning::{Note, PitchClass, Spelling, closest_note};

use anyhow::Result;
use log::debug;
use serde::Serialize;

/// Represents the result of a single detection call.
///
/// `notes` and `frequencies_hz` always have the same length and order.
/// An empty `name` means nothing was detected, which is a normal outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChordResult {
    /// Chord name such as "C", "Am" or "G7"; a bare note name for a single note.
    pub name: String,
    /// Degree formula such as "1-3-5".
    pub formula: String,
    /// Detected notes, strongest peak first.
    pub notes: Vec<Note>,
    /// Measured frequency of each note's peak in Hz.
    pub frequencies_hz: Vec<f64>,
}

impl ChordResult {
    /// The "no chord" result.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

/// A stateless chord detector.
///
/// Holds only its configuration, so it can be cloned freely and shared
/// between threads; every call to [`ChordDetector::detect`] is independent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChordDetector {
    config: DetectorConfig,
}

impl ChordDetector {
    /// Creates a detector after validating the configuration.
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Runs one full detection pass over a spectrum snapshot.
    ///
    /// # Arguments
    /// * `spectrum` - Byte magnitude spectrum, `fft_size / 2` bins
    /// * `sample_rate` - Sample rate in Hz
    /// * `fft_size` - FFT size used to produce the spectrum
    ///
    /// # Returns
    /// * A structurally valid `ChordResult`; never fails
    pub fn detect(&self, spectrum: &[u8], sample_rate: u32, fft_size: usize) -> ChordResult {
        let peaks = pitch::find_peaks_with(&self.config, spectrum, sample_rate, fft_size);
        if peaks.is_empty() {
            return ChordResult::empty();
        }

        let (notes, frequencies_hz): (Vec<Note>, Vec<f64>) = peaks
            .iter()
            .filter_map(|peak| {
                let note = closest_note(peak.frequency);
                (!note.is_unknown()).then_some((note, peak.frequency))
            })
            .unzip();

        let chord = chords::identify_with(&self.config, &notes);
        debug!(
            "Detected '{}' from notes {:?}",
            chord.name,
            notes.iter().map(|n| n.to_string()).collect::<Vec<_>>()
        );

        ChordResult {
            name: chord.name,
            formula: chord.formula,
            notes,
            frequencies_hz,
        }
    }
}

/// Detects the chord in a spectrum snapshot using the default configuration.
pub fn detect_chord(spectrum: &[u8], sample_rate: u32, fft_size: usize) -> ChordResult {
    ChordDetector::default().detect(spectrum, sample_rate, fft_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_gives_empty_result() {
        let result = detect_chord(&vec![0u8; 1024], 44_100, 2048);
        assert_eq!(result, ChordResult::empty());
        assert!(result.is_empty());
        assert!(result.notes.is_empty() && result.frequencies_hz.is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DetectorConfig {
            max_peaks: 0,
            ..DetectorConfig::default()
        };
        assert!(ChordDetector::new(config).is_err());
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let mut spectrum = vec![0u8; 2048];
        spectrum[40] = 255;
        let result = detect_chord(&spectrum, 45_056, 4096);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["name"], "A");
        assert_eq!(json["formula"], "1");
        assert_eq!(json["notes"][0]["name"], "A");
        assert_eq!(json["notes"][0]["octave"], 4);
        assert!(json["frequenciesHz"].is_array());
    }

    #[test]
    fn test_detector_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ChordDetector>();
        assert_send_sync::<ChordResult>();
    }
}

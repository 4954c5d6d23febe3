//! # Detector Configuration
//!
//! Every empirical constant of the detection pipeline lives here so that it
//! can be tuned per instrument or room without touching the algorithms.
//! Configurations are plain JSON files; missing fields take their defaults.

use crate::pitch::DEFAULT_MAX_PEAKS;
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Widest smoothing window accepted, in bins either side.
const MAX_SMOOTHING_RADIUS: usize = 64;
/// Highest harmonic number accepted for harmonic suppression.
const MAX_HARMONIC_LIMIT: u32 = 16;

/// Tunable parameters for peak finding and chord matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Lowest frequency searched for peaks, in Hz.
    pub min_frequency_hz: f64,
    /// Highest frequency searched for peaks, in Hz.
    pub max_frequency_hz: f64,
    /// Radius (in bins) of the moving average applied before peak picking.
    pub smoothing_radius: usize,
    /// Mean band magnitude below which the spectrum is treated as silence.
    pub silence_threshold: f64,
    /// Peak threshold at the lowest searched bin.
    pub threshold_low: f64,
    /// Peak threshold at the highest searched bin.
    pub threshold_high: f64,
    /// Minimum distance between two peaks, in semitones.
    pub min_peak_separation_semitones: f64,
    /// Relative tolerance when testing a peak against a harmonic of a stronger one.
    pub harmonic_tolerance: f64,
    /// Highest harmonic number checked during harmonic suppression.
    pub max_harmonic: u32,
    /// Maximum number of peaks handed to the note mapper.
    pub max_peaks: usize,
    /// Frequencies below this weigh the same as this one when ranking bass notes.
    pub bass_floor_hz: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_frequency_hz: 80.0,
            max_frequency_hz: 1200.0,
            smoothing_radius: 3,
            silence_threshold: 1.0,
            threshold_low: 40.0,
            threshold_high: 10.0,
            min_peak_separation_semitones: 1.0,
            harmonic_tolerance: 0.03,
            max_harmonic: 4,
            max_peaks: DEFAULT_MAX_PEAKS,
            bass_floor_hz: 80.0,
        }
    }
}

impl DetectorConfig {
    /// Loads and validates a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json(&data).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parses and validates a configuration from a JSON string.
    pub fn from_json(data: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(data).context("Malformed detector config")?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.min_frequency_hz.is_finite() && self.min_frequency_hz > 0.0,
            "min_frequency_hz must be positive, got {}",
            self.min_frequency_hz
        );
        ensure!(
            self.max_frequency_hz.is_finite() && self.max_frequency_hz > self.min_frequency_hz,
            "max_frequency_hz ({}) must be above min_frequency_hz ({})",
            self.max_frequency_hz,
            self.min_frequency_hz
        );
        ensure!(
            self.smoothing_radius <= MAX_SMOOTHING_RADIUS,
            "smoothing_radius must be at most {}, got {}",
            MAX_SMOOTHING_RADIUS,
            self.smoothing_radius
        );
        ensure!(
            self.silence_threshold >= 0.0,
            "silence_threshold must not be negative"
        );
        ensure!(
            self.threshold_low > 0.0 && self.threshold_high > 0.0,
            "peak thresholds must be positive (low {}, high {})",
            self.threshold_low,
            self.threshold_high
        );
        ensure!(
            self.min_peak_separation_semitones >= 0.0,
            "min_peak_separation_semitones must not be negative"
        );
        ensure!(
            (0.0..0.5).contains(&self.harmonic_tolerance),
            "harmonic_tolerance must be in [0, 0.5), got {}",
            self.harmonic_tolerance
        );
        ensure!(
            (2..=MAX_HARMONIC_LIMIT).contains(&self.max_harmonic),
            "max_harmonic must be in 2..={}, got {}",
            MAX_HARMONIC_LIMIT,
            self.max_harmonic
        );
        ensure!(self.max_peaks > 0, "max_peaks must be at least 1");
        ensure!(
            self.bass_floor_hz.is_finite() && self.bass_floor_hz > 0.0,
            "bass_floor_hz must be positive"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(DetectorConfig::default().validate().is_ok());
        assert_eq!(DetectorConfig::default().max_peaks, DEFAULT_MAX_PEAKS);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = DetectorConfig::from_json(r#"{ "harmonic_tolerance": 0.05, "max_peaks": 4 }"#)
            .unwrap();
        assert_eq!(config.max_peaks, 4);
        assert_eq!(config.harmonic_tolerance, 0.05);
        assert_eq!(config.min_frequency_hz, 80.0);
        assert_eq!(config.smoothing_radius, 3);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(DetectorConfig::from_json(r#"{ "max_frequency_hz": 50.0 }"#).is_err());
        assert!(DetectorConfig::from_json(r#"{ "threshold_low": 0.0 }"#).is_err());
        assert!(DetectorConfig::from_json(r#"{ "max_peaks": 0 }"#).is_err());
        assert!(DetectorConfig::from_json(r#"{ "harmonic_tolerance": 0.7 }"#).is_err());
        assert!(DetectorConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_unbounded_window_and_harmonics_rejected() {
        let huge_radius = format!(r#"{{ "smoothing_radius": {} }}"#, usize::MAX);
        assert!(DetectorConfig::from_json(&huge_radius).is_err());
        assert!(DetectorConfig::from_json(r#"{ "smoothing_radius": 65 }"#).is_err());
        assert!(DetectorConfig::from_json(r#"{ "smoothing_radius": 64 }"#).is_ok());
        assert!(DetectorConfig::from_json(r#"{ "smoothing_radius": 0 }"#).is_ok());

        assert!(DetectorConfig::from_json(r#"{ "max_harmonic": 4294967295 }"#).is_err());
        assert!(DetectorConfig::from_json(r#"{ "max_harmonic": 17 }"#).is_err());
        assert!(DetectorConfig::from_json(r#"{ "max_harmonic": 1 }"#).is_err());
        assert!(DetectorConfig::from_json(r#"{ "max_harmonic": 16 }"#).is_ok());
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let err = DetectorConfig::load("/nonexistent/chord-config.json").unwrap_err();
        assert!(format!("{:#}", err).contains("chord-config.json"));
    }
}

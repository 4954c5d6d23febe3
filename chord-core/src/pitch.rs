//! # Spectrum Peak Module
//!
//! This module locates the most salient fundamentals in a byte magnitude
//! spectrum. It is the first stage of chord detection and the one that has
//! to deal with noise, leakage and overtones.
//!
//! ## Features
//! - Band limiting to the range of guitar and vocal fundamentals
//! - Triangular moving-average smoothing before peak picking
//! - Frequency-dependent amplitude threshold (stricter in the low end)
//! - Parabolic interpolation for sub-bin accuracy
//! - Semitone-aware deduplication and harmonic suppression

use crate::config::DetectorConfig;
use log::{debug, trace};

/// Default number of peaks returned by [`find_peaks`].
pub const DEFAULT_MAX_PEAKS: usize = 6;

/// A spectral peak after sub-bin refinement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Refined peak frequency in Hz.
    pub frequency: f64,
    /// Unsmoothed magnitude at the refined bin.
    pub magnitude: u8,
}

/// Finds up to `max_peaks` fundamental frequencies using the default
/// detector configuration.
///
/// # Arguments
/// * `spectrum` - Byte magnitude spectrum, one value per bin
/// * `sample_rate` - Sample rate in Hz of the analysed signal
/// * `fft_size` - FFT size that produced the spectrum
/// * `max_peaks` - Maximum number of frequencies to return
///
/// # Returns
/// * Peak frequencies in Hz, strongest first. Empty for silence or
///   degenerate input.
pub fn find_peaks(spectrum: &[u8], sample_rate: u32, fft_size: usize, max_peaks: usize) -> Vec<f64> {
    let config = DetectorConfig {
        max_peaks,
        ..DetectorConfig::default()
    };
    find_peaks_with(&config, spectrum, sample_rate, fft_size)
        .into_iter()
        .map(|peak| peak.frequency)
        .collect()
}

/// Finds spectral peaks using an explicit configuration.
///
/// The search:
/// 1. Restricts itself to the bins between `min_frequency_hz` and `max_frequency_hz`
/// 2. Bails out early if the band's mean magnitude is below the silence threshold
/// 3. Picks strict local maxima of the smoothed spectrum that clear the threshold curve
/// 4. Refines each maximum with parabolic interpolation on the raw magnitudes
/// 5. Keeps only the strongest peak within each semitone
/// 6. Drops peaks that sit on a harmonic of a stronger kept peak
///
/// # Returns
/// * At most `config.max_peaks` peaks, ordered by descending magnitude
pub fn find_peaks_with(
    config: &DetectorConfig,
    spectrum: &[u8],
    sample_rate: u32,
    fft_size: usize,
) -> Vec<Peak> {
    if spectrum.len() < 3 || sample_rate == 0 || fft_size == 0 || config.max_peaks == 0 {
        return Vec::new();
    }

    let bin_width = sample_rate as f64 / fft_size as f64;
    let Some((low_bin, high_bin)) = band_bins(config, bin_width, spectrum.len()) else {
        debug!("Analysis band lies outside the spectrum ({} bins)", spectrum.len());
        return Vec::new();
    };

    // --- Silence fast path ---
    let band = &spectrum[low_bin..=high_bin];
    let mean = band.iter().map(|&m| m as f64).sum::<f64>() / band.len() as f64;
    if mean < config.silence_threshold {
        trace!("Mean band magnitude {:.2} below silence threshold", mean);
        return Vec::new();
    }

    // --- Candidate picking on the smoothed spectrum ---
    let smoothed = smooth(spectrum, config.smoothing_radius);
    let candidates: Vec<Peak> = (low_bin..=high_bin)
        .filter(|&bin| {
            let value = smoothed[bin];
            value > smoothed[bin - 1]
                && value > smoothed[bin + 1]
                && value > amplitude_threshold(config, bin, low_bin, high_bin)
        })
        .map(|bin| refine_peak(spectrum, bin, bin_width))
        .collect();

    let distinct = deduplicate(candidates, config.min_peak_separation_semitones);
    let mut peaks = suppress_harmonics(distinct, config);
    peaks.truncate(config.max_peaks);

    debug!(
        "Found {} peaks: {:?}",
        peaks.len(),
        peaks.iter().map(|p| p.frequency).collect::<Vec<_>>()
    );
    peaks
}

/// First and last bin of the analysis band, clamped so both neighbours exist.
fn band_bins(config: &DetectorConfig, bin_width: f64, len: usize) -> Option<(usize, usize)> {
    let low = ((config.min_frequency_hz / bin_width).ceil() as usize).max(1);
    let high = ((config.max_frequency_hz / bin_width).floor() as usize).min(len - 2);
    (low <= high).then_some((low, high))
}

/// Symmetric moving average with triangular weights (1, 2, .., r+1, .., 2, 1).
///
/// Windows are truncated at the spectrum edges and renormalised.
fn smooth(spectrum: &[u8], radius: usize) -> Vec<f64> {
    let last = spectrum.len() - 1;
    (0..spectrum.len())
        .map(|i| {
            let (sum, total) = (i.saturating_sub(radius)..=i.saturating_add(radius).min(last)).fold(
                (0.0, 0.0),
                |(sum, total), j| {
                    let weight = (radius.saturating_add(1) - i.abs_diff(j)) as f64;
                    (sum + weight * spectrum[j] as f64, total + weight)
                },
            );
            sum / total
        })
        .collect()
}

/// Threshold decaying exponentially from `threshold_low` at the first band
/// bin to `threshold_high` at the last.
fn amplitude_threshold(config: &DetectorConfig, bin: usize, low_bin: usize, high_bin: usize) -> f64 {
    if high_bin == low_bin {
        return config.threshold_low;
    }
    let position = (bin - low_bin) as f64 / (high_bin - low_bin) as f64;
    config.threshold_low * (config.threshold_high / config.threshold_low).powf(position)
}

/// Refines a candidate bin by fitting a parabola through the raw magnitudes
/// of the bin and its two neighbours. The shift is clamped to half a bin.
fn refine_peak(spectrum: &[u8], bin: usize, bin_width: f64) -> Peak {
    let y1 = spectrum[bin - 1] as f64;
    let y2 = spectrum[bin] as f64;
    let y3 = spectrum[bin + 1] as f64;

    let denominator = y1 - 2.0 * y2 + y3;
    let shift = if denominator.abs() > f64::EPSILON {
        (0.5 * (y1 - y3) / denominator).clamp(-0.5, 0.5)
    } else {
        0.0
    };

    let refined_bin = bin as f64 + shift;
    Peak {
        frequency: refined_bin * bin_width,
        magnitude: spectrum[refined_bin.round() as usize],
    }
}

/// Distance between two frequencies in semitones.
fn semitone_distance(a: f64, b: f64) -> f64 {
    (12.0 * (a / b).log2()).abs()
}

/// Keeps the strongest peak of every group closer than `min_separation`
/// semitones. The result is ordered by descending magnitude.
fn deduplicate(mut candidates: Vec<Peak>, min_separation: f64) -> Vec<Peak> {
    candidates.sort_by(|a, b| b.magnitude.cmp(&a.magnitude));

    let mut accepted: Vec<Peak> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let crowded = accepted
            .iter()
            .any(|kept| semitone_distance(candidate.frequency, kept.frequency) < min_separation);
        if crowded {
            trace!("Dropping {:.1} Hz: within a semitone of a stronger peak", candidate.frequency);
        } else {
            accepted.push(candidate);
        }
    }
    accepted
}

/// True if `frequency` lies within the tolerance of the 2nd..=max_harmonic
/// multiple of `fundamental`.
///
/// Harmonics at or above twice `frequency` cannot match, so the walk stops there.
fn is_harmonic_of(frequency: f64, fundamental: f64, config: &DetectorConfig) -> bool {
    (2..=config.max_harmonic)
        .map(|n| fundamental * n as f64)
        .take_while(|&harmonic| harmonic < 2.0 * frequency)
        .any(|harmonic| (frequency / harmonic - 1.0).abs() < config.harmonic_tolerance)
}

/// Walks peaks strongest first and drops those that are overtones of a peak
/// already kept.
fn suppress_harmonics(peaks: Vec<Peak>, config: &DetectorConfig) -> Vec<Peak> {
    let mut kept: Vec<Peak> = Vec::with_capacity(peaks.len());
    for peak in peaks {
        if let Some(root) = kept
            .iter()
            .find(|root| is_harmonic_of(peak.frequency, root.frequency, config))
        {
            trace!(
                "Dropping {:.1} Hz as a harmonic of {:.1} Hz",
                peak.frequency, root.frequency
            );
            continue;
        }
        kept.push(peak);
    }
    kept
}

//! # Fast Fourier Transform (FFT) Module
//!
//! This module turns time-domain frames into the byte magnitude spectrum the
//! chord detector consumes. It follows the conventions of a browser-style
//! analyser node so that spectra captured elsewhere and spectra produced
//! here look alike.
//!
//! ## Features
//! - High-performance FFT using RustFFT, planned once per analyser
//! - DC offset removal and Blackman windowing
//! - Exponential smoothing across frames
//! - Decibel scaling from [-100 dB, -30 dB] onto 0..=255

use anyhow::{Result, ensure};
use rustfft::{Fft, FftPlanner, num_complex::Complex};
use std::sync::Arc;

/// Decibel level mapped to byte value 0.
pub const MIN_DECIBELS: f32 = -100.0;
/// Decibel level mapped to byte value 255.
pub const MAX_DECIBELS: f32 = -30.0;
/// Default weight of the previous frame when smoothing magnitudes.
pub const DEFAULT_SMOOTHING: f32 = 0.8;

/// Removes the DC offset from a signal by making its average value zero.
fn remove_dc_offset(signal: &mut [f32]) {
    let len = signal.len();
    if len == 0 {
        return;
    }
    let avg = signal.iter().sum::<f32>() / len as f32;
    if avg.abs() > 1e-6 {
        for sample in signal.iter_mut() {
            *sample -= avg;
        }
    }
}

/// Blackman window coefficients (a0 = 0.42, a1 = 0.5, a2 = 0.08).
fn blackman_window(size: usize) -> Vec<f32> {
    let n = size as f32;
    (0..size)
        .map(|i| {
            let x = 2.0 * std::f32::consts::PI * i as f32 / n;
            0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
        })
        .collect()
}

/// Converts time-domain frames into smoothed byte magnitude spectra.
///
/// The analyser is the only stateful piece of the pipeline: it remembers the
/// previous frame's magnitudes for smoothing. Use one analyser per input
/// stream.
pub struct SpectrumAnalyser {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    window: Vec<f32>,
    smoothing: f32,
    previous: Vec<f32>,
}

impl SpectrumAnalyser {
    /// Creates an analyser for frames of `fft_size` samples.
    ///
    /// # Returns
    /// * `Err` if `fft_size` is not an even number of at least 32
    pub fn new(fft_size: usize) -> Result<Self> {
        ensure!(
            fft_size >= 32 && fft_size % 2 == 0,
            "FFT size must be an even number >= 32, got {}",
            fft_size
        );

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        Ok(Self {
            fft,
            fft_size,
            window: blackman_window(fft_size),
            smoothing: DEFAULT_SMOOTHING,
            previous: vec![0.0; fft_size / 2],
        })
    }

    /// Sets the smoothing time constant, clamped to [0, 1]. Zero disables smoothing.
    /// NaN falls back to [`DEFAULT_SMOOTHING`].
    pub fn with_smoothing(mut self, smoothing: f32) -> Self {
        self.smoothing = if smoothing.is_nan() {
            DEFAULT_SMOOTHING
        } else {
            smoothing.clamp(0.0, 1.0)
        };
        self
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of bins in each produced spectrum.
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Forgets the smoothing history.
    pub fn reset(&mut self) {
        self.previous.iter_mut().for_each(|m| *m = 0.0);
    }

    /// Analyses one frame and returns its byte magnitude spectrum.
    ///
    /// Frames shorter than the FFT size are zero-padded; longer frames are
    /// truncated.
    ///
    /// # Returns
    /// * `Vec<u8>` - `fft_size / 2` magnitudes on the decibel byte scale
    pub fn process(&mut self, frame: &[f32]) -> Vec<u8> {
        let mut signal = vec![0.0; self.fft_size];
        let len = frame.len().min(self.fft_size);
        signal[..len].copy_from_slice(&frame[..len]);
        remove_dc_offset(&mut signal[..len]);

        let mut buffer: Vec<Complex<f32>> = signal
            .iter()
            .zip(&self.window)
            .map(|(sample, w)| Complex {
                re: sample * w,
                im: 0.0,
            })
            .collect();
        self.fft.process(&mut buffer);

        let scale = 1.0 / self.fft_size as f32;
        let smoothing = self.smoothing;
        let range = MAX_DECIBELS - MIN_DECIBELS;
        buffer
            .iter()
            .take(self.bin_count())
            .zip(self.previous.iter_mut())
            .map(|(c, previous)| {
                let magnitude = c.norm() * scale;
                *previous = smoothing * *previous + (1.0 - smoothing) * magnitude;
                if *previous <= 0.0 {
                    return 0;
                }
                let decibels = 20.0 * previous.log10();
                (255.0 * (decibels - MIN_DECIBELS) / range).clamp(0.0, 255.0) as u8
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::synthesize_tones;

    #[test]
    fn test_rejects_bad_sizes() {
        assert!(SpectrumAnalyser::new(0).is_err());
        assert!(SpectrumAnalyser::new(1001).is_err());
        assert!(SpectrumAnalyser::new(2048).is_ok());
    }

    #[test]
    fn test_silence_is_all_zero() {
        let mut analyser = SpectrumAnalyser::new(2048).unwrap();
        let spectrum = analyser.process(&vec![0.0; 2048]);
        assert_eq!(spectrum.len(), 1024);
        assert!(spectrum.iter().all(|&m| m == 0));
    }

    #[test]
    fn test_sine_peaks_at_its_bin() {
        let sample_rate = 44_100;
        let fft_size = 4096;
        let mut analyser = SpectrumAnalyser::new(fft_size).unwrap().with_smoothing(0.0);
        let frame = synthesize_tones(&[440.0], 0.05, sample_rate, fft_size);
        let spectrum = analyser.process(&frame);

        let (peak_bin, &peak) = spectrum
            .iter()
            .enumerate()
            .max_by_key(|(_, m)| **m)
            .unwrap();
        let expected_bin = (440.0 * fft_size as f64 / sample_rate as f64).round() as usize;
        assert!(peak_bin.abs_diff(expected_bin) <= 1, "peak at bin {}", peak_bin);
        assert!(peak > 180, "peak magnitude {}", peak);
    }

    #[test]
    fn test_nan_smoothing_uses_default() {
        let fft_size = 2048;
        let mut analyser = SpectrumAnalyser::new(fft_size).unwrap().with_smoothing(f32::NAN);
        assert_eq!(analyser.smoothing, DEFAULT_SMOOTHING);

        let frame = synthesize_tones(&[440.0], 0.05, 44_100, fft_size);
        analyser.process(&frame);
        let spectrum = analyser.process(&frame);
        assert!(spectrum.iter().any(|&m| m > 0));

        let clamped = SpectrumAnalyser::new(fft_size).unwrap().with_smoothing(3.0);
        assert_eq!(clamped.smoothing, 1.0);
    }

    #[test]
    fn test_smoothing_carries_previous_frame() {
        let fft_size = 2048;
        let frame = synthesize_tones(&[440.0], 0.05, 44_100, fft_size);
        let silence = vec![0.0; fft_size];

        let mut smoothed = SpectrumAnalyser::new(fft_size).unwrap();
        smoothed.process(&frame);
        let echo = smoothed.process(&silence);
        assert!(echo.iter().any(|&m| m > 0));

        smoothed.reset();
        assert!(smoothed.process(&silence).iter().all(|&m| m == 0));

        let mut raw = SpectrumAnalyser::new(fft_size).unwrap().with_smoothing(0.0);
        raw.process(&frame);
        assert!(raw.process(&silence).iter().all(|&m| m == 0));
    }
}

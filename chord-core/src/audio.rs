//! # Audio Frame Module
//!
//! Helpers on the capture side of the detector: cutting an incoming sample
//! stream into fixed-size analysis frames, deciding whether a frame carries
//! any signal at all, and synthesizing test tones.

/// RMS level below which a frame is treated as inactive.
pub const ACTIVITY_THRESHOLD: f32 = 0.01;

/// Accumulates arbitrarily sized sample chunks into fixed-size frames.
#[derive(Debug, Clone)]
pub struct FrameAccumulator {
    frame_size: usize,
    hop_size: usize,
    buffer: Vec<f32>,
}

impl FrameAccumulator {
    /// Creates an accumulator emitting back-to-back frames of `frame_size` samples.
    pub fn new(frame_size: usize) -> Self {
        Self::with_hop(frame_size, frame_size)
    }

    /// Creates an accumulator emitting frames of `frame_size` samples every
    /// `hop_size` samples. The hop is clamped to `1..=frame_size`.
    pub fn with_hop(frame_size: usize, hop_size: usize) -> Self {
        let frame_size = frame_size.max(1);
        Self {
            frame_size,
            hop_size: hop_size.clamp(1, frame_size),
            buffer: Vec::with_capacity(frame_size * 2),
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Samples waiting for the next frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Appends samples and returns every frame that became complete.
    pub fn push(&mut self, samples: &[f32]) -> Vec<Vec<f32>> {
        self.buffer.extend_from_slice(samples);

        let mut frames = Vec::new();
        // While we have enough data for a full frame, cut it.
        while self.buffer.len() >= self.frame_size {
            frames.push(self.buffer[..self.frame_size].to_vec());
            self.buffer.drain(..self.hop_size);
        }
        frames
    }
}

/// Root-mean-square level of a frame; 0 for an empty frame.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|&s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

/// True if the frame's RMS level exceeds `threshold`.
pub fn is_audio_active(samples: &[f32], threshold: f32) -> bool {
    rms(samples) > threshold
}

/// Sum of equal-amplitude sines, `len` samples long.
pub fn synthesize_tones(frequencies: &[f64], amplitude: f32, sample_rate: u32, len: usize) -> Vec<f32> {
    let sample_rate = sample_rate.max(1) as f64;
    (0..len)
        .map(|i| {
            let t = i as f64 / sample_rate;
            frequencies
                .iter()
                .map(|&f| (2.0 * std::f64::consts::PI * f * t).sin())
                .sum::<f64>() as f32
                * amplitude
        })
        .collect()
}

// chord-core/tests/pipeline_test.rs

use chord_core::{
    ChordDetector, ChordResult, DetectorConfig, PitchClass, Spelling, audio::synthesize_tones,
    closest_note, detect_chord, find_peaks, fft::SpectrumAnalyser, identify, tuning,
};

const SAMPLE_RATE: u32 = 44_100;
const FFT_SIZE: usize = 8192;

/// Renders the given tones through the analyser with smoothing disabled.
fn spectrum_of(frequencies: &[f64], amplitude: f32) -> Vec<u8> {
    let mut analyser = SpectrumAnalyser::new(FFT_SIZE).unwrap().with_smoothing(0.0);
    analyser.process(&synthesize_tones(frequencies, amplitude, SAMPLE_RATE, FFT_SIZE))
}

fn frequencies(names: &[&str]) -> Vec<f64> {
    names
        .iter()
        .map(|n| tuning::parse_note(n).unwrap().frequency)
        .collect()
}

#[test]
fn silent_spectrum_yields_empty_result() {
    let spectrum = vec![0u8; FFT_SIZE / 2];
    assert!(find_peaks(&spectrum, SAMPLE_RATE, FFT_SIZE, 6).is_empty());

    let result = detect_chord(&spectrum, SAMPLE_RATE, FFT_SIZE);
    assert_eq!(result.name, "");
    assert_eq!(result.formula, "");
    assert!(result.notes.is_empty());
    assert!(result.frequencies_hz.is_empty());
}

#[test]
fn twelve_pitch_classes_round_trip_at_octave_four() {
    for index in 0..12 {
        let pitch_class = PitchClass::new(index).unwrap();
        let reference = tuning::note_frequency(pitch_class, 4);
        let note = closest_note(reference);
        assert_eq!(note.name(), pitch_class.name(Spelling::Sharp));
        assert_eq!(note.octave, 4);
        assert!((note.frequency - reference).abs() < 0.01);
    }
}

#[test]
fn isolated_spike_at_440_is_a4() {
    // 11 Hz bins put 440 Hz exactly on bin 40.
    let mut spectrum = vec![0u8; 2048];
    spectrum[40] = 255;

    let peaks = find_peaks(&spectrum, 45_056, 4096, 6);
    assert_eq!(peaks.len(), 1);
    assert!((peaks[0] - 440.0).abs() < 2.0);

    let note = closest_note(peaks[0]);
    assert_eq!(note.name(), "A");
    assert_eq!(note.octave, 4);
}

#[test]
fn second_harmonic_is_not_a_separate_note() {
    let spectrum = {
        let mut analyser = SpectrumAnalyser::new(FFT_SIZE).unwrap().with_smoothing(0.0);
        let fundamental = synthesize_tones(&[220.0], 0.05, SAMPLE_RATE, FFT_SIZE);
        let overtone = synthesize_tones(&[440.0], 0.025, SAMPLE_RATE, FFT_SIZE);
        let mixed: Vec<f32> = fundamental.iter().zip(&overtone).map(|(a, b)| a + b).collect();
        analyser.process(&mixed)
    };

    let peaks = find_peaks(&spectrum, SAMPLE_RATE, FFT_SIZE, 6);
    assert_eq!(peaks.len(), 1, "peaks: {:?}", peaks);
    assert!((peaks[0] - 220.0).abs() < 3.0);

    let result = detect_chord(&spectrum, SAMPLE_RATE, FFT_SIZE);
    assert_eq!(result.name, "A");
    assert_eq!(result.formula, "1");
}

#[test]
fn c_major_triad_from_notes() {
    let notes: Vec<_> = [261.63, 329.63, 392.0].into_iter().map(closest_note).collect();
    let chord = identify(&notes);
    assert_eq!(chord.name, "C");
    assert_eq!(chord.formula, "1-3-5");
}

#[test]
fn a_minor_is_not_a_major() {
    let notes: Vec<_> = [440.0, 523.25, 659.25].into_iter().map(closest_note).collect();
    let chord = identify(&notes);
    assert_eq!(chord.name, "Am");
    assert_eq!(chord.formula, "1-b3-5");
}

#[test]
fn synthesized_c_major_triad_end_to_end() {
    let spectrum = spectrum_of(&frequencies(&["C4", "E4", "G4"]), 0.05);
    let result = detect_chord(&spectrum, SAMPLE_RATE, FFT_SIZE);

    assert_eq!(result.name, "C", "result: {:?}", result);
    assert_eq!(result.formula, "1-3-5");
    assert_eq!(result.notes.len(), 3);
    assert_eq!(result.notes.len(), result.frequencies_hz.len());

    let mut names: Vec<String> = result.notes.iter().map(|n| n.to_string()).collect();
    names.sort();
    assert_eq!(names, vec!["C4", "E4", "G4"]);
}

#[test]
fn synthesized_a_minor_triad_end_to_end() {
    let spectrum = spectrum_of(&frequencies(&["A4", "C5", "E5"]), 0.05);
    let result = detect_chord(&spectrum, SAMPLE_RATE, FFT_SIZE);
    assert_eq!(result.name, "Am", "result: {:?}", result);
    assert_eq!(result.formula, "1-b3-5");
}

#[test]
fn peaks_stay_a_semitone_apart() {
    let spectrum = spectrum_of(&frequencies(&["E3", "G3", "B3", "E4", "G4"]), 0.04);
    let peaks = find_peaks(&spectrum, SAMPLE_RATE, FFT_SIZE, 6);
    assert!(!peaks.is_empty());
    for (i, a) in peaks.iter().enumerate() {
        for b in &peaks[i + 1..] {
            assert!((12.0 * (a / b).log2()).abs() >= 1.0, "{} Hz and {} Hz", a, b);
        }
    }
}

#[test]
fn detection_is_idempotent() {
    let spectrum = spectrum_of(&frequencies(&["G3", "B3", "D4", "F4"]), 0.05);
    let detector = ChordDetector::default();
    let first = detector.detect(&spectrum, SAMPLE_RATE, FFT_SIZE);
    let second = detector.detect(&spectrum, SAMPLE_RATE, FFT_SIZE);
    assert_eq!(first, second);
    assert!(!first.is_empty());
}

#[test]
fn custom_config_limits_peaks() {
    let config = DetectorConfig {
        max_peaks: 1,
        ..DetectorConfig::default()
    };
    let detector = ChordDetector::new(config).unwrap();
    let spectrum = spectrum_of(&frequencies(&["C4", "E4", "G4"]), 0.05);
    let result = detector.detect(&spectrum, SAMPLE_RATE, FFT_SIZE);
    assert_eq!(result.notes.len(), 1);
    assert_eq!(result.formula, "1");
}

#[test]
fn degenerate_input_never_panics() {
    let detector = ChordDetector::default();
    assert_eq!(detector.detect(&[], SAMPLE_RATE, FFT_SIZE), ChordResult::empty());
    assert_eq!(detector.detect(&[255; 16], 0, FFT_SIZE), ChordResult::empty());
    assert_eq!(detector.detect(&[255; 16], SAMPLE_RATE, 0), ChordResult::empty());
    // Band far beyond a tiny spectrum.
    assert_eq!(detector.detect(&[255; 4], SAMPLE_RATE, 8), ChordResult::empty());
}

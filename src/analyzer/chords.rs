//! Diatonic chord progression from a pitch sequence.
//!
//! The sequence is cut into a handful of contiguous segments. Each segment's
//! pitch-class histogram is scored against the seven diatonic triads of the
//! detected key and the best-scoring triad becomes that segment's chord.

use serde::Serialize;

use super::key::{KeyEstimate, PitchClassHistogram};
use super::pitch::{PitchSample, PitchSequence};
use crate::theory::PitchClass;

/// Root, third, fifth.
const TRIAD_WEIGHTS: [f64; 3] = [1.0, 0.8, 0.6];

const MIN_SEGMENTS: usize = 4;
const MAX_SEGMENTS: usize = 8;
const SAMPLES_PER_SEGMENT: usize = 50;

/// Default degrees when there is nothing to analyze: I–V–vi–IV.
const FALLBACK_DEGREES: [usize; 4] = [0, 4, 5, 3];

const CATALOGUE: &[(&[&str], &str)] = &[
    (&["I", "V", "vi", "IV"], "Pop Progression"),
    (&["vi", "IV", "I", "V"], "Pop Progression"),
    (&["ii", "V", "I"], "Jazz ii-V-I"),
    (&["I", "vi", "IV", "V"], "Circle Progression"),
    (&["i", "VII", "VI", "v"], "Andalusian Cadence"),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chord {
    pub symbol: String,
    /// Scale degree, 1-based.
    pub degree: u8,
    pub numeral: String,
    pub start: Option<f64>,
    pub end: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChordProgression {
    pub chords: Vec<Chord>,
    pub progression_type: String,
    pub harmonic_movement: Vec<String>,
}

impl ChordProgression {
    pub fn numerals(&self) -> Vec<&str> {
        self.chords.iter().map(|c| c.numeral.as_str()).collect()
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.chords.iter().map(|c| c.symbol.as_str()).collect()
    }
}

pub fn analyze_chords(pitches: &PitchSequence, key: &KeyEstimate) -> ChordProgression {
    let chords: Vec<Chord> = if pitches.is_empty() {
        FALLBACK_DEGREES
            .iter()
            .map(|&d| chord_for_degree(key, d, None, None))
            .collect()
    } else {
        let samples = pitches.samples();
        let step = match samples {
            [a, b, ..] => b.time - a.time,
            _ => 0.0,
        };
        let segments = segment_bounds(samples.len());
        segments
            .iter()
            .enumerate()
            .map(|(i, &(lo, hi))| {
                let segment = &samples[lo..hi];
                let start = segment[0].time;
                let end = match segments.get(i + 1) {
                    Some(&(next, _)) => samples[next].time,
                    None => segment[segment.len() - 1].time + step,
                };
                chord_for_degree(key, best_degree(segment, key), Some(start), Some(end))
            })
            .collect()
    };

    let numerals: Vec<&str> = chords.iter().map(|c| c.numeral.as_str()).collect();
    let progression_type = classify_progression(&numerals).to_string();
    let harmonic_movement = harmonic_movement(&numerals);
    log::debug!("Chords: {} ({})", numerals.join("-"), progression_type);

    ChordProgression {
        chords,
        progression_type,
        harmonic_movement,
    }
}

/// `[lo, hi)` index ranges of `clamp(len / 50, 4, 8)` near-equal segments,
/// never more segments than samples.
pub fn segment_bounds(len: usize) -> Vec<(usize, usize)> {
    if len == 0 {
        return Vec::new();
    }
    let count = (len / SAMPLES_PER_SEGMENT)
        .clamp(MIN_SEGMENTS, MAX_SEGMENTS)
        .min(len);
    (0..count)
        .map(|i| (i * len / count, (i + 1) * len / count))
        .collect()
}

/// Highest-scoring diatonic degree for a segment; ties go to the lower degree
/// and an unvoiced segment maps to the tonic.
fn best_degree(segment: &[PitchSample], key: &KeyEstimate) -> usize {
    let mut counts = [0.0f64; 12];
    for f in segment.iter().filter_map(|s| s.frequency) {
        if let Some(pc) = PitchClass::from_frequency(f) {
            counts[pc.index()] += 1.0;
        }
    }
    let chroma = PitchClassHistogram::normalized(counts);
    if chroma.is_empty() {
        return 0;
    }
    let mut best = (0, f64::NEG_INFINITY);
    for degree in 0..7 {
        let triad = key.scale.triad(key.key, degree);
        let score: f64 = triad
            .iter()
            .zip(TRIAD_WEIGHTS)
            .map(|(pc, w)| chroma.bins()[pc.index()] * w)
            .sum();
        if score > best.1 {
            best = (degree, score);
        }
    }
    best.0
}

fn chord_for_degree(key: &KeyEstimate, degree: usize, start: Option<f64>, end: Option<f64>) -> Chord {
    Chord {
        symbol: key.scale.chord_symbol(key.key, degree),
        degree: degree as u8 + 1,
        numeral: key.scale.numeral(degree).to_string(),
        start,
        end,
    }
}

/// First catalogue entry found as a contiguous run of numerals.
pub fn classify_progression(numerals: &[&str]) -> &'static str {
    CATALOGUE
        .iter()
        .find(|(pattern, _)| numerals.windows(pattern.len()).any(|w| w == *pattern))
        .map(|(_, name)| *name)
        .unwrap_or("Custom Progression")
}

pub fn harmonic_movement(numerals: &[&str]) -> Vec<String> {
    numerals
        .windows(2)
        .map(|pair| {
            match (pair[0], pair[1]) {
                ("V", "I") | ("IV", "I") | ("v", "i") | ("iv", "i") => "Strong Resolution",
                ("vi", "IV") | ("iii", "vi") => "Weak Resolution",
                _ => "Step Progression",
            }
            .to_string()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theory::Scale;

    fn c_major() -> KeyEstimate {
        KeyEstimate {
            key: PitchClass::C,
            scale: Scale::Major,
            mode: Scale::Major.mode(),
            confidence: 0.9,
            alternatives: vec![],
        }
    }

    #[test]
    fn test_segment_counts() {
        assert_eq!(segment_bounds(0).len(), 0);
        assert_eq!(segment_bounds(3).len(), 3);
        assert_eq!(segment_bounds(10).len(), 4);
        assert_eq!(segment_bounds(300).len(), 6);
        assert_eq!(segment_bounds(5000).len(), 8);
        let bounds = segment_bounds(10);
        assert_eq!(bounds.first().unwrap().0, 0);
        assert_eq!(bounds.last().unwrap().1, 10);
    }

    #[test]
    fn test_empty_sequence_gives_default_progression() {
        let prog = analyze_chords(&PitchSequence::default(), &c_major());
        assert_eq!(prog.numerals(), vec!["I", "V", "vi", "IV"]);
        assert_eq!(prog.symbols(), vec!["C", "G", "Am", "F"]);
        assert_eq!(prog.progression_type, "Pop Progression");
        assert!(prog.chords.iter().all(|c| c.start.is_none()));
    }

    #[test]
    fn test_segments_follow_triads() {
        // C, G, A, F triad tones in four equal blocks
        let mut freqs = Vec::new();
        for chord in [
            [261.63, 329.63, 392.0],
            [392.0, 493.88, 293.66],
            [440.0, 261.63, 329.63],
            [349.23, 440.0, 261.63],
        ] {
            for _ in 0..5 {
                freqs.extend_from_slice(&chord);
            }
        }
        let seq = PitchSequence::from_frequencies(&freqs, 0.5);
        let prog = analyze_chords(&seq, &c_major());
        assert_eq!(prog.numerals(), vec!["I", "V", "vi", "IV"]);
        assert_eq!(prog.progression_type, "Pop Progression");
        assert_eq!(prog.chords[1].start, Some(7.5));
        assert_eq!(prog.chords[0].end, Some(7.5));
        assert_eq!(prog.chords[3].end, Some(30.0));
    }

    #[test]
    fn test_unvoiced_segment_is_tonic() {
        let seq = PitchSequence::from_frequencies(&[0.0; 8], 0.1);
        let prog = analyze_chords(&seq, &c_major());
        assert!(prog.chords.iter().all(|c| c.numeral == "I"));
    }

    #[test]
    fn test_deterministic_in_content() {
        let seq = PitchSequence::from_frequencies(&[329.63, 392.0, 493.88, 246.94], 0.1);
        let a = analyze_chords(&seq, &c_major());
        let b = analyze_chords(&seq, &c_major());
        assert_eq!(a, b);
    }

    #[test]
    fn test_catalogue_is_token_exact() {
        assert_eq!(classify_progression(&["ii", "V", "I"]), "Jazz ii-V-I");
        assert_eq!(classify_progression(&["IV", "I", "vi", "IV", "V"]), "Circle Progression");
        assert_eq!(classify_progression(&["i", "VII", "VI", "v"]), "Andalusian Cadence");
        // "vii°-V-I" must not be read as "ii-V-I"
        assert_eq!(classify_progression(&["vii°", "V", "I"]), "Custom Progression");
    }

    #[test]
    fn test_harmonic_movement_labels() {
        let labels = harmonic_movement(&["V", "I", "vi", "IV", "ii"]);
        assert_eq!(
            labels,
            vec![
                "Strong Resolution",
                "Step Progression",
                "Weak Resolution",
                "Step Progression"
            ]
        );
        assert!(harmonic_movement(&["I"]).is_empty());
    }
}

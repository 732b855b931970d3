//! Mood, genre and energy descriptors derived from key, tempo and pitch spread.

use serde::Serialize;

use super::key::KeyEstimate;
use super::pitch::PitchSequence;
use super::tempo::{Loudness, TempoEstimate};
use crate::theory::Scale;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodProfile {
    pub mood: String,
    pub genre: String,
    pub energy: f64,
    pub valence: f64,
    pub danceability: f64,
    pub dynamic_range: String,
}

pub fn score_mood(key: &KeyEstimate, tempo: &TempoEstimate, pitches: &PitchSequence) -> MoodProfile {
    let bpm = tempo.bpm;
    let mood = mood(key.scale, bpm);
    MoodProfile {
        genre: genre(mood, bpm).to_string(),
        energy: energy(bpm, pitches.frequency_variance()),
        valence: valence(key.scale, mood),
        danceability: danceability(bpm, &tempo.rhythmic_pattern),
        dynamic_range: dynamic_range(&tempo.loudness).to_string(),
        mood: mood.to_string(),
    }
}

fn mood(scale: Scale, bpm: f64) -> &'static str {
    let (slow, fast) = (bpm < 90.0, bpm > 140.0);
    match scale {
        Scale::Minor if slow => "Melancholic",
        Scale::Minor if fast => "Dramatic",
        Scale::Major if fast => "Energetic",
        Scale::Major if slow => "Peaceful",
        _ => "Balanced",
    }
}

fn genre(mood: &str, bpm: f64) -> &'static str {
    if bpm > 120.0 && bpm < 140.0 {
        "Pop"
    } else if bpm > 140.0 {
        "Electronic/Dance"
    } else if bpm < 80.0 {
        "Ballad"
    } else if mood == "Dramatic" {
        "Rock"
    } else {
        "Contemporary"
    }
}

/// Tempo relative to 120 BPM (capped at 2) averaged with pitch variance in
/// kHz² (capped at 1), capped at 1.
fn energy(bpm: f64, pitch_variance: f64) -> f64 {
    let tempo_factor = (bpm / 120.0).min(2.0);
    let pitch_factor = (pitch_variance / 1000.0).min(1.0);
    ((tempo_factor + pitch_factor) / 2.0).min(1.0)
}

fn valence(scale: Scale, mood: &str) -> f64 {
    let base = match scale {
        Scale::Major => 0.7_f64,
        Scale::Minor => 0.3,
    };
    let shift = match mood {
        "Energetic" => 0.2,
        "Peaceful" => 0.1,
        "Melancholic" => -0.3,
        "Dramatic" => -0.1,
        _ => 0.0,
    };
    (base + shift).clamp(0.0, 1.0)
}

fn danceability(bpm: f64, rhythmic_pattern: &str) -> f64 {
    let tempo_score = if (120.0..=140.0).contains(&bpm) {
        1.0
    } else if (100.0..=160.0).contains(&bpm) {
        0.7
    } else if (80.0..=180.0).contains(&bpm) {
        0.4
    } else {
        0.2
    };
    let rhythm_score = if rhythmic_pattern == "Steady" { 0.8 } else { 0.5 };
    (tempo_score + rhythm_score) / 2.0
}

/// Crest factor of frame loudness in dB.
fn dynamic_range(loudness: &Loudness) -> &'static str {
    if loudness.mean_rms <= 0.0 || loudness.peak_rms <= 0.0 {
        return "Moderate";
    }
    let crest_db = 20.0 * (loudness.peak_rms as f64 / loudness.mean_rms as f64).log10();
    if crest_db < 6.0 {
        "Compressed"
    } else if crest_db < 12.0 {
        "Moderate"
    } else {
        "Wide"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theory::PitchClass;

    fn key(scale: Scale) -> KeyEstimate {
        KeyEstimate {
            key: PitchClass::C,
            scale,
            mode: scale.mode(),
            confidence: 1.0,
            alternatives: vec![],
        }
    }

    fn tempo(bpm: f64, pattern: &str, loudness: Loudness) -> TempoEstimate {
        TempoEstimate {
            bpm,
            confidence: 1.0,
            time_signature: "4/4".into(),
            tempo_samples: vec![],
            has_tempo_changes: false,
            rhythmic_pattern: pattern.into(),
            beat_count: 0,
            beat_times: vec![],
            loudness,
        }
    }

    #[test]
    fn test_mood_quadrants() {
        assert_eq!(mood(Scale::Minor, 70.0), "Melancholic");
        assert_eq!(mood(Scale::Minor, 150.0), "Dramatic");
        assert_eq!(mood(Scale::Major, 150.0), "Energetic");
        assert_eq!(mood(Scale::Major, 70.0), "Peaceful");
        assert_eq!(mood(Scale::Major, 120.0), "Balanced");
        assert_eq!(mood(Scale::Minor, 140.0), "Balanced");
    }

    #[test]
    fn test_genre_rules() {
        assert_eq!(genre("Balanced", 130.0), "Pop");
        assert_eq!(genre("Energetic", 150.0), "Electronic/Dance");
        assert_eq!(genre("Peaceful", 70.0), "Ballad");
        assert_eq!(genre("Balanced", 120.0), "Contemporary");
        assert_eq!(genre("Dramatic", 140.0), "Rock");
    }

    #[test]
    fn test_energy_formula() {
        assert!((energy(120.0, 0.0) - 0.5).abs() < 1e-12);
        assert!((energy(60.0, 500.0) - 0.5).abs() < 1e-12);
        assert_eq!(energy(180.0, 5000.0), 1.0);
    }

    #[test]
    fn test_valence_is_clamped() {
        assert!((valence(Scale::Major, "Energetic") - 0.9).abs() < 1e-12);
        assert_eq!(valence(Scale::Minor, "Melancholic"), 0.0);
        assert!((valence(Scale::Minor, "Dramatic") - 0.2).abs() < 1e-12);
        assert!((valence(Scale::Major, "Balanced") - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_danceability_bands() {
        assert!((danceability(128.0, "Steady") - 0.9).abs() < 1e-12);
        assert!((danceability(150.0, "Swing") - 0.6).abs() < 1e-12);
        assert!((danceability(60.0, "Complex") - 0.35).abs() < 1e-12);
    }

    #[test]
    fn test_dynamic_range_from_crest() {
        let l = |mean, peak| Loudness {
            mean_rms: mean,
            peak_rms: peak,
        };
        assert_eq!(dynamic_range(&l(0.5, 0.6)), "Compressed");
        assert_eq!(dynamic_range(&l(0.1, 0.3)), "Moderate");
        assert_eq!(dynamic_range(&l(0.01, 0.5)), "Wide");
        assert_eq!(dynamic_range(&Loudness::default()), "Moderate");
    }

    #[test]
    fn test_score_is_deterministic() {
        let pitches = PitchSequence::from_frequencies(&[220.0, 440.0, 330.0], 0.1);
        let t = tempo(150.0, "Steady", Loudness::default());
        let a = score_mood(&key(Scale::Major), &t, &pitches);
        let b = score_mood(&key(Scale::Major), &t, &pitches);
        assert_eq!(a, b);
        assert_eq!(a.mood, "Energetic");
        assert_eq!(a.genre, "Electronic/Dance");
        assert_eq!(a.energy, 1.0);
    }
}

//! Interval contour, motion type and repeated motifs of the pitch track.

use serde::Serialize;

use super::pitch::PitchSequence;
use crate::config::MelodyConfig;
use crate::theory::semitone_interval;

const MOTIF_LEN: usize = 4;
const INSUFFICIENT: &str = "Insufficient data";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Motif {
    pub first_secs: f64,
    pub repeat_secs: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MelodicAnalysis {
    pub intervals: Vec<i32>,
    pub direction: String,
    pub motion: String,
    pub patterns: Vec<String>,
    pub motifs: Vec<Motif>,
}

impl MelodicAnalysis {
    fn insufficient() -> Self {
        Self {
            intervals: Vec::new(),
            direction: INSUFFICIENT.to_string(),
            motion: INSUFFICIENT.to_string(),
            patterns: vec![INSUFFICIENT.to_string()],
            motifs: Vec::new(),
        }
    }
}

pub fn analyze_patterns(pitches: &PitchSequence, config: &MelodyConfig) -> MelodicAnalysis {
    let valid: Vec<(f64, f32)> = pitches.valid().collect();
    if valid.len() < MOTIF_LEN {
        return MelodicAnalysis::insufficient();
    }

    let intervals: Vec<i32> = valid
        .windows(2)
        .map(|w| semitone_interval(w[0].1, w[1].1))
        .collect();
    let motifs = find_motifs(&valid, config.motif_tolerance, config.max_motifs);

    MelodicAnalysis {
        direction: direction(&intervals).to_string(),
        motion: motion(&intervals).to_string(),
        patterns: pattern_tags(&intervals),
        intervals,
        motifs,
    }
}

fn direction(intervals: &[i32]) -> &'static str {
    let up = intervals.iter().filter(|&&i| i > 0).count() as f64;
    let down = intervals.iter().filter(|&&i| i < 0).count() as f64;
    if up > down * 1.5 {
        "Ascending"
    } else if down > up * 1.5 {
        "Descending"
    } else {
        "Balanced"
    }
}

fn motion(intervals: &[i32]) -> &'static str {
    let steps = intervals.iter().filter(|i| i.abs() <= 2).count();
    let leaps = intervals.iter().filter(|i| i.abs() >= 4).count();
    if steps as f64 >= intervals.len() as f64 * 0.7 {
        "Stepwise"
    } else if leaps > steps {
        "Disjunct"
    } else {
        "Mixed"
    }
}

fn pattern_tags(intervals: &[i32]) -> Vec<String> {
    let n = intervals.len() as f64;
    let count = |pred: fn(&i32) -> bool| intervals.iter().filter(|i| pred(i)).count() as f64;

    let mut tags = Vec::new();
    if count(|i| *i > 0) > n * 0.6 {
        tags.push("Ascending sequences");
    }
    if count(|i| *i < 0) > n * 0.6 {
        tags.push("Descending sequences");
    }
    if count(|i| i.abs() <= 2) > n * 0.7 {
        tags.push("Stepwise motion");
    }
    if count(|i| i.abs() >= 4) > n * 0.3 {
        tags.push("Melodic leaps");
    }
    if has_repeated_pair(intervals) {
        tags.push("Repeated motifs");
    }
    if tags.is_empty() {
        tags.push("Mixed patterns");
    }
    tags.into_iter().map(String::from).collect()
}

/// Same two consecutive intervals occurring again later, non-overlapping.
fn has_repeated_pair(intervals: &[i32]) -> bool {
    if intervals.len() < 6 {
        return false;
    }
    (0..intervals.len() - 3).any(|i| {
        (i + 2..intervals.len() - 1).any(|j| intervals[i..i + 2] == intervals[j..j + 2])
    })
}

fn find_motifs(valid: &[(f64, f32)], tolerance: f32, limit: usize) -> Vec<Motif> {
    let mut motifs = Vec::new();
    if valid.len() < MOTIF_LEN * 2 || limit == 0 {
        return motifs;
    }
    let mut i = 0;
    while i + MOTIF_LEN * 2 <= valid.len() {
        let pattern = &valid[i..i + MOTIF_LEN];
        let repeat = (i + MOTIF_LEN..=valid.len() - MOTIF_LEN)
            .find(|&j| similar(pattern, &valid[j..j + MOTIF_LEN], tolerance));
        match repeat {
            Some(j) => {
                let (first, again) = (valid[i].0, valid[j].0);
                motifs.push(Motif {
                    first_secs: first,
                    repeat_secs: again,
                    description: format!(
                        "Motif at {} repeated at {}",
                        format_time(first),
                        format_time(again)
                    ),
                });
                if motifs.len() >= limit {
                    break;
                }
                i += MOTIF_LEN;
            }
            None => i += 1,
        }
    }
    motifs
}

fn similar(a: &[(f64, f32)], b: &[(f64, f32)], tolerance: f32) -> bool {
    a.iter().zip(b).all(|(&(_, p), &(_, q))| (p - q).abs() / p.max(q) <= tolerance)
}

/// `m:ss`
pub fn format_time(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(freqs: &[f32]) -> PitchSequence {
        PitchSequence::from_frequencies(freqs, 1.0)
    }

    #[test]
    fn test_too_few_pitches() {
        let m = analyze_patterns(&seq(&[440.0, 0.0, 494.0, 523.0]), &MelodyConfig::default());
        assert_eq!(m.direction, "Insufficient data");
        assert_eq!(m.patterns, vec!["Insufficient data"]);
        assert!(m.motifs.is_empty());
    }

    #[test]
    fn test_ascending_scale_is_stepwise() {
        // C D E F G A
        let freqs = [261.63, 293.66, 329.63, 349.23, 392.0, 440.0];
        let m = analyze_patterns(&seq(&freqs), &MelodyConfig::default());
        assert_eq!(m.intervals, vec![2, 2, 1, 2, 2]);
        assert_eq!(m.direction, "Ascending");
        assert_eq!(m.motion, "Stepwise");
        assert!(m.patterns.contains(&"Ascending sequences".to_string()));
        assert!(m.patterns.contains(&"Stepwise motion".to_string()));
    }

    #[test]
    fn test_gaps_are_skipped_for_intervals() {
        let freqs = [440.0, 0.0, 880.0, 440.0, 0.0, 880.0];
        let m = analyze_patterns(&seq(&freqs), &MelodyConfig::default());
        assert_eq!(m.intervals, vec![12, -12, 12]);
        assert_eq!(m.motion, "Disjunct");
        assert_eq!(m.direction, "Ascending");
        assert!(m.patterns.contains(&"Melodic leaps".to_string()));
    }

    #[test]
    fn test_repeated_motif_reported_with_times() {
        let phrase = [440.0, 494.0, 523.0, 587.0];
        let mut freqs = phrase.to_vec();
        freqs.extend_from_slice(&[300.0, 310.0]);
        freqs.extend(phrase.iter().map(|f| f * 1.02));
        let m = analyze_patterns(&seq(&freqs), &MelodyConfig::default());
        assert_eq!(m.motifs.len(), 1);
        assert_eq!(m.motifs[0].first_secs, 0.0);
        assert_eq!(m.motifs[0].repeat_secs, 6.0);
        assert_eq!(m.motifs[0].description, "Motif at 0:00 repeated at 0:06");
    }

    #[test]
    fn test_motifs_are_capped() {
        let freqs = vec![440.0; 64];
        let config = MelodyConfig {
            max_motifs: 3,
            ..MelodyConfig::default()
        };
        let m = analyze_patterns(&seq(&freqs), &config);
        assert_eq!(m.motifs.len(), 3);
        assert!(m.patterns.contains(&"Repeated motifs".to_string()));
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(65.9), "1:05");
        assert_eq!(format_time(600.0), "10:00");
    }
}

//! The aggregated per-file analysis result.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::chords::ChordProgression;
use super::key::{KeyEstimate, PitchClassHistogram};
use super::melody::MelodicAnalysis;
use super::mood::MoodProfile;
use super::pitch::PitchSummary;
use super::separation::TrackSeparation;
use super::tempo::TempoEstimate;

/// Everything learned about one input file.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub file_name: String,
    pub path: PathBuf,
    pub analyzed_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub source_format: String,
    pub converted: bool,
    pub key: KeyEstimate,
    pub pitch_histogram: PitchClassHistogram,
    pub pitch: PitchSummary,
    pub chords: ChordProgression,
    pub melody: MelodicAnalysis,
    pub tempo: TempoEstimate,
    pub separation: TrackSeparation,
    pub mood: MoodProfile,
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("?")
        .to_string()
}

impl AnalysisReport {
    /// Human-readable multi-line summary for terminal output.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mins = (self.duration_secs / 60.0).floor() as u64;
        let secs = self.duration_secs as u64 % 60;
        out.push_str(&format!(
            "{}  [{}:{:02}, {} Hz, {} ch, {}{}]\n",
            self.file_name,
            mins,
            secs,
            self.sample_rate,
            self.channels,
            self.source_format,
            if self.converted { ", converted" } else { "" }
        ));
        out.push_str(&format!(
            "  Key:        {} ({:?}), confidence {:.2}; alternatives {}\n",
            self.key.label(),
            self.key.mode,
            self.key.confidence,
            self.key.alternatives.join(", ")
        ));
        out.push_str(&format!(
            "  Tempo:      {:.1} BPM, {}, {} (confidence {:.2}{})\n",
            self.tempo.bpm,
            self.tempo.time_signature,
            self.tempo.rhythmic_pattern,
            self.tempo.confidence,
            if self.tempo.has_tempo_changes { ", varies" } else { "" }
        ));
        out.push_str(&format!(
            "  Chords:     {} ({})\n",
            self.chords.symbols().join(" "),
            self.chords.numerals().join("-")
        ));
        out.push_str(&format!("  Progression: {}\n", self.chords.progression_type));
        out.push_str(&format!(
            "  Melody:     {}, {}; {}\n",
            self.melody.direction,
            self.melody.motion,
            self.melody.patterns.join(", ")
        ));
        for motif in &self.melody.motifs {
            out.push_str(&format!("              {}\n", motif.description));
        }
        let instruments = if self.separation.instruments.is_empty() {
            "none detected".to_string()
        } else {
            self.separation.instruments.join(", ")
        };
        out.push_str(&format!(
            "  Instruments: {} (quality {:.2})\n",
            instruments, self.separation.quality
        ));
        out.push_str(&format!(
            "  Mood:       {} / {}; energy {:.2}, valence {:.2}, danceability {:.2}, dynamics {}\n",
            self.mood.mood,
            self.mood.genre,
            self.mood.energy,
            self.mood.valence,
            self.mood.danceability,
            self.mood.dynamic_range
        ));
        out
    }
}

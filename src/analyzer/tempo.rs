//! Energy-onset tempo tracking.
//!
//! Frames whose RMS crosses a fixed threshold count as beats, subject to a
//! refractory gap. BPM, local tempo samples, meter and rhythmic feel are all
//! derived from the resulting beat times.

use serde::Serialize;

use crate::config::TempoConfig;
use crate::waveform::{Waveform, rms};

pub const DEFAULT_BPM: f64 = 120.0;
pub const MIN_BPM: f64 = 60.0;
pub const MAX_BPM: f64 = 180.0;

/// Standard deviation (BPM) above which local tempo samples count as a change.
const TEMPO_CHANGE_STDDEV: f64 = 5.0;
const MIN_BEATS_FOR_METER: usize = 8;
/// Triple accent contrast must beat quadruple by this factor to report 3/4.
const TRIPLE_MARGIN: f64 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Loudness {
    pub mean_rms: f32,
    pub peak_rms: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TempoEstimate {
    pub bpm: f64,
    pub confidence: f64,
    pub time_signature: String,
    pub tempo_samples: Vec<f64>,
    pub has_tempo_changes: bool,
    pub rhythmic_pattern: String,
    pub beat_count: usize,
    pub beat_times: Vec<f64>,
    pub loudness: Loudness,
}

/// Per-frame `(time, rms)`.
#[derive(Debug, Clone, Copy)]
struct Frame {
    time: f64,
    rms: f32,
}

pub fn detect_tempo(waveform: &Waveform, config: &TempoConfig, chunk_seconds: u32) -> TempoEstimate {
    let sr = waveform.sample_rate().max(1) as f64;
    let mut frames = Vec::new();
    waveform.for_each_window(config.frame_size, config.hop_size, |start, frame| {
        frames.push(Frame {
            time: start as f64 / sr,
            rms: rms(frame),
        });
    });

    let beats = detect_beats(&frames, config.rms_threshold, config.refractory_secs);
    let beat_times: Vec<f64> = beats.iter().map(|&i| frames[i].time).collect();
    let accents: Vec<f32> = beats.iter().map(|&i| frames[i].rms).collect();
    let intervals: Vec<f64> = beat_times.windows(2).map(|w| w[1] - w[0]).collect();

    let tempo_samples = local_tempo_samples(&beat_times, chunk_seconds as f64);
    let estimate = TempoEstimate {
        bpm: tempo_from_beats(&beat_times),
        confidence: interval_confidence(&intervals),
        time_signature: time_signature(&accents).to_string(),
        has_tempo_changes: has_tempo_changes(&tempo_samples),
        tempo_samples,
        rhythmic_pattern: rhythmic_pattern(&intervals).to_string(),
        beat_count: beat_times.len(),
        beat_times,
        loudness: loudness(&frames),
    };
    log::debug!(
        "Tempo: {:.1} BPM from {} beats ({}, {})",
        estimate.bpm,
        estimate.beat_count,
        estimate.time_signature,
        estimate.rhythmic_pattern
    );
    estimate
}

/// Indices of frames that start a beat.
fn detect_beats(frames: &[Frame], threshold: f32, refractory: f64) -> Vec<usize> {
    let mut beats = Vec::new();
    let mut last: Option<f64> = None;
    for (i, frame) in frames.iter().enumerate() {
        if frame.rms <= threshold {
            continue;
        }
        if last.is_none_or(|t| frame.time - t >= refractory) {
            beats.push(i);
            last = Some(frame.time);
        }
    }
    beats
}

/// `60 / mean inter-beat interval`, clamped to [60, 180]. 120 when there are
/// fewer than two beats.
pub fn tempo_from_beats(beat_times: &[f64]) -> f64 {
    if beat_times.len() < 2 {
        return DEFAULT_BPM;
    }
    let span = beat_times[beat_times.len() - 1] - beat_times[0];
    let mean = span / (beat_times.len() - 1) as f64;
    if mean <= 0.0 {
        return DEFAULT_BPM;
    }
    (60.0 / mean).clamp(MIN_BPM, MAX_BPM)
}

/// One BPM value per `chunk_secs` window that holds at least two beats.
fn local_tempo_samples(beat_times: &[f64], chunk_secs: f64) -> Vec<f64> {
    let Some(&last) = beat_times.last() else {
        return Vec::new();
    };
    if chunk_secs <= 0.0 {
        return Vec::new();
    }
    let chunks = (last / chunk_secs).floor() as usize + 1;
    (0..chunks)
        .filter_map(|k| {
            let (lo, hi) = (k as f64 * chunk_secs, (k + 1) as f64 * chunk_secs);
            let inside: Vec<f64> = beat_times
                .iter()
                .copied()
                .filter(|&t| t >= lo && t < hi)
                .collect();
            (inside.len() >= 2).then(|| tempo_from_beats(&inside))
        })
        .collect()
}

/// True iff the sample standard deviation exceeds 5 BPM.
pub fn has_tempo_changes(samples: &[f64]) -> bool {
    if samples.len() < 2 {
        return false;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let var = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1.0);
    var.sqrt() > TEMPO_CHANGE_STDDEV
}

fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return None;
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some(var.sqrt() / mean)
}

fn interval_confidence(intervals: &[f64]) -> f64 {
    match coefficient_of_variation(intervals) {
        Some(cv) => (1.0 - cv).clamp(0.0, 1.0),
        None => 0.0,
    }
}

/// Strongest phase-aligned accent ratio for a meter of `period` beats.
fn accent_contrast(accents: &[f32], period: usize) -> f64 {
    (0..period)
        .map(|phase| {
            let (mut on, mut on_n, mut off, mut off_n) = (0.0f64, 0usize, 0.0f64, 0usize);
            for (i, &a) in accents.iter().enumerate() {
                if i % period == phase {
                    on += a as f64;
                    on_n += 1;
                } else {
                    off += a as f64;
                    off_n += 1;
                }
            }
            if on_n == 0 || off_n == 0 || off <= 0.0 {
                return 1.0;
            }
            (on / on_n as f64) / (off / off_n as f64)
        })
        .fold(1.0, f64::max)
}

fn time_signature(accents: &[f32]) -> &'static str {
    if accents.len() < MIN_BEATS_FOR_METER {
        return "4/4";
    }
    let triple = accent_contrast(accents, 3);
    let quadruple = accent_contrast(accents, 4);
    if triple > TRIPLE_MARGIN && triple > quadruple * TRIPLE_MARGIN {
        "3/4"
    } else {
        "4/4"
    }
}

fn rhythmic_pattern(intervals: &[f64]) -> &'static str {
    if intervals.len() < 3 {
        return "Steady";
    }
    let cv = coefficient_of_variation(intervals).unwrap_or(0.0);
    if cv < 0.1 {
        return "Steady";
    }
    let alternating = intervals.windows(3).all(|w| {
        let (a, b, c) = (w[0], w[1], w[2]);
        (a > b && c > b || a < b && c < b) && a.max(b) / a.min(b).max(f64::EPSILON) >= 1.3
    });
    if alternating {
        "Swing"
    } else if cv < 0.3 {
        "Syncopated"
    } else {
        "Complex"
    }
}

fn loudness(frames: &[Frame]) -> Loudness {
    if frames.is_empty() {
        return Loudness::default();
    }
    let mean = frames.iter().map(|f| f.rms as f64).sum::<f64>() / frames.len() as f64;
    let peak = frames.iter().map(|f| f.rms).fold(0.0f32, f32::max);
    Loudness {
        mean_rms: mean as f32,
        peak_rms: peak,
    }
}

//! Coarse instrument presence.
//!
//! [`HeuristicSeparator`] does not isolate stems. It reports which broad
//! instrument families look present from band-energy ratios and transient
//! density, with a fixed low quality score.

use std::f64::consts::PI;

use serde::Serialize;

use crate::waveform::{Waveform, rms};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackSeparation {
    pub instruments: Vec<String>,
    pub vocals: Option<String>,
    pub bass: Option<String>,
    pub drums: Option<String>,
    pub other: Option<String>,
    /// Confidence in the labels, not accuracy of any isolated stem.
    pub quality: f64,
}

pub trait SourceSeparator: Send + Sync {
    fn name(&self) -> &'static str;
    fn separate(&self, waveform: &Waveform) -> TrackSeparation;
}

const BASS_CUTOFF_HZ: f64 = 150.0;
const TREBLE_CUTOFF_HZ: f64 = 4000.0;
const BASS_RATIO: f64 = 0.2;
const MID_RATIO: f64 = 0.2;
/// Treble share that reads as cymbals/hats even without clear onsets.
const TREBLE_RATIO: f64 = 0.5;
const TRANSIENT_FRAME: usize = 1024;
const TRANSIENT_JUMP: f32 = 1.5;
const TRANSIENT_FLOOR: f32 = 0.05;
/// Onsets per second needed before percussion is reported.
const TRANSIENT_RATE: f64 = 1.0;

#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicSeparator;

impl HeuristicSeparator {
    pub const QUALITY: f64 = 0.25;
}

impl SourceSeparator for HeuristicSeparator {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn separate(&self, waveform: &Waveform) -> TrackSeparation {
        let bands = band_ratios(waveform.samples(), waveform.sample_rate());
        let rate = transient_rate(waveform);

        let bass = bands.is_some_and(|b| b.low > BASS_RATIO);
        let other = bands.is_some_and(|b| b.mid > MID_RATIO);
        let drums = rate >= TRANSIENT_RATE || bands.is_some_and(|b| b.high > TREBLE_RATIO);

        let mut instruments = Vec::new();
        if bass {
            instruments.push("Bass".to_string());
        }
        if drums {
            instruments.push("Drums/Percussion".to_string());
        }
        if other {
            instruments.push("Melodic Instruments".to_string());
        }
        log::debug!(
            "Separation: bands={:?} transients/s={:.2} -> {:?}",
            bands,
            rate,
            instruments
        );

        TrackSeparation {
            instruments,
            vocals: None,
            bass: bass.then(|| "Detected".to_string()),
            drums: drums.then(|| "Detected".to_string()),
            other: other.then(|| "Mixed Instruments".to_string()),
            quality: Self::QUALITY,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct BandRatios {
    low: f64,
    mid: f64,
    high: f64,
}

/// Energy share below 150 Hz, above 4 kHz and in between, via one-pole
/// low-pass filters. `None` for silence.
fn band_ratios(samples: &[f32], sample_rate: u32) -> Option<BandRatios> {
    if sample_rate == 0 {
        return None;
    }
    let sr = sample_rate as f64;
    let coeff = |fc: f64| 1.0 - (-2.0 * PI * fc / sr).exp();
    let (a_low, a_treble) = (coeff(BASS_CUTOFF_HZ), coeff(TREBLE_CUTOFF_HZ));

    let (mut lp_low, mut lp_treble) = (0.0f64, 0.0f64);
    let (mut total, mut low, mut high) = (0.0f64, 0.0f64, 0.0f64);
    for &x in samples {
        let x = x as f64;
        lp_low += a_low * (x - lp_low);
        lp_treble += a_treble * (x - lp_treble);
        let hp = x - lp_treble;
        total += x * x;
        low += lp_low * lp_low;
        high += hp * hp;
    }
    if total <= f64::EPSILON {
        return None;
    }
    let low = (low / total).min(1.0);
    let high = (high / total).min(1.0);
    Some(BandRatios {
        low,
        high,
        mid: (1.0 - low - high).max(0.0),
    })
}

/// Sudden frame-energy jumps per second.
fn transient_rate(waveform: &Waveform) -> f64 {
    let duration = waveform.duration_secs();
    if duration <= 0.0 {
        return 0.0;
    }
    let mut previous = 0.0f32;
    let mut onsets = 0usize;
    waveform.for_each_window(TRANSIENT_FRAME, TRANSIENT_FRAME, |_, frame| {
        let level = rms(frame);
        if level > TRANSIENT_FLOOR && level > previous * TRANSIENT_JUMP {
            onsets += 1;
        }
        previous = level;
    });
    onsets as f64 / duration
}

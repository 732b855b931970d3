//! Key, scale and mode inference from a pitch-class histogram.

use serde::Serialize;

use super::pitch::PitchSequence;
use crate::theory::{Mode, PitchClass, Scale};

/// Krumhansl–Kessler key profiles, tonic first.
const MAJOR_PROFILE: [f64; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];
const MINOR_PROFILE: [f64; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

/// Relative pitch-class occupancy, normalized to sum 1 (or all zero).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PitchClassHistogram([f64; 12]);

impl PitchClassHistogram {
    pub fn from_sequence(pitches: &PitchSequence) -> Self {
        let mut bins = [0.0f64; 12];
        for (_, f) in pitches.valid() {
            if let Some(pc) = PitchClass::from_frequency(f) {
                bins[pc.index()] += 1.0;
            }
        }
        Self::normalized(bins)
    }

    /// Normalize raw counts. All-zero input stays all-zero.
    pub fn normalized(mut bins: [f64; 12]) -> Self {
        let total: f64 = bins.iter().sum();
        if total > 0.0 {
            for b in bins.iter_mut() {
                *b /= total;
            }
        }
        Self(bins)
    }

    pub fn bins(&self) -> &[f64; 12] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&b| b == 0.0)
    }

    /// Pitch classes sorted by weight, heaviest first; empty bins omitted.
    pub fn dominant_classes(&self) -> Vec<(PitchClass, f64)> {
        let mut classes: Vec<(PitchClass, f64)> = self
            .0
            .iter()
            .enumerate()
            .filter(|(_, w)| **w > 0.0)
            .map(|(i, &w)| (PitchClass::new(i as i32), w))
            .collect();
        classes.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        classes
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyEstimate {
    pub key: PitchClass,
    pub scale: Scale,
    pub mode: Mode,
    pub confidence: f64,
    pub alternatives: Vec<String>,
}

impl KeyEstimate {
    fn new(key: PitchClass, scale: Scale, confidence: f64) -> Self {
        Self {
            key,
            scale,
            mode: scale.mode(),
            confidence: confidence.clamp(0.0, 1.0),
            alternatives: alternative_keys(key, scale),
        }
    }

    pub fn label(&self) -> String {
        format!("{} {}", self.key, self.scale)
    }
}

impl Default for KeyEstimate {
    fn default() -> Self {
        Self::new(PitchClass::C, Scale::Major, 0.0)
    }
}

pub fn infer_key(pitches: &PitchSequence) -> KeyEstimate {
    estimate_from_histogram(&PitchClassHistogram::from_sequence(pitches))
}

/// Best-correlated (tonic, scale) pair over all 24 rotated profiles.
pub fn estimate_from_histogram(histogram: &PitchClassHistogram) -> KeyEstimate {
    if histogram.is_empty() {
        return KeyEstimate::default();
    }
    let mut best = (PitchClass::C, Scale::Major, f64::NEG_INFINITY);
    for tonic in 0..12 {
        for (scale, profile) in [(Scale::Major, &MAJOR_PROFILE), (Scale::Minor, &MINOR_PROFILE)] {
            let r = correlation(histogram.bins(), profile, tonic);
            if r > best.2 {
                best = (PitchClass::new(tonic as i32), scale, r);
            }
        }
    }
    log::debug!("Key: {} {} (r={:.3})", best.0, best.1, best.2);
    KeyEstimate::new(best.0, best.1, best.2)
}

/// Pearson correlation of `x` against `profile` rotated so its tonic sits at
/// `tonic`. Zero when either side has no variance.
fn correlation(x: &[f64; 12], profile: &[f64; 12], tonic: usize) -> f64 {
    let n = 12.0;
    let (mut sx, mut sy, mut sxy, mut sx2, mut sy2) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for i in 0..12 {
        let xi = x[i];
        let yi = profile[(i + 12 - tonic) % 12];
        sx += xi;
        sy += yi;
        sxy += xi * yi;
        sx2 += xi * xi;
        sy2 += yi * yi;
    }
    let denom = ((n * sx2 - sx * sx) * (n * sy2 - sy * sy)).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        0.0
    } else {
        (n * sxy - sx * sy) / denom
    }
}

/// Relative, dominant and subdominant keys.
pub fn alternative_keys(key: PitchClass, scale: Scale) -> Vec<String> {
    match scale {
        Scale::Major => vec![
            format!("{}m", key.transpose(9)),
            key.transpose(7).to_string(),
            key.transpose(5).to_string(),
        ],
        Scale::Minor => vec![
            key.transpose(3).to_string(),
            format!("{}m", key.transpose(7)),
            format!("{}m", key.transpose(5)),
        ],
    }
}

//! Fundamental-frequency tracking with YIN over overlapping windows.

use pitch_detection::detector::PitchDetector;
use pitch_detection::detector::yin::YINDetector;
use serde::Serialize;

use crate::config::PitchConfig;
use crate::waveform::Waveform;

/// One analysis window's estimate. `frequency` is `None` when the window is
/// silent, unclear or outside the configured band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PitchSample {
    pub time: f64,
    pub frequency: Option<f32>,
}

/// Time-ordered pitch estimates for a whole waveform.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PitchSequence {
    samples: Vec<PitchSample>,
}

impl PitchSequence {
    pub fn new(samples: Vec<PitchSample>) -> Self {
        Self { samples }
    }

    /// Build from bare frequencies spaced `step` seconds apart; non-positive
    /// values become gaps.
    pub fn from_frequencies(frequencies: &[f32], step: f64) -> Self {
        let samples = frequencies
            .iter()
            .enumerate()
            .map(|(i, &f)| PitchSample {
                time: i as f64 * step,
                frequency: (f.is_finite() && f > 0.0).then_some(f),
            })
            .collect();
        Self { samples }
    }

    pub fn samples(&self) -> &[PitchSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// `(time, frequency)` of every window that produced an estimate.
    pub fn valid(&self) -> impl Iterator<Item = (f64, f32)> + '_ {
        self.samples
            .iter()
            .filter_map(|s| s.frequency.map(|f| (s.time, f)))
    }

    pub fn valid_count(&self) -> usize {
        self.valid().count()
    }

    /// Population variance of the valid frequencies, in Hz².
    pub fn frequency_variance(&self) -> f64 {
        let n = self.valid_count();
        if n < 2 {
            return 0.0;
        }
        let mean = self.valid().map(|(_, f)| f as f64).sum::<f64>() / n as f64;
        self.valid()
            .map(|(_, f)| (f as f64 - mean).powi(2))
            .sum::<f64>()
            / n as f64
    }

    pub fn summary(&self) -> PitchSummary {
        let valid: Vec<f32> = self.valid().map(|(_, f)| f).collect();
        let voiced_ratio = if self.samples.is_empty() {
            0.0
        } else {
            valid.len() as f64 / self.samples.len() as f64
        };
        let (mean_hz, min_hz, max_hz) = if valid.is_empty() {
            (None, None, None)
        } else {
            let mean = valid.iter().map(|&f| f as f64).sum::<f64>() / valid.len() as f64;
            let min = valid.iter().copied().fold(f32::INFINITY, f32::min);
            let max = valid.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            (Some(mean), Some(min), Some(max))
        };
        PitchSummary {
            windows: self.samples.len(),
            voiced: valid.len(),
            voiced_ratio,
            mean_hz,
            min_hz,
            max_hz,
            variance: self.frequency_variance(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PitchSummary {
    pub windows: usize,
    pub voiced: usize,
    pub voiced_ratio: f64,
    pub mean_hz: Option<f64>,
    pub min_hz: Option<f32>,
    pub max_hz: Option<f32>,
    pub variance: f64,
}

/// Run YIN over `window_size` frames every `hop_size` samples.
pub fn extract_pitches(
    waveform: &Waveform,
    window_size: usize,
    hop_size: usize,
    config: &PitchConfig,
) -> PitchSequence {
    if waveform.is_empty() || window_size == 0 || hop_size == 0 {
        return PitchSequence::default();
    }
    let sample_rate = waveform.sample_rate() as usize;
    let mut detector = YINDetector::<f32>::new(window_size, window_size / 2);
    let mut samples = Vec::with_capacity(waveform.len() / hop_size + 1);

    waveform.for_each_window(window_size, hop_size, |start, frame| {
        let frequency = detector
            .get_pitch(
                frame,
                sample_rate,
                config.power_threshold,
                config.clarity_threshold,
            )
            .map(|p| p.frequency)
            .filter(|f| {
                f.is_finite() && *f >= config.min_frequency && *f <= config.max_frequency
            });
        samples.push(PitchSample {
            time: start as f64 / sample_rate as f64,
            frequency,
        });
    });

    log::debug!(
        "Pitch: {} windows, {} voiced",
        samples.len(),
        samples.iter().filter(|s| s.frequency.is_some()).count()
    );
    PitchSequence::new(samples)
}

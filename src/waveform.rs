//! Decoded PCM audio and the windowing loop the analyzers stream through.

use std::sync::Arc;

/// Immutable decoded audio. The mono mixdown is shared between analyzers.
#[derive(Debug, Clone)]
pub struct Waveform {
    samples: Arc<[f32]>,
    sample_rate: u32,
    channels: u16,
}

impl Waveform {
    /// Build a waveform from interleaved samples, mixing down to mono.
    pub fn from_interleaved(interleaved: &[f32], channels: u16, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let samples: Arc<[f32]> = if channels == 1 {
            interleaved.into()
        } else {
            let n = channels as usize;
            interleaved
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        };
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
            channels: 1,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channel count of the source before mixdown.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Visit `window`-sized frames starting every `hop` samples.
    ///
    /// The callback receives the start offset in samples and the frame. The
    /// last frame is zero-padded when it runs past the end; iteration stops
    /// after the first frame that reaches the end of the signal.
    pub fn for_each_window<F>(&self, window: usize, hop: usize, mut f: F)
    where
        F: FnMut(usize, &[f32]),
    {
        if window == 0 || hop == 0 || self.samples.is_empty() {
            return;
        }
        let len = self.samples.len();
        let mut padded = vec![0.0f32; window];
        let mut start = 0;
        while start < len {
            let end = start + window;
            if end <= len {
                f(start, &self.samples[start..end]);
            } else {
                let available = len - start;
                padded[..available].copy_from_slice(&self.samples[start..]);
                padded[available..].fill(0.0);
                f(start, &padded);
            }
            if end >= len {
                break;
            }
            start += hop;
        }
    }
}

/// Root-mean-square of a frame. Zero for an empty frame.
pub fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum: f64 = frame.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / frame.len() as f64).sqrt() as f32
}

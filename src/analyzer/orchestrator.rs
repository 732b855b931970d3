//! Runs every analysis stage for one input and assembles the report.
//!
//! Stage order: gateway, then pitch and tempo together, then key, then
//! chords, melody and separation together, then mood. Every stage runs on a
//! pool thread; the async side only sequences them. The analysis holds a
//! cancellation drop guard, so dropping the future (or timing it out) makes
//! any stage that has not started yet skip itself.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use super::chords::analyze_chords;
use super::key::{PitchClassHistogram, estimate_from_histogram};
use super::melody::analyze_patterns;
use super::mood::score_mood;
use super::pitch::extract_pitches;
use super::report::{AnalysisReport, file_name};
use super::separation::{HeuristicSeparator, SourceSeparator};
use super::tempo::detect_tempo;
use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::gateway::{FormatGateway, Toolchain};
use crate::generation::cache::VariationCache;
use crate::generation::pattern::{self, ModularPattern, PatternRequest};
use crate::generation::variation::{self, ProgressionVariation, VariationRequest};
use crate::pool::Pools;
use crate::theory::Tonality;

pub struct AnalysisOrchestrator {
    config: Arc<AppConfig>,
    gateway: Arc<FormatGateway>,
    pools: Pools,
    separator: Arc<dyn SourceSeparator>,
    cache: VariationCache,
    shutdown: CancellationToken,
}

impl AnalysisOrchestrator {
    pub fn new(config: AppConfig, toolchain: Toolchain) -> Result<Self, PipelineError> {
        let pools = Pools::new(&config.pools)?;
        let gateway = FormatGateway::new(toolchain, &config);
        Ok(Self {
            config: Arc::new(config),
            gateway: Arc::new(gateway),
            pools,
            separator: Arc::new(HeuristicSeparator),
            cache: VariationCache::new(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Swap in a different separation backend.
    pub fn with_separator(mut self, separator: Arc<dyn SourceSeparator>) -> Self {
        self.separator = separator;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn toolchain(&self) -> &Toolchain {
        self.gateway.toolchain()
    }

    pub fn cache(&self) -> &VariationCache {
        &self.cache
    }

    /// Cancel every in-flight and future operation on this orchestrator.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub async fn analyze(&self, path: &Path) -> Result<AnalysisReport, PipelineError> {
        let cancel = self.shutdown.child_token();
        let _guard = cancel.clone().drop_guard();
        let started = Instant::now();
        log::info!("Analyzing {}", path.display());

        let handle = {
            let gateway = Arc::clone(&self.gateway);
            let source = path.to_path_buf();
            self.pools
                .analysis
                .run("gateway", &cancel, move || gateway.ensure_analyzable(&source))
                .await?
        };
        let waveform = handle.waveform().clone();
        log::debug!(
            "{}: {} samples @ {} Hz from {}",
            file_name(path),
            waveform.len(),
            waveform.sample_rate(),
            handle.source_format()
        );

        let pitch_job = {
            let waveform = waveform.clone();
            let config = Arc::clone(&self.config);
            move || {
                Ok(extract_pitches(
                    &waveform,
                    config.audio.window_size,
                    config.audio.hop_size(),
                    &config.pitch,
                ))
            }
        };
        let tempo_job = {
            let waveform = waveform.clone();
            let config = Arc::clone(&self.config);
            move || Ok(detect_tempo(&waveform, &config.tempo, config.audio.chunk_seconds))
        };
        let (pitches, tempo) = tokio::try_join!(
            self.pools.analysis.run("pitch", &cancel, pitch_job),
            self.pools.analysis.run("tempo", &cancel, tempo_job),
        )?;
        let pitches = Arc::new(pitches);

        let (histogram, key) = {
            let pitches = Arc::clone(&pitches);
            self.pools
                .helpers
                .run("key", &cancel, move || {
                    let histogram = PitchClassHistogram::from_sequence(&pitches);
                    let key = estimate_from_histogram(&histogram);
                    Ok((histogram, key))
                })
                .await?
        };
        log::debug!("{}: key {} ({:.2})", file_name(path), key.label(), key.confidence);

        let chords_job = {
            let pitches = Arc::clone(&pitches);
            let key = key.clone();
            move || Ok(analyze_chords(&pitches, &key))
        };
        let melody_job = {
            let pitches = Arc::clone(&pitches);
            let config = Arc::clone(&self.config);
            move || Ok(analyze_patterns(&pitches, &config.melody))
        };
        let separation_job = {
            let separator = Arc::clone(&self.separator);
            let waveform = waveform.clone();
            move || Ok(separator.separate(&waveform))
        };
        let (chords, melody, separation) = tokio::try_join!(
            self.pools.helpers.run("chords", &cancel, chords_job),
            self.pools.helpers.run("melody", &cancel, melody_job),
            self.pools.analysis.run("separation", &cancel, separation_job),
        )?;

        let mood = {
            let pitches = Arc::clone(&pitches);
            let key = key.clone();
            let tempo = tempo.clone();
            self.pools
                .helpers
                .run("mood", &cancel, move || Ok(score_mood(&key, &tempo, &pitches)))
                .await?
        };

        let report = AnalysisReport {
            file_name: file_name(path),
            path: path.to_path_buf(),
            analyzed_at: chrono::Utc::now(),
            duration_secs: waveform.duration_secs(),
            sample_rate: waveform.sample_rate(),
            channels: waveform.channels(),
            source_format: handle.source_format().to_string(),
            converted: handle.was_converted(),
            key,
            pitch_histogram: histogram,
            pitch: pitches.summary(),
            chords,
            melody,
            tempo,
            separation,
            mood,
        };
        log::info!(
            "{}: done in {:.2}s",
            report.file_name,
            started.elapsed().as_secs_f64()
        );
        Ok(report)
    }

    /// [`analyze`](Self::analyze) bounded by `limit`. On expiry the analysis
    /// is dropped, which cancels pending stages and removes any converted file.
    pub async fn analyze_with_timeout(
        &self,
        path: &Path,
        limit: Duration,
    ) -> Result<AnalysisReport, PipelineError> {
        match tokio::time::timeout(limit, self.analyze(path)).await {
            Ok(result) => result,
            Err(_) => {
                log::warn!("{}: timed out after {:?}", file_name(path), limit);
                Err(PipelineError::TimedOut(limit))
            }
        }
    }

    /// Cached, seeded progression variation computed on the generation pool.
    pub async fn generate_variation(
        &self,
        request: VariationRequest,
    ) -> Result<ProgressionVariation, PipelineError> {
        request.validate()?;
        let pool = &self.pools.generation;
        let cancel = &self.shutdown;
        self.cache
            .get_or_compute(&request, || {
                let req = request.clone();
                async move {
                    pool.run("variation", cancel, move || variation::generate_variation(&req))
                        .await
                        .map_err(|e| match e {
                            PipelineError::Saturated { .. } | PipelineError::Cancelled => e,
                            other => PipelineError::CacheComputationFailed(other.to_string()),
                        })
                }
            })
            .await
    }

    pub async fn generate_pattern(
        &self,
        request: PatternRequest,
    ) -> Result<ModularPattern, PipelineError> {
        self.pools
            .generation
            .run("pattern", &self.shutdown, move || pattern::generate_pattern(&request))
            .await
    }

    pub async fn generate_harmony(
        &self,
        tonality: Tonality,
        voices: usize,
    ) -> Result<Vec<Vec<String>>, PipelineError> {
        self.pools
            .generation
            .run("harmony", &self.shutdown, move || {
                pattern::generate_harmony(tonality, voices)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::separation::TrackSeparation;
    use crate::theory::Scale;
    use crate::waveform::Waveform;

    fn orchestrator() -> AnalysisOrchestrator {
        AnalysisOrchestrator::new(AppConfig::default(), Toolchain::none()).unwrap()
    }

    fn write_tone(path: &Path, freq: f32, secs: f32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let n = (44100.0 * secs) as usize;
        for i in 0..n {
            let t = i as f32 / 44100.0;
            let s = (2.0 * std::f32::consts::PI * freq * t).sin() * 0.5;
            writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    struct Silent;

    impl SourceSeparator for Silent {
        fn name(&self) -> &'static str {
            "silent"
        }

        fn separate(&self, _waveform: &Waveform) -> TrackSeparation {
            TrackSeparation {
                instruments: vec![],
                vocals: None,
                bass: None,
                drums: None,
                other: None,
                quality: 0.0,
            }
        }
    }

    #[tokio::test]
    async fn test_analyze_tone_with_custom_separator() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_tone(&path, 440.0, 1.0);

        let orch = orchestrator().with_separator(Arc::new(Silent));
        let report = orch.analyze(&path).await.unwrap();
        assert_eq!(report.file_name, "tone.wav");
        assert_eq!(report.sample_rate, 44100);
        assert!(!report.converted);
        assert!(report.separation.instruments.is_empty());
        assert!((report.duration_secs - 1.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_missing_source() {
        let orch = orchestrator();
        let err = orch.analyze(Path::new("/nonexistent/x.wav")).await.unwrap_err();
        assert!(matches!(err, PipelineError::SourceNotFound(_)));
    }

    #[tokio::test]
    async fn test_shutdown_cancels() {
        let orch = orchestrator();
        orch.shutdown();
        let req = VariationRequest::new(vec!["C".into()], Scale::Major, 0.1, 1);
        assert!(matches!(
            orch.generate_variation(req).await,
            Err(PipelineError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_invalid_variation_is_not_cached() {
        let orch = orchestrator();
        let req = VariationRequest::new(vec![], Scale::Major, 0.1, 1);
        assert!(matches!(
            orch.generate_variation(req).await,
            Err(PipelineError::InvalidRequest(_))
        ));
        assert_eq!(orch.cache().computations(), 0);
    }

    #[tokio::test]
    async fn test_pattern_and_harmony() {
        let orch = orchestrator();
        let request = PatternRequest {
            chords: vec!["C".into(), "G".into()],
            tonality: "C major".parse().unwrap(),
            complexity: 1,
            tempo: 90.0,
            instruments: vec!["Piano".into()],
        };
        let pattern = orch.generate_pattern(request).await.unwrap();
        assert_eq!(pattern.voices[0].tokens, vec!["C", "G"]);

        let voices = orch
            .generate_harmony("A minor".parse().unwrap(), 3)
            .await
            .unwrap();
        assert_eq!(voices.len(), 3);
        assert!(voices.iter().all(|v| v.len() == 7));
    }
}

//! Input normalization: decide whether a file can be decoded in-process and
//! transcode it to PCM WAV when it can't.

pub mod decode;

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tempfile::TempPath;

use crate::config::{AppConfig, ToolsConfig};
use crate::error::PipelineError;
use crate::waveform::Waveform;

use decode::{decode_native, decode_wav, native_container};

/// External executables found at startup.
#[derive(Debug, Clone, Default)]
pub struct Toolchain {
    transcoder: Option<PathBuf>,
    prober: Option<PathBuf>,
}

impl Toolchain {
    /// Probe the configured paths once with `-version`.
    pub fn detect(config: &ToolsConfig) -> Self {
        let transcoder = responds(&config.ffmpeg).then(|| config.ffmpeg.clone());
        let prober = responds(&config.ffprobe).then(|| config.ffprobe.clone());
        if transcoder.is_none() {
            log::warn!(
                "Transcoder '{}' not available; only WAV and FLAC can be analyzed",
                config.ffmpeg.display()
            );
        }
        if prober.is_none() {
            log::debug!("Prober '{}' not available", config.ffprobe.display());
        }
        Self { transcoder, prober }
    }

    pub fn new(transcoder: Option<PathBuf>, prober: Option<PathBuf>) -> Self {
        Self { transcoder, prober }
    }

    /// No external tools: only natively decodable input is accepted.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn transcoder(&self) -> Option<&Path> {
        self.transcoder.as_deref()
    }

    pub fn prober(&self) -> Option<&Path> {
        self.prober.as_deref()
    }
}

fn responds(program: &Path) -> bool {
    Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// A decoded input. Owns the converted temp file, if any, which is removed
/// when the handle is dropped.
#[derive(Debug)]
pub struct CanonicalHandle {
    waveform: Waveform,
    source_format: String,
    converted: Option<TempPath>,
}

impl CanonicalHandle {
    pub fn waveform(&self) -> &Waveform {
        &self.waveform
    }

    pub fn source_format(&self) -> &str {
        &self.source_format
    }

    pub fn was_converted(&self) -> bool {
        self.converted.is_some()
    }

    /// Path of the converted WAV while the handle is alive.
    pub fn converted_path(&self) -> Option<&Path> {
        self.converted.as_deref()
    }
}

#[derive(Debug, Clone)]
pub struct FormatGateway {
    toolchain: Toolchain,
    sample_rate: u32,
    channels: u16,
    temp_dir: PathBuf,
}

impl FormatGateway {
    pub fn new(toolchain: Toolchain, config: &AppConfig) -> Self {
        Self {
            toolchain,
            sample_rate: config.audio.sample_rate,
            channels: config.audio.channels,
            temp_dir: config.resolve_temp_dir(),
        }
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    /// Produce a decoded waveform for `path`, converting it first if needed.
    pub fn ensure_analyzable(&self, path: &Path) -> Result<CanonicalHandle, PipelineError> {
        if !path.is_file() {
            return Err(PipelineError::SourceNotFound(path.to_path_buf()));
        }

        if let Some(container) = native_container(path) {
            match decode_native(path, container) {
                Ok(waveform) => {
                    log::debug!("Decoded {} natively as {}", path.display(), container.label());
                    return Ok(CanonicalHandle {
                        waveform,
                        source_format: container.label().to_string(),
                        converted: None,
                    });
                }
                Err(e) if self.toolchain.transcoder.is_some() => {
                    log::warn!(
                        "Native {} decode failed for {}: {}. Falling back to transcoder.",
                        container.label(),
                        path.display(),
                        e
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.convert(path, source_label(path))
    }

    fn convert(&self, path: &Path, source_format: String) -> Result<CanonicalHandle, PipelineError> {
        let Some(transcoder) = self.toolchain.transcoder() else {
            return Err(PipelineError::ConversionUnavailable(path.to_path_buf()));
        };
        if let Some(prober) = self.toolchain.prober() {
            probe_audio_stream(prober, path)?;
        }

        let target = tempfile::Builder::new()
            .prefix("converted_")
            .suffix(".wav")
            .tempfile_in(&self.temp_dir)?
            .into_temp_path();

        log::info!(
            "Converting {} to {} Hz / {} ch PCM",
            path.display(),
            self.sample_rate,
            self.channels
        );
        let output = Command::new(transcoder)
            .arg("-v")
            .arg("error")
            .arg("-y")
            .arg("-i")
            .arg(path)
            .args(["-vn", "-f", "wav", "-acodec", "pcm_s16le"])
            .arg("-ar")
            .arg(self.sample_rate.to_string())
            .arg("-ac")
            .arg(self.channels.to_string())
            .arg(&*target)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| PipelineError::ConversionFailed(format!("{}: {}", transcoder.display(), e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::ConversionFailed(format!(
                "{} exited with {}: {}",
                transcoder.display(),
                output.status,
                stderr.trim()
            )));
        }
        let written = std::fs::metadata(&target).map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(PipelineError::ConversionFailed(format!(
                "{} produced no output for {}",
                transcoder.display(),
                path.display()
            )));
        }

        let waveform = decode_wav(&target)?;
        Ok(CanonicalHandle {
            waveform,
            source_format,
            converted: Some(target),
        })
    }
}

fn source_label(path: &Path) -> String {
    match decode::extension(path) {
        ext if ext.is_empty() => "unknown".to_string(),
        ext => ext,
    }
}

/// Ask the prober whether `path` carries at least one audio stream.
fn probe_audio_stream(prober: &Path, path: &Path) -> Result<(), PipelineError> {
    let output = Command::new(prober)
        .args(["-v", "error", "-select_streams", "a"])
        .args(["-show_entries", "stream=codec_type", "-of", "csv=p=0"])
        .arg(path)
        .stdin(Stdio::null())
        .output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PipelineError::UnsupportedFormat(format!(
            "{}: {}",
            path.display(),
            stderr.trim()
        )));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    if stdout.lines().any(|l| l.trim() == "audio") {
        Ok(())
    } else {
        Err(PipelineError::UnsupportedFormat(format!(
            "{}: no audio stream",
            path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway_in(dir: &Path, toolchain: Toolchain) -> FormatGateway {
        let config = AppConfig {
            temp_dir: Some(dir.to_path_buf()),
            ..AppConfig::default()
        };
        FormatGateway::new(toolchain, &config)
    }

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_missing_source() {
        let scratch = tempfile::tempdir().unwrap();
        let gw = gateway_in(scratch.path(), Toolchain::none());
        let err = gw.ensure_analyzable(Path::new("/no/such/take.wav")).unwrap_err();
        assert!(matches!(err, PipelineError::SourceNotFound(_)));
    }

    #[test]
    fn test_native_wav_needs_no_conversion() {
        let input = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let path = input.path().join("tone.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut w = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..2205 {
            w.write_sample(((i % 50) as i16 - 25) * 100).unwrap();
        }
        w.finalize().unwrap();

        let gw = gateway_in(scratch.path(), Toolchain::none());
        let handle = gw.ensure_analyzable(&path).unwrap();
        assert!(!handle.was_converted());
        assert_eq!(handle.source_format(), "wav");
        assert_eq!(handle.waveform().len(), 2205);
        assert_eq!(entries(scratch.path()), 0);
    }

    #[test]
    fn test_needs_conversion_without_transcoder() {
        let input = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let path = input.path().join("take.ogg");
        std::fs::write(&path, b"not really vorbis").unwrap();

        let gw = gateway_in(scratch.path(), Toolchain::none());
        let err = gw.ensure_analyzable(&path).unwrap_err();
        assert!(matches!(err, PipelineError::ConversionUnavailable(_)));
        assert_eq!(entries(scratch.path()), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_transcoder_leaves_no_temp_file() {
        let input = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let path = input.path().join("take.ogg");
        std::fs::write(&path, b"not really vorbis").unwrap();

        let gw = gateway_in(
            scratch.path(),
            Toolchain::new(Some(PathBuf::from("false")), None),
        );
        let err = gw.ensure_analyzable(&path).unwrap_err();
        assert!(matches!(err, PipelineError::ConversionFailed(_)), "{err:?}");
        assert_eq!(entries(scratch.path()), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_silent_transcoder_is_empty_output() {
        let input = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let path = input.path().join("take.mp3");
        std::fs::write(&path, b"ID3").unwrap();

        let gw = gateway_in(
            scratch.path(),
            Toolchain::new(Some(PathBuf::from("true")), None),
        );
        let err = gw.ensure_analyzable(&path).unwrap_err();
        match err {
            PipelineError::ConversionFailed(msg) => assert!(msg.contains("no output"), "{msg}"),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(entries(scratch.path()), 0);
    }

    #[test]
    fn test_detect_missing_tools() {
        let tools = ToolsConfig {
            ffmpeg: PathBuf::from("/nonexistent/ffmpeg"),
            ffprobe: PathBuf::from("/nonexistent/ffprobe"),
        };
        let toolchain = Toolchain::detect(&tools);
        assert!(toolchain.transcoder().is_none());
        assert!(toolchain.prober().is_none());
    }
}

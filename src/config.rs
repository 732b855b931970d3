use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("audio.sample_rate must be within 8000..=192000 (got {0})")]
    SampleRate(u32),
    #[error("audio.window_size must be at least 256 (got {0})")]
    WindowSize(usize),
    #[error("audio.overlap must be smaller than window_size (got {overlap} for window {window})")]
    Overlap { overlap: usize, window: usize },
    #[error("audio.chunk_seconds must be within 1..=300 (got {0})")]
    ChunkSeconds(u32),
    #[error("audio.channels must be 1 or 2 (got {0})")]
    Channels(u16),
    #[error("pitch band is empty: min_frequency {min} >= max_frequency {max}")]
    PitchBand { min: f32, max: f32 },
    #[error("pools.{0}.threads must be at least 1")]
    PoolThreads(&'static str),
}

/// Application configuration loaded from TOML config file.
/// Every field has a default and the config file is optional.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub tools: ToolsConfig,
    pub pitch: PitchConfig,
    pub tempo: TempoConfig,
    pub melody: MelodyConfig,
    pub pools: PoolsConfig,
    /// Where converted audio is written. Defaults to the system temp dir.
    pub temp_dir: Option<PathBuf>,
    /// Parallel files in batch mode. 0 = auto-detect (cores / 2, min 1).
    pub workers: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Target rate for converted audio.
    pub sample_rate: u32,
    pub window_size: usize,
    pub overlap: usize,
    /// Span of each local tempo sample, in seconds.
    pub chunk_seconds: u32,
    /// Channel count for converted audio.
    pub channels: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            window_size: 2048,
            overlap: 1024,
            chunk_seconds: 30,
            channels: 1,
        }
    }
}

impl AudioConfig {
    pub fn hop_size(&self) -> usize {
        self.window_size.saturating_sub(self.overlap).max(1)
    }
}

/// External transcoder and prober executables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PitchConfig {
    pub min_frequency: f32,
    pub max_frequency: f32,
    pub power_threshold: f32,
    pub clarity_threshold: f32,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            min_frequency: 50.0,
            max_frequency: 2000.0,
            power_threshold: 0.5,
            clarity_threshold: 0.6,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TempoConfig {
    pub frame_size: usize,
    pub hop_size: usize,
    pub rms_threshold: f32,
    /// Minimum gap between detected beats, in seconds.
    pub refractory_secs: f64,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            frame_size: 2048,
            hop_size: 1024,
            rms_threshold: 0.1,
            refractory_secs: 0.3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MelodyConfig {
    pub max_motifs: usize,
    /// Relative frequency tolerance when comparing motifs.
    pub motif_tolerance: f32,
}

impl Default for MelodyConfig {
    fn default() -> Self {
        Self {
            max_motifs: 10,
            motif_tolerance: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PoolConfig {
    pub threads: usize,
    pub queue: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolsConfig {
    pub analysis: PoolConfig,
    pub generation: PoolConfig,
    pub helpers: PoolConfig,
}

impl Default for PoolsConfig {
    fn default() -> Self {
        Self {
            analysis: PoolConfig {
                threads: 4,
                queue: 100,
            },
            generation: PoolConfig {
                threads: 2,
                queue: 50,
            },
            helpers: PoolConfig {
                threads: 2,
                queue: 50,
            },
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/tonescope/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Load config from an explicit path, falling back to defaults on error.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<AppConfig>(&contents) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let audio = &self.audio;
        if !(8000..=192_000).contains(&audio.sample_rate) {
            return Err(ConfigError::SampleRate(audio.sample_rate));
        }
        if audio.window_size < 256 {
            return Err(ConfigError::WindowSize(audio.window_size));
        }
        if audio.overlap >= audio.window_size {
            return Err(ConfigError::Overlap {
                overlap: audio.overlap,
                window: audio.window_size,
            });
        }
        if !(1..=300).contains(&audio.chunk_seconds) {
            return Err(ConfigError::ChunkSeconds(audio.chunk_seconds));
        }
        if !(1..=2).contains(&audio.channels) {
            return Err(ConfigError::Channels(audio.channels));
        }
        if self.pitch.min_frequency >= self.pitch.max_frequency {
            return Err(ConfigError::PitchBand {
                min: self.pitch.min_frequency,
                max: self.pitch.max_frequency,
            });
        }
        for (name, pool) in [
            ("analysis", &self.pools.analysis),
            ("generation", &self.pools.generation),
            ("helpers", &self.pools.helpers),
        ] {
            if pool.threads == 0 {
                return Err(ConfigError::PoolThreads(name));
            }
        }
        Ok(())
    }

    /// Resolve worker count: 0 → auto-detect (cores / 2, min 1).
    pub fn resolve_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2);
            (cores / 2).max(1)
        }
    }

    pub fn resolve_temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.audio.hop_size(), 1024);
        assert_eq!(config.pools.analysis.threads, 4);
        assert_eq!(config.pools.analysis.queue, 100);
        assert_eq!(config.tools.ffmpeg, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            temp_dir = "/scratch"

            [audio]
            sample_rate = 22050

            [tools]
            ffmpeg = "/opt/ffmpeg/bin/ffmpeg"

            [pools.generation]
            threads = 3
            queue = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.audio.sample_rate, 22050);
        assert_eq!(config.audio.window_size, 2048);
        assert_eq!(config.tools.ffprobe, PathBuf::from("ffprobe"));
        assert_eq!(config.pools.generation.queue, 7);
        assert_eq!(config.pools.helpers.threads, 2);
        assert_eq!(config.resolve_temp_dir(), PathBuf::from("/scratch"));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut config = AppConfig::default();
        config.audio.sample_rate = 4000;
        assert_eq!(config.validate(), Err(ConfigError::SampleRate(4000)));

        let mut config = AppConfig::default();
        config.audio.window_size = 128;
        assert_eq!(config.validate(), Err(ConfigError::WindowSize(128)));

        let mut config = AppConfig::default();
        config.audio.overlap = 2048;
        assert!(matches!(config.validate(), Err(ConfigError::Overlap { .. })));

        let mut config = AppConfig::default();
        config.audio.chunk_seconds = 301;
        assert_eq!(config.validate(), Err(ConfigError::ChunkSeconds(301)));

        let mut config = AppConfig::default();
        config.audio.channels = 6;
        assert_eq!(config.validate(), Err(ConfigError::Channels(6)));
    }

    #[test]
    fn test_unreadable_file_falls_back_to_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/tonescope.toml"));
        assert_eq!(config.audio.sample_rate, 44100);
    }
}

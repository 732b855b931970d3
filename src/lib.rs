pub mod analyzer;
pub mod config;
pub mod error;
pub mod gateway;
pub mod generation;
pub mod pool;
pub mod theory;
pub mod waveform;

pub use analyzer::orchestrator::AnalysisOrchestrator;
pub use analyzer::report::AnalysisReport;
pub use error::PipelineError;
pub use waveform::Waveform;

/// Audio file extensions picked up when a directory is analyzed
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    // Native (hound / claxon)
    "wav", "flac",
    // Via the configured transcoder
    "aif", "aiff", "au", "mp3", "ogg", "oga", "opus", "m4a", "aac", "wv", "ape", "wma",
];

/// Application name for XDG paths
pub const APP_NAME: &str = "tonescope";

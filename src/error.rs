use std::path::PathBuf;
use thiserror::Error;

use crate::gateway::decode::DecodeError;

/// Boxed error carried out of a failed analysis stage.
pub type StageError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Conversion unavailable: {} needs transcoding and no transcoder is configured", .0.display())]
    ConversionUnavailable(PathBuf),

    #[error("Conversion failed: {0}")]
    ConversionFailed(String),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Analysis stage '{stage}' failed: {source}")]
    AnalysisFailed {
        stage: &'static str,
        #[source]
        source: StageError,
    },

    #[error("Variation computation failed: {0}")]
    CacheComputationFailed(String),

    #[error("Worker pool '{pool}' is saturated")]
    Saturated { pool: &'static str },

    #[error("Analysis cancelled")]
    Cancelled,

    #[error("Analysis timed out after {0:?}")]
    TimedOut(std::time::Duration),

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn stage(stage: &'static str, source: impl Into<StageError>) -> Self {
        PipelineError::AnalysisFailed {
            stage,
            source: source.into(),
        }
    }
}

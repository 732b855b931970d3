//! Analysis of many files: directory expansion, bounded parallelism and a
//! progress bar.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::task::JoinSet;
use walkdir::WalkDir;

use super::orchestrator::AnalysisOrchestrator;
use super::report::{AnalysisReport, file_name};
use crate::SUPPORTED_EXTENSIONS;
use crate::error::PipelineError;

#[derive(Debug, Default)]
pub struct BatchResult {
    /// In input order.
    pub reports: Vec<AnalysisReport>,
    pub failed: Vec<(PathBuf, String)>,
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub jobs: usize,
    pub timeout: Option<Duration>,
    pub progress: bool,
}

fn is_supported(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    SUPPORTED_EXTENSIONS.contains(&ext.as_str())
}

/// Expand directories recursively into supported audio files. Explicit file
/// arguments are kept as given so unsupported inputs still get reported.
/// `filter` is a case-insensitive substring match on the full path.
pub fn collect_inputs(paths: &[PathBuf], filter: Option<&str>) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && is_supported(e.path()))
                .map(|e| e.into_path())
                .collect();
            found.sort();
            log::debug!("{}: {} audio files", path.display(), found.len());
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }

    match filter {
        Some(pattern) => {
            let pattern = pattern.to_lowercase();
            files
                .into_iter()
                .filter(|p| p.to_string_lossy().to_lowercase().contains(&pattern))
                .collect()
        }
        None => files,
    }
}

/// Analyze `inputs` with at most `jobs` files in flight.
///
/// Files are processed in chunks of `jobs * 2`; a failure is recorded and
/// the batch moves on.
pub async fn analyze_batch(
    orchestrator: Arc<AnalysisOrchestrator>,
    inputs: Vec<PathBuf>,
    options: &BatchOptions,
) -> BatchResult {
    let mut result = BatchResult::default();
    if inputs.is_empty() {
        log::info!("No files to analyze");
        return result;
    }
    let jobs = options.jobs.max(1);
    log::info!("Analyzing {} files with {} workers", inputs.len(), jobs);

    let pb = if options.progress {
        ProgressBar::new(inputs.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }

    let limiter = Arc::new(tokio::sync::Semaphore::new(jobs));
    let chunk_size = jobs * 2;

    for chunk in inputs.chunks(chunk_size) {
        let mut set = JoinSet::new();
        let mut owners = HashMap::new();
        let mut outcomes: Vec<Option<Result<AnalysisReport, String>>> = vec![None; chunk.len()];

        for (i, path) in chunk.iter().enumerate() {
            let orchestrator = Arc::clone(&orchestrator);
            let limiter = Arc::clone(&limiter);
            let path = path.clone();
            let timeout = options.timeout;
            let handle = set.spawn(async move {
                let _slot = limiter.acquire_owned().await.map_err(|_| PipelineError::Cancelled)?;
                match timeout {
                    Some(limit) => orchestrator.analyze_with_timeout(&path, limit).await,
                    None => orchestrator.analyze(&path).await,
                }
            });
            owners.insert(handle.id(), i);
        }

        while let Some(joined) = set.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, Ok(report))) => (id, Ok(report)),
                Ok((id, Err(e))) => (id, Err(e.to_string())),
                Err(e) => (e.id(), Err(format!("task failed: {}", e))),
            };
            if let Some(&i) = owners.get(&id) {
                outcomes[i] = Some(outcome);
            }
            pb.inc(1);
        }

        for (path, outcome) in chunk.iter().zip(outcomes) {
            match outcome {
                Some(Ok(report)) => result.reports.push(report),
                Some(Err(message)) => {
                    log::warn!("{}: {}", file_name(path), message);
                    result.failed.push((path.clone(), message));
                }
                None => {
                    result.failed.push((path.clone(), "no result".to_string()));
                }
            }
        }
        pb.set_message(format!(
            "{} analyzed, {} failed",
            result.reports.len(),
            result.failed.len()
        ));
    }

    pb.finish_with_message(format!(
        "Done: {} analyzed, {} failed",
        result.reports.len(),
        result.failed.len()
    ));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::gateway::Toolchain;

    fn write_silence(path: &Path) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..8000 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_collect_inputs_walks_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("set1");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(nested.join("b.mp3"), b"x").unwrap();
        std::fs::write(dir.path().join("a.wav"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let all = collect_inputs(&[dir.path().to_path_buf()], None);
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|p| is_supported(p)));

        let filtered = collect_inputs(&[dir.path().to_path_buf()], Some("SET1"));
        assert_eq!(filtered, vec![nested.join("b.mp3")]);
    }

    #[test]
    fn test_explicit_files_are_kept() {
        let inputs = collect_inputs(&[PathBuf::from("/nope/readme.txt")], None);
        assert_eq!(inputs, vec![PathBuf::from("/nope/readme.txt")]);
    }

    #[tokio::test]
    async fn test_batch_records_failures_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.wav");
        write_silence(&good);
        let missing = dir.path().join("missing.wav");

        let orch = Arc::new(AnalysisOrchestrator::new(AppConfig::default(), Toolchain::none()).unwrap());
        let options = BatchOptions {
            jobs: 2,
            timeout: None,
            progress: false,
        };
        let result = analyze_batch(orch, vec![missing.clone(), good.clone()], &options).await;
        assert_eq!(result.reports.len(), 1);
        assert_eq!(result.reports[0].path, good);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].0, missing);
    }
}

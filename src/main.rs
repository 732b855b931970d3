use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tonescope::analyzer::batch::{self, BatchOptions};
use tonescope::config::AppConfig;
use tonescope::gateway::Toolchain;
use tonescope::generation::pattern::PatternRequest;
use tonescope::generation::variation::VariationRequest;
use tonescope::theory::{Scale, Tonality};
use tonescope::AnalysisOrchestrator;

#[derive(Parser)]
#[command(name = "tonescope", version, about = "Key, chords, melody, tempo and mood from recorded audio")]
struct Cli {
    /// Config file (defaults to the XDG config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze audio files or directories
    Analyze {
        /// Files or directories (walked recursively)
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Print reports as JSON
        #[arg(long)]
        json: bool,

        /// Only analyze files whose path contains this pattern
        #[arg(long)]
        filter: Option<String>,

        /// Give up on a file after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Number of files analyzed in parallel (0 = auto-detect from config)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,
    },

    /// Generate a variation of a chord progression
    Variation {
        /// Chord symbols, e.g. C G Am F
        #[arg(required = true)]
        chords: Vec<String>,

        /// Scale the progression is in (major or minor)
        #[arg(long, default_value = "major")]
        scale: Scale,

        /// Variation amount, 0.0 to 1.0
        #[arg(long, default_value = "0.5")]
        amount: f64,

        /// Random seed (random if omitted; printed so results can be reproduced)
        #[arg(long)]
        seed: Option<u64>,

        /// Print the variation as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build a modular instrument pattern from chords
    Pattern {
        /// Chord symbols, e.g. C G Am F
        #[arg(required = true)]
        chords: Vec<String>,

        /// Tonality, e.g. "C major" or "F# minor"
        #[arg(long, default_value = "C major")]
        scale: Tonality,

        /// 1 = chords, 2 = plus scale tones, 3 = plus rests
        #[arg(long, default_value = "1")]
        complexity: u8,

        /// Tempo in BPM
        #[arg(long, default_value = "120")]
        tempo: f64,

        /// Instrument voices (repeatable)
        #[arg(long = "instrument", default_value = "Piano")]
        instruments: Vec<String>,

        /// Also print this many stacked harmony voices
        #[arg(long, default_value = "0")]
        harmony: usize,
    },

    /// Show which external tools were detected
    Tools,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };

    if let Commands::Analyze { jobs, .. } = &cli.command {
        if *jobs > 0 {
            config.workers = *jobs;
        }
    }
    config.validate().context("Invalid configuration")?;

    let toolchain = Toolchain::detect(&config.tools);
    let workers = config.resolve_workers();
    let orchestrator = Arc::new(
        AnalysisOrchestrator::new(config, toolchain).context("Failed to start worker pools")?,
    );

    match cli.command {
        Commands::Analyze {
            paths,
            json,
            filter,
            timeout,
            jobs: _,
        } => {
            let inputs = batch::collect_inputs(&paths, filter.as_deref());
            if inputs.is_empty() {
                anyhow::bail!("No audio files found");
            }
            let options = BatchOptions {
                jobs: workers,
                timeout: timeout.map(Duration::from_secs),
                progress: inputs.len() > 1 && !json,
            };
            let result = batch::analyze_batch(Arc::clone(&orchestrator), inputs, &options).await;

            if json {
                let out = serde_json::to_string_pretty(&result.reports)
                    .context("Failed to serialize reports")?;
                println!("{}", out);
            } else {
                for report in &result.reports {
                    println!("{}", report.render());
                }
            }
            for (path, message) in &result.failed {
                eprintln!("{}: {}", path.display(), message);
            }
            if result.reports.is_empty() {
                anyhow::bail!("Analysis failed for every input");
            }
            if !json {
                println!(
                    "Analysis complete: {} analyzed, {} failed",
                    result.reports.len(),
                    result.failed.len()
                );
            }
        }

        Commands::Variation {
            chords,
            scale,
            amount,
            seed,
            json,
        } => {
            let seed = seed.unwrap_or_else(rand::random);
            let request = VariationRequest::new(chords, scale, amount, seed);
            let variation = orchestrator
                .generate_variation(request)
                .await
                .context("Variation failed")?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&variation).context("Failed to serialize variation")?
                );
            } else {
                println!("{}", variation.tokens.join(" "));
                println!("({:?}, {}, seed {})", variation.strategy, variation.scale, variation.seed);
            }
        }

        Commands::Pattern {
            chords,
            scale,
            complexity,
            tempo,
            instruments,
            harmony,
        } => {
            let request = PatternRequest {
                chords,
                tonality: scale,
                complexity,
                tempo,
                instruments,
            };
            let pattern = orchestrator
                .generate_pattern(request)
                .await
                .context("Pattern generation failed")?;
            println!("{}", pattern);
            if harmony > 0 {
                let voices = orchestrator
                    .generate_harmony(scale, harmony)
                    .await
                    .context("Harmony generation failed")?;
                for (i, voice) in voices.iter().enumerate() {
                    println!("  voice {}: {}", i + 1, voice.join(" "));
                }
            }
        }

        Commands::Tools => {
            let toolchain = orchestrator.toolchain();
            let show = |p: Option<&std::path::Path>| {
                p.map(|p| p.display().to_string())
                    .unwrap_or_else(|| "not found".to_string())
            };
            println!("Transcoder: {}", show(toolchain.transcoder()));
            println!("Prober:     {}", show(toolchain.prober()));
            if toolchain.transcoder().is_none() {
                println!("Only WAV and FLAC input can be analyzed.");
            }
        }
    }

    Ok(())
}

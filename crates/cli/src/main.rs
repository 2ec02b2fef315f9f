use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cli::{report, watch};
use providers::noop::NoopProvider;
use providers::ClassificationOracle;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tagger_core::config::{self, AppConfig};
use tagger_core::pipeline::{self, Pipeline, PipelineMode};
use tagger_core::progress::{ProgressState, ProgressTracker};
use tokio::task::JoinHandle;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = PathBuf::from(
        cli.config
            .clone()
            .unwrap_or_else(|| config::DEFAULT_CONFIG_PATH.to_string()),
    );
    if config::ensure_config_file(&config_path)? {
        info!(path = %config_path.display(), "created default config");
    }
    let cfg = config::load(config_path.to_str())
        .with_context(|| format!("load config {}", config_path.display()))?;

    if let Commands::Init = cli.command {
        pipeline::bootstrap(&cfg).await?;
        println!(
            "initialized: config {}, target {}, cache {}",
            config_path.display(),
            cfg.target_folder,
            cfg.cache.dir
        );
        return Ok(());
    }

    let pipeline = open_pipeline(cfg, cli.command.needs_oracle()).await?;

    match cli.command {
        Commands::Init => Ok(()),
        Commands::Run { full, json } => {
            if full {
                pipeline.clear_all().await?;
            }
            run_pipeline(&pipeline, PipelineMode::All, json).await
        }
        Commands::Map { json } => run_pipeline(&pipeline, PipelineMode::Map, json).await,
        Commands::Reduce { json } => run_pipeline(&pipeline, PipelineMode::Reduce, json).await,
        Commands::Clear => {
            pipeline.clear_all().await?;
            println!("caches cleared");
            Ok(())
        }
        Commands::View { json } => {
            let view = pipeline.presentation_view().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print!("{}", report::view_text(&view));
            }
            Ok(())
        }
        Commands::Watch { debounce_ms } => {
            watch::watch_target(&pipeline, Duration::from_millis(debounce_ms)).await
        }
    }
}

#[derive(Parser)]
#[command(name = "tagger")]
#[command(about = "Tag files by content and group them by tag", long_about = None)]
struct Cli {
    /// Path to config file (created with defaults if missing)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the default config, target folder and empty caches
    Init,
    /// Classify changed files, then rebuild the tag index
    Run {
        /// Clear both caches first so every file is classified again
        #[arg(long, default_value_t = false)]
        full: bool,
        /// Output JSON summary
        #[arg(long)]
        json: bool,
    },
    /// Classify changed files only
    Map {
        /// Output JSON summary
        #[arg(long)]
        json: bool,
    },
    /// Rebuild the tag index from cached classifications
    Reduce {
        /// Output JSON summary
        #[arg(long)]
        json: bool,
    },
    /// Empty both caches
    Clear,
    /// Show files grouped by tag
    View {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-run the pipeline whenever the target folder changes
    Watch {
        /// Quiet period after the last change before running
        #[arg(long, default_value_t = 1500)]
        debounce_ms: u64,
    },
}

impl Commands {
    fn needs_oracle(&self) -> bool {
        matches!(
            self,
            Commands::Run { .. } | Commands::Map { .. } | Commands::Watch { .. }
        )
    }
}

/// Commands that never classify run against the noop oracle, so they work
/// without credentials.
async fn open_pipeline(cfg: AppConfig, needs_oracle: bool) -> Result<Pipeline> {
    let oracle: Arc<dyn ClassificationOracle> = if needs_oracle {
        pipeline::build_oracle(&cfg)?
    } else {
        Arc::new(NoopProvider)
    };
    let cache = pipeline::bootstrap(&cfg).await?;
    Ok(Pipeline::new(cfg, cache, oracle))
}

fn spawn_progress_logger(tracker: Arc<ProgressTracker>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(2));
        let mut last = ProgressState::default();
        loop {
            ticker.tick().await;
            let now = tracker.snapshot();
            if now.total > 0 && now != last {
                info!(completed = now.completed, total = now.total, "progress");
                last = now;
            }
        }
    })
}

async fn run_pipeline(pipeline: &Pipeline, mode: PipelineMode, json: bool) -> Result<()> {
    let logger = spawn_progress_logger(pipeline.progress_tracker());
    let result = pipeline.run(mode).await;
    logger.abort();
    let summary = result?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report::summary_json(&summary))?
        );
    } else {
        println!("{}", report::summary_line(&summary));
    }
    Ok(())
}

//! spectra CLI - Uniqueness, quality and cost analysis of generative model outputs.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use spectra::models::EXAMPLE_CONFIG;
use spectra::{
    default_prompts, load_prompts, AnalysisReport, Config, ExportConfig, ExportDocument,
    HttpProvider, Orchestrator,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "spectra")]
#[command(version)]
#[command(about = "Uniqueness, quality and cost analysis of generative model outputs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "spectra.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample every prompt at every temperature and write the analysis
    Run {
        /// Path to input prompts JSONL file (built-in prompt set when omitted)
        #[arg(short, long)]
        prompts: Option<PathBuf>,

        /// Path to output JSON file (overrides [output] path)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Validate configuration file
    Validate,

    /// Show example configuration
    Example,
}

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")
}

fn load_config(path: &PathBuf) -> Result<Config> {
    let config =
        Config::from_file(path).with_context(|| format!("Failed to load config from {path:?}"))?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Example => {
            println!("{EXAMPLE_CONFIG}");
        }

        Commands::Validate => {
            let config = load_config(&cli.config)?;

            // Keys are only needed for the models a run will call
            for model_id in config.active_models() {
                if let Some(route) = config.route(&model_id) {
                    Config::resolve_api_key(route)
                        .with_context(|| format!("Failed to resolve API key for {model_id}"))?;
                }
            }

            info!("Configuration is valid");
            info!(
                "  Models: {} ({} active)",
                config.models.len(),
                config.active_models().len()
            );
            info!("  Temperatures: {:?}", config.analysis.temperatures);
            info!(
                "  Samples per prompt: {}",
                config.analysis.samples_per_prompt
            );
            info!("  Embedding backend: {:?}", config.embedding.backend);
        }

        Commands::Run {
            prompts,
            output,
            no_progress,
        } => {
            let config = load_config(&cli.config)?;
            let output_path = output.unwrap_or_else(|| config.output.path.clone());

            let prompts = match prompts {
                Some(path) => load_prompts(&path)
                    .with_context(|| format!("Failed to load prompts from {path:?}"))?,
                None => default_prompts(),
            };

            let provider = Arc::new(
                HttpProvider::from_config(&config).context("Failed to build HTTP provider")?,
            );

            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, cancelling run");
                    ctrl_c.cancel();
                }
            });

            let orchestrator = Orchestrator::from_config(&config, provider)
                .context("Failed to build orchestrator")?
                .with_cancellation(cancel)
                .with_progress(!no_progress);

            let cells = orchestrator.run(&prompts).await?;
            let report = AnalysisReport::from_cells(cells);

            println!("\n{}", report.render_summary());

            let cache = orchestrator.embedding_cache().stats();
            println!("--- Embedding cache ---");
            println!("Entries:     {}", cache.size);
            println!("Hit rate:    {:.1}%", cache.hit_rate * 100.0);

            println!("\n--- Gateway ---");
            for (model, stats) in orchestrator.gateway_stats().snapshot() {
                println!(
                    "{model:<16} requests: {:>4}  errors: {:>4}",
                    stats.requests, stats.errors
                );
            }

            let settings = orchestrator.settings();
            let export = ExportDocument::new(
                report,
                ExportConfig {
                    models: config.active_models(),
                    cost_per_1k: config.rates.clone(),
                    temperatures: settings.temperatures.clone(),
                    samples_per_prompt: settings.samples_per_prompt,
                },
                settings.include_failure_analysis,
            );
            export
                .write_to(&output_path, config.output.pretty)
                .with_context(|| format!("Failed to write export to {output_path:?}"))?;

            println!("\nOutput:      {output_path:?}");
        }
    }

    Ok(())
}

use anyhow::{Context, Result};
use cardscan_cv::{CardDetectionService, ServiceConfig, SourceFile};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

mod report;
mod synth;

#[derive(Parser)]
#[command(name = "cardscan")]
#[command(about = "Find trading cards in photographs and cut them out")]
#[command(version)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect and extract cards from one or more images.
    Detect {
        /// Input images (JPEG, PNG, WebP).
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Directory for report.json and the extracted card JPEGs.
        #[arg(long, default_value = "cardscan-out")]
        out: PathBuf,

        /// Service configuration (JSON); missing keys use defaults.
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Render a synthetic photo of cards on a table.
    Synth {
        /// Output image path; the format follows the extension.
        #[arg(long)]
        out: PathBuf,

        /// Number of cards to place.
        #[arg(long, default_value = "3")]
        cards: usize,

        /// Seed for layout and noise.
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Detect {
            images,
            out,
            config,
        } => run_detect(&images, &out, config).await,
        Commands::Synth { out, cards, seed } => run_synth(&out, cards, seed),
    }
}

async fn run_detect(images: &[PathBuf], out: &Path, config: Option<PathBuf>) -> Result<()> {
    let config = match config {
        Some(path) => ServiceConfig::from_json_file(&path)?,
        None => ServiceConfig::default(),
    };
    let service = CardDetectionService::new(config)?;

    let files = images
        .iter()
        .map(SourceFile::from_path)
        .collect::<Result<Vec<_>>>()?;

    let results = service.process_batch(files).await;
    let status = match results.first() {
        Some(first) => service.get_processing_status(first.session_id),
        None => None,
    };

    let report = report::write_report(out, &results, status)?;
    for image in &report.images {
        println!(
            "{}: {} card(s) in {}ms{}",
            image.original,
            image.cards.len(),
            image.processing_time_ms,
            if image.used_fallback { " (fallback)" } else { "" }
        );
        for card in &image.cards {
            println!(
                "  {:<24} conf {:.3}  {}x{} at ({}, {})  {}",
                card.file.as_deref().unwrap_or("<failed>"),
                card.confidence,
                card.bounds.width,
                card.bounds.height,
                card.bounds.x,
                card.bounds.y,
                card.strategy
            );
        }
    }
    info!(out = %out.display(), cards = report.total_cards(), "wrote report");
    Ok(())
}

fn run_synth(out: &Path, cards: usize, seed: u64) -> Result<()> {
    let scene = synth::SceneBuilder::new(1200, 1600, seed).with_cards(cards).build();
    scene
        .image
        .save(out)
        .with_context(|| format!("failed to write {}", out.display()))?;

    for region in &scene.cards {
        println!(
            "card {}x{} at ({}, {})",
            region.width, region.height, region.x, region.y
        );
    }
    info!(out = %out.display(), cards = scene.cards.len(), "wrote synthetic scene");
    Ok(())
}

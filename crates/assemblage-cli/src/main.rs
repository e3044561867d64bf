//! Assemblage - run group and assembly operators on scene documents
//!
//! Loads a JSON scene document, runs one operator against it and writes the
//! result back, reporting what the operator reported.

mod commands;
mod config;

use anyhow::Result;
use assemblage_core::{load_preferences, Document};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use commands::Command;

#[derive(Parser, Debug)]
#[command(name = "assemblage")]
#[command(about = "Group and assembly tools for scene documents")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "assemblage.toml")]
    config: PathBuf,

    /// Scene document to operate on
    #[arg(short, long, default_value = "scene.json")]
    document: PathBuf,

    /// Standalone preferences file, replaces the config's [preferences]
    #[arg(short, long)]
    preferences: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error), overrides the config
    #[arg(short, long)]
    log_level: Option<String>,

    /// Run without writing the document back
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

fn init_logging(level: &str) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // read before the subscriber exists, the config may name the level
    let mut config = config::load_config(&args.config)?;
    if let Some(path) = &args.preferences {
        config.preferences = load_preferences(path)?;
    }
    init_logging(args.log_level.as_deref().unwrap_or(&config.logging.level))?;

    info!("Assemblage v{}", env!("CARGO_PKG_VERSION"));

    if let Command::Init { force } = args.command {
        return init(&args.config, &args.document, force);
    }

    let mut doc = Document::load_or_create(&args.document)?;
    let inspect = matches!(args.command, Command::Inspect);
    commands::execute(args.command, &mut doc, &config.preferences)?;

    if inspect || args.dry_run {
        return Ok(());
    }
    doc.save(&args.document)?;
    info!(path = %args.document.display(), objects = doc.objects.len(), "Saved document");
    Ok(())
}

fn init(config_path: &Path, document: &Path, force: bool) -> Result<()> {
    if force || !config_path.exists() {
        config::save_default_config(config_path)?;
        info!(path = %config_path.display(), "Wrote default configuration");
    }
    if force || !document.exists() {
        Document::new().save(document)?;
        info!(path = %document.display(), "Created empty document");
    }
    Ok(())
}

//! `reel`: drive a press-reel timeline from the terminal.

mod commands;
mod shell;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use reel_core::{EditorConfig, FileStore, ResourceBackend, Session, TrackKind, VirtualBackend};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "reel")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Edit and play a multi-track audio timeline")]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, env = "REEL_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the saved timeline
    #[arg(long, env = "REEL_STORAGE")]
    storage: Option<PathBuf>,

    /// Base directory for relative media references
    #[arg(long, env = "REEL_MEDIA_ROOT")]
    media_root: Option<PathBuf>,

    /// Play through the audio device (needs the `device` feature)
    #[arg(long)]
    device: bool,

    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List tracks and blocks
    Show,

    /// Play from a position for a while
    Play {
        #[arg(long, default_value_t = 0.0)]
        from: f64,

        /// Seconds of wall-clock time to play; until the end if omitted
        #[arg(long = "for")]
        duration: Option<f64>,
    },

    /// Split a block at a timeline position
    Split {
        block: String,
        #[arg(long)]
        at: f64,
    },

    /// Merge a block with the blocks touching it on its track
    Merge { block: String },

    Delete { block: String },

    /// Set a block's start time
    Move {
        block: String,
        #[arg(long)]
        start: f64,
    },

    /// Set a block's duration
    Resize {
        block: String,
        #[arg(long)]
        duration: f64,
    },

    /// Place an uploaded file on a track at a position
    Import {
        reference: String,
        #[arg(long, default_value = "effects")]
        track: TrackKind,
        #[arg(long, default_value_t = 0.0)]
        at: f64,
    },

    /// Append generated dialogue after the last dialogue block
    Generated {
        reference: String,
        #[arg(long)]
        hint: Option<f64>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        language: Option<String>,
    },

    /// Replace the saved timeline with the example blocks
    Reset,

    /// Interactive session (default)
    Shell,
}

fn load_config(cli: &Cli) -> EditorConfig {
    let mut config = match &cli.config {
        Some(path) => EditorConfig::load_from(path),
        None => EditorConfig::load(),
    };
    if let Some(storage) = &cli.storage {
        config.storage_dir = Some(storage.clone());
    }
    if let Some(root) = &cli.media_root {
        config.media_root = Some(root.clone());
    }
    config
}

fn backend(config: &EditorConfig, device: bool) -> Result<Box<dyn ResourceBackend>> {
    if device {
        return device_backend(config);
    }
    let mut backend = VirtualBackend::new();
    if let Some(root) = &config.media_root {
        backend = backend.with_media_root(root.clone());
    }
    Ok(Box::new(backend))
}

#[cfg(feature = "device")]
fn device_backend(config: &EditorConfig) -> Result<Box<dyn ResourceBackend>> {
    Ok(Box::new(reel_core::DeviceBackend::open(config.media_root.clone())?))
}

#[cfg(not(feature = "device"))]
fn device_backend(_config: &EditorConfig) -> Result<Box<dyn ResourceBackend>> {
    anyhow::bail!("reel was built without the `device` feature")
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("reel_core={log_level},reel_engine={log_level},warn").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let config = load_config(&cli);
    let store = FileStore::new(config.storage_dir());
    let mut session = Session::new(&config, backend(&config, cli.device)?, store);
    commands::print_notices(&mut session);

    if let Some(reason) = session.seeded_from() {
        tracing::info!("starting from the example timeline ({reason:?})");
    }

    match cli.command.unwrap_or(Commands::Shell) {
        Commands::Show => commands::show(&session),
        Commands::Play { from, duration } => commands::play(&mut session, from, duration).await,
        Commands::Split { block, at } => commands::split(&mut session, &block, at),
        Commands::Merge { block } => commands::merge(&mut session, &block),
        Commands::Delete { block } => commands::delete(&mut session, &block),
        Commands::Move { block, start } => commands::move_block(&mut session, &block, start),
        Commands::Resize { block, duration } => commands::resize(&mut session, &block, duration),
        Commands::Import { reference, track, at } => {
            commands::import_upload(&mut session, &reference, track, at).await
        }
        Commands::Generated {
            reference,
            hint,
            title,
            language,
        } => commands::import_generated(&mut session, reference, hint, title, language).await,
        Commands::Reset => {
            session.reset_to_seed();
            commands::show(&session)
        }
        Commands::Shell => shell::run(&mut session).await,
    }
}

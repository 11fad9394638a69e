//! vp9ify
//!
//! Converts a video file to VP9/Opus in a Matroska container using two
//! ffmpeg passes, with live progress reporting and a safe default output
//! location.
//!
//! # Usage
//!
//! ```bash
//! vp9ify convert movie.avi
//! vp9ify convert --crop movie.avi /mnt/library/vp9
//! vp9ify inspect --json movie.avi
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use vp9ify::cli::args::{ConvertArgs, InspectArgs};
use vp9ify::cli::{Cli, Commands};
use vp9ify::config::Config;
use vp9ify::duration::format_duration;
use vp9ify::engine::PassRunner;
use vp9ify::probe::validator::validate_for_encode;
use vp9ify::{output, probe, progress, streams};

/// Main entry point for the vp9ify CLI application
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Parse command line arguments
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    if cli.show_cmd {
        config.show_commands = true;
    }

    // Execute the requested command
    match cli.command {
        Commands::Convert(args) => execute_convert_command(&config, args).await,
        Commands::Inspect(args) => execute_inspect_command(&config, args).await,
    }
}

/// Probe the source and print its stream table (or JSON descriptor)
async fn execute_inspect_command(config: &Config, args: InspectArgs) -> Result<()> {
    let file = probe::probe(config, &args.source)
        .await
        .context("probing source file")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&file)?);
    } else {
        print!("{}", streams::render_table(&file.streams));
        println!("Duration: {}", format_duration(file.length));
    }
    Ok(())
}

/// Run the full conversion: probe, validate, select a destination, then
/// the two encoding passes (optionally preceded by crop detection)
async fn execute_convert_command(config: &Config, args: ConvertArgs) -> Result<()> {
    let file = probe::probe(config, &args.source)
        .await
        .context("probing source file")?;

    print!("{}", streams::render_table(&file.streams));
    println!("Duration: {}", format_duration(file.length));
    validate_for_encode(&file)?;

    let dest_dir = args.dest_dir.as_deref().or(config.dest_dir.as_deref());
    let destination = output::select_destination(dest_dir, &args.source)?;
    println!("Saving to {}", destination.display());

    // A ctrl-c cancels the active subprocess through the shared token.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping encode");
                cancel.cancel();
            }
        });
    }

    let mut runner = PassRunner::new(config, &file, cancel.clone())?;
    if let Some(path) = args.pass_log {
        runner.set_passlog(path);
    }

    if args.crop {
        let events = runner.detect_crop()?;
        match progress::collect_crop(events).await? {
            Some(rect) => {
                println!("Crop detected: {}", rect);
                runner.set_crop(Some(rect));
            }
            None => println!("No crop detected"),
        }
    }

    let events = runner.pass1()?;
    progress::print_progress("Pass 1", events)
        .await
        .context("pass 1 failed")?;

    let events = runner.pass2(&destination)?;
    progress::print_progress("Pass 2", events)
        .await
        .context("pass 2 failed")?;

    info!("Conversion complete: {}", destination.display());
    Ok(())
}

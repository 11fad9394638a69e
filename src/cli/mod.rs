//! CLI module for vp9ify
//!
//! This module handles command-line argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod args;

/// vp9ify
///
/// Converts a video file to VP9/Opus in a Matroska container using two
/// ffmpeg passes, with live progress reporting.
#[derive(Parser)]
#[command(name = "vp9ify")]
#[command(about = "Two-pass VP9/Opus conversion driven by ffmpeg")]
#[command(version)]
pub struct Cli {
    /// Configuration file (default: vp9ify.toml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print each external command line before running it
    #[arg(long, global = true)]
    pub show_cmd: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Convert a video file to VP9/Opus in two passes
    Convert(args::ConvertArgs),
    /// Inspect a video file's streams
    Inspect(args::InspectArgs),
}

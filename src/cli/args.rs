//! Command-line argument definitions

use std::path::PathBuf;

use clap::Args;

/// Arguments for the convert command
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Source video file
    pub source: PathBuf,

    /// Destination directory (default: "vp9" beside the source)
    pub dest_dir: Option<PathBuf>,

    /// Detect black bars and crop them away
    #[arg(long)]
    pub crop: bool,

    /// Pass-log file prefix (default: derived from the source path)
    #[arg(long)]
    pub pass_log: Option<PathBuf>,
}

/// Arguments for the inspect command
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Source video file
    pub source: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

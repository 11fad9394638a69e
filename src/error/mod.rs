//! Error handling module for vp9ify

use std::process::ExitStatus;
use thiserror::Error;

/// Main error type for vp9ify operations
#[derive(Error, Debug)]
pub enum Vp9ifyError {
    /// Input file not found or inaccessible
    #[error("Input file not found: {path}")]
    InputFileNotFound { path: String },

    /// Input has no video stream to encode
    #[error("No video stream in {path}")]
    NoVideoStream { path: String },

    /// Encoding parameters are derived from a single video stream
    #[error("Multiple video streams in {path}")]
    MultipleVideoStreams { path: String },

    /// Input is already VP9 encoded
    #[error("Input video is already VP9 ({codec})")]
    AlreadyVp9 { codec: String },

    /// No encode parameter set exists for the source resolution
    #[error("Unsupported resolution: {resolution}")]
    UnsupportedResolution { resolution: String },

    /// Destination directory does not exist
    #[error("Destination directory does not exist: {path}")]
    DestinationDirMissing { path: String },

    /// Destination file already exists
    #[error("Destination already exists: {path}")]
    DestinationExists { path: String },

    /// Configuration file could not be read or parsed
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Media probe error
    #[error("Failed to probe media file: {message}")]
    ProbeError { message: String },

    /// External tool could not be started
    #[error("Failed to launch {tool}: {message}")]
    ToolLaunch { tool: String, message: String },

    /// External tool exited unsuccessfully
    #[error("{tool} failed with {status}")]
    ToolExit { tool: String, status: ExitStatus },

    /// Reading a tool's diagnostic stream failed mid-run
    #[error("Failed to read tool output: {0}")]
    StreamRead(std::io::Error),

    /// Run was cancelled by the user
    #[error("Operation cancelled")]
    Cancelled,

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias for vp9ify operations
pub type Vp9ifyResult<T> = std::result::Result<T, Vp9ifyError>;

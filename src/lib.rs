//! vp9ify library
//!
//! Two-pass VP9/Opus conversion driven by the external ffmpeg tools, with
//! incremental progress scanning of their diagnostic output.

pub mod cli;
pub mod config;
pub mod duration;
pub mod engine;
pub mod error;
pub mod output;
pub mod probe;
pub mod progress;
pub mod streams;

// Re-export commonly used types
pub use config::Config;
pub use engine::PassRunner;
pub use error::{Vp9ifyError, Vp9ifyResult};
pub use probe::FileDescriptor;
pub use progress::ProgressEvent;
pub use streams::{Resolution, StreamDescriptor, StreamKind};

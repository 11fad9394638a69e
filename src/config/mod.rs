//! Tool configuration
//!
//! An optional TOML file supplies the external tool paths and a default
//! destination directory. Precedence: CLI flags > config file > built-in
//! defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Vp9ifyError, Vp9ifyResult};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "vp9ify.toml";

/// Tool configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Path or bare name (resolved via PATH) of the ffmpeg binary
    pub ffmpeg_path: PathBuf,
    /// Path or bare name (resolved via PATH) of the ffprobe binary
    pub ffprobe_path: PathBuf,
    /// Default destination directory; `vp9` beside the source when unset
    pub dest_dir: Option<PathBuf>,
    /// Print each external command line before running it
    pub show_commands: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            dest_dir: None,
            show_commands: false,
        }
    }
}

impl Config {
    /// Load configuration from an explicit file, from [`DEFAULT_CONFIG_FILE`]
    /// if present, or fall back to the built-in defaults.
    pub fn load(path: Option<&Path>) -> Vp9ifyResult<Config> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    debug!("No config file, using defaults");
                    Ok(Config::default())
                }
            }
        }
    }

    fn from_file(path: &Path) -> Vp9ifyResult<Config> {
        debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| Vp9ifyError::ConfigError {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        toml::from_str(&content).map_err(|e| Vp9ifyError::ConfigError {
            message: format!("failed to parse {}: {}", path.display(), e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(config.ffprobe_path, PathBuf::from("ffprobe"));
        assert!(config.dest_dir.is_none());
        assert!(!config.show_commands);
    }

    #[test]
    fn test_parse_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vp9ify.toml");
        std::fs::write(
            &path,
            "ffmpeg_path = \"/opt/ffmpeg/bin/ffmpeg\"\nshow_commands = true\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.ffmpeg_path, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        // Unset keys keep their defaults.
        assert_eq!(config.ffprobe_path, PathBuf::from("ffprobe"));
        assert!(config.show_commands);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vp9ify.toml");
        std::fs::write(&path, "ffmpg_path = \"typo\"\n").unwrap();

        let result = Config::load(Some(&path));
        assert!(matches!(result, Err(Vp9ifyError::ConfigError { .. })));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = Config::load(Some(Path::new("/nonexistent/vp9ify.toml")));
        assert!(matches!(result, Err(Vp9ifyError::ConfigError { .. })));
    }
}

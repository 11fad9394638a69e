//! Two-pass encoding engine module

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use crate::error::{Vp9ifyError, Vp9ifyResult};
use crate::streams::Resolution;

pub mod runner;
pub mod scanner;

pub use runner::PassRunner;

/// Identity of an encoding pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassNumber {
    First,
    Second,
}

impl PassNumber {
    /// Value for the encoder's `-pass` argument.
    pub fn as_arg(self) -> &'static str {
        match self {
            PassNumber::First => "1",
            PassNumber::Second => "2",
        }
    }
}

/// VP9 encoding parameters for one supported source resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeParams {
    pub target_bitrate: &'static str,
    pub crf: &'static str,
    pub min_bitrate: &'static str,
    pub max_bitrate: &'static str,
    pub tile_columns: &'static str,
    pub threads: &'static str,
    pub speed: &'static str,
}

/// Look up the encode parameter set for a source resolution.
///
/// Constants follow the Google VOD recommendations for 1080p; the PAL and
/// NTSC SD entries are interpolated from the listed 480p row. Any other
/// resolution is a configuration error, reported before a subprocess ever
/// starts.
pub fn encode_params_for(resolution: Resolution) -> Vp9ifyResult<EncodeParams> {
    match (resolution.width, resolution.height) {
        (1920, 1080) => Ok(EncodeParams {
            target_bitrate: "2000k",
            crf: "31",
            min_bitrate: "1000k",
            max_bitrate: "3000k",
            tile_columns: "2",
            threads: "8",
            speed: "2",
        }),
        (720, 576) => Ok(EncodeParams {
            target_bitrate: "1000k",
            crf: "33",
            min_bitrate: "400k",
            max_bitrate: "1200k",
            tile_columns: "1",
            threads: "4",
            speed: "2",
        }),
        (720, 480) => Ok(EncodeParams {
            target_bitrate: "750k",
            crf: "33",
            min_bitrate: "375k",
            max_bitrate: "1088k",
            tile_columns: "1",
            threads: "4",
            speed: "1",
        }),
        _ => Err(Vp9ifyError::UnsupportedResolution {
            resolution: resolution.to_string(),
        }),
    }
}

/// Pass-log prefix for a source file. Stable across runs for the same
/// source path, so a re-invocation after a failed pass 2 finds the pass 1
/// statistics again.
pub fn passlog_path(source: &Path) -> PathBuf {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    std::env::temp_dir().join(format!("vp9ify-passlog-{:016x}", hasher.finish()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_resolutions() {
        let full_hd = encode_params_for(Resolution { width: 1920, height: 1080 }).unwrap();
        assert_eq!(full_hd.target_bitrate, "2000k");
        assert_eq!(full_hd.threads, "8");

        let pal = encode_params_for(Resolution { width: 720, height: 576 }).unwrap();
        assert_eq!(pal.target_bitrate, "1000k");
        assert_eq!(pal.speed, "2");

        let ntsc = encode_params_for(Resolution { width: 720, height: 480 }).unwrap();
        assert_eq!(ntsc.max_bitrate, "1088k");
        assert_eq!(ntsc.speed, "1");
    }

    #[test]
    fn test_unsupported_resolution() {
        let result = encode_params_for(Resolution { width: 1280, height: 720 });
        assert!(matches!(
            result,
            Err(Vp9ifyError::UnsupportedResolution { .. })
        ));
    }

    #[test]
    fn test_passlog_path_is_stable() {
        let a = passlog_path(Path::new("/media/movie.avi"));
        let b = passlog_path(Path::new("/media/movie.avi"));
        let c = passlog_path(Path::new("/media/other.avi"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}

//! Destination selection for converted files

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Vp9ifyError, Vp9ifyResult};

/// Directory created beside the source when no destination is given.
const DEFAULT_DEST_SUBDIR: &str = "vp9";

/// Pick the output path for a source file: the source filename with its
/// extension forced to `.mkv`, inside `dest_dir` (or a `vp9` directory
/// beside the source). The destination directory must exist, and the
/// destination file must not.
pub fn select_destination(dest_dir: Option<&Path>, source: &Path) -> Vp9ifyResult<PathBuf> {
    let filename = source
        .file_name()
        .ok_or_else(|| Vp9ifyError::InputFileNotFound {
            path: source.display().to_string(),
        })?;
    let dest_dir = match dest_dir {
        Some(dir) => dir.to_path_buf(),
        None => {
            let source_dir = source.parent().unwrap_or_else(|| Path::new("."));
            source_dir.join(DEFAULT_DEST_SUBDIR)
        }
    };
    if !dest_dir.is_dir() {
        return Err(Vp9ifyError::DestinationDirMissing {
            path: dest_dir.display().to_string(),
        });
    }

    let destination = dest_dir.join(Path::new(filename).with_extension("mkv"));
    if destination.exists() {
        return Err(Vp9ifyError::DestinationExists {
            path: destination.display().to_string(),
        });
    }
    debug!("Selected destination: {}", destination.display());
    Ok(destination)
}

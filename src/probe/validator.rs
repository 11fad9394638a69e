//! Encode precondition checks

use crate::error::{Vp9ifyError, Vp9ifyResult};
use crate::probe::FileDescriptor;

/// Validate that a probed file can be converted: exactly one video stream,
/// and not already VP9. Runs before any encoder subprocess starts.
pub fn validate_for_encode(file: &FileDescriptor) -> Vp9ifyResult<()> {
    let video = file.video_stream()?;
    // Codec tokens look like "vp9" or "vp9 (Profile 0)".
    if video.codec.split_whitespace().next() == Some("vp9") {
        return Err(Vp9ifyError::AlreadyVp9 {
            codec: video.codec.clone(),
        });
    }
    Ok(())
}

//! Stream descriptors and the tabular stream listing

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ditto mark for values repeated from the previous table row.
const DITTO: &str = "-\"-";

/// Kind of media stream as reported by the probe tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    /// Anything else the probe reports (Data, Attachment, ...)
    Other(String),
}

impl StreamKind {
    /// Map the probe tool's stream-type keyword onto a kind.
    pub fn parse(keyword: &str) -> Self {
        match keyword {
            "Video" => StreamKind::Video,
            "Audio" => StreamKind::Audio,
            "Subtitle" => StreamKind::Subtitle,
            other => StreamKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Video => write!(f, "Video"),
            StreamKind::Audio => write!(f, "Audio"),
            StreamKind::Subtitle => write!(f, "Subtitle"),
            StreamKind::Other(keyword) => write!(f, "{}", keyword),
        }
    }
}

/// Video frame size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One media stream's metadata, immutable once probed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Stream identifier, stable per source file
    pub id: String,
    /// Stream kind
    pub kind: StreamKind,
    /// Three-letter language tag
    pub lang: String,
    /// Codec name (first token of the probe trailer)
    pub codec: String,
    /// Frame size; video streams only
    pub resolution: Option<Resolution>,
    /// Channel layout; audio streams only
    pub channels: Option<String>,
    /// Leftover codec parameters in encounter order
    pub params: Vec<String>,
    /// Stream carried the probe tool's `(default)` marker
    pub is_default: bool,
}

impl StreamDescriptor {
    /// Whether the stream is excluded from the output mapping.
    pub fn should_skip(&self) -> bool {
        matches!(self.kind, StreamKind::Other(_))
    }

    /// The most descriptive single value for the table: resolution for
    /// video, channel layout for audio, empty otherwise.
    fn primary_info(&self) -> String {
        match (self.resolution, &self.channels) {
            (Some(resolution), _) => resolution.to_string(),
            (None, Some(channels)) => channels.clone(),
            (None, None) => String::new(),
        }
    }
}

/// Render the probed streams as an aligned table. Within a run of rows of
/// the same kind, values repeated from the previous row collapse to a
/// ditto mark.
pub fn render_table(streams: &[StreamDescriptor]) -> String {
    let mut out = String::new();
    let mut last: Option<&StreamDescriptor> = None;
    for stream in streams {
        let mut kind = stream.kind.to_string();
        let mut lang = stream.lang.clone();
        let mut codec = stream.codec.clone();
        let mut primary = stream.primary_info();
        let mut params = stream.params.join(" / ");
        if let Some(prev) = last {
            if prev.kind == stream.kind {
                kind = DITTO.to_string();
                if prev.lang == stream.lang {
                    lang = DITTO.to_string();
                }
                if prev.codec == stream.codec {
                    codec = DITTO.to_string();
                }
                if prev.primary_info() == stream.primary_info() {
                    primary = DITTO.to_string();
                }
                if !params.is_empty() && prev.params == stream.params {
                    params = DITTO.to_string();
                }
            }
        }
        out.push_str(&format!(
            "{:>5}  {:<10}  {:<10}  {:<20} {:>3}  {}\n",
            stream.id, kind, primary, codec, lang, params
        ));
        last = Some(stream);
    }
    out
}

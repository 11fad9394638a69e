//! Media file inspection module
//!
//! Runs the external probe tool once and scans its line-oriented diagnostic
//! output with fixed patterns. Unlike the encoder's progress stream, probe
//! output is always newline-framed, so a plain line reader is sufficient
//! here.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::Config;
use crate::duration::parse_timestamp;
use crate::error::{Vp9ifyError, Vp9ifyResult};
use crate::streams::{Resolution, StreamDescriptor, StreamKind};

pub mod validator;

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^  Duration: (\d\d:\d\d:\d\d\.\d\d), start: ").expect("invalid duration regex")
});
static STREAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ *Stream #\d+:(\d+)\((\w{3})\): (\S+): (.*)$").expect("invalid stream regex")
});
static RESOLUTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)x(\d+)(?: \[.*\])?$").expect("invalid resolution regex")
});
static CHANNELS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:stereo|5\.1(?:\(side\))?)$").expect("invalid channels regex")
});

/// The probed file: source path, total duration, and streams in the probe
/// tool's reporting order. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Source path as given on the command line
    pub path: PathBuf,
    /// Total duration; zero when the tool reported none ("unknown")
    pub length: Duration,
    /// Streams in reporting order
    pub streams: Vec<StreamDescriptor>,
}

impl FileDescriptor {
    /// The single video stream that encoding parameters derive from.
    pub fn video_stream(&self) -> Vp9ifyResult<&StreamDescriptor> {
        let mut found = None;
        for stream in &self.streams {
            if stream.kind == StreamKind::Video {
                if found.is_some() {
                    return Err(Vp9ifyError::MultipleVideoStreams {
                        path: self.path.display().to_string(),
                    });
                }
                found = Some(stream);
            }
        }
        found.ok_or_else(|| Vp9ifyError::NoVideoStream {
            path: self.path.display().to_string(),
        })
    }

    /// Resolution of the video stream.
    pub fn resolution(&self) -> Vp9ifyResult<Resolution> {
        self.video_stream()?
            .resolution
            .ok_or_else(|| Vp9ifyError::UnsupportedResolution {
                resolution: "unknown".to_string(),
            })
    }
}

/// Probe a media file, building its descriptor from the probe tool's
/// diagnostic output.
pub async fn probe(config: &Config, path: &Path) -> Vp9ifyResult<FileDescriptor> {
    if !path.exists() {
        return Err(Vp9ifyError::InputFileNotFound {
            path: path.display().to_string(),
        });
    }

    info!("Probing media file: {}", path.display());
    let tool = config.ffprobe_path.display().to_string();
    let mut child = Command::new(&config.ffprobe_path)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Vp9ifyError::ToolLaunch {
            tool: tool.clone(),
            message: e.to_string(),
        })?;
    let stderr = child.stderr.take().ok_or_else(|| Vp9ifyError::ProbeError {
        message: "failed to capture probe output".to_string(),
    })?;

    let mut descriptor = FileDescriptor {
        path: path.to_path_buf(),
        length: Duration::ZERO,
        streams: Vec::new(),
    };
    let mut lines = BufReader::new(stderr).lines();
    while let Some(line) = lines.next_line().await.map_err(Vp9ifyError::StreamRead)? {
        scan_line(&mut descriptor, &line);
    }

    let status = child.wait().await?;
    if !status.success() {
        return Err(Vp9ifyError::ToolExit { tool, status });
    }

    debug!(
        streams = descriptor.streams.len(),
        "Probe complete: {}", path.display()
    );
    Ok(descriptor)
}

/// Apply one diagnostic line to the descriptor under construction. Lines
/// matching neither pattern are ignored; only the first duration line
/// counts.
fn scan_line(descriptor: &mut FileDescriptor, line: &str) {
    if descriptor.length.is_zero() {
        if let Some(caps) = DURATION_RE.captures(line) {
            descriptor.length = parse_timestamp(&caps[1]);
            return;
        }
    }
    if let Some(caps) = STREAM_RE.captures(line) {
        descriptor.streams.push(parse_stream(
            &caps[1],
            &caps[2],
            &caps[3],
            &caps[4],
        ));
    }
}

/// Build a stream descriptor from the matched pieces of a stream line.
fn parse_stream(id: &str, lang: &str, kind: &str, trailer: &str) -> StreamDescriptor {
    let (trailer, is_default) = match trailer.strip_suffix(" (default)") {
        Some(stripped) => (stripped, true),
        None => (trailer, false),
    };

    let mut tokens = trailer.split(", ");
    let codec = tokens.next().unwrap_or("").to_string();
    let mut stream = StreamDescriptor {
        id: id.to_string(),
        kind: StreamKind::parse(kind),
        lang: lang.to_string(),
        codec,
        resolution: None,
        channels: None,
        params: Vec::new(),
        is_default,
    };

    for token in tokens {
        if stream.kind == StreamKind::Video {
            if let Some(resolution) = parse_resolution(token) {
                stream.resolution = Some(resolution);
                continue;
            }
        }
        if stream.kind == StreamKind::Audio && CHANNELS_RE.is_match(token) {
            stream.channels = Some(token.to_string());
            continue;
        }
        stream.params.push(token.to_string());
    }
    stream
}

fn parse_resolution(token: &str) -> Option<Resolution> {
    let caps = RESOLUTION_RE.captures(token)?;
    let width: u32 = caps[1].parse().ok()?;
    let height: u32 = caps[2].parse().ok()?;
    if width == 0 || height == 0 {
        return None;
    }
    Some(Resolution { width, height })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_fixture(lines: &[&str]) -> FileDescriptor {
        let mut descriptor = FileDescriptor {
            path: PathBuf::from("movie.avi"),
            length: Duration::ZERO,
            streams: Vec::new(),
        };
        for line in lines {
            scan_line(&mut descriptor, line);
        }
        descriptor
    }

    #[test]
    fn test_duration_header() {
        let descriptor = scan_fixture(&[
            "Input #0, avi, from 'movie.avi':",
            "  Duration: 00:01:30.50, start: 0.000000, bitrate: 1205 kb/s",
        ]);
        assert_eq!(descriptor.length, Duration::from_millis(90_500));
    }

    #[test]
    fn test_first_duration_wins() {
        let descriptor = scan_fixture(&[
            "  Duration: 00:01:30.50, start: 0.000000, bitrate: 1205 kb/s",
            "  Duration: 02:00:00.00, start: 0.000000, bitrate: 900 kb/s",
        ]);
        assert_eq!(descriptor.length, Duration::from_millis(90_500));
    }

    #[test]
    fn test_missing_duration_stays_zero() {
        let descriptor = scan_fixture(&["Input #0, avi, from 'movie.avi':"]);
        assert_eq!(descriptor.length, Duration::ZERO);
    }

    #[test]
    fn test_video_stream_line() {
        let descriptor = scan_fixture(&[
            "    Stream #0:0(eng): Video: vp9, 1920x1080 [SAR 1:1 DAR 16:9], 24 fps",
        ]);
        assert_eq!(descriptor.streams.len(), 1);
        let stream = &descriptor.streams[0];
        assert_eq!(stream.id, "0");
        assert_eq!(stream.kind, StreamKind::Video);
        assert_eq!(stream.lang, "eng");
        assert_eq!(stream.codec, "vp9");
        assert_eq!(stream.resolution, Some(Resolution { width: 1920, height: 1080 }));
        assert_eq!(stream.channels, None);
        assert_eq!(stream.params, vec!["24 fps".to_string()]);
        assert!(!stream.is_default);
    }

    #[test]
    fn test_resolution_without_annotation() {
        let descriptor = scan_fixture(&["    Stream #0:0(und): Video: mpeg4, 720x576, 25 fps"]);
        assert_eq!(
            descriptor.streams[0].resolution,
            Some(Resolution { width: 720, height: 576 })
        );
    }

    #[test]
    fn test_audio_stream_with_default_marker() {
        let descriptor = scan_fixture(&[
            "    Stream #0:1(spa): Audio: dts (DTS), 48000 Hz, 5.1(side), fltp, 1536 kb/s (default)",
        ]);
        let stream = &descriptor.streams[0];
        assert_eq!(stream.kind, StreamKind::Audio);
        assert_eq!(stream.codec, "dts (DTS)");
        assert_eq!(stream.channels.as_deref(), Some("5.1(side)"));
        assert!(stream.is_default);
        assert_eq!(
            stream.params,
            vec!["48000 Hz".to_string(), "fltp".to_string(), "1536 kb/s".to_string()]
        );
    }

    #[test]
    fn test_stereo_channels() {
        let descriptor =
            scan_fixture(&["    Stream #0:2(eng): Audio: aac, 44100 Hz, stereo, fltp"]);
        assert_eq!(descriptor.streams[0].channels.as_deref(), Some("stereo"));
    }

    #[test]
    fn test_subtitle_stream() {
        let descriptor = scan_fixture(&["    Stream #0:3(fre): Subtitle: subrip"]);
        let stream = &descriptor.streams[0];
        assert_eq!(stream.kind, StreamKind::Subtitle);
        assert_eq!(stream.codec, "subrip");
        assert!(stream.params.is_empty());
    }

    #[test]
    fn test_uninteresting_lines_ignored() {
        let descriptor = scan_fixture(&[
            "ffprobe version 6.1 Copyright (c) 2007-2023",
            "  Metadata:",
            "    title           : Movie",
        ]);
        assert!(descriptor.streams.is_empty());
        assert_eq!(descriptor.length, Duration::ZERO);
    }

    #[test]
    fn test_video_stream_selection() {
        let descriptor = scan_fixture(&[
            "    Stream #0:0(eng): Video: h264, 1920x1080 [SAR 1:1 DAR 16:9], 24 fps",
            "    Stream #0:1(eng): Audio: aac, 48000 Hz, stereo, fltp",
        ]);
        assert_eq!(descriptor.video_stream().unwrap().id, "0");
        assert_eq!(
            descriptor.resolution().unwrap(),
            Resolution { width: 1920, height: 1080 }
        );
    }

    #[test]
    fn test_multiple_video_streams_rejected() {
        let descriptor = scan_fixture(&[
            "    Stream #0:0(eng): Video: h264, 1920x1080, 24 fps",
            "    Stream #0:1(eng): Video: mjpeg, 720x480, 1 fps",
        ]);
        assert!(matches!(
            descriptor.video_stream(),
            Err(Vp9ifyError::MultipleVideoStreams { .. })
        ));
    }

    #[test]
    fn test_no_video_stream_rejected() {
        let descriptor = scan_fixture(&["    Stream #0:0(eng): Audio: aac, 48000 Hz, stereo"]);
        assert!(matches!(
            descriptor.video_stream(),
            Err(Vp9ifyError::NoVideoStream { .. })
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let descriptor = scan_fixture(&[
            "  Duration: 00:01:30.50, start: 0.000000, bitrate: 1205 kb/s",
            "    Stream #0:0(eng): Video: h264, 1920x1080, 24 fps",
        ]);
        let json = serde_json::to_string(&descriptor).unwrap();
        let back: FileDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back.length, descriptor.length);
        assert_eq!(back.streams.len(), 1);
        assert_eq!(back.streams[0].codec, "h264");
    }

    #[tokio::test]
    async fn test_probe_missing_file() {
        let config = Config::default();
        let result = probe(&config, Path::new("/nonexistent/movie.avi")).await;
        assert!(matches!(result, Err(Vp9ifyError::InputFileNotFound { .. })));
    }
}

//! Encoder subprocess lifecycle
//!
//! One [`PassRunner`] drives ffmpeg for a probed source file: crop
//! detection, pass 1 (statistics only, null sink) and pass 2 (real
//! destination). Each run hands its diagnostic stream to the progress
//! scanner inside a spawned task that owns the child process for its whole
//! lifetime, and exposes nothing but the event channel to the caller.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::sync::LazyLock;
use std::task::{Context, Poll};
use std::time::Duration;

use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, ReadBuf};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::engine::scanner::{scan_progress, ScanEnd};
use crate::engine::{encode_params_for, passlog_path, EncodeParams, PassNumber};
use crate::error::{Vp9ifyError, Vp9ifyResult};
use crate::probe::FileDescriptor;
use crate::progress::{ProgressEvent, CHANNEL_CAPACITY};
use crate::streams::StreamKind;

static CROP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"crop=(\d+:\d+:\d+:\d+)").expect("invalid crop regex"));

/// Audio channel layout that libopus rejects (ffmpeg ticket 5718).
const BROKEN_OPUS_LAYOUT: &str = "5.1(side)";

/// Runs encoder subprocesses for one probed source file.
pub struct PassRunner {
    config: Config,
    file: FileDescriptor,
    crop: Option<String>,
    passlog: PathBuf,
    cancel: CancellationToken,
}

impl PassRunner {
    /// Create a runner for a probed file. Fails up front when no encode
    /// parameter set exists for the source resolution, before any
    /// subprocess is launched.
    pub fn new(
        config: &Config,
        file: &FileDescriptor,
        cancel: CancellationToken,
    ) -> Vp9ifyResult<Self> {
        encode_params_for(file.resolution()?)?;
        Ok(Self {
            config: config.clone(),
            file: file.clone(),
            crop: None,
            passlog: passlog_path(&file.path),
            cancel,
        })
    }

    /// Apply a detected crop rectangle (`W:H:X:Y`) to both passes.
    pub fn set_crop(&mut self, rect: Option<String>) {
        self.crop = rect;
    }

    /// Override the pass-log prefix shared by the two passes.
    pub fn set_passlog(&mut self, path: PathBuf) {
        self.passlog = path;
    }

    /// Run the statistics pass. Returns the event channel immediately.
    pub fn pass1(&self) -> Vp9ifyResult<mpsc::Receiver<ProgressEvent>> {
        self.run_pass(PassNumber::First, None)
    }

    /// Run the encoding pass, writing to `destination`. Returns the event
    /// channel immediately.
    pub fn pass2(&self, destination: &Path) -> Vp9ifyResult<mpsc::Receiver<ProgressEvent>> {
        self.run_pass(PassNumber::Second, Some(destination))
    }

    /// Run a short cropdetect sample over the source. Crop reports arrive
    /// as `CropDetected` events; the last one wins.
    pub fn detect_crop(&self) -> Vp9ifyResult<mpsc::Receiver<ProgressEvent>> {
        let source = self.file.path.to_string_lossy().into_owned();
        let args: Vec<String> = [
            // Sample ten seconds starting one minute in.
            "-ss",
            "00:01:00",
            "-i",
            source.as_str(),
            "-t",
            "10",
            "-vf",
            "cropdetect",
            "-f",
            "null",
            "-",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let mut child = self.spawn(&args)?;
        let stderr = child.stderr.take().ok_or_else(|| Vp9ifyError::ToolLaunch {
            tool: self.tool_name(),
            message: "failed to capture stderr".to_string(),
        })?;
        let cancel = self.cancel.clone();
        let tool = self.tool_name();

        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            loop {
                let next = tokio::select! {
                    next = lines.next_line() => next,
                    _ = cancel.cancelled() => {
                        kill_child(&mut child).await;
                        let _ = tx.send(ProgressEvent::Failed(Vp9ifyError::Cancelled)).await;
                        return;
                    }
                };
                match next {
                    Ok(Some(line)) => {
                        if let Some(caps) = CROP_RE.captures(&line) {
                            let rect = caps[1].to_string();
                            if tx.send(ProgressEvent::CropDetected(rect)).await.is_err() {
                                kill_child(&mut child).await;
                                return;
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(error) => {
                        let _ = tx
                            .send(ProgressEvent::Failed(Vp9ifyError::StreamRead(error)))
                            .await;
                        let _ = child.wait().await;
                        return;
                    }
                }
            }
            finish_child(&mut child, &tool, &tx).await;
        });
        Ok(rx)
    }

    fn run_pass(
        &self,
        pass: PassNumber,
        destination: Option<&Path>,
    ) -> Vp9ifyResult<mpsc::Receiver<ProgressEvent>> {
        let params = encode_params_for(self.file.resolution()?)?;
        let args = self.pass_args(pass, &params, destination);
        let total = self.file.length;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let mut child = self.spawn(&args)?;
        let stderr = child.stderr.take().ok_or_else(|| Vp9ifyError::ToolLaunch {
            tool: self.tool_name(),
            message: "failed to capture stderr".to_string(),
        })?;
        let reader = TeeReader::new(stderr, open_run_log()?);
        let cancel = self.cancel.clone();
        let tool = self.tool_name();

        tokio::spawn(async move {
            let start = ProgressEvent::Advanced {
                position: Duration::ZERO,
                fraction: if total.is_zero() { None } else { Some(0.0) },
            };
            if tx.send(start).await.is_err() {
                kill_child(&mut child).await;
                return;
            }

            let end = tokio::select! {
                end = scan_progress(reader, total, tx.clone()) => Some(end),
                _ = cancel.cancelled() => None,
            };
            match end {
                None => {
                    kill_child(&mut child).await;
                    let _ = tx.send(ProgressEvent::Failed(Vp9ifyError::Cancelled)).await;
                }
                Some(ScanEnd::ConsumerGone) => kill_child(&mut child).await,
                Some(ScanEnd::ReadError) => {
                    // Terminal failure already delivered; still reap the child.
                    let _ = child.wait().await;
                }
                Some(ScanEnd::Eof) => finish_child(&mut child, &tool, &tx).await,
            }
        });
        Ok(rx)
    }

    /// Build the full argument list for one encoding pass.
    fn pass_args(
        &self,
        pass: PassNumber,
        params: &EncodeParams,
        destination: Option<&Path>,
    ) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-i".to_string(),
            self.file.path.to_string_lossy().into_owned(),
            // Process all streams; anything not remapped below (subtitles,
            // untouched audio in pass 1) is copied.
            "-map".to_string(),
            "0".to_string(),
            "-c".to_string(),
            "copy".to_string(),
        ];
        self.quality_args(&mut args, params, pass);
        if pass == PassNumber::Second {
            args.extend(["-c:a".to_string(), "libopus".to_string()]);
        }
        for stream in &self.file.streams {
            if stream.should_skip() {
                args.extend(["-map".to_string(), format!("-0:{}", stream.id)]);
            }
            if pass == PassNumber::Second
                && stream.kind == StreamKind::Audio
                && stream.channels.as_deref() == Some(BROKEN_OPUS_LAYOUT)
            {
                args.extend([
                    format!("-filter:{}", stream.id),
                    "aformat=channel_layouts=5.1".to_string(),
                ]);
            }
        }
        args.extend([
            "-passlogfile".to_string(),
            self.passlog.to_string_lossy().into_owned(),
            "-pass".to_string(),
            pass.as_arg().to_string(),
        ]);
        match destination {
            // Pass 1 only collects statistics; its output is discarded.
            None => args.extend([
                "-f".to_string(),
                "matroska".to_string(),
                "-y".to_string(),
                "/dev/null".to_string(),
            ]),
            Some(destination) => args.push(destination.to_string_lossy().into_owned()),
        }
        args
    }

    fn quality_args(&self, args: &mut Vec<String>, params: &EncodeParams, pass: PassNumber) {
        // The statistics pass can run at a faster speed setting without
        // affecting the final output.
        let speed = match pass {
            PassNumber::First => "4",
            PassNumber::Second => params.speed,
        };
        args.extend(
            [
                // Keyframe spacing 240 frames.
                "-g",
                "240",
                "-c:v",
                "libvpx-vp9",
                "-b:v",
                params.target_bitrate,
                "-crf",
                params.crf,
                "-minrate",
                params.min_bitrate,
                "-maxrate",
                params.max_bitrate,
                "-tile-columns",
                params.tile_columns,
                "-threads",
                params.threads,
                "-speed",
                speed,
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        if let Some(rect) = &self.crop {
            args.extend(["-filter:v".to_string(), format!("crop={}", rect)]);
        }
    }

    fn spawn(&self, args: &[String]) -> Vp9ifyResult<Child> {
        if self.config.show_commands {
            println!("$ {} '{}'", self.tool_name(), args.join("' '"));
        }
        debug!(?args, "Spawning encoder");
        Command::new(&self.config.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Vp9ifyError::ToolLaunch {
                tool: self.tool_name(),
                message: e.to_string(),
            })
    }

    fn tool_name(&self) -> String {
        self.config.ffmpeg_path.display().to_string()
    }
}

async fn kill_child(child: &mut Child) {
    if let Err(error) = child.kill().await {
        warn!("Failed to kill encoder process: {}", error);
    }
}

/// Wait for the child and translate a failing exit status into a terminal
/// event. A clean diagnostic stream must not mask a failing exit.
async fn finish_child(child: &mut Child, tool: &str, tx: &mpsc::Sender<ProgressEvent>) {
    match child.wait().await {
        Ok(status) if status.success() => debug!("{} exited cleanly", tool),
        Ok(status) => {
            let _ = tx
                .send(ProgressEvent::Failed(Vp9ifyError::ToolExit {
                    tool: tool.to_string(),
                    status,
                }))
                .await;
        }
        Err(error) => {
            let _ = tx
                .send(ProgressEvent::Failed(Vp9ifyError::IoError(error)))
                .await;
        }
    }
}

/// Open a persisted log file for one encoder run. Best effort: the log is
/// for post-mortem debugging only.
fn open_run_log() -> Vp9ifyResult<std::fs::File> {
    let named = tempfile::Builder::new()
        .prefix("vp9ify-")
        .suffix(".log")
        .tempfile()?;
    let (file, path) = named.keep().map_err(|e| Vp9ifyError::IoError(e.error))?;
    info!("Writing encoder log to {}", path.display());
    Ok(file)
}

/// AsyncRead wrapper that copies everything it reads into a log file. A
/// failed log write never fails the read.
struct TeeReader<R> {
    inner: R,
    log: std::fs::File,
}

impl<R> TeeReader<R> {
    fn new(inner: R, log: std::fs::File) -> Self {
        Self { inner, log }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for TeeReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let before = buf.filled().len();
        let me = self.get_mut();
        match Pin::new(&mut me.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                let fresh = &buf.filled()[before..];
                if !fresh.is_empty() {
                    let _ = me.log.write_all(fresh);
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

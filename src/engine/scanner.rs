//! Incremental progress-record scanner for encoder diagnostic output
//!
//! The encoder rewrites a single status line terminated by carriage
//! returns, so its diagnostic stream never contains newline-framed records
//! and chunk boundaries fall at arbitrary byte offsets. The scanner
//! accumulates raw bytes and matches complete records wherever they appear
//! in the buffer, independent of read framing.

use std::sync::LazyLock;
use std::time::Duration;

use regex::bytes::Regex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

use crate::duration::parse_timestamp;
use crate::error::Vp9ifyError;
use crate::progress::ProgressEvent;

/// Read chunk size; also the matcher's initial buffer capacity.
const READ_CHUNK: usize = 4096;

/// Buffer length beyond which stale leading bytes are discarded.
const MAX_PENDING: usize = 4096;

/// Bytes preserved at the tail of a trim. Longer than any complete record,
/// so a record straddling the trim boundary is never truncated.
const TRIM_KEEP: usize = 1024;

static PROGRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"frame=\s*\d+ fps=\s*\S+ q=\s*\S+ size=\s*\S+ time=(\d\d:\d\d:\d\d\.\d\d) bitrate=\s*\S+ speed=\s*\S*x\s*\r",
    )
    .expect("invalid progress regex")
});

/// Buffering record matcher: push raw bytes in, drain record timestamps
/// out. The buffer is exclusively owned and never shared.
#[derive(Debug, Default)]
pub struct ProgressMatcher {
    buffer: Vec<u8>,
}

impl ProgressMatcher {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(READ_CHUNK),
        }
    }

    /// Append freshly-read bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Extract the next complete record, discarding everything buffered up
    /// to and including its end; an unmatched prefix before the record is
    /// noise and is never re-scanned. Returns `None` when no complete
    /// record is buffered yet.
    pub fn next_record(&mut self) -> Option<Duration> {
        let (end, position) = {
            let caps = PROGRESS_RE.captures(&self.buffer)?;
            let whole = caps.get(0)?;
            let timestamp = caps.get(1)?;
            let text = std::str::from_utf8(timestamp.as_bytes()).unwrap_or("");
            (whole.end(), parse_timestamp(text))
        };
        self.buffer.drain(..end);
        Some(position)
    }

    /// Discard stale leading bytes once the buffer outgrows its bound,
    /// keeping a tail margin longer than any record. Call only after
    /// [`Self::next_record`] found nothing.
    pub fn trim(&mut self) {
        if self.buffer.len() > MAX_PENDING {
            let cut = self.buffer.len() - TRIM_KEEP;
            self.buffer.drain(..cut);
        }
    }

    /// Bytes currently buffered.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// How a scan ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEnd {
    /// Clean end-of-stream; no event was emitted for it.
    Eof,
    /// A read failed; a terminal `Failed` event was already delivered.
    ReadError,
    /// The consumer dropped the receiver; nothing is listening.
    ConsumerGone,
}

fn fraction(position: Duration, total: Duration) -> Option<f64> {
    if total.is_zero() {
        return None;
    }
    Some((position.as_secs_f64() / total.as_secs_f64()).min(1.0))
}

/// Scan an encoder diagnostic stream until end-of-data, emitting one event
/// per recognized progress record in stream order. Delivery awaits channel
/// capacity, so a slow consumer suspends the scan (intentional
/// backpressure). Amortized cost is linear in the bytes read: the buffer is
/// bounded and a matched region is never re-scanned.
pub async fn scan_progress<R>(
    mut source: R,
    total: Duration,
    events: mpsc::Sender<ProgressEvent>,
) -> ScanEnd
where
    R: AsyncRead + Unpin,
{
    let mut matcher = ProgressMatcher::new();
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        // Drain every record already buffered before reading more.
        while let Some(position) = matcher.next_record() {
            let event = ProgressEvent::Advanced {
                position,
                fraction: fraction(position, total),
            };
            if events.send(event).await.is_err() {
                return ScanEnd::ConsumerGone;
            }
        }
        matcher.trim();
        match source.read(&mut chunk).await {
            Ok(0) => return ScanEnd::Eof,
            Ok(n) => matcher.extend(&chunk[..n]),
            Err(error) => {
                let _ = events
                    .send(ProgressEvent::Failed(Vp9ifyError::StreamRead(error)))
                    .await;
                return ScanEnd::ReadError;
            }
        }
    }
}

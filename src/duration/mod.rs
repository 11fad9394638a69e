//! Timestamp parsing and display formatting
//!
//! ffmpeg and ffprobe report positions as `HH:MM:SS.ff`. Parsing is
//! deliberately lossy: the surrounding scanners tolerate garbled subprocess
//! output, so a malformed timestamp resolves to a zero duration instead of
//! an error.

use std::time::Duration;

/// Parse an `HH:MM:SS.ff` timestamp into a duration with millisecond
/// resolution. Any deviation from that exact shape (wrong digit counts,
/// wrong separators, non-digits) yields `Duration::ZERO`.
pub fn parse_timestamp(text: &str) -> Duration {
    let bytes = text.as_bytes();
    if bytes.len() != 11 || bytes[2] != b':' || bytes[5] != b':' || bytes[8] != b'.' {
        return Duration::ZERO;
    }
    let field = |at: usize| -> Option<u64> {
        let tens = (bytes[at] as char).to_digit(10)?;
        let ones = (bytes[at + 1] as char).to_digit(10)?;
        Some(u64::from(tens * 10 + ones))
    };
    match (field(0), field(3), field(6), field(9)) {
        (Some(hours), Some(minutes), Some(seconds), Some(hundredths)) => {
            Duration::from_millis((hours * 3600 + minutes * 60 + seconds) * 1000 + hundredths * 10)
        }
        _ => Duration::ZERO,
    }
}

/// Render a duration as `HhMMmSSsFF` (hours unbounded, the rest
/// zero-padded to two digits). Display-only: the output is not in
/// [`parse_timestamp`]'s accepted grammar.
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();
    let hundredths = (total_ms % 1000) / 10;
    let total_secs = total_ms / 1000;
    let seconds = total_secs % 60;
    let minutes = (total_secs / 60) % 60;
    let hours = total_secs / 3600;
    format!("{}h{:02}m{:02}s{:02}", hours, minutes, seconds, hundredths)
}

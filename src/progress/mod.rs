//! Progress event channel types and the console presenter
//!
//! Each encoder run owns exactly one single-producer/single-consumer
//! channel. Events arrive in stream order; a `Failed` event is terminal,
//! and channel closure with no `Failed` means the run succeeded.

use std::io::Write;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::debug;

use crate::duration::format_duration;
use crate::error::{Vp9ifyError, Vp9ifyResult};

/// Event channel capacity. Small on purpose: a slow consumer back-pressures
/// the producing scanner instead of letting it race ahead or drop events.
pub const CHANNEL_CAPACITY: usize = 16;

/// Number of cells in the progress bar.
const BAR_CELLS: usize = 20;

/// Wall-clock time that must pass before an ETA extrapolation is shown.
const ETA_THRESHOLD: Duration = Duration::from_secs(5);

/// One progress event from a running encoder subprocess
#[derive(Debug)]
pub enum ProgressEvent {
    /// Encoder advanced to a position in the source timeline. The fraction
    /// is present only when the total duration is known and positive.
    Advanced {
        position: Duration,
        fraction: Option<f64>,
    },
    /// Crop detection reported a rectangle; the last one wins.
    CropDetected(String),
    /// Terminal failure. Nothing follows this event.
    Failed(Vp9ifyError),
}

fn bar(fraction: f64) -> String {
    let done = ((fraction * BAR_CELLS as f64) as usize).min(BAR_CELLS);
    format!(
        "[{}{}] {:5.1}%",
        "#".repeat(done),
        ".".repeat(BAR_CELLS - done),
        fraction * 100.0
    )
}

fn eta(elapsed: Duration, fraction: f64) -> Option<Duration> {
    if elapsed < ETA_THRESHOLD || fraction <= 0.0 {
        return None;
    }
    let total = elapsed.as_secs_f64() / fraction;
    let left = total - elapsed.as_secs_f64();
    if left.is_finite() && left >= 0.0 {
        Some(Duration::from_secs(left as u64))
    } else {
        None
    }
}

fn format_clock(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

/// Drain a pass's event channel, repainting one progress line per event.
/// Returns the terminal error if the run failed.
pub async fn print_progress(
    name: &str,
    mut events: mpsc::Receiver<ProgressEvent>,
) -> Vp9ifyResult<()> {
    let prefix = format!("{:<8}", name);
    let spinner = [".", " "];
    let mut tick = 0;
    let start = Instant::now();
    let mut out = std::io::stdout();

    while let Some(event) = events.recv().await {
        match event {
            ProgressEvent::Advanced { position, fraction } => {
                let line = match fraction {
                    Some(fraction) => {
                        let eta_part = match eta(start.elapsed(), fraction) {
                            Some(left) => format!(" ETA {}", format_clock(left)),
                            None => String::new(),
                        };
                        format!("{}{} {}{}", prefix, bar(fraction), spinner[tick], eta_part)
                    }
                    // Total duration unknown: show the raw position instead
                    // of a fraction.
                    None => format!("{}{} {}", prefix, format_duration(position), spinner[tick]),
                };
                print!("\r\x1b[K{}", line);
                let _ = out.flush();
                tick = (tick + 1) % spinner.len();
            }
            ProgressEvent::CropDetected(rect) => {
                debug!("Unexpected crop report during encode pass: {}", rect);
            }
            ProgressEvent::Failed(error) => {
                println!();
                return Err(error);
            }
        }
    }

    println!(
        "\r\x1b[K{}{}   Total time {}",
        prefix,
        bar(1.0),
        format_clock(start.elapsed())
    );
    Ok(())
}

/// Drain a crop-detection channel. Returns the last reported rectangle, or
/// the terminal error if the detection run failed.
pub async fn collect_crop(
    mut events: mpsc::Receiver<ProgressEvent>,
) -> Vp9ifyResult<Option<String>> {
    let mut rect = None;
    while let Some(event) = events.recv().await {
        match event {
            ProgressEvent::CropDetected(found) => rect = Some(found),
            ProgressEvent::Failed(error) => return Err(error),
            ProgressEvent::Advanced { .. } => {}
        }
    }
    Ok(rect)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_bounds() {
        assert_eq!(bar(0.0), "[....................]   0.0%");
        assert_eq!(bar(1.0), "[####################] 100.0%");
        // Fractions above 1.0 saturate the bar.
        assert!(bar(1.3).starts_with("[####################]"));
    }

    #[test]
    fn test_bar_halfway() {
        let line = bar(0.5);
        assert!(line.starts_with("[##########..........]"));
        assert!(line.ends_with(" 50.0%"));
    }

    #[test]
    fn test_eta_suppressed_early() {
        assert_eq!(eta(Duration::from_secs(2), 0.5), None);
    }

    #[test]
    fn test_eta_extrapolates() {
        // Half done after 10 seconds: about 10 seconds left.
        let left = eta(Duration::from_secs(10), 0.5).unwrap();
        assert_eq!(left.as_secs(), 10);
    }

    #[test]
    fn test_eta_zero_fraction() {
        assert_eq!(eta(Duration::from_secs(10), 0.0), None);
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(Duration::from_secs(42)), "42s");
        assert_eq!(format_clock(Duration::from_secs(90)), "1m30s");
        assert_eq!(format_clock(Duration::from_secs(600)), "10m00s");
    }

    #[tokio::test]
    async fn test_collect_crop_keeps_last() {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tx.send(ProgressEvent::CropDetected("1920:800:0:140".to_string()))
            .await
            .unwrap();
        tx.send(ProgressEvent::CropDetected("1920:804:0:138".to_string()))
            .await
            .unwrap();
        drop(tx);
        assert_eq!(
            collect_crop(rx).await.unwrap().as_deref(),
            Some("1920:804:0:138")
        );
    }

    #[tokio::test]
    async fn test_collect_crop_propagates_failure() {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tx.send(ProgressEvent::Failed(Vp9ifyError::Cancelled))
            .await
            .unwrap();
        drop(tx);
        assert!(matches!(collect_crop(rx).await, Err(Vp9ifyError::Cancelled)));
    }

    #[tokio::test]
    async fn test_print_progress_returns_failure() {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tx.send(ProgressEvent::Advanced {
            position: Duration::from_secs(4),
            fraction: Some(0.05),
        })
        .await
        .unwrap();
        tx.send(ProgressEvent::Failed(Vp9ifyError::Cancelled))
            .await
            .unwrap();
        drop(tx);
        assert!(matches!(
            print_progress("Pass 1", rx).await,
            Err(Vp9ifyError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_print_progress_clean_close_succeeds() {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        drop(tx);
        assert!(print_progress("Pass 2", rx).await.is_ok());
    }
}

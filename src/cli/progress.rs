//! Fetch progress display
//!
//! Renders scheduler [`FetchEvent`]s as an indicatif progress bar. The
//! display task owns its channel receiver and finishes when the scheduler
//! drops the sender side.

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::app::models::FetchOutcome;
use crate::app::scheduler::FetchEvent;
use crate::constants::workers;

/// Progress display configuration
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Suppress the bar entirely
    pub quiet: bool,
    /// Show per-granule messages under the bar
    pub show_granules: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            quiet: false,
            show_granules: false,
        }
    }
}

/// A running progress display over fetch events
pub struct ProgressDisplay {
    sender: mpsc::Sender<FetchEvent>,
    handle: JoinHandle<ProgressCounts>,
}

/// Counters accumulated while the bar was running
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProgressCounts {
    pub succeeded: usize,
    pub cached: usize,
    pub failed: usize,
    pub not_attempted: usize,
}

impl ProgressDisplay {
    /// Start a display for `total` granules
    pub fn start(total: usize, config: ProgressConfig) -> Self {
        let (sender, mut receiver) = mpsc::channel::<FetchEvent>(workers::CHANNEL_BUFFER_SIZE);

        // No bar when output is piped; indicatif draws on stderr
        let interactive = atty::is(atty::Stream::Stderr);
        let bar = if config.quiet || !interactive {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(total as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("##-"),
            );
            bar.set_message("fetching granules");
            bar
        };

        let handle = tokio::spawn(async move {
            let mut counts = ProgressCounts::default();
            while let Some(event) = receiver.recv().await {
                match &event.outcome {
                    FetchOutcome::CachedHit => counts.cached += 1,
                    FetchOutcome::Fetched { .. } => counts.succeeded += 1,
                    FetchOutcome::NotAttempted => counts.not_attempted += 1,
                    _ => counts.failed += 1,
                }
                if config.show_granules {
                    bar.set_message(event.granule.file_name().to_string());
                }
                bar.inc(1);
            }
            bar.finish_and_clear();
            counts
        });

        Self { sender, handle }
    }

    /// Sender half handed to the scheduler
    pub fn sender(&self) -> mpsc::Sender<FetchEvent> {
        self.sender.clone()
    }

    /// Wait for the display to drain and return its counters
    pub async fn finish(self) -> ProgressCounts {
        drop(self.sender);
        self.handle.await.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use crate::app::models::GranuleRef;

    use super::*;

    #[tokio::test]
    async fn test_counts_accumulate_per_outcome() {
        let display = ProgressDisplay::start(
            3,
            ProgressConfig {
                quiet: true,
                show_granules: false,
            },
        );
        let sender = display.sender();

        let ts = Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap();
        let events = [
            FetchOutcome::CachedHit,
            FetchOutcome::Fetched { bytes: 10 },
            FetchOutcome::FailedPermanently {
                reason: "gone".to_string(),
            },
        ];
        for (band, outcome) in events.into_iter().enumerate() {
            sender
                .send(FetchEvent {
                    granule: GranuleRef::new("H09", ts, band as u8 + 1),
                    outcome,
                })
                .await
                .unwrap();
        }

        // The display drains until every sender clone is gone
        drop(sender);
        let counts = display.finish().await;
        assert_eq!(
            counts,
            ProgressCounts {
                succeeded: 1,
                cached: 1,
                failed: 1,
                not_attempted: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_finish_without_events() {
        let display = ProgressDisplay::start(0, ProgressConfig::default());
        let counts = display.finish().await;
        assert_eq!(counts, ProgressCounts::default());
    }
}

//! Bounded decode stage with ordered emission
//!
//! Takes the scheduler's fetch report, groups it into per-timestamp bundles
//! and decodes complete bundles on a bounded blocking pool. Bundles finish
//! in whatever order the pool gets to them; a reorder buffer holds finished
//! time steps until all earlier ones have been emitted, so consumers always
//! observe strictly increasing timestamps.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, warn};

use crate::app::cache::CacheManager;
use crate::app::models::{FetchReport, GranuleRef};
use crate::constants::workers;
use crate::errors::DecodeError;

use super::hsd;
use super::transform::{self, DecodedFrame};

/// Decode stage tuning
#[derive(Debug, Clone)]
pub struct DecodeConfig {
    /// Bundles decoded concurrently on the blocking pool
    pub pool_size: usize,
    /// Resample bands onto a regular lat/lon grid before compositing
    pub reproject: bool,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            pool_size: workers::DEFAULT_DECODE_POOL,
            reproject: true,
        }
    }
}

/// What became of one time step
#[derive(Debug, Clone)]
pub enum TimeStepOutcome {
    /// Every band decoded; a frame was composed
    Frame(DecodedFrame),
    /// One or more bands never made it into the cache
    SkippedIncomplete { missing: Vec<u8> },
    /// All bands were present but decoding or compositing failed
    Failed { error: String },
}

impl TimeStepOutcome {
    pub fn is_frame(&self) -> bool {
        matches!(self, TimeStepOutcome::Frame(_))
    }
}

enum JobKind {
    Ready(Vec<(GranuleRef, PathBuf)>),
    Skipped { missing: Vec<u8> },
}

struct Job {
    timestamp: DateTime<Utc>,
    kind: JobKind,
}

/// Decodes fetched granules into frames, one per time step
pub struct DecodeStage {
    config: DecodeConfig,
    cache: Arc<CacheManager>,
}

impl DecodeStage {
    pub fn new(config: DecodeConfig, cache: Arc<CacheManager>) -> Self {
        Self { config, cache }
    }

    /// Decode every bundle in the report
    ///
    /// The returned vector is ordered by timestamp and holds exactly one
    /// entry per time step in the report.
    pub async fn process(
        &self,
        report: &FetchReport,
    ) -> Vec<(DateTime<Utc>, TimeStepOutcome)> {
        let (tx, mut rx) = mpsc::channel(workers::CHANNEL_BUFFER_SIZE);
        let collector = async {
            let mut out = Vec::new();
            while let Some(item) = rx.recv().await {
                out.push(item);
            }
            out
        };
        let (_, out) = tokio::join!(self.process_streaming(report, tx), collector);
        out
    }

    /// Decode every bundle, emitting time steps on `out` as they become
    /// ready, always in strictly increasing timestamp order
    pub async fn process_streaming(
        &self,
        report: &FetchReport,
        out: mpsc::Sender<(DateTime<Utc>, TimeStepOutcome)>,
    ) {
        let jobs = self.jobs(report);
        debug!(time_steps = jobs.len(), "decode stage starting");

        let semaphore = Arc::new(Semaphore::new(self.config.pool_size.max(1)));
        let (tx, mut rx) = mpsc::channel(workers::CHANNEL_BUFFER_SIZE);
        let mut handles = Vec::with_capacity(jobs.len());

        for (index, job) in jobs.into_iter().enumerate() {
            let tx = tx.clone();
            let semaphore = Arc::clone(&semaphore);
            let reproject = self.config.reproject;
            handles.push(tokio::spawn(async move {
                let outcome = match job.kind {
                    JobKind::Skipped { missing } => {
                        TimeStepOutcome::SkippedIncomplete { missing }
                    }
                    JobKind::Ready(granules) => {
                        let _permit = semaphore
                            .acquire_owned()
                            .await
                            .expect("decode semaphore closed");
                        tokio::task::spawn_blocking(move || decode_bundle(granules, reproject))
                            .await
                            .unwrap_or_else(|e| TimeStepOutcome::Failed {
                                error: format!("decode task panicked: {}", e),
                            })
                    }
                };
                let _ = tx.send((index, job.timestamp, outcome)).await;
            }));
        }
        drop(tx);

        // Reorder buffer: emit index 0, 1, 2, ... regardless of completion order
        let mut next = 0usize;
        let mut pending: BTreeMap<usize, (DateTime<Utc>, TimeStepOutcome)> = BTreeMap::new();
        while let Some((index, timestamp, outcome)) = rx.recv().await {
            pending.insert(index, (timestamp, outcome));
            while let Some(item) = pending.remove(&next) {
                if out.send(item).await.is_err() {
                    // Consumer hung up; drain remaining tasks and stop
                    rx.close();
                    break;
                }
                next += 1;
            }
        }

        let _ = futures::future::join_all(handles).await;
    }

    fn jobs(&self, report: &FetchReport) -> Vec<Job> {
        report
            .bundles()
            .into_iter()
            .map(|bundle| {
                if bundle.is_complete(report) {
                    let granules = bundle
                        .granules
                        .iter()
                        .map(|g| (g.clone(), self.cache.file_path(g)))
                        .collect();
                    Job {
                        timestamp: bundle.timestamp,
                        kind: JobKind::Ready(granules),
                    }
                } else {
                    let missing = bundle.missing_bands(report);
                    warn!(
                        timestamp = %bundle.timestamp,
                        missing = ?missing,
                        "skipping incomplete time step"
                    );
                    Job {
                        timestamp: bundle.timestamp,
                        kind: JobKind::Skipped { missing },
                    }
                }
            })
            .collect()
    }
}

/// Decode one complete bundle into a frame
///
/// Blocking; runs on the blocking pool.
fn decode_bundle(granules: Vec<(GranuleRef, PathBuf)>, reproject: bool) -> TimeStepOutcome {
    let timestamp = match granules.first() {
        Some((g, _)) => g.timestamp,
        None => {
            return TimeStepOutcome::Failed {
                error: "empty bundle".to_string(),
            }
        }
    };

    let mut bands = HashMap::new();
    for (granule, path) in granules {
        let decoded = match hsd::decode_file(&path) {
            Ok(d) => d,
            Err(e) => return TimeStepOutcome::Failed { error: e.to_string() },
        };

        if decoded.satellite != granule.satellite
            || decoded.timestamp != granule.timestamp
            || decoded.band != granule.band
        {
            let err = DecodeError::MetadataMismatch {
                reason: format!(
                    "{} decodes as {} band {} at {}",
                    granule.file_name(),
                    decoded.satellite,
                    decoded.band,
                    decoded.timestamp
                ),
            };
            return TimeStepOutcome::Failed {
                error: err.to_string(),
            };
        }

        let grid = if reproject {
            match transform::reprojected_grid(&decoded) {
                Ok(g) => g,
                Err(e) => return TimeStepOutcome::Failed { error: e.to_string() },
            }
        } else {
            decoded.grid
        };
        bands.insert(granule.band, grid);
    }

    match transform::compose_frame(timestamp, &bands) {
        Ok(frame) => TimeStepOutcome::Frame(frame),
        Err(e) => TimeStepOutcome::Failed { error: e.to_string() },
    }
}

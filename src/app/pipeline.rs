//! End-to-end orchestration: catalog, scheduler, decode, sink
//!
//! The pipeline owns no policy of its own. It expands a time range into
//! granule references, hands them to the scheduler, streams the decode
//! stage's ordered output into a [`FrameSink`] and returns an accounting
//! summary covering every granule and every time step.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::constants::workers;
use crate::errors::Result;

use super::catalog::{self, Product};
use super::decode::{DecodeStage, DecodedFrame, TimeStepOutcome};
use super::models::{FetchReport, FetchSummary};
use super::scheduler::{FetchEvent, Scheduler};

/// Where finished frames go
///
/// The collaborator boundary for output: the pipeline never knows about
/// file formats or destinations.
pub trait FrameSink: Send {
    fn emit(&mut self, frame: &DecodedFrame) -> Result<()>;
}

/// A sink that keeps frames in memory, for tests and library callers
#[derive(Debug, Default)]
pub struct VecSink {
    pub frames: Vec<DecodedFrame>,
}

impl FrameSink for VecSink {
    fn emit(&mut self, frame: &DecodedFrame) -> Result<()> {
        self.frames.push(frame.clone());
        Ok(())
    }
}

/// What a pipeline run produced, over and above the emitted frames
#[derive(Debug)]
pub struct PipelineSummary {
    /// Per-granule fetch accounting
    pub fetch: FetchSummary,
    /// Time steps that produced a frame
    pub frames: usize,
    /// Time steps skipped for missing bands
    pub skipped: usize,
    /// Time steps where decoding or compositing failed
    pub failed: usize,
    /// Fatal transfer error that aborted the fetch phase, if any
    pub fatal_error: Option<String>,
}

impl PipelineSummary {
    pub fn aborted(&self) -> bool {
        self.fatal_error.is_some()
    }
}

/// Drives a request from time range to emitted frames
pub struct Pipeline {
    product: Product,
    interval_minutes: u32,
    scheduler: Scheduler,
    decode: DecodeStage,
}

impl Pipeline {
    pub fn new(
        product: Product,
        interval_minutes: u32,
        scheduler: Scheduler,
        decode: DecodeStage,
    ) -> Self {
        Self {
            product,
            interval_minutes,
            scheduler,
            decode,
        }
    }

    /// Fetch, decode and emit every time step in `[start, end)`
    pub async fn run(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        sink: &mut dyn FrameSink,
    ) -> Result<PipelineSummary> {
        self.run_with_events(start, end, sink, None).await
    }

    /// Like [`run`](Self::run), forwarding fetch events for progress display
    pub async fn run_with_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        sink: &mut dyn FrameSink,
        events: Option<mpsc::Sender<FetchEvent>>,
    ) -> Result<PipelineSummary> {
        let granules = catalog::expand(&self.product, start, end, self.interval_minutes)?;
        info!(
            granules = granules.len(),
            bands = self.product.bands.len(),
            "starting acquisition"
        );

        let outcome = self.scheduler.run_with_events(granules, events).await;
        let fetch = outcome.report.summary();

        // A connect/auth abort ends the run before any frames are emitted
        if let Some(reason) = outcome.fatal_error {
            error!("fetch phase aborted: {}", reason);
            return Ok(PipelineSummary {
                fetch,
                frames: 0,
                skipped: 0,
                failed: 0,
                fatal_error: Some(reason),
            });
        }
        info!("fetch complete: {}", fetch);

        let (frames, skipped, failed) = self.emit_frames(&outcome.report, sink).await?;
        info!(frames, skipped, failed, "pipeline finished");

        Ok(PipelineSummary {
            fetch,
            frames,
            skipped,
            failed,
            fatal_error: None,
        })
    }

    /// Decode an existing report and emit its frames
    pub async fn emit_frames(
        &self,
        report: &FetchReport,
        sink: &mut dyn FrameSink,
    ) -> Result<(usize, usize, usize)> {
        let (tx, mut rx) = mpsc::channel(workers::CHANNEL_BUFFER_SIZE);
        let producer = self.decode.process_streaming(report, tx);

        let consumer = async {
            let mut frames = 0usize;
            let mut skipped = 0usize;
            let mut failed = 0usize;
            while let Some((timestamp, outcome)) = rx.recv().await {
                match outcome {
                    TimeStepOutcome::Frame(frame) => {
                        sink.emit(&frame)?;
                        frames += 1;
                    }
                    TimeStepOutcome::SkippedIncomplete { missing } => {
                        warn!(%timestamp, ?missing, "time step skipped");
                        skipped += 1;
                    }
                    TimeStepOutcome::Failed { error } => {
                        warn!(%timestamp, error, "time step failed to decode");
                        failed += 1;
                    }
                }
            }
            Ok::<_, crate::errors::AppError>((frames, skipped, failed))
        };

        let (_, counts) = tokio::join!(producer, consumer);
        counts
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;
    use tempfile::TempDir;

    use crate::app::cache::{CacheConfig, CacheManager};
    use crate::app::decode::grid::tests::test_projection;
    use crate::app::decode::hsd::synth::SynthGranule;
    use crate::app::decode::DecodeConfig;
    use crate::app::models::GranuleRef;
    use crate::app::scheduler::SchedulerConfig;
    use crate::app::transfer::memory::{MemoryArchive, TransferErrorKind};

    use super::*;

    fn ts(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, h, m, 0).unwrap()
    }

    /// A memory archive stocked with decodable synthetic granules
    fn stocked_archive(product: &Product, steps: &[(u32, u32)]) -> MemoryArchive {
        let archive = MemoryArchive::new();
        for &(h, m) in steps {
            for &band in &product.bands {
                let granule = GranuleRef::new(&product.satellite, ts(h, m), band);
                let synth =
                    SynthGranule::uniform(ts(h, m), band, test_projection(8, 8), 100);
                let mut payload = Vec::new();
                {
                    use std::io::Write;
                    let mut enc = bzip2::write::BzEncoder::new(
                        &mut payload,
                        bzip2::Compression::fast(),
                    );
                    enc.write_all(&synth.payload()).unwrap();
                    enc.finish().unwrap();
                }
                archive.add_granule(&granule, &payload);
            }
        }
        archive
    }

    async fn pipeline_with(temp_dir: &TempDir, archive: &MemoryArchive) -> Pipeline {
        let config = CacheConfig::with_cache_root(temp_dir.path().to_path_buf());
        let cache = Arc::new(CacheManager::new(config).await.unwrap());
        let scheduler = Scheduler::new(
            SchedulerConfig::testing(),
            Arc::clone(&cache),
            Arc::new(archive.connector()),
        )
        .unwrap();
        let decode = DecodeStage::new(
            DecodeConfig {
                pool_size: 2,
                reproject: false,
            },
            cache,
        );
        Pipeline::new(Product::new("H09", &[13]), 10, scheduler, decode)
    }

    #[tokio::test]
    async fn test_end_to_end_fetch_decode_emit() {
        let temp_dir = TempDir::new().unwrap();
        let product = Product::new("H09", &[13]);
        let archive = stocked_archive(&product, &[(0, 0), (0, 10), (0, 20)]);
        let pipeline = pipeline_with(&temp_dir, &archive).await;

        let mut sink = VecSink::default();
        let summary = pipeline.run(ts(0, 0), ts(0, 30), &mut sink).await.unwrap();

        assert_eq!(summary.fetch.fetched, 3);
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.failed, 0);
        assert!(!summary.aborted());

        assert_eq!(sink.frames.len(), 3);
        assert_eq!(sink.frames[0].timestamp, ts(0, 0));
        assert_eq!(sink.frames[2].timestamp, ts(0, 20));
    }

    #[tokio::test]
    async fn test_missing_granule_skips_only_its_step() {
        let temp_dir = TempDir::new().unwrap();
        let product = Product::new("H09", &[13]);
        // 00:10 is absent from the archive
        let archive = stocked_archive(&product, &[(0, 0), (0, 20)]);
        archive.add_empty_dir(&GranuleRef::new("H09", ts(0, 10), 13).remote_dir());
        let pipeline = pipeline_with(&temp_dir, &archive).await;

        let mut sink = VecSink::default();
        let summary = pipeline.run(ts(0, 0), ts(0, 30), &mut sink).await.unwrap();

        assert_eq!(summary.fetch.failed_permanently, 1);
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(sink.frames.len(), 2);
    }

    #[tokio::test]
    async fn test_second_run_reuses_the_cache() {
        let temp_dir = TempDir::new().unwrap();
        let product = Product::new("H09", &[13]);
        let archive = stocked_archive(&product, &[(0, 0), (0, 10)]);
        let pipeline = pipeline_with(&temp_dir, &archive).await;

        let mut sink = VecSink::default();
        pipeline.run(ts(0, 0), ts(0, 20), &mut sink).await.unwrap();
        let downloads = archive.download_calls();

        let mut sink = VecSink::default();
        let summary = pipeline.run(ts(0, 0), ts(0, 20), &mut sink).await.unwrap();

        assert_eq!(summary.fetch.cached, 2);
        assert_eq!(summary.fetch.fetched, 0);
        assert_eq!(archive.download_calls(), downloads);
        assert_eq!(sink.frames.len(), 2);
    }

    #[tokio::test]
    async fn test_fatal_abort_emits_no_frames() {
        let temp_dir = TempDir::new().unwrap();
        let product = Product::new("H09", &[13]);
        let archive = stocked_archive(&product, &[(0, 0), (0, 10)]);
        archive.refuse_connections(TransferErrorKind::Auth);
        let pipeline = pipeline_with(&temp_dir, &archive).await;

        let mut sink = VecSink::default();
        let summary = pipeline.run(ts(0, 0), ts(0, 20), &mut sink).await.unwrap();

        assert!(summary.aborted());
        assert_eq!(summary.fetch.not_attempted, 2);
        assert_eq!(summary.frames, 0);
        assert!(sink.frames.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_range_is_rejected_before_io() {
        let temp_dir = TempDir::new().unwrap();
        let archive = MemoryArchive::new();
        let pipeline = pipeline_with(&temp_dir, &archive).await;

        let mut sink = VecSink::default();
        let result = pipeline.run(ts(1, 0), ts(0, 0), &mut sink).await;

        assert!(result.is_err());
        assert_eq!(archive.connect_calls(), 0);
    }
}

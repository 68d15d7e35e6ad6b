//! Scheduler behavior tests against the in-memory transport

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use crate::app::cache::{CacheConfig, CacheManager};
use crate::app::models::{FetchOutcome, GranuleRef};
use crate::app::transfer::memory::{MemoryArchive, TransferErrorKind};

use super::{Scheduler, SchedulerConfig};

fn granule(hour: u32, minute: u32, band: u8) -> GranuleRef {
    let timestamp = Utc.with_ymd_and_hms(2025, 3, 10, hour, minute, 0).unwrap();
    GranuleRef::new("H09", timestamp, band)
}

async fn scheduler_with(
    temp_dir: &TempDir,
    archive: &MemoryArchive,
    config: SchedulerConfig,
) -> Scheduler {
    let cache = Arc::new(
        CacheManager::new(CacheConfig::with_cache_root(temp_dir.path().to_path_buf()))
            .await
            .unwrap(),
    );
    Scheduler::new(config, cache, Arc::new(archive.connector())).unwrap()
}

#[tokio::test]
async fn every_requested_granule_gets_an_outcome() {
    let temp_dir = TempDir::new().unwrap();
    let archive = MemoryArchive::new();

    let ok = granule(0, 0, 1);
    let missing = granule(0, 0, 2);
    let flaky = granule(0, 10, 1);

    archive.add_granule(&ok, b"bytes for band one");
    archive.add_granule(&flaky, b"bytes that never arrive");
    archive.fail_downloads(flaky.remote_path(), 10);

    let scheduler = scheduler_with(&temp_dir, &archive, SchedulerConfig::testing()).await;
    let outcome = scheduler
        .run(vec![ok.clone(), missing.clone(), flaky.clone()])
        .await;

    assert!(!outcome.aborted());
    assert_eq!(outcome.report.len(), 3);
    assert_eq!(
        outcome.report.outcome(&ok),
        Some(&FetchOutcome::Fetched { bytes: 18 })
    );
    assert!(matches!(
        outcome.report.outcome(&missing),
        Some(FetchOutcome::FailedPermanently { .. })
    ));
    assert!(matches!(
        outcome.report.outcome(&flaky),
        Some(FetchOutcome::FailedRetriesExhausted { attempts: 3, .. })
    ));
}

#[tokio::test]
async fn second_run_issues_no_transfer_operations() {
    let temp_dir = TempDir::new().unwrap();
    let archive = MemoryArchive::new();

    let granules = vec![granule(3, 0, 1), granule(3, 0, 13), granule(3, 10, 1)];
    for g in &granules {
        archive.add_granule(g, b"granule payload");
    }

    let scheduler = scheduler_with(&temp_dir, &archive, SchedulerConfig::testing()).await;
    let first = scheduler.run(granules.clone()).await;
    assert_eq!(first.report.summary().fetched, 3);

    let calls_after_first = (archive.connect_calls(), archive.list_calls(), archive.download_calls());

    let second = scheduler.run(granules.clone()).await;
    assert_eq!(second.report.summary().cached, 3);
    assert_eq!(
        (archive.connect_calls(), archive.list_calls(), archive.download_calls()),
        calls_after_first,
        "cache hits must not touch the network"
    );
}

#[tokio::test]
async fn transient_failures_use_exactly_max_attempts() {
    let temp_dir = TempDir::new().unwrap();
    let archive = MemoryArchive::new();

    let g = granule(6, 0, 7);
    archive.add_granule(&g, b"unreachable payload");
    archive.fail_all_downloads();

    let scheduler = scheduler_with(&temp_dir, &archive, SchedulerConfig::testing()).await;
    let outcome = scheduler.run(vec![g.clone()]).await;

    assert!(matches!(
        outcome.report.outcome(&g),
        Some(FetchOutcome::FailedRetriesExhausted { attempts: 3, .. })
    ));
    assert_eq!(archive.download_calls(), 3);
}

#[tokio::test]
async fn retry_succeeds_after_transient_failure() {
    let temp_dir = TempDir::new().unwrap();
    let archive = MemoryArchive::new();

    let g = granule(6, 10, 3);
    archive.add_granule(&g, b"eventually delivered");
    archive.fail_downloads(g.remote_path(), 2);

    let scheduler = scheduler_with(&temp_dir, &archive, SchedulerConfig::testing()).await;
    let outcome = scheduler.run(vec![g.clone()]).await;

    assert!(matches!(
        outcome.report.outcome(&g),
        Some(FetchOutcome::Fetched { .. })
    ));
    assert_eq!(archive.download_calls(), 3);
}

#[tokio::test]
async fn failed_transfers_leave_no_files_behind() {
    let temp_dir = TempDir::new().unwrap();
    let archive = MemoryArchive::new();

    let g = granule(9, 0, 13);
    archive.add_granule(&g, b"will always be cut short");
    archive.fail_all_downloads();

    let scheduler = scheduler_with(&temp_dir, &archive, SchedulerConfig::testing()).await;
    let outcome = scheduler.run(vec![g.clone()]).await;
    assert!(matches!(
        outcome.report.outcome(&g),
        Some(FetchOutcome::FailedRetriesExhausted { .. })
    ));

    // Neither a final file nor a partial may survive a failed acquisition
    let mut files = Vec::new();
    let mut stack = vec![temp_dir.path().to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let entry = entry.unwrap();
            if entry.file_type().unwrap().is_dir() {
                stack.push(entry.path());
            } else {
                files.push(entry.path());
            }
        }
    }
    files.retain(|p| {
        p.file_name()
            .map(|n| n != crate::constants::files::CACHE_INDEX_FILE)
            .unwrap_or(true)
    });
    assert!(files.is_empty(), "unexpected files: {:?}", files);
}

#[tokio::test]
async fn auth_failure_aborts_the_run() {
    let temp_dir = TempDir::new().unwrap();
    let archive = MemoryArchive::new();
    archive.refuse_connections(TransferErrorKind::Auth);

    let granules = vec![granule(12, 0, 1), granule(12, 0, 2), granule(12, 10, 1)];
    let scheduler = scheduler_with(&temp_dir, &archive, SchedulerConfig::testing()).await;
    let outcome = scheduler.run(granules.clone()).await;

    assert!(outcome.aborted());
    for g in &granules {
        assert_eq!(outcome.report.outcome(g), Some(&FetchOutcome::NotAttempted));
    }
    assert_eq!(archive.download_calls(), 0);
}

#[tokio::test]
async fn connect_failure_aborts_the_run() {
    let temp_dir = TempDir::new().unwrap();
    let archive = MemoryArchive::new();
    archive.refuse_connections(TransferErrorKind::Connect);

    let g = granule(15, 0, 4);
    let scheduler = scheduler_with(&temp_dir, &archive, SchedulerConfig::testing()).await;
    let outcome = scheduler.run(vec![g]).await;

    assert!(outcome.aborted());
    assert_eq!(outcome.report.summary().not_attempted, 1);
}

#[tokio::test]
async fn cancellation_marks_everything_not_attempted() {
    let temp_dir = TempDir::new().unwrap();
    let archive = MemoryArchive::new();

    let granules = vec![granule(18, 0, 1), granule(18, 10, 1)];
    for g in &granules {
        archive.add_granule(g, b"never wanted");
    }

    let scheduler = scheduler_with(&temp_dir, &archive, SchedulerConfig::testing()).await;
    scheduler.cancel_flag().set();
    let outcome = scheduler.run(granules.clone()).await;

    assert!(!outcome.aborted());
    for g in &granules {
        assert_eq!(outcome.report.outcome(g), Some(&FetchOutcome::NotAttempted));
    }
    assert_eq!(archive.connect_calls(), 0);
    assert_eq!(archive.download_calls(), 0);
}

#[tokio::test]
async fn multiple_workers_share_the_queue() {
    let temp_dir = TempDir::new().unwrap();
    let archive = MemoryArchive::new();

    let granules: Vec<GranuleRef> = (0..12).map(|i| granule(i % 24, 0, 1)).collect();
    for g in &granules {
        archive.add_granule(g, b"shared queue payload");
    }

    let config = SchedulerConfig::testing().with_worker_count(4);
    let scheduler = scheduler_with(&temp_dir, &archive, config).await;
    let outcome = scheduler.run(granules.clone()).await;

    let summary = outcome.report.summary();
    assert_eq!(summary.total(), granules.len());
    assert_eq!(summary.fetched, granules.len());
    // Each worker opens at most one session
    assert!(archive.connect_calls() <= 4);
}

#[tokio::test]
async fn empty_request_is_a_noop() {
    let temp_dir = TempDir::new().unwrap();
    let archive = MemoryArchive::new();

    let scheduler = scheduler_with(&temp_dir, &archive, SchedulerConfig::testing()).await;
    let outcome = scheduler.run(Vec::new()).await;

    assert!(outcome.report.is_empty());
    assert!(!outcome.aborted());
    assert_eq!(archive.connect_calls(), 0);
}

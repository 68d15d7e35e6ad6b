//! Decode stage integration tests
//!
//! Exercise the full path from cached granule files to emitted frames,
//! using synthetic granules written straight into a temporary cache tree.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use crate::app::cache::{CacheConfig, CacheManager};
use crate::app::models::{FetchOutcome, FetchReport, GranuleRef};

use super::grid::tests::test_projection;
use super::hsd::synth::SynthGranule;
use super::stage::{DecodeConfig, DecodeStage, TimeStepOutcome};

fn granule(hour: u32, minute: u32, band: u8) -> GranuleRef {
    let ts = Utc.with_ymd_and_hms(2025, 3, 10, hour, minute, 0).unwrap();
    GranuleRef::new("H09", ts, band)
}

async fn cache_at(dir: &TempDir) -> Arc<CacheManager> {
    let config = CacheConfig::with_cache_root(dir.path().to_path_buf());
    Arc::new(CacheManager::new(config).await.unwrap())
}

/// Write a synthetic granule at the cache path the stage will read from
fn write_granule(cache: &CacheManager, granule: &GranuleRef, width: usize, count: u16) {
    let synth = SynthGranule::uniform(
        granule.timestamp,
        granule.band,
        test_projection(width, width),
        count,
    );
    synth.write_to(&cache.file_path(granule));
}

fn stage_config() -> DecodeConfig {
    DecodeConfig {
        pool_size: 2,
        reproject: false,
    }
}

fn timestamps(output: &[(DateTime<Utc>, TimeStepOutcome)]) -> Vec<DateTime<Utc>> {
    output.iter().map(|(ts, _)| *ts).collect()
}

#[tokio::test]
async fn test_complete_bundles_become_frames() {
    let temp_dir = TempDir::new().unwrap();
    let cache = cache_at(&temp_dir).await;

    let mut report = FetchReport::new();
    for minute in [0, 10, 20] {
        for band in [7u8, 13] {
            let g = granule(0, minute, band);
            write_granule(&cache, &g, 8, 100 + band as u16);
            report.record(g, FetchOutcome::Fetched { bytes: 128 });
        }
    }

    let stage = DecodeStage::new(stage_config(), cache);
    let output = stage.process(&report).await;

    assert_eq!(output.len(), 3);
    for (_, outcome) in &output {
        match outcome {
            TimeStepOutcome::Frame(frame) => assert_eq!(frame.label, "b13"),
            other => panic!("expected a frame, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_incomplete_time_step_is_skipped_not_dropped() {
    let temp_dir = TempDir::new().unwrap();
    let cache = cache_at(&temp_dir).await;

    // One hour at ten-minute cadence, two bands per step. Band 7 at 00:20
    // never made it down.
    let mut report = FetchReport::new();
    for minute in [0, 10, 20, 30, 40, 50] {
        for band in [7u8, 13] {
            let g = granule(0, minute, band);
            if minute == 20 && band == 7 {
                report.record(
                    g,
                    FetchOutcome::FailedRetriesExhausted {
                        attempts: 3,
                        last_error: "connection interrupted".to_string(),
                    },
                );
            } else {
                write_granule(&cache, &g, 8, 200);
                report.record(g, FetchOutcome::CachedHit);
            }
        }
    }
    assert_eq!(report.len(), 12);

    let stage = DecodeStage::new(stage_config(), cache);
    let output = stage.process(&report).await;

    assert_eq!(output.len(), 6, "every time step gets exactly one entry");
    let frames = output.iter().filter(|(_, o)| o.is_frame()).count();
    assert_eq!(frames, 5);

    let skipped_ts = Utc.with_ymd_and_hms(2025, 3, 10, 0, 20, 0).unwrap();
    let (_, outcome) = output.iter().find(|(ts, _)| *ts == skipped_ts).unwrap();
    match outcome {
        TimeStepOutcome::SkippedIncomplete { missing } => assert_eq!(missing, &vec![7]),
        other => panic!("expected a skip, got {:?}", other),
    }
}

#[tokio::test]
async fn test_emission_stays_ordered_when_completion_is_not() {
    let temp_dir = TempDir::new().unwrap();
    let cache = cache_at(&temp_dir).await;

    // Early time steps carry much larger grids, so with a wide pool the
    // later, smaller bundles decode first
    let mut report = FetchReport::new();
    let widths = [64usize, 48, 32, 16, 8, 4];
    for (step, width) in widths.into_iter().enumerate() {
        let g = granule(0, step as u32 * 10, 13);
        write_granule(&cache, &g, width, 300);
        report.record(g, FetchOutcome::Fetched { bytes: 64 });
    }

    let config = DecodeConfig {
        pool_size: 4,
        reproject: false,
    };
    let stage = DecodeStage::new(config, cache);
    let output = stage.process(&report).await;

    let ts = timestamps(&output);
    let mut sorted = ts.clone();
    sorted.sort();
    assert_eq!(ts, sorted);
    assert_eq!(ts.len(), 6);
    assert!(output.iter().all(|(_, o)| o.is_frame()));
}

#[tokio::test]
async fn test_metadata_mismatch_fails_the_time_step() {
    let temp_dir = TempDir::new().unwrap();
    let cache = cache_at(&temp_dir).await;

    let g = granule(1, 0, 13);
    // File on disk claims band 7 despite its band-13 name
    let synth = SynthGranule::uniform(g.timestamp, 7, test_projection(8, 8), 100);
    synth.write_to(&cache.file_path(&g));

    let mut report = FetchReport::new();
    report.record(g, FetchOutcome::CachedHit);

    let stage = DecodeStage::new(stage_config(), cache);
    let output = stage.process(&report).await;

    assert_eq!(output.len(), 1);
    match &output[0].1 {
        TimeStepOutcome::Failed { error } => assert!(error.contains("band 7")),
        other => panic!("expected a failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_corrupt_file_fails_only_its_time_step() {
    let temp_dir = TempDir::new().unwrap();
    let cache = cache_at(&temp_dir).await;

    let good = granule(2, 0, 13);
    write_granule(&cache, &good, 8, 100);
    let bad = granule(2, 10, 13);
    let bad_path = cache.file_path(&bad);
    std::fs::create_dir_all(bad_path.parent().unwrap()).unwrap();
    std::fs::write(&bad_path, b"not a granule").unwrap();

    let mut report = FetchReport::new();
    report.record(good, FetchOutcome::CachedHit);
    report.record(bad, FetchOutcome::CachedHit);

    let stage = DecodeStage::new(stage_config(), cache);
    let output = stage.process(&report).await;

    assert_eq!(output.len(), 2);
    assert!(output[0].1.is_frame());
    assert!(matches!(output[1].1, TimeStepOutcome::Failed { .. }));
}

#[tokio::test]
async fn test_reprojection_path_produces_frames() {
    let temp_dir = TempDir::new().unwrap();
    let cache = cache_at(&temp_dir).await;

    let g = granule(3, 0, 13);
    write_granule(&cache, &g, 16, 150);

    let mut report = FetchReport::new();
    report.record(g, FetchOutcome::Fetched { bytes: 64 });

    let config = DecodeConfig {
        pool_size: 1,
        reproject: true,
    };
    let stage = DecodeStage::new(config, cache);
    let output = stage.process(&report).await;

    assert_eq!(output.len(), 1);
    match &output[0].1 {
        TimeStepOutcome::Frame(frame) => {
            assert_eq!(frame.width, 16);
            assert_eq!(frame.height, 16);
        }
        other => panic!("expected a frame, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_report_emits_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let cache = cache_at(&temp_dir).await;

    let stage = DecodeStage::new(stage_config(), cache);
    let output = stage.process(&FetchReport::new()).await;
    assert!(output.is_empty());
}

//! Data models for Himawari Fetcher
//!
//! This module defines the core data structures used throughout the pipeline:
//! granule identity, fetch outcomes, the per-run fetch report, and the
//! per-timestamp bundle consumed by the decode stage.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{files, product};
use crate::errors::{CatalogError, CatalogResult};

/// Identity of one remote granule file
///
/// A granule is one (satellite, timestamp, band) slice of a full-disk scene.
/// Remote and local paths are derived from the archive's date-partitioned
/// naming convention at construction time and never change afterwards.
/// Equality and hashing use only the identifying triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GranuleRef {
    /// Satellite identifier as it appears in file names (e.g. "H09")
    pub satellite: String,
    /// Observation timestamp (fixed-interval timeline)
    pub timestamp: DateTime<Utc>,
    /// Spectral band number (1-16)
    pub band: u8,
    /// Derived remote path on the archive
    remote_path: String,
    /// Derived cache-relative local path
    local_rel_path: PathBuf,
}

impl GranuleRef {
    /// Create a granule reference, deriving remote and local paths
    pub fn new(satellite: &str, timestamp: DateTime<Utc>, band: u8) -> Self {
        let file_name = Self::format_file_name(satellite, timestamp, band);
        let remote_path = format!("{}/{}", Self::remote_dir_for(timestamp), file_name);
        let local_rel_path = PathBuf::from(format!(
            "{:04}{:02}{:02}/{:02}",
            timestamp.year(),
            timestamp.month(),
            timestamp.day(),
            timestamp.hour()
        ))
        .join(&file_name);

        GranuleRef {
            satellite: satellite.to_string(),
            timestamp,
            band,
            remote_path,
            local_rel_path,
        }
    }

    /// Remote directory for a timestamp: `/jma/hsd/{YYYYMM}/{DD}/{HH}`
    pub fn remote_dir_for(timestamp: DateTime<Utc>) -> String {
        format!(
            "{}/{:04}{:02}/{:02}/{:02}",
            crate::constants::ARCHIVE_ROOT,
            timestamp.year(),
            timestamp.month(),
            timestamp.day(),
            timestamp.hour()
        )
    }

    /// Granule file name: `HS_{sat}_{YYYYMMDD}_{HHMM}_B{bb}_FLDK.DAT.bz2`
    pub fn format_file_name(satellite: &str, timestamp: DateTime<Utc>, band: u8) -> String {
        format!(
            "HS_{}_{:04}{:02}{:02}_{:02}{:02}_B{:02}_{}{}",
            satellite,
            timestamp.year(),
            timestamp.month(),
            timestamp.day(),
            timestamp.hour(),
            timestamp.minute(),
            band,
            product::FULL_DISK,
            files::GRANULE_EXTENSION,
        )
    }

    /// Parse a granule file name back into (satellite, timestamp, band)
    ///
    /// Accepts an optional trailing segment field (`_S0101`) before the
    /// extension, which some archive mirrors include.
    pub fn parse_file_name(name: &str) -> CatalogResult<(String, DateTime<Utc>, u8)> {
        let invalid = || CatalogError::InvalidFilename {
            name: name.to_string(),
        };

        let stem = name.strip_suffix(files::GRANULE_EXTENSION).ok_or_else(invalid)?;
        let parts: Vec<&str> = stem.split('_').collect();
        if parts.len() < 6 || parts[0] != "HS" {
            return Err(invalid());
        }

        let satellite = parts[1].to_string();
        let date = NaiveDate::parse_from_str(parts[2], "%Y%m%d").map_err(|_| invalid())?;
        let time = NaiveTime::parse_from_str(parts[3], "%H%M").map_err(|_| invalid())?;
        let band_part = parts[4].strip_prefix('B').ok_or_else(invalid)?;
        let band: u8 = band_part.parse().map_err(|_| invalid())?;
        if parts[5] != product::FULL_DISK {
            return Err(invalid());
        }

        let timestamp = Utc.from_utc_datetime(&NaiveDateTime::new(date, time));
        Ok((satellite, timestamp, band))
    }

    /// Remote path on the archive
    pub fn remote_path(&self) -> &str {
        &self.remote_path
    }

    /// Remote directory containing this granule
    pub fn remote_dir(&self) -> String {
        Self::remote_dir_for(self.timestamp)
    }

    /// File name component of the paths
    pub fn file_name(&self) -> &str {
        self.remote_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.remote_path)
    }

    /// Cache-relative local path (mirrors the remote partitioning)
    pub fn local_rel_path(&self) -> &Path {
        &self.local_rel_path
    }

    /// Absolute local path under a cache root
    pub fn local_path(&self, cache_root: &Path) -> PathBuf {
        cache_root.join(&self.local_rel_path)
    }
}

impl fmt::Display for GranuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} B{:02}",
            self.satellite,
            self.timestamp.format("%Y-%m-%d %H:%M"),
            self.band
        )
    }
}

impl PartialEq for GranuleRef {
    fn eq(&self, other: &Self) -> bool {
        self.satellite == other.satellite
            && self.timestamp == other.timestamp
            && self.band == other.band
    }
}

impl Eq for GranuleRef {}

impl Hash for GranuleRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.satellite.hash(state);
        self.timestamp.hash(state);
        self.band.hash(state);
    }
}

impl PartialOrd for GranuleRef {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GranuleRef {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.timestamp, self.band, &self.satellite).cmp(&(
            other.timestamp,
            other.band,
            &other.satellite,
        ))
    }
}

/// Terminal outcome of acquiring one granule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Valid local copy already present; no network transfer issued
    CachedHit,
    /// Downloaded and promoted into the cache during this run
    Fetched { bytes: u64 },
    /// Permanent failure (e.g. missing on the archive); not retried
    FailedPermanently { reason: String },
    /// All retry attempts exhausted
    FailedRetriesExhausted { attempts: u32, last_error: String },
    /// Run was cancelled before this granule was attempted
    NotAttempted,
}

impl FetchOutcome {
    /// True if a usable local file exists for the granule
    pub fn is_available(&self) -> bool {
        matches!(self, FetchOutcome::CachedHit | FetchOutcome::Fetched { .. })
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOutcome::CachedHit => write!(f, "cached"),
            FetchOutcome::Fetched { bytes } => write!(f, "fetched ({bytes} bytes)"),
            FetchOutcome::FailedPermanently { reason } => write!(f, "failed: {reason}"),
            FetchOutcome::FailedRetriesExhausted {
                attempts,
                last_error,
            } => write!(f, "failed after {attempts} attempts: {last_error}"),
            FetchOutcome::NotAttempted => write!(f, "not attempted"),
        }
    }
}

/// Complete accounting of one scheduler run
///
/// Covers every requested granule exactly once, success or failure, so the
/// caller can always distinguish "skip this time step" from "pipeline died".
#[derive(Debug, Default)]
pub struct FetchReport {
    outcomes: HashMap<GranuleRef, FetchOutcome>,
}

impl FetchReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the terminal outcome for a granule
    pub fn record(&mut self, granule: GranuleRef, outcome: FetchOutcome) {
        self.outcomes.insert(granule, outcome);
    }

    pub fn outcome(&self, granule: &GranuleRef) -> Option<&FetchOutcome> {
        self.outcomes.get(granule)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GranuleRef, &FetchOutcome)> {
        self.outcomes.iter()
    }

    /// Granules with a usable local file
    pub fn available(&self) -> impl Iterator<Item = &GranuleRef> {
        self.outcomes
            .iter()
            .filter(|(_, o)| o.is_available())
            .map(|(g, _)| g)
    }

    /// Group the report into per-timestamp bundles, ordered by timestamp
    pub fn bundles(&self) -> Vec<TimeStepBundle> {
        let mut by_ts: BTreeMap<DateTime<Utc>, Vec<GranuleRef>> = BTreeMap::new();
        for granule in self.outcomes.keys() {
            by_ts
                .entry(granule.timestamp)
                .or_default()
                .push(granule.clone());
        }

        by_ts
            .into_iter()
            .map(|(timestamp, mut granules)| {
                granules.sort();
                TimeStepBundle {
                    timestamp,
                    granules,
                }
            })
            .collect()
    }

    /// Aggregate counts per outcome kind
    pub fn summary(&self) -> FetchSummary {
        let mut summary = FetchSummary::default();
        for outcome in self.outcomes.values() {
            match outcome {
                FetchOutcome::CachedHit => summary.cached += 1,
                FetchOutcome::Fetched { bytes } => {
                    summary.fetched += 1;
                    summary.bytes_fetched += bytes;
                }
                FetchOutcome::FailedPermanently { .. } => summary.failed_permanently += 1,
                FetchOutcome::FailedRetriesExhausted { .. } => summary.failed_retries += 1,
                FetchOutcome::NotAttempted => summary.not_attempted += 1,
            }
        }
        summary
    }
}

/// Aggregate outcome counts for reporting
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchSummary {
    pub cached: usize,
    pub fetched: usize,
    pub failed_permanently: usize,
    pub failed_retries: usize,
    pub not_attempted: usize,
    pub bytes_fetched: u64,
}

impl FetchSummary {
    pub fn total(&self) -> usize {
        self.cached
            + self.fetched
            + self.failed_permanently
            + self.failed_retries
            + self.not_attempted
    }
}

impl fmt::Display for FetchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} granules: {} cached, {} fetched ({} bytes), {} missing, {} failed, {} not attempted",
            self.total(),
            self.cached,
            self.fetched,
            self.bytes_fetched,
            self.failed_permanently,
            self.failed_retries,
            self.not_attempted
        )
    }
}

/// The granules needed to decode one output time step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeStepBundle {
    /// Observation timestamp shared by all members
    pub timestamp: DateTime<Utc>,
    /// Member granules, sorted by band
    pub granules: Vec<GranuleRef>,
}

impl TimeStepBundle {
    /// A bundle is complete iff every member has a usable local file
    pub fn is_complete(&self, report: &FetchReport) -> bool {
        self.granules
            .iter()
            .all(|g| report.outcome(g).is_some_and(|o| o.is_available()))
    }

    /// Bands whose granules are not locally available
    pub fn missing_bands(&self, report: &FetchReport) -> Vec<u8> {
        self.granules
            .iter()
            .filter(|g| !report.outcome(g).is_some_and(|o| o.is_available()))
            .map(|g| g.band)
            .collect()
    }
}

//! Granule catalog: pure expansion of a time range into expected granules
//!
//! The catalog computes the set of remote granules a request implies without
//! touching the network. Time is encoded in the archive's path and file name
//! conventions, so the mapping is deterministic and unit-testable offline.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::app::models::GranuleRef;
use crate::constants::product;
use crate::errors::{CatalogError, CatalogResult};

/// A product definition: which satellite and which bands make up one
/// complete time step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    /// Satellite identifier used in granule names (e.g. "H09")
    pub satellite: String,
    /// Bands required per time step, ascending
    pub bands: Vec<u8>,
}

impl Product {
    pub fn new(satellite: &str, bands: &[u8]) -> Self {
        let mut bands = bands.to_vec();
        bands.sort_unstable();
        bands.dedup();
        Product {
            satellite: satellite.to_string(),
            bands,
        }
    }
}

impl Default for Product {
    fn default() -> Self {
        Product::new(product::DEFAULT_SATELLITE, product::DEFAULT_BANDS)
    }
}

/// Expand a half-open time range `[start, end)` into granule references
///
/// Output is strictly increasing by timestamp (bands ascending within one
/// timestamp) and contains `ceil((end - start) / interval)` timestamps.
///
/// # Errors
///
/// Returns `CatalogError::InvalidRange` when `end < start` or
/// `interval_minutes == 0`.
pub fn expand(
    product: &Product,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    interval_minutes: u32,
) -> CatalogResult<Vec<GranuleRef>> {
    if interval_minutes == 0 {
        return Err(CatalogError::InvalidRange {
            reason: "interval must be greater than zero minutes".to_string(),
        });
    }
    if end < start {
        return Err(CatalogError::InvalidRange {
            reason: format!("end time {end} is before start time {start}"),
        });
    }

    let interval = Duration::minutes(i64::from(interval_minutes));
    let mut granules = Vec::new();
    let mut current = start;
    while current < end {
        for &band in &product.bands {
            granules.push(GranuleRef::new(&product.satellite, current, band));
        }
        current += interval;
    }

    debug!(
        "Expanded {} -> {} at {}min into {} granules ({} bands)",
        start,
        end,
        interval_minutes,
        granules.len(),
        product.bands.len()
    );
    Ok(granules)
}

/// Scan an existing cache tree for granule files of a product
///
/// Walks the date-partitioned directory layout and parses granule file names
/// back into references, skipping foreign files and temp artifacts. Used by
/// the `process` command to run the decode stage over already-fetched data.
pub fn scan_cache(cache_root: &Path, product: &Product) -> CatalogResult<Vec<GranuleRef>> {
    let mut found = Vec::new();
    scan_dir(cache_root, product, &mut found)?;
    found.sort();
    found.dedup();
    debug!(
        "Cache scan found {} granules under {}",
        found.len(),
        cache_root.display()
    );
    Ok(found)
}

fn scan_dir(dir: &Path, product: &Product, found: &mut Vec<GranuleRef>) -> CatalogResult<()> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        // An absent cache is just an empty scan result
        Err(_) => return Ok(()),
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            scan_dir(&path, product, found)?;
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Ok((satellite, timestamp, band)) = GranuleRef::parse_file_name(name) {
            if satellite == product.satellite && product.bands.contains(&band) {
                found.push(GranuleRef::new(&satellite, timestamp, band));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, h, m, 0).unwrap()
    }

    #[test]
    fn test_expand_count_and_order() {
        let product = Product::new("H09", &[1, 2]);
        let granules = expand(&product, ts(0, 0), ts(1, 0), 10).unwrap();

        // 6 timestamps x 2 bands
        assert_eq!(granules.len(), 12);

        // Strictly non-decreasing timestamps, strictly increasing over bands
        for pair in granules.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert_eq!(granules[0].timestamp, ts(0, 0));
        assert_eq!(granules.last().unwrap().timestamp, ts(0, 50));
    }

    #[test]
    fn test_expand_ceiling_semantics() {
        let product = Product::new("H09", &[13]);

        // 25 minutes at 10min interval -> ceil(25/10) = 3 timestamps
        let granules = expand(&product, ts(0, 0), ts(0, 25), 10).unwrap();
        assert_eq!(granules.len(), 3);

        // Empty range
        let granules = expand(&product, ts(0, 0), ts(0, 0), 10).unwrap();
        assert!(granules.is_empty());
    }

    #[test]
    fn test_expand_rejects_invalid_ranges() {
        let product = Product::default();

        assert!(matches!(
            expand(&product, ts(1, 0), ts(0, 0), 10),
            Err(CatalogError::InvalidRange { .. })
        ));
        assert!(matches!(
            expand(&product, ts(0, 0), ts(1, 0), 0),
            Err(CatalogError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_expand_is_deterministic() {
        let product = Product::default();
        let a = expand(&product, ts(0, 0), ts(2, 0), 10).unwrap();
        let b = expand(&product, ts(0, 0), ts(2, 0), 10).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_product_bands_normalized() {
        let product = Product::new("H09", &[13, 1, 13, 3]);
        assert_eq!(product.bands, vec![1, 3, 13]);
    }

    #[test]
    fn test_scan_cache_finds_only_matching_granules() {
        let tmp = tempfile::tempdir().unwrap();
        let g = GranuleRef::new("H09", ts(3, 20), 13);
        let path = g.local_path(tmp.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"x").unwrap();
        // A foreign file and a temp artifact to skip
        std::fs::write(tmp.path().join("notes.txt"), b"x").unwrap();
        std::fs::write(
            path.with_extension("bz2.part"),
            b"x",
        )
        .unwrap();

        let product = Product::new("H09", &[13]);
        let found = scan_cache(tmp.path(), &product).unwrap();
        assert_eq!(found, vec![g]);

        // Band not in the product is filtered out
        let product_b1 = Product::new("H09", &[1]);
        assert!(scan_cache(tmp.path(), &product_b1).unwrap().is_empty());
    }
}

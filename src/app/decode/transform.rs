//! Reprojection and frame compositing
//!
//! Decoded bands arrive on the satellite's geostationary scan grid. This
//! module resamples them onto a regular latitude/longitude grid and then
//! flattens one time step's bands into a displayable frame: an RGB
//! true-colour composite when the visible bands are present, otherwise an
//! inverted infrared grayscale.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::constants::product;
use crate::errors::{TransformError, TransformResult};

use super::grid::{bilinear_interpolate, GeosProjection, Grid};
use super::hsd::DecodedBand;

/// Pixel buffers for an emitted frame, row-major, 8 bits per channel
#[derive(Debug, Clone, PartialEq)]
pub enum FramePixels {
    Rgb(Vec<u8>),
    Gray(Vec<u8>),
}

/// One fully processed time step, ready for an output sink
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub timestamp: DateTime<Utc>,
    /// Rendering applied, e.g. "truecolor" or "b13"
    pub label: String,
    pub width: usize,
    pub height: usize,
    pub pixels: FramePixels,
}

impl DecodedFrame {
    pub fn channel_count(&self) -> usize {
        match self.pixels {
            FramePixels::Rgb(_) => 3,
            FramePixels::Gray(_) => 1,
        }
    }
}

/// Resample a band from its scan grid onto a regular lat/lon grid
///
/// The output keeps the source dimensions. Each output cell is the bilinear
/// sample of the scan grid at its geographic centre; cells that fall outside
/// the visible disk come out as NaN.
pub fn reproject_to_geographic(grid: &Grid, projection: &GeosProjection) -> TransformResult<Grid> {
    if grid.width != projection.width || grid.height != projection.height {
        return Err(TransformError::ShapeMismatch {
            reason: format!(
                "pixel grid {}x{} does not match projection {}x{}",
                grid.width, grid.height, projection.width, projection.height
            ),
        });
    }

    let (min_lon, min_lat, max_lon, max_lat) = projection.geographic_bounds();
    if !(min_lon < max_lon && min_lat < max_lat) {
        return Err(TransformError::InvalidTargetGrid {
            reason: format!(
                "degenerate bounds lon [{:.2}, {:.2}] lat [{:.2}, {:.2}]",
                min_lon, max_lon, min_lat, max_lat
            ),
        });
    }

    let width = grid.width;
    let height = grid.height;
    let lon_step = (max_lon - min_lon) / width as f64;
    let lat_step = (max_lat - min_lat) / height as f64;

    let mut values = Vec::with_capacity(width * height);
    for row in 0..height {
        // North at the top of the output grid
        let lat = max_lat - (row as f64 + 0.5) * lat_step;
        for col in 0..width {
            let lon = min_lon + (col as f64 + 0.5) * lon_step;
            let value = match projection.geo_to_grid(lat, lon) {
                Some((i, j)) => bilinear_interpolate(&grid.values, width, height, i, j),
                None => f32::NAN,
            };
            values.push(value);
        }
    }

    Ok(Grid::new(width, height, values))
}

/// Compose one time step's bands into a frame
///
/// Prefers a true-colour composite from bands 3/2/1; falls back to an
/// inverted grayscale of the thermal infrared band. All participating bands
/// must share the same grid shape.
pub fn compose_frame(
    timestamp: DateTime<Utc>,
    bands: &HashMap<u8, Grid>,
) -> TransformResult<DecodedFrame> {
    if bands.is_empty() {
        return Err(TransformError::CompositeFailed {
            reason: "no bands decoded for this time step".to_string(),
        });
    }
    check_shapes(bands)?;

    let have_true_color = product::TRUE_COLOR_BANDS
        .iter()
        .all(|b| bands.contains_key(b));
    if have_true_color {
        return compose_true_color(timestamp, bands);
    }

    let ir = bands
        .get(&product::IR_BAND)
        .ok_or(TransformError::MissingBand {
            band: product::IR_BAND,
        })?;
    Ok(compose_infrared(timestamp, ir))
}

fn check_shapes(bands: &HashMap<u8, Grid>) -> TransformResult<()> {
    let mut shape: Option<(usize, usize)> = None;
    for (band, grid) in bands {
        match shape {
            None => shape = Some((grid.width, grid.height)),
            Some((w, h)) if (grid.width, grid.height) != (w, h) => {
                return Err(TransformError::ShapeMismatch {
                    reason: format!(
                        "band {} is {}x{}, expected {}x{}",
                        band, grid.width, grid.height, w, h
                    ),
                });
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn compose_true_color(
    timestamp: DateTime<Utc>,
    bands: &HashMap<u8, Grid>,
) -> TransformResult<DecodedFrame> {
    let channels: Vec<&Grid> = product::TRUE_COLOR_BANDS
        .iter()
        .map(|b| &bands[b])
        .collect();
    let width = channels[0].width;
    let height = channels[0].height;

    // Shared stretch across the three channels keeps their balance
    let mut lo = f32::MAX;
    let mut hi = f32::MIN;
    for grid in &channels {
        if let Some((g_lo, g_hi)) = grid.finite_range() {
            lo = lo.min(g_lo);
            hi = hi.max(g_hi);
        }
    }
    if lo > hi {
        return Err(TransformError::CompositeFailed {
            reason: "every visible-band pixel is off-disk".to_string(),
        });
    }

    let mut rgb = Vec::with_capacity(width * height * 3);
    for idx in 0..width * height {
        for grid in &channels {
            rgb.push(stretch(grid.values[idx], lo, hi));
        }
    }

    Ok(DecodedFrame {
        timestamp,
        label: "truecolor".to_string(),
        width,
        height,
        pixels: FramePixels::Rgb(rgb),
    })
}

fn compose_infrared(timestamp: DateTime<Utc>, grid: &Grid) -> DecodedFrame {
    let (lo, hi) = grid.finite_range().unwrap_or((0.0, 1.0));
    // Cold cloud tops render white; off-disk pixels stay black
    let gray: Vec<u8> = grid
        .values
        .iter()
        .map(|&v| if v.is_finite() { 255 - stretch(v, lo, hi) } else { 0 })
        .collect();

    DecodedFrame {
        timestamp,
        label: format!("b{:02}", product::IR_BAND),
        width: grid.width,
        height: grid.height,
        pixels: FramePixels::Gray(gray),
    }
}

/// Map a value to 0..=255 over the given range; NaN maps to 0
fn stretch(value: f32, lo: f32, hi: f32) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    if hi <= lo {
        return 128;
    }
    let norm = ((value - lo) / (hi - lo)).clamp(0.0, 1.0);
    (norm * 255.0).round() as u8
}

/// Reproject a decoded band in place of its scan-grid pixels
pub fn reprojected_grid(band: &DecodedBand) -> TransformResult<Grid> {
    reproject_to_geographic(&band.grid, &band.projection)
}

//! Row-major f32 grids and normalized geostationary geometry
//!
//! The projection maps between grid indices, scan angles and geographic
//! coordinates for a satellite parked over the equator. Navigation constants
//! (COFF/LOFF column and line offsets, CFAC/LFAC scaling factors) follow the
//! LRIT/HRIT convention used by the granule headers.

/// A single-band raster in row-major order, NaN for invalid pixels
#[derive(Debug, Clone)]
pub struct Grid {
    pub width: usize,
    pub height: usize,
    pub values: Vec<f32>,
}

impl Grid {
    pub fn new(width: usize, height: usize, values: Vec<f32>) -> Self {
        debug_assert_eq!(values.len(), width * height);
        Self {
            width,
            height,
            values,
        }
    }

    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            values: vec![value; width * height],
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.values[y * self.width + x]
    }

    /// Minimum and maximum over finite values, None when fully invalid
    pub fn finite_range(&self) -> Option<(f32, f32)> {
        let mut range: Option<(f32, f32)> = None;
        for &v in &self.values {
            if v.is_finite() {
                range = Some(match range {
                    Some((lo, hi)) => (lo.min(v), hi.max(v)),
                    None => (v, v),
                });
            }
        }
        range
    }
}

/// Bilinear interpolation over a row-major grid
///
/// Returns NaN out of bounds or when any of the four corners is NaN.
pub fn bilinear_interpolate(data: &[f32], width: usize, height: usize, x: f64, y: f64) -> f32 {
    if x < 0.0 || y < 0.0 {
        return f32::NAN;
    }
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    if x0 >= width || y0 >= height {
        return f32::NAN;
    }
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let xf = (x - x0 as f64) as f32;
    let yf = (y - y0 as f64) as f32;

    let v00 = data[y0 * width + x0];
    let v10 = data[y0 * width + x1];
    let v01 = data[y1 * width + x0];
    let v11 = data[y1 * width + x1];

    if v00.is_nan() || v10.is_nan() || v01.is_nan() || v11.is_nan() {
        return f32::NAN;
    }

    let top = v00 * (1.0 - xf) + v10 * xf;
    let bottom = v01 * (1.0 - xf) + v11 * xf;
    top * (1.0 - yf) + bottom * yf
}

/// Normalized geostationary projection for one granule's grid
#[derive(Debug, Clone, PartialEq)]
pub struct GeosProjection {
    /// Longitude of the sub-satellite point (degrees east)
    pub sub_lon_deg: f64,
    /// Column offset of the image center (pixels)
    pub coff: f64,
    /// Line offset of the image center (pixels)
    pub loff: f64,
    /// Column scaling factor (pixels per 2^16 degrees of scan angle)
    pub cfac: f64,
    /// Line scaling factor (pixels per 2^16 degrees of scan angle)
    pub lfac: f64,
    /// Distance from Earth center to satellite (meters)
    pub distance_m: f64,
    /// Earth semi-major axis (meters)
    pub req_m: f64,
    /// Earth semi-minor axis (meters)
    pub rpol_m: f64,
    /// Grid width in pixels
    pub width: usize,
    /// Grid height in pixels
    pub height: usize,
}

const SCALING: f64 = 65536.0;

impl GeosProjection {
    /// Convert grid indices to scan angles in radians
    #[inline]
    pub fn grid_to_scan(&self, i: f64, j: f64) -> (f64, f64) {
        let x_deg = (i - self.coff) * SCALING / self.cfac;
        let y_deg = (j - self.loff) * SCALING / self.lfac;
        (x_deg.to_radians(), y_deg.to_radians())
    }

    /// Convert scan angles in radians to grid indices
    #[inline]
    pub fn scan_to_grid(&self, x_rad: f64, y_rad: f64) -> (f64, f64) {
        let i = self.coff + x_rad.to_degrees() * self.cfac / SCALING;
        let j = self.loff + y_rad.to_degrees() * self.lfac / SCALING;
        (i, j)
    }

    /// Convert scan angles to geographic coordinates (lat, lon in degrees)
    ///
    /// Returns None when the scan angle misses the Earth.
    pub fn scan_to_geo(&self, x_rad: f64, y_rad: f64) -> Option<(f64, f64)> {
        let sin_x = x_rad.sin();
        let cos_x = x_rad.cos();
        let sin_y = y_rad.sin();
        let cos_y = y_rad.cos();
        let ratio2 = (self.req_m / self.rpol_m).powi(2);

        let a = sin_x.powi(2) + cos_x.powi(2) * (cos_y.powi(2) + ratio2 * sin_y.powi(2));
        let b = -2.0 * self.distance_m * cos_x * cos_y;
        let c = self.distance_m.powi(2) - self.req_m.powi(2);

        let discriminant = b * b - 4.0 * a * c;
        if discriminant < 0.0 {
            return None;
        }

        let rs = (-b - discriminant.sqrt()) / (2.0 * a);
        let sx = rs * cos_x * cos_y;
        let sy = -rs * sin_x;
        let sz = rs * cos_x * sin_y;

        let lat = (ratio2 * sz / (self.distance_m - sx).hypot(sy)).atan();
        let lon = self.sub_lon_deg.to_radians() - sy.atan2(self.distance_m - sx);

        Some((lat.to_degrees(), lon.to_degrees()))
    }

    /// Convert geographic coordinates to scan angles
    ///
    /// Returns None when the point is beyond the Earth's limb.
    pub fn geo_to_scan(&self, lat_deg: f64, lon_deg: f64) -> Option<(f64, f64)> {
        let lat_rad = lat_deg.to_radians();
        let lon_rad = lon_deg.to_radians();
        let sub_lon_rad = self.sub_lon_deg.to_radians();

        let dlon = lon_rad - sub_lon_rad;
        let cos_c = lat_rad.cos() * dlon.cos();
        let horizon_angle = (self.req_m / self.distance_m).acos();
        if cos_c.acos() > horizon_angle {
            return None;
        }

        // Geocentric latitude on the oblate ellipsoid
        let phi_c = ((self.rpol_m / self.req_m).powi(2) * lat_rad.tan()).atan();
        let e2 = 1.0 - (self.rpol_m / self.req_m).powi(2);
        let rc = self.rpol_m / (1.0 - e2 * phi_c.cos().powi(2)).sqrt();

        let sx = self.distance_m - rc * phi_c.cos() * dlon.cos();
        let sy = -rc * phi_c.cos() * dlon.sin();
        let sz = rc * phi_c.sin();

        if sx <= 0.0 {
            return None;
        }

        let y_rad = sz.atan2(sx.hypot(sy));
        let x_rad = (-sy).atan2(sx);
        Some((x_rad, y_rad))
    }

    /// Geographic coordinates to fractional grid indices, None off-disk
    pub fn geo_to_grid(&self, lat_deg: f64, lon_deg: f64) -> Option<(f64, f64)> {
        let (x, y) = self.geo_to_scan(lat_deg, lon_deg)?;
        Some(self.scan_to_grid(x, y))
    }

    /// Grid indices to geographic coordinates, None off-disk
    pub fn grid_to_geo(&self, i: f64, j: f64) -> Option<(f64, f64)> {
        let (x, y) = self.grid_to_scan(i, j);
        self.scan_to_geo(x, y)
    }

    /// Approximate geographic bounds (min_lon, min_lat, max_lon, max_lat)
    ///
    /// Samples the grid edges; the projected disk has curved edges so this
    /// is a bounding box, not an exact outline.
    pub fn geographic_bounds(&self) -> (f64, f64, f64, f64) {
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lon = f64::MAX;
        let mut max_lon = f64::MIN;

        let samples = 50;
        let nx = self.width as f64 - 1.0;
        let ny = self.height as f64 - 1.0;
        for t in 0..=samples {
            let frac = t as f64 / samples as f64;
            let edges = [
                (frac * nx, 0.0),
                (frac * nx, ny),
                (0.0, frac * ny),
                (nx, frac * ny),
            ];
            for (i, j) in edges {
                if let Some((lat, lon)) = self.grid_to_geo(i, j) {
                    min_lat = min_lat.min(lat);
                    max_lat = max_lat.max(lat);
                    min_lon = min_lon.min(lon);
                    max_lon = max_lon.max(lon);
                }
            }
        }

        // Fall back to the sub-satellite hemisphere when every edge sample
        // missed the disk (tiny grids near the limb)
        if min_lat > max_lat {
            (self.sub_lon_deg - 80.0, -80.0, self.sub_lon_deg + 80.0, 80.0)
        } else {
            (min_lon, min_lat, max_lon, max_lat)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Small full-disk-style projection centered on 140.7E
    pub(crate) fn test_projection(width: usize, height: usize) -> GeosProjection {
        GeosProjection {
            sub_lon_deg: 140.7,
            coff: width as f64 / 2.0,
            loff: height as f64 / 2.0,
            // ~17.7 degree full-disk scan spread over the grid
            cfac: width as f64 * SCALING / 17.7,
            lfac: height as f64 * SCALING / 17.7,
            distance_m: 42_164_000.0,
            req_m: 6_378_137.0,
            rpol_m: 6_356_752.3,
            width,
            height,
        }
    }

    #[test]
    fn test_nadir_maps_to_grid_center() {
        let proj = test_projection(100, 100);
        let (i, j) = proj.geo_to_grid(0.0, 140.7).expect("nadir is visible");
        assert!((i - 50.0).abs() < 0.01, "i = {}", i);
        assert!((j - 50.0).abs() < 0.01, "j = {}", j);
    }

    #[test]
    fn test_geo_grid_roundtrip() {
        let proj = test_projection(500, 500);
        let (lat, lon) = (35.6, 139.7);
        let (i, j) = proj.geo_to_grid(lat, lon).expect("Tokyo is visible");
        let (lat2, lon2) = proj.grid_to_geo(i, j).expect("grid point on disk");
        assert!((lat - lat2).abs() < 0.05, "{} vs {}", lat, lat2);
        assert!((lon - lon2).abs() < 0.05, "{} vs {}", lon, lon2);
    }

    #[test]
    fn test_far_side_not_visible() {
        let proj = test_projection(100, 100);
        // Antipode of the sub-satellite point
        assert!(proj.geo_to_scan(0.0, -39.3).is_none());
    }

    #[test]
    fn test_grid_corner_off_disk() {
        let proj = test_projection(100, 100);
        // The image corner lies outside the Earth disk
        assert!(proj.grid_to_geo(0.0, 0.0).is_none());
    }

    #[test]
    fn test_bounds_cover_nadir() {
        let proj = test_projection(200, 200);
        let (min_lon, min_lat, max_lon, max_lat) = proj.geographic_bounds();
        assert!(min_lon < 140.7 && 140.7 < max_lon);
        assert!(min_lat < 0.0 && 0.0 < max_lat);
    }

    #[test]
    fn test_bilinear_center() {
        let data = vec![1.0, 2.0, 3.0, 4.0];
        let center = bilinear_interpolate(&data, 2, 2, 0.5, 0.5);
        assert!((center - 2.5).abs() < 0.001);
    }

    #[test]
    fn test_bilinear_nan_propagates() {
        let data = vec![1.0, f32::NAN, 3.0, 4.0];
        assert!(bilinear_interpolate(&data, 2, 2, 0.5, 0.5).is_nan());
    }

    #[test]
    fn test_bilinear_out_of_bounds() {
        let data = vec![1.0, 2.0, 3.0, 4.0];
        assert!(bilinear_interpolate(&data, 2, 2, -0.5, 0.0).is_nan());
        assert!(bilinear_interpolate(&data, 2, 2, 2.5, 0.0).is_nan());
    }

    #[test]
    fn test_grid_finite_range() {
        let grid = Grid::new(2, 2, vec![1.0, f32::NAN, -3.0, 4.0]);
        assert_eq!(grid.finite_range(), Some((-3.0, 4.0)));

        let empty = Grid::filled(2, 2, f32::NAN);
        assert_eq!(empty.finite_range(), None);
    }
}

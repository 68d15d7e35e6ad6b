//! Decoder for bzip2-compressed standard-format granule segments
//!
//! A granule is a bzip2 stream wrapping a chain of header blocks followed by
//! the pixel payload. Each block starts with a 3-byte header: block number
//! (u8) and total block length (u16 LE, header included). The subset read
//! here covers the basic info, data info, projection and calibration blocks;
//! unknown block numbers are skipped by length. Pixel samples are u16 LE
//! counts with two sentinels: `0xFFFF` for detector errors and `0xFFFE` for
//! pixels outside the scan area, both decoded to NaN. Remaining counts map
//! to physical values through the linear calibration `gain * count + offset`.

use std::io::Read;
use std::path::Path;

use bytes::{Buf, Bytes};
use chrono::{DateTime, TimeZone, Utc};

use crate::constants::hsd;
use crate::errors::{DecodeError, DecodeResult};

use super::grid::{GeosProjection, Grid};

/// One decoded granule: calibrated pixels plus navigation
#[derive(Debug, Clone)]
pub struct DecodedBand {
    pub satellite: String,
    pub timestamp: DateTime<Utc>,
    pub band: u8,
    pub grid: Grid,
    pub projection: GeosProjection,
}

#[derive(Debug)]
struct BasicInfo {
    satellite: String,
    timestamp: DateTime<Utc>,
    band: u8,
}

#[derive(Debug)]
struct DataInfo {
    width: usize,
    height: usize,
    bits_per_pixel: u16,
}

#[derive(Debug)]
struct ProjectionInfo {
    sub_lon_deg: f64,
    coff: f64,
    loff: f64,
    cfac: f64,
    lfac: f64,
    distance_m: f64,
    req_m: f64,
    rpol_m: f64,
}

#[derive(Debug)]
struct Calibration {
    gain: f64,
    offset: f64,
}

/// Decode a granule file from disk
///
/// Blocking; run it on a blocking pool from async contexts.
pub fn decode_file(path: &Path) -> DecodeResult<DecodedBand> {
    let file = std::fs::File::open(path).map_err(|_| DecodeError::Unreadable {
        path: path.to_path_buf(),
    })?;

    let mut payload = Vec::new();
    bzip2::read::BzDecoder::new(file)
        .read_to_end(&mut payload)
        .map_err(|e| DecodeError::Decompression {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    decode_payload(Bytes::from(payload))
}

/// Decode an already-decompressed granule payload
pub fn decode_payload(mut buf: Bytes) -> DecodeResult<DecodedBand> {
    let mut basic: Option<BasicInfo> = None;
    let mut data_info: Option<DataInfo> = None;
    let mut projection: Option<ProjectionInfo> = None;
    let mut calibration: Option<Calibration> = None;

    loop {
        if buf.remaining() < 3 {
            return Err(DecodeError::InvalidHeader {
                reason: "header block chain ended without an end block".to_string(),
            });
        }
        let block_number = buf.get_u8();
        let block_length = buf.get_u16_le() as usize;
        if block_length < 3 {
            return Err(DecodeError::InvalidHeader {
                reason: format!("block {} declares length {}", block_number, block_length),
            });
        }
        let body_len = block_length - 3;
        if buf.remaining() < body_len {
            return Err(DecodeError::InvalidHeader {
                reason: format!(
                    "block {} body truncated ({} of {} bytes)",
                    block_number,
                    buf.remaining(),
                    body_len
                ),
            });
        }
        let mut body = buf.split_to(body_len);

        match block_number {
            hsd::BLOCK_BASIC => basic = Some(parse_basic(&mut body)?),
            hsd::BLOCK_DATA => data_info = Some(parse_data_info(&mut body)?),
            hsd::BLOCK_PROJECTION => projection = Some(parse_projection(&mut body)?),
            hsd::BLOCK_CALIBRATION => calibration = Some(parse_calibration(&mut body)?),
            hsd::BLOCK_END => break,
            // Blocks outside the decoded subset are skipped by length
            _ => {}
        }
    }

    let basic = basic.ok_or_else(|| missing_block("basic info"))?;
    let data_info = data_info.ok_or_else(|| missing_block("data info"))?;
    let projection = projection.ok_or_else(|| missing_block("projection"))?;
    let calibration = calibration.ok_or_else(|| missing_block("calibration"))?;

    if data_info.bits_per_pixel != 16 {
        return Err(DecodeError::InvalidHeader {
            reason: format!("unsupported bit depth {}", data_info.bits_per_pixel),
        });
    }

    let pixel_count = data_info.width * data_info.height;
    let available = buf.remaining() / 2;
    if available < pixel_count {
        return Err(DecodeError::TruncatedData {
            expected: pixel_count,
            found: available,
        });
    }

    let mut values = Vec::with_capacity(pixel_count);
    for _ in 0..pixel_count {
        let count = buf.get_u16_le();
        let value = match count {
            hsd::ERROR_COUNT | hsd::OUTSIDE_COUNT => f32::NAN,
            c => (calibration.gain * c as f64 + calibration.offset) as f32,
        };
        values.push(value);
    }

    let geos = GeosProjection {
        sub_lon_deg: projection.sub_lon_deg,
        coff: projection.coff,
        loff: projection.loff,
        cfac: projection.cfac,
        lfac: projection.lfac,
        distance_m: projection.distance_m,
        req_m: projection.req_m,
        rpol_m: projection.rpol_m,
        width: data_info.width,
        height: data_info.height,
    };

    Ok(DecodedBand {
        satellite: basic.satellite,
        timestamp: basic.timestamp,
        band: basic.band,
        grid: Grid::new(data_info.width, data_info.height, values),
        projection: geos,
    })
}

fn missing_block(name: &str) -> DecodeError {
    DecodeError::InvalidHeader {
        reason: format!("{} block absent", name),
    }
}

fn require(body: &Bytes, len: usize, block: &str) -> DecodeResult<()> {
    if body.remaining() < len {
        return Err(DecodeError::InvalidHeader {
            reason: format!("{} block too short", block),
        });
    }
    Ok(())
}

fn parse_basic(body: &mut Bytes) -> DecodeResult<BasicInfo> {
    require(body, 8 + 7, "basic info")?;

    let mut name_bytes = [0u8; 8];
    body.copy_to_slice(&mut name_bytes);
    let satellite = String::from_utf8_lossy(&name_bytes)
        .trim_end_matches([' ', '\0'])
        .to_string();

    let year = body.get_u16_le() as i32;
    let month = body.get_u8() as u32;
    let day = body.get_u8() as u32;
    let hour = body.get_u8() as u32;
    let minute = body.get_u8() as u32;
    let band = body.get_u8();

    let timestamp = Utc
        .with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .ok_or_else(|| DecodeError::InvalidHeader {
            reason: format!(
                "invalid observation time {}-{:02}-{:02} {:02}:{:02}",
                year, month, day, hour, minute
            ),
        })?;

    Ok(BasicInfo {
        satellite,
        timestamp,
        band,
    })
}

fn parse_data_info(body: &mut Bytes) -> DecodeResult<DataInfo> {
    require(body, 6, "data info")?;
    let width = body.get_u16_le() as usize;
    let height = body.get_u16_le() as usize;
    let bits_per_pixel = body.get_u16_le();

    if width == 0 || height == 0 {
        return Err(DecodeError::InvalidHeader {
            reason: format!("degenerate grid {}x{}", width, height),
        });
    }

    Ok(DataInfo {
        width,
        height,
        bits_per_pixel,
    })
}

fn parse_projection(body: &mut Bytes) -> DecodeResult<ProjectionInfo> {
    require(body, 8 * 8, "projection")?;
    Ok(ProjectionInfo {
        sub_lon_deg: body.get_f64_le(),
        coff: body.get_f64_le(),
        loff: body.get_f64_le(),
        cfac: body.get_f64_le(),
        lfac: body.get_f64_le(),
        distance_m: body.get_f64_le(),
        req_m: body.get_f64_le(),
        rpol_m: body.get_f64_le(),
    })
}

fn parse_calibration(body: &mut Bytes) -> DecodeResult<Calibration> {
    require(body, 16, "calibration")?;
    Ok(Calibration {
        gain: body.get_f64_le(),
        offset: body.get_f64_le(),
    })
}


#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    use super::super::grid::tests::test_projection;
    use super::synth::SynthGranule;
    use super::*;

    fn sample_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 2, 30, 0).unwrap()
    }

    #[test]
    fn test_roundtrip_through_bz2_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("granule.DAT.bz2");

        let mut synth = SynthGranule::uniform(sample_time(), 13, test_projection(8, 8), 100);
        synth.gain = 0.5;
        synth.offset = 200.0;
        synth.write_to(&path);

        let band = decode_file(&path).unwrap();
        assert_eq!(band.satellite, "H09");
        assert_eq!(band.timestamp, sample_time());
        assert_eq!(band.band, 13);
        assert_eq!(band.grid.width, 8);
        assert_eq!(band.grid.height, 8);
        // gain * 100 + offset
        assert!((band.grid.get(3, 3) - 250.0).abs() < 1e-4);
        assert_eq!(band.projection, test_projection(8, 8));
    }

    #[test]
    fn test_sentinel_counts_become_nan() {
        let mut synth = SynthGranule::uniform(sample_time(), 1, test_projection(2, 2), 10);
        synth.counts = vec![10, hsd::ERROR_COUNT, hsd::OUTSIDE_COUNT, 20];

        let band = decode_payload(Bytes::from(synth.payload())).unwrap();
        assert_eq!(band.grid.get(0, 0), 10.0);
        assert!(band.grid.get(1, 0).is_nan());
        assert!(band.grid.get(0, 1).is_nan());
        assert_eq!(band.grid.get(1, 1), 20.0);
    }

    #[test]
    fn test_truncated_pixels_rejected() {
        let mut synth = SynthGranule::uniform(sample_time(), 1, test_projection(4, 4), 10);
        synth.counts.truncate(10);

        let result = decode_payload(Bytes::from(synth.payload()));
        assert!(matches!(
            result,
            Err(DecodeError::TruncatedData {
                expected: 16,
                found: 10
            })
        ));
    }

    #[test]
    fn test_missing_end_block_rejected() {
        let synth = SynthGranule::uniform(sample_time(), 1, test_projection(2, 2), 10);
        let payload = synth.payload();
        // Drop everything from the end block onward
        let end_pos = payload.len() - 2 * 4 - 3;
        let result = decode_payload(Bytes::copy_from_slice(&payload[..end_pos]));
        assert!(matches!(result, Err(DecodeError::InvalidHeader { .. })));
    }

    #[test]
    fn test_garbage_file_is_decompression_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("garbage.DAT.bz2");
        std::fs::write(&path, b"this is not bzip2 data").unwrap();

        let result = decode_file(&path);
        assert!(matches!(result, Err(DecodeError::Decompression { .. })));
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let result = decode_file(Path::new("/nonexistent/granule.DAT.bz2"));
        assert!(matches!(result, Err(DecodeError::Unreadable { .. })));
    }

    #[test]
    fn test_unknown_blocks_are_skipped() {
        let synth = SynthGranule::uniform(sample_time(), 4, test_projection(2, 2), 42);
        let payload = synth.payload();

        // Splice an unknown block (number 9) in front of the chain
        let mut spliced = vec![9u8, 8, 0, 1, 2, 3, 4, 5];
        spliced.extend_from_slice(&payload);

        let band = decode_payload(Bytes::from(spliced)).unwrap();
        assert_eq!(band.band, 4);
        assert_eq!(band.grid.get(0, 0), 42.0);
    }
}

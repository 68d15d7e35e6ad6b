//! PNG frame emission
//!
//! The bundled [`FrameSink`] implementation: renders each frame into a
//! date-partitioned PNG tree, `{output_root}/{YYYYMMDD}/{YYYYMMDD_HHMM}_{label}.png`.

use std::path::{Path, PathBuf};

use image::{GrayImage, RgbImage};
use tracing::info;

use crate::app::decode::{DecodedFrame, FramePixels};
use crate::app::pipeline::FrameSink;
use crate::errors::{EmitError, Result};

/// Writes frames as PNG files under a root directory
#[derive(Debug)]
pub struct PngSink {
    output_root: PathBuf,
    written: usize,
}

impl PngSink {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            written: 0,
        }
    }

    /// Number of frames written so far
    pub fn written(&self) -> usize {
        self.written
    }

    /// Destination path for a frame
    pub fn frame_path(&self, frame: &DecodedFrame) -> PathBuf {
        let day = frame.timestamp.format("%Y%m%d").to_string();
        let stamp = frame.timestamp.format("%Y%m%d_%H%M").to_string();
        self.output_root
            .join(day)
            .join(format!("{}_{}.png", stamp, frame.label))
    }

    fn write_frame(&self, frame: &DecodedFrame, path: &Path) -> std::result::Result<(), EmitError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let width = frame.width as u32;
        let height = frame.height as u32;
        match &frame.pixels {
            FramePixels::Rgb(data) => {
                let img = RgbImage::from_raw(width, height, data.clone()).ok_or_else(|| {
                    EmitError::Encoding {
                        reason: format!(
                            "RGB buffer of {} bytes does not fit {}x{}",
                            data.len(),
                            width,
                            height
                        ),
                    }
                })?;
                img.save(path).map_err(|e| EmitError::Encoding {
                    reason: e.to_string(),
                })?;
            }
            FramePixels::Gray(data) => {
                let img = GrayImage::from_raw(width, height, data.clone()).ok_or_else(|| {
                    EmitError::Encoding {
                        reason: format!(
                            "grayscale buffer of {} bytes does not fit {}x{}",
                            data.len(),
                            width,
                            height
                        ),
                    }
                })?;
                img.save(path).map_err(|e| EmitError::Encoding {
                    reason: e.to_string(),
                })?;
            }
        }
        Ok(())
    }
}

impl FrameSink for PngSink {
    fn emit(&mut self, frame: &DecodedFrame) -> Result<()> {
        let path = self.frame_path(frame);
        self.write_frame(frame, &path)?;
        self.written += 1;
        info!("Wrote {}", path.display());
        Ok(())
    }
}

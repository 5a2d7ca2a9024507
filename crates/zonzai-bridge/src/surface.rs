//! Display surfaces the host image buffer is presented on.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::framebuffer::{frame_len, HostFrameBuffer, BYTES_PER_PIXEL};

/// Whether the surface is cleared before each blit.
///
/// The blit itself is always a full overwrite (no alpha compositing). `Accumulate` only matters
/// where the frame does not cover the whole surface: whatever was drawn there before is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlitMode {
    #[default]
    ClearBeforeDraw,
    Accumulate,
}

pub trait DisplaySurface {
    fn resize(&mut self, width: u32, height: u32);

    fn present(&mut self, frame: &HostFrameBuffer, mode: BlitMode);
}

/// In-memory RGBA surface.
#[derive(Debug, Clone, Default)]
pub struct ImageSurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    presented: u64,
}

impl ImageSurface {
    pub fn new(width: u32, height: u32) -> Self {
        let mut surface = Self::default();
        surface.resize(width, height);
        surface
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Number of frames presented since creation.
    pub fn presented(&self) -> u64 {
        self.presented
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let px = self.pixels.get(idx..idx + BYTES_PER_PIXEL)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    pub fn to_rgba_image(&self) -> Option<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
    }

    /// Writes the current surface contents as a PNG.
    pub fn save_png(&self, path: &Path) -> Result<(), BridgeError> {
        if self.width == 0 || self.height == 0 {
            return Err(BridgeError::Image(format!(
                "surface is empty ({}x{})",
                self.width, self.height
            )));
        }
        let img = self
            .to_rgba_image()
            .ok_or_else(|| BridgeError::Image("invalid image data".into()))?;
        img.save(path)
            .map_err(|e| BridgeError::Image(format!("{}: {e}", path.display())))
    }
}

impl DisplaySurface for ImageSurface {
    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixels = vec![0; frame_len(width, height).unwrap_or(0)];
    }

    fn present(&mut self, frame: &HostFrameBuffer, mode: BlitMode) {
        if mode == BlitMode::ClearBeforeDraw {
            self.pixels.fill(0);
        }

        // Clip the frame to the surface; both are anchored at the origin.
        let rows = frame.height().min(self.height) as usize;
        let row_bytes = frame.width().min(self.width) as usize * BYTES_PER_PIXEL;
        let src_stride = frame.width() as usize * BYTES_PER_PIXEL;
        let dst_stride = self.width as usize * BYTES_PER_PIXEL;
        let src = frame.pixels();
        for row in 0..rows {
            let s = row * src_stride;
            let d = row * dst_stride;
            self.pixels[d..d + row_bytes].copy_from_slice(&src[s..s + row_bytes]);
        }
        self.presented += 1;
    }
}

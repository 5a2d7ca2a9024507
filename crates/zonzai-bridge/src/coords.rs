//! Device (display) pointer coordinates to engine coordinates.

use serde::{Deserialize, Serialize};

/// Pointer position as reported by the display, relative to the host window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePoint {
    pub x: i32,
    pub y: i32,
}

impl DevicePoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Pointer position in the engine's coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EnginePoint {
    pub x: i32,
    pub y: i32,
}

impl EnginePoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinateTransform {
    /// Top-left corner of the canvas inside the host window.
    pub viewport_offset: (i32, i32),
    /// Engine origin is bottom-left rather than top-left.
    pub flip_y: bool,
    pub width: u32,
    pub height: u32,
}

impl CoordinateTransform {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            viewport_offset: (0, 0),
            flip_y: false,
            width,
            height,
        }
    }

    pub fn with_offset(mut self, x: i32, y: i32) -> Self {
        self.viewport_offset = (x, y);
        self
    }

    pub fn with_flip_y(mut self, flip_y: bool) -> Self {
        self.flip_y = flip_y;
        self
    }

    pub fn set_dimensions(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Returns `None` for points outside the canvas.
    pub fn to_engine(&self, point: DevicePoint) -> Option<EnginePoint> {
        let x = i64::from(point.x) - i64::from(self.viewport_offset.0);
        let y = i64::from(point.y) - i64::from(self.viewport_offset.1);
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return None;
        }
        let y = if self.flip_y {
            i64::from(self.height) - 1 - y
        } else {
            y
        };
        // Both coordinates are now within `u32` dimensions that came from an `i32`-sized canvas.
        Some(EnginePoint::new(
            i32::try_from(x).ok()?,
            i32::try_from(y).ok()?,
        ))
    }
}

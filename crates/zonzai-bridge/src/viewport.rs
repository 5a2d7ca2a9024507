//! Startup/resize handling: target canvas size, engine notification, buffer reallocation.

use serde::{Deserialize, Serialize};

use crate::coords::CoordinateTransform;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::framebuffer::HostFrameBuffer;
use crate::surface::DisplaySurface;

/// How the usable canvas is derived from the display viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViewportPolicy {
    /// The canvas is the whole display viewport.
    #[default]
    Exact,
    /// Grid modes: subtract a fixed UI chrome strip from the height, then floor both dimensions
    /// to a multiple of `cell_size`.
    Chrome { chrome_height: u32, cell_size: u32 },
}

impl ViewportPolicy {
    pub fn target_dimensions(&self, display_width: u32, display_height: u32) -> (u32, u32) {
        match *self {
            ViewportPolicy::Exact => (display_width, display_height),
            ViewportPolicy::Chrome {
                chrome_height,
                cell_size,
            } => {
                let cell = cell_size.max(1);
                let width = display_width / cell * cell;
                let height = display_height.saturating_sub(chrome_height) / cell * cell;
                (width, height)
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Viewport {
    policy: ViewportPolicy,
    dimensions: Option<(u32, u32)>,
}

impl Viewport {
    pub fn new(policy: ViewportPolicy) -> Self {
        Self {
            policy,
            dimensions: None,
        }
    }

    pub fn policy(&self) -> ViewportPolicy {
        self.policy
    }

    /// Dimensions applied by the last successful [`Viewport::apply`].
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    /// Recomputes the canvas size for `display` and propagates it.
    ///
    /// The engine is told first so that its buffers are large enough before the next tick. The
    /// host buffer and surface are always reallocated, even when the size is unchanged.
    pub fn apply<E, S>(
        &mut self,
        engine: &mut E,
        framebuffer: &mut HostFrameBuffer,
        surface: &mut S,
        transform: &mut CoordinateTransform,
        display: (u32, u32),
    ) -> Result<(u32, u32), EngineError>
    where
        E: Engine + ?Sized,
        S: DisplaySurface + ?Sized,
    {
        let (display_width, display_height) = display;
        let (width, height) = self.policy.target_dimensions(display_width, display_height);
        engine.set_window_dimensions(width, height)?;
        framebuffer.resize(width, height);
        surface.resize(width, height);
        transform.set_dimensions(width, height);

        if self.dimensions != Some((width, height)) {
            tracing::info!(
                display_width,
                display_height,
                width,
                height,
                "viewport resized"
            );
        }
        self.dimensions = Some((width, height));
        Ok((width, height))
    }
}

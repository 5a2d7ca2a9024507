//! Host-side bridge for sandboxed simulation engines.
//!
//! An engine is a separately compiled WebAssembly module that owns its simulation state and
//! renders RGBA frames into its own linear memory. The host owns everything else: the display
//! surface, the input devices, and the render loop. This crate is the glue between the two:
//!
//! - [`Engine`]: the function/memory contract, implemented by [`WasmtimeEngine`] and the
//!   in-process [`engine::fake::FakeEngine`]
//! - [`transfer_frame`]: per-frame copy of the engine's output buffer into a [`HostFrameBuffer`]
//! - [`InputStateMachine`]: click/drag/hover classification of pointer events
//! - [`marshal_pattern`]: alloc + copy + select protocol for seed patterns
//! - [`FrameScheduler`] and [`FpsMeter`]: render-loop scheduling and frame telemetry
//! - [`Viewport`]: resize handling
//!
//! [`BridgeContext`] ties them together for one engine session.

pub mod clock;
pub mod config;
pub mod context;
pub mod coords;
pub mod engine;
mod error;
pub mod framebuffer;
pub mod input;
pub mod memory;
pub mod pattern;
pub mod scheduler;
pub mod surface;
pub mod telemetry;
pub mod viewport;

pub use clock::{FakeHostClock, HostClock, StdHostClock};
pub use config::{BridgeConfig, FpsConfig, ScheduleConfig};
pub use context::{wall_clock_seed, BridgeContext, DevicePointerEvent, PollReport};
pub use coords::{CoordinateTransform, DevicePoint, EnginePoint};
pub use engine::{
    Engine, EngineOptions, ExportNames, ExportPreset, MemoryImport, WasmtimeEngine,
};
pub use error::{BridgeError, ConfigError, EngineError, MemoryAccessError, PatternError, Result};
pub use framebuffer::{transfer_frame, HostFrameBuffer, TransferOutcome, TransferStats};
pub use input::{transition, EngineCommand, GesturePhase, InputStateMachine, PointerEvent, PointerState};
pub use memory::{MemoryView, MemoryViewMut, WASM_PAGE_SIZE};
pub use pattern::{
    marshal_pattern, validate_rle, PatternCatalog, PatternHandle, PatternSelection, SeedPattern,
    BUILTIN_PATTERNS,
};
pub use scheduler::{FrameScheduler, OverrunPolicy, ScheduleStrategy};
pub use surface::{BlitMode, DisplaySurface, ImageSurface};
pub use telemetry::{FpsMeter, FpsPrecision, FpsReading, FrameTimingWindow, FRAME_TIMING_CAPACITY};
pub use viewport::{Viewport, ViewportPolicy};

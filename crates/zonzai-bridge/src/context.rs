//! The single object that owns all bridge state for one engine session.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::clock::HostClock;
use crate::config::BridgeConfig;
use crate::coords::{CoordinateTransform, DevicePoint};
use crate::engine::Engine;
use crate::error::{ConfigError, EngineError, PatternError};
use crate::framebuffer::{transfer_frame, HostFrameBuffer, TransferOutcome, TransferStats};
use crate::input::{Commands, InputStateMachine, PointerEvent, PointerState};
use crate::pattern::{PatternCatalog, PatternHandle, PatternSelection};
use crate::scheduler::FrameScheduler;
use crate::surface::{BlitMode, DisplaySurface};
use crate::telemetry::{FpsMeter, FpsReading};
use crate::viewport::Viewport;

/// Pointer activity in display coordinates, before the coordinate transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DevicePointerEvent {
    Down { x: i32, y: i32 },
    Move { x: i32, y: i32 },
    Up { x: i32, y: i32 },
    Leave,
}

/// What one [`BridgeContext::poll`] did.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PollReport {
    pub frames_run: u32,
    /// Outcome of the last transfer, if any frame ran.
    pub last_transfer: Option<TransferOutcome>,
    /// Present only when the FPS report cadence elapsed and data exists.
    pub fps: Option<FpsReading>,
    pub next_deadline: Option<Duration>,
}

/// Wall-clock milliseconds, used as the default engine seed.
pub fn wall_clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Owns the engine and every piece of host-side state around it.
///
/// All mutation goes through `&mut self`, so input handling, pattern selection, and frames are
/// serialized: a frame can never start while another one (or an input event) is in progress.
#[derive(Debug)]
pub struct BridgeContext<E: Engine> {
    engine: E,
    config: BridgeConfig,
    blit_mode: BlitMode,
    viewport: Viewport,
    transform: CoordinateTransform,
    framebuffer: HostFrameBuffer,
    input: InputStateMachine,
    catalog: PatternCatalog,
    selection: PatternSelection,
    scheduler: FrameScheduler,
    fps: FpsMeter,
    stats: TransferStats,
    frames: u64,
    paused: bool,
}

impl<E: Engine> BridgeContext<E> {
    pub fn new(engine: E, config: BridgeConfig, catalog: PatternCatalog) -> Result<Self, ConfigError> {
        config.validate()?;
        let (offset_x, offset_y) = config.viewport_offset;
        Ok(Self {
            engine,
            blit_mode: config.blit_mode(),
            viewport: Viewport::new(config.viewport),
            transform: CoordinateTransform::new(0, 0)
                .with_offset(offset_x, offset_y)
                .with_flip_y(config.flip_y),
            framebuffer: HostFrameBuffer::default(),
            input: InputStateMachine::new(),
            catalog,
            selection: PatternSelection::new(),
            scheduler: FrameScheduler::new(config.schedule.strategy()),
            fps: FpsMeter::new(config.fps.report_interval(), config.fps.precision),
            stats: TransferStats::default(),
            frames: 0,
            paused: false,
            config,
        })
    }

    /// Sizes the engine for `display`, seeds it, and runs its one-time init.
    ///
    /// Engines without a seed export are started unseeded.
    pub fn start<S: DisplaySurface + ?Sized>(
        &mut self,
        surface: &mut S,
        display: (u32, u32),
    ) -> Result<(), EngineError> {
        self.handle_resize(surface, display)?;

        let seed = self.config.seed.unwrap_or_else(wall_clock_seed);
        match self.engine.set_rand_seed(seed) {
            Ok(()) => {}
            Err(EngineError::Unsupported(call)) => {
                tracing::debug!(call, "engine is not seedable");
            }
            Err(err) => return Err(err),
        }

        self.engine.init()?;
        tracing::info!(seed, preset = ?self.config.preset, "engine started");
        Ok(())
    }

    pub fn handle_resize<S: DisplaySurface + ?Sized>(
        &mut self,
        surface: &mut S,
        display: (u32, u32),
    ) -> Result<(u32, u32), EngineError> {
        self.viewport.apply(
            &mut self.engine,
            &mut self.framebuffer,
            surface,
            &mut self.transform,
            display,
        )
    }

    /// Maps `event` into engine space and runs it through the input state machine.
    ///
    /// Presses and moves outside the canvas are dropped. A release outside the canvas ends the
    /// gesture like the pointer leaving the surface.
    pub fn handle_pointer(&mut self, event: DevicePointerEvent) -> Result<Commands, EngineError> {
        let to_engine = |x, y| self.transform.to_engine(DevicePoint::new(x, y));
        let event = match event {
            DevicePointerEvent::Down { x, y } => to_engine(x, y).map(PointerEvent::Down),
            DevicePointerEvent::Move { x, y } => to_engine(x, y).map(PointerEvent::Move),
            DevicePointerEvent::Up { x, y } => {
                Some(to_engine(x, y).map_or(PointerEvent::Leave, PointerEvent::Up))
            }
            DevicePointerEvent::Leave => Some(PointerEvent::Leave),
        };
        match event {
            Some(event) => self.input.dispatch(&mut self.engine, event),
            None => Ok(Commands::new()),
        }
    }

    /// Marshals catalog entry `index` into the engine.
    ///
    /// Failures are non-fatal: they are logged and returned, the previous selection stays active.
    pub fn select_pattern(&mut self, index: usize) -> Result<PatternHandle, PatternError> {
        match self.selection.select(&mut self.engine, &self.catalog, index) {
            Ok(handle) => {
                tracing::info!(index, offset = handle.offset, len = handle.len, "pattern selected");
                Ok(handle)
            }
            Err(err) => {
                tracing::warn!(index, error = %err, "pattern selection failed");
                Err(err)
            }
        }
    }

    pub fn select_pattern_by_name(&mut self, name: &str) -> Result<PatternHandle, PatternError> {
        let Some(index) = self.catalog.position(name) else {
            tracing::warn!(name, "no such pattern in the catalog");
            return Err(PatternError::UnknownPattern(name.to_string()));
        };
        self.select_pattern(index)
    }

    /// Toggles the engine's pause state. The loop keeps ticking either way.
    pub fn toggle_pause(&mut self) -> Result<bool, EngineError> {
        let paused = self.engine.pause()?;
        self.paused = paused;
        tracing::info!(paused, "pause toggled");
        Ok(paused)
    }

    pub fn clear(&mut self) -> Result<(), EngineError> {
        self.engine.clear()?;
        self.selection.reset();
        tracing::info!("simulation cleared");
        Ok(())
    }

    /// Runs one frame: tick the engine, copy its output buffer, present it.
    ///
    /// A transfer that does not fit is skipped and the surface keeps showing the last frame.
    pub fn run_frame<S: DisplaySurface + ?Sized>(
        &mut self,
        surface: &mut S,
        now: Duration,
    ) -> Result<TransferOutcome, EngineError> {
        self.fps.record_frame_start(now);
        self.engine.tick()?;
        let pointer = self.engine.output_buffer_pointer()?;
        let (width, height) = self.framebuffer.dimensions();

        let outcome = transfer_frame(
            self.engine.memory(),
            pointer,
            width,
            height,
            &mut self.framebuffer,
        );
        self.stats.record(outcome);
        if outcome.copied() {
            surface.present(&self.framebuffer, self.blit_mode);
        } else {
            tracing::debug!(
                ?outcome,
                pointer,
                width,
                height,
                memory_len = self.engine.memory().len(),
                "frame transfer skipped"
            );
        }
        self.frames += 1;
        Ok(outcome)
    }

    /// Runs every frame the scheduler considers due and emits the FPS report if one is due.
    ///
    /// Each frame is stamped at its scheduled tick when the schedule has one, otherwise at the
    /// clock reading taken as it starts. Completion is reported with the time after the last frame.
    pub fn poll<S, C>(&mut self, surface: &mut S, clock: &C) -> Result<PollReport, EngineError>
    where
        S: DisplaySurface + ?Sized,
        C: HostClock + ?Sized,
    {
        let due = self.scheduler.frames_due(clock.now());
        let mut report = PollReport::default();
        for index in 0..due {
            let start = self
                .scheduler
                .frame_start(index)
                .unwrap_or_else(|| clock.now());
            report.last_transfer = Some(self.run_frame(surface, start)?);
            report.frames_run += 1;
        }

        let now = clock.now();
        if due > 0 {
            self.scheduler.frame_completed(now);
        }

        report.fps = self.fps.poll_report(now);
        if let Some(reading) = report.fps {
            tracing::info!(fps = reading.fps, "{reading}");
        }
        report.next_deadline = self.scheduler.next_deadline();
        Ok(report)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn catalog(&self) -> &PatternCatalog {
        &self.catalog
    }

    pub fn selected_pattern(&self) -> Option<usize> {
        self.selection.selected()
    }

    pub fn pointer_state(&self) -> &PointerState {
        self.input.state()
    }

    pub fn framebuffer(&self) -> &HostFrameBuffer {
        &self.framebuffer
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.viewport.dimensions()
    }

    pub fn transform(&self) -> &CoordinateTransform {
        &self.transform
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn fps_meter(&self) -> &FpsMeter {
        &self.fps
    }

    pub fn transfer_stats(&self) -> TransferStats {
        self.stats
    }

    /// Frames run since creation.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Pause state last reported by the engine.
    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

use std::time::Duration;

use zonzai_bridge::engine::fake::{AllocBehavior, EngineCall, FakeEngine};
use zonzai_bridge::{
    BlitMode, BridgeConfig, BridgeContext, ConfigError, DevicePointerEvent, DisplaySurface,
    ExportPreset, FakeHostClock, HostClock, HostFrameBuffer, ImageSurface, OverrunPolicy,
    PatternCatalog, PatternError, ScheduleConfig, TransferOutcome, ViewportPolicy, WASM_PAGE_SIZE,
};

fn config() -> BridgeConfig {
    BridgeConfig {
        seed: Some(42),
        ..BridgeConfig::default()
    }
}

fn started(engine: FakeEngine, config: BridgeConfig) -> (BridgeContext<FakeEngine>, ImageSurface) {
    let mut ctx = BridgeContext::new(engine, config, PatternCatalog::builtin()).unwrap();
    let mut surface = ImageSurface::default();
    ctx.start(&mut surface, (8, 8)).unwrap();
    ctx.engine_mut().take_calls();
    (ctx, surface)
}

#[test]
fn start_sizes_then_seeds_then_inits() {
    let mut ctx = BridgeContext::new(FakeEngine::new(2), config(), PatternCatalog::builtin()).unwrap();
    let mut surface = ImageSurface::default();
    ctx.start(&mut surface, (64, 48)).unwrap();

    assert_eq!(
        ctx.engine().calls(),
        &[
            EngineCall::SetWindowDimensions {
                width: 64,
                height: 48
            },
            EngineCall::SetRandSeed(42),
            EngineCall::Init,
        ]
    );
    assert_eq!(ctx.dimensions(), Some((64, 48)));
    assert_eq!(surface.dimensions(), (64, 48));
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let config = BridgeConfig {
        schedule: ScheduleConfig::Interval {
            interval_ms: 0,
            overrun: OverrunPolicy::Drop,
        },
        ..BridgeConfig::default()
    };
    let err = BridgeContext::new(FakeEngine::new(1), config, PatternCatalog::builtin()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn every_resize_lands_on_the_target_dimensions() {
    let policy = ViewportPolicy::Chrome {
        chrome_height: 40,
        cell_size: 5,
    };
    let config = BridgeConfig {
        viewport: policy,
        ..config()
    };
    let (mut ctx, mut surface) = started(FakeEngine::new(2), config);

    for display in [(800, 600), (800, 600), (333, 241), (20, 30), (1024, 768)] {
        let dims = ctx.handle_resize(&mut surface, display).unwrap();
        let target = policy.target_dimensions(display.0, display.1);
        assert_eq!(dims, target);
        assert_eq!(ctx.framebuffer().dimensions(), target);
        assert_eq!(surface.dimensions(), target);
        assert_eq!(ctx.engine().dimensions(), target);
    }
}

#[test]
fn out_of_bounds_frame_keeps_the_previous_one_visible() {
    let (mut ctx, mut surface) = started(FakeEngine::new(2), config());

    let first = ctx.run_frame(&mut surface, Duration::ZERO).unwrap();
    assert!(first.copied());
    assert_eq!(surface.pixel(0, 0), Some([1; 4]));

    ctx.engine_mut()
        .set_output_pointer((2 * WASM_PAGE_SIZE - 16) as u32);
    let second = ctx.run_frame(&mut surface, Duration::from_millis(16)).unwrap();
    assert_eq!(second, TransferOutcome::SkippedOutOfBounds);

    assert_eq!(surface.presented(), 1);
    assert_eq!(surface.pixel(7, 7), Some([1; 4]));
    assert_eq!(ctx.framebuffer().pixel(0, 0), Some([1; 4]));
    let stats = ctx.transfer_stats();
    assert_eq!((stats.copied, stats.skipped_out_of_bounds), (1, 1));
    assert_eq!(ctx.frames(), 2);
}

#[test]
fn failed_allocation_keeps_the_previous_pattern() {
    let (mut ctx, _surface) = started(FakeEngine::new(2), config());

    let glider = ctx.select_pattern(0).unwrap();
    assert_eq!(glider.len, "bob$2bo$3o!".len());
    assert_eq!(ctx.selected_pattern(), Some(0));

    ctx.engine_mut().set_alloc_behavior(AllocBehavior::Fail);
    let err = ctx.select_pattern(1).unwrap_err();
    assert!(matches!(err, PatternError::AllocationFailed { len: 3 }));

    assert_eq!(ctx.selected_pattern(), Some(0));
    assert_eq!(ctx.engine().selected_pattern(), Some(glider.offset));
    assert_eq!(
        ctx.engine().calls(),
        &[
            EngineCall::Alloc(11),
            EngineCall::SelectPattern(glider.offset),
            EngineCall::Alloc(3),
        ]
    );
}

#[test]
fn patterns_are_found_by_name() {
    let (mut ctx, _surface) = started(FakeEngine::new(2), config());
    ctx.select_pattern_by_name("blinker").unwrap();
    assert_eq!(ctx.selected_pattern(), Some(1));

    let err = ctx.select_pattern_by_name("nope").unwrap_err();
    assert!(matches!(err, PatternError::UnknownPattern(_)));
    let err = ctx.select_pattern(999).unwrap_err();
    assert!(matches!(err, PatternError::IndexOutOfRange { index: 999, .. }));
    assert_eq!(ctx.selected_pattern(), Some(1));
}

#[test]
fn clear_forgets_the_selection() {
    let (mut ctx, _surface) = started(FakeEngine::new(2), config());
    ctx.select_pattern(0).unwrap();
    ctx.clear().unwrap();
    assert_eq!(ctx.selected_pattern(), None);
    assert_eq!(ctx.engine().selected_pattern(), None);
}

#[test]
fn pointer_events_are_mapped_into_engine_space() {
    let config = BridgeConfig {
        preset: ExportPreset::Life,
        viewport_offset: (10, 20),
        ..config()
    };
    let (mut ctx, _surface) = started(FakeEngine::new(2), config);

    // Outside the canvas: dropped before the state machine.
    ctx.handle_pointer(DevicePointerEvent::Down { x: 0, y: 0 }).unwrap();
    assert!(!ctx.pointer_state().button_down());

    ctx.handle_pointer(DevicePointerEvent::Down { x: 15, y: 25 }).unwrap();
    ctx.handle_pointer(DevicePointerEvent::Up { x: 15, y: 25 }).unwrap();
    assert_eq!(
        ctx.engine_mut().take_calls(),
        vec![EngineCall::MouseClick { x: 5, y: 5 }]
    );

    ctx.handle_pointer(DevicePointerEvent::Down { x: 15, y: 25 }).unwrap();
    ctx.handle_pointer(DevicePointerEvent::Move { x: 16, y: 25 }).unwrap();
    // Released outside the canvas: ends the drag, no click.
    ctx.handle_pointer(DevicePointerEvent::Up { x: 500, y: 500 }).unwrap();
    assert_eq!(
        ctx.engine_mut().take_calls(),
        vec![
            EngineCall::SetDragging(true),
            EngineCall::MoveMouse { x: 6, y: 5 },
            EngineCall::SetDragging(false),
        ]
    );
}

#[test]
fn flipped_y_axis_is_applied() {
    let config = BridgeConfig {
        flip_y: true,
        ..config()
    };
    let (mut ctx, _surface) = started(FakeEngine::new(2), config);
    ctx.handle_pointer(DevicePointerEvent::Move { x: 2, y: 0 }).unwrap();
    assert_eq!(
        ctx.engine().calls(),
        &[EngineCall::MoveMouse { x: 2, y: 7 }]
    );
}

#[test]
fn non_interactive_engine_ignores_pointer_commands() {
    let (mut ctx, _surface) = started(FakeEngine::non_interactive(2), config());
    let commands = ctx
        .handle_pointer(DevicePointerEvent::Down { x: 1, y: 1 })
        .and_then(|_| ctx.handle_pointer(DevicePointerEvent::Up { x: 1, y: 1 }))
        .unwrap();
    assert_eq!(commands.len(), 1);
    assert!(ctx.engine().calls().is_empty());
}

#[test]
fn vsync_loop_reports_fps_on_its_own_cadence() {
    let clock = FakeHostClock::new();
    let (mut ctx, mut surface) = started(FakeEngine::new(2), config());

    let mut frames = 0;
    let mut readings = Vec::new();
    for _ in 0..=300 {
        let report = ctx.poll(&mut surface, &clock).unwrap();
        assert!(report.frames_run <= 1);
        frames += report.frames_run;
        readings.extend(report.fps);
        clock.advance(Duration::from_millis(1));
    }

    // One frame immediately, then one per 60 Hz boundary.
    assert_eq!(frames, 19);
    assert_eq!(readings.len(), 2);
    assert!(readings.iter().all(|r| r.to_string() == "60 fps"));
    assert_eq!(surface.presented(), u64::from(frames));
}

#[test]
fn fixed_interval_drops_overrun_ticks() {
    let config = BridgeConfig {
        schedule: ScheduleConfig::Interval {
            interval_ms: 10,
            overrun: OverrunPolicy::Drop,
        },
        ..config()
    };
    let (mut ctx, mut surface) = started(FakeEngine::new(2), config);
    let clock = FakeHostClock::new();

    assert_eq!(ctx.poll(&mut surface, &clock).unwrap().frames_run, 0);
    clock.set(Duration::from_millis(35));
    let report = ctx.poll(&mut surface, &clock).unwrap();
    assert_eq!(report.frames_run, 1);
    assert_eq!(report.next_deadline, Some(Duration::from_millis(40)));
    assert_eq!(ctx.scheduler().dropped_ticks(), 2);
}

#[test]
fn fixed_interval_queue_runs_backlog() {
    let config = BridgeConfig {
        schedule: ScheduleConfig::Interval {
            interval_ms: 10,
            overrun: OverrunPolicy::Queue { max_backlog: 8 },
        },
        ..config()
    };
    let (mut ctx, mut surface) = started(FakeEngine::new(2), config);
    let clock = FakeHostClock::new();

    ctx.poll(&mut surface, &clock).unwrap();
    clock.set(Duration::from_millis(35));
    let report = ctx.poll(&mut surface, &clock).unwrap();
    assert_eq!(report.frames_run, 3);
    assert_eq!(ctx.engine().ticks(), 3);
}

#[test]
fn queued_backlog_keeps_the_nominal_frame_rate() {
    let config = BridgeConfig {
        schedule: ScheduleConfig::Interval {
            interval_ms: 10,
            overrun: OverrunPolicy::Queue { max_backlog: 8 },
        },
        ..config()
    };
    let (mut ctx, mut surface) = started(FakeEngine::new(2), config);
    let clock = FakeHostClock::new();

    ctx.poll(&mut surface, &clock).unwrap();
    clock.set(Duration::from_millis(30));
    assert_eq!(ctx.poll(&mut surface, &clock).unwrap().frames_run, 3);
    clock.set(Duration::from_millis(60));
    assert_eq!(ctx.poll(&mut surface, &clock).unwrap().frames_run, 3);

    let window: Vec<_> = ctx.fps_meter().window().iter().collect();
    assert_eq!(window, vec![Duration::from_millis(10); 5]);
    let reading = ctx.fps_meter().reading().unwrap();
    assert_eq!(reading.to_string(), "100 fps");
}

/// Surface whose presents take `cost` of host time.
struct SlowSurface {
    inner: ImageSurface,
    clock: FakeHostClock,
    cost: Duration,
}

impl DisplaySurface for SlowSurface {
    fn resize(&mut self, width: u32, height: u32) {
        self.inner.resize(width, height);
    }

    fn present(&mut self, frame: &HostFrameBuffer, mode: BlitMode) {
        self.inner.present(frame, mode);
        self.clock.advance(self.cost);
    }
}

#[test]
fn slow_vsync_frame_waits_for_the_boundary_after_it_finishes() {
    let clock = FakeHostClock::new();
    let mut surface = SlowSurface {
        inner: ImageSurface::default(),
        clock: clock.clone(),
        cost: Duration::from_millis(20),
    };
    let mut ctx = BridgeContext::new(FakeEngine::new(2), config(), PatternCatalog::builtin()).unwrap();
    ctx.start(&mut surface, (8, 8)).unwrap();

    let report = ctx.poll(&mut surface, &clock).unwrap();
    assert_eq!(report.frames_run, 1);
    assert_eq!(clock.now(), Duration::from_millis(20));
    // 60 Hz boundaries fall at 16.67 ms and 33.33 ms; the frame finished after the first one.
    let next = report.next_deadline.unwrap();
    assert!(next > Duration::from_millis(33) && next < Duration::from_millis(34), "{next:?}");
    assert_eq!(ctx.poll(&mut surface, &clock).unwrap().frames_run, 0);
}

#[test]
fn paused_engine_still_ticks_and_presents() {
    let (mut ctx, mut surface) = started(FakeEngine::new(2), config());
    ctx.run_frame(&mut surface, Duration::ZERO).unwrap();

    assert!(ctx.toggle_pause().unwrap());
    assert!(ctx.is_paused());
    ctx.run_frame(&mut surface, Duration::from_millis(16)).unwrap();
    ctx.run_frame(&mut surface, Duration::from_millis(32)).unwrap();

    assert_eq!(ctx.engine().ticks(), 1);
    assert_eq!(surface.presented(), 3);
    assert_eq!(surface.pixel(0, 0), Some([1; 4]));

    assert!(!ctx.toggle_pause().unwrap());
    ctx.run_frame(&mut surface, Duration::from_millis(48)).unwrap();
    assert_eq!(surface.pixel(0, 0), Some([2; 4]));
}

#[test]
fn resize_keeps_surface_in_step_with_the_engine() {
    let (mut ctx, mut surface) = started(FakeEngine::new(2), config());
    ctx.handle_resize(&mut surface, (16, 4)).unwrap();
    ctx.run_frame(&mut surface, Duration::ZERO).unwrap();
    assert_eq!(surface.dimensions(), (16, 4));
    assert_eq!(surface.pixel(15, 3), Some([1; 4]));
    surface.resize(1, 1);
    assert_eq!(surface.pixel(0, 0), Some([0; 4]));
}

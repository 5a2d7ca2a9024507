#![forbid(unsafe_code)]

mod replay;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Parser, ValueEnum};
use tracing_subscriber::EnvFilter;
use zonzai_bridge::{
    BridgeConfig, BridgeContext, ExportPreset, HostClock, ImageSurface, OverrunPolicy,
    PatternCatalog, ScheduleConfig, StdHostClock, WasmtimeEngine,
};

use crate::replay::{Action, Script};

/// Upper bound on a single sleep, so the loop notices the stop condition promptly.
const MAX_IDLE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PresetArg {
    Tree,
    Life,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ScheduleArg {
    Vsync,
    Interval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OverrunArg {
    Drop,
    Queue,
}

#[derive(Debug, Parser)]
#[command(
    about = "Headless native host for zonzai engine modules",
    group(
        ArgGroup::new("stop")
            .required(true)
            .args(["frames", "duration_ms"])
    )
)]
struct Args {
    /// Engine module (`.wasm`) to instantiate.
    #[arg(long, env = "ZONZAI_ENGINE")]
    engine: PathBuf,

    /// JSON bridge configuration. Individual flags override its fields.
    #[arg(long, env = "ZONZAI_CONFIG")]
    config: Option<PathBuf>,

    /// Export naming family of the engine.
    #[arg(long, value_enum, env = "ZONZAI_PRESET")]
    preset: Option<PresetArg>,

    /// Display viewport width in pixels.
    #[arg(long, default_value_t = 800, env = "ZONZAI_WIDTH")]
    width: u32,

    /// Display viewport height in pixels.
    #[arg(long, default_value_t = 600, env = "ZONZAI_HEIGHT")]
    height: u32,

    /// Stop after N frames.
    #[arg(long)]
    frames: Option<u64>,

    /// Stop after N milliseconds of host time.
    #[arg(long)]
    duration_ms: Option<u64>,

    #[arg(long, value_enum, env = "ZONZAI_SCHEDULE")]
    schedule: Option<ScheduleArg>,

    /// Tick interval for `--schedule interval`. Implies it when given alone.
    #[arg(long, env = "ZONZAI_INTERVAL_MS")]
    interval_ms: Option<u64>,

    /// What to do with fixed-interval ticks that elapse while a frame is running.
    #[arg(long, value_enum, env = "ZONZAI_OVERRUN")]
    overrun: Option<OverrunArg>,

    /// Backlog limit for `--overrun queue`.
    #[arg(long, default_value_t = 4)]
    max_backlog: u32,

    /// Select this catalog pattern right after startup.
    #[arg(long)]
    pattern: Option<String>,

    /// Extra patterns (JSON array of `{"name", "rle"}`), merged over the built-ins.
    #[arg(long, env = "ZONZAI_PATTERNS")]
    patterns: Option<PathBuf>,

    /// Timed input script to replay.
    #[arg(long)]
    script: Option<PathBuf>,

    /// Dump the last presented frame to a PNG file on exit.
    #[arg(long)]
    png: Option<PathBuf>,

    /// Engine RNG seed. Defaults to wall-clock milliseconds.
    #[arg(long, env = "ZONZAI_SEED")]
    seed: Option<u64>,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, default_value = "info", env = "ZONZAI_LOG_LEVEL")]
    log_level: String,
}

#[derive(Debug, Clone, Copy)]
enum Stop {
    Frames(u64),
    Elapsed(Duration),
}

impl Stop {
    fn reached(self, frames: u64, now: Duration) -> bool {
        match self {
            Stop::Frames(n) => frames >= n,
            Stop::Elapsed(limit) => now >= limit,
        }
    }
}

fn resolve_config(args: &Args) -> Result<BridgeConfig> {
    let mut config = match &args.config {
        Some(path) => BridgeConfig::load(path)
            .with_context(|| format!("failed to load config: {}", path.display()))?,
        None => BridgeConfig::default(),
    };

    if let Some(preset) = args.preset {
        config.preset = match preset {
            PresetArg::Tree => ExportPreset::Tree,
            PresetArg::Life => ExportPreset::Life,
        };
    }

    let schedule = args.schedule.or(args.interval_ms.map(|_| ScheduleArg::Interval));
    match schedule {
        Some(ScheduleArg::Vsync) => {
            if !matches!(config.schedule, ScheduleConfig::Vsync { .. }) {
                config.schedule = ScheduleConfig::default();
            }
        }
        Some(ScheduleArg::Interval) => {
            let (interval_ms, overrun) = match config.schedule {
                ScheduleConfig::Interval {
                    interval_ms,
                    overrun,
                } => (interval_ms, overrun),
                ScheduleConfig::Vsync { .. } => (16, OverrunPolicy::Drop),
            };
            config.schedule = ScheduleConfig::Interval {
                interval_ms: args.interval_ms.unwrap_or(interval_ms),
                overrun,
            };
        }
        None => {}
    }
    if let (Some(overrun), ScheduleConfig::Interval { interval_ms, .. }) =
        (args.overrun, config.schedule)
    {
        config.schedule = ScheduleConfig::Interval {
            interval_ms,
            overrun: match overrun {
                OverrunArg::Drop => OverrunPolicy::Drop,
                OverrunArg::Queue => OverrunPolicy::Queue {
                    max_backlog: args.max_backlog,
                },
            },
        };
    }

    if args.seed.is_some() {
        config.seed = args.seed;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let stop = match (args.frames, args.duration_ms) {
        (Some(frames), _) => Stop::Frames(frames),
        (None, Some(ms)) => Stop::Elapsed(Duration::from_millis(ms)),
        (None, None) => bail!("one of --frames or --duration-ms is required"),
    };

    let config = resolve_config(&args)?;

    let mut catalog = PatternCatalog::builtin();
    if let Some(path) = &args.patterns {
        catalog.extend(PatternCatalog::load(path).context("failed to load pattern catalog")?);
    }

    let mut script = match &args.script {
        Some(path) => Script::load(path)?,
        None => Script::default(),
    };

    let wasm = std::fs::read(&args.engine)
        .with_context(|| format!("failed to read engine module: {}", args.engine.display()))?;
    let engine = WasmtimeEngine::instantiate(&wasm, config.engine_options())
        .with_context(|| format!("failed to instantiate engine: {}", args.engine.display()))?;

    let mut ctx = BridgeContext::new(engine, config, catalog)?;
    let mut surface = ImageSurface::default();
    ctx.start(&mut surface, (args.width, args.height))
        .context("engine startup failed")?;

    if let Some(name) = &args.pattern {
        ctx.select_pattern_by_name(name)
            .with_context(|| format!("failed to select pattern `{name}`"))?;
    }

    let clock = StdHostClock::new();
    loop {
        let now = clock.now();
        for action in script.take_due(now) {
            apply(&mut ctx, &mut surface, action)?;
        }

        let report = ctx.poll(&mut surface, &clock)?;
        if stop.reached(ctx.frames(), clock.now()) {
            break;
        }

        let wake = [report.next_deadline, script.next_at()]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(now + MAX_IDLE);
        let now = clock.now();
        if wake > now {
            std::thread::sleep((wake - now).min(MAX_IDLE));
        }
    }

    if !script.is_finished() {
        tracing::warn!(
            next_at_ms = script.next_at().map(|at| at.as_millis() as u64),
            "run stopped before the input script finished"
        );
    }

    let stats = ctx.transfer_stats();
    tracing::info!(
        frames = ctx.frames(),
        copied = stats.copied,
        skipped = stats.skipped(),
        dropped_ticks = ctx.scheduler().dropped_ticks(),
        "run finished"
    );
    println!("frames: {}", ctx.frames());
    println!("copied: {}", stats.copied);
    println!("skipped: {}", stats.skipped());
    if let Some(reading) = ctx.fps_meter().reading() {
        println!("fps: {reading}");
    }

    if let Some(path) = &args.png {
        surface
            .save_png(path)
            .with_context(|| format!("failed to write PNG: {}", path.display()))?;
    }

    Ok(())
}

fn apply(
    ctx: &mut BridgeContext<WasmtimeEngine>,
    surface: &mut ImageSurface,
    action: Action,
) -> Result<()> {
    match action {
        Action::Pointer { event } => {
            ctx.handle_pointer(event)?;
        }
        Action::Resize { width, height } => {
            ctx.handle_resize(surface, (width, height))?;
        }
        Action::Pattern { name } => {
            // Logged by the context; a failed selection does not stop the run.
            let _ = ctx.select_pattern_by_name(&name);
        }
        Action::Pause => {
            ctx.toggle_pause()?;
        }
        Action::Clear => {
            ctx.clear()?;
        }
    }
    Ok(())
}

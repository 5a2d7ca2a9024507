//! Bridge configuration as loaded from a JSON file.
//!
//! Every field has a default, so `{}` is a valid configuration (tree engine, exact viewport,
//! vsync at 60 Hz). The native host layers its CLI flags on top of this.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::{EngineOptions, ExportNames, ExportPreset, MemoryImport};
use crate::error::ConfigError;
use crate::scheduler::{OverrunPolicy, ScheduleStrategy};
use crate::surface::BlitMode;
use crate::telemetry::FpsPrecision;
use crate::viewport::ViewportPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleConfig {
    Vsync {
        refresh_hz: u32,
    },
    Interval {
        interval_ms: u64,
        #[serde(default)]
        overrun: OverrunPolicy,
    },
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig::Vsync { refresh_hz: 60 }
    }
}

impl ScheduleConfig {
    pub fn strategy(&self) -> ScheduleStrategy {
        match *self {
            ScheduleConfig::Vsync { refresh_hz } => ScheduleStrategy::VsyncCooperative {
                refresh: Duration::from_nanos(1_000_000_000 / u64::from(refresh_hz.max(1))),
            },
            ScheduleConfig::Interval {
                interval_ms,
                overrun,
            } => ScheduleStrategy::FixedInterval {
                interval: Duration::from_millis(interval_ms),
                overrun,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FpsConfig {
    pub report_interval_ms: u64,
    pub precision: FpsPrecision,
}

impl Default for FpsConfig {
    fn default() -> Self {
        Self {
            report_interval_ms: 150,
            precision: FpsPrecision::Integer,
        }
    }
}

impl FpsConfig {
    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub preset: ExportPreset,
    /// Overrides the preset's export names entirely.
    pub exports: Option<ExportNames>,
    pub viewport: ViewportPolicy,
    /// Defaults to the preset's mode when unset.
    pub blit_mode: Option<BlitMode>,
    pub schedule: ScheduleConfig,
    pub fps: FpsConfig,
    /// RNG seed passed to the engine at startup. Wall-clock milliseconds when unset.
    pub seed: Option<u64>,
    pub memory_import: Option<MemoryImport>,
    pub flip_y: bool,
    pub viewport_offset: (i32, i32),
}

impl BridgeConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        let config = Self::from_json(&raw)?;
        tracing::debug!(path = %path.display(), "loaded bridge config");
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.schedule {
            ScheduleConfig::Vsync { refresh_hz: 0 } => {
                return Err(ConfigError::Invalid("schedule.refresh_hz must be non-zero"));
            }
            ScheduleConfig::Interval { interval_ms: 0, .. } => {
                return Err(ConfigError::Invalid("schedule.interval_ms must be non-zero"));
            }
            ScheduleConfig::Interval {
                overrun: OverrunPolicy::Queue { max_backlog: 0 },
                ..
            } => {
                return Err(ConfigError::Invalid(
                    "schedule.overrun.max_backlog must be non-zero",
                ));
            }
            _ => {}
        }
        if self.fps.report_interval_ms == 0 {
            return Err(ConfigError::Invalid("fps.report_interval_ms must be non-zero"));
        }
        if let ViewportPolicy::Chrome { cell_size: 0, .. } = self.viewport {
            return Err(ConfigError::Invalid("viewport.cell_size must be non-zero"));
        }
        if let Some(import) = &self.memory_import {
            if import.max_pages.is_some_and(|max| max < import.min_pages) {
                return Err(ConfigError::Invalid(
                    "memory_import.max_pages must be >= min_pages",
                ));
            }
        }
        Ok(())
    }

    pub fn export_names(&self) -> ExportNames {
        self.exports.clone().unwrap_or_else(|| self.preset.names())
    }

    /// Both engine families clear before every blit unless configured to accumulate.
    pub fn blit_mode(&self) -> BlitMode {
        self.blit_mode.unwrap_or_default()
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            exports: self.export_names(),
            memory_import: self.memory_import.clone(),
        }
    }
}

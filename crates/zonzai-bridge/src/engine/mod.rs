//! The function/memory contract between the host and a separately compiled engine module.
//!
//! The host never looks inside the engine's simulation state. Everything it knows about the
//! engine goes through [`Engine`]: a handful of synchronous calls plus a borrowed view of the
//! engine's linear memory.

pub mod fake;
mod wasmtime;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::memory::{MemoryView, MemoryViewMut};

pub use self::wasmtime::{EngineOptions, MemoryImport, WasmtimeEngine, DEBUG_OUTPUT_CAPACITY};

/// Module name of the host-provided imports.
pub const IMPORT_MODULE: &str = "env";
/// Import the engine calls to log text: `debug_print(offset: i32, len: i32)`.
pub const IMPORT_DEBUG_PRINT: &str = "debug_print";
/// Name of the engine's exported linear memory.
pub const EXPORT_MEMORY: &str = "memory";

/// Host-side handle to the engine.
///
/// All calls are synchronous and expected to return promptly; a hang inside one blocks the whole
/// host. The absence of a return value is not an error signal: only [`Engine::alloc`]'s sentinel
/// and trapped calls are.
pub trait Engine {
    fn set_window_dimensions(&mut self, width: u32, height: u32) -> Result<(), EngineError>;

    fn set_rand_seed(&mut self, seed: u64) -> Result<(), EngineError>;

    /// One-time state initialization (`init` / `setup`).
    fn init(&mut self) -> Result<(), EngineError>;

    /// Advances the simulation by one tick and renders into the output buffer
    /// (`grow_tree` / `draw`).
    fn tick(&mut self) -> Result<(), EngineError>;

    /// Byte offset of the current frame's RGBA pixel buffer.
    ///
    /// Only stable until the next call that could grow the engine's memory.
    fn output_buffer_pointer(&mut self) -> Result<u32, EngineError>;

    fn mouse_click(&mut self, x: i32, y: i32) -> Result<(), EngineError>;

    fn move_mouse(&mut self, x: i32, y: i32) -> Result<(), EngineError>;

    fn set_dragging(&mut self, dragging: bool) -> Result<(), EngineError>;

    /// Reserves `size` bytes of engine memory. `Ok(None)` means the engine returned its null
    /// sentinel (out of memory).
    fn alloc(&mut self, size: u32) -> Result<Option<u32>, EngineError>;

    /// Replaces the simulation state with the pattern stored at `offset`.
    fn select_pattern(&mut self, offset: u32) -> Result<(), EngineError>;

    /// Toggles pause; returns `true` if the engine is now paused.
    fn pause(&mut self) -> Result<bool, EngineError>;

    fn clear(&mut self) -> Result<(), EngineError>;

    fn memory(&self) -> MemoryView<'_>;

    fn memory_mut(&mut self) -> MemoryViewMut<'_>;
}

/// Export symbols used for each engine call.
///
/// Engines built for different visualizations name their exports differently; the two known
/// families are available as [`ExportNames::tree`] and [`ExportNames::life`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportNames {
    pub set_window_dimensions: String,
    pub set_rand_seed: String,
    pub init: String,
    pub tick: String,
    pub output_buffer_pointer: String,
    pub mouse_click: String,
    pub move_mouse: String,
    pub set_dragging: String,
    pub alloc: String,
    pub select_pattern: String,
    pub pause: String,
    pub clear: String,
}

impl ExportNames {
    /// Growing-tree engine: `init` + `grow_tree`.
    pub fn tree() -> Self {
        Self {
            set_window_dimensions: "set_window_dimensions".into(),
            set_rand_seed: "set_rand_seed".into(),
            init: "init".into(),
            tick: "grow_tree".into(),
            output_buffer_pointer: "get_output_buffer_pointer".into(),
            mouse_click: "mouse_click".into(),
            move_mouse: "move_mouse".into(),
            set_dragging: "set_dragging".into(),
            alloc: "alloc".into(),
            select_pattern: "select_pattern".into(),
            pause: "pause".into(),
            clear: "clear".into(),
        }
    }

    /// Cellular-automaton engine: `setup` + `draw`, discrete `click`.
    pub fn life() -> Self {
        Self {
            init: "setup".into(),
            tick: "draw".into(),
            mouse_click: "click".into(),
            ..Self::tree()
        }
    }
}

impl Default for ExportNames {
    fn default() -> Self {
        Self::tree()
    }
}

/// Named export-name family, as selected from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportPreset {
    #[default]
    Tree,
    Life,
}

impl ExportPreset {
    pub fn names(self) -> ExportNames {
        match self {
            ExportPreset::Tree => ExportNames::tree(),
            ExportPreset::Life => ExportNames::life(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn life_preset_overrides_only_the_renamed_calls() {
        let tree = ExportNames::tree();
        let life = ExportNames::life();
        assert_eq!(life.init, "setup");
        assert_eq!(life.tick, "draw");
        assert_eq!(life.mouse_click, "click");
        assert_eq!(life.output_buffer_pointer, tree.output_buffer_pointer);
        assert_eq!(life.alloc, tree.alloc);
    }

    #[test]
    fn partial_export_names_fill_from_tree_defaults() {
        let names: ExportNames = serde_json::from_str(r#"{"tick":"step"}"#).unwrap();
        assert_eq!(names.tick, "step");
        assert_eq!(names.init, "init");
    }
}

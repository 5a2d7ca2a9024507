use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use wasmtime::{
    Caller, Engine as WasmEngine, ExternType, Instance, Linker, Memory, MemoryType, Module, Store,
    TypedFunc, WasmParams, WasmResults,
};

use super::{Engine, ExportNames, EXPORT_MEMORY, IMPORT_DEBUG_PRINT, IMPORT_MODULE};
use crate::error::EngineError;
use crate::memory::{MemoryView, MemoryViewMut};

/// Number of `debug_print` lines retained for [`WasmtimeEngine::take_debug_output`].
pub const DEBUG_OUTPUT_CAPACITY: usize = 256;

/// A host-created linear memory handed to the engine as an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryImport {
    pub module: String,
    pub name: String,
    /// Initial size in 64 KiB pages.
    pub min_pages: u32,
    pub max_pages: Option<u32>,
}

impl Default for MemoryImport {
    fn default() -> Self {
        Self {
            module: "js".into(),
            name: "mem".into(),
            min_pages: 256,
            max_pages: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub exports: ExportNames,
    /// Defined only if the module actually declares a matching memory import.
    pub memory_import: Option<MemoryImport>,
}

#[derive(Debug, Default)]
struct HostState {
    memory: Option<Memory>,
    debug_output: VecDeque<String>,
}

impl HostState {
    fn push_debug_line(&mut self, line: String) {
        if self.debug_output.len() == DEBUG_OUTPUT_CAPACITY {
            self.debug_output.pop_front();
        }
        self.debug_output.push_back(line);
    }
}

struct Exports {
    set_window_dimensions: TypedFunc<(i32, i32), ()>,
    set_rand_seed: Option<TypedFunc<i64, ()>>,
    init: TypedFunc<(), ()>,
    tick: TypedFunc<(), ()>,
    output_buffer_pointer: TypedFunc<(), i32>,
    mouse_click: Option<TypedFunc<(i32, i32), ()>>,
    move_mouse: Option<TypedFunc<(i32, i32), ()>>,
    set_dragging: Option<TypedFunc<i32, ()>>,
    alloc: Option<TypedFunc<i32, i32>>,
    select_pattern: Option<TypedFunc<i32, ()>>,
    pause: Option<TypedFunc<(), i32>>,
    clear: Option<TypedFunc<(), ()>>,
}

impl Exports {
    fn resolve(
        instance: &Instance,
        store: &mut Store<HostState>,
        names: &ExportNames,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            set_window_dimensions: require(instance, store, &names.set_window_dimensions)?,
            set_rand_seed: lookup(instance, store, &names.set_rand_seed)?,
            init: require(instance, store, &names.init)?,
            tick: require(instance, store, &names.tick)?,
            output_buffer_pointer: require(instance, store, &names.output_buffer_pointer)?,
            mouse_click: lookup(instance, store, &names.mouse_click)?,
            move_mouse: lookup(instance, store, &names.move_mouse)?,
            set_dragging: lookup(instance, store, &names.set_dragging)?,
            alloc: lookup(instance, store, &names.alloc)?,
            select_pattern: lookup(instance, store, &names.select_pattern)?,
            pause: lookup(instance, store, &names.pause)?,
            clear: lookup(instance, store, &names.clear)?,
        })
    }
}

fn lookup<P, R>(
    instance: &Instance,
    store: &mut Store<HostState>,
    name: &str,
) -> Result<Option<TypedFunc<P, R>>, EngineError>
where
    P: WasmParams,
    R: WasmResults,
{
    let Some(func) = instance.get_func(&mut *store, name) else {
        return Ok(None);
    };
    func.typed::<P, R>(&*store)
        .map(Some)
        .map_err(|e| EngineError::ExportSignature {
            name: name.to_string(),
            message: format!("{e:#}"),
        })
}

fn require<P, R>(
    instance: &Instance,
    store: &mut Store<HostState>,
    name: &str,
) -> Result<TypedFunc<P, R>, EngineError>
where
    P: WasmParams,
    R: WasmResults,
{
    lookup(instance, store, name)?.ok_or_else(|| EngineError::MissingExport(name.to_string()))
}

fn call<P, R>(
    store: &mut Store<HostState>,
    func: &TypedFunc<P, R>,
    call: &'static str,
    params: P,
) -> Result<R, EngineError>
where
    P: WasmParams,
    R: WasmResults,
{
    func.call(&mut *store, params)
        .map_err(|e| EngineError::Trap {
            call,
            message: format!("{e:#}"),
        })
}

/// Engine backed by a Wasmtime instance.
///
/// ## Import contract
///
/// - `env.debug_print(offset: i32, len: i32)`: the host decodes the byte range as (lossy) UTF-8
///   and logs it under the `zonzai::engine` target. Ranges outside memory are logged and ignored
///   rather than trapping the engine.
/// - an optional pre-allocated memory (see [`MemoryImport`]).
///
/// The engine's memory is its exported `memory` if present, otherwise the host-provided import.
pub struct WasmtimeEngine {
    store: Store<HostState>,
    memory: Memory,
    exports: Exports,
}

impl WasmtimeEngine {
    /// Compile, link and instantiate an engine module.
    ///
    /// Any failure here is fatal for the host; nothing is partially initialized.
    pub fn instantiate(wasm_bytes: &[u8], options: EngineOptions) -> Result<Self, EngineError> {
        let engine = WasmEngine::default();
        let module = Module::new(&engine, wasm_bytes)
            .map_err(|e| EngineError::Compile(format!("{e:#}")))?;
        let mut store = Store::new(&engine, HostState::default());
        let mut linker = Linker::new(&engine);

        define_debug_print(&mut linker)?;

        let imported_memory = match &options.memory_import {
            Some(import) if module_imports_memory(&module, import) => {
                let memory = Memory::new(
                    &mut store,
                    MemoryType::new(import.min_pages, import.max_pages),
                )
                .map_err(|e| EngineError::Link(format!("{e:#}")))?;
                linker
                    .define(&mut store, &import.module, &import.name, memory)
                    .map_err(|e| EngineError::Link(format!("{e:#}")))?;
                tracing::debug!(
                    module = %import.module,
                    name = %import.name,
                    min_pages = import.min_pages,
                    "provided host memory import"
                );
                Some(memory)
            }
            _ => None,
        };

        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(|e| EngineError::Link(format!("{e:#}")))?;

        let memory = instance
            .get_memory(&mut store, EXPORT_MEMORY)
            .or(imported_memory)
            .ok_or(EngineError::MissingMemory)?;
        store.data_mut().memory = Some(memory);

        let exports = Exports::resolve(&instance, &mut store, &options.exports)?;

        tracing::info!(
            memory_bytes = memory.data_size(&store),
            "engine instantiated"
        );

        Ok(Self {
            store,
            memory,
            exports,
        })
    }

    /// Drains the text the engine has emitted through `debug_print` (oldest first).
    pub fn take_debug_output(&mut self) -> Vec<String> {
        self.store.data_mut().debug_output.drain(..).collect()
    }
}

fn module_imports_memory(module: &Module, import: &MemoryImport) -> bool {
    module.imports().any(|ty| {
        ty.module() == import.module
            && ty.name() == import.name
            && matches!(ty.ty(), ExternType::Memory(_))
    })
}

fn define_debug_print(linker: &mut Linker<HostState>) -> Result<(), EngineError> {
    linker
        .func_wrap(
            IMPORT_MODULE,
            IMPORT_DEBUG_PRINT,
            |mut caller: Caller<'_, HostState>, offset: i32, len: i32| {
                let memory = caller
                    .get_export(EXPORT_MEMORY)
                    .and_then(|export| export.into_memory())
                    .or(caller.data().memory);
                let Some(memory) = memory else {
                    tracing::warn!("debug_print called before engine memory was resolved");
                    return;
                };

                let text = usize::try_from(len).ok().and_then(|len| {
                    MemoryView::new(memory.data(&caller)).read_string_lossy(offset as u32, len)
                });
                match text {
                    Some(line) => {
                        tracing::info!(target: "zonzai::engine", "{line}");
                        caller.data_mut().push_debug_line(line);
                    }
                    None => tracing::warn!(
                        offset = offset as u32,
                        len,
                        "debug_print range outside engine memory"
                    ),
                }
            },
        )
        .map_err(|e| EngineError::Link(format!("{e:#}")))?;
    Ok(())
}

fn i32_arg(call: &'static str, value: u32) -> Result<i32, EngineError> {
    i32::try_from(value).map_err(|_| EngineError::ArgumentOutOfRange { call, value })
}

impl Engine for WasmtimeEngine {
    fn set_window_dimensions(&mut self, width: u32, height: u32) -> Result<(), EngineError> {
        call(
            &mut self.store,
            &self.exports.set_window_dimensions,
            "set_window_dimensions",
            (
                i32_arg("set_window_dimensions", width)?,
                i32_arg("set_window_dimensions", height)?,
            ),
        )
    }

    fn set_rand_seed(&mut self, seed: u64) -> Result<(), EngineError> {
        let func = self
            .exports
            .set_rand_seed
            .as_ref()
            .ok_or(EngineError::Unsupported("set_rand_seed"))?;
        call(&mut self.store, func, "set_rand_seed", seed as i64)
    }

    fn init(&mut self) -> Result<(), EngineError> {
        call(&mut self.store, &self.exports.init, "init", ())
    }

    fn tick(&mut self) -> Result<(), EngineError> {
        call(&mut self.store, &self.exports.tick, "tick", ())
    }

    fn output_buffer_pointer(&mut self) -> Result<u32, EngineError> {
        let ptr = call(
            &mut self.store,
            &self.exports.output_buffer_pointer,
            "get_output_buffer_pointer",
            (),
        )?;
        Ok(ptr as u32)
    }

    fn mouse_click(&mut self, x: i32, y: i32) -> Result<(), EngineError> {
        let func = self
            .exports
            .mouse_click
            .as_ref()
            .ok_or(EngineError::Unsupported("mouse_click"))?;
        call(&mut self.store, func, "mouse_click", (x, y))
    }

    fn move_mouse(&mut self, x: i32, y: i32) -> Result<(), EngineError> {
        let func = self
            .exports
            .move_mouse
            .as_ref()
            .ok_or(EngineError::Unsupported("move_mouse"))?;
        call(&mut self.store, func, "move_mouse", (x, y))
    }

    fn set_dragging(&mut self, dragging: bool) -> Result<(), EngineError> {
        let func = self
            .exports
            .set_dragging
            .as_ref()
            .ok_or(EngineError::Unsupported("set_dragging"))?;
        call(&mut self.store, func, "set_dragging", i32::from(dragging))
    }

    fn alloc(&mut self, size: u32) -> Result<Option<u32>, EngineError> {
        let func = self
            .exports
            .alloc
            .as_ref()
            .ok_or(EngineError::Unsupported("alloc"))?;
        let ptr = call(&mut self.store, func, "alloc", i32_arg("alloc", size)?)?;
        // `0` is the engine allocator's null sentinel.
        Ok((ptr != 0).then_some(ptr as u32))
    }

    fn select_pattern(&mut self, offset: u32) -> Result<(), EngineError> {
        let func = self
            .exports
            .select_pattern
            .as_ref()
            .ok_or(EngineError::Unsupported("select_pattern"))?;
        let offset = i32_arg("select_pattern", offset)?;
        call(&mut self.store, func, "select_pattern", offset)
    }

    fn pause(&mut self) -> Result<bool, EngineError> {
        let func = self
            .exports
            .pause
            .as_ref()
            .ok_or(EngineError::Unsupported("pause"))?;
        let paused = call(&mut self.store, func, "pause", ())?;
        Ok(paused != 0)
    }

    fn clear(&mut self) -> Result<(), EngineError> {
        let func = self
            .exports
            .clear
            .as_ref()
            .ok_or(EngineError::Unsupported("clear"))?;
        call(&mut self.store, func, "clear", ())
    }

    fn memory(&self) -> MemoryView<'_> {
        MemoryView::new(self.memory.data(&self.store))
    }

    fn memory_mut(&mut self) -> MemoryViewMut<'_> {
        MemoryViewMut::new(self.memory.data_mut(&mut self.store))
    }
}

impl std::fmt::Debug for WasmtimeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmtimeEngine")
            .field("memory_bytes", &self.memory.data_size(&self.store))
            .field("debug_lines", &self.store.data().debug_output.len())
            .finish()
    }
}

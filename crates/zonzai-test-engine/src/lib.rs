//! A tiny engine module, assembled with `wasm-encoder`, that implements the full host contract.
//!
//! It has no simulation. It records every call in a state block so tests can assert on what the
//! host sent, and each unpaused tick fills the whole output frame with the tick counter's low
//! byte. Memory layout:
//!
//! | Offset             | Contents                                  |
//! |--------------------|-------------------------------------------|
//! | `MESSAGE_OFFSET`   | startup message printed via `debug_print` |
//! | `STATE_BASE`       | call-recording state block (`EngineState`)|
//! | `HEAP_BASE..limit` | bump heap served by `alloc`               |
//! | output pointer     | RGBA frame, `width * height * 4` bytes    |
//!
//! `set_window_dimensions` grows memory when the frame would not fit.

use wasm_encoder::{
    BlockType, CodeSection, ConstExpr, DataSection, EntityType, ExportKind, ExportSection,
    Function, FunctionSection, ImportSection, Instruction, MemArg, MemorySection, MemoryType,
    Module, TypeSection, ValType,
};

pub const MESSAGE_OFFSET: u32 = 0x40;
pub const STATE_BASE: u32 = 0x100;
pub const HEAP_BASE: u32 = 0x1000;
pub const OUTPUT_POINTER: u32 = 0x1_0000;

const WIDTH: u32 = STATE_BASE;
const HEIGHT: u32 = STATE_BASE + 4;
const CLICKS: u32 = STATE_BASE + 8;
const CLICK_X: u32 = STATE_BASE + 12;
const CLICK_Y: u32 = STATE_BASE + 16;
const MOUSE_X: u32 = STATE_BASE + 20;
const MOUSE_Y: u32 = STATE_BASE + 24;
const MOVES: u32 = STATE_BASE + 28;
const DRAGGING: u32 = STATE_BASE + 32;
const DRAG_CHANGES: u32 = STATE_BASE + 36;
const PATTERN: u32 = STATE_BASE + 40;
const PAUSED: u32 = STATE_BASE + 44;
const TICKS: u32 = STATE_BASE + 48;
const HEAP_NEXT: u32 = STATE_BASE + 52;
const INITS: u32 = STATE_BASE + 56;
const CLEARS: u32 = STATE_BASE + 60;
const SEED: u32 = STATE_BASE + 64;
const STATE_LEN: usize = 72;

const IMPORT_MODULE: &str = "env";
const IMPORT_DEBUG_PRINT: &str = "debug_print";
const DEBUG_PRINT: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    /// `init` / `grow_tree` / `mouse_click`.
    Tree,
    /// `setup` / `draw` / `click`.
    Life,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemorySource {
    /// Defines and exports `memory`.
    Exported { pages: u32 },
    /// Imports `module.name` and does not export it.
    Imported {
        module: String,
        name: String,
        min_pages: u32,
    },
}

#[derive(Debug, Clone)]
pub struct TestEngine {
    pub flavor: Flavor,
    pub memory: MemorySource,
    /// Export `mouse_click`/`move_mouse`/`set_dragging`.
    pub interactive: bool,
    /// Export `set_rand_seed`.
    pub seedable: bool,
    pub output_pointer: u32,
    /// `alloc` returns 0 once the heap would pass this address.
    pub heap_limit: u32,
    pub debug_message: Option<String>,
}

impl Default for TestEngine {
    fn default() -> Self {
        Self {
            flavor: Flavor::Tree,
            memory: MemorySource::Exported { pages: 4 },
            interactive: true,
            seedable: true,
            output_pointer: OUTPUT_POINTER,
            heap_limit: OUTPUT_POINTER,
            debug_message: Some("test engine ready".to_string()),
        }
    }
}

/// Snapshot of the state block, decoded from engine memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineState {
    pub width: u32,
    pub height: u32,
    pub clicks: u32,
    pub last_click: (i32, i32),
    pub mouse: (i32, i32),
    pub moves: u32,
    pub dragging: bool,
    pub drag_changes: u32,
    pub pattern: u32,
    pub paused: bool,
    pub ticks: u32,
    pub heap_next: u32,
    pub inits: u32,
    pub clears: u32,
    pub seed: u64,
}

impl EngineState {
    pub fn read(memory: &[u8]) -> Option<Self> {
        let base = STATE_BASE as usize;
        let block = memory.get(base..base + STATE_LEN)?;
        let u32_at = |addr: u32| {
            let i = (addr - STATE_BASE) as usize;
            u32::from_le_bytes([block[i], block[i + 1], block[i + 2], block[i + 3]])
        };
        let seed_at = (SEED - STATE_BASE) as usize;
        let mut seed = [0u8; 8];
        seed.copy_from_slice(&block[seed_at..seed_at + 8]);
        Some(Self {
            width: u32_at(WIDTH),
            height: u32_at(HEIGHT),
            clicks: u32_at(CLICKS),
            last_click: (u32_at(CLICK_X) as i32, u32_at(CLICK_Y) as i32),
            mouse: (u32_at(MOUSE_X) as i32, u32_at(MOUSE_Y) as i32),
            moves: u32_at(MOVES),
            dragging: u32_at(DRAGGING) != 0,
            drag_changes: u32_at(DRAG_CHANGES),
            pattern: u32_at(PATTERN),
            paused: u32_at(PAUSED) != 0,
            ticks: u32_at(TICKS),
            heap_next: u32_at(HEAP_NEXT),
            inits: u32_at(INITS),
            clears: u32_at(CLEARS),
            seed: u64::from_le_bytes(seed),
        })
    }
}

impl TestEngine {
    pub fn tree() -> Self {
        Self::default()
    }

    pub fn life() -> Self {
        Self {
            flavor: Flavor::Life,
            ..Self::default()
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let mut module = Module::new();

        let mut types = TypeSection::new();
        let ty_i32_i32 = types.len();
        types.ty().function([ValType::I32, ValType::I32], []);
        let ty_i64 = types.len();
        types.ty().function([ValType::I64], []);
        let ty_void = types.len();
        types.ty().function([], []);
        let ty_ret_i32 = types.len();
        types.ty().function([], [ValType::I32]);
        let ty_i32 = types.len();
        types.ty().function([ValType::I32], []);
        let ty_i32_ret_i32 = types.len();
        types.ty().function([ValType::I32], [ValType::I32]);
        module.section(&types);

        let mut imports = ImportSection::new();
        imports.import(
            IMPORT_MODULE,
            IMPORT_DEBUG_PRINT,
            EntityType::Function(ty_i32_i32),
        );
        if let MemorySource::Imported {
            module: mem_module,
            name,
            min_pages,
        } = &self.memory
        {
            imports.import(mem_module, name, memory_type(*min_pages));
        }
        module.section(&imports);

        let (init, tick, click) = match self.flavor {
            Flavor::Tree => ("init", "grow_tree", "mouse_click"),
            Flavor::Life => ("setup", "draw", "click"),
        };
        let defs: Vec<(&str, u32, Function, bool)> = vec![
            ("set_window_dimensions", ty_i32_i32, set_window_dimensions(), true),
            ("set_rand_seed", ty_i64, set_rand_seed(), self.seedable),
            (init, ty_void, self.init(), true),
            (tick, ty_void, self.tick(), true),
            ("get_output_buffer_pointer", ty_ret_i32, self.output_buffer_pointer(), true),
            (click, ty_i32_i32, mouse_click(), self.interactive),
            ("move_mouse", ty_i32_i32, move_mouse(), self.interactive),
            ("set_dragging", ty_i32, set_dragging(), self.interactive),
            ("alloc", ty_i32_ret_i32, self.alloc(), true),
            ("select_pattern", ty_i32, select_pattern(), true),
            ("pause", ty_ret_i32, pause(), true),
            ("clear", ty_void, clear(), true),
        ];

        let mut funcs = FunctionSection::new();
        for (_, ty, _, _) in &defs {
            funcs.function(*ty);
        }
        module.section(&funcs);

        if let MemorySource::Exported { pages } = self.memory {
            let mut mems = MemorySection::new();
            mems.memory(memory_type(pages));
            module.section(&mems);
        }

        let mut exports = ExportSection::new();
        // Function index 0 is the imported `debug_print`.
        for (i, (name, _, _, exported)) in defs.iter().enumerate() {
            if *exported {
                exports.export(name, ExportKind::Func, i as u32 + 1);
            }
        }
        if matches!(self.memory, MemorySource::Exported { .. }) {
            exports.export("memory", ExportKind::Memory, 0);
        }
        module.section(&exports);

        let mut code = CodeSection::new();
        for (_, _, func, _) in &defs {
            code.function(func);
        }
        module.section(&code);

        let mut data = DataSection::new();
        data.active(
            0,
            &ConstExpr::i32_const(HEAP_NEXT as i32),
            HEAP_BASE.to_le_bytes(),
        );
        if let Some(message) = &self.debug_message {
            data.active(
                0,
                &ConstExpr::i32_const(MESSAGE_OFFSET as i32),
                message.as_bytes().iter().copied(),
            );
        }
        module.section(&data);

        module.finish()
    }

    fn init(&self) -> Function {
        let mut f = Function::new([]);
        set_field(&mut f, TICKS, |f| {
            f.instruction(&Instruction::I32Const(0));
        });
        set_field(&mut f, HEAP_NEXT, |f| {
            f.instruction(&Instruction::I32Const(HEAP_BASE as i32));
        });
        increment(&mut f, INITS);
        if let Some(message) = &self.debug_message {
            f.instruction(&Instruction::I32Const(MESSAGE_OFFSET as i32));
            f.instruction(&Instruction::I32Const(message.len() as i32));
            f.instruction(&Instruction::Call(DEBUG_PRINT));
        }
        f.instruction(&Instruction::End);
        f
    }

    fn tick(&self) -> Function {
        // local 0: frame length in bytes
        let mut f = Function::new([(1, ValType::I32)]);
        get_field(&mut f, PAUSED);
        f.instruction(&Instruction::I32Eqz);
        f.instruction(&Instruction::If(BlockType::Empty));
        increment(&mut f, TICKS);
        f.instruction(&Instruction::End);

        frame_len(&mut f);
        f.instruction(&Instruction::LocalSet(0));

        // Only paint when the frame fits in memory.
        f.instruction(&Instruction::LocalGet(0));
        f.instruction(&Instruction::I32Const(self.output_pointer as i32));
        f.instruction(&Instruction::I32Add);
        memory_bytes(&mut f);
        f.instruction(&Instruction::I32LeU);
        f.instruction(&Instruction::If(BlockType::Empty));
        f.instruction(&Instruction::I32Const(self.output_pointer as i32));
        get_field(&mut f, TICKS);
        f.instruction(&Instruction::LocalGet(0));
        f.instruction(&Instruction::MemoryFill(0));
        f.instruction(&Instruction::End);

        f.instruction(&Instruction::End);
        f
    }

    fn output_buffer_pointer(&self) -> Function {
        let mut f = Function::new([]);
        f.instruction(&Instruction::I32Const(self.output_pointer as i32));
        f.instruction(&Instruction::End);
        f
    }

    fn alloc(&self) -> Function {
        // param 0: size, local 1: candidate pointer
        let mut f = Function::new([(1, ValType::I32)]);
        get_field(&mut f, HEAP_NEXT);
        f.instruction(&Instruction::LocalSet(1));

        f.instruction(&Instruction::LocalGet(0));
        f.instruction(&Instruction::I32Const(self.heap_limit as i32));
        f.instruction(&Instruction::I32GtU);
        f.instruction(&Instruction::LocalGet(1));
        f.instruction(&Instruction::LocalGet(0));
        f.instruction(&Instruction::I32Add);
        f.instruction(&Instruction::I32Const(self.heap_limit as i32));
        f.instruction(&Instruction::I32GtU);
        f.instruction(&Instruction::I32Or);
        f.instruction(&Instruction::If(BlockType::Empty));
        f.instruction(&Instruction::I32Const(0));
        f.instruction(&Instruction::Return);
        f.instruction(&Instruction::End);

        set_field(&mut f, HEAP_NEXT, |f| {
            f.instruction(&Instruction::LocalGet(1));
            f.instruction(&Instruction::LocalGet(0));
            f.instruction(&Instruction::I32Add);
        });
        f.instruction(&Instruction::LocalGet(1));
        f.instruction(&Instruction::End);
        f
    }
}

fn memory_type(pages: u32) -> MemoryType {
    MemoryType {
        minimum: u64::from(pages),
        maximum: None,
        memory64: false,
        shared: false,
        page_size_log2: None,
    }
}

fn memarg(offset: u32, align: u32) -> MemArg {
    MemArg {
        offset: u64::from(offset),
        align,
        memory_index: 0,
    }
}

fn get_field(f: &mut Function, addr: u32) {
    f.instruction(&Instruction::I32Const(0));
    f.instruction(&Instruction::I32Load(memarg(addr, 2)));
}

fn set_field(f: &mut Function, addr: u32, value: impl FnOnce(&mut Function)) {
    f.instruction(&Instruction::I32Const(0));
    value(f);
    f.instruction(&Instruction::I32Store(memarg(addr, 2)));
}

fn increment(f: &mut Function, addr: u32) {
    set_field(f, addr, |f| {
        get_field(f, addr);
        f.instruction(&Instruction::I32Const(1));
        f.instruction(&Instruction::I32Add);
    });
}

/// Pushes `width * height * 4`.
fn frame_len(f: &mut Function) {
    get_field(f, WIDTH);
    get_field(f, HEIGHT);
    f.instruction(&Instruction::I32Mul);
    f.instruction(&Instruction::I32Const(4));
    f.instruction(&Instruction::I32Mul);
}

/// Pushes the current memory size in bytes.
fn memory_bytes(f: &mut Function) {
    f.instruction(&Instruction::MemorySize(0));
    f.instruction(&Instruction::I32Const(16));
    f.instruction(&Instruction::I32Shl);
}

fn set_window_dimensions() -> Function {
    // params 0/1: width/height, local 2: bytes needed
    let mut f = Function::new([(1, ValType::I32)]);
    set_field(&mut f, WIDTH, |f| {
        f.instruction(&Instruction::LocalGet(0));
    });
    set_field(&mut f, HEIGHT, |f| {
        f.instruction(&Instruction::LocalGet(1));
    });

    frame_len(&mut f);
    f.instruction(&Instruction::I32Const(OUTPUT_POINTER as i32));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::LocalSet(2));

    f.instruction(&Instruction::LocalGet(2));
    memory_bytes(&mut f);
    f.instruction(&Instruction::I32GtU);
    f.instruction(&Instruction::If(BlockType::Empty));
    // grow by ceil((needed - current) / 64 KiB) pages
    f.instruction(&Instruction::LocalGet(2));
    memory_bytes(&mut f);
    f.instruction(&Instruction::I32Sub);
    f.instruction(&Instruction::I32Const(0xFFFF));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::I32Const(16));
    f.instruction(&Instruction::I32ShrU);
    f.instruction(&Instruction::MemoryGrow(0));
    f.instruction(&Instruction::Drop);
    f.instruction(&Instruction::End);

    f.instruction(&Instruction::End);
    f
}

fn set_rand_seed() -> Function {
    let mut f = Function::new([]);
    f.instruction(&Instruction::I32Const(0));
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::I64Store(memarg(SEED, 3)));
    f.instruction(&Instruction::End);
    f
}

fn mouse_click() -> Function {
    let mut f = Function::new([]);
    increment(&mut f, CLICKS);
    set_field(&mut f, CLICK_X, |f| {
        f.instruction(&Instruction::LocalGet(0));
    });
    set_field(&mut f, CLICK_Y, |f| {
        f.instruction(&Instruction::LocalGet(1));
    });
    f.instruction(&Instruction::End);
    f
}

fn move_mouse() -> Function {
    let mut f = Function::new([]);
    increment(&mut f, MOVES);
    set_field(&mut f, MOUSE_X, |f| {
        f.instruction(&Instruction::LocalGet(0));
    });
    set_field(&mut f, MOUSE_Y, |f| {
        f.instruction(&Instruction::LocalGet(1));
    });
    f.instruction(&Instruction::End);
    f
}

fn set_dragging() -> Function {
    let mut f = Function::new([]);
    increment(&mut f, DRAG_CHANGES);
    set_field(&mut f, DRAGGING, |f| {
        f.instruction(&Instruction::LocalGet(0));
    });
    f.instruction(&Instruction::End);
    f
}

fn select_pattern() -> Function {
    let mut f = Function::new([]);
    set_field(&mut f, PATTERN, |f| {
        f.instruction(&Instruction::LocalGet(0));
    });
    f.instruction(&Instruction::End);
    f
}

fn pause() -> Function {
    let mut f = Function::new([]);
    set_field(&mut f, PAUSED, |f| {
        get_field(f, PAUSED);
        f.instruction(&Instruction::I32Const(1));
        f.instruction(&Instruction::I32Xor);
    });
    get_field(&mut f, PAUSED);
    f.instruction(&Instruction::End);
    f
}

fn clear() -> Function {
    let mut f = Function::new([]);
    for addr in [TICKS, PATTERN] {
        set_field(&mut f, addr, |f| {
            f.instruction(&Instruction::I32Const(0));
        });
    }
    set_field(&mut f, HEAP_NEXT, |f| {
        f.instruction(&Instruction::I32Const(HEAP_BASE as i32));
    });
    increment(&mut f, CLEARS);
    f.instruction(&Instruction::End);
    f
}

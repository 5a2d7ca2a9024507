//! In-process engine double for exercising the bridge without a compiled module.

use super::Engine;
use crate::error::EngineError;
use crate::memory::{MemoryView, MemoryViewMut, WASM_PAGE_SIZE};

/// One call observed by [`FakeEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    SetWindowDimensions { width: u32, height: u32 },
    SetRandSeed(u64),
    Init,
    Tick,
    OutputBufferPointer,
    MouseClick { x: i32, y: i32 },
    MoveMouse { x: i32, y: i32 },
    SetDragging(bool),
    Alloc(u32),
    SelectPattern(u32),
    Pause,
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocBehavior {
    /// Bump-allocate upwards from `heap_base`, returning the null sentinel past `heap_limit`.
    Bump,
    /// Always return the null sentinel.
    Fail,
}

/// Deterministic engine double.
///
/// Memory layout: a bump heap in `[heap_base, heap_limit)` and the frame buffer at
/// [`FakeEngine::output_pointer`]. Every unpaused tick increments the tick counter and fills the
/// `width * height * 4` byte frame with the counter's low byte (when the frame fits in memory).
#[derive(Debug, Clone)]
pub struct FakeEngine {
    memory: Vec<u8>,
    calls: Vec<EngineCall>,
    width: u32,
    height: u32,
    output_pointer: u32,
    heap_base: u32,
    heap_next: u32,
    heap_limit: u32,
    alloc_behavior: AllocBehavior,
    paused: bool,
    ticks: u64,
    seed: Option<u64>,
    selected_pattern: Option<u32>,
    interactive: bool,
}

impl FakeEngine {
    pub const DEFAULT_HEAP_BASE: u32 = 0x1000;
    pub const DEFAULT_OUTPUT_POINTER: u32 = 0x1_0000;

    /// Creates an engine with `pages` 64 KiB pages of memory.
    pub fn new(pages: usize) -> Self {
        Self {
            memory: vec![0; pages * WASM_PAGE_SIZE],
            calls: Vec::new(),
            width: 0,
            height: 0,
            output_pointer: Self::DEFAULT_OUTPUT_POINTER,
            heap_base: Self::DEFAULT_HEAP_BASE,
            heap_next: Self::DEFAULT_HEAP_BASE,
            heap_limit: Self::DEFAULT_OUTPUT_POINTER,
            alloc_behavior: AllocBehavior::Bump,
            paused: false,
            ticks: 0,
            seed: None,
            selected_pattern: None,
            interactive: true,
        }
    }

    /// An engine without interaction exports (click/move/drag), like the growing-tree engine.
    pub fn non_interactive(pages: usize) -> Self {
        Self {
            interactive: false,
            ..Self::new(pages)
        }
    }

    pub fn with_output_pointer(mut self, ptr: u32) -> Self {
        self.output_pointer = ptr;
        self
    }

    /// Moves the output buffer, as an engine reallocating its frame would.
    pub fn set_output_pointer(&mut self, ptr: u32) {
        self.output_pointer = ptr;
    }

    pub fn with_heap(mut self, base: u32, limit: u32) -> Self {
        self.heap_base = base;
        self.heap_next = base;
        self.heap_limit = limit;
        self
    }

    pub fn set_alloc_behavior(&mut self, behavior: AllocBehavior) {
        self.alloc_behavior = behavior;
    }

    /// Simulates the engine growing its memory by `pages` pages.
    pub fn grow(&mut self, pages: usize) {
        let new_len = self.memory.len() + pages * WASM_PAGE_SIZE;
        self.memory.resize(new_len, 0);
    }

    pub fn calls(&self) -> &[EngineCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<EngineCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn selected_pattern(&self) -> Option<u32> {
        self.selected_pattern
    }

    fn frame_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(4)
    }

    fn paint_frame(&mut self) {
        let Some(len) = self.frame_len() else {
            return;
        };
        let start = self.output_pointer as usize;
        let fill = self.ticks as u8;
        if let Some(frame) = start
            .checked_add(len)
            .and_then(|end| self.memory.get_mut(start..end))
        {
            frame.fill(fill);
        }
    }

    fn interaction(&self, call: &'static str) -> Result<(), EngineError> {
        if self.interactive {
            Ok(())
        } else {
            Err(EngineError::Unsupported(call))
        }
    }
}

impl Engine for FakeEngine {
    fn set_window_dimensions(&mut self, width: u32, height: u32) -> Result<(), EngineError> {
        self.calls
            .push(EngineCall::SetWindowDimensions { width, height });
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn set_rand_seed(&mut self, seed: u64) -> Result<(), EngineError> {
        self.calls.push(EngineCall::SetRandSeed(seed));
        self.seed = Some(seed);
        Ok(())
    }

    fn init(&mut self) -> Result<(), EngineError> {
        self.calls.push(EngineCall::Init);
        self.ticks = 0;
        Ok(())
    }

    fn tick(&mut self) -> Result<(), EngineError> {
        self.calls.push(EngineCall::Tick);
        // A paused engine keeps emitting its last frame.
        if !self.paused {
            self.ticks += 1;
            self.paint_frame();
        }
        Ok(())
    }

    fn output_buffer_pointer(&mut self) -> Result<u32, EngineError> {
        self.calls.push(EngineCall::OutputBufferPointer);
        Ok(self.output_pointer)
    }

    fn mouse_click(&mut self, x: i32, y: i32) -> Result<(), EngineError> {
        self.interaction("mouse_click")?;
        self.calls.push(EngineCall::MouseClick { x, y });
        Ok(())
    }

    fn move_mouse(&mut self, x: i32, y: i32) -> Result<(), EngineError> {
        self.interaction("move_mouse")?;
        self.calls.push(EngineCall::MoveMouse { x, y });
        Ok(())
    }

    fn set_dragging(&mut self, dragging: bool) -> Result<(), EngineError> {
        self.interaction("set_dragging")?;
        self.calls.push(EngineCall::SetDragging(dragging));
        Ok(())
    }

    fn alloc(&mut self, size: u32) -> Result<Option<u32>, EngineError> {
        self.calls.push(EngineCall::Alloc(size));
        match self.alloc_behavior {
            AllocBehavior::Fail => Ok(None),
            AllocBehavior::Bump => {
                let Some(end) = self.heap_next.checked_add(size) else {
                    return Ok(None);
                };
                if end > self.heap_limit {
                    return Ok(None);
                }
                let ptr = self.heap_next;
                self.heap_next = end;
                Ok(Some(ptr))
            }
        }
    }

    fn select_pattern(&mut self, offset: u32) -> Result<(), EngineError> {
        self.calls.push(EngineCall::SelectPattern(offset));
        self.selected_pattern = Some(offset);
        Ok(())
    }

    fn pause(&mut self) -> Result<bool, EngineError> {
        self.calls.push(EngineCall::Pause);
        self.paused = !self.paused;
        Ok(self.paused)
    }

    fn clear(&mut self) -> Result<(), EngineError> {
        self.calls.push(EngineCall::Clear);
        self.ticks = 0;
        self.selected_pattern = None;
        self.heap_next = self.heap_base;
        Ok(())
    }

    fn memory(&self) -> MemoryView<'_> {
        MemoryView::new(&self.memory)
    }

    fn memory_mut(&mut self) -> MemoryViewMut<'_> {
        MemoryViewMut::new(&mut self.memory)
    }
}

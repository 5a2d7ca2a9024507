//! Per-frame copy of the engine's output buffer into the host image buffer.
//!
//! The engine's output buffer is RGBA8888, row-major, `width * height * 4` bytes, located at the
//! offset returned by `get_output_buffer_pointer`. The whole buffer is the unit of transfer: a
//! window that does not fit (either in engine memory or in the host buffer) skips the copy for
//! that frame, and the previously copied frame stays on screen.

use crate::memory::MemoryView;

pub const BYTES_PER_PIXEL: usize = 4;

/// Byte length of an RGBA frame, or `None` on overflow.
pub fn frame_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(BYTES_PER_PIXEL)
}

/// Host-side RGBA image buffer. Reallocated on every viewport change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostFrameBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl HostFrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let len = frame_len(width, height).unwrap_or(0);
        Self {
            width,
            height,
            pixels: vec![0; len],
        }
    }

    /// Replaces the buffer with a fresh zeroed allocation of the new size.
    pub fn resize(&mut self, width: u32, height: u32) {
        *self = Self::new(width, height);
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of bytes a transfer may write.
    pub fn capacity(&self) -> usize {
        self.pixels.len()
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let px = self.pixels.get(idx..idx + BYTES_PER_PIXEL)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    Copied { bytes: usize },
    /// `pointer + width * height * 4` lies outside engine memory.
    SkippedOutOfBounds,
    /// The engine window is larger than the host buffer.
    SkippedOversize,
}

impl TransferOutcome {
    pub fn copied(self) -> bool {
        matches!(self, TransferOutcome::Copied { .. })
    }
}

/// Copies `width * height * 4` bytes starting at `pointer` into `frame`.
///
/// `width`/`height` are the host's current viewport dimensions.
pub fn transfer_frame(
    memory: MemoryView<'_>,
    pointer: u32,
    width: u32,
    height: u32,
    frame: &mut HostFrameBuffer,
) -> TransferOutcome {
    let Some(window) = frame_len(width, height).and_then(|len| memory.window(pointer, len)) else {
        return TransferOutcome::SkippedOutOfBounds;
    };
    if window.len() > frame.capacity() {
        return TransferOutcome::SkippedOversize;
    }
    frame.pixels[..window.len()].copy_from_slice(window);
    TransferOutcome::Copied {
        bytes: window.len(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub copied: u64,
    pub skipped_out_of_bounds: u64,
    pub skipped_oversize: u64,
}

impl TransferStats {
    pub fn record(&mut self, outcome: TransferOutcome) {
        match outcome {
            TransferOutcome::Copied { .. } => self.copied += 1,
            TransferOutcome::SkippedOutOfBounds => self.skipped_out_of_bounds += 1,
            TransferOutcome::SkippedOversize => self.skipped_oversize += 1,
        }
    }

    pub fn skipped(&self) -> u64 {
        self.skipped_out_of_bounds + self.skipped_oversize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_with_frame(len: usize, ptr: usize, fill: u8) -> Vec<u8> {
        let mut mem = vec![0u8; len];
        for b in &mut mem[ptr..] {
            *b = fill;
        }
        mem
    }

    #[test]
    fn copies_whole_window() {
        let mem = memory_with_frame(64, 16, 0xAB);
        let mut frame = HostFrameBuffer::new(2, 2);
        let outcome = transfer_frame(MemoryView::new(&mem), 16, 2, 2, &mut frame);
        assert_eq!(outcome, TransferOutcome::Copied { bytes: 16 });
        assert!(frame.pixels().iter().all(|&b| b == 0xAB));
        assert_eq!(frame.pixel(1, 1), Some([0xAB; 4]));
    }

    #[test]
    fn window_past_memory_end_is_skipped() {
        let mem = memory_with_frame(20, 8, 0xAB);
        let mut frame = HostFrameBuffer::new(2, 2);
        let outcome = transfer_frame(MemoryView::new(&mem), 8, 2, 2, &mut frame);
        assert_eq!(outcome, TransferOutcome::SkippedOutOfBounds);
        assert!(frame.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn window_larger_than_host_buffer_is_skipped() {
        let mem = memory_with_frame(128, 0, 0x11);
        let mut frame = HostFrameBuffer::new(2, 2);
        let outcome = transfer_frame(MemoryView::new(&mem), 0, 4, 4, &mut frame);
        assert_eq!(outcome, TransferOutcome::SkippedOversize);
        assert!(frame.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn smaller_window_is_copied_into_larger_buffer() {
        let mem = memory_with_frame(64, 0, 0x22);
        let mut frame = HostFrameBuffer::new(4, 4);
        let outcome = transfer_frame(MemoryView::new(&mem), 0, 2, 2, &mut frame);
        assert_eq!(outcome, TransferOutcome::Copied { bytes: 16 });
        assert!(frame.pixels()[..16].iter().all(|&b| b == 0x22));
        assert!(frame.pixels()[16..].iter().all(|&b| b == 0));
    }

    #[test]
    fn pointer_near_u32_max_is_out_of_bounds() {
        let mem = vec![0u8; 16];
        let mut frame = HostFrameBuffer::new(1, 1);
        let outcome = transfer_frame(MemoryView::new(&mem), u32::MAX, 1, 1, &mut frame);
        assert_eq!(outcome, TransferOutcome::SkippedOutOfBounds);
    }

    #[test]
    fn resize_reallocates_zeroed() {
        let mem = vec![0xFFu8; 16];
        let mut frame = HostFrameBuffer::new(2, 2);
        transfer_frame(MemoryView::new(&mem), 0, 2, 2, &mut frame);
        frame.resize(2, 2);
        assert_eq!(frame.capacity(), 16);
        assert!(frame.pixels().iter().all(|&b| b == 0));
        frame.resize(3, 1);
        assert_eq!(frame.dimensions(), (3, 1));
        assert_eq!(frame.capacity(), 12);
    }

    #[test]
    fn stats_count_each_outcome() {
        let mut stats = TransferStats::default();
        stats.record(TransferOutcome::Copied { bytes: 4 });
        stats.record(TransferOutcome::SkippedOversize);
        stats.record(TransferOutcome::SkippedOutOfBounds);
        assert_eq!(stats.copied, 1);
        assert_eq!(stats.skipped(), 2);
    }
}

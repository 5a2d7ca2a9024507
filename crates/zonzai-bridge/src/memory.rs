//! Transient views over the engine's linear memory.
//!
//! A view borrows the engine, so it cannot outlive the next `&mut` engine call. That is exactly
//! the window in which the engine may grow (and therefore relocate) its backing memory, which
//! means a view is re-derived for every access instead of being cached across calls.

use crate::error::MemoryAccessError;

/// WebAssembly page size in bytes.
pub const WASM_PAGE_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct MemoryView<'a> {
    bytes: &'a [u8],
}

impl<'a> MemoryView<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Returns `len` bytes starting at `offset`, or `None` if any part of the range lies outside
    /// the memory (including arithmetic overflow of `offset + len`).
    pub fn window(&self, offset: u32, len: usize) -> Option<&'a [u8]> {
        let start = usize::try_from(offset).ok()?;
        let end = start.checked_add(len)?;
        self.bytes.get(start..end)
    }

    /// Decodes a byte range as UTF-8, replacing invalid sequences.
    pub fn read_string_lossy(&self, offset: u32, len: usize) -> Option<String> {
        self.window(offset, len)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

#[derive(Debug)]
pub struct MemoryViewMut<'a> {
    bytes: &'a mut [u8],
}

impl<'a> MemoryViewMut<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_view(&self) -> MemoryView<'_> {
        MemoryView::new(self.bytes)
    }

    /// Copies `data` verbatim into memory at `offset`.
    ///
    /// The write is all-or-nothing: an out-of-bounds range leaves memory untouched.
    pub fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), MemoryAccessError> {
        let memory_len = self.bytes.len();
        let oob = MemoryAccessError::OutOfBounds {
            offset,
            len: data.len(),
            memory_len,
        };
        let start = usize::try_from(offset).map_err(|_| oob.clone())?;
        let end = start.checked_add(data.len()).ok_or_else(|| oob.clone())?;
        let dst = self.bytes.get_mut(start..end).ok_or(oob)?;
        dst.copy_from_slice(data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_rejects_ranges_past_the_end() {
        let bytes = [1u8, 2, 3, 4];
        let view = MemoryView::new(&bytes);
        assert_eq!(view.window(0, 4), Some(&bytes[..]));
        assert_eq!(view.window(2, 2), Some(&bytes[2..]));
        assert_eq!(view.window(2, 3), None);
        assert_eq!(view.window(4, 0), Some(&[][..]));
        assert_eq!(view.window(5, 0), None);
    }

    #[test]
    fn window_handles_offset_overflow() {
        let bytes = [0u8; 8];
        let view = MemoryView::new(&bytes);
        assert_eq!(view.window(u32::MAX, usize::MAX), None);
    }

    #[test]
    fn write_is_all_or_nothing() {
        let mut bytes = [0u8; 4];
        let mut view = MemoryViewMut::new(&mut bytes);
        assert_eq!(
            view.write(2, b"abc"),
            Err(MemoryAccessError::OutOfBounds {
                offset: 2,
                len: 3,
                memory_len: 4
            })
        );
        assert_eq!(bytes, [0u8; 4]);

        let mut view = MemoryViewMut::new(&mut bytes);
        view.write(1, b"ab").unwrap();
        assert_eq!(&bytes, b"\0ab\0");
    }

    #[test]
    fn read_string_lossy_replaces_invalid_utf8() {
        let bytes = *b"hi\xffthere";
        let view = MemoryView::new(&bytes);
        assert_eq!(view.read_string_lossy(0, 2).as_deref(), Some("hi"));
        assert_eq!(
            view.read_string_lossy(0, bytes.len()).as_deref(),
            Some("hi\u{fffd}there")
        );
        assert_eq!(view.read_string_lossy(6, 10), None);
    }
}

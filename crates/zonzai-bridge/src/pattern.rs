//! Seed pattern catalog and the allocation/copy protocol used to hand a pattern to the engine.
//!
//! Patterns travel as their run-length text encoding, byte for byte:
//!
//! ```text
//! <count>? b   dead cell(s)
//! <count>? o   live cell(s)
//! <count>? $   end of row(s)
//! !            end of pattern
//! ```
//!
//! The host never decodes a pattern; it only validates the alphabet before asking the engine for
//! memory.

use std::borrow::Cow;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::Engine;
use crate::error::PatternError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedPattern {
    pub name: Cow<'static, str>,
    pub rle: Cow<'static, str>,
}

impl SeedPattern {
    pub const fn new_static(name: &'static str, rle: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            rle: Cow::Borrowed(rle),
        }
    }

    /// The exact bytes transmitted to the engine.
    pub fn encoded(&self) -> &[u8] {
        self.rle.as_bytes()
    }
}

pub const BUILTIN_PATTERNS: &[SeedPattern] = &[
    SeedPattern::new_static("Glider", "bob$2bo$3o!"),
    SeedPattern::new_static("Blinker", "3o!"),
    SeedPattern::new_static("Lightweight spaceship", "bo2bo$o4b$o3bo$4o!"),
    SeedPattern::new_static("R-pentomino", "b2o$2ob$bo!"),
    SeedPattern::new_static(
        "Pulsar",
        "2b3o3b3o2b2$o4bobo4bo$o4bobo4bo$o4bobo4bo$2b3o3b3o2b2$2b3o3b3o2b$o4bobo4bo$o4bobo4bo$o4bobo4bo2$2b3o3b3o!",
    ),
    SeedPattern::new_static(
        "Gosper glider gun",
        "24bo$22bobo$12b2o6b2o12b2o$11bo3bo4b2o12b2o$2o8bo5bo3b2o$2o8bo3bob2o4bobo$10bo5bo7bo$11bo3bo$12b2o!",
    ),
];

/// Checks that `rle` only uses the run-length alphabet and ends with a single `!`.
///
/// ASCII whitespace (line wrapping in catalog files) is accepted and transmitted as-is.
pub fn validate_rle(rle: &str) -> Result<(), PatternError> {
    let bytes = rle.as_bytes();
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(PatternError::Empty);
    }

    let mut terminated = false;
    for (position, &byte) in bytes.iter().enumerate() {
        if terminated {
            if byte.is_ascii_whitespace() {
                continue;
            }
            return Err(PatternError::InvalidEncoding { position, byte });
        }
        match byte {
            b'0'..=b'9' | b'b' | b'o' | b'$' => {}
            b'!' => terminated = true,
            b if b.is_ascii_whitespace() => {}
            _ => return Err(PatternError::InvalidEncoding { position, byte }),
        }
    }

    if terminated {
        Ok(())
    } else {
        Err(PatternError::MissingTerminator)
    }
}

#[derive(Debug, Clone)]
pub struct PatternCatalog {
    entries: Vec<SeedPattern>,
}

impl PatternCatalog {
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN_PATTERNS.to_vec(),
        }
    }

    pub fn from_entries(entries: Vec<SeedPattern>) -> Result<Self, PatternError> {
        for entry in &entries {
            validate_rle(&entry.rle)?;
        }
        Ok(Self { entries })
    }

    /// Parses a JSON array of `{"name": ..., "rle": ...}` objects.
    pub fn from_json(json: &str) -> Result<Self, PatternError> {
        let entries: Vec<SeedPattern> =
            serde_json::from_str(json).map_err(|e| PatternError::Catalog(e.to_string()))?;
        Self::from_entries(entries)
    }

    pub fn load(path: &Path) -> Result<Self, PatternError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| PatternError::Catalog(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// Appends entries from `other`, replacing built-ins that share a name.
    pub fn extend(&mut self, other: PatternCatalog) {
        for entry in other.entries {
            match self.entries.iter_mut().find(|e| e.name == entry.name) {
                Some(existing) => *existing = entry,
                None => self.entries.push(entry),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SeedPattern> {
        self.entries.get(index)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.name.eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SeedPattern> {
        self.entries.iter()
    }
}

impl Default for PatternCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Region of engine memory that now holds a pattern. Owned by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternHandle {
    pub offset: u32,
    pub len: usize,
}

/// Copies `pattern` into engine-owned memory and selects it.
///
/// Protocol: `alloc(len)` → copy bytes verbatim at the returned offset → `select_pattern(offset)`.
/// If allocation fails the engine is left untouched; the allocated region is never reused or
/// freed by the host.
pub fn marshal_pattern<E: Engine + ?Sized>(
    engine: &mut E,
    pattern: &SeedPattern,
) -> Result<PatternHandle, PatternError> {
    let bytes = pattern.encoded();
    let len = bytes.len();
    let size = u32::try_from(len).map_err(|_| PatternError::AllocationFailed { len })?;

    let offset = engine
        .alloc(size)?
        .ok_or(PatternError::AllocationFailed { len })?;

    let written = engine.memory_mut().write(offset, bytes);
    if written.is_err() {
        return Err(PatternError::AllocationOutOfBounds {
            offset,
            len,
            memory_len: engine.memory().len(),
        });
    }

    engine.select_pattern(offset)?;
    tracing::debug!(name = %pattern.name, offset, len, "pattern handed to engine");
    Ok(PatternHandle { offset, len })
}

/// Exclusive selection over a catalog: at most one entry is marked selected, and only after the
/// engine accepted it.
#[derive(Debug, Clone, Default)]
pub struct PatternSelection {
    selected: Option<usize>,
}

impl PatternSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selected == Some(index)
    }

    pub fn select<E: Engine + ?Sized>(
        &mut self,
        engine: &mut E,
        catalog: &PatternCatalog,
        index: usize,
    ) -> Result<PatternHandle, PatternError> {
        let pattern = catalog.get(index).ok_or(PatternError::IndexOutOfRange {
            index,
            len: catalog.len(),
        })?;
        let handle = marshal_pattern(engine, pattern)?;
        self.selected = Some(index);
        Ok(handle)
    }

    /// Forgets the selection (the engine state was cleared).
    pub fn reset(&mut self) {
        self.selected = None;
    }
}

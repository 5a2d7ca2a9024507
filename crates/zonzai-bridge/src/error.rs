use thiserror::Error;

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Failure reported by the engine boundary.
///
/// Instantiation-time variants (`Compile`, `Link`, `MissingExport`, `MissingMemory`) are fatal for
/// the host: no UI is usable without a linked engine. Call-time variants are returned from the
/// individual [`crate::engine::Engine`] methods.
///
/// Messages from the runtime are stored as strings so the error type does not leak the backend's
/// own error representation to callers.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to compile engine module: {0}")]
    Compile(String),

    #[error("failed to link engine module: {0}")]
    Link(String),

    #[error("engine module does not export required function `{0}`")]
    MissingExport(String),

    #[error("engine export `{name}` has an unexpected signature: {message}")]
    ExportSignature { name: String, message: String },

    #[error("engine neither exports `memory` nor imports a host-provided memory")]
    MissingMemory,

    #[error("engine call `{call}` trapped: {message}")]
    Trap { call: &'static str, message: String },

    /// An argument does not fit the engine's `i32` parameter.
    #[error("argument {value} to engine call `{call}` does not fit in an i32")]
    ArgumentOutOfRange { call: &'static str, value: u32 },

    /// The engine does not export the optional operation.
    #[error("engine does not support `{0}`")]
    Unsupported(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryAccessError {
    #[error("out of bounds: offset={offset} len={len} memory_len={memory_len}")]
    OutOfBounds {
        offset: u32,
        len: usize,
        memory_len: usize,
    },
}

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid pattern encoding at byte {position}: {byte:#04x}")]
    InvalidEncoding { position: usize, byte: u8 },

    #[error("pattern encoding is empty")]
    Empty,

    #[error("pattern encoding must end with exactly one `!` terminator")]
    MissingTerminator,

    #[error("no pattern named `{0}` in the catalog")]
    UnknownPattern(String),

    #[error("pattern index {index} out of range (catalog has {len} entries)")]
    IndexOutOfRange { index: usize, len: usize },

    /// The engine returned the null sentinel from `alloc`.
    #[error("engine could not allocate {len} bytes for the pattern")]
    AllocationFailed { len: usize },

    #[error("engine allocation at {offset:#x} (+{len}) lies outside its memory ({memory_len} bytes)")]
    AllocationOutOfBounds {
        offset: u32,
        len: usize,
        memory_len: usize,
    },

    #[error("failed to read pattern catalog: {0}")]
    Catalog(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),

    #[error("failed to parse configuration: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(String),
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Memory(#[from] MemoryAccessError),

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to write frame image: {0}")]
    Image(String),
}

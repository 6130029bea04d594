//! Error types for the apkscope package analysis engine.
//!
//! One structured error enum covers the whole pipeline; recoverable
//! conditions (unparseable certificate, unresolved superclass, advisory
//! scan failures) are expressed as `Option`/empty results at the call
//! site and never surface here.

use thiserror::Error;

/// Main error type for apkscope operations.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Archive path does not exist. Fatal to the single request.
    #[error("archive not found: {0}")]
    NotFound(String),

    /// The file is not a valid zip-style container, or a table inside it
    /// is structurally impossible (zip64, multi-disk, bad magic).
    #[error("invalid archive format: {0}")]
    InvalidFormat(String),

    /// Malformed container or class table encountered mid-enumeration.
    /// Carries how far enumeration got, for diagnostics.
    #[error("corrupt archive data: {message} ({entries} entries, {bytes} bytes processed)")]
    Corrupt {
        message: String,
        entries: u32,
        bytes: u64,
    },

    /// Decode budget exhausted (memory-pressure class of failure).
    /// Carries how far processing got, for diagnostics.
    #[error("decode budget exceeded: {resource} ({used}/{limit}, {entries} entries processed)")]
    ResourceExhausted {
        resource: &'static str,
        used: u64,
        limit: u64,
        entries: u32,
    },

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for apkscope operations
pub type Result<T> = std::result::Result<T, ScanError>;

impl ScanError {
    /// Build a `Corrupt` error annotated with enumeration progress.
    pub fn corrupt(message: impl Into<String>, entries: u32, bytes: u64) -> Self {
        ScanError::Corrupt {
            message: message.into(),
            entries,
            bytes,
        }
    }
}

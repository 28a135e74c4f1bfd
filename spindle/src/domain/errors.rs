//! Structured error types for spindle
//!
//! Using thiserror for automatic Display implementation and error chaining.

use spindle_common::DecodeError;
use std::fmt;
use thiserror::Error;

/// Errors from the capture pipeline (sink and write buffers)
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Buffer of {length} bytes is too small, at least {required} bytes required")]
    BufferTooSmall { length: usize, required: usize },

    #[error("Buffer of {length} bytes cannot be described by a 32-bit chunk size")]
    BufferTooLarge { length: usize },

    #[error("Invalid timestamp unit: {0}")]
    InvalidTimestampUnit(f64),

    #[error("Profile sink has already been closed")]
    SinkClosed,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A consuming `quit` whose final flush failed
///
/// Carries the value that was being shut down, unflushed events included, so
/// the caller can retry the quit or discard it.
#[derive(Error)]
#[error("Final flush failed: {error}")]
pub struct QuitError<T> {
    #[source]
    error: CaptureError,
    value: T,
}

impl<T> QuitError<T> {
    pub(crate) fn new(error: CaptureError, value: T) -> Self {
        Self { error, value }
    }

    #[must_use]
    pub fn error(&self) -> &CaptureError {
        &self.error
    }

    /// The value `quit` was called on, ready for another attempt
    #[must_use]
    pub fn into_inner(self) -> T {
        self.value
    }

    #[must_use]
    pub fn into_parts(self) -> (CaptureError, T) {
        (self.error, self.value)
    }
}

impl<T> fmt::Debug for QuitError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuitError")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<T> From<QuitError<T>> for CaptureError {
    fn from(err: QuitError<T>) -> Self {
        err.error
    }
}

/// Lookup failures reported by the symbol cache
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolCacheError {
    #[error("Symbol cache is full ({capacity} entries)")]
    Full { capacity: usize },

    #[error("No symbol found for address {0:#x}")]
    Unresolved(u64),
}

/// Errors while reading a trace stream back
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("Malformed trace: {0}")]
    Decode(#[from] DecodeError),

    #[error("Chunk truncated: header declares {expected} payload bytes, {actual} present")]
    TruncatedChunk { expected: usize, actual: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to read trace: {0}")]
    Read(#[from] ReadError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

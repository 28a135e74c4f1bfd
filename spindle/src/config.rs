//! Capture configuration
//!
//! Collects the knobs a program sets up once before tracing starts: how large
//! each thread's write buffer is, how many names each thread's symbol cache can
//! hold, and the tick unit written into the stream header.

use crate::capture::MIN_BUFFER_SIZE;
use crate::domain::CaptureError;

/// Default per-thread buffer size (1 MiB)
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Default per-thread symbol cache capacity
pub const DEFAULT_SYMBOL_CACHE_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureConfig {
    /// Bytes per thread write buffer, chunk header included
    pub buffer_size: usize,
    /// Names each thread's symbol cache holds before reporting full
    pub symbol_cache_capacity: usize,
    /// Microseconds per tick
    pub timestamp_unit: f64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            symbol_cache_capacity: DEFAULT_SYMBOL_CACHE_CAPACITY,
            timestamp_unit: 1.0,
        }
    }
}

impl CaptureConfig {
    /// # Errors
    /// Returns [`CaptureError::BufferTooSmall`] or
    /// [`CaptureError::InvalidTimestampUnit`] for settings the capture pipeline
    /// would reject later.
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.buffer_size < MIN_BUFFER_SIZE {
            return Err(CaptureError::BufferTooSmall {
                length: self.buffer_size,
                required: MIN_BUFFER_SIZE,
            });
        }
        if self.timestamp_unit.is_nan() || self.timestamp_unit < 0.0 {
            return Err(CaptureError::InvalidTimestampUnit(self.timestamp_unit));
        }
        Ok(())
    }

    /// A zeroed region of `buffer_size` bytes for one thread
    #[must_use]
    pub fn allocate_buffer(&self) -> Vec<u8> {
        vec![0u8; self.buffer_size]
    }
}

//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers prevent passing a TID where a PID is expected when
//! stamping chunk headers.

use std::fmt;

/// Process ID
///
/// Stored in every chunk header so readers can group chunks by process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pid(pub u32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PID:{}", self.0)
    }
}

/// Thread ID
///
/// Identifies the thread that owns a write buffer. Any stable per-thread
/// number works; the kernel TID is used by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tid(pub u32);

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TID:{}", self.0)
    }
}

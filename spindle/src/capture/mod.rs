//! # Capture Pipeline
//!
//! Turns begin/end calls on each thread into chunks of the binary trace stream.
//!
//! ```text
//!  thread A                 thread B
//! ┌──────────────┐        ┌──────────────┐
//! │ WriteBuffer  │        │ WriteBuffer  │   caller-owned region, no locking
//! │ (+ cache)    │        │ (+ cache)    │
//! └──────┬───────┘        └──────┬───────┘
//!        │ flush: header + payload as one write
//!        ▼                       ▼
//! ┌──────────────────────────────────────┐
//! │ ProfileSink (Mutex<dyn TraceSink>)   │   stream header written once
//! └──────────────────────────────────────┘
//! ```
//!
//! - [`sink`]: the shared destination and the `write/flush/close` trait
//! - [`buffer`]: per-thread write buffer and flush-on-overflow policy
//! - [`thread`]: per-thread context that resolves raw addresses into names
//! - [`clock`]: timestamp source consumed by callers
//!
//! Shutdown order: quit every buffer, then quit the sink.

pub mod buffer;
pub mod clock;
pub mod sink;
pub mod thread;

pub use buffer::{WriteBuffer, MIN_BUFFER_SIZE};
pub use clock::{Clock, MonotonicClock};
pub use sink::{FileSink, MemorySink, ProfileSink, TraceSink};
pub use thread::{current_pid, current_tid, ThreadTracer, UNKNOWN_NAME};

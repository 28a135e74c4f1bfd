//! Per-thread tracing context
//!
//! A [`ThreadTracer`] bundles everything one thread needs to trace by function
//! address: its write buffer, its symbol cache and a resolver. Each thread
//! creates its own and passes it explicitly; nothing is stored in thread-locals.

use crate::capture::buffer::WriteBuffer;
use crate::capture::sink::ProfileSink;
use crate::domain::{CaptureError, Pid, QuitError, SymbolCacheError, Tid};
use crate::symbolization::{SymbolCache, SymbolResolver};
use log::warn;

/// Name recorded when an address cannot be resolved or cached
pub const UNKNOWN_NAME: &str = "(unknown name)";

/// Tracing state owned by a single thread
#[derive(Debug)]
pub struct ThreadTracer<B, R> {
    buffer: WriteBuffer<B>,
    cache: SymbolCache,
    resolver: R,
    warned_full: bool,
}

impl<B: AsMut<[u8]>, R: SymbolResolver> ThreadTracer<B, R> {
    /// # Errors
    /// Returns the [`WriteBuffer::new`] error for an unusable region.
    pub fn new(
        region: B,
        pid: Pid,
        tid: Tid,
        cache_capacity: usize,
        resolver: R,
    ) -> Result<Self, CaptureError> {
        Ok(Self {
            buffer: WriteBuffer::new(region, pid, tid)?,
            cache: SymbolCache::new(cache_capacity),
            resolver,
            warned_full: false,
        })
    }

    /// Record entry into the function at `address`
    ///
    /// # Errors
    /// Returns an error only if a flush made necessary by this event fails.
    pub fn enter(
        &mut self,
        sink: &ProfileSink,
        address: u64,
        when: u64,
    ) -> Result<(), CaptureError> {
        let name = match self.cache.resolve(address, &mut self.resolver) {
            Ok(name) => name,
            Err(SymbolCacheError::Full { capacity }) => {
                if !self.warned_full {
                    warn!(
                        "Symbol cache full ({capacity} entries) on {}, recording {UNKNOWN_NAME:?}",
                        self.buffer.tid()
                    );
                    self.warned_full = true;
                }
                UNKNOWN_NAME
            }
            Err(SymbolCacheError::Unresolved(_)) => UNKNOWN_NAME,
        };
        self.buffer.begin(sink, name, b"", when)
    }

    /// Record exit from the innermost entered function
    ///
    /// # Errors
    /// See [`enter`](Self::enter).
    pub fn exit(&mut self, sink: &ProfileSink, when: u64) -> Result<(), CaptureError> {
        self.buffer.end(sink, when)
    }

    /// # Errors
    /// See [`enter`](Self::enter).
    pub fn name_thread(
        &mut self,
        sink: &ProfileSink,
        name: impl AsRef<[u8]>,
    ) -> Result<(), CaptureError> {
        self.buffer.name_thread(sink, name)
    }

    /// # Errors
    /// Returns the sink's error; buffered events are kept.
    pub fn flush(&mut self, sink: &ProfileSink) -> Result<(), CaptureError> {
        self.buffer.flush(sink)
    }

    /// Flush and hand the buffer region back
    ///
    /// # Errors
    /// Returns the error of the final flush together with the tracer, its
    /// buffered events intact.
    pub fn quit(mut self, sink: &ProfileSink) -> Result<B, QuitError<Self>> {
        match self.buffer.flush(sink) {
            Ok(()) => Ok(self.buffer.into_inner()),
            Err(error) => Err(QuitError::new(error, self)),
        }
    }

    #[must_use]
    pub fn buffer(&self) -> &WriteBuffer<B> {
        &self.buffer
    }

    #[must_use]
    pub fn cache(&self) -> &SymbolCache {
        &self.cache
    }
}

/// ID of the current process
#[must_use]
pub fn current_pid() -> Pid {
    Pid(std::process::id())
}

/// Kernel thread ID of the calling thread
#[cfg(target_os = "linux")]
#[must_use]
#[allow(unsafe_code)]
pub fn current_tid() -> Tid {
    // SAFETY: gettid takes no arguments and cannot fail
    let tid = unsafe { libc::syscall(libc::SYS_gettid) };
    Tid(u32::try_from(tid).unwrap_or_default())
}

/// Process-unique number of the calling thread
#[cfg(not(target_os = "linux"))]
#[must_use]
pub fn current_tid() -> Tid {
    use std::sync::atomic::{AtomicU32, Ordering};

    static NEXT_TID: AtomicU32 = AtomicU32::new(1);
    thread_local! {
        static TID: u32 = NEXT_TID.fetch_add(1, Ordering::Relaxed);
    }
    Tid(TID.with(|tid| *tid))
}

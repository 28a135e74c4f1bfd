//! Profile sink and destination implementations
//!
//! A [`ProfileSink`] owns the destination every write buffer flushes into. It
//! writes the stream header once on creation and serializes chunk writes behind a
//! mutex, so it can be shared between threads by reference or `Arc`.

use crate::domain::CaptureError;
use log::{debug, warn};
use spindle_common::StreamHeader;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Destination of a trace stream
///
/// Every chunk reaches the destination through a single `write` call holding the
/// complete chunk.
pub trait TraceSink: Send {
    /// Append `bytes` to the stream
    ///
    /// # Errors
    /// Returns the underlying I/O error; the bytes may be partially written.
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Push buffered bytes towards durable storage
    ///
    /// # Errors
    /// Returns the underlying I/O error.
    fn flush(&mut self) -> io::Result<()>;

    /// Finish the stream; called exactly once before the sink is dropped
    ///
    /// # Errors
    /// Returns the underlying I/O error.
    fn close(&mut self) -> io::Result<()>;
}

/// Shared trace destination
pub struct ProfileSink {
    timestamp_unit: f64,
    sink: Mutex<Option<Box<dyn TraceSink>>>,
}

impl ProfileSink {
    /// Open a trace stream on `sink`, writing the stream header
    ///
    /// # Errors
    /// Returns [`CaptureError::InvalidTimestampUnit`] for a negative or NaN unit.
    /// If the header cannot be written the sink is closed, dropped, and the
    /// write error returned.
    pub fn with_sink<S>(timestamp_unit: f64, sink: S) -> Result<Self, CaptureError>
    where
        S: TraceSink + 'static,
    {
        validate_timestamp_unit(timestamp_unit)?;

        let mut sink: Box<dyn TraceSink> = Box::new(sink);
        let header = StreamHeader { timestamp_unit }.to_bytes();
        if let Err(err) = sink.write(&header) {
            warn!("Failed to write trace stream header: {err}");
            if let Err(close_err) = sink.close() {
                debug!("Closing sink after failed header write also failed: {close_err}");
            }
            return Err(err.into());
        }

        debug!("Opened profile sink (timestamp unit {timestamp_unit})");
        Ok(Self {
            timestamp_unit,
            sink: Mutex::new(Some(sink)),
        })
    }

    /// Create (or truncate) a trace file at `path` and open a stream on it
    ///
    /// # Errors
    /// Returns an error for an invalid unit, if the file cannot be created, or if
    /// the header cannot be written.
    pub fn create_file(path: impl AsRef<Path>, timestamp_unit: f64) -> Result<Self, CaptureError> {
        validate_timestamp_unit(timestamp_unit)?;
        let path = path.as_ref();
        let sink = FileSink::create(path)?;
        debug!("Writing trace to {}", path.display());
        Self::with_sink(timestamp_unit, sink)
    }

    /// Multiplier converting raw ticks into microseconds
    #[must_use]
    pub fn timestamp_unit(&self) -> f64 {
        self.timestamp_unit
    }

    /// Write raw bytes as one contiguous piece of the stream
    ///
    /// # Errors
    /// Returns [`CaptureError::SinkClosed`] after [`quit`](Self::quit), or the
    /// destination's I/O error.
    pub fn write(&self, bytes: &[u8]) -> Result<(), CaptureError> {
        let mut guard = self.lock();
        let sink = guard.as_mut().ok_or(CaptureError::SinkClosed)?;
        sink.write(bytes)?;
        Ok(())
    }

    /// Flush the destination
    ///
    /// # Errors
    /// Returns [`CaptureError::SinkClosed`] after [`quit`](Self::quit), or the
    /// destination's I/O error.
    pub fn flush(&self) -> Result<(), CaptureError> {
        let mut guard = self.lock();
        let sink = guard.as_mut().ok_or(CaptureError::SinkClosed)?;
        sink.flush()?;
        Ok(())
    }

    /// Close and drop the destination
    ///
    /// Calling this again is a no-op that performs no I/O.
    ///
    /// # Errors
    /// Returns the error reported by the destination's `close`. The destination
    /// is dropped either way.
    pub fn quit(&self) -> Result<(), CaptureError> {
        let Some(mut sink) = self.lock().take() else {
            return Ok(());
        };
        let result = sink.close();
        drop(sink);
        debug!("Closed profile sink");
        result.map_err(CaptureError::from)
    }

    /// Whether [`quit`](Self::quit) has already run
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn TraceSink>>> {
        // A panic while holding the lock leaves the destination usable
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ProfileSink {
    fn drop(&mut self) {
        if let Err(err) = self.quit() {
            warn!("Failed to close profile sink: {err}");
        }
    }
}

impl fmt::Debug for ProfileSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileSink")
            .field("timestamp_unit", &self.timestamp_unit)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn validate_timestamp_unit(timestamp_unit: f64) -> Result<(), CaptureError> {
    if timestamp_unit.is_nan() || timestamp_unit < 0.0 {
        return Err(CaptureError::InvalidTimestampUnit(timestamp_unit));
    }
    Ok(())
}

// ============================================================================
// File destination
// ============================================================================

/// Buffered append-only trace file
#[derive(Debug)]
pub struct FileSink {
    writer: BufWriter<File>,
}

impl FileSink {
    /// Truncate or create `path`, then reopen it for appending
    ///
    /// # Errors
    /// Returns the I/O error from creating or reopening the file.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        File::create(path)?;
        let file = OpenOptions::new().append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl TraceSink for FileSink {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    fn close(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()
    }
}

// ============================================================================
// In-memory destination
// ============================================================================

#[derive(Debug, Default)]
struct MemoryState {
    writes: Vec<Vec<u8>>,
    flushes: usize,
    closes: usize,
    failing: bool,
}

/// In-memory destination recording every call
///
/// Clones share the same recording, so a test can keep one handle while the
/// profile sink owns the other.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose `write` and `flush` fail until [`set_failing`](Self::set_failing)
    /// turns failures off
    #[must_use]
    pub fn failing() -> Self {
        let sink = Self::new();
        sink.set_failing(true);
        sink
    }

    pub fn set_failing(&self, failing: bool) {
        self.state().failing = failing;
    }

    /// Every successful write, in order
    #[must_use]
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state().writes.clone()
    }

    /// All written bytes concatenated
    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.state().writes.concat()
    }

    #[must_use]
    pub fn flush_count(&self) -> usize {
        self.state().flushes
    }

    #[must_use]
    pub fn close_count(&self) -> usize {
        self.state().closes
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TraceSink for MemorySink {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut state = self.state();
        if state.failing {
            return Err(io::Error::other("injected write failure"));
        }
        state.writes.push(bytes.to_vec());
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self.state();
        if state.failing {
            return Err(io::Error::other("injected flush failure"));
        }
        state.flushes += 1;
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.state().closes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spindle_common::{decode_header, STREAM_HEADER_SIZE};

    #[test]
    fn test_header_written_once_on_creation() {
        let memory = MemorySink::new();
        let sink = ProfileSink::with_sink(0.5, memory.clone()).unwrap();

        let writes = memory.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].len(), STREAM_HEADER_SIZE);
        assert_eq!(decode_header(&writes[0]).unwrap().timestamp_unit, 0.5);
        assert!((sink.timestamp_unit() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rejects_invalid_timestamp_unit() {
        let memory = MemorySink::new();
        let err = ProfileSink::with_sink(-1.0, memory.clone()).unwrap_err();
        assert!(matches!(err, CaptureError::InvalidTimestampUnit(_)));
        assert!(memory.writes().is_empty());

        assert!(matches!(
            ProfileSink::with_sink(f64::NAN, MemorySink::new()),
            Err(CaptureError::InvalidTimestampUnit(_))
        ));
        assert!(ProfileSink::with_sink(0.0, MemorySink::new()).is_ok());
    }

    #[test]
    fn test_failed_header_write_closes_sink() {
        let memory = MemorySink::failing();
        let err = ProfileSink::with_sink(1.0, memory.clone()).unwrap_err();
        assert!(matches!(err, CaptureError::Io(_)));
        assert_eq!(memory.close_count(), 1);
        assert!(memory.writes().is_empty());
    }

    #[test]
    fn test_quit_is_idempotent() {
        let memory = MemorySink::new();
        let sink = ProfileSink::with_sink(1.0, memory.clone()).unwrap();

        sink.quit().unwrap();
        sink.quit().unwrap();
        drop(sink);

        assert_eq!(memory.close_count(), 1);
        assert_eq!(memory.writes().len(), 1);
    }

    #[test]
    fn test_operations_after_quit_fail_fast() {
        let memory = MemorySink::new();
        let sink = ProfileSink::with_sink(1.0, memory.clone()).unwrap();
        sink.quit().unwrap();

        assert!(sink.is_closed());
        assert!(matches!(sink.write(b"x"), Err(CaptureError::SinkClosed)));
        assert!(matches!(sink.flush(), Err(CaptureError::SinkClosed)));
        assert_eq!(memory.writes().len(), 1);
        assert_eq!(memory.flush_count(), 0);
    }

    #[test]
    fn test_drop_closes_open_sink() {
        let memory = MemorySink::new();
        drop(ProfileSink::with_sink(1.0, memory.clone()).unwrap());
        assert_eq!(memory.close_count(), 1);
    }

    #[test]
    fn test_flush_reaches_destination() {
        let memory = MemorySink::new();
        let sink = ProfileSink::with_sink(1.0, memory.clone()).unwrap();
        sink.flush().unwrap();
        assert_eq!(memory.flush_count(), 1);
    }

    #[test]
    fn test_file_sink_truncates_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.spall");
        std::fs::write(&path, vec![0xEE; 4096]).unwrap();

        let sink = ProfileSink::create_file(&path, 1.0).unwrap();
        sink.write(b"abc").unwrap();
        sink.quit().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), STREAM_HEADER_SIZE + 3);
        assert_eq!(&bytes[STREAM_HEADER_SIZE..], b"abc");
    }
}

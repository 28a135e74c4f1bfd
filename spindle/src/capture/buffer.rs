//! Per-thread write buffer
//!
//! Events are encoded straight into a caller-owned byte region behind a reserved
//! chunk header. When the next event would not fit, the buffer flushes itself to
//! the [`ProfileSink`] first, so an append never fails for lack of space.

use crate::capture::sink::ProfileSink;
use crate::domain::{CaptureError, Pid, QuitError, Tid};
use spindle_common::{
    begin_event_size, encode_begin, encode_end, encode_name, name_event_size, BufferHeader,
    NameKind, BUFFER_HEADER_SIZE, END_EVENT_SIZE, MAX_BEGIN_EVENT_SIZE,
};

/// Smallest region that can hold a chunk header and one maximal Begin event
pub const MIN_BUFFER_SIZE: usize = BUFFER_HEADER_SIZE + MAX_BEGIN_EVENT_SIZE;

/// Write buffer owned by a single thread
///
/// `B` is any byte region the caller hands over (`Vec<u8>`, `Box<[u8]>`,
/// `&mut [u8]`). [`quit`](Self::quit) flushes and returns it.
#[derive(Debug)]
pub struct WriteBuffer<B> {
    data: B,
    length: usize,
    /// Write cursor; `BUFFER_HEADER_SIZE` means empty
    head: usize,
    pid: Pid,
    tid: Tid,
    first_ts: u64,
    /// Set once the current chunk holds a timed event
    has_timestamp: bool,
}

impl<B: AsMut<[u8]>> WriteBuffer<B> {
    /// Wrap `region` as the write buffer for thread `tid` of process `pid`
    ///
    /// # Errors
    /// Returns [`CaptureError::BufferTooSmall`] if the region is shorter than
    /// [`MIN_BUFFER_SIZE`], and [`CaptureError::BufferTooLarge`] if its payload
    /// cannot be described by the 32-bit chunk size.
    pub fn new(mut region: B, pid: Pid, tid: Tid) -> Result<Self, CaptureError> {
        let length = region.as_mut().len();
        if length < MIN_BUFFER_SIZE {
            return Err(CaptureError::BufferTooSmall {
                length,
                required: MIN_BUFFER_SIZE,
            });
        }
        if u32::try_from(length - BUFFER_HEADER_SIZE).is_err() {
            return Err(CaptureError::BufferTooLarge { length });
        }

        Ok(Self {
            data: region,
            length,
            head: BUFFER_HEADER_SIZE,
            pid,
            tid,
            first_ts: 0,
            has_timestamp: false,
        })
    }

    /// Record the start of `name` at `when`
    ///
    /// `name` and `args` are truncated to 255 bytes each.
    ///
    /// # Errors
    /// Returns an error only if a flush made necessary by this event fails; the
    /// event is dropped and the buffered bytes are kept.
    pub fn begin(
        &mut self,
        sink: &ProfileSink,
        name: impl AsRef<[u8]>,
        args: impl AsRef<[u8]>,
        when: u64,
    ) -> Result<(), CaptureError> {
        let (name, args) = (name.as_ref(), args.as_ref());
        let size = begin_event_size(name.len(), args.len());
        self.append(sink, size, Some(when), |dst| encode_begin(dst, name, args, when))
    }

    /// Record the end of the innermost open event at `when`
    ///
    /// # Errors
    /// See [`begin`](Self::begin).
    pub fn end(&mut self, sink: &ProfileSink, when: u64) -> Result<(), CaptureError> {
        self.append(sink, END_EVENT_SIZE, Some(when), |dst| encode_end(dst, when))
    }

    /// Label this buffer's thread
    ///
    /// # Errors
    /// See [`begin`](Self::begin).
    pub fn name_thread(
        &mut self,
        sink: &ProfileSink,
        name: impl AsRef<[u8]>,
    ) -> Result<(), CaptureError> {
        self.append_name(sink, name.as_ref(), NameKind::Thread)
    }

    /// Label this buffer's process
    ///
    /// # Errors
    /// See [`begin`](Self::begin).
    pub fn name_process(
        &mut self,
        sink: &ProfileSink,
        name: impl AsRef<[u8]>,
    ) -> Result<(), CaptureError> {
        self.append_name(sink, name.as_ref(), NameKind::Process)
    }

    /// Write the buffered events to `sink` as one chunk
    ///
    /// Does nothing when the buffer is empty.
    ///
    /// # Errors
    /// Returns the sink's error. The buffered events stay in place so the flush
    /// can be retried.
    pub fn flush(&mut self, sink: &ProfileSink) -> Result<(), CaptureError> {
        if self.is_empty() {
            return Ok(());
        }

        let payload_size = u32::try_from(self.head - BUFFER_HEADER_SIZE)
            .map_err(|_| CaptureError::BufferTooLarge { length: self.length })?;
        let header = BufferHeader {
            payload_size,
            tid: self.tid.0,
            pid: self.pid.0,
            first_ts: self.first_ts,
        };

        let head = self.head;
        let data = self.data.as_mut();
        data[..BUFFER_HEADER_SIZE].copy_from_slice(&header.to_bytes());
        sink.write(&data[..head])?;

        self.head = BUFFER_HEADER_SIZE;
        self.has_timestamp = false;
        Ok(())
    }

    /// Flush any remaining events and hand the region back
    ///
    /// # Errors
    /// Returns the error of the final flush together with the buffer, its
    /// unflushed events intact, so the quit can be retried.
    pub fn quit(mut self, sink: &ProfileSink) -> Result<B, QuitError<Self>> {
        match self.flush(sink) {
            Ok(()) => Ok(self.data),
            Err(error) => Err(QuitError::new(error, self)),
        }
    }

    fn append_name(
        &mut self,
        sink: &ProfileSink,
        name: &[u8],
        kind: NameKind,
    ) -> Result<(), CaptureError> {
        let size = name_event_size(name.len());
        self.append(sink, size, None, |dst| encode_name(dst, name, kind))
    }

    fn append(
        &mut self,
        sink: &ProfileSink,
        size: usize,
        when: Option<u64>,
        encode: impl FnOnce(&mut [u8]) -> Option<usize>,
    ) -> Result<(), CaptureError> {
        if self.head + size > self.length {
            self.flush(sink)?;
        }

        let head = self.head;
        let written = encode(&mut self.data.as_mut()[head..]).ok_or(
            CaptureError::BufferTooSmall {
                length: self.length,
                required: head + size,
            },
        )?;

        if let Some(when) = when {
            if !self.has_timestamp {
                self.first_ts = self.first_ts.max(when);
                self.has_timestamp = true;
            }
        }
        self.head += written;
        Ok(())
    }
}

impl<B> WriteBuffer<B> {
    /// Hand the region back without flushing, discarding any buffered events
    #[must_use]
    pub fn into_inner(self) -> B {
        self.data
    }

    /// Bytes of encoded events waiting to be flushed
    #[must_use]
    pub fn len(&self) -> usize {
        self.head - BUFFER_HEADER_SIZE
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head == BUFFER_HEADER_SIZE
    }

    /// Total size of the region, chunk header included
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.length
    }

    #[must_use]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    #[must_use]
    pub fn tid(&self) -> Tid {
        self.tid
    }

    /// Timestamp the next flushed chunk header will carry
    #[must_use]
    pub fn first_ts(&self) -> u64 {
        self.first_ts
    }
}

//! Reading trace streams back
//!
//! A trace is a stream header followed by any number of chunks. Chunks from
//! different threads interleave in flush order; their `first_ts` lets consumers
//! order them approximately.

use crate::domain::{Pid, ReadError, Tid};
use spindle_common::{
    decode_buffer_header, decode_event, decode_header, BufferHeader, DecodeError, Event,
    StreamHeader, BUFFER_HEADER_SIZE, STREAM_HEADER_SIZE,
};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// One flushed write buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub header: BufferHeader,
    pub payload: Vec<u8>,
}

impl Chunk {
    #[must_use]
    pub fn pid(&self) -> Pid {
        Pid(self.header.pid)
    }

    #[must_use]
    pub fn tid(&self) -> Tid {
        Tid(self.header.tid)
    }

    /// Decode the chunk's events in order
    ///
    /// Iteration stops after the first decode error.
    #[must_use]
    pub fn events(&self) -> Events<'_> {
        Events {
            rest: &self.payload,
            failed: false,
        }
    }
}

/// Iterator over the events of a [`Chunk`]
#[derive(Debug)]
pub struct Events<'a> {
    rest: &'a [u8],
    failed: bool,
}

impl<'a> Iterator for Events<'a> {
    type Item = Result<Event<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.rest.is_empty() {
            return None;
        }
        match decode_event(self.rest) {
            Ok((event, used)) => {
                self.rest = &self.rest[used..];
                Some(Ok(event))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

/// A fully read trace
#[derive(Debug, Clone)]
pub struct Trace {
    pub header: StreamHeader,
    pub chunks: Vec<Chunk>,
}

/// Streaming trace reader
#[derive(Debug)]
pub struct TraceReader<R> {
    reader: R,
    header: Option<StreamHeader>,
}

impl TraceReader<BufReader<File>> {
    /// # Errors
    /// Returns an error if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReadError> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> TraceReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            header: None,
        }
    }

    /// Read and validate the stream header; later calls return the cached copy
    ///
    /// # Errors
    /// Returns an error if the header is missing, truncated or not a supported
    /// trace stream.
    pub fn read_header(&mut self) -> Result<StreamHeader, ReadError> {
        if let Some(header) = self.header {
            return Ok(header);
        }
        let mut bytes = [0u8; STREAM_HEADER_SIZE];
        let read = read_full(&mut self.reader, &mut bytes)?;
        let header = decode_header(&bytes[..read])?;
        self.header = Some(header);
        Ok(header)
    }

    /// Next chunk, or `None` at a clean end of stream
    ///
    /// # Errors
    /// Returns an error for I/O failures and for a chunk cut short.
    pub fn next_chunk(&mut self) -> Result<Option<Chunk>, ReadError> {
        self.read_header()?;

        let mut header_bytes = [0u8; BUFFER_HEADER_SIZE];
        let read = read_full(&mut self.reader, &mut header_bytes)?;
        if read == 0 {
            return Ok(None);
        }
        let header = decode_buffer_header(&header_bytes[..read])?;

        // grows with the bytes actually present, not the declared size
        let expected = header.payload_size as usize;
        let mut payload = Vec::new();
        let actual = (&mut self.reader)
            .take(u64::from(header.payload_size))
            .read_to_end(&mut payload)?;
        if actual < expected {
            return Err(ReadError::TruncatedChunk { expected, actual });
        }
        Ok(Some(Chunk { header, payload }))
    }

    /// Iterate over the remaining chunks
    pub fn chunks(&mut self) -> impl Iterator<Item = Result<Chunk, ReadError>> + '_ {
        std::iter::from_fn(move || self.next_chunk().transpose())
    }

    /// Read the header and every chunk
    ///
    /// # Errors
    /// Returns the first error encountered.
    pub fn read_all(mut self) -> Result<Trace, ReadError> {
        let header = self.read_header()?;
        let chunks = self.chunks().collect::<Result<Vec<_>, _>>()?;
        Ok(Trace { header, chunks })
    }
}

/// Fill `buf` as far as the reader allows, returning the bytes read
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spindle_common::{encode_begin, encode_end, encode_pad_skip};

    fn stream(chunks: &[(BufferHeader, Vec<u8>)]) -> Vec<u8> {
        let mut out = StreamHeader { timestamp_unit: 1.0 }.to_bytes().to_vec();
        for (header, payload) in chunks {
            out.extend_from_slice(&header.to_bytes());
            out.extend_from_slice(payload);
        }
        out
    }

    fn payload() -> Vec<u8> {
        let mut buf = [0u8; 64];
        let mut n = encode_begin(&mut buf, b"f", b"", 100).unwrap();
        n += encode_end(&mut buf[n..], 150).unwrap();
        buf[..n].to_vec()
    }

    #[test]
    fn test_read_all_chunks() {
        let payload = payload();
        let header = BufferHeader {
            payload_size: u32::try_from(payload.len()).unwrap(),
            tid: 2,
            pid: 1,
            first_ts: 100,
        };
        let bytes = stream(&[(header, payload.clone()), (header, payload)]);

        let trace = TraceReader::new(bytes.as_slice()).read_all().unwrap();
        assert_eq!(trace.chunks.len(), 2);
        assert_eq!(trace.chunks[0].tid(), Tid(2));
        let events: Vec<_> = trace.chunks[1].events().collect::<Result<_, _>>().unwrap();
        assert_eq!(
            events,
            vec![
                Event::Begin {
                    when: 100,
                    name: b"f",
                    args: b""
                },
                Event::End { when: 150 }
            ]
        );
    }

    #[test]
    fn test_header_only_stream_has_no_chunks() {
        let bytes = stream(&[]);
        let mut reader = TraceReader::new(bytes.as_slice());
        assert!((reader.read_header().unwrap().timestamp_unit - 1.0).abs() < f64::EPSILON);
        assert!(reader.next_chunk().unwrap().is_none());
    }

    #[test]
    fn test_empty_input_is_truncated_header() {
        let err = TraceReader::new(&[0u8; 0][..]).read_all().unwrap_err();
        assert!(matches!(err, ReadError::Decode(DecodeError::Truncated { .. })));
    }

    #[test]
    fn test_truncated_chunk() {
        let header = BufferHeader {
            payload_size: 50,
            ..BufferHeader::default()
        };
        let bytes = stream(&[(header, vec![4; 10])]);
        let err = TraceReader::new(bytes.as_slice()).read_all().unwrap_err();
        assert!(matches!(
            err,
            ReadError::TruncatedChunk {
                expected: 50,
                actual: 10
            }
        ));
    }

    #[test]
    fn test_oversized_declared_payload_is_truncated_chunk() {
        let header = BufferHeader {
            payload_size: u32::MAX,
            ..BufferHeader::default()
        };
        let bytes = stream(&[(header, payload())]);
        let err = TraceReader::new(bytes.as_slice()).next_chunk().unwrap_err();
        assert!(matches!(
            err,
            ReadError::TruncatedChunk {
                expected,
                actual: 21
            } if expected == u32::MAX as usize
        ));
    }

    #[test]
    fn test_events_skip_padding_and_stop_on_bad_tag() {
        let mut buf = [0u8; 64];
        let mut n = encode_pad_skip(&mut buf, 3).unwrap();
        n += encode_end(&mut buf[n..], 7).unwrap();
        buf[n] = 0xEE;
        let chunk = Chunk {
            header: BufferHeader::default(),
            payload: buf[..=n].to_vec(),
        };

        let events: Vec<_> = chunk.events().collect();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], Ok(Event::PadSkip { size: 3 }));
        assert_eq!(events[1], Ok(Event::End { when: 7 }));
        assert_eq!(events[2], Err(DecodeError::InvalidTag(0xEE)));
    }
}

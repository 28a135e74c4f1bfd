//! Pure encode/decode functions for the trace wire format
//!
//! Encoders take a destination slice and return the number of bytes written, or
//! `None` when the destination is too small. Nothing is written in that case.

use crate::{
    BufferHeader, Event, EventType, NameKind, StreamHeader, BEGIN_EVENT_HEADER_SIZE,
    BUFFER_HEADER_SIZE, END_EVENT_SIZE, MAGIC, MAX_FIELD_LEN, NAME_EVENT_HEADER_SIZE,
    OVERWRITE_TIMESTAMP_EVENT_SIZE, PAD_SKIP_HEADER_SIZE, STREAM_HEADER_SIZE, VERSION,
};

/// Errors raised while decoding a trace stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid event tag {0:#04x}")]
    InvalidTag(u8),

    #[error("truncated input: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("bad stream magic {0:#x}")]
    BadMagic(u64),

    #[error("unsupported stream version {0}")]
    UnsupportedVersion(u64),

    #[error("reserved header field is {0:#x}, expected 0")]
    NonZeroReserved(u64),
}

// ============================================================================
// Sizes
// ============================================================================

fn clamp(field: &[u8]) -> &[u8] {
    &field[..field.len().min(MAX_FIELD_LEN)]
}

/// Encoded size of a Begin event for the given raw field lengths
///
/// Lengths above [`MAX_FIELD_LEN`] count as truncated.
#[must_use]
pub const fn begin_event_size(name_len: usize, args_len: usize) -> usize {
    let name_len = if name_len > MAX_FIELD_LEN { MAX_FIELD_LEN } else { name_len };
    let args_len = if args_len > MAX_FIELD_LEN { MAX_FIELD_LEN } else { args_len };
    BEGIN_EVENT_HEADER_SIZE + name_len + args_len
}

/// Encoded size of a name event for the given raw name length
#[must_use]
pub const fn name_event_size(name_len: usize) -> usize {
    let name_len = if name_len > MAX_FIELD_LEN { MAX_FIELD_LEN } else { name_len };
    NAME_EVENT_HEADER_SIZE + name_len
}

// ============================================================================
// Encoding
// ============================================================================

/// Write the 32-byte stream header
#[must_use]
pub fn encode_header(dst: &mut [u8], timestamp_unit: f64) -> Option<usize> {
    let out = dst.get_mut(..STREAM_HEADER_SIZE)?;
    out.copy_from_slice(&StreamHeader { timestamp_unit }.to_bytes());
    Some(STREAM_HEADER_SIZE)
}

/// Write the 20-byte chunk prefix
#[must_use]
pub fn encode_buffer_header(dst: &mut [u8], header: &BufferHeader) -> Option<usize> {
    let out = dst.get_mut(..BUFFER_HEADER_SIZE)?;
    out.copy_from_slice(&header.to_bytes());
    Some(BUFFER_HEADER_SIZE)
}

/// Write a Begin event, truncating `name` and `args` to 255 bytes each
#[must_use]
pub fn encode_begin(dst: &mut [u8], name: &[u8], args: &[u8], when: u64) -> Option<usize> {
    let name = clamp(name);
    let args = clamp(args);
    let name_len = u8::try_from(name.len()).ok()?;
    let args_len = u8::try_from(args.len()).ok()?;
    let size = begin_event_size(name.len(), args.len());
    let out = dst.get_mut(..size)?;

    out[0] = EventType::Begin as u8;
    out[1..9].copy_from_slice(&when.to_le_bytes());
    out[9] = name_len;
    out[10] = args_len;
    let (name_out, args_out) = out[BEGIN_EVENT_HEADER_SIZE..].split_at_mut(name.len());
    name_out.copy_from_slice(name);
    args_out.copy_from_slice(args);
    Some(size)
}

/// Write an End event
#[must_use]
pub fn encode_end(dst: &mut [u8], when: u64) -> Option<usize> {
    let out = dst.get_mut(..END_EVENT_SIZE)?;
    out[0] = EventType::End as u8;
    out[1..9].copy_from_slice(&when.to_le_bytes());
    Some(END_EVENT_SIZE)
}

/// Write a thread or process name event, truncating `name` to 255 bytes
#[must_use]
pub fn encode_name(dst: &mut [u8], name: &[u8], kind: NameKind) -> Option<usize> {
    let name = clamp(name);
    let name_len = u8::try_from(name.len()).ok()?;
    let size = name_event_size(name.len());
    let out = dst.get_mut(..size)?;

    out[0] = kind.event_type() as u8;
    out[1] = name_len;
    out[NAME_EVENT_HEADER_SIZE..].copy_from_slice(name);
    Some(size)
}

/// Write a PadSkip event followed by `size` zeroed bytes
#[must_use]
pub fn encode_pad_skip(dst: &mut [u8], size: u32) -> Option<usize> {
    let total = PAD_SKIP_HEADER_SIZE.checked_add(usize::try_from(size).ok()?)?;
    let out = dst.get_mut(..total)?;
    out[0] = EventType::PadSkip as u8;
    out[1..5].copy_from_slice(&size.to_le_bytes());
    out[PAD_SKIP_HEADER_SIZE..].fill(0);
    Some(total)
}

/// Write an event that changes the timestamp unit for the rest of the stream
#[must_use]
pub fn encode_overwrite_timestamp(dst: &mut [u8], timestamp_unit: f64) -> Option<usize> {
    let out = dst.get_mut(..OVERWRITE_TIMESTAMP_EVENT_SIZE)?;
    out[0] = EventType::OverwriteTimestamp as u8;
    out[1..9].copy_from_slice(&timestamp_unit.to_le_bytes());
    Some(OVERWRITE_TIMESTAMP_EVENT_SIZE)
}

// ============================================================================
// Decoding
// ============================================================================

struct Cursor<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    const fn new(src: &'a [u8]) -> Self {
        Self { src, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let needed = self.pos.saturating_add(n);
        let bytes = self.src.get(self.pos..needed).ok_or(DecodeError::Truncated {
            needed,
            available: self.src.len(),
        })?;
        self.pos = needed;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        self.array().map(u32::from_le_bytes)
    }

    fn u64(&mut self) -> Result<u64, DecodeError> {
        self.array().map(u64::from_le_bytes)
    }

    fn f64(&mut self) -> Result<f64, DecodeError> {
        self.array().map(f64::from_le_bytes)
    }

    fn field(&mut self, len: u8) -> Result<&'a [u8], DecodeError> {
        self.take(usize::from(len))
    }

    fn sized(&mut self, size: u32) -> Result<&'a [u8], DecodeError> {
        let size = usize::try_from(size).map_err(|_| DecodeError::Truncated {
            needed: usize::MAX,
            available: self.src.len(),
        })?;
        self.take(size)
    }
}

/// Decode and validate the stream header
///
/// # Errors
///
/// Returns an error if fewer than 32 bytes are available, or the magic,
/// version or reserved field do not match this format.
pub fn decode_header(src: &[u8]) -> Result<StreamHeader, DecodeError> {
    let mut cur = Cursor::new(src);
    let magic = cur.u64()?;
    if magic != MAGIC {
        return Err(DecodeError::BadMagic(magic));
    }
    let version = cur.u64()?;
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }
    let timestamp_unit = cur.f64()?;
    let reserved = cur.u64()?;
    if reserved != 0 {
        return Err(DecodeError::NonZeroReserved(reserved));
    }
    Ok(StreamHeader { timestamp_unit })
}

/// Decode a chunk prefix
///
/// # Errors
///
/// Returns [`DecodeError::Truncated`] if fewer than 20 bytes are available.
pub fn decode_buffer_header(src: &[u8]) -> Result<BufferHeader, DecodeError> {
    let mut cur = Cursor::new(src);
    Ok(BufferHeader {
        payload_size: cur.u32()?,
        tid: cur.u32()?,
        pid: cur.u32()?,
        first_ts: cur.u64()?,
    })
}

/// Decode one event from the front of `src`
///
/// Returns the event and the number of bytes it occupied.
///
/// # Errors
///
/// Returns [`DecodeError::InvalidTag`] for tag zero or any unknown tag, and
/// [`DecodeError::Truncated`] when the event runs past the end of `src`.
pub fn decode_event(src: &[u8]) -> Result<(Event<'_>, usize), DecodeError> {
    let mut cur = Cursor::new(src);
    let tag = cur.u8()?;

    let event = match EventType::from_tag(tag) {
        None | Some(EventType::Invalid) => return Err(DecodeError::InvalidTag(tag)),
        Some(EventType::Begin) => {
            let when = cur.u64()?;
            let name_len = cur.u8()?;
            let args_len = cur.u8()?;
            let name = cur.field(name_len)?;
            let args = cur.field(args_len)?;
            Event::Begin { when, name, args }
        }
        Some(EventType::End) => Event::End { when: cur.u64()? },
        Some(EventType::Instant) => {
            let when = cur.u64()?;
            let name_len = cur.u8()?;
            Event::Instant { when, name: cur.field(name_len)? }
        }
        Some(EventType::NameThread) => {
            let name_len = cur.u8()?;
            Event::NameThread { name: cur.field(name_len)? }
        }
        Some(EventType::NameProcess) => {
            let name_len = cur.u8()?;
            Event::NameProcess { name: cur.field(name_len)? }
        }
        Some(EventType::OverwriteTimestamp) => Event::OverwriteTimestamp {
            timestamp_unit: cur.f64()?,
        },
        Some(EventType::PadSkip) => {
            let size = cur.u32()?;
            cur.sized(size)?;
            Event::PadSkip { size }
        }
        Some(EventType::CustomData) => {
            let size = cur.u32()?;
            Event::CustomData { data: cur.sized(size)? }
        }
        Some(EventType::StreamOver) => Event::StreamOver,
    };

    Ok((event, cur.pos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MAX_BEGIN_EVENT_SIZE, MAX_NAME_EVENT_SIZE};

    #[test]
    fn test_begin_round_trip() {
        let mut buf = [0u8; 64];
        let n = encode_begin(&mut buf, b"main", b"x=1", 42).unwrap();
        assert_eq!(n, BEGIN_EVENT_HEADER_SIZE + 4 + 3);

        let (event, used) = decode_event(&buf[..n]).unwrap();
        assert_eq!(used, n);
        assert_eq!(
            event,
            Event::Begin {
                when: 42,
                name: b"main",
                args: b"x=1"
            }
        );
    }

    #[test]
    fn test_begin_layout_is_packed_little_endian() {
        let mut buf = [0u8; 16];
        let n = encode_begin(&mut buf, b"f", b"", 0x0102_0304_0506_0708).unwrap();
        assert_eq!(
            &buf[..n],
            &[3, 8, 7, 6, 5, 4, 3, 2, 1, 1, 0, b'f']
        );
    }

    #[test]
    fn test_begin_truncates_long_fields_independently() {
        let name = [b'n'; 300];
        let args = [b'a'; 256];
        let mut buf = [0u8; MAX_BEGIN_EVENT_SIZE];
        let n = encode_begin(&mut buf, &name, &args, 7).unwrap();
        assert_eq!(n, MAX_BEGIN_EVENT_SIZE);

        match decode_event(&buf).unwrap().0 {
            Event::Begin { name, args, .. } => {
                assert_eq!(name.len(), 255);
                assert_eq!(args.len(), 255);
                assert!(name.iter().all(|&b| b == b'n'));
                assert!(args.iter().all(|&b| b == b'a'));
            }
            other => panic!("expected Begin, got {other:?}"),
        }
    }

    #[test]
    fn test_encode_into_short_destination_writes_nothing() {
        let mut buf = [0xAAu8; 10];
        assert_eq!(encode_begin(&mut buf, b"ab", b"", 1), None);
        assert_eq!(encode_end(&mut buf[..8], 1), None);
        assert_eq!(encode_name(&mut buf[..2], b"t", NameKind::Thread), None);
        assert_eq!(encode_header(&mut buf, 1.0), None);
        assert!(buf.iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn test_end_and_names() {
        let mut buf = [0u8; 32];
        assert_eq!(encode_end(&mut buf, 150), Some(END_EVENT_SIZE));
        assert_eq!(decode_event(&buf).unwrap(), (Event::End { when: 150 }, 9));

        let n = encode_name(&mut buf, b"worker", NameKind::Thread).unwrap();
        assert_eq!(decode_event(&buf[..n]).unwrap().0, Event::NameThread { name: b"worker" });

        let n = encode_name(&mut buf, b"app", NameKind::Process).unwrap();
        assert_eq!(buf[0], EventType::NameProcess as u8);
        assert_eq!(decode_event(&buf[..n]).unwrap().0, Event::NameProcess { name: b"app" });
    }

    #[test]
    fn test_name_truncated_to_max() {
        let name = [b'z'; 400];
        let mut buf = [0u8; 300];
        assert_eq!(encode_name(&mut buf, &name, NameKind::Thread), Some(MAX_NAME_EVENT_SIZE));
        assert_eq!(buf[1], 255);
    }

    #[test]
    fn test_header_round_trip() {
        let mut buf = [0u8; STREAM_HEADER_SIZE];
        assert_eq!(encode_header(&mut buf, 0.5), Some(32));
        assert_eq!(&buf[0..8], &0x0BAD_F00Du64.to_le_bytes());
        assert_eq!(decode_header(&buf).unwrap(), StreamHeader { timestamp_unit: 0.5 });
    }

    #[test]
    fn test_header_validation() {
        let mut buf = [0u8; STREAM_HEADER_SIZE];
        let _ = encode_header(&mut buf, 1.0);

        let mut bad_magic = buf;
        bad_magic[0] = 0;
        assert!(matches!(decode_header(&bad_magic), Err(DecodeError::BadMagic(_))));

        let mut bad_version = buf;
        bad_version[8] = 2;
        assert_eq!(decode_header(&bad_version), Err(DecodeError::UnsupportedVersion(2)));

        let mut bad_reserved = buf;
        bad_reserved[31] = 1;
        assert!(matches!(decode_header(&bad_reserved), Err(DecodeError::NonZeroReserved(_))));

        assert!(matches!(decode_header(&buf[..20]), Err(DecodeError::Truncated { .. })));
    }

    #[test]
    fn test_buffer_header_round_trip() {
        let header = BufferHeader {
            payload_size: 21,
            tid: 9,
            pid: 4,
            first_ts: 100,
        };
        let mut buf = [0u8; BUFFER_HEADER_SIZE];
        assert_eq!(encode_buffer_header(&mut buf, &header), Some(20));
        assert_eq!(decode_buffer_header(&buf).unwrap(), header);
    }

    #[test]
    fn test_unknown_and_invalid_tags_are_errors() {
        assert_eq!(decode_event(&[0, 1, 2]), Err(DecodeError::InvalidTag(0)));
        assert_eq!(decode_event(&[42]), Err(DecodeError::InvalidTag(42)));
        assert!(matches!(decode_event(&[]), Err(DecodeError::Truncated { .. })));
    }

    #[test]
    fn test_truncated_event_is_error() {
        let mut buf = [0u8; 32];
        let n = encode_begin(&mut buf, b"abcdef", b"", 1).unwrap();
        assert_eq!(
            decode_event(&buf[..n - 1]),
            Err(DecodeError::Truncated {
                needed: n,
                available: n - 1
            })
        );
    }

    #[test]
    fn test_pad_skip_consumes_padding() {
        let mut buf = [0xFFu8; 32];
        let n = encode_pad_skip(&mut buf, 6).unwrap();
        assert_eq!(n, PAD_SKIP_HEADER_SIZE + 6);
        let n_end = encode_end(&mut buf[n..], 5).unwrap();

        let (event, used) = decode_event(&buf).unwrap();
        assert_eq!(event, Event::PadSkip { size: 6 });
        assert_eq!(used, n);
        assert_eq!(decode_event(&buf[used..used + n_end]).unwrap().0, Event::End { when: 5 });
    }

    #[test]
    fn test_extension_events_decode_by_layout() {
        let mut buf = [0u8; 16];
        let n = encode_overwrite_timestamp(&mut buf, 0.25).unwrap();
        assert_eq!(
            decode_event(&buf[..n]).unwrap(),
            (Event::OverwriteTimestamp { timestamp_unit: 0.25 }, 9)
        );

        let custom = [1u8, 3, 0, 0, 0, 0xA, 0xB, 0xC];
        assert_eq!(
            decode_event(&custom).unwrap(),
            (Event::CustomData { data: &[0xA, 0xB, 0xC] }, 8)
        );

        let instant = [5u8, 9, 0, 0, 0, 0, 0, 0, 0, 2, b'h', b'i'];
        assert_eq!(
            decode_event(&instant).unwrap(),
            (Event::Instant { when: 9, name: b"hi" }, 12)
        );

        assert_eq!(decode_event(&[2]).unwrap(), (Event::StreamOver, 1));
    }

    #[test]
    fn test_size_helpers_clamp() {
        assert_eq!(begin_event_size(1, 0), 12);
        assert_eq!(begin_event_size(1000, 1000), MAX_BEGIN_EVENT_SIZE);
        assert_eq!(name_event_size(0), 2);
        assert_eq!(name_event_size(999), MAX_NAME_EVENT_SIZE);
    }
}

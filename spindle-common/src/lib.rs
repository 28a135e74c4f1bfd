//! # Shared Wire Format (Writers ↔ Readers)
//!
//! Defines the binary trace stream layout shared by the capture pipeline in
//! `spindle` and every reader of `.spall`-style traces. Nothing in this crate
//! performs I/O or keeps state: encoders write into a caller-provided byte slice
//! and report how many bytes they used, decoders borrow from a caller-provided
//! byte slice.
//!
//! ## Stream Layout
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ StreamHeader (32 bytes)      │  written once, before anything else
//! ├──────────────────────────────┤
//! │ BufferHeader (20 bytes)      │  one per flushed chunk
//! │ events... (payload_size)     │
//! ├──────────────────────────────┤
//! │ BufferHeader                 │
//! │ events...                    │
//! └──────────────────────────────┘
//! ```
//!
//! All integers are little-endian and packed with no padding.
//!
//! ## Key Types
//!
//! - [`StreamHeader`] - Magic, version and the stream-wide timestamp unit
//! - [`BufferHeader`] - Chunk prefix carrying size, thread, process and `first_ts`
//! - [`EventType`] - One-byte event tags
//! - [`Event`] - Decoded event borrowing its name/args bytes from the input

#![no_std]

mod codec;

pub use codec::{
    begin_event_size, decode_buffer_header, decode_event, decode_header, encode_begin,
    encode_buffer_header, encode_end, encode_header, encode_name, encode_overwrite_timestamp,
    encode_pad_skip, name_event_size, DecodeError,
};

// ============================================================================
// Stream Constants
// ============================================================================

/// Sentinel stored in the first eight bytes of every trace stream
pub const MAGIC: u64 = 0x0BAD_F00D;

/// Wire format version understood by this crate
pub const VERSION: u64 = 3;

/// Longest name or args field an event can carry; longer input is truncated
pub const MAX_FIELD_LEN: usize = 255;

/// `magic(8) + version(8) + timestamp_unit(8) + reserved(8)`
pub const STREAM_HEADER_SIZE: usize = 32;

/// `payload_size(4) + tid(4) + pid(4) + first_ts(8)`
pub const BUFFER_HEADER_SIZE: usize = 20;

/// `tag(1) + when(8) + name_len(1) + args_len(1)`
pub const BEGIN_EVENT_HEADER_SIZE: usize = 11;

/// Begin event with both fields at [`MAX_FIELD_LEN`]
pub const MAX_BEGIN_EVENT_SIZE: usize = BEGIN_EVENT_HEADER_SIZE + 2 * MAX_FIELD_LEN;

/// `tag(1) + when(8)`
pub const END_EVENT_SIZE: usize = 9;

/// `tag(1) + name_len(1)`
pub const NAME_EVENT_HEADER_SIZE: usize = 2;

/// Name event with the name at [`MAX_FIELD_LEN`]
pub const MAX_NAME_EVENT_SIZE: usize = NAME_EVENT_HEADER_SIZE + MAX_FIELD_LEN;

/// `tag(1) + when(8) + name_len(1)`
pub const INSTANT_EVENT_HEADER_SIZE: usize = 10;

/// `tag(1) + timestamp_unit(8)`
pub const OVERWRITE_TIMESTAMP_EVENT_SIZE: usize = 9;

/// `tag(1) + size(4)`, followed by `size` skipped bytes
pub const PAD_SKIP_HEADER_SIZE: usize = 5;

/// `tag(1) + size(4)`, followed by `size` opaque bytes
pub const CUSTOM_DATA_HEADER_SIZE: usize = 5;

// ============================================================================
// Event Tags
// ============================================================================

/// One-byte tag leading every encoded event
///
/// Readers dispatch purely on this byte. Values outside the enum are invalid.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Never written; a zero tag means the reader is misaligned
    Invalid = 0,
    /// Opaque sized payload that basic readers skip
    CustomData = 1,
    /// Writer signalled the end of the stream
    StreamOver = 2,
    Begin = 3,
    End = 4,
    Instant = 5,
    /// Retroactively changes the timestamp unit for following events
    OverwriteTimestamp = 6,
    /// Sized padding that readers skip
    PadSkip = 7,
    NameProcess = 8,
    NameThread = 9,
}

impl EventType {
    /// Map a raw tag byte to a known event type
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => Self::Invalid,
            1 => Self::CustomData,
            2 => Self::StreamOver,
            3 => Self::Begin,
            4 => Self::End,
            5 => Self::Instant,
            6 => Self::OverwriteTimestamp,
            7 => Self::PadSkip,
            8 => Self::NameProcess,
            9 => Self::NameThread,
            _ => return None,
        })
    }
}

/// Which container a name event labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Thread,
    Process,
}

impl NameKind {
    #[must_use]
    pub const fn event_type(self) -> EventType {
        match self {
            Self::Thread => EventType::NameThread,
            Self::Process => EventType::NameProcess,
        }
    }
}

// ============================================================================
// Headers
// ============================================================================

/// Stream header written once at the start of a trace
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamHeader {
    /// Multiplier converting raw ticks into microseconds
    pub timestamp_unit: f64,
}

impl StreamHeader {
    /// Encoded header bytes
    #[must_use]
    pub fn to_bytes(&self) -> [u8; STREAM_HEADER_SIZE] {
        let mut out = [0u8; STREAM_HEADER_SIZE];
        out[0..8].copy_from_slice(&MAGIC.to_le_bytes());
        out[8..16].copy_from_slice(&VERSION.to_le_bytes());
        out[16..24].copy_from_slice(&self.timestamp_unit.to_le_bytes());
        // bytes 24..32 are the reserved field, always zero
        out
    }
}

/// Prefix of every flushed chunk
///
/// `first_ts` lets readers interleave chunks from different threads without
/// decoding their payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferHeader {
    /// Bytes of encoded events following this header
    pub payload_size: u32,
    pub tid: u32,
    pub pid: u32,
    /// Earliest timestamp recorded in the chunk
    pub first_ts: u64,
}

impl BufferHeader {
    /// Encoded header bytes
    #[must_use]
    pub fn to_bytes(&self) -> [u8; BUFFER_HEADER_SIZE] {
        let mut out = [0u8; BUFFER_HEADER_SIZE];
        out[0..4].copy_from_slice(&self.payload_size.to_le_bytes());
        out[4..8].copy_from_slice(&self.tid.to_le_bytes());
        out[8..12].copy_from_slice(&self.pid.to_le_bytes());
        out[12..20].copy_from_slice(&self.first_ts.to_le_bytes());
        out
    }
}

// ============================================================================
// Decoded Events
// ============================================================================

/// A decoded event
///
/// Name and args fields borrow from the decoded input. They are raw bytes: the
/// format does not require UTF-8, and truncation may split a multi-byte
/// character.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event<'a> {
    Begin { when: u64, name: &'a [u8], args: &'a [u8] },
    End { when: u64 },
    Instant { when: u64, name: &'a [u8] },
    NameThread { name: &'a [u8] },
    NameProcess { name: &'a [u8] },
    OverwriteTimestamp { timestamp_unit: f64 },
    PadSkip { size: u32 },
    CustomData { data: &'a [u8] },
    StreamOver,
}

impl Event<'_> {
    /// Tag this event is encoded with
    #[must_use]
    pub const fn event_type(&self) -> EventType {
        match self {
            Self::Begin { .. } => EventType::Begin,
            Self::End { .. } => EventType::End,
            Self::Instant { .. } => EventType::Instant,
            Self::NameThread { .. } => EventType::NameThread,
            Self::NameProcess { .. } => EventType::NameProcess,
            Self::OverwriteTimestamp { .. } => EventType::OverwriteTimestamp,
            Self::PadSkip { .. } => EventType::PadSkip,
            Self::CustomData { .. } => EventType::CustomData,
            Self::StreamOver => EventType::StreamOver,
        }
    }

    /// Timestamp carried by the event, if any
    #[must_use]
    pub const fn when(&self) -> Option<u64> {
        match self {
            Self::Begin { when, .. } | Self::End { when } | Self::Instant { when, .. } => {
                Some(*when)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tag_covers_all_variants() {
        for tag in 0..=9u8 {
            let ty = EventType::from_tag(tag).unwrap();
            assert_eq!(ty as u8, tag);
        }
        assert!(EventType::from_tag(10).is_none());
        assert!(EventType::from_tag(0xFF).is_none());
    }

    #[test]
    fn test_max_sizes() {
        assert_eq!(MAX_BEGIN_EVENT_SIZE, 521);
        assert_eq!(MAX_NAME_EVENT_SIZE, 257);
    }

    #[test]
    fn test_name_kind_tags() {
        assert_eq!(NameKind::Thread.event_type(), EventType::NameThread);
        assert_eq!(NameKind::Process.event_type(), EventType::NameProcess);
    }
}

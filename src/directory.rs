//! Content-directory records.
//!
//! A directory is a stream of records, each starting on a 16-byte boundary
//! relative to the start of the stream:
//!
//! ```text
//! +-------------+--------+-------------+----------+------------------+---------+
//! | length: u16 | flags  | name_len    | name     | optional fields  | padding |
//! | bit15=dead  | u16    | u16         | name_len | in flag order    | to 16   |
//! +-------------+--------+-------------+----------+------------------+---------+
//! ```
//!
//! `length` covers everything except the padding. A tombstone (bit 15 set)
//! carries only its length; the rest of its bytes are stale. Optional fields
//! are decoded in ascending flag-bit order, which is part of the wire format.

use std::borrow::Cow;
use std::fmt;
use std::io::{Read, Seek};

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{BlebError, Result};
use crate::options::{DecodeOptions, InlinePayloadRule};
use crate::span::{StreamDescriptor, STREAM_DESCRIPTOR_SIZE};
use crate::stream::materialize;

pub const ENTRY_HEADER_SIZE: usize = 6;
pub const RECORD_ALIGNMENT:  u64   = 16;
pub const LENGTH_MASK:       u16   = 0x7fff;
pub const DELETED_BIT:       u16   = 0x8000;

pub fn align(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

// ── Flags ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EntryFlags(pub u16);

impl EntryFlags {
    pub const IS_DIRECTORY:       u16 = 0x0001;
    pub const HAS_STREAM_DESCR:   u16 = 0x0002;
    pub const HAS_STORAGE_DESCR:  u16 = 0x0004;
    pub const HAS_HASH128:        u16 = 0x0008;
    pub const HAS_INLINE_PAYLOAD: u16 = 0x0010;
    /// Combined value: bit 12 together with the directory bit.
    pub const IS_TEXT:            u16 = 0x1001;

    const TEXT_BIT: u16 = 0x1000;
    const KNOWN:    u16 = 0x001f | Self::TEXT_BIT;

    pub fn bits(self) -> u16 { self.0 }

    pub fn contains(self, flag: u16) -> bool {
        self.0 & flag == flag
    }

    pub fn is_directory(self)          -> bool { self.contains(Self::IS_DIRECTORY) }
    pub fn has_stream_descriptor(self) -> bool { self.contains(Self::HAS_STREAM_DESCR) }
    pub fn has_inline_payload(self)    -> bool { self.contains(Self::HAS_INLINE_PAYLOAD) }
    pub fn is_text(self)               -> bool { self.contains(Self::IS_TEXT) }

    /// Bits with no known meaning.
    pub fn unknown_bits(self) -> u16 {
        self.0 & !Self::KNOWN
    }
}

impl fmt::Debug for EntryFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryFlags({:#06x})", self.0)
    }
}

// ── Record prologue ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectEntryHeader {
    pub length_field: u16,
    pub flags:        EntryFlags,
    pub name_length:  u16,
}

impl ObjectEntryHeader {
    pub fn parse(bytes: &[u8; ENTRY_HEADER_SIZE]) -> Self {
        Self {
            length_field: LittleEndian::read_u16(&bytes[0..2]),
            flags:        EntryFlags(LittleEndian::read_u16(&bytes[2..4])),
            name_length:  LittleEndian::read_u16(&bytes[4..6]),
        }
    }

    #[cfg(test)]
    pub(crate) fn write<W: std::io::Write>(&self, mut writer: W) -> std::io::Result<()> {
        use byteorder::WriteBytesExt;
        writer.write_u16::<LittleEndian>(self.length_field)?;
        writer.write_u16::<LittleEndian>(self.flags.0)?;
        writer.write_u16::<LittleEndian>(self.name_length)?;
        Ok(())
    }

    pub fn is_deleted(&self) -> bool {
        self.length_field & DELETED_BIT != 0
    }

    /// Record length in bytes, header included, padding excluded.
    pub fn record_length(&self) -> u16 {
        self.length_field & LENGTH_MASK
    }

    pub fn padded_length(&self) -> u64 {
        align(u64::from(self.record_length()), RECORD_ALIGNMENT)
    }
}

// ── Entries ───────────────────────────────────────────────────────────────────

/// Anomalies that do not stop decoding but deserve a caller's attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryWarning {
    /// `IS_TEXT` is set, which also sets the directory bit. Whether such an
    /// entry really is a directory cannot be told from the flags alone.
    TextDirectoryOverlap,
    UnknownFlags(u16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveEntry {
    /// Offset of the record within the directory stream.
    pub offset:         u64,
    pub record_length:  u16,
    pub flags:          EntryFlags,
    pub name:           Vec<u8>,
    pub stream:         Option<StreamDescriptor>,
    pub inline_payload: Option<Vec<u8>>,
    pub warnings:       Vec<EntryWarning>,
}

impl LiveEntry {
    pub fn name(&self) -> Result<&str> {
        std::str::from_utf8(&self.name).map_err(|source| BlebError::Decode {
            offset: self.offset + ENTRY_HEADER_SIZE as u64,
            source,
        })
    }

    pub fn name_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    /// The inline payload as text, if there is one.
    pub fn inline_text(&self) -> Option<Result<&str>> {
        let payload = self.inline_payload.as_deref()?;
        let start = self.record_length as usize - payload.len();
        Some(std::str::from_utf8(payload).map_err(|source| BlebError::Decode {
            offset: self.offset + start as u64,
            source,
        }))
    }

    pub fn is_directory(&self) -> bool {
        self.flags.is_directory()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletedEntry {
    pub offset: u64,
    /// Length portion of the tombstone's length field.
    pub length: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Live(LiveEntry),
    Deleted(DeletedEntry),
}

impl Entry {
    pub fn offset(&self) -> u64 {
        match self {
            Entry::Live(e)    => e.offset,
            Entry::Deleted(d) => d.offset,
        }
    }

    /// Bytes the record occupies in the directory stream, padding included.
    pub fn padded_length(&self) -> u64 {
        let length = match self {
            Entry::Live(e)    => e.record_length,
            Entry::Deleted(d) => d.length,
        };
        align(u64::from(length), RECORD_ALIGNMENT)
    }

    pub fn as_live(&self) -> Option<&LiveEntry> {
        match self {
            Entry::Live(e)    => Some(e),
            Entry::Deleted(_) => None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, Entry::Deleted(_))
    }
}

// ── Walker ────────────────────────────────────────────────────────────────────

/// Single forward pass over a materialized directory stream.
///
/// Yields one [`Entry`] per record. The first structural error is yielded
/// once and ends the iteration, since every later offset depends on it.
#[derive(Debug)]
pub struct DirectoryWalker {
    bytes:   Vec<u8>,
    cursor:  usize,
    options: DecodeOptions,
    done:    bool,
}

impl DirectoryWalker {
    pub fn new(bytes: Vec<u8>, options: DecodeOptions) -> Self {
        Self { bytes, cursor: 0, options, done: false }
    }

    /// Directory bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.cursor as u64
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn read_record(&mut self) -> Result<Option<Entry>> {
        let offset    = self.cursor;
        let remaining = self.bytes.len() - offset;

        if remaining < ENTRY_HEADER_SIZE {
            return self.trailing(offset, remaining);
        }

        let mut raw = [0u8; ENTRY_HEADER_SIZE];
        raw.copy_from_slice(&self.bytes[offset..offset + ENTRY_HEADER_SIZE]);
        let header        = ObjectEntryHeader::parse(&raw);
        let record_length = usize::from(header.record_length());

        if header.is_deleted() {
            if record_length < ENTRY_HEADER_SIZE {
                return Err(malformed(offset, format!(
                    "tombstone length {record_length} is shorter than a record header"
                )));
            }
            if record_length > remaining {
                return Err(malformed(offset, format!(
                    "tombstone of {record_length} bytes overruns the directory ({remaining} bytes left)"
                )));
            }
            tracing::debug!(offset, length = record_length, "deleted entry");
            self.advance(offset, header.padded_length());
            return Ok(Some(Entry::Deleted(DeletedEntry {
                offset: offset as u64,
                length: header.record_length(),
            })));
        }

        let name_length = usize::from(header.name_length);
        if record_length < ENTRY_HEADER_SIZE + name_length {
            return Err(malformed(offset, format!(
                "name of {name_length} bytes overruns a record of {record_length} bytes"
            )));
        }
        if record_length > remaining {
            return Err(malformed(offset, format!(
                "record of {record_length} bytes overruns the directory ({remaining} bytes left)"
            )));
        }

        let record = &self.bytes[offset..offset + record_length];
        let flags  = header.flags;
        let mut pos = ENTRY_HEADER_SIZE;

        let name = record[pos..pos + name_length].to_vec();
        pos += name_length;

        let mut stream = None;
        if flags.has_stream_descriptor() {
            let end = pos + STREAM_DESCRIPTOR_SIZE;
            if end > record_length {
                return Err(malformed(offset, format!(
                    "stream descriptor ends at {end}, past the record length {record_length}"
                )));
            }
            stream = Some(StreamDescriptor::new(
                LittleEndian::read_u64(&record[pos..pos + 8]),
                LittleEndian::read_u64(&record[pos + 8..end]),
            ));
            pos = end;
        }

        // No layout is known for these; guessing a size would desynchronize
        // every following record.
        for flag in [EntryFlags::HAS_STORAGE_DESCR, EntryFlags::HAS_HASH128] {
            if flags.contains(flag) {
                return Err(BlebError::UnsupportedField { offset: offset as u64, flag });
            }
        }

        let inline_payload = flags.has_inline_payload().then(|| {
            let start = match self.options.inline_payload_rule {
                InlinePayloadRule::AfterFields => pos,
                InlinePayloadRule::AfterName   => ENTRY_HEADER_SIZE + name_length,
            };
            record[start..].to_vec()
        });

        let mut warnings = Vec::new();
        if flags.is_text() {
            tracing::warn!(offset, "entry sets IS_TEXT, which overlaps IS_DIRECTORY");
            warnings.push(EntryWarning::TextDirectoryOverlap);
        }
        if flags.unknown_bits() != 0 {
            tracing::warn!(offset, bits = flags.unknown_bits(), "entry sets unknown flag bits");
            warnings.push(EntryWarning::UnknownFlags(flags.unknown_bits()));
        }

        tracing::debug!(
            offset,
            length = record_length,
            flags = flags.bits(),
            name = %String::from_utf8_lossy(&name),
            "live entry"
        );

        self.advance(offset, header.padded_length());
        Ok(Some(Entry::Live(LiveEntry {
            offset: offset as u64,
            record_length: header.record_length(),
            flags,
            name,
            stream,
            inline_payload,
            warnings,
        })))
    }

    /// Moves past a record whose unpadded bytes are known to fit.
    fn advance(&mut self, offset: usize, padded_length: u64) {
        let next = offset as u64 + padded_length;
        if next > self.len() {
            tracing::warn!(offset, "last record is missing its alignment padding");
            self.cursor = self.bytes.len();
        } else {
            self.cursor = next as usize;
        }
    }

    fn trailing(&mut self, offset: usize, remaining: usize) -> Result<Option<Entry>> {
        if self.options.strict_trailing {
            return Err(BlebError::TrailingGarbage {
                offset:    offset as u64,
                remaining: remaining as u64,
            });
        }
        tracing::warn!(offset, remaining, "ignoring trailing directory bytes");
        self.cursor = self.bytes.len();
        Ok(None)
    }
}

impl Iterator for DirectoryWalker {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.cursor >= self.bytes.len() {
            self.done = true;
            return None;
        }
        match self.read_record() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for DirectoryWalker {}

fn malformed(offset: usize, reason: String) -> BlebError {
    BlebError::MalformedEntry { offset: offset as u64, reason }
}

/// Materializes the directory stream behind `descriptor` and returns a walker over it.
pub fn list_entries<R: Read + Seek>(
    source:     &mut R,
    descriptor: &StreamDescriptor,
    options:    &DecodeOptions,
) -> Result<DirectoryWalker> {
    let bytes = materialize(source, descriptor, options)?;
    tracing::debug!(
        location = descriptor.location,
        length = descriptor.length,
        "materialized directory stream"
    );
    Ok(DirectoryWalker::new(bytes, options.clone()))
}

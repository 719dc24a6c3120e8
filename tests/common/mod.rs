//! Builds container images byte by byte for the integration tests.
#![allow(dead_code)]

use bleb::directory::{align, DELETED_BIT, ENTRY_HEADER_SIZE, RECORD_ALIGNMENT};
use bleb::header::{RepositoryHeader, HEADER_SIZE, MAGIC};
use bleb::span::{SpanHeader, StreamDescriptor, SPAN_HEADER_SIZE, STREAM_DESCRIPTOR_SIZE};
use bleb::EntryFlags;
use byteorder::{LittleEndian, WriteBytesExt};

/// Spans are placed on this boundary, leaving unrelated bytes in between.
const SPAN_PLACEMENT: u64 = 64;
const GAP_FILL: u8 = 0xEE;

pub struct ContainerBuilder {
    image: Vec<u8>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        let mut image = header_bytes(RepositoryHeader::new(1));
        image.resize(HEADER_SIZE + STREAM_DESCRIPTOR_SIZE, 0);
        Self { image }
    }

    pub fn with_header(header: RepositoryHeader) -> Self {
        let mut builder = Self::new();
        builder.image[..HEADER_SIZE].copy_from_slice(&header_bytes(header));
        builder
    }

    /// Writes one span per fragment, linked in slice order. With `reversed`,
    /// the last fragment sits first on disk.
    pub fn spans(&mut self, fragments: &[&[u8]], logical_length: u64, reversed: bool) -> StreamDescriptor {
        if fragments.is_empty() {
            return StreamDescriptor::new(0, logical_length);
        }

        let mut order: Vec<usize> = (0..fragments.len()).collect();
        if reversed {
            order.reverse();
        }

        let mut locations = vec![0u64; fragments.len()];
        let mut cursor = self.image.len() as u64;
        for &i in &order {
            cursor = align(cursor + 1, SPAN_PLACEMENT);
            locations[i] = cursor;
            cursor += (SPAN_HEADER_SIZE + fragments[i].len()) as u64;
        }
        self.image.resize(cursor as usize, GAP_FILL);

        for (i, fragment) in fragments.iter().enumerate() {
            let next = locations.get(i + 1).copied();
            let header = SpanHeader::new(fragment.len() as u32, next);
            self.put_span(locations[i], header, fragment);
        }
        StreamDescriptor::new(locations[0], logical_length)
    }

    /// Splits `data` into `chunk`-sized fragments stored as one chain.
    pub fn stream(&mut self, data: &[u8], chunk: usize) -> StreamDescriptor {
        let fragments: Vec<&[u8]> = data.chunks(chunk.max(1)).collect();
        self.spans(&fragments, data.len() as u64, false)
    }

    pub fn put_span(&mut self, location: u64, header: SpanHeader, payload: &[u8]) {
        let start = location as usize;
        let end = start + SPAN_HEADER_SIZE + payload.len();
        if self.image.len() < end {
            self.image.resize(end, GAP_FILL);
        }
        self.image[start..start + SPAN_HEADER_SIZE].copy_from_slice(&span_header_bytes(header));
        self.image[start + SPAN_HEADER_SIZE..end].copy_from_slice(payload);
    }

    /// Stores `directory` as the root stream.
    pub fn root(&mut self, directory: &[u8], chunk: usize) -> StreamDescriptor {
        let descr = self.stream(directory, chunk);
        self.set_root(descr);
        descr
    }

    pub fn set_root(&mut self, descr: StreamDescriptor) {
        self.image[HEADER_SIZE..HEADER_SIZE + STREAM_DESCRIPTOR_SIZE].copy_from_slice(&descriptor_bytes(descr));
    }

    pub fn image(&self) -> &[u8] {
        &self.image
    }

    pub fn finish(self) -> Vec<u8> {
        self.image
    }
}

#[derive(Default)]
pub struct DirectoryBuilder {
    bytes: Vec<u8>,
}

impl DirectoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a live record; `body` holds the optional fields already encoded.
    pub fn record(mut self, name: &str, flags: u16, body: &[u8]) -> Self {
        let length = ENTRY_HEADER_SIZE + name.len() + body.len();
        self.bytes.write_u16::<LittleEndian>(length as u16).unwrap();
        self.bytes.write_u16::<LittleEndian>(flags).unwrap();
        self.bytes.write_u16::<LittleEndian>(name.len() as u16).unwrap();
        self.bytes.extend_from_slice(name.as_bytes());
        self.bytes.extend_from_slice(body);
        self.pad();
        self
    }

    pub fn object(self, name: &str, stream: StreamDescriptor) -> Self {
        self.record(name, EntryFlags::HAS_STREAM_DESCR, &descriptor_bytes(stream))
    }

    pub fn inline(self, name: &str, payload: &[u8]) -> Self {
        self.record(name, EntryFlags::HAS_INLINE_PAYLOAD, payload)
    }

    pub fn directory(self, name: &str, stream: StreamDescriptor) -> Self {
        self.record(
            name,
            EntryFlags::IS_DIRECTORY | EntryFlags::HAS_STREAM_DESCR,
            &descriptor_bytes(stream),
        )
    }

    /// A tombstone whose stale bytes look like a real record.
    pub fn deleted(mut self, length: u16) -> Self {
        let start = self.bytes.len();
        self.bytes.extend_from_slice(&(length | DELETED_BIT).to_le_bytes());
        self.bytes.extend_from_slice(&EntryFlags::HAS_HASH128.to_le_bytes());
        self.bytes.extend_from_slice(&0xFFFFu16.to_le_bytes());
        self.bytes.resize(start + usize::from(length).max(ENTRY_HEADER_SIZE), 0x5A);
        self.pad();
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }

    fn pad(&mut self) {
        let padded = align(self.bytes.len() as u64, RECORD_ALIGNMENT) as usize;
        self.bytes.resize(padded, 0);
    }
}

// ── Wire encoders ─────────────────────────────────────────────────────────────

pub fn header_bytes(header: RepositoryHeader) -> Vec<u8> {
    let mut raw = MAGIC.to_vec();
    raw.write_u8(header.version).unwrap();
    raw.write_u32::<LittleEndian>(header.core_flags).unwrap();
    raw.write_u32::<LittleEndian>(header.info_flags).unwrap();
    raw
}

pub fn span_header_bytes(header: SpanHeader) -> Vec<u8> {
    let mut raw = Vec::with_capacity(SPAN_HEADER_SIZE);
    raw.write_u32::<LittleEndian>(header.reserved_length).unwrap();
    raw.write_u32::<LittleEndian>(header.payload_length).unwrap();
    raw.write_u64::<LittleEndian>(header.next_location).unwrap();
    raw
}

pub fn descriptor_bytes(descr: StreamDescriptor) -> Vec<u8> {
    let mut raw = Vec::with_capacity(STREAM_DESCRIPTOR_SIZE);
    raw.write_u64::<LittleEndian>(descr.location).unwrap();
    raw.write_u64::<LittleEndian>(descr.length).unwrap();
    raw
}

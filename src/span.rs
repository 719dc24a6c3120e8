use byteorder::{LittleEndian, ReadBytesExt};
use serde::Serialize;
use std::io::{self, Read};

pub const STREAM_DESCRIPTOR_SIZE: usize = 16;
pub const SPAN_HEADER_SIZE: usize = 16;

/// Addresses a logical stream: the first span's absolute offset and the
/// stream's reassembled length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StreamDescriptor {
    pub location: u64,
    pub length:   u64,
}

impl StreamDescriptor {
    pub fn new(location: u64, length: u64) -> Self {
        Self { location, length }
    }

    /// A stream that was never allocated any span.
    pub fn is_unallocated(&self) -> bool {
        self.location == 0
    }

    #[cfg(test)]
    pub(crate) fn write<W: std::io::Write>(&self, mut writer: W) -> io::Result<()> {
        use byteorder::WriteBytesExt;
        writer.write_u64::<LittleEndian>(self.location)?;
        writer.write_u64::<LittleEndian>(self.length)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        Ok(Self {
            location: reader.read_u64::<LittleEndian>()?,
            length:   reader.read_u64::<LittleEndian>()?,
        })
    }
}

/// Precedes every span's payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanHeader {
    /// Capacity reserved for the span when it was allocated.
    pub reserved_length: u32,
    pub payload_length:  u32,
    /// Raw link word; `0` terminates the chain.
    pub next_location:   u64,
}

impl SpanHeader {
    pub fn new(payload_length: u32, next: Option<u64>) -> Self {
        Self {
            reserved_length: payload_length,
            payload_length,
            next_location: next.unwrap_or(0),
        }
    }

    pub fn next(&self) -> Option<u64> {
        match self.next_location {
            0 => None,
            location => Some(location),
        }
    }

    #[cfg(test)]
    pub(crate) fn write<W: std::io::Write>(&self, mut writer: W) -> io::Result<()> {
        use byteorder::WriteBytesExt;
        writer.write_u32::<LittleEndian>(self.reserved_length)?;
        writer.write_u32::<LittleEndian>(self.payload_length)?;
        writer.write_u64::<LittleEndian>(self.next_location)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        Ok(Self {
            reserved_length: reader.read_u32::<LittleEndian>()?,
            payload_length:  reader.read_u32::<LittleEndian>()?,
            next_location:   reader.read_u64::<LittleEndian>()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn descriptor_layout_is_little_endian() {
        let mut buf = Vec::new();
        StreamDescriptor::new(0x0102, 5).write(&mut buf).unwrap();
        assert_eq!(buf.len(), STREAM_DESCRIPTOR_SIZE);
        assert_eq!(&buf[..8], &[0x02, 0x01, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&buf[8..], &[5, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn zero_link_means_end_of_chain() {
        let mut buf = Vec::new();
        SpanHeader { reserved_length: 64, payload_length: 10, next_location: 0 }
            .write(&mut buf)
            .unwrap();
        assert_eq!(buf.len(), SPAN_HEADER_SIZE);

        let header = SpanHeader::read(Cursor::new(&buf)).unwrap();
        assert_eq!(header.reserved_length, 64);
        assert_eq!(header.payload_length, 10);
        assert_eq!(header.next(), None);
        assert_eq!(SpanHeader::new(3, Some(4096)).next(), Some(4096));
    }
}

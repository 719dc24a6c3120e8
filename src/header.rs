//! Repository prologue: the fixed 16 bytes at offset 0.
//!
//! | Offset | Size | Field        |
//! |--------|------|--------------|
//! | 0      | 7    | magic        |
//! | 7      | 1    | version      |
//! | 8      | 4    | core flags   |
//! | 12     | 4    | info flags   |
//!
//! The root stream descriptor (the content directory) follows at offset 16.

use byteorder::{ByteOrder, LittleEndian};
use std::io::Read;

use crate::error::{BlebError, Result};
use crate::options::DecodeOptions;

pub const MAGIC: &[u8; 7] = b"\x89bleb\r\n";
pub const HEADER_SIZE: usize = 16;
pub const FORMAT_VERSION_1: u8 = 0x01;
/// Absolute offset of the root (content directory) stream descriptor.
pub const ROOT_DESCRIPTOR_OFFSET: u64 = HEADER_SIZE as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct RepositoryHeader {
    pub version:    u8,
    pub core_flags: u32,
    pub info_flags: u32,
}

impl RepositoryHeader {
    pub fn new(version: u8) -> Self {
        Self { version, core_flags: 0, info_flags: 0 }
    }

    #[cfg(test)]
    pub(crate) fn write<W: std::io::Write>(&self, mut writer: W) -> std::io::Result<()> {
        use byteorder::WriteBytesExt;
        writer.write_all(MAGIC)?;
        writer.write_u8(self.version)?;
        writer.write_u32::<LittleEndian>(self.core_flags)?;
        writer.write_u32::<LittleEndian>(self.info_flags)?;
        Ok(())
    }

    /// Reads and checks the prologue. Version and flags are reported, not enforced.
    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        reader
            .read_exact(&mut buf)
            .map_err(|e| BlebError::io(0, "read repository header", e))?;

        if &buf[..MAGIC.len()] != MAGIC {
            return Err(BlebError::InvalidMagic { found: hex::encode(&buf[..MAGIC.len()]) });
        }

        Ok(Self {
            version:    buf[7],
            core_flags: LittleEndian::read_u32(&buf[8..12]),
            info_flags: LittleEndian::read_u32(&buf[12..16]),
        })
    }
}

/// Reads the prologue, applying the version policy from `options`.
pub fn read_header<R: Read>(reader: R, options: &DecodeOptions) -> Result<RepositoryHeader> {
    let header = RepositoryHeader::read(reader)?;
    if options.strict_version && header.version > FORMAT_VERSION_1 {
        return Err(BlebError::UnsupportedVersion(header.version));
    }
    tracing::debug!(
        version = header.version,
        core_flags = header.core_flags,
        info_flags = header.info_flags,
        "read repository header"
    );
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_version_and_flags() {
        let mut buf = Vec::new();
        RepositoryHeader { version: 1, core_flags: 0xdead_beef, info_flags: 7 }
            .write(&mut buf)
            .unwrap();
        assert_eq!(buf.len(), HEADER_SIZE);

        let header = RepositoryHeader::read(Cursor::new(&buf)).unwrap();
        assert_eq!(header.version, 1);
        assert_eq!(header.core_flags, 0xdead_beef);
        assert_eq!(header.info_flags, 7);
    }

    #[test]
    fn rejects_single_byte_magic_mismatch() {
        let mut buf = Vec::new();
        RepositoryHeader::new(1).write(&mut buf).unwrap();
        buf[6] = b'\n' + 1;
        match RepositoryHeader::read(Cursor::new(&buf)) {
            Err(BlebError::InvalidMagic { found }) => assert_eq!(found, "89626c65620d0b"),
            other => panic!("expected InvalidMagic, got {other:?}"),
        }
    }

    #[test]
    fn short_prologue_is_an_io_error() {
        let err = RepositoryHeader::read(Cursor::new(&MAGIC[..])).unwrap_err();
        assert!(matches!(err, BlebError::Io { offset: 0, .. }));
    }

    #[test]
    fn version_is_only_enforced_when_strict() {
        let mut buf = Vec::new();
        RepositoryHeader::new(2).write(&mut buf).unwrap();

        assert!(read_header(Cursor::new(&buf), &DecodeOptions::default()).is_ok());
        assert!(matches!(
            read_header(Cursor::new(&buf), &DecodeOptions::strict()),
            Err(BlebError::UnsupportedVersion(2))
        ));
    }
}

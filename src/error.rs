use std::io;
use std::str::Utf8Error;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlebError {
    #[error("Invalid magic: expected 89 62 6c 65 62 0d 0a, found {found}")]
    InvalidMagic { found: String },

    #[error("Unsupported format version: {0:#04x}")]
    UnsupportedVersion(u8),

    #[error("Truncated stream at {location}: needed {expected} bytes, span chain ended after {available}")]
    TruncatedStream { location: u64, expected: u64, available: u64 },

    #[error("Corrupt span chain at {location}: {reason}")]
    CorruptChain { location: u64, reason: String },

    #[error("Unsupported entry field {flag:#06x} in record at directory offset {offset}")]
    UnsupportedField { offset: u64, flag: u16 },

    #[error("Malformed directory record at offset {offset}: {reason}")]
    MalformedEntry { offset: u64, reason: String },

    #[error("{remaining} trailing byte(s) after the last directory record at offset {offset}")]
    TrailingGarbage { offset: u64, remaining: u64 },

    #[error("Invalid UTF-8 in field at directory offset {offset}: {source}")]
    Decode {
        offset: u64,
        #[source]
        source: Utf8Error,
    },

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Object has neither an inline payload nor a stream descriptor: {0}")]
    NotAStream(String),

    #[error("I/O error while trying to {op} at offset {offset}: {source}")]
    Io {
        offset: u64,
        op: &'static str,
        #[source]
        source: io::Error,
    },
}

impl BlebError {
    /// Wraps a byte-source failure with the position and the operation that hit it.
    pub fn io(offset: u64, op: &'static str, source: io::Error) -> Self {
        BlebError::Io { offset, op, source }
    }

    /// Structural errors leave offsets untrustworthy; nothing after them in
    /// the same stream can be decoded.
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            BlebError::Decode { .. } | BlebError::ObjectNotFound(_) | BlebError::NotAStream(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BlebError>;

//! Read-only decoder for bleb repositories: a single file holding a
//! directory of named, possibly fragmented byte streams.
//!
//! Decoding is layered: [`header`] validates the prologue, [`stream`]
//! reassembles a logical stream from its span chain, and [`directory`] walks
//! the content-directory records found in the root stream. [`Repository`]
//! ties the three together; [`report`] exposes everything to a renderer.

pub mod error;
pub mod options;
pub mod header;
pub mod span;
pub mod stream;
pub mod directory;
pub mod repository;
pub mod report;

pub use error::{BlebError, Result};
pub use options::{DecodeOptions, InlinePayloadRule};
pub use header::{read_header, RepositoryHeader};
pub use span::{SpanHeader, StreamDescriptor};
pub use stream::{materialize, trace_spans, SpanRecord};
pub use directory::{list_entries, DeletedEntry, DirectoryWalker, Entry, EntryFlags, LiveEntry};
pub use repository::Repository;
pub use report::{inspect, ContainerReport, ReportSink};

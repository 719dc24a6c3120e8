//! Reporting boundary.
//!
//! [`inspect`] decodes a whole container and hands every artifact to a
//! [`ReportSink`]; the decoder itself never formats anything. Small entry
//! streams (shorter than the caller's threshold) are materialized and passed
//! along too.
//!
//! [`ContainerReport`] is a sink that keeps everything in a serde-serializable
//! tree, which is what the CLI prints.

use std::io::{Read, Seek, SeekFrom};

use serde::Serialize;

use crate::directory::{list_entries, Entry, EntryWarning, LiveEntry};
use crate::error::{BlebError, Result};
use crate::header::{read_header, RepositoryHeader, ROOT_DESCRIPTOR_OFFSET};
use crate::options::DecodeOptions;
use crate::span::StreamDescriptor;
use crate::stream::materialize;

/// Streams shorter than this are rendered inline by default.
pub const DEFAULT_INLINE_THRESHOLD: u64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum StreamRole {
    /// The content directory addressed from the prologue.
    Root,
    /// The stream of the directory record at `offset`.
    Entry { offset: u64 },
}

pub trait ReportSink {
    fn header(&mut self, _header: &RepositoryHeader) {}
    fn descriptor(&mut self, _role: StreamRole, _descriptor: &StreamDescriptor) {}
    fn entry(&mut self, _entry: &Entry) {}
    fn stream_content(&mut self, _entry: &LiveEntry, _content: &[u8]) {}
    /// A decoding failure. Called for local failures (the walk goes on) and
    /// once more for the structural failure that ends it, if any.
    fn problem(&mut self, _offset: Option<u64>, _error: &BlebError) {}
}

/// Decodes the container in `source` and reports everything to `sink`.
///
/// A failing entry stream or an undecodable name is reported and skipped.
/// Errors in the header, the root stream or the directory structure are
/// reported and then returned.
pub fn inspect<R, S>(
    source:           &mut R,
    sink:             &mut S,
    options:          &DecodeOptions,
    inline_threshold: u64,
) -> Result<()>
where
    R: Read + Seek,
    S: ReportSink + ?Sized,
{
    let result = inspect_inner(source, sink, options, inline_threshold);
    if let Err(e) = &result {
        sink.problem(None, e);
    }
    result
}

fn inspect_inner<R, S>(
    source:           &mut R,
    sink:             &mut S,
    options:          &DecodeOptions,
    inline_threshold: u64,
) -> Result<()>
where
    R: Read + Seek,
    S: ReportSink + ?Sized,
{
    source
        .seek(SeekFrom::Start(0))
        .map_err(|e| BlebError::io(0, "seek to repository header", e))?;
    let header = read_header(&mut *source, options)?;
    sink.header(&header);

    let root = StreamDescriptor::read(&mut *source)
        .map_err(|e| BlebError::io(ROOT_DESCRIPTOR_OFFSET, "read root stream descriptor", e))?;
    sink.descriptor(StreamRole::Root, &root);

    for entry in list_entries(source, &root, options)? {
        let entry = entry?;
        sink.entry(&entry);

        let Entry::Live(live) = &entry else { continue };

        if let Err(e) = live.name() {
            sink.problem(Some(live.offset), &e);
        }

        if let Some(descriptor) = live.stream {
            sink.descriptor(StreamRole::Entry { offset: live.offset }, &descriptor);
            if descriptor.length < inline_threshold {
                match materialize(source, &descriptor, options) {
                    Ok(content) => sink.stream_content(live, &content),
                    Err(e) => {
                        tracing::warn!(offset = live.offset, error = %e, "skipping unreadable entry stream");
                        sink.problem(Some(live.offset), &e);
                    }
                }
            }
        }
    }
    Ok(())
}

// ── Collected report ──────────────────────────────────────────────────────────

/// Bytes rendered as text when they are valid UTF-8, as hex otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Content {
    Text(String),
    Hex(String),
}

impl Content {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(text) => Content::Text(text.to_owned()),
            Err(_) => Content::Hex(hex::encode(bytes)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryReport {
    Object {
        offset:         u64,
        length:         u16,
        flags:          u16,
        name:           String,
        is_directory:   bool,
        stream:         Option<StreamDescriptor>,
        inline_payload: Option<Content>,
        content:        Option<Content>,
        warnings:       Vec<String>,
    },
    Deleted {
        offset: u64,
        length: u16,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ProblemReport {
    pub offset:     Option<u64>,
    pub structural: bool,
    pub message:    String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ContainerReport {
    pub header:   Option<RepositoryHeader>,
    pub root:     Option<StreamDescriptor>,
    pub entries:  Vec<EntryReport>,
    pub problems: Vec<ProblemReport>,
}

impl ContainerReport {
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn live_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, EntryReport::Object { .. }))
            .count()
    }
}

impl ReportSink for ContainerReport {
    fn header(&mut self, header: &RepositoryHeader) {
        self.header = Some(*header);
    }

    fn descriptor(&mut self, role: StreamRole, descriptor: &StreamDescriptor) {
        if role == StreamRole::Root {
            self.root = Some(*descriptor);
        }
    }

    fn entry(&mut self, entry: &Entry) {
        self.entries.push(match entry {
            Entry::Deleted(d) => EntryReport::Deleted { offset: d.offset, length: d.length },
            Entry::Live(e) => EntryReport::Object {
                offset:         e.offset,
                length:         e.record_length,
                flags:          e.flags.bits(),
                name:           e.name_lossy().into_owned(),
                is_directory:   e.is_directory(),
                stream:         e.stream,
                inline_payload: e.inline_payload.as_deref().map(Content::from_bytes),
                content:        None,
                warnings:       e.warnings.iter().map(describe_warning).collect(),
            },
        });
    }

    fn stream_content(&mut self, entry: &LiveEntry, bytes: &[u8]) {
        let target = self.entries.iter_mut().rev().find_map(|e| match e {
            EntryReport::Object { offset, content, .. } if *offset == entry.offset => Some(content),
            _ => None,
        });
        if let Some(content) = target {
            *content = Some(Content::from_bytes(bytes));
        }
    }

    fn problem(&mut self, offset: Option<u64>, error: &BlebError) {
        self.problems.push(ProblemReport {
            offset,
            structural: error.is_structural(),
            message:    error.to_string(),
        });
    }
}

fn describe_warning(warning: &EntryWarning) -> String {
    match warning {
        EntryWarning::TextDirectoryOverlap => "IS_TEXT overlaps IS_DIRECTORY".to_owned(),
        EntryWarning::UnknownFlags(bits) => format!("unknown flag bits {bits:#06x}"),
    }
}

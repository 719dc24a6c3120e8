//! High-level [`Repository`] API: the primary embedding surface.
//!
//! ```no_run
//! use bleb::{DecodeOptions, Repository};
//!
//! let mut repo = Repository::open_file("assets.bleb", DecodeOptions::default())?;
//! for name in repo.names()? {
//!     println!("{name}");
//! }
//! let data = repo.read_object("hello.txt")?;
//! # Ok::<(), bleb::BlebError>(())
//! ```
//!
//! The repository owns its byte source, so every operation takes `&mut self`
//! and no two reads can interleave on the shared seek position. Each call
//! seeks explicitly before reading.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::directory::{list_entries, DirectoryWalker, Entry, LiveEntry};
use crate::error::{BlebError, Result};
use crate::header::{read_header, RepositoryHeader, ROOT_DESCRIPTOR_OFFSET};
use crate::options::DecodeOptions;
use crate::span::StreamDescriptor;
use crate::stream::{materialize, trace_spans, SpanRecord};

pub struct Repository<R: Read + Seek> {
    source:  R,
    header:  RepositoryHeader,
    root:    StreamDescriptor,
    options: DecodeOptions,
}

impl Repository<File> {
    pub fn open_file<P: AsRef<Path>>(path: P, options: DecodeOptions) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(|e| BlebError::io(0, "open repository file", e))?;
        Self::open(file, options)
    }
}

impl<R: Read + Seek> Repository<R> {
    /// Reads the prologue and the root descriptor. The directory itself is
    /// decoded lazily by [`entries`](Self::entries).
    pub fn open(mut source: R, options: DecodeOptions) -> Result<Self> {
        source
            .seek(SeekFrom::Start(0))
            .map_err(|e| BlebError::io(0, "seek to repository header", e))?;
        let header = read_header(&mut source, &options)?;
        let root = StreamDescriptor::read(&mut source)
            .map_err(|e| BlebError::io(ROOT_DESCRIPTOR_OFFSET, "read root stream descriptor", e))?;

        tracing::debug!(location = root.location, length = root.length, "opened repository");
        Ok(Self { source, header, root, options })
    }

    pub fn header(&self) -> &RepositoryHeader { &self.header }

    /// Descriptor of the content directory stream.
    pub fn root(&self) -> &StreamDescriptor { &self.root }

    // ── Streams ───────────────────────────────────────────────────────────────

    pub fn materialize(&mut self, descriptor: &StreamDescriptor) -> Result<Vec<u8>> {
        materialize(&mut self.source, descriptor, &self.options)
    }

    pub fn spans(&mut self, descriptor: &StreamDescriptor) -> Result<Vec<SpanRecord>> {
        trace_spans(&mut self.source, descriptor, &self.options)
    }

    // ── Directory ─────────────────────────────────────────────────────────────

    /// Walks the root content directory.
    pub fn entries(&mut self) -> Result<DirectoryWalker> {
        let root = self.root;
        list_entries(&mut self.source, &root, &self.options)
    }

    /// Walks the directory stored in a sub-directory entry's stream.
    pub fn open_directory(&mut self, entry: &LiveEntry) -> Result<DirectoryWalker> {
        let descriptor = entry
            .stream
            .ok_or_else(|| BlebError::NotAStream(entry.name_lossy().into_owned()))?;
        list_entries(&mut self.source, &descriptor, &self.options)
    }

    /// Every record of the root directory, tombstones included.
    pub fn list(&mut self) -> Result<Vec<Entry>> {
        self.entries()?.collect()
    }

    /// Names of the live objects in the root directory, in directory order.
    pub fn names(&mut self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in self.entries()? {
            if let Entry::Live(live) = entry? {
                names.push(live.name_lossy().into_owned());
            }
        }
        Ok(names)
    }

    /// First live entry named exactly `name`.
    pub fn find(&mut self, name: &str) -> Result<Option<LiveEntry>> {
        for entry in self.entries()? {
            match entry? {
                Entry::Live(live) if live.name == name.as_bytes() => return Ok(Some(live)),
                _ => {}
            }
        }
        Ok(None)
    }

    /// Contents of an entry: its inline payload when it has one, otherwise its stream.
    pub fn contents(&mut self, entry: &LiveEntry) -> Result<Vec<u8>> {
        if let Some(payload) = &entry.inline_payload {
            return Ok(payload.clone());
        }
        match entry.stream {
            Some(descriptor) => self.materialize(&descriptor),
            None => Err(BlebError::NotAStream(entry.name_lossy().into_owned())),
        }
    }

    pub fn read_object(&mut self, name: &str) -> Result<Vec<u8>> {
        let entry = self
            .find(name)?
            .ok_or_else(|| BlebError::ObjectNotFound(name.to_owned()))?;
        self.contents(&entry)
    }
}

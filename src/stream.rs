//! Span-chain reconstruction.
//!
//! A stream is stored as a forward-linked chain of spans, each one a
//! [`SpanHeader`] followed by `payload_length` bytes of stream data. Walking
//! the chain from a [`StreamDescriptor`] and concatenating payloads until
//! `descriptor.length` bytes are collected yields the logical stream.
//!
//! Only the final span may carry more payload than the stream still needs;
//! the excess is discarded. A chain that ends early is [`BlebError::TruncatedStream`].
//! A chain that loops or exceeds `DecodeOptions::max_spans` is
//! [`BlebError::CorruptChain`]. Reads never go past `descriptor.length` bytes
//! of payload, and the output buffer grows only by bytes actually read, so a
//! bogus payload length costs no more memory than the source holds.
//!
//! Every call seeks explicitly before each read and leaves the source
//! position unspecified afterwards; nothing is cached between calls.

use std::collections::HashSet;
use std::io::{self, Read, Seek, SeekFrom};

use crate::error::{BlebError, Result};
use crate::options::DecodeOptions;
use crate::span::{SpanHeader, StreamDescriptor, SPAN_HEADER_SIZE};

/// Largest up-front allocation for a materialized stream; the buffer grows past it as spans arrive.
const INITIAL_CAPACITY_LIMIT: u64 = 1 << 20;

/// One physical span visited while walking a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanRecord {
    pub location: u64,
    pub header:   SpanHeader,
    /// Payload bytes of this span that belong to the logical stream.
    pub used:     u64,
}

/// Reassembles the stream addressed by `descriptor` into one buffer of exactly
/// `descriptor.length` bytes.
pub fn materialize<R: Read + Seek>(
    source:     &mut R,
    descriptor: &StreamDescriptor,
    options:    &DecodeOptions,
) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(descriptor.length.min(INITIAL_CAPACITY_LIMIT) as usize);

    walk_chain(source, descriptor, options, |source, location, used| {
        let offset = location + SPAN_HEADER_SIZE as u64;
        // The buffer only grows by bytes that actually arrive.
        let read = (&mut *source)
            .take(used)
            .read_to_end(&mut out)
            .map_err(|e| BlebError::io(offset, "read span payload", e))?;
        if (read as u64) < used {
            return Err(BlebError::io(
                offset,
                "read span payload",
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("span holds {read} of {used} payload bytes"),
                ),
            ));
        }
        Ok(())
    })?;

    Ok(out)
}

/// Walks the chain without copying payloads and reports every span visited.
pub fn trace_spans<R: Read + Seek>(
    source:     &mut R,
    descriptor: &StreamDescriptor,
    options:    &DecodeOptions,
) -> Result<Vec<SpanRecord>> {
    walk_chain(source, descriptor, options, |_, _, _| Ok(()))
}

/// Drives the chain walk. `consume` is called with the source positioned at
/// the first payload byte of each span and must read exactly `used` bytes
/// (or none at all).
fn walk_chain<R, F>(
    source:      &mut R,
    descriptor:  &StreamDescriptor,
    options:     &DecodeOptions,
    mut consume: F,
) -> Result<Vec<SpanRecord>>
where
    R: Read + Seek,
    F: FnMut(&mut R, u64, u64) -> Result<()>,
{
    let mut spans = Vec::new();

    if descriptor.length == 0 {
        return Ok(spans);
    }
    if descriptor.length > options.max_stream_length {
        return Err(BlebError::CorruptChain {
            location: descriptor.location,
            reason:   format!(
                "declared length {} exceeds the {} byte limit",
                descriptor.length, options.max_stream_length
            ),
        });
    }
    if descriptor.is_unallocated() {
        return Err(BlebError::TruncatedStream {
            location:  0,
            expected:  descriptor.length,
            available: 0,
        });
    }

    let mut visited  = HashSet::new();
    let mut location = descriptor.location;
    let mut produced = 0u64;

    loop {
        if !visited.insert(location) {
            return Err(BlebError::CorruptChain {
                location,
                reason: "span chain revisits an earlier span".into(),
            });
        }
        if visited.len() > options.max_spans {
            return Err(BlebError::CorruptChain {
                location,
                reason: format!("span chain longer than {} spans", options.max_spans),
            });
        }

        source
            .seek(SeekFrom::Start(location))
            .map_err(|e| BlebError::io(location, "seek to span", e))?;
        let header = SpanHeader::read(&mut *source)
            .map_err(|e| BlebError::io(location, "read span header", e))?;

        let used = u64::from(header.payload_length).min(descriptor.length - produced);
        consume(source, location, used)?;
        produced += used;
        spans.push(SpanRecord { location, header, used });

        tracing::debug!(
            location,
            payload = header.payload_length,
            next = header.next_location,
            produced,
            "visited span"
        );

        if produced == descriptor.length {
            return Ok(spans);
        }

        if options.check_span_capacity && header.payload_length < header.reserved_length {
            return Err(BlebError::CorruptChain {
                location,
                reason: format!(
                    "span not fully utilized: {} of {} reserved bytes used before a further span",
                    header.payload_length, header.reserved_length
                ),
            });
        }

        location = match header.next() {
            Some(next) => next,
            None => {
                return Err(BlebError::TruncatedStream {
                    location:  descriptor.location,
                    expected:  descriptor.length,
                    available: produced,
                })
            }
        };
    }
}

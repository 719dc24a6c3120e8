//! Decoder strictness and resource limits.

/// Default bound on span hops for a single stream.
pub const DEFAULT_MAX_SPANS: usize = 1 << 20;
/// Default bound on a single stream's logical length: 1 GiB.
pub const DEFAULT_MAX_STREAM_LENGTH: u64 = 1 << 30;

/// Where an inline payload starts inside its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlinePayloadRule {
    /// After the name and every optional field present before it. The payload
    /// length is `record_length - header - name - optional fields`.
    AfterFields,
    /// Legacy arithmetic: the payload begins right after the name and runs to
    /// the record end, overlapping a stream descriptor if one is present.
    AfterName,
}

/// Configuration for every decoding entry point.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    pub max_spans:           usize,
    pub max_stream_length:   u64,
    pub inline_payload_rule: InlinePayloadRule,
    /// When false, bytes after the last record are logged and ignored.
    pub strict_trailing:     bool,
    /// Reject a non-final span whose payload is shorter than its reserved capacity.
    pub check_span_capacity: bool,
    /// Reject containers newer than format version 1.
    pub strict_version:      bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_spans:           DEFAULT_MAX_SPANS,
            max_stream_length:   DEFAULT_MAX_STREAM_LENGTH,
            inline_payload_rule: InlinePayloadRule::AfterFields,
            strict_trailing:     true,
            check_span_capacity: false,
            strict_version:      false,
        }
    }
}

impl DecodeOptions {
    /// Every optional check enabled.
    pub fn strict() -> Self {
        Self {
            check_span_capacity: true,
            strict_version:      true,
            ..Self::default()
        }
    }

    /// Tolerates trailing directory bytes and uses the legacy inline-payload offset.
    pub fn lenient() -> Self {
        Self {
            inline_payload_rule: InlinePayloadRule::AfterName,
            strict_trailing:     false,
            ..Self::default()
        }
    }
}

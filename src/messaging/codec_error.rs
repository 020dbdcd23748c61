use std::fmt::{Display, Formatter};

/// Failures of the wire codec. They travel inside `anyhow::Error`, callers that need to react to
///  a specific kind use `downcast_ref::<CodecError>()`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum CodecError {
    /// A field read or write would cross the payload buffer's limit
    OutOfBounds {
        requested: usize,
        position: usize,
        limit: usize,
    },
    /// A packet declares more bytes than are available
    Framing {
        declared: usize,
        available: usize,
    },
    /// A known message arrived with a payload length other than its schema's
    LengthMismatch {
        msgid: u8,
        expected: usize,
        actual: usize,
    },
    InvalidStartMarker(u8),
    ChecksumMismatch {
        msgid: u8,
        expected: u16,
        actual: u16,
    },
    UnknownMessageId(u8),
    FieldMismatch {
        message: &'static str,
        field: &'static str,
    },
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::OutOfBounds { requested, position, limit } => {
                write!(f, "payload access out of bounds: {} bytes at position {}, limit {}", requested, position, limit)
            }
            CodecError::Framing { declared, available } => {
                write!(f, "framing error: packet declares {} bytes, {} available", declared, available)
            }
            CodecError::LengthMismatch { msgid, expected, actual } => {
                write!(f, "message {} has a {} byte payload, expected {}", msgid, actual, expected)
            }
            CodecError::InvalidStartMarker(b) => {
                write!(f, "invalid start marker 0x{:02X}", b)
            }
            CodecError::ChecksumMismatch { msgid, expected, actual } => {
                write!(f, "checksum mismatch for message {}: expected 0x{:04X}, was 0x{:04X}", msgid, expected, actual)
            }
            CodecError::UnknownMessageId(msgid) => {
                write!(f, "unknown message id {}", msgid)
            }
            CodecError::FieldMismatch { message, field } => {
                write!(f, "value for field {}.{} does not match its schema", message, field)
            }
        }
    }
}

impl std::error::Error for CodecError {}

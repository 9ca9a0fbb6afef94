//! Error types for segmux-ebml.

use std::io;
use thiserror::Error;

/// Result type for segmux-ebml operations.
pub type Result<T> = std::result::Result<T, EbmlError>;

/// Errors raised while reading EBML/Matroska structures.
#[derive(Debug, Error)]
pub enum EbmlError {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The stream does not start with an EBML header.
    #[error("Not an EBML stream")]
    NotEbml,

    /// EBML header with a doc type we do not demux.
    #[error("Unsupported doc type: {0}")]
    UnsupportedDocType(String),

    /// A variable-length integer could not be decoded.
    #[error("Invalid VINT at offset {offset}")]
    InvalidVint {
        /// Byte offset of the bad VINT (relative to the buffer or stream).
        offset: u64,
    },

    /// An element declares a size that does not fit its parent or limit.
    #[error("Invalid element size for 0x{id:X} at offset {offset}: {message}")]
    InvalidElementSize {
        /// Element id.
        id: u32,
        /// Byte offset of the element header.
        offset: u64,
        /// What went wrong.
        message: String,
    },

    /// Malformed element payload.
    #[error("Invalid element 0x{id:X}: {message}")]
    InvalidElement {
        /// Element id.
        id: u32,
        /// What went wrong.
        message: String,
    },

    /// Malformed block header or lacing.
    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    /// A segment is missing a mandatory child element.
    #[error("Missing required element: {0}")]
    MissingElement(&'static str),
}

impl EbmlError {
    /// Create an invalid element error.
    pub fn invalid_element(id: u32, message: impl Into<String>) -> Self {
        Self::InvalidElement {
            id,
            message: message.into(),
        }
    }

    /// Create an invalid block error.
    pub fn invalid_block(message: impl Into<String>) -> Self {
        Self::InvalidBlock(message.into())
    }

    /// Whether this error only means the stream ended early.
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }
}

//! Error types for segmux-demux.

use std::io;
use thiserror::Error;

/// Result type for segmux-demux operations.
pub type Result<T> = std::result::Result<T, DemuxError>;

/// Errors raised by opening, stepping or seeking a demuxer.
#[derive(Debug, Error)]
pub enum DemuxError {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The stream is not Matroska/WebM.
    #[error("Not a Matroska stream")]
    NotMatroska,

    /// Unusable file structure (no segment, no media and no chapters).
    #[error("Structural error: {0}")]
    Structural(String),

    /// A seek request was refused; the previous position is kept.
    #[error("Seek rejected: {0}")]
    SeekRejected(&'static str),

    /// Error from the EBML parse layer.
    #[error("EBML error: {0}")]
    Ebml(#[from] segmux_ebml::EbmlError),
}

impl DemuxError {
    /// Create a structural error.
    pub fn structural(msg: impl Into<String>) -> Self {
        Self::Structural(msg.into())
    }
}

/// Errors returned by control queries.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// The virtual timeline has no known duration.
    #[error("Duration unknown")]
    DurationUnknown,

    /// No titles (editions) are exposed.
    #[error("No titles")]
    NoTitles,

    /// Title or seekpoint index out of range.
    #[error("Invalid index: {index} (count: {count})")]
    InvalidIndex { index: usize, count: usize },

    /// The file carries no attachments.
    #[error("No attachments")]
    NoAttachments,

    /// Allocation for a reply failed.
    #[error("Resource exhausted")]
    ResourceExhausted,

    /// The seek the query implies was refused.
    #[error("Seek rejected: {0}")]
    SeekRejected(&'static str),
}

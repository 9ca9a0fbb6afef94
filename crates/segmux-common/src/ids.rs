//! Typed arena indices.
//!
//! Segments, streams and output handles live in flat arenas owned by the
//! demuxer. Anything that needs to point at one of them stores one of these
//! small ids and resolves it by lookup, so a missing target degrades to
//! `None` instead of a dangling reference.

use serde::{Deserialize, Serialize};

/// Index of a segment in the demuxer's segment arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(u32);

impl SegmentId {
    /// Wrap a raw arena index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Arena slot of this segment.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for SegmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "segment#{}", self.0)
    }
}

/// Index of an opened byte stream (one file or memory buffer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(u32);

impl StreamId {
    /// Wrap a raw arena index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Arena slot of this stream.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

/// Handle returned by an output sink when a track is bound to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EsId(u32);

impl EsId {
    /// Wrap a sink-defined handle value.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw handle value.
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for EsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "es#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_id_index() {
        let id = SegmentId::new(7);
        assert_eq!(id.index(), 7);
        assert_eq!(id.to_string(), "segment#7");
    }

    #[test]
    fn test_ids_serialize_transparent() {
        let json = serde_json::to_string(&StreamId::new(2)).unwrap();
        assert_eq!(json, "2");
        let back: EsId = serde_json::from_str("5").unwrap();
        assert_eq!(back.raw(), 5);
    }

    #[test]
    fn test_ids_order() {
        assert!(SegmentId::new(1) < SegmentId::new(2));
    }
}

//! Segmux-EBML: Matroska parse layer.
//!
//! Reads the EBML element structure of a Matroska/WebM stream:
//!
//! - **Elements**: VINT ids and sizes, buffered child iteration, scalars
//! - **Segments**: Info, Tracks, Chapters, Cues, Attachments trees, with
//!   SeekHead fallback for elements behind unknown-size clusters
//! - **Clusters**: lazy block reading with lacing and resync
//! - **Writing**: a small element writer for building fixtures
//!
//! # Examples
//!
//! ```
//! use segmux_ebml::{element, parse_segments, write::ElementWriter};
//! use std::io::Cursor;
//!
//! let mut w = ElementWriter::new();
//! w.ebml_header("matroska");
//! w.master(element::SEGMENT, |s| {
//!     s.master(element::INFO, |i| i.uint(element::TIMECODE_SCALE, 1_000_000));
//! });
//!
//! let segments = parse_segments(&mut Cursor::new(w.finish())).unwrap();
//! assert_eq!(segments.len(), 1);
//! assert_eq!(segments[0].timecode_scale(), 1_000_000);
//! ```

pub mod block;
pub mod cluster;
pub mod element;
pub mod error;
pub mod model;
pub mod reader;
pub mod segment;
pub mod vint;
pub mod write;

pub use block::{FrameSpan, Lacing, RawBlock};
pub use cluster::ClusterReader;
pub use error::{EbmlError, Result};
pub use model::{
    AttachedFile, AudioSettings, ChapterAtom, ChapterDisplay, ChapterTranslate, ContentCompression,
    ContentEncoding, CuePoint, EditionEntry, SegmentInfo, TrackEntry, VideoSettings,
};
pub use segment::{parse_segments, SegmentTree};

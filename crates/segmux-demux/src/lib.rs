//! Segmux-Demux: virtual-timeline Matroska demultiplexer.
//!
//! Presents segments spread over several files, editions and ordered
//! chapters as one seekable timeline:
//!
//! - **Registry**: segments per stream, family and hard-link resolution
//! - **Chapters**: ordered editions and linked chains composed into
//!   virtual chapters
//! - **Decoder**: blocks to timestamped frames with codec fixups
//! - **Driver**: bounded demux steps, seeking and control queries
//!
//! # Examples
//!
//! ```
//! use segmux_demux::{DemuxConfig, Demuxer, DemuxOutcome, MemorySink, NoSiblings};
//! use segmux_ebml::{element, write::ElementWriter};
//! use std::io::Cursor;
//!
//! let mut w = ElementWriter::new();
//! w.ebml_header("matroska");
//! w.master(element::SEGMENT, |s| {
//!     s.master(element::INFO, |i| i.float(element::DURATION, 40.0));
//!     s.master(element::TRACKS, |t| {
//!         t.master(element::TRACK_ENTRY, |e| {
//!             e.uint(element::TRACK_NUMBER, 1);
//!             e.uint(element::TRACK_TYPE, 0x11);
//!             e.string(element::CODEC_ID, "S_TEXT/UTF8");
//!         });
//!     });
//!     s.master(element::CLUSTER, |c| {
//!         c.uint(element::TIMECODE, 0);
//!         let block = segmux_ebml::write::block_payload(1, 0, 0x80, segmux_ebml::Lacing::None, &[b"hi"]);
//!         c.binary(element::SIMPLE_BLOCK, &block);
//!     });
//! });
//!
//! let sink = MemorySink::new();
//! let demuxer = Demuxer::open(
//!     Box::new(Cursor::new(w.finish())),
//!     "doc.mkv",
//!     Box::new(sink.clone()),
//!     DemuxConfig::default(),
//!     &mut NoSiblings,
//! )
//! .unwrap();
//!
//! assert_eq!(demuxer.demux().unwrap(), DemuxOutcome::Produced);
//! assert_eq!(demuxer.demux().unwrap(), DemuxOutcome::EndOfStream);
//! assert_eq!(sink.recorded().frames[0].1.data.as_ref(), b"hi");
//! ```

pub mod chapters;
pub mod config;
pub mod control;
pub mod decoder;
pub mod driver;
pub mod error;
pub mod io;
pub mod registry;
mod seek;
pub mod sink;
pub mod timeline;
pub mod track;

pub use chapters::{VirtualChapter, VirtualEdition};
pub use config::DemuxConfig;
pub use control::{Attachment, ControlQuery, ControlReply, Meta, Seekpoint, Title};
pub use driver::{DemuxOutcome, Demuxer};
pub use error::{ControlError, DemuxError, Result};
pub use io::ByteSource;
pub use registry::{Candidate, NoSiblings, SegmentRegistry, SiblingSource};
pub use sink::{Frame, FrameFlags, MemorySink, OutputSink, Recorded};
pub use timeline::VirtualSegment;
pub use track::{Track, TrackKind};

//! Streams, the segments found in them, and cross-file linking.

use crate::error::{DemuxError, Result};
use crate::io::ByteSource;
use crate::track::Track;
use segmux_common::time::{fticks_to_us, ticks_to_us};
use segmux_common::{SegmentId, StreamId};
use segmux_ebml::element::EBML_MAGIC;
use segmux_ebml::{
    parse_segments, AttachedFile, ChapterAtom, ChapterTranslate, ClusterReader, EbmlError,
    EditionEntry, RawBlock, SegmentTree,
};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

/// A named byte stream offered as a possible linked file.
pub struct Candidate {
    pub name: String,
    pub source: Box<dyn ByteSource>,
}

/// Supplies candidate sibling streams when a file references others.
pub trait SiblingSource {
    fn candidates(&mut self) -> Vec<Candidate>;
}

/// Sibling source for a single self-contained file.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSiblings;

impl SiblingSource for NoSiblings {
    fn candidates(&mut self) -> Vec<Candidate> {
        Vec::new()
    }
}

impl SiblingSource for Vec<Candidate> {
    fn candidates(&mut self) -> Vec<Candidate> {
        std::mem::take(self)
    }
}

/// One cue: a cluster that starts at or before `time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CueEntry {
    /// Segment time in µs.
    pub time: i64,
    pub position: u64,
}

/// Key-frame cluster observed while reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub position: u64,
    /// Segment time in µs.
    pub time: i64,
}

/// One Matroska segment.
#[derive(Debug)]
pub struct Segment {
    pub id: SegmentId,
    pub stream: StreamId,
    pub uid: Option<Vec<u8>>,
    pub prev_uid: Option<Vec<u8>>,
    pub next_uid: Option<Vec<u8>>,
    pub families: Vec<Vec<u8>>,
    /// Nanoseconds per tick.
    pub timecode_scale: u64,
    /// µs.
    pub duration: Option<i64>,
    pub title: Option<String>,
    pub muxing_app: Option<String>,
    pub writing_app: Option<String>,
    pub tracks: Vec<Track>,
    pub editions: Vec<EditionEntry>,
    pub cues: Vec<CueEntry>,
    pub index: Vec<IndexEntry>,
    pub attachments: Vec<AttachedFile>,
    pub translations: Vec<ChapterTranslate>,
    pub first_cluster: Option<u64>,
    pub data_end: u64,
    pub(crate) reader: ClusterReader,
    pub(crate) opened: bool,
    pub(crate) released: bool,
}

impl Segment {
    fn from_tree(id: SegmentId, stream: StreamId, tree: SegmentTree) -> Option<Self> {
        let info = tree.info?;
        let scale = info.timecode_scale;
        let mut cues: Vec<CueEntry> = tree
            .cues
            .iter()
            .map(|cue| CueEntry {
                time: ticks_to_us(cue.time as i64, scale),
                position: cue.cluster_position,
            })
            .collect();
        cues.dedup();

        let start = tree.first_cluster.unwrap_or(tree.data_end);
        Some(Self {
            id,
            stream,
            uid: info.uid,
            prev_uid: info.prev_uid,
            next_uid: info.next_uid,
            families: info.families,
            timecode_scale: scale,
            duration: info.duration.map(|d| fticks_to_us(d, scale)),
            title: info.title,
            muxing_app: info.muxing_app,
            writing_app: info.writing_app,
            tracks: tree.tracks.iter().map(Track::from_entry).collect(),
            editions: tree.editions,
            cues,
            index: Vec::new(),
            attachments: tree.attachments,
            translations: info.translations,
            first_cluster: tree.first_cluster,
            data_end: tree.data_end,
            reader: ClusterReader::new(start, Some(tree.data_end)),
            opened: false,
            released: false,
        })
    }

    /// Whether the segment holds any cluster.
    pub fn has_media(&self) -> bool {
        self.first_cluster.is_some()
    }

    pub fn track_mut(&mut self, number: u64) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.number == number)
    }

    /// Default edition, else the first one.
    pub fn default_edition(&self) -> Option<&EditionEntry> {
        self.editions
            .iter()
            .find(|e| e.default)
            .or_else(|| self.editions.first())
    }

    /// Whether chapters or hard links point at other segments.
    pub fn references_external(&self) -> bool {
        fn foreign(atoms: &[ChapterAtom], own: Option<&Vec<u8>>) -> bool {
            atoms.iter().any(|atom| {
                atom.segment_uid.as_ref().is_some_and(|uid| Some(uid) != own)
                    || foreign(&atom.children, own)
            })
        }
        self.prev_uid.is_some()
            || self.next_uid.is_some()
            || self
                .editions
                .iter()
                .any(|e| foreign(&e.chapters, self.uid.as_ref()))
    }

    /// Segment UIDs this segment points at.
    fn referenced_uids(&self) -> Vec<&[u8]> {
        fn collect<'a>(atoms: &'a [ChapterAtom], out: &mut Vec<&'a [u8]>) {
            for atom in atoms {
                if let Some(uid) = &atom.segment_uid {
                    out.push(uid);
                }
                collect(&atom.children, out);
            }
        }
        let mut out: Vec<&[u8]> = Vec::new();
        out.extend(self.prev_uid.as_deref());
        out.extend(self.next_uid.as_deref());
        for edition in &self.editions {
            collect(&edition.chapters, &mut out);
        }
        out
    }

    pub fn shares_family(&self, other: &Segment) -> bool {
        self.families.iter().any(|f| other.families.contains(f))
    }

    /// Last cue at or before `time` (segment µs).
    pub fn cue_before(&self, time: i64) -> Option<CueEntry> {
        let idx = self.cues.partition_point(|c| c.time <= time);
        idx.checked_sub(1).map(|i| self.cues[i])
    }

    /// Last observed key cluster at or before `time` (segment µs).
    pub fn index_before(&self, time: i64) -> Option<IndexEntry> {
        self.index.iter().rev().find(|e| e.time <= time).copied()
    }

    pub fn ticks_to_us(&self, ticks: i64) -> i64 {
        ticks_to_us(ticks, self.timecode_scale)
    }

    /// Restart reading at the first cluster.
    pub(crate) fn rewind(&mut self) {
        self.reader
            .seek_cluster(self.first_cluster.unwrap_or(self.data_end));
    }
}

/// One opened byte stream.
pub struct Stream {
    pub name: String,
    pub size: u64,
    pub segments: Vec<SegmentId>,
    source: Box<dyn ByteSource>,
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("segments", &self.segments)
            .finish()
    }
}

/// Arena of streams and segments.
#[derive(Debug, Default)]
pub struct SegmentRegistry {
    streams: Vec<Option<Stream>>,
    segments: Vec<Segment>,
}

impl SegmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse every segment of `source` and register the stream.
    ///
    /// Segments without Info are skipped; a stream with no usable
    /// segment is rejected. Segments of the first stream are opened.
    pub fn analyze_stream(&mut self, name: impl Into<String>, mut source: Box<dyn ByteSource>) -> Result<StreamId> {
        let name = name.into();
        let size = source.size()?;
        let trees = parse_segments(&mut source).map_err(|e| match e {
            EbmlError::NotEbml | EbmlError::UnsupportedDocType(_) => DemuxError::NotMatroska,
            other => DemuxError::Ebml(other),
        })?;

        let stream_id = StreamId::new(self.streams.len() as u32);
        let primary = self.streams.is_empty();
        let mut ids = Vec::new();
        for tree in trees {
            let id = SegmentId::new(self.segments.len() as u32);
            match Segment::from_tree(id, stream_id, tree) {
                Some(mut segment) => {
                    segment.opened = primary;
                    self.segments.push(segment);
                    ids.push(id);
                }
                None => warn!(stream = %name, "skipping segment without Info"),
            }
        }
        if ids.is_empty() {
            return Err(DemuxError::structural(format!(
                "{}: cannot find a segment with mandatory Info",
                name
            )));
        }

        debug!(stream = %name, segments = ids.len(), "analyzed stream");
        self.streams.push(Some(Stream {
            name,
            size,
            segments: ids,
            source,
        }));
        Ok(stream_id)
    }

    pub fn stream(&self, id: StreamId) -> Option<&Stream> {
        self.streams.get(id.index()).and_then(Option::as_ref)
    }

    /// Live segment by id.
    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(id.index()).filter(|s| !s.released)
    }

    pub fn segment_mut(&mut self, id: SegmentId) -> Option<&mut Segment> {
        self.segments.get_mut(id.index()).filter(|s| !s.released)
    }

    /// All live segments.
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(|s| !s.released)
    }

    /// Opened live segments, the ones chapters may resolve to.
    pub fn opened(&self) -> impl Iterator<Item = &Segment> {
        self.segments().filter(|s| s.opened)
    }

    /// Whether the stream depends on segments from other files.
    pub fn need_preload(&self, stream: StreamId) -> bool {
        let Some(stream) = self.stream(stream) else {
            return false;
        };
        stream.segments.iter().filter_map(|id| self.segment(*id)).any(|s| {
            s.references_external()
                || (s.translations.first().is_some_and(|t| t.codec == ChapterTranslate::CODEC_DVD)
                    && !s.families.is_empty())
        })
    }

    /// Analyze sibling streams and open the segments linked to `main`.
    ///
    /// Returns the number of segments opened.
    pub fn preload_family(&mut self, main: SegmentId, siblings: &mut dyn SiblingSource) -> usize {
        for candidate in siblings.candidates() {
            let Candidate { name, mut source } = candidate;
            let mut magic = [0u8; 4];
            match source.peek_at(0, &mut magic) {
                Ok(4) if magic == EBML_MAGIC => {}
                _ => {
                    debug!(file = %name, "not a matroska file");
                    continue;
                }
            }
            if let Err(e) = self.analyze_stream(name.clone(), source) {
                debug!(file = %name, error = %e, "the file will not be used");
            }
        }
        let opened = self.open_linked(main);
        info!(opened, "preloaded linked segments");
        opened
    }

    /// Open segments sharing a family with `main` or referenced by an
    /// opened segment, until nothing changes.
    pub fn open_linked(&mut self, main: SegmentId) -> usize {
        let mut opened = 0;
        loop {
            let Some(main_segment) = self.segment(main) else {
                return opened;
            };
            let referenced: HashSet<Vec<u8>> = self
                .opened()
                .flat_map(|s| s.referenced_uids())
                .map(<[u8]>::to_vec)
                .collect();
            let newly: Vec<usize> = self
                .segments
                .iter()
                .enumerate()
                .filter(|(_, s)| !s.released && !s.opened)
                .filter(|(_, s)| {
                    s.shares_family(main_segment)
                        || s.uid.as_ref().is_some_and(|uid| referenced.contains(uid))
                })
                .map(|(i, _)| i)
                .collect();
            if newly.is_empty() {
                return opened;
            }
            for i in newly {
                self.segments[i].opened = true;
                opened += 1;
            }
        }
    }

    /// Opened segment with the given UID.
    pub fn find_by_uid(&self, uid: &[u8]) -> Option<SegmentId> {
        self.opened()
            .find(|s| s.uid.as_deref() == Some(uid))
            .map(|s| s.id)
    }

    /// Release streams none of whose segments are in `used`.
    pub fn free_unused(&mut self, used: &HashSet<SegmentId>) -> usize {
        let mut released = 0;
        for slot in self.streams.iter_mut() {
            let Some(stream) = slot else { continue };
            if stream.segments.iter().any(|id| used.contains(id)) {
                continue;
            }
            debug!(stream = %stream.name, "releasing unused stream");
            for id in &stream.segments {
                self.segments[id.index()].released = true;
            }
            *slot = None;
            released += 1;
        }
        released
    }

    /// Size of the stream holding `segment`.
    pub fn stream_size(&self, segment: SegmentId) -> u64 {
        self.segment(segment)
            .and_then(|s| self.stream(s.stream))
            .map_or(0, |s| s.size)
    }

    /// Read the next block of a segment, recording key clusters in its
    /// coarse index.
    pub(crate) fn read_block(&mut self, id: SegmentId) -> Result<Option<RawBlock>> {
        let Some(segment) = self.segments.get_mut(id.index()).filter(|s| !s.released) else {
            return Ok(None);
        };
        let Some(stream) = self.streams.get_mut(segment.stream.index()).and_then(Option::as_mut) else {
            return Ok(None);
        };
        let block = segment.reader.next_block(&mut stream.source)?;
        if let Some(block) = &block {
            let known = segment
                .index
                .last()
                .is_some_and(|last| block.cluster_position <= last.position);
            if block.key && !known {
                segment.index.push(IndexEntry {
                    position: block.cluster_position,
                    time: ticks_to_us(block.timecode, segment.timecode_scale),
                });
            }
        }
        Ok(block)
    }

    /// Reposition a segment at the first cluster at or after `position`.
    pub(crate) fn resync(&mut self, id: SegmentId, position: u64) -> Result<bool> {
        let Some(segment) = self.segments.get_mut(id.index()).filter(|s| !s.released) else {
            return Ok(false);
        };
        let Some(stream) = self.streams.get_mut(segment.stream.index()).and_then(Option::as_mut) else {
            return Ok(false);
        };
        Ok(segment.reader.resync(&mut stream.source, position)?)
    }
}

//! Fixture builders shared by the integration tests.
//!
//! Files are written with the EBML writer; cluster offsets are tracked so
//! cues can point at them.

#![allow(dead_code)]

use segmux_demux::{ByteSource, Candidate, DemuxConfig, Demuxer, MemorySink, NoSiblings};
use segmux_ebml::element as id;
use segmux_ebml::write::{block_payload, ElementWriter};
use segmux_ebml::Lacing;
use std::io::Cursor;

/// One block of a fixture cluster.
#[derive(Debug, Clone)]
pub struct BlockSpec {
    pub track: u64,
    /// Relative to the cluster timecode, in ticks.
    pub timecode: i16,
    pub key: bool,
    pub frames: Vec<Vec<u8>>,
    pub lacing: Lacing,
    /// Written as a BlockGroup carrying this BlockDuration.
    pub duration: Option<u64>,
    /// Block body written verbatim instead of `frames`.
    pub body: Option<Vec<u8>>,
}

impl BlockSpec {
    pub fn new(track: u64, timecode: i16, key: bool, payload: &[u8]) -> Self {
        Self {
            track,
            timecode,
            key,
            frames: vec![payload.to_vec()],
            lacing: Lacing::None,
            duration: None,
            body: None,
        }
    }

    pub fn laced(track: u64, timecode: i16, lacing: Lacing, frames: Vec<Vec<u8>>) -> Self {
        Self {
            track,
            timecode,
            key: true,
            frames,
            lacing,
            duration: None,
            body: None,
        }
    }

    /// Pre-encoded SimpleBlock body, e.g. with a broken lace.
    pub fn raw(body: Vec<u8>) -> Self {
        Self {
            track: 0,
            timecode: 0,
            key: true,
            frames: Vec::new(),
            lacing: Lacing::None,
            duration: None,
            body: Some(body),
        }
    }

    pub fn with_duration(mut self, ticks: u64) -> Self {
        self.duration = Some(ticks);
        self
    }
}

/// Segment under construction.
#[derive(Default)]
pub struct SegmentBuilder {
    head: ElementWriter,
    tracks: ElementWriter,
    clusters: Vec<(u64, Vec<u8>)>,
    cues: bool,
}

impl SegmentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Info with a 1 ms timecode scale.
    pub fn info(mut self, uid: u8, duration_ms: Option<f64>) -> Self {
        self.head.master(id::INFO, |i| {
            i.binary(id::SEGMENT_UID, &[uid; 16]);
            i.uint(id::TIMECODE_SCALE, 1_000_000);
            if let Some(d) = duration_ms {
                i.float(id::DURATION, d);
            }
            i.string(id::TITLE, &format!("segment {uid}"));
            i.string(id::MUXING_APP, "segmux fixtures");
            i.string(id::WRITING_APP, "segmux tests");
        });
        self
    }

    /// Info with hard links and family.
    pub fn linked_info(mut self, uid: u8, prev: Option<u8>, next: Option<u8>, family: Option<u8>, duration_ms: f64) -> Self {
        self.head.master(id::INFO, |i| {
            i.binary(id::SEGMENT_UID, &[uid; 16]);
            if let Some(p) = prev {
                i.binary(id::PREV_UID, &[p; 16]);
            }
            if let Some(n) = next {
                i.binary(id::NEXT_UID, &[n; 16]);
            }
            if let Some(f) = family {
                i.binary(id::SEGMENT_FAMILY, &[f; 16]);
            }
            i.uint(id::TIMECODE_SCALE, 1_000_000);
            i.float(id::DURATION, duration_ms);
        });
        self
    }

    pub fn video_track(mut self, number: u64, codec: &str, default_duration_ns: Option<u64>) -> Self {
        self.track(number, 1, codec, default_duration_ns, None);
        self
    }

    /// Video track carrying codec private data.
    pub fn video_track_with_private(mut self, number: u64, codec: &str, private: &[u8]) -> Self {
        self.track(number, 1, codec, Some(40_000_000), Some(private));
        self
    }

    pub fn audio_track(mut self, number: u64, codec: &str, default_duration_ns: Option<u64>) -> Self {
        self.track(number, 2, codec, default_duration_ns, None);
        self
    }

    /// Audio track carrying codec private data.
    pub fn audio_track_with_private(mut self, number: u64, codec: &str, private: &[u8]) -> Self {
        self.track(number, 2, codec, None, Some(private));
        self
    }

    fn track(&mut self, number: u64, kind: u64, codec: &str, default_duration_ns: Option<u64>, private: Option<&[u8]>) {
        self.tracks.master(id::TRACK_ENTRY, |e| {
            e.uint(id::TRACK_NUMBER, number);
            e.uint(id::TRACK_UID, number);
            e.uint(id::TRACK_TYPE, kind);
            e.string(id::CODEC_ID, codec);
            if let Some(p) = private {
                e.binary(id::CODEC_PRIVATE, p);
            }
            if let Some(d) = default_duration_ns {
                e.uint(id::DEFAULT_DURATION, d);
            }
            if kind == 2 {
                e.master(id::AUDIO, |a| {
                    a.float(id::SAMPLING_FREQUENCY, 48000.0);
                    a.uint(id::CHANNELS, 2);
                });
            }
        });
    }

    /// Arbitrary top-level element, e.g. chapters or attachments.
    pub fn element(mut self, element: u32, body: impl FnOnce(&mut ElementWriter)) -> Self {
        self.head.master(element, body);
        self
    }

    pub fn cluster(mut self, timecode: u64, blocks: &[BlockSpec]) -> Self {
        let mut w = ElementWriter::new();
        w.master(id::CLUSTER, |c| {
            c.uint(id::TIMECODE, timecode);
            for block in blocks {
                let flags = if block.key && block.duration.is_none() { 0x80 } else { 0 };
                let payload = block.body.clone().unwrap_or_else(|| {
                    block_payload(block.track, block.timecode, flags, block.lacing, &block.frames)
                });
                match block.duration {
                    Some(ticks) => c.master(id::BLOCK_GROUP, |g| {
                        g.binary(id::BLOCK, &payload);
                        g.uint(id::BLOCK_DURATION, ticks);
                    }),
                    None => c.binary(id::SIMPLE_BLOCK, &payload),
                }
            }
        });
        self.clusters.push((timecode, w.finish()));
        self
    }

    /// Regular clusters of one key block each, `step_ms` apart.
    pub fn clusters(mut self, track: u64, count: u64, step_ms: u64) -> Self {
        for i in 0..count {
            let payload = format!("frame {i}");
            self = self.cluster(i * step_ms, &[BlockSpec::new(track, 0, true, payload.as_bytes())]);
        }
        self
    }

    /// Emit a Cues element pointing at every cluster.
    pub fn with_cues(mut self) -> Self {
        self.cues = true;
        self
    }

    pub fn write(self, w: &mut ElementWriter) {
        let mut body = ElementWriter::new();
        body.raw(&self.head.finish());
        if !self.tracks.is_empty() {
            let entries = self.tracks.finish();
            body.master(id::TRACKS, |t| t.raw(&entries));
        }
        let mut positions = Vec::new();
        for (timecode, cluster) in &self.clusters {
            positions.push((*timecode, body.len() as u64));
            body.raw(cluster);
        }
        if self.cues {
            body.master(id::CUES, |c| {
                for (timecode, position) in &positions {
                    c.master(id::CUE_POINT, |p| {
                        p.uint(id::CUE_TIME, *timecode);
                        p.master(id::CUE_TRACK_POSITIONS, |t| {
                            t.uint(id::CUE_TRACK, 1);
                            t.uint(id::CUE_CLUSTER_POSITION, *position);
                        });
                    });
                }
            });
        }
        let body = body.finish();
        w.master(id::SEGMENT, |s| s.raw(&body));
    }

    /// Single-segment file bytes.
    pub fn file(self) -> Vec<u8> {
        let mut w = ElementWriter::new();
        w.ebml_header("matroska");
        self.write(&mut w);
        w.finish()
    }
}

/// One chapter atom for an edition.
pub fn chapter(w: &mut ElementWriter, uid: u64, start_ms: u64, end_ms: Option<u64>, segment: Option<u8>) {
    w.master(id::CHAPTER_ATOM, |a| {
        a.uint(id::CHAPTER_UID, uid);
        a.uint(id::CHAPTER_TIME_START, start_ms * 1_000_000);
        if let Some(end) = end_ms {
            a.uint(id::CHAPTER_TIME_END, end * 1_000_000);
        }
        if let Some(s) = segment {
            a.binary(id::CHAPTER_SEGMENT_UID, &[s; 16]);
        }
        a.master(id::CHAPTER_DISPLAY, |d| d.string(id::CHAP_STRING, &format!("Chapter {uid}")));
    });
}

/// Chapters element with one ordered edition.
pub fn ordered_edition(chapters: impl FnOnce(&mut ElementWriter)) -> impl FnOnce(&mut ElementWriter) {
    move |c: &mut ElementWriter| {
        c.master(id::EDITION_ENTRY, |e| {
            e.uint(id::EDITION_UID, 1);
            e.uint(id::EDITION_FLAG_ORDERED, 1);
            chapters(e);
        });
    }
}

pub fn source(bytes: Vec<u8>) -> Box<dyn ByteSource> {
    Box::new(Cursor::new(bytes))
}

pub fn open(bytes: Vec<u8>) -> (Demuxer, MemorySink) {
    open_with(bytes, DemuxConfig::default(), Vec::new())
}

pub fn open_with(bytes: Vec<u8>, config: DemuxConfig, siblings: Vec<(&str, Vec<u8>)>) -> (Demuxer, MemorySink) {
    let sink = MemorySink::new();
    let mut candidates: Vec<Candidate> = siblings
        .into_iter()
        .map(|(name, bytes)| Candidate {
            name: name.to_string(),
            source: source(bytes),
        })
        .collect();
    let demuxer = if candidates.is_empty() {
        Demuxer::open(source(bytes), "main.mkv", Box::new(sink.clone()), config, &mut NoSiblings)
    } else {
        Demuxer::open(source(bytes), "main.mkv", Box::new(sink.clone()), config, &mut candidates)
    }
    .unwrap();
    (demuxer, sink)
}

/// Step until end of stream, failing after `limit` steps.
pub fn drain(demuxer: &Demuxer, limit: usize) -> usize {
    use segmux_demux::DemuxOutcome;
    for steps in 0..limit {
        if demuxer.demux().unwrap() == DemuxOutcome::EndOfStream {
            return steps;
        }
    }
    panic!("no end of stream after {limit} steps");
}

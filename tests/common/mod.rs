//! Matroska fixture files for the command line tests.

#![allow(dead_code)]

use segmux_ebml::element as id;
use segmux_ebml::write::{block_payload, ElementWriter};
use segmux_ebml::Lacing;
use std::fs;
use std::path::{Path, PathBuf};

/// Segment layout of a fixture file.
pub struct Fixture {
    pub uid: u8,
    pub prev: Option<u8>,
    pub next: Option<u8>,
    pub frames: u64,
    pub step_ms: u64,
    pub ordered_chapters: Vec<(u64, u64, u64)>,
    pub cues: bool,
}

impl Fixture {
    pub fn plain(uid: u8, frames: u64) -> Self {
        Self {
            uid,
            prev: None,
            next: None,
            frames,
            step_ms: 100,
            ordered_chapters: Vec::new(),
            cues: true,
        }
    }

    pub fn linked(uid: u8, prev: Option<u8>, next: Option<u8>, frames: u64) -> Self {
        Self {
            prev,
            next,
            cues: false,
            ..Self::plain(uid, frames)
        }
    }

    /// Ordered chapters as `(uid, start_ms, end_ms)`.
    pub fn with_ordered_chapters(mut self, chapters: &[(u64, u64, u64)]) -> Self {
        self.ordered_chapters = chapters.to_vec();
        self
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut body = ElementWriter::new();
        body.master(id::INFO, |i| {
            i.binary(id::SEGMENT_UID, &[self.uid; 16]);
            if let Some(p) = self.prev {
                i.binary(id::PREV_UID, &[p; 16]);
            }
            if let Some(n) = self.next {
                i.binary(id::NEXT_UID, &[n; 16]);
            }
            i.uint(id::TIMECODE_SCALE, 1_000_000);
            i.float(id::DURATION, (self.frames * self.step_ms) as f64);
            i.string(id::TITLE, &format!("fixture {}", self.uid));
            i.string(id::MUXING_APP, "segmux fixtures");
            i.string(id::WRITING_APP, "segmux tests");
        });
        body.master(id::TRACKS, |t| {
            t.master(id::TRACK_ENTRY, |e| {
                e.uint(id::TRACK_NUMBER, 1);
                e.uint(id::TRACK_UID, 1);
                e.uint(id::TRACK_TYPE, 1);
                e.string(id::CODEC_ID, "V_MJPEG");
                e.uint(id::DEFAULT_DURATION, self.step_ms * 1_000_000);
            });
        });
        if !self.ordered_chapters.is_empty() {
            body.master(id::CHAPTERS, |c| {
                c.master(id::EDITION_ENTRY, |e| {
                    e.uint(id::EDITION_UID, 1);
                    e.uint(id::EDITION_FLAG_ORDERED, 1);
                    for (uid, start, end) in &self.ordered_chapters {
                        e.master(id::CHAPTER_ATOM, |a| {
                            a.uint(id::CHAPTER_UID, *uid);
                            a.uint(id::CHAPTER_TIME_START, start * 1_000_000);
                            a.uint(id::CHAPTER_TIME_END, end * 1_000_000);
                            a.master(id::CHAPTER_DISPLAY, |d| {
                                d.string(id::CHAP_STRING, &format!("Part {uid}"))
                            });
                        });
                    }
                });
            });
        }
        let mut positions = Vec::new();
        for i in 0..self.frames {
            let timecode = i * self.step_ms;
            positions.push((timecode, body.len() as u64));
            let payload = [0xA0 | (i as u8 & 0x0F), self.uid, 0x55, 0x66];
            body.master(id::CLUSTER, |c| {
                c.uint(id::TIMECODE, timecode);
                c.binary(id::SIMPLE_BLOCK, &block_payload(1, 0, 0x80, Lacing::None, &[payload]));
            });
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

        let mut w = ElementWriter::new();
        w.ebml_header("matroska");
        w.master(id::SEGMENT, |s| s.raw(&body));
        w.finish()
    }

    pub fn write_to(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, self.bytes()).unwrap();
        path
    }
}

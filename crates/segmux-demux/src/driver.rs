//! The demuxer: open, step, seek.

use crate::chapters::{compose, VirtualEdition};
use crate::config::DemuxConfig;
use crate::decoder::{decode_block, BlockTiming};
use crate::error::{DemuxError, Result};
use crate::io::ByteSource;
use crate::registry::{SegmentRegistry, SiblingSource};
use crate::sink::OutputSink;
use crate::timeline::{ChapterUpdate, VirtualSegment};
use crate::track::Track;
use parking_lot::Mutex;
use segmux_common::SegmentId;
use segmux_ebml::element::EBML_MAGIC;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{debug, info, trace, warn};

const UNSET: i64 = i64::MIN;

/// Result of one demux step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemuxOutcome {
    /// A block was decoded (or dropped as unmapped).
    Produced,
    /// The timeline moved without data; call again.
    Progressed,
    /// Nothing left to play.
    EndOfStream,
}

/// Everything a step or a seek mutates.
pub(crate) struct DemuxState {
    pub(crate) registry: SegmentRegistry,
    pub(crate) timeline: VirtualSegment,
    pub(crate) sink: Box<dyn OutputSink>,
    pub(crate) config: DemuxConfig,
    pub(crate) main: SegmentId,
    /// Segment whose tracks are bound and whose clusters are read.
    pub(crate) active: Option<SegmentId>,
    /// Virtual time of the last block read.
    pub(crate) pts: i64,
    /// Chapter updates wait until `pts` reaches this.
    pub(crate) start_pts: Option<i64>,
    /// Last published clock reference.
    pub(crate) pcr: Option<i64>,
    /// Physical to virtual translation of the current chapter.
    pub(crate) offset: i64,
    pub(crate) ended: bool,
}

/// A Matroska demuxer presenting linked segments as one timeline.
///
/// Steps and seeks may come from different threads; they serialize on
/// one lock. Duration, clock and start time are readable without it.
pub struct Demuxer {
    state: Mutex<DemuxState>,
    duration: AtomicI64,
    clock: AtomicI64,
    start: AtomicI64,
}

impl fmt::Debug for Demuxer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Demuxer")
            .field("duration", &self.duration())
            .field("clock", &self.clock())
            .field("start", &self.start_time())
            .finish_non_exhaustive()
    }
}

impl Demuxer {
    /// Open a stream, load linked segments and position at time zero.
    pub fn open(
        mut source: Box<dyn ByteSource>,
        name: &str,
        sink: Box<dyn OutputSink>,
        config: DemuxConfig,
        siblings: &mut dyn SiblingSource,
    ) -> Result<Self> {
        let mut magic = [0u8; 4];
        if source.peek_at(0, &mut magic)? != magic.len() || magic != EBML_MAGIC {
            return Err(DemuxError::NotMatroska);
        }

        let mut registry = SegmentRegistry::new();
        let stream = registry.analyze_stream(name, source)?;
        let main = registry
            .stream(stream)
            .and_then(|s| s.segments.first().copied())
            .ok_or_else(|| DemuxError::structural("no segment found"))?;

        let segment = registry
            .segment(main)
            .ok_or_else(|| DemuxError::structural("no segment found"))?;
        if !segment.has_media() && segment.editions.is_empty() {
            return Err(DemuxError::structural("cannot find any cluster or chapter"));
        }

        if registry.need_preload(stream) {
            if config.preload_local_dir {
                registry.preload_family(main, siblings);
            } else {
                warn!("file references other segments but preloading is disabled");
            }
        }

        let timeline = VirtualSegment::new(compose(&registry, main, &config))
            .ok_or_else(|| DemuxError::structural("cannot use the segment"))?;
        registry.free_unused(&timeline.segments_in_use());

        let mut state = DemuxState {
            registry,
            timeline,
            sink,
            config,
            main,
            active: None,
            pts: 0,
            start_pts: None,
            pcr: None,
            offset: 0,
            ended: false,
        };
        state.prepare_playback(0)?;

        let demuxer = Self {
            duration: AtomicI64::new(UNSET),
            clock: AtomicI64::new(UNSET),
            start: AtomicI64::new(UNSET),
            state: Mutex::new(state),
        };
        demuxer.publish(&demuxer.state.lock());
        info!(file = name, duration = ?demuxer.duration(), "opened");
        Ok(demuxer)
    }

    /// Perform one bounded step: at most one block is read.
    pub fn demux(&self) -> Result<DemuxOutcome> {
        let mut state = self.state.lock();
        let outcome = state.step();
        self.publish(&state);
        outcome
    }

    /// Seek to a virtual time in µs.
    pub fn seek_time(&self, time: i64) -> Result<()> {
        self.seek(Some(time), None)
    }

    /// Seek to a fraction of the duration.
    pub fn seek_fraction(&self, fraction: f64) -> Result<()> {
        self.seek(None, Some(fraction))
    }

    /// Seek by time, fraction, or both; the fraction wins when seeking by
    /// percentage is forced or the segment has no cues.
    pub fn seek(&self, time: Option<i64>, fraction: Option<f64>) -> Result<()> {
        let mut state = self.state.lock();
        let result = state.seek(time, fraction);
        self.publish(&state);
        result
    }

    /// Run `f` with the state locked, then refresh the mirrored scalars.
    pub(crate) fn with_state<T>(&self, f: impl FnOnce(&mut DemuxState) -> T) -> T {
        let mut state = self.state.lock();
        let value = f(&mut state);
        self.publish(&state);
        value
    }

    /// Duration of the current edition in µs.
    pub fn duration(&self) -> Option<i64> {
        load(&self.duration)
    }

    /// Last published clock reference in µs.
    pub fn clock(&self) -> Option<i64> {
        load(&self.clock)
    }

    /// Target of the last time-based seek in µs.
    pub fn start_time(&self) -> Option<i64> {
        load(&self.start)
    }

    /// Composed editions.
    pub fn editions(&self) -> Vec<VirtualEdition> {
        self.state.lock().timeline.editions().to_vec()
    }

    /// Index of the current edition.
    pub fn current_edition(&self) -> usize {
        self.state.lock().timeline.edition_index()
    }

    /// Tracks of the segment being read.
    pub fn tracks(&self) -> Vec<Track> {
        let state = self.state.lock();
        state
            .active
            .and_then(|id| state.registry.segment(id))
            .map(|s| s.tracks.clone())
            .unwrap_or_default()
    }

    fn publish(&self, state: &DemuxState) {
        store(&self.duration, state.timeline.duration());
        store(&self.clock, state.pcr);
        store(&self.start, state.start_pts);
    }
}

fn load(value: &AtomicI64) -> Option<i64> {
    match value.load(Ordering::Acquire) {
        UNSET => None,
        v => Some(v),
    }
}

fn store(value: &AtomicI64, v: Option<i64>) {
    value.store(v.unwrap_or(UNSET), Ordering::Release);
}

impl DemuxState {
    /// Select the chapter covering `start` and bind its segment.
    fn prepare_playback(&mut self, start: i64) -> Result<()> {
        let edition = self.timeline.edition();
        if edition.chapters.is_empty() {
            return Err(DemuxError::structural("cannot use the segment"));
        }
        let index = edition.chapter_at(start).unwrap_or(0);
        self.seek_to(start, Some(index), None)
    }

    fn step(&mut self) -> Result<DemuxOutcome> {
        if self.ended {
            return Ok(DemuxOutcome::EndOfStream);
        }

        if self.start_pts.map_or(true, |start| self.pts >= start) {
            match self.timeline.update_to(self.pts) {
                ChapterUpdate::Seek(index) => {
                    let target = self.timeline.edition().chapters[index].virtual_start;
                    debug!(chapter = index, target, "switching chapter");
                    self.seek_to(target, Some(index), None)?;
                    return Ok(DemuxOutcome::Progressed);
                }
                ChapterUpdate::Continued(index) => {
                    let chapter = &self.timeline.edition().chapters[index];
                    debug!(chapter = index, "entered contiguous chapter");
                    self.start_pts = Some(chapter.virtual_start);
                    self.offset = chapter.offset();
                }
                ChapterUpdate::Left => debug!(pts = self.pts, "left the last chapter"),
                ChapterUpdate::Unchanged => {}
            }
        }

        let Some(active) = self.active else {
            return self.end();
        };
        let Some(block) = self.registry.read_block(active)? else {
            let pending = self.timeline.chapter().map(|c| c.virtual_stop);
            let continues = if self.timeline.is_ordered() {
                pending.is_some()
            } else {
                self.timeline.has_following()
            };
            if let (true, Some(stop)) = (continues, pending) {
                self.pts = stop.saturating_add(1);
                return Ok(DemuxOutcome::Progressed);
            }
            return self.end();
        };

        let Some(segment) = self.registry.segment_mut(active) else {
            return self.end();
        };
        self.pts = segment.ticks_to_us(block.timecode) + self.offset;
        trace!(track = block.track_number, pts = self.pts, "block");

        let floor = segment
            .tracks
            .iter()
            .filter_map(Track::last_dts)
            .min();
        if let Some(floor) = floor {
            let advanced = self
                .pcr
                .map_or(true, |pcr| floor > pcr + self.config.clock_threshold_us);
            if advanced {
                self.pcr = Some(floor);
                self.sink.set_clock(floor);
            }
        }

        if self.timeline.is_ordered() && self.timeline.chapter().is_none() {
            return self.end();
        }

        let timing = BlockTiming {
            origin: Some(self.pts),
            duration_ticks: block.duration,
            segment_scale: segment.timecode_scale,
            start_threshold: self.start_pts,
        };
        match segment.track_mut(block.track_number) {
            Some(track) => {
                decode_block(track, &block, &timing, self.sink.as_mut());
            }
            None => warn!(track = block.track_number, "block for unknown track, dropped"),
        }
        Ok(DemuxOutcome::Produced)
    }

    fn end(&mut self) -> Result<DemuxOutcome> {
        if !self.ended {
            debug!(pts = self.pts, "end of stream");
        }
        self.ended = true;
        Ok(DemuxOutcome::EndOfStream)
    }

    /// Unbind the current segment's tracks and bind `id`'s.
    pub(crate) fn activate(&mut self, id: SegmentId) {
        if self.active == Some(id) {
            return;
        }
        if let Some(old) = self.active.and_then(|old| self.registry.segment_mut(old)) {
            for track in &mut old.tracks {
                track.unbind(self.sink.as_mut());
            }
        }
        if let Some(segment) = self.registry.segment_mut(id) {
            for track in &mut segment.tracks {
                if track.bind(self.sink.as_mut()).is_none() && !track.is_supported() {
                    warn!(track = track.number, compression = ?track.compression, "unsupported track compression");
                }
            }
            debug!(segment = id.index(), tracks = segment.tracks.len(), "segment activated");
        }
        self.active = Some(id);
    }
}

//! Mapping time or fraction targets onto the virtual timeline.

use crate::driver::DemuxState;
use crate::error::{DemuxError, Result};
use tracing::debug;

impl DemuxState {
    /// Seek by absolute virtual time, by fraction of the duration, or both.
    ///
    /// Rejected requests leave the position untouched.
    pub(crate) fn seek(&mut self, time: Option<i64>, fraction: Option<f64>) -> Result<()> {
        let time = time.filter(|t| *t >= 0);
        let fraction = fraction.filter(|f| *f >= 0.0);
        if time.is_none() && fraction.is_none() {
            return Err(DemuxError::SeekRejected("no valid seek target"));
        }
        if fraction.is_some_and(|f| f > 1.0) {
            return Err(DemuxError::SeekRejected("position beyond the end"));
        }
        let duration = self
            .timeline
            .duration()
            .filter(|d| *d > 0)
            .ok_or(DemuxError::SeekRejected("duration unknown"))?;
        let active = self
            .active
            .ok_or(DemuxError::SeekRejected("no active segment"))?;
        let segment = self
            .registry
            .segment(active)
            .ok_or(DemuxError::SeekRejected("segment released"))?;

        let has_cues = !segment.cues.is_empty();
        let mut target = time.unwrap_or(0);
        let mut global_position = None;

        if let Some(fraction) = fraction {
            if self.config.seek_percent || !has_cues || time.is_none() {
                target = (fraction * duration as f64) as i64;
                if !has_cues {
                    let stream_size = self.registry.stream_size(active);
                    let position = (fraction * stream_size as f64) as u64;
                    let entry = segment
                        .index
                        .iter()
                        .find(|e| e.position >= position)
                        .or(segment.index.last());
                    if entry.is_some_and(|e| e.position < position) {
                        global_position = Some(position);
                    }
                }
            }
        }

        debug!(target, ?global_position, "seek");
        self.seek_to(target, None, global_position)
    }

    /// Move the timeline to `target`, switching segment when the chapter
    /// covering it lives elsewhere.
    ///
    /// With `global_position` the byte stream resyncs there instead of
    /// using the indexes, and chapter updates resume immediately. A failed
    /// resync leaves the current position in place.
    pub(crate) fn seek_to(&mut self, target: i64, chapter: Option<usize>, global_position: Option<u64>) -> Result<()> {
        let edition = self.timeline.edition();
        let index = chapter
            .or_else(|| edition.chapter_at(target))
            .or_else(|| {
                let first = edition.chapters.first()?;
                Some(if target < first.virtual_start { 0 } else { edition.chapters.len() - 1 })
            })
            .ok_or(DemuxError::SeekRejected("edition has no chapters"))?;
        let chapter = edition
            .chapters
            .get(index)
            .ok_or(DemuxError::SeekRejected("chapter out of range"))?;
        let segment_id = chapter.segment;
        let offset = chapter.offset();

        let saved = self
            .registry
            .segment(segment_id)
            .map(|segment| segment.reader.clone())
            .ok_or(DemuxError::SeekRejected("segment released"))?;
        if let Some(position) = global_position {
            if let Err(err) = self.registry.resync(segment_id, position) {
                if let Some(segment) = self.registry.segment_mut(segment_id) {
                    segment.reader = saved;
                }
                return Err(err);
            }
        }

        self.activate(segment_id);
        self.offset = offset;
        self.timeline.set_chapter(Some(index));
        self.ended = false;
        self.pcr = None;
        self.sink.reset_clock();

        let segment = self
            .registry
            .segment_mut(segment_id)
            .ok_or(DemuxError::SeekRejected("segment released"))?;
        for track in &mut segment.tracks {
            track.reset_decode_state();
        }

        if global_position.is_some() {
            self.start_pts = None;
        } else {
            let physical = target - offset;
            if let Some(cue) = segment.cue_before(physical) {
                segment.reader.seek_cluster(cue.position);
            } else if let Some(entry) = segment.index_before(physical) {
                segment.reader.seek_cluster(entry.position);
            } else {
                segment.rewind();
            }
            self.start_pts = Some(target);
        }
        self.pts = target;
        debug!(target, chapter = index, segment = segment_id.index(), "positioned");
        Ok(())
    }
}

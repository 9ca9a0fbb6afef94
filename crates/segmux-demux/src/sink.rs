//! Output sink: where decoded frames and clock references go.

use crate::track::Track;
use bytes::Bytes;
use parking_lot::Mutex;
use segmux_common::EsId;
use std::collections::HashSet;
use std::sync::Arc;

/// Per-frame flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameFlags {
    /// Frame is a random access point.
    pub key: bool,
    /// Codec initialization payload sent before the first frame.
    pub header: bool,
    /// Frame precedes the seek target and should be decoded but not shown.
    pub preroll: bool,
    /// First frame after a seek or a timeline jump.
    pub discontinuity: bool,
}

/// One elementary frame with its timestamps, in microseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub data: Bytes,
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    pub duration: Option<i64>,
    /// Audio sample count, when the codec needs it.
    pub samples: Option<u32>,
    pub flags: FrameFlags,
}

impl Frame {
    /// Frame with no timestamps.
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            pts: None,
            dts: None,
            duration: None,
            samples: None,
            flags: FrameFlags::default(),
        }
    }
}

/// Consumer of demuxed output.
pub trait OutputSink: Send {
    /// Announce a track; `None` leaves the track unbound (never decoded).
    fn add_track(&mut self, track: &Track) -> Option<EsId>;

    /// Withdraw a previously announced track.
    fn remove_track(&mut self, es: EsId);

    /// Whether the consumer currently wants frames for `es`.
    fn is_active(&mut self, es: EsId) -> bool;

    /// Deliver one frame.
    fn send(&mut self, es: EsId, frame: Frame);

    /// Publish a new clock reference.
    fn set_clock(&mut self, clock: i64);

    /// Forget the clock after a seek.
    fn reset_clock(&mut self) {}
}

/// Everything a [`MemorySink`] has received.
#[derive(Debug, Default, Clone)]
pub struct Recorded {
    pub tracks: Vec<(EsId, u64, String)>,
    pub removed: Vec<EsId>,
    pub frames: Vec<(EsId, Frame)>,
    pub clocks: Vec<i64>,
    pub clock_resets: usize,
}

impl Recorded {
    /// Frames sent to one track.
    pub fn frames_for(&self, es: EsId) -> impl Iterator<Item = &Frame> {
        self.frames.iter().filter(move |(id, _)| *id == es).map(|(_, f)| f)
    }

    /// Handle announced for a track number.
    pub fn es_for_track(&self, number: u64) -> Option<EsId> {
        self.tracks
            .iter()
            .rev()
            .find(|(_, n, _)| *n == number)
            .map(|(es, _, _)| *es)
    }
}

/// Sink recording into shared memory; clones observe the same record.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    recorded: Arc<Mutex<Recorded>>,
    inactive: Arc<Mutex<HashSet<u64>>>,
    next_es: Arc<Mutex<u32>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything received so far.
    pub fn recorded(&self) -> Recorded {
        self.recorded.lock().clone()
    }

    /// Drop frames and clocks received so far.
    pub fn clear_frames(&self) {
        let mut recorded = self.recorded.lock();
        recorded.frames.clear();
        recorded.clocks.clear();
    }

    /// Mark a track number as deselected by the consumer.
    pub fn deactivate_track(&self, number: u64) {
        self.inactive.lock().insert(number);
    }

    /// Re-select a track number.
    pub fn activate_track(&self, number: u64) {
        self.inactive.lock().remove(&number);
    }

    fn track_number(&self, es: EsId) -> Option<u64> {
        self.recorded
            .lock()
            .tracks
            .iter()
            .find(|(id, _, _)| *id == es)
            .map(|(_, n, _)| *n)
    }
}

impl OutputSink for MemorySink {
    fn add_track(&mut self, track: &Track) -> Option<EsId> {
        let mut next = self.next_es.lock();
        let es = EsId::new(*next);
        *next += 1;
        self.recorded
            .lock()
            .tracks
            .push((es, track.number, track.codec_id.clone()));
        Some(es)
    }

    fn remove_track(&mut self, es: EsId) {
        self.recorded.lock().removed.push(es);
    }

    fn is_active(&mut self, es: EsId) -> bool {
        match self.track_number(es) {
            Some(number) => !self.inactive.lock().contains(&number),
            None => false,
        }
    }

    fn send(&mut self, es: EsId, frame: Frame) {
        self.recorded.lock().frames.push((es, frame));
    }

    fn set_clock(&mut self, clock: i64) {
        self.recorded.lock().clocks.push(clock);
    }

    fn reset_clock(&mut self) {
        self.recorded.lock().clock_resets += 1;
    }
}

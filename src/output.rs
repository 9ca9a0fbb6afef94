//! Printing demuxed output and probe results.

use crate::config::OutputConfig;
use segmux_common::EsId;
use segmux_demux::{Demuxer, Frame, Meta, OutputSink, Track, TrackKind};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Summary of an opened file.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub file: String,
    /// µs; absent when no segment declares a duration.
    pub duration_us: Option<i64>,
    pub editions: usize,
    pub current_edition: usize,
    pub tracks: Vec<TrackReport>,
    pub meta: Option<Meta>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackReport {
    pub number: u64,
    pub kind: TrackKind,
    pub codec_id: String,
    pub language: String,
    pub name: Option<String>,
    pub default: bool,
    pub fps: Option<f64>,
}

impl From<&Track> for TrackReport {
    fn from(track: &Track) -> Self {
        Self {
            number: track.number,
            kind: track.kind,
            codec_id: track.codec_id.clone(),
            language: track.language.clone(),
            name: track.name.clone(),
            default: track.default,
            fps: track.fps(),
        }
    }
}

impl ProbeReport {
    pub fn collect(file: &str, demuxer: &Demuxer, meta: Option<Meta>) -> Self {
        Self {
            file: file.to_string(),
            duration_us: demuxer.duration(),
            editions: demuxer.editions().len(),
            current_edition: demuxer.current_edition(),
            tracks: demuxer.tracks().iter().map(TrackReport::from).collect(),
            meta,
        }
    }
}

/// One frame as printed by the `demux` command.
#[derive(Debug, Clone, Serialize)]
pub struct FrameReport {
    pub track: u64,
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    pub duration: Option<i64>,
    pub size: usize,
    pub key: bool,
    pub header: bool,
    pub preroll: bool,
    pub discontinuity: bool,
    pub preview: String,
}

impl FrameReport {
    pub fn new(track: u64, frame: &Frame, preview_bytes: usize) -> Self {
        Self {
            track,
            pts: frame.pts,
            dts: frame.dts,
            duration: frame.duration,
            size: frame.data.len(),
            key: frame.flags.key,
            header: frame.flags.header,
            preroll: frame.flags.preroll,
            discontinuity: frame.flags.discontinuity,
            preview: hex_preview(&frame.data, preview_bytes),
        }
    }

    /// Single-line text form.
    pub fn to_line(&self) -> String {
        let mut line = format!(
            "track {} pts {} dts {} size {}",
            self.track,
            format_us(self.pts),
            format_us(self.dts),
            self.size
        );
        for (set, tag) in [
            (self.key, "key"),
            (self.header, "header"),
            (self.preroll, "preroll"),
            (self.discontinuity, "discontinuity"),
        ] {
            if set {
                line.push_str(" [");
                line.push_str(tag);
                line.push(']');
            }
        }
        if !self.preview.is_empty() {
            line.push_str("  ");
            line.push_str(&self.preview);
        }
        line
    }
}

/// Lowercase hex of the first `limit` bytes.
pub fn hex_preview(data: &[u8], limit: usize) -> String {
    let shown = &data[..data.len().min(limit)];
    let mut out = hex::encode(shown);
    if data.len() > limit && limit > 0 {
        out.push_str("...");
    }
    out
}

/// `h:mm:ss.uuuuuu`, or `-` when unset.
pub fn format_us(value: Option<i64>) -> String {
    match value {
        None => "-".to_string(),
        Some(us) => {
            let sign = if us < 0 { "-" } else { "" };
            let us = us.unsigned_abs();
            let secs = us / 1_000_000;
            format!(
                "{}{}:{:02}:{:02}.{:06}",
                sign,
                secs / 3600,
                (secs / 60) % 60,
                secs % 60,
                us % 1_000_000
            )
        }
    }
}

/// Sink printing every frame to stdout.
#[derive(Debug)]
pub struct PrintSink {
    json: bool,
    preview_bytes: usize,
    show_preroll: bool,
    tracks: HashMap<EsId, u64>,
    next_es: u32,
    printed: Arc<AtomicUsize>,
}

impl PrintSink {
    pub fn new(config: &OutputConfig, json: bool) -> Self {
        Self {
            json,
            preview_bytes: config.preview_bytes,
            show_preroll: config.show_preroll,
            tracks: HashMap::new(),
            next_es: 0,
            printed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counter of printed frames, shared with the demux loop.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.printed)
    }

    /// Render a frame, or `None` when it is filtered out.
    pub fn render(&self, es: EsId, frame: &Frame) -> Option<String> {
        if frame.flags.preroll && !self.show_preroll {
            return None;
        }
        let track = self.tracks.get(&es).copied()?;
        let report = FrameReport::new(track, frame, self.preview_bytes);
        if self.json {
            serde_json::to_string(&report).ok()
        } else {
            Some(report.to_line())
        }
    }
}

impl OutputSink for PrintSink {
    fn add_track(&mut self, track: &Track) -> Option<EsId> {
        let es = EsId::new(self.next_es);
        self.next_es += 1;
        self.tracks.insert(es, track.number);
        tracing::debug!("Track {} ({}) bound as {}", track.number, track.codec_id, es);
        Some(es)
    }

    fn remove_track(&mut self, es: EsId) {
        self.tracks.remove(&es);
    }

    fn is_active(&mut self, es: EsId) -> bool {
        self.tracks.contains_key(&es)
    }

    fn send(&mut self, es: EsId, frame: Frame) {
        if let Some(line) = self.render(es, &frame) {
            println!("{}", line);
            self.printed.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn set_clock(&mut self, clock: i64) {
        tracing::trace!("Clock {}", format_us(Some(clock)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn bound_sink(config: &OutputConfig, json: bool) -> (PrintSink, EsId) {
        let mut sink = PrintSink::new(config, json);
        let es = EsId::new(0);
        sink.tracks.insert(es, 2);
        sink.next_es = 1;
        (sink, es)
    }

    fn frame(preroll: bool) -> Frame {
        let mut frame = Frame::new(Bytes::from_static(b"\x01\x02\x03\x04\x05"));
        frame.pts = Some(1_500_000);
        frame.dts = Some(1_500_000);
        frame.flags.key = true;
        frame.flags.preroll = preroll;
        frame
    }

    #[test]
    fn test_hex_preview_truncates() {
        assert_eq!(hex_preview(b"\xab\xcd\xef", 2), "abcd...");
        assert_eq!(hex_preview(b"\xab", 4), "ab");
        assert_eq!(hex_preview(b"\xab", 0), "");
    }

    #[test]
    fn test_format_us() {
        assert_eq!(format_us(None), "-");
        assert_eq!(format_us(Some(3_723_000_001)), "1:02:03.000001");
        assert_eq!(format_us(Some(-500_000)), "-0:00:00.500000");
    }

    #[test]
    fn test_text_line() {
        let (sink, es) = bound_sink(&OutputConfig::default(), false);
        let line = sink.render(es, &frame(false)).unwrap();
        assert_eq!(line, "track 2 pts 0:00:01.500000 dts 0:00:01.500000 size 5 [key]  0102030405");
    }

    #[test]
    fn test_json_line() {
        let (sink, es) = bound_sink(&OutputConfig::default(), true);
        let line = sink.render(es, &frame(false)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["track"], 2);
        assert_eq!(value["pts"], 1_500_000);
        assert_eq!(value["size"], 5);
        assert_eq!(value["preview"], "0102030405");
    }

    #[test]
    fn test_preroll_hidden_when_disabled() {
        let config = OutputConfig {
            show_preroll: false,
            ..OutputConfig::default()
        };
        let (mut sink, es) = bound_sink(&config, false);
        assert!(sink.render(es, &frame(true)).is_none());

        sink.send(es, frame(false));
        assert_eq!(sink.counter().load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_unknown_handle_is_dropped() {
        let (mut sink, _) = bound_sink(&OutputConfig::default(), false);
        assert!(sink.render(EsId::new(9), &frame(false)).is_none());
        sink.remove_track(EsId::new(0));
        assert!(!sink.is_active(EsId::new(0)));
    }
}

//! Block decoding: one container block in, timestamped frames out.

pub(crate) mod codec;
pub(crate) mod compression;

use crate::sink::{Frame, OutputSink};
use crate::track::{Compression, TimestampMode, Track, TrackKind};
use bytes::Bytes;
use codec::{dts_frame_size, opus_samples, wavpack_packet, CodecStrategy};
use compression::{inflate, restore_header};
use segmux_ebml::RawBlock;
use tracing::{debug, trace, warn};

/// Timing context of one block.
#[derive(Debug, Clone, Copy)]
pub struct BlockTiming {
    /// Virtual presentation time of the first frame (µs).
    pub origin: Option<i64>,
    /// BlockDuration in segment ticks.
    pub duration_ticks: Option<u64>,
    /// Segment nanoseconds per tick.
    pub segment_scale: u64,
    /// Frames before this time are flagged as preroll.
    pub start_threshold: Option<i64>,
}

/// What happened to one block.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DecodeStats {
    /// Frames handed to the sink (codec headers excluded).
    pub frames: usize,
    /// Frames dropped because their payload could not be rebuilt.
    pub dropped: usize,
    /// A lace overran the block and the remaining frames were skipped.
    pub truncated: bool,
}

/// Decode every frame of `block` for `track` and send it to `sink`.
///
/// Unbound tracks are ignored. Inactive tracks lose their activation and
/// decode state so the codec header is resent when they come back.
pub fn decode_block(
    track: &mut Track,
    block: &RawBlock,
    timing: &BlockTiming,
    sink: &mut dyn OutputSink,
) -> DecodeStats {
    let mut stats = DecodeStats::default();
    let Some(es) = track.es else {
        return stats;
    };
    let mut origin = timing.origin.map(|o| o - track.codec_delay);

    if !sink.is_active(es) {
        track.inited = false;
        if matches!(track.kind, TrackKind::Video | TrackKind::Audio) {
            track.last_dts = None;
        }
        return stats;
    }

    if !track.inited {
        if let Some(init) = track.init_data.clone() {
            debug!(track = track.number, bytes = init.len(), "sending codec header");
            let mut header = Frame::new(init);
            header.flags.header = true;
            sink.send(es, header);
        }
        track.inited = true;
    }

    let frame_count = block.frames.len().max(1);
    let duration = timing.duration_ticks.map(|ticks| {
        (ticks as f64 * track.timecode_scale * timing.segment_scale as f64
            / (1000.0 * frame_count as f64)) as i64
    });
    let declared = block.declared_size();
    let mut consumed = 0usize;

    for (index, span) in block.frames.iter().enumerate() {
        consumed = consumed.saturating_add(span.len);
        let data = match block.frame(index) {
            Some(data) if consumed <= declared => data,
            _ => {
                warn!(track = track.number, frame = index, "cannot read frame (too long or no frame)");
                stats.truncated = true;
                break;
            }
        };

        match rebuild_payload(track, data) {
            Some(payload) => stats.frames += emit(track, es, payload, origin, duration, block, timing, sink),
            None => stats.dropped += 1,
        }
        origin = next_origin(track, origin);
    }

    trace!(track = track.number, frames = stats.frames, "decoded block");
    stats
}

/// Undo content compression and codec-level framing.
fn rebuild_payload(track: &Track, data: Bytes) -> Option<Bytes> {
    let data = match (&track.compression, &track.strategy) {
        (Compression::HeaderStrip(prefix), _) => restore_header(prefix, &data),
        (_, CodecStrategy::WavPack { version }) => match wavpack_packet(*version, &data) {
            Some(packet) => packet,
            None => {
                warn!(track = track.number, "wavpack frame too short");
                return None;
            }
        },
        _ => data,
    };
    if track.compression == Compression::Zlib {
        return match inflate(&data) {
            Ok(inflated) => Some(inflated),
            Err(e) => {
                warn!(track = track.number, error = %e, "dropping undecompressable frame");
                None
            }
        };
    }
    Some(data)
}

#[allow(clippy::too_many_arguments)]
fn emit(
    track: &mut Track,
    es: segmux_common::EsId,
    mut payload: Bytes,
    origin: Option<i64>,
    duration: Option<i64>,
    block: &RawBlock,
    timing: &BlockTiming,
    sink: &mut dyn OutputSink,
) -> usize {
    let mut samples = None;
    match &mut track.strategy {
        CodecStrategy::RealAudio(state) => {
            if track.last_dts.is_none() {
                state.reset();
            }
            if state.is_idle() {
                if let Some(pts) = origin {
                    track.last_dts = Some(track.last_dts.map_or(pts, |last| last.max(pts)));
                }
            }
            let ready = state.push(&payload, origin);
            let count = ready.len();
            for (data, pts) in ready {
                let mut frame = Frame::new(data);
                frame.pts = pts;
                frame.dts = pts;
                frame.flags.key = block.key;
                sink.send(es, frame);
            }
            return count;
        }
        CodecStrategy::DtsTrim if payload.len() > 6 => {
            if let Some(size) = dts_frame_size(&payload) {
                if size < payload.len() {
                    payload.truncate(size);
                }
            }
        }
        CodecStrategy::OpusSamples => {
            samples = timing.duration_ticks.map(|ticks| {
                opus_samples(
                    ticks,
                    track.timecode_scale,
                    timing.segment_scale,
                    track.sampling_frequency.unwrap_or(48_000.0),
                )
            });
        }
        _ => {}
    }

    let (pts, dts) = stamp(track, origin, block.key, block.discardable);
    let mut frame = Frame::new(payload);
    frame.pts = pts;
    frame.dts = dts;
    frame.duration = duration;
    frame.samples = samples;
    frame.flags.key = block.key;
    frame.flags.preroll = matches!((origin, timing.start_threshold), (Some(t), Some(start)) if t < start);
    frame.flags.discontinuity = std::mem::take(&mut track.discontinuity);

    if let Some(dts) = dts {
        if matches!(track.kind, TrackKind::Video | TrackKind::Audio) {
            track.last_dts = Some(track.last_dts.map_or(dts, |last| last.max(dts)));
        }
    }
    sink.send(es, frame);
    1
}

/// Presentation and decode timestamps under the track's regime.
fn stamp(track: &Track, origin: Option<i64>, key: bool, discardable: bool) -> (Option<i64>, Option<i64>) {
    match track.timestamp_mode {
        TimestampMode::DecodeOnly => (None, origin),
        TimestampMode::PresentationOnly => (origin, origin),
        TimestampMode::Reorder => {
            let dts = match (origin, track.last_dts) {
                (Some(pts), Some(last)) if !key && !discardable => {
                    Some(pts.min(last + track.default_duration.unwrap_or(0)))
                }
                _ => origin,
            };
            (origin, dts)
        }
    }
}

/// Origin of the next laced frame.
fn next_origin(track: &Track, origin: Option<i64>) -> Option<i64> {
    match (origin, track.default_duration) {
        (Some(o), Some(d)) => Some(o + d),
        (Some(o), None) if track.kind == TrackKind::Video => Some(o + 1),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use segmux_ebml::write::block_payload;
    use segmux_ebml::{Lacing, TrackEntry};

    fn track(track_type: u64, codec: &str, default_duration: Option<u64>) -> Track {
        Track::from_entry(&TrackEntry {
            number: 1,
            track_type,
            codec_id: codec.into(),
            default_duration,
            ..Default::default()
        })
    }

    fn block<F: AsRef<[u8]>>(key: bool, frames: &[F]) -> RawBlock {
        let flags = if key { 0x80 } else { 0 };
        let payload = block_payload(1, 0, flags, Lacing::Xiph, frames);
        RawBlock::parse(Bytes::from(payload), 0, true).unwrap()
    }

    fn timing(origin: i64) -> BlockTiming {
        BlockTiming {
            origin: Some(origin),
            duration_ticks: None,
            segment_scale: 1_000_000,
            start_threshold: None,
        }
    }

    #[test]
    fn test_laced_audio_advances_by_default_duration() {
        let mut sink = MemorySink::new();
        let mut t = track(2, "A_VORBIS", Some(20_000_000));
        let es = t.bind(&mut sink).unwrap();

        let stats = decode_block(&mut t, &block(true, &[b"a", b"b", b"c"]), &timing(1000), &mut sink);
        assert_eq!(stats.frames, 3);

        let recorded = sink.recorded();
        let pts: Vec<_> = recorded.frames_for(es).map(|f| f.pts).collect();
        assert_eq!(pts, vec![Some(1000), Some(21_000), Some(41_000)]);
        assert_eq!(t.last_dts(), Some(41_000));
    }

    #[test]
    fn test_unknown_duration_invalidates_audio_origin() {
        let mut sink = MemorySink::new();
        let mut t = track(2, "A_VORBIS", None);
        let es = t.bind(&mut sink).unwrap();
        decode_block(&mut t, &block(true, &[b"a", b"b"]), &timing(500), &mut sink);
        let pts: Vec<_> = sink.recorded().frames_for(es).map(|f| f.pts).collect();
        assert_eq!(pts, vec![Some(500), None]);
    }

    #[test]
    fn test_video_without_duration_advances_one_tick() {
        let mut sink = MemorySink::new();
        let mut t = track(1, "V_VP9", None);
        let es = t.bind(&mut sink).unwrap();
        decode_block(&mut t, &block(true, &[b"a", b"b"]), &timing(500), &mut sink);
        let pts: Vec<_> = sink.recorded().frames_for(es).map(|f| f.pts).collect();
        assert_eq!(pts, vec![Some(500), Some(501)]);
    }

    #[test]
    fn test_reorder_regime_reconstructs_dts() {
        let mut sink = MemorySink::new();
        let mut t = track(1, "V_MPEG4/ISO/AVC", Some(40_000_000));
        let es = t.bind(&mut sink).unwrap();

        decode_block(&mut t, &block(true, &[b"I"]), &timing(0), &mut sink);
        decode_block(&mut t, &block(false, &[b"P"]), &timing(120_000), &mut sink);
        decode_block(&mut t, &block(false, &[b"B"]), &timing(40_000), &mut sink);

        let frames: Vec<_> = sink.recorded().frames_for(es).cloned().collect();
        assert_eq!(frames[1].pts, Some(120_000));
        assert_eq!(frames[1].dts, Some(40_000));
        assert_eq!(frames[2].dts, Some(40_000));
    }

    #[test]
    fn test_codec_delay_and_decode_only() {
        let mut sink = MemorySink::new();
        let mut t = track(1, "V_MS/VFW/FOURCC", None);
        t.codec_delay = 100;
        let es = t.bind(&mut sink).unwrap();
        decode_block(&mut t, &block(true, &[b"x"]), &timing(1000), &mut sink);
        let frame = sink.recorded().frames_for(es).next().cloned().unwrap();
        assert_eq!(frame.pts, None);
        assert_eq!(frame.dts, Some(900));
    }

    #[test]
    fn test_init_data_sent_once_per_activation() {
        let mut sink = MemorySink::new();
        let mut t = Track::from_entry(&TrackEntry {
            number: 1,
            track_type: 1,
            codec_id: "V_MPEG2".into(),
            codec_private: vec![0, 0, 1, 0xB3],
            ..Default::default()
        });
        let es = t.bind(&mut sink).unwrap();

        decode_block(&mut t, &block(true, &[b"a"]), &timing(0), &mut sink);
        decode_block(&mut t, &block(true, &[b"b"]), &timing(40), &mut sink);
        sink.deactivate_track(1);
        decode_block(&mut t, &block(true, &[b"c"]), &timing(80), &mut sink);
        assert_eq!(t.last_dts(), None);
        sink.activate_track(1);
        decode_block(&mut t, &block(true, &[b"d"]), &timing(120), &mut sink);

        let headers = sink.recorded().frames_for(es).filter(|f| f.flags.header).count();
        let frames = sink.recorded().frames_for(es).filter(|f| !f.flags.header).count();
        assert_eq!(headers, 2);
        assert_eq!(frames, 3);
    }

    #[test]
    fn test_overrun_delivers_partial_block() {
        let mut sink = MemorySink::new();
        let mut t = track(2, "A_AAC", Some(20_000_000));
        t.bind(&mut sink).unwrap();
        // xiph lace: first frame claims 3 bytes, then 1-byte first frame of a 3-frame lace
        let data = vec![0x81, 0x00, 0x00, 0x82, 0x02, 1, 200, b'a', b'b', b'c'];
        let block = RawBlock::parse(Bytes::from(data), 0, true).unwrap();
        let stats = decode_block(&mut t, &block, &timing(0), &mut sink);
        assert_eq!(stats.frames, 1);
        assert!(stats.truncated);
    }

    #[test]
    fn test_header_strip_and_zlib() {
        use flate2::write::ZlibEncoder;
        use std::io::Write;

        let mut sink = MemorySink::new();
        let mut t = track(2, "A_AC3", None);
        t.compression = Compression::HeaderStrip(Bytes::from_static(b"\x0B\x77"));
        let es = t.bind(&mut sink).unwrap();
        decode_block(&mut t, &block(true, &[b"xyz"]), &timing(0), &mut sink);
        assert_eq!(&sink.recorded().frames_for(es).next().unwrap().data[..], b"\x0B\x77xyz");

        let mut sink = MemorySink::new();
        let mut t = track(0x11, "S_TEXT/UTF8", None);
        t.compression = Compression::Zlib;
        let es = t.bind(&mut sink).unwrap();
        let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"hello").unwrap();
        let good = encoder.finish().unwrap();
        let stats = decode_block(&mut t, &block(true, &[&b"garbage"[..], &good[..]]), &timing(0), &mut sink);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.frames, 1);
        assert_eq!(&sink.recorded().frames_for(es).next().unwrap().data[..], b"hello");
    }

    #[test]
    fn test_preroll_and_discontinuity_flags() {
        let mut sink = MemorySink::new();
        let mut t = track(2, "A_AAC", Some(20_000_000));
        let es = t.bind(&mut sink).unwrap();
        t.reset_decode_state();
        let mut before = timing(0);
        before.start_threshold = Some(30_000);
        decode_block(&mut t, &block(true, &[b"a", b"b"]), &before, &mut sink);
        let flags: Vec<_> = sink.recorded().frames_for(es).map(|f| f.flags).collect();
        assert!(flags[0].preroll && flags[0].discontinuity);
        assert!(flags[1].preroll && !flags[1].discontinuity);
    }

    #[test]
    fn test_unbound_track_is_ignored() {
        let mut sink = MemorySink::new();
        let mut t = track(2, "A_AAC", None);
        let stats = decode_block(&mut t, &block(true, &[b"a"]), &timing(0), &mut sink);
        assert_eq!(stats, DecodeStats::default());
        assert!(sink.recorded().frames.is_empty());
    }
}

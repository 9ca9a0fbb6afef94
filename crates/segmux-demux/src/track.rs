//! Tracks as the demuxer sees them: codec metadata plus decode cursor.

use crate::decoder::codec::CodecStrategy;
use crate::decoder::compression::inflate;
use crate::sink::OutputSink;
use bytes::Bytes;
use segmux_common::time::ns_to_us;
use segmux_common::EsId;
use segmux_ebml::model::track_type;
use segmux_ebml::TrackEntry;
use tracing::warn;

/// Elementary stream category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum TrackKind {
    Video,
    Audio,
    Subtitle,
    Other,
}

impl TrackKind {
    fn from_type(value: u64) -> Self {
        match value {
            track_type::VIDEO | track_type::COMPLEX => TrackKind::Video,
            track_type::AUDIO => TrackKind::Audio,
            track_type::SUBTITLE => TrackKind::Subtitle,
            _ => TrackKind::Other,
        }
    }
}

/// How block timestamps map to frame pts/dts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum TimestampMode {
    /// Only a decode timestamp is known (VfW-style video).
    DecodeOnly,
    /// Presentation and decode order agree.
    PresentationOnly,
    /// Frames may be reordered; decode time is reconstructed.
    Reorder,
}

/// Frame-level content compression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compression {
    None,
    Zlib,
    /// Bytes removed from the start of every frame by the muxer.
    HeaderStrip(Bytes),
    /// bzlib, lzo or encryption: the track cannot be demuxed.
    Unsupported(u64),
}

const SCOPE_FRAMES: u64 = 1;
const SCOPE_PRIVATE: u64 = 2;
const ALGO_ZLIB: u64 = 0;
const ALGO_HEADER_STRIP: u64 = 3;

/// One elementary stream of a segment.
#[derive(Debug, Clone)]
pub struct Track {
    pub number: u64,
    pub uid: u64,
    pub kind: TrackKind,
    pub codec_id: String,
    pub codec_private: Bytes,
    pub name: Option<String>,
    pub language: String,
    pub enabled: bool,
    pub default: bool,
    /// Nominal frame duration in µs.
    pub default_duration: Option<i64>,
    /// Nominal frame duration in ns, as stored.
    pub default_duration_ns: Option<u64>,
    /// Codec delay in µs.
    pub codec_delay: i64,
    pub timecode_scale: f64,
    pub sampling_frequency: Option<f64>,
    pub channels: Option<u64>,
    pub pixel_size: Option<(u64, u64)>,
    pub compression: Compression,
    pub(crate) strategy: CodecStrategy,
    pub(crate) timestamp_mode: TimestampMode,
    pub(crate) init_data: Option<Bytes>,
    pub(crate) es: Option<EsId>,
    pub(crate) inited: bool,
    pub(crate) last_dts: Option<i64>,
    pub(crate) discontinuity: bool,
}

impl Track {
    /// Build a track from its parsed entry, choosing codec handling.
    pub fn from_entry(entry: &TrackEntry) -> Self {
        let kind = TrackKind::from_type(entry.track_type);
        let mut codec_private = Bytes::from(entry.codec_private.clone());
        let mut compression = Compression::None;

        if let Some(encoding) = entry.encodings.first() {
            compression = match (&encoding.compression, encoding.kind) {
                (Some(c), 0) if c.algo == ALGO_ZLIB => Compression::Zlib,
                (Some(c), 0) if c.algo == ALGO_HEADER_STRIP => {
                    Compression::HeaderStrip(Bytes::from(c.settings.clone()))
                }
                (Some(c), 0) => Compression::Unsupported(c.algo),
                (None, 0) => Compression::Zlib,
                (_, kind) => Compression::Unsupported(0x100 | kind),
            };
            if encoding.scope & SCOPE_PRIVATE != 0 && compression == Compression::Zlib {
                match inflate(&codec_private) {
                    Ok(private) => codec_private = private,
                    Err(e) => warn!(track = entry.number, error = %e, "cannot inflate codec private"),
                }
            }
            if encoding.scope & SCOPE_FRAMES == 0 {
                compression = Compression::None;
            }
            if entry.encodings.len() > 1 {
                warn!(track = entry.number, "only the first content encoding is applied");
            }
        }

        let timestamp_mode = timestamp_mode(kind, &entry.codec_id);
        let init_data = init_data(&entry.codec_id, &codec_private);
        let strategy = CodecStrategy::for_codec(&entry.codec_id, &codec_private);

        Self {
            number: entry.number,
            uid: entry.uid,
            kind,
            codec_id: entry.codec_id.clone(),
            codec_private,
            name: entry.name.clone(),
            language: entry.language.clone(),
            enabled: entry.flag_enabled,
            default: entry.flag_default,
            default_duration: entry.default_duration.map(ns_to_us),
            default_duration_ns: entry.default_duration,
            codec_delay: ns_to_us(entry.codec_delay),
            timecode_scale: entry.timecode_scale,
            sampling_frequency: entry.audio.as_ref().map(|a| a.sampling_frequency),
            channels: entry.audio.as_ref().map(|a| a.channels),
            pixel_size: entry.video.as_ref().map(|v| (v.pixel_width, v.pixel_height)),
            compression,
            strategy,
            timestamp_mode,
            init_data,
            es: None,
            inited: false,
            last_dts: None,
            discontinuity: false,
        }
    }

    /// Whether frames of this track can be extracted at all.
    pub fn is_supported(&self) -> bool {
        !matches!(self.compression, Compression::Unsupported(_))
    }

    /// Sink handle, when bound.
    pub fn es(&self) -> Option<EsId> {
        self.es
    }

    /// Decode timestamp of the last frame sent.
    pub fn last_dts(&self) -> Option<i64> {
        self.last_dts
    }

    pub fn timestamp_mode(&self) -> TimestampMode {
        self.timestamp_mode
    }

    /// Frames per second from the default duration.
    pub fn fps(&self) -> Option<f64> {
        self.default_duration_ns
            .filter(|ns| *ns > 0)
            .map(|ns| 1_000_000_000.0 / ns as f64)
    }

    /// Announce the track to the sink unless already bound.
    pub fn bind(&mut self, sink: &mut dyn OutputSink) -> Option<EsId> {
        if self.es.is_none() && self.is_supported() {
            self.es = sink.add_track(self);
            self.inited = false;
        }
        self.es
    }

    /// Withdraw the track from the sink.
    pub fn unbind(&mut self, sink: &mut dyn OutputSink) {
        if let Some(es) = self.es.take() {
            sink.remove_track(es);
        }
        self.inited = false;
        self.last_dts = None;
        self.strategy.reset();
    }

    /// Forget decode state after a seek or a segment switch.
    pub(crate) fn reset_decode_state(&mut self) {
        self.last_dts = None;
        self.discontinuity = true;
        self.strategy.reset();
    }
}

fn timestamp_mode(kind: TrackKind, codec_id: &str) -> TimestampMode {
    if kind != TrackKind::Video {
        return TimestampMode::PresentationOnly;
    }
    if codec_id.starts_with("V_MS/VFW/FOURCC") || codec_id.starts_with("V_REAL/") {
        TimestampMode::DecodeOnly
    } else if ["V_MJPEG", "V_PRORES", "V_UNCOMPRESSED"]
        .iter()
        .any(|intra| codec_id.starts_with(intra))
    {
        TimestampMode::PresentationOnly
    } else {
        TimestampMode::Reorder
    }
}

/// Codecs whose private data is an in-band sequence header.
fn init_data(codec_id: &str, codec_private: &Bytes) -> Option<Bytes> {
    let in_band = matches!(
        codec_id,
        "V_MPEG1" | "V_MPEG2" | "V_MPEG4/ISO/SP" | "V_MPEG4/ISO/ASP" | "V_MPEG4/ISO/AP"
    );
    (in_band && !codec_private.is_empty()).then(|| codec_private.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use segmux_ebml::{ContentCompression, ContentEncoding};

    fn entry(track_type: u64, codec: &str) -> TrackEntry {
        TrackEntry {
            number: 1,
            track_type,
            codec_id: codec.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_timestamp_modes() {
        let mode = |t, c| Track::from_entry(&entry(t, c)).timestamp_mode();
        assert_eq!(mode(2, "A_AAC"), TimestampMode::PresentationOnly);
        assert_eq!(mode(1, "V_MPEG4/ISO/AVC"), TimestampMode::Reorder);
        assert_eq!(mode(1, "V_MS/VFW/FOURCC"), TimestampMode::DecodeOnly);
        assert_eq!(mode(1, "V_REAL/RV40"), TimestampMode::DecodeOnly);
        assert_eq!(mode(1, "V_MJPEG"), TimestampMode::PresentationOnly);
    }

    #[test]
    fn test_init_data_only_for_in_band_headers() {
        let mut e = entry(1, "V_MPEG2");
        e.codec_private = vec![0, 0, 1, 0xB3];
        assert!(Track::from_entry(&e).init_data.is_some());

        e.codec_id = "V_MPEG4/ISO/AVC".into();
        assert!(Track::from_entry(&e).init_data.is_none());
    }

    #[test]
    fn test_header_strip_and_unsupported_encodings() {
        let mut e = entry(2, "A_AC3");
        e.encodings.push(ContentEncoding {
            compression: Some(ContentCompression {
                algo: 3,
                settings: vec![0x0B, 0x77],
            }),
            ..Default::default()
        });
        let track = Track::from_entry(&e);
        assert_eq!(track.compression, Compression::HeaderStrip(Bytes::from_static(&[0x0B, 0x77])));
        assert!(track.is_supported());

        e.encodings[0].compression = Some(ContentCompression { algo: 2, settings: vec![] });
        assert!(!Track::from_entry(&e).is_supported());
    }

    #[test]
    fn test_fps_from_default_duration() {
        let mut e = entry(1, "V_VP9");
        e.default_duration = Some(40_000_000);
        let track = Track::from_entry(&e);
        assert_eq!(track.fps(), Some(25.0));
        assert_eq!(track.default_duration, Some(40_000));
    }
}

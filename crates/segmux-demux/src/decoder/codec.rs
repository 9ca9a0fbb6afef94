//! Codec-specific frame fixups, chosen once per track.

use bitstream_io::{BigEndian, BitRead, BitReader};
use bytes::{BufMut, Bytes, BytesMut};
use segmux_common::time::CLOCK_FREQ;
use tracing::warn;

/// Per-track special handling.
#[derive(Debug, Clone)]
pub(crate) enum CodecStrategy {
    /// Frames pass through unchanged.
    Direct,
    /// Cook/ATRAC3 sub-packet deinterleaving.
    RealAudio(RealAudio),
    /// Trim padding behind the DTS frame.
    DtsTrim,
    /// Derive the sample count from the block duration.
    OpusSamples,
    /// Rebuild self-contained `wvpk` blocks.
    WavPack { version: u16 },
}

impl CodecStrategy {
    pub(crate) fn for_codec(codec_id: &str, codec_private: &[u8]) -> Self {
        match codec_id {
            "A_REAL/COOK" | "A_REAL/ATRC" => match RealAudio::from_private(codec_private) {
                Some(state) => CodecStrategy::RealAudio(state),
                None => {
                    warn!(codec_id, "invalid real audio private data, passing frames through");
                    CodecStrategy::Direct
                }
            },
            "A_DTS" => CodecStrategy::DtsTrim,
            "A_OPUS" => CodecStrategy::OpusSamples,
            "A_WAVPACK4" => {
                let version = match codec_private {
                    [lo, hi, ..] => u16::from_le_bytes([*lo, *hi]),
                    _ => 0x403,
                };
                CodecStrategy::WavPack { version }
            }
            _ => CodecStrategy::Direct,
        }
    }

    pub(crate) fn reset(&mut self) {
        if let CodecStrategy::RealAudio(state) = self {
            state.reset();
        }
    }
}

/// Reorder buffer for interleaved RealAudio sub-packets.
#[derive(Debug, Clone)]
pub(crate) struct RealAudio {
    sub_packet_h: usize,
    frame_size: usize,
    sub_packet_size: usize,
    slots: Vec<Option<(Bytes, Option<i64>)>>,
    received: usize,
}

impl RealAudio {
    fn from_private(private: &[u8]) -> Option<Self> {
        let field = |at: usize| -> Option<usize> {
            private
                .get(at..at + 2)
                .map(|b| u16::from_be_bytes([b[0], b[1]]) as usize)
        };
        let sub_packet_h = field(40)?;
        let frame_size = field(42)?;
        let sub_packet_size = field(44)?;
        if sub_packet_h == 0 || sub_packet_size == 0 || frame_size < sub_packet_size {
            return None;
        }
        let count = sub_packet_h * frame_size / sub_packet_size;
        Some(Self {
            sub_packet_h,
            frame_size,
            sub_packet_size,
            slots: vec![None; count],
            received: 0,
        })
    }

    pub(crate) fn reset(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.received = 0;
    }

    /// No sub-packet of the current superframe has arrived yet.
    pub(crate) fn is_idle(&self) -> bool {
        self.received == 0
    }

    /// Store the sub-packets of one frame; returns a full superframe in
    /// playback order once every slot is filled.
    pub(crate) fn push(&mut self, payload: &[u8], pts: Option<i64>) -> Vec<(Bytes, Option<i64>)> {
        let per_frame = self.frame_size / self.sub_packet_size;
        let y = self.received / per_frame;
        let h = self.sub_packet_h;

        for (i, chunk) in payload.chunks(self.sub_packet_size).take(per_frame).enumerate() {
            let index = h * i + ((h + 1) / 2) * (y & 1) + (y >> 1);
            if index >= self.slots.len() || chunk.len() < self.sub_packet_size {
                return Vec::new();
            }
            let stamp = if self.received == 0 { pts } else { None };
            self.slots[index] = Some((Bytes::copy_from_slice(chunk), stamp));
            self.received += 1;
        }

        if self.received < self.slots.len() {
            return Vec::new();
        }
        self.received = 0;
        self.slots.iter_mut().filter_map(Option::take).collect()
    }
}

/// Length of the DTS core frame starting at `data`, from its sync header.
///
/// Handles big-endian and 16-bit little-endian streams.
pub(crate) fn dts_frame_size(data: &[u8]) -> Option<usize> {
    let mut header = [0u8; 10];
    header.copy_from_slice(data.get(..10)?);
    let sync = [header[0], header[1], header[2], header[3]];
    match sync {
        [0x7F, 0xFE, 0x80, 0x01] => {}
        [0xFE, 0x7F, 0x01, 0x80] => header.chunks_exact_mut(2).for_each(|pair| pair.swap(0, 1)),
        _ => return None,
    }

    let mut reader = BitReader::endian(&header[4..], BigEndian);
    // FTYPE, SHORT, CPF, NBLKS
    reader.skip(1 + 5 + 1 + 7).ok()?;
    let fsize: u16 = reader.read(14).ok()?;
    (fsize >= 95).then_some(fsize as usize + 1)
}

/// Sample count of an Opus frame lasting `duration_ticks`.
pub(crate) fn opus_samples(duration_ticks: u64, track_scale: f64, segment_scale: u64, rate: f64) -> u32 {
    let length_us = (duration_ticks as f64 * track_scale * segment_scale as f64 / 1000.0) as i64;
    let length_us = length_us.max(0);
    (length_us as f64 * rate / CLOCK_FREQ as f64) as u32
}

const WVPK_HEADER_LEN: usize = 32;

fn le32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn put_wvpk_block(out: &mut BytesMut, version: u16, samples: u32, flags: u32, crc: u32, body: &[u8]) {
    out.put_slice(b"wvpk");
    out.put_u32_le(body.len() as u32 + 24);
    out.put_u16_le(version);
    out.put_u8(0); // track_no
    out.put_u8(0); // index_no
    out.put_u32_le(0xFFFF_FFFF); // total_samples
    out.put_u32_le(0); // block_index
    out.put_u32_le(samples);
    out.put_u32_le(flags);
    out.put_u32_le(crc);
    out.put_slice(body);
}

/// Rebuild `wvpk` blocks from a Matroska WavPack frame.
pub(crate) fn wavpack_packet(version: u16, data: &[u8]) -> Option<Bytes> {
    const INITIAL_AND_FINAL: u32 = 0x1800;

    if data.len() < 12 {
        return None;
    }
    let samples = le32(data, 0);
    let flags = le32(data, 4);

    if flags & INITIAL_AND_FINAL == INITIAL_AND_FINAL {
        let crc = le32(data, 8);
        let body = &data[12..];
        let mut out = BytesMut::with_capacity(body.len() + WVPK_HEADER_LEN);
        put_wvpk_block(&mut out, version, samples, flags, crc, body);
        return Some(out.freeze());
    }

    let mut out = BytesMut::new();
    let mut rest = &data[4..];
    while rest.len() >= 12 {
        let flags = le32(rest, 0);
        let crc = le32(rest, 4);
        let size = (le32(rest, 8) as usize).min(rest.len() - 12);
        let body = &rest[12..12 + size];
        put_wvpk_block(&mut out, version, samples, flags, crc, body);
        rest = &rest[12 + size..];
    }
    Some(out.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn real_private(h: u16, frame: u16, sub: u16) -> Vec<u8> {
        let mut private = vec![0u8; 46];
        private[40..42].copy_from_slice(&h.to_be_bytes());
        private[42..44].copy_from_slice(&frame.to_be_bytes());
        private[44..46].copy_from_slice(&sub.to_be_bytes());
        private
    }

    #[test]
    fn test_real_audio_interleave_order() {
        let mut state = RealAudio::from_private(&real_private(2, 4, 2)).unwrap();
        assert!(state.push(b"a0a1", Some(1000)).is_empty());
        assert!(!state.is_idle());
        let out = state.push(b"b0b1", Some(2000));
        let payloads: Vec<&[u8]> = out.iter().map(|(b, _)| &b[..]).collect();
        assert_eq!(payloads, vec![&b"a0"[..], &b"b0"[..], &b"a1"[..], &b"b1"[..]]);
        assert_eq!(out[0].1, Some(1000));
        assert!(out[1..].iter().all(|(_, pts)| pts.is_none()));
        assert!(state.is_idle());
    }

    #[test]
    fn test_real_audio_rejects_bad_private() {
        assert!(RealAudio::from_private(&[0u8; 10]).is_none());
        assert!(RealAudio::from_private(&real_private(2, 1, 2)).is_none());
    }

    fn dts_header(fsize: u16) -> Vec<u8> {
        // FTYPE=1, SHORT=31, CPF=0, NBLKS=15, then FSIZE (14 bits)
        let bits: u64 = (1 << 63) | (31 << 58) | (15 << 50) | ((fsize as u64) << 36);
        let mut header = vec![0x7F, 0xFE, 0x80, 0x01];
        header.extend_from_slice(&bits.to_be_bytes()[..6]);
        header
    }

    #[test]
    fn test_dts_sync_detection() {
        assert_eq!(dts_frame_size(&dts_header(1023)), Some(1024));
        assert_eq!(dts_frame_size(&dts_header(10)), None);
        assert_eq!(dts_frame_size(b"\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00"), None);

        let mut swapped = dts_header(511);
        swapped.chunks_exact_mut(2).for_each(|p| p.swap(0, 1));
        assert_eq!(dts_frame_size(&swapped), Some(512));
    }

    #[test]
    fn test_opus_samples() {
        // 20 ticks of 1 ms at 48 kHz
        assert_eq!(opus_samples(20, 1.0, 1_000_000, 48_000.0), 960);
        assert_eq!(opus_samples(0, 1.0, 1_000_000, 48_000.0), 0);
    }

    #[test]
    fn test_wavpack_single_block() {
        let mut frame = Vec::new();
        frame.extend_from_slice(&1152u32.to_le_bytes());
        frame.extend_from_slice(&0x1800u32.to_le_bytes());
        frame.extend_from_slice(&0xABCDu32.to_le_bytes());
        frame.extend_from_slice(b"body");
        let packet = wavpack_packet(0x407, &frame).unwrap();
        assert_eq!(&packet[..4], b"wvpk");
        assert_eq!(le32(&packet, 4), 28);
        assert_eq!(u16::from_le_bytes([packet[8], packet[9]]), 0x407);
        assert_eq!(le32(&packet, 12), 0xFFFF_FFFF);
        assert_eq!(le32(&packet, 20), 1152);
        assert_eq!(le32(&packet, 28), 0xABCD);
        assert_eq!(&packet[32..], b"body");
    }

    #[test]
    fn test_wavpack_multi_block() {
        let mut frame = Vec::new();
        frame.extend_from_slice(&100u32.to_le_bytes());
        for body in [&b"one"[..], b"three"] {
            frame.extend_from_slice(&0x0800u32.to_le_bytes());
            frame.extend_from_slice(&7u32.to_le_bytes());
            frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
            frame.extend_from_slice(body);
        }
        let packet = wavpack_packet(0x403, &frame).unwrap();
        assert_eq!(packet.len(), 32 + 3 + 32 + 5);
        assert_eq!(&packet[32..35], b"one");
        assert_eq!(&packet[35..39], b"wvpk");
        assert_eq!(le32(&packet, 35 + 20), 100);
        assert!(wavpack_packet(0x403, b"short").is_none());
    }
}

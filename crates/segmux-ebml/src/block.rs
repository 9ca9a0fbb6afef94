//! Block headers and lacing.
//!
//! Lace sizes are turned into declared frame spans but never trusted:
//! a span may point past the end of the payload and it is up to the
//! consumer to bounds-check before slicing.

use crate::error::{EbmlError, Result};
use crate::vint::{read_signed_vint, read_vint};
use bytes::Bytes;

const FLAG_KEY: u8 = 0x80;
const FLAG_INVISIBLE: u8 = 0x08;
const FLAG_LACING: u8 = 0x06;
const FLAG_DISCARDABLE: u8 = 0x01;

/// Lacing mode of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lacing {
    None,
    Xiph,
    Fixed,
    Ebml,
}

impl Lacing {
    fn from_flags(flags: u8) -> Self {
        match (flags & FLAG_LACING) >> 1 {
            0 => Lacing::None,
            1 => Lacing::Xiph,
            2 => Lacing::Fixed,
            _ => Lacing::Ebml,
        }
    }

    /// Flag bits for this mode.
    pub fn flag_bits(self) -> u8 {
        match self {
            Lacing::None => 0x00,
            Lacing::Xiph => 0x02,
            Lacing::Fixed => 0x04,
            Lacing::Ebml => 0x06,
        }
    }
}

/// Declared location of one laced frame inside a block payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSpan {
    pub offset: usize,
    pub len: usize,
}

impl FrameSpan {
    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.len)
    }
}

/// A block read from a cluster.
#[derive(Debug, Clone)]
pub struct RawBlock {
    pub track_number: u64,
    /// Absolute timecode in segment ticks (cluster + relative).
    pub timecode: i64,
    pub key: bool,
    pub discardable: bool,
    pub invisible: bool,
    /// BlockDuration in ticks.
    pub duration: Option<u64>,
    pub lacing: Lacing,
    /// Whole block payload, header included.
    pub data: Bytes,
    /// Offset of the first frame byte in `data`.
    pub header_len: usize,
    /// Declared frame spans, offsets into `data`.
    pub frames: Vec<FrameSpan>,
    /// Stream offset of the enclosing element.
    pub position: u64,
    /// Stream offset of the enclosing cluster.
    pub cluster_position: u64,
}

impl RawBlock {
    /// Parse a SimpleBlock or Block payload.
    ///
    /// `simple` selects SimpleBlock flag semantics; a plain Block is
    /// reported as key and the reader clears that when a ReferenceBlock
    /// is present.
    pub fn parse(data: Bytes, cluster_timecode: u64, simple: bool) -> Result<Self> {
        let (track_number, track_len) =
            read_vint(&data).map_err(|_| EbmlError::invalid_block("bad track number"))?;
        if data.len() < track_len + 3 {
            return Err(EbmlError::invalid_block("truncated block header"));
        }
        let relative = i16::from_be_bytes([data[track_len], data[track_len + 1]]);
        let flags = data[track_len + 2];
        let lacing = Lacing::from_flags(flags);
        let (frames, header_len) = lace_spans(&data, track_len + 3, lacing)?;
        let timecode = i64::try_from(cluster_timecode)
            .ok()
            .and_then(|tc| tc.checked_add(relative as i64))
            .ok_or_else(|| EbmlError::invalid_block("block timecode overflow"))?;

        Ok(Self {
            track_number,
            timecode,
            key: !simple || flags & FLAG_KEY != 0,
            discardable: simple && flags & FLAG_DISCARDABLE != 0,
            invisible: flags & FLAG_INVISIBLE != 0,
            duration: None,
            lacing,
            data,
            header_len,
            frames,
            position: 0,
            cluster_position: 0,
        })
    }

    /// Bytes available for frame data.
    pub fn declared_size(&self) -> usize {
        self.data.len().saturating_sub(self.header_len)
    }

    /// Slice a frame when its declared span fits in the payload.
    pub fn frame(&self, index: usize) -> Option<Bytes> {
        let span = self.frames.get(index)?;
        (span.end() <= self.data.len()).then(|| self.data.slice(span.offset..span.end()))
    }
}

/// Compute declared frame spans; returns spans and the lace header end.
fn lace_spans(data: &[u8], start: usize, lacing: Lacing) -> Result<(Vec<FrameSpan>, usize)> {
    if lacing == Lacing::None {
        let span = FrameSpan {
            offset: start,
            len: data.len() - start,
        };
        return Ok((vec![span], start));
    }

    let count = *data
        .get(start)
        .ok_or_else(|| EbmlError::invalid_block("missing lace count"))? as usize
        + 1;
    let mut pos = start + 1;
    let mut sizes = Vec::with_capacity(count);

    match lacing {
        Lacing::Xiph => {
            for _ in 0..count - 1 {
                let mut size = 0usize;
                loop {
                    let byte = *data
                        .get(pos)
                        .ok_or_else(|| EbmlError::invalid_block("truncated xiph lace"))?;
                    pos += 1;
                    size = size
                        .checked_add(byte as usize)
                        .ok_or_else(|| EbmlError::invalid_block("lace sizes overflow"))?;
                    if byte != 255 {
                        break;
                    }
                }
                sizes.push(size);
            }
        }
        Lacing::Ebml => {
            let (first, len) = read_vint(&data[pos.min(data.len())..])
                .map_err(|_| EbmlError::invalid_block("truncated ebml lace"))?;
            pos += len;
            let mut previous = first as i64;
            sizes.push(first as usize);
            for _ in 1..count - 1 {
                let (delta, len) = read_signed_vint(&data[pos.min(data.len())..])
                    .map_err(|_| EbmlError::invalid_block("truncated ebml lace"))?;
                pos += len;
                let size = previous
                    .checked_add(delta)
                    .ok_or_else(|| EbmlError::invalid_block("lace sizes overflow"))?;
                if size < 0 {
                    return Err(EbmlError::invalid_block("negative ebml lace size"));
                }
                sizes.push(size as usize);
                previous = size;
            }
        }
        Lacing::Fixed => {
            let each = data.len().saturating_sub(pos) / count;
            sizes.extend(std::iter::repeat(each).take(count - 1));
        }
        Lacing::None => unreachable!(),
    }

    let consumed = sizes
        .iter()
        .try_fold(0usize, |total, size| total.checked_add(*size))
        .ok_or_else(|| EbmlError::invalid_block("lace sizes overflow"))?;
    let last = data.len().saturating_sub(pos).saturating_sub(consumed);
    sizes.push(last);

    let mut offset = pos;
    let mut spans = Vec::with_capacity(sizes.len());
    for len in sizes {
        spans.push(FrameSpan { offset, len });
        offset = offset
            .checked_add(len)
            .ok_or_else(|| EbmlError::invalid_block("lace sizes overflow"))?;
    }
    Ok((spans, pos))
}

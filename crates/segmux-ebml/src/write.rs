//! Minimal EBML writer used to build fixtures.

use crate::block::Lacing;
use crate::element as id;
use crate::vint::{encode_id, encode_signed_vint, encode_vint};

/// Size field marking an element of unknown size.
pub const UNKNOWN_SIZE: [u8; 8] = [0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];

/// Appends elements to an in-memory buffer.
#[derive(Debug, Default, Clone)]
pub struct ElementWriter {
    buf: Vec<u8>,
}

impl ElementWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }

    /// Append raw bytes.
    pub fn raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn binary(&mut self, element: u32, body: &[u8]) {
        self.buf.extend(encode_id(element));
        self.buf.extend(encode_vint(body.len() as u64));
        self.buf.extend_from_slice(body);
    }

    pub fn uint(&mut self, element: u32, value: u64) {
        let bytes = value.to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count().min(7);
        self.binary(element, &bytes[skip..]);
    }

    pub fn int(&mut self, element: u32, value: i64) {
        self.binary(element, &value.to_be_bytes());
    }

    pub fn float(&mut self, element: u32, value: f64) {
        self.binary(element, &value.to_be_bytes());
    }

    pub fn string(&mut self, element: u32, value: &str) {
        self.binary(element, value.as_bytes());
    }

    /// Write a known-size master element whose children are produced by `f`.
    pub fn master<F: FnOnce(&mut ElementWriter)>(&mut self, element: u32, f: F) {
        let mut inner = ElementWriter::new();
        f(&mut inner);
        self.binary(element, &inner.buf);
    }

    /// Write the header of an unknown-size master; children follow inline.
    pub fn open_unknown(&mut self, element: u32) {
        self.buf.extend(encode_id(element));
        self.buf.extend_from_slice(&UNKNOWN_SIZE);
    }

    /// Write an EBML header with the given doc type.
    pub fn ebml_header(&mut self, doc_type: &str) {
        self.master(id::EBML, |h| {
            h.uint(id::DOC_TYPE_VERSION, 4);
            h.string(id::DOC_TYPE, doc_type);
        });
    }
}

/// Build a block payload (track, relative timecode, flags, lacing, frames).
///
/// Lacing bits are derived from `lacing`; other bits come from `flags`.
pub fn block_payload<F: AsRef<[u8]>>(
    track: u64,
    timecode: i16,
    flags: u8,
    lacing: Lacing,
    frames: &[F],
) -> Vec<u8> {
    let mut out = encode_vint(track);
    out.extend_from_slice(&timecode.to_be_bytes());
    let lacing = if frames.len() <= 1 { Lacing::None } else { lacing };
    out.push((flags & !0x06) | lacing.flag_bits());

    if lacing != Lacing::None {
        out.push((frames.len() - 1) as u8);
    }
    let head = &frames[..frames.len().saturating_sub(1)];
    match lacing {
        Lacing::None | Lacing::Fixed => {}
        Lacing::Xiph => {
            for frame in head {
                let mut len = frame.as_ref().len();
                while len >= 255 {
                    out.push(255);
                    len -= 255;
                }
                out.push(len as u8);
            }
        }
        Lacing::Ebml => {
            let mut previous = 0i64;
            for (i, frame) in head.iter().enumerate() {
                let len = frame.as_ref().len() as i64;
                if i == 0 {
                    out.extend(encode_vint(len as u64));
                } else {
                    out.extend(encode_signed_vint(len - previous));
                }
                previous = len;
            }
        }
    }
    for frame in frames {
        out.extend_from_slice(frame.as_ref());
    }
    out
}

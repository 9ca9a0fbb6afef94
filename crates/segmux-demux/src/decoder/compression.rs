//! Frame payload reconstruction.

use bytes::{Bytes, BytesMut};
use flate2::read::ZlibDecoder;
use std::io::{self, Read};

/// Upper bound for one inflated frame.
const MAX_INFLATED: u64 = 64 * 1024 * 1024;

/// Inflate a zlib-compressed payload.
pub fn inflate(data: &[u8]) -> io::Result<Bytes> {
    let mut out = Vec::with_capacity(data.len() * 2);
    ZlibDecoder::new(data)
        .take(MAX_INFLATED)
        .read_to_end(&mut out)?;
    Ok(Bytes::from(out))
}

/// Restore bytes a muxer stripped from the start of the frame.
pub fn restore_header(prefix: &[u8], data: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(prefix.len() + data.len());
    out.extend_from_slice(prefix);
    out.extend_from_slice(data);
    out.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_inflate() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"frame payload frame payload").unwrap();
        let compressed = encoder.finish().unwrap();
        assert_eq!(&inflate(&compressed).unwrap()[..], b"frame payload frame payload");
        assert!(inflate(b"not zlib at all").is_err());
    }

    #[test]
    fn test_restore_header() {
        assert_eq!(&restore_header(&[0x0B, 0x77], b"rest")[..], b"\x0B\x77rest");
    }
}

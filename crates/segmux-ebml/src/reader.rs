//! Element headers, buffered child iteration and scalar payload decoding.

use crate::element::EBML_MAGIC;
use crate::error::{EbmlError, Result};
use crate::vint::{read_id, read_size, vint_length, MAX_ID_LENGTH, MAX_VINT_LENGTH};
use std::io::{self, Read, Seek, SeekFrom};

/// Maximum element payload read into memory (64 MB) to prevent OOM on
/// malformed files.
pub const MAX_ELEMENT_SIZE: u64 = 64 * 1024 * 1024;

/// Header of one element in a byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementHeader {
    /// Element id, marker bits included.
    pub id: u32,
    /// Payload size; `None` for unknown-size (live) elements.
    pub size: Option<u64>,
    /// Stream offset of the first id byte.
    pub offset: u64,
    /// Stream offset of the first payload byte.
    pub data_offset: u64,
}

impl ElementHeader {
    /// Stream offset just past the payload, when the size is known.
    pub fn end(&self) -> Option<u64> {
        self.size.map(|size| self.data_offset + size)
    }

    /// Length of the id and size fields.
    pub fn header_len(&self) -> u64 {
        self.data_offset - self.offset
    }
}

/// Read the element header at the current stream position.
///
/// Returns `Ok(None)` when the stream ends cleanly before the first byte.
pub fn read_header<R: Read + Seek>(reader: &mut R) -> Result<Option<ElementHeader>> {
    let offset = reader.stream_position()?;

    let mut id_buf = [0u8; MAX_ID_LENGTH];
    match reader.read_exact(&mut id_buf[..1]) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let id_len = vint_length(id_buf[0])
        .filter(|len| *len <= MAX_ID_LENGTH)
        .ok_or(EbmlError::InvalidVint { offset })?;
    reader.read_exact(&mut id_buf[1..id_len])?;
    let (id, _) = read_id(&id_buf[..id_len])?;

    let mut size_buf = [0u8; MAX_VINT_LENGTH];
    reader.read_exact(&mut size_buf[..1])?;
    let size_len = vint_length(size_buf[0]).ok_or(EbmlError::InvalidVint {
        offset: offset + id_len as u64,
    })?;
    reader.read_exact(&mut size_buf[1..size_len])?;
    let (size, _) = read_size(&size_buf[..size_len])?;

    Ok(Some(ElementHeader {
        id,
        size,
        offset,
        data_offset: offset + (id_len + size_len) as u64,
    }))
}

/// Read the whole payload of a known-size element.
pub fn read_body<R: Read + Seek>(reader: &mut R, header: &ElementHeader) -> Result<Vec<u8>> {
    let size = header.size.ok_or_else(|| EbmlError::InvalidElementSize {
        id: header.id,
        offset: header.offset,
        message: "unknown size where a bounded element is required".into(),
    })?;
    if size > MAX_ELEMENT_SIZE {
        return Err(EbmlError::InvalidElementSize {
            id: header.id,
            offset: header.offset,
            message: format!("{} bytes exceeds maximum {}", size, MAX_ELEMENT_SIZE),
        });
    }
    reader.seek(SeekFrom::Start(header.data_offset))?;
    let mut data = vec![0u8; size as usize];
    reader.read_exact(&mut data)?;
    Ok(data)
}

/// Check for the EBML magic without moving the stream position.
pub fn has_ebml_magic<R: Read + Seek>(reader: &mut R) -> io::Result<bool> {
    let start = reader.stream_position()?;
    let mut magic = [0u8; 4];
    let found = match reader.read_exact(&mut magic) {
        Ok(()) => magic == EBML_MAGIC,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => false,
        Err(e) => return Err(e),
    };
    reader.seek(SeekFrom::Start(start))?;
    Ok(found)
}

/// Iterator over the children of a buffered master element.
pub struct Children<'a> {
    data: &'a [u8],
    pos: usize,
}

/// Iterate the child elements of an in-memory master payload.
pub fn children(data: &[u8]) -> Children<'_> {
    Children { data, pos: 0 }
}

impl<'a> Iterator for Children<'a> {
    type Item = Result<(u32, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.data.len() {
            return None;
        }
        let start = self.pos;
        let item = self.parse_one(start);
        if item.is_err() {
            // stop after the first malformed child
            self.pos = self.data.len();
        }
        Some(item)
    }
}

impl<'a> Children<'a> {
    fn parse_one(&mut self, start: usize) -> Result<(u32, &'a [u8])> {
        let rest = &self.data[start..];
        let (id, id_len) = read_id(rest).map_err(|_| EbmlError::InvalidVint {
            offset: start as u64,
        })?;
        let (size, size_len) = read_size(&rest[id_len..]).map_err(|_| EbmlError::InvalidVint {
            offset: (start + id_len) as u64,
        })?;
        let body_start = start + id_len + size_len;
        let size = size.ok_or_else(|| EbmlError::InvalidElementSize {
            id,
            offset: start as u64,
            message: "unknown size inside a buffered element".into(),
        })?;
        let body_end = body_start
            .checked_add(size as usize)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| EbmlError::InvalidElementSize {
                id,
                offset: start as u64,
                message: format!("{} bytes overruns parent", size),
            })?;
        self.pos = body_end;
        Ok((id, &self.data[body_start..body_end]))
    }
}

/// Decode a big-endian unsigned integer payload (empty means 0).
pub fn read_uint(data: &[u8]) -> Result<u64> {
    if data.len() > 8 {
        return Err(EbmlError::invalid_element(0, "unsigned integer wider than 8 bytes"));
    }
    Ok(data.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64))
}

/// Decode a big-endian two's complement integer payload.
pub fn read_int(data: &[u8]) -> Result<i64> {
    if data.is_empty() {
        return Ok(0);
    }
    let unsigned = read_uint(data)?;
    let shift = 64 - 8 * data.len() as u32;
    Ok(((unsigned << shift) as i64) >> shift)
}

/// Decode a 4- or 8-byte IEEE float payload (empty means 0.0).
pub fn read_float(data: &[u8]) -> Result<f64> {
    match data.len() {
        0 => Ok(0.0),
        4 => Ok(f32::from_be_bytes([data[0], data[1], data[2], data[3]]) as f64),
        8 => {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(data);
            Ok(f64::from_be_bytes(bytes))
        }
        n => Err(EbmlError::invalid_element(0, format!("float of {} bytes", n))),
    }
}

/// Decode a string payload, stopping at the first NUL.
pub fn read_string(data: &[u8]) -> String {
    let end = data.iter().position(|b| *b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).into_owned()
}

/// Decode a boolean flag payload.
pub fn read_flag(data: &[u8]) -> Result<bool> {
    Ok(read_uint(data)? != 0)
}

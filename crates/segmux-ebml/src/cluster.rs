//! Lazy block reading from the clusters of one segment.

use crate::block::RawBlock;
use crate::element::{self as id, is_top_level};
use crate::error::{EbmlError, Result};
use crate::reader::{children, read_body, read_header, read_int, read_uint, ElementHeader};
use bytes::Bytes;
use std::io::{Read, Seek, SeekFrom};
use tracing::{debug, trace, warn};

const CLUSTER_MAGIC: [u8; 4] = [0x1F, 0x43, 0xB6, 0x75];
const RESYNC_CHUNK: usize = 64 * 1024;

#[derive(Debug, Clone, Copy)]
struct ClusterState {
    position: u64,
    timecode: u64,
    end: Option<u64>,
}

/// Walks clusters of a segment and yields blocks one at a time.
///
/// The reader keeps only a cursor; the byte source is passed to each
/// call so several readers can share one stream.
#[derive(Debug, Clone)]
pub struct ClusterReader {
    segment_end: Option<u64>,
    pos: u64,
    cluster: Option<ClusterState>,
}

impl ClusterReader {
    /// Start reading at `first_cluster`, stopping at `segment_end`.
    pub fn new(first_cluster: u64, segment_end: Option<u64>) -> Self {
        Self {
            segment_end,
            pos: first_cluster,
            cluster: None,
        }
    }

    /// Stream offset of the next element to read.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Offset of the cluster currently being read.
    pub fn cluster_position(&self) -> Option<u64> {
        self.cluster.map(|c| c.position)
    }

    /// Reposition to the cluster starting at `position`.
    pub fn seek_cluster(&mut self, position: u64) {
        self.pos = position;
        self.cluster = None;
    }

    /// Scan forward from `from` for the next cluster id.
    ///
    /// Returns false and leaves the cursor at the segment end when no
    /// cluster is found.
    pub fn resync<R: Read + Seek>(&mut self, src: &mut R, from: u64) -> Result<bool> {
        src.seek(SeekFrom::Start(from))?;
        let mut offset = from;
        let mut window = vec![0u8; RESYNC_CHUNK + CLUSTER_MAGIC.len()];
        let mut carried = 0usize;

        loop {
            let limit = self
                .segment_end
                .map(|end| end.saturating_sub(offset) as usize)
                .unwrap_or(RESYNC_CHUNK)
                .min(RESYNC_CHUNK);
            if limit == 0 {
                break;
            }
            let read = src.read(&mut window[carried..carried + limit])?;
            if read == 0 {
                break;
            }
            let filled = carried + read;
            if let Some(found) = window[..filled]
                .windows(CLUSTER_MAGIC.len())
                .position(|w| w == CLUSTER_MAGIC)
            {
                let position = offset - carried as u64 + found as u64;
                debug!(position, "resynced on cluster");
                self.seek_cluster(position);
                return Ok(true);
            }
            offset += read as u64;
            carried = (CLUSTER_MAGIC.len() - 1).min(filled);
            window.copy_within(filled - carried..filled, 0);
        }

        self.seek_cluster(self.segment_end.unwrap_or(offset));
        Ok(false)
    }

    /// Read the next block, or `None` at the end of the segment.
    ///
    /// Corrupt blocks are logged and skipped. A truncated stream ends the
    /// segment rather than failing.
    pub fn next_block<R: Read + Seek>(&mut self, src: &mut R) -> Result<Option<RawBlock>> {
        loop {
            if self.segment_end.is_some_and(|end| self.pos >= end) {
                return Ok(None);
            }
            if let Some(state) = self.cluster {
                if state.end.is_some_and(|end| self.pos >= end) {
                    self.cluster = None;
                }
            }

            src.seek(SeekFrom::Start(self.pos))?;
            let header = match read_header(src) {
                Ok(Some(header)) => header,
                Ok(None) => return Ok(None),
                Err(e) if e.is_eof() => return Ok(None),
                Err(EbmlError::InvalidVint { .. }) => {
                    warn!(position = self.pos, "invalid element header, resyncing");
                    if self.resync(src, self.pos + 1)? {
                        continue;
                    }
                    return Ok(None);
                }
                Err(e) => return Err(e),
            };

            match self.step(src, &header) {
                Ok(Some(block)) => return Ok(Some(block)),
                Ok(None) => {}
                Err(e) if e.is_eof() => return Ok(None),
                Err(e @ EbmlError::Io(_)) => return Err(e),
                Err(e) => {
                    warn!(position = header.offset, error = %e, "skipping corrupt element");
                    match header.end() {
                        Some(end) => self.pos = end,
                        None => return Ok(None),
                    }
                }
            }
        }
    }

    fn step<R: Read + Seek>(&mut self, src: &mut R, header: &ElementHeader) -> Result<Option<RawBlock>> {
        match header.id {
            id::CLUSTER => {
                trace!(position = header.offset, "entering cluster");
                self.cluster = Some(ClusterState {
                    position: header.offset,
                    timecode: 0,
                    end: header.end(),
                });
                self.pos = header.data_offset;
                Ok(None)
            }
            id::TIMECODE if self.cluster.is_some() => {
                let body = read_body(src, header)?;
                self.pos = header.data_offset + body.len() as u64;
                let timecode = read_uint(&body)?;
                if let Some(state) = self.cluster.as_mut() {
                    state.timecode = timecode;
                }
                Ok(None)
            }
            id::SIMPLE_BLOCK | id::BLOCK_GROUP if self.cluster.is_some() => {
                let body = read_body(src, header)?;
                self.pos = header.data_offset + body.len() as u64;
                let state = self.cluster.unwrap_or(ClusterState {
                    position: header.offset,
                    timecode: 0,
                    end: None,
                });
                let mut block = if header.id == id::SIMPLE_BLOCK {
                    RawBlock::parse(Bytes::from(body), state.timecode, true)?
                } else {
                    parse_block_group(&body, state.timecode)?
                };
                block.position = header.offset;
                block.cluster_position = state.position;
                Ok(Some(block))
            }
            other => {
                if is_top_level(other) {
                    self.cluster = None;
                }
                match header.end() {
                    Some(end) => {
                        self.pos = end;
                        Ok(None)
                    }
                    None => Err(EbmlError::InvalidElementSize {
                        id: other,
                        offset: header.offset,
                        message: "unknown size outside a cluster".into(),
                    }),
                }
            }
        }
    }
}

fn parse_block_group(body: &[u8], cluster_timecode: u64) -> Result<RawBlock> {
    let mut block_data = None;
    let mut duration = None;
    let mut referenced = false;
    for child in children(body) {
        let (child_id, value) = child?;
        match child_id {
            id::BLOCK => block_data = Some(value),
            id::BLOCK_DURATION => duration = Some(read_uint(value)?),
            id::REFERENCE_BLOCK => {
                read_int(value)?;
                referenced = true;
            }
            _ => {}
        }
    }
    let data = block_data.ok_or(EbmlError::MissingElement("Block"))?;
    let mut block = RawBlock::parse(Bytes::copy_from_slice(data), cluster_timecode, false)?;
    block.key = !referenced;
    block.duration = duration;
    Ok(block)
}

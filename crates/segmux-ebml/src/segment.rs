//! Segment discovery and descriptive element parsing.

use crate::element as id;
use crate::error::{EbmlError, Result};
use crate::model::{
    parse_attachments, parse_chapters, parse_cues, parse_seek_head, parse_tracks, AttachedFile,
    CuePoint, EditionEntry, SegmentInfo, TrackEntry,
};
use crate::reader::{children, read_body, read_header, read_string, ElementHeader};
use std::collections::HashSet;
use std::io::{Read, Seek, SeekFrom};
use tracing::{debug, warn};

/// Everything known about one segment before any block is read.
#[derive(Debug, Clone, Default)]
pub struct SegmentTree {
    /// Stream offset of the Segment element header.
    pub offset: u64,
    /// Stream offset of the first child; SeekHead and Cue positions are
    /// relative to this.
    pub data_start: u64,
    /// End of the segment (stream end for unknown-size segments).
    pub data_end: u64,
    pub info: Option<SegmentInfo>,
    pub tracks: Vec<TrackEntry>,
    pub editions: Vec<EditionEntry>,
    pub cues: Vec<CuePoint>,
    pub attachments: Vec<AttachedFile>,
    /// Stream offset of the first Cluster.
    pub first_cluster: Option<u64>,
}

impl SegmentTree {
    /// Nanoseconds per tick, from Info or the Matroska default.
    pub fn timecode_scale(&self) -> u64 {
        self.info.as_ref().map_or(1_000_000, |i| i.timecode_scale)
    }
}

/// Validate the EBML header and parse every segment in the stream.
///
/// Returns an empty list when the header is valid but no segment could
/// be read.
pub fn parse_segments<R: Read + Seek>(src: &mut R) -> Result<Vec<SegmentTree>> {
    let stream_len = src.seek(SeekFrom::End(0))?;
    src.seek(SeekFrom::Start(0))?;

    let header = read_header(src)?.ok_or(EbmlError::NotEbml)?;
    if header.id != id::EBML {
        return Err(EbmlError::NotEbml);
    }
    check_doc_type(&read_body(src, &header)?)?;

    let mut segments = Vec::new();
    let mut pos = header.end().ok_or(EbmlError::NotEbml)?;
    while pos < stream_len {
        src.seek(SeekFrom::Start(pos))?;
        let header = match read_header(src) {
            Ok(Some(header)) => header,
            Ok(None) => break,
            Err(e) => {
                warn!(position = pos, error = %e, "stopping top-level scan");
                break;
            }
        };
        if header.id == id::SEGMENT {
            let tree = parse_segment(src, &header, stream_len)?;
            debug!(
                offset = tree.offset,
                tracks = tree.tracks.len(),
                editions = tree.editions.len(),
                "parsed segment"
            );
            pos = tree.data_end;
            segments.push(tree);
        } else {
            match header.end() {
                Some(end) => pos = end,
                None => break,
            }
        }
    }
    Ok(segments)
}

fn check_doc_type(body: &[u8]) -> Result<()> {
    for child in children(body) {
        let (child_id, value) = child?;
        if child_id == id::DOC_TYPE {
            let doc_type = read_string(value);
            return match doc_type.as_str() {
                "matroska" | "webm" => Ok(()),
                _ => Err(EbmlError::UnsupportedDocType(doc_type)),
            };
        }
    }
    Ok(())
}

fn parse_segment<R: Read + Seek>(
    src: &mut R,
    header: &ElementHeader,
    stream_len: u64,
) -> Result<SegmentTree> {
    let data_end = header.end().map_or(stream_len, |end| end.min(stream_len));
    let mut tree = SegmentTree {
        offset: header.offset,
        data_start: header.data_offset,
        data_end,
        ..Default::default()
    };
    let mut seen = HashSet::new();
    let mut seek_entries = Vec::new();

    let mut pos = tree.data_start;
    while pos < data_end {
        src.seek(SeekFrom::Start(pos))?;
        let child = match read_header(src) {
            Ok(Some(child)) => child,
            Ok(None) => break,
            Err(e) => {
                warn!(position = pos, error = %e, "invalid element in segment");
                break;
            }
        };
        if child.id == id::CLUSTER {
            tree.first_cluster.get_or_insert(child.offset);
        } else if child.id == id::SEEK_HEAD {
            if let Some(body) = read_guarded(src, &child) {
                match parse_seek_head(&body) {
                    Ok(entries) => seek_entries.extend(entries),
                    Err(e) => warn!(error = %e, "ignoring malformed seek head"),
                }
            }
        } else if !seen.contains(&child.id) {
            load_element(src, &child, &mut tree, &mut seen);
        }
        match child.end() {
            Some(end) => pos = end,
            None => break,
        }
    }

    // Elements after an unknown-size cluster are only reachable via the
    // seek head.
    for (target, relative) in seek_entries {
        if seen.contains(&target) || target == id::CLUSTER || target == id::SEEK_HEAD {
            continue;
        }
        let position = tree.data_start + relative;
        if position >= data_end {
            continue;
        }
        src.seek(SeekFrom::Start(position))?;
        match read_header(src) {
            Ok(Some(child)) if child.id == target => load_element(src, &child, &mut tree, &mut seen),
            _ => warn!(position, target = format_args!("0x{:X}", target), "seek head entry mismatch"),
        }
    }

    Ok(tree)
}

fn read_guarded<R: Read + Seek>(src: &mut R, header: &ElementHeader) -> Option<Vec<u8>> {
    match read_body(src, header) {
        Ok(body) => Some(body),
        Err(e) => {
            warn!(id = format_args!("0x{:X}", header.id), error = %e, "skipping element");
            None
        }
    }
}

fn load_element<R: Read + Seek>(
    src: &mut R,
    header: &ElementHeader,
    tree: &mut SegmentTree,
    seen: &mut HashSet<u32>,
) {
    let wanted = matches!(
        header.id,
        id::INFO | id::TRACKS | id::CHAPTERS | id::CUES | id::ATTACHMENTS
    );
    if !wanted {
        return;
    }
    let Some(body) = read_guarded(src, header) else {
        return;
    };
    seen.insert(header.id);
    let parsed = match header.id {
        id::INFO => SegmentInfo::parse(&body).map(|info| tree.info = Some(info)),
        id::TRACKS => parse_tracks(&body).map(|tracks| tree.tracks = tracks),
        id::CHAPTERS => parse_chapters(&body).map(|editions| tree.editions = editions),
        id::CUES => parse_cues(&body, tree.data_start).map(|cues| tree.cues = cues),
        _ => parse_attachments(&body).map(|files| tree.attachments = files),
    };
    if let Err(e) = parsed {
        warn!(id = format_args!("0x{:X}", header.id), error = %e, "ignoring malformed element");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::write::ElementWriter;
    use assert_matches::assert_matches;
    use std::io::Cursor;

    #[test]
    fn test_rejects_non_ebml() {
        let mut src = Cursor::new(b"RIFF0000WAVE".to_vec());
        assert_matches!(parse_segments(&mut src), Err(EbmlError::NotEbml));
    }

    #[test]
    fn test_rejects_foreign_doc_type() {
        let mut w = ElementWriter::new();
        w.ebml_header("fancy");
        let mut src = Cursor::new(w.finish());
        assert_matches!(parse_segments(&mut src), Err(EbmlError::UnsupportedDocType(t)) if t == "fancy");
    }

    #[test]
    fn test_header_only_has_no_segments() {
        let mut w = ElementWriter::new();
        w.ebml_header("webm");
        let mut src = Cursor::new(w.finish());
        assert!(parse_segments(&mut src).unwrap().is_empty());
    }
}

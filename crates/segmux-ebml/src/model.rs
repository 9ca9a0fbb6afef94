//! Typed trees for the descriptive top-level elements of a segment.
//!
//! Every parser here works on an already-buffered element payload and
//! ignores children it does not know about (Void, CRC-32, Tags, ...).

use crate::element as id;
use crate::error::{EbmlError, Result};
use crate::reader::{children, read_float, read_flag, read_int, read_string, read_uint};

/// Matroska TrackType values.
pub mod track_type {
    /// Video track.
    pub const VIDEO: u64 = 0x01;
    /// Audio track.
    pub const AUDIO: u64 = 0x02;
    /// Combined audio/video track.
    pub const COMPLEX: u64 = 0x03;
    /// Logo overlay.
    pub const LOGO: u64 = 0x10;
    /// Subtitle track.
    pub const SUBTITLE: u64 = 0x11;
    /// Menu buttons.
    pub const BUTTONS: u64 = 0x12;
    /// Control track.
    pub const CONTROL: u64 = 0x20;
}

/// Segment Info element.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentInfo {
    pub uid: Option<Vec<u8>>,
    pub prev_uid: Option<Vec<u8>>,
    pub next_uid: Option<Vec<u8>>,
    pub families: Vec<Vec<u8>>,
    /// Nanoseconds per tick.
    pub timecode_scale: u64,
    /// Duration in ticks (float, as stored).
    pub duration: Option<f64>,
    pub title: Option<String>,
    pub muxing_app: Option<String>,
    pub writing_app: Option<String>,
    /// Nanoseconds since 2001-01-01T00:00:00 UTC.
    pub date_utc: Option<i64>,
    pub translations: Vec<ChapterTranslate>,
}

impl Default for SegmentInfo {
    fn default() -> Self {
        Self {
            uid: None,
            prev_uid: None,
            next_uid: None,
            families: Vec::new(),
            timecode_scale: 1_000_000,
            duration: None,
            title: None,
            muxing_app: None,
            writing_app: None,
            date_utc: None,
            translations: Vec::new(),
        }
    }
}

impl SegmentInfo {
    /// Parse an Info payload.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut info = Self::default();
        for child in children(data) {
            let (child_id, body) = child?;
            match child_id {
                id::SEGMENT_UID => info.uid = Some(body.to_vec()),
                id::PREV_UID => info.prev_uid = Some(body.to_vec()),
                id::NEXT_UID => info.next_uid = Some(body.to_vec()),
                id::SEGMENT_FAMILY => info.families.push(body.to_vec()),
                id::TIMECODE_SCALE => {
                    let scale = read_uint(body)?;
                    if scale > 0 {
                        info.timecode_scale = scale;
                    }
                }
                id::DURATION => info.duration = Some(read_float(body)?),
                id::TITLE => info.title = Some(read_string(body)),
                id::MUXING_APP => info.muxing_app = Some(read_string(body)),
                id::WRITING_APP => info.writing_app = Some(read_string(body)),
                id::DATE_UTC => info.date_utc = Some(read_int(body)?),
                id::CHAPTER_TRANSLATE => info.translations.push(ChapterTranslate::parse(body)?),
                _ => {}
            }
        }
        Ok(info)
    }
}

/// ChapterTranslate entry (maps editions to a chapter codec's ids).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChapterTranslate {
    /// 0 = Matroska script, 1 = DVD menu.
    pub codec: u64,
    pub id: Vec<u8>,
    pub edition_uids: Vec<u64>,
}

impl ChapterTranslate {
    /// DVD-menu chapter codec.
    pub const CODEC_DVD: u64 = 1;

    /// Parse a ChapterTranslate payload.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut translate = Self::default();
        for child in children(data) {
            let (child_id, body) = child?;
            match child_id {
                id::CHAPTER_TRANSLATE_CODEC => translate.codec = read_uint(body)?,
                id::CHAPTER_TRANSLATE_ID => translate.id = body.to_vec(),
                id::CHAPTER_TRANSLATE_EDITION_UID => translate.edition_uids.push(read_uint(body)?),
                _ => {}
            }
        }
        Ok(translate)
    }
}

/// Compression settings from a ContentEncoding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentCompression {
    /// 0 = zlib, 1 = bzlib, 2 = lzo1x, 3 = header stripping.
    pub algo: u64,
    pub settings: Vec<u8>,
}

/// One ContentEncoding of a track.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentEncoding {
    pub order: u64,
    /// Bit set: 1 = frames, 2 = codec private, 4 = next encoding.
    pub scope: u64,
    /// 0 = compression, 1 = encryption.
    pub kind: u64,
    pub compression: Option<ContentCompression>,
}

impl Default for ContentEncoding {
    fn default() -> Self {
        Self {
            order: 0,
            scope: 1,
            kind: 0,
            compression: None,
        }
    }
}

impl ContentEncoding {
    fn parse(data: &[u8]) -> Result<Self> {
        let mut encoding = Self::default();
        for child in children(data) {
            let (child_id, body) = child?;
            match child_id {
                id::CONTENT_ENCODING_ORDER => encoding.order = read_uint(body)?,
                id::CONTENT_ENCODING_SCOPE => encoding.scope = read_uint(body)?,
                id::CONTENT_ENCODING_TYPE => encoding.kind = read_uint(body)?,
                id::CONTENT_COMPRESSION => {
                    let mut compression = ContentCompression::default();
                    for inner in children(body) {
                        let (inner_id, value) = inner?;
                        match inner_id {
                            id::CONTENT_COMP_ALGO => compression.algo = read_uint(value)?,
                            id::CONTENT_COMP_SETTINGS => compression.settings = value.to_vec(),
                            _ => {}
                        }
                    }
                    encoding.compression = Some(compression);
                }
                _ => {}
            }
        }
        Ok(encoding)
    }
}

/// Video settings of a track.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoSettings {
    pub pixel_width: u64,
    pub pixel_height: u64,
}

/// Audio settings of a track.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSettings {
    pub sampling_frequency: f64,
    pub output_sampling_frequency: Option<f64>,
    pub channels: u64,
    pub bit_depth: Option<u64>,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sampling_frequency: 8000.0,
            output_sampling_frequency: None,
            channels: 1,
            bit_depth: None,
        }
    }
}

/// A TrackEntry.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackEntry {
    pub number: u64,
    pub uid: u64,
    pub track_type: u64,
    pub codec_id: String,
    pub codec_private: Vec<u8>,
    pub codec_name: Option<String>,
    /// Nanoseconds.
    pub default_duration: Option<u64>,
    /// Nanoseconds.
    pub codec_delay: u64,
    /// Nanoseconds.
    pub seek_pre_roll: u64,
    pub timecode_scale: f64,
    pub name: Option<String>,
    pub language: String,
    pub flag_enabled: bool,
    pub flag_default: bool,
    pub flag_forced: bool,
    pub encodings: Vec<ContentEncoding>,
    pub video: Option<VideoSettings>,
    pub audio: Option<AudioSettings>,
}

impl Default for TrackEntry {
    fn default() -> Self {
        Self {
            number: 0,
            uid: 0,
            track_type: 0,
            codec_id: String::new(),
            codec_private: Vec::new(),
            codec_name: None,
            default_duration: None,
            codec_delay: 0,
            seek_pre_roll: 0,
            timecode_scale: 1.0,
            name: None,
            language: "eng".to_string(),
            flag_enabled: true,
            flag_default: true,
            flag_forced: false,
            encodings: Vec::new(),
            video: None,
            audio: None,
        }
    }
}

impl TrackEntry {
    /// Parse a TrackEntry payload.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut track = Self::default();
        for child in children(data) {
            let (child_id, body) = child?;
            match child_id {
                id::TRACK_NUMBER => track.number = read_uint(body)?,
                id::TRACK_UID => track.uid = read_uint(body)?,
                id::TRACK_TYPE => track.track_type = read_uint(body)?,
                id::CODEC_ID => track.codec_id = read_string(body),
                id::CODEC_PRIVATE => track.codec_private = body.to_vec(),
                id::CODEC_NAME => track.codec_name = Some(read_string(body)),
                id::DEFAULT_DURATION => {
                    let duration = read_uint(body)?;
                    track.default_duration = (duration > 0).then_some(duration);
                }
                id::CODEC_DELAY => track.codec_delay = read_uint(body)?,
                id::SEEK_PRE_ROLL => track.seek_pre_roll = read_uint(body)?,
                id::TRACK_TIMECODE_SCALE => {
                    let scale = read_float(body)?;
                    if scale > 0.0 {
                        track.timecode_scale = scale;
                    }
                }
                id::NAME => track.name = Some(read_string(body)),
                id::LANGUAGE => track.language = read_string(body),
                id::FLAG_ENABLED => track.flag_enabled = read_flag(body)?,
                id::FLAG_DEFAULT => track.flag_default = read_flag(body)?,
                id::FLAG_FORCED => track.flag_forced = read_flag(body)?,
                id::CONTENT_ENCODINGS => {
                    for encoding in children(body) {
                        let (encoding_id, value) = encoding?;
                        if encoding_id == id::CONTENT_ENCODING {
                            track.encodings.push(ContentEncoding::parse(value)?);
                        }
                    }
                    track.encodings.sort_by_key(|e| e.order);
                }
                id::VIDEO => {
                    let mut video = VideoSettings::default();
                    for setting in children(body) {
                        let (setting_id, value) = setting?;
                        match setting_id {
                            id::PIXEL_WIDTH => video.pixel_width = read_uint(value)?,
                            id::PIXEL_HEIGHT => video.pixel_height = read_uint(value)?,
                            _ => {}
                        }
                    }
                    track.video = Some(video);
                }
                id::AUDIO => {
                    let mut audio = AudioSettings::default();
                    for setting in children(body) {
                        let (setting_id, value) = setting?;
                        match setting_id {
                            id::SAMPLING_FREQUENCY => audio.sampling_frequency = read_float(value)?,
                            id::OUTPUT_SAMPLING_FREQUENCY => {
                                audio.output_sampling_frequency = Some(read_float(value)?)
                            }
                            id::CHANNELS => audio.channels = read_uint(value)?,
                            id::BIT_DEPTH => audio.bit_depth = Some(read_uint(value)?),
                            _ => {}
                        }
                    }
                    track.audio = Some(audio);
                }
                _ => {}
            }
        }
        if track.number == 0 {
            return Err(EbmlError::MissingElement("TrackNumber"));
        }
        Ok(track)
    }
}

/// Parse a Tracks payload into its entries.
pub fn parse_tracks(data: &[u8]) -> Result<Vec<TrackEntry>> {
    let mut tracks = Vec::new();
    for child in children(data) {
        let (child_id, body) = child?;
        if child_id == id::TRACK_ENTRY {
            tracks.push(TrackEntry::parse(body)?);
        }
    }
    Ok(tracks)
}

/// One ChapterDisplay.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChapterDisplay {
    pub string: String,
    pub language: Option<String>,
}

/// A ChapterAtom with its nested atoms.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterAtom {
    pub uid: u64,
    /// Nanoseconds, segment relative.
    pub time_start: u64,
    /// Nanoseconds, segment relative.
    pub time_end: Option<u64>,
    pub hidden: bool,
    pub enabled: bool,
    pub segment_uid: Option<Vec<u8>>,
    pub segment_edition_uid: Option<u64>,
    pub displays: Vec<ChapterDisplay>,
    pub children: Vec<ChapterAtom>,
}

impl Default for ChapterAtom {
    fn default() -> Self {
        Self {
            uid: 0,
            time_start: 0,
            time_end: None,
            hidden: false,
            enabled: true,
            segment_uid: None,
            segment_edition_uid: None,
            displays: Vec::new(),
            children: Vec::new(),
        }
    }
}

impl ChapterAtom {
    fn parse(data: &[u8]) -> Result<Self> {
        let mut atom = Self::default();
        for child in children(data) {
            let (child_id, body) = child?;
            match child_id {
                id::CHAPTER_UID => atom.uid = read_uint(body)?,
                id::CHAPTER_TIME_START => atom.time_start = read_uint(body)?,
                id::CHAPTER_TIME_END => atom.time_end = Some(read_uint(body)?),
                id::CHAPTER_FLAG_HIDDEN => atom.hidden = read_flag(body)?,
                id::CHAPTER_FLAG_ENABLED => atom.enabled = read_flag(body)?,
                id::CHAPTER_SEGMENT_UID => atom.segment_uid = Some(body.to_vec()),
                id::CHAPTER_SEGMENT_EDITION_UID => atom.segment_edition_uid = Some(read_uint(body)?),
                id::CHAPTER_DISPLAY => {
                    let mut display = ChapterDisplay::default();
                    for inner in children(body) {
                        let (inner_id, value) = inner?;
                        match inner_id {
                            id::CHAP_STRING => display.string = read_string(value),
                            id::CHAP_LANGUAGE => display.language = Some(read_string(value)),
                            _ => {}
                        }
                    }
                    atom.displays.push(display);
                }
                id::CHAPTER_ATOM => atom.children.push(ChapterAtom::parse(body)?),
                _ => {}
            }
        }
        Ok(atom)
    }

    /// First display string, if any.
    pub fn name(&self) -> Option<&str> {
        self.displays.first().map(|d| d.string.as_str())
    }
}

/// An EditionEntry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditionEntry {
    pub uid: u64,
    pub hidden: bool,
    pub default: bool,
    pub ordered: bool,
    pub chapters: Vec<ChapterAtom>,
}

impl EditionEntry {
    fn parse(data: &[u8]) -> Result<Self> {
        let mut edition = Self::default();
        for child in children(data) {
            let (child_id, body) = child?;
            match child_id {
                id::EDITION_UID => edition.uid = read_uint(body)?,
                id::EDITION_FLAG_HIDDEN => edition.hidden = read_flag(body)?,
                id::EDITION_FLAG_DEFAULT => edition.default = read_flag(body)?,
                id::EDITION_FLAG_ORDERED => edition.ordered = read_flag(body)?,
                id::CHAPTER_ATOM => edition.chapters.push(ChapterAtom::parse(body)?),
                _ => {}
            }
        }
        Ok(edition)
    }
}

/// Parse a Chapters payload into its editions.
pub fn parse_chapters(data: &[u8]) -> Result<Vec<EditionEntry>> {
    let mut editions = Vec::new();
    for child in children(data) {
        let (child_id, body) = child?;
        if child_id == id::EDITION_ENTRY {
            editions.push(EditionEntry::parse(body)?);
        }
    }
    Ok(editions)
}

/// One (time, track, cluster) cue reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CuePoint {
    /// Ticks.
    pub time: u64,
    pub track: u64,
    /// Absolute stream offset of the cluster.
    pub cluster_position: u64,
}

/// Parse a Cues payload. Cluster positions are made absolute using the
/// segment's data start.
pub fn parse_cues(data: &[u8], segment_data_start: u64) -> Result<Vec<CuePoint>> {
    let mut cues = Vec::new();
    for child in children(data) {
        let (child_id, body) = child?;
        if child_id != id::CUE_POINT {
            continue;
        }
        let mut time = None;
        let mut positions = Vec::new();
        for inner in children(body) {
            let (inner_id, value) = inner?;
            match inner_id {
                id::CUE_TIME => time = Some(read_uint(value)?),
                id::CUE_TRACK_POSITIONS => {
                    let mut track = 0;
                    let mut position = None;
                    for field in children(value) {
                        let (field_id, field_value) = field?;
                        match field_id {
                            id::CUE_TRACK => track = read_uint(field_value)?,
                            id::CUE_CLUSTER_POSITION => position = Some(read_uint(field_value)?),
                            _ => {}
                        }
                    }
                    if let Some(position) = position {
                        positions.push((track, position));
                    }
                }
                _ => {}
            }
        }
        let Some(time) = time else { continue };
        for (track, position) in positions {
            cues.push(CuePoint {
                time,
                track,
                cluster_position: segment_data_start + position,
            });
        }
    }
    cues.sort_by_key(|c| c.time);
    Ok(cues)
}

/// An AttachedFile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttachedFile {
    pub uid: u64,
    pub name: String,
    pub mime_type: String,
    pub description: Option<String>,
    pub data: Vec<u8>,
}

/// Parse an Attachments payload.
pub fn parse_attachments(data: &[u8]) -> Result<Vec<AttachedFile>> {
    let mut files = Vec::new();
    for child in children(data) {
        let (child_id, body) = child?;
        if child_id != id::ATTACHED_FILE {
            continue;
        }
        let mut file = AttachedFile::default();
        for inner in children(body) {
            let (inner_id, value) = inner?;
            match inner_id {
                id::FILE_UID => file.uid = read_uint(value)?,
                id::FILE_NAME => file.name = read_string(value),
                id::FILE_MIME_TYPE => file.mime_type = read_string(value),
                id::FILE_DESCRIPTION => file.description = Some(read_string(value)),
                id::FILE_DATA => file.data = value.to_vec(),
                _ => {}
            }
        }
        files.push(file);
    }
    Ok(files)
}

/// Parse a SeekHead payload into (element id, segment-relative position).
pub fn parse_seek_head(data: &[u8]) -> Result<Vec<(u32, u64)>> {
    let mut entries = Vec::new();
    for child in children(data) {
        let (child_id, body) = child?;
        if child_id != id::SEEK {
            continue;
        }
        let mut target = None;
        let mut position = None;
        for inner in children(body) {
            let (inner_id, value) = inner?;
            match inner_id {
                id::SEEK_ID => target = Some(read_uint(value)? as u32),
                id::SEEK_POSITION => position = Some(read_uint(value)?),
                _ => {}
            }
        }
        if let (Some(target), Some(position)) = (target, position) {
            entries.push((target, position));
        }
    }
    Ok(entries)
}

//! Matroska element ids used by the parser and the fixture writer.
//!
//! Ids keep their VINT marker bits, matching how they appear on disk.

// =============================================================================
// EBML header
// =============================================================================

/// EBML header.
pub const EBML: u32 = 0x1A45DFA3;
/// Doc type string (`matroska`, `webm`).
pub const DOC_TYPE: u32 = 0x4282;
/// Doc type version.
pub const DOC_TYPE_VERSION: u32 = 0x4287;

/// Magic bytes every Matroska stream starts with.
pub const EBML_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];

// =============================================================================
// Global elements
// =============================================================================

/// Padding.
pub const VOID: u32 = 0xEC;
/// CRC-32 checksum.
pub const CRC32: u32 = 0xBF;

// =============================================================================
// Segment and seeking
// =============================================================================

/// Segment (root of all Matroska data).
pub const SEGMENT: u32 = 0x18538067;
/// SeekHead (index of top-level elements).
pub const SEEK_HEAD: u32 = 0x114D9B74;
/// Seek entry.
pub const SEEK: u32 = 0x4DBB;
/// Seek target id.
pub const SEEK_ID: u32 = 0x53AB;
/// Seek target position, relative to the segment data start.
pub const SEEK_POSITION: u32 = 0x53AC;

// =============================================================================
// Segment information
// =============================================================================

/// Segment Info.
pub const INFO: u32 = 0x1549A966;
/// Segment UID (16 bytes).
pub const SEGMENT_UID: u32 = 0x73A4;
/// Previous segment UID (hard link).
pub const PREV_UID: u32 = 0x3CB923;
/// Next segment UID (hard link).
pub const NEXT_UID: u32 = 0x3EB923;
/// Segment family UID.
pub const SEGMENT_FAMILY: u32 = 0x4444;
/// Chapter translation.
pub const CHAPTER_TRANSLATE: u32 = 0x6924;
/// Chapter translation codec.
pub const CHAPTER_TRANSLATE_CODEC: u32 = 0x69BF;
/// Chapter translation id.
pub const CHAPTER_TRANSLATE_ID: u32 = 0x69A5;
/// Chapter translation edition UID.
pub const CHAPTER_TRANSLATE_EDITION_UID: u32 = 0x69FC;
/// Timecode scale in nanoseconds per tick.
pub const TIMECODE_SCALE: u32 = 0x2AD7B1;
/// Duration in ticks (float).
pub const DURATION: u32 = 0x4489;
/// Date, nanoseconds since 2001-01-01.
pub const DATE_UTC: u32 = 0x4461;
/// Title.
pub const TITLE: u32 = 0x7BA9;
/// Muxing application.
pub const MUXING_APP: u32 = 0x4D80;
/// Writing application.
pub const WRITING_APP: u32 = 0x5741;

// =============================================================================
// Clusters and blocks
// =============================================================================

/// Cluster.
pub const CLUSTER: u32 = 0x1F43B675;
/// Cluster timecode.
pub const TIMECODE: u32 = 0xE7;
/// Cluster position.
pub const POSITION: u32 = 0xA7;
/// Previous cluster size.
pub const PREV_SIZE: u32 = 0xAB;
/// SimpleBlock.
pub const SIMPLE_BLOCK: u32 = 0xA3;
/// BlockGroup.
pub const BLOCK_GROUP: u32 = 0xA0;
/// Block inside a BlockGroup.
pub const BLOCK: u32 = 0xA1;
/// Block duration in ticks.
pub const BLOCK_DURATION: u32 = 0x9B;
/// Reference block (present ⇒ not a key frame).
pub const REFERENCE_BLOCK: u32 = 0xFB;
/// Discard padding in nanoseconds.
pub const DISCARD_PADDING: u32 = 0x75A2;

// =============================================================================
// Tracks
// =============================================================================

/// Tracks.
pub const TRACKS: u32 = 0x1654AE6B;
/// Track entry.
pub const TRACK_ENTRY: u32 = 0xAE;
/// Track number.
pub const TRACK_NUMBER: u32 = 0xD7;
/// Track UID.
pub const TRACK_UID: u32 = 0x73C5;
/// Track type.
pub const TRACK_TYPE: u32 = 0x83;
/// Enabled flag.
pub const FLAG_ENABLED: u32 = 0xB9;
/// Default flag.
pub const FLAG_DEFAULT: u32 = 0x88;
/// Forced flag.
pub const FLAG_FORCED: u32 = 0x55AA;
/// Lacing flag.
pub const FLAG_LACING: u32 = 0x9C;
/// Default frame duration in nanoseconds.
pub const DEFAULT_DURATION: u32 = 0x23E383;
/// Track timecode scale (float).
pub const TRACK_TIMECODE_SCALE: u32 = 0x23314F;
/// Track name.
pub const NAME: u32 = 0x536E;
/// Track language.
pub const LANGUAGE: u32 = 0x22B59C;
/// Codec id.
pub const CODEC_ID: u32 = 0x86;
/// Codec private data.
pub const CODEC_PRIVATE: u32 = 0x63A2;
/// Codec name.
pub const CODEC_NAME: u32 = 0x258688;
/// Codec delay in nanoseconds.
pub const CODEC_DELAY: u32 = 0x56AA;
/// Seek pre-roll in nanoseconds.
pub const SEEK_PRE_ROLL: u32 = 0x56BB;
/// Video settings.
pub const VIDEO: u32 = 0xE0;
/// Pixel width.
pub const PIXEL_WIDTH: u32 = 0xB0;
/// Pixel height.
pub const PIXEL_HEIGHT: u32 = 0xBA;
/// Audio settings.
pub const AUDIO: u32 = 0xE1;
/// Sampling frequency (float).
pub const SAMPLING_FREQUENCY: u32 = 0xB5;
/// Output sampling frequency (float).
pub const OUTPUT_SAMPLING_FREQUENCY: u32 = 0x78B5;
/// Channel count.
pub const CHANNELS: u32 = 0x9F;
/// Bit depth.
pub const BIT_DEPTH: u32 = 0x6264;
/// Content encodings.
pub const CONTENT_ENCODINGS: u32 = 0x6D80;
/// Content encoding.
pub const CONTENT_ENCODING: u32 = 0x6240;
/// Encoding order.
pub const CONTENT_ENCODING_ORDER: u32 = 0x5031;
/// Encoding scope bit mask.
pub const CONTENT_ENCODING_SCOPE: u32 = 0x5032;
/// Encoding type (0 = compression).
pub const CONTENT_ENCODING_TYPE: u32 = 0x5033;
/// Compression settings.
pub const CONTENT_COMPRESSION: u32 = 0x5034;
/// Compression algorithm.
pub const CONTENT_COMP_ALGO: u32 = 0x4254;
/// Compression settings payload (stripped header bytes).
pub const CONTENT_COMP_SETTINGS: u32 = 0x4255;

// =============================================================================
// Cues
// =============================================================================

/// Cues.
pub const CUES: u32 = 0x1C53BB6B;
/// Cue point.
pub const CUE_POINT: u32 = 0xBB;
/// Cue time in ticks.
pub const CUE_TIME: u32 = 0xB3;
/// Cue track positions.
pub const CUE_TRACK_POSITIONS: u32 = 0xB7;
/// Cue track.
pub const CUE_TRACK: u32 = 0xF7;
/// Cluster position relative to the segment data start.
pub const CUE_CLUSTER_POSITION: u32 = 0xF1;

// =============================================================================
// Chapters
// =============================================================================

/// Chapters.
pub const CHAPTERS: u32 = 0x1043A770;
/// Edition entry.
pub const EDITION_ENTRY: u32 = 0x45B9;
/// Edition UID.
pub const EDITION_UID: u32 = 0x45BC;
/// Edition hidden flag.
pub const EDITION_FLAG_HIDDEN: u32 = 0x45BD;
/// Edition default flag.
pub const EDITION_FLAG_DEFAULT: u32 = 0x45DB;
/// Edition ordered flag.
pub const EDITION_FLAG_ORDERED: u32 = 0x45DD;
/// Chapter atom.
pub const CHAPTER_ATOM: u32 = 0xB6;
/// Chapter UID.
pub const CHAPTER_UID: u32 = 0x73C4;
/// Chapter start in nanoseconds.
pub const CHAPTER_TIME_START: u32 = 0x91;
/// Chapter end in nanoseconds.
pub const CHAPTER_TIME_END: u32 = 0x92;
/// Chapter hidden flag.
pub const CHAPTER_FLAG_HIDDEN: u32 = 0x98;
/// Chapter enabled flag.
pub const CHAPTER_FLAG_ENABLED: u32 = 0x4598;
/// Linked segment UID.
pub const CHAPTER_SEGMENT_UID: u32 = 0x6E67;
/// Linked segment edition UID.
pub const CHAPTER_SEGMENT_EDITION_UID: u32 = 0x6EBC;
/// Chapter display.
pub const CHAPTER_DISPLAY: u32 = 0x80;
/// Chapter display string.
pub const CHAP_STRING: u32 = 0x85;
/// Chapter display language.
pub const CHAP_LANGUAGE: u32 = 0x437C;

// =============================================================================
// Attachments
// =============================================================================

/// Attachments.
pub const ATTACHMENTS: u32 = 0x1941A469;
/// Attached file.
pub const ATTACHED_FILE: u32 = 0x61A7;
/// File description.
pub const FILE_DESCRIPTION: u32 = 0x467E;
/// File name.
pub const FILE_NAME: u32 = 0x466E;
/// File MIME type.
pub const FILE_MIME_TYPE: u32 = 0x4660;
/// File data.
pub const FILE_DATA: u32 = 0x465C;
/// File UID.
pub const FILE_UID: u32 = 0x46AE;

// =============================================================================
// Tags
// =============================================================================

/// Tags (skipped).
pub const TAGS: u32 = 0x1254C367;

/// Whether `id` is a level-1 child of a Segment.
pub fn is_top_level(id: u32) -> bool {
    matches!(
        id,
        SEEK_HEAD | INFO | TRACKS | CLUSTER | CUES | CHAPTERS | ATTACHMENTS | TAGS
    )
}

//! Demuxer behavior switches.

/// Options read once at open time.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct DemuxConfig {
    /// Play ordered editions in their declared chapter order.
    pub use_ordered_chapters: bool,
    /// Look for linked segments in sibling files.
    pub preload_local_dir: bool,
    /// Always seek by fraction of the file, ignoring cues.
    pub seek_percent: bool,
    /// Minimum clock advance before a new reference is published (µs).
    pub clock_threshold_us: i64,
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self {
            use_ordered_chapters: true,
            preload_local_dir: true,
            seek_percent: false,
            clock_threshold_us: 300_000,
        }
    }
}

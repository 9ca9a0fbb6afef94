use segmux_demux::DemuxConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub demux: DemuxConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// How the `demux` command reports frames.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Bytes of each payload shown in hex (0 disables the preview)
    #[serde(default = "default_preview_bytes")]
    pub preview_bytes: usize,

    /// Also report frames decoded only to reach a seek target
    #[serde(default = "default_show_preroll")]
    pub show_preroll: bool,

    /// Stop after this many frames unless `--limit` is given
    #[serde(default)]
    pub max_frames: Option<usize>,
}

fn default_preview_bytes() -> usize {
    8
}

fn default_show_preroll() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            preview_bytes: default_preview_bytes(),
            show_preroll: default_show_preroll(),
            max_frames: None,
        }
    }
}

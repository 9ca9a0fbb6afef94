use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "segmux")]
#[command(author, version, about = "Matroska demuxer with linked segment and ordered chapter playback")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show duration, tracks and metadata of a file
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List editions and chapters on the virtual timeline
    Chapters {
        /// File to inspect
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print demuxed frames
    Demux {
        /// File to demux
        #[arg(required = true)]
        file: PathBuf,

        /// Start at this virtual time, in seconds
        #[arg(long, conflicts_with = "seek_percent")]
        seek_time: Option<f64>,

        /// Start at this percentage of the duration
        #[arg(long)]
        seek_percent: Option<f64>,

        /// Play this edition (1-based)
        #[arg(long)]
        title: Option<usize>,

        /// Stop after this many frames
        #[arg(short, long)]
        limit: Option<usize>,

        /// One JSON object per frame
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration file
    CheckConfig {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },
}

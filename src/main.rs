mod cli;

use segmux::{config, discovery::DirectorySiblings, output};
use segmux_common::EsId;
use segmux_demux::{
    ControlError, ControlQuery, ControlReply, DemuxOutcome, Demuxer, Frame, NoSiblings,
    OutputSink, SiblingSource, Track, VirtualChapter,
};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::Ordering;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "segmux=trace,segmux_demux=trace,segmux_ebml=debug,segmux_common=debug".to_string()
        } else {
            "segmux=info,segmux_demux=warn,segmux_ebml=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Probe { file, json } => probe_file(&file, cli.config.as_deref(), json),
        Commands::Chapters { file, json } => list_chapters(&file, cli.config.as_deref(), json),
        Commands::Demux {
            file,
            seek_time,
            seek_percent,
            title,
            limit,
            json,
        } => demux_file(
            &file,
            cli.config.as_deref(),
            DemuxOptions {
                seek_time,
                seek_percent,
                title,
                limit,
                json,
            },
        ),
        Commands::CheckConfig {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            check_config(path.as_deref())
        }
    }
}

struct DemuxOptions {
    seek_time: Option<f64>,
    seek_percent: Option<f64>,
    title: Option<usize>,
    limit: Option<usize>,
    json: bool,
}

fn open_file(
    file: &Path,
    config: &config::Config,
    sink: Box<dyn OutputSink>,
) -> Result<Demuxer> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let handle = File::open(file).with_context(|| format!("Failed to open {:?}", file))?;
    let mut siblings: Box<dyn SiblingSource> = if config.demux.preload_local_dir {
        Box::new(DirectorySiblings::for_file(file)?)
    } else {
        Box::new(NoSiblings)
    };

    let name = file.display().to_string();
    Demuxer::open(
        Box::new(BufReader::new(handle)),
        &name,
        sink,
        config.demux.clone(),
        siblings.as_mut(),
    )
    .with_context(|| format!("Failed to open {:?} as Matroska", file))
}

/// Sink for commands that never read frames.
struct Discard(u32);

impl OutputSink for Discard {
    fn add_track(&mut self, _track: &Track) -> Option<EsId> {
        self.0 += 1;
        Some(EsId::new(self.0))
    }

    fn remove_track(&mut self, _es: EsId) {}

    fn is_active(&mut self, _es: EsId) -> bool {
        false
    }

    fn send(&mut self, _es: EsId, _frame: Frame) {}

    fn set_clock(&mut self, _clock: i64) {}
}

fn probe_file(file: &Path, config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let demuxer = open_file(file, &config, Box::new(Discard(0)))?;

    let meta = match demuxer.control(ControlQuery::GetMeta) {
        Ok(ControlReply::Meta(meta)) => Some(meta),
        _ => None,
    };
    let report = output::ProbeReport::collect(&file.display().to_string(), &demuxer, meta);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("File: {}", report.file);
    println!("Duration: {}", output::format_us(report.duration_us));
    println!("Editions: {} (playing {})", report.editions, report.current_edition + 1);
    if let Some(ref meta) = report.meta {
        if let Some(ref title) = meta.title {
            println!("Title: {}", title);
        }
        if let Some(ref app) = meta.muxing_app {
            println!("Muxing app: {}", app);
        }
        if let Some(ref app) = meta.writing_app {
            println!("Writing app: {}", app);
        }
    }

    println!("\nTracks: {}", report.tracks.len());
    for track in &report.tracks {
        print!("  [{}] {:?} {}", track.number, track.kind, track.codec_id);
        if track.language != "und" {
            print!(" ({})", track.language);
        }
        if let Some(ref name) = track.name {
            print!(" \"{}\"", name);
        }
        if let Some(fps) = track.fps {
            print!(" {:.3} fps", fps);
        }
        if track.default {
            print!(" [default]");
        }
        println!();
    }

    match demuxer.control(ControlQuery::GetAttachments) {
        Ok(ControlReply::Attachments(attachments)) => {
            println!("\nAttachments: {}", attachments.len());
            for attachment in attachments {
                println!(
                    "  {} ({}, {} bytes)",
                    attachment.name,
                    attachment.mime_type,
                    attachment.data.len()
                );
            }
        }
        Err(ControlError::NoAttachments) => {}
        Err(e) => tracing::warn!("Cannot list attachments: {}", e),
        Ok(_) => {}
    }

    Ok(())
}

fn list_chapters(file: &Path, config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let demuxer = open_file(file, &config, Box::new(Discard(0)))?;
    let editions = demuxer.editions();

    if json {
        println!("{}", serde_json::to_string_pretty(&editions)?);
        return Ok(());
    }

    fn print_chapter(chapter: &VirtualChapter, depth: usize) {
        let indent = "  ".repeat(depth);
        print!(
            "{}{} - {}",
            indent,
            output::format_us(Some(chapter.virtual_start)),
            output::format_us(Some(chapter.virtual_stop))
        );
        print!(" {}", chapter.name.as_deref().unwrap_or("(unnamed)"));
        print!(" [segment {}]", chapter.segment.index());
        if chapter.hidden {
            print!(" [hidden]");
        }
        println!();
        for sub in &chapter.sub_chapters {
            print_chapter(sub, depth + 1);
        }
    }

    for (i, edition) in editions.iter().enumerate() {
        print!(
            "Edition {}: {} chapters, duration {}",
            i + 1,
            edition.chapters.len(),
            output::format_us(edition.duration)
        );
        if edition.ordered {
            print!(" [ordered]");
        }
        if edition.default {
            print!(" [default]");
        }
        if edition.unresolved > 0 {
            print!(" [{} unresolved]", edition.unresolved);
        }
        println!();
        for chapter in &edition.chapters {
            print_chapter(chapter, 1);
        }
    }

    Ok(())
}

fn demux_file(file: &Path, config_path: Option<&Path>, options: DemuxOptions) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let sink = output::PrintSink::new(&config.output, options.json);
    let printed = sink.counter();
    let demuxer = open_file(file, &config, Box::new(sink))?;

    if let Some(title) = options.title {
        if title == 0 {
            anyhow::bail!("Titles are numbered from 1");
        }
        demuxer
            .control(ControlQuery::SetTitle(title - 1))
            .with_context(|| format!("Cannot select title {}", title))?;
    }
    if let Some(secs) = options.seek_time {
        let target = (secs * 1_000_000.0).round() as i64;
        demuxer
            .control(ControlQuery::SetTime(target))
            .with_context(|| format!("Cannot seek to {}s", secs))?;
    }
    if let Some(percent) = options.seek_percent {
        demuxer
            .control(ControlQuery::SetPosition(percent / 100.0))
            .with_context(|| format!("Cannot seek to {}%", percent))?;
    }

    let limit = options.limit.or(config.output.max_frames);
    loop {
        if limit.is_some_and(|l| printed.load(Ordering::Relaxed) >= l) {
            break;
        }
        match demuxer.demux()? {
            DemuxOutcome::EndOfStream => {
                tracing::debug!("End of stream");
                break;
            }
            DemuxOutcome::Produced | DemuxOutcome::Progressed => {}
        }
    }

    tracing::info!("Printed {} frames", printed.load(Ordering::Relaxed));
    Ok(())
}

fn check_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    println!("  Ordered chapters: {}", config.demux.use_ordered_chapters);
    println!("  Preload local dir: {}", config.demux.preload_local_dir);
    println!("  Seek by percent: {}", config.demux.seek_percent);
    println!("  Clock threshold: {} us", config.demux.clock_threshold_us);
    println!("  Preview bytes: {}", config.output.preview_bytes);
    println!("  Show preroll: {}", config.output.show_preroll);
    if let Some(max) = config.output.max_frames {
        println!("  Max frames: {}", max);
    }

    Ok(())
}

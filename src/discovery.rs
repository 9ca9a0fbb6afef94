//! Sibling file discovery.
//!
//! Linked segments usually sit next to the file being opened. This module
//! offers every Matroska-looking file of that directory as a candidate.

use segmux_common::{Error, Result};
use segmux_demux::{Candidate, SiblingSource};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Extensions probed for linked segments.
pub const SIBLING_EXTENSIONS: &[&str] = &["mkv", "mka", "mk3d"];

/// Offers the Matroska files found beside an opened file.
#[derive(Debug, Clone)]
pub struct DirectorySiblings {
    dir: PathBuf,
    opened: PathBuf,
}

impl DirectorySiblings {
    /// Siblings of `file`, which must exist.
    pub fn for_file(file: &Path) -> Result<Self> {
        let opened = file
            .canonicalize()
            .map_err(|_| Error::not_found(file.display().to_string()))?;
        let dir = opened
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::invalid_input(format!("{} has no parent directory", file.display())))?;
        Ok(Self { dir, opened })
    }

    /// Candidate paths in name order.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = WalkDir::new(&self.dir)
            .max_depth(1)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|path| path.is_file() && is_sibling_candidate(path))
            .filter(|path| path.canonicalize().map_or(true, |p| p != self.opened))
            .collect();
        paths.sort();
        paths
    }
}

impl SiblingSource for DirectorySiblings {
    fn candidates(&mut self) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        for path in self.paths() {
            match File::open(&path) {
                Ok(file) => {
                    debug!("Offering sibling {:?}", path);
                    candidates.push(Candidate {
                        name: path.display().to_string(),
                        source: Box::new(BufReader::new(file)),
                    });
                }
                Err(e) => warn!("Cannot open sibling {:?}: {}", path, e),
            }
        }
        candidates
    }
}

/// Whether the extension marks a possible Matroska file.
pub fn is_sibling_candidate(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SIBLING_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(ext)))
}

//! Playback cursor over the editions of the main segment.

use crate::chapters::{VirtualChapter, VirtualEdition};
use segmux_common::SegmentId;
use std::collections::HashSet;

/// Result of moving the timeline to a new presentation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterUpdate {
    /// Still inside the current chapter.
    Unchanged,
    /// Entered a chapter that continues the bytes being read.
    Continued(usize),
    /// Entered a chapter that must be reached by seeking.
    Seek(usize),
    /// Left the last chapter of an ordered edition.
    Left,
}

/// Editions of the main segment plus the current position in one of them.
#[derive(Debug, Clone)]
pub struct VirtualSegment {
    editions: Vec<VirtualEdition>,
    current_edition: usize,
    current_chapter: Option<usize>,
}

impl VirtualSegment {
    /// Start on the default edition, else the first. `None` without editions.
    pub fn new(editions: Vec<VirtualEdition>) -> Option<Self> {
        if editions.is_empty() {
            return None;
        }
        let current_edition = editions.iter().position(|e| e.default).unwrap_or(0);
        Some(Self {
            editions,
            current_edition,
            current_chapter: None,
        })
    }

    pub fn editions(&self) -> &[VirtualEdition] {
        &self.editions
    }

    pub fn edition(&self) -> &VirtualEdition {
        &self.editions[self.current_edition]
    }

    pub fn edition_index(&self) -> usize {
        self.current_edition
    }

    /// Switch edition; the chapter cursor is cleared.
    pub fn select_edition(&mut self, index: usize) -> bool {
        if index >= self.editions.len() {
            return false;
        }
        self.current_edition = index;
        self.current_chapter = None;
        true
    }

    pub fn chapter_index(&self) -> Option<usize> {
        self.current_chapter
    }

    pub fn chapter(&self) -> Option<&VirtualChapter> {
        self.current_chapter
            .and_then(|i| self.edition().chapters.get(i))
    }

    pub(crate) fn set_chapter(&mut self, index: Option<usize>) {
        self.current_chapter = index.filter(|i| *i < self.edition().chapters.len());
    }

    pub fn is_ordered(&self) -> bool {
        self.edition().ordered
    }

    pub fn duration(&self) -> Option<i64> {
        self.edition().duration
    }

    /// Whether a chapter follows the current one.
    pub fn has_following(&self) -> bool {
        self.current_chapter
            .is_some_and(|i| i + 1 < self.edition().chapters.len())
    }

    /// Segments referenced by any edition.
    pub fn segments_in_use(&self) -> HashSet<SegmentId> {
        self.editions.iter().flat_map(VirtualEdition::segments).collect()
    }

    /// Follow the chapter layout to `time`.
    ///
    /// A chapter whose bytes directly continue the current one is entered
    /// in place; anything else needs a seek, which the caller performs.
    pub fn update_to(&mut self, time: i64) -> ChapterUpdate {
        let edition = &self.editions[self.current_edition];
        match edition.chapter_at(time) {
            Some(index) if Some(index) != self.current_chapter => {
                let next = &edition.chapters[index];
                let contiguous = self.chapter().is_some_and(|current| {
                    current.segment == next.segment && current.physical_end == next.physical_start
                });
                if contiguous {
                    self.current_chapter = Some(index);
                    ChapterUpdate::Continued(index)
                } else {
                    ChapterUpdate::Seek(index)
                }
            }
            Some(_) => ChapterUpdate::Unchanged,
            None if edition.ordered && self.current_chapter.is_some() => {
                self.current_chapter = None;
                ChapterUpdate::Left
            }
            None => ChapterUpdate::Unchanged,
        }
    }
}

//! Virtual editions: chapters laid end to end on one timeline.

use crate::config::DemuxConfig;
use crate::registry::{Segment, SegmentRegistry};
use segmux_common::time::ns_to_us;
use segmux_common::SegmentId;
use segmux_ebml::{ChapterAtom, EditionEntry};
use std::collections::HashSet;
use tracing::{debug, warn};

/// A span of one segment placed on the virtual timeline.
///
/// Physical times are segment times; virtual times are timeline times,
/// all in µs. `virtual_stop - virtual_start == physical_end - physical_start`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct VirtualChapter {
    pub segment: SegmentId,
    pub uid: u64,
    pub name: Option<String>,
    pub hidden: bool,
    pub physical_start: i64,
    pub physical_end: i64,
    pub virtual_start: i64,
    pub virtual_stop: i64,
    pub sub_chapters: Vec<VirtualChapter>,
}

impl VirtualChapter {
    /// Add to a physical time to get the virtual time.
    pub fn offset(&self) -> i64 {
        self.virtual_start - self.physical_start
    }

    pub fn duration(&self) -> i64 {
        self.virtual_stop.saturating_sub(self.virtual_start)
    }

    pub fn contains(&self, time: i64) -> bool {
        self.virtual_start <= time && time < self.virtual_stop
    }
}

/// One playable edition.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct VirtualEdition {
    pub uid: u64,
    pub ordered: bool,
    pub default: bool,
    pub hidden: bool,
    pub chapters: Vec<VirtualChapter>,
    /// Sum of chapter durations; `None` when a linked segment has no duration.
    pub duration: Option<i64>,
    /// Chapters skipped because their segment could not be found.
    pub unresolved: usize,
}

impl VirtualEdition {
    /// Index of the chapter covering `time`.
    ///
    /// Ordered editions have gaps only past their end. Linked chains treat
    /// the last chapter as open-ended and clamp negative times to the first.
    pub fn chapter_at(&self, time: i64) -> Option<usize> {
        if let Some(index) = self.chapters.iter().position(|c| c.contains(time)) {
            return Some(index);
        }
        if self.ordered || self.chapters.is_empty() {
            return None;
        }
        if time < self.chapters[0].virtual_start {
            Some(0)
        } else {
            Some(self.chapters.len() - 1)
        }
    }

    /// Segments any chapter of this edition plays from.
    pub fn segments(&self) -> HashSet<SegmentId> {
        fn walk(chapters: &[VirtualChapter], out: &mut HashSet<SegmentId>) {
            for chapter in chapters {
                out.insert(chapter.segment);
                walk(&chapter.sub_chapters, out);
            }
        }
        let mut out = HashSet::new();
        walk(&self.chapters, &mut out);
        out
    }
}

/// Build every edition of `main`.
///
/// Ordered editions follow their chapter list; everything else plays the
/// hard-linked chain of segments around `main`, one hidden chapter per
/// segment with the physical chapters nested below. A segment without
/// editions still yields one edition.
pub fn compose(registry: &SegmentRegistry, main: SegmentId, config: &DemuxConfig) -> Vec<VirtualEdition> {
    let Some(segment) = registry.segment(main) else {
        return Vec::new();
    };
    let mut editions: Vec<VirtualEdition> = segment
        .editions
        .iter()
        .map(|edition| {
            if edition.ordered && config.use_ordered_chapters {
                compose_ordered(registry, segment, edition)
            } else {
                compose_linked(registry, segment, Some(edition))
            }
        })
        .collect();
    if editions.is_empty() {
        editions.push(compose_linked(registry, segment, None));
    }
    editions
}

fn compose_ordered(registry: &SegmentRegistry, segment: &Segment, edition: &EditionEntry) -> VirtualEdition {
    let mut chapters = Vec::new();
    let mut running = 0i64;
    let mut unresolved = 0;

    for atom in edition.chapters.iter().filter(|a| a.enabled) {
        let target = match &atom.segment_uid {
            Some(uid) if Some(uid) != segment.uid.as_ref() => match registry.find_by_uid(uid) {
                Some(id) => id,
                None => {
                    warn!(chapter = atom.uid, "linked segment not found, skipping chapter");
                    unresolved += 1;
                    continue;
                }
            },
            _ => segment.id,
        };
        let target_duration = registry.segment(target).and_then(|s| s.duration);

        let start = ns_to_us(atom.time_start);
        let end = atom
            .time_end
            .map(ns_to_us)
            .or(target_duration)
            .unwrap_or(start)
            .max(start);
        let length = end - start;

        chapters.push(VirtualChapter {
            segment: target,
            uid: atom.uid,
            name: atom.name().map(str::to_owned),
            hidden: atom.hidden,
            physical_start: start,
            physical_end: end,
            virtual_start: running,
            virtual_stop: running + length,
            sub_chapters: sub_chapters(&atom.children, target, running - start),
        });
        running += length;
    }

    debug!(edition = edition.uid, chapters = chapters.len(), duration = running, "composed ordered edition");
    VirtualEdition {
        uid: edition.uid,
        ordered: true,
        default: edition.default,
        hidden: edition.hidden,
        duration: (!chapters.is_empty()).then_some(running),
        chapters,
        unresolved,
    }
}

fn compose_linked(registry: &SegmentRegistry, segment: &Segment, edition: Option<&EditionEntry>) -> VirtualEdition {
    let mut chapters = Vec::new();
    let mut running = 0i64;
    let mut complete = true;

    for id in hard_link_chain(registry, segment.id) {
        let Some(linked) = registry.segment(id) else { continue };
        let atoms = if id == segment.id {
            edition.map(|e| e.chapters.as_slice())
        } else {
            linked.default_edition().map(|e| e.chapters.as_slice())
        };
        let (physical_end, virtual_stop) = match linked.duration {
            Some(length) => (length, running + length),
            None => (i64::MAX, i64::MAX),
        };
        chapters.push(VirtualChapter {
            segment: id,
            uid: 0,
            name: linked.title.clone(),
            hidden: true,
            physical_start: 0,
            physical_end,
            virtual_start: running,
            virtual_stop,
            sub_chapters: sub_chapters(atoms.unwrap_or(&[]), id, running),
        });
        match linked.duration {
            Some(length) => running += length,
            None => {
                complete = false;
                break;
            }
        }
    }

    VirtualEdition {
        uid: edition.map_or(0, |e| e.uid),
        ordered: false,
        default: edition.is_some_and(|e| e.default),
        hidden: edition.is_some_and(|e| e.hidden),
        duration: complete.then_some(running),
        chapters,
        unresolved: 0,
    }
}

fn sub_chapters(atoms: &[ChapterAtom], segment: SegmentId, offset: i64) -> Vec<VirtualChapter> {
    atoms
        .iter()
        .filter(|a| a.enabled)
        .map(|atom| {
            let start = ns_to_us(atom.time_start);
            let end = atom.time_end.map(ns_to_us).unwrap_or(start).max(start);
            VirtualChapter {
                segment,
                uid: atom.uid,
                name: atom.name().map(str::to_owned),
                hidden: atom.hidden,
                physical_start: start,
                physical_end: end,
                virtual_start: start + offset,
                virtual_stop: end + offset,
                sub_chapters: sub_chapters(&atom.children, segment, offset),
            }
        })
        .collect()
}

/// Segments hard-linked to `start` via prev/next UIDs, in play order.
pub fn hard_link_chain(registry: &SegmentRegistry, start: SegmentId) -> Vec<SegmentId> {
    let mut visited = HashSet::from([start]);

    let mut before = Vec::new();
    let mut cursor = start;
    while let Some(prev) = linked_neighbour(registry, cursor, Direction::Prev) {
        if !visited.insert(prev) {
            break;
        }
        before.push(prev);
        cursor = prev;
    }
    before.reverse();

    let mut chain = before;
    chain.push(start);
    cursor = start;
    while let Some(next) = linked_neighbour(registry, cursor, Direction::Next) {
        if !visited.insert(next) {
            break;
        }
        chain.push(next);
        cursor = next;
    }
    chain
}

#[derive(Clone, Copy)]
enum Direction {
    Prev,
    Next,
}

fn linked_neighbour(registry: &SegmentRegistry, id: SegmentId, direction: Direction) -> Option<SegmentId> {
    let segment = registry.segment(id)?;
    let declared = match direction {
        Direction::Prev => segment.prev_uid.as_deref(),
        Direction::Next => segment.next_uid.as_deref(),
    };
    if let Some(found) = declared.and_then(|uid| registry.find_by_uid(uid)) {
        return Some(found);
    }
    let own = segment.uid.as_deref()?;
    registry
        .opened()
        .find(|other| {
            let back = match direction {
                Direction::Prev => other.next_uid.as_deref(),
                Direction::Next => other.prev_uid.as_deref(),
            };
            other.id != id && back == Some(own)
        })
        .map(|other| other.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ByteSource;
    use segmux_ebml::element as id;
    use segmux_ebml::write::ElementWriter;
    use std::io::Cursor;

    fn chapter(w: &mut ElementWriter, uid: u64, start_ms: u64, end_ms: u64, segment: Option<u8>) {
        w.master(id::CHAPTER_ATOM, |a| {
            a.uint(id::CHAPTER_UID, uid);
            a.uint(id::CHAPTER_TIME_START, start_ms * 1_000_000);
            a.uint(id::CHAPTER_TIME_END, end_ms * 1_000_000);
            if let Some(s) = segment {
                a.binary(id::CHAPTER_SEGMENT_UID, &[s; 16]);
            }
        });
    }

    fn file(uid: u8, duration_ms: Option<f64>, body: impl FnOnce(&mut ElementWriter)) -> Box<dyn ByteSource> {
        let mut w = ElementWriter::new();
        w.ebml_header("matroska");
        w.master(id::SEGMENT, |s| {
            s.master(id::INFO, |i| {
                i.binary(id::SEGMENT_UID, &[uid; 16]);
                if let Some(d) = duration_ms {
                    i.float(id::DURATION, d);
                }
            });
            body(s);
        });
        Box::new(Cursor::new(w.finish()))
    }

    fn main_segment(registry: &SegmentRegistry) -> SegmentId {
        registry.segments().next().unwrap().id
    }

    #[test]
    fn test_ordered_edition_is_contiguous_and_skips_missing_segments() {
        let mut registry = SegmentRegistry::new();
        registry
            .analyze_stream(
                "main",
                file(1, Some(10_000.0), |s| {
                    s.master(id::CHAPTERS, |c| {
                        c.master(id::EDITION_ENTRY, |e| {
                            e.uint(id::EDITION_FLAG_ORDERED, 1);
                            chapter(e, 1, 1000, 3000, None);
                            chapter(e, 2, 0, 500, Some(7));
                            chapter(e, 3, 5000, 5000, None);
                            chapter(e, 4, 8000, 9000, Some(1));
                        });
                    });
                }),
            )
            .unwrap();
        let main = main_segment(&registry);
        let editions = compose(&registry, main, &DemuxConfig::default());
        assert_eq!(editions.len(), 1);
        let edition = &editions[0];
        assert!(edition.ordered);
        assert_eq!(edition.unresolved, 1);
        assert_eq!(edition.chapters.len(), 3);
        for pair in edition.chapters.windows(2) {
            assert_eq!(pair[0].virtual_stop, pair[1].virtual_start);
        }
        assert_eq!(edition.chapters[0].offset(), -1_000_000);
        assert_eq!(edition.chapters[2].virtual_start, 2_000_000);
        assert_eq!(edition.duration, Some(3_000_000));
        assert_eq!(edition.chapter_at(2_999_999), Some(2));
        assert_eq!(edition.chapter_at(3_000_000), None);
        assert_eq!(edition.chapter_at(-1), None);
    }

    #[test]
    fn test_ordered_chapters_can_be_disabled() {
        let mut registry = SegmentRegistry::new();
        registry
            .analyze_stream(
                "main",
                file(1, Some(4000.0), |s| {
                    s.master(id::CHAPTERS, |c| {
                        c.master(id::EDITION_ENTRY, |e| {
                            e.uint(id::EDITION_FLAG_ORDERED, 1);
                            chapter(e, 1, 1000, 2000, None);
                        });
                    });
                }),
            )
            .unwrap();
        let main = main_segment(&registry);
        let config = DemuxConfig {
            use_ordered_chapters: false,
            ..Default::default()
        };
        let edition = &compose(&registry, main, &config)[0];
        assert!(!edition.ordered);
        assert_eq!(edition.chapters.len(), 1);
        assert_eq!(edition.duration, Some(4_000_000));
        assert_eq!(edition.chapters[0].sub_chapters[0].virtual_start, 1_000_000);
    }

    fn linked(uid: u8, prev: Option<u8>, next: Option<u8>, duration_ms: f64) -> Box<dyn ByteSource> {
        let mut w = ElementWriter::new();
        w.ebml_header("matroska");
        w.master(id::SEGMENT, |s| {
            s.master(id::INFO, |i| {
                i.binary(id::SEGMENT_UID, &[uid; 16]);
                if let Some(p) = prev {
                    i.binary(id::PREV_UID, &[p; 16]);
                }
                if let Some(n) = next {
                    i.binary(id::NEXT_UID, &[n; 16]);
                }
                i.float(id::DURATION, duration_ms);
            });
        });
        Box::new(Cursor::new(w.finish()))
    }

    #[test]
    fn test_linked_chain_and_open_ended_last_chapter() {
        let mut registry = SegmentRegistry::new();
        registry.analyze_stream("b", linked(2, Some(1), Some(3), 3000.0)).unwrap();
        let main = main_segment(&registry);
        let mut siblings = vec![
            crate::registry::Candidate { name: "c".into(), source: linked(3, Some(2), None, 500.0) },
            crate::registry::Candidate { name: "a".into(), source: linked(1, None, Some(2), 2000.0) },
        ];
        registry.preload_family(main, &mut siblings);

        let chain = hard_link_chain(&registry, main);
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[1], main);

        let edition = &compose(&registry, main, &DemuxConfig::default())[0];
        assert!(!edition.ordered);
        let starts: Vec<i64> = edition.chapters.iter().map(|c| c.virtual_start).collect();
        assert_eq!(starts, vec![0, 2_000_000, 5_000_000]);
        assert_eq!(edition.duration, Some(5_500_000));
        assert_eq!(edition.chapter_at(-5), Some(0));
        assert_eq!(edition.chapter_at(10_000_000), Some(2));
        assert_eq!(edition.segments().len(), 3);
    }

    #[test]
    fn test_unknown_duration_ends_chain() {
        let mut registry = SegmentRegistry::new();
        registry.analyze_stream("a", file(1, None, |_| {})).unwrap();
        let main = main_segment(&registry);
        let edition = &compose(&registry, main, &DemuxConfig::default())[0];
        assert_eq!(edition.duration, None);
        assert_eq!(edition.chapters[0].virtual_stop, i64::MAX);
    }
}

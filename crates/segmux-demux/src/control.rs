//! Typed control queries: duration, position, titles, metadata.

use crate::chapters::{VirtualChapter, VirtualEdition};
use crate::driver::{DemuxState, Demuxer};
use crate::error::{ControlError, DemuxError};
use crate::track::TrackKind;
use bytes::Bytes;
use tracing::warn;

/// A request to the demuxer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlQuery {
    CanSeek,
    GetDuration,
    GetPosition,
    /// Seek to a fraction of the duration.
    SetPosition(f64),
    GetTime,
    /// Seek to a virtual time in µs.
    SetTime(i64),
    GetTitleInfo,
    SetTitle(usize),
    SetSeekpoint(usize),
    GetAttachments,
    GetMeta,
    GetFps,
}

/// The answer to a [`ControlQuery`].
#[derive(Debug, Clone, PartialEq)]
pub enum ControlReply {
    CanSeek(bool),
    /// µs.
    Duration(i64),
    /// Fraction of the duration.
    Position(f64),
    /// Current clock in µs, unset before the first block.
    Time(Option<i64>),
    Titles(Vec<Title>),
    Attachments(Vec<Attachment>),
    Meta(Meta),
    Fps(f64),
    /// A setter succeeded.
    Done,
}

/// An edition seen as a title.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Title {
    pub name: String,
    pub duration: Option<i64>,
    pub seekpoints: Vec<Seekpoint>,
}

/// A visible chapter start.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Seekpoint {
    pub name: Option<String>,
    /// Virtual time in µs.
    pub time_offset: i64,
}

/// A file embedded in a segment.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    pub description: Option<String>,
    pub data: Bytes,
}

/// Descriptive metadata of the main segment.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Meta {
    pub title: Option<String>,
    pub muxing_app: Option<String>,
    pub writing_app: Option<String>,
}

type Reply = Result<ControlReply, ControlError>;

impl Title {
    fn from_edition(index: usize, edition: &VirtualEdition) -> Self {
        fn walk(chapters: &[VirtualChapter], out: &mut Vec<Seekpoint>) {
            for chapter in chapters {
                if !chapter.hidden {
                    out.push(Seekpoint {
                        name: chapter.name.clone(),
                        time_offset: chapter.virtual_start,
                    });
                }
                walk(&chapter.sub_chapters, out);
            }
        }
        let mut seekpoints = Vec::new();
        walk(&edition.chapters, &mut seekpoints);
        Self {
            name: format!("Edition {}", index + 1),
            duration: edition.duration,
            seekpoints,
        }
    }
}

impl From<DemuxError> for ControlError {
    fn from(error: DemuxError) -> Self {
        match error {
            DemuxError::SeekRejected(reason) => ControlError::SeekRejected(reason),
            other => {
                warn!(error = %other, "seek failed");
                ControlError::SeekRejected("stream error")
            }
        }
    }
}

impl Demuxer {
    /// Answer one control query.
    pub fn control(&self, query: ControlQuery) -> Reply {
        match query {
            ControlQuery::CanSeek => Ok(ControlReply::CanSeek(true)),
            ControlQuery::GetDuration => self
                .duration()
                .filter(|d| *d > 0)
                .map(ControlReply::Duration)
                .ok_or(ControlError::DurationUnknown),
            ControlQuery::GetPosition => {
                let duration = self
                    .duration()
                    .filter(|d| *d > 0)
                    .ok_or(ControlError::DurationUnknown)?;
                let now = self.clock().max(self.start_time()).unwrap_or(0);
                Ok(ControlReply::Position((now as f64 / duration as f64).clamp(0.0, 1.0)))
            }
            ControlQuery::SetPosition(fraction) => {
                self.seek(None, Some(fraction))?;
                Ok(ControlReply::Done)
            }
            ControlQuery::GetTime => Ok(ControlReply::Time(self.clock())),
            ControlQuery::SetTime(time) => {
                self.seek(Some(time), None)?;
                Ok(ControlReply::Done)
            }
            ControlQuery::GetTitleInfo => self.with_state(|state| -> Reply {
                let titles = titles(state)?;
                let exposed = titles.len() > 1 || titles.first().is_some_and(|t| !t.seekpoints.is_empty());
                if exposed {
                    Ok(ControlReply::Titles(titles))
                } else {
                    Err(ControlError::NoTitles)
                }
            }),
            ControlQuery::SetTitle(index) => self.with_state(|state| -> Reply {
                let titles = titles(state)?;
                let count = titles.len();
                let start = titles
                    .get(index)
                    .and_then(|t| t.seekpoints.first())
                    .map(|s| s.time_offset)
                    .ok_or(ControlError::InvalidIndex { index, count })?;
                let previous = (state.timeline.edition_index(), state.timeline.chapter_index());
                state.timeline.select_edition(index);
                if let Err(err) = state.seek_to(start, None, None) {
                    state.timeline.select_edition(previous.0);
                    state.timeline.set_chapter(previous.1);
                    return Err(err.into());
                }
                Ok(ControlReply::Done)
            }),
            ControlQuery::SetSeekpoint(index) => self.with_state(|state| -> Reply {
                let title = Title::from_edition(state.timeline.edition_index(), state.timeline.edition());
                let count = title.seekpoints.len();
                let seekpoint = title
                    .seekpoints
                    .get(index)
                    .ok_or(ControlError::InvalidIndex { index, count })?;
                state.seek_to(seekpoint.time_offset, None, None)?;
                Ok(ControlReply::Done)
            }),
            ControlQuery::GetAttachments => self.with_state(|state| -> Reply {
                let files: Vec<_> = state
                    .registry
                    .segments()
                    .flat_map(|s| s.attachments.iter())
                    .collect();
                if files.is_empty() {
                    return Err(ControlError::NoAttachments);
                }
                let mut attachments = Vec::new();
                attachments
                    .try_reserve_exact(files.len())
                    .map_err(|_| ControlError::ResourceExhausted)?;
                attachments.extend(files.into_iter().map(|file| Attachment {
                    name: file.name.clone(),
                    mime_type: file.mime_type.clone(),
                    description: file.description.clone(),
                    data: Bytes::from(file.data.clone()),
                }));
                Ok(ControlReply::Attachments(attachments))
            }),
            ControlQuery::GetMeta => self.with_state(|state| -> Reply {
                let meta = state
                    .registry
                    .segment(state.main)
                    .map(|s| Meta {
                        title: s.title.clone(),
                        muxing_app: s.muxing_app.clone(),
                        writing_app: s.writing_app.clone(),
                    })
                    .unwrap_or_default();
                Ok(ControlReply::Meta(meta))
            }),
            ControlQuery::GetFps => self.with_state(|state| -> Reply {
                let fps = state
                    .active
                    .and_then(|id| state.registry.segment(id))
                    .and_then(|s| {
                        s.tracks
                            .iter()
                            .filter(|t| t.kind == TrackKind::Video)
                            .find_map(|t| t.fps())
                    })
                    .unwrap_or(0.0);
                Ok(ControlReply::Fps(fps))
            }),
        }
    }
}

fn titles(state: &DemuxState) -> Result<Vec<Title>, ControlError> {
    let editions = state.timeline.editions();
    let mut titles = Vec::new();
    titles
        .try_reserve_exact(editions.len())
        .map_err(|_| ControlError::ResourceExhausted)?;
    titles.extend(
        editions
            .iter()
            .enumerate()
            .map(|(i, e)| Title::from_edition(i, e)),
    );
    Ok(titles)
}

//! Segmux-Common: shared ids, time units, and errors.
//!
//! This crate provides the small vocabulary shared by the parse layer, the
//! demuxer core and the command line tool:
//!
//! - **Arena IDs**: typed indices for streams, segments and sink handles
//! - **Time**: microsecond timestamps and Matroska tick conversions
//! - **Error Handling**: common error type and result alias
//!
//! # Examples
//!
//! ```
//! use segmux_common::{time, SegmentId};
//!
//! let id = SegmentId::new(3);
//! assert_eq!(id.index(), 3);
//!
//! // 1500 ticks at the default 1ms timecode scale
//! assert_eq!(time::ticks_to_us(1500, time::DEFAULT_TIMECODE_SCALE), 1_500_000);
//! ```

pub mod error;
pub mod ids;
pub mod time;

pub use error::{Error, Result};
pub use ids::*;

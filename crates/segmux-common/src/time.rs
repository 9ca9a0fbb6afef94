//! Time units.
//!
//! The demuxer works in signed microseconds. Matroska stores timecodes as
//! ticks whose length (in nanoseconds) is the segment's timecode scale.

/// Microseconds per second.
pub const CLOCK_FREQ: i64 = 1_000_000;

/// Default Matroska timecode scale: one tick per millisecond.
pub const DEFAULT_TIMECODE_SCALE: u64 = 1_000_000;

/// Convert segment ticks to microseconds.
pub fn ticks_to_us(ticks: i64, timecode_scale_ns: u64) -> i64 {
    ((ticks as i128 * timecode_scale_ns as i128) / 1000) as i64
}

/// Convert a floating tick count (e.g. the segment duration) to microseconds.
pub fn fticks_to_us(ticks: f64, timecode_scale_ns: u64) -> i64 {
    (ticks * timecode_scale_ns as f64 / 1000.0) as i64
}

/// Convert microseconds back to segment ticks, rounding toward zero.
pub fn us_to_ticks(us: i64, timecode_scale_ns: u64) -> i64 {
    if timecode_scale_ns == 0 {
        return 0;
    }
    ((us as i128 * 1000) / timecode_scale_ns as i128) as i64
}

/// Convert nanoseconds to microseconds.
pub fn ns_to_us(ns: u64) -> i64 {
    (ns / 1000) as i64
}

/// Format microseconds as `H:MM:SS.mmm`.
pub fn format_us(us: i64) -> String {
    let sign = if us < 0 { "-" } else { "" };
    let us = us.unsigned_abs();
    let ms = us / 1000;
    format!(
        "{sign}{}:{:02}:{:02}.{:03}",
        ms / 3_600_000,
        (ms / 60_000) % 60,
        (ms / 1000) % 60,
        ms % 1000
    )
}

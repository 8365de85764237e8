//! Free-text date, time and duration recognition for scheduling replies.
//! All timestamps are interpreted in Japan Standard Time.

pub mod format;
pub mod parse;

pub use format::{end_time, format_japanese, format_short};
pub use parse::{jst, parse_datetime, parse_duration, resolve_datetime, Confidence};

/// Meeting length assumed when a reply names no duration.
pub const DEFAULT_DURATION_MINUTES: u32 = 60;

use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// All parsed timestamps are interpreted in Japan Standard Time. JST has no
/// daylight saving, so a fixed offset is sufficient.
pub fn jst() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).expect("UTC+9 is a valid offset")
}

/// How a datetime match was located within a reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Matched a single line of the reply.
    High,
    /// Matched only against the whole trimmed text.
    Medium,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
        }
    }
}

struct Pattern {
    regex: &'static Regex,
    has_year: bool,
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("datetime pattern should compile"))
}

/// Supported shapes in priority order. Slash, colon and hyphen forms must
/// match the full string; the 月日 forms tolerate trailing text.
fn patterns() -> [Pattern; 9] {
    static MD_COLON: OnceLock<Regex> = OnceLock::new();
    static YMD_COLON: OnceLock<Regex> = OnceLock::new();
    static MD_SECONDS: OnceLock<Regex> = OnceLock::new();
    static YMD_SECONDS: OnceLock<Regex> = OnceLock::new();
    static KANJI_HOUR: OnceLock<Regex> = OnceLock::new();
    static KANJI_COLON: OnceLock<Regex> = OnceLock::new();
    static KANJI_FULL: OnceLock<Regex> = OnceLock::new();
    static ISO_LIKE: OnceLock<Regex> = OnceLock::new();
    static MD_HYPHEN: OnceLock<Regex> = OnceLock::new();

    [
        Pattern {
            regex: regex(&MD_COLON, r"^(\d{1,2})/(\d{1,2})\s+(\d{1,2}):(\d{1,2})$"),
            has_year: false,
        },
        Pattern {
            regex: regex(&YMD_COLON, r"^(\d{4})/(\d{1,2})/(\d{1,2})\s+(\d{1,2}):(\d{1,2})$"),
            has_year: true,
        },
        Pattern {
            regex: regex(&MD_SECONDS, r"^(\d{1,2})/(\d{1,2})\s+(\d{1,2}):(\d{1,2}):(\d{1,2})$"),
            has_year: false,
        },
        Pattern {
            regex: regex(
                &YMD_SECONDS,
                r"^(\d{4})/(\d{1,2})/(\d{1,2})\s+(\d{1,2}):(\d{1,2}):(\d{1,2})$",
            ),
            has_year: true,
        },
        Pattern {
            regex: regex(&KANJI_HOUR, r"^(\d{1,2})月(\d{1,2})日\s+(\d{1,2})時(?:(\d{1,2})分)?"),
            has_year: false,
        },
        Pattern {
            regex: regex(&KANJI_COLON, r"^(\d{1,2})月(\d{1,2})日\s+(\d{1,2}):(\d{1,2})"),
            has_year: false,
        },
        Pattern {
            regex: regex(&KANJI_FULL, r"^(\d{4})年(\d{1,2})月(\d{1,2})日\s+(\d{1,2}):(\d{1,2})"),
            has_year: true,
        },
        Pattern {
            regex: regex(&ISO_LIKE, r"^(\d{4})-(\d{1,2})-(\d{1,2})\s+(\d{1,2}):(\d{1,2})$"),
            has_year: true,
        },
        Pattern {
            regex: regex(&MD_HYPHEN, r"^(\d{1,2})-(\d{1,2})\s+(\d{1,2}):(\d{1,2})$"),
            has_year: false,
        },
    ]
}

fn capture_int(captures: &regex::Captures<'_>, index: usize) -> Option<u32> {
    captures.get(index).and_then(|group| group.as_str().parse().ok())
}

/// Parses one Japanese or numeric datetime expression. Year-less shapes are
/// resolved against `current_year`. Invalid calendar values reject the
/// pattern and fall through to the next one.
pub fn parse_datetime(text: &str, current_year: i32) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    for pattern in patterns() {
        let Some(captures) = pattern.regex.captures(text) else {
            continue;
        };
        let mut index = 1;
        let year = if pattern.has_year {
            let year = capture_int(&captures, index)? as i32;
            index += 1;
            year
        } else {
            current_year
        };
        let month = capture_int(&captures, index)?;
        let day = capture_int(&captures, index + 1)?;
        let hour = capture_int(&captures, index + 2)?;
        // The H時 shape allows the minute group to be absent entirely.
        let minute = capture_int(&captures, index + 3).unwrap_or(0);
        let second = capture_int(&captures, index + 4).unwrap_or(0);

        let Some(date) = NaiveDate::from_ymd_opt(year, month, day) else {
            continue;
        };
        let Some(time) = NaiveTime::from_hms_opt(hour, minute, second) else {
            continue;
        };
        return NaiveDateTime::new(date, time).and_local_timezone(jst()).single();
    }

    None
}

/// Finds a datetime within a free-text reply: each line is tried on its own
/// first, then the whole trimmed text.
pub fn resolve_datetime(
    text: &str,
    current_year: i32,
) -> Option<(DateTime<FixedOffset>, Confidence)> {
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(parsed) = parse_datetime(line, current_year) {
            return Some((parsed, Confidence::High));
        }
    }
    parse_datetime(text, current_year).map(|parsed| (parsed, Confidence::Medium))
}

/// Parses a duration expression into minutes. Shapes tried in order: hours
/// with optional trailing minutes, minutes only, fractional hours, bare
/// integer minutes.
pub fn parse_duration(text: &str) -> Option<u32> {
    static HOURS_MINUTES: OnceLock<Regex> = OnceLock::new();
    static MINUTES_ONLY: OnceLock<Regex> = OnceLock::new();
    static FRACTIONAL_HOURS: OnceLock<Regex> = OnceLock::new();

    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(captures) =
        regex(&HOURS_MINUTES, r"^(\d+)時間(?:(\d+)分)?").captures(text)
    {
        let hours = capture_int(&captures, 1)?;
        let minutes = capture_int(&captures, 2).unwrap_or(0);
        return Some(hours * 60 + minutes);
    }

    if let Some(captures) = regex(&MINUTES_ONLY, r"^(\d+)分").captures(text) {
        return capture_int(&captures, 1);
    }

    if let Some(captures) = regex(&FRACTIONAL_HOURS, r"^(\d+\.?\d*)時間").captures(text) {
        let hours: f64 = captures.get(1)?.as_str().parse().ok()?;
        return Some((hours * 60.0) as u32);
    }

    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::{parse_datetime, parse_duration, resolve_datetime, Confidence};

    #[test]
    fn slash_form_assumes_current_year() {
        let parsed = parse_datetime("12/5 14:00", 2026).expect("slash form");
        assert_eq!(
            (parsed.year(), parsed.month(), parsed.day(), parsed.hour(), parsed.minute()),
            (2026, 12, 5, 14, 0)
        );
        assert_eq!(parsed.offset().local_minus_utc(), 9 * 3600);
    }

    #[test]
    fn kanji_full_form_carries_its_own_year() {
        let parsed = parse_datetime("2025年12月5日 14:00", 2026).expect("kanji form");
        assert_eq!(
            (parsed.year(), parsed.month(), parsed.day(), parsed.hour(), parsed.minute()),
            (2025, 12, 5, 14, 0)
        );
    }

    #[test]
    fn kanji_hour_form_defaults_minutes_to_zero() {
        let parsed = parse_datetime("12月5日 14時", 2026).expect("hour form");
        assert_eq!((parsed.hour(), parsed.minute()), (14, 0));

        let with_minutes = parse_datetime("12月5日 14時30分", 2026).expect("hour-minute form");
        assert_eq!((with_minutes.hour(), with_minutes.minute()), (14, 30));
    }

    #[test]
    fn kanji_forms_tolerate_trailing_text() {
        let parsed = parse_datetime("12月5日 14:00 でお願いします", 2026).expect("trailing text");
        assert_eq!((parsed.month(), parsed.day()), (12, 5));

        // Slash forms must match the full string.
        assert!(parse_datetime("12/5 14:00 でお願いします", 2026).is_none());
    }

    #[test]
    fn hyphen_and_iso_forms_parse() {
        assert!(parse_datetime("2025-12-05 14:00", 2026).is_some());
        let short = parse_datetime("12-05 14:00", 2026).expect("hyphen form");
        assert_eq!(short.year(), 2026);
    }

    #[test]
    fn invalid_calendar_values_fall_through_to_no_match() {
        assert!(parse_datetime("13/40 25:99", 2026).is_none());
        assert!(parse_datetime("2025年13月5日 14:00", 2026).is_none());
        assert!(parse_datetime("", 2026).is_none());
        assert!(parse_datetime("そろそろ決めましょう", 2026).is_none());
    }

    #[test]
    fn line_match_beats_whole_text_match() {
        let reply = "いいですね！\n12/10 15:00\nでどうでしょう";
        let (parsed, confidence) = resolve_datetime(reply, 2026).expect("line match");
        assert_eq!((parsed.month(), parsed.day(), parsed.hour()), (12, 10, 15));
        assert_eq!(confidence, Confidence::High);
        assert_eq!(confidence.as_str(), "high");
    }

    #[test]
    fn whole_text_match_is_medium_confidence() {
        // Leading spaces keep the line-level pass from matching the anchored
        // slash form only when the trim differs; a single-line reply still
        // reports high confidence.
        let (_, confidence) = resolve_datetime("12/10 15:00", 2026).expect("single line");
        assert_eq!(confidence, Confidence::High);

        let (parsed, confidence) =
            resolve_datetime("12月10日 15:00 で", 2026).expect("prefix match");
        assert_eq!(parsed.day(), 10);
        assert_eq!(confidence, Confidence::High);
    }

    #[test]
    fn unparseable_reply_yields_nothing() {
        assert!(resolve_datetime("また今度にしましょう", 2026).is_none());
    }

    #[test]
    fn duration_shapes_parse_in_priority_order() {
        assert_eq!(parse_duration("1時間"), Some(60));
        assert_eq!(parse_duration("2時間30分"), Some(150));
        assert_eq!(parse_duration("90分"), Some(90));
        assert_eq!(parse_duration("1.5時間"), Some(90));
        assert_eq!(parse_duration("90"), Some(90));
        assert_eq!(parse_duration("garbage"), None);
        assert_eq!(parse_duration(""), None);
    }
}

use chrono::{DateTime, Datelike, Duration, FixedOffset};

/// Weekday symbols, Monday first.
const WEEKDAYS: [&str; 7] = ["月", "火", "水", "木", "金", "土", "日"];

fn weekday_symbol(timestamp: &DateTime<FixedOffset>) -> &'static str {
    WEEKDAYS[timestamp.weekday().num_days_from_monday() as usize]
}

/// Renders `YYYY年MM月DD日(曜) HH:MM`.
pub fn format_japanese(timestamp: &DateTime<FixedOffset>) -> String {
    format!(
        "{}({}) {}",
        timestamp.format("%Y年%m月%d日"),
        weekday_symbol(timestamp),
        timestamp.format("%H:%M")
    )
}

/// Renders the compact `M/D (曜) HH:MM` form used in thread messages.
pub fn format_short(timestamp: &DateTime<FixedOffset>) -> String {
    format!(
        "{}/{} ({}) {}",
        timestamp.month(),
        timestamp.day(),
        weekday_symbol(timestamp),
        timestamp.format("%H:%M")
    )
}

pub fn end_time(start: DateTime<FixedOffset>, duration_minutes: u32) -> DateTime<FixedOffset> {
    start + Duration::minutes(i64::from(duration_minutes))
}

#[cfg(test)]
mod tests {
    use super::{end_time, format_japanese, format_short};
    use crate::schedule::parse::parse_datetime;

    #[test]
    fn japanese_format_pads_and_names_the_weekday() {
        // 2025-12-05 is a Friday.
        let timestamp = parse_datetime("2025/12/05 14:00", 2026).expect("fixture");
        assert_eq!(format_japanese(&timestamp), "2025年12月05日(金) 14:00");
    }

    #[test]
    fn short_format_drops_padding() {
        let timestamp = parse_datetime("2025/12/05 09:05", 2026).expect("fixture");
        assert_eq!(format_short(&timestamp), "12/5 (金) 09:05");
    }

    #[test]
    fn end_time_adds_duration_minutes() {
        let start = parse_datetime("2025/12/05 14:00", 2026).expect("fixture");
        let end = end_time(start, 90);
        assert_eq!(format_short(&end), "12/5 (金) 15:30");
    }
}

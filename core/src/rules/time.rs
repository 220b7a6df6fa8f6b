//! Wall-clock windows for time-range conditions

use chrono::NaiveTime;
use chrono::Timelike;

/// Parse `HH:MM` or `HH:MM:SS` into minutes since midnight (seconds ignored)
pub fn parse_minutes(value: &str) -> Option<u32> {
    let value = value.trim();
    let time = NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()?;
    Some(time.hour() * 60 + time.minute())
}

/// Is `now` inside the window `[from, to]`?
///
/// `from <= to` is a same-day window. Otherwise the window crosses midnight
/// and matches `now >= from || now <= to`.
pub fn in_window(now: u32, from: u32, to: u32) -> bool {
    if from <= to {
        now >= from && now <= to
    } else {
        now >= from || now <= to
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(s: &str) -> u32 {
        parse_minutes(s).unwrap()
    }

    #[test]
    fn test_parse_minutes() {
        assert_eq!(parse_minutes("00:00"), Some(0));
        assert_eq!(parse_minutes("06:30"), Some(390));
        assert_eq!(parse_minutes(" 23:59:45 "), Some(1439));
        assert_eq!(parse_minutes("24:00"), None);
        assert_eq!(parse_minutes("noon"), None);
    }

    #[test]
    fn test_same_day_window() {
        let (from, to) = (hm("08:00"), hm("17:00"));
        assert!(in_window(hm("08:00"), from, to));
        assert!(in_window(hm("12:00"), from, to));
        assert!(in_window(hm("17:00"), from, to));
        assert!(!in_window(hm("07:59"), from, to));
        assert!(!in_window(hm("22:00"), from, to));
    }

    #[test]
    fn test_midnight_crossing_window() {
        let (from, to) = (hm("22:00"), hm("06:00"));
        assert!(in_window(hm("23:30"), from, to));
        assert!(in_window(hm("03:00"), from, to));
        assert!(!in_window(hm("12:00"), from, to));
    }
}

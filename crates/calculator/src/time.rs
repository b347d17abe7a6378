//! Clock-time parsing and time-delta arithmetic.
//!
//! Handles "the outlet opens at 9 and I arrive at 8:30" style wait
//! questions, adding minutes to a clock time, and hour/minute unit
//! conversions. All arithmetic is over minutes-since-midnight, modulo
//! 24 hours.

use once_cell::sync::Lazy;
use regex::Regex;

const DAY_MINUTES: i64 = 24 * 60;

static TIME_HM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})[:.](\d{2})\s*(am|pm)?$").unwrap());
static TIME_H: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,2})\s*(am|pm)?$").unwrap());

/// Parse a clock time ("8:30", "9am", "14:00", "8.30") into
/// minutes-since-midnight. Bare hours up to 12 are accepted as-is,
/// matching how people quote business hours.
pub fn parse_clock(text: &str) -> Option<i64> {
    let text = text.trim().to_lowercase();

    if let Some(caps) = TIME_HM.captures(&text) {
        let hours: i64 = caps.get(1)?.as_str().parse().ok()?;
        let minutes: i64 = caps.get(2)?.as_str().parse().ok()?;
        if minutes > 59 {
            return None;
        }
        let hours = apply_meridiem(hours, caps.get(3).map(|m| m.as_str()))?;
        return Some(hours * 60 + minutes);
    }

    if let Some(caps) = TIME_H.captures(&text) {
        let hours: i64 = caps.get(1)?.as_str().parse().ok()?;
        let hours = apply_meridiem(hours, caps.get(2).map(|m| m.as_str()))?;
        return Some(hours * 60);
    }

    None
}

fn apply_meridiem(hours: i64, meridiem: Option<&str>) -> Option<i64> {
    match meridiem {
        Some("pm") if hours < 12 => Some(hours + 12),
        Some("am") if hours == 12 => Some(0),
        Some(_) | None if hours <= 23 => Some(hours),
        _ => None,
    }
}

/// Render minutes-since-midnight as "H:MM AM/PM".
pub fn format_clock(total_minutes: i64) -> String {
    let minutes = total_minutes.rem_euclid(DAY_MINUTES);
    let (h, m) = (minutes / 60, minutes % 60);
    match h {
        0 => format!("12:{:02} AM", m),
        1..=11 => format!("{}:{:02} AM", h, m),
        12 => format!("12:{:02} PM", m),
        _ => format!("{}:{:02} PM", h - 12, m),
    }
}

/// Render a duration as "X hours Y minutes".
pub fn format_duration(minutes: i64) -> String {
    let minutes = minutes.max(0);
    if minutes < 60 {
        return format!("{} minutes", minutes);
    }
    let (h, m) = (minutes / 60, minutes % 60);
    let hours = if h == 1 {
        "1 hour".to_string()
    } else {
        format!("{} hours", h)
    };
    if m == 0 {
        hours
    } else {
        format!("{} and {} minutes", hours, m)
    }
}

/// Signed wait from arrival until opening, clamped at zero when the
/// outlet is already open.
pub fn wait_minutes(open: i64, arrive: i64) -> i64 {
    (open - arrive).max(0)
}

/// Add minutes to a clock time, wrapping past midnight.
pub fn add_minutes(base: i64, delta: i64) -> i64 {
    (base + delta).rem_euclid(DAY_MINUTES)
}

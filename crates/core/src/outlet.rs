//! Outlet registry types.
//!
//! Opening hours arrive in two shapes from the data sources: a per-day
//! map of "HH:MM - HH:MM" strings (canonical) or a single free-form
//! string (fallback). Unparsed hours are always reported verbatim rather
//! than fabricated.

use std::collections::BTreeMap;

use chrono::Weekday;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Closed service vocabulary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceTag {
    DineIn,
    Takeaway,
    Delivery,
    DriveThru,
    Wifi,
    #[serde(rename = "24-hour")]
    TwentyFourHour,
}

impl ServiceTag {
    pub fn label(&self) -> &'static str {
        match self {
            ServiceTag::DineIn => "Dine-in",
            ServiceTag::Takeaway => "Takeaway",
            ServiceTag::Delivery => "Delivery",
            ServiceTag::DriveThru => "Drive-thru",
            ServiceTag::Wifi => "WiFi",
            ServiceTag::TwentyFourHour => "24 hours",
        }
    }
}

/// Open/close pair in minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayHours {
    pub open: u16,
    pub close: u16,
}

static HOURS_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d{1,2}):(\d{2})\s*-\s*(\d{1,2}):(\d{2})\s*$").unwrap());

impl DayHours {
    /// Parse an "HH:MM - HH:MM" range. Returns `None` for anything else,
    /// leaving the caller to fall back to the raw string.
    pub fn parse(range: &str) -> Option<Self> {
        let caps = HOURS_RANGE.captures(range)?;
        let open = to_minutes(caps.get(1)?.as_str(), caps.get(2)?.as_str())?;
        let close = to_minutes(caps.get(3)?.as_str(), caps.get(4)?.as_str())?;
        Some(Self { open, close })
    }
}

fn to_minutes(hours: &str, minutes: &str) -> Option<u16> {
    let h: u16 = hours.parse().ok()?;
    let m: u16 = minutes.parse().ok()?;
    if h > 23 || m > 59 {
        return None;
    }
    Some(h * 60 + m)
}

/// Render minutes-since-midnight as a 12-hour clock string.
pub fn format_clock(minutes: u16) -> String {
    let minutes = minutes % (24 * 60);
    let (h, m) = (minutes / 60, minutes % 60);
    match h {
        0 => format!("12:{:02} AM", m),
        1..=11 => format!("{}:{:02} AM", h, m),
        12 => format!("12:{:02} PM", m),
        _ => format!("{}:{:02} PM", h - 12, m),
    }
}

/// Opening hours: canonical per-day map, or a free-form fallback string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpeningHours {
    Weekly(BTreeMap<String, String>),
    Raw(String),
}

impl OpeningHours {
    /// Resolve the hours string for a given weekday. The weekly map keys
    /// are lowercase English day names; the raw form applies to every day.
    pub fn for_day(&self, day: Weekday) -> Option<&str> {
        match self {
            OpeningHours::Weekly(map) => map.get(day_key(day)).map(String::as_str),
            OpeningHours::Raw(s) => Some(s.as_str()),
        }
    }

    /// A single-line rendering used when no specific day is requested.
    pub fn display(&self) -> String {
        match self {
            OpeningHours::Raw(s) => s.clone(),
            OpeningHours::Weekly(map) => {
                // Collapse to a single range when all days agree.
                let mut values: Vec<&String> = map.values().collect();
                values.dedup();
                if values.len() == 1 {
                    format!("Daily {}", values[0])
                } else {
                    map.iter()
                        .map(|(day, hours)| format!("{}: {}", capitalise(day), hours))
                        .collect::<Vec<_>>()
                        .join(", ")
                }
            }
        }
    }
}

fn day_key(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

fn capitalise(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(c) => c.to_uppercase().chain(chars).collect(),
    }
}

/// A single outlet registry entry. Every outlet has at least a name and
/// an address; hours and services may be absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outlet {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub opening_hours: Option<OpeningHours>,
    #[serde(default)]
    pub services: Vec<ServiceTag>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_standard_range() {
        let hours = DayHours::parse("09:00 - 22:00").unwrap();
        assert_eq!(hours.open, 9 * 60);
        assert_eq!(hours.close, 22 * 60);
    }

    #[test]
    fn rejects_free_form_hours() {
        assert!(DayHours::parse("open till late").is_none());
        assert!(DayHours::parse("25:00 - 26:00").is_none());
    }

    #[test]
    fn clock_formatting() {
        assert_eq!(format_clock(0), "12:00 AM");
        assert_eq!(format_clock(9 * 60 + 30), "9:30 AM");
        assert_eq!(format_clock(12 * 60), "12:00 PM");
        assert_eq!(format_clock(22 * 60 + 5), "10:05 PM");
    }

    #[test]
    fn weekly_hours_resolve_by_day() {
        let mut map = BTreeMap::new();
        map.insert("monday".to_string(), "08:00 - 22:00".to_string());
        let hours = OpeningHours::Weekly(map);
        assert_eq!(hours.for_day(Weekday::Mon), Some("08:00 - 22:00"));
        assert_eq!(hours.for_day(Weekday::Tue), None);
    }

    #[test]
    fn untagged_deserialisation_picks_shape() {
        let raw: OpeningHours = serde_json::from_str("\"8am till late\"").unwrap();
        assert_eq!(raw, OpeningHours::Raw("8am till late".to_string()));

        let weekly: OpeningHours =
            serde_json::from_str(r#"{"monday": "09:00 - 22:00"}"#).unwrap();
        assert!(matches!(weekly, OpeningHours::Weekly(_)));
    }

    #[test]
    fn service_tag_serde_names() {
        assert_eq!(
            serde_json::to_string(&ServiceTag::TwentyFourHour).unwrap(),
            "\"24-hour\""
        );
        assert_eq!(
            serde_json::from_str::<ServiceTag>("\"drive-thru\"").unwrap(),
            ServiceTag::DriveThru
        );
    }
}

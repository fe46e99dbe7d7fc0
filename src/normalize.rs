//! Raw request → normalized features. Never fails: every malformed field
//! degrades to a default, and the decision taken is returned alongside the
//! value so callers (and tests) can see which path was used.

use std::sync::OnceLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use regex::Regex;

use crate::types::RawFlightRequest;

pub const DEFAULT_DEP_HOUR: u32 = 9;
pub const DEFAULT_DEP_WEEKDAY: u32 = 0; // Monday

// Formats with an explicit offset. The written wall time is kept as-is.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%d %I:%M:%S %p",
    "%Y-%m-%d %I:%M %p",
    "%d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M",
    "%b %d, %Y %H:%M:%S",
    "%b %d, %Y %H:%M",
];

// Date plus a bare hour; minutes are filled in as ":00" before parsing.
const HOUR_FORMATS: &[&str] = &["%Y-%m-%dT%H", "%Y-%m-%d %H"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeSource {
    /// A "(XYZ)" group was found in the text.
    Parenthesized,
    /// No group; the trimmed text is used as the code.
    WholeString,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationCode {
    pub code: String,
    pub source: CodeSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepartureSource {
    Parsed,
    /// STD did not parse; the wall clock was used instead.
    CurrentTime,
    /// Calendar fields could not be taken from the resolved timestamp.
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Departure {
    pub hour: u32,
    pub weekday: u32,
    pub source: DepartureSource,
}

impl Departure {
    pub fn fallback() -> Self {
        Self {
            hour: DEFAULT_DEP_HOUR,
            weekday: DEFAULT_DEP_WEEKDAY,
            source: DepartureSource::Default,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Provenance {
    pub from: CodeSource,
    pub to: CodeSource,
    pub departure: DepartureSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedFeatures {
    pub from_code: String,
    pub to_code: String,
    pub dep_hour: u32,    // 0..=23
    pub dep_weekday: u32, // Monday=0 .. Sunday=6
    pub provenance: Provenance,
}

// 20240315T083000, 20240315T0830, 20240315 0830
fn compact_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{4})(\d{2})(\d{2})[T ]?(\d{2})(\d{2})(\d{2})?$")
            .expect("compact timestamp pattern is valid")
    })
}

fn code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\(([A-Z]{3})\)").expect("location code pattern is valid"))
}

/// "Mumbai (BOM)" → "BOM"; "DEL" → "DEL"; "" → "".
pub fn extract_location_code(text: &str) -> LocationCode {
    if text.is_empty() {
        return LocationCode {
            code: String::new(),
            source: CodeSource::Empty,
        };
    }
    match code_pattern().captures(text).and_then(|c| c.get(1)) {
        Some(m) => LocationCode {
            code: m.as_str().to_string(),
            source: CodeSource::Parenthesized,
        },
        None => LocationCode {
            code: text.trim().to_string(),
            source: CodeSource::WholeString,
        },
    }
}

/// Parse a scheduled departure as a naive wall-clock timestamp. A time
/// without a date lands on `today`.
pub fn parse_departure_time(text: &str, today: NaiveDate) -> Option<NaiveDateTime> {
    let s = text.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for f in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, f) {
            return Some(dt.naive_local());
        }
    }
    for f in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, f) {
            return Some(dt);
        }
    }
    let with_minutes = format!("{}:00", s);
    for f in HOUR_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&with_minutes, &format!("{}:%M", f)) {
            return Some(dt);
        }
    }
    if let Some(c) = compact_pattern().captures(s) {
        let iso = format!(
            "{}-{}-{}T{}:{}:{}",
            &c[1],
            &c[2],
            &c[3],
            &c[4],
            &c[5],
            c.get(6).map_or("00", |m| m.as_str())
        );
        if let Ok(dt) = NaiveDateTime::parse_from_str(&iso, "%Y-%m-%dT%H:%M:%S") {
            return Some(dt);
        }
    }
    for f in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, f) {
            return Some(d.and_time(NaiveTime::MIN));
        }
    }
    for f in TIME_FORMATS {
        if let Ok(t) = NaiveTime::parse_from_str(s, f) {
            return Some(today.and_time(t));
        }
    }
    None
}

fn calendar_fields(dt: &NaiveDateTime) -> Option<(u32, u32)> {
    let hour = dt.hour();
    let weekday = dt.weekday().num_days_from_monday();
    (hour <= 23 && weekday <= 6).then_some((hour, weekday))
}

/// Two independent fallback layers: an unparseable STD is replaced by `now`;
/// if calendar fields still cannot be taken, 09:00 Monday is used.
pub fn resolve_departure(text: &str, now: NaiveDateTime) -> Departure {
    resolve_with(text, now, calendar_fields)
}

// chrono's accessors cannot fail, so the 09:00 Monday layer is only reached
// with an injected extractor.
fn resolve_with<F>(text: &str, now: NaiveDateTime, fields: F) -> Departure
where
    F: Fn(&NaiveDateTime) -> Option<(u32, u32)>,
{
    let (resolved, source) = match parse_departure_time(text, now.date()) {
        Some(dt) => (dt, DepartureSource::Parsed),
        None => {
            tracing::warn!(std = %text, "unparseable STD, using current datetime as fallback");
            (now, DepartureSource::CurrentTime)
        }
    };

    match fields(&resolved) {
        Some((hour, weekday)) => Departure {
            hour,
            weekday,
            source,
        },
        None => {
            tracing::warn!(%resolved, "date parsing error, defaulting to 09:00 Monday");
            Departure::fallback()
        }
    }
}

pub fn normalize(request: &RawFlightRequest, now: NaiveDateTime) -> NormalizedFeatures {
    let from = extract_location_code(&request.from);
    let to = extract_location_code(&request.to);
    tracing::info!(
        "Input - From: {}, To: {}, STD: {}",
        from.code,
        to.code,
        request.std
    );
    for (field, loc) in [("From", &from), ("To", &to)] {
        if loc.source != CodeSource::Parenthesized {
            tracing::debug!(field, code = %loc.code, source = ?loc.source, "no parenthesized location code");
        }
    }

    let departure = resolve_departure(&request.std, now);

    NormalizedFeatures {
        from_code: from.code,
        to_code: to.code,
        dep_hour: departure.hour,
        dep_weekday: departure.weekday,
        provenance: Provenance {
            from: from.source,
            to: to.source,
            departure: departure.source,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn code_from_parentheses() {
        let c = extract_location_code("Mumbai (BOM)");
        assert_eq!(c.code, "BOM");
        assert_eq!(c.source, CodeSource::Parenthesized);
        assert_eq!(extract_location_code("Chhatrapati Shivaji (BOM) T2").code, "BOM");
    }

    #[test]
    fn code_whole_string_and_empty() {
        assert_eq!(
            extract_location_code("DEL"),
            LocationCode {
                code: "DEL".into(),
                source: CodeSource::WholeString
            }
        );
        assert_eq!(extract_location_code("  Delhi  ").code, "Delhi");
        let e = extract_location_code("");
        assert_eq!(e.code, "");
        assert_eq!(e.source, CodeSource::Empty);
    }

    #[test]
    fn code_requires_exactly_three_uppercase_letters() {
        assert_eq!(extract_location_code("Pune (pnq)").code, "Pune (pnq)");
        assert_eq!(extract_location_code("Goa (GOAX)").code, "Goa (GOAX)");
    }

    #[test]
    fn parse_iso_forms() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let want = at(2024, 3, 15, 8, 30);
        for s in [
            "2024-03-15T08:30:00",
            "2024-03-15 08:30:00",
            "2024-03-15T08:30",
            "2024-03-15T08:30:00.000",
            "2024-03-15T08:30:00+05:30",
            "2024-03-15T08:30:00Z",
            "03/15/2024 08:30",
        ] {
            assert_eq!(parse_departure_time(s, today), Some(want), "{s}");
        }
    }

    #[test]
    fn parse_schedule_forms() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let want = at(2024, 3, 15, 8, 30);
        for s in [
            "15 Mar 2024 08:30",
            "15 Mar 2024 08:30:00",
            "Mar 15, 2024 08:30",
            "2024-03-15 8:30 AM",
            "2024-03-15 08:30:00 AM",
            "20240315T083000",
            "20240315T0830",
        ] {
            assert_eq!(parse_departure_time(s, today), Some(want), "{s}");
        }
        assert_eq!(
            parse_departure_time("2024-03-15 8:30 PM", today),
            Some(at(2024, 3, 15, 20, 30))
        );
        assert_eq!(
            parse_departure_time("2024-03-15T08", today),
            Some(at(2024, 3, 15, 8, 0))
        );
        assert_eq!(parse_departure_time("20241315T083000", today), None);
    }

    #[test]
    fn parse_date_only_and_time_only() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 16).unwrap();
        assert_eq!(
            parse_departure_time("2024-03-15", today),
            Some(at(2024, 3, 15, 0, 0))
        );
        assert_eq!(
            parse_departure_time("21:45", today),
            Some(at(2024, 3, 16, 21, 45))
        );
    }

    #[test]
    fn parse_garbage() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 16).unwrap();
        assert_eq!(parse_departure_time("", today), None);
        assert_eq!(parse_departure_time("soon", today), None);
        assert_eq!(parse_departure_time("2024-13-45T99:00:00", today), None);
    }

    #[test]
    fn departure_parsed() {
        let d = resolve_departure("2024-03-15T08:30:00", at(2020, 1, 1, 0, 0));
        assert_eq!(
            d,
            Departure {
                hour: 8,
                weekday: 4, // Friday
                source: DepartureSource::Parsed
            }
        );
    }

    #[test]
    fn departure_falls_back_to_now() {
        // 2024-03-17 is a Sunday
        let d = resolve_departure("not a date", at(2024, 3, 17, 22, 10));
        assert_eq!(d.hour, 22);
        assert_eq!(d.weekday, 6);
        assert_eq!(d.source, DepartureSource::CurrentTime);
    }

    #[test]
    fn fallback_defaults() {
        let d = Departure::fallback();
        assert_eq!((d.hour, d.weekday), (9, 0));
        assert_eq!(d.source, DepartureSource::Default);
    }

    #[test]
    fn failed_extraction_uses_defaults() {
        let now = at(2024, 3, 17, 22, 10);
        let d = resolve_with("2024-03-15T08:30:00", now, |_| None);
        assert_eq!(d, Departure::fallback());
        // applies beneath the current-time substitution as well
        let d = resolve_with("garbage", now, |_| None);
        assert_eq!((d.hour, d.weekday, d.source), (9, 0, DepartureSource::Default));
    }

    #[test]
    fn normalize_request() {
        let req = RawFlightRequest {
            from: "Mumbai (BOM)".into(),
            to: "DEL".into(),
            std: "2024-03-15T08:30:00".into(),
        };
        let n = normalize(&req, at(2020, 1, 1, 0, 0));
        assert_eq!(n.from_code, "BOM");
        assert_eq!(n.to_code, "DEL");
        assert_eq!((n.dep_hour, n.dep_weekday), (8, 4));
        assert_eq!(n.provenance.from, CodeSource::Parenthesized);
        assert_eq!(n.provenance.to, CodeSource::WholeString);
        assert_eq!(n.provenance.departure, DepartureSource::Parsed);
    }
}

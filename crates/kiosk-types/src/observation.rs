//! Raw observation helpers
//!
//! Weather reports carry their issue time as a `DDHHMMZ` group with no month
//! or year. The month is inferred from "now": a day well ahead of today can
//! only be last month's report.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static ISSUE_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{2})(\d{2})(\d{2})Z\b").expect("static pattern is valid"));

/// Issue time of a raw observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ObservationTime(DateTime<Utc>);

impl ObservationTime {
    /// Extract the issue time from a raw observation
    ///
    /// Returns `None` when there is no `DDHHMMZ` group or it names an
    /// impossible date.
    #[must_use]
    pub fn parse(raw: &str, now: DateTime<Utc>) -> Option<Self> {
        let caps = ISSUE_TIME.captures(raw)?;
        let day: u32 = caps[1].parse().ok()?;
        let hour: u32 = caps[2].parse().ok()?;
        let minute: u32 = caps[3].parse().ok()?;

        let (mut year, mut month) = (now.year(), now.month());
        if day > now.day() + 1 {
            if month == 1 {
                year -= 1;
                month = 12;
            } else {
                month -= 1;
            }
        }

        Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
            .single()
            .map(Self)
    }

    /// Issue time in UTC
    #[inline]
    #[must_use]
    pub fn utc(&self) -> DateTime<Utc> {
        self.0
    }

    /// Issue time on the airport's wall clock, e.g. `11:53 PDT`
    ///
    /// `tz` is an IANA zone name; a missing or unknown zone renders in UTC.
    #[must_use]
    pub fn local_label(&self, tz: Option<&str>) -> String {
        let zone = tz.and_then(|name| name.parse::<Tz>().ok()).unwrap_or(Tz::UTC);
        self.0.with_timezone(&zone).format("%H:%M %Z").to_string()
    }

    /// How old the observation is at `now`
    #[inline]
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.0
    }
}

impl fmt::Display for ObservationTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Z", self.0.format("%H:%M"))
    }
}

/// Whether the report is a special (unscheduled) observation
#[inline]
#[must_use]
pub fn is_special_observation(raw: &str) -> bool {
    raw.contains("SPECI")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn parses_same_month() {
        let time = ObservationTime::parse("KSFO 251853Z 28012KT", at(2026, 3, 25)).unwrap();
        assert_eq!(time.utc(), Utc.with_ymd_and_hms(2026, 3, 25, 18, 53, 0).unwrap());
        assert_eq!(time.to_string(), "18:53Z");
    }

    #[test]
    fn late_day_belongs_to_previous_month() {
        let time = ObservationTime::parse("KSFO 312355Z", at(2026, 4, 1)).unwrap();
        assert_eq!(time.utc(), Utc.with_ymd_and_hms(2026, 3, 31, 23, 55, 0).unwrap());
    }

    #[test]
    fn previous_month_wraps_year() {
        let time = ObservationTime::parse("KSFO 312355Z", at(2026, 1, 1)).unwrap();
        assert_eq!(time.utc().year(), 2025);
        assert_eq!(time.utc().month(), 12);
    }

    #[test]
    fn tomorrow_is_not_shifted() {
        let time = ObservationTime::parse("KSFO 020005Z", at(2026, 4, 1)).unwrap();
        assert_eq!(time.utc().month(), 4);
    }

    #[test]
    fn impossible_or_missing_group_is_none() {
        assert!(ObservationTime::parse("KSFO 28012KT", at(2026, 4, 1)).is_none());
        assert!(ObservationTime::parse("KSFO 311200Z", at(2026, 5, 1)).is_none());
    }

    #[test]
    fn age_is_measured_from_issue() {
        let now = Utc.with_ymd_and_hms(2026, 3, 25, 19, 23, 0).unwrap();
        let time = ObservationTime::parse("KSFO 251853Z", now).unwrap();
        assert_eq!(time.age(now).num_minutes(), 30);
    }

    #[test]
    fn local_label_uses_airport_zone() {
        let time = ObservationTime::parse("KSTS 251853Z", at(2026, 3, 25)).unwrap();
        assert_eq!(time.local_label(Some("America/Los_Angeles")), "11:53 PDT");

        let winter = ObservationTime::parse("KJFK 151853Z", at(2026, 1, 15)).unwrap();
        assert_eq!(winter.local_label(Some("America/New_York")), "13:53 EST");
    }

    #[test]
    fn local_label_falls_back_to_utc() {
        let time = ObservationTime::parse("KSTS 251853Z", at(2026, 3, 25)).unwrap();
        assert_eq!(time.local_label(None), "18:53 UTC");
        assert_eq!(time.local_label(Some("Mars/Olympus_Mons")), "18:53 UTC");
    }

    #[test]
    fn detects_special_reports() {
        assert!(is_special_observation("SPECI KSFO 251853Z"));
        assert!(!is_special_observation("METAR KSFO 251853Z"));
    }
}

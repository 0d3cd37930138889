//! Wall-clock formatting shared by storage and the wire.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};

pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn now_string() -> String {
    Local::now().format(TIME_FORMAT).to_string()
}

pub fn today_string() -> String {
    Local::now().format(DATE_FORMAT).to_string()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_time(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIME_FORMAT).ok()
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

/// Date part of a stored timestamp, tolerating date-only values.
pub fn date_of(s: &str) -> Option<NaiveDate> {
    parse_time(s)
        .map(|t| t.date())
        .or_else(|| s.get(..10).and_then(parse_date))
}

pub fn local_from_unix(secs: i64) -> Option<DateTime<Local>> {
    Local.timestamp_opt(secs, 0).single()
}

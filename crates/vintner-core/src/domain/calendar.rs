//! Calendar date formats used by the host API.

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::Date;

use crate::ValidationError;

/// `YYYY-MM-DD`, used in query parameters and payload dates.
const ISO_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// `YYYYMMDD`, used in vintage column names.
const COMPACT_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year][month][day]");

pub fn parse_iso_date(input: &str) -> Result<Date, ValidationError> {
    Date::parse(input.trim(), ISO_DATE).map_err(|_| ValidationError::InvalidDate {
        value: input.to_owned(),
        expected: "YYYY-MM-DD",
    })
}

pub fn parse_compact_date(input: &str) -> Result<Date, ValidationError> {
    Date::parse(input.trim(), COMPACT_DATE).map_err(|_| ValidationError::InvalidDate {
        value: input.to_owned(),
        expected: "YYYYMMDD",
    })
}

pub fn format_iso_date(date: Date) -> String {
    // The pattern only contains date components, so formatting a `Date` cannot fail.
    date.format(ISO_DATE)
        .unwrap_or_else(|_| format!("{:04}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day()))
}

pub fn format_compact_date(date: Date) -> String {
    date.format(COMPACT_DATE)
        .unwrap_or_else(|_| format!("{:04}{:02}{:02}", date.year(), u8::from(date.month()), date.day()))
}

/// Comma-separated `YYYY-MM-DD` list for the `vintage_dates` query parameter.
pub fn join_iso_dates(dates: &[Date]) -> String {
    dates
        .iter()
        .map(|date| format_iso_date(*date))
        .collect::<Vec<_>>()
        .join(",")
}

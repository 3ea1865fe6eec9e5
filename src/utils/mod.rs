//! Project-specific utilities live here.

use anyhow::Context;
use time::{macros::format_description, Date, OffsetDateTime};

/// Formats a date as `DD/MM/YYYY`.
pub fn format_day(date: Date) -> Result<String, time::error::Format> {
    let format = format_description!("[day]/[month]/[year]");
    date.format(&format)
}

/// Today's date in local time, falling back to UTC when the local offset
/// cannot be determined.
pub fn today() -> anyhow::Result<String> {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    format_day(now.date()).context("failed to format today's date")
}

//! Week anchors: the Sunday that identifies a weekly matching cohort

use anyhow::{Context, Result};
use chrono::{Datelike, Local, NaiveDate, TimeDelta};

/// Wire format of dates in queue messages and CLI arguments
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// The Sunday on or before `date`
pub fn week_anchor(date: NaiveDate) -> NaiveDate {
    let offset = date.weekday().num_days_from_sunday();
    date - TimeDelta::days(offset as i64)
}

/// Anchor for the current local date
pub fn current_week() -> NaiveDate {
    week_anchor(Local::now().date_naive())
}

/// Parse a `YYYY-MM-DD` string and anchor it to its week
pub fn parse_week(raw: &str) -> Result<NaiveDate> {
    let date = NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", raw))?;
    Ok(week_anchor(date))
}

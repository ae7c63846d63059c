//! Natural-language and ISO due-date parsing.
//!
//! Parsing is an ordered list of independent matchers; the first rule that
//! matches wins. All computation is in local time, truncated to whole days.

use chrono::{Datelike, Duration, Local, NaiveDate, Weekday};
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DateError {
    #[error("invalid date expression: {0:?}")]
    Invalid(String),
}

/// The current local calendar day.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Parse a date expression relative to the current local day.
pub fn parse(text: &str) -> Result<NaiveDate, DateError> {
    parse_with_reference(text, today())
}

/// Parse a date expression relative to an explicit reference day.
///
/// Accepted inputs, in match order: exact ISO `YYYY-MM-DD`; the keywords
/// `today`, `tomorrow`, `yesterday`, `next week`, `end of week`/`eow`,
/// `end of month`/`eom`, `end of year`/`eoy`; `in N day(s)`/`in N week(s)`;
/// and a weekday name with an optional `next ` prefix. Matching is
/// case-insensitive and ignores surrounding whitespace.
pub fn parse_with_reference(text: &str, reference: NaiveDate) -> Result<NaiveDate, DateError> {
    let input = text.trim();
    if input.is_empty() {
        return Err(DateError::Invalid(text.to_string()));
    }
    let lower = input.to_lowercase();

    // ISO-shaped input never falls through to the keyword rules; a malformed
    // calendar date like 2026-13-01 is an error, not "not a date".
    let iso = Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("regex");
    if iso.is_match(&lower) {
        return NaiveDate::parse_from_str(&lower, "%Y-%m-%d")
            .map_err(|_| DateError::Invalid(input.to_string()));
    }

    match lower.as_str() {
        "today" => return Ok(reference),
        "tomorrow" => return Ok(reference + Duration::days(1)),
        "yesterday" => return Ok(reference - Duration::days(1)),
        "next week" => return Ok(reference + Duration::days(7)),
        "end of week" | "eow" => return Ok(coming_friday(reference)),
        "end of month" | "eom" => return Ok(end_of_month(reference)),
        "end of year" | "eoy" => return Ok(end_of_year(reference)),
        _ => {}
    }

    let offset = Regex::new(r"^in\s+(\d+)\s+(day|days|week|weeks)$").expect("regex");
    if let Some(caps) = offset.captures(&lower) {
        let n: i64 = caps[1]
            .parse()
            .map_err(|_| DateError::Invalid(input.to_string()))?;
        let days = if caps[2].starts_with("week") { n * 7 } else { n };
        return Ok(reference + Duration::days(days));
    }

    if let Some(rest) = lower.strip_prefix("next ") {
        if let Ok(weekday) = rest.trim().parse::<Weekday>() {
            return Ok(reference + Duration::days(days_until(reference, weekday) + 7));
        }
    }
    if let Ok(weekday) = lower.parse::<Weekday>() {
        return Ok(reference + Duration::days(days_until(reference, weekday)));
    }

    Err(DateError::Invalid(input.to_string()))
}

pub fn format_iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Human label for a date relative to the current local day.
pub fn format_relative(date: NaiveDate) -> String {
    format_relative_from(date, today())
}

pub fn format_relative_from(date: NaiveDate, reference: NaiveDate) -> String {
    let delta = (date - reference).num_days();
    match delta {
        d if d < -1 => format!("{} days ago", -d),
        -1 => "yesterday".to_string(),
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        2..=6 => date.format("%A").to_string(),
        7..=13 => format!("next {}", date.format("%A")),
        _ => date.format("%b %-d").to_string(),
    }
}

pub fn is_overdue(due: NaiveDate) -> bool {
    is_overdue_from(due, today())
}

pub fn is_overdue_from(due: NaiveDate, reference: NaiveDate) -> bool {
    due < reference
}

pub fn is_due_today(due: NaiveDate) -> bool {
    is_due_today_from(due, today())
}

pub fn is_due_today_from(due: NaiveDate, reference: NaiveDate) -> bool {
    due == reference
}

/// Due between today and exactly seven days out, both inclusive.
pub fn is_due_this_week(due: NaiveDate) -> bool {
    is_due_this_week_from(due, today())
}

pub fn is_due_this_week_from(due: NaiveDate, reference: NaiveDate) -> bool {
    let delta = (due - reference).num_days();
    (0..=7).contains(&delta)
}

fn days_until(reference: NaiveDate, weekday: Weekday) -> i64 {
    let diff = weekday.num_days_from_monday() as i64
        - reference.weekday().num_days_from_monday() as i64;
    if diff <= 0 {
        diff + 7
    } else {
        diff
    }
}

// The coming Friday, strictly in the future: on Fri/Sat/Sun this rolls to the
// Friday of the following week.
fn coming_friday(reference: NaiveDate) -> NaiveDate {
    reference + Duration::days(days_until(reference, Weekday::Fri))
}

fn end_of_month(reference: NaiveDate) -> NaiveDate {
    let (year, month) = if reference.month() == 12 {
        (reference.year() + 1, 1)
    } else {
        (reference.year(), reference.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).expect("month start") - Duration::days(1)
}

fn end_of_year(reference: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(reference.year(), 12, 31).expect("december 31")
}

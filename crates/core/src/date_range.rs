use chrono::{Duration, Local, NaiveDate};

use crate::error::FinsightError;

/// Date-only format used throughout the database and cache keys.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// An inclusive date range parsed from either ISO dates or human phrases
/// ("today", "yesterday", "5 months ago", "2 weeks ahead", "min", "max").
///
/// Relative phrases use the coarse arithmetic users expect from them:
/// a month is 30 days, a year is 365.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, FinsightError> {
        Ok(Self {
            start: parse_date_expr(start)?,
            end: parse_date_expr(end)?,
        })
    }

    pub fn start_str(&self) -> String {
        self.start.format(DATE_FORMAT).to_string()
    }

    pub fn end_str(&self) -> String {
        self.end.format(DATE_FORMAT).to_string()
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "start: {} | end: {}", self.start_str(), self.end_str())
    }
}

/// Resolve one date expression against today's local date.
pub fn parse_date_expr(expr: &str) -> Result<NaiveDate, FinsightError> {
    let expr = expr.trim().to_ascii_lowercase();
    let today = Local::now().date_naive();
    match expr.as_str() {
        "today" => return Ok(today),
        "yesterday" => return Ok(today - Duration::days(1)),
        // Bounds that stay printable as %Y-%m-%d and comparable in SQL.
        "min" => return Ok(NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or(NaiveDate::MIN)),
        "max" => return Ok(NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)),
        _ => {}
    }
    if let Ok(date) = NaiveDate::parse_from_str(&expr, DATE_FORMAT) {
        return Ok(date);
    }
    parse_relative(&expr, today).ok_or_else(|| FinsightError::DateParse(expr))
}

/// `"<n> <unit>[s] ago|ahead"` relative to `today`.
fn parse_relative(expr: &str, today: NaiveDate) -> Option<NaiveDate> {
    let mut words = expr.split_whitespace();
    let count: i64 = words.next()?.parse().ok()?;
    let unit = words.next()?;
    let direction = words.next()?;
    if words.next().is_some() {
        return None;
    }
    let days = match unit.trim_end_matches('s') {
        "day" => 1,
        "week" => 7,
        "month" => 30,
        "year" => 365,
        _ => return None,
    };
    let offset = Duration::days(count.checked_mul(days)?);
    match direction {
        "ago" => today.checked_sub_signed(offset),
        "ahead" => today.checked_add_signed(offset),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso_dates() {
        let range = DateRange::parse("2024-01-15", "2024-03-01").unwrap();
        assert_eq!(range.start_str(), "2024-01-15");
        assert_eq!(range.end_str(), "2024-03-01");
    }

    #[test]
    fn parses_today_and_yesterday() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date_expr("today").unwrap(), today);
        assert_eq!(parse_date_expr("Yesterday").unwrap(), today - Duration::days(1));
    }

    #[test]
    fn parses_relative_phrases() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date_expr("5 months ago").unwrap(), today - Duration::days(150));
        assert_eq!(parse_date_expr("1 week ago").unwrap(), today - Duration::days(7));
        assert_eq!(parse_date_expr("2 days ahead").unwrap(), today + Duration::days(2));
        assert_eq!(parse_date_expr("1 year ago").unwrap(), today - Duration::days(365));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_date_expr("five months ago").is_err());
        assert!(parse_date_expr("5 fortnights ago").is_err());
        assert!(parse_date_expr("2024-13-40").is_err());
        assert!(parse_date_expr("").is_err());
    }
}

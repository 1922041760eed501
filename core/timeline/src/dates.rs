//! Date parsing, formatting and range helpers for event date expressions.
//!
//! A date expression is either a single day (`2025-01-01`) or a range
//! (`2025-01-01至2025-01-03`). Range checks are inclusive on both ends.

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, Weekday};
use daylife_schemas::RANGE_SEPARATOR;
use std::collections::HashMap;

use crate::error::{Result, TimelineError, ACCEPTED_FORMATS};

const DAY_FORMAT: &str = "%Y-%m-%d";
const DAY_EXPECTED: &str = "YYYY-MM-DD";
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parse a strict `YYYY-MM-DD` day
pub fn parse_day(input: &str) -> Result<NaiveDate> {
    let trimmed = input.trim();
    if trimmed.len() != 10 {
        return Err(TimelineError::format(input, DAY_EXPECTED));
    }
    NaiveDate::parse_from_str(trimmed, DAY_FORMAT)
        .map_err(|_| TimelineError::format(input, DAY_EXPECTED))
}

pub fn format_day(date: NaiveDate) -> String {
    date.format(DAY_FORMAT).to_string()
}

/// Split an expression into its start and optional end side
fn split_expr(expr: &str) -> (&str, Option<&str>) {
    match expr.split_once(RANGE_SEPARATOR) {
        Some((start, end)) => (start.trim(), Some(end.trim())),
        None => (expr.trim(), None),
    }
}

/// Whether `target` lies within the day or range described by `expr`.
///
/// Both sides of `expr` must be strict `YYYY-MM-DD`. A range whose start is
/// after its end is empty and never matches.
pub fn date_matches(target: NaiveDate, expr: &str) -> Result<bool> {
    let (start, end) = split_expr(expr);
    let start = parse_day(start)?;
    match end {
        None => Ok(target == start),
        Some(end) => {
            let end = parse_day(end)?;
            Ok(start <= target && target <= end)
        }
    }
}

pub fn is_date_match(target: &str, expr: &str) -> Result<bool> {
    date_matches(parse_day(target)?, expr)
}

/// Date portion of a day or day-with-time string
fn parse_date_portion(input: &str) -> Option<NaiveDate> {
    let trimmed = input.trim();
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(datetime.date());
        }
    }
    parse_day(trimmed).ok()
}

/// Start day of an expression; accepts times and ranges (left side is used)
pub fn extract_start_date(expr: &str) -> Result<NaiveDate> {
    let (start, _) = split_expr(expr);
    parse_date_portion(start).ok_or_else(|| TimelineError::format(expr, ACCEPTED_FORMATS))
}

/// `(start, end)` of an expression; a single day yields `(d, d)`
pub fn parse_range(expr: &str) -> Result<(NaiveDate, NaiveDate)> {
    let (start, end) = split_expr(expr);
    let parse = |side: &str| {
        parse_date_portion(side).ok_or_else(|| TimelineError::format(expr, ACCEPTED_FORMATS))
    };
    let start = parse(start)?;
    let end = match end {
        Some(end) => parse(end)?,
        None => start,
    };
    Ok((start, end))
}

/// Rewrite an expression with any time portions dropped, keeping its shape
pub fn normalize_expr(expr: &str) -> Result<String> {
    let (start, end) = parse_range(expr)?;
    if split_expr(expr).1.is_some() {
        Ok(format_range(start, end))
    } else {
        Ok(format_day(start))
    }
}

pub fn format_range(start: NaiveDate, end: NaiveDate) -> String {
    format!("{}{}{}", format_day(start), RANGE_SEPARATOR, format_day(end))
}

pub fn next_n_day(date: NaiveDate, n: i64) -> NaiveDate {
    date + Duration::days(n)
}

/// Same day of the previous month, clamped to that month's last day
pub fn same_day_previous_month(date: NaiveDate) -> NaiveDate {
    date.checked_sub_months(Months::new(1))
        .unwrap_or_else(|| next_n_day(date, -30))
}

/// Every day from `start` to `end`, inclusive
pub fn date_span(start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>> {
    if start > end {
        return Err(TimelineError::Range {
            start: format_day(start),
            end: format_day(end),
        });
    }
    Ok(start.iter_days().take_while(|day| *day <= end).collect())
}

pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "星期一",
        Weekday::Tue => "星期二",
        Weekday::Wed => "星期三",
        Weekday::Thu => "星期四",
        Weekday::Fri => "星期五",
        Weekday::Sat => "星期六",
        Weekday::Sun => "星期日",
    }
}

// ============================================================================
// Holidays
// ============================================================================

/// Source of holiday names for a given day and country code
pub trait HolidayCalendar: Send + Sync {
    fn holidays(&self, date: NaiveDate, country: &str) -> Vec<String>;
}

pub struct NoHolidays;

impl HolidayCalendar for NoHolidays {
    fn holidays(&self, _date: NaiveDate, _country: &str) -> Vec<String> {
        Vec::new()
    }
}

/// Fixed month/day holidays per country
#[derive(Debug, Clone, Default)]
pub struct FixedHolidays {
    table: HashMap<(String, u32, u32), Vec<String>>,
}

impl FixedHolidays {
    pub fn new() -> Self {
        Self::default()
    }

    /// Solar-calendar holidays observed on the same day every year
    pub fn with_defaults() -> Self {
        Self::new()
            .with_holiday("CN", 1, 1, "元旦")
            .with_holiday("CN", 3, 8, "妇女节")
            .with_holiday("CN", 5, 1, "劳动节")
            .with_holiday("CN", 6, 1, "儿童节")
            .with_holiday("CN", 10, 1, "国庆节")
            .with_holiday("CN", 12, 25, "圣诞节")
    }

    pub fn with_holiday(mut self, country: &str, month: u32, day: u32, name: &str) -> Self {
        self.table
            .entry((country.to_uppercase(), month, day))
            .or_default()
            .push(name.to_string());
        self
    }
}

impl HolidayCalendar for FixedHolidays {
    fn holidays(&self, date: NaiveDate, country: &str) -> Vec<String> {
        self.table
            .get(&(country.to_uppercase(), date.month(), date.day()))
            .cloned()
            .unwrap_or_default()
    }
}

/// `"YYYY-MM-DD，<weekday>[，<holiday>…]"`
pub fn format_with_weekday_and_holidays(
    date: NaiveDate,
    country: &str,
    calendar: &dyn HolidayCalendar,
) -> String {
    let mut parts = vec![
        format_day(date),
        weekday_name(date.weekday()).to_string(),
    ];
    parts.extend(calendar.holidays(date, country));
    parts.join("，")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        parse_day(s).unwrap()
    }

    #[test]
    fn test_single_date_match() {
        assert!(is_date_match("2025-01-01", "2025-01-01").unwrap());
        assert!(!is_date_match("2025-01-02", "2025-01-01").unwrap());
    }

    #[test]
    fn test_range_match_is_inclusive() {
        let expr = "2025-01-01至2025-01-03";
        assert!(is_date_match("2025-01-01", expr).unwrap());
        assert!(is_date_match("2025-01-02", expr).unwrap());
        assert!(is_date_match("2025-01-03", expr).unwrap());
        assert!(!is_date_match("2024-12-31", expr).unwrap());
        assert!(!is_date_match("2025-01-04", expr).unwrap());
    }

    #[test]
    fn test_inverted_range_never_matches() {
        let expr = "2025-01-03至2025-01-01";
        for target in ["2025-01-01", "2025-01-02", "2025-01-03", "2025-01-05"] {
            assert!(!is_date_match(target, expr).unwrap());
        }
    }

    #[test]
    fn test_match_rejects_malformed_input() {
        assert!(matches!(
            is_date_match("2025/01/01", "2025-01-01"),
            Err(TimelineError::Format { .. })
        ));
        assert!(is_date_match("2025-01-01", "2025-01-01至soon").is_err());
        assert!(is_date_match("2025-01-01", "2025-01-01 08:00").is_err());
    }

    #[test]
    fn test_extract_start_date_formats() {
        assert_eq!(extract_start_date("2025-03-04").unwrap(), day("2025-03-04"));
        assert_eq!(extract_start_date("2025-03-04 08:30").unwrap(), day("2025-03-04"));
        assert_eq!(extract_start_date("2025-03-04 08:30:15").unwrap(), day("2025-03-04"));
        assert_eq!(
            extract_start_date("2025-03-04 08:30至2025-03-06 18:00").unwrap(),
            day("2025-03-04")
        );
    }

    #[test]
    fn test_extract_start_date_error_lists_formats() {
        let err = extract_start_date("next tuesday").unwrap_err();
        assert!(err.to_string().contains("YYYY-MM-DD HH:MM:SS"));
    }

    #[test]
    fn test_extract_start_date_inverts_range_formatting() {
        let start = day("2024-02-28");
        for offset in [0, 1, 2, 40] {
            let end = next_n_day(start, offset);
            assert_eq!(extract_start_date(&format_range(start, end)).unwrap(), start);
        }
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(
            parse_range("2025-01-01").unwrap(),
            (day("2025-01-01"), day("2025-01-01"))
        );
        assert_eq!(
            parse_range("2025-01-01 09:00至2025-01-05").unwrap(),
            (day("2025-01-01"), day("2025-01-05"))
        );
    }

    #[test]
    fn test_normalize_expr_drops_times() {
        assert_eq!(normalize_expr("2025-01-01 09:00").unwrap(), "2025-01-01");
        assert_eq!(
            normalize_expr("2025-01-01 09:00至2025-01-02 10:00").unwrap(),
            "2025-01-01至2025-01-02"
        );
    }

    #[test]
    fn test_next_n_day_handles_negative_offsets() {
        assert_eq!(next_n_day(day("2025-03-01"), -1), day("2025-02-28"));
        assert_eq!(next_n_day(day("2024-12-31"), 1), day("2025-01-01"));
    }

    #[test]
    fn test_previous_month_clamps_day() {
        assert_eq!(same_day_previous_month(day("2025-03-31")), day("2025-02-28"));
        assert_eq!(same_day_previous_month(day("2024-03-30")), day("2024-02-29"));
        assert_eq!(same_day_previous_month(day("2025-01-15")), day("2024-12-15"));
    }

    #[test]
    fn test_date_span() {
        let span = date_span(day("2025-01-30"), day("2025-02-02")).unwrap();
        assert_eq!(span.len(), 4);
        assert_eq!(span[3], day("2025-02-02"));
        assert!(matches!(
            date_span(day("2025-01-02"), day("2025-01-01")),
            Err(TimelineError::Range { .. })
        ));
    }

    #[test]
    fn test_format_with_weekday_and_holidays() {
        let calendar = FixedHolidays::with_defaults().with_holiday("CN", 1, 1, "新年");
        assert_eq!(
            format_with_weekday_and_holidays(day("2025-01-01"), "cn", &calendar),
            "2025-01-01，星期三，元旦，新年"
        );
        assert_eq!(
            format_with_weekday_and_holidays(day("2025-01-02"), "CN", &NoHolidays),
            "2025-01-02，星期四"
        );
    }
}

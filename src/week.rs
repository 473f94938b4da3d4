use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::error::ReportError;
use crate::models::Day;

pub const WEEKS_PER_TERM: u32 = 12;
pub const TERMS_PER_YEAR: u32 = 4;

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange {
            start: start.min(end),
            end: start.max(end),
        }
    }

    pub fn single(day: NaiveDate) -> Self {
        DateRange {
            start: day,
            end: day,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day <= end)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{} to {}", self.start, self.end)
        }
    }
}

pub fn parse_week(input: &str) -> Result<(i32, u32), ReportError> {
    let malformed = || ReportError::MalformedPeriod(input.to_string());
    let (year, week) = input.trim().split_once("-W").ok_or_else(malformed)?;
    let year: i32 = year.parse().map_err(|_| malformed())?;
    let week: u32 = week.parse().map_err(|_| malformed())?;
    if !(1..=53).contains(&week) {
        return Err(malformed());
    }
    Ok((year, week))
}

/// Resolves a `YYYY-Www` label to the Monday..Friday of that ISO week.
///
/// Starts from `Jan 1 + (week - 1) * 7`. A Monday..Thursday lands in the
/// requested week already, so it walks back to that Monday; Friday..Sunday
/// still belongs to the previous ISO week and walks forward to the next Monday.
pub fn resolve_week(input: &str) -> Result<DateRange, ReportError> {
    let (year, week) = parse_week(input)?;
    let out_of_range = || ReportError::MalformedPeriod(input.to_string());
    let jan_first = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(out_of_range)?;
    let simple = jan_first
        .checked_add_signed(Duration::days(i64::from(week - 1) * 7))
        .ok_or_else(out_of_range)?;
    let from_monday = i64::from(simple.weekday().num_days_from_monday());
    let start = if from_monday <= 3 {
        simple.checked_sub_signed(Duration::days(from_monday))
    } else {
        simple.checked_add_signed(Duration::days(7 - from_monday))
    }
    .ok_or_else(out_of_range)?;
    let end = start
        .checked_add_signed(Duration::days(4))
        .ok_or_else(out_of_range)?;
    Ok(DateRange { start, end })
}

pub fn resolve_week_or(input: &str, today: NaiveDate) -> DateRange {
    match resolve_week(input) {
        Ok(range) => range,
        Err(err) => {
            tracing::debug!("{err}; falling back to {today}");
            DateRange::single(today)
        }
    }
}

pub fn week_dates(input: &str, today: NaiveDate) -> BTreeMap<Day, NaiveDate> {
    match resolve_week(input) {
        Ok(range) => Day::ALL
            .iter()
            .map(|day| (*day, range.start + Duration::days(day.offset())))
            .collect(),
        Err(err) => {
            tracing::debug!("{err}; every weekday dated {today}");
            Day::ALL.iter().map(|day| (*day, today)).collect()
        }
    }
}

pub fn month_range(input: &str) -> Result<DateRange, ReportError> {
    let malformed = || ReportError::MalformedPeriod(input.to_string());
    let (year, month) = input.trim().split_once('-').ok_or_else(malformed)?;
    let year: i32 = year.parse().map_err(|_| malformed())?;
    let month: u32 = month.parse().map_err(|_| malformed())?;
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(malformed)?;
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(malformed)?;
    Ok(DateRange {
        start: first,
        end: next_month - Duration::days(1),
    })
}

pub fn term_range(year: i32, term: u32) -> Result<DateRange, ReportError> {
    if !(1..=TERMS_PER_YEAR).contains(&term) {
        return Err(ReportError::MalformedPeriod(format!("term {term} of {year}")));
    }
    let first_week = (term - 1) * WEEKS_PER_TERM + 1;
    let last_week = first_week + WEEKS_PER_TERM - 1;
    let start = resolve_week(&week_label(year, first_week))?.start;
    let end = resolve_week(&week_label(year, last_week))?.end;
    Ok(DateRange { start, end })
}

pub fn week_label(year: i32, week: u32) -> String {
    format!("{year}-W{week:02}")
}

pub fn iso_week_label(date: NaiveDate) -> String {
    let iso = date.iso_week();
    week_label(iso.year(), iso.week())
}

/// Normalizes a week argument that may also be a plain date, then resolves
/// it with the same fallback to `today` as every report.
pub fn week_of(input: &str, today: NaiveDate) -> (String, DateRange) {
    let label = match input.trim().parse::<NaiveDate>() {
        Ok(date) => iso_week_label(date),
        Err(_) => input.to_string(),
    };
    let range = resolve_week_or(&label, today);
    (label, range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn resolves_known_weeks() {
        let range = resolve_week("2025-W05").unwrap();
        assert_eq!(range.start, date(2025, 1, 27));
        assert_eq!(range.end, date(2025, 1, 31));

        let range = resolve_week("2024-W42").unwrap();
        assert_eq!(range.start, date(2024, 10, 14));
        assert_eq!(range.end, date(2024, 10, 18));
    }

    #[test]
    fn week_one_can_start_in_previous_year() {
        // 2025-01-01 is a Wednesday, so week 1 starts on 2024-12-30.
        let range = resolve_week("2025-W01").unwrap();
        assert_eq!(range.start, date(2024, 12, 30));
        // 2021-01-01 is a Friday, so week 1 starts on 2021-01-04.
        let range = resolve_week("2021-W01").unwrap();
        assert_eq!(range.start, date(2021, 1, 4));
    }

    #[test]
    fn rejects_malformed_weeks() {
        for input in ["2025-05", "2025W05", "abcd-W05", "2025-Wxx", "2025-W00", "2025-W54", ""] {
            assert!(
                matches!(resolve_week(input), Err(ReportError::MalformedPeriod(_))),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn weeks_past_the_calendar_limit_are_rejected() {
        let today = date(2026, 3, 11);
        for input in ["262142-W53", "999999-W01"] {
            assert!(
                matches!(resolve_week(input), Err(ReportError::MalformedPeriod(_))),
                "{input} should be rejected"
            );
            assert_eq!(resolve_week_or(input, today), DateRange::single(today));
            assert!(week_dates(input, today).values().all(|d| *d == today));
        }
        assert!(term_range(999_999, 1).is_err());
    }

    #[test]
    fn week_53_of_a_short_year_rolls_into_next_year() {
        // 2025 has 52 ISO weeks; the Jan 1 walk lands on 2026-W01.
        let range = resolve_week("2025-W53").unwrap();
        assert_eq!(range, resolve_week("2026-W01").unwrap());
        assert_eq!(range.start, date(2025, 12, 29));
        // 2026 has a real week 53.
        let range = resolve_week("2026-W53").unwrap();
        assert_eq!(range.start, date(2026, 12, 28));
    }

    #[test]
    fn malformed_week_falls_back_to_today() {
        let today = date(2026, 3, 11);
        assert_eq!(resolve_week_or("not a week", today), DateRange::single(today));
        let dates = week_dates("not a week", today);
        assert_eq!(dates.len(), 5);
        assert!(dates.values().all(|d| *d == today));
    }

    #[test]
    fn week_argument_accepts_dates_and_falls_back() {
        let today = date(2026, 3, 11);
        let (label, range) = week_of("2025-02-05", today);
        assert_eq!(label, "2025-W06");
        assert_eq!(range.start, date(2025, 2, 3));
        let (label, range) = week_of("week six", today);
        assert_eq!(label, "week six");
        assert_eq!(range, DateRange::single(today));
    }

    #[test]
    fn week_dates_cover_monday_to_friday() {
        let dates = week_dates("2025-W06", date(2026, 1, 1));
        assert_eq!(dates[&Day::Monday], date(2025, 2, 3));
        assert_eq!(dates[&Day::Friday], date(2025, 2, 7));
    }

    #[test]
    fn month_range_handles_december_and_leap_years() {
        let range = month_range("2024-02").unwrap();
        assert_eq!(range.end, date(2024, 2, 29));
        let range = month_range("2025-12").unwrap();
        assert_eq!(range.start, date(2025, 12, 1));
        assert_eq!(range.end, date(2025, 12, 31));
        assert!(month_range("2025-13").is_err());
        assert!(month_range("2025").is_err());
    }

    #[test]
    fn term_range_spans_twelve_weeks() {
        let range = term_range(2025, 1).unwrap();
        assert_eq!(range.start, date(2024, 12, 30));
        assert_eq!(range.end, resolve_week("2025-W12").unwrap().end);
        assert!(term_range(2025, 0).is_err());
        assert!(term_range(2025, 5).is_err());
    }

    #[test]
    fn iso_week_label_matches_resolver() {
        assert_eq!(iso_week_label(date(2025, 2, 5)), "2025-W06");
        assert_eq!(iso_week_label(date(2024, 12, 31)), "2025-W01");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_resolved_week_is_monday_to_friday(year in 1970i32..2100, week in 1u32..=52) {
            let range = resolve_week(&week_label(year, week)).unwrap();
            prop_assert_eq!(range.start.weekday(), Weekday::Mon);
            prop_assert_eq!(range.end.weekday(), Weekday::Fri);
            prop_assert_eq!(range.end - range.start, Duration::days(4));
            prop_assert_eq!(Some(range.start), NaiveDate::from_isoywd_opt(year, week, Weekday::Mon));
        }

        #[test]
        fn prop_iso_label_round_trips(offset in 0i64..40_000) {
            let day = date(1970, 1, 1) + Duration::days(offset);
            let range = resolve_week(&iso_week_label(day)).unwrap();
            prop_assert!(range.start <= day);
            prop_assert!(day - range.start < Duration::days(7));
        }
    }
}

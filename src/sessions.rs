use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{Datelike, NaiveDate};

use crate::models::{AttendanceRecord, Day};
use crate::week::DateRange;

/// Every trainee produces one record per session, so sessions are counted by
/// their time label rather than by record.
pub fn sessions_on(records: &[&AttendanceRecord], class_id: &str, date: NaiveDate) -> usize {
    records
        .iter()
        .filter(|record| record.class_id == class_id && record.date == date)
        .map(|record| record.time.as_str())
        .collect::<HashSet<_>>()
        .len()
}

pub fn sessions_per_weekday(
    records: &[&AttendanceRecord],
    class_id: &str,
    range: &DateRange,
) -> BTreeMap<Day, usize> {
    let mut per_day: BTreeMap<Day, usize> = BTreeMap::new();
    for date in range.days() {
        if let Some(day) = Day::from_weekday(date.weekday()) {
            *per_day.entry(day).or_insert(0) += sessions_on(records, class_id, date);
        }
    }
    per_day
}

pub fn distinct_sessions<'a>(records: &[&'a AttendanceRecord]) -> BTreeSet<(NaiveDate, &'a str)> {
    records
        .iter()
        .map(|record| (record.date, record.time.as_str()))
        .collect()
}

/// Sessions a trainee was marked present for, counted once even if the
/// session was submitted twice.
pub fn attended_sessions<'a>(
    records: &[&'a AttendanceRecord],
    trainee_id: &str,
) -> BTreeSet<(NaiveDate, &'a str)> {
    records
        .iter()
        .filter(|record| record.trainee_id == trainee_id && record.is_present())
        .map(|record| (record.date, record.time.as_str()))
        .collect()
}

pub fn daily_fraction(present: usize, total: usize) -> String {
    if total == 0 {
        "-".to_string()
    } else {
        format!("{present}/{total}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttendanceStatus;
    use crate::week::resolve_week;

    fn record(trainee: &str, date: NaiveDate, time: &str, present: bool) -> AttendanceRecord {
        AttendanceRecord {
            trainee_id: trainee.to_string(),
            class_id: "class-1".to_string(),
            unit_id: "unit-1".to_string(),
            trainer_id: "trainer-1".to_string(),
            date,
            time: time.to_string(),
            status: if present {
                AttendanceStatus::Present
            } else {
                AttendanceStatus::Absent
            },
        }
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, 3).unwrap()
    }

    #[test]
    fn counts_sessions_not_records() {
        let records = vec![
            record("t1", monday(), "08:00", true),
            record("t2", monday(), "08:00", false),
            record("t3", monday(), "08:00", true),
            record("t1", monday(), "10:00", true),
            record("t2", monday(), "10:00", true),
        ];
        let refs: Vec<&AttendanceRecord> = records.iter().collect();
        assert_eq!(sessions_on(&refs, "class-1", monday()), 2);
        assert_eq!(sessions_on(&refs, "class-2", monday()), 0);
    }

    #[test]
    fn weekday_counts_leave_empty_days_at_zero() {
        let tuesday = monday().succ_opt().unwrap();
        let records = vec![
            record("t1", monday(), "08:00", true),
            record("t1", tuesday, "13:00", true),
            record("t1", tuesday, "15:00", false),
        ];
        let refs: Vec<&AttendanceRecord> = records.iter().collect();
        let range = resolve_week("2025-W06").unwrap();
        let per_day = sessions_per_weekday(&refs, "class-1", &range);
        assert_eq!(per_day[&Day::Monday], 1);
        assert_eq!(per_day[&Day::Tuesday], 2);
        assert_eq!(per_day[&Day::Friday], 0);
        assert_eq!(per_day.values().sum::<usize>(), 3);
    }

    #[test]
    fn duplicate_submissions_count_once() {
        let records = vec![
            record("t1", monday(), "08:00", true),
            record("t1", monday(), "08:00", true),
            record("t2", monday(), "08:00", false),
        ];
        let refs: Vec<&AttendanceRecord> = records.iter().collect();
        assert_eq!(distinct_sessions(&refs).len(), 1);
        assert_eq!(attended_sessions(&refs, "t1").len(), 1);
        assert!(attended_sessions(&refs, "t2").is_empty());
    }

    #[test]
    fn fraction_marks_days_without_sessions() {
        assert_eq!(daily_fraction(0, 0), "-");
        assert_eq!(daily_fraction(1, 2), "1/2");
    }
}

use std::collections::{BTreeMap, HashSet};

use chrono::{Datelike, Duration, NaiveDate};

use crate::aggregate::{
    aggregate, percentage, within_scope, DeliveredSession, GroupBy, ReportKind, Tallied,
    LOW_ATTENDANCE_THRESHOLD,
};
use crate::error::ReportError;
use crate::models::{
    AttendanceRecord, Class, DailyAttendance, Day, PercentageReportData, PeriodicTraineeReportData,
    PeriodicTraineeRow, ScheduleSubmission, SessionEntry, SessionSummary,
    SessionTraineeReportData, TraineeRef, TraineeWeekRow, WeeklySummary, WeeklyTraineeReportData,
    WeeklyTrainerReportData,
};
use crate::scope::{Action, Scope};
use crate::sessions::{
    attended_sessions, daily_fraction, distinct_sessions, sessions_on, sessions_per_weekday,
};
use crate::store::{ReferenceMaps, Repository};
use crate::week::{month_range, resolve_week, resolve_week_or, term_range, week_dates, DateRange};

pub const UNKNOWN_UNIT: &str = "Unknown Unit";
pub const UNKNOWN_TRAINER: &str = "Unknown Trainer";
const NO_CLASS_REP: &str = "N/A";

fn unit_name(refs: &ReferenceMaps<'_>, unit_id: &str) -> String {
    match refs.unit(unit_id) {
        Some(unit) => unit.name.clone(),
        None => {
            tracing::debug!("unit {unit_id} does not resolve, using placeholder");
            UNKNOWN_UNIT.to_string()
        }
    }
}

fn trainer_name(refs: &ReferenceMaps<'_>, trainer_id: &str) -> String {
    match refs.trainer(trainer_id) {
        Some(trainer) => trainer.name.clone(),
        None => {
            tracing::debug!("trainer {trainer_id} does not resolve, using placeholder");
            UNKNOWN_TRAINER.to_string()
        }
    }
}

fn scoped_class<'r, R: Repository + ?Sized>(
    repo: &'r R,
    scope: &Scope,
    class_id: &str,
) -> Result<&'r Class, ReportError> {
    let class = repo
        .class(class_id)
        .ok_or_else(|| ReportError::UnknownClass(class_id.to_string()))?;
    scope.require_class(class)?;
    Ok(class)
}

pub fn weekly_trainer_report(
    submission: &ScheduleSubmission,
    class: &Class,
    class_rep_name: &str,
    refs: &ReferenceMaps<'_>,
    today: NaiveDate,
) -> WeeklyTrainerReportData {
    let mut schedule = BTreeMap::new();
    for (day, slots) in &submission.schedule {
        let mut entries = BTreeMap::new();
        for (slot, session) in slots {
            // Slots left blank on the form carry no unit or trainer.
            if session.unit_id.trim().is_empty() || session.trainer_id.trim().is_empty() {
                continue;
            }
            entries.insert(
                slot.clone(),
                SessionEntry {
                    subject: unit_name(refs, &session.unit_id),
                    status: session.status.label().to_string(),
                    trainer: trainer_name(refs, &session.trainer_id),
                },
            );
        }
        if !entries.is_empty() {
            schedule.insert(*day, entries);
        }
    }

    WeeklyTrainerReportData {
        department: class.department.clone(),
        class_name: class.name.clone(),
        class_rep_name: class_rep_name.to_string(),
        schedule,
        dates: week_dates(&submission.week, today),
    }
}

/// Trainer log for the effective submission of a class and week. The class
/// rep who filed it may download it as well as report readers.
pub fn weekly_trainer_report_for<R: Repository + ?Sized>(
    repo: &R,
    scope: &Scope,
    class_id: &str,
    week: &str,
    today: NaiveDate,
) -> Result<WeeklyTrainerReportData, ReportError> {
    if !scope.permits(Action::GenerateReports) {
        scope.require(Action::SubmitSchedule)?;
    }
    let class = scoped_class(repo, scope, class_id)?;
    let submission = repo
        .latest_schedule(class_id, week)
        .ok_or_else(|| ReportError::no_data("trainer schedule", format!("{} in {week}", class.name)))?;
    let class_rep_name = repo
        .user(&submission.submitted_by)
        .map(|user| user.name.as_str())
        .unwrap_or(NO_CLASS_REP);
    let refs = ReferenceMaps::from_repository(repo);
    Ok(weekly_trainer_report(submission, class, class_rep_name, &refs, today))
}

pub fn recommendations(low_attendance: &[String]) -> String {
    if low_attendance.is_empty() {
        return String::new();
    }
    format!(
        "Follow up with {} on attendance below {:.0}% this week.",
        low_attendance.join(", "),
        LOW_ATTENDANCE_THRESHOLD
    )
}

pub fn weekly_trainee_report<R: Repository + ?Sized>(
    repo: &R,
    scope: &Scope,
    class_id: &str,
    week: &str,
    today: NaiveDate,
) -> Result<WeeklyTraineeReportData, ReportError> {
    scope.require(Action::GenerateReports)?;
    let class = scoped_class(repo, scope, class_id)?;
    let range = resolve_week_or(week, today);
    let refs = ReferenceMaps::from_repository(repo);

    let trainees = repo.trainees_in_class(class_id);
    let records: Vec<&AttendanceRecord> = repo
        .attendance()
        .iter()
        .filter(|record| {
            record.class_id == class_id
                && range.contains(record.date)
                && within_scope(*record, &refs, scope)
        })
        .collect();

    let per_day = sessions_per_weekday(&records, class_id, &range);
    let total_weekly: usize = per_day.values().sum();
    if trainees.is_empty() || records.is_empty() || total_weekly == 0 {
        return Err(ReportError::no_data(
            "attendance records",
            format!("{} in {range}", class.name),
        ));
    }

    let mut attendance_grid = Vec::with_capacity(trainees.len());
    let mut perfect_attendance = Vec::new();
    let mut low_attendance = Vec::new();
    let mut grand_present = 0;

    for trainee in &trainees {
        let attended = attended_sessions(&records, &trainee.id);
        let mut attendance = DailyAttendance::default();
        for date in range.days() {
            let Some(day) = Day::from_weekday(date.weekday()) else {
                continue;
            };
            let present = attended.iter().filter(|(held_on, _)| *held_on == date).count();
            *attendance.slot_mut(day) = daily_fraction(present, sessions_on(&records, class_id, date));
        }

        let present_total = attended.len();
        grand_present += present_total;
        let weekly_percentage = percentage(present_total, total_weekly);
        if present_total == total_weekly {
            perfect_attendance.push(trainee.name.clone());
        }
        if weekly_percentage < LOW_ATTENDANCE_THRESHOLD {
            low_attendance.push(trainee.name.clone());
        }
        attendance_grid.push(TraineeWeekRow {
            name: trainee.name.clone(),
            attendance,
            weekly_percentage,
        });
    }

    let recommendations = recommendations(&low_attendance);
    Ok(WeeklyTraineeReportData {
        attendance_grid,
        summary: WeeklySummary {
            overall_percentage: percentage(grand_present, total_weekly * trainees.len()),
            perfect_attendance,
            low_attendance,
        },
        recommendations,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportPeriod {
    Weekly(String),
    Monthly(String),
    Termly { year: i32, term: u32 },
}

impl ReportPeriod {
    pub fn title(&self) -> &'static str {
        match self {
            ReportPeriod::Weekly(_) => "Weekly Attendance Report",
            ReportPeriod::Monthly(_) => "Monthly Attendance Report",
            ReportPeriod::Termly { .. } => "Termly Attendance Report",
        }
    }

    pub fn resolve(&self, today: NaiveDate) -> Result<(DateRange, String), ReportError> {
        match self {
            ReportPeriod::Weekly(week) => Ok((resolve_week_or(week, today), format!("Week: {week}"))),
            ReportPeriod::Monthly(month) => {
                let range = month_range(month)?;
                let label = format!("Month: {}", range.start.format("%B %Y"));
                Ok((range, label))
            }
            ReportPeriod::Termly { year, term } => {
                Ok((term_range(*year, *term)?, format!("Term {term} ({year})")))
            }
        }
    }
}

pub fn periodic_trainee_report<R: Repository + ?Sized>(
    repo: &R,
    scope: &Scope,
    class_id: &str,
    trainer_id: &str,
    period: &ReportPeriod,
    today: NaiveDate,
) -> Result<PeriodicTraineeReportData, ReportError> {
    scope.require(Action::GenerateReports)?;
    let class = scoped_class(repo, scope, class_id)?;
    let refs = ReferenceMaps::from_repository(repo);
    let trainer = refs
        .trainer(trainer_id)
        .ok_or_else(|| ReportError::UnknownTrainer(trainer_id.to_string()))?;
    if let Some(own) = scope.own_trainer_id() {
        if own != trainer_id {
            return Err(ReportError::Forbidden(format!(
                "{} may only report on their own sessions",
                scope.user_name
            )));
        }
    }

    let (range, period_label) = period.resolve(today)?;
    let records: Vec<&AttendanceRecord> = repo
        .attendance()
        .iter()
        .filter(|record| {
            record.class_id == class_id && record.trainer_id == trainer_id && range.contains(record.date)
        })
        .collect();
    let total_sessions = distinct_sessions(&records).len();
    if total_sessions == 0 {
        return Err(ReportError::no_data(
            "sessions",
            format!("{} with {} ({range})", class.name, trainer.name),
        ));
    }

    let attendance_grid = repo
        .trainees_in_class(class_id)
        .into_iter()
        .map(|trainee| {
            let present_count = attended_sessions(&records, &trainee.id).len();
            PeriodicTraineeRow {
                trainee_name: trainee.name.clone(),
                admission_number: trainee.admission_number.clone(),
                present_count,
                absent_count: total_sessions.saturating_sub(present_count),
                total_sessions,
                attendance_percentage: percentage(present_count, total_sessions),
            }
        })
        .collect();

    Ok(PeriodicTraineeReportData {
        report_title: period.title().to_string(),
        period: period_label,
        class_name: class.name.clone(),
        trainer_name: trainer.name.clone(),
        attendance_grid,
    })
}

pub fn session_trainee_report<R: Repository + ?Sized>(
    repo: &R,
    scope: &Scope,
    class_id: &str,
    unit_id: &str,
    date: NaiveDate,
    time: &str,
) -> Result<SessionTraineeReportData, ReportError> {
    scope.require(Action::GenerateReports)?;
    let class = scoped_class(repo, scope, class_id)?;
    let refs = ReferenceMaps::from_repository(repo);
    let records: Vec<&AttendanceRecord> = repo
        .attendance()
        .iter()
        .filter(|record| {
            record.class_id == class_id
                && record.unit_id == unit_id
                && record.date == date
                && record.time == time
                && within_scope(*record, &refs, scope)
        })
        .collect();
    let Some(first) = records.first() else {
        return Err(ReportError::no_data(
            "attendance",
            format!("{} on {date} at {time}", class.name),
        ));
    };

    let present: HashSet<&str> = records
        .iter()
        .filter(|record| record.is_present())
        .map(|record| record.trainee_id.as_str())
        .collect();
    let trainees = repo.trainees_in_class(class_id);
    let (present_trainees, absent_trainees): (Vec<TraineeRef>, Vec<TraineeRef>) = {
        let mut present_list = Vec::new();
        let mut absent_list = Vec::new();
        for trainee in &trainees {
            let entry = TraineeRef {
                name: trainee.name.clone(),
                admission_number: trainee.admission_number.clone(),
            };
            if present.contains(trainee.id.as_str()) {
                present_list.push(entry);
            } else {
                absent_list.push(entry);
            }
        }
        (present_list, absent_list)
    };

    let summary = SessionSummary {
        present: present_trainees.len(),
        absent: absent_trainees.len(),
        total: trainees.len(),
    };
    Ok(SessionTraineeReportData {
        class_name: class.name.clone(),
        unit_name: unit_name(&refs, unit_id),
        trainer_name: trainer_name(&refs, &first.trainer_id),
        date,
        time: time.to_string(),
        present_trainees,
        absent_trainees,
        summary,
    })
}

/// Every filled slot of every effective schedule, dated by its week.
pub fn delivered_sessions<R: Repository + ?Sized>(repo: &R) -> Vec<DeliveredSession> {
    let mut sessions = Vec::new();
    for submission in repo.effective_schedules() {
        let week = match resolve_week(&submission.week) {
            Ok(range) => range,
            Err(err) => {
                tracing::debug!("skipping schedule {}: {err}", submission.id);
                continue;
            }
        };
        for (day, slots) in &submission.schedule {
            let date = week.start + Duration::days(day.offset());
            for session in slots.values() {
                if session.unit_id.trim().is_empty() || session.trainer_id.trim().is_empty() {
                    continue;
                }
                sessions.push(DeliveredSession {
                    trainer_id: session.trainer_id.clone(),
                    class_id: submission.class_id.clone(),
                    date,
                    status: session.status,
                });
            }
        }
    }
    sessions
}

fn in_range<T: Tallied>(rows: impl IntoIterator<Item = T>, range: &DateRange) -> Vec<T> {
    rows.into_iter()
        .filter(|row| range.contains(row.date()))
        .collect()
}

pub fn percentage_report<R: Repository + ?Sized>(
    repo: &R,
    scope: &Scope,
    kind: ReportKind,
    group_by: GroupBy,
    range: &DateRange,
) -> Result<PercentageReportData, ReportError> {
    scope.require(Action::GenerateReports)?;
    let refs = ReferenceMaps::from_repository(repo);
    let result = match kind {
        ReportKind::TraineeAttendance => {
            let rows = in_range(repo.attendance().iter(), range);
            aggregate(&rows, group_by, &refs, scope)?
        }
        ReportKind::TrainerActivity => {
            let rows = in_range(delivered_sessions(repo), range);
            aggregate(&rows, group_by, &refs, scope)?
        }
    };

    Ok(PercentageReportData {
        title: format!("{} by {group_by}", kind.title()),
        period: range.to_string(),
        items: result.items,
        overall: result.overall,
    })
}

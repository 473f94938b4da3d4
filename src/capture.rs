use std::collections::HashSet;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::ReportError;
use crate::models::{
    AttendanceRecord, AttendanceStatus, Class, Day, Remark, RemarkKind, ScheduleSubmission,
    SessionInput, SessionStatus, WeeklySchedule, TIME_SLOTS,
};
use crate::scope::{Action, Scope, Visibility};
use crate::store::{MemoryStore, Repository};
use crate::week::parse_week;

fn class_in_scope<'s>(store: &'s MemoryStore, scope: &Scope, class_id: &str) -> Result<&'s Class, ReportError> {
    let class = store
        .class(class_id)
        .ok_or_else(|| ReportError::UnknownClass(class_id.to_string()))?;
    scope.require_class(class)?;
    Ok(class)
}

/// Records one session for a whole class: listed trainees present, every
/// other trainee of the class absent. Returns the records written.
pub fn take_attendance(
    store: &mut MemoryStore,
    scope: &Scope,
    class_id: &str,
    unit_id: &str,
    date: NaiveDate,
    time: &str,
    present: &[String],
) -> Result<usize, ReportError> {
    scope.require(Action::TakeAttendance)?;
    class_in_scope(store, scope, class_id)?;
    let unit = store
        .units()
        .iter()
        .find(|unit| unit.id == unit_id && unit.class_id == class_id)
        .ok_or_else(|| ReportError::UnknownUnit(unit_id.to_string()))?;
    if store.assigned_trainer(unit_id) != Some(scope.user_id.as_str()) {
        return Err(ReportError::Forbidden(format!(
            "{} is not assigned to {}",
            scope.user_name, unit.name
        )));
    }

    let trainees: Vec<String> = store
        .trainees_in_class(class_id)
        .into_iter()
        .map(|trainee| trainee.id.clone())
        .collect();
    let present: HashSet<&str> = present.iter().map(String::as_str).collect();
    for id in &present {
        if !trainees.iter().any(|trainee| trainee.as_str() == *id) {
            tracing::warn!("trainee {id} is not in class {class_id}, ignoring");
        }
    }

    let records: Vec<AttendanceRecord> = trainees
        .iter()
        .map(|trainee_id| AttendanceRecord {
            trainee_id: trainee_id.clone(),
            class_id: class_id.to_string(),
            unit_id: unit_id.to_string(),
            trainer_id: scope.user_id.clone(),
            date,
            time: time.to_string(),
            status: if present.contains(trainee_id.as_str()) {
                AttendanceStatus::Present
            } else {
                AttendanceStatus::Absent
            },
        })
        .collect();
    Ok(store.add_attendance(records))
}

/// One filled slot given on the command line as
/// `day,timeslot,unit_id,trainer_id[,status]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotEntry {
    pub day: Day,
    pub time_slot: String,
    pub session: SessionInput,
}

impl FromStr for SlotEntry {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = value.split(',').map(str::trim).collect();
        if !(4..=5).contains(&parts.len()) {
            return Err(format!(
                "expected day,timeslot,unit,trainer[,status] but got {value:?}"
            ));
        }
        let status = match parts.get(4) {
            Some(label) => SessionStatus::from_label(label)
                .ok_or_else(|| format!("unknown session status {label:?}"))?,
            None => SessionStatus::Taught,
        };
        Ok(SlotEntry {
            day: parts[0].parse()?,
            time_slot: parts[1].to_string(),
            session: SessionInput {
                unit_id: parts[2].to_string(),
                trainer_id: parts[3].to_string(),
                status,
            },
        })
    }
}

pub fn schedule_from_slots(slots: impl IntoIterator<Item = SlotEntry>) -> WeeklySchedule {
    let mut schedule = WeeklySchedule::new();
    for slot in slots {
        schedule
            .entry(slot.day)
            .or_default()
            .insert(slot.time_slot, slot.session);
    }
    schedule
}

fn validate_schedule(store: &MemoryStore, class_id: &str, schedule: &WeeklySchedule) -> Result<(), ReportError> {
    if schedule.values().all(|slots| slots.is_empty()) {
        return Err(ReportError::InvalidSchedule("no sessions filled in".to_string()));
    }
    for (day, slots) in schedule {
        for (slot, session) in slots {
            if !TIME_SLOTS.contains(&slot.as_str()) {
                return Err(ReportError::InvalidSchedule(format!(
                    "{} has unknown timeslot {slot}",
                    day.label()
                )));
            }
            let in_class = store
                .units()
                .iter()
                .any(|unit| unit.id == session.unit_id && unit.class_id == class_id);
            if !in_class {
                return Err(ReportError::InvalidSchedule(format!(
                    "{} {slot}: unit {} is not taught to this class",
                    day.label(),
                    session.unit_id
                )));
            }
            if !store.trainers().iter().any(|t| t.id == session.trainer_id) {
                return Err(ReportError::UnknownTrainer(session.trainer_id.clone()));
            }
        }
    }
    Ok(())
}

/// Files a weekly trainer log. Resubmitting the same class and week
/// supersedes the earlier log.
pub fn submit_schedule<'s>(
    store: &'s mut MemoryStore,
    scope: &Scope,
    class_id: &str,
    week: &str,
    schedule: WeeklySchedule,
    submitted_at: DateTime<Utc>,
) -> Result<&'s ScheduleSubmission, ReportError> {
    scope.require(Action::SubmitSchedule)?;
    class_in_scope(store, scope, class_id)?;
    parse_week(week)?;
    validate_schedule(store, class_id, &schedule)?;

    Ok(store.submit_schedule(ScheduleSubmission {
        id: format!("schedule-{}", Uuid::new_v4()),
        class_id: class_id.to_string(),
        week: week.trim().to_string(),
        schedule,
        submitted_by: scope.user_id.clone(),
        submitted_at,
    }))
}

pub fn write_remark<'s>(
    store: &'s mut MemoryStore,
    scope: &Scope,
    class_id: &str,
    week: &str,
    kind: RemarkKind,
    text: &str,
    today: NaiveDate,
) -> Result<&'s Remark, ReportError> {
    scope.require(Action::WriteRemarks)?;
    class_in_scope(store, scope, class_id)?;
    parse_week(week)?;

    Ok(store.upsert_remark(Remark {
        id: format!("remark-{}", Uuid::new_v4()),
        class_id: class_id.to_string(),
        week: week.trim().to_string(),
        kind,
        remark_text: text.trim().to_string(),
        author_name: scope.user_name.clone(),
        author_signature: scope.user_name.clone(),
        date: today,
    }))
}

/// Remarks on classes the scope can see, newest first.
pub fn visible_remarks<'r, R: Repository + ?Sized>(repo: &'r R, scope: &Scope) -> Vec<&'r Remark> {
    let mut remarks: Vec<&Remark> = repo
        .remarks()
        .iter()
        .filter(|remark| match repo.class(&remark.class_id) {
            Some(class) => scope.admits_class(class),
            None => scope.visibility == Visibility::AllDepartments,
        })
        .collect();
    remarks.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
    remarks
}

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;

use crate::error::ReportError;
use crate::models::{AttendanceRecord, OverallTotals, PercentageReportItem, SessionStatus};
use crate::scope::{Scope, Visibility};
use crate::store::ReferenceMaps;

pub const LOW_ATTENDANCE_THRESHOLD: f64 = 80.0;

const UNKNOWN_DEPARTMENT: &str = "Unknown Department";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum GroupBy {
    Individual,
    Class,
    Department,
    Overall,
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GroupBy::Individual => "Individual",
            GroupBy::Class => "Class",
            GroupBy::Department => "Department",
            GroupBy::Overall => "Overall",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Individual(String),
    Class(String),
    Department(String),
    Overall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportKind {
    TraineeAttendance,
    TrainerActivity,
}

impl ReportKind {
    pub fn title(self) -> &'static str {
        match self {
            ReportKind::TraineeAttendance => "Trainee Attendance Percentage Report",
            ReportKind::TrainerActivity => "Trainer Activity Percentage Report",
        }
    }
}

/// A row that can be counted towards a percentage: one trainee mark, or one
/// scheduled teaching slot.
pub trait Tallied {
    const KIND: ReportKind;

    /// Trainee id for attendance rows, trainer id for delivered sessions.
    fn individual_id(&self) -> &str;
    fn class_id(&self) -> &str;
    fn trainer_id(&self) -> &str;
    fn date(&self) -> NaiveDate;
    fn counts_as_present(&self) -> bool;
}

impl<T: Tallied> Tallied for &T {
    const KIND: ReportKind = T::KIND;

    fn individual_id(&self) -> &str {
        (*self).individual_id()
    }

    fn class_id(&self) -> &str {
        (*self).class_id()
    }

    fn trainer_id(&self) -> &str {
        (*self).trainer_id()
    }

    fn date(&self) -> NaiveDate {
        (*self).date()
    }

    fn counts_as_present(&self) -> bool {
        (*self).counts_as_present()
    }
}

impl Tallied for AttendanceRecord {
    const KIND: ReportKind = ReportKind::TraineeAttendance;

    fn individual_id(&self) -> &str {
        &self.trainee_id
    }

    fn class_id(&self) -> &str {
        &self.class_id
    }

    fn trainer_id(&self) -> &str {
        &self.trainer_id
    }

    fn date(&self) -> NaiveDate {
        self.date
    }

    fn counts_as_present(&self) -> bool {
        self.is_present()
    }
}

/// One filled slot of an effective weekly schedule, dated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredSession {
    pub trainer_id: String,
    pub class_id: String,
    pub date: NaiveDate,
    pub status: SessionStatus,
}

impl Tallied for DeliveredSession {
    const KIND: ReportKind = ReportKind::TrainerActivity;

    fn individual_id(&self) -> &str {
        &self.trainer_id
    }

    fn class_id(&self) -> &str {
        &self.class_id
    }

    fn trainer_id(&self) -> &str {
        &self.trainer_id
    }

    fn date(&self) -> NaiveDate {
        self.date
    }

    fn counts_as_present(&self) -> bool {
        self.status.counts_as_delivered()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateResult {
    pub items: Vec<PercentageReportItem>,
    pub overall: OverallTotals,
}

pub fn percentage(present: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        present as f64 / total as f64 * 100.0
    }
}

/// Rows outside the scope are dropped before grouping. A class that no longer
/// resolves has no department, so only an unrestricted scope keeps its rows.
pub fn within_scope<T: Tallied>(row: &T, refs: &ReferenceMaps<'_>, scope: &Scope) -> bool {
    if let Some(trainer_id) = scope.own_trainer_id() {
        if row.trainer_id() != trainer_id {
            return false;
        }
    }
    match refs.department_of_class(row.class_id()) {
        Some(department) => scope.admits_department(department),
        None => scope.visibility == Visibility::AllDepartments,
    }
}

fn group_key<T: Tallied>(row: &T, group_by: GroupBy, refs: &ReferenceMaps<'_>) -> GroupKey {
    match group_by {
        GroupBy::Individual => GroupKey::Individual(row.individual_id().to_string()),
        GroupBy::Class => GroupKey::Class(row.class_id().to_string()),
        GroupBy::Department => {
            // Trainers are counted under their own department, trainees
            // under the department of their class.
            let own = match T::KIND {
                ReportKind::TrainerActivity => refs
                    .trainer(row.individual_id())
                    .map(|trainer| trainer.department.as_str()),
                ReportKind::TraineeAttendance => None,
            };
            GroupKey::Department(
                own.or_else(|| refs.department_of_class(row.class_id()))
                    .unwrap_or(UNKNOWN_DEPARTMENT)
                    .to_string(),
            )
        }
        GroupBy::Overall => GroupKey::Overall,
    }
}

fn display(key: &GroupKey, kind: ReportKind, refs: &ReferenceMaps<'_>) -> (String, String) {
    match key {
        GroupKey::Individual(id) => {
            let name = match kind {
                ReportKind::TraineeAttendance => refs.trainee(id).map(|t| t.name.clone()),
                ReportKind::TrainerActivity => refs.trainer(id).map(|t| t.name.clone()),
            };
            (id.clone(), name.unwrap_or_else(|| id.clone()))
        }
        GroupKey::Class(id) => {
            let name = refs.class(id).map(|c| c.name.clone());
            (id.clone(), name.unwrap_or_else(|| id.clone()))
        }
        GroupKey::Department(name) => (name.clone(), name.clone()),
        GroupKey::Overall => ("overall".to_string(), "Overall".to_string()),
    }
}

pub fn aggregate<T: Tallied>(
    rows: &[T],
    group_by: GroupBy,
    refs: &ReferenceMaps<'_>,
    scope: &Scope,
) -> Result<AggregateResult, ReportError> {
    let mut counts: HashMap<GroupKey, (usize, usize)> = HashMap::new();
    for row in rows.iter().filter(|row| within_scope(*row, refs, scope)) {
        let entry = counts.entry(group_key(row, group_by, refs)).or_insert((0, 0));
        if row.counts_as_present() {
            entry.0 += 1;
        }
        entry.1 += 1;
    }

    if counts.is_empty() {
        return Err(ReportError::no_data(
            "records",
            format!("{} within {}", T::KIND.title(), scope.department_label()),
        ));
    }

    let mut items: Vec<PercentageReportItem> = counts
        .into_iter()
        .map(|(key, (present_count, total_sessions))| {
            let (id, name) = display(&key, T::KIND, refs);
            PercentageReportItem {
                id,
                name,
                present_count,
                total_sessions,
                percentage: percentage(present_count, total_sessions),
            }
        })
        .collect();
    items.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });

    let present: usize = items.iter().map(|item| item.present_count).sum();
    let total: usize = items.iter().map(|item| item.total_sessions).sum();
    Ok(AggregateResult {
        items,
        overall: OverallTotals {
            present,
            total,
            percentage: percentage(present, total),
        },
    })
}

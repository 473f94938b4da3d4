use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

pub const TIME_SLOTS: [&str; 5] = [
    "08:00-10:00",
    "10:00-12:00",
    "12:00-13:00",
    "13:00-15:00",
    "15:00-17:00",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "IQA")]
    Iqa,
    #[serde(rename = "HOD")]
    Hod,
    Trainer,
    ClassRep,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Role::Iqa => "IQA",
            Role::Hod => "HOD",
            Role::Trainer => "Trainer",
            Role::ClassRep => "Class Rep",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub username: String,
    pub role: Role,
    pub department: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Trainer {
    pub id: String,
    pub name: String,
    pub department: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Trainee {
    pub id: String,
    pub name: String,
    pub admission_number: String,
    pub class_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Class {
    pub id: String,
    pub name: String,
    pub department: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Unit {
    pub id: String,
    pub name: String,
    pub class_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UnitAssignment {
    pub unit_id: String,
    pub trainer_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AttendanceRecord {
    pub trainee_id: String,
    pub class_id: String,
    pub unit_id: String,
    pub trainer_id: String,
    pub date: NaiveDate,
    pub time: String,
    pub status: AttendanceStatus,
}

impl AttendanceRecord {
    pub fn is_present(&self) -> bool {
        self.status == AttendanceStatus::Present
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
    Taught,
    #[serde(rename = "Not Taught")]
    NotTaught,
    Assignment,
}

impl SessionStatus {
    /// Taught sessions and set assignments both count as delivered instruction.
    pub fn counts_as_delivered(self) -> bool {
        matches!(self, SessionStatus::Taught | SessionStatus::Assignment)
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionStatus::Taught => "Taught",
            SessionStatus::NotTaught => "Not Taught",
            SessionStatus::Assignment => "Assignment",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "Taught" => Some(SessionStatus::Taught),
            "Not Taught" => Some(SessionStatus::NotTaught),
            "Assignment" => Some(SessionStatus::Assignment),
            _ => None,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl Day {
    pub const ALL: [Day; 5] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
    ];

    pub fn from_weekday(weekday: Weekday) -> Option<Self> {
        match weekday {
            Weekday::Mon => Some(Day::Monday),
            Weekday::Tue => Some(Day::Tuesday),
            Weekday::Wed => Some(Day::Wednesday),
            Weekday::Thu => Some(Day::Thursday),
            Weekday::Fri => Some(Day::Friday),
            Weekday::Sat | Weekday::Sun => None,
        }
    }

    /// Days after the Monday of the same week.
    pub fn offset(self) -> i64 {
        match self {
            Day::Monday => 0,
            Day::Tuesday => 1,
            Day::Wednesday => 2,
            Day::Thursday => 3,
            Day::Friday => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
            Day::Friday => "Friday",
        }
    }
}

impl FromStr for Day {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "monday" | "mon" => Ok(Day::Monday),
            "tuesday" | "tue" => Ok(Day::Tuesday),
            "wednesday" | "wed" => Ok(Day::Wednesday),
            "thursday" | "thu" => Ok(Day::Thursday),
            "friday" | "fri" => Ok(Day::Friday),
            other => Err(format!("not a teaching day: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInput {
    pub unit_id: String,
    pub trainer_id: String,
    pub status: SessionStatus,
}

/// Day -> timeslot label -> session. Timeslot labels sort chronologically.
pub type WeeklySchedule = BTreeMap<Day, BTreeMap<String, SessionInput>>;

#[derive(Debug, Clone)]
pub struct ScheduleSubmission {
    pub id: String,
    pub class_id: String,
    pub week: String,
    pub schedule: WeeklySchedule,
    pub submitted_by: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RemarkKind {
    Trainee,
    Trainer,
}

impl fmt::Display for RemarkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemarkKind::Trainee => f.write_str("trainee"),
            RemarkKind::Trainer => f.write_str("trainer"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Remark {
    pub id: String,
    pub class_id: String,
    pub week: String,
    pub kind: RemarkKind,
    pub remark_text: String,
    pub author_name: String,
    pub author_signature: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyAttendance {
    pub mon: String,
    pub tue: String,
    pub wed: String,
    pub thu: String,
    pub fri: String,
}

impl DailyAttendance {
    pub fn slot_mut(&mut self, day: Day) -> &mut String {
        match day {
            Day::Monday => &mut self.mon,
            Day::Tuesday => &mut self.tue,
            Day::Wednesday => &mut self.wed,
            Day::Thursday => &mut self.thu,
            Day::Friday => &mut self.fri,
        }
    }

    pub fn get(&self, day: Day) -> &str {
        match day {
            Day::Monday => &self.mon,
            Day::Tuesday => &self.tue,
            Day::Wednesday => &self.wed,
            Day::Thursday => &self.thu,
            Day::Friday => &self.fri,
        }
    }
}

impl Default for DailyAttendance {
    fn default() -> Self {
        DailyAttendance {
            mon: "-".to_string(),
            tue: "-".to_string(),
            wed: "-".to_string(),
            thu: "-".to_string(),
            fri: "-".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraineeWeekRow {
    pub name: String,
    pub attendance: DailyAttendance,
    pub weekly_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySummary {
    pub overall_percentage: f64,
    pub perfect_attendance: Vec<String>,
    pub low_attendance: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyTraineeReportData {
    pub attendance_grid: Vec<TraineeWeekRow>,
    pub summary: WeeklySummary,
    pub recommendations: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionEntry {
    pub subject: String,
    pub status: String,
    pub trainer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyTrainerReportData {
    pub department: String,
    pub class_name: String,
    pub class_rep_name: String,
    pub schedule: BTreeMap<Day, BTreeMap<String, SessionEntry>>,
    pub dates: BTreeMap<Day, NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodicTraineeRow {
    pub trainee_name: String,
    pub admission_number: String,
    pub present_count: usize,
    pub absent_count: usize,
    pub total_sessions: usize,
    pub attendance_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodicTraineeReportData {
    pub report_title: String,
    pub period: String,
    pub class_name: String,
    pub trainer_name: String,
    pub attendance_grid: Vec<PeriodicTraineeRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraineeRef {
    pub name: String,
    pub admission_number: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub present: usize,
    pub absent: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTraineeReportData {
    pub class_name: String,
    pub unit_name: String,
    pub trainer_name: String,
    pub date: NaiveDate,
    pub time: String,
    pub present_trainees: Vec<TraineeRef>,
    pub absent_trainees: Vec<TraineeRef>,
    pub summary: SessionSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentageReportItem {
    pub id: String,
    pub name: String,
    pub present_count: usize,
    pub total_sessions: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverallTotals {
    pub present: usize,
    pub total: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentageReportData {
    pub title: String,
    pub period: String,
    pub items: Vec<PercentageReportItem>,
    pub overall: OverallTotals,
}

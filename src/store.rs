use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::models::{
    AttendanceRecord, Class, Day, Remark, RemarkKind, ScheduleSubmission, SessionInput,
    SessionStatus, Trainee, Trainer, Unit, UnitAssignment, User,
};

/// Read-only view of the reference tables and event logs that report
/// generation works from.
pub trait Repository {
    fn classes(&self) -> &[Class];
    fn trainees(&self) -> &[Trainee];
    fn trainers(&self) -> &[Trainer];
    fn units(&self) -> &[Unit];
    fn unit_assignments(&self) -> &[UnitAssignment];
    fn users(&self) -> &[User];
    fn attendance(&self) -> &[AttendanceRecord];
    fn schedules(&self) -> &[ScheduleSubmission];
    fn remarks(&self) -> &[Remark];

    /// Most recent submission for the class and week. Earlier submissions
    /// for the same key are superseded, never merged.
    fn latest_schedule(&self, class_id: &str, week: &str) -> Option<&ScheduleSubmission>;

    /// One submission per (class, week): the one `latest_schedule` returns.
    fn effective_schedules(&self) -> Vec<&ScheduleSubmission>;

    fn class(&self, id: &str) -> Option<&Class> {
        self.classes().iter().find(|class| class.id == id)
    }

    fn user(&self, id: &str) -> Option<&User> {
        self.users().iter().find(|user| user.id == id)
    }

    fn trainees_in_class(&self, class_id: &str) -> Vec<&Trainee> {
        let mut trainees: Vec<&Trainee> = self
            .trainees()
            .iter()
            .filter(|trainee| trainee.class_id == class_id)
            .collect();
        trainees.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
        trainees
    }

    fn assigned_trainer(&self, unit_id: &str) -> Option<&str> {
        self.unit_assignments()
            .iter()
            .find(|assignment| assignment.unit_id == unit_id)
            .map(|assignment| assignment.trainer_id.as_str())
    }

    fn remark_for(&self, class_id: &str, week: &str, kind: RemarkKind) -> Option<&Remark> {
        self.remarks()
            .iter()
            .find(|remark| remark.class_id == class_id && remark.week == week && remark.kind == kind)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    classes: Vec<Class>,
    trainees: Vec<Trainee>,
    trainers: Vec<Trainer>,
    units: Vec<Unit>,
    unit_assignments: Vec<UnitAssignment>,
    users: Vec<User>,
    attendance: Vec<AttendanceRecord>,
    schedules: Vec<ScheduleSubmission>,
    remarks: Vec<Remark>,
    schedule_index: HashMap<(String, String), usize>,
}

impl MemoryStore {
    pub fn new(
        classes: Vec<Class>,
        trainees: Vec<Trainee>,
        trainers: Vec<Trainer>,
        units: Vec<Unit>,
        users: Vec<User>,
    ) -> Self {
        MemoryStore {
            classes,
            trainees,
            trainers,
            units,
            users,
            ..MemoryStore::default()
        }
    }

    pub fn add_attendance(&mut self, records: impl IntoIterator<Item = AttendanceRecord>) -> usize {
        let before = self.attendance.len();
        self.attendance.extend(records);
        self.attendance.len() - before
    }

    /// Appends a submission and points the (class, week) index at it.
    pub fn submit_schedule(&mut self, submission: ScheduleSubmission) -> &ScheduleSubmission {
        let key = (submission.class_id.clone(), submission.week.clone());
        let position = self.schedules.len();
        if let Some(previous) = self.schedule_index.insert(key, position) {
            tracing::debug!(
                "schedule {} submitted {} supersedes {} for {} {}",
                submission.id,
                submission.submitted_at,
                self.schedules[previous].id,
                submission.class_id,
                submission.week
            );
        }
        self.schedules.push(submission);
        &self.schedules[position]
    }

    /// One remark per (class, week, kind); a rewrite keeps the original id.
    pub fn upsert_remark(&mut self, remark: Remark) -> &Remark {
        let existing = self.remarks.iter().position(|current| {
            current.class_id == remark.class_id
                && current.week == remark.week
                && current.kind == remark.kind
        });
        match existing {
            Some(index) => {
                let id = self.remarks[index].id.clone();
                self.remarks[index] = Remark { id, ..remark };
                &self.remarks[index]
            }
            None => {
                self.remarks.push(remark);
                &self.remarks[self.remarks.len() - 1]
            }
        }
    }

    /// Assigns a unit to a trainer; `None` removes the assignment.
    pub fn assign_unit(&mut self, unit_id: &str, trainer_id: Option<&str>) {
        let existing = self
            .unit_assignments
            .iter()
            .position(|assignment| assignment.unit_id == unit_id);
        match (existing, trainer_id) {
            (Some(index), Some(trainer_id)) => {
                self.unit_assignments[index].trainer_id = trainer_id.to_string();
            }
            (Some(index), None) => {
                self.unit_assignments.remove(index);
            }
            (None, Some(trainer_id)) => self.unit_assignments.push(UnitAssignment {
                unit_id: unit_id.to_string(),
                trainer_id: trainer_id.to_string(),
            }),
            (None, None) => {}
        }
    }

    fn log_sizes(&self, source: &str) {
        tracing::info!(
            classes = self.classes().len(),
            trainees = self.trainees().len(),
            trainers = self.trainers().len(),
            units = self.units().len(),
            attendance = self.attendance().len(),
            schedules = self.schedules().len(),
            effective = self.effective_schedules().len(),
            remarks = self.remarks().len(),
            "loaded snapshot from {source}"
        );
    }
}

impl Repository for MemoryStore {
    fn classes(&self) -> &[Class] {
        &self.classes
    }

    fn trainees(&self) -> &[Trainee] {
        &self.trainees
    }

    fn trainers(&self) -> &[Trainer] {
        &self.trainers
    }

    fn units(&self) -> &[Unit] {
        &self.units
    }

    fn unit_assignments(&self) -> &[UnitAssignment] {
        &self.unit_assignments
    }

    fn users(&self) -> &[User] {
        &self.users
    }

    fn attendance(&self) -> &[AttendanceRecord] {
        &self.attendance
    }

    fn schedules(&self) -> &[ScheduleSubmission] {
        &self.schedules
    }

    fn remarks(&self) -> &[Remark] {
        &self.remarks
    }

    fn latest_schedule(&self, class_id: &str, week: &str) -> Option<&ScheduleSubmission> {
        self.schedule_index
            .get(&(class_id.to_string(), week.to_string()))
            .map(|position| &self.schedules[*position])
    }

    fn effective_schedules(&self) -> Vec<&ScheduleSubmission> {
        let mut positions: Vec<usize> = self.schedule_index.values().copied().collect();
        positions.sort_unstable();
        positions
            .into_iter()
            .map(|position| &self.schedules[position])
            .collect()
    }
}

/// Name lookups over the reference tables, built once per report.
pub struct ReferenceMaps<'a> {
    trainees: HashMap<&'a str, &'a Trainee>,
    trainers: HashMap<&'a str, &'a Trainer>,
    classes: HashMap<&'a str, &'a Class>,
    units: HashMap<&'a str, &'a Unit>,
}

impl<'a> ReferenceMaps<'a> {
    pub fn from_repository<R: Repository + ?Sized>(repo: &'a R) -> Self {
        ReferenceMaps {
            trainees: repo.trainees().iter().map(|t| (t.id.as_str(), t)).collect(),
            trainers: repo.trainers().iter().map(|t| (t.id.as_str(), t)).collect(),
            classes: repo.classes().iter().map(|c| (c.id.as_str(), c)).collect(),
            units: repo.units().iter().map(|u| (u.id.as_str(), u)).collect(),
        }
    }

    pub fn trainee(&self, id: &str) -> Option<&'a Trainee> {
        self.trainees.get(id).copied()
    }

    pub fn trainer(&self, id: &str) -> Option<&'a Trainer> {
        self.trainers.get(id).copied()
    }

    pub fn class(&self, id: &str) -> Option<&'a Class> {
        self.classes.get(id).copied()
    }

    pub fn unit(&self, id: &str) -> Option<&'a Unit> {
        self.units.get(id).copied()
    }

    pub fn department_of_class(&self, class_id: &str) -> Option<&'a str> {
        self.class(class_id).map(|class| class.department.as_str())
    }

    pub fn units_in_class(&self, class_id: &str) -> Vec<&'a Unit> {
        let mut units: Vec<&'a Unit> = self
            .units
            .values()
            .copied()
            .filter(|unit| unit.class_id == class_id)
            .collect();
        units.sort_by(|a, b| a.id.cmp(&b.id));
        units
    }

    pub fn all_trainers(&self) -> Vec<&'a Trainer> {
        let mut trainers: Vec<&'a Trainer> = self.trainers.values().copied().collect();
        trainers.sort_by(|a, b| a.id.cmp(&b.id));
        trainers
    }
}

#[derive(serde::Deserialize)]
struct ScheduleCsvRow {
    schedule_id: String,
    class_id: String,
    week: String,
    submitted_by: String,
    submitted_at: DateTime<Utc>,
    day: Day,
    time_slot: String,
    unit_id: String,
    trainer_id: String,
    status: SessionStatus,
}

#[derive(serde::Deserialize)]
struct RemarkCsvRow {
    id: Option<String>,
    class_id: String,
    week: String,
    kind: RemarkKind,
    remark_text: String,
    author_name: String,
    author_signature: Option<String>,
    date: NaiveDate,
}

fn read_table<T: DeserializeOwned>(dir: &Path, file: &str) -> anyhow::Result<Vec<T>> {
    let path = dir.join(file);
    if !path.exists() {
        tracing::debug!("{} not found, treating as empty", path.display());
        return Ok(Vec::new());
    }

    let mut reader = csv::Reader::from_path(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut rows = Vec::new();
    for (line, result) in reader.deserialize::<T>().enumerate() {
        let row = result.with_context(|| format!("invalid row {} in {}", line + 1, path.display()))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Loads a snapshot from a directory of CSV tables. Missing tables are empty.
pub fn load_dir(dir: &Path) -> anyhow::Result<MemoryStore> {
    anyhow::ensure!(dir.is_dir(), "data directory {} does not exist", dir.display());

    let mut store = MemoryStore::new(
        read_table(dir, "classes.csv")?,
        read_table(dir, "trainees.csv")?,
        read_table(dir, "trainers.csv")?,
        read_table(dir, "units.csv")?,
        read_table(dir, "users.csv")?,
    );

    for assignment in read_table::<UnitAssignment>(dir, "unit_assignments.csv")? {
        store.assign_unit(&assignment.unit_id, Some(&assignment.trainer_id));
    }

    store.add_attendance(read_table::<AttendanceRecord>(dir, "attendance.csv")?);

    // Submissions stay in first-seen file order; `positions` maps id to index.
    let mut submissions: Vec<ScheduleSubmission> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for row in read_table::<ScheduleCsvRow>(dir, "schedules.csv")? {
        let index = *positions.entry(row.schedule_id.clone()).or_insert_with(|| {
            submissions.push(ScheduleSubmission {
                id: row.schedule_id.clone(),
                class_id: row.class_id.clone(),
                week: row.week.clone(),
                schedule: BTreeMap::new(),
                submitted_by: row.submitted_by.clone(),
                submitted_at: row.submitted_at,
            });
            submissions.len() - 1
        });
        submissions[index].schedule.entry(row.day).or_default().insert(
            row.time_slot,
            SessionInput {
                unit_id: row.unit_id,
                trainer_id: row.trainer_id,
                status: row.status,
            },
        );
    }
    // Stable, so equal timestamps keep file order and the later row wins.
    submissions.sort_by_key(|submission| submission.submitted_at);
    for submission in submissions {
        store.submit_schedule(submission);
    }

    for row in read_table::<RemarkCsvRow>(dir, "remarks.csv")? {
        let signature = row.author_signature.unwrap_or_else(|| row.author_name.clone());
        store.upsert_remark(Remark {
            id: row.id.unwrap_or_else(|| format!("remark-{}", Uuid::new_v4())),
            class_id: row.class_id,
            week: row.week,
            kind: row.kind,
            remark_text: row.remark_text,
            author_name: row.author_name,
            author_signature: signature,
            date: row.date,
        });
    }

    store.log_sizes(&dir.display().to_string());
    Ok(store)
}

fn class(id: &str, name: &str, department: &str) -> Class {
    Class {
        id: id.to_string(),
        name: name.to_string(),
        department: department.to_string(),
    }
}

fn trainer(id: &str, name: &str, department: &str) -> Trainer {
    Trainer {
        id: id.to_string(),
        name: name.to_string(),
        department: department.to_string(),
    }
}

fn trainee(id: &str, name: &str, admission_number: &str, class_id: &str) -> Trainee {
    Trainee {
        id: id.to_string(),
        name: name.to_string(),
        admission_number: admission_number.to_string(),
        class_id: class_id.to_string(),
    }
}

fn unit(id: &str, name: &str, class_id: &str) -> Unit {
    Unit {
        id: id.to_string(),
        name: name.to_string(),
        class_id: class_id.to_string(),
    }
}

fn user(id: &str, name: &str, username: &str, role: crate::models::Role, department: Option<&str>) -> User {
    User {
        id: id.to_string(),
        name: name.to_string(),
        username: username.to_string(),
        role,
        department: department.map(str::to_string),
    }
}

/// One record per class-1 trainee; `marks` holds `P`/`A` for trainee-1..=5.
fn session_records(
    unit_id: &str,
    trainer_id: &str,
    date: NaiveDate,
    time: &str,
    marks: &str,
) -> Vec<AttendanceRecord> {
    marks
        .chars()
        .enumerate()
        .map(|(index, mark)| AttendanceRecord {
            trainee_id: format!("trainee-{}", index + 1),
            class_id: "class-1".to_string(),
            unit_id: unit_id.to_string(),
            trainer_id: trainer_id.to_string(),
            date,
            time: time.to_string(),
            status: if mark == 'P' {
                crate::models::AttendanceStatus::Present
            } else {
                crate::models::AttendanceStatus::Absent
            },
        })
        .collect()
}

fn slot(unit_id: &str, trainer_id: &str, status: SessionStatus) -> SessionInput {
    SessionInput {
        unit_id: unit_id.to_string(),
        trainer_id: trainer_id.to_string(),
        status,
    }
}

/// Demonstration snapshot: three departments, one class with a full week of
/// trainee records and two weekly trainer logs.
pub fn seed() -> anyhow::Result<MemoryStore> {
    use crate::models::Role;
    use SessionStatus::{Assignment, NotTaught, Taught};

    let mut store = MemoryStore::new(
        vec![
            class("class-1", "CS-L6-24S", "Computer Science"),
            class("class-2", "DS-L5-24S", "Design"),
            class("class-3", "CS-L6-23F", "Computer Science"),
            class("class-4", "EE-L6-24S", "Electrical Engineering"),
        ],
        vec![
            trainee("trainee-1", "Alice Johnson", "CS101", "class-1"),
            trainee("trainee-2", "Bob Williams", "CS102", "class-1"),
            trainee("trainee-3", "Charlie Brown", "CS103", "class-1"),
            trainee("trainee-4", "Diana Miller", "CS104", "class-1"),
            trainee("trainee-5", "Ethan Davis", "CS105", "class-1"),
            trainee("trainee-6", "Fiona Garcia", "DS201", "class-2"),
            trainee("trainee-7", "George Rodriguez", "DS202", "class-2"),
            trainee("trainee-11", "Kevin Thomas", "CS301", "class-3"),
            trainee("trainee-16", "Liam Harris", "EE401", "class-4"),
        ],
        vec![
            trainer("trainer-1", "Dr. Evelyn Reed", "Computer Science"),
            trainer("trainer-2", "Mr. Samuel Chen", "Design"),
            trainer("trainer-3", "Ms. Aisha Khan", "Computer Science"),
            trainer("trainer-4", "Mr. Ben Carter", "Electrical Engineering"),
        ],
        vec![
            unit("unit-1", "Advanced React", "class-1"),
            unit("unit-2", "State Management with Redux", "class-1"),
            unit("unit-3", "Data Structures & Algorithms", "class-3"),
            unit("unit-4", "UI/UX Principles", "class-2"),
            unit("unit-6", "Circuit Analysis", "class-4"),
        ],
        vec![
            user("user-iqa-1", "Admin IQA", "iqa", Role::Iqa, None),
            user("user-hod-1", "Dr. Charles Bing", "hod1", Role::Hod, Some("Computer Science")),
            user("user-hod-2", "Mr. Alan Turing", "hod_ee", Role::Hod, Some("Electrical Engineering")),
            user("trainer-1", "Dr. Evelyn Reed", "trainer1", Role::Trainer, Some("Computer Science")),
            user("trainer-2", "Mr. Samuel Chen", "schen", Role::Trainer, Some("Design")),
            user("trainer-3", "Ms. Aisha Khan", "akhan", Role::Trainer, Some("Computer Science")),
            user("user-rep-1", "Alex Ray", "classrep1", Role::ClassRep, Some("Computer Science")),
            user("user-rep-2", "Brenda Miles", "brep", Role::ClassRep, Some("Design")),
        ],
    );

    for (unit_id, trainer_id) in [
        ("unit-1", "trainer-1"),
        ("unit-2", "trainer-3"),
        ("unit-3", "trainer-1"),
        ("unit-4", "trainer-2"),
        ("unit-6", "trainer-4"),
    ] {
        store.assign_unit(unit_id, Some(trainer_id));
    }

    let day = |y: i32, m: u32, d: u32| {
        NaiveDate::from_ymd_opt(y, m, d).with_context(|| format!("invalid seed date {y}-{m}-{d}"))
    };

    let sessions = [
        ("unit-1", "trainer-1", day(2024, 10, 14)?, "08:00", "PPPAA"),
        ("unit-2", "trainer-3", day(2024, 10, 14)?, "10:00", "PPAPP"),
        ("unit-1", "trainer-1", day(2025, 2, 3)?, "08:00", "PPAPP"),
        ("unit-2", "trainer-3", day(2025, 2, 3)?, "10:00", "PAPPP"),
        ("unit-1", "trainer-1", day(2025, 2, 4)?, "13:00", "PPPPP"),
        ("unit-2", "trainer-3", day(2025, 2, 5)?, "08:00", "PPPAA"),
    ];
    for (unit_id, trainer_id, date, time, marks) in sessions {
        store.add_attendance(session_records(unit_id, trainer_id, date, time, marks));
    }

    let submitted_at = |value: &str| -> anyhow::Result<DateTime<Utc>> {
        Ok(DateTime::parse_from_rfc3339(value)
            .with_context(|| format!("invalid seed timestamp {value}"))?
            .with_timezone(&Utc))
    };

    let schedule_2024 = BTreeMap::from([
        (
            Day::Monday,
            BTreeMap::from([
                ("08:00-10:00".to_string(), slot("unit-1", "trainer-1", Taught)),
                ("10:00-12:00".to_string(), slot("unit-2", "trainer-3", Taught)),
            ]),
        ),
        (
            Day::Tuesday,
            BTreeMap::from([("13:00-15:00".to_string(), slot("unit-1", "trainer-1", Assignment))]),
        ),
        (
            Day::Thursday,
            BTreeMap::from([("08:00-10:00".to_string(), slot("unit-2", "trainer-3", Taught))]),
        ),
    ]);
    store.submit_schedule(ScheduleSubmission {
        id: "schedule-2024-1".to_string(),
        class_id: "class-1".to_string(),
        week: "2024-W42".to_string(),
        schedule: schedule_2024,
        submitted_by: "user-rep-1".to_string(),
        submitted_at: submitted_at("2024-10-21T10:00:00Z")?,
    });

    let schedule_2025 = BTreeMap::from([
        (
            Day::Monday,
            BTreeMap::from([
                ("08:00-10:00".to_string(), slot("unit-1", "trainer-1", Taught)),
                ("10:00-12:00".to_string(), slot("unit-2", "trainer-3", Taught)),
            ]),
        ),
        (
            Day::Tuesday,
            BTreeMap::from([("13:00-15:00".to_string(), slot("unit-1", "trainer-1", Taught))]),
        ),
        (
            Day::Wednesday,
            BTreeMap::from([("08:00-10:00".to_string(), slot("unit-2", "trainer-3", Assignment))]),
        ),
        (
            Day::Thursday,
            BTreeMap::from([("10:00-12:00".to_string(), slot("unit-1", "trainer-1", NotTaught))]),
        ),
    ]);
    store.submit_schedule(ScheduleSubmission {
        id: "schedule-demo-1".to_string(),
        class_id: "class-1".to_string(),
        week: "2025-W06".to_string(),
        schedule: schedule_2025,
        submitted_by: "user-rep-1".to_string(),
        submitted_at: submitted_at("2025-02-10T11:00:00Z")?,
    });

    store.log_sizes("seed data");
    Ok(store)
}

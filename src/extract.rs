use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use anyhow::Context;
use serde_json::Value;

use crate::models::{Day, SessionInput, SessionStatus, WeeklySchedule, TIME_SLOTS};
use crate::store::ReferenceMaps;

/// Free-text session as read off an uploaded trainer log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedSession {
    pub subject: String,
    pub trainer: String,
    pub status: String,
}

pub type ExtractedSchedule = BTreeMap<Day, BTreeMap<String, ExtractedSession>>;

/// Turns an uploaded document into a best-effort schedule grid. Nothing it
/// returns is trusted until it has been reconciled.
pub trait ScheduleExtractor {
    fn extract(&self, document: &[u8]) -> anyhow::Result<ExtractedSchedule>;
}

/// Reads extractor output that was saved as JSON, in the shape of the weekly
/// trainer report: `{"schedule": {"monday": {"08:00-10:00": {...}}}}`.
pub struct JsonExtractor;

fn text_field(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn normalize_slot(label: &str) -> Option<String> {
    let compact: String = label.chars().filter(|c| !c.is_whitespace()).collect();
    TIME_SLOTS
        .iter()
        .find(|slot| **slot == compact)
        .map(|slot| slot.to_string())
}

impl ScheduleExtractor for JsonExtractor {
    fn extract(&self, document: &[u8]) -> anyhow::Result<ExtractedSchedule> {
        let root: Value =
            serde_json::from_slice(document).context("extracted schedule is not valid JSON")?;
        let days = root
            .get("schedule")
            .and_then(Value::as_object)
            .context("extracted schedule has no schedule object")?;

        let mut schedule = ExtractedSchedule::new();
        for (day_name, slots) in days {
            let Ok(day) = day_name.parse::<Day>() else {
                tracing::debug!("ignoring extracted day {day_name:?}");
                continue;
            };
            let Some(slots) = slots.as_object() else {
                continue;
            };
            for (slot_label, session) in slots {
                let Some(slot) = normalize_slot(slot_label) else {
                    tracing::debug!("ignoring extracted timeslot {slot_label:?}");
                    continue;
                };
                if !session.is_object() {
                    continue;
                }
                schedule.entry(day).or_default().insert(
                    slot,
                    ExtractedSession {
                        subject: text_field(session, "subject"),
                        trainer: text_field(session, "trainer"),
                        status: text_field(session, "status"),
                    },
                );
            }
        }
        Ok(schedule)
    }
}

/// Extractor input read from disk.
pub struct ExtractionFile {
    pub path: PathBuf,
}

impl ExtractionFile {
    pub fn run(&self, extractor: &dyn ScheduleExtractor) -> anyhow::Result<ExtractedSchedule> {
        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        extractor
            .extract(&bytes)
            .with_context(|| format!("failed to extract schedule from {}", self.path.display()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub schedule: WeeklySchedule,
    pub units_matched: usize,
    pub trainers_matched: usize,
    pub total_entries: usize,
}

impl Reconciliation {
    pub fn summary(&self) -> String {
        format!(
            "Matched {} units & {} trainers out of {} entries.",
            self.units_matched, self.trainers_matched, self.total_entries
        )
    }
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Maps extracted names back to ids. Units only match within the class;
/// entries where either name fails to resolve are dropped.
pub fn reconcile(extracted: &ExtractedSchedule, class_id: &str, refs: &ReferenceMaps<'_>) -> Reconciliation {
    let units: HashMap<String, &str> = refs
        .units_in_class(class_id)
        .into_iter()
        .map(|unit| (name_key(&unit.name), unit.id.as_str()))
        .collect();
    let trainers: HashMap<String, &str> = refs
        .all_trainers()
        .into_iter()
        .map(|trainer| (name_key(&trainer.name), trainer.id.as_str()))
        .collect();

    let mut result = Reconciliation {
        schedule: WeeklySchedule::new(),
        units_matched: 0,
        trainers_matched: 0,
        total_entries: 0,
    };
    for (day, slots) in extracted {
        for (slot, session) in slots {
            result.total_entries += 1;
            if session.subject.trim().is_empty() || session.trainer.trim().is_empty() {
                continue;
            }
            let unit_id = units.get(&name_key(&session.subject));
            let trainer_id = trainers.get(&name_key(&session.trainer));
            if unit_id.is_some() {
                result.units_matched += 1;
            }
            if trainer_id.is_some() {
                result.trainers_matched += 1;
            }
            let (Some(unit_id), Some(trainer_id)) = (unit_id, trainer_id) else {
                tracing::debug!(
                    "dropping {} {slot}: {:?} / {:?} did not resolve",
                    day.label(),
                    session.subject,
                    session.trainer
                );
                continue;
            };
            result.schedule.entry(*day).or_default().insert(
                slot.clone(),
                SessionInput {
                    unit_id: unit_id.to_string(),
                    trainer_id: trainer_id.to_string(),
                    status: SessionStatus::from_label(&session.status).unwrap_or(SessionStatus::Taught),
                },
            );
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::seed;
    use std::io::Write;

    const DOCUMENT: &str = r#"{
        "className": "CS-L6-24S",
        "schedule": {
            "monday": {
                "08:00 - 10:00": {"subject": " advanced react ", "trainer": "DR. EVELYN REED", "status": "Taught"},
                "10:00-12:00": {"subject": "State Management with Redux", "trainer": "Ms. Aisha Khan", "status": "cancelled"}
            },
            "tuesday": {
                "13:00-15:00": {"subject": "UI/UX Principles", "trainer": "Mr. Samuel Chen", "status": "Taught"},
                "15:00-17:00": {"subject": "Advanced React", "trainer": 42},
                "19:00-21:00": {"subject": "Advanced React", "trainer": "Dr. Evelyn Reed"}
            },
            "saturday": {
                "08:00-10:00": {"subject": "Advanced React", "trainer": "Dr. Evelyn Reed"}
            },
            "wednesday": "not an object"
        }
    }"#;

    #[test]
    fn extracts_known_days_and_slots_only() {
        let schedule = JsonExtractor.extract(DOCUMENT.as_bytes()).unwrap();
        assert_eq!(schedule.len(), 2);
        assert_eq!(schedule[&Day::Monday].len(), 2);
        assert!(schedule[&Day::Monday].contains_key("08:00-10:00"));
        assert_eq!(schedule[&Day::Tuesday].len(), 2);
        assert_eq!(schedule[&Day::Tuesday]["15:00-17:00"].trainer, "42");
        assert_eq!(schedule[&Day::Tuesday]["15:00-17:00"].status, "");
    }

    #[test]
    fn rejects_documents_without_schedule() {
        assert!(JsonExtractor.extract(b"{\"rows\": []}").is_err());
        assert!(JsonExtractor.extract(b"not json").is_err());
    }

    #[test]
    fn reconciles_names_case_insensitively() {
        let store = seed().unwrap();
        let refs = ReferenceMaps::from_repository(&store);
        let extracted = JsonExtractor.extract(DOCUMENT.as_bytes()).unwrap();
        let result = reconcile(&extracted, "class-1", &refs);

        assert_eq!(result.total_entries, 4);
        // UI/UX Principles belongs to another class; trainer "42" is unknown.
        assert_eq!(result.units_matched, 3);
        assert_eq!(result.trainers_matched, 3);
        assert_eq!(result.summary(), "Matched 3 units & 3 trainers out of 4 entries.");

        let monday = &result.schedule[&Day::Monday];
        assert_eq!(monday["08:00-10:00"].unit_id, "unit-1");
        assert_eq!(monday["08:00-10:00"].trainer_id, "trainer-1");
        assert_eq!(monday["10:00-12:00"].status, SessionStatus::Taught);
        assert!(!result.schedule.contains_key(&Day::Tuesday));
    }

    #[test]
    fn reads_extraction_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DOCUMENT.as_bytes()).unwrap();
        let source = ExtractionFile {
            path: file.path().to_path_buf(),
        };
        let schedule = source.run(&JsonExtractor).unwrap();
        assert_eq!(schedule.len(), 2);

        let missing = ExtractionFile {
            path: file.path().with_extension("missing"),
        };
        assert!(missing.run(&JsonExtractor).is_err());
    }
}

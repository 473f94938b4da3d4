use std::fmt::Write;

use crate::models::{
    Day, PercentageReportData, PeriodicTraineeReportData, Remark, SessionTraineeReportData,
    WeeklyTraineeReportData, WeeklyTrainerReportData, TIME_SLOTS,
};

fn hod_remark(output: &mut String, remark: Option<&Remark>) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## HOD Remarks");
    match remark {
        Some(remark) => {
            let _ = writeln!(output, "{}", remark.remark_text);
            let _ = writeln!(output);
            let _ = writeln!(
                output,
                "Signed: {} ({})",
                remark.author_signature, remark.date
            );
        }
        None => {
            let _ = writeln!(output, "No remarks recorded.");
        }
    }
}

pub fn weekly_trainee_markdown(
    data: &WeeklyTraineeReportData,
    class_name: &str,
    week: &str,
    remark: Option<&Remark>,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Weekly Trainee Attendance Report");
    let _ = writeln!(output, "Class {class_name}, week {week}");
    let _ = writeln!(output);
    let _ = writeln!(output, "| Trainee | Mon | Tue | Wed | Thu | Fri | Weekly % |");
    let _ = writeln!(output, "|---|---|---|---|---|---|---|");
    for row in &data.attendance_grid {
        let _ = write!(output, "| {} ", row.name);
        for day in Day::ALL {
            let _ = write!(output, "| {} ", row.attendance.get(day));
        }
        let _ = writeln!(output, "| {:.1}% |", row.weekly_percentage);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(
        output,
        "- Overall attendance: {:.1}%",
        data.summary.overall_percentage
    );
    let list = |names: &[String]| {
        if names.is_empty() {
            "none".to_string()
        } else {
            names.join(", ")
        }
    };
    let _ = writeln!(
        output,
        "- Perfect attendance: {}",
        list(&data.summary.perfect_attendance)
    );
    let _ = writeln!(
        output,
        "- Low attendance (below 80%): {}",
        list(&data.summary.low_attendance)
    );

    if !data.recommendations.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Recommendations");
        let _ = writeln!(output, "{}", data.recommendations);
    }

    hod_remark(&mut output, remark);
    output
}

pub fn weekly_trainer_markdown(
    data: &WeeklyTrainerReportData,
    week: &str,
    remark: Option<&Remark>,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Weekly Trainer Attendance Log");
    let _ = writeln!(
        output,
        "{} department, class {}, week {week}",
        data.department, data.class_name
    );
    let _ = writeln!(output, "Class representative: {}", data.class_rep_name);

    for day in Day::ALL {
        let _ = writeln!(output);
        match data.dates.get(&day) {
            Some(date) => {
                let _ = writeln!(output, "## {} ({date})", day.label());
            }
            None => {
                let _ = writeln!(output, "## {}", day.label());
            }
        }
        let Some(slots) = data.schedule.get(&day).filter(|slots| !slots.is_empty()) else {
            let _ = writeln!(output, "No sessions logged.");
            continue;
        };
        let _ = writeln!(output, "| Time | Unit | Trainer | Status |");
        let _ = writeln!(output, "|---|---|---|---|");
        for slot in TIME_SLOTS {
            if let Some(entry) = slots.get(slot) {
                let _ = writeln!(
                    output,
                    "| {slot} | {} | {} | {} |",
                    entry.subject, entry.trainer, entry.status
                );
            }
        }
    }

    hod_remark(&mut output, remark);
    output
}

pub fn periodic_markdown(data: &PeriodicTraineeReportData) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# {}", data.report_title);
    let _ = writeln!(output, "{}", data.period);
    let _ = writeln!(
        output,
        "Class {}, trainer {}",
        data.class_name, data.trainer_name
    );
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "| Trainee | Admission No. | Present | Absent | Sessions | Attendance |"
    );
    let _ = writeln!(output, "|---|---|---|---|---|---|");
    for row in &data.attendance_grid {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} | {} | {:.1}% |",
            row.trainee_name,
            row.admission_number,
            row.present_count,
            row.absent_count,
            row.total_sessions,
            row.attendance_percentage
        );
    }
    output
}

pub fn session_markdown(data: &SessionTraineeReportData) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Session Attendance Report");
    let _ = writeln!(
        output,
        "{} with {} for class {}, {} at {}",
        data.unit_name, data.trainer_name, data.class_name, data.date, data.time
    );

    for (heading, trainees) in [
        ("Present", &data.present_trainees),
        ("Absent", &data.absent_trainees),
    ] {
        let _ = writeln!(output);
        let _ = writeln!(output, "## {heading} ({})", trainees.len());
        if trainees.is_empty() {
            let _ = writeln!(output, "None.");
        }
        for trainee in trainees {
            let _ = writeln!(output, "- {} ({})", trainee.name, trainee.admission_number);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "Total {}: {} present, {} absent.",
        data.summary.total, data.summary.present, data.summary.absent
    );
    output
}

pub fn percentage_markdown(data: &PercentageReportData) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# {}", data.title);
    let _ = writeln!(output, "Period: {}", data.period);
    let _ = writeln!(output);
    let _ = writeln!(output, "| Name | Present | Sessions | Percentage |");
    let _ = writeln!(output, "|---|---|---|---|");
    for item in &data.items {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {:.1}% |",
            item.name, item.present_count, item.total_sessions, item.percentage
        );
    }
    let _ = writeln!(
        output,
        "| **Overall** | {} | {} | {:.1}% |",
        data.overall.present, data.overall.total, data.overall.percentage
    );
    output
}

pub fn remarks_markdown(remarks: &[(&Remark, &str)]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# HOD Remarks");
    if remarks.is_empty() {
        let _ = writeln!(output, "No remarks recorded.");
        return output;
    }
    for (remark, class_name) in remarks {
        let _ = writeln!(
            output,
            "- {} {class_name} {} ({} report): {} by {}",
            remark.date, remark.week, remark.kind, remark.remark_text, remark.author_name
        );
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::{session_trainee_report, weekly_trainer_report_for};
    use crate::models::{
        DailyAttendance, OverallTotals, PercentageReportItem, RemarkKind, TraineeWeekRow,
        WeeklySummary,
    };
    use crate::scope::Scope;
    use crate::store::{seed, Repository};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn remark() -> Remark {
        Remark {
            id: "remark-1".to_string(),
            class_id: "class-1".to_string(),
            week: "2025-W06".to_string(),
            kind: RemarkKind::Trainee,
            remark_text: "Attendance improved on Tuesday.".to_string(),
            author_name: "Dr. Charles Bing".to_string(),
            author_signature: "Dr. Charles Bing".to_string(),
            date: date(2025, 2, 7),
        }
    }

    #[test]
    fn trainee_report_renders_grid_and_remark() {
        let mut attendance = DailyAttendance::default();
        attendance.mon = "2/2".to_string();
        attendance.tue = "1/2".to_string();
        let data = WeeklyTraineeReportData {
            attendance_grid: vec![TraineeWeekRow {
                name: "Alice Johnson".to_string(),
                attendance,
                weekly_percentage: 75.0,
            }],
            summary: WeeklySummary {
                overall_percentage: 75.0,
                perfect_attendance: Vec::new(),
                low_attendance: vec!["Alice Johnson".to_string()],
            },
            recommendations: "Follow up with Alice Johnson.".to_string(),
        };
        let output = weekly_trainee_markdown(&data, "CS-L6-24S", "2025-W06", Some(&remark()));
        assert!(output.contains("| Alice Johnson | 2/2 | 1/2 | - | - | - | 75.0% |"));
        assert!(output.contains("- Perfect attendance: none"));
        assert!(output.contains("## Recommendations"));
        assert!(output.contains("Signed: Dr. Charles Bing (2025-02-07)"));
    }

    #[test]
    fn trainer_log_lists_slots_in_time_order() {
        let store = seed().unwrap();
        let scope = Scope::for_user(store.user("user-iqa-1").unwrap());
        let data =
            weekly_trainer_report_for(&store, &scope, "class-1", "2025-W06", date(2026, 1, 1))
                .unwrap();
        let output = weekly_trainer_markdown(&data, "2025-W06", None);
        assert!(output.contains("## Monday (2025-02-03)"));
        assert!(output.contains("| 08:00-10:00 | Advanced React | Dr. Evelyn Reed | Taught |"));
        assert!(output.contains("## Friday (2025-02-07)\nNo sessions logged."));
        assert!(output.contains("No remarks recorded."));
        let first = output.find("08:00-10:00").unwrap();
        let second = output.find("10:00-12:00").unwrap();
        assert!(first < second);
    }

    #[test]
    fn session_report_counts() {
        let store = seed().unwrap();
        let scope = Scope::for_user(store.user("trainer-1").unwrap());
        let data =
            session_trainee_report(&store, &scope, "class-1", "unit-1", date(2025, 2, 4), "13:00")
                .unwrap();
        let output = session_markdown(&data);
        assert!(output.contains("## Present (5)"));
        assert!(output.contains("## Absent (0)\nNone."));
        assert!(output.contains("Total 5: 5 present, 0 absent."));
    }

    #[test]
    fn percentage_table_ends_with_overall_row() {
        let data = PercentageReportData {
            title: "Trainee Attendance Percentage Report by Class".to_string(),
            period: "2025-02-03 to 2025-02-07".to_string(),
            items: vec![PercentageReportItem {
                id: "class-1".to_string(),
                name: "CS-L6-24S".to_string(),
                present_count: 5,
                total_sessions: 6,
                percentage: 5.0 / 6.0 * 100.0,
            }],
            overall: OverallTotals {
                present: 5,
                total: 6,
                percentage: 5.0 / 6.0 * 100.0,
            },
        };
        let output = percentage_markdown(&data);
        assert!(output.contains("| CS-L6-24S | 5 | 6 | 83.3% |"));
        assert!(output.trim_end().ends_with("| **Overall** | 5 | 6 | 83.3% |"));
    }

    #[test]
    fn remarks_list_renders_empty_state() {
        assert!(remarks_markdown(&[]).contains("No remarks recorded."));
        let remark = remark();
        let output = remarks_markdown(&[(&remark, "CS-L6-24S")]);
        assert!(output.contains("2025-02-07 CS-L6-24S 2025-W06 (trainee report)"));
    }
}

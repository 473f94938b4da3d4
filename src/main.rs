use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{Datelike, NaiveDate, Utc};
use clap::{ArgGroup, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

mod aggregate;
mod assemble;
mod capture;
mod config;
mod error;
mod extract;
mod models;
mod report;
mod scope;
mod sessions;
mod store;
mod week;

use crate::aggregate::{GroupBy, ReportKind};
use crate::assemble::ReportPeriod;
use crate::capture::SlotEntry;
use crate::config::{Config, LoggingConfig, OutputFormat, Settings};
use crate::error::ReportError;
use crate::extract::{ExtractionFile, JsonExtractor};
use crate::models::RemarkKind;
use crate::scope::Scope;
use crate::store::{MemoryStore, ReferenceMaps, Repository};
use crate::week::DateRange;

#[derive(Parser)]
#[command(name = "college-attendance-reports")]
#[command(about = "Attendance aggregation and reports for vocational college classes", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory of CSV tables; the built-in seed data is used when absent
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Id or username of the user the reports are generated for
    #[arg(long, global = true)]
    user: Option<String>,
    #[arg(long, global = true, value_enum)]
    format: Option<OutputFormat>,
    /// Write the report to a file instead of stdout
    #[arg(long, global = true)]
    out: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve an ISO week (YYYY-Www), or the week containing a date, to its teaching dates
    Week { week: String },
    /// Daily attendance grid and weekly percentages for a class
    WeeklyTrainee {
        #[arg(long)]
        class: String,
        #[arg(long)]
        week: String,
    },
    /// Trainer attendance log from the latest schedule submission
    WeeklyTrainer {
        #[arg(long)]
        class: String,
        #[arg(long)]
        week: String,
    },
    /// Per-trainee totals for one class and trainer over a week, month or term
    #[command(group(
        ArgGroup::new("period")
            .args(["week", "month", "term"])
            .required(true)
            .multiple(false)
    ))]
    Periodic {
        #[arg(long)]
        class: String,
        /// Defaults to the signed-in trainer
        #[arg(long)]
        trainer: Option<String>,
        #[arg(long)]
        week: Option<String>,
        /// YYYY-MM
        #[arg(long)]
        month: Option<String>,
        #[arg(long)]
        term: Option<u32>,
        #[arg(long, requires = "term")]
        year: Option<i32>,
    },
    /// Present and absent trainees for one recorded session
    Session {
        #[arg(long)]
        class: String,
        #[arg(long)]
        unit: String,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        time: String,
    },
    /// Present/total percentages grouped by individual, class, department or overall
    #[command(group(
        ArgGroup::new("range")
            .args(["week", "month", "from"])
            .required(true)
            .multiple(false)
    ))]
    Percentage {
        #[arg(long, value_enum, default_value_t = ReportKind::TraineeAttendance)]
        kind: ReportKind,
        #[arg(long, value_enum, default_value_t = GroupBy::Individual)]
        group_by: GroupBy,
        #[arg(long)]
        week: Option<String>,
        #[arg(long)]
        month: Option<String>,
        #[arg(long, requires = "to")]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Record a session for a class and print its session report
    TakeAttendance {
        #[arg(long)]
        class: String,
        #[arg(long)]
        unit: String,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        time: String,
        /// Comma-separated ids of the trainees present
        #[arg(long, value_delimiter = ',')]
        present: Vec<String>,
    },
    /// File a weekly trainer log and print the resulting report
    #[command(group(
        ArgGroup::new("source")
            .args(["slot", "extracted"])
            .required(true)
            .multiple(true)
    ))]
    SubmitSchedule {
        #[arg(long)]
        class: String,
        #[arg(long)]
        week: String,
        /// day,timeslot,unit_id,trainer_id[,status]
        #[arg(long)]
        slot: Vec<SlotEntry>,
        /// JSON produced by the schedule extractor
        #[arg(long)]
        extracted: Option<PathBuf>,
    },
    /// Add or replace the HOD remark for a class and week
    Remark {
        #[arg(long)]
        class: String,
        #[arg(long)]
        week: String,
        #[arg(long, value_enum)]
        kind: RemarkKind,
        #[arg(long)]
        text: String,
    },
    /// List remarks on the classes the user can see
    Remarks,
}

fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    for directive in &logging.directives {
        let directive = directive
            .parse::<Directive>()
            .with_context(|| format!("invalid log directive {directive}"))?;
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(logging.ansi)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn write_output(out: Option<&Path>, text: &str) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Report written to {}.", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

fn emit<T: Serialize>(
    settings: &Settings,
    out: Option<&Path>,
    data: &T,
    markdown: impl FnOnce(&T) -> String,
) -> anyhow::Result<()> {
    let text = match settings.format {
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(data).context("failed to serialize report")?;
            json.push('\n');
            json
        }
        OutputFormat::Markdown => markdown(data),
    };
    write_output(out, &text)
}

fn class_name(store: &MemoryStore, class_id: &str) -> String {
    store
        .class(class_id)
        .map(|class| class.name.clone())
        .unwrap_or_else(|| class_id.to_string())
}

fn run(
    command: Commands,
    settings: &Settings,
    out: Option<&Path>,
    store: &mut MemoryStore,
    scope: &Scope,
) -> anyhow::Result<()> {
    let today = Utc::now().date_naive();

    match command {
        Commands::Week { week } => {
            let (week, range) = week::week_of(&week, today);
            let dates = week::week_dates(&week, today);
            let data = serde_json::json!({ "week": week, "start": range.start, "end": range.end, "dates": dates });
            emit(settings, out, &data, |_| {
                let mut text = format!("{week}: {range}\n");
                for (day, date) in &dates {
                    text.push_str(&format!("- {}: {date}\n", day.label()));
                }
                text
            })?;
        }
        Commands::WeeklyTrainee { class, week } => {
            let data = assemble::weekly_trainee_report(&*store, scope, &class, &week, today)?;
            let remark = store.remark_for(&class, &week, RemarkKind::Trainee);
            let name = class_name(store, &class);
            emit(settings, out, &data, |data| {
                report::weekly_trainee_markdown(data, &name, &week, remark)
            })?;
        }
        Commands::WeeklyTrainer { class, week } => {
            let data = assemble::weekly_trainer_report_for(&*store, scope, &class, &week, today)?;
            let remark = store.remark_for(&class, &week, RemarkKind::Trainer);
            emit(settings, out, &data, |data| {
                report::weekly_trainer_markdown(data, &week, remark)
            })?;
        }
        Commands::Periodic {
            class,
            trainer,
            week,
            month,
            term,
            year,
        } => {
            let trainer = trainer
                .or_else(|| scope.own_trainer_id().map(str::to_string))
                .context("--trainer is required unless the user is a trainer")?;
            let period = match (week, month, term) {
                (Some(week), _, _) => ReportPeriod::Weekly(week),
                (_, Some(month), _) => ReportPeriod::Monthly(month),
                (_, _, Some(term)) => ReportPeriod::Termly {
                    year: year.unwrap_or_else(|| today.year()),
                    term,
                },
                (None, None, None) => anyhow::bail!("one of --week, --month or --term is required"),
            };
            let data =
                assemble::periodic_trainee_report(&*store, scope, &class, &trainer, &period, today)?;
            emit(settings, out, &data, report::periodic_markdown)?;
        }
        Commands::Session {
            class,
            unit,
            date,
            time,
        } => {
            let data = assemble::session_trainee_report(&*store, scope, &class, &unit, date, &time)?;
            emit(settings, out, &data, report::session_markdown)?;
        }
        Commands::Percentage {
            kind,
            group_by,
            week,
            month,
            from,
            to,
        } => {
            let range = match (week, month, from, to) {
                (Some(week), _, _, _) => week::resolve_week_or(&week, today),
                (_, Some(month), _, _) => week::month_range(&month)?,
                (_, _, Some(from), Some(to)) => DateRange::new(from, to),
                _ => anyhow::bail!("one of --week, --month or --from/--to is required"),
            };
            let data = assemble::percentage_report(&*store, scope, kind, group_by, &range)?;
            emit(settings, out, &data, report::percentage_markdown)?;
        }
        Commands::TakeAttendance {
            class,
            unit,
            date,
            time,
            present,
        } => {
            let written = capture::take_attendance(store, scope, &class, &unit, date, &time, &present)?;
            tracing::info!("recorded {written} attendance marks");
            let data = assemble::session_trainee_report(&*store, scope, &class, &unit, date, &time)?;
            emit(settings, out, &data, report::session_markdown)?;
        }
        Commands::SubmitSchedule {
            class,
            week,
            slot,
            extracted,
        } => {
            let mut schedule = match extracted {
                Some(path) => {
                    let extracted = ExtractionFile { path }.run(&JsonExtractor)?;
                    let refs = ReferenceMaps::from_repository(&*store);
                    let reconciliation = extract::reconcile(&extracted, &class, &refs);
                    eprintln!("{}", reconciliation.summary());
                    reconciliation.schedule
                }
                None => models::WeeklySchedule::new(),
            };
            // Slots given on the command line override extracted ones.
            for (day, slots) in capture::schedule_from_slots(slot) {
                schedule.entry(day).or_default().extend(slots);
            }
            let id = capture::submit_schedule(store, scope, &class, &week, schedule, Utc::now())?
                .id
                .clone();
            tracing::info!("filed schedule {id} for {class} {week}");
            let data = assemble::weekly_trainer_report_for(&*store, scope, &class, &week, today)?;
            emit(settings, out, &data, |data| {
                report::weekly_trainer_markdown(data, &week, None)
            })?;
        }
        Commands::Remark {
            class,
            week,
            kind,
            text,
        } => {
            let remark = capture::write_remark(store, scope, &class, &week, kind, &text, today)?.clone();
            let name = class_name(store, &class);
            emit(settings, out, &remark, |remark| {
                report::remarks_markdown(&[(remark, name.as_str())])
            })?;
        }
        Commands::Remarks => {
            let remarks = capture::visible_remarks(&*store, scope);
            let named: Vec<(&models::Remark, String)> = remarks
                .iter()
                .map(|remark| (*remark, class_name(store, &remark.class_id)))
                .collect();
            emit(settings, out, &remarks, |_| {
                let rows: Vec<(&models::Remark, &str)> = named
                    .iter()
                    .map(|(remark, name)| (*remark, name.as_str()))
                    .collect();
                report::remarks_markdown(&rows)
            })?;
        }
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config.as_deref())?;
    init_tracing(&config.logging)?;

    let settings = Settings::resolve(&config, cli.data_dir, cli.user, cli.format);
    let mut store = match &settings.data_dir {
        Some(dir) => store::load_dir(dir)?,
        None => store::seed()?,
    };
    let user = store
        .users()
        .iter()
        .find(|user| user.id == settings.user || user.username == settings.user)
        .with_context(|| format!("unknown user {}", settings.user))?;
    let scope = Scope::for_user(user);
    tracing::debug!(
        "signed in as {} ({}), scope {}",
        scope.user_name,
        scope.role,
        scope.department_label()
    );

    match run(cli.command, &settings, cli.out.as_deref(), &mut store, &scope) {
        Err(err) if err.downcast_ref::<ReportError>().is_some_and(ReportError::is_no_data) => {
            println!("{err}");
            Ok(())
        }
        other => other,
    }
}

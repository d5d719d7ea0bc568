//! Classpoints - command-line entry point
//!
//! Usage:
//!   classpoints [--data-dir DIR] [--log-level LEVEL] [--json] <command>
//!
//! Example:
//!   classpoints student add S001 张三
//!   classpoints rule add --kind score 做操 1
//!   classpoints score 做操 S001 S002

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use classpoints::{
    parse_id_list, BatchOutcome, Classroom, EventFilter, EventType, RuleKind, ScoreEvent,
};

#[derive(Parser, Debug)]
#[command(name = "classpoints")]
#[command(about = "Classroom points ledger", long_about = None, version)]
struct Args {
    /// Directory holding every data file
    #[arg(long, env = "CLASSPOINTS_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Log level for classpoints (trace, debug, info, warn, error)
    #[arg(long, env = "CLASSPOINTS_LOG", default_value = "warn")]
    log_level: String,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage students
    #[command(subcommand)]
    Student(StudentCommand),

    /// Manage rule catalogs
    #[command(subcommand)]
    Rule(RuleCommand),

    /// Apply a score rule to one or more students
    Score {
        rule: String,
        student_ids: Vec<String>,
        /// Also read newline-separated ids from this file
        #[arg(long)]
        ids_file: Option<PathBuf>,
    },

    /// Redeem a reward for a student
    Redeem { student_id: String, reward: String },

    /// Record a daily task for one or more students
    Task {
        rule: String,
        student_ids: Vec<String>,
        /// Day the task was done (YYYY-MM-DD), today when omitted
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        ids_file: Option<PathBuf>,
    },

    /// Show one student's history across every event kind
    History { student_id: String },

    /// Search the unified score stream
    Query {
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        student: Option<String>,
        #[arg(long = "type")]
        event_type: Option<EventType>,
        /// Substring of the event name, ignoring case
        #[arg(long)]
        rule: Option<String>,
        /// Write the results to a CSV file
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Rank students by points gained in a window (current week by default)
    Rank {
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// Compare cached balances with event history
    Audit {
        /// Overwrite drifted balances with history totals
        #[arg(long)]
        repair: bool,
    },

    /// Read or write settings
    #[command(subcommand)]
    Setting(SettingCommand),
}

#[derive(Subcommand, Debug)]
enum StudentCommand {
    Add {
        student_id: String,
        #[arg(default_value = "")]
        name: String,
    },
    List,
    Rename { student_id: String, name: String },
    /// Remove a student and purge their events
    Remove { student_id: String },
    /// Register students from a CSV file (id, name)
    Import { path: PathBuf },
}

#[derive(Subcommand, Debug)]
enum RuleCommand {
    Add {
        #[arg(long, default_value = "score")]
        kind: RuleKind,
        name: String,
        #[arg(allow_negative_numbers = true)]
        value: i64,
    },
    List {
        #[arg(long, default_value = "score")]
        kind: RuleKind,
    },
    Remove {
        #[arg(long, default_value = "score")]
        kind: RuleKind,
        name: String,
    },
}

#[derive(Subcommand, Debug)]
enum SettingCommand {
    Get {
        key: String,
        #[arg(long, default_value = "")]
        default: String,
    },
    Set { key: String, value: String },
    Remove { key: String },
    List,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("classpoints={}", args.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let classroom = Classroom::open(&args.data_dir)
        .with_context(|| format!("cannot open data directory {}", args.data_dir.display()))?;

    run(&classroom, args.command, args.json)?;
    classroom.close();
    Ok(())
}

fn run(classroom: &Classroom, command: Command, json: bool) -> anyhow::Result<()> {
    match command {
        Command::Student(cmd) => run_student(classroom, cmd, json),
        Command::Rule(cmd) => run_rule(classroom, cmd, json),
        Command::Score {
            rule,
            student_ids,
            ids_file,
        } => {
            let ids = collect_ids(student_ids, ids_file)?;
            let outcome = classroom.apply_score_rule_batch(&ids, &rule)?;
            print_outcome(&outcome, json)
        }
        Command::Redeem { student_id, reward } => {
            let event = classroom.redeem_reward(&student_id, &reward)?;
            let balance = classroom.students().require(&student_id)?.current_score;
            emit(json, &event, || {
                println!(
                    "{} redeemed {} for {} points, balance {}",
                    event.student_id, event.reward_name, event.score_cost, balance
                )
            })
        }
        Command::Task {
            rule,
            student_ids,
            date,
            ids_file,
        } => {
            let ids = collect_ids(student_ids, ids_file)?;
            let date = date.unwrap_or_else(|| classroom.today());
            let outcome = classroom.complete_daily_task_batch(&ids, &rule, date)?;
            print_outcome(&outcome, json)
        }
        Command::History { student_id } => {
            classroom.students().require(&student_id)?;
            let entries = classroom.ledger().entries_for_student(&student_id)?;
            emit(json, &entries, || {
                for entry in &entries {
                    println!(
                        "{}  {:<10}  {:>5}  {}",
                        entry.timestamp(),
                        entry.event_type().as_str(),
                        entry.score_change(),
                        entry.name()
                    );
                }
            })
        }
        Command::Query {
            from,
            to,
            student,
            event_type,
            rule,
            export,
        } => {
            let events = match rule {
                Some(rule) => {
                    let mut events = classroom.queries().search_by_rule(&rule, from, to)?;
                    events.retain(|e| {
                        student.as_deref().map_or(true, |id| e.student_id == id)
                            && event_type.map_or(true, |t| e.event_type == t)
                    });
                    events
                }
                None => classroom.queries().query(&EventFilter {
                    start: from,
                    end: to,
                    student_id: student,
                    event_type,
                })?,
            };

            if let Some(path) = export {
                let written = classroom.queries().export_events(&path, &events)?;
                println!("exported {} events to {}", written, path.display());
                return Ok(());
            }
            emit(json, &events, || print_events(&events))
        }
        Command::Rank { from, to } => {
            let (week_start, today) = classroom.current_week();
            let start = from.unwrap_or(week_start);
            let end = to.unwrap_or(today);
            if start > end {
                bail!("--from {} is after --to {}", start, end);
            }

            let ranking = classroom.queries().rank(start, end)?;
            emit(json, &ranking, || {
                println!("{} .. {}", start, end);
                for (place, entry) in ranking.iter().enumerate() {
                    println!(
                        "{:>3}. {:<10} {:<12} {:>+6}",
                        place + 1,
                        entry.student_id,
                        entry.name,
                        entry.score_delta
                    );
                }
            })
        }
        Command::Audit { repair } => {
            let drifts = if repair {
                classroom.queries().repair_balances()?
            } else {
                classroom.queries().audit_balances()?
            };
            emit(json, &drifts, || {
                if drifts.is_empty() {
                    println!("all balances match history");
                }
                for drift in &drifts {
                    println!(
                        "{}: cached {} history {}{}",
                        drift.student_id,
                        drift.cached,
                        drift.from_history,
                        if repair { " (repaired)" } else { "" }
                    );
                }
            })
        }
        Command::Setting(cmd) => run_setting(classroom, cmd, json),
    }
}

fn run_student(classroom: &Classroom, command: StudentCommand, json: bool) -> anyhow::Result<()> {
    let students = classroom.students();
    match command {
        StudentCommand::Add { student_id, name } => {
            let student = students.register(&student_id, &name)?;
            emit(json, &student, || println!("registered {}", student.student_id))
        }
        StudentCommand::List => {
            let all = students.list_all()?;
            emit(json, &all, || {
                for s in &all {
                    println!("{:<10} {:<12} {:>6}", s.student_id, s.display_name(), s.current_score);
                }
            })
        }
        StudentCommand::Rename { student_id, name } => {
            students.rename(&student_id, &name)?;
            println!("renamed {}", student_id);
            Ok(())
        }
        StudentCommand::Remove { student_id } => {
            let (student, report) = classroom.remove_student(&student_id)?;
            emit(json, &report, || {
                println!(
                    "removed {}; purged {} score, {} reward, {} daily task rows",
                    student.student_id,
                    report.score_rows_removed,
                    report.reward_rows_removed,
                    report.daily_task_rows_removed
                )
            })
        }
        StudentCommand::Import { path } => {
            let report = classroom.import_students(&path)?;
            emit(json, &report, || {
                println!(
                    "imported {}, skipped {}, malformed {}",
                    report.succeeded, report.skipped, report.malformed
                );
                for error in &report.errors {
                    println!("  {}", error);
                }
                if report.errors_truncated > 0 {
                    println!("  ... {} more", report.errors_truncated);
                }
            })
        }
    }
}

fn run_rule(classroom: &Classroom, command: RuleCommand, json: bool) -> anyhow::Result<()> {
    match command {
        RuleCommand::Add { kind, name, value } => {
            let rule = classroom.rules(kind).add(&name, value)?;
            emit(json, &rule, || println!("added {} {} ({})", kind, rule.name, rule.value))
        }
        RuleCommand::List { kind } => {
            let rules = classroom.rules(kind).list_all()?;
            emit(json, &rules, || {
                for rule in &rules {
                    println!("{:<16} {:>5}", rule.name, rule.value);
                }
            })
        }
        RuleCommand::Remove { kind, name } => {
            classroom.rules(kind).delete(&name)?;
            println!("removed {} {}", kind, name);
            Ok(())
        }
    }
}

fn run_setting(classroom: &Classroom, command: SettingCommand, json: bool) -> anyhow::Result<()> {
    let settings = classroom.settings();
    match command {
        SettingCommand::Get { key, default } => {
            let value = settings.get(&key, &default)?;
            emit(json, &value, || println!("{}", value))
        }
        SettingCommand::Set { key, value } => {
            settings.set(&key, &value)?;
            Ok(())
        }
        SettingCommand::Remove { key } => {
            if settings.remove(&key)?.is_none() {
                bail!("setting not found: {}", key);
            }
            Ok(())
        }
        SettingCommand::List => {
            let all = settings.all()?;
            emit(json, &all, || {
                for (key, value) in &all {
                    println!("{} = {}", key, value);
                }
            })
        }
    }
}

/// Positional ids plus any read from `ids_file`
fn collect_ids(mut ids: Vec<String>, ids_file: Option<PathBuf>) -> anyhow::Result<Vec<String>> {
    if let Some(path) = ids_file {
        let text = fs::read_to_string(&path)
            .with_context(|| format!("cannot read id list {}", path.display()))?;
        ids.extend(parse_id_list(&text));
    }
    if ids.is_empty() {
        bail!("no student ids given");
    }
    Ok(ids)
}

fn emit<T: Serialize>(json: bool, value: &T, human: impl FnOnce()) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human();
    }
    Ok(())
}

fn print_outcome(outcome: &BatchOutcome, json: bool) -> anyhow::Result<()> {
    emit(json, outcome, || {
        println!("{} succeeded", outcome.succeeded);
        if !outcome.failed.is_empty() {
            println!("failed: {}", outcome.failed.join(", "));
        }
    })
}

fn print_events(events: &[ScoreEvent]) {
    for e in events {
        println!(
            "{}  {:<10} {:<10} {:>5}  {}",
            e.timestamp, e.student_id, e.event_type.as_str(), e.score_change, e.event_name
        );
    }
}

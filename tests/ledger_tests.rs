//! Integration tests for the classroom ledger
//!
//! Every test opens a fresh data root in a temp directory with a pinned
//! clock so partition dates are deterministic.

use std::fs;
use std::sync::Arc;

use chrono::Duration;
use tempfile::TempDir;

use classpoints::storage::PARTITION_HEADER;
use classpoints::utils::{parse_date, parse_timestamp, ManualClock};
use classpoints::{Classroom, EventFilter, EventType, LedgerEntry, RuleKind, StorageConfig};

fn setup_classroom(now: &str) -> (Classroom, Arc<ManualClock>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::at(now).unwrap());
    let classroom =
        Classroom::open_with(StorageConfig::new(temp_dir.path()), clock.clone()).unwrap();
    (classroom, clock, temp_dir)
}

fn balance(classroom: &Classroom, id: &str) -> i64 {
    classroom.students().require(id).unwrap().current_score
}

#[test]
fn test_example_scenario() {
    let (classroom, _clock, _temp_dir) = setup_classroom("2026-10-19 08:00:00");
    classroom.rules(RuleKind::Score).add("做操", 1).unwrap();
    classroom.rules(RuleKind::Reward).add("铅笔", 1).unwrap();
    classroom.rules(RuleKind::DailyTask).add("背单词", 2).unwrap();

    let student = classroom.students().register("S001", "").unwrap();
    assert_eq!(student.current_score, 0);

    classroom.apply_score_rule("S001", "做操").unwrap();
    assert_eq!(balance(&classroom, "S001"), 1);

    // Redemption costs exactly the reward's cost, not twice that.
    classroom.redeem_reward("S001", "铅笔").unwrap();
    assert_eq!(balance(&classroom, "S001"), 0);

    classroom
        .ledger()
        .append_daily_task("S001", "背单词", 2, "2026-10-18 20:00:00")
        .unwrap();
    assert_eq!(balance(&classroom, "S001"), 2);

    let events = classroom.ledger().events_for_student("S001").unwrap();
    let kinds: Vec<_> = events.iter().map(|e| e.event_type).collect();
    assert_eq!(
        kinds,
        vec![EventType::Score, EventType::Reward, EventType::DailyTask]
    );
    assert_eq!(events[1].event_name, "兑换: 铅笔");
    assert_eq!(events[1].score_change, -1);
    assert_eq!(events[2].event_name, "每日任务: 背单词");
    assert_eq!(events[2].score_change, 2);

    assert!(classroom.queries().audit_balances().unwrap().is_empty());
}

#[test]
fn test_balance_equals_sum_of_changes() {
    let (classroom, clock, _temp_dir) = setup_classroom("2026-09-01 07:00:00");
    classroom.students().register("S001", "张三").unwrap();

    // Deterministic pseudo-random deltas in -10..=10
    let mut seed: u64 = 0x5eed;
    let mut expected = 0;
    for i in 0..60 {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let change = (seed >> 33) as i64 % 21 - 10;
        expected += change;

        classroom
            .ledger()
            .append_score("S001", "调整", change, EventType::Score)
            .unwrap();
        if i % 7 == 0 {
            clock.advance(Duration::days(1));
        }
    }

    assert_eq!(balance(&classroom, "S001"), expected);
    assert_eq!(
        classroom.queries().balance_from_history("S001").unwrap(),
        expected
    );
    assert!(classroom.ledger().partitions().unwrap().len() > 1);
}

#[test]
fn test_duplicate_registration() {
    let (classroom, _clock, _temp_dir) = setup_classroom("2026-10-19 08:00:00");

    classroom.students().register("S001", "张三").unwrap();
    assert!(classroom
        .students()
        .register("S001", "李四")
        .unwrap_err()
        .is_duplicate());

    let matching = classroom
        .students()
        .list_all()
        .unwrap()
        .into_iter()
        .filter(|s| s.student_id == "S001")
        .count();
    assert_eq!(matching, 1);
}

#[test]
fn test_remove_student_purges_every_partition() {
    let (classroom, clock, temp_dir) = setup_classroom("2026-10-19 08:00:00");
    classroom.students().register("S001", "").unwrap();
    classroom.students().register("S002", "").unwrap();

    for _ in 0..3 {
        classroom
            .ledger()
            .append_score("S001", "做操", 1, EventType::Score)
            .unwrap();
        classroom
            .ledger()
            .append_score("S002", "做操", 1, EventType::Score)
            .unwrap();
        clock.advance(Duration::days(1));
    }
    classroom.ledger().append_reward("S001", "铅笔", 1).unwrap();

    classroom.remove_student("S001").unwrap();

    assert!(classroom.students().get("S001").unwrap().is_none());
    assert!(classroom.ledger().events_for_student("S001").unwrap().is_empty());
    assert!(classroom.ledger().reward_events().unwrap().is_empty());

    let header = PARTITION_HEADER.join(",");
    let partitions_dir = temp_dir.path().join("score_events");
    for entry in fs::read_dir(&partitions_dir).unwrap() {
        let content = fs::read_to_string(entry.unwrap().path()).unwrap();
        assert!(content.starts_with(&header));
        assert!(!content.contains("S001"));
    }
    assert_eq!(classroom.ledger().events_for_student("S002").unwrap().len(), 3);
}

#[test]
fn test_rank_over_window() {
    let (classroom, clock, _temp_dir) = setup_classroom("2026-10-19 08:00:00");
    for id in ["S001", "S002", "S003"] {
        classroom.students().register(id, "").unwrap();
    }

    classroom
        .ledger()
        .append_score("S003", "做操", 5, EventType::Score)
        .unwrap();
    clock.advance(Duration::days(1));
    classroom
        .ledger()
        .append_score("S002", "做操", 2, EventType::Score)
        .unwrap();
    classroom
        .ledger()
        .append_score("S001", "迟到", -1, EventType::Score)
        .unwrap();

    let day = parse_date("2026-10-20").unwrap();
    let ranking = classroom.queries().rank(day, day).unwrap();
    let rows: Vec<_> = ranking
        .iter()
        .map(|r| (r.student_id.as_str(), r.score_delta))
        .collect();
    assert_eq!(rows, vec![("S002", 2), ("S003", 0), ("S001", -1)]);

    let week = classroom.rank_this_week().unwrap();
    assert_eq!(week[0].student_id, "S003");
    assert_eq!(week[0].score_delta, 5);
}

#[test]
fn test_query_is_newest_first() {
    let (classroom, clock, _temp_dir) = setup_classroom("2026-10-21 09:00:00");
    classroom.students().register("S001", "").unwrap();

    // Append out of chronological order across partitions
    classroom
        .ledger()
        .append_score("S001", "a", 1, EventType::Score)
        .unwrap();
    clock.set(parse_timestamp("2026-10-19 10:00:00").unwrap());
    classroom
        .ledger()
        .append_score("S001", "b", 1, EventType::Score)
        .unwrap();
    clock.set(parse_timestamp("2026-10-19 09:30:00").unwrap());
    classroom
        .ledger()
        .append_score("S001", "c", 1, EventType::Score)
        .unwrap();

    let events = classroom.queries().query(&EventFilter::default()).unwrap();
    let names: Vec<_> = events.iter().map(|e| e.event_name.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);

    let mut stamps: Vec<_> = events.iter().map(|e| e.timestamp.clone()).collect();
    let original = stamps.clone();
    stamps.sort_by(|a, b| b.cmp(a));
    assert_eq!(stamps, original);
}

#[test]
fn test_appended_event_reads_back() {
    let (classroom, _clock, _temp_dir) = setup_classroom("2026-10-19 08:15:42");
    classroom.students().register("S001", "").unwrap();

    let written = classroom
        .ledger()
        .append_score("S001", "课堂发言, 积极", 3, EventType::Score)
        .unwrap();

    let read = classroom.ledger().events_for_student("S001").unwrap();
    assert_eq!(read, vec![written]);
    assert_eq!(read[0].timestamp, "2026-10-19 08:15:42");
}

#[test]
fn test_import_scenario() {
    let (classroom, _clock, temp_dir) = setup_classroom("2026-10-19 08:00:00");
    classroom.students().register("S009", "").unwrap();

    let csv_path = temp_dir.path().join("roster.csv");
    fs::write(
        &csv_path,
        "student_id,name\nS001,张三\nS002,李四\nS001,重复\n,无学号\n",
    )
    .unwrap();

    let before = classroom.students().list_all().unwrap().len();
    let report = classroom.import_students(&csv_path).unwrap();

    // Four data rows, one duplicate and one without an id
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.errors.len(), 2);
    assert!(report.errors[0].contains("S001"));
    assert_eq!(
        classroom.students().list_all().unwrap().len(),
        before + report.succeeded
    );
}

#[test]
fn test_daily_task_back_dated_stays_in_today_partition() {
    let (classroom, _clock, _temp_dir) = setup_classroom("2026-10-19 08:00:00");
    classroom.students().register("S001", "").unwrap();
    classroom.rules(RuleKind::DailyTask).add("阅读", 2).unwrap();

    let past = parse_date("2026-10-10").unwrap();
    classroom.complete_daily_task("S001", "阅读", past).unwrap();

    let on_past = classroom
        .queries()
        .query(&EventFilter::between(Some(past), Some(past)))
        .unwrap();
    assert!(on_past.is_empty());

    let today = parse_date("2026-10-19").unwrap();
    let on_today = classroom
        .queries()
        .query(&EventFilter::between(Some(today), Some(today)).event_type(EventType::DailyTask))
        .unwrap();
    assert_eq!(on_today.len(), 1);

    let flat = classroom.ledger().daily_task_events_for_student("S001").unwrap();
    assert_eq!(flat[0].timestamp, "2026-10-10 08:00:00");
}

#[test]
fn test_legacy_partition_is_readable() {
    let (classroom, _clock, temp_dir) = setup_classroom("2026-10-19 08:00:00");
    classroom.students().register("S001", "").unwrap();

    fs::write(
        temp_dir
            .path()
            .join("score_events")
            .join("score_events_2025-03-03.csv"),
        "student_id,event_name,score_change,timestamp\nS001,旧记录,4,2025-03-03 10:00:00\n",
    )
    .unwrap();

    let events = classroom
        .queries()
        .query(&EventFilter::default().student("S001"))
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::Score);

    // Legacy rows count toward history but were never applied to the cache
    let drifts = classroom.queries().audit_balances().unwrap();
    assert_eq!(drifts[0].from_history, 4);
    classroom.queries().repair_balances().unwrap();
    assert_eq!(balance(&classroom, "S001"), 4);
}

#[test]
fn test_state_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::at("2026-10-19 08:00:00").unwrap());

    {
        let classroom =
            Classroom::open_with(StorageConfig::new(temp_dir.path()), clock.clone()).unwrap();
        classroom.students().register("S001", "张三").unwrap();
        classroom.rules(RuleKind::Score).add("做操", 1).unwrap();
        classroom.apply_score_rule("S001", "做操").unwrap();
        classroom.settings().set("class_name", "三年二班").unwrap();
        classroom.close();
    }

    // A rewrite interrupted before its rename leaves a temp file behind
    fs::write(temp_dir.path().join("students.tmp"), "partial").unwrap();

    let classroom = Classroom::open_with(StorageConfig::new(temp_dir.path()), clock).unwrap();
    assert!(!temp_dir.path().join("students.tmp").exists());
    assert_eq!(balance(&classroom, "S001"), 1);
    assert_eq!(classroom.rules(RuleKind::Score).names().unwrap(), vec!["做操"]);
    assert_eq!(
        classroom.settings().get("class_name", "").unwrap(),
        "三年二班"
    );

    let entries = classroom.ledger().entries_for_student("S001").unwrap();
    assert!(matches!(&entries[0], LedgerEntry::Score(e) if e.event_name == "做操"));
}

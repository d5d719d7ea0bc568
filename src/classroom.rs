//! Classroom - one handle over every component
//!
//! Bundles the registry, the three rule catalogs, the ledger, the query
//! engine and settings over a single `StorageContext`, and adds the
//! rule-driven operations a front end calls.

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::error::LedgerResult;
use crate::import::{self, ImportReport};
use crate::ledger::{BatchOutcome, Ledger, PurgeReport};
use crate::query::{QueryEngine, RankEntry};
use crate::registry::StudentRegistry;
use crate::rules::RuleCatalog;
use crate::settings::SettingsStore;
use crate::storage::{StorageConfig, StorageContext};
use crate::types::{DailyTaskEvent, EventType, RewardEvent, RuleKind, ScoreEvent, Student};
use crate::utils::time::{current_week, format_timestamp, on_date, Clock, SystemClock};

/// Facade over one data root
#[derive(Debug, Clone)]
pub struct Classroom {
    ctx: StorageContext,
    ledger: Ledger,
    queries: QueryEngine,
    settings: SettingsStore,
}

impl Classroom {
    /// Open the data root at `root` with the system clock
    pub fn open<P: AsRef<Path>>(root: P) -> LedgerResult<Self> {
        Self::open_with(StorageConfig::new(root), Arc::new(SystemClock))
    }

    /// Open the data root named by `CLASSPOINTS_DATA_DIR` (or `data`)
    pub fn from_env() -> LedgerResult<Self> {
        Self::open_with(StorageConfig::from_env(), Arc::new(SystemClock))
    }

    pub fn open_with(config: StorageConfig, clock: Arc<dyn Clock>) -> LedgerResult<Self> {
        let ctx = StorageContext::open_with(config, clock)?;
        let ledger = Ledger::new(ctx.clone());
        Ok(Self {
            queries: QueryEngine::new(ledger.clone()),
            settings: SettingsStore::new(ctx.clone()),
            ledger,
            ctx,
        })
    }

    pub fn close(self) {
        self.ctx.close();
    }

    pub fn config(&self) -> &StorageConfig {
        self.ctx.config()
    }

    pub fn students(&self) -> &StudentRegistry {
        self.ledger.registry()
    }

    pub fn rules(&self, kind: RuleKind) -> RuleCatalog {
        RuleCatalog::new(self.ctx.clone(), kind)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn queries(&self) -> &QueryEngine {
        &self.queries
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// Score a student with a rule from the score catalog
    pub fn apply_score_rule(&self, student_id: &str, rule_name: &str) -> LedgerResult<ScoreEvent> {
        let rule = self.rules(RuleKind::Score).require(rule_name)?;
        self.ledger
            .append_score(student_id, &rule.name, rule.value, EventType::Score)
    }

    /// Score many students with one rule; an unknown rule fails the whole call
    pub fn apply_score_rule_batch<I, S>(&self, student_ids: I, rule_name: &str) -> LedgerResult<BatchOutcome>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rule = self.rules(RuleKind::Score).require(rule_name)?;
        Ok(self.ledger.append_score_batch(student_ids, &rule.name, rule.value))
    }

    /// Redeem a reward from the reward catalog
    pub fn redeem_reward(&self, student_id: &str, reward_name: &str) -> LedgerResult<RewardEvent> {
        let rule = self.rules(RuleKind::Reward).require(reward_name)?;
        self.ledger.append_reward(student_id, &rule.name, rule.value)
    }

    /// Record a daily task for `date`, stamped with the current time of day
    pub fn complete_daily_task(
        &self,
        student_id: &str,
        task_name: &str,
        date: NaiveDate,
    ) -> LedgerResult<DailyTaskEvent> {
        let rule = self.rules(RuleKind::DailyTask).require(task_name)?;
        let timestamp = format_timestamp(on_date(date, self.ctx.now()));
        self.ledger
            .append_daily_task(student_id, &rule.name, rule.value, &timestamp)
    }

    pub fn complete_daily_task_batch<I, S>(
        &self,
        student_ids: I,
        task_name: &str,
        date: NaiveDate,
    ) -> LedgerResult<BatchOutcome>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rule = self.rules(RuleKind::DailyTask).require(task_name)?;
        let timestamp = format_timestamp(on_date(date, self.ctx.now()));
        Ok(self
            .ledger
            .append_daily_task_batch(student_ids, &rule.name, rule.value, &timestamp))
    }

    /// Remove a student and purge their rows from every event store
    pub fn remove_student(&self, student_id: &str) -> LedgerResult<(Student, PurgeReport)> {
        self.ledger.remove_student(student_id)
    }

    pub fn import_students(&self, path: &Path) -> LedgerResult<ImportReport> {
        import::import_students(self.students(), path, self.config().max_import_errors)
    }

    pub fn today(&self) -> NaiveDate {
        self.ctx.clock().today()
    }

    /// Monday of the current week through today
    pub fn current_week(&self) -> (NaiveDate, NaiveDate) {
        current_week(self.today())
    }

    /// Ranking over the current week
    pub fn rank_this_week(&self) -> LedgerResult<Vec<RankEntry>> {
        let (start, end) = self.current_week();
        self.queries.rank(start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::time::{parse_date, ManualClock};
    use tempfile::TempDir;

    fn create_test_classroom() -> (Classroom, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        // A Thursday
        let clock = Arc::new(ManualClock::at("2026-10-22 15:30:00").unwrap());
        let classroom = Classroom::open_with(StorageConfig::new(temp_dir.path()), clock).unwrap();
        (classroom, temp_dir)
    }

    #[test]
    fn test_rule_driven_operations() {
        let (classroom, _temp_dir) = create_test_classroom();
        classroom.students().register("S001", "").unwrap();
        classroom.rules(RuleKind::Score).add("做操", 1).unwrap();
        classroom.rules(RuleKind::Reward).add("铅笔", 1).unwrap();
        classroom.rules(RuleKind::DailyTask).add("背单词", 2).unwrap();

        let event = classroom.apply_score_rule("S001", "做操").unwrap();
        assert_eq!((event.event_name.as_str(), event.score_change), ("做操", 1));

        classroom.redeem_reward("S001", "铅笔").unwrap();
        let task = classroom
            .complete_daily_task("S001", "背单词", parse_date("2026-10-20").unwrap())
            .unwrap();
        assert_eq!(task.timestamp, "2026-10-20 15:30:00");

        assert_eq!(classroom.students().require("S001").unwrap().current_score, 2);
    }

    #[test]
    fn test_overflowing_rule_leaves_one_row() {
        let (classroom, _temp_dir) = create_test_classroom();
        classroom.students().register("S001", "").unwrap();
        classroom.rules(RuleKind::Score).add("big", i64::MAX).unwrap();

        classroom.apply_score_rule("S001", "big").unwrap();
        assert!(classroom.apply_score_rule("S001", "big").is_err());

        let partitions = classroom.ledger().partitions().unwrap();
        assert_eq!(partitions.len(), 1);
        let content = std::fs::read_to_string(partitions[0].path()).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert_eq!(classroom.students().require("S001").unwrap().current_score, i64::MAX);
        assert!(classroom.queries().audit_balances().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_rule_is_not_found() {
        let (classroom, _temp_dir) = create_test_classroom();
        classroom.students().register("S001", "").unwrap();

        assert!(classroom.apply_score_rule("S001", "做操").unwrap_err().is_not_found());
        assert!(classroom.redeem_reward("S001", "铅笔").unwrap_err().is_not_found());
        assert!(classroom
            .apply_score_rule_batch(["S001"], "做操")
            .unwrap_err()
            .is_not_found());
        assert!(classroom.ledger().partitions().unwrap().is_empty());
    }

    #[test]
    fn test_batches_through_rules() {
        let (classroom, _temp_dir) = create_test_classroom();
        classroom.students().register("S001", "").unwrap();
        classroom.students().register("S002", "").unwrap();
        classroom.rules(RuleKind::Score).add("迟到", -2).unwrap();
        classroom.rules(RuleKind::DailyTask).add("阅读", 3).unwrap();

        let outcome = classroom
            .apply_score_rule_batch(["S001", "S002", "S404"], "迟到")
            .unwrap();
        assert_eq!(outcome.succeeded, 2);
        assert_eq!(outcome.failed, vec!["S404"]);

        let outcome = classroom
            .complete_daily_task_batch(["S002"], "阅读", parse_date("2026-10-22").unwrap())
            .unwrap();
        assert!(outcome.is_complete());
        assert_eq!(classroom.students().require("S002").unwrap().current_score, 1);
    }

    #[test]
    fn test_rank_this_week() {
        let (classroom, _temp_dir) = create_test_classroom();
        assert_eq!(
            classroom.current_week(),
            (parse_date("2026-10-19").unwrap(), parse_date("2026-10-22").unwrap())
        );

        classroom.students().register("S001", "").unwrap();
        classroom.students().register("S002", "").unwrap();
        classroom
            .ledger()
            .append_score("S002", "做操", 1, EventType::Score)
            .unwrap();

        let ranking = classroom.rank_this_week().unwrap();
        assert_eq!(ranking[0].student_id, "S002");
        assert_eq!(ranking[1].score_delta, 0);
    }
}

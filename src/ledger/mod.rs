//! Event Ledger
//!
//! Append-only, day-partitioned store of scored events.
//!
//! # Write Path
//!
//! ```text
//! append_score ──────────────► today's partition ──► registry balance += change
//!
//! append_reward ─► reward_events.csv ─► append_score("兑换: …", -cost, reward)
//!
//! append_daily_task ─► daily_task_events.csv ─► append_score("每日任务: …", +value, daily_task)
//! ```
//!
//! Every balance change flows through `append_score`, so a student's
//! cached balance moves exactly once per recorded event.

mod batch;
mod flat;
mod partition;

pub use batch::{parse_id_list, BatchOutcome};
pub use partition::{list_partitions, Partition};

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{logged, LedgerError, LedgerResult};
use crate::registry::StudentRegistry;
use crate::storage::table::append_row;
use crate::storage::{StorageContext, DAILY_TASK_EVENTS_HEADER, REWARD_EVENTS_HEADER};
use crate::types::{
    DailyTaskEvent, EventType, LedgerEntry, RewardEvent, ScoreEvent, Student,
};
use crate::utils::time::{format_timestamp, parse_timestamp};

/// Balance after applying `score_change`, or `MalformedInput` on overflow
fn checked_balance(student: &Student, score_change: i64) -> LedgerResult<i64> {
    student.current_score.checked_add(score_change).ok_or_else(|| {
        LedgerError::MalformedInput(format!(
            "score change {} overflows the balance of {}",
            score_change, student.student_id
        ))
    })
}

/// Rows removed from each store when a student is purged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub partitions_rewritten: usize,
    pub score_rows_removed: usize,
    pub reward_rows_removed: usize,
    pub daily_task_rows_removed: usize,
}

/// The ledger appends events and keeps registry balances in step
#[derive(Debug, Clone)]
pub struct Ledger {
    ctx: StorageContext,
    registry: StudentRegistry,
}

impl Ledger {
    pub fn new(ctx: StorageContext) -> Self {
        let registry = StudentRegistry::new(ctx.clone());
        Self { ctx, registry }
    }

    pub fn registry(&self) -> &StudentRegistry {
        &self.registry
    }

    /// Append a score event to today's partition and move the balance
    ///
    /// The new balance is computed from the balance read before the
    /// write, then persisted.
    pub fn append_score(
        &self,
        student_id: &str,
        event_name: &str,
        score_change: i64,
        event_type: EventType,
    ) -> LedgerResult<ScoreEvent> {
        logged(
            "append_score",
            self.append_score_inner(student_id, event_name, score_change, event_type),
        )
    }

    fn append_score_inner(
        &self,
        student_id: &str,
        event_name: &str,
        score_change: i64,
        event_type: EventType,
    ) -> LedgerResult<ScoreEvent> {
        let student = self.registry.require(student_id)?;
        let new_score = checked_balance(&student, score_change)?;
        let now = self.ctx.now();

        let event = ScoreEvent::new(
            student_id,
            event_name,
            score_change,
            format_timestamp(now),
            event_type,
        );
        Partition::for_date(self.ctx.config(), now.date()).append(&event)?;

        self.registry.set_score(student_id, new_score)?;

        tracing::debug!(
            student_id,
            event_name,
            score_change,
            %event_type,
            new_score,
            "score event appended"
        );
        Ok(event)
    }

    /// Record a reward redemption and its mirrored score event
    ///
    /// The balance drops by `score_cost` once, through the mirrored event.
    pub fn append_reward(
        &self,
        student_id: &str,
        reward_name: &str,
        score_cost: i64,
    ) -> LedgerResult<RewardEvent> {
        logged(
            "append_reward",
            self.append_reward_inner(student_id, reward_name, score_cost),
        )
    }

    fn append_reward_inner(
        &self,
        student_id: &str,
        reward_name: &str,
        score_cost: i64,
    ) -> LedgerResult<RewardEvent> {
        if score_cost <= 0 {
            return Err(LedgerError::MalformedInput(format!(
                "reward cost must be positive, got {}",
                score_cost
            )));
        }
        let student = self.registry.require(student_id)?;
        checked_balance(&student, -score_cost)?;

        let event = RewardEvent {
            student_id: student_id.to_string(),
            reward_name: reward_name.to_string(),
            score_cost,
            timestamp: format_timestamp(self.ctx.now()),
        };
        append_row(
            &self.ctx.config().reward_events_path(),
            REWARD_EVENTS_HEADER,
            &event.to_row(),
        )?;

        self.append_score_inner(
            student_id,
            &event.mirrored_name(),
            -score_cost,
            EventType::Reward,
        )?;
        Ok(event)
    }

    /// Record a daily-task completion at a caller-chosen timestamp
    ///
    /// The flat row keeps `timestamp`, which may be back-dated. The
    /// mirrored score event is filed in today's partition with the
    /// append time, like any other score event.
    pub fn append_daily_task(
        &self,
        student_id: &str,
        task_name: &str,
        score_change: i64,
        timestamp: &str,
    ) -> LedgerResult<DailyTaskEvent> {
        logged(
            "append_daily_task",
            self.append_daily_task_inner(student_id, task_name, score_change, timestamp),
        )
    }

    fn append_daily_task_inner(
        &self,
        student_id: &str,
        task_name: &str,
        score_change: i64,
        timestamp: &str,
    ) -> LedgerResult<DailyTaskEvent> {
        if score_change <= 0 {
            return Err(LedgerError::MalformedInput(format!(
                "daily task value must be positive, got {}",
                score_change
            )));
        }
        let timestamp = format_timestamp(parse_timestamp(timestamp)?);
        let student = self.registry.require(student_id)?;
        checked_balance(&student, score_change)?;

        let event = DailyTaskEvent {
            student_id: student_id.to_string(),
            task_name: task_name.to_string(),
            score_change,
            timestamp,
        };
        append_row(
            &self.ctx.config().daily_task_events_path(),
            DAILY_TASK_EVENTS_HEADER,
            &event.to_row(),
        )?;

        self.append_score_inner(
            student_id,
            &event.mirrored_name(),
            score_change,
            EventType::DailyTask,
        )?;
        Ok(event)
    }

    /// Apply the same score event to many students
    pub fn append_score_batch<I, S>(&self, student_ids: I, event_name: &str, score_change: i64) -> BatchOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        batch::run(student_ids, |id| {
            self.append_score(id, event_name, score_change, EventType::Score)
                .map(|_| ())
        })
    }

    /// Record the same daily task for many students
    pub fn append_daily_task_batch<I, S>(
        &self,
        student_ids: I,
        task_name: &str,
        score_change: i64,
        timestamp: &str,
    ) -> BatchOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        batch::run(student_ids, |id| {
            self.append_daily_task(id, task_name, score_change, timestamp)
                .map(|_| ())
        })
    }

    /// All partitions, oldest first
    pub fn partitions(&self) -> LedgerResult<Vec<Partition>> {
        logged("list_partitions", list_partitions(self.ctx.config()))
    }

    /// Unified-stream events from partitions dated within the window,
    /// in partition order then file order
    pub fn scan(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> LedgerResult<Vec<ScoreEvent>> {
        logged("scan_partitions", self.scan_inner(start, end))
    }

    fn scan_inner(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> LedgerResult<Vec<ScoreEvent>> {
        let partitions: Vec<Partition> = list_partitions(self.ctx.config())?
            .into_iter()
            .filter(|p| p.within(start, end))
            .collect();
        partition::read_all(self.ctx.config(), &partitions)
    }

    /// Every score event of one student, in partition order then file order
    pub fn events_for_student(&self, student_id: &str) -> LedgerResult<Vec<ScoreEvent>> {
        let mut events = self.scan(None, None)?;
        events.retain(|e| e.student_id == student_id);
        Ok(events)
    }

    pub fn reward_events(&self) -> LedgerResult<Vec<RewardEvent>> {
        logged(
            "reward_events",
            flat::read_events(&self.ctx.config().reward_events_path(), RewardEvent::from_row),
        )
    }

    pub fn reward_events_for_student(&self, student_id: &str) -> LedgerResult<Vec<RewardEvent>> {
        let mut events = self.reward_events()?;
        events.retain(|e| e.student_id == student_id);
        Ok(events)
    }

    pub fn daily_task_events(&self) -> LedgerResult<Vec<DailyTaskEvent>> {
        logged(
            "daily_task_events",
            flat::read_events(
                &self.ctx.config().daily_task_events_path(),
                DailyTaskEvent::from_row,
            ),
        )
    }

    pub fn daily_task_events_for_student(&self, student_id: &str) -> LedgerResult<Vec<DailyTaskEvent>> {
        let mut events = self.daily_task_events()?;
        events.retain(|e| e.student_id == student_id);
        Ok(events)
    }

    /// One student's history across all three stores, newest first
    ///
    /// Plain score events come from the unified stream; rewards and
    /// daily tasks come from their flat files, so mirrored rows are not
    /// listed twice.
    pub fn entries_for_student(&self, student_id: &str) -> LedgerResult<Vec<LedgerEntry>> {
        let mut entries: Vec<LedgerEntry> = self
            .events_for_student(student_id)?
            .into_iter()
            .filter(|e| e.event_type == EventType::Score)
            .map(LedgerEntry::Score)
            .collect();
        entries.extend(
            self.reward_events_for_student(student_id)?
                .into_iter()
                .map(LedgerEntry::Reward),
        );
        entries.extend(
            self.daily_task_events_for_student(student_id)?
                .into_iter()
                .map(LedgerEntry::DailyTask),
        );

        entries.sort_by(|a, b| b.timestamp().cmp(a.timestamp()));
        Ok(entries)
    }

    /// Remove a student's rows from every partition and both flat files
    pub fn purge_student(&self, student_id: &str) -> LedgerResult<PurgeReport> {
        logged("purge_student", self.purge_student_inner(student_id))
    }

    fn purge_student_inner(&self, student_id: &str) -> LedgerResult<PurgeReport> {
        let config = self.ctx.config();
        let mut report = PurgeReport::default();

        for partition in list_partitions(config)? {
            let removed = partition.purge_student(student_id)?;
            if removed > 0 {
                report.partitions_rewritten += 1;
                report.score_rows_removed += removed;
            }
        }
        report.reward_rows_removed = flat::purge_student(&config.reward_events_path(), student_id)?;
        report.daily_task_rows_removed =
            flat::purge_student(&config.daily_task_events_path(), student_id)?;

        tracing::info!(
            student_id,
            partitions = report.partitions_rewritten,
            score_rows = report.score_rows_removed,
            reward_rows = report.reward_rows_removed,
            daily_task_rows = report.daily_task_rows_removed,
            "student purged from ledger"
        );
        Ok(report)
    }

    /// Delete a student from the registry and purge their ledger rows
    pub fn remove_student(&self, student_id: &str) -> LedgerResult<(Student, PurgeReport)> {
        let removed = logged("remove_student", self.registry.remove(student_id))?;
        tracing::info!(student_id, "student removed");
        let report = self.purge_student(student_id)?;
        Ok((removed, report))
    }
}

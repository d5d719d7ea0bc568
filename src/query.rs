//! Aggregation and query operations over the unified score stream
//!
//! Everything here is a linear scan of the day partitions that fall in
//! the requested window, cross-referenced with the registry for names.
//! Windows compare partition dates, not event timestamps.

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{logged, LedgerResult};
use crate::ledger::Ledger;
use crate::storage::table::write_table;
use crate::types::{EventType, ScoreEvent};

/// Columns of an exported history file
pub const EXPORT_HEADER: &[&str] = &[
    "student_id",
    "name",
    "event_name",
    "score_change",
    "timestamp",
    "event_type",
];

/// One line of a ranking
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankEntry {
    pub student_id: String,
    pub name: String,
    pub score_delta: i64,
}

/// Optional filters for `QueryEngine::query`; every `None` matches all
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub student_id: Option<String>,
    pub event_type: Option<EventType>,
}

impl EventFilter {
    pub fn between(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self {
            start,
            end,
            ..Self::default()
        }
    }

    pub fn student(mut self, student_id: impl Into<String>) -> Self {
        self.student_id = Some(student_id.into());
        self
    }

    pub fn event_type(mut self, event_type: EventType) -> Self {
        self.event_type = Some(event_type);
        self
    }

    fn matches(&self, event: &ScoreEvent) -> bool {
        self.student_id
            .as_deref()
            .map_or(true, |id| event.student_id == id)
            && self.event_type.map_or(true, |t| event.event_type == t)
    }
}

/// A cached balance that disagrees with the unified stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceDrift {
    pub student_id: String,
    pub cached: i64,
    pub from_history: i64,
}

impl BalanceDrift {
    pub fn difference(&self) -> i64 {
        self.cached.saturating_sub(self.from_history)
    }
}

/// Read-side operations: ranking, filtered history, balance audit
#[derive(Debug, Clone)]
pub struct QueryEngine {
    ledger: Ledger,
}

impl QueryEngine {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }

    /// Rank every registered student by points gained in `[start, end]`
    ///
    /// Students without events in the window appear with a zero delta.
    /// Ties keep registry order.
    pub fn rank(&self, start: NaiveDate, end: NaiveDate) -> LedgerResult<Vec<RankEntry>> {
        let students = self.ledger.registry().list_all()?;
        let mut ranking: Vec<RankEntry> = students
            .into_iter()
            .map(|s| RankEntry {
                student_id: s.student_id,
                name: s.name,
                score_delta: 0,
            })
            .collect();

        let index: HashMap<String, usize> = ranking
            .iter()
            .enumerate()
            .map(|(i, r)| (r.student_id.clone(), i))
            .collect();

        for event in self.ledger.scan(Some(start), Some(end))? {
            // Rows for ids no longer registered are ignored
            if let Some(&i) = index.get(&event.student_id) {
                let delta = &mut ranking[i].score_delta;
                *delta = delta.saturating_add(event.score_change);
            }
        }

        ranking.sort_by(|a, b| b.score_delta.cmp(&a.score_delta));
        Ok(ranking)
    }

    /// Filtered history, newest first by timestamp text
    pub fn query(&self, filter: &EventFilter) -> LedgerResult<Vec<ScoreEvent>> {
        let mut events = self.ledger.scan(filter.start, filter.end)?;
        events.retain(|e| filter.matches(e));
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        tracing::debug!(matched = events.len(), "history query");
        Ok(events)
    }

    /// Events whose name contains `rule_name`, ignoring case
    ///
    /// Mirrored events match on the bare rule name, so "背单词" finds
    /// "每日任务: 背单词".
    pub fn search_by_rule(
        &self,
        rule_name: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> LedgerResult<Vec<ScoreEvent>> {
        let needle = rule_name.to_lowercase();
        let mut events = self.query(&EventFilter::between(start, end))?;
        events.retain(|e| e.event_name.to_lowercase().contains(&needle));
        Ok(events)
    }

    /// Sum of every score change recorded for `student_id`
    pub fn balance_from_history(&self, student_id: &str) -> LedgerResult<i64> {
        Ok(self
            .ledger
            .events_for_student(student_id)?
            .iter()
            .fold(0i64, |total, e| total.saturating_add(e.score_change)))
    }

    fn history_totals(&self) -> LedgerResult<HashMap<String, i64>> {
        let mut totals = HashMap::new();
        for event in self.ledger.scan(None, None)? {
            let total = totals.entry(event.student_id).or_insert(0i64);
            *total = total.saturating_add(event.score_change);
        }
        Ok(totals)
    }

    /// Students whose cached balance differs from their event history
    pub fn audit_balances(&self) -> LedgerResult<Vec<BalanceDrift>> {
        let totals = self.history_totals()?;
        let drifts = self
            .ledger
            .registry()
            .list_all()?
            .into_iter()
            .filter_map(|s| {
                let from_history = totals.get(&s.student_id).copied().unwrap_or(0);
                (s.current_score != from_history).then(|| BalanceDrift {
                    student_id: s.student_id,
                    cached: s.current_score,
                    from_history,
                })
            })
            .collect();
        Ok(drifts)
    }

    /// Overwrite drifted balances with their history totals
    ///
    /// Returns the drifts that were corrected.
    pub fn repair_balances(&self) -> LedgerResult<Vec<BalanceDrift>> {
        let drifts = self.audit_balances()?;
        for drift in &drifts {
            logged(
                "repair_balance",
                self.ledger
                    .registry()
                    .set_score(&drift.student_id, drift.from_history),
            )?;
            tracing::info!(
                student_id = %drift.student_id,
                cached = drift.cached,
                from_history = drift.from_history,
                "balance repaired"
            );
        }
        Ok(drifts)
    }

    /// Write `events` to a CSV file with student names; returns rows written
    pub fn export_events(&self, path: &Path, events: &[ScoreEvent]) -> LedgerResult<usize> {
        let names: HashMap<String, String> = self
            .ledger
            .registry()
            .list_all()?
            .into_iter()
            .map(|s| (s.student_id, s.name))
            .collect();

        let rows = events.iter().map(|e| {
            vec![
                e.student_id.clone(),
                names.get(&e.student_id).cloned().unwrap_or_default(),
                e.event_name.clone(),
                e.score_change.to_string(),
                e.timestamp.clone(),
                e.event_type.to_string(),
            ]
        });
        logged("export_events", write_table(path, EXPORT_HEADER, rows))?;

        tracing::info!(path = %path.display(), rows = events.len(), "history exported");
        Ok(events.len())
    }
}

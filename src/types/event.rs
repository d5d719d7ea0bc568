//! Ledger event types
//!
//! Three kinds of scored events are recorded. Score events live in the
//! day-partitioned unified stream; reward and daily-task events are also
//! kept in their own flat files and mirrored into the unified stream.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// Name prefix of the score event mirrored from a reward redemption
pub const REWARD_EVENT_PREFIX: &str = "兑换: ";

/// Name prefix of the score event mirrored from a daily-task completion
pub const DAILY_TASK_EVENT_PREFIX: &str = "每日任务: ";

/// Kind tag carried by every row of the unified score stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Points applied directly, usually from a score rule
    #[default]
    Score,
    /// Mirror of a reward redemption
    Reward,
    /// Mirror of a daily-task completion
    DailyTask,
}

impl EventType {
    pub const ALL: [EventType; 3] = [EventType::Score, EventType::Reward, EventType::DailyTask];

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Score => "score",
            EventType::Reward => "reward",
            EventType::DailyTask => "daily_task",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "score" => Ok(EventType::Score),
            "reward" => Ok(EventType::Reward),
            "daily_task" | "daily-task" => Ok(EventType::DailyTask),
            other => Err(LedgerError::MalformedInput(format!(
                "unknown event type '{}'",
                other
            ))),
        }
    }
}

pub(crate) fn parse_int(field: &str, value: &str) -> LedgerResult<i64> {
    value.trim().parse::<i64>().map_err(|_| {
        LedgerError::MalformedInput(format!("{} '{}' is not an integer", field, value))
    })
}

/// One row of the unified score stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEvent {
    #[serde(rename = "studentId")]
    pub student_id: String,
    #[serde(rename = "eventName")]
    pub event_name: String,
    #[serde(rename = "scoreChange")]
    pub score_change: i64,
    pub timestamp: String,
    #[serde(rename = "eventType", default)]
    pub event_type: EventType,
}

impl ScoreEvent {
    pub fn new(
        student_id: impl Into<String>,
        event_name: impl Into<String>,
        score_change: i64,
        timestamp: impl Into<String>,
        event_type: EventType,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            event_name: event_name.into(),
            score_change,
            timestamp: timestamp.into(),
            event_type,
        }
    }

    pub(crate) fn to_row(&self) -> Vec<String> {
        vec![
            self.student_id.clone(),
            self.event_name.clone(),
            self.score_change.to_string(),
            self.timestamp.clone(),
            self.event_type.to_string(),
        ]
    }
}

/// One row of the flat reward-redemption file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardEvent {
    #[serde(rename = "studentId")]
    pub student_id: String,
    #[serde(rename = "rewardName")]
    pub reward_name: String,
    /// Positive magnitude; the balance moves by `-score_cost`
    #[serde(rename = "scoreCost")]
    pub score_cost: i64,
    pub timestamp: String,
}

impl RewardEvent {
    /// Name of the mirrored score event
    pub fn mirrored_name(&self) -> String {
        format!("{}{}", REWARD_EVENT_PREFIX, self.reward_name)
    }

    pub(crate) fn to_row(&self) -> Vec<String> {
        vec![
            self.student_id.clone(),
            self.reward_name.clone(),
            self.score_cost.to_string(),
            self.timestamp.clone(),
        ]
    }

    pub(crate) fn from_row(row: &[String]) -> LedgerResult<Self> {
        if row.len() < 4 {
            return Err(LedgerError::MalformedInput(format!(
                "reward row has {} columns, expected 4",
                row.len()
            )));
        }
        Ok(Self {
            student_id: row[0].clone(),
            reward_name: row[1].clone(),
            score_cost: parse_int("score_cost", &row[2])?,
            timestamp: row[3].clone(),
        })
    }
}

/// One row of the flat daily-task file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTaskEvent {
    #[serde(rename = "studentId")]
    pub student_id: String,
    #[serde(rename = "taskName")]
    pub task_name: String,
    #[serde(rename = "scoreChange")]
    pub score_change: i64,
    /// Caller-supplied; may name an earlier day than the append
    pub timestamp: String,
}

impl DailyTaskEvent {
    /// Name of the mirrored score event
    pub fn mirrored_name(&self) -> String {
        format!("{}{}", DAILY_TASK_EVENT_PREFIX, self.task_name)
    }

    pub(crate) fn to_row(&self) -> Vec<String> {
        vec![
            self.student_id.clone(),
            self.task_name.clone(),
            self.score_change.to_string(),
            self.timestamp.clone(),
        ]
    }

    pub(crate) fn from_row(row: &[String]) -> LedgerResult<Self> {
        if row.len() < 4 {
            return Err(LedgerError::MalformedInput(format!(
                "daily task row has {} columns, expected 4",
                row.len()
            )));
        }
        Ok(Self {
            student_id: row[0].clone(),
            task_name: row[1].clone(),
            score_change: parse_int("score_change", &row[2])?,
            timestamp: row[3].clone(),
        })
    }
}

/// Any ledger event, tagged by kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerEntry {
    Score(ScoreEvent),
    Reward(RewardEvent),
    DailyTask(DailyTaskEvent),
}

impl LedgerEntry {
    pub fn timestamp(&self) -> &str {
        match self {
            LedgerEntry::Score(e) => &e.timestamp,
            LedgerEntry::Reward(e) => &e.timestamp,
            LedgerEntry::DailyTask(e) => &e.timestamp,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            LedgerEntry::Score(e) => &e.event_name,
            LedgerEntry::Reward(e) => &e.reward_name,
            LedgerEntry::DailyTask(e) => &e.task_name,
        }
    }

    /// Signed effect on the balance
    pub fn score_change(&self) -> i64 {
        match self {
            LedgerEntry::Score(e) => e.score_change,
            LedgerEntry::Reward(e) => -e.score_cost,
            LedgerEntry::DailyTask(e) => e.score_change,
        }
    }

    pub fn event_type(&self) -> EventType {
        match self {
            LedgerEntry::Score(e) => e.event_type,
            LedgerEntry::Reward(_) => EventType::Reward,
            LedgerEntry::DailyTask(_) => EventType::DailyTask,
        }
    }
}

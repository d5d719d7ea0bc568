//! Rule templates used to pre-fill event creation

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Which of the three catalogs a rule belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Signed point value applied as a score event
    Score,
    /// Positive cost subtracted on redemption
    Reward,
    /// Positive value added on task completion
    DailyTask,
}

impl RuleKind {
    pub const ALL: [RuleKind; 3] = [RuleKind::Score, RuleKind::Reward, RuleKind::DailyTask];

    pub fn file_name(self) -> &'static str {
        match self {
            RuleKind::Score => "score_rules.csv",
            RuleKind::Reward => "reward_rules.csv",
            RuleKind::DailyTask => "daily_task_rules.csv",
        }
    }

    pub fn header(self) -> &'static [&'static str] {
        match self {
            RuleKind::Score => &["rule_name", "score_value"],
            RuleKind::Reward => &["rule_name", "score_cost"],
            RuleKind::DailyTask => &["task_name", "score_value"],
        }
    }

    /// Human label used in error messages
    pub fn label(self) -> &'static str {
        match self {
            RuleKind::Score => "score rule",
            RuleKind::Reward => "reward rule",
            RuleKind::DailyTask => "daily task rule",
        }
    }

    /// Reward costs and task values are stored as positive magnitudes
    pub fn requires_positive(self) -> bool {
        !matches!(self, RuleKind::Score)
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::Score => write!(f, "score"),
            RuleKind::Reward => write!(f, "reward"),
            RuleKind::DailyTask => write!(f, "daily_task"),
        }
    }
}

impl FromStr for RuleKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "score" => Ok(RuleKind::Score),
            "reward" => Ok(RuleKind::Reward),
            "daily_task" | "daily-task" => Ok(RuleKind::DailyTask),
            other => Err(LedgerError::MalformedInput(format!(
                "unknown rule kind '{}'",
                other
            ))),
        }
    }
}

/// A named point value in one catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub value: i64,
}

impl Rule {
    pub fn new(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub(crate) fn to_row(&self) -> Vec<String> {
        vec![self.name.clone(), self.value.to_string()]
    }
}

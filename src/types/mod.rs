//! Data types for the classroom ledger
//!
//! This module contains all the core data structures used throughout the crate.

mod event;
mod rule;
mod student;

pub use event::{
    DailyTaskEvent, EventType, LedgerEntry, RewardEvent, ScoreEvent, DAILY_TASK_EVENT_PREFIX,
    REWARD_EVENT_PREFIX,
};
pub(crate) use event::parse_int;
pub use rule::{Rule, RuleKind};
pub use student::Student;

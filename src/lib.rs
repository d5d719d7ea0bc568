//! Classpoints - classroom points ledger
//!
//! Records point-earning events, reward redemptions and daily-task
//! completions per student, keeps a cached balance per student, and
//! answers ranking and history queries over the recorded events.
//!
//! # Features
//!
//! - **Day-Partitioned Ledger**: one CSV file per calendar day of score events
//! - **Mirrored Events**: rewards and daily tasks also land in the unified stream
//! - **Cascading Purge**: removing a student clears every event store
//! - **Balance Audit**: rebuild cached balances from history
//! - **CSV Import**: bulk student registration with per-row reporting
//!
//! # Modules
//!
//! - `types`: Students, rules, events and the `LedgerEntry` union
//! - `storage`: Data root layout, CSV tables, atomic rewrites
//! - `registry`: Student registry
//! - `rules`: Score, reward and daily-task rule catalogs
//! - `ledger`: Append, read and purge of events
//! - `query`: Ranking, filtered history, audit and export
//! - `import`: Student import from CSV
//! - `settings`: Key/value settings
//! - `classroom`: Facade over all of the above
//!
//! # Example
//!
//! ```no_run
//! use classpoints::{Classroom, RuleKind};
//!
//! fn main() -> classpoints::LedgerResult<()> {
//!     let classroom = Classroom::open("data")?;
//!     classroom.students().register("S001", "张三")?;
//!     classroom.rules(RuleKind::Score).add("做操", 1)?;
//!     classroom.apply_score_rule("S001", "做操")?;
//!     Ok(())
//! }
//! ```

pub mod classroom;
pub mod error;
pub mod import;
pub mod ledger;
pub mod query;
pub mod registry;
pub mod rules;
pub mod settings;
pub mod storage;
pub mod types;
pub mod utils;

// Re-export commonly used items at crate root
pub use classroom::Classroom;
pub use error::{LedgerError, LedgerResult};
pub use import::ImportReport;
pub use ledger::{parse_id_list, BatchOutcome, Ledger, PurgeReport};
pub use query::{BalanceDrift, EventFilter, QueryEngine, RankEntry};
pub use registry::StudentRegistry;
pub use rules::RuleCatalog;
pub use settings::SettingsStore;
pub use storage::{StorageConfig, StorageContext};
pub use types::{
    DailyTaskEvent, EventType, LedgerEntry, RewardEvent, Rule, RuleKind, ScoreEvent, Student,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

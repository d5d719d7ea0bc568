//! Flat-file storage layer
//!
//! - `StorageConfig` / `StorageContext`: where every file lives and the clock appends use
//! - `table`: headered CSV read, append and rewrite
//! - `atomic`: temp-file-and-rename whole-file replacement
//!
//! ```text
//! data/
//! ├── students.csv
//! ├── score_rules.csv  reward_rules.csv  daily_task_rules.csv
//! ├── reward_events.csv  daily_task_events.csv
//! ├── settings.json
//! └── score_events/
//!     ├── score_events_2026-10-18.csv
//!     └── score_events_2026-10-19.csv
//! ```

pub mod atomic;
mod context;
pub mod table;

pub use context::{
    StorageConfig, StorageContext, DAILY_TASK_EVENTS_HEADER, DATA_DIR_ENV, PARTITIONS_DIR,
    PARTITION_HEADER, PARTITION_PREFIX, PARTITION_SUFFIX, REWARD_EVENTS_HEADER, STUDENTS_HEADER,
};

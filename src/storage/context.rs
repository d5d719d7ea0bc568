//! Storage configuration and the context shared by every component

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};

use super::atomic::{atomic_write, cleanup_temp_files};
use super::table::ensure_table;
use crate::error::{storage_err, LedgerResult};
use crate::types::RuleKind;
use crate::utils::time::{format_date, Clock, SystemClock};

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "CLASSPOINTS_DATA_DIR";

pub const STUDENTS_FILE: &str = "students.csv";
pub const SETTINGS_FILE: &str = "settings.json";
pub const REWARD_EVENTS_FILE: &str = "reward_events.csv";
pub const DAILY_TASK_EVENTS_FILE: &str = "daily_task_events.csv";
pub const PARTITIONS_DIR: &str = "score_events";
pub const PARTITION_PREFIX: &str = "score_events_";
pub const PARTITION_SUFFIX: &str = ".csv";

pub const STUDENTS_HEADER: &[&str] = &["student_id", "name", "current_score"];
pub const PARTITION_HEADER: &[&str] = &[
    "student_id",
    "event_name",
    "score_change",
    "timestamp",
    "event_type",
];
pub const REWARD_EVENTS_HEADER: &[&str] = &["student_id", "reward_name", "score_cost", "timestamp"];
pub const DAILY_TASK_EVENTS_HEADER: &[&str] =
    &["student_id", "task_name", "score_change", "timestamp"];

/// Configuration for the on-disk ledger
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root of every data file
    pub data_dir: PathBuf,
    /// Partition count above which partition files are read in parallel
    pub parallel_scan_threshold: usize,
    /// Upper bound on error strings collected by a CSV import
    pub max_import_errors: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            parallel_scan_threshold: 32,
            max_import_errors: 100,
        }
    }
}

impl StorageConfig {
    /// Create config with custom data directory
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Config rooted at `$CLASSPOINTS_DATA_DIR`, or `./data` when unset.
    /// Relative paths resolve against the working directory.
    pub fn from_env() -> Self {
        let current_dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        let data_dir = match env::var(DATA_DIR_ENV) {
            Ok(path) if Path::new(&path).is_absolute() => PathBuf::from(path),
            Ok(path) => current_dir.join(path),
            Err(_) => current_dir.join("data"),
        };

        Self::new(data_dir)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn students_path(&self) -> PathBuf {
        self.data_dir.join(STUDENTS_FILE)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE)
    }

    pub fn reward_events_path(&self) -> PathBuf {
        self.data_dir.join(REWARD_EVENTS_FILE)
    }

    pub fn daily_task_events_path(&self) -> PathBuf {
        self.data_dir.join(DAILY_TASK_EVENTS_FILE)
    }

    pub fn rules_path(&self, kind: RuleKind) -> PathBuf {
        self.data_dir.join(kind.file_name())
    }

    pub fn partitions_dir(&self) -> PathBuf {
        self.data_dir.join(PARTITIONS_DIR)
    }

    pub fn partition_path(&self, date: NaiveDate) -> PathBuf {
        self.partitions_dir().join(format!(
            "{}{}{}",
            PARTITION_PREFIX,
            format_date(date),
            PARTITION_SUFFIX
        ))
    }
}

/// Handle to an opened data root
///
/// Cloning is cheap; every component keeps its own clone.
#[derive(Clone)]
pub struct StorageContext {
    config: StorageConfig,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for StorageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StorageContext {
    /// Open (and initialize if needed) the data root at `root`
    pub fn open<P: AsRef<Path>>(root: P) -> LedgerResult<Self> {
        Self::open_with(StorageConfig::new(root), Arc::new(SystemClock))
    }

    /// Open with explicit config and clock
    pub fn open_with(config: StorageConfig, clock: Arc<dyn Clock>) -> LedgerResult<Self> {
        let ctx = Self { config, clock };
        ctx.initialize()?;
        Ok(ctx)
    }

    /// Every write is flushed when it happens, so there is nothing to do here.
    pub fn close(self) {}

    fn initialize(&self) -> LedgerResult<()> {
        let data_dir = self.config.data_dir();
        let partitions_dir = self.config.partitions_dir();

        fs::create_dir_all(&partitions_dir).map_err(storage_err(&partitions_dir))?;

        let mut cleaned = cleanup_temp_files(data_dir).map_err(storage_err(data_dir))?;
        cleaned += cleanup_temp_files(&partitions_dir).map_err(storage_err(&partitions_dir))?;
        if cleaned > 0 {
            tracing::warn!(cleaned, "removed temp files left by interrupted rewrites");
        }

        ensure_table(&self.config.students_path(), STUDENTS_HEADER)?;
        ensure_table(&self.config.reward_events_path(), REWARD_EVENTS_HEADER)?;
        ensure_table(&self.config.daily_task_events_path(), DAILY_TASK_EVENTS_HEADER)?;
        for kind in RuleKind::ALL {
            ensure_table(&self.config.rules_path(kind), kind.header())?;
        }

        let settings_path = self.config.settings_path();
        if !settings_path.exists() {
            atomic_write(&settings_path, "{}\n").map_err(storage_err(&settings_path))?;
        }

        tracing::debug!(data_dir = %data_dir.display(), "storage opened");
        Ok(())
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::time::ManualClock;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_layout() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = StorageContext::open(temp_dir.path()).unwrap();
        let config = ctx.config();

        assert!(config.partitions_dir().is_dir());
        assert!(config.students_path().exists());
        assert!(config.reward_events_path().exists());
        assert!(config.daily_task_events_path().exists());
        assert!(config.settings_path().exists());
        for kind in RuleKind::ALL {
            assert!(config.rules_path(kind).exists());
        }

        let students = fs::read_to_string(config.students_path()).unwrap();
        assert_eq!(students, "student_id,name,current_score\n");
    }

    #[test]
    fn test_open_removes_stale_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join(PARTITIONS_DIR)).unwrap();
        fs::write(temp_dir.path().join("students.tmp"), "partial").unwrap();
        fs::write(
            temp_dir.path().join(PARTITIONS_DIR).join("score_events_2026-10-19.tmp"),
            "partial",
        )
        .unwrap();

        StorageContext::open(temp_dir.path()).unwrap();

        assert!(!temp_dir.path().join("students.tmp").exists());
        assert!(!temp_dir
            .path()
            .join(PARTITIONS_DIR)
            .join("score_events_2026-10-19.tmp")
            .exists());
    }

    #[test]
    fn test_partition_path_is_named_by_date() {
        let config = StorageConfig::new("/srv/class");
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(
            config.partition_path(date),
            PathBuf::from("/srv/class/score_events/score_events_2026-10-19.csv")
        );
    }

    #[test]
    fn test_context_uses_injected_clock() {
        let temp_dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::at("2026-09-01 08:00:00").unwrap());
        let ctx = StorageContext::open_with(StorageConfig::new(temp_dir.path()), clock).unwrap();
        assert_eq!(format_date(ctx.now().date()), "2026-09-01");
    }
}

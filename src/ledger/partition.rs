//! Day partitions of the unified score stream
//!
//! Each calendar day with at least one score-affecting event has its own
//! file `score_events/score_events_YYYY-MM-DD.csv`. Older files may lack
//! the `event_type` column; those are read positionally and every row is
//! treated as a plain score event.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rayon::prelude::*;

use crate::error::{storage_err, LedgerResult};
use crate::storage::table::{append_row, read_table, rewrite_table, Table};
use crate::storage::{StorageConfig, PARTITION_HEADER, PARTITION_PREFIX, PARTITION_SUFFIX};
use crate::types::{parse_int, EventType, ScoreEvent};
use crate::utils::time::DATE_FORMAT;

/// Column positions of a partition file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// Header names every expected column
    Named {
        student_id: usize,
        event_name: usize,
        score_change: usize,
        timestamp: usize,
        event_type: usize,
    },
    /// Pre-`event_type` files: `student_id,event_name,score_change,timestamp`
    Legacy,
}

impl Layout {
    fn detect(table: &Table) -> Layout {
        let find = |name: &str| table.column(name);
        match (
            find("student_id"),
            find("event_name"),
            find("score_change"),
            find("timestamp"),
            find("event_type"),
        ) {
            (Some(student_id), Some(event_name), Some(score_change), Some(timestamp), Some(event_type)) => {
                Layout::Named {
                    student_id,
                    event_name,
                    score_change,
                    timestamp,
                    event_type,
                }
            }
            _ => Layout::Legacy,
        }
    }

    fn student_column(self) -> usize {
        match self {
            Layout::Named { student_id, .. } => student_id,
            Layout::Legacy => 0,
        }
    }

    fn parse(self, row: &[String]) -> LedgerResult<Option<ScoreEvent>> {
        match self {
            Layout::Named {
                student_id,
                event_name,
                score_change,
                timestamp,
                event_type,
            } => {
                let width = student_id
                    .max(event_name)
                    .max(score_change)
                    .max(timestamp)
                    .max(event_type);
                if row.len() <= width {
                    return Ok(None);
                }
                Ok(Some(ScoreEvent {
                    student_id: row[student_id].clone(),
                    event_name: row[event_name].clone(),
                    score_change: parse_int("score_change", &row[score_change])?,
                    timestamp: row[timestamp].clone(),
                    event_type: row[event_type].parse()?,
                }))
            }
            Layout::Legacy => {
                if row.len() < 4 {
                    return Ok(None);
                }
                Ok(Some(ScoreEvent {
                    student_id: row[0].clone(),
                    event_name: row[1].clone(),
                    score_change: parse_int("score_change", &row[2])?,
                    timestamp: row[3].clone(),
                    event_type: EventType::Score,
                }))
            }
        }
    }
}

/// One day's file of score events
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    date: NaiveDate,
    path: PathBuf,
}

impl Partition {
    pub(crate) fn for_date(config: &StorageConfig, date: NaiveDate) -> Self {
        Self {
            date,
            path: config.partition_path(date),
        }
    }

    /// Date encoded in a partition file name, if it is one
    fn date_from_file_name(file_name: &str) -> Option<NaiveDate> {
        let date = file_name
            .strip_prefix(PARTITION_PREFIX)?
            .strip_suffix(PARTITION_SUFFIX)?;
        NaiveDate::parse_from_str(date, DATE_FORMAT).ok()
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when the partition falls inside the inclusive window
    pub fn within(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
        start.map_or(true, |s| self.date >= s) && end.map_or(true, |e| self.date <= e)
    }

    /// Every readable event in file order
    pub fn read_events(&self) -> LedgerResult<Vec<ScoreEvent>> {
        let Some(table) = read_table(&self.path)? else {
            return Ok(Vec::new());
        };
        if table.header.is_empty() {
            return Ok(Vec::new());
        }

        let layout = Layout::detect(&table);
        if layout == Layout::Legacy {
            tracing::warn!(
                partition = %self.path.display(),
                "partition header lacks expected columns, reading legacy layout"
            );
        }

        let mut events = Vec::with_capacity(table.rows.len());
        for (index, row) in table.rows.iter().enumerate() {
            match layout.parse(row) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(e) => tracing::warn!(
                    partition = %self.path.display(),
                    line = index + 2,
                    error = %e,
                    "skipping score event row"
                ),
            }
        }
        Ok(events)
    }

    /// Append one event, writing the header first if the file is new
    pub fn append(&self, event: &ScoreEvent) -> LedgerResult<()> {
        append_row(&self.path, PARTITION_HEADER, &event.to_row())
    }

    /// Rewrite the file without rows belonging to `student_id`
    ///
    /// Returns the number of rows removed; the file is only rewritten
    /// when that number is non-zero.
    pub fn purge_student(&self, student_id: &str) -> LedgerResult<usize> {
        let Some(table) = read_table(&self.path)? else {
            return Ok(0);
        };
        if table.header.is_empty() {
            return Ok(0);
        }

        let column = Layout::detect(&table).student_column();
        let before = table.rows.len();
        let kept: Vec<Vec<String>> = table
            .rows
            .into_iter()
            .filter(|row| row.get(column).map(String::as_str) != Some(student_id))
            .collect();

        let removed = before - kept.len();
        if removed > 0 {
            rewrite_table(&self.path, &table.header, &kept)?;
        }
        Ok(removed)
    }
}

/// Every partition under the data root, oldest first
pub fn list_partitions(config: &StorageConfig) -> LedgerResult<Vec<Partition>> {
    let dir = config.partitions_dir();
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut partitions = Vec::new();
    for entry in fs::read_dir(&dir).map_err(storage_err(&dir))? {
        let entry = entry.map_err(storage_err(&dir))?;
        let file_name = entry.file_name();
        let Some(date) = file_name.to_str().and_then(Partition::date_from_file_name) else {
            continue;
        };
        partitions.push(Partition {
            date,
            path: entry.path(),
        });
    }

    partitions.sort_by_key(|p| p.date);
    Ok(partitions)
}

/// Read the given partitions, preserving their order
///
/// Above the configured threshold the files are read in parallel.
pub fn read_all(config: &StorageConfig, partitions: &[Partition]) -> LedgerResult<Vec<ScoreEvent>> {
    let per_file: Vec<Vec<ScoreEvent>> = if partitions.len() > config.parallel_scan_threshold {
        partitions
            .par_iter()
            .map(Partition::read_events)
            .collect::<LedgerResult<_>>()?
    } else {
        partitions
            .iter()
            .map(Partition::read_events)
            .collect::<LedgerResult<_>>()?
    };

    Ok(per_file.into_iter().flatten().collect())
}

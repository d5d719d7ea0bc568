//! Flat per-kind event files (`reward_events.csv`, `daily_task_events.csv`)
//!
//! These exist for kind-specific history views only; the unified score
//! stream stays the source of truth for reporting.

use std::path::Path;

use crate::error::LedgerResult;
use crate::storage::table::{read_table, rewrite_table};

/// Rows of a flat event file parsed by `parse`, skipping unusable ones
pub(crate) fn read_events<T, F>(path: &Path, parse: F) -> LedgerResult<Vec<T>>
where
    F: Fn(&[String]) -> LedgerResult<T>,
{
    let Some(table) = read_table(path)? else {
        return Ok(Vec::new());
    };

    let mut events = Vec::with_capacity(table.rows.len());
    for (index, row) in table.rows.iter().enumerate() {
        match parse(row) {
            Ok(event) => events.push(event),
            Err(e) => tracing::warn!(
                file = %path.display(),
                line = index + 2,
                error = %e,
                "skipping event row"
            ),
        }
    }
    Ok(events)
}

/// Drop every row whose first column is `student_id`; returns rows removed
pub(crate) fn purge_student(path: &Path, student_id: &str) -> LedgerResult<usize> {
    let Some(table) = read_table(path)? else {
        return Ok(0);
    };

    let before = table.rows.len();
    let kept: Vec<Vec<String>> = table
        .rows
        .into_iter()
        .filter(|row| row.first().map(String::as_str) != Some(student_id))
        .collect();

    let removed = before - kept.len();
    if removed > 0 {
        rewrite_table(path, &table.header, &kept)?;
    }
    Ok(removed)
}

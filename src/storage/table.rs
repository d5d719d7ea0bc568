//! Headered CSV tables
//!
//! Every persisted file except settings is a CSV table whose first row
//! is a header. Reads are lenient (ragged rows are returned as-is and
//! left to the caller to validate); writes either append one synced
//! row or replace the whole file atomically.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use super::atomic::atomic_write_with;
use crate::error::{storage_err, LedgerResult};

const BOM: char = '\u{feff}';

/// A CSV file split into its header and data rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Index of `column` in the header
    pub fn column(&self, column: &str) -> Option<usize> {
        self.header.iter().position(|h| h.trim() == column)
    }
}

fn records_from<R: io::Read>(reader: R) -> csv::Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        records.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    if let Some(first) = records.first_mut().and_then(|r| r.first_mut()) {
        if first.starts_with(BOM) {
            *first = first.trim_start_matches(BOM).to_string();
        }
    }

    Ok(records)
}

/// Parse raw rows (header included) from any reader
pub fn read_records<R: io::Read>(reader: R) -> csv::Result<Vec<Vec<String>>> {
    records_from(reader)
}

/// Read a headered table; a missing file yields `None`
pub fn read_table(path: &Path) -> LedgerResult<Option<Table>> {
    if !path.exists() {
        return Ok(None);
    }

    let file = File::open(path).map_err(storage_err(path))?;
    let mut records = records_from(file).map_err(storage_err(path))?;

    if records.is_empty() {
        return Ok(Some(Table::default()));
    }

    let header = records.remove(0);
    Ok(Some(Table {
        header,
        rows: records,
    }))
}

/// Create `path` holding only `header` unless it already exists
///
/// Returns true when the file was created.
pub fn ensure_table(path: &Path, header: &[&str]) -> LedgerResult<bool> {
    if path.exists() {
        return Ok(false);
    }
    write_table(path, header, std::iter::empty::<Vec<String>>())?;
    Ok(true)
}

/// Append one row, writing `header` first if the file is new or empty
pub fn append_row(path: &Path, header: &[&str], row: &[String]) -> LedgerResult<()> {
    let needs_header = path.metadata().map(|m| m.len() == 0).unwrap_or(true);

    let write = || -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        {
            let mut writer = csv::Writer::from_writer(&mut file);
            if needs_header {
                writer.write_record(header)?;
            }
            writer.write_record(row)?;
            writer.flush()?;
        }
        file.sync_all()
    };

    write().map_err(storage_err(path))
}

/// Replace the whole file with `header` followed by `rows`
pub fn write_table<I, R>(path: &Path, header: &[&str], rows: I) -> LedgerResult<()>
where
    I: IntoIterator<Item = R>,
    R: AsRef<[String]>,
{
    atomic_write_with(path, |file| {
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(header)?;
        for row in rows {
            writer.write_record(row.as_ref())?;
        }
        writer.flush()
    })
    .map_err(storage_err(path))
}

/// Replace the whole file with an already-read header and `rows`
pub fn rewrite_table(path: &Path, header: &[String], rows: &[Vec<String>]) -> LedgerResult<()> {
    atomic_write_with(path, |file| {
        let mut writer = csv::Writer::from_writer(file);
        if !header.is_empty() {
            writer.write_record(header)?;
        }
        for row in rows {
            writer.write_record(row)?;
        }
        writer.flush()
    })
    .map_err(storage_err(path))
}

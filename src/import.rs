//! Student import from CSV
//!
//! Column 0 is the student id (required), column 1 the name (optional).
//! A first row whose first cell is an id-like label is treated as a
//! header and skipped.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;

use crate::error::{storage_err, LedgerError, LedgerResult};
use crate::registry::StudentRegistry;
use crate::storage::table::read_records;

/// First-cell labels that mark a header row (compared lowercased)
pub const HEADER_LABELS: &[&str] = &["student_id", "studentid", "学号", "id"];

/// Counts and messages from one import run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub succeeded: usize,
    /// Rows whose id was already registered
    pub skipped: usize,
    /// Rows without a usable id
    pub malformed: usize,
    /// Human-readable messages, capped at the configured bound
    pub errors: Vec<String>,
    /// Messages dropped once the cap was reached
    pub errors_truncated: usize,
}

impl ImportReport {
    fn push_error(&mut self, limit: usize, message: String) {
        if self.errors.len() < limit {
            self.errors.push(message);
        } else {
            self.errors_truncated += 1;
        }
    }
}

fn is_header(row: &[String]) -> bool {
    row.first()
        .map(|cell| HEADER_LABELS.contains(&cell.trim().to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Import students from a CSV file
pub fn import_students(
    registry: &StudentRegistry,
    path: &Path,
    max_errors: usize,
) -> LedgerResult<ImportReport> {
    let file = File::open(path).map_err(storage_err(path))?;
    let report = import_students_from_reader(registry, file, max_errors).map_err(|e| match e {
        LedgerError::MalformedInput(reason) => LedgerError::MalformedInput(format!(
            "{}: {}",
            path.display(),
            reason
        )),
        other => other,
    })?;

    tracing::info!(
        path = %path.display(),
        succeeded = report.succeeded,
        skipped = report.skipped,
        malformed = report.malformed,
        "student import finished"
    );
    Ok(report)
}

/// Import students from any CSV source
///
/// Row-level problems are counted in the report; only an unreadable or
/// empty source is an error. Storage failures while registering abort
/// the import.
pub fn import_students_from_reader<R: Read>(
    registry: &StudentRegistry,
    reader: R,
    max_errors: usize,
) -> LedgerResult<ImportReport> {
    let records = read_records(reader)
        .map_err(|e| LedgerError::MalformedInput(format!("unreadable CSV: {}", e)))?;

    let Some(first) = records.first() else {
        return Err(LedgerError::MalformedInput("CSV file is empty".to_string()));
    };
    let skip = usize::from(is_header(first));

    let mut report = ImportReport::default();
    for (index, row) in records.iter().enumerate().skip(skip) {
        let line = index + 1;
        let student_id = row.first().map(|s| s.trim()).unwrap_or_default();
        let name = row.get(1).map(|s| s.trim()).unwrap_or_default();

        if student_id.is_empty() {
            report.malformed += 1;
            report.push_error(max_errors, format!("line {}: student id is empty", line));
            continue;
        }

        match registry.register(student_id, name) {
            Ok(_) => report.succeeded += 1,
            Err(e) if e.is_duplicate() => {
                report.skipped += 1;
                report.push_error(
                    max_errors,
                    format!("line {}: student {} already exists, skipped", line, student_id),
                );
            }
            Err(e) => return Err(e),
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageContext;
    use tempfile::TempDir;

    fn create_test_registry() -> (StudentRegistry, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let ctx = StorageContext::open(temp_dir.path()).unwrap();
        (StudentRegistry::new(ctx), temp_dir)
    }

    #[test]
    fn test_import_with_header_duplicate_and_blank_id() {
        let (registry, _temp_dir) = create_test_registry();
        registry.register("S002", "已有").unwrap();

        let csv = "学号,姓名\nS001,张三\nS002,李四\n ,无名\nS003\n";
        let report = import_students_from_reader(&registry, csv.as_bytes(), 100).unwrap();

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.malformed, 1);
        assert_eq!(
            report.errors,
            vec![
                "line 3: student S002 already exists, skipped",
                "line 4: student id is empty",
            ]
        );

        let students = registry.list_all().unwrap();
        assert_eq!(students.len(), 3);
        assert_eq!(registry.require("S002").unwrap().name, "已有");
        assert_eq!(registry.require("S003").unwrap().name, "");
    }

    #[test]
    fn test_import_without_header() {
        let (registry, _temp_dir) = create_test_registry();
        let report = import_students_from_reader(&registry, "S010,甲\nS011,乙\n".as_bytes(), 100).unwrap();
        assert_eq!(report.succeeded, 2);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_header_detection_ignores_case_and_bom() {
        let (registry, _temp_dir) = create_test_registry();
        let report =
            import_students_from_reader(&registry, "\u{feff}Student_ID,name\nS001,x\n".as_bytes(), 100)
                .unwrap();
        assert_eq!(report.succeeded, 1);
        assert!(registry.get("Student_ID").unwrap().is_none());
    }

    #[test]
    fn test_empty_source_is_an_error() {
        let (registry, _temp_dir) = create_test_registry();
        assert!(matches!(
            import_students_from_reader(&registry, "".as_bytes(), 100),
            Err(LedgerError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_error_list_is_bounded() {
        let (registry, _temp_dir) = create_test_registry();
        let csv = "id\n,a\n,b\n,c\n";
        let report = import_students_from_reader(&registry, csv.as_bytes(), 2).unwrap();
        assert_eq!(report.malformed, 3);
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors_truncated, 1);
    }

    #[test]
    fn test_import_from_missing_file() {
        let (registry, temp_dir) = create_test_registry();
        let err = import_students(&registry, &temp_dir.path().join("nope.csv"), 100).unwrap_err();
        assert!(err.is_storage());
    }
}

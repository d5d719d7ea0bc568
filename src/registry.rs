//! Student registry
//!
//! Identity and cached balance per student, persisted as `students.csv`.
//! The file has no in-place update primitive, so every mutation rewrites
//! the whole snapshot atomically.

use std::path::PathBuf;

use crate::error::{logged, LedgerError, LedgerResult};
use crate::storage::table::{read_table, write_table};
use crate::storage::{StorageContext, STUDENTS_HEADER};
use crate::types::{parse_int, Student};

/// Registry of students backed by one CSV file
#[derive(Debug, Clone)]
pub struct StudentRegistry {
    ctx: StorageContext,
}

impl StudentRegistry {
    pub fn new(ctx: StorageContext) -> Self {
        Self { ctx }
    }

    fn path(&self) -> PathBuf {
        self.ctx.config().students_path()
    }

    /// Load every student in file order, skipping unusable rows
    fn load(&self) -> LedgerResult<Vec<Student>> {
        let path = self.path();
        let Some(table) = read_table(&path)? else {
            return Ok(Vec::new());
        };

        let mut students = Vec::with_capacity(table.rows.len());
        for (index, row) in table.rows.iter().enumerate() {
            if row.len() < 3 {
                tracing::warn!(line = index + 2, "skipping short student row");
                continue;
            }
            match parse_int("current_score", &row[2]) {
                Ok(current_score) => students.push(Student {
                    student_id: row[0].clone(),
                    name: row[1].clone(),
                    current_score,
                }),
                Err(e) => tracing::warn!(line = index + 2, error = %e, "skipping student row"),
            }
        }

        Ok(students)
    }

    fn persist(&self, students: &[Student]) -> LedgerResult<()> {
        write_table(&self.path(), STUDENTS_HEADER, students.iter().map(Student::to_row))
    }

    /// Register a new student with a zero balance
    ///
    /// Fails with `Duplicate` if the id is already present. The id is
    /// trimmed and must not be empty.
    pub fn register(&self, student_id: &str, name: &str) -> LedgerResult<Student> {
        logged("register", self.register_inner(student_id, name))
    }

    fn register_inner(&self, student_id: &str, name: &str) -> LedgerResult<Student> {
        let student_id = student_id.trim();
        if student_id.is_empty() {
            return Err(LedgerError::MalformedInput(
                "student id must not be empty".to_string(),
            ));
        }

        let mut students = self.load()?;
        if students.iter().any(|s| s.student_id == student_id) {
            return Err(LedgerError::Duplicate {
                what: "student",
                key: student_id.to_string(),
            });
        }

        let student = Student::new(student_id, name.trim());
        students.push(student.clone());
        self.persist(&students)?;

        tracing::info!(student_id, "student registered");
        Ok(student)
    }

    pub fn get(&self, student_id: &str) -> LedgerResult<Option<Student>> {
        let students = logged("get_student", self.load())?;
        Ok(students.into_iter().find(|s| s.student_id == student_id))
    }

    /// Like `get`, but a missing student is a `NotFound` error
    pub fn require(&self, student_id: &str) -> LedgerResult<Student> {
        self.get(student_id)?
            .ok_or_else(|| LedgerError::student_not_found(student_id))
    }

    /// All students in storage insertion order
    pub fn list_all(&self) -> LedgerResult<Vec<Student>> {
        logged("list_students", self.load())
    }

    pub fn rename(&self, student_id: &str, new_name: &str) -> LedgerResult<()> {
        logged(
            "rename_student",
            self.update(student_id, |s| s.name = new_name.trim().to_string()),
        )
    }

    /// Overwrite a cached balance. Only the ledger calls this, after
    /// computing the new balance from the pre-append one.
    pub(crate) fn set_score(&self, student_id: &str, new_score: i64) -> LedgerResult<()> {
        self.update(student_id, |s| s.current_score = new_score)
    }

    fn update<F: FnOnce(&mut Student)>(&self, student_id: &str, apply: F) -> LedgerResult<()> {
        let mut students = self.load()?;
        let student = students
            .iter_mut()
            .find(|s| s.student_id == student_id)
            .ok_or_else(|| LedgerError::student_not_found(student_id))?;

        apply(student);
        self.persist(&students)
    }

    /// Drop the registry row only; the ledger cascades the purge
    pub(crate) fn remove(&self, student_id: &str) -> LedgerResult<Student> {
        let mut students = self.load()?;
        let position = students
            .iter()
            .position(|s| s.student_id == student_id)
            .ok_or_else(|| LedgerError::student_not_found(student_id))?;

        let removed = students.remove(position);
        self.persist(&students)?;
        Ok(removed)
    }
}

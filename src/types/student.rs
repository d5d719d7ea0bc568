//! Student record

use serde::{Deserialize, Serialize};

/// A registered student and their cached running balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    #[serde(rename = "studentId")]
    pub student_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "currentScore", default)]
    pub current_score: i64,
}

impl Student {
    /// Create a new student with a zero balance
    pub fn new(student_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            name: name.into(),
            current_score: 0,
        }
    }

    /// Name for display; unnamed students show as their id
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.student_id
        } else {
            &self.name
        }
    }

    pub(crate) fn to_row(&self) -> Vec<String> {
        vec![
            self.student_id.clone(),
            self.name.clone(),
            self.current_score.to_string(),
        ]
    }
}

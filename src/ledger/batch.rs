//! Per-item batch application

use serde::Serialize;

use crate::error::LedgerResult;

/// Tally of a batch run: how many items succeeded and which ids failed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub succeeded: usize,
    pub failed: Vec<String>,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Apply `op` to every id; a failure is recorded and the batch moves on
pub(crate) fn run<I, S, F>(ids: I, mut op: F) -> BatchOutcome
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    F: FnMut(&str) -> LedgerResult<()>,
{
    let mut outcome = BatchOutcome::default();
    for id in ids {
        let id = id.as_ref();
        match op(id) {
            Ok(()) => outcome.succeeded += 1,
            Err(e) => {
                tracing::warn!(student_id = id, error = %e, "batch item failed");
                outcome.failed.push(id.to_string());
            }
        }
    }
    outcome
}

/// Split newline-separated ids, trimming each and dropping blanks
pub fn parse_id_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;

    #[test]
    fn test_run_continues_past_failures() {
        let outcome = run(["S001", "S404", "S002"], |id| {
            if id == "S404" {
                Err(LedgerError::student_not_found(id))
            } else {
                Ok(())
            }
        });

        assert_eq!(outcome.succeeded, 2);
        assert_eq!(outcome.failed, vec!["S404"]);
        assert!(!outcome.is_complete());
    }

    #[test]
    fn test_parse_id_list() {
        let ids = parse_id_list("S001\n  S002 \n\n\r\nS003\r\n");
        assert_eq!(ids, vec!["S001", "S002", "S003"]);
    }
}

//! Rule catalogs
//!
//! Score, reward and daily-task rules share one shape: a named integer
//! value, unique by name within its catalog. Rules are templates only;
//! events copy the resolved name and value, so deleting a rule never
//! touches history.

use std::path::PathBuf;

use crate::error::{logged, LedgerError, LedgerResult};
use crate::storage::table::{append_row, read_table, write_table};
use crate::storage::StorageContext;
use crate::types::{parse_int, Rule, RuleKind};

/// One catalog of rules backed by its own CSV file
#[derive(Debug, Clone)]
pub struct RuleCatalog {
    ctx: StorageContext,
    kind: RuleKind,
}

impl RuleCatalog {
    pub fn new(ctx: StorageContext, kind: RuleKind) -> Self {
        Self { ctx, kind }
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    fn path(&self) -> PathBuf {
        self.ctx.config().rules_path(self.kind)
    }

    fn load(&self) -> LedgerResult<Vec<Rule>> {
        let Some(table) = read_table(&self.path())? else {
            return Ok(Vec::new());
        };

        let mut rules = Vec::with_capacity(table.rows.len());
        for row in &table.rows {
            if row.len() < 2 {
                continue;
            }
            match parse_int("rule value", &row[1]) {
                Ok(value) => rules.push(Rule::new(row[0].clone(), value)),
                Err(e) => tracing::warn!(catalog = %self.kind, error = %e, "skipping rule row"),
            }
        }
        Ok(rules)
    }

    /// Add a rule; fails with `Duplicate` if the name exists
    pub fn add(&self, name: &str, value: i64) -> LedgerResult<Rule> {
        logged("add_rule", self.add_inner(name, value))
    }

    fn add_inner(&self, name: &str, value: i64) -> LedgerResult<Rule> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::MalformedInput(format!(
                "{} name must not be empty",
                self.kind.label()
            )));
        }
        if self.kind.requires_positive() && value <= 0 {
            return Err(LedgerError::MalformedInput(format!(
                "{} value must be positive, got {}",
                self.kind.label(),
                value
            )));
        }

        if self.load()?.iter().any(|r| r.name == name) {
            return Err(LedgerError::Duplicate {
                what: self.kind.label(),
                key: name.to_string(),
            });
        }

        let rule = Rule::new(name, value);
        append_row(&self.path(), self.kind.header(), &rule.to_row())?;
        tracing::debug!(catalog = %self.kind, name, value, "rule added");
        Ok(rule)
    }

    pub fn list_all(&self) -> LedgerResult<Vec<Rule>> {
        logged("list_rules", self.load())
    }

    pub fn names(&self) -> LedgerResult<Vec<String>> {
        Ok(self.list_all()?.into_iter().map(|r| r.name).collect())
    }

    pub fn get_by_name(&self, name: &str) -> LedgerResult<Option<Rule>> {
        Ok(self.list_all()?.into_iter().find(|r| r.name == name))
    }

    /// Like `get_by_name`, but a missing rule is a `NotFound` error
    pub fn require(&self, name: &str) -> LedgerResult<Rule> {
        self.get_by_name(name)?.ok_or_else(|| LedgerError::NotFound {
            what: self.kind.label(),
            key: name.to_string(),
        })
    }

    pub fn delete(&self, name: &str) -> LedgerResult<()> {
        logged("delete_rule", self.delete_inner(name))
    }

    fn delete_inner(&self, name: &str) -> LedgerResult<()> {
        let mut rules = self.load()?;
        let before = rules.len();
        rules.retain(|r| r.name != name);

        if rules.len() == before {
            return Err(LedgerError::NotFound {
                what: self.kind.label(),
                key: name.to_string(),
            });
        }

        write_table(&self.path(), self.kind.header(), rules.iter().map(Rule::to_row))?;
        tracing::debug!(catalog = %self.kind, name, "rule deleted");
        Ok(())
    }
}

use std::fmt;

use serde::Serialize;

use crate::records::EntityKind;

/// A row that was counted as an error, with enough context to find it again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    pub entity: EntityKind,
    pub source: String,
    /// 1-based line number; the header is row 1.
    pub row: usize,
    pub message: String,
}

impl fmt::Display for RowFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} row {} ERROR: {}",
            self.entity, self.source, self.row, self.message
        )
    }
}

/// Batch counters. Every processed row lands in exactly one of created,
/// updated or skipped; errored rows are also counted as skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Fields shortened to their maximum length, counted once per field.
    pub truncated: usize,
    pub failures: Vec<RowFailure>,
}

impl ImportStats {
    pub fn processed(&self) -> usize {
        self.created + self.updated + self.skipped
    }

    pub(crate) fn record_failure(&mut self, failure: RowFailure) {
        self.errors += 1;
        self.skipped += 1;
        self.failures.push(failure);
    }

    pub fn merge(&mut self, other: ImportStats) {
        self.created += other.created;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.errors += other.errors;
        self.truncated += other.truncated;
        self.failures.extend(other.failures);
    }

    pub fn summary_line(&self, entity: EntityKind) -> String {
        format!(
            "[{entity}] created={} updated={} skipped={} errors={} truncated={}",
            self.created, self.updated, self.skipped, self.errors, self.truncated
        )
    }
}

/// Outcome of importing one or more sources for a single entity kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub entity: EntityKind,
    pub dry_run: bool,
    pub sources: Vec<String>,
    pub stats: ImportStats,
}

impl ImportReport {
    pub fn summary_line(&self) -> String {
        self.stats.summary_line(self.entity)
    }
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary_line())
    }
}

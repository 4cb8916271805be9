use std::path::PathBuf;

use super::{EntityKind, FieldValue, Fields, Record, RecordId};

/// Field-level lookup used for natural-key matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Criterion {
    Equals(FieldValue),
    EqualsIgnoreCase(String),
    ContainsIgnoreCase(String),
}

impl Criterion {
    pub fn matches(&self, value: &FieldValue) -> bool {
        match self {
            Criterion::Equals(expected) => value == expected,
            Criterion::EqualsIgnoreCase(expected) => value
                .as_text()
                .is_some_and(|text| text.trim().to_lowercase() == expected.trim().to_lowercase()),
            Criterion::ContainsIgnoreCase(needle) => {
                let needle = needle.trim().to_lowercase();
                !needle.is_empty()
                    && value
                        .as_text()
                        .is_some_and(|text| text.to_lowercase().contains(&needle))
            }
        }
    }
}

/// Storage abstraction so the importers can be exercised in isolation.
///
/// Transactions nest: every `begin` must be closed by exactly one `commit` or
/// `rollback`, and a rollback discards everything written since its `begin`.
pub trait RecordStore: Send + Sync {
    fn find(
        &self,
        entity: EntityKind,
        field: &str,
        criterion: &Criterion,
    ) -> Result<Vec<Record>, StoreError>;
    fn get(&self, entity: EntityKind, id: RecordId) -> Result<Option<Record>, StoreError>;
    fn all(&self, entity: EntityKind) -> Result<Vec<Record>, StoreError>;
    fn insert(&self, entity: EntityKind, fields: Fields) -> Result<Record, StoreError>;
    /// Overwrites only the supplied fields and returns the updated record.
    fn update(&self, entity: EntityKind, id: RecordId, changes: Fields)
        -> Result<Record, StoreError>;
    fn begin(&self) -> Result<(), StoreError>;
    fn commit(&self) -> Result<(), StoreError>;
    fn rollback(&self) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} record with {field} = '{value}' already exists")]
    Conflict {
        entity: EntityKind,
        field: String,
        value: String,
    },
    #[error("{entity} record {id} not found")]
    NotFound { entity: EntityKind, id: RecordId },
    #[error("record store unavailable: {0}")]
    Unavailable(String),
    #[error("transaction error: {0}")]
    Transaction(String),
    #[error("failed to persist record store at {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("record store file {} is not valid: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::store::{Criterion, RecordStore, StoreError};
use super::{EntityKind, FieldValue, Fields, Record, RecordId};

/// Serializable snapshot of every stored record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    next_id: u64,
    records: Vec<Record>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    records: BTreeMap<RecordId, Record>,
    savepoints: Vec<(u64, BTreeMap<RecordId, Record>)>,
    unique: Vec<(EntityKind, String)>,
}

impl Inner {
    fn check_unique(
        &self,
        entity: EntityKind,
        skip: Option<RecordId>,
        fields: &Fields,
    ) -> Result<(), StoreError> {
        for (unique_entity, field) in &self.unique {
            if *unique_entity != entity {
                continue;
            }
            let Some(value) = fields.get(field).filter(|value| !value.is_blank()) else {
                continue;
            };
            let criterion = match value {
                FieldValue::Text(text) => Criterion::EqualsIgnoreCase(text.clone()),
                other => Criterion::Equals(other.clone()),
            };
            let clash = self.records.values().any(|record| {
                record.entity == entity
                    && Some(record.id) != skip
                    && record.get(field).is_some_and(|stored| criterion.matches(stored))
            });
            if clash {
                return Err(StoreError::Conflict {
                    entity,
                    field: field.clone(),
                    value: value.render(),
                });
            }
        }
        Ok(())
    }
}

/// Mutex-guarded in-memory record store with nested snapshot transactions and
/// JSON-file persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject inserts and updates that would duplicate `field` (case-insensitive for text).
    pub fn with_unique_field(self, entity: EntityKind, field: impl Into<String>) -> Self {
        if let Ok(mut inner) = self.inner.lock() {
            inner.unique.push((entity, field.into()));
        }
        self
    }

    /// Load a store file; a missing file yields an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "record store file absent, starting empty");
            return Ok(Self::new());
        }

        let raw = fs::read_to_string(path).map_err(|source| StoreError::Persist {
            path: path.to_path_buf(),
            source,
        })?;
        let state: StoreState =
            serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
                path: path.to_path_buf(),
                source,
            })?;

        let records = state
            .records
            .into_iter()
            .map(|record| (record.id, record))
            .collect::<BTreeMap<_, _>>();
        let next_id = records
            .keys()
            .map(|id| id.0 + 1)
            .max()
            .unwrap_or(1)
            .max(state.next_id);

        Ok(Self {
            inner: Mutex::new(Inner {
                next_id,
                records,
                ..Inner::default()
            }),
        })
    }

    /// Write the committed state to `path` as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let state = {
            let inner = self.lock()?;
            if !inner.savepoints.is_empty() {
                return Err(StoreError::Transaction(
                    "cannot save while a transaction is open".to_string(),
                ));
            }
            StoreState {
                next_id: inner.next_id,
                records: inner.records.values().cloned().collect(),
            }
        };

        let body = serde_json::to_string_pretty(&state).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, body).map_err(|source| StoreError::Persist {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn count(&self, entity: EntityKind) -> usize {
        self.lock()
            .map(|inner| {
                inner
                    .records
                    .values()
                    .filter(|record| record.entity == entity)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Every stored record ordered by id.
    pub fn snapshot(&self) -> Vec<Record> {
        self.lock()
            .map(|inner| inner.records.values().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("record store mutex poisoned".to_string()))
    }
}

impl RecordStore for MemoryStore {
    fn find(
        &self,
        entity: EntityKind,
        field: &str,
        criterion: &Criterion,
    ) -> Result<Vec<Record>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .records
            .values()
            .filter(|record| record.entity == entity)
            .filter(|record| record.get(field).is_some_and(|value| criterion.matches(value)))
            .cloned()
            .collect())
    }

    fn get(&self, entity: EntityKind, id: RecordId) -> Result<Option<Record>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .records
            .get(&id)
            .filter(|record| record.entity == entity)
            .cloned())
    }

    fn all(&self, entity: EntityKind) -> Result<Vec<Record>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .records
            .values()
            .filter(|record| record.entity == entity)
            .cloned()
            .collect())
    }

    fn insert(&self, entity: EntityKind, fields: Fields) -> Result<Record, StoreError> {
        let mut inner = self.lock()?;
        inner.check_unique(entity, None, &fields)?;

        let id = RecordId(inner.next_id.max(1));
        inner.next_id = id.0 + 1;
        let record = Record { id, entity, fields };
        inner.records.insert(id, record.clone());
        Ok(record)
    }

    fn update(
        &self,
        entity: EntityKind,
        id: RecordId,
        changes: Fields,
    ) -> Result<Record, StoreError> {
        let mut inner = self.lock()?;
        let mut merged = match inner.records.get(&id) {
            Some(record) if record.entity == entity => record.fields.clone(),
            _ => return Err(StoreError::NotFound { entity, id }),
        };
        merged.extend(changes);
        inner.check_unique(entity, Some(id), &merged)?;

        let record = Record {
            id,
            entity,
            fields: merged,
        };
        inner.records.insert(id, record.clone());
        Ok(record)
    }

    fn begin(&self) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let snapshot = (inner.next_id, inner.records.clone());
        inner.savepoints.push(snapshot);
        Ok(())
    }

    fn commit(&self) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner
            .savepoints
            .pop()
            .map(|_| ())
            .ok_or_else(|| StoreError::Transaction("commit without open transaction".to_string()))
    }

    fn rollback(&self) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let (next_id, records) = inner.savepoints.pop().ok_or_else(|| {
            StoreError::Transaction("rollback without open transaction".to_string())
        })?;
        inner.next_id = next_id;
        inner.records = records;
        Ok(())
    }
}

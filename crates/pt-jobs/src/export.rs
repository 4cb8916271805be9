use std::collections::HashMap;
use std::io::Write;

use tracing::debug;

use crate::imports::{profiles, EntityConfig};
use crate::records::{EntityKind, FieldValue, RecordId, RecordStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to write CSV export: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush CSV export: {0}")]
    Io(#[from] std::io::Error),
}

/// Column order of an export: `id`, the declared fields, then one column per
/// reference carrying the related record's lookup value.
pub fn export_columns(config: &EntityConfig) -> Vec<&'static str> {
    std::iter::once("id")
        .chain(config.schema.fields().iter().map(|spec| spec.name))
        .chain(config.references.iter().map(|reference| reference.source))
        .collect()
}

/// Write every stored record of `entity` as CSV, ordered by id. Returns the
/// number of data rows written.
pub fn export_csv<S, W>(store: &S, entity: EntityKind, writer: W) -> Result<usize, ExportError>
where
    S: RecordStore + ?Sized,
    W: Write,
{
    let config = profiles::config(entity);
    let mut records = store.all(entity)?;
    records.sort_by_key(|record| record.id);

    let mut related: HashMap<(EntityKind, RecordId), String> = HashMap::new();
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(export_columns(&config))?;

    for record in &records {
        let mut row = Vec::with_capacity(config.schema.fields().len() + 2);
        row.push(record.id.to_string());
        for spec in config.schema.fields() {
            row.push(record.get(spec.name).map(FieldValue::render).unwrap_or_default());
        }

        for reference in &config.references {
            let target_id = record
                .get(reference.store_as)
                .and_then(FieldValue::as_integer)
                .and_then(|id| u64::try_from(id).ok())
                .map(RecordId);
            let value = match target_id {
                Some(id) => {
                    let key = (reference.target, id);
                    if let Some(cached) = related.get(&key) {
                        cached.clone()
                    } else {
                        let value = store
                            .get(reference.target, id)?
                            .and_then(|target| target.get(reference.target_field).map(FieldValue::render))
                            .unwrap_or_default();
                        related.insert(key, value.clone());
                        value
                    }
                }
                None => String::new(),
            };
            row.push(value);
        }

        csv_writer.write_record(&row)?;
    }

    csv_writer.flush()?;
    debug!(%entity, rows = records.len(), "export written");
    Ok(records.len())
}

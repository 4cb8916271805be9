//! CSV bulk import: header resolution, value normalization, and an idempotent
//! create-or-update engine driven by per-entity profiles.

pub mod bulk;
mod engine;
mod headers;
pub mod normalize;
pub mod profiles;
mod schema;
mod source;
mod stats;

pub use bulk::{BulkPlan, BulkReport, BulkStep};
pub use engine::RecordImporter;
pub use headers::{is_blank, missing_columns, resolve_headers, AliasConflict, FieldAliasTable};
pub use schema::{
    DeriveFn, EntityConfig, EntitySchema, FieldDefault, FieldKind, FieldSpec, ImportContext,
    ImportOptions, MatchKey, Reference, StatusMode,
};
pub use source::{ImportRow, SourceError, SourceRows};
pub use stats::{ImportReport, ImportStats, RowFailure};

use crate::records::StoreError;

/// Batch-level failure. Row-level problems never surface here; they are
/// counted in [`ImportStats`] instead.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("record store failure: {0}")]
    Store(#[from] StoreError),
}

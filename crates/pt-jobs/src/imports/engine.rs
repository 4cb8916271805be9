use std::fmt;
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDateTime, Utc};
use tracing::{debug, info, warn};

use super::headers::{is_blank, missing_columns, resolve_headers};
use super::normalize::truncate_to_limit;
use super::profiles;
use super::schema::{EntityConfig, ImportContext, ImportOptions};
use super::source::{read_path, read_rows, ImportRow, SourceError, SourceRows};
use super::stats::{ImportReport, ImportStats, RowFailure};
use super::ImportError;
use crate::notify::{AdminNotification, Notifier};
use crate::records::{Criterion, EntityKind, FieldValue, Fields, Record, RecordStore, StoreError};

/// Generic create-or-update importer, parameterized by an entity profile.
pub struct RecordImporter<'a, S: ?Sized> {
    config: EntityConfig,
    store: &'a S,
    notifier: Option<&'a dyn Notifier>,
    now: Option<NaiveDateTime>,
}

/// Row after header resolution, normalization, derivation and truncation.
struct PreparedRow {
    resolved: ImportRow,
    fields: Fields,
    truncated: usize,
}

#[derive(Debug)]
enum RowOutcome {
    Created { truncated: usize },
    Updated { truncated: usize },
    Skipped(SkipReason),
}

#[derive(Debug)]
enum SkipReason {
    MissingField(&'static str),
    UnresolvedReference { field: &'static str, value: String },
    CreateDisabled,
    UpdateDisabled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingField(field) => write!(f, "missing required field '{field}'"),
            SkipReason::UnresolvedReference { field, value } => {
                write!(f, "no unique match for {field} '{value}'")
            }
            SkipReason::CreateDisabled => f.write_str("no existing record and creation disabled"),
            SkipReason::UpdateDisabled => f.write_str("record exists and updates disabled"),
        }
    }
}

impl<'a, S> RecordImporter<'a, S>
where
    S: RecordStore + ?Sized,
{
    /// Importer using the built-in profile for `entity`.
    pub fn new(entity: EntityKind, store: &'a S) -> Self {
        Self::with_config(profiles::config(entity), store)
    }

    pub fn with_config(config: EntityConfig, store: &'a S) -> Self {
        Self {
            config,
            store,
            notifier: None,
            now: None,
        }
    }

    pub fn with_notifier(mut self, notifier: &'a dyn Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Pin the timestamp used for `Now` defaults instead of reading the clock.
    pub fn with_clock(mut self, now: NaiveDateTime) -> Self {
        self.now = Some(now);
        self
    }

    pub fn config(&self) -> &EntityConfig {
        &self.config
    }

    pub fn import_paths<P: AsRef<Path>>(
        &self,
        paths: &[P],
        options: &ImportOptions,
    ) -> Result<ImportReport, ImportError> {
        let sources = read_paths(paths)?;
        self.import_sources(sources, options)
    }

    pub fn import_reader<R: Read>(
        &self,
        name: &str,
        reader: R,
        options: &ImportOptions,
    ) -> Result<ImportReport, ImportError> {
        let source = read_rows(name, reader)?;
        self.import_sources(vec![source], options)
    }

    /// Process every source in order. All sources are validated before the
    /// first row is touched, so a source error never leaves partial writes.
    ///
    /// A dry run writes inside one batch transaction and rolls it back at the
    /// end, so later rows see earlier ones exactly as in a live run.
    pub fn import_sources(
        &self,
        sources: Vec<SourceRows>,
        options: &ImportOptions,
    ) -> Result<ImportReport, ImportError> {
        for source in &sources {
            self.check_columns(source)?;
        }

        if !options.dry_run {
            return Ok(self.run_sources(sources, options));
        }

        self.store.begin()?;
        let report = self.run_sources(sources, options);
        self.store.rollback()?;
        info!(entity = %self.config.entity, "DRY-RUN: no writes performed");
        Ok(report)
    }

    /// Like [`import_paths`](Self::import_paths) but never opens or closes the
    /// dry-run transaction; the caller owns it. Used by bulk plans so every
    /// step sees the rows staged by earlier steps.
    pub(crate) fn import_paths_staged<P: AsRef<Path>>(
        &self,
        paths: &[P],
        options: &ImportOptions,
    ) -> Result<ImportReport, ImportError> {
        let sources = read_paths(paths)?;
        for source in &sources {
            self.check_columns(source)?;
        }
        Ok(self.run_sources(sources, options))
    }

    fn run_sources(&self, sources: Vec<SourceRows>, options: &ImportOptions) -> ImportReport {
        let entity = self.config.entity;
        let now = self.now.unwrap_or_else(|| Utc::now().naive_utc());
        let mut stats = ImportStats::default();
        let mut processed = 0usize;

        'sources: for source in &sources {
            let ctx = ImportContext::new(options, &source.name, now);
            info!(
                %entity,
                source = %source.name,
                rows = source.rows.len(),
                status = ?ctx.status,
                dry_run = options.dry_run,
                "importing source"
            );

            for (index, row) in source.rows.iter().enumerate() {
                if options.limit.is_some_and(|limit| processed >= limit) {
                    break 'sources;
                }
                processed += 1;
                self.import_row(&source.name, index + 2, row, &ctx, &mut stats);
            }
        }

        info!(
            %entity,
            created = stats.created,
            updated = stats.updated,
            skipped = stats.skipped,
            errors = stats.errors,
            truncated = stats.truncated,
            "import finished"
        );

        ImportReport {
            entity,
            dry_run: options.dry_run,
            sources: sources.into_iter().map(|source| source.name).collect(),
            stats,
        }
    }

    fn check_columns(&self, source: &SourceRows) -> Result<(), SourceError> {
        let missing = missing_columns(
            &source.headers,
            &self.config.aliases,
            &self.config.required_columns,
        );
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SourceError::MissingColumns {
                name: source.name.clone(),
                missing,
                found: source.headers.clone(),
            })
        }
    }

    fn import_row(
        &self,
        source: &str,
        row_number: usize,
        row: &ImportRow,
        ctx: &ImportContext<'_>,
        stats: &mut ImportStats,
    ) {
        let entity = self.config.entity;
        match self.process_row(row, ctx) {
            Ok(RowOutcome::Created { truncated }) => {
                stats.created += 1;
                stats.truncated += truncated;
            }
            Ok(RowOutcome::Updated { truncated }) => {
                stats.updated += 1;
                stats.truncated += truncated;
            }
            Ok(RowOutcome::Skipped(reason)) => {
                debug!(%entity, source, row = row_number, %reason, "row skipped");
                stats.skipped += 1;
            }
            Err(error) => {
                warn!(%entity, source, row = row_number, %error, "row failed");
                stats.record_failure(RowFailure {
                    entity,
                    source: source.to_string(),
                    row: row_number,
                    message: error.to_string(),
                });
            }
        }
    }

    fn process_row(
        &self,
        row: &ImportRow,
        ctx: &ImportContext<'_>,
    ) -> Result<RowOutcome, StoreError> {
        let PreparedRow {
            resolved,
            mut fields,
            truncated,
        } = self.prepare(row, ctx);

        if let Some(field) = self
            .config
            .required
            .iter()
            .find(|field| !self.config.is_satisfied(field, &resolved, &fields))
        {
            return Ok(RowOutcome::Skipped(SkipReason::MissingField(*field)));
        }

        for reference in &self.config.references {
            let value = resolved.get(reference.source).unwrap_or_default().trim();
            let target = if is_blank(value) {
                None
            } else {
                self.lookup(
                    reference.target,
                    reference.target_field,
                    &FieldValue::from(value),
                    reference.loose,
                )?
            };
            match target {
                Some(record) => {
                    let id = i64::try_from(record.id.0).map_err(|_| {
                        StoreError::Unavailable(format!("record id {} out of range", record.id))
                    })?;
                    fields.insert(reference.store_as.to_string(), FieldValue::Integer(id));
                }
                None => {
                    return Ok(RowOutcome::Skipped(SkipReason::UnresolvedReference {
                        field: reference.source,
                        value: value.to_string(),
                    }))
                }
            }
        }

        let key_field = self.config.match_key.field;
        let Some(key) = fields.get(key_field).filter(|value| usable_key(value)).cloned() else {
            return Ok(RowOutcome::Skipped(SkipReason::MissingField(key_field)));
        };
        let existing = self.lookup(
            self.config.entity,
            key_field,
            &key,
            self.config.match_key.loose,
        )?;

        match existing {
            Some(record) => {
                if !ctx.options.allow_update {
                    return Ok(RowOutcome::Skipped(SkipReason::UpdateDisabled));
                }
                self.write_update(&record, fields)?;
                Ok(RowOutcome::Updated { truncated })
            }
            None => {
                if !ctx.options.allow_create {
                    return Ok(RowOutcome::Skipped(SkipReason::CreateDisabled));
                }
                let record = self.write_create(fields, ctx)?;
                if !ctx.options.dry_run {
                    self.announce(&record);
                }
                Ok(RowOutcome::Created { truncated })
            }
        }
    }

    fn prepare(&self, row: &ImportRow, ctx: &ImportContext<'_>) -> PreparedRow {
        let resolved = resolve_headers(row, &self.config.aliases);
        let schema = &self.config.schema;

        let mut fields = Fields::new();
        for spec in schema.fields() {
            if let Some(raw) = resolved.get(spec.name).filter(|raw| !is_blank(raw)) {
                fields.insert(spec.name.to_string(), spec.normalize(raw, ctx));
            }
        }

        if let Some(derive) = self.config.derive {
            derive(&resolved, &mut fields, ctx);
        }

        let mut truncated = 0;
        for spec in schema.fields() {
            let Some(limit) = spec.max_length else {
                continue;
            };
            if let Some(FieldValue::Text(text)) = fields.get_mut(spec.name) {
                let (shortened, was_truncated) = truncate_to_limit(text, Some(limit));
                if was_truncated {
                    debug!(field = spec.name, limit, "value truncated");
                    *text = shortened;
                    truncated += 1;
                }
            }
        }

        PreparedRow {
            resolved,
            fields,
            truncated,
        }
    }

    /// Exact match first (case-insensitive for text); more than one hit is
    /// ambiguous and treated as no match. The optional substring fallback only
    /// accepts a single candidate.
    fn lookup(
        &self,
        entity: EntityKind,
        field: &str,
        value: &FieldValue,
        loose: bool,
    ) -> Result<Option<Record>, StoreError> {
        let exact = match value {
            FieldValue::Text(text) => Criterion::EqualsIgnoreCase(text.clone()),
            other => Criterion::Equals(other.clone()),
        };
        let mut hits = self.store.find(entity, field, &exact)?;
        match hits.len() {
            1 => return Ok(hits.pop()),
            0 => {}
            count => {
                debug!(%entity, field, count, "ambiguous exact match, treating as unmatched");
                return Ok(None);
            }
        }

        if let (true, FieldValue::Text(text)) = (loose, value) {
            let mut hits = self
                .store
                .find(entity, field, &Criterion::ContainsIgnoreCase(text.clone()))?;
            if hits.len() == 1 {
                return Ok(hits.pop());
            }
            if hits.len() > 1 {
                debug!(%entity, field, count = hits.len(), "ambiguous loose match, treating as unmatched");
            }
        }

        Ok(None)
    }

    fn write_create(&self, fields: Fields, ctx: &ImportContext<'_>) -> Result<Record, StoreError> {
        let mut record_fields = self.config.schema.defaults(ctx);
        record_fields.extend(fields);
        let entity = self.config.entity;
        self.in_transaction(|store| store.insert(entity, record_fields))
    }

    /// Partial update: only fields present in the row are written, and
    /// write-once fields only while still empty.
    fn write_update(&self, existing: &Record, fields: Fields) -> Result<Record, StoreError> {
        let schema = &self.config.schema;
        let changes: Fields = fields
            .into_iter()
            .filter(|(name, _)| match schema.field(name) {
                Some(spec) if spec.write_once => existing.get(name).map_or(true, FieldValue::is_null),
                _ => true,
            })
            .collect();
        let entity = self.config.entity;
        self.in_transaction(|store| store.update(entity, existing.id, changes))
    }

    fn in_transaction<F>(&self, write: F) -> Result<Record, StoreError>
    where
        F: FnOnce(&S) -> Result<Record, StoreError>,
    {
        self.store.begin()?;
        match write(self.store) {
            Ok(record) => {
                self.store.commit()?;
                Ok(record)
            }
            Err(error) => {
                if let Err(rollback) = self.store.rollback() {
                    warn!(%rollback, "row rollback failed");
                }
                Err(error)
            }
        }
    }

    fn announce(&self, record: &Record) {
        if !self.config.notify_on_create {
            return;
        }
        let Some(notifier) = self.notifier else {
            return;
        };

        let label = record
            .get(self.config.label_field)
            .map(FieldValue::render)
            .filter(|label| !label.trim().is_empty())
            .or_else(|| record.get(self.config.match_key.field).map(FieldValue::render))
            .unwrap_or_default();
        let notification = AdminNotification {
            entity: record.entity,
            record_id: record.id,
            label,
        };
        if let Err(error) = notifier.notify(&notification) {
            warn!(entity = %record.entity, id = %record.id, %error, "admin notification failed");
        }
    }
}

fn read_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<SourceRows>, SourceError> {
    paths.iter().map(|path| read_path(path.as_ref())).collect()
}

/// Blank keys and non-positive numeric ids never identify a record.
fn usable_key(value: &FieldValue) -> bool {
    match value {
        FieldValue::Integer(id) => *id > 0,
        other => !other.is_blank(),
    }
}

use metrics_exporter_prometheus::PrometheusHandle;
use pt_jobs::config::AppConfig;
use pt_jobs::error::AppError;
use pt_jobs::export::export_csv;
use pt_jobs::imports::{ImportOptions, ImportReport, RecordImporter, StatusMode};
use pt_jobs::notify::{LogNotifier, Notifier};
use pt_jobs::records::{EntityKind, MemoryStore};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) imports: ImportState,
}

/// Shared record store plus the defaults every import request starts from.
#[derive(Clone)]
pub(crate) struct ImportState {
    pub(crate) store: Arc<MemoryStore>,
    /// Held for a whole import or export. The store keeps one savepoint stack,
    /// so overlapping batches would roll back each other's rows.
    pub(crate) gate: Arc<Mutex<()>>,
    /// Where live runs persist the store. `None` keeps it in memory only.
    pub(crate) store_path: Option<PathBuf>,
    pub(crate) notifier: Option<Arc<dyn Notifier>>,
    pub(crate) currency: String,
}

impl ImportState {
    pub(crate) fn open(config: &AppConfig, store_path: &Path) -> Result<Self, AppError> {
        let store = MemoryStore::open(store_path)?;
        Ok(Self {
            store: Arc::new(store),
            gate: Arc::default(),
            store_path: Some(store_path.to_path_buf()),
            notifier: admin_notifier(config),
            currency: config.import.default_currency.clone(),
        })
    }

    pub(crate) fn options(
        &self,
        dry_run: bool,
        status: Option<StatusMode>,
        limit: Option<usize>,
    ) -> ImportOptions {
        ImportOptions {
            dry_run,
            status,
            limit,
            currency: self.currency.clone(),
            ..ImportOptions::default()
        }
    }

    /// Import one CSV document on the blocking pool, one batch at a time.
    pub(crate) async fn import_csv(
        &self,
        entity: EntityKind,
        name: String,
        body: Vec<u8>,
        options: ImportOptions,
    ) -> Result<ImportReport, AppError> {
        let _batch = self.gate.lock().await;
        let state = self.clone();
        tokio::task::spawn_blocking(move || state.import_blocking(entity, &name, &body, &options))
            .await
            .map_err(axum::Error::new)?
    }

    /// Render an entity as CSV without interleaving with a running import.
    pub(crate) async fn export_csv(&self, entity: EntityKind) -> Result<Vec<u8>, AppError> {
        let _batch = self.gate.lock().await;
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            let mut body = Vec::new();
            export_csv(store.as_ref(), entity, &mut body)?;
            Ok::<_, AppError>(body)
        })
        .await
        .map_err(axum::Error::new)?
    }

    /// Callers must hold `gate` or own the store exclusively.
    fn import_blocking(
        &self,
        entity: EntityKind,
        name: &str,
        body: &[u8],
        options: &ImportOptions,
    ) -> Result<ImportReport, AppError> {
        let mut importer = RecordImporter::new(entity, self.store.as_ref());
        if let Some(notifier) = self.notifier.as_deref() {
            importer = importer.with_notifier(notifier);
        }
        let report = importer.import_reader(name, body, options)?;
        if !options.dry_run {
            self.persist()?;
        }
        Ok(report)
    }

    pub(crate) fn persist(&self) -> Result<(), AppError> {
        if let Some(path) = &self.store_path {
            self.store.save(path)?;
            debug!(path = %path.display(), "record store saved");
        }
        Ok(())
    }
}

pub(crate) fn admin_notifier(config: &AppConfig) -> Option<Arc<dyn Notifier>> {
    config
        .notifications
        .admin_email
        .as_ref()
        .map(|recipient| Arc::new(LogNotifier::new(recipient.clone())) as Arc<dyn Notifier>)
}

pub(crate) fn parse_entity(raw: &str) -> Result<EntityKind, AppError> {
    raw.parse::<EntityKind>().map_err(AppError::UnknownEntity)
}

pub(crate) fn parse_status(raw: Option<&str>) -> Result<Option<StatusMode>, AppError> {
    raw.filter(|value| !value.trim().is_empty())
        .map(str::parse::<StatusMode>)
        .transpose()
        .map_err(AppError::InvalidRequest)
}

use crate::infra::admin_notifier;
use clap::Args;
use pt_jobs::config::AppConfig;
use pt_jobs::error::AppError;
use pt_jobs::export::export_csv;
use pt_jobs::imports::{
    BulkPlan, BulkReport, ImportOptions, ImportReport, RecordImporter, StatusMode,
};
use pt_jobs::records::{EntityKind, MemoryStore};
use pt_jobs::telemetry;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// Record type: employers, jobs, jobseekers or invoices
    pub(crate) entity: EntityKind,
    /// CSV files processed in order as one batch
    #[arg(required = true)]
    pub(crate) sources: Vec<PathBuf>,
    /// Report what would change without writing anything
    #[arg(long)]
    pub(crate) dry_run: bool,
    /// Force a status (active, inactive, pending, expired, infer) instead of detecting it from file names
    #[arg(long)]
    pub(crate) status: Option<StatusMode>,
    /// Stop after this many data rows across all files
    #[arg(long)]
    pub(crate) limit: Option<usize>,
    /// Currency for invoice rows that carry none (defaults to IMPORT_DEFAULT_CURRENCY)
    #[arg(long)]
    pub(crate) currency: Option<String>,
    /// Only update existing records
    #[arg(long)]
    pub(crate) no_create: bool,
    /// Only create new records
    #[arg(long)]
    pub(crate) no_update: bool,
    /// Record store file (defaults to IMPORT_STORE_PATH)
    #[arg(long)]
    pub(crate) store: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct BulkArgs {
    /// Directory holding the legacy exports (defaults to BULK_IMPORT_BASE)
    #[arg(long)]
    pub(crate) base: Option<PathBuf>,
    /// Report what would change without writing anything
    #[arg(long)]
    pub(crate) dry_run: bool,
    /// Record store file (defaults to IMPORT_STORE_PATH)
    #[arg(long)]
    pub(crate) store: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct ExportArgs {
    /// Record type: employers, jobs, jobseekers or invoices
    pub(crate) entity: EntityKind,
    /// Output file (defaults to stdout)
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
    /// Record store file (defaults to IMPORT_STORE_PATH)
    #[arg(long)]
    pub(crate) store: Option<PathBuf>,
}

/// Loaded configuration plus the store the command operates on.
struct Session {
    config: AppConfig,
    store_path: PathBuf,
    store: MemoryStore,
}

impl Session {
    fn start(store_override: Option<PathBuf>) -> Result<Self, AppError> {
        let config = AppConfig::load()?;
        telemetry::init(&config.telemetry)?;
        let store_path = store_override.unwrap_or_else(|| config.import.store_path.clone());
        let store = MemoryStore::open(&store_path)?;
        Ok(Self {
            config,
            store_path,
            store,
        })
    }

    fn save(&self) -> Result<(), AppError> {
        self.store.save(&self.store_path)?;
        info!(path = %self.store_path.display(), "record store saved");
        Ok(())
    }
}

pub(crate) fn run_import(args: ImportArgs) -> Result<(), AppError> {
    let session = Session::start(args.store)?;
    let currency = args
        .currency
        .map(|code| code.trim().to_ascii_uppercase())
        .filter(|code| !code.is_empty())
        .unwrap_or_else(|| session.config.import.default_currency.clone());
    let options = ImportOptions {
        dry_run: args.dry_run,
        status: args.status,
        limit: args.limit,
        currency,
        allow_create: !args.no_create,
        allow_update: !args.no_update,
    };

    let notifier = admin_notifier(&session.config);
    let mut importer = RecordImporter::new(args.entity, &session.store);
    if let Some(notifier) = notifier.as_deref() {
        importer = importer.with_notifier(notifier);
    }
    let report = importer.import_paths(&args.sources, &options)?;
    print_report(&report);

    if !options.dry_run {
        session.save()?;
    }
    Ok(())
}

pub(crate) fn run_bulk(args: BulkArgs) -> Result<(), AppError> {
    let session = Session::start(args.store)?;
    let base = args
        .base
        .unwrap_or_else(|| session.config.import.bulk_base.clone());
    let options = ImportOptions {
        dry_run: args.dry_run,
        currency: session.config.import.default_currency.clone(),
        ..ImportOptions::default()
    };

    let notifier = admin_notifier(&session.config);
    let bulk = BulkPlan::standard(&base).run(&session.store, notifier.as_deref(), &options);
    print_bulk(&bulk, options.dry_run);

    if !options.dry_run {
        session.save()?;
    }
    Ok(())
}

pub(crate) fn run_export(args: ExportArgs) -> Result<(), AppError> {
    let session = Session::start(args.store)?;
    let rows = match &args.output {
        Some(path) => {
            let file = File::create(path)?;
            export_csv(&session.store, args.entity, BufWriter::new(file))?
        }
        None => export_csv(&session.store, args.entity, io::stdout().lock())?,
    };
    info!(entity = %args.entity, rows, "export complete");
    Ok(())
}

fn print_report(report: &ImportReport) {
    println!("{}", report.summary_line());
    for failure in &report.stats.failures {
        println!("  {failure}");
    }
    if report.dry_run {
        println!("DRY-RUN: no changes were written");
    }
}

fn print_bulk(bulk: &BulkReport, dry_run: bool) {
    for report in &bulk.reports {
        println!("{}", report.summary_line());
        for failure in &report.stats.failures {
            println!("  {failure}");
        }
    }
    for failure in &bulk.failures {
        println!("step failed: {failure}");
    }
    let totals = bulk.totals();
    println!(
        "bulk import: {} processed, {} step(s) failed",
        totals.processed(),
        bulk.failures.len()
    );
    if dry_run {
        println!("DRY-RUN: no changes were written");
    }
}

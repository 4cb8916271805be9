//! Ordered multi-file import used at service start-up and by `pt-jobs bulk`.
//!
//! Employers go first so later job and invoice rows can reference them.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use super::engine::RecordImporter;
use super::schema::{ImportOptions, StatusMode};
use super::stats::{ImportReport, ImportStats};
use super::ImportError;
use crate::notify::Notifier;
use crate::records::{EntityKind, RecordStore};

/// One importer invocation within a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkStep {
    pub entity: EntityKind,
    pub sources: Vec<PathBuf>,
    pub status: Option<StatusMode>,
}

impl BulkStep {
    pub fn new(entity: EntityKind, sources: Vec<PathBuf>, status: Option<StatusMode>) -> Self {
        Self {
            entity,
            sources,
            status,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BulkPlan {
    steps: Vec<BulkStep>,
}

/// Per-step reports in plan order. A step whose sources could not be read is
/// recorded as a failure and the plan moves on.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkReport {
    pub reports: Vec<ImportReport>,
    pub failures: Vec<String>,
}

impl BulkReport {
    pub fn totals(&self) -> ImportStats {
        let mut totals = ImportStats::default();
        for report in &self.reports {
            totals.merge(report.stats.clone());
        }
        totals
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl BulkPlan {
    pub fn new(steps: Vec<BulkStep>) -> Self {
        Self { steps }
    }

    /// The legacy export layout under `base`:
    /// employers, job seekers, jobs, then invoices.
    pub fn standard(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        let file = |name: &str| base.join(name);

        Self::new(vec![
            BulkStep::new(
                EntityKind::Employer,
                vec![file("employers.csv")],
                Some(StatusMode::Active),
            ),
            BulkStep::new(
                EntityKind::Employer,
                vec![file("employers_deactivated.csv")],
                Some(StatusMode::Inactive),
            ),
            BulkStep::new(
                EntityKind::Employer,
                vec![file("employers_pending.csv")],
                Some(StatusMode::Pending),
            ),
            BulkStep::new(
                EntityKind::JobSeeker,
                vec![file("jobseekers_active.csv")],
                Some(StatusMode::Active),
            ),
            BulkStep::new(
                EntityKind::JobSeeker,
                vec![file("jobseekers_inactive.csv")],
                Some(StatusMode::Inactive),
            ),
            // Pending job seekers are imported with login blocked.
            BulkStep::new(
                EntityKind::JobSeeker,
                vec![file("jobseekers_pending.csv")],
                Some(StatusMode::Inactive),
            ),
            BulkStep::new(
                EntityKind::Job,
                vec![file("jobs_active.csv"), file("jobs_expired.csv")],
                None,
            ),
            BulkStep::new(EntityKind::Invoice, vec![file("invoices.csv")], None),
        ])
    }

    pub fn steps(&self) -> &[BulkStep] {
        &self.steps
    }

    /// Run every step in order. A dry run stages all steps inside one
    /// plan-wide transaction, so jobs and invoices resolve employers created
    /// earlier in the plan, and discards it at the end.
    pub fn run<S>(
        &self,
        store: &S,
        notifier: Option<&dyn Notifier>,
        options: &ImportOptions,
    ) -> BulkReport
    where
        S: RecordStore + ?Sized,
    {
        let mut bulk = BulkReport::default();
        info!(steps = self.steps.len(), dry_run = options.dry_run, "bulk import starting");

        if options.dry_run {
            if let Err(error) = store.begin() {
                warn!(%error, "could not open dry-run transaction");
                bulk.failures.push(format!("dry-run transaction: {error}"));
                return bulk;
            }
        }

        for step in &self.steps {
            let mut importer = RecordImporter::new(step.entity, store);
            if let Some(notifier) = notifier {
                importer = importer.with_notifier(notifier);
            }
            let step_options = ImportOptions {
                status: step.status,
                ..options.clone()
            };

            match importer.import_paths_staged(&step.sources, &step_options) {
                Ok(report) => {
                    info!("{}", report.summary_line());
                    bulk.reports.push(report);
                }
                Err(error) => {
                    warn!(entity = %step.entity, %error, "bulk import step failed");
                    bulk.failures.push(step_failure(step, &error));
                }
            }
        }

        if options.dry_run {
            match store.rollback() {
                Ok(()) => info!("DRY-RUN: bulk import rolled back"),
                Err(error) => {
                    warn!(%error, "dry-run rollback failed");
                    bulk.failures.push(format!("dry-run rollback: {error}"));
                }
            }
        }

        info!(
            steps = self.steps.len(),
            failed = bulk.failures.len(),
            "bulk import finished"
        );
        bulk
    }
}

fn step_failure(step: &BulkStep, error: &ImportError) -> String {
    format!("[{}] {}", step.entity, error)
}

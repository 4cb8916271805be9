use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{NaiveDate, NaiveDateTime};
use pt_jobs::imports::{
    ImportError, ImportOptions, ImportReport, RecordImporter, SourceError, StatusMode,
};
use pt_jobs::notify::MemoryNotifier;
use pt_jobs::records::{
    Criterion, EntityKind, FieldValue, Fields, MemoryStore, Record, RecordId, RecordStore,
    StoreError,
};

fn clock() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 2, 14)
        .and_then(|date| date.and_hms_opt(10, 0, 0))
        .expect("valid timestamp")
}

fn seed_employer(store: &MemoryStore, email: &str, company: &str) -> Record {
    let mut fields = Fields::new();
    fields.insert("email".to_string(), FieldValue::from(email));
    fields.insert("company_name".to_string(), FieldValue::from(company));
    fields.insert("contact_name".to_string(), FieldValue::from(company));
    fields.insert("phone".to_string(), FieldValue::from("555-0100"));
    fields.insert("is_approved".to_string(), FieldValue::Bool(true));
    fields.insert("login_active".to_string(), FieldValue::Bool(true));
    store
        .insert(EntityKind::Employer, fields)
        .expect("seed employer")
}

fn import_employers(store: &MemoryStore, csv: &str, options: &ImportOptions) -> ImportReport {
    RecordImporter::new(EntityKind::Employer, store)
        .with_clock(clock())
        .import_reader("employers.csv", csv.as_bytes(), options)
        .expect("import succeeds")
}

/// Delegating store that counts every call so tests can prove a row never
/// reached storage.
#[derive(Default)]
struct CountingStore {
    inner: MemoryStore,
    calls: AtomicUsize,
}

impl CountingStore {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl RecordStore for CountingStore {
    fn find(
        &self,
        entity: EntityKind,
        field: &str,
        criterion: &Criterion,
    ) -> Result<Vec<Record>, StoreError> {
        self.touch();
        self.inner.find(entity, field, criterion)
    }

    fn get(&self, entity: EntityKind, id: RecordId) -> Result<Option<Record>, StoreError> {
        self.touch();
        self.inner.get(entity, id)
    }

    fn all(&self, entity: EntityKind) -> Result<Vec<Record>, StoreError> {
        self.touch();
        self.inner.all(entity)
    }

    fn insert(&self, entity: EntityKind, fields: Fields) -> Result<Record, StoreError> {
        self.touch();
        self.inner.insert(entity, fields)
    }

    fn update(
        &self,
        entity: EntityKind,
        id: RecordId,
        changes: Fields,
    ) -> Result<Record, StoreError> {
        self.touch();
        self.inner.update(entity, id, changes)
    }

    fn begin(&self) -> Result<(), StoreError> {
        self.touch();
        self.inner.begin()
    }

    fn commit(&self) -> Result<(), StoreError> {
        self.touch();
        self.inner.commit()
    }

    fn rollback(&self) -> Result<(), StoreError> {
        self.touch();
        self.inner.rollback()
    }
}

#[test]
fn two_row_batch_updates_known_and_creates_unknown() {
    let store = MemoryStore::new();
    let seeded = seed_employer(&store, "a@clinic.ca", "Alpha Physio");

    let csv = "Email,Phone,Company Name\nA@Clinic.ca,555-0199,\nb@clinic.ca,,Beta Rehab\n";
    let report = import_employers(&store, csv, &ImportOptions::default());

    assert_eq!(
        report.summary_line(),
        "[employers] created=1 updated=1 skipped=0 errors=0 truncated=0"
    );

    let updated = store
        .get(EntityKind::Employer, seeded.id)
        .expect("lookup")
        .expect("record A still present");
    assert_eq!(updated.text("phone"), Some("555-0199"));
    assert_eq!(updated.text("company_name"), Some("Alpha Physio"));
    assert_eq!(updated.text("contact_name"), Some("Alpha Physio"));
    assert_eq!(updated.get("is_approved"), Some(&FieldValue::Bool(true)));

    let created = store
        .find(
            EntityKind::Employer,
            "email",
            &Criterion::EqualsIgnoreCase("b@clinic.ca".to_string()),
        )
        .expect("find")
        .pop()
        .expect("record B created");
    assert_eq!(created.text("company_name"), Some("Beta Rehab"));
    assert_eq!(created.text("contact_name"), Some("Beta Rehab"));
    assert_eq!(created.text("phone"), Some(""));
    assert_eq!(created.get("is_approved"), Some(&FieldValue::Bool(true)));
    assert_eq!(created.get("login_active"), Some(&FieldValue::Bool(true)));
}

#[test]
fn repeating_an_import_is_idempotent() {
    let store = MemoryStore::new();
    let csv = "Email,Company\nhr@north.ca,Northside\nhr@south.ca,Southside\n";

    let first = import_employers(&store, csv, &ImportOptions::default());
    assert_eq!((first.stats.created, first.stats.updated), (2, 0));
    let after_first = store.snapshot();

    let second = import_employers(&store, csv, &ImportOptions::default());
    assert_eq!((second.stats.created, second.stats.updated), (0, 2));
    assert_eq!(store.snapshot(), after_first);
}

#[test]
fn dry_run_reports_without_writing() {
    let store = MemoryStore::new();
    seed_employer(&store, "a@clinic.ca", "Alpha Physio");
    let before = store.snapshot();

    let options = ImportOptions {
        dry_run: true,
        ..ImportOptions::default()
    };
    let csv = "Email,Phone\na@clinic.ca,555-0199\nnew@clinic.ca,555-0111\n";
    let report = import_employers(&store, csv, &options);

    assert!(report.dry_run);
    assert_eq!((report.stats.created, report.stats.updated), (1, 1));
    assert_eq!(store.snapshot(), before);

    let dir = tempfile::tempdir().expect("temp dir");
    store
        .save(dir.path().join("store.json"))
        .expect("no transaction left open");
}

#[test]
fn canonical_header_wins_over_alias() {
    let store = MemoryStore::new();
    let csv = "Email Address,email,Company\nalias@x.ca,canonical@x.ca,Clinic\n";
    import_employers(&store, csv, &ImportOptions::default());

    let records = store.all(EntityKind::Employer).expect("all");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].text("email"), Some("canonical@x.ca"));
}

#[test]
fn ambiguous_match_updates_nothing() {
    let store = MemoryStore::new();
    let first = seed_employer(&store, "dup@clinic.ca", "First");
    let second = seed_employer(&store, "dup@clinic.ca", "Second");

    let csv = "Email,Company\ndup@clinic.ca,Third\n";
    let report = import_employers(&store, csv, &ImportOptions::default());

    assert_eq!((report.stats.created, report.stats.updated), (1, 0));
    for seeded in [first, second] {
        let stored = store
            .get(EntityKind::Employer, seeded.id)
            .expect("lookup")
            .expect("present");
        assert_eq!(stored, seeded);
    }
}

#[test]
fn over_long_values_are_truncated_and_counted() {
    let store = MemoryStore::new();
    let phone = "5".repeat(60);
    let csv = format!("Email,Phone\nlong@clinic.ca,{phone}\n");
    let report = import_employers(&store, &csv, &ImportOptions::default());

    assert_eq!(report.stats.truncated, 1);
    let record = store.all(EntityKind::Employer).expect("all").remove(0);
    assert_eq!(record.text("phone"), Some("5".repeat(50).as_str()));
}

#[test]
fn rows_without_required_field_never_reach_the_store() {
    let store = CountingStore::default();
    let csv = "Email,Company,Phone,Website,City\n,Orphan Clinic,555-0100,orphan.ca,Halifax\n";

    let report = RecordImporter::new(EntityKind::Employer, &store)
        .import_reader("employers.csv", csv.as_bytes(), &ImportOptions::default())
        .expect("import succeeds");

    assert_eq!(report.stats.skipped, 1);
    assert_eq!(report.stats.created + report.stats.updated + report.stats.errors, 0);
    assert_eq!(store.calls(), 0);
}

#[test]
fn missing_required_column_aborts_before_any_row() {
    let store = MemoryStore::new();
    let error = RecordImporter::new(EntityKind::Employer, &store)
        .import_reader(
            "employers.csv",
            "Company,Phone\nNorthside,555-0100\n".as_bytes(),
            &ImportOptions::default(),
        )
        .expect_err("missing email column");

    match error {
        ImportError::Source(SourceError::MissingColumns { missing, found, .. }) => {
            assert_eq!(missing, vec!["email".to_string()]);
            assert_eq!(found, vec!["Company".to_string(), "Phone".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(store.snapshot().is_empty());
}

#[test]
fn missing_file_aborts_whole_batch() {
    let dir = tempfile::tempdir().expect("temp dir");
    let present = dir.path().join("employers.csv");
    std::fs::write(&present, "Email\nhr@clinic.ca\n").expect("write csv");
    let absent = dir.path().join("employers_pending.csv");

    let store = MemoryStore::new();
    let error = RecordImporter::new(EntityKind::Employer, &store)
        .import_paths(&[present, absent], &ImportOptions::default())
        .expect_err("missing source");

    assert!(matches!(error, ImportError::Source(SourceError::NotFound { .. })));
    assert!(store.snapshot().is_empty());
}

#[test]
fn row_write_failure_is_isolated() {
    let store = MemoryStore::new().with_unique_field(EntityKind::Employer, "company_name");
    let csv = "Email,Company\na@x.ca,Alpha\nb@x.ca,alpha\nc@x.ca,Gamma\n";
    let report = import_employers(&store, csv, &ImportOptions::default());

    assert_eq!(report.stats.created, 2);
    assert_eq!(report.stats.errors, 1);
    assert_eq!(report.stats.skipped, 1);
    assert_eq!(report.stats.failures.len(), 1);
    assert_eq!(report.stats.failures[0].row, 3);
    assert_eq!(store.count(EntityKind::Employer), 2);
}

#[test]
fn status_is_detected_from_file_name() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("employers_pending.csv");
    std::fs::write(&path, "Employer Email,Company Name\npending@clinic.ca,Waiting Room\n")
        .expect("write csv");

    let store = MemoryStore::new();
    RecordImporter::new(EntityKind::Employer, &store)
        .import_paths(&[path], &ImportOptions::default())
        .expect("import succeeds");

    let record = store.all(EntityKind::Employer).expect("all").remove(0);
    assert_eq!(record.get("is_approved"), Some(&FieldValue::Bool(false)));
    assert_eq!(record.get("login_active"), Some(&FieldValue::Bool(true)));
}

#[test]
fn update_only_status_run_skips_unknown_rows() {
    let store = MemoryStore::new();
    let known = seed_employer(&store, "known@clinic.ca", "Known");

    let options = ImportOptions {
        status: Some(StatusMode::Inactive),
        allow_create: false,
        ..ImportOptions::default()
    };
    let csv = "Employer Email\nknown@clinic.ca\nstranger@clinic.ca\n";
    let report = import_employers(&store, csv, &options);

    assert_eq!((report.stats.updated, report.stats.skipped), (1, 1));
    assert_eq!(store.count(EntityKind::Employer), 1);
    let record = store
        .get(EntityKind::Employer, known.id)
        .expect("lookup")
        .expect("present");
    assert_eq!(record.get("is_approved"), Some(&FieldValue::Bool(false)));
    assert_eq!(record.get("login_active"), Some(&FieldValue::Bool(false)));
}

#[test]
fn limit_caps_processed_rows() {
    let store = MemoryStore::new();
    let options = ImportOptions {
        limit: Some(2),
        ..ImportOptions::default()
    };
    let csv = "Email\none@x.ca\ntwo@x.ca\nthree@x.ca\n";
    let report = import_employers(&store, csv, &options);

    assert_eq!(report.stats.processed(), 2);
    assert_eq!(store.count(EntityKind::Employer), 2);
}

#[test]
fn new_accounts_notify_admin_once() {
    let store = MemoryStore::new();
    seed_employer(&store, "old@clinic.ca", "Old Clinic");
    let notifier = MemoryNotifier::default();

    let csv = "Email,Company\nold@clinic.ca,Old Clinic\nnew@clinic.ca,New Clinic\n";
    RecordImporter::new(EntityKind::Employer, &store)
        .with_notifier(&notifier)
        .import_reader("employers.csv", csv.as_bytes(), &ImportOptions::default())
        .expect("import succeeds");

    let events = notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].entity, EntityKind::Employer);
    assert_eq!(events[0].label, "New Clinic");

    let dry_run = ImportOptions {
        dry_run: true,
        ..ImportOptions::default()
    };
    RecordImporter::new(EntityKind::Employer, &store)
        .with_notifier(&notifier)
        .import_reader("employers.csv", "Email\nghost@clinic.ca\n".as_bytes(), &dry_run)
        .expect("dry run succeeds");
    assert_eq!(notifier.events().len(), 1);
}

#[test]
fn dry_run_counts_repeated_keys_like_a_live_run() {
    let csv = "Email,Company\nsame@x.ca,First Listing\nSAME@x.ca,Second Listing\nother@x.ca,Other\n";

    let rehearsal_store = MemoryStore::new();
    let rehearsal = import_employers(
        &rehearsal_store,
        csv,
        &ImportOptions {
            dry_run: true,
            ..ImportOptions::default()
        },
    );
    assert!(rehearsal_store.snapshot().is_empty());

    let live_store = MemoryStore::new();
    let live = import_employers(&live_store, csv, &ImportOptions::default());

    assert_eq!((live.stats.created, live.stats.updated), (2, 1));
    assert_eq!(rehearsal.stats, live.stats);
    assert_eq!(live_store.count(EntityKind::Employer), 2);
}

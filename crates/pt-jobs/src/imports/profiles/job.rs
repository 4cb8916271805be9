use super::{resolved_text, COMPENSATION_TYPES, JOB_TYPES};
use crate::imports::headers::FieldAliasTable;
use crate::imports::schema::{
    EntityConfig, EntitySchema, FieldDefault, FieldKind, FieldSpec, ImportContext, MatchKey,
    Reference,
};
use crate::imports::source::ImportRow;
use crate::records::{EntityKind, FieldValue, Fields};

const ALIASES: &[(&str, &[&str])] = &[
    ("job_id", &["job id", "id", "job number"]),
    (
        "employer_email",
        &["employer email", "employer contact email", "employer"],
    ),
    ("title", &["job title", "position", "position title"]),
    ("description", &["job description", "details", "job details"]),
    ("location", &["job location", "city/province"]),
    ("city", &["town"]),
    ("state", &["province", "region"]),
    ("country", &["nation"]),
    ("job_type", &["job type", "type", "employment type"]),
    (
        "compensation_type",
        &["salary period", "compensation type", "salary type", "pay type"],
    ),
    (
        "salary_min",
        &["salary from", "salary min", "min salary", "min pay"],
    ),
    ("salary_max", &["salary to", "salary max", "max salary", "max pay"]),
    (
        "relocation_assistance",
        &[
            "relocation assistance provided?",
            "relocation assistance",
            "relocation",
            "is relocation assistance provided",
        ],
    ),
    ("posting_date", &["posting date", "posted", "date posted"]),
    (
        "expiry_date",
        &["expiration date", "expiry date", "expires", "date expires"],
    ),
    (
        "application_email",
        &["apply email", "application email", "apply via email"],
    ),
    (
        "external_apply_url",
        &["apply url", "application url", "external apply url", "apply link"],
    ),
    ("apply_via", &["apply via"]),
    ("is_active", &["is active", "active"]),
    ("status", &["job status", "posting status"]),
    ("view_count", &["views", "view count", "views count"]),
];

/// Columns every jobs file must carry. Only the id and employer must hold a
/// value; blank titles and descriptions are imported as-is.
const REQUIRED_COLUMNS: &[&str] = &["job_id", "employer_email", "title", "description"];
const REQUIRED: &[&str] = &["job_id", "employer_email"];

pub(super) fn config() -> EntityConfig {
    EntityConfig {
        entity: EntityKind::Job,
        aliases: FieldAliasTable::new(ALIASES),
        schema: EntitySchema::new(vec![
            FieldSpec::new("job_id", FieldKind::Integer),
            FieldSpec::text("title").max_length(180),
            FieldSpec::text("description"),
            FieldSpec::text("location").max_length(180),
            FieldSpec::new("job_type", FieldKind::Choice(&JOB_TYPES)),
            FieldSpec::new("compensation_type", FieldKind::Choice(&COMPENSATION_TYPES)),
            FieldSpec::new("salary_min", FieldKind::Decimal),
            FieldSpec::new("salary_max", FieldKind::Decimal),
            FieldSpec::new("relocation_assistance", FieldKind::Boolean),
            FieldSpec::new("posting_date", FieldKind::Date).default_to(FieldDefault::Now),
            FieldSpec::new("expiry_date", FieldKind::Date),
            FieldSpec::new("application_email", FieldKind::Email),
            FieldSpec::text("external_apply_url").max_length(200),
            FieldSpec::text("apply_via").max_length(10),
            FieldSpec::new("is_active", FieldKind::Boolean).default_value(true),
            FieldSpec::new("view_count", FieldKind::Integer).default_value(0i64),
            FieldSpec::text("source").default_value("import"),
        ]),
        match_key: MatchKey {
            field: "job_id",
            loose: false,
        },
        required: REQUIRED.to_vec(),
        required_columns: REQUIRED_COLUMNS.to_vec(),
        references: vec![Reference {
            source: "employer_email",
            target: EntityKind::Employer,
            target_field: "email",
            store_as: "employer_id",
            loose: false,
        }],
        derive: Some(derive),
        notify_on_create: false,
        label_field: "title",
    }
}

fn derive(resolved: &ImportRow, fields: &mut Fields, ctx: &ImportContext<'_>) {
    if !fields.contains_key("location") {
        let parts: Vec<&str> = ["city", "state", "country"]
            .into_iter()
            .filter_map(|column| resolved_text(resolved, column))
            .collect();
        if !parts.is_empty() {
            fields.insert("location".to_string(), FieldValue::from(parts.join(", ")));
        }
    }

    if !fields.contains_key("apply_via") {
        let via = if fields.contains_key("application_email") {
            Some("email")
        } else if fields.contains_key("external_apply_url") {
            Some("url")
        } else {
            None
        };
        if let Some(via) = via {
            fields.insert("apply_via".to_string(), FieldValue::from(via));
        }
    }

    if let Some(mode) = ctx.row_status(resolved, "status") {
        fields.insert("is_active".to_string(), FieldValue::Bool(mode.is_live()));
    }

    fields.insert("source".to_string(), FieldValue::from("import"));
}

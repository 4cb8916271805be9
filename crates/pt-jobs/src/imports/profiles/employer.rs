use super::apply_account_status;
use crate::imports::headers::FieldAliasTable;
use crate::imports::schema::{
    EntityConfig, EntitySchema, FieldKind, FieldSpec, ImportContext, MatchKey,
};
use crate::imports::source::ImportRow;
use crate::records::{EntityKind, Fields};

const ALIASES: &[(&str, &[&str])] = &[
    (
        "email",
        &[
            "email address",
            "email_address",
            "employer_email",
            "employer email",
            "contact email",
            "e-mail",
            "mail",
        ],
    ),
    (
        "company_name",
        &[
            "company name",
            "company",
            "name",
            "clinic",
            "employer",
            "organization",
            "business",
        ],
    ),
    ("contact_name", &["contact name", "contact", "contact person"]),
    (
        "phone",
        &["phone number", "phone_number", "tel", "telephone", "mobile", "cell"],
    ),
    ("website", &["website url", "url", "site", "web", "homepage"]),
    (
        "location",
        &["city", "province", "city/province", "region", "address"],
    ),
    (
        "description",
        &[
            "company_description",
            "company description",
            "about",
            "about_company",
            "bio",
            "summary",
        ],
    ),
    ("is_approved", &["approved", "is approved"]),
    ("login_active", &["login active", "can login"]),
    ("status", &["account status", "employer status"]),
];

pub(super) fn config() -> EntityConfig {
    EntityConfig {
        entity: EntityKind::Employer,
        aliases: FieldAliasTable::new(ALIASES),
        schema: EntitySchema::new(vec![
            FieldSpec::new("email", FieldKind::Email),
            FieldSpec::text("contact_name").max_length(120),
            FieldSpec::text("company_name").max_length(180),
            FieldSpec::text("phone").max_length(50),
            FieldSpec::text("website").max_length(200),
            FieldSpec::text("location").max_length(180),
            FieldSpec::text("description"),
            FieldSpec::new("is_approved", FieldKind::Boolean).default_value(true),
            FieldSpec::new("login_active", FieldKind::Boolean).default_value(true),
        ]),
        match_key: MatchKey {
            field: "email",
            loose: false,
        },
        required: vec!["email"],
        required_columns: vec!["email"],
        references: Vec::new(),
        derive: Some(derive),
        notify_on_create: true,
        label_field: "company_name",
    }
}

/// The contact name mirrors the company name unless one was given.
fn derive(resolved: &ImportRow, fields: &mut Fields, ctx: &ImportContext<'_>) {
    if !fields.contains_key("contact_name") {
        if let Some(company) = fields.get("company_name").cloned() {
            fields.insert("contact_name".to_string(), company);
        }
    }
    apply_account_status(resolved, fields, ctx);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imports::schema::{ImportOptions, StatusMode};
    use crate::records::FieldValue;
    use chrono::NaiveDate;

    fn prepare(row: ImportRow, options: &ImportOptions, source: &str) -> Fields {
        let config = config();
        let now = NaiveDate::from_ymd_opt(2026, 1, 5)
            .and_then(|date| date.and_hms_opt(8, 0, 0))
            .expect("valid timestamp");
        let ctx = ImportContext::new(options, source, now);
        let resolved = crate::imports::headers::resolve_headers(&row, &config.aliases);
        let mut fields = Fields::new();
        for spec in config.schema.fields() {
            if let Some(raw) = resolved.get(spec.name) {
                fields.insert(spec.name.to_string(), spec.normalize(raw, &ctx));
            }
        }
        derive(&resolved, &mut fields, &ctx);
        fields
    }

    #[test]
    fn contact_name_mirrors_company_name() {
        let row = ImportRow::from_pairs([("Email", "HR@Clinic.ca"), ("Clinic", "Northside Physio")]);
        let fields = prepare(row, &ImportOptions::default(), "employers.csv");
        assert_eq!(fields.get("email"), Some(&FieldValue::from("hr@clinic.ca")));
        assert_eq!(
            fields.get("contact_name"),
            Some(&FieldValue::from("Northside Physio"))
        );
    }

    #[test]
    fn bare_name_header_is_the_company() {
        let row = ImportRow::from_pairs([
            ("Email", "hr@clinic.ca"),
            ("Name", "Harbour Clinic"),
            ("Contact", "Dana Reid"),
        ]);
        let fields = prepare(row, &ImportOptions::default(), "employers.csv");
        assert_eq!(
            fields.get("company_name"),
            Some(&FieldValue::from("Harbour Clinic"))
        );
        assert_eq!(fields.get("contact_name"), Some(&FieldValue::from("Dana Reid")));
    }

    #[test]
    fn pending_file_sets_login_without_approval() {
        let row = ImportRow::from_pairs([("Email", "hr@clinic.ca")]);
        let fields = prepare(row, &ImportOptions::default(), "employers_pending.csv");
        assert_eq!(fields.get("is_approved"), Some(&FieldValue::Bool(false)));
        assert_eq!(fields.get("login_active"), Some(&FieldValue::Bool(true)));
    }

    #[test]
    fn no_status_signal_leaves_flags_unset() {
        let row = ImportRow::from_pairs([("Email", "hr@clinic.ca")]);
        let options = ImportOptions {
            status: Some(StatusMode::Infer),
            ..ImportOptions::default()
        };
        let fields = prepare(row, &options, "employers.csv");
        assert!(!fields.contains_key("is_approved"));
        assert!(!fields.contains_key("login_active"));
    }
}

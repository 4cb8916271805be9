use super::{apply_account_status, resolved_text, JOB_TYPES, REGISTRATION_STATUSES};
use crate::imports::headers::FieldAliasTable;
use crate::imports::normalize::split_full_name;
use crate::imports::schema::{
    EntityConfig, EntitySchema, FieldDefault, FieldKind, FieldSpec, ImportContext, MatchKey,
};
use crate::imports::source::ImportRow;
use crate::records::{EntityKind, FieldValue, Fields};

const ALIASES: &[(&str, &[&str])] = &[
    ("email", &["email address", "e-mail", "mail"]),
    ("first_name", &["first name", "firstname", "given name"]),
    ("last_name", &["last name", "lastname", "surname", "family name"]),
    ("full_name", &["full name", "name"]),
    ("position_desired", &["position desired", "desired position"]),
    (
        "registration_status",
        &[
            "registration status",
            "are you a registered professional in canada?",
            "are you a registered professional in canada",
            "registered status",
            "registration",
            "reg status",
            "registered in canada",
        ],
    ),
    (
        "opportunity_type",
        &[
            "what type of opportunity are you interested in?",
            "opportunity type",
            "job type",
            "interested in",
            "type of opportunity",
        ],
    ),
    (
        "current_location",
        &[
            "where are you currently located?",
            "current location",
            "city",
            "city/province",
            "location",
        ],
    ),
    (
        "open_to_relocation",
        &[
            "are you open to relocating?",
            "open to relocating",
            "open to relocation",
            "relocation open",
        ],
    ),
    (
        "relocation_where",
        &[
            "if yes, where?",
            "relocation where",
            "if yes where",
            "preferred relocation",
        ],
    ),
    (
        "need_sponsorship",
        &[
            "do you require sponsorship to work in canada?",
            "need sponsorship",
            "require sponsorship",
        ],
    ),
    (
        "seeking_immigration",
        &[
            "are you seeking immigration to canada?",
            "seeking immigration",
            "immigration",
        ],
    ),
    (
        "registered_at",
        &["registration date", "registered at", "created at", "created"],
    ),
    ("is_approved", &["approved", "is approved"]),
    ("login_active", &["login active", "can login"]),
    ("approved_at", &["approved at", "approval date"]),
    ("status", &["account status"]),
];

pub(super) fn config() -> EntityConfig {
    EntityConfig {
        entity: EntityKind::JobSeeker,
        aliases: FieldAliasTable::new(ALIASES),
        schema: EntitySchema::new(vec![
            FieldSpec::new("email", FieldKind::Email),
            FieldSpec::text("first_name").max_length(80),
            FieldSpec::text("last_name").max_length(80),
            FieldSpec::text("position_desired").max_length(180),
            FieldSpec::new("registration_status", FieldKind::Choice(&REGISTRATION_STATUSES))
                .default_value("no"),
            FieldSpec::new("opportunity_type", FieldKind::Choice(&JOB_TYPES)),
            FieldSpec::text("current_location").max_length(180),
            FieldSpec::new("open_to_relocation", FieldKind::Boolean),
            FieldSpec::text("relocation_where").max_length(180),
            FieldSpec::new("need_sponsorship", FieldKind::Boolean),
            FieldSpec::new("seeking_immigration", FieldKind::Boolean),
            FieldSpec::new("registered_at", FieldKind::DateTime),
            FieldSpec::new("is_approved", FieldKind::Boolean).default_value(true),
            FieldSpec::new("login_active", FieldKind::Boolean).default_value(true),
            FieldSpec::new("approved_at", FieldKind::DateTime)
                .default_to(FieldDefault::Now)
                .write_once(),
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
        label_field: "email",
    }
}

fn derive(resolved: &ImportRow, fields: &mut Fields, ctx: &ImportContext<'_>) {
    if !fields.contains_key("first_name") && !fields.contains_key("last_name") {
        if let Some(full_name) = resolved_text(resolved, "full_name") {
            let (first, last) = split_full_name(full_name);
            fields.insert("first_name".to_string(), FieldValue::from(first));
            fields.insert("last_name".to_string(), FieldValue::from(last));
        }
    }

    apply_account_status(resolved, fields, ctx);

    if !fields.contains_key("approved_at") {
        match fields.get("is_approved").and_then(FieldValue::as_bool) {
            Some(true) => {
                fields.insert("approved_at".to_string(), FieldValue::DateTime(ctx.now));
            }
            Some(false) => {
                fields.insert("approved_at".to_string(), FieldValue::Null);
            }
            None => {}
        }
    }
}

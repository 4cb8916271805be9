use super::{INVOICE_STATUSES, PAYMENT_PROCESSORS};
use crate::imports::headers::FieldAliasTable;
use crate::imports::schema::{
    EntityConfig, EntitySchema, FieldDefault, FieldKind, FieldSpec, ImportContext, MatchKey,
    Reference,
};
use crate::imports::source::ImportRow;
use crate::records::{Amount, EntityKind, FieldValue, Fields};

const ALIASES: &[(&str, &[&str])] = &[
    (
        "invoice_number",
        &["invoice #", "invoice number", "invoice no", "invoice id", "invoice"],
    ),
    (
        "customer_name",
        &["customer name", "customer", "company name", "company", "employer"],
    ),
    ("amount", &["total", "invoice total", "amount due"]),
    ("currency", &["currency code"]),
    ("processor", &["payment method", "payment processor"]),
    ("status", &["invoice status", "payment status"]),
    ("order_date", &["date", "order date", "invoice date"]),
];

const REQUIRED: &[&str] = &["invoice_number", "customer_name"];

pub(super) fn config() -> EntityConfig {
    EntityConfig {
        entity: EntityKind::Invoice,
        aliases: FieldAliasTable::new(ALIASES),
        schema: EntitySchema::new(vec![
            FieldSpec::new("invoice_number", FieldKind::Integer),
            FieldSpec::new("amount", FieldKind::Decimal).default_value(FieldValue::Decimal(Amount::ZERO)),
            FieldSpec::text("currency")
                .max_length(10)
                .default_to(FieldDefault::FromContext(configured_currency)),
            FieldSpec::new("processor", FieldKind::Choice(&PAYMENT_PROCESSORS)).max_length(20),
            FieldSpec::new("status", FieldKind::Choice(&INVOICE_STATUSES))
                .max_length(20)
                .default_value("pending"),
            FieldSpec::new("order_date", FieldKind::DateTime).default_to(FieldDefault::Now),
        ]),
        match_key: MatchKey {
            field: "invoice_number",
            loose: false,
        },
        required: REQUIRED.to_vec(),
        required_columns: REQUIRED.to_vec(),
        references: vec![Reference {
            source: "customer_name",
            target: EntityKind::Employer,
            target_field: "company_name",
            store_as: "employer_id",
            loose: true,
        }],
        derive: Some(derive),
        notify_on_create: false,
        label_field: "invoice_number",
    }
}

fn configured_currency(ctx: &ImportContext<'_>) -> FieldValue {
    FieldValue::from(ctx.options.currency.trim().to_uppercase())
}

fn derive(_resolved: &ImportRow, fields: &mut Fields, _ctx: &ImportContext<'_>) {
    if let Some(FieldValue::Text(currency)) = fields.get_mut("currency") {
        *currency = currency.to_uppercase();
    }
}

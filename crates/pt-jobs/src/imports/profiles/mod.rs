//! Built-in import profiles for the four job-board record kinds.

mod employer;
mod invoice;
mod job;
mod jobseeker;

use super::normalize::ChoiceTable;
use super::schema::{EntityConfig, ImportContext};
use super::source::ImportRow;
use super::headers::is_blank;
use crate::records::{EntityKind, FieldValue, Fields};

pub fn config(entity: EntityKind) -> EntityConfig {
    match entity {
        EntityKind::Employer => employer::config(),
        EntityKind::Job => job::config(),
        EntityKind::JobSeeker => jobseeker::config(),
        EntityKind::Invoice => invoice::config(),
    }
}

pub fn all() -> Vec<EntityConfig> {
    EntityKind::ALL.into_iter().map(config).collect()
}

/// Employment type spellings; canonical codes are keys too so exports re-import.
pub static JOB_TYPES: ChoiceTable = ChoiceTable::exact(&[
    ("full time", "full_time"),
    ("full-time", "full_time"),
    ("fulltime", "full_time"),
    ("full_time", "full_time"),
    ("part time", "part_time"),
    ("part-time", "part_time"),
    ("parttime", "part_time"),
    ("part_time", "part_time"),
    ("contract", "contractor"),
    ("contractor", "contractor"),
    ("casual", "casual"),
    ("locum", "locum"),
    ("temporary", "temporary"),
    ("resident", "resident"),
    ("intern", "intern"),
]);

/// Salary period, matched by substring in table order.
pub static COMPENSATION_TYPES: ChoiceTable = ChoiceTable::contains(&[
    ("hour", "hourly"),
    ("year", "yearly"),
    ("annual", "yearly"),
    ("percent", "split"),
    ("split", "split"),
    ("hr", "hourly"),
]);

pub static REGISTRATION_STATUSES: ChoiceTable = ChoiceTable::exact(&[
    ("yes", "yes"),
    ("no", "no"),
    ("canadian new grad", "new_grad"),
    ("new grad", "new_grad"),
    ("new_grad", "new_grad"),
    ("credentialed", "credentialed"),
    ("completed credentialing", "credentialed"),
    ("completed written pce", "pce_written"),
    ("pce written", "pce_written"),
    ("pce_written", "pce_written"),
]);

pub static PAYMENT_PROCESSORS: ChoiceTable = ChoiceTable::exact(&[
    ("stripe", "stripe"),
    ("paypal", "paypal"),
    ("manual", "manual"),
]);

pub static INVOICE_STATUSES: ChoiceTable = ChoiceTable::exact(&[
    ("paid", "paid"),
    ("pending", "pending"),
    ("failed", "failed"),
    ("refunded", "refunded"),
    ("void", "void"),
]);

/// Set approval and login flags from the source's status mode or the row's
/// status column. Rows with neither keep whatever the columns or defaults say.
fn apply_account_status(resolved: &ImportRow, fields: &mut Fields, ctx: &ImportContext<'_>) {
    if let Some(mode) = ctx.row_status(resolved, "status") {
        let (approved, login) = mode.account_flags();
        fields.insert("is_approved".to_string(), FieldValue::Bool(approved));
        fields.insert("login_active".to_string(), FieldValue::Bool(login));
    }
}

fn resolved_text<'r>(resolved: &'r ImportRow, column: &str) -> Option<&'r str> {
    resolved
        .get(column)
        .map(str::trim)
        .filter(|value| !is_blank(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imports::normalize::to_enumerated;

    #[test]
    fn every_alias_table_validates() {
        for profile in all() {
            profile
                .aliases
                .validate()
                .unwrap_or_else(|err| panic!("{} aliases invalid: {err}", profile.entity));
        }
    }

    #[test]
    fn required_fields_are_declared_in_aliases() {
        for profile in all() {
            for field in profile.required.iter().chain(&profile.required_columns) {
                assert!(
                    profile.aliases.contains(field),
                    "{} requires undeclared field {field}",
                    profile.entity
                );
            }
        }
    }

    #[test]
    fn canonical_codes_map_to_themselves() {
        for table in [
            &JOB_TYPES,
            &COMPENSATION_TYPES,
            &REGISTRATION_STATUSES,
            &PAYMENT_PROCESSORS,
            &INVOICE_STATUSES,
        ] {
            for (_, code) in table.pairs {
                assert_eq!(to_enumerated(code, table, None), Some(*code));
            }
        }
    }
}

//! Job-board records and the store abstraction the importers write through.

mod memory;
mod store;
mod value;

pub use memory::MemoryStore;
pub use store::{Criterion, RecordStore, StoreError};
pub use value::{Amount, FieldValue};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Field name to value mapping carried by every record.
pub type Fields = BTreeMap<String, FieldValue>;

/// Record families handled by the bulk importers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Employer,
    Job,
    JobSeeker,
    Invoice,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Employer,
        EntityKind::Job,
        EntityKind::JobSeeker,
        EntityKind::Invoice,
    ];

    /// Plural label used in reports and log lines.
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Employer => "employers",
            EntityKind::Job => "jobs",
            EntityKind::JobSeeker => "jobseekers",
            EntityKind::Invoice => "invoices",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized: String = value
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect();

        match normalized.trim_end_matches('s') {
            "employer" => Ok(EntityKind::Employer),
            "job" => Ok(EntityKind::Job),
            "jobseeker" => Ok(EntityKind::JobSeeker),
            "invoice" => Ok(EntityKind::Invoice),
            _ => Err(format!(
                "unsupported record type '{value}'. Supported: employers, jobs, jobseekers, invoices"
            )),
        }
    }
}

/// Store-assigned identifier, unique across every entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub entity: EntityKind,
    pub fields: Fields,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_kind_accepts_common_spellings() {
        assert_eq!("employers".parse::<EntityKind>(), Ok(EntityKind::Employer));
        assert_eq!("Job".parse::<EntityKind>(), Ok(EntityKind::Job));
        assert_eq!("job-seekers".parse::<EntityKind>(), Ok(EntityKind::JobSeeker));
        assert_eq!("job_seeker".parse::<EntityKind>(), Ok(EntityKind::JobSeeker));
        assert_eq!("invoices".parse::<EntityKind>(), Ok(EntityKind::Invoice));
        assert!("packages".parse::<EntityKind>().is_err());
    }
}

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;

use super::headers::{is_blank, FieldAliasTable};
use super::normalize::{self, ChoiceTable};
use super::source::ImportRow;
use crate::records::{EntityKind, FieldValue, Fields};

/// Canonical type a field is normalized into.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    Text,
    /// Trimmed and lower-cased.
    Email,
    Boolean,
    Integer,
    Decimal,
    Date,
    /// Date-only input lands at noon.
    DateTime,
    Choice(&'static ChoiceTable),
}

/// Value used when a field is absent on create or its raw text cannot be parsed.
#[derive(Debug, Clone)]
pub enum FieldDefault {
    Null,
    /// Today for date fields, the import timestamp for datetime fields.
    Now,
    Value(FieldValue),
    FromContext(fn(&ImportContext<'_>) -> FieldValue),
}

impl FieldDefault {
    pub fn resolve(&self, kind: FieldKind, ctx: &ImportContext<'_>) -> FieldValue {
        match self {
            FieldDefault::Null => FieldValue::Null,
            FieldDefault::Now => match kind {
                FieldKind::Date => FieldValue::Date(ctx.now.date()),
                FieldKind::DateTime => FieldValue::DateTime(ctx.now),
                _ => FieldValue::Null,
            },
            FieldDefault::Value(value) => value.clone(),
            FieldDefault::FromContext(compute) => compute(ctx),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Character limit; longer values are truncated.
    pub max_length: Option<usize>,
    pub default: FieldDefault,
    /// Written on update only while the stored value is still null.
    pub write_once: bool,
}

impl FieldSpec {
    pub fn new(name: &'static str, kind: FieldKind) -> Self {
        let default = match kind {
            FieldKind::Text | FieldKind::Email | FieldKind::Choice(_) => {
                FieldDefault::Value(FieldValue::Text(String::new()))
            }
            FieldKind::Boolean => FieldDefault::Value(FieldValue::Bool(false)),
            _ => FieldDefault::Null,
        };
        Self {
            name,
            kind,
            max_length: None,
            default,
            write_once: false,
        }
    }

    pub fn text(name: &'static str) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn max_length(mut self, limit: usize) -> Self {
        self.max_length = Some(limit);
        self
    }

    pub fn default_to(mut self, default: FieldDefault) -> Self {
        self.default = default;
        self
    }

    pub fn default_value(self, value: impl Into<FieldValue>) -> Self {
        self.default_to(FieldDefault::Value(value.into()))
    }

    pub fn write_once(mut self) -> Self {
        self.write_once = true;
        self
    }

    /// Convert non-blank raw text into this field's canonical value.
    pub fn normalize(&self, raw: &str, ctx: &ImportContext<'_>) -> FieldValue {
        let fallback = || self.default.resolve(self.kind, ctx);
        let raw = raw.trim();

        match self.kind {
            FieldKind::Text => FieldValue::Text(raw.to_string()),
            FieldKind::Email => FieldValue::Text(raw.to_lowercase()),
            FieldKind::Boolean => {
                let default = fallback().as_bool().unwrap_or(false);
                FieldValue::Bool(normalize::to_boolean(raw, default))
            }
            FieldKind::Integer => normalize::parse_integer(raw)
                .map(FieldValue::Integer)
                .unwrap_or_else(fallback),
            FieldKind::Decimal => normalize::to_decimal(raw)
                .map(FieldValue::Decimal)
                .unwrap_or_else(fallback),
            FieldKind::Date => normalize::to_date(raw)
                .map(|parsed| FieldValue::Date(parsed.date()))
                .unwrap_or_else(fallback),
            FieldKind::DateTime => normalize::to_date(raw)
                .map(|parsed| FieldValue::DateTime(parsed.at_noon()))
                .unwrap_or_else(fallback),
            FieldKind::Choice(table) => normalize::to_enumerated(raw, table, None)
                .map(FieldValue::from)
                .unwrap_or_else(fallback),
        }
    }
}

/// Declared fields of one entity, in export column order.
#[derive(Debug, Clone)]
pub struct EntitySchema {
    fields: Vec<FieldSpec>,
}

impl EntitySchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }

    /// Every declared field at its default, the base a created record starts from.
    pub fn defaults(&self, ctx: &ImportContext<'_>) -> Fields {
        self.fields
            .iter()
            .map(|spec| (spec.name.to_string(), spec.default.resolve(spec.kind, ctx)))
            .collect()
    }
}

/// Natural key used to find the record a row targets.
#[derive(Debug, Clone)]
pub struct MatchKey {
    pub field: &'static str,
    /// Fall back to a unique case-insensitive substring match on text keys.
    pub loose: bool,
}

/// Lookup of a related record (e.g. the employer a job belongs to).
#[derive(Debug, Clone)]
pub struct Reference {
    /// Resolved column carrying the lookup value.
    pub source: &'static str,
    pub target: EntityKind,
    pub target_field: &'static str,
    /// Field that receives the related record's id.
    pub store_as: &'static str,
    pub loose: bool,
}

pub type DeriveFn = fn(&ImportRow, &mut Fields, &ImportContext<'_>);

/// Everything the generic engine needs to import one entity kind.
#[derive(Debug, Clone)]
pub struct EntityConfig {
    pub entity: EntityKind,
    pub aliases: FieldAliasTable,
    pub schema: EntitySchema,
    pub match_key: MatchKey,
    /// Fields that must hold a value after normalization.
    pub required: Vec<&'static str>,
    /// Canonical fields whose column must exist in every source.
    pub required_columns: Vec<&'static str>,
    pub references: Vec<Reference>,
    /// Cross-field rules run after per-field normalization.
    pub derive: Option<DeriveFn>,
    pub notify_on_create: bool,
    /// Display field used in notifications and log lines.
    pub label_field: &'static str,
}

impl EntityConfig {
    /// Whether `field` carries a usable value for this row.
    pub fn is_satisfied(&self, field: &str, resolved: &ImportRow, fields: &Fields) -> bool {
        if self.schema.field(field).is_some() {
            fields.get(field).is_some_and(|value| !value.is_blank())
        } else {
            resolved.get(field).is_some_and(|value| !is_blank(value))
        }
    }
}

/// Account or posting status applied to every row of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMode {
    Active,
    Inactive,
    Pending,
    Expired,
    /// Read each row's status column.
    Infer,
}

impl StatusMode {
    /// Mode implied by a source file name such as `employers_pending.csv`.
    pub fn detect(source_name: &str) -> Option<Self> {
        let name = source_name.to_ascii_lowercase();
        if name.contains("pending") {
            Some(StatusMode::Pending)
        } else if name.contains("inactive") || name.contains("deactivated") {
            Some(StatusMode::Inactive)
        } else if name.contains("expired") {
            Some(StatusMode::Expired)
        } else {
            None
        }
    }

    /// Mode described by free-form status text, e.g. `Not Active`.
    pub fn from_status_text(raw: &str) -> Self {
        let text = raw.trim().to_lowercase();
        if text.contains("not active") || text.contains("inactive") || text.contains("deactivated")
        {
            StatusMode::Inactive
        } else if text.contains("expired") {
            StatusMode::Expired
        } else if text.contains("pending") {
            StatusMode::Pending
        } else {
            StatusMode::Active
        }
    }

    /// `(is_approved, login_active)` for account records.
    pub fn account_flags(self) -> (bool, bool) {
        match self {
            StatusMode::Active | StatusMode::Infer => (true, true),
            StatusMode::Inactive | StatusMode::Expired => (false, false),
            StatusMode::Pending => (false, true),
        }
    }

    /// `is_active` for postings. Only an explicit inactive or expired status
    /// takes a posting down; pending postings stay visible.
    pub fn is_live(self) -> bool {
        !matches!(self, StatusMode::Inactive | StatusMode::Expired)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatusMode::Active => "active",
            StatusMode::Inactive => "inactive",
            StatusMode::Pending => "pending",
            StatusMode::Expired => "expired",
            StatusMode::Infer => "infer",
        }
    }
}

impl fmt::Display for StatusMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(StatusMode::Active),
            "inactive" | "deactivated" => Ok(StatusMode::Inactive),
            "pending" => Ok(StatusMode::Pending),
            "expired" => Ok(StatusMode::Expired),
            "infer" => Ok(StatusMode::Infer),
            other => Err(format!(
                "unknown status mode '{other}'. Expected active, inactive, pending, expired or infer"
            )),
        }
    }
}

/// Caller-controlled switches for one import invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    pub dry_run: bool,
    /// Overrides file-name detection for every source.
    pub status: Option<StatusMode>,
    /// Maximum data rows processed across all sources.
    pub limit: Option<usize>,
    /// Currency for invoice rows without one.
    pub currency: String,
    pub allow_create: bool,
    pub allow_update: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            status: None,
            limit: None,
            currency: "CAD".to_string(),
            allow_create: true,
            allow_update: true,
        }
    }
}

/// Per-source state handed to defaults and derive hooks.
#[derive(Debug, Clone)]
pub struct ImportContext<'a> {
    pub options: &'a ImportOptions,
    /// Explicit status for this source. `None` means infer from each row.
    pub status: Option<StatusMode>,
    pub now: NaiveDateTime,
}

impl<'a> ImportContext<'a> {
    pub fn new(options: &'a ImportOptions, source_name: &str, now: NaiveDateTime) -> Self {
        let status = options
            .status
            .or_else(|| StatusMode::detect(source_name))
            .filter(|mode| *mode != StatusMode::Infer);
        Self {
            options,
            status,
            now,
        }
    }

    /// Explicit mode, else the row's status text, else nothing.
    pub fn row_status(&self, resolved: &ImportRow, status_column: &str) -> Option<StatusMode> {
        self.status.or_else(|| {
            resolved
                .get(status_column)
                .filter(|value| !is_blank(value))
                .map(StatusMode::from_status_text)
        })
    }
}

//! Flexible header resolution: maps loosely named input columns onto the
//! canonical field names an entity profile understands.

use std::collections::HashMap;

use super::source::ImportRow;

/// Canonical field name to acceptable input headers, in precedence order.
#[derive(Debug, Clone)]
pub struct FieldAliasTable {
    entries: Vec<(&'static str, &'static [&'static str])>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AliasConflict {
    #[error("canonical field '{0}' is declared more than once")]
    DuplicateCanonical(&'static str),
    #[error("header '{header}' resolves to both '{first}' and '{second}'")]
    OverlappingAlias {
        header: String,
        first: &'static str,
        second: &'static str,
    },
}

impl FieldAliasTable {
    pub fn new(entries: &[(&'static str, &'static [&'static str])]) -> Self {
        Self {
            entries: entries.to_vec(),
        }
    }

    pub fn canonical_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(canonical, _)| *canonical)
    }

    pub fn contains(&self, canonical: &str) -> bool {
        self.entries.iter().any(|(name, _)| *name == canonical)
    }

    /// The canonical name followed by its aliases, in match order.
    pub fn candidates(&self, canonical: &str) -> Vec<&'static str> {
        self.entries
            .iter()
            .find(|(name, _)| *name == canonical)
            .map(|(name, aliases)| {
                std::iter::once(*name)
                    .chain(aliases.iter().copied())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every header spelling must point at exactly one canonical field.
    pub fn validate(&self) -> Result<(), AliasConflict> {
        let mut owners: HashMap<String, &'static str> = HashMap::new();
        for (index, (canonical, _)) in self.entries.iter().enumerate() {
            if self.entries[..index].iter().any(|(name, _)| name == canonical) {
                return Err(AliasConflict::DuplicateCanonical(*canonical));
            }
        }

        for (canonical, _) in &self.entries {
            for candidate in self.candidates(canonical) {
                let key = normalize_header(candidate);
                match owners.get(&key).copied() {
                    Some(owner) if owner != *canonical => {
                        return Err(AliasConflict::OverlappingAlias {
                            header: candidate.to_string(),
                            first: owner,
                            second: *canonical,
                        });
                    }
                    Some(_) => {}
                    None => {
                        owners.insert(key, *canonical);
                    }
                }
            }
        }

        Ok(())
    }
}

/// Strip byte-order marks and zero-width spaces, then trim.
pub(crate) fn clean_header(value: &str) -> String {
    value.replace(['\u{feff}', '\u{200b}'], "").trim().to_string()
}

/// Comparison key for header names: cleaned, whitespace-collapsed, lower-case.
pub(crate) fn normalize_header(value: &str) -> String {
    let cleaned = clean_header(value);
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.to_lowercase()
}

/// Empty cells and spreadsheet placeholders (`nan`, `none`, `null`) carry no value.
pub fn is_blank(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty()
        || ["nan", "none", "null"]
            .iter()
            .any(|placeholder| trimmed.eq_ignore_ascii_case(placeholder))
}

/// Populate every canonical field that has a usable source column.
///
/// A canonical field already present with a value is left alone. Otherwise the
/// canonical name is tried first, then each alias in declared order; the first
/// matching header holding a non-blank value wins. Fields with no match stay absent.
pub fn resolve_headers(row: &ImportRow, table: &FieldAliasTable) -> ImportRow {
    let mut resolved = row.clone();

    for canonical in table.canonical_names() {
        if row.get(canonical).is_some_and(|value| !is_blank(value)) {
            continue;
        }

        let found = table.candidates(canonical).into_iter().find_map(|candidate| {
            let wanted = normalize_header(candidate);
            row.cells()
                .find(|(header, value)| normalize_header(header) == wanted && !is_blank(value))
                .map(|(_, value)| value.trim().to_string())
        });

        if let Some(value) = found {
            resolved.insert(canonical, value);
        }
    }

    resolved
}

/// Required canonical fields for which no header (canonical or alias) exists at all.
pub fn missing_columns(
    headers: &[String],
    table: &FieldAliasTable,
    required: &[&'static str],
) -> Vec<String> {
    let present: Vec<String> = headers.iter().map(|header| normalize_header(header)).collect();

    required
        .iter()
        .filter(|canonical| {
            !table
                .candidates(canonical)
                .iter()
                .chain(std::iter::once(*canonical))
                .any(|candidate| present.contains(&normalize_header(candidate)))
        })
        .map(|canonical| canonical.to_string())
        .collect()
}

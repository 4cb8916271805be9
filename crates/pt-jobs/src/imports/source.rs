use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use super::headers::clean_header;

/// One input record: column name to raw cell text, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportRow {
    cells: Vec<(String, String)>,
}

impl ImportRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut row = Self::new();
        for (column, value) in pairs {
            row.insert(column, value);
        }
        row
    }

    /// Set `column` (exact name), replacing an existing cell of the same name.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.cells.iter_mut().find(|(name, _)| *name == column) {
            Some(cell) => cell.1 = value,
            None => self.cells.push((column, value)),
        }
    }

    /// Exact, case-sensitive lookup.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    pub fn cells(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Parsed contents of one delimited source.
#[derive(Debug, Clone)]
pub struct SourceRows {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<ImportRow>,
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("source not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("failed to read source {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid CSV data in {name}: {source}")]
    Csv {
        name: String,
        #[source]
        source: csv::Error,
    },
    #[error("{name} is missing required columns: {}. Found headers: {}", missing.join(", "), found.join(", "))]
    MissingColumns {
        name: String,
        missing: Vec<String>,
        found: Vec<String>,
    },
}

/// File name used for reports and status detection.
pub(crate) fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub(crate) fn read_path(path: &Path) -> Result<SourceRows, SourceError> {
    let name = source_name(path);
    let file = File::open(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            SourceError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            SourceError::Io {
                name: name.clone(),
                source,
            }
        }
    })?;
    read_rows(&name, file)
}

/// Read a header row plus every data row. Ragged rows are tolerated; missing
/// trailing cells are simply absent from the row.
pub(crate) fn read_rows<R: Read>(name: &str, reader: R) -> Result<SourceRows, SourceError> {
    let csv_error = |source| SourceError::Csv {
        name: name.to_string(),
        source,
    };

    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(clean_header)
        .collect();

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record.map_err(csv_error)?;
        let row = ImportRow::from_pairs(
            headers
                .iter()
                .zip(record.iter())
                .map(|(header, value)| (header.clone(), value.to_string())),
        );
        rows.push(row);
    }

    Ok(SourceRows {
        name: name.to_string(),
        headers,
        rows,
    })
}

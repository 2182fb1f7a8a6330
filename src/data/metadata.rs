use csv::{ReaderBuilder, Trim};

use super::model::{MetadataColumn, MetadataColumns};
use crate::error::MetadataFormatError;

/// Name the first metadata column must carry.
pub const PKEY_COLUMN: &str = "pkey";

/// Typed metadata columns plus the row keys they are aligned with.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub columns: MetadataColumns,
    pub keys: Vec<String>,
}

impl Metadata {
    /// No metadata was supplied; keys come from the spectra.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Load an optional metadata CSV.
///
/// Layout: header row starting with `pkey`, one row per sample. Each other
/// column becomes a [`MetadataColumn`] keyed `k<i>` (its position after
/// `pkey`), typed from its complete set of values:
/// * every cell a boolean literal → `Boolean`
/// * every cell a number or empty → `Numeric` (empty = NaN)
/// * anything else → `Categorical`
pub fn load_metadata(payload: Option<&[u8]>) -> Result<Metadata, MetadataFormatError> {
    let Some(payload) = payload else {
        return Ok(Metadata::default());
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(payload);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    if headers.first().map(String::as_str) != Some(PKEY_COLUMN) {
        return Err(MetadataFormatError::MissingPkey {
            found: headers.first().cloned(),
        });
    }

    let mut keys = Vec::new();
    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len() - 1];
    for result in reader.records() {
        let record = result?;
        let mut fields = record.iter();
        keys.push(fields.next().unwrap_or_default().to_string());
        for (column, value) in cells.iter_mut().zip(fields) {
            column.push(value.to_string());
        }
    }

    if keys.is_empty() {
        return Err(MetadataFormatError::NoRows);
    }

    let columns = headers[1..]
        .iter()
        .zip(cells)
        .enumerate()
        .map(|(i, (name, raw))| (format!("k{i}"), classify_column(name, raw)))
        .collect();

    Ok(Metadata { columns, keys })
}

// ---------------------------------------------------------------------------
// Column typing
// ---------------------------------------------------------------------------

fn classify_column(name: &str, raw: Vec<String>) -> MetadataColumn {
    if let Some(values) = raw.iter().map(|s| parse_bool(s)).collect::<Option<Vec<_>>>() {
        return MetadataColumn::Boolean {
            display_name: name.to_string(),
            values,
        };
    }
    if let Some(values) = raw.iter().map(|s| parse_number(s)).collect::<Option<Vec<_>>>() {
        return MetadataColumn::Numeric {
            display_name: name.to_string(),
            values,
        };
    }
    MetadataColumn::categorical(name, raw)
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

fn parse_number(s: &str) -> Option<f64> {
    if s.is_empty() {
        return Some(f64::NAN);
    }
    s.parse::<f64>().ok()
}

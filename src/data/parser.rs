use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use arrow::array::{
    Array, Float32Array, Float64Array, Int32Array, Int64Array, LargeListArray, ListArray,
};
use arrow::datatypes::DataType;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::Spectrum;
use crate::error::SpectrumParseError;

const PARQUET_MAGIC: &[u8] = b"PAR1";

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Decode one spectrum payload.
///
/// The primary attempt reads Parquet (sniffed by its magic bytes) or strict
/// UTF-8 text. If that fails, the same bytes are re-read as permissive text
/// with undecodable bytes dropped. Text may be:
/// * JSON – `{"x": [...], "y": [...]}` or `[[x, y], ...]`
/// * two numeric columns separated by comma, semicolon, tab or spaces, with
///   optional header and `#`/`%` comment lines
pub fn parse_spectrum(payload: &[u8]) -> Result<Spectrum, SpectrumParseError> {
    let primary = match decode_strict(payload) {
        Ok(spectrum) => return Ok(spectrum),
        Err(e) => format!("{e:#}"),
    };
    if is_parquet(payload) {
        return Err(SpectrumParseError {
            primary,
            fallback: "not attempted for parquet payloads".into(),
        });
    }
    decode_permissive(payload).map_err(|e| SpectrumParseError {
        primary,
        fallback: format!("{e:#}"),
    })
}

fn is_parquet(payload: &[u8]) -> bool {
    payload.starts_with(PARQUET_MAGIC)
}

fn decode_strict(payload: &[u8]) -> Result<Spectrum> {
    if is_parquet(payload) {
        return load_parquet(payload);
    }
    let text = std::str::from_utf8(payload).context("payload is not valid UTF-8")?;
    parse_text(text)
}

fn decode_permissive(payload: &[u8]) -> Result<Spectrum> {
    let text: String = String::from_utf8_lossy(payload)
        .chars()
        .filter(|&c| c != char::REPLACEMENT_CHARACTER)
        .collect();
    parse_text(&text)
}

fn parse_text(text: &str) -> Result<Spectrum> {
    let text = text.trim_start_matches('\u{feff}').trim_start();
    if text.starts_with('{') || text.starts_with('[') {
        load_json(text)
    } else {
        load_delimited(text)
    }
}

// ---------------------------------------------------------------------------
// JSON decoder
// ---------------------------------------------------------------------------

fn load_json(text: &str) -> Result<Spectrum> {
    let root: JsonValue = serde_json::from_str(text).context("parsing JSON")?;

    match &root {
        JsonValue::Object(obj) => {
            let x = json_array_to_f64(obj.get("x"), "x")?;
            let y = json_array_to_f64(obj.get("y"), "y")?;
            Spectrum::new(x, y)
        }
        JsonValue::Array(pairs) => {
            let mut x = Vec::with_capacity(pairs.len());
            let mut y = Vec::with_capacity(pairs.len());
            for (i, pair) in pairs.iter().enumerate() {
                let (a, b) = pair
                    .as_array()
                    .filter(|p| p.len() >= 2)
                    .and_then(|p| Some((p[0].as_f64()?, p[1].as_f64()?)))
                    .with_context(|| format!("point {i} is not an [x, y] pair"))?;
                x.push(a);
                y.push(b);
            }
            Spectrum::new(x, y)
        }
        _ => bail!("expected a JSON object or array"),
    }
}

fn json_array_to_f64(val: Option<&JsonValue>, col: &str) -> Result<Vec<f64>> {
    let arr = val
        .and_then(|v| v.as_array())
        .with_context(|| format!("missing or invalid '{col}' array"))?;

    arr.iter()
        .enumerate()
        .map(|(j, v)| {
            v.as_f64()
                .with_context(|| format!("{col}[{j}]: not a number"))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Two-column text decoder
// ---------------------------------------------------------------------------

fn load_delimited(text: &str) -> Result<Spectrum> {
    let mut axis = Vec::new();
    let mut intensity = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('%') {
            continue;
        }
        match parse_pair(line) {
            Some((x, y)) => {
                axis.push(x);
                intensity.push(y);
            }
            // header lines may only precede the data
            None if axis.is_empty() => continue,
            None => bail!(
                "line {}: expected two numeric columns, got {line:?}",
                line_no + 1
            ),
        }
    }

    if axis.is_empty() {
        bail!("no numeric data lines found");
    }
    Spectrum::new(axis, intensity)
}

fn parse_pair(line: &str) -> Option<(f64, f64)> {
    let mut fields = line
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|f| !f.is_empty());
    let x = fields.next()?.parse::<f64>().ok()?;
    let y = fields.next()?.parse::<f64>().ok()?;
    Some((x, y))
}

// ---------------------------------------------------------------------------
// Parquet decoder
// ---------------------------------------------------------------------------

/// Expected schema:
/// - `x`, `y`: Float64/Float32 columns, one point per row, or
/// - `x`, `y`: List/LargeList columns, the first row holding the spectrum
fn load_parquet(payload: &[u8]) -> Result<Spectrum> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::copy_from_slice(payload))
        .context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut axis = Vec::new();
    let mut intensity = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let x_idx = schema
            .index_of("x")
            .map_err(|_| anyhow!("parquet payload missing 'x' column"))?;
        let y_idx = schema
            .index_of("y")
            .map_err(|_| anyhow!("parquet payload missing 'y' column"))?;

        let x_col = batch.column(x_idx);
        let y_col = batch.column(y_idx);

        match x_col.data_type() {
            DataType::List(_) | DataType::LargeList(_) => {
                if batch.num_rows() == 0 {
                    continue;
                }
                let x = extract_f64_list(x_col, 0).context("failed to read 'x'")?;
                let y = extract_f64_list(y_col, 0).context("failed to read 'y'")?;
                return Spectrum::new(x, y);
            }
            _ => {
                axis.extend(extract_f64_column(x_col).context("failed to read 'x'")?);
                intensity.extend(extract_f64_column(y_col).context("failed to read 'y'")?);
            }
        }
    }

    Spectrum::new(axis, intensity)
}

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &Arc<dyn Array>, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null value in list column");
    }

    let values_array = match col.data_type() {
        DataType::List(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<ListArray>()
                .context("expected ListArray")?;
            list_arr.value(row)
        }
        DataType::LargeList(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<LargeListArray>()
                .context("expected LargeListArray")?;
            list_arr.value(row)
        }
        other => bail!("Expected List or LargeList column, got {other:?}"),
    };

    extract_f64_column(&values_array)
}

/// Read a flat numeric column; nulls become NaN.
fn extract_f64_column(col: &Arc<dyn Array>) -> Result<Vec<f64>> {
    let any = col.as_any();
    if let Some(arr) = any.downcast_ref::<Float64Array>() {
        Ok(arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(arr) = any.downcast_ref::<Float32Array>() {
        Ok(arr.iter().map(|v| v.map_or(f64::NAN, f64::from)).collect())
    } else if let Some(arr) = any.downcast_ref::<Int64Array>() {
        Ok(arr.iter().map(|v| v.map_or(f64::NAN, |i| i as f64)).collect())
    } else if let Some(arr) = any.downcast_ref::<Int32Array>() {
        Ok(arr.iter().map(|v| v.map_or(f64::NAN, f64::from)).collect())
    } else {
        bail!("column type is {:?}, expected a numeric type", col.data_type())
    }
}

use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, Trim};

use super::{row_order, BuildOptions};
use crate::data::align::Permutation;
use crate::data::metadata::Metadata;
use crate::data::model::{PrimaryKeySet, Provenance, VectorDataset};
use crate::data::resample::resample_shared;
use crate::error::ImportError;

// ---------------------------------------------------------------------------
// Matrix CSV decoding
// ---------------------------------------------------------------------------

/// A shared-axis matrix as stored in the upload: `rows[i]` belongs to `keys[i]`
/// and has one value per `axis` point.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMatrix {
    pub axis: Vec<f64>,
    pub keys: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

/// Decode the column-major matrix CSV.
///
/// ```text
/// wavelength, s1,  s2
/// 400.0,      0.1, 0.3
/// 400.5,      0.2, 0.4
/// ```
///
/// The first header cell only labels the axis; the rest are row keys. Each
/// line is one axis point, so the file is transposed on the way in. Cells that
/// are not numbers read as NaN, and lines without a finite axis value are
/// dropped.
pub fn parse_matrix_csv(payload: &[u8]) -> Result<RawMatrix> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(payload);

    let keys: Vec<String> = reader
        .byte_headers()
        .context("reading CSV header")?
        .iter()
        .skip(1)
        .map(|h| String::from_utf8_lossy(h).trim().to_string())
        .collect();
    if keys.is_empty() {
        bail!("CSV header has no spectrum columns");
    }

    let mut axis = Vec::new();
    let mut rows: Vec<Vec<f64>> = vec![Vec::new(); keys.len()];

    for (line_no, result) in reader.byte_records().enumerate() {
        let record = result.with_context(|| format!("CSV row {}", line_no + 1))?;
        let mut cells = record.iter().map(parse_cell);
        let x = cells.next().unwrap_or(f64::NAN);
        if !x.is_finite() {
            continue;
        }
        axis.push(x);
        for (row, y) in rows.iter_mut().zip(cells) {
            row.push(y);
        }
    }

    if axis.is_empty() {
        bail!("CSV has no lines with a finite axis value");
    }
    Ok(RawMatrix { axis, keys, rows })
}

fn parse_cell(cell: &[u8]) -> f64 {
    std::str::from_utf8(cell)
        .ok()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Validate and assemble a shared-axis dataset.
///
/// Steps, in order: sort the axis, enforce the channel-count rule, put rows in
/// metadata order, build the primary keys, then crop or resample if asked.
pub fn build_vector(
    matrix: RawMatrix,
    metadata: Metadata,
    opts: &BuildOptions<'_>,
) -> Result<VectorDataset, ImportError> {
    let RawMatrix {
        mut axis,
        keys,
        mut rows,
    } = matrix;

    let ascending = Permutation::ascending(&axis);
    if !ascending.is_identity() {
        axis = ascending.apply(&axis);
        for row in rows.iter_mut() {
            *row = ascending.apply(row.as_slice());
        }
    }

    opts.check_channels(axis.len())?;

    let data_keys: Vec<String> = keys.iter().map(|k| k.trim().to_string()).collect();
    let order = row_order(&metadata.keys, &data_keys)?;
    let keys = PrimaryKeySet::new(order.apply_owned(data_keys))?;
    let rows = order.apply_owned(rows);

    let (axis, intensities) = match &opts.bounds {
        Some(bounds) => {
            let grid = resample_shared(&axis, &rows, bounds, opts.grid_limit())?;
            (grid.axis, grid.rows)
        }
        None => (axis, rows),
    };

    log::info!(
        "Built vector dataset: {} rows x {} channels ({} metadata columns)",
        keys.len(),
        axis.len(),
        metadata.columns.len()
    );

    Ok(VectorDataset {
        kind: opts.kind.to_string(),
        axis,
        intensities,
        keys,
        metadata: metadata.columns,
        provenance: Provenance::default(),
    })
}

use std::collections::BTreeMap;

use super::{row_order, BuildOptions};
use crate::data::metadata::Metadata;
use crate::data::model::{
    Dataset, PrimaryKeySet, Provenance, Spectrum, TrajectoryDataset, VectorDataset,
};
use crate::data::parser::parse_spectrum;
use crate::data::resample::resample_many;
use crate::error::{DuplicateKeyError, ImportError};

/// Final path component, with either separator style.
fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Parse every archive entry into a spectrum keyed by its trimmed base name.
///
/// Empty entries and hidden files are archive artifacts and are skipped. Any
/// entry that fails to parse fails the whole import.
fn parse_entries(files: BTreeMap<String, Vec<u8>>) -> Result<BTreeMap<String, Spectrum>, ImportError> {
    let mut trajectories = BTreeMap::new();

    for (path, body) in files {
        if body.is_empty() {
            log::warn!("skipping empty archive entry {path}");
            continue;
        }
        let name = base_name(&path).trim();
        if name.is_empty() || name.starts_with('.') {
            log::warn!("skipping hidden archive entry {path}");
            continue;
        }

        log::info!("Parsing file: {name}");
        let spectrum = match parse_spectrum(&body) {
            Ok(spectrum) => spectrum,
            Err(e) => {
                return Err(ImportError::Parse {
                    file: name.to_string(),
                    reason: e.to_string(),
                    payload: body,
                    matrix: false,
                })
            }
        };
        if trajectories.insert(name.to_string(), spectrum).is_some() {
            return Err(DuplicateKeyError {
                key: name.to_string(),
            }
            .into());
        }
    }

    Ok(trajectories)
}

/// Validate and assemble a per-sample dataset from archive entries.
///
/// Without resample bounds each sample keeps its own axis and a
/// [`Dataset::Trajectory`] is returned. With any bound set, every sample is
/// interpolated onto one shared axis and a [`Dataset::Vector`] is returned.
pub fn build_trajectories(
    files: BTreeMap<String, Vec<u8>>,
    metadata: Metadata,
    opts: &BuildOptions<'_>,
) -> Result<Dataset, ImportError> {
    let trajectories = parse_entries(files)?;
    if trajectories.is_empty() {
        return Err(ImportError::NoSpectra);
    }

    let data_keys: Vec<String> = trajectories.keys().cloned().collect();
    let keys = if metadata.is_empty() {
        data_keys
    } else {
        let order = row_order(&metadata.keys, &data_keys)?;
        order.apply_owned(data_keys)
    };
    let keys = PrimaryKeySet::new(keys)?;

    let Some(bounds) = opts.bounds else {
        log::info!("Built trajectory dataset: {} samples", keys.len());
        return Ok(Dataset::Trajectory(TrajectoryDataset {
            kind: opts.kind.to_string(),
            keys,
            trajectories,
            metadata: metadata.columns,
            provenance: Provenance::default(),
        }));
    };

    let inputs: Vec<(&[f64], &[f64])> = keys
        .iter()
        .filter_map(|k| trajectories.get(k))
        .map(|s| (s.axis(), s.intensity()))
        .collect();
    let grid = resample_many(&inputs, &bounds, opts.grid_limit())?;
    opts.check_channels(grid.axis.len())?;

    log::info!(
        "Resampled {} trajectories onto {} channels",
        keys.len(),
        grid.axis.len()
    );
    Ok(Dataset::Vector(VectorDataset {
        kind: opts.kind.to_string(),
        axis: grid.axis,
        intensities: grid.rows,
        keys,
        metadata: metadata.columns,
        provenance: Provenance::default(),
    }))
}

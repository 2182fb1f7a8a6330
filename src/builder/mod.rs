/// Dataset builders: turn decoded payloads plus metadata into datasets.
///
/// ```text
///  matrix CSV ──► vector::parse_matrix_csv ──► RawMatrix ──┐
///                                                          ├─► align ─► (resample) ─► Dataset
///  ZIP entries ──► trajectory::build_trajectories ─────────┘
/// ```

pub mod trajectory;
pub mod vector;

use crate::config::ChannelConstraint;
use crate::data::align::{align, Permutation};
use crate::data::model::ensure_unique;
use crate::data::resample::{ResampleBounds, MAX_GRID_POINTS};
use crate::error::ImportError;

/// Per-import settings shared by both builders.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions<'a> {
    pub kind: &'a str,
    /// `None` keeps the data on its own axis (or axes).
    pub bounds: Option<ResampleBounds>,
    /// Channel-count rule for the dataset kind, if it is reserved.
    pub channels: Option<&'a ChannelConstraint>,
    /// Longest resampled axis allowed; `None` means [`MAX_GRID_POINTS`].
    pub max_grid_points: Option<usize>,
}

impl BuildOptions<'_> {
    fn check_channels(&self, channels: usize) -> Result<(), ImportError> {
        match self.channels {
            Some(rule) => rule.check(channels),
            None => Ok(()),
        }
    }

    fn grid_limit(&self) -> usize {
        self.max_grid_points.unwrap_or(MAX_GRID_POINTS)
    }
}

/// Row permutation taking data rows into metadata order.
///
/// Both key sequences are checked for duplicates first, so a repeated key is
/// reported as such rather than as a key-set mismatch.
fn row_order(meta_keys: &[String], data_keys: &[String]) -> Result<Permutation, ImportError> {
    if !meta_keys.is_empty() {
        ensure_unique(meta_keys)?;
        ensure_unique(data_keys)?;
    }
    Ok(align(meta_keys, data_keys)?)
}

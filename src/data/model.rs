use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::error::DuplicateKeyError;

// ---------------------------------------------------------------------------
// MetadataValue – a single cell of a metadata column
// ---------------------------------------------------------------------------

/// One metadata cell, as read back from a typed [`MetadataColumn`].
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Bool(bool),
    Number(f64),
    Label(String),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Number(v) if v.is_nan() => write!(f, "<null>"),
            MetadataValue::Number(v) => write!(f, "{v}"),
            MetadataValue::Label(s) => write!(f, "{s}"),
        }
    }
}

impl MetadataValue {
    /// Try to interpret the value as an `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Number(v) => Some(*v),
            MetadataValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            MetadataValue::Label(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// MetadataColumn – a typed covariate, tagged once at load time
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Boolean,
    Numeric,
    Categorical,
}

/// A metadata column whose type was decided from its full value set.
///
/// Categorical columns use a lookup encoding: sorted unique `labels` and one
/// index into them per row.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataColumn {
    Boolean {
        display_name: String,
        values: Vec<bool>,
    },
    Numeric {
        display_name: String,
        values: Vec<f64>,
    },
    Categorical {
        display_name: String,
        labels: Vec<String>,
        codes: Vec<usize>,
    },
}

impl MetadataColumn {
    /// Build a categorical column from raw per-row labels.
    pub fn categorical(display_name: impl Into<String>, raw: Vec<String>) -> Self {
        let mut labels = raw.clone();
        labels.sort();
        labels.dedup();
        let codes = raw
            .iter()
            .map(|v| labels.binary_search(v).unwrap_or_default())
            .collect();
        MetadataColumn::Categorical {
            display_name: display_name.into(),
            labels,
            codes,
        }
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            MetadataColumn::Boolean { .. } => ColumnKind::Boolean,
            MetadataColumn::Numeric { .. } => ColumnKind::Numeric,
            MetadataColumn::Categorical { .. } => ColumnKind::Categorical,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            MetadataColumn::Boolean { display_name, .. }
            | MetadataColumn::Numeric { display_name, .. }
            | MetadataColumn::Categorical { display_name, .. } => display_name,
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        match self {
            MetadataColumn::Boolean { values, .. } => values.len(),
            MetadataColumn::Numeric { values, .. } => values.len(),
            MetadataColumn::Categorical { codes, .. } => codes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The value at `row`, or `None` past the end.
    pub fn value(&self, row: usize) -> Option<MetadataValue> {
        match self {
            MetadataColumn::Boolean { values, .. } => values.get(row).copied().map(MetadataValue::Bool),
            MetadataColumn::Numeric { values, .. } => values.get(row).copied().map(MetadataValue::Number),
            MetadataColumn::Categorical { labels, codes, .. } => codes
                .get(row)
                .and_then(|&c| labels.get(c))
                .map(|l| MetadataValue::Label(l.clone())),
        }
    }
}

/// Metadata columns keyed by their script-friendly key (`k0`, `k1`, ...).
pub type MetadataColumns = BTreeMap<String, MetadataColumn>;

// ---------------------------------------------------------------------------
// Spectrum – one (axis, intensity) pair
// ---------------------------------------------------------------------------

/// A single spectrum. `axis` is ascending and the same length as `intensity`.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    axis: Vec<f64>,
    intensity: Vec<f64>,
}

impl Spectrum {
    /// Pair up `axis` and `intensity`, dropping points with a non-finite axis
    /// value and sorting the rest by axis.
    pub fn new(axis: Vec<f64>, intensity: Vec<f64>) -> anyhow::Result<Self> {
        if axis.len() != intensity.len() {
            anyhow::bail!(
                "axis has {} values but intensity has {}",
                axis.len(),
                intensity.len()
            );
        }
        let mut points: Vec<(f64, f64)> = axis
            .into_iter()
            .zip(intensity)
            .filter(|(x, _)| x.is_finite())
            .collect();
        if points.is_empty() {
            anyhow::bail!("spectrum has no points");
        }
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (axis, intensity) = points.into_iter().unzip();
        Ok(Spectrum { axis, intensity })
    }

    pub fn axis(&self) -> &[f64] {
        &self.axis
    }

    pub fn intensity(&self) -> &[f64] {
        &self.intensity
    }

    pub fn len(&self) -> usize {
        self.axis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axis.is_empty()
    }
}

// ---------------------------------------------------------------------------
// PrimaryKeySet – unique row identifiers
// ---------------------------------------------------------------------------

/// Ordered row keys with no duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKeySet {
    keys: Vec<String>,
}

impl PrimaryKeySet {
    pub fn new(keys: Vec<String>) -> Result<Self, DuplicateKeyError> {
        ensure_unique(&keys)?;
        Ok(PrimaryKeySet { keys })
    }

    pub fn as_slice(&self) -> &[String] {
        &self.keys
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }
}

/// Fails on the first key seen twice.
pub fn ensure_unique(keys: &[String]) -> Result<(), DuplicateKeyError> {
    let mut seen = HashSet::with_capacity(keys.len());
    for key in keys {
        if !seen.insert(key.as_str()) {
            return Err(DuplicateKeyError { key: key.clone() });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Datasets
// ---------------------------------------------------------------------------

/// Where a dataset came from and who may see it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provenance {
    pub is_public: bool,
    pub user_added: bool,
    pub description: String,
}

impl Provenance {
    /// Flags carried by every dataset imported by a user.
    pub fn user_upload(description: impl Into<String>) -> Self {
        Provenance {
            is_public: false,
            user_added: true,
            description: description.into(),
        }
    }
}

/// Every row shares one axis; `intensities[i]` belongs to `keys[i]`.
#[derive(Debug, Clone)]
pub struct VectorDataset {
    pub kind: String,
    pub axis: Vec<f64>,
    pub intensities: Vec<Vec<f64>>,
    pub keys: PrimaryKeySet,
    pub metadata: MetadataColumns,
    pub provenance: Provenance,
}

impl VectorDataset {
    pub fn num_rows(&self) -> usize {
        self.intensities.len()
    }

    pub fn num_channels(&self) -> usize {
        self.axis.len()
    }

    /// Intensity row for `key`.
    pub fn row(&self, key: &str) -> Option<&[f64]> {
        self.keys
            .position(key)
            .and_then(|i| self.intensities.get(i))
            .map(Vec::as_slice)
    }
}

/// Each row keeps its own axis. Row order is `keys`, not map order.
#[derive(Debug, Clone)]
pub struct TrajectoryDataset {
    pub kind: String,
    pub keys: PrimaryKeySet,
    pub trajectories: BTreeMap<String, Spectrum>,
    pub metadata: MetadataColumns,
    pub provenance: Provenance,
}

impl TrajectoryDataset {
    pub fn num_rows(&self) -> usize {
        self.keys.len()
    }

    /// Rows in key order.
    pub fn rows(&self) -> impl Iterator<Item = (&str, &Spectrum)> {
        self.keys
            .iter()
            .filter_map(|k| self.trajectories.get(k).map(|s| (k, s)))
    }
}

/// A finished import, in either form.
#[derive(Debug, Clone)]
pub enum Dataset {
    Vector(VectorDataset),
    Trajectory(TrajectoryDataset),
}

impl Dataset {
    pub fn kind(&self) -> &str {
        match self {
            Dataset::Vector(ds) => &ds.kind,
            Dataset::Trajectory(ds) => &ds.kind,
        }
    }

    pub fn keys(&self) -> &PrimaryKeySet {
        match self {
            Dataset::Vector(ds) => &ds.keys,
            Dataset::Trajectory(ds) => &ds.keys,
        }
    }

    pub fn metadata(&self) -> &MetadataColumns {
        match self {
            Dataset::Vector(ds) => &ds.metadata,
            Dataset::Trajectory(ds) => &ds.metadata,
        }
    }

    pub fn provenance(&self) -> &Provenance {
        match self {
            Dataset::Vector(ds) => &ds.provenance,
            Dataset::Trajectory(ds) => &ds.provenance,
        }
    }

    pub fn provenance_mut(&mut self) -> &mut Provenance {
        match self {
            Dataset::Vector(ds) => &mut ds.provenance,
            Dataset::Trajectory(ds) => &mut ds.provenance,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.keys().len()
    }
}

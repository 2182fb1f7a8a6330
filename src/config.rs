use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::resample::MAX_GRID_POINTS;
use crate::error::ImportError;

// ---------------------------------------------------------------------------
// Channel-count rule for reserved kinds
// ---------------------------------------------------------------------------

/// Vector datasets of `kind` must have one of the `allowed` axis lengths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConstraint {
    pub kind: String,
    pub allowed: Vec<usize>,
}

impl ChannelConstraint {
    /// LIBS instruments produce one of three fixed channel counts.
    pub fn libs() -> Self {
        ChannelConstraint {
            kind: "LIBS".to_string(),
            allowed: vec![6144, 6143, 5485],
        }
    }

    pub fn check(&self, channels: usize) -> Result<(), ImportError> {
        if self.allowed.contains(&channels) {
            Ok(())
        } else {
            Err(ImportError::ChannelCount {
                kind: self.kind.clone(),
                actual: channels,
                allowed: self.allowed.clone(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// ImportConfig
// ---------------------------------------------------------------------------

/// Settings for the importer. Every field has a default, so a JSON file only
/// needs the keys it changes:
///
/// ```json
/// { "kinds": ["LIBS", "NIR", "Raman"], "bad_upload_dir": "/var/log/uploads" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Accepted dataset kinds. Empty accepts any kind.
    pub kinds: Vec<String>,
    pub channel_constraints: Vec<ChannelConstraint>,
    /// Where payloads that fail to parse are kept for inspection.
    pub bad_upload_dir: PathBuf,
    /// Longest axis a resampling request may produce.
    pub max_grid_points: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            kinds: Vec::new(),
            channel_constraints: vec![ChannelConstraint::libs()],
            bad_upload_dir: PathBuf::from("logs"),
            max_grid_points: MAX_GRID_POINTS,
        }
    }
}

impl ImportConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("parsing import config")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&text)
    }

    pub fn accepts_kind(&self, kind: &str) -> bool {
        self.kinds.is_empty() || self.kinds.iter().any(|k| k == kind)
    }

    pub fn channel_constraint(&self, kind: &str) -> Option<&ChannelConstraint> {
        self.channel_constraints.iter().find(|c| c.kind == kind)
    }
}

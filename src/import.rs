use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::builder::trajectory::build_trajectories;
use crate::builder::vector::{build_vector, parse_matrix_csv};
use crate::builder::BuildOptions;
use crate::config::ImportConfig;
use crate::data::archive::{is_archive, read_archive};
use crate::data::metadata::load_metadata;
use crate::data::model::{Dataset, Spectrum};
use crate::data::parser::parse_spectrum;
use crate::data::resample::ResampleBounds;
use crate::error::{DuplicateNameError, ImportError};
use crate::registry::{publish, DatasetHandle, DatasetRegistry};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Everything a user submits for one dataset import.
#[derive(Debug, Clone, Default)]
pub struct ImportRequest {
    pub kind: String,
    pub name: String,
    pub description: String,
    /// Matrix CSV or ZIP archive of per-sample files.
    pub spectra: Option<Vec<u8>>,
    /// Optional metadata CSV starting with a `pkey` column.
    pub metadata: Option<Vec<u8>>,
    pub bounds: Option<ResampleBounds>,
}

// ---------------------------------------------------------------------------
// Importer
// ---------------------------------------------------------------------------

/// Validates uploads, builds datasets and publishes them to the registry.
pub struct Importer {
    config: ImportConfig,
    registry: Arc<DatasetRegistry>,
}

impl Importer {
    pub fn new(config: ImportConfig, registry: Arc<DatasetRegistry>) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<DatasetRegistry> {
        &self.registry
    }

    /// Run one import end to end.
    ///
    /// On success the dataset is registered but not yet materialized; the
    /// handle's [`DatasetHandle::navigation_path`] is what callers hand back to
    /// users. On failure nothing is registered and the full diagnostic is
    /// logged.
    pub fn import(&self, request: ImportRequest) -> Result<DatasetHandle, ImportError> {
        let result = self.try_import(request);
        if let Err(e) = &result {
            self.report(e);
        }
        result
    }

    fn try_import(&self, request: ImportRequest) -> Result<DatasetHandle, ImportError> {
        let ImportRequest {
            kind,
            name,
            description,
            spectra,
            metadata,
            bounds,
        } = request;

        if !self.config.accepts_kind(&kind) {
            return Err(ImportError::InvalidKind(kind));
        }
        // refuse to clobber before doing any parsing work
        if self.registry.contains(&kind, &name) {
            return Err(DuplicateNameError { kind, name }.into());
        }
        let Some(spectra) = spectra.filter(|s| !s.is_empty()) else {
            return Err(ImportError::NoSpectra);
        };

        let metadata = load_metadata(metadata.as_deref())?;
        let opts = BuildOptions {
            kind: &kind,
            bounds,
            channels: self.config.channel_constraint(&kind),
            max_grid_points: Some(self.config.max_grid_points),
        };

        let dataset = if is_archive(&spectra) {
            log::info!("Importing {name} [{kind}] from a trajectory archive");
            let files = match read_archive(&spectra) {
                Ok(files) => files,
                Err(e) => {
                    return Err(ImportError::Parse {
                        file: format!("{name}.zip"),
                        reason: format!("{e:#}"),
                        payload: spectra,
                        matrix: false,
                    })
                }
            };
            build_trajectories(files, metadata, &opts)?
        } else {
            log::info!("Importing {name} [{kind}] from a spectrum matrix CSV");
            let matrix = match parse_matrix_csv(&spectra) {
                Ok(matrix) => matrix,
                Err(e) => {
                    return Err(ImportError::Parse {
                        file: format!("{name}.csv"),
                        reason: format!("{e:#}"),
                        payload: spectra,
                        matrix: true,
                    })
                }
            };
            Dataset::Vector(build_vector(matrix, metadata, &opts)?)
        };

        Ok(publish(&self.registry, &kind, &name, dataset, description)?)
    }

    /// Parse a single ad-hoc spectrum upload.
    pub fn parse_upload(&self, file_name: &str, payload: &[u8]) -> Result<Spectrum, ImportError> {
        log::info!("Parsing file: {file_name}");
        parse_spectrum(payload).map_err(|e| {
            let err = ImportError::Parse {
                file: file_name.to_string(),
                reason: e.to_string(),
                payload: payload.to_vec(),
                matrix: false,
            };
            self.report(&err);
            err
        })
    }

    fn report(&self, err: &ImportError) {
        log::error!("import failed [{}]: {err}", err.status());
        if let Some((file, payload)) = err.bad_payload() {
            match preserve_bad_upload(&self.config.bad_upload_dir, file, payload) {
                Ok(path) => log::warn!("kept unparsable upload at {}", path.display()),
                Err(e) => log::error!("could not keep unparsable upload {file}: {e}"),
            }
        }
    }
}

/// Write `payload` to `<dir>/badupload-<file>` for later inspection.
pub fn preserve_bad_upload(dir: &Path, file: &str, payload: &[u8]) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let safe: String = file
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file)
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let path = dir.join(format!("badupload-{safe}"));
    fs::write(&path, payload)?;
    Ok(path)
}

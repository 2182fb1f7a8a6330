use thiserror::Error;

// ---------------------------------------------------------------------------
// Component errors
// ---------------------------------------------------------------------------

/// A payload could not be decoded as a spectrum by either decoding attempt.
#[derive(Debug, Clone, Error)]
#[error("unable to parse spectrum: {primary}; permissive text fallback: {fallback}")]
pub struct SpectrumParseError {
    pub primary: String,
    pub fallback: String,
}

/// The metadata side-file is unusable. Never partially applied.
#[derive(Debug, Error)]
pub enum MetadataFormatError {
    #[error("first metadata column must be \"pkey\", found {found:?}")]
    MissingPkey { found: Option<String> },
    #[error("metadata table has a header but no rows")]
    NoRows,
    #[error("malformed metadata CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Metadata keys and spectrum keys cannot be reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MismatchError {
    #[error("row count mismatch: {metadata} metadata entries for {spectra} spectra")]
    RowCount { metadata: usize, spectra: usize },
    #[error("key sets differ: {key:?} is not present in the {missing_from}")]
    KeySets {
        key: String,
        missing_from: &'static str,
    },
}

/// A key sequence that must be unique contains `key` more than once.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("primary keys not unique: {key:?} appears more than once")]
pub struct DuplicateKeyError {
    pub key: String,
}

/// Resolved resampling bounds are unusable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResampleError {
    #[error("no overlapping coverage: lower bound {lower} is not below upper bound {upper}")]
    Overlap { lower: f64, upper: f64 },
    #[error("resample step must be finite and positive, got {step}")]
    InvalidStep { step: f64 },
    #[error("resampled axis would have {points} points, more than the limit of {limit}")]
    TooManyPoints { points: f64, limit: usize },
}

/// `(kind, name)` is already taken in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dataset {name:?} already exists under kind {kind:?}")]
pub struct DuplicateNameError {
    pub kind: String,
    pub name: String,
}

// ---------------------------------------------------------------------------
// ImportError – the single error surface of an import
// ---------------------------------------------------------------------------

/// Every way an import can fail.
///
/// `Display` is the detailed diagnostic meant for the log; callers facing a
/// user should show [`ImportError::user_message`] with [`ImportError::status`].
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("invalid dataset kind: {0:?}")]
    InvalidKind(String),

    #[error("no spectrum data uploaded")]
    NoSpectra,

    #[error("bad spectrum payload {file:?}: {reason}")]
    Parse {
        file: String,
        reason: String,
        /// Raw offending bytes, kept for later inspection.
        payload: Vec<u8>,
        /// True for the shared-axis matrix CSV, false for per-sample files.
        matrix: bool,
    },

    #[error(transparent)]
    MetadataFormat(#[from] MetadataFormatError),

    #[error(transparent)]
    Mismatch(#[from] MismatchError),

    #[error(transparent)]
    DuplicateKey(#[from] DuplicateKeyError),

    #[error("wrong number of channels for {kind} data: {actual} (allowed: {allowed:?})")]
    ChannelCount {
        kind: String,
        actual: usize,
        allowed: Vec<usize>,
    },

    #[error(transparent)]
    Resample(#[from] ResampleError),

    #[error(transparent)]
    DuplicateName(#[from] DuplicateNameError),
}

impl ImportError {
    /// Stable numeric status for the caller-facing surface.
    pub fn status(&self) -> u16 {
        match self {
            ImportError::InvalidKind(_) | ImportError::NoSpectra => 400,
            ImportError::DuplicateName(_) => 403,
            ImportError::Parse { .. }
            | ImportError::MetadataFormat(_)
            | ImportError::Mismatch(_)
            | ImportError::DuplicateKey(_)
            | ImportError::ChannelCount { .. }
            | ImportError::Resample(_) => 415,
        }
    }

    /// Short, non-technical message for end users.
    pub fn user_message(&self) -> String {
        match self {
            ImportError::InvalidKind(_) => "Invalid dataset kind.".into(),
            ImportError::NoSpectra => "No spectrum data uploaded.".into(),
            ImportError::Parse { matrix: true, .. } => "Unable to parse spectrum data CSV.".into(),
            ImportError::Parse { file, .. } => format!("Unable to parse spectrum file: {file}"),
            ImportError::MetadataFormat(MetadataFormatError::MissingPkey { .. }) => {
                "Metadata CSV must start with \"pkey\" column.".into()
            }
            ImportError::MetadataFormat(_) => "Unable to parse metadata CSV.".into(),
            ImportError::Mismatch(MismatchError::RowCount { metadata, spectra }) => {
                format!("Failed: {metadata} metadata entries for {spectra} spectra")
            }
            ImportError::Mismatch(_) => "Spectrum and metadata names mismatch.".into(),
            ImportError::DuplicateKey(_) => "Primary keys not unique.".into(),
            ImportError::ChannelCount { kind, actual, .. } => {
                format!("Wrong number of channels for {kind} data: {actual}.")
            }
            ImportError::Resample(ResampleError::Overlap { .. }) => {
                "Resampling bounds leave no overlapping range.".into()
            }
            ImportError::Resample(ResampleError::InvalidStep { .. }) => {
                "Invalid resampling step.".into()
            }
            ImportError::Resample(ResampleError::TooManyPoints { .. }) => {
                "Resampling step too small for the requested range.".into()
            }
            ImportError::DuplicateName(_) => "Dataset already exists.".into(),
        }
    }

    /// The raw payload of a parse failure, if this is one.
    pub fn bad_payload(&self) -> Option<(&str, &[u8])> {
        match self {
            ImportError::Parse { file, payload, .. } => Some((file.as_str(), payload.as_slice())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ImportError::InvalidKind("x".into()).status(), 400);
        assert_eq!(
            ImportError::DuplicateName(DuplicateNameError {
                kind: "NIR".into(),
                name: "a".into(),
            })
            .status(),
            403
        );
        assert_eq!(
            ImportError::from(ResampleError::Overlap { lower: 10.0, upper: 5.0 }).status(),
            415
        );
        assert_eq!(
            ImportError::from(ResampleError::TooManyPoints {
                points: f64::INFINITY,
                limit: 10,
            })
            .status(),
            415
        );
    }

    #[test]
    fn test_user_message_is_short() {
        let err = ImportError::ChannelCount {
            kind: "LIBS".into(),
            actual: 100,
            allowed: vec![6144, 6143, 5485],
        };
        assert_eq!(err.user_message(), "Wrong number of channels for LIBS data: 100.");
        assert!(err.to_string().contains("6144"));
    }

    #[test]
    fn test_parse_error_keeps_payload() {
        let err = ImportError::Parse {
            file: "a.txt".into(),
            reason: "garbage".into(),
            payload: b"\x00\x01".to_vec(),
            matrix: false,
        };
        assert_eq!(err.bad_payload(), Some(("a.txt", &b"\x00\x01"[..])));
        assert_eq!(err.user_message(), "Unable to parse spectrum file: a.txt");
    }
}

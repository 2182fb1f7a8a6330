//! Import pipeline for user-submitted spectral datasets.
//!
//! An upload is either one matrix CSV sharing a single axis, or a ZIP archive
//! of per-sample spectra each with its own axis. Both are reconciled with an
//! optional metadata table, optionally cropped or resampled onto a uniform
//! axis, and published to a [`registry::DatasetRegistry`] that materializes
//! them lazily.

pub mod builder;
pub mod config;
pub mod data;
pub mod error;
pub mod import;
pub mod registry;

pub use config::{ChannelConstraint, ImportConfig};
pub use data::model::{Dataset, Spectrum, TrajectoryDataset, VectorDataset};
pub use data::resample::ResampleBounds;
pub use error::ImportError;
pub use import::{ImportRequest, Importer};
pub use registry::{DatasetHandle, DatasetRegistry, LoadStatus};

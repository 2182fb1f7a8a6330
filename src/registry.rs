//! In-process dataset registry and the registration gateway.
//!
//! Each `(kind, name)` owns a slot holding a small state machine:
//!
//! ```text
//!  Pending{loader} ──first load()──► Loading ──► Ready{dataset}
//!                                          └───► Failed{error}
//! ```
//!
//! The loader runs at most once. Concurrent `load()` calls wait on the slot
//! until the first one finishes.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex, RwLock};

use crate::data::model::{Dataset, Provenance};
use crate::error::DuplicateNameError;

/// Materializes a dataset on first access. Captures only owned data.
pub type Loader = Box<dyn FnOnce() -> anyhow::Result<Dataset> + Send + 'static>;

// ---------------------------------------------------------------------------
// Slot state
// ---------------------------------------------------------------------------

enum SlotState {
    Pending(Loader),
    Loading,
    Ready(Arc<Dataset>),
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Pending,
    Loading,
    Ready,
    Failed,
}

struct Slot {
    state: Mutex<SlotState>,
    settled: Condvar,
}

impl Slot {
    fn new(loader: Loader) -> Self {
        Slot {
            state: Mutex::new(SlotState::Pending(loader)),
            settled: Condvar::new(),
        }
    }

    fn status(&self) -> LoadStatus {
        match &*self.state.lock() {
            SlotState::Pending(_) => LoadStatus::Pending,
            SlotState::Loading => LoadStatus::Loading,
            SlotState::Ready(_) => LoadStatus::Ready,
            SlotState::Failed(_) => LoadStatus::Failed,
        }
    }
}

// ---------------------------------------------------------------------------
// DatasetHandle
// ---------------------------------------------------------------------------

/// A registered dataset, identified by `(kind, name)`.
#[derive(Clone)]
pub struct DatasetHandle {
    kind: String,
    name: String,
    slot: Arc<Slot>,
}

impl std::fmt::Debug for DatasetHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetHandle")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("status", &self.status())
            .finish()
    }
}

impl DatasetHandle {
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> LoadStatus {
        self.slot.status()
    }

    /// Relative path under which the explorer shows this dataset.
    pub fn navigation_path(&self) -> String {
        format!(
            "/explorer?ds_kind={}&ds_name={}",
            url_escape(&self.kind),
            url_escape(&self.name)
        )
    }

    /// Materialize the dataset, running the loader if nobody has yet.
    ///
    /// Blocks while another caller is loading the same slot.
    pub fn load(&self) -> Result<Arc<Dataset>, String> {
        let mut state = self.slot.state.lock();
        loop {
            match std::mem::replace(&mut *state, SlotState::Loading) {
                SlotState::Pending(loader) => {
                    drop(state);
                    let outcome = run_loader(loader);
                    let mut state = self.slot.state.lock();
                    *state = match &outcome {
                        Ok(dataset) => SlotState::Ready(Arc::clone(dataset)),
                        Err(e) => {
                            log::error!("loading {} [{}] failed: {e}", self.name, self.kind);
                            SlotState::Failed(e.clone())
                        }
                    };
                    self.slot.settled.notify_all();
                    return outcome;
                }
                SlotState::Loading => {
                    self.slot.settled.wait(&mut state);
                }
                SlotState::Ready(dataset) => {
                    *state = SlotState::Ready(Arc::clone(&dataset));
                    return Ok(dataset);
                }
                SlotState::Failed(e) => {
                    *state = SlotState::Failed(e.clone());
                    return Err(e);
                }
            }
        }
    }

    /// Materialize on a worker thread so the caller is never blocked.
    pub fn load_in_background(&self) -> JoinHandle<Result<Arc<Dataset>, String>> {
        let handle = self.clone();
        thread::spawn(move || handle.load())
    }
}

fn run_loader(loader: Loader) -> Result<Arc<Dataset>, String> {
    match catch_unwind(AssertUnwindSafe(loader)) {
        Ok(Ok(dataset)) => Ok(Arc::new(dataset)),
        Ok(Err(e)) => Err(format!("{e:#}")),
        Err(_) => Err("dataset loader panicked".to_string()),
    }
}

/// Percent-encode everything outside the unreserved set (and `/`).
fn url_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// DatasetRegistry
// ---------------------------------------------------------------------------

/// Arena of dataset slots keyed by `(kind, name)`.
#[derive(Default)]
pub struct DatasetRegistry {
    slots: RwLock<HashMap<(String, String), Arc<Slot>>>,
}

impl DatasetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `(kind, name)` is taken. Failed slots do not count.
    pub fn contains(&self, kind: &str, name: &str) -> bool {
        self.slots
            .read()
            .get(&(kind.to_string(), name.to_string()))
            .is_some_and(|slot| slot.status() != LoadStatus::Failed)
    }

    /// Register a dataset under `(kind, name)` without running its loader.
    ///
    /// The collision check and the insertion happen under one write lock.
    pub fn register(
        &self,
        kind: &str,
        name: &str,
        loader: Loader,
    ) -> Result<DatasetHandle, DuplicateNameError> {
        let key = (kind.to_string(), name.to_string());
        let mut slots = self.slots.write();
        if let Some(existing) = slots.get(&key) {
            if existing.status() != LoadStatus::Failed {
                return Err(DuplicateNameError {
                    kind: key.0,
                    name: key.1,
                });
            }
            log::warn!("replacing failed dataset {name} [{kind}]");
        }
        let slot = Arc::new(Slot::new(loader));
        slots.insert(key, Arc::clone(&slot));
        log::info!("registered dataset {name} [{kind}]");
        Ok(DatasetHandle {
            kind: kind.to_string(),
            name: name.to_string(),
            slot,
        })
    }

    pub fn get(&self, kind: &str, name: &str) -> Option<DatasetHandle> {
        self.slots
            .read()
            .get(&(kind.to_string(), name.to_string()))
            .map(|slot| DatasetHandle {
                kind: kind.to_string(),
                name: name.to_string(),
                slot: Arc::clone(slot),
            })
    }

    /// Names registered under `kind`, sorted.
    pub fn names(&self, kind: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .slots
            .read()
            .keys()
            .filter(|(k, _)| k == kind)
            .map(|(_, n)| n.clone())
            .collect();
        names.sort();
        names
    }
}

// ---------------------------------------------------------------------------
// Registration gateway
// ---------------------------------------------------------------------------

/// Hand a finished dataset to the registry.
///
/// The deferred loader owns the dataset and stamps the user-upload provenance
/// (`is_public = false`, `user_added = true`, `description`) when it runs.
pub fn publish(
    registry: &DatasetRegistry,
    kind: &str,
    name: &str,
    dataset: Dataset,
    description: String,
) -> Result<DatasetHandle, DuplicateNameError> {
    let loader: Loader = Box::new(move || -> anyhow::Result<Dataset> {
        let mut dataset = dataset;
        *dataset.provenance_mut() = Provenance::user_upload(description);
        Ok(dataset)
    });
    registry.register(kind, name, loader)
}

//! Row alignment between metadata keys and spectrum keys.
//!
//! Metadata rows and spectrum rows arrive independently and only share a key
//! *set*. [`align`] finds the row permutation that puts the spectrum rows in
//! metadata order by sorting both sides and composing the two sort orders.

use crate::error::MismatchError;

// ---------------------------------------------------------------------------
// Permutation
// ---------------------------------------------------------------------------

/// A gather permutation: row `i` of the output is row `order[i]` of the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permutation {
    order: Vec<usize>,
}

impl Permutation {
    pub fn identity(len: usize) -> Self {
        Permutation {
            order: (0..len).collect(),
        }
    }

    /// The order that sorts `values` ascending (IEEE total ordering, stable).
    pub fn ascending(values: &[f64]) -> Self {
        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
        Permutation { order }
    }

    pub fn is_identity(&self) -> bool {
        self.order.iter().enumerate().all(|(i, &j)| i == j)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.order
    }

    /// Reorder a borrowed slice.
    pub fn apply<T: Clone>(&self, items: &[T]) -> Vec<T> {
        self.order.iter().map(|&i| items[i].clone()).collect()
    }

    /// Reorder an owned vector without cloning its elements.
    pub fn apply_owned<T>(&self, items: Vec<T>) -> Vec<T> {
        debug_assert_eq!(items.len(), self.order.len());
        let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
        self.order
            .iter()
            .filter_map(|&i| slots.get_mut(i).and_then(Option::take))
            .collect()
    }
}

/// Stable sort order of `items`: `items[argsort(items)[k]]` is ascending in `k`.
pub fn argsort<T: Ord>(items: &[T]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by(|&a, &b| items[a].cmp(&items[b]));
    order
}

// ---------------------------------------------------------------------------
// Alignment
// ---------------------------------------------------------------------------

/// Find the permutation that reorders `data_keys` into `meta_keys` order.
///
/// Both sequences must be duplicate-free. Whitespace around data keys is
/// ignored. An empty `meta_keys` means no metadata: identity.
pub fn align(meta_keys: &[String], data_keys: &[String]) -> Result<Permutation, MismatchError> {
    if meta_keys.is_empty() {
        return Ok(Permutation::identity(data_keys.len()));
    }

    let data: Vec<&str> = data_keys.iter().map(|k| k.trim()).collect();

    if meta_keys.iter().map(String::as_str).eq(data.iter().copied()) {
        return Ok(Permutation::identity(data.len()));
    }

    if meta_keys.len() != data.len() {
        return Err(MismatchError::RowCount {
            metadata: meta_keys.len(),
            spectra: data.len(),
        });
    }

    let meta: Vec<&str> = meta_keys.iter().map(String::as_str).collect();
    let meta_order = argsort(&meta);
    let data_order = argsort(&data);

    for (&m, &d) in meta_order.iter().zip(&data_order) {
        if meta[m] != data[d] {
            // the smaller of the two is the one missing from the other side
            return Err(if meta[m] < data[d] {
                MismatchError::KeySets {
                    key: meta[m].to_string(),
                    missing_from: "spectra",
                }
            } else {
                MismatchError::KeySets {
                    key: data[d].to_string(),
                    missing_from: "metadata",
                }
            });
        }
    }

    // The data row at sorted rank j sits at data_order[j] and must land at
    // meta_order[j]: scatter destinations, gathering is the inverse.
    let mut order = vec![0usize; data.len()];
    for (&m, &d) in meta_order.iter().zip(&data_order) {
        order[m] = d;
    }
    let permutation = Permutation { order };

    assert!(
        permutation
            .as_slice()
            .iter()
            .map(|&i| data[i])
            .eq(meta.iter().copied()),
        "key alignment produced an order that does not match the metadata"
    );
    Ok(permutation)
}

//! Meta directory — the in-memory index of `.sst` files, keyed by each
//! file's largest key.
//!
//! Grounded on `meta_node`/`meta_get`/`meta_set`/`meta_set_byname` in
//! `original_source/engine/sst.c`. An ordered set of descriptors queryable
//! by key is exactly what `BTreeMap<end_key, Descriptor>` gives for free:
//! `meta_get` becomes a range query for the smallest key `>= search_key`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::SstError;

/// A descriptor for one on-disk `.sst` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    /// File name, e.g. `"3.sst"`.
    pub index_name: String,
    /// Largest key stored in the file.
    pub end_key: Vec<u8>,
    /// Number of (ADD) records in the file.
    pub record_count: u32,
    /// Logical sequence number, assigned on insertion and preserved across
    /// in-place rewrites.
    pub lsn: i64,
}

/// Ordered directory of [`Descriptor`]s, keyed by `end_key`.
#[derive(Debug, Default)]
pub struct MetaDirectory {
    by_end_key: BTreeMap<Vec<u8>, Descriptor>,
    next_lsn: AtomicI64,
}

impl MetaDirectory {
    pub fn new() -> Self {
        Self {
            by_end_key: BTreeMap::new(),
            next_lsn: AtomicI64::new(0),
        }
    }

    /// Returns the descriptor whose `end_key` is the smallest `end_key >=
    /// key`, or `None` if `key` is larger than every file's `end_key`.
    pub fn get(&self, key: &[u8]) -> Option<&Descriptor> {
        self.by_end_key
            .range(key.to_vec()..)
            .next()
            .map(|(_, desc)| desc)
    }

    /// Insert a brand-new descriptor, assigning a fresh, strictly
    /// increasing `lsn`. If a descriptor already keyed by this `end_key`
    /// exists (same file name happens to end on the same key as another —
    /// should not occur given the partitioning invariant) it is replaced.
    pub fn set(&mut self, index_name: String, end_key: Vec<u8>, record_count: u32) -> i64 {
        let lsn = self.next_lsn.fetch_add(1, Ordering::SeqCst);
        self.by_end_key.insert(
            end_key.clone(),
            Descriptor {
                index_name,
                end_key,
                record_count,
                lsn,
            },
        );
        lsn
    }

    /// Insert a descriptor discovered during bootstrap. The on-disk footer
    /// carries no lsn, so this mints one exactly like [`Self::set`] —
    /// bootstrap order (ascending file name) decides relative lsn order.
    pub fn set_bootstrap(&mut self, index_name: String, end_key: Vec<u8>, record_count: u32) {
        self.set(index_name, end_key, record_count);
    }

    /// Update the descriptor whose `index_name == index_name`, preserving
    /// its `lsn`. The file's `end_key` may have moved (a merge can change
    /// which key is largest in the rewritten file), so the entry is
    /// re-keyed in the underlying map.
    ///
    /// Only ever called mid-merge to rewrite a descriptor the coordinator
    /// itself just resolved via `meta_get`/an active merge buffer, so a
    /// missing `index_name` here means the directory and the merge
    /// coordinator have disagreed about which files exist — an internal
    /// invariant violation, not a caller error, and therefore fatal like
    /// every other mid-merge inconsistency.
    pub fn set_by_name(&mut self, index_name: &str, end_key: Vec<u8>, record_count: u32) {
        let old_key = self
            .by_end_key
            .iter()
            .find(|(_, desc)| desc.index_name == index_name)
            .map(|(k, _)| k.clone());

        let Some(old_key) = old_key else {
            crate::error::fatal(
                "set_by_name invariant violation",
                &SstError::Internal(format!("no existing descriptor for index_name {index_name:?}")),
            );
        };

        let mut desc = self.by_end_key.remove(&old_key).expect("just found");
        desc.end_key = end_key.clone();
        desc.record_count = record_count;
        self.by_end_key.insert(end_key, desc);
    }

    /// Number of descriptors currently tracked. Used to mint the next new
    /// file's name.
    pub fn size(&self) -> usize {
        self.by_end_key.len()
    }

    /// Iterate all descriptors in ascending `end_key` order.
    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.by_end_key.values()
    }
}

//! Approximate-membership filter collaborator.
//!
//! The filter itself is out of scope for this layer: it is maintained by
//! whatever process feeds `from_log = true` batches through
//! [`crate::Sst::merge`], and is consulted by callers *before* reaching for
//! `sst_getoff` to shortcut negative lookups. This layer's only obligation
//! is to call `add(key)` for every ADD record replayed from the log.

/// Contract for the external approximate-membership filter.
///
/// `add` is the only operation this layer ever calls — the filter never
/// shrinks (`add`-only, no removal).
pub trait MembershipFilter {
    fn add(&mut self, key: &[u8]);
}

/// Default bloom-filter-backed adapter, for embedders that don't already
/// own a membership filter elsewhere in the engine.
pub struct BloomMembershipFilter {
    bloom: bloomfilter::Bloom<[u8]>,
}

impl BloomMembershipFilter {
    /// `expected_items` and `false_positive_rate` size the underlying
    /// bloom filter; both are forwarded to `bloomfilter::Bloom::new_for_fp_rate`.
    pub fn new(expected_items: usize, false_positive_rate: f64) -> Self {
        Self {
            bloom: bloomfilter::Bloom::new_for_fp_rate(expected_items.max(1), false_positive_rate)
                .expect("valid bloom filter parameters"),
        }
    }

    pub fn might_contain(&self, key: &[u8]) -> bool {
        self.bloom.check(key)
    }
}

impl MembershipFilter for BloomMembershipFilter {
    fn add(&mut self, key: &[u8]) {
        self.bloom.set(key);
    }
}

//! Caller-supplied configuration for the SST layer.
//!
//! This layer never parses files or environment variables itself — that is
//! the excluded config-loading layer's job. [`SstConfig`] is a plain struct
//! the embedder constructs directly, mirroring how the wider storage engine
//! this layer belongs to hands its own `EngineConfig` in rather than
//! loading it internally.

/// Tunable knobs owned by the SST layer.
#[derive(Debug, Clone, Copy)]
pub struct SstConfig {
    /// Upper bound on the "ordinary" per-file record count. Files may grow
    /// up to `2 * sst_max_count` before a merge splits them.
    pub sst_max_count: usize,

    /// Width, in bytes, of the footer's `last_key` field (see
    /// [`crate::footer`]) on every `.sst` file this handle writes or reads.
    /// Unrelated to a block's per-file key width — the writer's stats pass
    /// still derives each file's block width from the longest key observed
    /// in that batch, whatever it is. Every `Sst` handle over the same
    /// `basedir` must agree on this value, since it determines where the
    /// footer starts on disk.
    pub max_key_size: usize,

    /// Whether to `msync` the block area before `munmap` on the write
    /// path. Failures here are logged but never fatal.
    pub msync_on_write: bool,
}

impl Default for SstConfig {
    fn default() -> Self {
        Self {
            sst_max_count: 4096,
            max_key_size: 256,
            msync_on_write: true,
        }
    }
}

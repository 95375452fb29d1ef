//! # sstlayer
//!
//! The sorted-string-table (SST) persistence and compaction layer of a
//! small log-structured key/value store.
//!
//! This crate owns exactly one job: given an in-memory ordered batch of key
//! operations (produced elsewhere by flushing a memtable or replaying a
//! write-ahead log), merge those operations into zero or more on-disk
//! immutable `.sst` files, and resolve point lookups to a value-log offset.
//! Everything upstream of that — the in-memory ordered container, the
//! value log the returned offsets dereference into, configuration loading,
//! logging setup, and the write-ahead log itself — is an external
//! collaborator this crate only touches through a narrow contract.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                            Sst                               │
//! │                                                               │
//! │  merge(records, from_log) ───────► MergeDirector              │
//! │                                      │                        │
//! │                                      ├─ flush_new_list        │
//! │                                      ├─ flush_list            │
//! │                                      └─ flush_merge_list      │
//! │                                           │         │         │
//! │                                      writer::write  reader::  │
//! │                                      (mmap, fill)   read_mmap │
//! │                                                               │
//! │  get_offset(key) ───► MetaDirectory::get ───► reader::        │
//! │                          │                     read_offset   │
//! │                          └─ ConcurrencyGate (merge target)    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use sstlayer::{Record, Sst, SstConfig};
//!
//! let config = SstConfig {
//!     sst_max_count: 4096,
//!     ..SstConfig::default()
//! };
//! let sst = Sst::open_with_config("/tmp/my-sst-dir", config).unwrap();
//!
//! sst.merge(&[Record::add(b"hello".to_vec(), 42)], false);
//! assert_eq!(sst.get_offset(b"hello"), 42);
//! assert_eq!(sst.get_offset(b"missing"), 0);
//! ```

#![allow(dead_code)]

pub mod config;
mod encoding;
pub mod error;
pub mod filter;
mod footer;
mod gate;
mod meta;
mod merge;
mod reader;
pub mod record;
mod writer;

pub use config::SstConfig;
pub use error::SstError;
pub use filter::{BloomMembershipFilter, MembershipFilter};
pub use record::{Op, Record};

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use gate::ConcurrencyGate;
use meta::MetaDirectory;

/// Default expected-item count fed to the default bloom-filter membership
/// adapter when the embedder doesn't supply its own filter or a more
/// specific estimate.
const DEFAULT_FILTER_CAPACITY: usize = 1 << 16;
const DEFAULT_FILTER_FP_RATE: f64 = 0.01;

/// A handle onto one SST directory: the meta directory, the concurrency
/// gate, and (by default) a bloom-filter membership adapter for the
/// log-replay path.
///
/// Grounded on `struct sst`/`sst_new`/`sst_merge`/`sst_getoff` in
/// `original_source/engine/sst.c`; modeled as an `Arc`-free single-owner
/// handle with interior mutability (`RwLock` around the directory,
/// `Mutex` around the filter) rather than the teacher's
/// `Arc<RwLock<EngineInner>>`, since this layer owns no internal thread
/// pool of its own — callers decide their own threading policy.
pub struct Sst<F: MembershipFilter = BloomMembershipFilter> {
    basedir: PathBuf,
    config: SstConfig,
    meta: RwLock<MetaDirectory>,
    gate: ConcurrencyGate,
    filter: Mutex<F>,
}

impl Sst<BloomMembershipFilter> {
    /// Open (or create) an SST directory at `basedir` with default
    /// configuration and the default bloom-filter membership adapter.
    pub fn open(basedir: impl AsRef<Path>) -> Result<Self, SstError> {
        Self::open_with_config(basedir, SstConfig::default())
    }

    /// Open (or create) an SST directory at `basedir` with caller-supplied
    /// configuration and the default bloom-filter membership adapter.
    pub fn open_with_config(basedir: impl AsRef<Path>, config: SstConfig) -> Result<Self, SstError> {
        let filter = BloomMembershipFilter::new(DEFAULT_FILTER_CAPACITY, DEFAULT_FILTER_FP_RATE);
        Self::open_with_filter(basedir, config, filter)
    }
}

impl<F: MembershipFilter> Sst<F> {
    /// Open (or create) an SST directory, supplying both configuration and
    /// a caller-owned membership filter — for embedders that already
    /// maintain one elsewhere in their engine rather than via this layer's
    /// default adapter.
    pub fn open_with_filter(basedir: impl AsRef<Path>, config: SstConfig, filter: F) -> Result<Self, SstError> {
        let basedir = basedir.as_ref().to_path_buf();
        std::fs::create_dir_all(&basedir)?;

        let meta = bootstrap(&basedir, config.max_key_size)?;

        Ok(Self {
            basedir,
            config,
            meta: RwLock::new(meta),
            gate: ConcurrencyGate::new(),
            filter: Mutex::new(filter),
        })
    }

    /// Directory this handle persists `.sst` files under.
    pub fn basedir(&self) -> &Path {
        &self.basedir
    }

    /// Merge `incoming` (an ordered batch of ADD/DEL records) into the SST
    /// directory.
    ///
    /// When `from_log` is set, every ADD record's key is also inserted into
    /// the membership filter — this flags the batch as a write-ahead-log
    /// replay, for which the filter must observe every key regardless of
    /// whether the corresponding file write is new or an in-place rewrite.
    ///
    /// Infallible from the caller's perspective: I/O failures encountered
    /// while writing `.sst` files abort the process rather than returning a
    /// `Result`, since at that point the on-disk state would otherwise be
    /// ambiguous.
    pub fn merge(&self, incoming: &[Record], from_log: bool) {
        if from_log {
            let mut filter = self.filter.lock().unwrap_or_else(|p| p.into_inner());
            for record in incoming {
                if record.op == Op::Add {
                    filter.add(&record.key);
                }
            }
        }

        let params = merge::MergeParams {
            basedir: &self.basedir,
            sst_max_count: self.config.sst_max_count,
            max_key_size: self.config.max_key_size,
            msync_on_write: self.config.msync_on_write,
            gate: &self.gate,
        };

        merge::run(&params, &self.meta, incoming);
    }

    /// Resolve `key` to its value-log offset, or `0` if absent.
    ///
    /// Takes the concurrency gate only when the resolved file is the one
    /// currently being rewritten by an in-progress merge; otherwise reads
    /// without blocking.
    pub fn get_offset(&self, key: &[u8]) -> u64 {
        let descriptor = {
            let meta = self.meta.read().unwrap_or_else(|p| p.into_inner());
            match meta.get(key) {
                Some(desc) => desc.clone(),
                None => return 0,
            }
        };

        let path = self.basedir.join(&descriptor.index_name);
        let max_key_size = self.config.max_key_size;
        self.gate
            .with_shared(descriptor.lsn, || reader::read_offset(&path, key, max_key_size))
    }

    /// Number of `.sst` files currently tracked.
    pub fn file_count(&self) -> usize {
        self.meta.read().unwrap_or_else(|p| p.into_inner()).size()
    }
}

/// Scan `basedir` for `*.sst` files and rebuild the meta directory from
/// each one's footer.
///
/// Unlike the fatal-abort behavior used for CRC mismatches reached
/// mid-merge, a corrupt file discovered here is surfaced as
/// `Err(SstError::Corrupt)` — no reader or writer has a handle out yet, so
/// there is a safe `Result` to return.
fn bootstrap(basedir: &Path, max_key_size: usize) -> Result<MetaDirectory, SstError> {
    let mut meta = MetaDirectory::new();

    let mut names: Vec<String> = std::fs::read_dir(basedir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".sst"))
        .collect();
    names.sort();

    for name in names {
        let path = basedir.join(&name);
        let mut file = File::open(&path)?;
        let footer = footer::read_footer(&mut file, max_key_size)?.map_err(|_| SstError::Corrupt {
            path: path.clone(),
            reason: "crc sentinel mismatch".to_string(),
        })?;

        if footer.count == 0 {
            tracing::debug!(file = %name, "skipping empty sst file during bootstrap");
            continue;
        }

        meta.set_bootstrap(name.clone(), footer.last_key, footer.count);
        tracing::debug!(file = %name, count = footer.count, "registered sst file during bootstrap");
    }

    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    #[test]
    fn fresh_write_then_point_lookup() {
        init_tracing();
        let dir = tempdir().unwrap();
        let sst = Sst::open(dir.path()).unwrap();

        sst.merge(
            &[
                Record::add(b"a".to_vec(), 1),
                Record::add(b"b".to_vec(), 2),
                Record::add(b"c".to_vec(), 3),
            ],
            false,
        );

        assert_eq!(sst.get_offset(b"a"), 1);
        assert_eq!(sst.get_offset(b"c"), 3);
        assert_eq!(sst.get_offset(b"z"), 0);
        assert_eq!(sst.file_count(), 1);
    }

    #[test]
    fn del_dropped_before_persistence() {
        init_tracing();
        let dir = tempdir().unwrap();
        let sst = Sst::open(dir.path()).unwrap();

        sst.merge(
            &[
                Record::add(b"a".to_vec(), 1),
                Record::del(b"a".to_vec()),
                Record::add(b"b".to_vec(), 2),
            ],
            false,
        );

        assert_eq!(sst.get_offset(b"a"), 0);
        assert_eq!(sst.get_offset(b"b"), 2);
    }

    #[test]
    fn reopen_reloads_identical_directory() {
        init_tracing();
        let dir = tempdir().unwrap();
        {
            let sst = Sst::open(dir.path()).unwrap();
            sst.merge(
                &[Record::add(b"a".to_vec(), 1), Record::add(b"b".to_vec(), 2)],
                false,
            );
        }

        let sst = Sst::open(dir.path()).unwrap();
        assert_eq!(sst.file_count(), 1);
        assert_eq!(sst.get_offset(b"a"), 1);
        assert_eq!(sst.get_offset(b"b"), 2);
    }

    #[test]
    fn corrupt_footer_fails_open() {
        init_tracing();
        let dir = tempdir().unwrap();
        {
            let sst = Sst::open(dir.path()).unwrap();
            sst.merge(&[Record::add(b"a".to_vec(), 1)], false);
        }

        // Stomp the crc sentinel field directly.
        let path = dir.path().join("0.sst");
        let max_key_size = SstConfig::default().max_key_size;
        let bytes = std::fs::read(&path).unwrap();
        let mut bytes = bytes;
        let crc_off = bytes.len() - footer::footer_size(max_key_size) + max_key_size + 4;
        bytes[crc_off..crc_off + 4].copy_from_slice(&0xBADu32.to_be_bytes());
        std::fs::write(&path, bytes).unwrap();

        let result = Sst::open(dir.path());
        assert!(matches!(result, Err(SstError::Corrupt { .. })));
    }

    #[test]
    fn from_log_merge_populates_membership_filter() {
        init_tracing();
        let dir = tempdir().unwrap();
        let sst = Sst::open(dir.path()).unwrap();
        sst.merge(&[Record::add(b"a".to_vec(), 1)], true);

        let filter = sst.filter.lock().unwrap();
        assert!(filter.might_contain(b"a"));
    }
}

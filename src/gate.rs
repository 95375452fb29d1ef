//! Concurrency gate — single mutex plus an "active lsn" marker guarding
//! reads against the one SST file currently being rewritten by merge.
//!
//! Grounded on `original_source/engine/sst.c`'s `mutexer` (a `pthread_mutex_t`
//! paired with a plain `int lsn`); modeled here as a [`Mutex`] paired with an
//! [`AtomicI64`] rather than a bare integer, since the lsn marker is read
//! and written from different threads without the mutex held.

use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

/// No merge currently targets any file.
const NO_ACTIVE_MERGE: i64 = -1;

/// Guards the one `.sst` file a background merge is currently rewriting.
///
/// The gate does not protect creation of new files (they have no readers
/// yet) nor reads of files that are not the active merge target (they are
/// immutable until their turn comes) — only in-place rewrites of an
/// existing, already-registered file.
#[derive(Debug, Default)]
pub struct ConcurrencyGate {
    lock: Mutex<()>,
    active_lsn: AtomicI64,
}

impl ConcurrencyGate {
    pub fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            active_lsn: AtomicI64::new(NO_ACTIVE_MERGE),
        }
    }

    /// Mark `lsn` as the active merge target, run `f` under the gate's
    /// mutex, then clear the marker. Used by the merge path around an
    /// in-place file rewrite.
    pub fn with_exclusive<T>(&self, lsn: i64, f: impl FnOnce() -> T) -> T {
        self.active_lsn.store(lsn, Ordering::SeqCst);
        let guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let result = f();
        drop(guard);
        self.active_lsn.store(NO_ACTIVE_MERGE, Ordering::SeqCst);
        result
    }

    /// Run `f`, taking the gate's mutex only if `lsn` matches the file
    /// currently being rewritten. Used by point lookups.
    pub fn with_shared<T>(&self, lsn: i64, f: impl FnOnce() -> T) -> T {
        if self.active_lsn.load(Ordering::SeqCst) == lsn {
            let guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let result = f();
            drop(guard);
            result
        } else {
            f()
        }
    }
}

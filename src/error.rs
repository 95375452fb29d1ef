//! Error types for the SST layer.
//!
//! Per the layer's error-handling design, only construction (bootstrap) is
//! allowed to fail with a recoverable [`SstError`]. Everything reached once
//! an [`crate::Sst`] handle exists is infallible from the caller's
//! perspective: I/O failures encountered mid-merge abort the process via
//! [`fatal`] instead of returning a `Result`, because at that point the
//! on-disk state would otherwise be ambiguous.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by [`crate::Sst::open`].
#[derive(Debug, Error)]
pub enum SstError {
    /// Underlying filesystem I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An `.sst` file's footer CRC sentinel did not match, or the footer
    /// could not be read at all.
    #[error("corrupt sst file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// An internal invariant was violated — e.g. the merge coordinator
    /// resolved a target file the meta directory no longer has a
    /// descriptor for (`MetaDirectory::set_by_name`). Never returned to a
    /// caller: constructed only as the `Display` value passed to [`fatal`]
    /// immediately before aborting, since by the time such a mismatch is
    /// detected the engine is already past construction.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Logs `message` at `error` level with `err` attached, then aborts the
/// process.
///
/// Used for failures reached once the engine is past construction: file
/// creation, lseek/extend, mmap, or footer-write failures during a merge.
/// The on-disk state after such a failure is ambiguous, so there is no safe
/// `Result` to return to the caller.
pub(crate) fn fatal(message: &str, err: &dyn std::fmt::Display) -> ! {
    tracing::error!(error = %err, "{message}");
    panic!("{message}: {err}");
}

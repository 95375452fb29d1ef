//! SST file writer — stats pass + mmap write pass.
//!
//! Grounded on `_prepare_stats`/`_write_mmap` in `original_source/engine/sst.c`;
//! the create-truncate-extend-mmap idiom follows how the teacher's
//! `sstable::builder` stages writes before an atomic on-disk commit, adapted
//! here to a single `mmap`-backed region (this file format has no header,
//! bloom, or index blocks — just a fixed-width block area and a footer).

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom};
use std::path::Path;

use memmap2::MmapMut;

use crate::error::fatal;
use crate::footer;
use crate::record::{Op, Record};

/// Outcome of writing (or rewriting) a single `.sst` file.
pub(crate) struct WriteOutcome {
    /// Largest key written (empty if the chunk contained no ADDs).
    pub last_key: Vec<u8>,
    /// Number of ADD records persisted (DELs are dropped).
    pub count: u32,
}

struct Stats {
    real_count: u32,
    max_key_len: u32,
    max_lcp: u32,
    block_area_size: u32,
}

fn lcp(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

/// Single scan over `records` computing the layout statistics the write
/// pass needs before it can create and size the file.
fn compute_stats(records: &[Record]) -> Stats {
    let mut real_count: u32 = 0;
    let mut max_key_len: u32 = 0;
    let mut max_lcp: Option<u32> = None;
    let mut tracking = true;
    let mut prev_key: Option<&[u8]> = None;

    for record in records {
        if record.op != Op::Add {
            continue;
        }
        real_count += 1;
        max_key_len = max_key_len.max(record.key.len() as u32);

        if tracking {
            if let Some(prev) = prev_key {
                let k = lcp(prev, &record.key) as u32;
                if k == 0 {
                    tracking = false;
                } else {
                    max_lcp = Some(match max_lcp {
                        None => k,
                        Some(m) => m.min(k),
                    });
                }
            }
        }
        prev_key = Some(&record.key);
    }

    Stats {
        real_count,
        max_key_len,
        max_lcp: max_lcp.unwrap_or(0),
        block_area_size: (max_key_len + 4) * real_count,
    }
}

/// Create (truncating any existing contents of) `path` and write every ADD
/// record in `records` as a fixed-width block, followed by a footer.
///
/// Failures creating the file, extending it, mapping it, or writing the
/// footer are fatal — the on-disk state would otherwise be ambiguous.
/// `msync`/`munmap` failures are logged and
/// swallowed.
pub(crate) fn write(path: &Path, records: &[Record], msync_on_write: bool, max_key_size: usize) -> WriteOutcome {
    let stats = compute_stats(records);
    let record_width = (stats.max_key_len + 4) as usize;

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .unwrap_or_else(|e| fatal(&format!("create sst file {}", path.display()), &e));

    file.set_len(stats.block_area_size as u64)
        .unwrap_or_else(|e| fatal(&format!("extend sst file {}", path.display()), &e));

    let mut last_key: Vec<u8> = Vec::new();

    if stats.block_area_size > 0 {
        let mut mmap = unsafe { MmapMut::map_mut(&file) }
            .unwrap_or_else(|e| fatal(&format!("mmap sst file {} for write", path.display()), &e));

        let mut block_idx = 0usize;
        for record in records {
            if record.op != Op::Add {
                continue;
            }
            let off = block_idx * record_width;
            let key_field = &mut mmap[off..off + stats.max_key_len as usize];
            key_field.fill(0);
            key_field[..record.key.len()].copy_from_slice(&record.key);
            let value_off = off + stats.max_key_len as usize;
            mmap[value_off..value_off + 4].copy_from_slice(&(record.value_ref as u32).to_be_bytes());

            last_key = record.key.clone();
            block_idx += 1;
        }

        if msync_on_write {
            if let Err(e) = mmap.flush() {
                tracing::warn!(path = %path.display(), error = %e, "msync failed");
            }
        }
        drop(mmap);
    }

    file.seek(SeekFrom::End(0))
        .unwrap_or_else(|e| fatal(&format!("seek to footer position in {}", path.display()), &e));

    footer::write_footer(
        &mut file,
        &last_key,
        stats.real_count,
        stats.block_area_size,
        stats.max_key_len,
        stats.max_lcp,
        max_key_size,
    )
    .unwrap_or_else(|e| fatal(&format!("write footer for {}", path.display()), &e));

    WriteOutcome {
        last_key,
        count: stats.real_count,
    }
}

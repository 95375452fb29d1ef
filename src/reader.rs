//! SST file reader — merge-base scan and point lookup.
//!
//! Grounded on `_read_mmap`/`_read_offset` in `original_source/engine/sst.c`.
//! The point-lookup path here uses the same fixed-width block layout the
//! writer produces, and a binary search over the sorted, fixed-width blocks
//! in place of the original's linear scan, while preserving the
//! `0 = absent` sentinel contract.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::error::fatal;
use crate::footer;

fn trim_padding(key: &[u8]) -> &[u8] {
    let end = key.iter().rposition(|&b| b != 0).map(|i| i + 1).unwrap_or(0);
    &key[..end]
}

/// Rebuild the in-memory ordered container ("merge base") from a file's
/// blocks. mmap failure here is fatal: this is only ever called mid-merge,
/// past the point where a clean `Result` could be handed back to an
/// external caller.
pub(crate) fn read_mmap(path: &Path, max_key_size: usize) -> BTreeMap<Vec<u8>, u64> {
    let mut file = File::open(path)
        .unwrap_or_else(|e| fatal(&format!("open sst file {} for merge-base scan", path.display()), &e));

    let footer = footer::read_footer(&mut file, max_key_size)
        .unwrap_or_else(|e| fatal(&format!("read footer of {}", path.display()), &e))
        .unwrap_or_else(|_| fatal(&format!("corrupt sst file {}", path.display()), &"crc sentinel mismatch"));

    let mut base = BTreeMap::new();
    if footer.size == 0 {
        return base;
    }

    let mmap = unsafe { Mmap::map(&file) }
        .unwrap_or_else(|e| fatal(&format!("mmap sst file {} for merge-base scan", path.display()), &e));

    let record_width = footer.max_key_len as usize + 4;
    for i in 0..footer.count as usize {
        let off = i * record_width;
        let key = trim_padding(&mmap[off..off + footer.max_key_len as usize]);
        let value_off = off + footer.max_key_len as usize;
        let value_ref = u32::from_be_bytes(mmap[value_off..value_off + 4].try_into().unwrap()) as u64;
        base.insert(key.to_vec(), value_ref);
    }

    base
}

/// Point lookup: returns the block's `value_ref`, or 0 if `key` is absent
/// from the file. All failures here are non-fatal: logged and treated as
/// "not present".
pub(crate) fn read_offset(path: &Path, key: &[u8], max_key_size: usize) -> u64 {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "open failed during point lookup");
            return 0;
        }
    };

    let footer = match footer::read_footer(&mut file, max_key_size) {
        Ok(Ok(f)) => f,
        Ok(Err(_)) => {
            tracing::warn!(path = %path.display(), "corrupt footer during point lookup");
            return 0;
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "read failed during point lookup");
            return 0;
        }
    };

    if footer.size == 0 || footer.count == 0 {
        return 0;
    }

    let mmap = match unsafe { Mmap::map(&file) } {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "mmap failed during point lookup");
            return 0;
        }
    };

    let max_key_len = footer.max_key_len as usize;
    let record_width = max_key_len + 4;

    let mut padded_key = vec![0u8; max_key_len];
    let copy_len = key.len().min(max_key_len);
    padded_key[..copy_len].copy_from_slice(&key[..copy_len]);

    let mut lo = 0usize;
    let mut hi = footer.count as usize;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let off = mid * record_width;
        let block_key = &mmap[off..off + max_key_len];
        match block_key.cmp(padded_key.as_slice()) {
            std::cmp::Ordering::Equal => {
                let value_off = off + max_key_len;
                return u32::from_be_bytes(mmap[value_off..value_off + 4].try_into().unwrap()) as u64;
            }
            std::cmp::Ordering::Less => lo = mid + 1,
            std::cmp::Ordering::Greater => hi = mid,
        }
    }

    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use crate::writer;
    use tempfile::tempdir;

    const TEST_MAX_KEY_SIZE: usize = 256;

    #[test]
    fn read_mmap_rebuilds_ascending_map() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0.sst");
        let records = vec![
            Record::add(b"a".to_vec(), 1),
            Record::add(b"b".to_vec(), 2),
            Record::add(b"c".to_vec(), 3),
        ];
        writer::write(&path, &records, true, TEST_MAX_KEY_SIZE);

        let base = read_mmap(&path, TEST_MAX_KEY_SIZE);
        assert_eq!(base.len(), 3);
        assert_eq!(base[&b"a".to_vec()], 1);
        assert_eq!(base[&b"c".to_vec()], 3);
    }

    #[test]
    fn read_offset_finds_present_keys_and_misses_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0.sst");
        let records = vec![
            Record::add(b"a".to_vec(), 1),
            Record::add(b"b".to_vec(), 2),
            Record::add(b"c".to_vec(), 3),
        ];
        writer::write(&path, &records, true, TEST_MAX_KEY_SIZE);

        assert_eq!(read_offset(&path, b"a", TEST_MAX_KEY_SIZE), 1);
        assert_eq!(read_offset(&path, b"b", TEST_MAX_KEY_SIZE), 2);
        assert_eq!(read_offset(&path, b"c", TEST_MAX_KEY_SIZE), 3);
        assert_eq!(read_offset(&path, b"z", TEST_MAX_KEY_SIZE), 0);
    }

    #[test]
    fn read_offset_on_missing_file_returns_zero() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.sst");
        assert_eq!(read_offset(&path, b"a", TEST_MAX_KEY_SIZE), 0);
    }
}

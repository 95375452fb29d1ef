//! Footer codec — the fixed-size trailing record of every `.sst` file.
//!
//! Layout (all integers big-endian, see [`crate::encoding`]):
//!
//! ```text
//! [key: max_key_size bytes, zero-padded]
//! [count: u32]
//! [crc: u32]          constant sentinel 0x7DB
//! [size: u32]         block area size in bytes
//! [max_key_len: u32]
//! [max_lcp: u32]      reserved, unused by readers
//! [offset_delta: u64] reserved, may be left 0
//! ```
//!
//! `max_key_size` is not a compile-time constant: it is the caller's
//! [`crate::SstConfig::max_key_size`], threaded through from `Sst` so that
//! an embedder's configured bound actually governs the footer's `key`
//! field width on disk, rather than a hardcoded size the config struct
//! merely documented.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::encoding::{u32_from_be, u32_to_be, u64_from_be, u64_to_be};

/// CRC sentinel constant. Not a computed checksum — a fixed marker value
/// that, if mismatched on read, indicates the file is not a valid (or not
/// fully written) SST file.
pub const CRC_SENTINEL: u32 = 0x7DB;

/// On-disk size of a footer record for a given `max_key_size`.
pub fn footer_size(max_key_size: usize) -> usize {
    max_key_size + 4 + 4 + 4 + 4 + 4 + 8
}

/// Decoded footer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Footer {
    /// Largest key stored in the file (unpadded).
    pub last_key: Vec<u8>,
    /// Number of blocks (ADD records) in the file.
    pub count: u32,
    /// Block area size in bytes.
    pub size: u32,
    /// Maximum key length observed among the file's blocks.
    pub max_key_len: u32,
    /// Reserved: minimum-of-observed longest-common-prefix. Metadata only.
    pub max_lcp: u32,
    /// Reserved forward-compatibility slot.
    pub offset_delta: u64,
}

/// Returned by [`read_footer`] when the CRC sentinel does not match.
#[derive(Debug)]
pub struct Corrupt;

/// Append a footer to `file` at its current write position (must be the
/// end of the block area).
///
/// `last_key` is truncated to `max_key_size` bytes and zero-padded; any
/// key this layer actually writes is expected to fit within that bound.
pub fn write_footer(
    file: &mut File,
    last_key: &[u8],
    count: u32,
    block_area_size: u32,
    max_key_len: u32,
    max_lcp: u32,
    max_key_size: usize,
) -> io::Result<()> {
    let mut buf = vec![0u8; footer_size(max_key_size)];
    let key_len = last_key.len().min(max_key_size);
    buf[..key_len].copy_from_slice(&last_key[..key_len]);

    let mut off = max_key_size;
    buf[off..off + 4].copy_from_slice(&u32_to_be(count));
    off += 4;
    buf[off..off + 4].copy_from_slice(&u32_to_be(CRC_SENTINEL));
    off += 4;
    buf[off..off + 4].copy_from_slice(&u32_to_be(block_area_size));
    off += 4;
    buf[off..off + 4].copy_from_slice(&u32_to_be(max_key_len));
    off += 4;
    buf[off..off + 4].copy_from_slice(&u32_to_be(max_lcp));
    off += 4;
    buf[off..off + 8].copy_from_slice(&u64_to_be(0));

    file.write_all(&buf)
}

/// Read and decode the footer from the end of `file`.
///
/// Returns `Ok(Err(Corrupt))` (rather than an I/O error) specifically when
/// the file was readable but the CRC sentinel did not match — the caller
/// decides whether that is fatal (merge path) or a constructor-time error
/// (bootstrap).
pub fn read_footer(file: &mut File, max_key_size: usize) -> io::Result<Result<Footer, Corrupt>> {
    let size = footer_size(max_key_size);
    file.seek(SeekFrom::End(-(size as i64)))?;
    let mut buf = vec![0u8; size];
    file.read_exact(&mut buf)?;

    let mut off = max_key_size;
    let count = u32_from_be(&buf[off..off + 4]);
    off += 4;
    let crc = u32_from_be(&buf[off..off + 4]);
    off += 4;
    let block_area_size = u32_from_be(&buf[off..off + 4]);
    off += 4;
    let max_key_len = u32_from_be(&buf[off..off + 4]);
    off += 4;
    let max_lcp = u32_from_be(&buf[off..off + 4]);
    off += 4;
    let offset_delta = u64_from_be(&buf[off..off + 8]);

    if crc != CRC_SENTINEL {
        return Ok(Err(Corrupt));
    }

    let key_end = buf[..max_key_size]
        .iter()
        .rposition(|&b| b != 0)
        .map(|i| i + 1)
        .unwrap_or(0);
    let last_key = buf[..key_end].to_vec();

    Ok(Ok(Footer {
        last_key,
        count,
        size: block_area_size,
        max_key_len,
        max_lcp,
        offset_delta,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use tempfile::tempdir;

    const TEST_MAX_KEY_SIZE: usize = 16;

    #[test]
    fn write_then_read_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0.sst");
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .read(true)
            .truncate(true)
            .open(&path)
            .unwrap();

        write_footer(&mut file, b"zzz", 3, 96, 8, 2, TEST_MAX_KEY_SIZE).unwrap();

        let footer = read_footer(&mut file, TEST_MAX_KEY_SIZE).unwrap().unwrap();
        assert_eq!(footer.last_key, b"zzz");
        assert_eq!(footer.count, 3);
        assert_eq!(footer.size, 96);
        assert_eq!(footer.max_key_len, 8);
        assert_eq!(footer.max_lcp, 2);
        assert_eq!(footer.offset_delta, 0);
    }

    #[test]
    fn corrupt_sentinel_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0.sst");
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .read(true)
            .truncate(true)
            .open(&path)
            .unwrap();

        // Write a footer then stomp the crc field.
        write_footer(&mut file, b"k", 1, 8, 1, 0, TEST_MAX_KEY_SIZE).unwrap();
        file.seek(SeekFrom::End(
            -(footer_size(TEST_MAX_KEY_SIZE) as i64) + TEST_MAX_KEY_SIZE as i64 + 4,
        ))
        .unwrap();
        file.write_all(&u32_to_be(0xBAD)).unwrap();

        let result = read_footer(&mut file, TEST_MAX_KEY_SIZE).unwrap();
        assert!(result.is_err());
    }

    #[test]
    fn differing_max_key_size_changes_on_disk_footer_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0.sst");
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .read(true)
            .truncate(true)
            .open(&path)
            .unwrap();

        write_footer(&mut file, b"k", 1, 8, 1, 0, 64).unwrap();
        assert_eq!(file.metadata().unwrap().len() as usize, footer_size(64));
    }
}

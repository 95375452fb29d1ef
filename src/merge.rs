//! Merge/compaction coordinator.
//!
//! Grounded on `_flush_new_list`/`_flush_list`/`_flush_merge_list`/
//! `sst_merge` in `original_source/engine/sst.c`. The incoming ordered
//! batch collaborator is modeled as a plain `&[Record]` slice; the
//! on-disk-reconstructed merge base is a `BTreeMap<Vec<u8>, u64>` built by
//! [`crate::reader::read_mmap`].

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::RwLock;

use crate::gate::ConcurrencyGate;
use crate::meta::{Descriptor, MetaDirectory};
use crate::reader;
use crate::record::{Op, Record};
use crate::writer;

/// Everything the coordinator needs that isn't the meta directory or the
/// incoming batch itself.
pub(crate) struct MergeParams<'a> {
    pub basedir: &'a Path,
    pub sst_max_count: usize,
    pub max_key_size: usize,
    pub msync_on_write: bool,
    pub gate: &'a ConcurrencyGate,
}

/// Entry point: dispatches to the empty-directory or merge-into-existing
/// path.
///
/// `meta` is locked only for the brief span of each individual lookup or
/// mutation below, never for the whole merge — the file contents of
/// whichever single file is being rewritten in place are the only thing the
/// concurrency gate needs to protect; every other file's point lookups, and
/// the directory itself between mutations, must stay available to readers
/// running on other threads for the rest of the merge's duration.
pub(crate) fn run(params: &MergeParams, meta: &RwLock<MetaDirectory>, records: &[Record]) {
    let empty = meta.read().unwrap_or_else(|p| p.into_inner()).size() == 0;
    if empty {
        flush_new_list(params, meta, records);
    } else {
        flush_list(params, meta, records);
    }
}

fn write_new_file(params: &MergeParams, meta: &RwLock<MetaDirectory>, records: &[Record]) {
    let name = format!("{}.sst", meta.read().unwrap_or_else(|p| p.into_inner()).size());
    let path = params.basedir.join(&name);
    tracing::debug!(file = %name, records = records.len(), "writing new sst file");
    let outcome = writer::write(&path, records, params.msync_on_write, params.max_key_size);
    meta.write()
        .unwrap_or_else(|p| p.into_inner())
        .set(name, outcome.last_key, outcome.count);
}

fn write_in_place(
    params: &MergeParams,
    meta: &RwLock<MetaDirectory>,
    target: &Descriptor,
    records: &[Record],
    take_gate: bool,
) {
    let path = params.basedir.join(&target.index_name);
    tracing::debug!(
        file = %target.index_name,
        records = records.len(),
        gate = take_gate,
        "rewriting sst file in place"
    );
    let outcome = if take_gate {
        params.gate.with_exclusive(target.lsn, || {
            writer::write(&path, records, params.msync_on_write, params.max_key_size)
        })
    } else {
        writer::write(&path, records, params.msync_on_write, params.max_key_size)
    };
    meta.write()
        .unwrap_or_else(|p| p.into_inner())
        .set_by_name(&target.index_name, outcome.last_key, outcome.count);
}

/// No existing SST files cover (part of) this batch: partition into
/// `sst_max_count`-sized chunks, the last chunk absorbing the remainder.
fn flush_new_list(params: &MergeParams, meta: &RwLock<MetaDirectory>, records: &[Record]) {
    let max_count = params.sst_max_count;
    let count = records.len();
    if count == 0 {
        return;
    }

    if count <= 2 * max_count {
        write_new_file(params, meta, records);
        return;
    }

    let mul = count / max_count - 1;
    let mut idx = 0;
    for _ in 0..mul {
        write_new_file(params, meta, &records[idx..idx + max_count]);
        idx += max_count;
    }
    write_new_file(params, meta, &records[idx..]);
}

/// Rewrite (or split) a merge buffer back onto disk.
///
/// `take_gate = false` mirrors the original source's quirk for the "miss"
/// case in [`flush_list`]: the buffer is still written back to its own
/// file, but without taking the concurrency gate around that write.
fn flush_merge_list(
    params: &MergeParams,
    meta: &RwLock<MetaDirectory>,
    records: Vec<Record>,
    target: &Descriptor,
    take_gate: bool,
) {
    let max_count = params.sst_max_count;
    let count = records.len();

    if count <= 2 * max_count {
        write_in_place(params, meta, target, &records, take_gate);
        return;
    }

    write_in_place(params, meta, target, &records[..max_count], take_gate);

    let remaining = &records[max_count..];
    let mul = (count - 2 * max_count) / max_count;
    let mut idx = 0;
    for _ in 0..mul {
        write_new_file(params, meta, &remaining[idx..idx + max_count]);
        idx += max_count;
    }
    write_new_file(params, meta, &remaining[idx..]);
}

fn apply(buf: &mut BTreeMap<Vec<u8>, u64>, record: &Record) {
    match record.op {
        Op::Add => {
            buf.insert(record.key.clone(), record.value_ref);
        }
        Op::Del => {
            buf.remove(&record.key);
        }
    }
}

fn buffer_to_records(buf: BTreeMap<Vec<u8>, u64>) -> Vec<Record> {
    buf.into_iter()
        .map(|(key, value_ref)| Record {
            key,
            op: Op::Add,
            value_ref,
        })
        .collect()
}

/// Walk the incoming batch, routing each record to the SST file whose
/// end-key range contains it, merging contiguous runs destined for the
/// same file through a single freshly loaded merge buffer.
fn flush_list(params: &MergeParams, meta: &RwLock<MetaDirectory>, records: &[Record]) {
    let mut active: Option<(Descriptor, BTreeMap<Vec<u8>, u64>)> = None;
    let mut i = 0;

    while i < records.len() {
        let cur = &records[i];
        let hit = meta.read().unwrap_or_else(|p| p.into_inner()).get(&cur.key).cloned();

        match hit {
            None => {
                if let Some((desc, buf)) = active.take() {
                    flush_merge_list(params, meta, buffer_to_records(buf), &desc, false);
                }
                flush_new_list(params, meta, &records[i..]);
                return;
            }
            Some(desc) => {
                let needs_reload = match &active {
                    Some((active_desc, _)) => active_desc.index_name != desc.index_name,
                    None => true,
                };
                if needs_reload {
                    if let Some((old_desc, old_buf)) = active.take() {
                        flush_merge_list(params, meta, buffer_to_records(old_buf), &old_desc, true);
                    }
                    let buf = reader::read_mmap(&params.basedir.join(&desc.index_name), params.max_key_size);
                    active = Some((desc, buf));
                }
                let (_, buf) = active.as_mut().expect("just populated above");
                apply(buf, cur);
            }
        }
        i += 1;
    }

    if let Some((desc, buf)) = active.take() {
        flush_merge_list(params, meta, buffer_to_records(buf), &desc, true);
    }
}

//! Single-row storage adapter: read/write/clear one row by
//! `(StorageDescription, Key)`, plus a descendant iterator for a key's whole
//! subtree. Generalizes a single fixed MVCC row table's fetch/store methods
//! to any object bound to a directory-allocated prefix.

use crate::error::Result;
use crate::hkey::HKey;
use crate::key::{pack, unpack, Edge, Key};
use crate::kv::Transaction;
use crate::metrics::Metrics;
use crate::row::RowData;

/// Binds a logical object (table, group, index, or sequence) to the packed
/// byte prefix the directory layer allocated for it. Immutable once
/// resolved for a schema generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageDescription {
    pub name: String,
    pub prefix: Vec<u8>,
}

impl StorageDescription {
    pub fn new(name: impl Into<String>, prefix: Vec<u8>) -> Self {
        StorageDescription {
            name: name.into(),
            prefix,
        }
    }
}

/// Writes `pack(desc, key) = row`. No uniqueness check here — that is the
/// index writer's job.
pub fn store(
    txn: &mut dyn Transaction,
    metrics: &Metrics,
    desc: &StorageDescription,
    key: &Key,
    row: &RowData,
) -> Result<()> {
    let packed = pack(&desc.prefix, key, None);
    tracing::trace!(object = %desc.name, "store row");
    txn.set(&packed, row.as_bytes().to_vec());
    metrics.rows_stored.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    Ok(())
}

/// Reads the row at `key`, if any.
pub fn fetch(
    txn: &mut dyn Transaction,
    metrics: &Metrics,
    desc: &StorageDescription,
    key: &Key,
) -> Result<Option<RowData>> {
    let packed = pack(&desc.prefix, key, None);
    let found = txn.get(&packed)?;
    metrics.rows_fetched.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    Ok(found.map(RowData::from_bytes))
}

/// Deletes the row at `key`, returning whether it existed.
///
/// The existence flag costs an extra point read today; a future store API
/// that returns this directly from `clear` would let us drop it. Until
/// then this is exact, not a stub.
pub fn clear(
    txn: &mut dyn Transaction,
    metrics: &Metrics,
    desc: &StorageDescription,
    key: &Key,
) -> Result<bool> {
    let packed = pack(&desc.prefix, key, None);
    let existed = txn.get(&packed)?.is_some();
    txn.clear(&packed);
    metrics.rows_cleared.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    Ok(existed)
}

/// Read-only half-open range `[pack(desc,key,BEFORE), pack(desc,key,AFTER))`
/// — every row whose key has `key` as a prefix, decoded back to `(Key,
/// RowData)` pairs. `remove()` on the returned items is not
/// supported: this is purely a read path.
pub fn descendant_iterator(
    txn: &mut dyn Transaction,
    metrics: &Metrics,
    desc: &StorageDescription,
    key: &Key,
) -> Result<Vec<(Key, RowData)>> {
    let begin = pack(&desc.prefix, key, Some(Edge::Before));
    let end = pack(&desc.prefix, key, Some(Edge::After));
    let raw = txn.get_range(&begin, &end, None, false)?;
    let mut out = Vec::with_capacity(raw.len());
    for (k, v) in raw {
        let decoded = unpack(&desc.prefix, &k)?;
        out.push((decoded, RowData::from_bytes(v)));
        metrics.rows_fetched.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }
    Ok(out)
}

/// A hierarchical-key variant of [`descendant_iterator`] used by the group
/// iterator's subtree overload; kept here since it shares
/// the same half-open-range construction.
pub fn hkey_subtree_range(desc: &StorageDescription, hkey: &HKey) -> (Vec<u8>, Vec<u8>) {
    hkey.subtree_range(&desc.prefix)
}

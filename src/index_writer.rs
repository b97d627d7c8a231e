//! Index row maintenance: build an index row's key from a
//! table row and its hkey, check uniqueness, write, and delete. Generalizes
//! a one-fixed-single-column-index-per-insert approach to the six-way
//! `IndexKind` fan-out of [`crate::index`] and to multi-column keys.
//!
//! Value format: `pack(&[], hkey.key(), None)` — the matching table row's
//! hkey, tuple-encoded with no prefix, so an index lookup resolves straight
//! to the row it points at without a second directory hop.

use crate::error::{AdapterError, Result};
use crate::hkey::HKey;
use crate::index::{IndexDescriptor, IndexKind};
use crate::key::{pack, strinc, unpack, Key, Segment};
use crate::kv::Transaction;
use crate::row::RowData;
use crate::{counter, nullsep};

fn hkey_value(hkey: &HKey) -> Vec<u8> {
    pack(&[], hkey.key(), None)
}

fn decode_hkey_value(bytes: &[u8]) -> Result<HKey> {
    unpack(&[], bytes).map(HKey::from_key)
}

/// Builds the key-column segments for `row` and reports whether any of them
/// is SQL NULL — the nullable-unique index needs to know this before it
/// decides whether a fresh separator is required.
fn construct_key_columns(index: &IndexDescriptor, row: &RowData) -> Result<(Key, bool)> {
    let mut key = Key::new();
    let mut any_null = false;
    for column in &index.columns {
        if column.is_null(row)? {
            any_null = true;
        }
        key.push(column.extract(row)?);
    }
    Ok((key, any_null))
}

/// An inline unique check deferred to just before commit, for bulk-insert
/// paths that want to batch all of a statement's uniqueness checks into one
/// pass instead of interleaving a `get` between every `set`.
pub struct PendingUniqueCheck {
    index_name: String,
    packed_key: Vec<u8>,
    pre_existing: bool,
}

enum UniqueCheck<'a> {
    Inline,
    Deferred(&'a mut Vec<PendingUniqueCheck>),
}

fn duplicate_key_error(index: &IndexDescriptor, key: &Key) -> AdapterError {
    AdapterError::DuplicateKey {
        index: index.name.clone(),
        row: format!("{:?}", key.segments()),
    }
}

/// Full index key for a row: key columns, then either a trailing
/// null-separator segment (unique, nullable indexes — `Int(0)` when no
/// column is null so non-null rows stay deterministically unique, a freshly
/// allocated separator when one is) or the row's own hkey
/// segments (non-unique indexes). A non-unique index's key columns alone are
/// not enough to identify a KV slot: a disambiguator is only defined for the
/// unique-and-nullable case, but two distinct rows sharing the same
/// indexed value are exactly what "non-unique" means, and each needs its own
/// entry to be scannable — so we append the hkey the same way the value
/// already carries it, making the on-disk key trivially unique without a
/// second allocator.
fn construct_full_key(
    index: &IndexDescriptor,
    row: &RowData,
    hkey: &HKey,
    null_sep: &mut dyn FnMut() -> Result<i64>,
) -> Result<(Key, bool)> {
    let (mut key, any_null) = construct_key_columns(index, row)?;
    if index.unique_and_may_contain_nulls {
        let sep = if any_null { null_sep()? } else { 0 };
        key.push(Segment::Int(sep));
    } else if !index.unique {
        for segment in hkey.key().segments() {
            key.push(segment.clone());
        }
    }
    Ok((key, any_null))
}

fn check_inline(txn: &mut dyn Transaction, index: &IndexDescriptor, packed_key: &[u8], key: &Key) -> Result<()> {
    if txn.get(packed_key)?.is_some() {
        tracing::trace!(index = %index.name, "uniqueness check failed");
        return Err(duplicate_key_error(index, key));
    }
    Ok(())
}

fn checks_apply(index: &IndexDescriptor, any_null: bool) -> bool {
    index.unique && !(index.unique_and_may_contain_nulls && any_null)
}

fn insert_with_check(
    txn: &mut dyn Transaction,
    index: &IndexDescriptor,
    row: &RowData,
    hkey: &HKey,
    null_sep: &mut dyn FnMut() -> Result<i64>,
    check: UniqueCheck,
) -> Result<()> {
    let (full_key, any_null) = construct_full_key(index, row, hkey, null_sep)?;
    let packed_key = pack(&index.storage.prefix, &full_key, None);

    if checks_apply(index, any_null) {
        match check {
            UniqueCheck::Inline => check_inline(txn, index, &packed_key, &full_key)?,
            UniqueCheck::Deferred(pending) => {
                // Read before this row's own `set` below, not at resolve
                // time — a transaction is read-your-writes, so checking
                // after the write would always see this row's own entry.
                let pre_existing = txn.get(&packed_key)?.is_some();
                pending.push(PendingUniqueCheck {
                    index_name: index.name.clone(),
                    packed_key: packed_key.clone(),
                    pre_existing,
                });
            }
        }
    }

    txn.set(&packed_key, hkey_value(hkey));
    if matches!(index.kind, IndexKind::Group(_)) {
        counter::increment(txn, &index.storage.prefix)?;
    }
    Ok(())
}

/// Writes `row`'s entry into `index`, checking uniqueness inline before the
/// write.
pub fn insert(
    txn: &mut dyn Transaction,
    index: &IndexDescriptor,
    row: &RowData,
    hkey: &HKey,
    mut null_sep: impl FnMut() -> Result<i64>,
) -> Result<()> {
    insert_with_check(txn, index, row, hkey, &mut null_sep, UniqueCheck::Inline)
}

/// Writes `row`'s entry into `index`, queuing its uniqueness check in
/// `pending` instead of checking it immediately — the caller must run
/// [`resolve_pending_checks`] before committing.
pub fn insert_deferred(
    txn: &mut dyn Transaction,
    index: &IndexDescriptor,
    row: &RowData,
    hkey: &HKey,
    mut null_sep: impl FnMut() -> Result<i64>,
    pending: &mut Vec<PendingUniqueCheck>,
) -> Result<()> {
    insert_with_check(txn, index, row, hkey, &mut null_sep, UniqueCheck::Deferred(pending))
}

/// Resolves every queued check from [`insert_deferred`] calls, failing on
/// the first entry that already existed before its own insert wrote it.
/// Must run before the owning transaction commits.
pub fn resolve_pending_checks(_txn: &mut dyn Transaction, pending: &[PendingUniqueCheck]) -> Result<()> {
    for check in pending {
        if check.pre_existing {
            tracing::trace!(index = %check.index_name, "uniqueness check failed");
            return Err(AdapterError::DuplicateKey {
                index: check.index_name.clone(),
                row: format!("{:?}", check.packed_key),
            });
        }
    }
    Ok(())
}

/// Removes `row`'s entry from `index`. Returns whether an entry was found.
///
/// Nullable-unique indexes can't rebuild their exact key for a null-bearing
/// row (the separator that made it unique isn't derivable from the row
/// alone), so that case scans instead — bounded to
/// `strinc(pack(index, keyColumns))` rather than the whole index's prefix:
/// every row this scan could possibly match shares the same key-column
/// prefix, so the tighter bound is equivalent and avoids walking entries for
/// other key values entirely.
pub fn delete(txn: &mut dyn Transaction, index: &IndexDescriptor, row: &RowData, hkey: &HKey) -> Result<bool> {
    let (key_columns, any_null) = construct_key_columns(index, row)?;
    if index.unique_and_may_contain_nulls && any_null {
        return delete_by_scan(txn, index, &key_columns, hkey);
    }

    let mut full_key = key_columns;
    if index.unique_and_may_contain_nulls {
        full_key.push(Segment::Int(0));
    } else if !index.unique {
        for segment in hkey.key().segments() {
            full_key.push(segment.clone());
        }
    }
    let packed = pack(&index.storage.prefix, &full_key, None);
    let existed = txn.get(&packed)?.is_some();
    if existed {
        txn.clear(&packed);
        if matches!(index.kind, IndexKind::Group(_)) {
            counter::decrement(txn, &index.storage.prefix)?;
        }
    }
    Ok(existed)
}

const SCAN_PAGE_SIZE: usize = 256;

fn delete_by_scan(txn: &mut dyn Transaction, index: &IndexDescriptor, key_columns: &Key, hkey: &HKey) -> Result<bool> {
    let begin = pack(&index.storage.prefix, key_columns, None);
    let end = strinc(&begin);
    let mut cursor = begin;

    loop {
        let page = txn.get_range(&cursor, &end, Some(SCAN_PAGE_SIZE), false)?;
        if page.is_empty() {
            return Ok(false);
        }
        for (k, v) in &page {
            if &decode_hkey_value(v)? == hkey {
                txn.clear(k);
                if matches!(index.kind, IndexKind::Group(_)) {
                    counter::decrement(txn, &index.storage.prefix)?;
                }
                return Ok(true);
            }
        }
        let mut next_cursor = page.last().unwrap().0.clone();
        next_cursor.push(0x00);
        if next_cursor >= end {
            return Ok(false);
        }
        cursor = next_cursor;
    }
}

/// Drops every entry, the counter cell (group indexes), and the
/// null-separator cell for `index` — used when the index itself is dropped.
/// Bulk-clears via the whole-index bound rather than a
/// point-by-point scan.
pub fn drop_index(txn: &mut dyn Transaction, index: &IndexDescriptor) -> Result<()> {
    let (begin, end) = crate::index::whole_index_bounds(index);
    loop {
        let page = txn.get_range(&begin, &end, Some(SCAN_PAGE_SIZE), false)?;
        if page.is_empty() {
            break;
        }
        for (k, _) in &page {
            txn.clear(k);
        }
    }
    if matches!(index.kind, IndexKind::Group(_)) {
        counter::delete(txn, &index.storage.prefix);
    }
    nullsep::delete(txn, &index.storage.prefix);
    Ok(())
}

/// Rebuilds `index` from scratch by streaming `group`'s rows through
/// [`crate::group::GroupIterator`] and re-inserting each one — the
/// out-of-place build path `ChangeLevel::Index` later promotes into place,
/// generalized from a single-column backfill to the composite-column,
/// nullable-unique-aware writer above.
pub fn rebuild_index(
    txn: &mut dyn Transaction,
    group: &crate::storage::StorageDescription,
    index: &IndexDescriptor,
    mut null_sep: impl FnMut() -> Result<i64>,
) -> Result<()> {
    let rows: Vec<_> = crate::group::GroupIterator::full(txn, group)
        .collect::<Result<Vec<_>>>()?;
    tracing::info!(index = %index.name, rows = rows.len(), "rebuilding index");
    for (key, row) in rows {
        let hkey = HKey::from_key(key);
        insert(txn, index, &row, &hkey, &mut null_sep)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexDescriptor, JoinType};
    use crate::key::Segment;
    use crate::kv::sled_store::SledKvStore;
    use crate::kv::KvStore;
    use crate::row::{FieldDef, Value};
    use crate::storage::StorageDescription;

    fn unique_index() -> IndexDescriptor {
        IndexDescriptor::new_table_unique(
            "pk",
            StorageDescription::new("pk", vec![10, 0]),
            vec![FieldDef::new(0)],
        )
    }

    fn nullable_unique_index() -> IndexDescriptor {
        IndexDescriptor::new_table_nullable_unique(
            "uq_email",
            StorageDescription::new("uq_email", vec![11, 0]),
            vec![FieldDef::new(0)],
        )
    }

    fn group_index() -> IndexDescriptor {
        IndexDescriptor::new_group(
            "gi",
            StorageDescription::new("gi", vec![12, 0]),
            JoinType::Left,
            vec![FieldDef::new(0)],
            Default::default(),
            false,
        )
    }

    fn hkey_for(i: i64) -> HKey {
        let mut hkey = HKey::new();
        hkey.push_level(1, vec![Segment::Int(i)]);
        hkey
    }

    fn nonunique_index() -> IndexDescriptor {
        IndexDescriptor::new_table_nonunique(
            "by_status",
            StorageDescription::new("by_status", vec![15, 0]),
            vec![FieldDef::new(0)],
        )
    }

    #[test]
    fn nonunique_index_keeps_distinct_entries_for_a_shared_value() {
        let store = SledKvStore::open_temporary().unwrap();
        let mut txn = store.begin();
        let idx = nonunique_index();
        let row_a = RowData::encode(&[Value::Int(1)]).unwrap();
        let row_b = RowData::encode(&[Value::Int(1)]).unwrap();
        insert(&mut *txn, &idx, &row_a, &hkey_for(1), || unreachable!()).unwrap();
        insert(&mut *txn, &idx, &row_b, &hkey_for(2), || unreachable!()).unwrap();

        let (begin, end) = crate::index::whole_index_bounds(&idx);
        let entries = txn.get_range(&begin, &end, None, false).unwrap();
        assert_eq!(entries.len(), 2, "both rows sharing value 1 must get distinct index entries");

        let deleted_a = delete(&mut *txn, &idx, &row_a, &hkey_for(1)).unwrap();
        assert!(deleted_a);
        let entries_after = txn.get_range(&begin, &end, None, false).unwrap();
        assert_eq!(entries_after.len(), 1);
    }

    #[test]
    fn unique_insert_then_fetch_by_index_key() {
        let store = SledKvStore::open_temporary().unwrap();
        let mut txn = store.begin();
        let idx = unique_index();
        let row = RowData::encode(&[Value::Int(7)]).unwrap();
        let hkey = hkey_for(7);
        insert(&mut *txn, &idx, &row, &hkey, || unreachable!()).unwrap();

        let key = Key::from_segments(vec![Segment::Int(7)]);
        let packed = pack(&idx.storage.prefix, &key, None);
        let value = txn.get(&packed).unwrap().unwrap();
        assert_eq!(decode_hkey_value(&value).unwrap(), hkey);
    }

    #[test]
    fn duplicate_unique_key_is_rejected() {
        let store = SledKvStore::open_temporary().unwrap();
        let mut txn = store.begin();
        let idx = unique_index();
        let row1 = RowData::encode(&[Value::Int(1)]).unwrap();
        let row2 = RowData::encode(&[Value::Int(1)]).unwrap();
        insert(&mut *txn, &idx, &row1, &hkey_for(1), || unreachable!()).unwrap();
        let err = insert(&mut *txn, &idx, &row2, &hkey_for(2), || unreachable!()).unwrap_err();
        assert!(matches!(err, AdapterError::DuplicateKey { .. }));
    }

    #[test]
    fn nullable_unique_allows_many_nulls_but_rejects_duplicate_values() {
        let store = SledKvStore::open_temporary().unwrap();
        let mut txn = store.begin();
        let idx = nullable_unique_index();
        let mut sep_counter = 0i64;
        let mut alloc = || {
            sep_counter += 1;
            Ok(sep_counter)
        };

        let null_row = RowData::encode(&[Value::Null]).unwrap();
        insert(&mut *txn, &idx, &null_row, &hkey_for(1), &mut alloc).unwrap();
        insert(&mut *txn, &idx, &null_row, &hkey_for(2), &mut alloc).unwrap();
        insert(&mut *txn, &idx, &null_row, &hkey_for(3), &mut alloc).unwrap();

        let real_row = RowData::encode(&[Value::Text("a@b.com".into())]).unwrap();
        insert(&mut *txn, &idx, &real_row, &hkey_for(4), &mut alloc).unwrap();
        let dup = RowData::encode(&[Value::Text("a@b.com".into())]).unwrap();
        let err = insert(&mut *txn, &idx, &dup, &hkey_for(5), &mut alloc).unwrap_err();
        assert!(matches!(err, AdapterError::DuplicateKey { .. }));
    }

    #[test]
    fn delete_by_scan_removes_exactly_the_matching_null_row() {
        let store = SledKvStore::open_temporary().unwrap();
        let mut txn = store.begin();
        let idx = nullable_unique_index();
        let mut sep_counter = 0i64;
        let mut alloc = || {
            sep_counter += 1;
            Ok(sep_counter)
        };
        let null_row = RowData::encode(&[Value::Null]).unwrap();
        insert(&mut *txn, &idx, &null_row, &hkey_for(1), &mut alloc).unwrap();
        insert(&mut *txn, &idx, &null_row, &hkey_for(2), &mut alloc).unwrap();

        let deleted = delete(&mut *txn, &idx, &null_row, &hkey_for(1)).unwrap();
        assert!(deleted);

        let still_missing = delete(&mut *txn, &idx, &null_row, &hkey_for(1)).unwrap();
        assert!(!still_missing);
        let still_there = delete(&mut *txn, &idx, &null_row, &hkey_for(2)).unwrap();
        assert!(still_there);
    }

    #[test]
    fn group_index_maintains_its_counter() {
        let store = SledKvStore::open_temporary().unwrap();
        let mut txn = store.begin();
        let idx = group_index();
        let row = RowData::encode(&[Value::Int(1)]).unwrap();
        insert(&mut *txn, &idx, &row, &hkey_for(1), || unreachable!()).unwrap();
        assert_eq!(counter::count_exact(&mut *txn, &idx.storage.prefix).unwrap(), 1);
        delete(&mut *txn, &idx, &row, &hkey_for(1)).unwrap();
        assert_eq!(counter::count_exact(&mut *txn, &idx.storage.prefix).unwrap(), 0);
    }

    #[test]
    fn deferred_checks_resolve_before_commit() {
        let store = SledKvStore::open_temporary().unwrap();
        let mut txn = store.begin();
        let idx = unique_index();
        let mut pending = Vec::new();
        let row1 = RowData::encode(&[Value::Int(1)]).unwrap();
        let row2 = RowData::encode(&[Value::Int(2)]).unwrap();
        insert_deferred(&mut *txn, &idx, &row1, &hkey_for(1), || unreachable!(), &mut pending).unwrap();
        insert_deferred(&mut *txn, &idx, &row2, &hkey_for(2), || unreachable!(), &mut pending).unwrap();
        assert!(resolve_pending_checks(&mut *txn, &pending).is_ok());
    }

    #[test]
    fn deferred_checks_catch_a_real_duplicate_between_two_rows() {
        let store = SledKvStore::open_temporary().unwrap();
        let mut txn = store.begin();
        let idx = unique_index();
        let mut pending = Vec::new();
        let row1 = RowData::encode(&[Value::Int(1)]).unwrap();
        let row2 = RowData::encode(&[Value::Int(1)]).unwrap();
        insert_deferred(&mut *txn, &idx, &row1, &hkey_for(1), || unreachable!(), &mut pending).unwrap();
        insert_deferred(&mut *txn, &idx, &row2, &hkey_for(2), || unreachable!(), &mut pending).unwrap();
        assert!(matches!(
            resolve_pending_checks(&mut *txn, &pending),
            Err(AdapterError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn drop_index_clears_entries_and_counter() {
        let store = SledKvStore::open_temporary().unwrap();
        let mut txn = store.begin();
        let idx = group_index();
        for i in 0..5 {
            let row = RowData::encode(&[Value::Int(i)]).unwrap();
            insert(&mut *txn, &idx, &row, &hkey_for(i), || unreachable!()).unwrap();
        }
        drop_index(&mut *txn, &idx).unwrap();
        assert_eq!(counter::count_exact(&mut *txn, &idx.storage.prefix).unwrap(), 0);
        let (begin, end) = crate::index::whole_index_bounds(&idx);
        assert!(txn.get_range(&begin, &end, None, false).unwrap().is_empty());
    }

    #[test]
    fn rebuild_index_reindexes_every_row_in_the_group() {
        let store = SledKvStore::open_temporary().unwrap();
        let mut txn = store.begin();
        let metrics = crate::metrics::Metrics::default();
        let group = StorageDescription::new("g", vec![13, 0]);
        for i in 0..5i64 {
            let mut hkey = HKey::new();
            hkey.push_level(1, vec![Segment::Int(i)]);
            let row = RowData::encode(&[Value::Int(i * 10)]).unwrap();
            crate::storage::store(&mut *txn, &metrics, &group, hkey.key(), &row).unwrap();
        }

        let idx = IndexDescriptor::new_table_nonunique("by_val", StorageDescription::new("by_val", vec![14, 0]), vec![FieldDef::new(0)]);
        rebuild_index(&mut *txn, &group, &idx, || unreachable!()).unwrap();

        let (begin, end) = crate::index::whole_index_bounds(&idx);
        let entries = txn.get_range(&begin, &end, None, false).unwrap();
        assert_eq!(entries.len(), 5);
    }
}

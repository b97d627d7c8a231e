//! Null-separator allocator: one monotonic counter per
//! `uniqueAndMayContainNulls` index, run in its own fresh transaction so it
//! never becomes a conflict hotspot for bulk inserts — the same
//! reasoning the sequence allocator's refill follows in §4.7.

use crate::error::{AdapterError, Result};
use crate::kv::KvStore;

const NULL_PREFIX: &[u8] = b"\xfe\x03indexNull";

fn null_key(index_prefix: &[u8]) -> Vec<u8> {
    let mut k = NULL_PREFIX.to_vec();
    k.extend_from_slice(index_prefix);
    k
}

/// Allocates and returns the next null-separator value for `index_prefix`,
/// starting at 1 (0 is reserved to mean "no null in this row's key
/// columns").
pub fn next_null_separator(store: &dyn KvStore, index_prefix: &[u8]) -> Result<i64> {
    let mut txn = store.begin();
    let key = null_key(index_prefix);
    let current = match txn.get(&key)? {
        None => 0,
        Some(b) => {
            let raw: [u8; 8] = b
                .as_slice()
                .try_into()
                .map_err(|_| AdapterError::CorruptValue("corrupt null-separator cell".into()))?;
            i64::from_le_bytes(raw)
        }
    };
    let next = current
        .checked_add(1)
        .ok_or_else(|| AdapterError::InternalInvariantViolation("null-separator space exhausted".into()))?;
    txn.set(&key, next.to_le_bytes().to_vec());
    txn.commit()?;
    Ok(next)
}

/// Dropping the index drops its null-separator cell, in the caller's
/// transaction (this one isn't a hotspot concern — it only runs at DDL
/// time).
pub fn delete(txn: &mut dyn crate::kv::Transaction, index_prefix: &[u8]) {
    txn.clear(&null_key(index_prefix));
}

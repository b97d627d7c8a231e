//! Group-index row counter: one cell per group index holding
//! a little-endian signed 64-bit row count, maintained purely through the KV
//! store's atomic `ADD` mutation so concurrent inserters never serialize
//! against each other and never add a read-conflict range.

use crate::error::{AdapterError, Result};
use crate::kv::Transaction;

const COUNT_PREFIX: &[u8] = b"\xfe\x02indexCount";

fn count_key(index_prefix: &[u8]) -> Vec<u8> {
    let mut k = COUNT_PREFIX.to_vec();
    k.extend_from_slice(index_prefix);
    k
}

/// +1 on an inserted index row.
pub fn increment(txn: &dyn Transaction, index_prefix: &[u8]) -> Result<()> {
    txn.mutate_add(&count_key(index_prefix), 1)
}

/// -1 on a deleted (maintained) index row.
pub fn decrement(txn: &dyn Transaction, index_prefix: &[u8]) -> Result<()> {
    txn.mutate_add(&count_key(index_prefix), -1)
}

fn decode(bytes: Option<Vec<u8>>) -> Result<i64> {
    match bytes {
        None => Ok(0),
        Some(b) => {
            let raw: [u8; 8] = b
                .as_slice()
                .try_into()
                .map_err(|_| AdapterError::CorruptValue("corrupt group-index count cell".into()))?;
            Ok(i64::from_le_bytes(raw))
        }
    }
}

/// Exact read through the live transaction (adds a read-conflict range).
pub fn count_exact(txn: &mut dyn Transaction, index_prefix: &[u8]) -> Result<i64> {
    decode(txn.get(&count_key(index_prefix))?)
}

/// Approximate read via `snapshot_get`, avoiding a read-conflict range
/// — the path a query planner uses for cardinality
/// estimates, not for correctness-sensitive checks.
pub fn count_approximate(txn: &dyn Transaction, index_prefix: &[u8]) -> Result<i64> {
    decode(txn.snapshot_get(&count_key(index_prefix))?)
}

/// Truncation resets the cell to zero with a plain `set`, not an `ADD` —
/// there is no prior value to offset from.
pub fn reset_to_zero(txn: &mut dyn Transaction, index_prefix: &[u8]) {
    txn.set(&count_key(index_prefix), 0i64.to_le_bytes().to_vec());
}

/// Dropping the index drops its counter cell entirely.
pub fn delete(txn: &mut dyn Transaction, index_prefix: &[u8]) {
    txn.clear(&count_key(index_prefix));
}

//! Sequence allocator. Generalizes a single
//! fixed-step `allocate_auto_increment` (a `sled::Tree::update_and_fetch`
//! CAS loop over one cell) into a named, `cacheSize`-wide batched allocator:
//! each refill advances a persisted cell by a whole batch in a transaction
//! of its own, so an outer statement's rollback can never unwind an
//! already-issued tick.

use crate::error::{AdapterError, Result};
use crate::kv::KvStore;
use parking_lot::{ReentrantMutex, RwLock};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

/// `cacheSize=1`, offset-by-one raw→real mapping is the overwhelmingly
/// common case (an ordinary `AUTO_INCREMENT`-style sequence); `real_value`
/// lets a caller express the affine remappings some dialects allow
/// (`START WITH`/`INCREMENT BY`) without this module knowing about SQL.
#[derive(Clone)]
pub struct Sequence {
    pub name: String,
    pub storage_key: Vec<u8>,
    pub cache_size: i64,
    pub real_value: Arc<dyn Fn(i64) -> i64 + Send + Sync>,
}

impl Sequence {
    pub fn identity(name: impl Into<String>, storage_key: Vec<u8>, cache_size: i64) -> Self {
        Sequence {
            name: name.into(),
            storage_key,
            cache_size,
            real_value: Arc::new(|raw| raw),
        }
    }
}

/// The next raw tick this cache will hand out, and the exclusive upper
/// bound of the currently-held batch.
#[derive(Debug, Clone, Copy)]
struct CacheState {
    next_raw: i64,
    upper_bound_exclusive: i64,
}

impl CacheState {
    fn issue(&mut self) -> Option<i64> {
        if self.next_raw >= self.upper_bound_exclusive {
            return None;
        }
        let raw = self.next_raw;
        self.next_raw += 1;
        Some(raw)
    }

    fn refill(&mut self, start: i64, cache_size: i64) {
        self.next_raw = start;
        self.upper_bound_exclusive = start + cache_size;
    }
}

/// Process-wide map from a sequence's unique key to its cache: lazily populated on first use, removed on `DROP SEQUENCE`. The
/// map-level lock only guards insert/remove of entries; each entry then has
/// its own reentrant lock so a thread already holding a sequence's lock
/// (e.g. mid-refill) can re-enter without deadlocking itself.
#[derive(Default)]
pub struct SequenceCacheRegistry {
    entries: RwLock<HashMap<String, Arc<ReentrantMutex<RefCell<Option<CacheState>>>>>>,
}

impl SequenceCacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, name: &str) -> Arc<ReentrantMutex<RefCell<Option<CacheState>>>> {
        if let Some(existing) = self.entries.read().get(name) {
            return existing.clone();
        }
        let mut write = self.entries.write();
        write
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(ReentrantMutex::new(RefCell::new(None))))
            .clone()
    }

    /// Evicts a sequence's cache on `DROP SEQUENCE`.
    pub fn remove(&self, name: &str) {
        self.entries.write().remove(name);
    }
}

fn decode_cell(bytes: Option<Vec<u8>>) -> Result<i64> {
    match bytes {
        None => Ok(1),
        Some(b) => {
            let raw: [u8; 8] = b
                .as_slice()
                .try_into()
                .map_err(|_| AdapterError::CorruptValue("corrupt sequence cell".into()))?;
            Ok(i64::from_be_bytes(raw))
        }
    }
}

/// Runs the refill protocol in a **fresh** transaction, not
/// the caller's: `start = get(key) or 1`, `set(key, start + cacheSize)`,
/// commit. Any failure here is surfaced untouched, leaving the in-process
/// cache exactly as it was so the next call simply retries.
fn refill_from_storage(store: &dyn KvStore, key: &[u8], cache_size: i64) -> Result<i64> {
    let mut txn = store.begin();
    let start = decode_cell(txn.get(key)?)?;
    txn.set(key, (start + cache_size).to_be_bytes().to_vec());
    txn.commit()?;
    tracing::trace!(start, cache_size, "sequence refill");
    Ok(start)
}

/// Returns the next real value for `seq`, refilling the batch if exhausted.
pub fn next(store: &dyn KvStore, registry: &SequenceCacheRegistry, seq: &Sequence) -> Result<i64> {
    let entry = registry.entry(&seq.name);
    let guard = entry.lock();
    let mut cell = guard.borrow_mut();

    let raw = loop {
        let needs_refill = match cell.as_mut() {
            Some(state) => state.issue(),
            None => None,
        };
        match needs_refill {
            Some(raw) => break raw,
            None => {
                let start = refill_from_storage(store, &seq.storage_key, seq.cache_size)?;
                let mut state = (*cell).unwrap_or(CacheState {
                    next_raw: 0,
                    upper_bound_exclusive: 0,
                });
                state.refill(start, seq.cache_size);
                *cell = Some(state);
            }
        }
    };
    Ok((seq.real_value)(raw))
}

/// Peeks the next value without consuming it: the cached next-to-issue raw
/// tick if this process already holds a batch, otherwise the persisted
/// cell's raw value with no side effect (no refill).
pub fn current(store: &dyn KvStore, registry: &SequenceCacheRegistry, seq: &Sequence) -> Result<i64> {
    let entry = registry.entry(&seq.name);
    let guard = entry.lock();
    let cell = guard.borrow();
    if let Some(state) = cell.as_ref() {
        return Ok((seq.real_value)(state.next_raw));
    }
    drop(cell);
    let mut txn = store.begin();
    let persisted = decode_cell(txn.get(&seq.storage_key)?)?;
    Ok((seq.real_value)(persisted))
}

//! A `sled`-backed [`KvStore`]. Generalizes a
//! `TransactionManager`/`ReadView` pair (elsewhere scoped to one MVCC row
//! table) to an arbitrary byte-range keyspace, since every component above
//! this module — group rows, table/group index rows, sequence cells,
//! null-separator cells, counter cells, directory entries — addresses the
//! same flat `sled::Tree` through the same `Transaction` trait.
//!
//! Isolation here is a simple optimistic scheme rather than full per-key
//! MVCC history: each transaction remembers the value it observed for every
//! key it read and, at commit, re-checks those values against the tree's
//! current state — the same "did anything I read change" conflict rule FDB
//! expresses via read-conflict ranges, just without versioned storage. This
//! is a concrete stand-in for a KV store treated as an external
//! collaborator, not a rendition of FDB's own MVCC engine.

use super::{KvStore, Transaction};
use crate::error::{AdapterError, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

struct Inner {
    #[allow(dead_code)]
    db: sled::Db,
    data: sled::Tree,
    next_tx_id: AtomicU64,
}

#[derive(Clone)]
pub struct SledKvStore {
    inner: Arc<Inner>,
}

fn add_merge(_key: &[u8], old: Option<&[u8]>, operand: &[u8]) -> Option<Vec<u8>> {
    let current = old
        .and_then(|b| b.try_into().ok())
        .map(i64::from_le_bytes)
        .unwrap_or(0);
    let delta = operand
        .try_into()
        .ok()
        .map(i64::from_le_bytes)
        .unwrap_or(0);
    Some((current.wrapping_add(delta)).to_le_bytes().to_vec())
}

impl SledKvStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)?;
        let data = db.open_tree("data")?;
        data.set_merge_operator(add_merge);
        Ok(SledKvStore {
            inner: Arc::new(Inner {
                db,
                data,
                next_tx_id: AtomicU64::new(1),
            }),
        })
    }

    pub fn open_temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        let data = db.open_tree("data")?;
        data.set_merge_operator(add_merge);
        Ok(SledKvStore {
            inner: Arc::new(Inner {
                db,
                data,
                next_tx_id: AtomicU64::new(1),
            }),
        })
    }
}

impl KvStore for SledKvStore {
    fn begin(&self) -> Box<dyn Transaction> {
        let tx_id = self.inner.next_tx_id.fetch_add(1, Ordering::SeqCst);
        Box::new(SledTransaction {
            inner: self.inner.clone(),
            tx_id,
            start_time: Instant::now(),
            reads: Mutex::new(BTreeMap::new()),
            writes: BTreeMap::new(),
        })
    }
}

pub struct SledTransaction {
    inner: Arc<Inner>,
    tx_id: u64,
    start_time: Instant,
    /// Keys read, and the value observed at first read — validated at
    /// commit time against the tree's then-current state.
    reads: Mutex<BTreeMap<Vec<u8>, Option<Vec<u8>>>>,
    /// Buffered writes: `None` is a tombstone.
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl SledTransaction {
    fn committed_get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.data.get(key)?.map(|v| v.to_vec()))
    }
}

impl Transaction for SledTransaction {
    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(pending) = self.writes.get(key) {
            return Ok(pending.clone());
        }
        let value = self.committed_get(key)?;
        self.reads
            .lock()
            .entry(key.to_vec())
            .or_insert_with(|| value.clone());
        Ok(value)
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) {
        self.writes.insert(key.to_vec(), Some(value));
    }

    fn clear(&mut self, key: &[u8]) {
        self.writes.insert(key.to_vec(), None);
    }

    fn get_range(
        &mut self,
        begin: &[u8],
        end: &[u8],
        limit: Option<usize>,
        reverse: bool,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        if begin >= end {
            return Ok(Vec::new());
        }
        let mut merged: BTreeMap<Vec<u8>, Option<Vec<u8>>> = BTreeMap::new();
        for item in self.inner.data.range(begin.to_vec()..end.to_vec()) {
            let (k, v) = item?;
            merged.insert(k.to_vec(), Some(v.to_vec()));
        }
        for (k, v) in self.writes.range(begin.to_vec()..end.to_vec()) {
            merged.insert(k.clone(), v.clone());
        }
        let mut out: Vec<(Vec<u8>, Vec<u8>)> = merged
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect();
        if reverse {
            out.reverse();
        }
        if let Some(limit) = limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    fn mutate_add(&self, key: &[u8], delta: i64) -> Result<()> {
        self.inner.data.merge(key, &delta.to_le_bytes())?;
        Ok(())
    }

    fn snapshot_get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(pending) = self.writes.get(key) {
            return Ok(pending.clone());
        }
        self.committed_get(key)
    }

    fn commit(&mut self) -> Result<()> {
        for (key, observed) in self.reads.lock().iter() {
            let current = self.committed_get(key)?;
            if &current != observed {
                return Err(AdapterError::RetryableStoreConflict(format!(
                    "read-conflict on key {key:?}"
                )));
            }
        }
        let mut batch = sled::Batch::default();
        for (key, value) in &self.writes {
            match value {
                Some(v) => batch.insert(key.as_slice(), v.as_slice()),
                None => batch.remove(key.as_slice()),
            }
        }
        self.inner
            .data
            .apply_batch(batch)
            .map_err(|e| AdapterError::NonRetryableStoreError(e.to_string()))?;
        self.writes.clear();
        self.reads.lock().clear();
        Ok(())
    }

    fn reset(&mut self) {
        self.writes.clear();
        self.reads.lock().clear();
        self.tx_id = self.inner.next_tx_id.fetch_add(1, Ordering::SeqCst);
        self.start_time = Instant::now();
    }

    fn transaction_id(&self) -> u64 {
        self.tx_id
    }

    fn start_time(&self) -> Instant {
        self.start_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_your_own_writes() {
        let store = SledKvStore::open_temporary().unwrap();
        let mut txn = store.begin();
        txn.set(b"k", b"v1".to_vec());
        assert_eq!(txn.get(b"k").unwrap(), Some(b"v1".to_vec()));
        txn.commit().unwrap();

        let mut txn2 = store.begin();
        assert_eq!(txn2.get(b"k").unwrap(), Some(b"v1".to_vec()));
    }

    #[test]
    fn concurrent_writers_conflict_on_shared_read() {
        let store = SledKvStore::open_temporary().unwrap();
        let mut seed = store.begin();
        seed.set(b"k", b"0".to_vec());
        seed.commit().unwrap();

        let mut a = store.begin();
        let mut b = store.begin();
        assert_eq!(a.get(b"k").unwrap(), Some(b"0".to_vec()));
        assert_eq!(b.get(b"k").unwrap(), Some(b"0".to_vec()));

        a.set(b"k", b"1".to_vec());
        a.commit().unwrap();

        b.set(b"k", b"2".to_vec());
        let err = b.commit().unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn mutate_add_never_conflicts() {
        let store = SledKvStore::open_temporary().unwrap();
        let mut a = store.begin();
        let b = store.begin();
        a.mutate_add(b"count", 1).unwrap();
        a.commit().unwrap();
        // `b` never read `count`, so committing after `a`'s ADD must not conflict.
        let mut b = b;
        b.set(b"other", b"x".to_vec());
        b.commit().unwrap();

        let mut check = store.begin();
        assert_eq!(check.get(b"count").unwrap(), Some(1i64.to_le_bytes().to_vec()));
    }

    #[test]
    fn range_scan_overlays_pending_writes() {
        let store = SledKvStore::open_temporary().unwrap();
        let mut txn = store.begin();
        txn.set(b"a", b"1".to_vec());
        txn.set(b"b", b"2".to_vec());
        txn.commit().unwrap();

        let mut txn2 = store.begin();
        txn2.set(b"c", b"3".to_vec());
        txn2.clear(b"a");
        let range = txn2.get_range(b"a", b"z", None, false).unwrap();
        assert_eq!(
            range,
            vec![(b"b".to_vec(), b"2".to_vec()), (b"c".to_vec(), b"3".to_vec())]
        );
    }
}

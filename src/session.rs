//! `Session`: the first implicit argument to every adapter call —
//! owns exactly one live [`Transaction`] at a time and
//! exposes cooperative cancellation (`QueryCanceled`).

use crate::error::{AdapterError, Result};
use crate::kv::{KvStore, Transaction};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One client's unit of work against the store. Sessions are re-entered
/// concurrently; nothing
/// here is shared across sessions except the store handle itself.
pub struct Session {
    store: Arc<dyn KvStore>,
    txn: Box<dyn Transaction>,
    canceled: Arc<AtomicBool>,
}

impl Session {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        let txn = store.begin();
        Session {
            store,
            txn,
            canceled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn transaction(&mut self) -> &mut dyn Transaction {
        &mut *self.txn
    }

    pub fn store(&self) -> &dyn KvStore {
        &*self.store
    }

    /// A shareable handle another thread can use to request cancellation of
    /// this session.
    pub fn cancellation_handle(&self) -> Arc<AtomicBool> {
        self.canceled.clone()
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Relaxed)
    }

    /// Raises `QueryCanceled` if this session has been canceled — call at
    /// every suspension point.
    pub fn check_canceled(&self) -> Result<()> {
        if self.is_canceled() {
            return Err(AdapterError::QueryCanceled);
        }
        Ok(())
    }

    /// Commits the current transaction. On a non-retryable failure the
    /// session's transaction is left rollback-pending — the caller must
    /// `reset()` before issuing further work.
    pub fn commit(&mut self) -> Result<()> {
        self.txn.commit()
    }

    /// Discards the current transaction's buffered writes and starts a
    /// fresh read view, without ending the session.
    pub fn reset(&mut self) {
        self.txn.reset();
    }
}

//! The boundary this core consumes but does not implement: a
//! transactional, lexicographically-ordered KV store exposing `get`, `set`,
//! `clear`, `get_range`, an atomic `ADD` mutation, `snapshot`, `commit`, and
//! `reset`. Everything above this module only ever calls through the
//! [`Transaction`] trait; [`sled_store`] is one concrete backing
//! implementation supplied so the crate is self-contained and testable, not
//! a requirement of the boundary itself.

pub mod sled_store;

use crate::error::Result;

/// One session's live transaction. `commit`/`reset` mutate `&mut self`
/// rather than consuming `self` so the same boxed trait object can be handed
/// back to its [`crate::session::Session`] across retries and across the
/// periodic commit-and-reset cycle of long traversals.
pub trait Transaction: Send {
    /// Point read. Participates in read-your-writes within this
    /// transaction and, for a real KV store, in conflict-range tracking.
    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Buffers a write; visible to subsequent `get`/`get_range` calls on
    /// this same transaction, not to any other transaction until commit.
    fn set(&mut self, key: &[u8], value: Vec<u8>);

    /// Buffers a delete.
    fn clear(&mut self, key: &[u8]);

    /// Half-open range scan `[begin, end)`, optionally reversed and capped
    /// at `limit` results. `begin` is always less than `end` by KV-store
    /// contract even when `reverse` is set — direction is
    /// carried as a separate flag, not by swapping the bounds.
    fn get_range(
        &mut self,
        begin: &[u8],
        end: &[u8],
        limit: Option<usize>,
        reverse: bool,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Atomic little-endian signed-delta add. Applied
    /// immediately and does not add a read-conflict range: concurrent
    /// inserters against the same counter cell never serialize against each
    /// other.
    fn mutate_add(&self, key: &[u8], delta: i64) -> Result<()>;

    /// Reads without adding to this transaction's read-conflict range —
    /// the "approximate read" path used for the group-index counter's
    /// non-exact reads.
    fn snapshot_get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Commits buffered writes. Fails with `RetryableStoreConflict` if a
    /// key this transaction read was changed by another transaction since
    ///; any other failure is `NonRetryableStoreError`.
    fn commit(&mut self) -> Result<()>;

    /// Discards buffered writes and the read-conflict set, and begins a
    /// fresh read view under a new transaction id, without closing the
    /// session — used by long traversal's periodic commit-and-reset.
    fn reset(&mut self);

    fn transaction_id(&self) -> u64;

    fn start_time(&self) -> std::time::Instant;
}

/// Factory for [`Transaction`]s. A `Session` owns exactly one at a time.
pub trait KvStore: Send + Sync {
    fn begin(&self) -> Box<dyn Transaction>;
}

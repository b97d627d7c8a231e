//! Long traversal with periodic commit: streams an index's
//! entire range forward, committing and resetting the transaction whenever
//! wall-clock exceeds `scanTimeLimit` since it began, so a multi-million-row
//! scan never holds one transaction open long enough to become a conflict
//! magnet. Resume is always strictly greater than the last key the visitor
//! saw, so a commit boundary neither repeats nor skips a row.

use crate::error::{AdapterError, Result};
use crate::index::{whole_index_bounds, IndexDescriptor};
use crate::key::{unpack, Key};
use crate::kv::Transaction;
use std::time::Duration;

const PAGE_SIZE: usize = 256;
/// Sleep is polled in slices this short so a cancellation can interrupt it
/// promptly without needing a dedicated wakeup channel.
const SLEEP_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Called once per row, in ascending key order. Returning `Err` aborts the
/// traversal; the error propagates to [`traverse`]'s caller unchanged.
pub type Visitor<'a> = dyn FnMut(Key, Vec<u8>) -> Result<()> + 'a;

/// Polled at every suspension point — before each page pull and during any
/// sleep. Returning `true` aborts the traversal with `QueryCanceled`.
pub type CancellationCheck<'a> = dyn Fn() -> bool + 'a;

fn sleep_cancelable(duration: Duration, is_canceled: &CancellationCheck) -> Result<()> {
    let mut remaining = duration;
    while remaining > Duration::ZERO {
        if is_canceled() {
            return Err(AdapterError::QueryCanceled);
        }
        let slice = remaining.min(SLEEP_POLL_INTERVAL);
        std::thread::sleep(slice);
        remaining -= slice;
    }
    if is_canceled() {
        return Err(AdapterError::QueryCanceled);
    }
    Ok(())
}

/// Streams `index`'s entire range through `visitor`, transparently
/// committing and resetting `txn` along the way.
pub fn traverse(
    txn: &mut dyn Transaction,
    index: &IndexDescriptor,
    mut visitor: Box<Visitor>,
    scan_time_limit: Duration,
    sleep_time: Duration,
    is_canceled: &CancellationCheck,
) -> Result<()> {
    let (_, whole_end) = whole_index_bounds(index);
    let prefix = index.storage.prefix.clone();
    let mut cursor = crate::key::pack_prefix(&prefix);
    let end = whole_end;

    while cursor < end {
        if is_canceled() {
            return Err(AdapterError::QueryCanceled);
        }

        let page = txn.get_range(&cursor, &end, Some(PAGE_SIZE), false)?;
        if page.is_empty() {
            break;
        }

        for (raw_key, value) in &page {
            let key = unpack(&prefix, raw_key)?;
            visitor(key, value.clone())?;
        }

        let last_key = &page.last().unwrap().0;
        cursor = last_key.clone();
        cursor.push(0x00);

        if txn.start_time().elapsed() > scan_time_limit {
            txn.commit()?;
            tracing::trace!(object = %index.name, "traversal commit boundary");
            if sleep_time > Duration::ZERO {
                sleep_cancelable(sleep_time, is_canceled)?;
            }
            txn.reset();
        }
    }
    Ok(())
}

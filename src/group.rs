//! Group iterator: range scans over a group's hkey-ordered
//! rows. Three overloads — full group, one hkey's subtree, and a
//! limit/restart page for resumable scans — all built on the same paged
//! pull from the KV store so a caller scanning millions of rows (the long
//! traversal used by periodic-commit jobs) never materializes the whole
//! range at once.

use crate::error::Result;
use crate::hkey::HKey;
use crate::key::{pack_prefix, strinc, unpack, Key};
use crate::kv::Transaction;
use crate::row::RowData;
use crate::storage::StorageDescription;
use std::collections::VecDeque;

/// Page size for each underlying `get_range` pull. Internal pacing detail,
/// not part of the iterator's contract.
const PAGE_SIZE: usize = 256;

pub struct GroupIterator<'a> {
    txn: &'a mut dyn Transaction,
    prefix: Vec<u8>,
    cursor: Vec<u8>,
    end: Vec<u8>,
    buffer: VecDeque<(Vec<u8>, Vec<u8>)>,
    exhausted: bool,
}

impl<'a> GroupIterator<'a> {
    /// Full group scan, hkey-ordered ascending.
    pub fn full(txn: &'a mut dyn Transaction, group: &StorageDescription) -> Self {
        let begin = pack_prefix(&group.prefix);
        let end = strinc(&group.prefix);
        GroupIterator {
            txn,
            prefix: group.prefix.clone(),
            cursor: begin,
            end,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Subtree rooted at `hkey`: `[pack(group,hkey), pack(group,hkey,AFTER))`.
    pub fn subtree(txn: &'a mut dyn Transaction, group: &StorageDescription, hkey: &HKey) -> Self {
        let (_, after) = hkey.subtree_range(&group.prefix);
        let begin = crate::key::pack(&group.prefix, hkey.key(), None);
        GroupIterator {
            txn,
            prefix: group.prefix.clone(),
            cursor: begin,
            end: after,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Resumable page: `begin` is strictly greater than `restart`'s key (if
    /// given), `end` is `strinc(prefix)`, `limit` caps how many rows this
    /// call returns in total (not just the underlying page size).
    pub fn resumable(
        txn: &'a mut dyn Transaction,
        group: &StorageDescription,
        limit: usize,
        restart: Option<&[u8]>,
    ) -> Result<Vec<(Key, RowData)>> {
        let begin = match restart {
            Some(last) => {
                let mut b = last.to_vec();
                b.push(0x00);
                b
            }
            None => pack_prefix(&group.prefix),
        };
        let end = strinc(&group.prefix);
        let raw = txn.get_range(&begin, &end, Some(limit), false)?;
        raw.into_iter()
            .map(|(k, v)| Ok((unpack(&group.prefix, &k)?, RowData::from_bytes(v))))
            .collect()
    }

    fn refill(&mut self) -> Result<()> {
        if self.exhausted || self.cursor >= self.end {
            self.exhausted = true;
            return Ok(());
        }
        let page = self
            .txn
            .get_range(&self.cursor, &self.end, Some(PAGE_SIZE), false)?;
        if page.len() < PAGE_SIZE {
            self.exhausted = true;
        }
        if let Some((last_key, _)) = page.last() {
            let mut next_cursor = last_key.clone();
            next_cursor.push(0x00);
            self.cursor = next_cursor;
        }
        self.buffer.extend(page);
        Ok(())
    }
}

impl<'a> Iterator for GroupIterator<'a> {
    type Item = Result<(Key, RowData)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(e) = self.refill() {
                return Some(Err(e));
            }
        }
        let (k, v) = self.buffer.pop_front()?;
        Some(unpack(&self.prefix, &k).map(|key| (key, RowData::from_bytes(v))))
    }
}

//! Index descriptors and the index iterator.
//!
//! An index fans out into table-index vs. group-index, unique vs.
//! non-unique, nullable-unique vs. not — six behaviors the design notes
//! call out as a tagged variant rather than an inheritance
//! hierarchy; `IndexKind` here is that tag, and [`crate::index_writer`]
//! matches on it instead of dispatching through a trait object.

use crate::error::Result;
use crate::key::{pack, strinc, unpack, Edge, Key};
use crate::kv::Transaction;
use crate::row::FieldDef;
use crate::storage::StorageDescription;
use std::collections::VecDeque;

/// Which side of a group-index join "anchors" a row — i.e. which
/// participating table's absence still lets the index row exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Left,
    Right,
}

/// Maps each position in a group-index row to the corresponding position in
/// the group's flattened row.
#[derive(Debug, Clone, Default)]
pub struct GroupIndexRowComposition {
    pub positions: Vec<usize>,
}

/// Tags the six behaviors a table-index-vs-group-index,
/// unique-vs-non-unique split describes for building/checking/
/// writing/deleting an index row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Table,
    Group(JoinType),
}

/// An index over one or more columns of a table (table index) or of a
/// group's flattened row (group index).
#[derive(Debug, Clone)]
pub struct IndexDescriptor {
    pub name: String,
    pub storage: StorageDescription,
    pub kind: IndexKind,
    /// Key columns in declared order.
    pub columns: Vec<FieldDef>,
    pub unique: bool,
    pub unique_and_may_contain_nulls: bool,
    pub composition: GroupIndexRowComposition,
}

impl IndexDescriptor {
    pub fn new_table_unique(name: impl Into<String>, storage: StorageDescription, columns: Vec<FieldDef>) -> Self {
        IndexDescriptor {
            name: name.into(),
            storage,
            kind: IndexKind::Table,
            columns,
            unique: true,
            unique_and_may_contain_nulls: false,
            composition: GroupIndexRowComposition::default(),
        }
    }

    pub fn new_table_nullable_unique(
        name: impl Into<String>,
        storage: StorageDescription,
        columns: Vec<FieldDef>,
    ) -> Self {
        IndexDescriptor {
            name: name.into(),
            storage,
            kind: IndexKind::Table,
            columns,
            unique: true,
            unique_and_may_contain_nulls: true,
            composition: GroupIndexRowComposition::default(),
        }
    }

    pub fn new_table_nonunique(name: impl Into<String>, storage: StorageDescription, columns: Vec<FieldDef>) -> Self {
        IndexDescriptor {
            name: name.into(),
            storage,
            kind: IndexKind::Table,
            columns,
            unique: false,
            unique_and_may_contain_nulls: false,
            composition: GroupIndexRowComposition::default(),
        }
    }

    pub fn new_group(
        name: impl Into<String>,
        storage: StorageDescription,
        join_type: JoinType,
        columns: Vec<FieldDef>,
        composition: GroupIndexRowComposition,
        unique: bool,
    ) -> Self {
        IndexDescriptor {
            name: name.into(),
            storage,
            kind: IndexKind::Group(join_type),
            columns,
            unique,
            unique_and_may_contain_nulls: false,
            composition,
        }
    }
}

const PAGE_SIZE: usize = 256;

/// `iter(index, key?, inclusive, reverse)` over an index's key range.
/// `E = pack(prefix)`, `K = pack(prefix, key)`.
pub struct IndexIterator<'a> {
    txn: &'a mut dyn Transaction,
    prefix: Vec<u8>,
    cursor: Vec<u8>,
    end: Vec<u8>,
    reverse: bool,
    buffer: VecDeque<(Vec<u8>, Vec<u8>)>,
    exhausted: bool,
}

impl<'a> IndexIterator<'a> {
    pub fn new(
        txn: &'a mut dyn Transaction,
        index: &IndexDescriptor,
        key: Option<&Key>,
        inclusive: bool,
        reverse: bool,
    ) -> Self {
        let prefix = index.storage.prefix.clone();
        let e = prefix.clone();
        let e_strinc = strinc(&e);
        let (begin, end) = match (reverse, key) {
            (false, Some(k)) => {
                let point = pack(&prefix, k, None);
                let begin = if inclusive {
                    point
                } else {
                    let mut b = point;
                    b.push(0x00);
                    b
                };
                (begin, e_strinc)
            }
            (false, None) => (pack(&prefix, &Key::new(), None), e_strinc),
            (true, Some(k)) => {
                let point = pack(&prefix, k, None);
                let begin = {
                    let mut b = e.clone();
                    b.push(0x00);
                    b
                };
                let end = if inclusive {
                    let mut p = point;
                    p.push(0x00);
                    p
                } else {
                    point
                };
                (begin, end)
            }
            (true, None) => {
                let begin = {
                    let mut b = e.clone();
                    b.push(0x00);
                    b
                };
                (begin, e_strinc)
            }
        };
        IndexIterator {
            txn,
            prefix,
            cursor: begin,
            end,
            reverse,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    fn refill(&mut self) -> Result<()> {
        if self.exhausted || self.cursor >= self.end {
            self.exhausted = true;
            return Ok(());
        }
        let page = self
            .txn
            .get_range(&self.cursor, &self.end, Some(PAGE_SIZE), self.reverse)?;
        if page.len() < PAGE_SIZE {
            self.exhausted = true;
        } else if let Some((last_key, _)) = page.last() {
            if self.reverse {
                self.end = last_key.clone();
            } else {
                let mut next_cursor = last_key.clone();
                next_cursor.push(0x00);
                self.cursor = next_cursor;
            }
        }
        self.buffer.extend(page);
        Ok(())
    }
}

impl<'a> Iterator for IndexIterator<'a> {
    type Item = Result<(Key, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(e) = self.refill() {
                return Some(Err(e));
            }
        }
        let (k, v) = self.buffer.pop_front()?;
        Some(unpack(&self.prefix, &k).map(|key| (key, v)))
    }
}

/// The edge keys an index's whole range scan is bounded by, exposed for
/// callers (like `traverse`) that need the raw `[E, strinc(E))` bounds
/// directly rather than an iterator.
pub fn whole_index_bounds(index: &IndexDescriptor) -> (Vec<u8>, Vec<u8>) {
    let e = index.storage.prefix.clone();
    let upper = strinc(&e);
    (pack(&e, &Key::new(), Some(Edge::Before)), upper)
}

//! The hierarchical key: a distinguished [`Key`] spelling out the path from
//! a group's root to one row — `[RootOrdinal, rootPk.., ChildOrdinal,
//! childPk.., ..]`. It is the primary physical identifier of a
//! row within a group and defines group-scan order.

use crate::key::{Edge, Key, Segment};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HKey(Key);

impl HKey {
    pub fn new() -> Self {
        HKey(Key::new())
    }

    pub fn from_key(key: Key) -> Self {
        HKey(key)
    }

    /// Appends one level of the group tree: a table ordinal followed by its
    /// primary-key segments, in hierarchical order root-to-leaf.
    pub fn push_level(&mut self, ordinal: i64, pk_segments: impl IntoIterator<Item = Segment>) {
        self.0.push(Segment::Int(ordinal));
        for seg in pk_segments {
            self.0.push(seg);
        }
    }

    pub fn key(&self) -> &Key {
        &self.0
    }

    pub fn into_key(self) -> Key {
        self.0
    }

    /// True when `self` addresses a row at or under the subtree rooted at
    /// `ancestor` — i.e. `ancestor`'s segments are a prefix of `self`'s.
    pub fn starts_with(&self, ancestor: &HKey) -> bool {
        let a = ancestor.0.segments();
        let b = self.0.segments();
        a.len() <= b.len() && a == &b[..a.len()]
    }

    /// The half-open range `[pack(prefix, self, BEFORE), pack(prefix, self,
    /// AFTER))` containing exactly the rows whose hkey has `self` as a
    /// prefix.
    pub fn subtree_range(&self, prefix: &[u8]) -> (Vec<u8>, Vec<u8>) {
        (
            crate::key::pack(prefix, &self.0, Some(Edge::Before)),
            crate::key::pack(prefix, &self.0, Some(Edge::After)),
        )
    }
}

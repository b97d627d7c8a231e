//! Directory layer client: resolves, creates, lists,
//! moves, and removes named paths, handing back opaque packed-byte prefixes.
//!
//! Modeled on FDB's own directory layer: a path's prefix is pure metadata —
//! `move` only rewrites the path→prefix mapping (and, since each node under
//! a moved subtree is its own entry, rewrites their mappings too), never the
//! application data living under that prefix. That is what makes the
//! alter/rename orchestrator an atomic metadata-only operation instead of a
//! bulk data copy.
//!
//! Entries live in the same flat transactional keyspace as everything else
//! (under a reserved root no user path can collide with), alongside
//! everything else this core keeps in its catalog — going through the same
//! `Transaction` so a move is atomic with whatever schema swap triggered it.

use crate::error::{AdapterError, Result};
use crate::key::{pack, strinc, unpack, Key, Segment};
use crate::kv::Transaction;

const DIR_ROOT: &[u8] = b"\xfe\x01dir";
const ALLOC_KEY: &[u8] = b"\xfe\x01dir-next-id";

pub struct DirectoryLayer;

impl DirectoryLayer {
    fn path_key(path: &[&str]) -> Vec<u8> {
        let key: Key = path
            .iter()
            .map(|p| Segment::Text((*p).to_string()))
            .collect::<Vec<_>>()
            .into();
        pack(DIR_ROOT, &key, None)
    }

    fn decode_path(bytes: &[u8]) -> Result<Vec<String>> {
        let key = unpack(DIR_ROOT, bytes)?;
        key.segments()
            .iter()
            .map(|s| match s {
                Segment::Text(t) => Ok(t.clone()),
                _ => Err(AdapterError::CorruptKey("non-text directory path segment".into())),
            })
            .collect()
    }

    fn allocate_prefix(txn: &mut dyn Transaction) -> Result<Vec<u8>> {
        let current = txn
            .get(ALLOC_KEY)?
            .map(|b| {
                b.try_into()
                    .map(u64::from_be_bytes)
                    .map_err(|_| AdapterError::Directory("corrupt directory allocator cell".into()))
            })
            .transpose()?
            .unwrap_or(0);
        let next = current
            .checked_add(1)
            .ok_or_else(|| AdapterError::Directory("directory prefix space exhausted".into()))?;
        txn.set(ALLOC_KEY, next.to_be_bytes().to_vec());
        Ok(next.to_be_bytes().to_vec())
    }

    /// Returns the path's prefix, allocating and recording a fresh one on
    /// first reference.
    pub fn resolve(txn: &mut dyn Transaction, path: &[&str]) -> Result<Vec<u8>> {
        let key = Self::path_key(path);
        if let Some(existing) = txn.get(&key)? {
            return Ok(existing);
        }
        let prefix = Self::allocate_prefix(txn)?;
        txn.set(&key, prefix.clone());
        Ok(prefix)
    }

    /// Allocates a path that must not already exist.
    pub fn create(txn: &mut dyn Transaction, path: &[&str]) -> Result<Vec<u8>> {
        let key = Self::path_key(path);
        if txn.get(&key)?.is_some() {
            return Err(AdapterError::Directory(format!(
                "path already exists: {}",
                path.join("/")
            )));
        }
        let prefix = Self::allocate_prefix(txn)?;
        txn.set(&key, prefix.clone());
        Ok(prefix)
    }

    pub fn exists(txn: &mut dyn Transaction, path: &[&str]) -> Result<bool> {
        Ok(txn.get(&Self::path_key(path))?.is_some())
    }

    /// Immediate child path components directly under `path`.
    pub fn list(txn: &mut dyn Transaction, path: &[&str]) -> Result<Vec<String>> {
        let prefix_key = Self::path_key(path);
        let end = strinc(&prefix_key);
        let entries = txn.get_range(&prefix_key, &end, None, false)?;
        let mut children = std::collections::BTreeSet::new();
        for (key, _) in entries {
            if key == prefix_key {
                continue;
            }
            let full = Self::decode_path(&key)?;
            if full.len() > path.len() {
                children.insert(full[path.len()].clone());
            }
        }
        Ok(children.into_iter().collect())
    }

    /// Moves `old_path` (and every path nested under it) to `new_path`,
    /// preserving each node's allocated prefix. Errors if `old_path` does
    /// not exist or `new_path` already does.
    pub fn mv(txn: &mut dyn Transaction, old_path: &[&str], new_path: &[&str]) -> Result<()> {
        let old_key = Self::path_key(old_path);
        let new_key = Self::path_key(new_path);
        if txn.get(&old_key)?.is_none() {
            return Err(AdapterError::Directory(format!(
                "source path does not exist: {}",
                old_path.join("/")
            )));
        }
        if txn.get(&new_key)?.is_some() {
            return Err(AdapterError::Directory(format!(
                "destination path already exists: {}",
                new_path.join("/")
            )));
        }
        let old_end = strinc(&old_key);
        let entries = txn.get_range(&old_key, &old_end, None, false)?;
        for (key, value) in entries {
            let suffix = &key[old_key.len()..];
            let mut rewritten = new_key.clone();
            rewritten.extend_from_slice(suffix);
            txn.set(&rewritten, value);
            txn.clear(&key);
        }
        Ok(())
    }

    /// Removes `path` and every path nested under it. Returns whether
    /// anything was removed; ignoring "already absent" is the caller's
    /// business, since staging directory cleanup tolerates running twice.
    pub fn remove_if_exists(txn: &mut dyn Transaction, path: &[&str]) -> Result<bool> {
        let prefix_key = Self::path_key(path);
        let end = strinc(&prefix_key);
        let entries = txn.get_range(&prefix_key, &end, None, false)?;
        if entries.is_empty() {
            return Ok(false);
        }
        for (key, _) in entries {
            txn.clear(&key);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::sled_store::SledKvStore;
    use crate::kv::KvStore;

    #[test]
    fn resolve_is_stable_across_calls() {
        let store = SledKvStore::open_temporary().unwrap();
        let mut txn = store.begin();
        let p1 = DirectoryLayer::resolve(&mut *txn, &["data", "t1"]).unwrap();
        let p2 = DirectoryLayer::resolve(&mut *txn, &["data", "t1"]).unwrap();
        assert_eq!(p1, p2);
        txn.commit().unwrap();
    }

    #[test]
    fn create_rejects_duplicate() {
        let store = SledKvStore::open_temporary().unwrap();
        let mut txn = store.begin();
        DirectoryLayer::create(&mut *txn, &["data", "t1"]).unwrap();
        assert!(DirectoryLayer::create(&mut *txn, &["data", "t1"]).is_err());
    }

    #[test]
    fn move_preserves_prefix_and_nested_paths() {
        let store = SledKvStore::open_temporary().unwrap();
        let mut txn = store.begin();
        let root_prefix = DirectoryLayer::create(&mut *txn, &["data", "g1"]).unwrap();
        let child_prefix = DirectoryLayer::create(&mut *txn, &["data", "g1", "idx"]).unwrap();

        DirectoryLayer::mv(&mut *txn, &["data", "g1"], &["dataAltering", "g1"]).unwrap();

        assert!(!DirectoryLayer::exists(&mut *txn, &["data", "g1"]).unwrap());
        assert!(DirectoryLayer::exists(&mut *txn, &["dataAltering", "g1"]).unwrap());
        let moved_root = DirectoryLayer::resolve(&mut *txn, &["dataAltering", "g1"]).unwrap();
        let moved_child = DirectoryLayer::resolve(&mut *txn, &["dataAltering", "g1", "idx"]).unwrap();
        assert_eq!(moved_root, root_prefix);
        assert_eq!(moved_child, child_prefix);
    }

    #[test]
    fn list_returns_immediate_children_only() {
        let store = SledKvStore::open_temporary().unwrap();
        let mut txn = store.begin();
        DirectoryLayer::create(&mut *txn, &["data", "a"]).unwrap();
        DirectoryLayer::create(&mut *txn, &["data", "b"]).unwrap();
        DirectoryLayer::create(&mut *txn, &["data", "a", "sub"]).unwrap();
        let children = DirectoryLayer::list(&mut *txn, &["data"]).unwrap();
        assert_eq!(children, vec!["a".to_string(), "b".to_string()]);
    }
}

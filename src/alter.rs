//! Alter/rename orchestrator: moves a table/index/group's
//! data between `data/` and `dataAltering/` according to a [`ChangeLevel`],
//! atomically with whatever schema swap triggered it — built entirely on
//! [`crate::directory::DirectoryLayer`]'s metadata-only `mv`, since an
//! object's encoded child paths are byte-prefixes of its own path (the same
//! property that makes `DirectoryLayer::mv` atomic and cheap).

use crate::directory::DirectoryLayer;
use crate::error::{AdapterError, Result};
use crate::kv::Transaction;

/// Granularity of a schema alteration, from name-only through
/// full table/group rebuild, controlling the on-disk move protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeLevel {
    None,
    Metadata,
    MetadataNotNull,
    Index,
    Table,
    Group,
}

/// One renamed object: its qualified path before and after the alter.
#[derive(Debug, Clone)]
pub struct RenameEntry {
    pub old_name: Vec<String>,
    pub new_name: Vec<String>,
}

fn as_str_slice(path: &[String]) -> Vec<&str> {
    path.iter().map(String::as_str).collect()
}

fn data_path(name: &[String]) -> Vec<String> {
    let mut p = vec!["data".to_string()];
    p.extend(name.iter().cloned());
    p
}

fn data_altering_path(name: &[String]) -> Vec<String> {
    let mut p = vec!["dataAltering".to_string()];
    p.extend(name.iter().cloned());
    p
}

/// Runs the move protocol for `entries` at `level`, in the caller's
/// transaction so the whole alter is atomic with the schema swap that
/// triggered it.
pub fn apply(txn: &mut dyn Transaction, entries: &[RenameEntry], level: ChangeLevel) -> Result<()> {
    tracing::info!(?level, count = entries.len(), "running alter move protocol");
    match level {
        ChangeLevel::None => Ok(()),
        // No data move; a real schema manager notification would happen one
        // layer up, outside this adapter's concern.
        ChangeLevel::Metadata | ChangeLevel::MetadataNotNull => Ok(()),
        ChangeLevel::Index => promote_index(txn, entries),
        ChangeLevel::Table | ChangeLevel::Group => demote_then_promote(txn, entries),
    }
}

/// `INDEX`: index builds happen out-of-place under `dataAltering/`; promote
/// the finished build into `data/`.
fn promote_index(txn: &mut dyn Transaction, entries: &[RenameEntry]) -> Result<()> {
    for entry in entries {
        let staged = data_altering_path(&entry.new_name);
        if !DirectoryLayer::exists(txn, &as_str_slice(&staged))? {
            continue;
        }
        let live = data_path(&entry.new_name);
        for child in DirectoryLayer::list(txn, &as_str_slice(&staged))? {
            let mut old_child = staged.clone();
            old_child.push(child.clone());
            let mut new_child = live.clone();
            new_child.push(child);
            DirectoryLayer::mv(txn, &as_str_slice(&old_child), &as_str_slice(&new_child))?;
            tracing::trace!(from = ?old_child, to = ?new_child, "alter move");
        }
        DirectoryLayer::remove_if_exists(txn, &as_str_slice(&staged))?;
    }
    Ok(())
}

/// `TABLE`/`GROUP`: table alters happen in-place with a backup. Back up
/// `data/new` into `dataAltering/new` (tolerating a prior partial run having
/// already staged some of it), clear `data/new`, then promote
/// the already-built `alter/new` into place as the new `data/new`.
fn demote_then_promote(txn: &mut dyn Transaction, entries: &[RenameEntry]) -> Result<()> {
    for entry in entries {
        let live = data_path(&entry.new_name);
        let backup = data_altering_path(&entry.new_name);
        if DirectoryLayer::exists(txn, &as_str_slice(&live))? {
            for child in DirectoryLayer::list(txn, &as_str_slice(&live))? {
                let mut old_child = live.clone();
                old_child.push(child.clone());
                let mut backup_child = backup.clone();
                backup_child.push(child);
                if DirectoryLayer::exists(txn, &as_str_slice(&backup_child))? {
                    continue;
                }
                DirectoryLayer::mv(txn, &as_str_slice(&old_child), &as_str_slice(&backup_child))?;
                tracing::trace!(from = ?old_child, to = ?backup_child, "alter move");
            }
            DirectoryLayer::remove_if_exists(txn, &as_str_slice(&live))?;
        }

        let mut alter_path = vec!["alter".to_string()];
        alter_path.extend(entry.new_name.iter().cloned());
        if DirectoryLayer::exists(txn, &as_str_slice(&alter_path))? {
            DirectoryLayer::mv(txn, &as_str_slice(&alter_path), &as_str_slice(&live))?;
            tracing::trace!(from = ?alter_path, to = ?live, "alter move");
        }
    }
    Ok(())
}

/// Surfaces an unrecognized change level as a non-recoverable invariant
/// violation — reachable only if a future `ChangeLevel`
/// variant is added without updating [`apply`].
#[allow(dead_code)]
fn unknown_change_level() -> AdapterError {
    AdapterError::InternalInvariantViolation("unknown ChangeLevel".into())
}

//! `ordered-kv-adapter`: projects a relational schema (tables organized into
//! parent-child groups, table/group indexes, sequences) onto a flat,
//! transactional, lexicographically-ordered key-value store with a
//! prefix-based directory layer.
//!
//! This crate owns the on-disk (wire-to-KV) encoding, the hkey-based
//! colocation scheme that keeps a group's rows physically adjacent,
//! uniqueness checking under snapshot-isolated transactions, group-index
//! maintenance, and the schema-alter rename/move protocol — not SQL parsing,
//! query planning, or the wire protocol above it.

pub mod adapter;
pub mod alter;
pub mod config;
pub mod counter;
pub mod directory;
pub mod error;
pub mod group;
pub mod hkey;
pub mod index;
pub mod index_writer;
pub mod key;
pub mod kv;
pub mod metrics;
pub mod nullsep;
pub mod row;
pub mod sequence;
pub mod session;
pub mod storage;
pub mod traverse;

pub use adapter::StorageAdapter;
pub use config::AdapterConfig;
pub use error::{AdapterError, Result};
pub use hkey::HKey;
pub use key::{Edge, Key, Segment};
pub use row::{FieldDef, RowData, Value};
pub use session::Session;

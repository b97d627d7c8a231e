//! Row payloads and the one place the adapter is allowed to look inside
//! them. Mirrors a tagged value enum plus a `Vec<Cell>` row shape familiar
//! from small SQL engines, generalized: the adapter itself only ever
//! moves [`RowData`] around as opaque bytes; only the index
//! writer reaches through [`FieldDef`] to pull out the columns it needs to
//! build an index key.

use crate::error::{AdapterError, Result};
use crate::key::Segment;
use serde::{Deserialize, Serialize};

/// A single column's value. Carries the same variants as [`Segment`] so a
/// field pulled out of a row converts to a key segment without loss, plus
/// `Float`, which never appears inside an index key (floats are not part of
/// this core's order-preserving key encoding) but does appear in row bodies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    /// Converts to the [`Segment`] an index key column encodes. `Float`
    /// columns cannot appear in this core's indexes (the key codec has no
    /// order-preserving float encoding); callers are expected to reject
    /// that at DDL time, not here.
    pub fn to_segment(&self) -> Result<Segment> {
        match self {
            Value::Null => Ok(Segment::Null),
            Value::Int(i) => Ok(Segment::Int(*i)),
            Value::Text(s) => Ok(Segment::Text(s.clone())),
            Value::Bytes(b) => Ok(Segment::Bytes(b.clone())),
            Value::Float(_) => Err(AdapterError::InternalInvariantViolation(
                "float columns cannot be indexed by this key codec".into(),
            )),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Opaque, byte-encoded row payload. Short-lived, scoped to a
/// single adapter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowData(pub Vec<u8>);

impl RowData {
    pub fn encode(values: &[Value]) -> Result<Self> {
        Ok(RowData(bincode::serialize(values)?))
    }

    pub fn decode(&self) -> Result<Vec<Value>> {
        Ok(bincode::deserialize(&self.0)?)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        RowData(bytes)
    }
}

/// Names one column position an index needs to read out of a [`RowData`].
/// The adapter's only sanctioned way to look inside a row.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub position: usize,
}

impl FieldDef {
    pub fn new(position: usize) -> Self {
        FieldDef { position }
    }

    /// Pulls this field's value out of `row` and converts it to a key
    /// segment.
    pub fn extract(&self, row: &RowData) -> Result<Segment> {
        let values = row.decode()?;
        let value = values.get(self.position).ok_or_else(|| {
            AdapterError::CorruptValue(format!(
                "row has {} fields, field {} requested",
                values.len(),
                self.position
            ))
        })?;
        value.to_segment()
    }

    /// True when the named field in `row` is SQL NULL.
    pub fn is_null(&self, row: &RowData) -> Result<bool> {
        let values = row.decode()?;
        let value = values.get(self.position).ok_or_else(|| {
            AdapterError::CorruptValue(format!(
                "row has {} fields, field {} requested",
                values.len(),
                self.position
            ))
        })?;
        Ok(value.is_null())
    }
}

//! The backend contract and the query condition model.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::datum::Datum;
use crate::error::RecordError;
use crate::value::{DbType, Value};

/// A storage backend fed by the recorder. Backends receive rows in the
/// exact order `new_datum` returned them; errors propagate to the caller
/// of `record`/`flush` unswallowed.
pub trait RecBackend {
    /// Persist a batch of rows. The batch either fully appears or the
    /// backend reports the failure and stays at its last flushed state.
    fn notify(&mut self, data: &[Datum]) -> Result<(), RecordError>;

    /// Push buffered state to durable storage.
    fn flush(&mut self) -> Result<(), RecordError>;

    /// Identity for diagnostics (a path for file-backed stores).
    fn name(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// One condition on one field. All conditions given to a query are
/// conjoined.
#[derive(Debug, Clone)]
pub struct Cond {
    pub field: String,
    pub op: CmpOp,
    pub value: Value,
}

impl Cond {
    pub fn new(field: impl Into<String>, op: CmpOp, value: Value) -> Self {
        Cond { field: field.into(), op, value }
    }

    /// Evaluate against a row value. Values of mismatched kinds never
    /// match.
    pub fn matches(&self, actual: &Value) -> bool {
        let Some(ordering) = compare(actual, &self.value) else {
            return false;
        };
        match self.op {
            CmpOp::Eq => ordering == Ordering::Equal,
            CmpOp::Ne => ordering != Ordering::Equal,
            CmpOp::Lt => ordering == Ordering::Less,
            CmpOp::Le => ordering != Ordering::Greater,
            CmpOp::Gt => ordering == Ordering::Greater,
            CmpOp::Ge => ordering != Ordering::Less,
        }
    }
}

/// Ordering between two values of the same kind; `None` for mismatched or
/// unordered kinds.
#[allow(clippy::match_same_arms)] // arms bind different types
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
        (Value::Double(x), Value::Double(y)) => x.partial_cmp(y),
        (Value::Uuid(x), Value::Uuid(y)) => Some(x.cmp(y)),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Blob(x), Value::Blob(y)) => Some(x.cmp(y)),
        (Value::VectorInt(x), Value::VectorInt(y)) | (Value::ListInt(x), Value::ListInt(y)) => {
            Some(x.cmp(y))
        }
        (Value::VectorString(x), Value::VectorString(y)) => Some(x.cmp(y)),
        (Value::SetInt(x), Value::SetInt(y)) => Some(x.cmp(y)),
        (Value::PairIntInt(x1, x2), Value::PairIntInt(y1, y2)) => {
            Some((x1, x2).cmp(&(y1, y2)))
        }
        (Value::MapIntInt(x), Value::MapIntInt(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Materialized query output: parallel field names, column types, and
/// accepted rows.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub fields: Vec<String>,
    pub types: Vec<DbType>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    /// Column index for a field name.
    pub fn column(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == field)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

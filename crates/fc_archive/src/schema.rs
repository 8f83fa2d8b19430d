//! Table schemas: fixed at the first observed row, persisted in the file.
//!
//! The choice between a fixed and variable-length column is made from the
//! shape annotation on the first row: a missing or non-positive leading
//! entry selects the VL variant, whose row footprint is a digest.

use fc_record::{Datum, DbType, RecordError, Shape, Value};

use crate::digest::DIGEST_LEN;

const DIGEST_SIZE: u32 = DIGEST_LEN as u32;

/// One column: name, on-disk kind, row bytes, and the leading element
/// count where the kind needs one (`elem` doubles as the declared element
/// string width for `VlVectorString`).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FieldSpec {
    pub name: String,
    pub dbtype: DbType,
    pub size: u32,
    pub elem: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TableSchema {
    pub table: String,
    pub fields: Vec<FieldSpec>,
    pub row_size: usize,
}

fn dim(shape: Option<&Shape>, index: usize) -> i64 {
    shape.and_then(|s| s.get(index)).map_or(0, |d| i64::from(*d))
}

impl TableSchema {
    /// Fix the schema from the first row written to a table.
    pub fn infer(datum: &Datum) -> Result<TableSchema, RecordError> {
        let table = datum.title().to_owned();
        let mut fields = Vec::with_capacity(datum.len());
        for (name, value, shape) in datum.fields() {
            let d0 = dim(shape, 0);
            let d1 = dim(shape, 1);
            let (dbtype, size, elem) = match value {
                Value::Bool(_) => (DbType::Bool, 1, 0),
                Value::Int(_) => (DbType::Int, 4, 0),
                Value::Float(_) => (DbType::Float, 4, 0),
                Value::Double(_) => (DbType::Double, 8, 0),
                Value::Uuid(_) => (DbType::Uuid, 16, 0),
                Value::Blob(_) => (DbType::Blob, DIGEST_SIZE, 0),
                Value::PairIntInt(_, _) => (DbType::PairIntInt, 8, 0),
                Value::String(_) => {
                    if d0 >= 1 {
                        (DbType::String, u32::try_from(d0).unwrap_or(0), 0)
                    } else {
                        (DbType::VlString, DIGEST_SIZE, 0)
                    }
                }
                Value::VectorInt(_) => int_container(DbType::VectorInt, DbType::VlVectorInt, d0),
                Value::SetInt(_) => int_container(DbType::SetInt, DbType::VlSetInt, d0),
                Value::ListInt(_) => int_container(DbType::ListInt, DbType::VlListInt, d0),
                Value::MapIntInt(_) => {
                    if d0 >= 1 {
                        let n = u32::try_from(d0).unwrap_or(0);
                        (DbType::MapIntInt, 8 * n, n)
                    } else {
                        (DbType::VlMapIntInt, DIGEST_SIZE, 0)
                    }
                }
                Value::VectorString(_) => match (d0 >= 1, d1 >= 1) {
                    (false, false) => (DbType::VlVectorVlString, DIGEST_SIZE, 0),
                    (false, true) => {
                        (DbType::VlVectorString, DIGEST_SIZE, u32::try_from(d1).unwrap_or(0))
                    }
                    (true, false) => {
                        let n = u32::try_from(d0).unwrap_or(0);
                        (DbType::VectorVlString, DIGEST_SIZE * n, n)
                    }
                    (true, true) => {
                        let n = u32::try_from(d0).unwrap_or(0);
                        let w = u32::try_from(d1).unwrap_or(0);
                        (DbType::VectorString, n * w, n)
                    }
                },
            };
            if size == 0 {
                return Err(RecordError::SchemaMismatch {
                    table,
                    reason: format!("column '{name}' has a zero-byte layout"),
                });
            }
            fields.push(FieldSpec { name: name.to_owned(), dbtype, size, elem });
        }
        let row_size = fields.iter().map(|f| f.size as usize).sum();
        Ok(TableSchema { table, fields, row_size })
    }

    /// Verify a later row presents the same field names in the same order.
    /// Value kinds are verified during packing.
    pub fn check(&self, datum: &Datum) -> Result<(), RecordError> {
        if datum.len() != self.fields.len() {
            return Err(RecordError::SchemaMismatch {
                table: self.table.clone(),
                reason: format!(
                    "row has {} fields, schema has {}",
                    datum.len(),
                    self.fields.len()
                ),
            });
        }
        for (spec, (name, _, _)) in self.fields.iter().zip(datum.fields()) {
            if spec.name != name {
                return Err(RecordError::SchemaMismatch {
                    table: self.table.clone(),
                    reason: format!("field '{name}' where schema expects '{}'", spec.name),
                });
            }
        }
        Ok(())
    }
}

fn int_container(fixed: DbType, vl: DbType, d0: i64) -> (DbType, u32, u32) {
    if d0 >= 1 {
        let n = u32::try_from(d0).unwrap_or(0);
        (fixed, 4 * n, n)
    } else {
        (vl, DIGEST_SIZE, 0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Pooled row records.
//!
//! Data are owned by the recorder and recycled between flushes: a reset
//! keeps the pre-filled `SimId` cell (slot 0) and clears everything else,
//! so a long simulation allocates its row storage once.

use uuid::Uuid;

use crate::value::{Shape, Value};

const SIM_ID_FIELD: &str = "SimId";

/// One row destined for a table: a title plus ordered (name, value) pairs
/// with optional per-field shapes.
#[derive(Debug, Clone)]
pub struct Datum {
    title: String,
    vals: Vec<(String, Value)>,
    shapes: Vec<Option<Shape>>,
}

impl Datum {
    pub(crate) fn new(sim_id: Uuid) -> Self {
        Datum {
            title: String::new(),
            vals: vec![(SIM_ID_FIELD.to_owned(), Value::Uuid(sim_id))],
            shapes: vec![None],
        }
    }

    pub(crate) fn reset(&mut self, title: &str) {
        self.title.clear();
        self.title.push_str(title);
        self.vals.truncate(1);
        self.shapes.truncate(1);
    }

    pub(crate) fn push_val(&mut self, name: &str, value: Value) {
        self.vals.push((name.to_owned(), value));
        self.shapes.push(None);
    }

    pub(crate) fn set_last_shape(&mut self, shape: Shape) {
        if let Some(slot) = self.shapes.last_mut() {
            *slot = Some(shape);
        }
    }

    /// Destination table name.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Number of fields including the `SimId` cell.
    pub fn len(&self) -> usize {
        self.vals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vals.is_empty()
    }

    /// Fields in insertion order: `(name, value, shape)`.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value, Option<&Shape>)> {
        self.vals
            .iter()
            .zip(self.shapes.iter())
            .map(|((name, value), shape)| (name.as_str(), value, shape.as_ref()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

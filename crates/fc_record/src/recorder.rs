//! The process-facing event journal.
//!
//! A `Recorder` owns a ring of pre-allocated rows sized to its dump count;
//! per-event heap churn would otherwise dominate a 10^5–10^6 step
//! simulation. `new_datum` hands out the next pooled row, and recording
//! the row that fills the pool dispatches the whole buffer to every
//! backend in registration order.

use uuid::Uuid;

use crate::backend::RecBackend;
use crate::datum::Datum;
use crate::error::RecordError;
use crate::value::{Shape, Value};

/// Rows buffered before an automatic dispatch.
pub const DEFAULT_DUMP_COUNT: usize = 10_000;

pub struct Recorder {
    sim_id: Uuid,
    dump_count: usize,
    data: Vec<Datum>,
    index: usize,
    backends: Vec<Box<dyn RecBackend>>,
    closed: bool,
}

impl Recorder {
    /// Recorder with a random simulation id.
    pub fn new() -> Self {
        Recorder::with_sim_id(Uuid::new_v4())
    }

    /// Recorder stamping every row with the given simulation id.
    pub fn with_sim_id(sim_id: Uuid) -> Self {
        let mut rec = Recorder {
            sim_id,
            dump_count: 0,
            data: Vec::new(),
            index: 0,
            backends: Vec::new(),
            closed: false,
        };
        rec.set_dump_count(DEFAULT_DUMP_COUNT);
        rec
    }

    pub fn sim_id(&self) -> Uuid {
        self.sim_id
    }

    pub fn dump_count(&self) -> usize {
        self.dump_count
    }

    /// Rebuild the row pool for a new dump count. Any buffered rows are
    /// discarded, so call this before recording starts.
    pub fn set_dump_count(&mut self, count: usize) {
        self.data.clear();
        self.data.reserve(count);
        for _ in 0..count {
            self.data.push(Datum::new(self.sim_id));
        }
        self.dump_count = count;
        self.index = 0;
    }

    pub fn register_backend(&mut self, backend: Box<dyn RecBackend>) {
        tracing::info!(backend = %backend.name(), "backend registered");
        self.backends.push(backend);
    }

    /// Borrow the next pooled row, reset for `title`. The `SimId` cell is
    /// already filled. Recording the returned handle may trigger a
    /// dispatch; see [`DatumHandle::record`].
    pub fn new_datum(&mut self, title: &str) -> Result<DatumHandle<'_>, RecordError> {
        if self.closed {
            return Err(RecordError::Closed);
        }
        let slot = self.index;
        self.data[slot].reset(title);
        self.index += 1;
        Ok(DatumHandle { recorder: self, slot })
    }

    fn notify_backends(&mut self) -> Result<(), RecordError> {
        self.index = 0;
        for backend in &mut self.backends {
            backend.notify(&self.data)?;
        }
        Ok(())
    }

    /// Dispatch the partially-filled buffer and reset. Backends are also
    /// asked to flush to durable storage.
    pub fn flush(&mut self) -> Result<(), RecordError> {
        let filled = self.index;
        self.index = 0;
        for backend in &mut self.backends {
            backend.notify(&self.data[..filled])?;
            backend.flush()?;
        }
        Ok(())
    }

    /// Flush and detach all backends. Subsequent writes fail immediately.
    pub fn close(&mut self) -> Result<(), RecordError> {
        if self.closed {
            return Ok(());
        }
        self.flush()?;
        self.backends.clear();
        self.closed = true;
        tracing::info!(sim_id = %self.sim_id, "recorder closed");
        Ok(())
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Recorder::new()
    }
}

/// Builder-style access to the pooled row handed out by
/// [`Recorder::new_datum`].
pub struct DatumHandle<'a> {
    recorder: &'a mut Recorder,
    slot: usize,
}

impl DatumHandle<'_> {
    /// Append a field.
    pub fn add_val(self, name: &str, value: Value) -> Self {
        self.recorder.data[self.slot].push_val(name, value);
        self
    }

    /// Annotate the most recently added field with a shape.
    pub fn add_shape(self, shape: &[i32]) -> Self {
        self.recorder.data[self.slot].set_last_shape(Shape::from_slice(shape));
        self
    }

    /// Commit the row. If this row filled the pool, the entire buffer is
    /// dispatched to every backend; any backend error propagates.
    pub fn record(self) -> Result<(), RecordError> {
        if self.recorder.index >= self.recorder.dump_count {
            self.recorder.notify_backends()?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

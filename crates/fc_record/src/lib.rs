//! `fc_record` — the row journal between simulation agents and storage
//! backends.
//!
//! Agents describe events as [`Datum`] rows through a [`Recorder`], which
//! buffers up to its dump count and then hands the whole batch to every
//! registered [`RecBackend`]. The value model is a closed tagged variant;
//! backends never see a runtime type probe.

mod backend;
mod datum;
mod error;
mod recorder;
pub mod timeseries;
mod value;

pub use backend::{CmpOp, Cond, QueryResult, RecBackend};
pub use datum::Datum;
pub use error::RecordError;
pub use recorder::{DatumHandle, Recorder, DEFAULT_DUMP_COUNT};
pub use value::{DbType, Shape, Value, VlFamily};

//! `fc_archive` — the columnar on-disk backend for recorded telemetry.
//!
//! One archive is one file: per-table fixed-layout chunked datasets plus
//! content-addressed side stores for variable-length values, keyed by
//! 160-bit digests. Schemas are fixed by the first row a table sees and
//! persisted, so a reopened archive needs no row inspection.

mod backend;
mod digest;
mod format;
mod pack;
mod schema;
mod vlstore;

pub use backend::ArchiveBackend;
pub use digest::{digest_of, Digest, DIGEST_LEN};

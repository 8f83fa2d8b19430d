//! IO-class failures for recording and archive backends.

use thiserror::Error;

/// Failures surfaced by the recorder and its backends. Every variant names
/// the table, column, or file location involved; nothing is retried.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The recorder was closed; further writes fail immediately.
    #[error("recorder is closed")]
    Closed,

    /// An underlying file operation failed.
    #[error("io failure on {path}: {context}")]
    Io {
        path: String,
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A field's value kind has no on-disk mapping for this column.
    #[error("unsupported value kind {kind} for column '{column}' in table '{table}'")]
    UnsupportedType { table: String, column: String, kind: &'static str },

    /// A row does not match the schema fixed at table creation.
    #[error("row does not match schema of table '{table}': {reason}")]
    SchemaMismatch { table: String, reason: String },

    /// Query target does not exist.
    #[error("table '{table}' does not exist in archive {path}")]
    NoSuchTable { table: String, path: String },

    /// The archive file is structurally invalid.
    #[error("corrupt archive {path} at offset {offset}: {reason}")]
    Corrupt { path: String, offset: u64, reason: String },
}

impl RecordError {
    pub fn io(path: impl Into<String>, context: impl Into<String>, source: std::io::Error) -> Self {
        RecordError::Io { path: path.into(), context: context.into(), source }
    }
}

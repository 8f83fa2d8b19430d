//! The archive backend: one file, chunked tables, deduplicated side
//! stores.
//!
//! Writes are staged into a single batch buffer and committed with one
//! append; the in-memory directory only advances after the bytes are in
//! the file, so a failed notify leaves both the file and the directory at
//! the last flushed state.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use ahash::AHashMap;
use fc_record::{Cond, Datum, QueryResult, RecBackend, RecordError, VlFamily};

use crate::digest::{digest_of, Digest};
use crate::format::{
    self, encode_chunk_header, encode_schema_frame, encode_vl_header, FrameInfo, CHUNK_ROWS,
};
use crate::pack::{pack_field, unpack_field, VlSink, VlSource};
use crate::schema::TableSchema;
use crate::vlstore::{ValRef, VlStore};

struct ChunkRef {
    payload_offset: u64,
    rows: u32,
}

pub struct ArchiveBackend {
    path: PathBuf,
    file: File,
    /// Append position; everything before it is valid frame data.
    end: u64,
    schemas: AHashMap<String, TableSchema>,
    chunks: AHashMap<String, Vec<ChunkRef>>,
    table_order: Vec<String>,
    vl: VlStore,
    /// Set after an IO failure; the handle is not auto-repaired.
    poisoned: bool,
}

impl ArchiveBackend {
    /// Open an archive, creating the file when absent. Reopening an
    /// existing archive rebuilds schemas, chunk directories, and the
    /// side-store key sets before any write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RecordError> {
        let path = path.as_ref().to_path_buf();
        let display_path = path.display().to_string();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| RecordError::io(&display_path, "opening archive", e))?;
        let file_len = file
            .metadata()
            .map_err(|e| RecordError::io(&display_path, "reading archive metadata", e))?
            .len();

        let mut backend = ArchiveBackend {
            path,
            file,
            end: 0,
            schemas: AHashMap::new(),
            chunks: AHashMap::new(),
            table_order: Vec::new(),
            vl: VlStore::default(),
            poisoned: false,
        };

        if file_len == 0 {
            backend
                .file
                .write_all(&format::MAGIC)
                .map_err(|e| RecordError::io(&display_path, "writing archive header", e))?;
            backend.end = format::MAGIC.len() as u64;
            tracing::info!(path = %display_path, "archive created");
        } else {
            let (frames, end) = format::scan_archive(&mut backend.file, &display_path, file_len)?;
            for frame in frames {
                match frame {
                    FrameInfo::Schema(schema) => {
                        backend.table_order.push(schema.table.clone());
                        backend.schemas.insert(schema.table.clone(), schema);
                    }
                    FrameInfo::Chunk { table, rows, payload_offset, .. } => {
                        backend
                            .chunks
                            .entry(table)
                            .or_default()
                            .push(ChunkRef { payload_offset, rows });
                    }
                    FrameInfo::Vl { family, digest, payload_offset, payload_len } => {
                        backend.vl.insert(
                            family,
                            digest,
                            ValRef { offset: payload_offset, len: payload_len },
                        );
                    }
                }
            }
            backend.end = end;
            tracing::info!(
                path = %display_path,
                tables = backend.table_order.len(),
                "archive reopened"
            );
        }
        Ok(backend)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recorded tables in creation order.
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.table_order.iter().map(String::as_str)
    }

    /// Unique side-store values for a family, in first-write order.
    pub fn vl_keys(&self, family: VlFamily) -> &[Digest] {
        self.vl.keys(family)
    }

    fn display(&self) -> String {
        self.path.display().to_string()
    }

    fn check_usable(&self) -> Result<(), RecordError> {
        if self.poisoned {
            return Err(RecordError::io(
                self.display(),
                "archive disabled after an earlier write failure",
                std::io::Error::from(std::io::ErrorKind::Other),
            ));
        }
        Ok(())
    }

    fn notify_impl(&mut self, data: &[Datum]) -> Result<(), RecordError> {
        self.check_usable()?;
        if data.is_empty() {
            return Ok(());
        }

        // Group by table, preserving first-arrival order.
        let mut order: Vec<&str> = Vec::new();
        let mut groups: AHashMap<&str, Vec<&Datum>> = AHashMap::new();
        for datum in data {
            let title = datum.title();
            if !groups.contains_key(title) {
                order.push(title);
            }
            groups.entry(title).or_default().push(datum);
        }

        // Stage every frame; nothing touches the file or the committed
        // directory until the whole batch has packed cleanly.
        let base = self.end;
        let mut batch: Vec<u8> = Vec::new();
        let mut staged = StagedWrites::default();

        for table in order {
            let group = &groups[table];
            let schema = match self.schemas.get(table) {
                Some(schema) => schema.clone(),
                None => match staged.schemas.iter().find(|s| s.table == table) {
                    Some(schema) => schema.clone(),
                    None => {
                        let schema = TableSchema::infer(group[0])?;
                        encode_schema_frame(&mut batch, &schema);
                        staged.schemas.push(schema.clone());
                        schema
                    }
                },
            };

            for datum in group {
                schema.check(datum)?;
            }

            for chunk in group.chunks(CHUNK_ROWS) {
                let mut rows_buf = Vec::with_capacity(schema.row_size * chunk.len());
                {
                    let mut sink = BatchSink {
                        committed: &self.vl,
                        staged: &mut staged,
                        batch: &mut batch,
                        base,
                    };
                    for datum in chunk {
                        for (spec, (_, value, _)) in schema.fields.iter().zip(datum.fields()) {
                            pack_field(&mut rows_buf, table, spec, value, &mut sink)?;
                        }
                    }
                }
                let rows = u32::try_from(chunk.len()).unwrap_or(0);
                encode_chunk_header(&mut batch, table, rows, rows_buf.len() as u64);
                let payload_offset = base + batch.len() as u64;
                batch.extend_from_slice(&rows_buf);
                staged.chunks.push((table.to_owned(), ChunkRef { payload_offset, rows }));
            }
        }

        // Single append; the batch either fully appears or the backend is
        // poisoned and the directory stays at the last flushed state.
        if let Err(e) = self.append(&batch) {
            self.poisoned = true;
            return Err(e);
        }
        self.end += batch.len() as u64;

        for schema in staged.schemas {
            self.table_order.push(schema.table.clone());
            self.schemas.insert(schema.table.clone(), schema);
        }
        for (table, chunk) in staged.chunks {
            self.chunks.entry(table).or_default().push(chunk);
        }
        for (family, digest, val) in staged.vl_entries {
            self.vl.insert(family, digest, val);
        }
        tracing::debug!(path = %self.display(), rows = data.len(), "batch appended");
        Ok(())
    }

    fn append(&mut self, batch: &[u8]) -> Result<(), RecordError> {
        let display = self.display();
        self.file
            .seek(SeekFrom::Start(self.end))
            .map_err(|e| RecordError::io(&display, "seeking append position", e))?;
        self.file
            .write_all(batch)
            .map_err(|e| RecordError::io(&display, "appending batch", e))
    }

    /// Stream the table and materialize the rows matching every condition.
    pub fn query(&self, table: &str, conds: &[Cond]) -> Result<QueryResult, RecordError> {
        let schema = self.schemas.get(table).ok_or_else(|| RecordError::NoSuchTable {
            table: table.to_owned(),
            path: self.display(),
        })?;

        let display = self.display();
        let field_conds: Vec<Vec<&Cond>> = schema
            .fields
            .iter()
            .map(|spec| conds.iter().filter(|c| c.field == spec.name).collect())
            .collect();

        let source = FileSource { file: &self.file, vl: &self.vl, path: display.clone() };
        let mut result = QueryResult {
            fields: schema.fields.iter().map(|f| f.name.clone()).collect(),
            types: schema.fields.iter().map(|f| f.dbtype).collect(),
            rows: Vec::new(),
        };

        for chunk in self.chunks.get(table).map(Vec::as_slice).unwrap_or_default() {
            let payload_len = schema.row_size * chunk.rows as usize;
            let mut payload = vec![0u8; payload_len];
            read_at(&self.file, chunk.payload_offset, &mut payload, &display)?;

            for row in 0..chunk.rows as usize {
                let mut offset = row * schema.row_size;
                let mut selected = true;
                let mut values = Vec::with_capacity(schema.fields.len());
                for (spec, conds_for_field) in schema.fields.iter().zip(&field_conds) {
                    let bytes = &payload[offset..offset + spec.size as usize];
                    offset += spec.size as usize;
                    let value = unpack_field(bytes, spec, &source)?;
                    if !conds_for_field.iter().all(|c| c.matches(&value)) {
                        selected = false;
                        break;
                    }
                    values.push(value);
                }
                if selected {
                    result.rows.push(values);
                }
            }
        }
        Ok(result)
    }

    /// Flush file contents to durable storage and drop the handle.
    pub fn close(mut self) -> Result<(), RecordError> {
        self.flush()
    }
}

impl RecBackend for ArchiveBackend {
    fn notify(&mut self, data: &[Datum]) -> Result<(), RecordError> {
        self.notify_impl(data)
    }

    fn flush(&mut self) -> Result<(), RecordError> {
        self.check_usable()?;
        self.file
            .sync_all()
            .map_err(|e| RecordError::io(self.display(), "syncing archive", e))
    }

    fn name(&self) -> String {
        self.display()
    }
}

#[derive(Default)]
struct StagedWrites {
    schemas: Vec<TableSchema>,
    chunks: Vec<(String, ChunkRef)>,
    vl_entries: Vec<(VlFamily, Digest, ValRef)>,
    vl_seen: ahash::AHashSet<(u8, Digest)>,
}

/// Sink staging side-store payloads into the batch buffer, deduplicating
/// against both the committed store and the values staged earlier in this
/// batch.
struct BatchSink<'a> {
    committed: &'a VlStore,
    staged: &'a mut StagedWrites,
    batch: &'a mut Vec<u8>,
    base: u64,
}

impl VlSink for BatchSink<'_> {
    fn put(&mut self, family: VlFamily, payload: Vec<u8>) -> Digest {
        let digest = digest_of(&payload);
        if self.committed.contains(family, &digest)
            || self.staged.vl_seen.contains(&(family.tag(), digest))
        {
            return digest;
        }
        encode_vl_header(self.batch, family, &digest, payload.len() as u64);
        let payload_offset = self.base + self.batch.len() as u64;
        self.batch.extend_from_slice(&payload);
        self.staged.vl_seen.insert((family.tag(), digest));
        self.staged.vl_entries.push((
            family,
            digest,
            ValRef { offset: payload_offset, len: payload.len() as u64 },
        ));
        digest
    }
}

/// Digest resolution against the archive file during queries.
struct FileSource<'a> {
    file: &'a File,
    vl: &'a VlStore,
    path: String,
}

impl VlSource for FileSource<'_> {
    fn get(&self, family: VlFamily, digest: &Digest) -> Result<Vec<u8>, RecordError> {
        let val = self.vl.lookup(family, digest).ok_or_else(|| RecordError::Corrupt {
            path: self.path.clone(),
            offset: 0,
            reason: format!("no {} value for digest {digest}", family.dataset_name()),
        })?;
        let mut payload = vec![0u8; usize::try_from(val.len).unwrap_or(0)];
        read_at(self.file, val.offset, &mut payload, &self.path)?;
        Ok(payload)
    }
}

fn read_at(file: &File, offset: u64, buf: &mut [u8], path: &str) -> Result<(), RecordError> {
    let mut handle = file;
    handle
        .seek(SeekFrom::Start(offset))
        .map_err(|e| RecordError::io(path, "seeking payload", e))?;
    handle
        .read_exact(buf)
        .map_err(|e| RecordError::io(path, "reading payload", e))
}

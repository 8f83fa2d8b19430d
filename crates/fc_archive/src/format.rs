//! On-disk frame layout.
//!
//! An archive is a magic header followed by append-only frames. Offsets
//! recorded in memory always point at frame payloads, so a reopen only has
//! to walk headers and seek across payload bytes.
//!
//! Frame layouts (all integers little-endian):
//!
//! Schema frame:
//! `[TAG: 1][NAMELEN: 2][NAME][NFIELDS: 4]` then per field
//! `[NAMELEN: 2][NAME][DBTYPE: 4][SIZE: 4][ELEM: 4]`
//!
//! Chunk frame (at most 1000 rows):
//! `[TAG: 1][NAMELEN: 2][NAME][NROWS: 4][PAYLOAD_LEN: 8][PAYLOAD]`
//!
//! Side-store value frame (doubles as the Keys append, in frame order):
//! `[TAG: 1][FAMILY: 1][DIGEST: 20][PAYLOAD_LEN: 8][PAYLOAD]`

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use fc_record::{DbType, RecordError, VlFamily};

use crate::digest::{Digest, DIGEST_LEN};
use crate::schema::{FieldSpec, TableSchema};

pub(crate) const MAGIC: [u8; 8] = *b"fcarchv1";

pub(crate) const FRAME_SCHEMA: u8 = 1;
pub(crate) const FRAME_CHUNK: u8 = 2;
pub(crate) const FRAME_VL: u8 = 3;

/// Rows per chunk: the atomic unit of appends and of query streaming.
pub(crate) const CHUNK_ROWS: usize = 1000;

/// Bytes between a side-store frame's start and its payload.
pub(crate) const VL_HEADER_LEN: u64 = 1 + 1 + DIGEST_LEN as u64 + 8;

// --- encoding (into the staged batch buffer) -------------------------------

fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.write_u16::<LittleEndian>(v).expect("could not write to buffer");
}

pub(crate) fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.write_u32::<LittleEndian>(v).expect("could not write to buffer");
}

pub(crate) fn put_u64(buf: &mut Vec<u8>, v: u64) {
    buf.write_u64::<LittleEndian>(v).expect("could not write to buffer");
}

pub(crate) fn put_i32(buf: &mut Vec<u8>, v: i32) {
    buf.write_i32::<LittleEndian>(v).expect("could not write to buffer");
}

pub(crate) fn put_f32(buf: &mut Vec<u8>, v: f32) {
    buf.write_f32::<LittleEndian>(v).expect("could not write to buffer");
}

pub(crate) fn put_f64(buf: &mut Vec<u8>, v: f64) {
    buf.write_f64::<LittleEndian>(v).expect("could not write to buffer");
}

pub(crate) fn put_str(buf: &mut Vec<u8>, s: &str) {
    let len = u16::try_from(s.len()).unwrap_or(u16::MAX);
    put_u16(buf, len);
    buf.extend_from_slice(&s.as_bytes()[..len as usize]);
}

pub(crate) fn encode_schema_frame(buf: &mut Vec<u8>, schema: &TableSchema) {
    buf.push(FRAME_SCHEMA);
    put_str(buf, &schema.table);
    put_u32(buf, u32::try_from(schema.fields.len()).unwrap_or(0));
    for field in &schema.fields {
        put_str(buf, &field.name);
        put_u32(buf, field.dbtype.ordinal());
        put_u32(buf, field.size);
        put_u32(buf, field.elem);
    }
}

pub(crate) fn encode_chunk_header(buf: &mut Vec<u8>, table: &str, nrows: u32, payload_len: u64) {
    buf.push(FRAME_CHUNK);
    put_str(buf, table);
    put_u32(buf, nrows);
    put_u64(buf, payload_len);
}

pub(crate) fn encode_vl_header(buf: &mut Vec<u8>, family: VlFamily, digest: &Digest, payload_len: u64) {
    buf.push(FRAME_VL);
    buf.push(family.tag());
    buf.extend_from_slice(digest.as_bytes());
    put_u64(buf, payload_len);
}

// --- scanning (rebuilding the in-memory directory on open) ----------------

/// A frame located during the open-time scan. Payloads are not read.
#[derive(Debug)]
pub(crate) enum FrameInfo {
    Schema(TableSchema),
    Chunk { table: String, rows: u32, payload_offset: u64, payload_len: u64 },
    Vl { family: VlFamily, digest: Digest, payload_offset: u64, payload_len: u64 },
}

struct ScanReader<'a> {
    file: &'a mut File,
    path: &'a str,
    offset: u64,
    file_len: u64,
}

impl ScanReader<'_> {
    fn corrupt(&self, reason: impl Into<String>) -> RecordError {
        RecordError::Corrupt {
            path: self.path.to_owned(),
            offset: self.offset,
            reason: reason.into(),
        }
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), RecordError> {
        self.file
            .read_exact(buf)
            .map_err(|_| self.corrupt("truncated frame"))?;
        self.offset += buf.len() as u64;
        Ok(())
    }

    fn read_u8(&mut self) -> Result<u8, RecordError> {
        let v = self.file.read_u8().map_err(|_| self.corrupt("truncated frame"))?;
        self.offset += 1;
        Ok(v)
    }

    fn read_u32(&mut self) -> Result<u32, RecordError> {
        let v = self
            .file
            .read_u32::<LittleEndian>()
            .map_err(|_| self.corrupt("truncated frame"))?;
        self.offset += 4;
        Ok(v)
    }

    fn read_u64(&mut self) -> Result<u64, RecordError> {
        let v = self
            .file
            .read_u64::<LittleEndian>()
            .map_err(|_| self.corrupt("truncated frame"))?;
        self.offset += 8;
        Ok(v)
    }

    fn read_str(&mut self) -> Result<String, RecordError> {
        let len = self
            .file
            .read_u16::<LittleEndian>()
            .map_err(|_| self.corrupt("truncated frame"))?;
        self.offset += 2;
        let mut bytes = vec![0u8; len as usize];
        self.read_exact(&mut bytes)?;
        String::from_utf8(bytes).map_err(|_| self.corrupt("non-utf8 name"))
    }

    fn skip(&mut self, len: u64) -> Result<(), RecordError> {
        if self.offset + len > self.file_len {
            return Err(self.corrupt("truncated payload"));
        }
        self.file
            .seek(SeekFrom::Current(i64::try_from(len).map_err(|_| {
                self.corrupt("oversized payload length")
            })?))
            .map_err(|_| self.corrupt("truncated payload"))?;
        self.offset += len;
        Ok(())
    }
}

/// Walk every frame in the file. Returns the frames and the end offset at
/// which new frames should be appended.
pub(crate) fn scan_archive(
    file: &mut File,
    path: &str,
    file_len: u64,
) -> Result<(Vec<FrameInfo>, u64), RecordError> {
    file.seek(SeekFrom::Start(0))
        .map_err(|e| RecordError::io(path, "seeking archive start", e))?;
    let mut reader = ScanReader { file, path, offset: 0, file_len };

    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(reader.corrupt("bad magic; not an archive file"));
    }

    let mut frames = Vec::new();
    while reader.offset < file_len {
        let tag = reader.read_u8()?;
        match tag {
            FRAME_SCHEMA => {
                let table = reader.read_str()?;
                let nfields = reader.read_u32()?;
                let mut fields = Vec::with_capacity(nfields as usize);
                for _ in 0..nfields {
                    let name = reader.read_str()?;
                    let ordinal = reader.read_u32()?;
                    let dbtype = DbType::from_ordinal(ordinal)
                        .ok_or_else(|| reader.corrupt(format!("unknown dbtype ordinal {ordinal}")))?;
                    let size = reader.read_u32()?;
                    let elem = reader.read_u32()?;
                    fields.push(FieldSpec { name, dbtype, size, elem });
                }
                let row_size = fields.iter().map(|f| f.size as usize).sum();
                frames.push(FrameInfo::Schema(TableSchema { table, fields, row_size }));
            }
            FRAME_CHUNK => {
                let table = reader.read_str()?;
                let rows = reader.read_u32()?;
                let payload_len = reader.read_u64()?;
                let payload_offset = reader.offset;
                reader.skip(payload_len)?;
                frames.push(FrameInfo::Chunk { table, rows, payload_offset, payload_len });
            }
            FRAME_VL => {
                let family_tag = reader.read_u8()?;
                let family = VlFamily::from_tag(family_tag)
                    .ok_or_else(|| reader.corrupt(format!("unknown side-store family {family_tag}")))?;
                let mut raw = [0u8; DIGEST_LEN];
                reader.read_exact(&mut raw)?;
                let payload_len = reader.read_u64()?;
                let payload_offset = reader.offset;
                reader.skip(payload_len)?;
                frames.push(FrameInfo::Vl {
                    family,
                    digest: Digest(raw),
                    payload_offset,
                    payload_len,
                });
            }
            other => return Err(reader.corrupt(format!("unknown frame tag {other}"))),
        }
    }
    Ok((frames, reader.offset))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Fixed-width row serialization.
//!
//! One function pair per direction: `pack_field` appends a field's row
//! bytes to a row buffer (spilling variable-length payloads through a
//! [`VlSink`]), `unpack_field` reconstructs the [`Value`] from row bytes
//! (resolving digests through a [`VlSource`]).
//!
//! Fixed-width containers shorter than their declared shape are
//! zero-padded and read back padded, matching the table layout; fixed
//! digest arrays use the all-zero digest for unwritten slots.

use std::collections::BTreeSet;

use fc_record::{DbType, RecordError, Value, VlFamily};
use uuid::Uuid;

use crate::digest::{Digest, DIGEST_LEN};
use crate::format::{put_f32, put_f64, put_i32, put_u32};
use crate::schema::FieldSpec;

/// Destination for variable-length payloads met while packing.
pub(crate) trait VlSink {
    /// Store (or find) the payload in the family store; returns its digest.
    fn put(&mut self, family: VlFamily, payload: Vec<u8>) -> Digest;
}

/// Source resolving digests while unpacking.
pub(crate) trait VlSource {
    fn get(&self, family: VlFamily, digest: &Digest) -> Result<Vec<u8>, RecordError>;
}

fn mismatch(table: &str, spec: &FieldSpec, value: &Value) -> RecordError {
    RecordError::UnsupportedType {
        table: table.to_owned(),
        column: spec.name.clone(),
        kind: value.kind(),
    }
}

/// Truncate at a byte width without splitting a UTF-8 sequence.
fn truncate_str(s: &str, width: usize) -> &str {
    if s.len() <= width {
        return s;
    }
    let mut end = width;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn pad_to(buf: &mut Vec<u8>, target: usize) {
    buf.resize(target, 0);
}

fn encode_ints<I: IntoIterator<Item = i32>>(values: I) -> Vec<u8> {
    let mut out = Vec::new();
    for v in values {
        put_i32(&mut out, v);
    }
    out
}

fn encode_pairs<I: IntoIterator<Item = (i32, i32)>>(pairs: I) -> Vec<u8> {
    let mut out = Vec::new();
    for (k, v) in pairs {
        put_i32(&mut out, k);
        put_i32(&mut out, v);
    }
    out
}

/// Length-delimited concatenation of the element bytes: the payload form
/// of VL string vectors.
fn encode_strings<'a, I: Iterator<Item = &'a str>>(elements: I) -> Vec<u8> {
    let mut out = Vec::new();
    for element in elements {
        put_u32(&mut out, u32::try_from(element.len()).unwrap_or(0));
        out.extend_from_slice(element.as_bytes());
    }
    out
}

fn decode_strings(bytes: &[u8]) -> Result<Vec<String>, RecordError> {
    let mut strings = Vec::new();
    let mut rest = bytes;
    while !rest.is_empty() {
        if rest.len() < 4 {
            return Err(bad_string_vector());
        }
        let len = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        rest = &rest[4..];
        if rest.len() < len {
            return Err(bad_string_vector());
        }
        strings.push(String::from_utf8_lossy(&rest[..len]).into_owned());
        rest = &rest[len..];
    }
    Ok(strings)
}

fn bad_string_vector() -> RecordError {
    RecordError::Corrupt {
        path: "side store".to_owned(),
        offset: 0,
        reason: "malformed string-vector payload".to_owned(),
    }
}

fn read_i32(bytes: &[u8]) -> i32 {
    i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn decode_ints(bytes: &[u8]) -> Vec<i32> {
    bytes.chunks_exact(4).map(read_i32).collect()
}

fn decode_pairs(bytes: &[u8]) -> Vec<(i32, i32)> {
    bytes.chunks_exact(8).map(|c| (read_i32(&c[..4]), read_i32(&c[4..]))).collect()
}

fn fixed_ints(buf: &mut Vec<u8>, values: &[i32], spec: &FieldSpec) {
    let target = buf.len() + spec.size as usize;
    for v in values.iter().take(spec.elem as usize) {
        put_i32(buf, *v);
    }
    pad_to(buf, target);
}

fn fixed_set_ints(buf: &mut Vec<u8>, values: &BTreeSet<i32>, spec: &FieldSpec) {
    let target = buf.len() + spec.size as usize;
    for v in values.iter().take(spec.elem as usize) {
        put_i32(buf, *v);
    }
    pad_to(buf, target);
}

/// Serialize one field into the row buffer according to its column spec.
#[allow(clippy::too_many_lines)]
pub(crate) fn pack_field(
    buf: &mut Vec<u8>,
    table: &str,
    spec: &FieldSpec,
    value: &Value,
    sink: &mut dyn VlSink,
) -> Result<(), RecordError> {
    let start = buf.len();
    match (spec.dbtype, value) {
        (DbType::Bool, Value::Bool(b)) => buf.push(u8::from(*b)),
        (DbType::Int, Value::Int(i)) => put_i32(buf, *i),
        (DbType::Float, Value::Float(x)) => put_f32(buf, *x),
        (DbType::Double, Value::Double(x)) => put_f64(buf, *x),
        (DbType::Uuid, Value::Uuid(u)) => buf.extend_from_slice(u.as_bytes()),
        (DbType::String, Value::String(s)) => {
            let s = truncate_str(s, spec.size as usize);
            buf.extend_from_slice(s.as_bytes());
            pad_to(buf, start + spec.size as usize);
        }
        (DbType::VlString, Value::String(s)) => {
            let digest = sink.put(VlFamily::String, s.clone().into_bytes());
            buf.extend_from_slice(digest.as_bytes());
        }
        (DbType::Blob, Value::Blob(bytes)) => {
            let digest = sink.put(VlFamily::Blob, bytes.clone());
            buf.extend_from_slice(digest.as_bytes());
        }
        (DbType::VectorInt, Value::VectorInt(v)) | (DbType::ListInt, Value::ListInt(v)) => {
            fixed_ints(buf, v, spec);
        }
        (DbType::VlVectorInt, Value::VectorInt(v)) => {
            let digest = sink.put(VlFamily::VectorInt, encode_ints(v.iter().copied()));
            buf.extend_from_slice(digest.as_bytes());
        }
        (DbType::SetInt, Value::SetInt(v)) => fixed_set_ints(buf, v, spec),
        (DbType::VlSetInt, Value::SetInt(v)) => {
            let digest = sink.put(VlFamily::SetInt, encode_ints(v.iter().copied()));
            buf.extend_from_slice(digest.as_bytes());
        }
        (DbType::VlListInt, Value::ListInt(v)) => {
            let digest = sink.put(VlFamily::ListInt, encode_ints(v.iter().copied()));
            buf.extend_from_slice(digest.as_bytes());
        }
        (DbType::PairIntInt, Value::PairIntInt(a, b)) => {
            put_i32(buf, *a);
            put_i32(buf, *b);
        }
        (DbType::MapIntInt, Value::MapIntInt(m)) => {
            let target = start + spec.size as usize;
            for (k, v) in m.iter().take(spec.elem as usize) {
                put_i32(buf, *k);
                put_i32(buf, *v);
            }
            pad_to(buf, target);
        }
        (DbType::VlMapIntInt, Value::MapIntInt(m)) => {
            let payload = encode_pairs(m.iter().map(|(k, v)| (*k, *v)));
            let digest = sink.put(VlFamily::MapIntInt, payload);
            buf.extend_from_slice(digest.as_bytes());
        }
        (DbType::VectorString, Value::VectorString(v)) => {
            let width = (spec.size / spec.elem.max(1)) as usize;
            for i in 0..spec.elem as usize {
                let slot_end = buf.len() + width;
                if let Some(s) = v.get(i) {
                    buf.extend_from_slice(truncate_str(s, width).as_bytes());
                }
                pad_to(buf, slot_end);
            }
        }
        (DbType::VectorVlString, Value::VectorString(v)) => {
            for i in 0..spec.elem as usize {
                match v.get(i) {
                    Some(s) => {
                        let digest = sink.put(VlFamily::String, s.clone().into_bytes());
                        buf.extend_from_slice(digest.as_bytes());
                    }
                    None => buf.extend_from_slice(&[0u8; DIGEST_LEN]),
                }
            }
        }
        (DbType::VlVectorString, Value::VectorString(v)) => {
            let width = spec.elem as usize;
            let payload = encode_strings(v.iter().map(|s| truncate_str(s, width)));
            let digest = sink.put(VlFamily::VectorString, payload);
            buf.extend_from_slice(digest.as_bytes());
        }
        (DbType::VlVectorVlString, Value::VectorString(v)) => {
            let payload = encode_strings(v.iter().map(String::as_str));
            let digest = sink.put(VlFamily::VectorString, payload);
            buf.extend_from_slice(digest.as_bytes());
        }
        (_, other) => return Err(mismatch(table, spec, other)),
    }
    Ok(())
}

fn string_from_padded(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn resolve_string(source: &dyn VlSource, digest: &Digest) -> Result<String, RecordError> {
    if digest.is_zero() {
        // Unwritten slot in a fixed digest array.
        return Ok(String::new());
    }
    let bytes = source.get(VlFamily::String, digest)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Reconstruct a field value from its row bytes.
pub(crate) fn unpack_field(
    bytes: &[u8],
    spec: &FieldSpec,
    source: &dyn VlSource,
) -> Result<Value, RecordError> {
    let value = match spec.dbtype {
        DbType::Bool => Value::Bool(bytes[0] != 0),
        DbType::Int => Value::Int(read_i32(bytes)),
        DbType::Float => Value::Float(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        DbType::Double => Value::Double(f64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ])),
        DbType::Uuid => {
            let mut raw = [0u8; 16];
            raw.copy_from_slice(&bytes[..16]);
            Value::Uuid(Uuid::from_bytes(raw))
        }
        DbType::String => Value::String(string_from_padded(bytes)),
        DbType::VlString => {
            let digest = digest_at(bytes, 0);
            Value::String(resolve_string(source, &digest)?)
        }
        DbType::Blob => {
            let digest = digest_at(bytes, 0);
            Value::Blob(source.get(VlFamily::Blob, &digest)?)
        }
        DbType::VectorInt => Value::VectorInt(decode_ints(bytes)),
        DbType::VlVectorInt => {
            let digest = digest_at(bytes, 0);
            Value::VectorInt(decode_ints(&source.get(VlFamily::VectorInt, &digest)?))
        }
        DbType::SetInt => Value::SetInt(decode_ints(bytes).into_iter().collect()),
        DbType::VlSetInt => {
            let digest = digest_at(bytes, 0);
            let ints = decode_ints(&source.get(VlFamily::SetInt, &digest)?);
            Value::SetInt(ints.into_iter().collect())
        }
        DbType::ListInt => Value::ListInt(decode_ints(bytes)),
        DbType::VlListInt => {
            let digest = digest_at(bytes, 0);
            Value::ListInt(decode_ints(&source.get(VlFamily::ListInt, &digest)?))
        }
        DbType::PairIntInt => Value::PairIntInt(read_i32(&bytes[..4]), read_i32(&bytes[4..])),
        DbType::MapIntInt => Value::MapIntInt(decode_pairs(bytes).into_iter().collect()),
        DbType::VlMapIntInt => {
            let digest = digest_at(bytes, 0);
            let pairs = decode_pairs(&source.get(VlFamily::MapIntInt, &digest)?);
            Value::MapIntInt(pairs.into_iter().collect())
        }
        DbType::VectorString => {
            let width = (spec.size / spec.elem.max(1)) as usize;
            let strings = bytes.chunks_exact(width).map(string_from_padded).collect();
            Value::VectorString(strings)
        }
        DbType::VectorVlString => {
            let mut strings = Vec::with_capacity(spec.elem as usize);
            for i in 0..spec.elem as usize {
                let digest = digest_at(bytes, i);
                strings.push(resolve_string(source, &digest)?);
            }
            Value::VectorString(strings)
        }
        DbType::VlVectorString | DbType::VlVectorVlString => {
            let digest = digest_at(bytes, 0);
            let payload = source.get(VlFamily::VectorString, &digest)?;
            Value::VectorString(decode_strings(&payload)?)
        }
    };
    Ok(value)
}

fn digest_at(bytes: &[u8], index: usize) -> Digest {
    let start = index * DIGEST_LEN;
    Digest::from_slice(&bytes[start..start + DIGEST_LEN]).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! End-to-end archive behavior through the recorder: round-trips for
//! every column kind, deduplication, ordering, reopen-append, and
//! multi-backend fan-out.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use fc_archive::ArchiveBackend;
use fc_record::{CmpOp, Cond, RecordError, Recorder, Value, VlFamily};

fn recorder_for(path: &Path, dump_count: usize) -> Recorder {
    let mut rec = Recorder::new();
    rec.set_dump_count(dump_count);
    rec.register_backend(Box::new(ArchiveBackend::open(path).unwrap()));
    rec
}

#[test]
fn every_column_kind_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kinds.fcar");
    let mut rec = recorder_for(&path, 16);

    let set: BTreeSet<i32> = [3, 1, 2].into_iter().collect();
    let map: BTreeMap<i32, i32> = [(1, 10), (2, 20)].into_iter().collect();
    let strings = vec!["alpha".to_owned(), "beta".to_owned()];

    rec.new_datum("Everything")
        .unwrap()
        .add_val("b", Value::Bool(true))
        .add_val("i", Value::Int(-42))
        .add_val("f", Value::Float(0.5))
        .add_val("d", Value::Double(6.25))
        .add_val("s", Value::String("fixed".into()))
        .add_shape(&[8])
        .add_val("vs", Value::String("variable length".into()))
        .add_val("blob", Value::Blob(vec![0, 255, 7]))
        .add_val("vi", Value::VectorInt(vec![1, 2, 3]))
        .add_shape(&[3])
        .add_val("vvi", Value::VectorInt(vec![9, 8, 7, 6]))
        .add_val("vstr", Value::VectorString(strings.clone()))
        .add_shape(&[2, 6])
        .add_val("vvlstr", Value::VectorString(strings.clone()))
        .add_shape(&[2, 0])
        .add_val("vlvstr", Value::VectorString(strings.clone()))
        .add_shape(&[0, 6])
        .add_val("vlvvlstr", Value::VectorString(strings.clone()))
        .add_val("si", Value::SetInt(set.clone()))
        .add_shape(&[3])
        .add_val("vsi", Value::SetInt(set.clone()))
        .add_val("li", Value::ListInt(vec![5, 4]))
        .add_shape(&[2])
        .add_val("vli", Value::ListInt(vec![5, 4, 3]))
        .add_val("p", Value::PairIntInt(1, 2))
        .add_val("m", Value::MapIntInt(map.clone()))
        .add_shape(&[2])
        .add_val("vm", Value::MapIntInt(map.clone()))
        .record()
        .unwrap();
    rec.close().unwrap();

    let archive = ArchiveBackend::open(&path).unwrap();
    let result = archive.query("Everything", &[]).unwrap();
    assert_eq!(result.rows.len(), 1);
    let row = &result.rows[0];
    let col = |name: &str| &row[result.column(name).unwrap()];

    assert_eq!(col("b"), &Value::Bool(true));
    assert_eq!(col("i"), &Value::Int(-42));
    assert_eq!(col("f"), &Value::Float(0.5));
    assert_eq!(col("d"), &Value::Double(6.25));
    assert_eq!(col("s"), &Value::String("fixed".into()));
    assert_eq!(col("vs"), &Value::String("variable length".into()));
    assert_eq!(col("blob"), &Value::Blob(vec![0, 255, 7]));
    assert_eq!(col("vi"), &Value::VectorInt(vec![1, 2, 3]));
    assert_eq!(col("vvi"), &Value::VectorInt(vec![9, 8, 7, 6]));
    assert_eq!(col("vstr"), &Value::VectorString(strings.clone()));
    assert_eq!(col("vvlstr"), &Value::VectorString(strings.clone()));
    assert_eq!(col("vlvstr"), &Value::VectorString(strings.clone()));
    assert_eq!(col("vlvvlstr"), &Value::VectorString(strings));
    assert_eq!(col("si"), &Value::SetInt(set.clone()));
    assert_eq!(col("vsi"), &Value::SetInt(set));
    assert_eq!(col("li"), &Value::ListInt(vec![5, 4]));
    assert_eq!(col("vli"), &Value::ListInt(vec![5, 4, 3]));
    assert_eq!(col("p"), &Value::PairIntInt(1, 2));
    assert_eq!(col("m"), &Value::MapIntInt(map.clone()));
    assert_eq!(col("vm"), &Value::MapIntInt(map));
}

#[test]
fn sim_id_is_stamped_on_every_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("simid.fcar");
    let mut rec = recorder_for(&path, 4);
    let sim_id = rec.sim_id();
    for i in 0..3 {
        rec.new_datum("T").unwrap().add_val("n", Value::Int(i)).record().unwrap();
    }
    rec.close().unwrap();

    let archive = ArchiveBackend::open(&path).unwrap();
    let result = archive.query("T", &[]).unwrap();
    let sim_col = result.column("SimId").unwrap();
    for row in &result.rows {
        assert_eq!(row[sim_col], Value::Uuid(sim_id));
    }
}

#[test]
fn rows_persist_in_new_datum_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("order.fcar");
    let mut rec = recorder_for(&path, 7);
    for i in 0..23 {
        rec.new_datum("Ordered").unwrap().add_val("n", Value::Int(i)).record().unwrap();
    }
    rec.close().unwrap();

    let archive = ArchiveBackend::open(&path).unwrap();
    let result = archive.query("Ordered", &[]).unwrap();
    let n_col = result.column("n").unwrap();
    let observed: Vec<i32> = result
        .rows
        .iter()
        .map(|row| match row[n_col] {
            Value::Int(n) => n,
            ref other => panic!("expected int, got {other:?}"),
        })
        .collect();
    let expected: Vec<i32> = (0..23).collect();
    assert_eq!(observed, expected);
}

#[test]
fn scenario_reopen_and_append() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("foo.fcar");

    let mut rec = recorder_for(&path, 8);
    for i in 0..3 {
        rec.new_datum("Foo")
            .unwrap()
            .add_val("a", Value::Int(i))
            .add_val("s", Value::String("hi".into()))
            .add_shape(&[8])
            .record()
            .unwrap();
    }
    rec.close().unwrap();

    // Reopen: schema comes from the persisted dbtype list, no row
    // inspection needed.
    let archive = ArchiveBackend::open(&path).unwrap();
    let result = archive.query("Foo", &[]).unwrap();
    assert_eq!(result.rows.len(), 3);
    drop(archive);

    // Append through a fresh recorder into the same file.
    let mut rec = recorder_for(&path, 8);
    for i in 3..5 {
        rec.new_datum("Foo")
            .unwrap()
            .add_val("a", Value::Int(i))
            .add_val("s", Value::String("ho".into()))
            .add_shape(&[8])
            .record()
            .unwrap();
    }
    rec.close().unwrap();

    let archive = ArchiveBackend::open(&path).unwrap();
    let result = archive.query("Foo", &[]).unwrap();
    assert_eq!(result.rows.len(), 5);
    let a_col = result.column("a").unwrap();
    let observed: Vec<i32> = result
        .rows
        .iter()
        .map(|row| match row[a_col] {
            Value::Int(n) => n,
            ref other => panic!("expected int, got {other:?}"),
        })
        .collect();
    assert_eq!(observed, vec![0, 1, 2, 3, 4]);
}

#[test]
fn scenario_vl_dedup_keeps_one_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dedup.fcar");
    let mut rec = recorder_for(&path, 128);
    for i in 0..1000 {
        rec.new_datum("Notes")
            .unwrap()
            .add_val("n", Value::Int(i))
            .add_val("note", Value::String("the same note every time".into()))
            .record()
            .unwrap();
    }
    rec.close().unwrap();

    let archive = ArchiveBackend::open(&path).unwrap();
    assert_eq!(archive.vl_keys(VlFamily::String).len(), 1);
    assert_eq!(archive.query("Notes", &[]).unwrap().rows.len(), 1000);
}

#[test]
fn vl_string_vectors_do_not_pollute_string_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vectors.fcar");
    let mut rec = recorder_for(&path, 4);
    rec.new_datum("Tags")
        .unwrap()
        .add_val("tags", Value::VectorString(vec!["alpha".into(), "beta".into()]))
        .record()
        .unwrap();
    rec.close().unwrap();

    let archive = ArchiveBackend::open(&path).unwrap();
    // The vector value lives in its own family; no String column was ever
    // written, so the String key set stays empty.
    assert!(archive.vl_keys(VlFamily::String).is_empty());
    assert_eq!(archive.vl_keys(VlFamily::VectorString).len(), 1);
    let result = archive.query("Tags", &[]).unwrap();
    assert_eq!(
        result.rows[0][result.column("tags").unwrap()],
        Value::VectorString(vec!["alpha".to_owned(), "beta".to_owned()])
    );
}

#[test]
fn dedup_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dedup2.fcar");

    let mut rec = recorder_for(&path, 4);
    rec.new_datum("T").unwrap().add_val("s", Value::String("shared".into())).record().unwrap();
    rec.close().unwrap();

    let mut rec = recorder_for(&path, 4);
    rec.new_datum("T").unwrap().add_val("s", Value::String("shared".into())).record().unwrap();
    rec.new_datum("T").unwrap().add_val("s", Value::String("novel".into())).record().unwrap();
    rec.close().unwrap();

    let archive = ArchiveBackend::open(&path).unwrap();
    assert_eq!(archive.vl_keys(VlFamily::String).len(), 2);
}

#[test]
fn scenario_two_backends_receive_identical_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path_a = dir.path().join("a.fcar");
    let path_b = dir.path().join("b.fcar");

    let mut rec = Recorder::new();
    rec.set_dump_count(4);
    rec.register_backend(Box::new(ArchiveBackend::open(&path_a).unwrap()));
    rec.register_backend(Box::new(ArchiveBackend::open(&path_b).unwrap()));
    for i in 0..9 {
        rec.new_datum("Mirrored")
            .unwrap()
            .add_val("n", Value::Int(i))
            .add_val("tag", Value::String(format!("row {i}")))
            .record()
            .unwrap();
    }
    rec.close().unwrap();

    let a = ArchiveBackend::open(&path_a).unwrap();
    let b = ArchiveBackend::open(&path_b).unwrap();
    let rows_a = a.query("Mirrored", &[]).unwrap();
    let rows_b = b.query("Mirrored", &[]).unwrap();
    assert_eq!(rows_a.fields, rows_b.fields);
    assert_eq!(rows_a.types, rows_b.types);
    assert_eq!(rows_a.rows, rows_b.rows);
    assert_eq!(rows_a.rows.len(), 9);
}

#[test]
fn conditions_conjoin_and_short_circuit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conds.fcar");
    let mut rec = recorder_for(&path, 16);
    for i in 0..10 {
        rec.new_datum("Numbers")
            .unwrap()
            .add_val("n", Value::Int(i))
            .add_val("half", Value::Double(f64::from(i) / 2.0))
            .record()
            .unwrap();
    }
    rec.close().unwrap();

    let archive = ArchiveBackend::open(&path).unwrap();
    let conds = vec![
        Cond::new("n", CmpOp::Ge, Value::Int(3)),
        Cond::new("n", CmpOp::Lt, Value::Int(8)),
        Cond::new("half", CmpOp::Ne, Value::Double(2.0)),
    ];
    let result = archive.query("Numbers", &conds).unwrap();
    let n_col = result.column("n").unwrap();
    let observed: Vec<i32> = result
        .rows
        .iter()
        .map(|row| match row[n_col] {
            Value::Int(n) => n,
            ref other => panic!("expected int, got {other:?}"),
        })
        .collect();
    // 4 is excluded because half == 2.0.
    assert_eq!(observed, vec![3, 5, 6, 7]);
}

#[test]
fn query_unknown_table_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.fcar");
    let archive = ArchiveBackend::open(&path).unwrap();
    let err = archive.query("Nope", &[]).unwrap_err();
    assert!(matches!(err, RecordError::NoSuchTable { .. }));
}

#[test]
fn chunking_splits_large_batches() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chunks.fcar");
    let mut rec = recorder_for(&path, 2500);
    for i in 0..2500 {
        rec.new_datum("Big").unwrap().add_val("n", Value::Int(i)).record().unwrap();
    }
    rec.close().unwrap();

    let archive = ArchiveBackend::open(&path).unwrap();
    let result = archive.query("Big", &[]).unwrap();
    assert_eq!(result.rows.len(), 2500);
    let n_col = result.column("n").unwrap();
    assert_eq!(result.rows[2499][n_col], Value::Int(2499));
}

#[test]
fn multiple_tables_share_one_archive() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("multi.fcar");
    let mut rec = recorder_for(&path, 4);
    rec.new_datum("Alpha").unwrap().add_val("x", Value::Int(1)).record().unwrap();
    rec.new_datum("Beta").unwrap().add_val("y", Value::Double(2.0)).record().unwrap();
    rec.new_datum("Alpha").unwrap().add_val("x", Value::Int(3)).record().unwrap();
    rec.close().unwrap();

    let archive = ArchiveBackend::open(&path).unwrap();
    let tables: Vec<&str> = archive.tables().collect();
    assert_eq!(tables, vec!["Alpha", "Beta"]);
    assert_eq!(archive.query("Alpha", &[]).unwrap().rows.len(), 2);
    assert_eq!(archive.query("Beta", &[]).unwrap().rows.len(), 1);
}

#[test]
fn schema_mismatch_is_rejected_and_archive_stays_usable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mismatch.fcar");
    let mut rec = recorder_for(&path, 1);
    rec.new_datum("T").unwrap().add_val("a", Value::Int(1)).record().unwrap();

    // Same table, renamed field: the backend must reject the batch.
    let err = rec
        .new_datum("T")
        .unwrap()
        .add_val("renamed", Value::Int(2))
        .record()
        .unwrap_err();
    assert!(matches!(err, RecordError::SchemaMismatch { .. }));

    // A conforming row still lands.
    rec.new_datum("T").unwrap().add_val("a", Value::Int(3)).record().unwrap();
    rec.close().unwrap();

    let archive = ArchiveBackend::open(&path).unwrap();
    let result = archive.query("T", &[]).unwrap();
    assert_eq!(result.rows.len(), 2);
}

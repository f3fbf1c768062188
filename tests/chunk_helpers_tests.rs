//! Chunk model tests: selection vectors, append paths and the
//! required-rows hint.

use riffle_core::chunk::Chunk;
use riffle_core::schema::{DataType, Field, Schema};
use riffle_core::types::Scalar;

fn two_col_schema() -> Schema {
    Schema::new(vec![
        Field::new("k", DataType::Int64, true),
        Field::new("v", DataType::Utf8, true),
    ])
}

fn sample_chunk() -> Chunk {
    let mut c = Chunk::new(&two_col_schema(), 8);
    for (k, v) in [(1, "a"), (2, "b"), (3, "c"), (4, "d")] {
        c.append_row(&[Scalar::I64(k), Scalar::Str(v.into())])
            .expect("append");
    }
    c
}

#[test]
fn test_selection_hides_rows_without_copying() {
    let mut c = sample_chunk();
    assert_eq!(c.num_rows(), 4);
    assert_eq!(c.phys_rows(), 4);

    c.set_sel(Some(vec![1, 3]));
    assert_eq!(c.num_rows(), 2, "logical count follows the selection");
    assert_eq!(c.phys_rows(), 4, "no physical deletion");
    assert_eq!(c.phys_index(0), 1);
    assert_eq!(c.phys_index(1), 3);
    assert_eq!(c.row(1).get(0), &Scalar::I64(4));

    c.set_sel(None);
    assert_eq!(c.num_rows(), 4);
}

#[test]
fn test_compacted_materialises_selection() {
    let mut c = sample_chunk();
    c.set_sel(Some(vec![0, 2]));
    let compact = c.compacted();
    assert_eq!(compact.phys_rows(), 2);
    assert!(compact.sel().is_none());
    assert_eq!(compact.get(1, 0), &Scalar::I64(3));
}

#[test]
fn test_append_from_selected_rows() {
    let src = sample_chunk();
    let mut dst = Chunk::new(&two_col_schema(), 8);
    dst.append_from(&src, &[0, 3]).expect("append_from");
    assert_eq!(dst.num_rows(), 2);
    assert_eq!(dst.get(0, 1), &Scalar::Str("a".into()));
    assert_eq!(dst.get(1, 1), &Scalar::Str("d".into()));
}

#[test]
fn test_append_row_arity_checked() {
    let mut c = Chunk::new(&two_col_schema(), 4);
    let err = c.append_row(&[Scalar::I64(1)]).expect_err("arity");
    assert!(matches!(err, riffle_core::error::Error::Schema(_)));
}

#[test]
fn test_required_rows_hint() {
    let mut c = Chunk::new(&two_col_schema(), 8);
    assert_eq!(c.required_rows(), 8, "defaults to capacity");

    assert_eq!(c.set_required_rows(3, 8), 3);
    assert!(!c.is_full());
    for i in 0..3 {
        c.append_row(&[Scalar::I64(i), Scalar::Str("x".into())])
            .expect("append");
    }
    assert!(c.is_full(), "full at the hint, not at capacity");

    // Out-of-range hints fall back to the maximum.
    assert_eq!(c.set_required_rows(0, 8), 8);
    assert_eq!(c.set_required_rows(99, 8), 8);
}

#[test]
fn test_reset_keeps_hint_and_capacity() {
    let mut c = sample_chunk();
    c.set_required_rows(2, 8);
    c.set_sel(Some(vec![0]));
    c.reset();
    assert_eq!(c.num_rows(), 0);
    assert!(c.sel().is_none());
    assert_eq!(c.required_rows(), 2, "hint survives a reset");
    assert_eq!(c.capacity(), 8);
}

#[test]
fn test_mem_bytes_tracks_data_not_selection() {
    let mut c = Chunk::new(&two_col_schema(), 8);
    let empty = c.mem_bytes();
    c.append_row(&[Scalar::I64(1), Scalar::Str("payload".into())])
        .expect("append");
    let one_row = c.mem_bytes();
    assert!(one_row > empty);

    c.set_sel(Some(vec![0]));
    assert_eq!(c.mem_bytes(), one_row, "selection is not accounted");
}

#[test]
fn test_row_ref_reads_through_selection() {
    let mut c = sample_chunk();
    c.set_sel(Some(vec![2]));
    let row = c.row(0);
    assert_eq!(row.logical_idx(), 0);
    assert_eq!(row.phys_idx(), 2);
    assert_eq!(row.to_values(), vec![Scalar::I64(3), Scalar::Str("c".into())]);
    assert!(!row.is_null(0));
}

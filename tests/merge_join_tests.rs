//! Merge join behaviour tests: join variants, ordering, suspension and
//! error handling.

mod common;

use common::*;

use riffle_core::chunk::Chunk;
use riffle_core::config::EngineConfig;
use riffle_core::id::ExecId;
use riffle_core::schema::{DataType, Field, Schema};
use riffle_core::types::Scalar;
use riffle_operators::filter::{CmpOp, Operand, Predicate};
use riffle_operators::testing::{collect_rows, drain_executor, i64_row, key_batches, MockExec};
use riffle_operators::{
    ExecContext, Executor, JoinConfig, JoinVariant, MergeJoinDesc, MergeJoinExec, OpError,
};

fn drain(exec: &mut MergeJoinExec, capacity: usize) -> Vec<Vec<Scalar>> {
    let ctx = ExecContext::new();
    exec.open(&ctx).expect("open");
    let rows = drain_executor(exec, &ctx, capacity).expect("drain");
    exec.close().expect("close");
    rows
}

#[test]
fn test_simple_inner_join() {
    // Outer [1,2,2,3] x inner [2,2,4]: four (2,2) pairs.
    let mut exec = single_key_join(
        JoinVariant::Inner,
        JoinConfig::default(),
        &[&[Some(1), Some(2), Some(2), Some(3)]],
        &[&[Some(2), Some(2), Some(4)]],
    );
    let rows = drain(&mut exec, 16);
    assert_eq!(rows.len(), 4);
    for row in &rows {
        assert_eq!(row, &i64_row(&[Some(2), Some(2)]));
    }
}

#[test]
fn test_left_outer_with_miss() {
    let cfg = JoinConfig {
        is_outer_join: true,
        ..JoinConfig::default()
    };
    let mut exec = single_key_join(
        JoinVariant::LeftOuter,
        cfg,
        &[&[Some(1), Some(2), Some(3)]],
        &[&[Some(2)]],
    );
    let rows = drain(&mut exec, 16);
    assert_eq!(
        rows,
        vec![
            i64_row(&[Some(1), None]),
            i64_row(&[Some(2), Some(2)]),
            i64_row(&[Some(3), None]),
        ]
    );
}

#[test]
fn test_descending_order() {
    let cfg = JoinConfig {
        desc: true,
        ..JoinConfig::default()
    };
    let mut exec = single_key_join(
        JoinVariant::Inner,
        cfg,
        &[&[Some(5), Some(3), Some(3), Some(1)]],
        &[&[Some(4), Some(3), Some(3)]],
    );
    let rows = drain(&mut exec, 16);
    assert_eq!(rows.len(), 4);
    for row in &rows {
        assert_eq!(row, &i64_row(&[Some(3), Some(3)]));
    }
}

#[test]
fn test_null_keys_never_match() {
    // Inner NULL is dropped before comparison; outer NULL takes the
    // miss-match path, which emits nothing for an inner join.
    let mut exec = single_key_join(
        JoinVariant::Inner,
        JoinConfig::default(),
        &[&[None, Some(1), Some(2)]],
        &[&[None, Some(2)]],
    );
    let rows = drain(&mut exec, 16);
    assert_eq!(rows, vec![i64_row(&[Some(2), Some(2)])]);
}

#[test]
fn test_output_boundary_mid_match() {
    // Capacity 2 against three matches: 2 rows, then 1, then EOF.
    let mut exec = single_key_join(
        JoinVariant::Inner,
        JoinConfig::default(),
        &[&[Some(2)]],
        &[&[Some(2), Some(2), Some(2)]],
    );
    let ctx = ExecContext::new();
    exec.open(&ctx).expect("open");

    let mut out = Chunk::new(&exec.schema().clone(), 2);
    exec.next(&ctx, &mut out).expect("first next");
    assert_eq!(out.num_rows(), 2);
    exec.next(&ctx, &mut out).expect("second next");
    assert_eq!(out.num_rows(), 1);
    exec.next(&ctx, &mut out).expect("third next");
    assert!(out.is_empty(), "exhausted join yields an empty chunk");

    exec.close().expect("close");
}

#[test]
fn test_desc_agrees_with_asc_multiset() {
    let asc = drain(
        &mut single_key_join(
            JoinVariant::Inner,
            JoinConfig::default(),
            &[&[Some(1), Some(2), Some(2), Some(3)]],
            &[&[Some(2), Some(2), Some(4)]],
        ),
        16,
    );

    let cfg = JoinConfig {
        desc: true,
        ..JoinConfig::default()
    };
    let desc = drain(
        &mut single_key_join(
            JoinVariant::Inner,
            cfg,
            &[&[Some(3), Some(2), Some(2), Some(1)]],
            &[&[Some(4), Some(2), Some(2)]],
        ),
        16,
    );

    let mut asc_sorted = asc;
    let mut desc_sorted = desc;
    asc_sorted.sort_by_key(|r| format!("{r:?}"));
    desc_sorted.sort_by_key(|r| format!("{r:?}"));
    assert_eq!(asc_sorted, desc_sorted);
}

#[test]
fn test_empty_sides() {
    let empty: &[&[Option<i64>]] = &[];

    let mut exec = single_key_join(
        JoinVariant::Inner,
        JoinConfig::default(),
        &[&[Some(1), Some(2)]],
        empty,
    );
    assert!(drain(&mut exec, 16).is_empty(), "empty inner side");

    let mut exec = single_key_join(
        JoinVariant::Inner,
        JoinConfig::default(),
        empty,
        &[&[Some(1), Some(2)]],
    );
    assert!(drain(&mut exec, 16).is_empty(), "empty outer side");

    let mut exec = single_key_join(JoinVariant::Inner, JoinConfig::default(), empty, empty);
    assert!(drain(&mut exec, 16).is_empty(), "both sides empty");
}

#[test]
fn test_single_row_groups() {
    let mut exec = single_key_join(
        JoinVariant::Inner,
        JoinConfig::default(),
        &[&[Some(1), Some(2), Some(3)]],
        &[&[Some(1), Some(2), Some(3)]],
    );
    let rows = drain(&mut exec, 16);
    assert_eq!(
        rows,
        vec![
            i64_row(&[Some(1), Some(1)]),
            i64_row(&[Some(2), Some(2)]),
            i64_row(&[Some(3), Some(3)]),
        ]
    );
}

#[test]
fn test_output_stable_on_input_order() {
    // Two outer rows share the key; each must see the inner rows in input
    // order, outer order outermost.
    let outer = vec![vec![kv(Some(1), Some(10)), kv(Some(1), Some(11))]];
    let inner = vec![vec![kv(Some(1), Some(20)), kv(Some(1), Some(21))]];
    let mut exec = pair_join(
        JoinVariant::Inner,
        JoinConfig::default(),
        false,
        outer,
        inner,
        vec![],
        vec![],
    );
    let rows = drain(&mut exec, 16);
    assert_eq!(
        rows,
        vec![
            i64_row(&[Some(1), Some(10), Some(1), Some(20)]),
            i64_row(&[Some(1), Some(10), Some(1), Some(21)]),
            i64_row(&[Some(1), Some(11), Some(1), Some(20)]),
            i64_row(&[Some(1), Some(11), Some(1), Some(21)]),
        ]
    );
}

#[test]
fn test_splicing_output_chunks_is_capacity_independent() {
    let run = |capacity: usize| {
        drain(
            &mut single_key_join(
                JoinVariant::Inner,
                JoinConfig::default(),
                &[&[Some(1), Some(2), Some(2), Some(3), Some(3)]],
                &[&[Some(2), Some(2), Some(3), Some(5)]],
            ),
            capacity,
        )
    };
    let unbounded = run(128);
    for capacity in [1, 2, 3, 7] {
        assert_eq!(run(capacity), unbounded, "capacity {capacity}");
    }
}

#[test]
fn test_semi_join_emits_outer_once() {
    let mut exec = single_key_join(
        JoinVariant::Semi,
        JoinConfig::default(),
        &[&[Some(1), Some(2), Some(2), Some(3)]],
        &[&[Some(2), Some(2)]],
    );
    let rows = drain(&mut exec, 16);
    assert_eq!(rows, vec![i64_row(&[Some(2)]), i64_row(&[Some(2)])]);
}

#[test]
fn test_anti_semi_join() {
    let mut exec = single_key_join(
        JoinVariant::AntiSemi,
        JoinConfig::default(),
        &[&[None, Some(1), Some(2), Some(3)]],
        &[&[Some(2)]],
    );
    let rows = drain(&mut exec, 16);
    // The NULL-keyed outer row has no match and is emitted like any other
    // missing key; only the matched key 2 is suppressed.
    assert_eq!(
        rows,
        vec![i64_row(&[None]), i64_row(&[Some(1)]), i64_row(&[Some(3)])]
    );
}

#[test]
fn test_left_outer_semi_null_aware_flag() {
    // Equal keys but the residual sees a NULL value: the match flag must be
    // NULL, not false.
    let outer = vec![vec![kv(Some(1), Some(5))]];
    let inner = vec![vec![kv(Some(1), None)]];
    let residual = vec![Predicate {
        col: 1,
        op: CmpOp::Eq,
        rhs: Operand::Col(3),
    }];
    let mut exec = pair_join(
        JoinVariant::LeftOuterSemi,
        JoinConfig::default(),
        false,
        outer,
        inner,
        vec![],
        residual,
    );
    let rows = drain(&mut exec, 16);
    assert_eq!(rows, vec![vec![Scalar::I64(1), Scalar::I64(5), Scalar::Null]]);
}

#[test]
fn test_right_outer_keeps_left_child_columns_first() {
    let outer = vec![vec![kv(Some(1), Some(10)), kv(Some(2), Some(20))]];
    let inner = vec![vec![kv(Some(2), Some(90))]];
    let cfg = JoinConfig {
        is_outer_join: true,
        ..JoinConfig::default()
    };
    let mut exec = pair_join(JoinVariant::RightOuter, cfg, true, outer, inner, vec![], vec![]);
    let rows = drain(&mut exec, 16);
    assert_eq!(
        rows,
        vec![
            i64_row(&[None, None, Some(1), Some(10)]),
            i64_row(&[Some(2), Some(90), Some(2), Some(20)]),
        ]
    );
}

#[test]
fn test_outer_filter_takes_miss_path() {
    let outer_schema = riffle_operators::testing::i64_schema(&["ok", "ov"]);
    let filter = Predicate::parse("ov > 10", &outer_schema).expect("parse filter");

    let outer = vec![vec![kv(Some(2), Some(5)), kv(Some(2), Some(20))]];
    let inner = vec![vec![kv(Some(2), Some(7))]];
    let mut exec = pair_join(
        JoinVariant::Inner,
        JoinConfig::default(),
        false,
        outer,
        inner,
        vec![filter],
        vec![],
    );
    let rows = drain(&mut exec, 16);
    assert_eq!(rows, vec![i64_row(&[Some(2), Some(20), Some(2), Some(7)])]);
}

#[test]
fn test_residual_predicate_filters_pairs() {
    let outer = vec![vec![kv(Some(1), Some(5)), kv(Some(1), Some(20))]];
    let inner = vec![vec![kv(Some(1), Some(10))]];
    // ov > iv over the candidate layout (ok, ov, ik, iv)
    let residual = vec![Predicate {
        col: 1,
        op: CmpOp::Gt,
        rhs: Operand::Col(3),
    }];
    let mut exec = pair_join(
        JoinVariant::Inner,
        JoinConfig::default(),
        false,
        outer,
        inner,
        vec![],
        residual,
    );
    let rows = drain(&mut exec, 16);
    assert_eq!(rows, vec![i64_row(&[Some(1), Some(20), Some(1), Some(10)])]);
}

#[test]
fn test_unsorted_input_is_fatal_and_poisons() {
    let mut exec = single_key_join(
        JoinVariant::Inner,
        JoinConfig::default(),
        &[&[Some(2), Some(1)]],
        &[&[Some(1)]],
    );
    let ctx = ExecContext::new();
    exec.open(&ctx).expect("open");

    let mut out = Chunk::new(&exec.schema().clone(), 16);
    let err = exec.next(&ctx, &mut out).expect_err("disorder must fail");
    assert!(matches!(err, OpError::Invariant(_)), "got {err}");

    let err = exec.next(&ctx, &mut out).expect_err("poisoned until close");
    assert!(matches!(err, OpError::Exec(_)));

    exec.close().expect("close after failure");
}

#[test]
fn test_key_arity_and_type_validation() {
    let outer = MockExec::new(
        Schema::new(vec![Field::new("k", DataType::Int64, true)]),
        vec![],
    );
    let inner = MockExec::new(
        Schema::new(vec![Field::new("k", DataType::Utf8, true)]),
        vec![],
    );

    // Mismatched key types
    let err = MergeJoinExec::try_new(
        ExecId::new(9),
        JoinConfig::default(),
        EngineConfig::default(),
        MergeJoinDesc {
            variant: JoinVariant::Inner,
            outer_keys: vec![0],
            inner_keys: vec![0],
            outer_is_right: false,
            outer_filters: vec![],
            residual: vec![],
        },
        Box::new(outer),
        Box::new(inner),
        None,
    )
    .expect_err("type mismatch must be rejected");
    assert!(matches!(err, OpError::Schema(_)));

    // Empty key lists
    let outer = MockExec::new(riffle_operators::testing::i64_schema(&["k"]), vec![]);
    let inner = MockExec::new(riffle_operators::testing::i64_schema(&["k"]), vec![]);
    let err = MergeJoinExec::try_new(
        ExecId::new(10),
        JoinConfig::default(),
        EngineConfig::default(),
        MergeJoinDesc {
            variant: JoinVariant::Inner,
            outer_keys: vec![],
            inner_keys: vec![],
            outer_is_right: false,
            outer_filters: vec![],
            residual: vec![],
        },
        Box::new(outer),
        Box::new(inner),
        None,
    )
    .expect_err("empty keys must be rejected");
    assert!(matches!(err, OpError::Plan(_)));
}

#[test]
fn test_cancellation_surfaces_distinctly() {
    let mut exec = single_key_join(
        JoinVariant::Inner,
        JoinConfig::default(),
        &[&[Some(1)]],
        &[&[Some(1)]],
    );
    let ctx = ExecContext::new();
    exec.open(&ctx).expect("open");
    ctx.cancel();

    let mut out = Chunk::new(&exec.schema().clone(), 16);
    let err = exec.next(&ctx, &mut out).expect_err("cancelled");
    assert!(matches!(err, OpError::Cancelled));
    exec.close().expect("close");
}

#[test]
fn test_upstream_error_propagates() {
    let outer = MockExec::new(
        riffle_operators::testing::i64_schema(&["o"]),
        key_batches(&[&[Some(1)]]),
    );
    let inner = MockExec::new(riffle_operators::testing::i64_schema(&["i"]), vec![]).failing_at_eof();
    let mut exec = MergeJoinExec::try_new(
        ExecId::new(11),
        JoinConfig::default(),
        EngineConfig::default(),
        MergeJoinDesc {
            variant: JoinVariant::Inner,
            outer_keys: vec![0],
            inner_keys: vec![0],
            outer_is_right: false,
            outer_filters: vec![],
            residual: vec![],
        },
        Box::new(outer),
        Box::new(inner),
        None,
    )
    .expect("build");

    let ctx = ExecContext::new();
    exec.open(&ctx).expect("open");
    let mut out = Chunk::new(&exec.schema().clone(), 16);
    let err = exec.next(&ctx, &mut out).expect_err("upstream failure");
    assert!(matches!(err, OpError::Exec(_)));
    exec.close().expect("close");
}

#[test]
fn test_close_is_idempotent_and_reopen_is_clean() {
    let mut exec = single_key_join(
        JoinVariant::Inner,
        JoinConfig::default(),
        &[&[Some(2)]],
        &[&[Some(2)]],
    );
    let ctx = ExecContext::new();
    exec.open(&ctx).expect("open");
    let rows = drain_executor(&mut exec, &ctx, 16).expect("drain");
    assert_eq!(rows.len(), 1);

    exec.close().expect("first close");
    exec.close().expect("second close is a no-op");

    // Reopen: the scripted children are exhausted, so the join is empty,
    // but the lifecycle must come up cleanly.
    exec.open(&ctx).expect("reopen");
    let mut out = Chunk::new(&exec.schema().clone(), 16);
    exec.next(&ctx, &mut out).expect("next after reopen");
    assert!(out.is_empty());
    exec.close().expect("close after reopen");
}

#[test]
fn test_collect_rows_respects_selection() {
    // Guard for the helper itself: logical iteration follows the selection.
    let schema = riffle_operators::testing::i64_schema(&["v"]);
    let mut chunk = Chunk::new(&schema, 4);
    for v in [10, 20, 30] {
        chunk.append_row(&[Scalar::I64(v)]).unwrap();
    }
    chunk.set_sel(Some(vec![0, 2]));
    assert_eq!(
        collect_rows(&chunk),
        vec![vec![Scalar::I64(10)], vec![Scalar::I64(30)]]
    );
}

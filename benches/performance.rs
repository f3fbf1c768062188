use criterion::{criterion_group, criterion_main, Criterion};

use riffle_core::config::EngineConfig;
use riffle_core::id::ExecId;
use riffle_core::types::Scalar;
use riffle_operators::testing::{drain_executor, i64_schema, MockExec};
use riffle_operators::{
    ExecContext, Executor, JoinConfig, JoinVariant, MergeJoinDesc, MergeJoinExec,
};

fn key_batches(rows: usize, chunk: usize, dup: usize) -> Vec<Vec<Vec<Scalar>>> {
    let mut batches = Vec::new();
    let mut batch = Vec::new();
    for i in 0..rows {
        batch.push(vec![Scalar::I64((i / dup) as i64), Scalar::I64(i as i64)]);
        if batch.len() == chunk {
            batches.push(std::mem::take(&mut batch));
        }
    }
    if !batch.is_empty() {
        batches.push(batch);
    }
    batches
}

fn build_join(rows: usize) -> MergeJoinExec {
    let cfg = JoinConfig::default();
    let outer = MockExec::new(
        i64_schema(&["ok", "ov"]),
        key_batches(rows, cfg.max_chunk_size, 4),
    );
    let inner = MockExec::new(
        i64_schema(&["ik", "iv"]),
        key_batches(rows, cfg.max_chunk_size, 4),
    );
    MergeJoinExec::try_new(
        ExecId::new(1),
        cfg,
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
    .unwrap()
}

fn bench_merge_join(c: &mut Criterion) {
    c.bench_function("merge_join_inner_16k", |b| {
        b.iter(|| {
            let mut exec = build_join(16 * 1024);
            let ctx = ExecContext::new();
            exec.open(&ctx).unwrap();
            let rows = drain_executor(&mut exec, &ctx, 1024).unwrap();
            exec.close().unwrap();
            rows.len()
        })
    });
}

criterion_group!(joins, bench_merge_join);
criterion_main!(joins);

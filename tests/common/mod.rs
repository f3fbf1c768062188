//! Shared helpers for the integration suites.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use riffle_core::config::EngineConfig;
use riffle_core::id::ExecId;
use riffle_core::types::Scalar;
use riffle_io::MemoryStorage;
use riffle_mem::{Codec, SpillManager, Tracker};
use riffle_operators::filter::Predicate;
use riffle_operators::testing::{i64_row, i64_schema, key_batches, MockExec};
use riffle_operators::{JoinConfig, JoinVariant, MergeJoinDesc, MergeJoinExec, SpillEnv};

/// One-key-column join over scripted single-column children.
pub fn single_key_join(
    variant: JoinVariant,
    cfg: JoinConfig,
    outer_batches: &[&[Option<i64>]],
    inner_batches: &[&[Option<i64>]],
) -> MergeJoinExec {
    single_key_join_with(variant, cfg, EngineConfig::default(), outer_batches, inner_batches, None)
}

pub fn single_key_join_with(
    variant: JoinVariant,
    cfg: JoinConfig,
    engine: EngineConfig,
    outer_batches: &[&[Option<i64>]],
    inner_batches: &[&[Option<i64>]],
    spill: Option<SpillEnv>,
) -> MergeJoinExec {
    let outer = MockExec::new(i64_schema(&["o"]), key_batches(outer_batches));
    let inner = MockExec::new(i64_schema(&["i"]), key_batches(inner_batches));
    MergeJoinExec::try_new(
        ExecId::new(1),
        cfg,
        engine,
        MergeJoinDesc {
            variant,
            outer_keys: vec![0],
            inner_keys: vec![0],
            outer_is_right: false,
            outer_filters: vec![],
            residual: vec![],
        },
        Box::new(outer),
        Box::new(inner),
        spill,
    )
    .expect("build merge join")
}

/// Join over two-column sides (key, value), with optional outer filter and
/// residual predicates. Outer columns are named ok/ov, inner ik/iv.
pub fn pair_join(
    variant: JoinVariant,
    cfg: JoinConfig,
    outer_is_right: bool,
    outer_rows: Vec<Vec<Vec<Scalar>>>,
    inner_rows: Vec<Vec<Vec<Scalar>>>,
    outer_filters: Vec<Predicate>,
    residual: Vec<Predicate>,
) -> MergeJoinExec {
    let outer = MockExec::new(i64_schema(&["ok", "ov"]), outer_rows);
    let inner = MockExec::new(i64_schema(&["ik", "iv"]), inner_rows);
    MergeJoinExec::try_new(
        ExecId::new(2),
        cfg,
        EngineConfig::default(),
        MergeJoinDesc {
            variant,
            outer_keys: vec![0],
            inner_keys: vec![0],
            outer_is_right,
            outer_filters,
            residual,
        },
        Box::new(outer),
        Box::new(inner),
        None,
    )
    .expect("build merge join")
}

/// Spill wiring backed by in-memory storage, with the given session memory
/// quota (negative for unlimited).
pub fn spill_env(mem_limit: i64) -> (SpillEnv, MemoryStorage) {
    let storage = MemoryStorage::new();
    let manager = SpillManager::new(Box::new(storage.clone()), Codec::None, "mem/spill".into());
    let env = SpillEnv {
        manager: Arc::new(Mutex::new(manager)),
        session_mem: Tracker::new("session", mem_limit),
        session_disk: Tracker::new("session-disk", -1),
    };
    (env, storage)
}

/// A (key, value) row of optional i64s.
pub fn kv(k: Option<i64>, v: Option<i64>) -> Vec<Scalar> {
    i64_row(&[k, v])
}

pub fn key_row(k: Option<i64>) -> Vec<Scalar> {
    i64_row(&[k])
}

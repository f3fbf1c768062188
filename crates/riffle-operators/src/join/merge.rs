//! Merge join driver.
//!
//! Consumes two children already sorted on their join keys and merges them
//! group by group:
//! 1. equal-join only, one declared sort direction agreed by both sides;
//!    other plan shapes are rejected at construction.
//! 2. The inner side accumulates a complete key group (across chunks,
//!    spilling under memory pressure) so every outer row can be offered
//!    every inner match; the outer side is processed group-by-group within
//!    one chunk.
//!
//! `next` fills the caller's chunk and suspends with all cursor state
//! preserved, so a match group interrupted by a full output chunk resumes
//! exactly where it stopped.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use riffle_core::chunk::Chunk;
use riffle_core::config::EngineConfig;
use riffle_core::id::ExecId;
use riffle_core::schema::Schema;

use riffle_mem::{SpillManager, Tracker};

use crate::compare::{compare_func_for, compare_keys, CompareFunc};
use crate::context::ExecContext;
use crate::filter::Predicate;
use crate::group::GroupChecker;
use crate::traits::{Executor, OpError};

use super::matcher::{JoinVariant, Matcher};
use super::table::{JoinTable, SideCtx};

/// Merge-join configuration knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinConfig {
    /// Total key order direction; must agree with both inputs' sort order.
    pub desc: bool,
    /// Enables the required-rows push-down to the outer child.
    pub is_outer_join: bool,
    /// When false the inner store never spills and memory-quota overruns are
    /// fatal.
    pub enable_spill: bool,
    /// Upper bound on chunk row counts for both sides.
    pub max_chunk_size: usize,
    /// Counter label for the inner side and its spillable store.
    pub inner_spill_label: String,
    /// Counter label for the outer side.
    pub outer_label: String,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            desc: false,
            is_outer_join: false,
            enable_spill: true,
            max_chunk_size: 1024,
            inner_spill_label: "merge-join-inner".to_string(),
            outer_label: "merge-join-outer".to_string(),
        }
    }
}

/// Session-level spill wiring: the shared spill manager plus the session
/// counter roots the operator attaches under.
pub struct SpillEnv {
    pub manager: Arc<Mutex<SpillManager>>,
    pub session_mem: Tracker,
    pub session_disk: Tracker,
}

/// Static description of one merge join: variant, key columns per side, the
/// output layout flag and the optional predicates.
pub struct MergeJoinDesc {
    pub variant: JoinVariant,
    pub outer_keys: Vec<usize>,
    pub inner_keys: Vec<usize>,
    /// True when the outer side is the plan's right child; the physical
    /// output layout stays left-child columns first.
    pub outer_is_right: bool,
    /// Push-down filter applied to outer rows before matching.
    pub outer_filters: Vec<Predicate>,
    /// Residual non-equi predicates over (outer columns ++ inner columns).
    pub residual: Vec<Predicate>,
}

pub struct MergeJoinExec {
    cfg: JoinConfig,
    engine: EngineConfig,
    exec_id: ExecId,
    cmp_funcs: Vec<CompareFunc>,
    matcher: Matcher,
    inner: JoinTable,
    outer: JoinTable,
    /// Carried across `next` calls for the outer row under match.
    has_match: bool,
    has_null: bool,
    mem_tracker: Tracker,
    disk_tracker: Tracker,
    spill: Option<SpillEnv>,
    opened: bool,
    failed: bool,
}

impl std::fmt::Debug for MergeJoinExec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeJoinExec").finish()
    }
}

impl MergeJoinExec {
    /// Validates the plan shape: both key lists non-empty, of equal length,
    /// in bounds, and with pairwise comparable column types.
    pub fn try_new(
        exec_id: ExecId,
        cfg: JoinConfig,
        engine: EngineConfig,
        desc: MergeJoinDesc,
        outer_child: Box<dyn Executor>,
        inner_child: Box<dyn Executor>,
        spill: Option<SpillEnv>,
    ) -> Result<Self, OpError> {
        if desc.outer_keys.is_empty() || desc.outer_keys.len() != desc.inner_keys.len() {
            return Err(OpError::Plan(format!(
                "merge join requires equal non-empty key lists, got {} outer and {} inner",
                desc.outer_keys.len(),
                desc.inner_keys.len()
            )));
        }

        let outer_schema = outer_child.schema().clone();
        let inner_schema = inner_child.schema().clone();

        let mut cmp_funcs = Vec::with_capacity(desc.outer_keys.len());
        for (&o, &i) in desc.outer_keys.iter().zip(&desc.inner_keys) {
            let ot = outer_schema
                .field(o)
                .ok_or_else(|| OpError::Plan(format!("outer key column {o} out of range")))?;
            let it = inner_schema
                .field(i)
                .ok_or_else(|| OpError::Plan(format!("inner key column {i} out of range")))?;
            cmp_funcs.push(compare_func_for(&ot.data_type, &it.data_type)?);
        }

        let side_checker = |schema: &Schema, keys: &[usize]| -> Result<GroupChecker, OpError> {
            let mut funcs = Vec::with_capacity(keys.len());
            for &k in keys {
                let dt = &schema.fields[k].data_type;
                funcs.push(compare_func_for(dt, dt)?);
            }
            Ok(GroupChecker::new(keys.to_vec(), funcs, cfg.desc))
        };

        let matcher = Matcher::new(
            desc.variant,
            &outer_schema,
            &inner_schema,
            desc.outer_is_right,
            desc.residual,
        );

        let outer = JoinTable::new(
            false,
            outer_child,
            desc.outer_keys.clone(),
            desc.outer_filters,
            side_checker(&outer_schema, &desc.outer_keys)?,
            cfg.max_chunk_size,
        );
        let inner = JoinTable::new(
            true,
            inner_child,
            desc.inner_keys.clone(),
            Vec::new(),
            side_checker(&inner_schema, &desc.inner_keys)?,
            cfg.max_chunk_size,
        );

        Ok(Self {
            cfg,
            engine,
            exec_id,
            cmp_funcs,
            matcher,
            inner,
            outer,
            has_match: false,
            has_null: false,
            mem_tracker: Tracker::new("unattached", -1),
            disk_tracker: Tracker::new("unattached", -1),
            spill,
            opened: false,
            failed: false,
        })
    }

    fn compare_heads(&mut self) -> Result<i8, OpError> {
        let outer_row = self
            .outer
            .current_row()?
            .ok_or_else(|| OpError::Exec("outer cursor unexpectedly empty".into()))?;
        let inner_row = self
            .inner
            .current_row()?
            .ok_or_else(|| OpError::Exec("inner cursor unexpectedly empty".into()))?;
        compare_keys(
            &self.cmp_funcs,
            self.outer.key_cols(),
            self.inner.key_cols(),
            &outer_row,
            &inner_row,
        )
    }

    /// The outer group is behind the inner one: every remaining row of it
    /// takes the miss-match path.
    fn drain_outer_miss(&mut self, out: &mut Chunk) -> Result<(), OpError> {
        let Self { outer, matcher, .. } = self;
        while !out.is_full() {
            let Some(row) = outer.current_row()? else {
                break;
            };
            matcher.on_miss_match(false, &row, out)?;
            outer.iter_advance()?;
        }
        Ok(())
    }

    /// Keys are equal: offer every inner-group row to every outer-group
    /// row. Returns true when the call must suspend with the inner cursor
    /// parked mid-group.
    fn join_equal_groups(&mut self, out: &mut Chunk) -> Result<bool, OpError> {
        let Self {
            inner,
            outer,
            matcher,
            has_match,
            has_null,
            ..
        } = self;

        while !out.is_full() {
            let Some(row) = outer.current_row()? else {
                break;
            };

            let passes = outer
                .current_phys_idx()
                .map(|i| outer.filter_passed(i))
                .unwrap_or(true);
            if !passes {
                matcher.on_miss_match(false, &row, out)?;
                outer.iter_advance()?;
                continue;
            }

            // The inner group may not be consumable in one go.
            while !inner.iter_at_end() {
                let (matched, produced_null) = matcher.try_match(&row, &mut *inner, out)?;
                *has_match |= matched;
                *has_null |= produced_null;
                if out.is_full() {
                    if inner.iter_at_end() {
                        break;
                    }
                    // Suspend: the inner position and the match flags are
                    // preserved for the next call.
                    return Ok(true);
                }
            }

            if !*has_match {
                matcher.on_miss_match(*has_null, &row, out)?;
            }
            *has_match = false;
            *has_null = false;
            inner.iter_begin();
            outer.iter_advance()?;
        }
        Ok(false)
    }

    fn fill(&mut self, ctx: &ExecContext, out: &mut Chunk) -> Result<(), OpError> {
        while !out.is_full() {
            if self.inner.iter_at_end() {
                ctx.check_cancelled()?;
                self.inner.fetch_next_inner_group(ctx)?;
            }
            if self.outer.iter_at_end() {
                ctx.check_cancelled()?;
                let required = out.required_rows().saturating_sub(out.num_rows());
                self.outer.fetch_next_outer_group(ctx, &self.cfg, required)?;
                if self.outer.input_exhausted() && self.outer.iter_at_end() {
                    return Ok(());
                }
            }

            // With the inner input drained, the fixed comparison steers every
            // remaining outer row onto the miss-match path.
            let mut cmp: i8 = if self.cfg.desc { 1 } else { -1 };
            if !self.inner.iter_at_end() {
                cmp = self.compare_heads()?;
            }

            let desc = self.cfg.desc;
            if (cmp > 0 && !desc) || (cmp < 0 && desc) {
                // The inner group is behind the outer one; no outer row can
                // match it any more.
                self.inner.iter_reach_end();
                continue;
            }
            if (cmp < 0 && !desc) || (cmp > 0 && desc) {
                self.drain_outer_miss(out)?;
                continue;
            }

            if self.join_equal_groups(out)? {
                return Ok(());
            }
        }
        Ok(())
    }
}

impl Executor for MergeJoinExec {
    fn schema(&self) -> &Schema {
        self.matcher.schema()
    }

    fn open(&mut self, ctx: &ExecContext) -> Result<(), OpError> {
        if self.opened {
            return Err(OpError::Exec("merge join executor is already open".into()));
        }

        self.outer.open_child(ctx)?;
        self.inner.open_child(ctx)?;

        let label = format!("merge_join({})", self.exec_id.get());
        self.mem_tracker = Tracker::new(label.clone(), -1);
        self.disk_tracker = Tracker::new(label, -1);
        if let Some(env) = &self.spill {
            self.mem_tracker.attach(&env.session_mem)?;
            self.disk_tracker.attach(&env.session_disk)?;
        }

        let cx = SideCtx {
            cfg: &self.cfg,
            engine: &self.engine,
            op_mem: &self.mem_tracker,
            op_disk: &self.disk_tracker,
            spill: self.spill.as_ref(),
        };
        self.inner.init(&cx)?;
        self.outer.init(&cx)?;

        self.has_match = false;
        self.has_null = false;
        self.failed = false;
        self.opened = true;
        tracing::debug!(exec_id = %self.exec_id, "merge join opened");
        Ok(())
    }

    fn next(&mut self, ctx: &ExecContext, out: &mut Chunk) -> Result<(), OpError> {
        if !self.opened {
            return Err(OpError::Exec("merge join executor is not open".into()));
        }
        if self.failed {
            return Err(OpError::Exec(
                "merge join executor is in a failed state; close it first".into(),
            ));
        }

        out.reset();
        let res = self.fill(ctx, out);
        if res.is_err() {
            self.failed = true;
        }
        res
    }

    /// Releases the inner side first, then the outer. Idempotent.
    fn close(&mut self) -> Result<(), OpError> {
        let mut first_err: Option<OpError> = None;
        if let Err(e) = self.inner.finish() {
            first_err.get_or_insert(e);
        }
        if let Err(e) = self.outer.finish() {
            first_err.get_or_insert(e);
        }
        if let Err(e) = self.mem_tracker.detach() {
            first_err.get_or_insert(e.into());
        }
        if let Err(e) = self.disk_tracker.detach() {
            first_err.get_or_insert(e.into());
        }
        self.has_match = false;
        self.has_null = false;
        self.opened = false;
        self.failed = false;
        first_err.map_or(Ok(()), Err)
    }
}

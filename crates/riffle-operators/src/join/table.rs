//! Per-side cursor state for the merge join.
//!
//! One `JoinTable` tracks a side's current chunk, the group checker, the
//! selected group, and the resumable group cursor. The inner side also owns
//! the spillable row container that accumulates a key group spanning input
//! chunks. Methods borrow a `SideCtx` for configuration and counters instead
//! of holding a back-reference to the operator.

use std::sync::Arc;

use riffle_core::chunk::Chunk;
use riffle_core::config::EngineConfig;
use riffle_core::types::Scalar;

use riffle_mem::Tracker;

use crate::context::ExecContext;
use crate::filter::{vectorized_filter, Predicate};
use crate::group::GroupChecker;
use crate::store::RowContainer;
use crate::traits::{Executor, OpError};

use super::matcher::GroupRows;
use super::merge::{JoinConfig, SpillEnv};

/// Borrowed view of the operator-level state a side needs.
pub(crate) struct SideCtx<'a> {
    pub cfg: &'a JoinConfig,
    pub engine: &'a EngineConfig,
    pub op_mem: &'a Tracker,
    pub op_disk: &'a Tracker,
    pub spill: Option<&'a SpillEnv>,
}

/// Saved cursor position over (row container ++ current-chunk selection).
/// Surviving `next`-boundary returns is what makes mid-group suspension
/// work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupPos {
    Store { chunk: usize, row: usize },
    Tail { off: usize },
    End,
}

pub(crate) struct JoinTable {
    is_inner: bool,
    child: Box<dyn Executor>,
    key_cols: Vec<usize>,
    /// Push-down filter, outer side only.
    filters: Vec<Predicate>,

    checker: GroupChecker,
    chunk: Chunk,
    group_sel: Vec<usize>,
    pos: GroupPos,
    /// Inner side only: earlier chunks of the current group.
    container: Option<RowContainer>,
    /// Rehydration cache for one spilled chunk, owned by the cursor.
    hydrated: Option<(usize, Chunk)>,
    /// Outer side only: per-physical-row filter verdicts.
    filter_mask: Vec<bool>,

    mem_tracker: Tracker,
    executed: bool,
    inited: bool,
}

impl JoinTable {
    pub(crate) fn new(
        is_inner: bool,
        child: Box<dyn Executor>,
        key_cols: Vec<usize>,
        filters: Vec<Predicate>,
        checker: GroupChecker,
        chunk_capacity: usize,
    ) -> Self {
        let chunk = Chunk::new(child.schema(), chunk_capacity);
        Self {
            is_inner,
            child,
            key_cols,
            filters,
            checker,
            chunk,
            group_sel: Vec::new(),
            pos: GroupPos::End,
            container: None,
            hydrated: None,
            filter_mask: Vec::new(),
            mem_tracker: Tracker::new("unattached", -1),
            executed: false,
            inited: false,
        }
    }

    pub(crate) fn key_cols(&self) -> &[usize] {
        &self.key_cols
    }

    pub(crate) fn input_exhausted(&self) -> bool {
        self.executed
    }

    pub(crate) fn open_child(&mut self, ctx: &ExecContext) -> Result<(), OpError> {
        self.child.open(ctx)
    }

    pub(crate) fn init(&mut self, cx: &SideCtx<'_>) -> Result<(), OpError> {
        let label = if self.is_inner {
            &cx.cfg.inner_spill_label
        } else {
            &cx.cfg.outer_label
        };

        self.chunk = Chunk::new(self.child.schema(), cx.cfg.max_chunk_size);
        self.mem_tracker = Tracker::new(label.clone(), -1);
        self.mem_tracker.attach(cx.op_mem)?;

        if self.is_inner {
            let store_mem = Tracker::new(label.clone(), -1);
            store_mem.attach(cx.op_mem)?;
            let store_disk = Tracker::new(label.clone(), -1);
            store_disk.attach(cx.op_disk)?;

            let spill = if cx.cfg.enable_spill {
                cx.spill
                    .map(|env| (Arc::clone(&env.manager), cx.engine.spill_high_water_bytes))
            } else {
                None
            };
            let container = RowContainer::new(
                self.child.schema().clone(),
                cx.cfg.max_chunk_size,
                store_mem,
                store_disk,
                spill,
            );
            if cx.cfg.enable_spill {
                if let Some(env) = cx.spill {
                    env.session_mem.register_spill_action(container.spill_action());
                }
            }
            self.container = Some(container);
        }

        self.filter_mask.clear();
        self.group_sel.clear();
        self.pos = GroupPos::End;
        self.hydrated = None;
        self.executed = false;
        self.checker.reset();
        self.mem_tracker.consume(self.chunk.mem_bytes() as i64)?;
        self.inited = true;
        Ok(())
    }

    /// Release everything this side holds. Safe to call repeatedly and after
    /// errors; collects the first failure but keeps releasing.
    pub(crate) fn finish(&mut self) -> Result<(), OpError> {
        if !self.inited {
            return Ok(());
        }
        self.inited = false;

        let mut first_err: Option<OpError> = None;
        let mut note = |r: Result<(), OpError>| {
            if let Err(e) = r {
                first_err.get_or_insert(e);
            }
        };

        let bytes = self.chunk.mem_bytes() as i64;
        note(self.mem_tracker.consume(-bytes).map_err(OpError::from));
        self.chunk.reset();

        if let Some(container) = self.container.take() {
            note(container.reset());
            note(container.mem_tracker().detach().map_err(OpError::from));
            note(container.disk_tracker().detach().map_err(OpError::from));
        }
        note(self.mem_tracker.detach().map_err(OpError::from));
        note(self.child.close());

        self.group_sel.clear();
        self.pos = GroupPos::End;
        self.hydrated = None;
        self.filter_mask.clear();
        self.executed = false;
        self.checker.reset();

        first_err.map_or(Ok(()), Err)
    }

    fn container(&self) -> Result<&RowContainer, OpError> {
        self.container
            .as_ref()
            .ok_or_else(|| OpError::Exec("inner-side row container missing".into()))
    }

    fn has_null_in_join_key(&self, phys_row: usize) -> bool {
        self.key_cols.iter().any(|&c| self.chunk.is_null(phys_row, c))
    }

    /// Consume the checker's next run into `group_sel`. Inner-side runs with
    /// a NULL key are skipped: they can never match anything.
    fn select_next_group(&mut self) {
        self.group_sel.clear();
        let Some((begin, end)) = self.checker.next_group() else {
            return;
        };
        if self.is_inner && self.has_null_in_join_key(begin) {
            return;
        }
        self.group_sel.extend(begin..end);
        self.chunk.set_sel(Some(self.group_sel.clone()));
    }

    fn fetch_next_chunk(&mut self, ctx: &ExecContext) -> Result<(), OpError> {
        let old = self.chunk.mem_bytes() as i64;
        let res = self.child.next(ctx, &mut self.chunk);
        let delta = self.chunk.mem_bytes() as i64 - old;
        self.mem_tracker.consume(delta)?;
        res?;
        self.executed = self.chunk.phys_rows() == 0;
        Ok(())
    }

    /// Assemble the next complete inner group: pull runs (and chunks) until
    /// the group closes, handing filled chunks to the row container so the
    /// group may span any number of input chunks.
    pub(crate) fn fetch_next_inner_group(&mut self, ctx: &ExecContext) -> Result<(), OpError> {
        self.chunk.set_sel(None);
        self.group_sel.clear();
        self.hydrated = None;
        self.container()?.reset()?;

        loop {
            if self.executed && self.checker.is_exhausted() {
                self.pos = GroupPos::End;
                return Ok(());
            }

            let mut is_empty = true;
            while is_empty && !self.checker.is_exhausted() {
                self.select_next_group();
                is_empty = self.group_sel.is_empty();
            }

            // All rows sharing the join key belong in one group, however
            // many chunks they arrived in.
            while !self.executed && self.checker.is_exhausted() {
                if !is_empty {
                    // Hand the management of the current chunk to the store.
                    let bytes = self.chunk.mem_bytes() as i64;
                    self.container()?.add(&self.chunk)?;
                    self.mem_tracker.consume(-bytes)?;
                    self.group_sel.clear();

                    self.chunk = self.container()?.alloc_chunk();
                    self.mem_tracker.consume(self.chunk.mem_bytes() as i64)?;
                }

                self.fetch_next_chunk(ctx)?;
                if self.executed {
                    break;
                }

                let carry = self.checker.split(&self.chunk)?;
                if carry && !is_empty {
                    self.select_next_group();
                }
            }

            if !is_empty {
                break;
            }
        }

        let store_chunks = self.container()?.num_chunks();
        if store_chunks > 0 {
            tracing::trace!(
                store_chunks,
                tail_rows = self.group_sel.len(),
                "inner group spans multiple chunks"
            );
        }
        self.iter_begin();
        Ok(())
    }

    /// Position on the next outer group, fetching (at most) one chunk when
    /// the current one is drained. Outer groups never span chunks; equal
    /// keys continuing into the next chunk are simply seen again as an equal
    /// comparison.
    pub(crate) fn fetch_next_outer_group(
        &mut self,
        ctx: &ExecContext,
        cfg: &JoinConfig,
        required_rows: usize,
    ) -> Result<(), OpError> {
        if self.executed && self.checker.is_exhausted() {
            return Ok(());
        }

        if !self.executed && self.checker.is_exhausted() {
            // Selectivity is unknowable under a filter (and for non-outer
            // joins every outer row may match), so the hint is pushed down
            // only for outer joins without one.
            if cfg.is_outer_join && self.filters.is_empty() {
                self.chunk.set_required_rows(required_rows, cfg.max_chunk_size);
            } else {
                self.chunk
                    .set_required_rows(cfg.max_chunk_size, cfg.max_chunk_size);
            }
            self.fetch_next_chunk(ctx)?;
            if self.executed {
                return Ok(());
            }

            vectorized_filter(&self.filters, &self.chunk, &mut self.filter_mask)?;
            let _ = self.checker.split(&self.chunk)?;
        }

        self.select_next_group();
        self.pos = if self.group_sel.is_empty() {
            GroupPos::End
        } else {
            GroupPos::Tail { off: 0 }
        };
        Ok(())
    }

    pub(crate) fn filter_passed(&self, phys_row: usize) -> bool {
        self.filter_mask.get(phys_row).copied().unwrap_or(true)
    }

    // ----- group cursor -----

    pub(crate) fn iter_at_end(&self) -> bool {
        matches!(self.pos, GroupPos::End)
    }

    pub(crate) fn iter_reach_end(&mut self) {
        self.pos = GroupPos::End;
    }

    /// Rewind to the beginning of the current group.
    pub(crate) fn iter_begin(&mut self) {
        let store_chunks = self
            .container
            .as_ref()
            .map(|c| c.num_chunks())
            .unwrap_or(0);
        self.pos = if store_chunks > 0 {
            GroupPos::Store { chunk: 0, row: 0 }
        } else if !self.group_sel.is_empty() {
            GroupPos::Tail { off: 0 }
        } else {
            GroupPos::End
        };
    }

    pub(crate) fn iter_advance(&mut self) -> Result<(), OpError> {
        self.pos = match self.pos {
            GroupPos::Store { chunk, row } => {
                let container = self.container()?;
                if row + 1 < container.chunk_rows(chunk) {
                    GroupPos::Store {
                        chunk,
                        row: row + 1,
                    }
                } else if chunk + 1 < container.num_chunks() {
                    GroupPos::Store {
                        chunk: chunk + 1,
                        row: 0,
                    }
                } else if !self.group_sel.is_empty() {
                    GroupPos::Tail { off: 0 }
                } else {
                    GroupPos::End
                }
            }
            GroupPos::Tail { off } => {
                if off + 1 < self.group_sel.len() {
                    GroupPos::Tail { off: off + 1 }
                } else {
                    GroupPos::End
                }
            }
            GroupPos::End => GroupPos::End,
        };
        Ok(())
    }

    /// Clone the cursor's current row, rehydrating from disk if the store
    /// chunk it points into was spilled.
    pub(crate) fn current_row(&mut self) -> Result<Option<Vec<Scalar>>, OpError> {
        match self.pos {
            GroupPos::Store { chunk, row } => {
                let container = self
                    .container
                    .as_ref()
                    .ok_or_else(|| OpError::Exec("inner-side row container missing".into()))?;
                container.row_values(chunk, row, &mut self.hydrated).map(Some)
            }
            GroupPos::Tail { off } => Ok(Some(self.chunk.row_values(self.group_sel[off]))),
            GroupPos::End => Ok(None),
        }
    }

    /// Physical index of the cursor's row inside the current chunk, when it
    /// points there (used for the outer filter mask).
    pub(crate) fn current_phys_idx(&self) -> Option<usize> {
        match self.pos {
            GroupPos::Tail { off } => Some(self.group_sel[off]),
            _ => None,
        }
    }
}

impl GroupRows for JoinTable {
    fn current(&mut self) -> Result<Option<Vec<Scalar>>, OpError> {
        self.current_row()
    }

    fn advance(&mut self) -> Result<(), OpError> {
        self.iter_advance()
    }

    fn reach_end(&mut self) {
        self.iter_reach_end();
    }
}

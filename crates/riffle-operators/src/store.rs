//! Spillable row store.
//!
//! Append-only container of chunks used by the inner join side to accumulate
//! a key group that spans input chunks. The selection of an added chunk is
//! materialised at insert time, its bytes are charged to the store's memory
//! tracker, and once the in-memory total passes the high-water mark the
//! oldest chunks are written out as spill segments (debit memory, credit
//! disk). Reads rehydrate spilled chunks transparently through a one-chunk
//! cache the iterating cursor owns.
//!
//! The state lives behind `Arc<Mutex<_>>` so a spill action registered with
//! the session memory tracker can reach it from the middle of someone else's
//! `consume` call. The operator itself is single-threaded; the mutex is for
//! that re-entry path, not for parallelism.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use riffle_core::chunk::Chunk;
use riffle_core::id::SpillId;
use riffle_core::schema::Schema;
use riffle_core::types::Scalar;

use riffle_mem::error::{Error as MemError, Result as MemResult};
use riffle_mem::spill::SegmentMeta;
use riffle_mem::{SpillAction, SpillManager, Tracker};

use crate::traits::OpError;

static NEXT_SPILL_ID: AtomicU64 = AtomicU64::new(0);

enum HeldChunk {
    Mem(Chunk),
    Spilled { meta: SegmentMeta, rows: usize },
}

impl HeldChunk {
    fn rows(&self) -> usize {
        match self {
            HeldChunk::Mem(c) => c.phys_rows(),
            HeldChunk::Spilled { rows, .. } => *rows,
        }
    }
}

struct ContainerCore {
    schema: Schema,
    capacity: usize,
    held: Vec<HeldChunk>,
    total_rows: usize,
    in_mem_bytes: usize,
    spill: Option<Arc<Mutex<SpillManager>>>,
    high_water_bytes: usize,
    spill_id: SpillId,
    mem_tracker: Tracker,
    disk_tracker: Tracker,
}

/// Append-only spillable store of chunks, iterated by position.
pub struct RowContainer {
    core: Arc<Mutex<ContainerCore>>,
}

impl RowContainer {
    /// `spill` carries the spill manager and the high-water mark; `None`
    /// disables spilling entirely, in which case memory pressure surfaces as
    /// a tracker limit error instead.
    pub fn new(
        schema: Schema,
        capacity: usize,
        mem_tracker: Tracker,
        disk_tracker: Tracker,
        spill: Option<(Arc<Mutex<SpillManager>>, usize)>,
    ) -> Self {
        let (spill, high_water_bytes) = match spill {
            Some((mgr, hw)) => (Some(mgr), hw),
            None => (None, usize::MAX),
        };
        Self {
            core: Arc::new(Mutex::new(ContainerCore {
                schema,
                capacity,
                held: Vec::new(),
                total_rows: 0,
                in_mem_bytes: 0,
                spill,
                high_water_bytes,
                spill_id: SpillId::new(NEXT_SPILL_ID.fetch_add(1, Ordering::Relaxed)),
                mem_tracker,
                disk_tracker,
            })),
        }
    }

    /// Take ownership of the chunk's logical rows. The chunk's selection is
    /// compacted away, the bytes are charged to the store's memory tracker,
    /// and the store spills if it passed its high-water mark.
    pub fn add(&self, chunk: &Chunk) -> Result<(), OpError> {
        let compact = chunk.compacted();
        let bytes = compact.mem_bytes();
        let rows = compact.phys_rows();

        let (mem_tracker, over) = {
            let mut core = self.core.lock().unwrap();
            core.held.push(HeldChunk::Mem(compact));
            core.total_rows += rows;
            core.in_mem_bytes += bytes;
            (
                core.mem_tracker.clone(),
                core.spill.is_some() && core.in_mem_bytes > core.high_water_bytes,
            )
        };

        // Consumed outside the lock: the session tracker may react by
        // invoking this container's own spill action.
        mem_tracker.consume(bytes as i64)?;

        if over {
            spill_core(&self.core)?;
        }
        Ok(())
    }

    /// Drop all held chunks, delete their segments and release both
    /// counters.
    pub fn reset(&self) -> Result<(), OpError> {
        let mut core = self.core.lock().unwrap();
        let ContainerCore {
            held,
            total_rows,
            in_mem_bytes,
            spill,
            mem_tracker,
            disk_tracker,
            ..
        } = &mut *core;

        let mut mem_released = 0i64;
        let mut disk_released = 0i64;
        for chunk in held.drain(..) {
            match chunk {
                HeldChunk::Mem(c) => mem_released += c.mem_bytes() as i64,
                HeldChunk::Spilled { meta, .. } => {
                    if let Some(mgr) = spill {
                        mgr.lock().unwrap().delete_segment(&meta.name)?;
                    }
                    disk_released += meta.compressed_len as i64;
                }
            }
        }
        *total_rows = 0;
        *in_mem_bytes = 0;
        mem_tracker.consume(-mem_released)?;
        disk_tracker.consume(-disk_released)?;
        Ok(())
    }

    pub fn num_chunks(&self) -> usize {
        self.core.lock().unwrap().held.len()
    }

    pub fn num_rows(&self) -> usize {
        self.core.lock().unwrap().total_rows
    }

    pub fn chunk_rows(&self, idx: usize) -> usize {
        self.core.lock().unwrap().held[idx].rows()
    }

    /// Count of chunks currently resident on disk.
    pub fn spilled_chunks(&self) -> usize {
        let core = self.core.lock().unwrap();
        core.held
            .iter()
            .filter(|h| matches!(h, HeldChunk::Spilled { .. }))
            .count()
    }

    /// A fresh empty chunk compatible with the stored schema.
    pub fn alloc_chunk(&self) -> Chunk {
        let core = self.core.lock().unwrap();
        Chunk::new(&core.schema, core.capacity)
    }

    /// Clone one row, rehydrating a spilled chunk into `cache` when needed.
    /// The cache belongs to the iterating cursor so a mid-group suspension
    /// keeps its position without pinning the container.
    pub fn row_values(
        &self,
        chunk_idx: usize,
        row_idx: usize,
        cache: &mut Option<(usize, Chunk)>,
    ) -> Result<Vec<Scalar>, OpError> {
        let core = self.core.lock().unwrap();
        match &core.held[chunk_idx] {
            HeldChunk::Mem(c) => Ok(c.row_values(row_idx)),
            HeldChunk::Spilled { meta, .. } => {
                if let Some((idx, c)) = cache {
                    if *idx == chunk_idx {
                        return Ok(c.row_values(row_idx));
                    }
                }
                let mgr = core
                    .spill
                    .as_ref()
                    .ok_or_else(|| OpError::Exec("spilled chunk without a spill manager".into()))?;
                let chunk = mgr.lock().unwrap().read_chunk(meta)?;
                let values = chunk.row_values(row_idx);
                *cache = Some((chunk_idx, chunk));
                Ok(values)
            }
        }
    }

    /// Write every in-memory chunk out, oldest first.
    pub fn spill(&self) -> Result<(), OpError> {
        spill_core(&self.core)?;
        Ok(())
    }

    /// Action to register with a session tracker so memory pressure anywhere
    /// in the tree can force this store onto disk.
    pub fn spill_action(&self) -> Arc<dyn SpillAction> {
        Arc::new(ContainerSpillAction {
            core: Arc::downgrade(&self.core),
        })
    }

    pub fn mem_tracker(&self) -> Tracker {
        self.core.lock().unwrap().mem_tracker.clone()
    }

    pub fn disk_tracker(&self) -> Tracker {
        self.core.lock().unwrap().disk_tracker.clone()
    }
}

fn spill_core(core: &Mutex<ContainerCore>) -> MemResult<()> {
    let mut core = core.lock().unwrap();
    let ContainerCore {
        held,
        in_mem_bytes,
        spill,
        spill_id,
        mem_tracker,
        disk_tracker,
        ..
    } = &mut *core;

    let Some(mgr) = spill else {
        // Nothing to do; the tracker limit check will surface the pressure.
        return Ok(());
    };
    let mut mgr = mgr.lock().unwrap();

    for i in 0..held.len() {
        let (bytes, rows, meta) = match &held[i] {
            HeldChunk::Mem(chunk) => {
                let bytes = chunk.mem_bytes();
                let rows = chunk.phys_rows();
                let seg = mgr.next_seg_index();
                let meta = mgr.write_chunk(chunk, *spill_id, seg)?;
                (bytes, rows, meta)
            }
            HeldChunk::Spilled { .. } => continue,
        };
        tracing::debug!(
            segment = %meta.name.0,
            rows,
            mem_bytes = bytes,
            disk_bytes = meta.compressed_len,
            "spilled row-store chunk"
        );
        disk_tracker.consume(meta.compressed_len as i64)?;
        mem_tracker.consume(-(bytes as i64))?;
        *in_mem_bytes -= bytes;
        held[i] = HeldChunk::Spilled { meta, rows };
    }
    Ok(())
}

struct ContainerSpillAction {
    core: Weak<Mutex<ContainerCore>>,
}

impl SpillAction for ContainerSpillAction {
    fn spill(&self) -> MemResult<()> {
        match self.core.upgrade() {
            Some(core) => spill_core(&core),
            // The store is gone; report nothing freed and let the tracker
            // re-check its limit.
            None => Err(MemError::Tracker(
                "spill action target no longer exists".into(),
            )),
        }
    }
}

//! Columnar chunk: the unit of data flow between executors.
//!
//! A chunk is a block of up to `capacity` rows stored column-wise. An optional
//! selection vector (a strictly increasing list of physical row indices)
//! restricts iteration to a subset without copying; selection is the only
//! mechanism for hiding rows. The chunk also carries the required-rows hint a
//! parent executor pushes down to bound how much a child should produce.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::types::{scalar_mem_bytes, Column, Scalar};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    columns: Vec<Column>,
    sel: Option<Vec<usize>>,
    capacity: usize,
    required_rows: usize,
}

impl Chunk {
    /// An empty chunk shaped after `schema`, with `required_rows` defaulting
    /// to the full capacity.
    pub fn new(schema: &Schema, capacity: usize) -> Self {
        let columns = schema
            .fields
            .iter()
            .map(|f| Column::new(f.name.clone()))
            .collect();
        Self {
            columns,
            sel: None,
            capacity,
            required_rows: capacity,
        }
    }

    pub fn num_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Physical rows stored, ignoring any selection.
    pub fn phys_rows(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    /// Logical rows: the selection length when one is set, otherwise the
    /// physical row count.
    pub fn num_rows(&self) -> usize {
        match &self.sel {
            Some(sel) => sel.len(),
            None => self.phys_rows(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Clears values and selection. The capacity and the required-rows hint
    /// survive a reset; a parent re-arms the hint before each fetch.
    pub fn reset(&mut self) {
        for col in &mut self.columns {
            col.values.clear();
        }
        self.sel = None;
    }

    pub fn sel(&self) -> Option<&[usize]> {
        self.sel.as_deref()
    }

    /// Install or clear the selection vector. Indices must be strictly
    /// increasing and in range.
    pub fn set_sel(&mut self, sel: Option<Vec<usize>>) {
        if let Some(s) = &sel {
            debug_assert!(s.windows(2).all(|w| w[0] < w[1]));
            debug_assert!(s.last().map_or(true, |&i| i < self.phys_rows()));
        }
        self.sel = sel;
    }

    /// Maps a logical row index to its physical index through the selection.
    pub fn phys_index(&self, logical: usize) -> usize {
        match &self.sel {
            Some(sel) => sel[logical],
            None => logical,
        }
    }

    pub fn required_rows(&self) -> usize {
        self.required_rows
    }

    /// Sets the required-rows hint. Out-of-range values fall back to `max`.
    pub fn set_required_rows(&mut self, required: usize, max: usize) -> usize {
        self.required_rows = if required == 0 || required > max {
            max
        } else {
            required
        };
        self.required_rows
    }

    pub fn is_full(&self) -> bool {
        self.num_rows() >= self.required_rows
    }

    pub fn get(&self, phys_row: usize, col: usize) -> &Scalar {
        &self.columns[col].values[phys_row]
    }

    pub fn is_null(&self, phys_row: usize, col: usize) -> bool {
        self.get(phys_row, col).is_null()
    }

    /// Borrowed handle to one logical row.
    pub fn row(&self, logical: usize) -> RowRef<'_> {
        RowRef {
            chunk: self,
            phys: self.phys_index(logical),
            logical,
        }
    }

    /// Clones the values of one physical row.
    pub fn row_values(&self, phys_row: usize) -> Vec<Scalar> {
        self.columns
            .iter()
            .map(|c| c.values[phys_row].clone())
            .collect()
    }

    /// Appends one row. The value count must match the column count.
    pub fn append_row(&mut self, values: &[Scalar]) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(Error::Schema(format!(
                "append_row arity mismatch: {} values into {} columns",
                values.len(),
                self.columns.len()
            )));
        }
        for (col, v) in self.columns.iter_mut().zip(values) {
            col.values.push(v.clone());
        }
        Ok(())
    }

    /// Appends one physical row from a compatible chunk.
    pub fn append_row_from(&mut self, src: &Chunk, phys_row: usize) -> Result<()> {
        if src.num_cols() != self.num_cols() {
            return Err(Error::Schema(format!(
                "append_row_from column mismatch: {} vs {}",
                src.num_cols(),
                self.num_cols()
            )));
        }
        for (dst, s) in self.columns.iter_mut().zip(&src.columns) {
            dst.values.push(s.values[phys_row].clone());
        }
        Ok(())
    }

    /// Appends the listed physical rows of `src` in order.
    pub fn append_from(&mut self, src: &Chunk, rows: &[usize]) -> Result<()> {
        for &r in rows {
            self.append_row_from(src, r)?;
        }
        Ok(())
    }

    /// Materialises the selection into a fresh chunk. Without a selection
    /// this is a plain copy of the stored rows.
    pub fn compacted(&self) -> Chunk {
        let mut out = Chunk {
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone()))
                .collect(),
            sel: None,
            capacity: self.capacity,
            required_rows: self.capacity,
        };
        match &self.sel {
            Some(sel) => {
                for (dst, src) in out.columns.iter_mut().zip(&self.columns) {
                    dst.values.extend(sel.iter().map(|&i| src.values[i].clone()));
                }
            }
            None => {
                for (dst, src) in out.columns.iter_mut().zip(&self.columns) {
                    dst.values.extend(src.values.iter().cloned());
                }
            }
        }
        out
    }

    /// Deterministic memory footprint used for counter accounting. Covers
    /// the row data only; the selection vector is operator scratch and is
    /// deliberately excluded so applying one never drifts the counters.
    pub fn mem_bytes(&self) -> usize {
        self.columns.iter().map(Column::mem_bytes).sum::<usize>()
    }
}

/// A row handle: the owning chunk, the physical index, and the logical index
/// through the selection. Handles must not outlive the chunk they refer into.
#[derive(Clone, Copy)]
pub struct RowRef<'a> {
    chunk: &'a Chunk,
    phys: usize,
    logical: usize,
}

impl<'a> RowRef<'a> {
    pub fn get(&self, col: usize) -> &'a Scalar {
        self.chunk.get(self.phys, col)
    }

    pub fn is_null(&self, col: usize) -> bool {
        self.chunk.is_null(self.phys, col)
    }

    pub fn phys_idx(&self) -> usize {
        self.phys
    }

    pub fn logical_idx(&self) -> usize {
        self.logical
    }

    pub fn to_values(&self) -> Vec<Scalar> {
        self.chunk.row_values(self.phys)
    }

    pub fn mem_bytes(&self) -> usize {
        (0..self.chunk.num_cols())
            .map(|c| scalar_mem_bytes(self.get(c)))
            .sum()
    }
}

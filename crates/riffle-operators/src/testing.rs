//! Test doubles and helpers shared by unit and integration tests.

use std::collections::VecDeque;

use riffle_core::chunk::Chunk;
use riffle_core::schema::{DataType, Field, Schema};
use riffle_core::types::Scalar;

use crate::context::ExecContext;
use crate::traits::{Executor, OpError};

/// Scripted child executor: yields its prepared batches in order, then
/// signals EOF with empty chunks. Optionally fails after the script runs
/// out, for upstream-error tests.
pub struct MockExec {
    schema: Schema,
    batches: VecDeque<Vec<Vec<Scalar>>>,
    fail_at_eof: bool,
    opened: bool,
}

impl MockExec {
    pub fn new(schema: Schema, batches: Vec<Vec<Vec<Scalar>>>) -> Self {
        Self {
            schema,
            batches: batches.into(),
            fail_at_eof: false,
            opened: false,
        }
    }

    /// Error instead of reporting EOF once the scripted batches run out.
    pub fn failing_at_eof(mut self) -> Self {
        self.fail_at_eof = true;
        self
    }
}

impl Executor for MockExec {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn open(&mut self, _ctx: &ExecContext) -> Result<(), OpError> {
        self.opened = true;
        Ok(())
    }

    fn next(&mut self, _ctx: &ExecContext, out: &mut Chunk) -> Result<(), OpError> {
        if !self.opened {
            return Err(OpError::Exec("mock executor is not open".into()));
        }
        out.reset();
        match self.batches.pop_front() {
            Some(batch) => {
                for row in &batch {
                    out.append_row(row)?;
                }
                Ok(())
            }
            None if self.fail_at_eof => Err(OpError::Exec("mock upstream failure".into())),
            None => Ok(()),
        }
    }

    fn close(&mut self) -> Result<(), OpError> {
        self.opened = false;
        Ok(())
    }
}

/// Schema of nullable Int64 columns, one per name.
pub fn i64_schema(names: &[&str]) -> Schema {
    Schema::new(
        names
            .iter()
            .map(|n| Field::new(*n, DataType::Int64, true))
            .collect(),
    )
}

/// One row of optional i64 values (None becomes NULL).
pub fn i64_row(values: &[Option<i64>]) -> Vec<Scalar> {
    values
        .iter()
        .map(|v| v.map(Scalar::I64).unwrap_or(Scalar::Null))
        .collect()
}

/// Single-column batches from plain key lists, one batch per inner list.
pub fn key_batches(batches: &[&[Option<i64>]]) -> Vec<Vec<Vec<Scalar>>> {
    batches
        .iter()
        .map(|b| b.iter().map(|k| i64_row(&[*k])).collect())
        .collect()
}

/// Clone the logical rows of a chunk.
pub fn collect_rows(chunk: &Chunk) -> Vec<Vec<Scalar>> {
    (0..chunk.num_rows())
        .map(|i| chunk.row_values(chunk.phys_index(i)))
        .collect()
}

/// Drive an executor to EOF with the given output capacity, gathering every
/// produced row.
pub fn drain_executor(
    exec: &mut dyn Executor,
    ctx: &ExecContext,
    out_capacity: usize,
) -> Result<Vec<Vec<Scalar>>, OpError> {
    let schema = exec.schema().clone();
    let mut out = Chunk::new(&schema, out_capacity);
    let mut rows = Vec::new();
    loop {
        exec.next(ctx, &mut out)?;
        if out.is_empty() {
            return Ok(rows);
        }
        rows.extend(collect_rows(&out));
    }
}

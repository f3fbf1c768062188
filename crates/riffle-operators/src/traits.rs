//! Executor trait + common error type.
//!
//! Executors form a pull-based tree: a parent calls `next` with an output
//! chunk, the child fills it with up to `capacity` rows and an empty chunk
//! signals end of input. The required-rows hint travels on the chunk itself
//! (`Chunk::set_required_rows`), so children that can bound their output
//! cheaply may stop early.

use riffle_core::chunk::Chunk;
use riffle_core::schema::Schema;

use thiserror::Error;

use crate::context::ExecContext;

#[derive(Debug, Error)]
pub enum OpError {
    #[error("planning error: {0}")]
    Plan(String),

    #[error("execution error: {0}")]
    Exec(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("sorted-input invariant violated: {0}")]
    Invariant(String),

    #[error("execution cancelled")]
    Cancelled,

    #[error(transparent)]
    Mem(#[from] riffle_mem::error::Error),

    #[error(transparent)]
    Core(#[from] riffle_core::error::Error),
}

/// Trait all executors implement.
///
/// Lifecycle: `open` once, `next` until it leaves the output chunk empty,
/// `close` to release resources. `close` must be safe to call at any point
/// and more than once.
pub trait Executor {
    /// Output column layout. Available before `open`.
    fn schema(&self) -> &Schema;

    fn open(&mut self, ctx: &ExecContext) -> Result<(), OpError>;

    /// Produce the next output chunk. Implementations reset `out` first.
    fn next(&mut self, ctx: &ExecContext, out: &mut Chunk) -> Result<(), OpError>;

    fn close(&mut self) -> Result<(), OpError>;
}

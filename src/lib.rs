//! riffle: a sort-merge join operator for a columnar vectorised engine.
//!
//! This facade re-exports the workspace crates so integration tests and
//! downstream users can depend on a single package.

pub use riffle_core;
pub use riffle_io;
pub use riffle_mem;
pub use riffle_operators;

pub use riffle_core::prelude::*;
pub use riffle_operators::{ExecContext, Executor, OpError};

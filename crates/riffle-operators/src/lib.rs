#![forbid(unsafe_code)]
//! riffle-operators: pull-based executors, centred on the sort-merge join.
//!
//! Design intent:
//! - Everything is synchronous and single-threaded per operator instance;
//!   parallelism comes from running independent instances.
//! - Every chunk an operator holds is accounted against a `riffle-mem`
//!   tracker; the inner join side can spill its accumulated group through the
//!   spillable row store.
//! - Executors produce data in the pull model: `next(ctx, out)` fills the
//!   caller's chunk, an empty chunk signals end of input.

pub mod compare;
pub mod context;
pub mod filter;
pub mod group;
pub mod join;
pub mod store;
pub mod testing;
pub mod traits;

pub use context::ExecContext;
pub use join::{JoinConfig, JoinVariant, Matcher, MergeJoinDesc, MergeJoinExec, SpillEnv};
pub use store::RowContainer;
pub use traits::{Executor, OpError};

//! Sort-merge join.
//!
//! `merge` holds the driver (`MergeJoinExec`), `table` the per-side cursor
//! state, and `matcher` the join-variant behaviour invoked on matched
//! groups.

mod matcher;
mod merge;
mod table;

pub use matcher::{GroupRows, JoinVariant, Matcher};
pub use merge::{JoinConfig, MergeJoinDesc, MergeJoinExec, SpillEnv};

//! Convenient re-exports for downstream crates.

pub use crate::chunk::{Chunk, RowRef};
pub use crate::config::EngineConfig;
pub use crate::error::{Error, Result};
pub use crate::id::{ExecId, SpillId};
pub use crate::schema::{DataType, Field, Schema};
pub use crate::types::{scalar_mem_bytes, Column, Scalar};

//! riffle-io: `riffle_mem::Storage` backends.
//!
//! - `FsStorage`: local filesystem scratch directory (default).
//! - `MemoryStorage`: HashMap-backed storage for tests (`memory://`).

pub mod error;
pub mod memory_storage;
pub mod storage;

pub use memory_storage::MemoryStorage;
pub use storage::{build_storage, FsStorage};

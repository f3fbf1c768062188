//! Storage adapters implementing `riffle_mem::Storage`.

mod fs;
pub use fs::FsStorage;

use riffle_mem::Storage;

use crate::error::{Error, Result};
use crate::memory_storage::MemoryStorage;

/// Build a storage backend for the given spill URI.
///
/// `None` or a `file://` scheme selects the local filesystem; `memory://`
/// selects the in-memory backend used by tests.
pub fn build_storage(uri: Option<&str>) -> Result<Box<dyn Storage>> {
    let scheme = uri.and_then(|u| u.split("://").next()).map(str::trim);
    match scheme {
        None | Some("file") => Ok(Box::new(FsStorage::new())),
        Some("memory") => Ok(Box::new(MemoryStorage::new())),
        Some(other) => Err(Error::Config(format!("unsupported spill scheme '{other}'"))),
    }
}

#![forbid(unsafe_code)]
//! riffle-mem: memory/disk counter trees and the spill manager.
//!
//! Operators account every chunk they hold against a `Tracker` node attached
//! to a session-wide tree. Exceeding a tracker limit either invokes a
//! registered spill action (reactive spilling, synchronous on the consumer's
//! stack) or surfaces a fatal error.
//!
//! No async or object-store IO lives here. A generic `Storage` trait is
//! exposed (in `spill::`) and implemented by `riffle-io`.

pub mod error;
pub mod spill;
pub mod tracker;

pub use spill::{Codec, SegmentMeta, SpillManager, Storage};
pub use tracker::{SpillAction, Tracker};

//! Counter tree nodes with an optional spill action.
//!
//! A `Tracker` counts bytes for one consumer (an operator, a side of a join,
//! a row store). `consume` bubbles every delta to all ancestors so a
//! session-level node sees the total. A node with a limit reacts to being
//! exceeded by invoking its registered spill action; with no action the
//! overage is a fatal error.
//!
//! Trackers are cheap clones of an `Arc` inner; cloning does not fork the
//! counter.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};

/// Frees memory by moving data to disk. Invoked synchronously on the
/// consuming caller's stack when a tracker limit is exceeded.
pub trait SpillAction: Send + Sync {
    fn spill(&self) -> Result<()>;
}

struct TrackerInner {
    label: Mutex<String>,
    /// Byte limit; negative means unlimited.
    limit_bytes: i64,
    consumed: AtomicI64,
    max_consumed: AtomicI64,
    parent: Mutex<Option<Tracker>>,
    action: Mutex<Option<Arc<dyn SpillAction>>>,
    /// Guards against re-entrant triggering while an action runs.
    acting: AtomicBool,
}

#[derive(Clone)]
pub struct Tracker {
    inner: Arc<TrackerInner>,
}

impl Tracker {
    pub fn new(label: impl Into<String>, limit_bytes: i64) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                label: Mutex::new(label.into()),
                limit_bytes,
                consumed: AtomicI64::new(0),
                max_consumed: AtomicI64::new(0),
                parent: Mutex::new(None),
                action: Mutex::new(None),
                acting: AtomicBool::new(false),
            }),
        }
    }

    pub fn label(&self) -> String {
        self.inner.label.lock().unwrap().clone()
    }

    pub fn set_label(&self, label: impl Into<String>) {
        *self.inner.label.lock().unwrap() = label.into();
    }

    pub fn limit_bytes(&self) -> i64 {
        self.inner.limit_bytes
    }

    pub fn bytes_consumed(&self) -> i64 {
        self.inner.consumed.load(Ordering::Relaxed)
    }

    pub fn max_consumed(&self) -> i64 {
        self.inner.max_consumed.load(Ordering::Relaxed)
    }

    fn same_node(&self, other: &Tracker) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Attach under `parent`, carrying any bytes already consumed over to the
    /// new ancestor chain. Detaches from the previous parent first.
    pub fn attach(&self, parent: &Tracker) -> Result<()> {
        // Reject cycles before mutating anything.
        let mut node = Some(parent.clone());
        while let Some(t) = node {
            if t.same_node(self) {
                return Err(Error::Tracker(format!(
                    "attach would create a cycle through '{}'",
                    self.label()
                )));
            }
            node = t.parent();
        }

        self.detach()?;
        let consumed = self.bytes_consumed();
        if consumed != 0 {
            parent.consume(consumed)?;
        }
        *self.inner.parent.lock().unwrap() = Some(parent.clone());
        Ok(())
    }

    /// Detach from the current parent, returning this node's bytes to it.
    pub fn detach(&self) -> Result<()> {
        let old = self.inner.parent.lock().unwrap().take();
        if let Some(p) = old {
            let consumed = self.bytes_consumed();
            if consumed != 0 {
                p.consume(-consumed)?;
            }
        }
        Ok(())
    }

    fn parent(&self) -> Option<Tracker> {
        self.inner.parent.lock().unwrap().clone()
    }

    /// Registers the action invoked when this node's limit is exceeded.
    /// Replaces any previously registered action.
    pub fn register_spill_action(&self, action: Arc<dyn SpillAction>) {
        *self.inner.action.lock().unwrap() = Some(action);
    }

    /// Add `bytes` (negative to release) to this node and every ancestor.
    ///
    /// A positive delta that pushes a limited node past its limit triggers
    /// that node's spill action; if no action is registered, or the node is
    /// still over limit after the action ran, the overage is fatal.
    pub fn consume(&self, bytes: i64) -> Result<()> {
        if bytes == 0 {
            return Ok(());
        }
        let mut node = self.clone();
        loop {
            let new = node.inner.consumed.fetch_add(bytes, Ordering::AcqRel) + bytes;
            record_max(&node.inner.max_consumed, new);
            if bytes > 0 && node.inner.limit_bytes >= 0 && new > node.inner.limit_bytes {
                node.relieve(new)?;
            }
            match node.parent() {
                Some(p) => node = p,
                None => return Ok(()),
            }
        }
    }

    fn relieve(&self, observed: i64) -> Result<()> {
        // A consume issued by a running action must not re-trigger it.
        if self.inner.acting.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let action = self.inner.action.lock().unwrap().clone();
        let outcome = match action {
            Some(action) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    label = %self.label(),
                    consumed = observed,
                    limit = self.inner.limit_bytes,
                    "tracker over limit, invoking spill action"
                );
                action.spill()
            }
            None => Err(Error::LimitExceeded {
                label: self.label(),
                consumed: observed,
                limit: self.inner.limit_bytes,
            }),
        };
        self.inner.acting.store(false, Ordering::SeqCst);
        outcome?;

        let after = self.bytes_consumed();
        if after > self.inner.limit_bytes {
            return Err(Error::LimitExceeded {
                label: self.label(),
                consumed: after,
                limit: self.inner.limit_bytes,
            });
        }
        Ok(())
    }
}

fn record_max(max: &AtomicI64, observed: i64) {
    let mut cur = max.load(Ordering::Relaxed);
    while observed > cur {
        match max.compare_exchange(cur, observed, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => break,
            Err(seen) => cur = seen,
        }
    }
}

//! Progress and cancellation for cohort-wide operations.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

/// Snapshot of a bulk run's progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkProgress {
    pub processed: usize,
    pub total: usize,
}

/// Shared handle observed by a running bulk operation.
///
/// Clones share state: hand one clone to the operation and keep another to
/// watch progress or cancel from a different task. Cancellation is checked
/// before each record, so a record already in flight completes.
#[derive(Debug, Clone, Default)]
pub struct BulkControl {
    cancelled: Arc<AtomicBool>,
    processed: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
}

impl BulkControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the running operation to stop before its next record.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            info!(subsystem = "fields", component = "bulk", "Bulk operation cancellation requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn progress(&self) -> BulkProgress {
        BulkProgress {
            processed: self.processed.load(Ordering::SeqCst),
            total: self.total.load(Ordering::SeqCst),
        }
    }

    pub(crate) fn begin(&self, total: usize) {
        self.processed.store(0, Ordering::SeqCst);
        self.total.store(total, Ordering::SeqCst);
    }

    pub(crate) fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let control = BulkControl::new();
        let observer = control.clone();

        control.begin(3);
        control.record_processed();
        assert_eq!(observer.progress(), BulkProgress { processed: 1, total: 3 });

        observer.cancel();
        assert!(control.is_cancelled());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let control = BulkControl::new();
        control.cancel();
        control.cancel();
        assert!(control.is_cancelled());
    }

    #[test]
    fn test_begin_resets_progress() {
        let control = BulkControl::new();
        control.begin(2);
        control.record_processed();
        control.begin(5);
        assert_eq!(control.progress(), BulkProgress { processed: 0, total: 5 });
    }
}

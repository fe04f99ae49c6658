//! Progress callbacks for indexing runs.

use crate::indexer::IndexReport;

/// Progress callback for reporting indexing status.
pub trait IndexProgress: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a topic's document has been submitted.
    fn topic_indexed(&self, page_name: &str, current: usize, total: usize);
    /// Called when a topic could not be indexed.
    fn topic_failed(&self, page_name: &str, error: &str);
    /// Called when the run completes.
    fn done(&self, report: &IndexReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl IndexProgress for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn topic_indexed(&self, _page_name: &str, _current: usize, _total: usize) {}
    fn topic_failed(&self, _page_name: &str, _error: &str) {}
    fn done(&self, _report: &IndexReport) {}
}

//! Wiki search indexing for wikisearch.
//!
//! Enumerates the wiki's topics, turns each into an [`IndexDocument`] and
//! hands it to the indexing service, collecting per-topic failures instead
//! of aborting.
//!
//! [`IndexDocument`]: wikisearch_shared::IndexDocument

pub mod indexer;
pub mod link;
pub mod progress;

pub use indexer::{IndexReport, WikiIndexer};
pub use progress::{IndexProgress, SilentProgress};

//! Capabilities the indexer consumes from its host.
//!
//! The content store owns topics and their revisions; the indexing service
//! owns documents. The indexer only reads from the first and writes to the
//! second.

use std::future::Future;

use crate::error::Result;
use crate::types::{IndexDocument, Topic, TopicVersion};

/// Read access to the wiki's topics.
pub trait TopicStore: Send + Sync {
    /// All topics belonging to the wiki.
    fn list_topics(&self) -> impl Future<Output = Result<Vec<Topic>>> + Send;

    /// A single topic by id, or `None` if it does not exist.
    fn find_topic(&self, id: i64) -> impl Future<Output = Result<Option<Topic>>> + Send;

    /// The most recent revision of a topic, or `None` if it has none.
    fn find_last_version(
        &self,
        topic_id: i64,
    ) -> impl Future<Output = Result<Option<TopicVersion>>> + Send;
}

/// Write access to the search indexing service.
pub trait DocumentSink: Send + Sync {
    /// Submit one document. A document with the same uid is replaced.
    fn write_document(&self, document: &IndexDocument) -> impl Future<Output = Result<()>> + Send;

    /// Submit several documents as one unit.
    fn add_documents(&self, documents: &[IndexDocument])
    -> impl Future<Output = Result<()>> + Send;

    /// Make previously submitted documents visible to searches.
    fn commit(&self) -> impl Future<Output = Result<()>> + Send;
}

impl<T: TopicStore> TopicStore for &T {
    fn list_topics(&self) -> impl Future<Output = Result<Vec<Topic>>> + Send {
        (**self).list_topics()
    }

    fn find_topic(&self, id: i64) -> impl Future<Output = Result<Option<Topic>>> + Send {
        (**self).find_topic(id)
    }

    fn find_last_version(
        &self,
        topic_id: i64,
    ) -> impl Future<Output = Result<Option<TopicVersion>>> + Send {
        (**self).find_last_version(topic_id)
    }
}

impl<T: DocumentSink> DocumentSink for &T {
    fn write_document(&self, document: &IndexDocument) -> impl Future<Output = Result<()>> + Send {
        (**self).write_document(document)
    }

    fn add_documents(
        &self,
        documents: &[IndexDocument],
    ) -> impl Future<Output = Result<()>> + Send {
        (**self).add_documents(documents)
    }

    fn commit(&self) -> impl Future<Output = Result<()>> + Send {
        (**self).commit()
    }
}

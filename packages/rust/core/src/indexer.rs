//! The wiki indexer: topics in, search documents out.
//!
//! Bulk indexing never stops on a single topic: failures are logged, recorded
//! in the [`IndexReport`], and the loop moves on. Single-document lookups
//! ([`WikiIndexer::documents_for_id`]) propagate every failure instead.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info, instrument};
use url::Url;

use wikisearch_shared::{
    DOCUMENT_TYPE, DocumentSink, IndexDocument, IndexerConfig, RESOURCE_TYPE, Result,
    SHORT_NAME_TOPIC, Topic, TopicStore, WikiSearchError,
};

use crate::link;
use crate::progress::IndexProgress;

/// Outcome of one indexing run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexReport {
    /// Number of topics enumerated.
    pub total: usize,
    /// Number of topics whose document was submitted.
    pub indexed: usize,
    /// One line per topic processed.
    pub logs: Vec<String>,
    /// One human-readable message per topic that failed.
    pub errors: Vec<String>,
    pub elapsed: Duration,
}

impl IndexReport {
    /// The run log as a single newline-separated string.
    pub fn log_text(&self) -> String {
        self.logs.join("\n")
    }

    fn log(&mut self, line: String) {
        debug!("{line}");
        self.logs.push(line);
    }
}

/// Indexes the topics of a [`TopicStore`] into a [`DocumentSink`].
pub struct WikiIndexer<S, K> {
    store: S,
    sink: K,
    config: IndexerConfig,
    portal_url: Url,
}

impl<S: TopicStore, K: DocumentSink> WikiIndexer<S, K> {
    /// Create an indexer. Fails if the configured portal URL is not usable.
    pub fn new(store: S, sink: K, config: IndexerConfig) -> Result<Self> {
        let portal_url = link::parse_portal_url(&config.portal_url)?;
        Ok(Self {
            store,
            sink,
            config,
            portal_url,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn description(&self) -> &str {
        &self.config.description
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Resource types this indexer produces documents for.
    pub fn resource_types(&self) -> Vec<&'static str> {
        vec![RESOURCE_TYPE]
    }

    /// Search uid of a resource, or `None` if the resource type is not handled here.
    pub fn resource_uid(&self, resource_id: &str, resource_type: &str) -> Option<String> {
        (resource_type == RESOURCE_TYPE).then(|| format!("{resource_id}_{SHORT_NAME_TOPIC}"))
    }

    /// Search uid of a topic's document: `<page_name>_wis`.
    pub fn document_uid(topic: &Topic) -> String {
        format!("{}_{SHORT_NAME_TOPIC}", topic.page_name)
    }

    /// View link of a wiki page.
    pub fn topic_url(&self, page_name: &str) -> String {
        link::topic_url(&self.portal_url, &self.config.page_path_label, page_name)
    }

    /// Build the search document for one topic from its latest revision.
    ///
    /// A topic without a revision, or whose latest revision has no text, gets
    /// empty content and no date.
    #[instrument(skip(self, topic), fields(topic_id = topic.id, page_name = %topic.page_name))]
    pub async fn build_document(&self, topic: &Topic) -> Result<IndexDocument> {
        let version = self.store.find_last_version(topic.id).await?;

        let (markup, date) = match version
            .as_ref()
            .and_then(|v| v.text().map(|text| (text, v.edited_at)))
        {
            Some((text, edited_at)) => (text, Some(edited_at)),
            None => ("", None),
        };

        let content = wikisearch_markup::to_plain_text(markup);
        debug!(content_len = content.len(), has_date = date.is_some(), "document built");

        Ok(IndexDocument {
            url: self.topic_url(&topic.page_name),
            title: topic.page_name.clone(),
            uid: Self::document_uid(topic),
            content,
            site: self.config.site_name.clone(),
            doc_type: DOCUMENT_TYPE.to_string(),
            date,
        })
    }

    /// Index every topic of the store.
    ///
    /// Only a failure to enumerate topics is returned as `Err`; per-topic
    /// failures end up in [`IndexReport::errors`].
    #[instrument(skip_all, fields(indexer = %self.config.name, batch = self.config.batch))]
    pub async fn index(&self, progress: &dyn IndexProgress) -> Result<IndexReport> {
        let start = Instant::now();

        progress.phase("Listing topics");
        let topics = self.store.list_topics().await?;
        info!(count = topics.len(), "starting indexing run");

        let mut report = IndexReport {
            total: topics.len(),
            ..IndexReport::default()
        };

        progress.phase("Indexing topics");
        if self.config.batch {
            self.index_batch(&topics, progress, &mut report).await;
        } else {
            self.index_each(&topics, progress, &mut report).await;
        }

        report.elapsed = start.elapsed();
        info!(
            total = report.total,
            indexed = report.indexed,
            failed = report.errors.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "indexing run complete"
        );
        progress.done(&report);

        Ok(report)
    }

    /// Build, submit, and commit one topic at a time.
    async fn index_each(
        &self,
        topics: &[Topic],
        progress: &dyn IndexProgress,
        report: &mut IndexReport,
    ) {
        let total = topics.len();

        for (i, topic) in topics.iter().enumerate() {
            report.log(log_line(topic));

            match self.index_topic(topic).await {
                Ok(()) => {
                    report.indexed += 1;
                    progress.topic_indexed(&topic.page_name, i + 1, total);
                }
                Err(e) => record_failure(topic, &e, progress, report),
            }
        }
    }

    async fn index_topic(&self, topic: &Topic) -> Result<()> {
        let document = self.build_document(topic).await?;
        self.sink.write_document(&document).await?;
        self.sink.commit().await
    }

    /// Build every document first, then submit them in one call.
    async fn index_batch(
        &self,
        topics: &[Topic],
        progress: &dyn IndexProgress,
        report: &mut IndexReport,
    ) {
        let mut built: Vec<&Topic> = Vec::with_capacity(topics.len());
        let mut documents: Vec<IndexDocument> = Vec::with_capacity(topics.len());

        for topic in topics {
            report.log(log_line(topic));

            match self.build_document(topic).await {
                Ok(document) => {
                    built.push(topic);
                    documents.push(document);
                }
                Err(e) => record_failure(topic, &e, progress, report),
            }
        }

        if documents.is_empty() {
            return;
        }

        match self.submit_batch(&documents).await {
            Ok(()) => {
                let total = topics.len();
                for (i, topic) in built.iter().enumerate() {
                    report.indexed += 1;
                    progress.topic_indexed(&topic.page_name, i + 1, total);
                }
            }
            Err(e) => {
                for topic in built {
                    record_failure(topic, &e, progress, report);
                }
            }
        }
    }

    async fn submit_batch(&self, documents: &[IndexDocument]) -> Result<()> {
        self.sink.add_documents(documents).await?;
        self.sink.commit().await
    }

    /// Documents for one topic, looked up by its id.
    ///
    /// The id must be an integer. An unknown topic yields no documents; any
    /// other failure is returned to the caller.
    #[instrument(skip(self))]
    pub async fn documents_for_id(&self, id: &str) -> Result<Vec<IndexDocument>> {
        let topic_id: i64 = id
            .trim()
            .parse()
            .map_err(|e| WikiSearchError::validation(format!("invalid topic id '{id}': {e}")))?;

        let Some(topic) = self.store.find_topic(topic_id).await? else {
            debug!(topic_id, "no topic with this id");
            return Ok(Vec::new());
        };

        Ok(vec![self.build_document(&topic).await?])
    }
}

fn log_line(topic: &Topic) -> String {
    format!(
        "indexing {RESOURCE_TYPE} id : {} Name : {}",
        topic.id, topic.page_name
    )
}

fn record_failure(
    topic: &Topic,
    e: &WikiSearchError,
    progress: &dyn IndexProgress,
    report: &mut IndexReport,
) {
    error!(topic_id = topic.id, page_name = %topic.page_name, error = %e, "failed to index topic");
    let message = format!(
        "error indexing topic {} ({}): {e}",
        topic.id, topic.page_name
    );
    progress.topic_failed(&topic.page_name, &message);
    report.errors.push(message);
}

//! In-memory content store and document sink.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use wikisearch_shared::{
    DocumentSink, IndexDocument, Result, Topic, TopicStore, TopicVersion, WikiSearchError,
};

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StoreState {
    topics: BTreeMap<i64, Topic>,
    versions: Vec<TopicVersion>,
    failing_topics: HashSet<i64>,
    listing_fails: bool,
    next_topic_id: i64,
    next_version_id: i64,
}

/// A [`TopicStore`] backed by in-process maps.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a topic and return its id.
    pub fn add_topic(&self, page_name: &str) -> i64 {
        let mut state = lock(&self.state);
        state.next_topic_id += 1;
        let id = state.next_topic_id;
        state.topics.insert(
            id,
            Topic {
                id,
                page_name: page_name.to_string(),
            },
        );
        id
    }

    /// Add a revision to a topic and return the revision id.
    pub fn add_version(
        &self,
        topic_id: i64,
        wiki_content: Option<&str>,
        edited_at: DateTime<Utc>,
    ) -> i64 {
        let mut state = lock(&self.state);
        state.next_version_id += 1;
        let id = state.next_version_id;
        state.versions.push(TopicVersion {
            id,
            topic_id,
            wiki_content: wiki_content.map(str::to_string),
            edited_at,
        });
        id
    }

    /// Make revision lookups for `topic_id` fail from now on.
    pub fn fail_versions_of(&self, topic_id: i64) {
        lock(&self.state).failing_topics.insert(topic_id);
    }

    /// Make topic enumeration fail from now on.
    pub fn fail_listing(&self) {
        lock(&self.state).listing_fails = true;
    }
}

impl TopicStore for MemoryStore {
    async fn list_topics(&self) -> Result<Vec<Topic>> {
        let state = lock(&self.state);
        if state.listing_fails {
            return Err(WikiSearchError::Storage("topic listing failed".into()));
        }
        Ok(state.topics.values().cloned().collect())
    }

    async fn find_topic(&self, id: i64) -> Result<Option<Topic>> {
        Ok(lock(&self.state).topics.get(&id).cloned())
    }

    async fn find_last_version(&self, topic_id: i64) -> Result<Option<TopicVersion>> {
        let state = lock(&self.state);
        if state.failing_topics.contains(&topic_id) {
            return Err(WikiSearchError::Storage(format!(
                "revision lookup failed for topic {topic_id}"
            )));
        }

        Ok(state
            .versions
            .iter()
            .filter(|v| v.topic_id == topic_id)
            .max_by_key(|v| (v.edited_at, v.id))
            .cloned())
    }
}

// ---------------------------------------------------------------------------
// MemorySink
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SinkState {
    pending: Vec<IndexDocument>,
    committed: BTreeMap<String, IndexDocument>,
    rejected_uids: HashSet<String>,
    commits: usize,
}

/// A [`DocumentSink`] that keeps documents in memory.
///
/// Written documents stay pending until [`DocumentSink::commit`].
#[derive(Default)]
pub struct MemorySink {
    state: Mutex<SinkState>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse any document with this uid.
    pub fn reject_uid(&self, uid: &str) {
        lock(&self.state).rejected_uids.insert(uid.to_string());
    }

    /// Committed documents, ordered by uid.
    pub fn documents(&self) -> Vec<IndexDocument> {
        lock(&self.state).committed.values().cloned().collect()
    }

    /// Committed document by uid.
    pub fn document(&self, uid: &str) -> Option<IndexDocument> {
        lock(&self.state).committed.get(uid).cloned()
    }

    /// Number of successful commits.
    pub fn commit_count(&self) -> usize {
        lock(&self.state).commits
    }

    fn check_accepted(state: &SinkState, document: &IndexDocument) -> Result<()> {
        if state.rejected_uids.contains(&document.uid) {
            return Err(WikiSearchError::Submission(format!(
                "document {} rejected",
                document.uid
            )));
        }
        Ok(())
    }
}

impl DocumentSink for MemorySink {
    async fn write_document(&self, document: &IndexDocument) -> Result<()> {
        let mut state = lock(&self.state);
        Self::check_accepted(&state, document)?;
        state.pending.push(document.clone());
        Ok(())
    }

    async fn add_documents(&self, documents: &[IndexDocument]) -> Result<()> {
        let mut state = lock(&self.state);
        for document in documents {
            Self::check_accepted(&state, document)?;
        }
        state.pending.extend_from_slice(documents);
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        let mut state = lock(&self.state);
        let pending = std::mem::take(&mut state.pending);
        for document in pending {
            state.committed.insert(document.uid.clone(), document);
        }
        state.commits += 1;
        Ok(())
    }
}

/// Lock a mutex, recovering the data if a panicking holder poisoned it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn doc(uid: &str) -> IndexDocument {
        IndexDocument {
            url: String::new(),
            title: uid.into(),
            uid: uid.into(),
            content: String::new(),
            site: "Portal".into(),
            doc_type: "wiki".into(),
            date: None,
        }
    }

    #[tokio::test]
    async fn store_returns_latest_version() {
        let store = MemoryStore::new();
        let topic = store.add_topic("Home");
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        store.add_version(topic, Some("new"), t0 + Duration::hours(1));
        store.add_version(topic, Some("old"), t0);

        let last = store.find_last_version(topic).await.unwrap().unwrap();
        assert_eq!(last.wiki_content.as_deref(), Some("new"));
        assert!(store.find_last_version(topic + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn store_can_fail_a_topic() {
        let store = MemoryStore::new();
        let topic = store.add_topic("Broken");
        store.fail_versions_of(topic);
        assert!(store.find_last_version(topic).await.is_err());
        assert_eq!(store.list_topics().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sink_only_exposes_committed_documents() {
        let sink = MemorySink::new();
        sink.write_document(&doc("A_wis")).await.unwrap();
        assert!(sink.documents().is_empty());

        sink.commit().await.unwrap();
        assert_eq!(sink.documents().len(), 1);
        assert_eq!(sink.commit_count(), 1);
    }

    #[tokio::test]
    async fn rejected_uid_fails_the_whole_batch() {
        let sink = MemorySink::new();
        sink.reject_uid("B_wis");

        assert!(sink.write_document(&doc("B_wis")).await.is_err());
        assert!(sink.add_documents(&[doc("A_wis"), doc("B_wis")]).await.is_err());

        sink.commit().await.unwrap();
        assert!(sink.document("A_wis").is_none());
    }
}

//! libSQL storage layer standing in for the host content store and index.
//!
//! The [`Storage`] struct wraps an embedded libSQL database holding wiki
//! topics, their revisions, submitted search documents, and indexing run
//! history. It implements both host capabilities, [`TopicStore`] and
//! [`DocumentSink`], so the indexer can run end to end against one file.
//!
//! [`MemoryStore`] and [`MemorySink`] are in-process equivalents for tests
//! and dry runs.

mod memory;
mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use uuid::Uuid;

use wikisearch_shared::{
    DocumentSink, IndexDocument, Result, Topic, TopicStore, TopicVersion, WikiSearchError,
};

pub use memory::{MemorySink, MemoryStore};

const UPSERT_DOCUMENT_SQL: &str = "INSERT INTO documents (uid, url, title, content, site, doc_type, date, indexed_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
     ON CONFLICT(uid) DO UPDATE SET
       url = excluded.url,
       title = excluded.title,
       content = excluded.content,
       site = excluded.site,
       doc_type = excluded.doc_type,
       date = excluded.date,
       indexed_at = excluded.indexed_at";

const SELECT_DOCUMENT_COLUMNS: &str = "SELECT uid, url, title, content, site, doc_type, date FROM documents";

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| WikiSearchError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;

        let conn = db.connect().map_err(db_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(WikiSearchError::not_found(format!(
                "database {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;

        let conn = db.connect().map_err(db_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    WikiSearchError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(WikiSearchError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Topic operations
    // -----------------------------------------------------------------------

    /// Insert a topic and return its id. Used to seed a content store.
    pub async fn insert_topic(&self, page_name: &str) -> Result<i64> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO topics (page_name) VALUES (?1)",
                params![page_name],
            )
            .await
            .map_err(db_err)?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Id of the topic named `page_name`, if there is one.
    pub async fn find_topic_id(&self, page_name: &str) -> Result<Option<i64>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id FROM topics WHERE page_name = ?1",
                params![page_name],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row.get::<i64>(0).map_err(db_err)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    /// Record a new revision of a topic and return the revision id.
    pub async fn add_topic_version(
        &self,
        topic_id: i64,
        wiki_content: Option<&str>,
        edited_at: DateTime<Utc>,
    ) -> Result<i64> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO topic_versions (topic_id, wiki_content, edited_at) VALUES (?1, ?2, ?3)",
                params![topic_id, wiki_content, edited_at.to_rfc3339()],
            )
            .await
            .map_err(db_err)?;
        Ok(self.conn.last_insert_rowid())
    }

    // -----------------------------------------------------------------------
    // Document operations
    // -----------------------------------------------------------------------

    /// Insert or replace a document by uid.
    pub async fn upsert_document(&self, document: &IndexDocument) -> Result<()> {
        self.check_writable()?;
        upsert_document_on(&self.conn, document).await
    }

    /// Get a stored document by uid.
    pub async fn get_document(&self, uid: &str) -> Result<Option<IndexDocument>> {
        let mut rows = self
            .conn
            .query(
                &format!("{SELECT_DOCUMENT_COLUMNS} WHERE uid = ?1"),
                params![uid],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_document(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    /// List stored documents ordered by uid.
    pub async fn list_documents(&self, limit: u32) -> Result<Vec<IndexDocument>> {
        let rows = self
            .conn
            .query(
                &format!("{SELECT_DOCUMENT_COLUMNS} ORDER BY uid LIMIT ?1"),
                params![limit],
            )
            .await
            .map_err(db_err)?;

        collect_rows(rows, row_to_document).await
    }

    /// Number of stored documents.
    pub async fn count_documents(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM documents", params![])
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).map_err(db_err)?.max(0) as u64),
            Ok(None) => Ok(0),
            Err(e) => Err(db_err(e)),
        }
    }

    // -----------------------------------------------------------------------
    // Index run operations
    // -----------------------------------------------------------------------

    /// Record the start of an indexing run. Returns the generated run ID.
    pub async fn insert_index_run(&self) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO index_runs (id, started_at) VALUES (?1, ?2)",
                params![id.as_str(), now.as_str()],
            )
            .await
            .map_err(db_err)?;
        Ok(id)
    }

    /// Mark an indexing run as finished with its statistics.
    pub async fn finish_index_run(&self, run_id: &str, stats_json: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE index_runs SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json, run_id],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Statistics of a finished run, if any were recorded.
    pub async fn get_index_run_stats(&self, run_id: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT stats_json FROM index_runs WHERE id = ?1",
                params![run_id],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<String>(0).ok()),
            Ok(None) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }
}

// ---------------------------------------------------------------------------
// Host capabilities
// ---------------------------------------------------------------------------

impl TopicStore for Storage {
    async fn list_topics(&self) -> Result<Vec<Topic>> {
        let rows = self
            .conn
            .query("SELECT id, page_name FROM topics ORDER BY id", params![])
            .await
            .map_err(db_err)?;

        collect_rows(rows, row_to_topic).await
    }

    async fn find_topic(&self, id: i64) -> Result<Option<Topic>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, page_name FROM topics WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_topic(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    async fn find_last_version(&self, topic_id: i64) -> Result<Option<TopicVersion>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, topic_id, wiki_content, edited_at FROM topic_versions
                 WHERE topic_id = ?1
                 ORDER BY edited_at DESC, id DESC
                 LIMIT 1",
                params![topic_id],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_topic_version(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }
}

impl DocumentSink for Storage {
    async fn write_document(&self, document: &IndexDocument) -> Result<()> {
        self.upsert_document(document).await
    }

    async fn add_documents(&self, documents: &[IndexDocument]) -> Result<()> {
        self.check_writable()?;
        let tx = self.conn.transaction().await.map_err(db_err)?;
        for document in documents {
            upsert_document_on(&tx, document).await?;
        }
        tx.commit().await.map_err(db_err)?;
        tracing::debug!(count = documents.len(), "document batch committed");
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        // Statements outside `add_documents` run in autocommit mode.
        self.check_writable()
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn db_err(e: libsql::Error) -> WikiSearchError {
    WikiSearchError::Storage(e.to_string())
}

/// Drain a result set. A cursor error fails the whole read instead of
/// ending it early.
async fn collect_rows<T>(
    mut rows: libsql::Rows,
    map: impl Fn(&libsql::Row) -> Result<T>,
) -> Result<Vec<T>> {
    let mut results = Vec::new();
    while let Some(row) = rows.next().await.map_err(db_err)? {
        results.push(map(&row)?);
    }
    Ok(results)
}

async fn upsert_document_on(conn: &Connection, document: &IndexDocument) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        UPSERT_DOCUMENT_SQL,
        params![
            document.uid.as_str(),
            document.url.as_str(),
            document.title.as_str(),
            document.content.as_str(),
            document.site.as_str(),
            document.doc_type.as_str(),
            document.date.map(|d| d.to_rfc3339()),
            now.as_str(),
        ],
    )
    .await
    .map_err(db_err)?;
    Ok(())
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| WikiSearchError::Storage(format!("invalid date {s:?}: {e}")))
}

fn row_to_topic(row: &libsql::Row) -> Result<Topic> {
    Ok(Topic {
        id: row.get::<i64>(0).map_err(db_err)?,
        page_name: row.get::<String>(1).map_err(db_err)?,
    })
}

fn row_to_topic_version(row: &libsql::Row) -> Result<TopicVersion> {
    let edited_at: String = row.get(3).map_err(db_err)?;
    Ok(TopicVersion {
        id: row.get::<i64>(0).map_err(db_err)?,
        topic_id: row.get::<i64>(1).map_err(db_err)?,
        wiki_content: row.get::<String>(2).ok(),
        edited_at: parse_timestamp(&edited_at)?,
    })
}

fn row_to_document(row: &libsql::Row) -> Result<IndexDocument> {
    let date = match row.get::<String>(6).ok() {
        Some(s) => Some(parse_timestamp(&s)?),
        None => None,
    };

    Ok(IndexDocument {
        uid: row.get::<String>(0).map_err(db_err)?,
        url: row.get::<String>(1).map_err(db_err)?,
        title: row.get::<String>(2).map_err(db_err)?,
        content: row.get::<String>(3).map_err(db_err)?,
        site: row.get::<String>(4).map_err(db_err)?,
        doc_type: row.get::<String>(5).map_err(db_err)?,
        date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use wikisearch_shared::DOCUMENT_TYPE;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("ws_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn document(uid: &str, content: &str) -> IndexDocument {
        IndexDocument {
            url: format!("http://localhost/portal?page_name={uid}"),
            title: uid.trim_end_matches("_wis").into(),
            uid: uid.into(),
            content: content.into(),
            site: "Portal".into(),
            doc_type: DOCUMENT_TYPE.into(),
            date: None,
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.get_schema_version().await, 2);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("ws_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 2);
    }

    #[tokio::test]
    async fn topics_are_listed_in_id_order() {
        let storage = test_storage().await;
        let home = storage.insert_topic("Home").await.expect("insert");
        let faq = storage.insert_topic("FAQ").await.expect("insert");

        let topics = storage.list_topics().await.expect("list");
        assert_eq!(
            topics,
            vec![
                Topic { id: home, page_name: "Home".into() },
                Topic { id: faq, page_name: "FAQ".into() },
            ]
        );

        let found = storage.find_topic(faq).await.expect("find");
        assert_eq!(found.map(|t| t.page_name).as_deref(), Some("FAQ"));
        assert!(storage.find_topic(faq + 100).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn duplicate_page_name_is_rejected() {
        let storage = test_storage().await;
        storage.insert_topic("Home").await.expect("insert");
        assert!(storage.insert_topic("Home").await.is_err());
    }

    #[tokio::test]
    async fn topic_id_by_page_name() {
        let storage = test_storage().await;
        let home = storage.insert_topic("Home").await.unwrap();

        assert_eq!(storage.find_topic_id("Home").await.unwrap(), Some(home));
        assert_eq!(storage.find_topic_id("Missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn row_read_failure_fails_the_listing() {
        let storage = test_storage().await;
        storage.insert_topic("Home").await.unwrap();
        storage.insert_topic("FAQ").await.unwrap();

        // The last row overflows `abs()` while the cursor is being stepped.
        storage
            .conn
            .execute_batch(
                "ALTER TABLE topics RENAME TO topics_data;
                 CREATE VIEW topics AS
                   SELECT id, page_name FROM topics_data
                   UNION ALL
                   SELECT abs(-9223372036854775807 - 1), 'Broken';",
            )
            .await
            .unwrap();

        let err = storage.list_topics().await.unwrap_err();
        assert!(matches!(err, WikiSearchError::Storage(_)));
    }

    #[tokio::test]
    async fn last_version_is_most_recent_edit() {
        let storage = test_storage().await;
        let topic = storage.insert_topic("Home").await.unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();

        assert!(storage.find_last_version(topic).await.unwrap().is_none());

        storage
            .add_topic_version(topic, Some("= v2 ="), t0 + Duration::days(2))
            .await
            .unwrap();
        storage
            .add_topic_version(topic, Some("= v1 ="), t0)
            .await
            .unwrap();

        let last = storage.find_last_version(topic).await.unwrap().unwrap();
        assert_eq!(last.wiki_content.as_deref(), Some("= v2 ="));
        assert_eq!(last.edited_at, t0 + Duration::days(2));
        assert_eq!(last.topic_id, topic);
    }

    #[tokio::test]
    async fn version_without_text_reads_back_as_none() {
        let storage = test_storage().await;
        let topic = storage.insert_topic("Empty").await.unwrap();
        storage.add_topic_version(topic, None, Utc::now()).await.unwrap();

        let last = storage.find_last_version(topic).await.unwrap().unwrap();
        assert_eq!(last.wiki_content, None);
    }

    #[tokio::test]
    async fn write_document_replaces_by_uid() {
        let storage = test_storage().await;
        storage.write_document(&document("Home_wis", "old")).await.unwrap();
        storage.write_document(&document("Home_wis", "new")).await.unwrap();
        storage.commit().await.unwrap();

        assert_eq!(storage.count_documents().await.unwrap(), 1);
        let stored = storage.get_document("Home_wis").await.unwrap().unwrap();
        assert_eq!(stored.content, "new");
        assert_eq!(stored.doc_type, "wiki");
        assert_eq!(stored.date, None);
    }

    #[tokio::test]
    async fn document_date_survives_storage() {
        let storage = test_storage().await;
        let date = Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap();
        let doc = IndexDocument {
            date: Some(date),
            ..document("Dated_wis", "x")
        };
        storage.write_document(&doc).await.unwrap();

        let stored = storage.get_document("Dated_wis").await.unwrap().unwrap();
        assert_eq!(stored, doc);
    }

    #[tokio::test]
    async fn add_documents_writes_whole_batch() {
        let storage = test_storage().await;
        let batch = vec![document("A_wis", "a"), document("B_wis", "b"), document("C_wis", "c")];
        storage.add_documents(&batch).await.unwrap();

        assert_eq!(storage.count_documents().await.unwrap(), 3);
        let listed = storage.list_documents(2).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].uid, "A_wis");
    }

    #[tokio::test]
    async fn index_run_lifecycle() {
        let storage = test_storage().await;
        let run_id = storage.insert_index_run().await.expect("insert run");
        assert!(!run_id.is_empty());
        assert!(storage.get_index_run_stats(&run_id).await.unwrap().is_none());

        storage
            .finish_index_run(&run_id, r#"{"indexed": 3, "failed": 1}"#)
            .await
            .expect("finish run");
        let stats = storage.get_index_run_stats(&run_id).await.unwrap();
        assert!(stats.unwrap().contains("\"failed\": 1"));
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("ws_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        rw.insert_topic("Home").await.unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        assert_eq!(ro.list_topics().await.unwrap().len(), 1);

        let result = ro.write_document(&document("Home_wis", "x")).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));
    }

    #[tokio::test]
    async fn readonly_requires_existing_file() {
        let tmp = std::env::temp_dir().join(format!("ws_missing_{}.db", Uuid::now_v7()));
        let err = Storage::open_readonly(&tmp).await.err().expect("missing db");
        assert!(matches!(err, WikiSearchError::NotFound { .. }));
    }
}

//! Core domain types: wiki topics, their revisions, and search document records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Short code appended to a page name to form a topic document uid.
pub const SHORT_NAME_TOPIC: &str = "wis";

/// Short code reserved for topic-content documents.
pub const SHORT_NAME_TOPIC_CONTENT: &str = "wic";

/// Value of the `type` field on every document this indexer produces.
pub const DOCUMENT_TYPE: &str = "wiki";

/// Resource type name under which the indexer registers with the host.
pub const RESOURCE_TYPE: &str = "WIKI";

// ---------------------------------------------------------------------------
// Topic
// ---------------------------------------------------------------------------

/// A wiki page entity owned by the host content store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    /// Numeric identifier assigned by the content store.
    pub id: i64,
    /// Page name, unique within the wiki.
    pub page_name: String,
}

/// One revision of a topic's raw wiki markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicVersion {
    pub id: i64,
    pub topic_id: i64,
    /// Raw markup. `None` when the revision carries no text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wiki_content: Option<String>,
    pub edited_at: DateTime<Utc>,
}

impl TopicVersion {
    /// The markup text, if the revision has any non-empty text.
    pub fn text(&self) -> Option<&str> {
        self.wiki_content.as_deref().filter(|s| !s.is_empty())
    }
}

// ---------------------------------------------------------------------------
// IndexDocument
// ---------------------------------------------------------------------------

/// The fixed-schema record submitted to the indexing service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDocument {
    /// Deep link to the topic's view page.
    pub url: String,
    /// Page name.
    pub title: String,
    /// `<page_name>_<short code>`.
    pub uid: String,
    /// Plain-text rendering of the latest revision.
    pub content: String,
    /// Site name.
    pub site: String,
    /// Always [`DOCUMENT_TYPE`].
    #[serde(rename = "type")]
    pub doc_type: String,
    /// Edit time of the latest revision, when it has text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn empty_revision_has_no_text() {
        let version = TopicVersion {
            id: 1,
            topic_id: 1,
            wiki_content: Some(String::new()),
            edited_at: Utc::now(),
        };
        assert_eq!(version.text(), None);

        let version = TopicVersion {
            wiki_content: None,
            ..version
        };
        assert_eq!(version.text(), None);
    }

    #[test]
    fn document_serializes_type_field() {
        let doc = IndexDocument {
            url: "http://localhost/portal?page=wiki".into(),
            title: "Home".into(),
            uid: "Home_wis".into(),
            content: "Welcome".into(),
            site: "Portal".into(),
            doc_type: DOCUMENT_TYPE.into(),
            date: None,
        };

        let json = serde_json::to_value(&doc).expect("serialize");
        assert_eq!(json["type"], "wiki");
        assert!(json.get("date").is_none());
        assert!(json.get("doc_type").is_none());
    }

    #[test]
    fn document_date_roundtrips() {
        let date = Utc.with_ymd_and_hms(2024, 3, 9, 14, 30, 0).unwrap();
        let doc = IndexDocument {
            url: "u".into(),
            title: "t".into(),
            uid: "t_wis".into(),
            content: String::new(),
            site: "s".into(),
            doc_type: DOCUMENT_TYPE.into(),
            date: Some(date),
        };

        let json = serde_json::to_string(&doc).expect("serialize");
        let parsed: IndexDocument = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.date, Some(date));
    }
}

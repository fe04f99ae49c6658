//! Shared types, error model, host capabilities, and configuration for wikisearch.
//!
//! This crate is the foundation depended on by all other wikisearch crates.
//! It provides:
//! - [`WikiSearchError`] — the unified error type
//! - Domain types ([`Topic`], [`TopicVersion`], [`IndexDocument`])
//! - Host capability traits ([`TopicStore`], [`DocumentSink`])
//! - Configuration ([`AppConfig`], [`IndexerConfig`], config loading)

pub mod config;
pub mod error;
pub mod host;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, IndexerConfig, IndexerSection, SiteSection, StorageSection, config_dir,
    config_file_path, default_database_path, init_config, load_config, load_config_from,
};
pub use error::{Result, WikiSearchError};
pub use host::{DocumentSink, TopicStore};
pub use types::{
    DOCUMENT_TYPE, IndexDocument, RESOURCE_TYPE, SHORT_NAME_TOPIC, SHORT_NAME_TOPIC_CONTENT,
    Topic, TopicVersion,
};

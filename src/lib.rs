//! Multi-source bibliographic metadata fetching.
//!
//! A primary [`SourceAdapter`] lookup is enriched with concurrent follow-up
//! lookups whose results are merged field by field under a
//! [`FieldPrioritySet`], in an order that does not depend on which lookup
//! finished first.

pub mod client;
pub mod config;
pub mod error;
pub mod record;
pub mod resilience;

pub use client::{
    merge, AdapterRegistry, EnrichmentStep, FetchError, FetchErrorKind, FetchOrchestrator,
    FetchWarning, FieldPrioritySet, KeywordNormalizer, OrchestrationResult, SearchQuery,
    SearchType, SourceAdapter,
};
pub use config::{Config, ConfigOverrides};
pub use error::{Error, Result};
pub use record::{EntryType, Field, Record};
pub use resilience::{RetryConfig, RetryPolicy, TimeoutExt};

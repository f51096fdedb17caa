use crate::record::{Field, Record};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Search query parameters for search-capable adapters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Query string
    pub query: String,
    /// Search type hint
    pub search_type: SearchType,
    /// Results per page
    pub page_size: u32,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>, search_type: SearchType) -> Self {
        Self {
            query: query.into(),
            search_type,
            page_size: 20,
        }
    }

    #[must_use]
    pub const fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }
}

/// Type of search being performed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchType {
    /// Free text over all fields
    Auto,
    /// Search by DOI
    Doi,
    /// Search by title
    Title,
    /// Search by author
    Author,
    /// Author and title together, separated by a tab
    AuthorTitle,
    /// Search by subject/category
    Subject,
}

/// Coarse classification of a [`FetchError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    /// The source was reached and has no matching record
    NotFound,
    /// Network, timeout or HTTP-status failure reaching the source
    Transport,
    /// The source answered but the payload could not be turned into a record
    Parse,
    /// The request was rejected before any network call was made
    IdentifierInvalid,
}

/// Errors that can occur during adapter operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("No record found for '{identifier}'")]
    NotFound { identifier: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout occurred after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid identifier '{identifier}': {reason}")]
    IdentifierInvalid { identifier: String, reason: String },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Lookup aborted: {0}")]
    Aborted(String),
}

impl FetchError {
    #[must_use]
    pub const fn kind(&self) -> FetchErrorKind {
        match self {
            Self::NotFound { .. } => FetchErrorKind::NotFound,
            Self::Network(_)
            | Self::Timeout(_)
            | Self::Http { .. }
            | Self::RateLimit
            | Self::ServiceUnavailable(_)
            | Self::Aborted(_) => FetchErrorKind::Transport,
            Self::Parse(_) => FetchErrorKind::Parse,
            Self::IdentifierInvalid { .. } | Self::InvalidQuery(_) => {
                FetchErrorKind::IdentifierInvalid
            }
        }
    }

    pub fn invalid_identifier(identifier: &str, reason: impl ToString) -> Self {
        Self::IdentifierInvalid {
            identifier: identifier.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Classify a reqwest failure the way every adapter reports it
    #[must_use]
    pub fn from_reqwest(error: &reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() {
            Self::Timeout(timeout)
        } else if error.is_connect() {
            Self::Network(format!("Connection failed: {error}"))
        } else if error.is_decode() {
            Self::Parse(format!("Failed to decode response: {error}"))
        } else {
            Self::Network(format!("Request failed: {error}"))
        }
    }

    /// Map a non-success HTTP status to an error
    #[must_use]
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            429 => Self::RateLimit,
            503 => Self::ServiceUnavailable(format!("{status}")),
            code => Self::Http {
                status: code,
                message: body.chars().take(200).collect(),
            },
        }
    }
}

/// A pluggable client for one external bibliographic catalogue.
///
/// Implementations perform one network round trip per call, hold no
/// per-call mutable state and never retry. "Not found" is `Ok(None)`;
/// transport and parse failures are `Err`.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Unique name/identifier for this adapter
    fn name(&self) -> &str;

    /// Human-readable description of the adapter
    fn description(&self) -> &str;

    /// Validate and normalize an identifier before it reaches the network
    fn normalize_identifier(&self, identifier: &str) -> Result<String, FetchError> {
        let trimmed = identifier.trim();
        if trimmed.is_empty() {
            return Err(FetchError::invalid_identifier(identifier, "identifier is empty"));
        }
        Ok(trimmed.to_string())
    }

    /// Look up a single record by identifier
    async fn fetch_by_id(&self, identifier: &str) -> Result<Option<Record>, FetchError>;

    /// Whether [`SourceAdapter::fetch_by_query`] is implemented
    fn supports_query(&self) -> bool {
        false
    }

    /// Search the catalogue; `page` is zero-based
    async fn fetch_by_query(
        &self,
        query: &SearchQuery,
        _page: u32,
    ) -> Result<Vec<Record>, FetchError> {
        Err(FetchError::InvalidQuery(format!(
            "{} does not support searching (query '{}')",
            self.name(),
            query.query
        )))
    }

    /// The identifier this adapter understands, if the entry carries one
    fn identifier_in(&self, _entry: &Record) -> Option<String> {
        None
    }

    /// Find the catalogue's record for a partially filled entry.
    ///
    /// Uses the adapter's own identifier when the entry has one; otherwise
    /// searches by author and title and accepts the first hit whose title is
    /// close to the entry's.
    async fn fetch_by_entry(&self, entry: &Record) -> Result<Option<Record>, FetchError> {
        if let Some(identifier) = self.identifier_in(entry) {
            return self.fetch_by_id(&identifier).await;
        }

        let Some(title) = entry.title().filter(|t| !t.trim().is_empty()) else {
            debug!("{}: entry has neither identifier nor title", self.name());
            return Ok(None);
        };

        if !self.supports_query() {
            return Ok(None);
        }

        let query = match entry.field(&Field::Author) {
            Some(author) => SearchQuery::new(format!("{author}\t{title}"), SearchType::AuthorTitle),
            None => SearchQuery::new(title, SearchType::Title),
        }
        .with_page_size(5);

        let candidates = self.fetch_by_query(&query, 0).await?;
        Ok(candidates
            .into_iter()
            .find(|candidate| candidate.title().is_some_and(|t| titles_similar(t, title))))
    }
}

/// Titles match when their edit distance is small after normalization
#[must_use]
pub fn titles_similar(left: &str, right: &str) -> bool {
    fn normalize(title: &str) -> String {
        title
            .chars()
            .filter(|c| *c != '{' && *c != '}')
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    strsim::levenshtein(&normalize(left), &normalize(right)) <= 4
}

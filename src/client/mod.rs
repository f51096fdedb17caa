pub mod deriver;
pub mod merge;
pub mod normalize;
pub mod orchestrator;
pub mod providers;

pub use deriver::{AutomaticDoiDeriver, FieldDeriver, IdentifierDeriver, ManualDoiDeriver};
pub use merge::{merge, merge_all, FieldPrioritySet};
pub use normalize::KeywordNormalizer;
pub use orchestrator::{
    EnrichmentStep, FetchOrchestrator, FetchTask, FetchWarning, OrchestrationResult,
    OrchestrationState,
};
pub use providers::{AdapterRegistry, FetchError, FetchErrorKind, SearchQuery, SearchType, SourceAdapter};

use crate::config::HttpSettings;
use reqwest::Client;
use std::time::Duration;

/// HTTP client configuration shared by all source adapters
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout duration
    pub timeout: Duration,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Maximum redirects to follow
    pub max_redirects: usize,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_redirects: 10,
            user_agent: format!(
                "rust-bib-enrich/{} (Bibliographic Metadata Tool)",
                env!("CARGO_PKG_VERSION")
            ),
        }
    }
}

impl From<&HttpSettings> for HttpClientConfig {
    fn from(settings: &HttpSettings) -> Self {
        Self {
            timeout: Duration::from_secs(settings.timeout_secs),
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs),
            max_redirects: settings.max_redirects,
            user_agent: settings.user_agent.clone(),
        }
    }
}

impl HttpClientConfig {
    /// Build the reqwest client adapters share; cloning it is cheap
    pub fn build_client(&self) -> Result<Client, FetchError> {
        Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(self.max_redirects))
            .user_agent(&self.user_agent)
            .build()
            .map_err(|e| FetchError::Network(format!("Failed to create HTTP client: {e}")))
    }
}

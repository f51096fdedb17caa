use super::{ArxivAdapter, DoiAdapter, IsbnAdapter, SourceAdapter};
use crate::client::HttpClientConfig;
use crate::{Config, Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Source adapters addressable by name
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<String, Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the arXiv, DOI and ISBN adapters over one shared HTTP client
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = HttpClientConfig::from(&config.http);
        let client = http.build_client()?;
        let separator = config.keywords.separator_char();

        let mut registry = Self::new();
        registry.register(Arc::new(
            ArxivAdapter::with_client(client.clone(), http.timeout, &config.providers.arxiv_base_url)
                .with_keyword_separator(separator),
        ));
        registry.register(Arc::new(
            DoiAdapter::with_client(client.clone(), http.timeout, &config.providers.doi_base_url)
                .with_keyword_separator(separator),
        ));
        registry.register(Arc::new(
            IsbnAdapter::with_client(client, http.timeout, &config.providers.openlibrary_base_url)
                .with_keyword_separator(separator),
        ));

        info!("Initialized adapter registry with {:?}", registry.names());
        Ok(registry)
    }

    /// Add an adapter, replacing any previous one with the same name
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.insert(adapter.name().to_string(), adapter);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn SourceAdapter>> {
        self.adapters
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownAdapter(name.to_string()))
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.adapters.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("adapters", &self.names())
            .finish()
    }
}

//! # Configuration
//!
//! Layered settings: built-in defaults, then an optional TOML file, then
//! `BIBENRICH__SECTION__KEY` environment variables.

use crate::client::providers::{arxiv, doi, isbn};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const ENV_PREFIX: &str = "BIBENRICH";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpSettings,
    pub orchestrator: OrchestratorSettings,
    pub keywords: KeywordSettings,
    pub providers: ProviderSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_redirects: usize,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            max_redirects: 10,
            user_agent: format!(
                "rust-bib-enrich/{} (Bibliographic Metadata Tool)",
                env!("CARGO_PKG_VERSION")
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    /// Budget for a whole orchestrated call, primary lookup included
    pub deadline_secs: u64,
    /// Budget for each supplementary lookup, capped by what is left of the deadline
    pub supplementary_timeout_secs: u64,
    /// Whether arXiv lookups are enriched from DOI records
    pub use_arxiv_doi_for_more_info: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            deadline_secs: 30,
            supplementary_timeout_secs: 10,
            use_arxiv_doi_for_more_info: true,
        }
    }
}

impl OrchestratorSettings {
    #[must_use]
    pub const fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    #[must_use]
    pub const fn supplementary_timeout(&self) -> Duration {
        Duration::from_secs(self.supplementary_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordSettings {
    /// Single character separating keywords
    pub separator: String,
}

impl Default for KeywordSettings {
    fn default() -> Self {
        Self {
            separator: ",".to_string(),
        }
    }
}

impl KeywordSettings {
    /// The separator character; falls back to ',' when not exactly one char
    #[must_use]
    pub fn separator_char(&self) -> char {
        let mut chars = self.separator.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => ',',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub arxiv_base_url: String,
    pub doi_base_url: String,
    pub openlibrary_base_url: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            arxiv_base_url: arxiv::DEFAULT_BASE_URL.to_string(),
            doi_base_url: doi::DEFAULT_BASE_URL.to_string(),
            openlibrary_base_url: isbn::DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Command-line overrides applied after loading
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub deadline_secs: Option<u64>,
    pub supplementary_timeout_secs: Option<u64>,
    pub keyword_separator: Option<String>,
    pub no_doi_enrichment: bool,
}

fn invalid(field: &str, reason: &str) -> Error {
    Error::InvalidInput {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

impl Config {
    /// Default config file location, `<config dir>/rust-bib-enrich/config.toml`
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("rust-bib-enrich").join("config.toml"))
    }

    /// Load configuration from defaults, `path` (or the default path when it
    /// exists) and the environment, then validate it.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder()
            .add_source(::config::Config::try_from(&Self::default())?);

        match path {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                builder = builder.add_source(::config::File::from(path).required(true));
            }
            None => {
                if let Some(default_path) = Self::default_path().filter(|p| p.exists()) {
                    info!("Loading configuration from {}", default_path.display());
                    builder = builder.add_source(::config::File::from(default_path).required(false));
                }
            }
        }

        let config: Self = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        debug!("Configuration loaded: {:?}", config);
        Ok(config)
    }

    /// Load from one file layered over the defaults, ignoring the environment
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let config: Self = ::config::Config::builder()
            .add_source(::config::Config::try_from(&Self::default())?)
            .add_source(::config::File::from(path).required(true))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) -> Result<()> {
        if let Some(deadline) = overrides.deadline_secs {
            self.orchestrator.deadline_secs = deadline;
        }
        if let Some(timeout) = overrides.supplementary_timeout_secs {
            self.orchestrator.supplementary_timeout_secs = timeout;
        }
        if let Some(ref separator) = overrides.keyword_separator {
            self.keywords.separator.clone_from(separator);
        }
        if overrides.no_doi_enrichment {
            self.orchestrator.use_arxiv_doi_for_more_info = false;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.http.timeout_secs == 0 {
            return Err(invalid("http.timeout_secs", "must be greater than 0"));
        }
        if self.http.user_agent.trim().is_empty() {
            return Err(invalid("http.user_agent", "cannot be empty"));
        }
        if self.orchestrator.deadline_secs == 0 {
            return Err(invalid("orchestrator.deadline_secs", "must be greater than 0"));
        }
        if self.orchestrator.supplementary_timeout_secs == 0 {
            return Err(invalid(
                "orchestrator.supplementary_timeout_secs",
                "must be greater than 0",
            ));
        }
        if self.keywords.separator.chars().count() != 1 {
            return Err(invalid("keywords.separator", "must be exactly one character"));
        }
        if self.keywords.separator.trim().is_empty() {
            return Err(invalid("keywords.separator", "cannot be whitespace"));
        }

        for (field, url) in [
            ("providers.arxiv_base_url", &self.providers.arxiv_base_url),
            ("providers.doi_base_url", &self.providers.doi_base_url),
            ("providers.openlibrary_base_url", &self.providers.openlibrary_base_url),
        ] {
            url::Url::parse(url).map_err(|e| invalid(field, &format!("invalid URL: {e}")))?;
        }

        Ok(())
    }

    /// Render as TOML, used by `print-config`
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

use super::traits::{FetchError, SourceAdapter};
use crate::client::normalize::substitute_labels;
use crate::client::HttpClientConfig;
use crate::record::{Doi, EntryType, Field, Record};
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument};

pub const DEFAULT_BASE_URL: &str = "https://doi.org";

const CSL_JSON: &str = "application/vnd.citationstyles.csl+json";

/// DOI resolver adapter using CSL-JSON content negotiation
#[derive(Debug, Clone)]
pub struct DoiAdapter {
    client: Client,
    base_url: String,
    timeout: Duration,
    keyword_separator: char,
}

impl DoiAdapter {
    /// Create a new DOI adapter
    pub fn new(http: &HttpClientConfig, base_url: impl Into<String>) -> Result<Self, FetchError> {
        Ok(Self::with_client(http.build_client()?, http.timeout, base_url))
    }

    /// Reuse an existing HTTP client
    pub fn with_client(client: Client, timeout: Duration, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            timeout,
            keyword_separator: ',',
        }
    }

    #[must_use]
    pub const fn with_keyword_separator(mut self, separator: char) -> Self {
        self.keyword_separator = separator;
        self
    }

    fn resolve_url(&self, doi: &Doi) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), doi.as_str())
    }

    /// Map a CSL-JSON item to a record
    fn parse_csl(&self, item: &Value) -> Result<Record, FetchError> {
        if !item.is_object() {
            return Err(FetchError::Parse("CSL-JSON item is not an object".to_string()));
        }

        let mut record = Record::new(entry_type_for(item["type"].as_str().unwrap_or_default()));

        if let Some(title) = first_text(&item["title"]) {
            record.set_field(Field::Title, title);
        }
        record.set_field(Field::Author, names(&item["author"]));
        record.set_field(Field::Editor, names(&item["editor"]));

        let date_parts = date_parts(&item["issued"]).or_else(|| date_parts(&item["published-print"]));
        if let Some(parts) = &date_parts {
            if let Some(year) = parts.first() {
                record.set_field(Field::Year, year.to_string());
            }
            if let Some(month) = parts.get(1) {
                record.set_field(Field::Month, month.to_string());
            }
            let date = parts
                .iter()
                .enumerate()
                .map(|(i, part)| if i == 0 { format!("{part:04}") } else { format!("{part:02}") })
                .collect::<Vec<_>>()
                .join("-");
            record.set_field(Field::Date, date);
        }

        let container = match record.entry_type() {
            EntryType::InProceedings | EntryType::InCollection => Field::BookTitle,
            _ => Field::Journal,
        };
        if let Some(journal) = first_text(&item["container-title"]) {
            record.set_field(container, journal);
        }

        for (key, field) in [
            ("publisher", Field::Publisher),
            ("volume", Field::Volume),
            ("issue", Field::Number),
            ("page", Field::Pages),
            ("DOI", Field::Doi),
            ("URL", Field::Url),
            ("abstract", Field::Abstract),
        ] {
            if let Some(value) = scalar_text(&item[key]) {
                record.set_field(field, value);
            }
        }
        for (key, field) in [("ISBN", Field::Isbn), ("ISSN", Field::Issn)] {
            if let Some(value) = first_text(&item[key]) {
                record.set_field(field, value);
            }
        }

        let mut keywords: Vec<String> = Vec::new();
        for key in ["categories", "subject"] {
            if let Some(values) = item[key].as_array() {
                keywords.extend(values.iter().filter_map(Value::as_str).map(str::to_string));
            }
        }
        if let Some(keyword) = item["keyword"].as_str() {
            // CSL keyword lists are comma separated whatever separator is configured
            keywords.extend(
                substitute_labels(keyword)
                    .split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string),
            );
        }
        record.set_field(Field::Keywords, keywords.join(&format!("{} ", self.keyword_separator)));

        let citation_key = item["citation-key"]
            .as_str()
            .map(str::to_string)
            .or_else(|| generated_key(item, date_parts.as_deref()));
        if let Some(key) = citation_key {
            record.set_field(Field::CitationKey, key);
        }

        Ok(record)
    }
}

fn entry_type_for(csl_type: &str) -> EntryType {
    match csl_type {
        "article-journal" | "article" | "article-magazine" | "article-newspaper" => EntryType::Article,
        "book" | "monograph" => EntryType::Book,
        "chapter" => EntryType::InCollection,
        "paper-conference" => EntryType::InProceedings,
        "thesis" => EntryType::PhdThesis,
        "report" => EntryType::TechReport,
        "webpage" | "post" | "post-weblog" => EntryType::Online,
        _ => EntryType::Misc,
    }
}

/// A string, or the first string of an array
fn first_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(Value::as_str).map(str::to_string),
        _ => None,
    }
}

/// A string or number rendered as text
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// "Family, Given and Family, Given"
fn names(value: &Value) -> String {
    value
        .as_array()
        .map(|people| {
            people
                .iter()
                .filter_map(|person| {
                    let family = person["family"].as_str();
                    let given = person["given"].as_str();
                    match (family, given) {
                        (Some(family), Some(given)) => Some(format!("{family}, {given}")),
                        (Some(family), None) => Some(family.to_string()),
                        _ => person["literal"]
                            .as_str()
                            .or_else(|| person["name"].as_str())
                            .map(str::to_string),
                    }
                })
                .collect::<Vec<_>>()
                .join(" and ")
        })
        .unwrap_or_default()
}

fn date_parts(value: &Value) -> Option<Vec<i64>> {
    let parts: Vec<i64> = value["date-parts"]
        .get(0)?
        .as_array()?
        .iter()
        .filter_map(|part| part.as_i64().or_else(|| part.as_str().and_then(|s| s.parse().ok())))
        .collect();
    (!parts.is_empty()).then_some(parts)
}

/// `Family_Year` from the first author
fn generated_key(item: &Value, date_parts: Option<&[i64]>) -> Option<String> {
    let family = item["author"]
        .get(0)
        .and_then(|author| author["family"].as_str().or_else(|| author["literal"].as_str()))?;
    let family: String = family.chars().filter(|c| c.is_alphanumeric()).collect();
    if family.is_empty() {
        return None;
    }
    Some(match date_parts.and_then(<[i64]>::first) {
        Some(year) => format!("{family}_{year}"),
        None => family,
    })
}

#[async_trait]
impl SourceAdapter for DoiAdapter {
    fn name(&self) -> &str {
        "doi"
    }

    fn description(&self) -> &str {
        "DOI resolver - registration agency metadata via content negotiation"
    }

    fn normalize_identifier(&self, identifier: &str) -> Result<String, FetchError> {
        Doi::new(identifier)
            .map(|doi| doi.as_str().to_string())
            .map_err(|e| FetchError::invalid_identifier(identifier, e))
    }

    #[instrument(skip(self), fields(adapter = "doi"))]
    async fn fetch_by_id(&self, identifier: &str) -> Result<Option<Record>, FetchError> {
        let doi = Doi::new(identifier).map_err(|e| FetchError::invalid_identifier(identifier, e))?;
        let start_time = Instant::now();
        let url = self.resolve_url(&doi);
        debug!("DOI request URL: {}", url);

        let response = self
            .client
            .get(&url)
            .header(header::ACCEPT, CSL_JSON)
            .send()
            .await
            .map_err(|e| {
                error!("DOI request failed: {}", e);
                FetchError::from_reqwest(&e, self.timeout)
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("DOI {} is not registered", doi);
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(format!("Failed to read response: {e}")))?;
        if !status.is_success() {
            return Err(FetchError::from_status(status, &body));
        }

        let item: Value = serde_json::from_str(&body)
            .map_err(|e| FetchError::Parse(format!("Invalid CSL-JSON for {doi}: {e}")))?;
        let record = self.parse_csl(&item)?;

        info!("DOI lookup for {} completed in {:?}", doi, start_time.elapsed());
        Ok(Some(record))
    }

    fn identifier_in(&self, entry: &Record) -> Option<String> {
        entry.doi().map(|doi| doi.as_str().to_string())
    }
}

use super::traits::{FetchError, SourceAdapter};
use crate::client::HttpClientConfig;
use crate::record::{EntryType, Field, Isbn, Record};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://openlibrary.org";

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4})\b").expect("valid regex"));

/// Open Library books API adapter
#[derive(Debug, Clone)]
pub struct IsbnAdapter {
    client: Client,
    base_url: String,
    timeout: Duration,
    keyword_separator: char,
}

impl IsbnAdapter {
    pub fn new(http: &HttpClientConfig, base_url: impl Into<String>) -> Result<Self, FetchError> {
        Ok(Self::with_client(http.build_client()?, http.timeout, base_url))
    }

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

    fn books_url(&self, isbn: &Isbn) -> Result<Url, FetchError> {
        let mut url = Url::parse(&format!("{}/api/books", self.base_url.trim_end_matches('/')))
            .map_err(|e| FetchError::Network(format!("Invalid base URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("bibkeys", &format!("ISBN:{isbn}"))
            .append_pair("format", "json")
            .append_pair("jscmd", "data");
        Ok(url)
    }

    fn parse_book(&self, isbn: &Isbn, book: &Value) -> Record {
        let mut record = Record::new(EntryType::Book);

        let title = book["title"].as_str().unwrap_or_default();
        match book["subtitle"].as_str() {
            Some(subtitle) if !title.is_empty() => {
                record.set_field(Field::Title, format!("{title}: {subtitle}"));
            }
            _ => record.set_field(Field::Title, title),
        }

        record.set_field(Field::Author, joined_names(&book["authors"], " and "));
        record.set_field(Field::Publisher, joined_names(&book["publishers"], " and "));
        record.set_field(
            Field::Keywords,
            joined_names(&book["subjects"], &format!("{} ", self.keyword_separator)),
        );

        if let Some(year) = book["publish_date"]
            .as_str()
            .and_then(|date| YEAR.captures(date))
        {
            record.set_field(Field::Year, &year[1]);
        }
        if let Some(pages) = book["number_of_pages"].as_u64() {
            record.set_field(Field::Other("pagetotal".to_string()), pages.to_string());
        }
        if let Some(url) = book["url"].as_str() {
            record.set_field(Field::Url, url);
        }
        record.set_field(Field::Isbn, isbn.as_str());

        record
    }
}

/// Join the `name` members of an Open Library object list
fn joined_names(value: &Value, separator: &str) -> String {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item["name"].as_str())
                .collect::<Vec<_>>()
                .join(separator)
        })
        .unwrap_or_default()
}

#[async_trait]
impl SourceAdapter for IsbnAdapter {
    fn name(&self) -> &str {
        "isbn"
    }

    fn description(&self) -> &str {
        "Open Library - book metadata by ISBN"
    }

    fn normalize_identifier(&self, identifier: &str) -> Result<String, FetchError> {
        Isbn::parse(identifier)
            .map(|isbn| isbn.as_str().to_string())
            .map_err(|e| FetchError::invalid_identifier(identifier, e))
    }

    #[instrument(skip(self), fields(adapter = "isbn"))]
    async fn fetch_by_id(&self, identifier: &str) -> Result<Option<Record>, FetchError> {
        let isbn = Isbn::parse(identifier).map_err(|e| FetchError::invalid_identifier(identifier, e))?;
        let url = self.books_url(&isbn)?;
        debug!("Open Library request URL: {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            error!("Open Library request failed: {}", e);
            FetchError::from_reqwest(&e, self.timeout)
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(format!("Failed to read response: {e}")))?;
        if !status.is_success() {
            return Err(FetchError::from_status(status, &body));
        }

        let books: Value = serde_json::from_str(&body)
            .map_err(|e| FetchError::Parse(format!("Invalid Open Library response: {e}")))?;
        let Some(books) = books.as_object() else {
            return Err(FetchError::Parse("Open Library response is not an object".to_string()));
        };

        let record = books.values().next().map(|book| self.parse_book(&isbn, book));
        info!("Open Library lookup for {} (found: {})", isbn, record.is_some());
        Ok(record)
    }

    fn identifier_in(&self, entry: &Record) -> Option<String> {
        entry.isbn().map(|isbn| isbn.as_str().to_string())
    }
}

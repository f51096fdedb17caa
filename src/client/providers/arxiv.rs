use super::traits::{FetchError, SearchQuery, SearchType, SourceAdapter};
use crate::client::HttpClientConfig;
use crate::record::{ArxivId, EntryType, Field, Record};
use async_trait::async_trait;
use reqwest::Client;
use roxmltree::{Document, Node};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://export.arxiv.org/api/query";

/// arXiv Atom API adapter
#[derive(Debug, Clone)]
pub struct ArxivAdapter {
    client: Client,
    base_url: String,
    timeout: Duration,
    keyword_separator: char,
}

impl ArxivAdapter {
    /// Create a new arXiv adapter
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

    fn id_list_url(&self, id: &ArxivId) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| FetchError::Network(format!("Invalid base URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("id_list", &id.normalized())
            .append_pair("max_results", "1");
        Ok(url)
    }

    /// Build arXiv API URL for search
    fn search_url(&self, query: &SearchQuery, page: u32) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| FetchError::Network(format!("Invalid base URL: {e}")))?;

        let text = query.query.trim();
        if text.is_empty() {
            return Err(FetchError::InvalidQuery("query is empty".to_string()));
        }

        let search_query = match query.search_type {
            SearchType::Doi => format!("doi:{text}"),
            SearchType::Title => format!("ti:\"{text}\""),
            SearchType::Author => format!("au:\"{text}\""),
            SearchType::AuthorTitle => match text.split_once('\t') {
                Some((author, title)) => {
                    format!("au:\"{}\" AND ti:\"{}\"", first_family_name(author), title.trim())
                }
                None => format!("ti:\"{text}\""),
            },
            SearchType::Subject => format!("cat:{text}"),
            SearchType::Auto => format!("all:\"{text}\""),
        };

        let start = page.saturating_mul(query.page_size);
        url.query_pairs_mut()
            .append_pair("search_query", &search_query)
            .append_pair("start", &start.to_string())
            .append_pair("max_results", &query.page_size.to_string());

        Ok(url)
    }

    async fn get_feed(&self, url: Url) -> Result<(reqwest::StatusCode, String), FetchError> {
        debug!("arXiv request URL: {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            error!("arXiv request failed: {}", e);
            FetchError::from_reqwest(&e, self.timeout)
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(format!("Failed to read response: {e}")))?;
        Ok((status, body))
    }

    /// Turn an Atom feed into records, skipping entries without a title
    fn parse_feed(&self, xml: &str) -> Result<Vec<Record>, FetchError> {
        let doc = Document::parse(xml)
            .map_err(|e| FetchError::Parse(format!("Failed to parse XML: {e}")))?;

        let records: Vec<Record> = doc
            .descendants()
            .filter(|n| n.has_tag_name("entry"))
            .filter_map(|entry| self.parse_entry(entry))
            .collect();

        debug!("Parsed {} records from arXiv response", records.len());
        Ok(records)
    }

    fn parse_entry(&self, entry: Node<'_, '_>) -> Option<Record> {
        let mut record = Record::new(EntryType::Article);
        let mut authors = Vec::new();
        let mut categories: Vec<&str> = Vec::new();
        let mut abstract_url = None;

        for child in entry.children().filter(Node::is_element) {
            let text = child.text().map(collapse_whitespace).unwrap_or_default();
            match child.tag_name().name() {
                "id" => abstract_url = Some(text),
                "title" => record.set_field(Field::Title, text),
                "summary" => record.set_field(Field::Abstract, text),
                "published" => {
                    if let Some(date) = text.get(..10) {
                        record.set_field(Field::Date, date);
                    }
                }
                "author" => authors.extend(
                    child
                        .children()
                        .filter(|n| n.has_tag_name("name"))
                        .filter_map(|n| n.text())
                        .map(collapse_whitespace),
                ),
                "doi" => record.set_field(Field::Doi, text),
                "journal_ref" => record.set_field(Field::JournalTitle, text),
                "comment" => record.set_field(Field::Note, text),
                "primary_category" => {
                    if let Some(term) = child.attribute("term") {
                        record.set_field(Field::EprintClass, term);
                        categories.push(term);
                    }
                }
                "category" => {
                    if let Some(term) = child.attribute("term") {
                        categories.push(term);
                    }
                }
                "link" => {
                    if child.attribute("title") == Some("pdf") {
                        if let Some(href) = child.attribute("href") {
                            record.set_field(Field::File, format!(":{href}:PDF"));
                        }
                    }
                }
                _ => {}
            }
        }

        if !record.has_field(&Field::Title) {
            return None;
        }

        let id = abstract_url.as_deref().and_then(|url| ArxivId::parse(url).ok())?;
        record.set_field(Field::Eprint, id.normalized_without_version());
        record.set_field(Field::EprintType, "arXiv");
        record.set_field(Field::Url, format!("https://arxiv.org/abs/{}", id.normalized()));
        record.set_field(Field::Author, authors.join(" and "));

        let mut unique: Vec<&str> = Vec::new();
        for category in categories {
            if !unique.contains(&category) {
                unique.push(category);
            }
        }
        record.set_field(
            Field::Keywords,
            unique.join(&format!("{} ", self.keyword_separator)),
        );

        Some(record)
    }
}

/// The message of an arXiv API error entry, if the feed is one
fn api_error(xml: &str) -> Option<String> {
    let doc = Document::parse(xml).ok()?;
    let entry = doc.descendants().find(|n| n.has_tag_name("entry"))?;
    let id = entry
        .children()
        .find(|n| n.has_tag_name("id"))
        .and_then(|n| n.text())?;
    if !id.contains("/api/errors") {
        return None;
    }
    entry
        .children()
        .find(|n| n.has_tag_name("summary"))
        .and_then(|n| n.text())
        .map(collapse_whitespace)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// "Smith, John and Doe, Jane" -> "Smith"; "John Smith" -> "Smith"
fn first_family_name(authors: &str) -> &str {
    let first = authors.split(" and ").next().unwrap_or(authors).trim();
    match first.split_once(',') {
        Some((family, _)) => family.trim(),
        None => first.rsplit(' ').next().unwrap_or(first),
    }
}

#[async_trait]
impl SourceAdapter for ArxivAdapter {
    fn name(&self) -> &str {
        "arxiv"
    }

    fn description(&self) -> &str {
        "arXiv.org - Open access e-prints in physics, mathematics, computer science, and more"
    }

    fn normalize_identifier(&self, identifier: &str) -> Result<String, FetchError> {
        ArxivId::parse(identifier)
            .map(|id| id.normalized())
            .map_err(|e| FetchError::invalid_identifier(identifier, e))
    }

    #[instrument(skip(self), fields(adapter = "arxiv"))]
    async fn fetch_by_id(&self, identifier: &str) -> Result<Option<Record>, FetchError> {
        let id = ArxivId::parse(identifier)
            .map_err(|e| FetchError::invalid_identifier(identifier, e))?;
        let start_time = Instant::now();

        let (status, body) = self.get_feed(self.id_list_url(&id)?).await?;

        if let Some(message) = api_error(&body) {
            return Err(FetchError::invalid_identifier(identifier, message));
        }
        if !status.is_success() {
            return Err(FetchError::from_status(status, &body));
        }

        let record = self.parse_feed(&body)?.into_iter().next();
        info!(
            "arXiv lookup for {} completed in {:?} (found: {})",
            id.normalized(),
            start_time.elapsed(),
            record.is_some()
        );
        Ok(record)
    }

    fn supports_query(&self) -> bool {
        true
    }

    #[instrument(skip(self, query), fields(adapter = "arxiv", query = %query.query))]
    async fn fetch_by_query(
        &self,
        query: &SearchQuery,
        page: u32,
    ) -> Result<Vec<Record>, FetchError> {
        let start_time = Instant::now();
        let (status, body) = self.get_feed(self.search_url(query, page)?).await?;

        if let Some(message) = api_error(&body) {
            return Err(FetchError::InvalidQuery(message));
        }
        if !status.is_success() {
            return Err(FetchError::from_status(status, &body));
        }

        let records = self.parse_feed(&body)?;
        info!(
            "arXiv search completed: {} records found in {:?}",
            records.len(),
            start_time.elapsed()
        );
        Ok(records)
    }

    fn identifier_in(&self, entry: &Record) -> Option<String> {
        entry.arxiv_id().map(|id| id.normalized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <entry>
    <id>http://arxiv.org/abs/2101.00001v2</id>
    <published>2020-12-31T18:59:59Z</published>
    <title>Etat de l'art sur l'application des bandits
      multi-bras</title>
    <summary>  A short
      abstract. </summary>
    <author><name>Djallel Bouneffouf</name></author>
    <author><name>Irina Rish</name></author>
    <arxiv:doi>10.1000/example.1</arxiv:doi>
    <link href="http://arxiv.org/abs/2101.00001v2" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2101.00001v2" rel="related" type="application/pdf"/>
    <arxiv:primary_category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.AI" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
</feed>"#;

    fn adapter() -> ArxivAdapter {
        ArxivAdapter::new(&HttpClientConfig::default(), DEFAULT_BASE_URL).unwrap()
    }

    #[test]
    fn test_parse_feed_entry() {
        let records = adapter().parse_feed(FEED).unwrap();
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.entry_type(), &EntryType::Article);
        assert_eq!(
            record.field(&Field::Title),
            Some("Etat de l'art sur l'application des bandits multi-bras")
        );
        assert_eq!(record.field(&Field::Abstract), Some("A short abstract."));
        assert_eq!(record.field(&Field::Author), Some("Djallel Bouneffouf and Irina Rish"));
        assert_eq!(record.field(&Field::Date), Some("2020-12-31"));
        assert_eq!(record.field(&Field::Eprint), Some("2101.00001"));
        assert_eq!(record.field(&Field::EprintType), Some("arXiv"));
        assert_eq!(record.field(&Field::EprintClass), Some("cs.LG"));
        assert_eq!(record.field(&Field::Keywords), Some("cs.LG, cs.AI"));
        assert_eq!(record.field(&Field::Doi), Some("10.1000/example.1"));
        assert_eq!(record.field(&Field::File), Some(":http://arxiv.org/pdf/2101.00001v2:PDF"));
    }

    #[test]
    fn test_api_error_entry() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><entry>
            <id>http://arxiv.org/api/errors#incorrect_id_format_for_2101.0000x</id>
            <title>Error</title>
            <summary>incorrect id format for 2101.0000x</summary>
        </entry></feed>"#;
        assert_eq!(api_error(xml).as_deref(), Some("incorrect id format for 2101.0000x"));
        assert!(api_error(FEED).is_none());
    }

    #[test]
    fn test_search_url_building() {
        let query = SearchQuery::new("Smith, John and Doe, Jane\tGrowing tissue", SearchType::AuthorTitle)
            .with_page_size(5);
        let url = adapter().search_url(&query, 2).unwrap();

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&(
            "search_query".to_string(),
            "au:\"Smith\" AND ti:\"Growing tissue\"".to_string()
        )));
        assert!(pairs.contains(&("start".to_string(), "10".to_string())));
        assert!(pairs.contains(&("max_results".to_string(), "5".to_string())));
    }

    #[test]
    fn test_empty_query_is_rejected() {
        let query = SearchQuery::new("  ", SearchType::Auto);
        assert!(matches!(adapter().search_url(&query, 0), Err(FetchError::InvalidQuery(_))));
    }

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(adapter().normalize_identifier("arXiv:2101.00001v1").unwrap(), "2101.00001v1");
        assert!(adapter().normalize_identifier("not an id").is_err());
    }
}

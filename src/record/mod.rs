//! # Record
//!
//! The canonical bibliographic entry produced by every source adapter and
//! consumed by the merge policy. A record is an entry type plus an ordered
//! map from [`Field`] to value; identifiers are views computed on demand
//! from the fields.

pub mod field;
pub mod identifiers;

pub use field::Field;
pub use identifiers::{ArxivId, Doi, Isbn};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of bibliographic entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntryType {
    Article,
    Book,
    InProceedings,
    InCollection,
    PhdThesis,
    MastersThesis,
    TechReport,
    Online,
    #[default]
    Misc,
    Other(String),
}

impl EntryType {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Article => "article",
            Self::Book => "book",
            Self::InProceedings => "inproceedings",
            Self::InCollection => "incollection",
            Self::PhdThesis => "phdthesis",
            Self::MastersThesis => "mastersthesis",
            Self::TechReport => "techreport",
            Self::Online => "online",
            Self::Misc => "misc",
            Self::Other(name) => name,
        }
    }

    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "article" => Self::Article,
            "book" => Self::Book,
            "inproceedings" | "conference" => Self::InProceedings,
            "incollection" => Self::InCollection,
            "phdthesis" => Self::PhdThesis,
            "mastersthesis" => Self::MastersThesis,
            "techreport" | "report" => Self::TechReport,
            "online" | "electronic" => Self::Online,
            "misc" => Self::Misc,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<String> for EntryType {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<EntryType> for String {
    fn from(value: EntryType) -> Self {
        value.name().to_string()
    }
}

/// A bibliographic record.
///
/// Adapters build records with [`Record::with_field`] / [`Record::set_field`]
/// while they own them. Once a record has been handed to the merge policy it
/// is only read; merging always produces a new record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "type", default)]
    entry_type: EntryType,
    #[serde(default)]
    fields: BTreeMap<Field, String>,
}

impl Record {
    #[must_use]
    pub const fn new(entry_type: EntryType) -> Self {
        Self {
            entry_type,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter; empty values are ignored.
    #[must_use]
    pub fn with_field(mut self, field: Field, value: impl Into<String>) -> Self {
        self.set_field(field, value);
        self
    }

    /// Set a field, ignoring empty or whitespace-only values.
    pub fn set_field(&mut self, field: Field, value: impl Into<String>) {
        let value = value.into();
        if !value.trim().is_empty() {
            self.fields.insert(field, value);
        }
    }

    #[must_use]
    pub const fn entry_type(&self) -> &EntryType {
        &self.entry_type
    }

    #[must_use]
    pub fn field(&self, field: &Field) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// True when the field is present with a non-blank value
    #[must_use]
    pub fn has_field(&self, field: &Field) -> bool {
        self.field(field).is_some_and(|value| !value.trim().is_empty())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&Field, &str)> {
        self.fields.iter().map(|(field, value)| (field, value.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn into_parts(self) -> (EntryType, BTreeMap<Field, String>) {
        (self.entry_type, self.fields)
    }

    pub(crate) const fn from_parts(entry_type: EntryType, fields: BTreeMap<Field, String>) -> Self {
        Self { entry_type, fields }
    }

    /// DOI stored in the record, if it parses
    #[must_use]
    pub fn doi(&self) -> Option<Doi> {
        self.field(&Field::Doi).and_then(|doi| Doi::new(doi).ok())
    }

    /// arXiv identifier from the eprint field, falling back to an arXiv URL.
    ///
    /// An eprint with a non-arXiv eprint type is ignored.
    #[must_use]
    pub fn arxiv_id(&self) -> Option<ArxivId> {
        let eprint_is_arxiv = self
            .field(&Field::EprintType)
            .map_or(true, |kind| kind.eq_ignore_ascii_case("arxiv"));

        self.field(&Field::Eprint)
            .filter(|_| eprint_is_arxiv)
            .and_then(|eprint| ArxivId::parse(eprint).ok())
            .or_else(|| {
                self.field(&Field::Url)
                    .filter(|url| url.contains("arxiv.org/"))
                    .and_then(|url| ArxivId::parse(url).ok())
            })
    }

    #[must_use]
    pub fn isbn(&self) -> Option<Isbn> {
        self.field(&Field::Isbn).and_then(|isbn| Isbn::parse(isbn).ok())
    }

    #[must_use]
    pub fn issn(&self) -> Option<&str> {
        self.field(&Field::Issn).map(str::trim).filter(|issn| !issn.is_empty())
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.field(&Field::Title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_values_are_not_stored() {
        let record = Record::new(EntryType::Article)
            .with_field(Field::Title, "X")
            .with_field(Field::Note, "   ");
        assert_eq!(record.len(), 1);
        assert!(!record.has_field(&Field::Note));
    }

    #[test]
    fn test_identifier_views() {
        let record = Record::new(EntryType::Article)
            .with_field(Field::Eprint, "2101.00001v2")
            .with_field(Field::Doi, "https://doi.org/10.1000/abc")
            .with_field(Field::Isbn, "978-0-306-40615-7");

        assert_eq!(record.arxiv_id().unwrap().normalized_without_version(), "2101.00001");
        assert_eq!(record.doi().unwrap().as_str(), "10.1000/abc");
        assert_eq!(record.isbn().unwrap().as_str(), "9780306406157");
        assert_eq!(record.issn(), None);
    }

    #[test]
    fn test_non_arxiv_eprint_is_ignored() {
        let record = Record::new(EntryType::Article)
            .with_field(Field::Eprint, "2101.00001")
            .with_field(Field::EprintType, "HAL");
        assert!(record.arxiv_id().is_none());
    }

    #[test]
    fn test_arxiv_id_from_url() {
        let record = Record::new(EntryType::Misc).with_field(Field::Url, "https://arxiv.org/abs/1811.10364v1");
        assert_eq!(record.arxiv_id().unwrap().normalized_without_version(), "1811.10364");
    }

    #[test]
    fn test_json_uses_field_names() {
        let record = Record::new(EntryType::Book)
            .with_field(Field::Title, "T")
            .with_field(Field::Other("copyright".into()), "c");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "book");
        assert_eq!(json["fields"]["title"], "T");
        assert_eq!(json["fields"]["copyright"], "c");

        let back: Record = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}

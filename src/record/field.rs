use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name of a bibliographic field.
///
/// Standard fields get their own variant; anything else is kept verbatim
/// (lowercased) in [`Field::Other`] so that adapters never drop data they
/// do not know about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Field {
    Author,
    Editor,
    Title,
    Journal,
    JournalTitle,
    BookTitle,
    Publisher,
    Year,
    Month,
    Date,
    Volume,
    Number,
    Pages,
    Doi,
    Isbn,
    Issn,
    Eprint,
    EprintType,
    EprintClass,
    Url,
    Abstract,
    Keywords,
    Note,
    File,
    CitationKey,
    Other(String),
}

impl Field {
    /// All standard (non-`Other`) fields
    pub const STANDARD: [Self; 25] = [
        Self::Author,
        Self::Editor,
        Self::Title,
        Self::Journal,
        Self::JournalTitle,
        Self::BookTitle,
        Self::Publisher,
        Self::Year,
        Self::Month,
        Self::Date,
        Self::Volume,
        Self::Number,
        Self::Pages,
        Self::Doi,
        Self::Isbn,
        Self::Issn,
        Self::Eprint,
        Self::EprintType,
        Self::EprintClass,
        Self::Url,
        Self::Abstract,
        Self::Keywords,
        Self::Note,
        Self::File,
        Self::CitationKey,
    ];

    /// Lowercase field name as used in BibTeX/BibLaTeX
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Author => "author",
            Self::Editor => "editor",
            Self::Title => "title",
            Self::Journal => "journal",
            Self::JournalTitle => "journaltitle",
            Self::BookTitle => "booktitle",
            Self::Publisher => "publisher",
            Self::Year => "year",
            Self::Month => "month",
            Self::Date => "date",
            Self::Volume => "volume",
            Self::Number => "number",
            Self::Pages => "pages",
            Self::Doi => "doi",
            Self::Isbn => "isbn",
            Self::Issn => "issn",
            Self::Eprint => "eprint",
            Self::EprintType => "eprinttype",
            Self::EprintClass => "eprintclass",
            Self::Url => "url",
            Self::Abstract => "abstract",
            Self::Keywords => "keywords",
            Self::Note => "note",
            Self::File => "file",
            Self::CitationKey => "citationkey",
            Self::Other(name) => name,
        }
    }

    /// Parse a field name, case-insensitively. Never fails.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        let lowered = name.trim().to_lowercase();
        Self::STANDARD
            .iter()
            .find(|field| field.name() == lowered)
            .cloned()
            .unwrap_or(Self::Other(lowered))
    }

    #[must_use]
    pub const fn is_standard(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<String> for Field {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<Field> for String {
    fn from(value: Field) -> Self {
        value.name().to_string()
    }
}

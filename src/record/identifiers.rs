use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

// New style: YYMM.NNNN or YYMM.NNNNN, optional version
static ARXIV_NEW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4}\.\d{4,5})(?:v(\d+))?$").expect("valid regex"));

// Old style: archive(.SUB)/YYMMNNN, optional version
static ARXIV_OLD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-zA-Z\-]+(?:\.[a-zA-Z]{2})?/\d{7})(?:v(\d+))?$").expect("valid regex")
});

static DOI_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^10\.\d{4,9}(?:\.\d+)*/\S+$").expect("valid regex"));

fn invalid(field: &str, reason: impl Into<String>) -> Error {
    Error::InvalidInput {
        field: field.to_string(),
        reason: reason.into(),
    }
}

/// DOI (Digital Object Identifier) wrapper for type safety
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Doi(String);

impl Doi {
    /// Create a new DOI from a string, validating the format
    pub fn new(doi: &str) -> Result<Self> {
        let trimmed = doi.trim();
        let lowered = trimmed.to_ascii_lowercase();
        let cleaned = ["https://doi.org/", "http://doi.org/", "https://dx.doi.org/", "http://dx.doi.org/", "doi:"]
            .iter()
            .find(|prefix| lowered.starts_with(*prefix))
            .map_or(trimmed, |prefix| trimmed[prefix.len()..].trim_start());

        if cleaned.is_empty() {
            return Err(invalid("doi", "DOI cannot be empty"));
        }

        if !DOI_PATTERN.is_match(cleaned) {
            return Err(invalid("doi", format!("'{cleaned}' is not a valid DOI")));
        }

        Ok(Self(cleaned.to_string()))
    }

    /// Get the DOI string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// DOIs compare case-insensitively
    #[must_use]
    pub fn matches(&self, other: &str) -> bool {
        Self::new(other).is_ok_and(|o| o.0.eq_ignore_ascii_case(&self.0))
    }
}

impl fmt::Display for Doi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Doi {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// arXiv identifier in either the old (`math.GT/0309136`) or the new
/// (`2101.00001`) scheme.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArxivId {
    id: String,
    version: Option<u32>,
}

impl ArxivId {
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let lowered = trimmed.to_ascii_lowercase();

        let mut stripped = [
            "https://arxiv.org/abs/",
            "http://arxiv.org/abs/",
            "https://export.arxiv.org/abs/",
            "http://export.arxiv.org/abs/",
            "https://arxiv.org/pdf/",
            "http://arxiv.org/pdf/",
            "arxiv:",
        ]
        .iter()
        .find(|prefix| lowered.starts_with(*prefix))
        .map_or(trimmed, |prefix| &trimmed[prefix.len()..]);
        stripped = stripped.trim_end_matches(".pdf");

        let captures = ARXIV_NEW
            .captures(stripped)
            .or_else(|| ARXIV_OLD.captures(stripped))
            .ok_or_else(|| invalid("eprint", format!("'{trimmed}' is not an arXiv identifier")))?;

        Ok(Self {
            id: captures[1].to_string(),
            version: captures.get(2).and_then(|v| v.as_str().parse().ok()),
        })
    }

    /// Identifier including the version suffix when one was given
    #[must_use]
    pub fn normalized(&self) -> String {
        match self.version {
            Some(version) => format!("{}v{version}", self.id),
            None => self.id.clone(),
        }
    }

    #[must_use]
    pub fn normalized_without_version(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn version(&self) -> Option<u32> {
        self.version
    }
}

impl fmt::Display for ArxivId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized())
    }
}

/// ISBN-10 or ISBN-13 with a verified check digit
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Isbn(String);

impl Isbn {
    pub fn parse(input: &str) -> Result<Self> {
        let stripped: String = input
            .trim()
            .trim_start_matches("ISBN")
            .trim_start_matches("isbn")
            .trim_start_matches(':')
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect::<String>()
            .to_uppercase();

        let valid = match stripped.len() {
            10 => check_isbn10(&stripped),
            13 => check_isbn13(&stripped),
            _ => false,
        };

        if valid {
            Ok(Self(stripped))
        } else {
            Err(invalid("isbn", format!("'{}' is not a valid ISBN", input.trim())))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Isbn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn check_isbn10(s: &str) -> bool {
    let mut sum = 0u32;
    for (i, c) in s.chars().enumerate() {
        let value = match c {
            'X' if i == 9 => 10,
            _ => match c.to_digit(10) {
                Some(d) => d,
                None => return false,
            },
        };
        sum += (10 - i as u32) * value;
    }
    sum % 11 == 0
}

fn check_isbn13(s: &str) -> bool {
    let mut sum = 0u32;
    for (i, c) in s.chars().enumerate() {
        let Some(d) = c.to_digit(10) else {
            return false;
        };
        sum += if i % 2 == 0 { d } else { d * 3 };
    }
    sum % 10 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doi_prefixes_are_stripped() {
        assert_eq!(Doi::new("https://doi.org/10.1000/xyz123").unwrap().as_str(), "10.1000/xyz123");
        assert_eq!(Doi::new("DOI: 10.1000/xyz123").unwrap().as_str(), "10.1000/xyz123");
        assert_eq!(Doi::new(" 10.48550/arXiv.2101.00001 ").unwrap().as_str(), "10.48550/arXiv.2101.00001");
    }

    #[test]
    fn test_doi_rejects_garbage() {
        assert!(Doi::new("").is_err());
        assert!(Doi::new("not-a-doi").is_err());
        assert!(Doi::new("10.1000").is_err());
        assert!(matches!(Doi::new("10.12/x"), Err(Error::InvalidInput { .. })));
    }

    #[test]
    fn test_doi_matches_ignores_case() {
        let doi = Doi::new("10.48550/arXiv.1811.10364").unwrap();
        assert!(doi.matches("10.48550/ARXIV.1811.10364"));
        assert!(!doi.matches("10.48550/arXiv.1811.10365"));
    }

    #[test]
    fn test_arxiv_new_style() {
        let id = ArxivId::parse("arXiv:2101.00001v3").unwrap();
        assert_eq!(id.normalized_without_version(), "2101.00001");
        assert_eq!(id.version(), Some(3));
        assert_eq!(id.normalized(), "2101.00001v3");
    }

    #[test]
    fn test_arxiv_abs_url() {
        let id = ArxivId::parse("http://arxiv.org/abs/1811.10364v1").unwrap();
        assert_eq!(id.normalized_without_version(), "1811.10364");
    }

    #[test]
    fn test_arxiv_old_style() {
        let id = ArxivId::parse("math.GT/0309136").unwrap();
        assert_eq!(id.normalized_without_version(), "math.GT/0309136");
        assert_eq!(id.version(), None);
    }

    #[test]
    fn test_arxiv_rejects_bare_numbers() {
        assert!(ArxivId::parse("0307015").is_err());
        assert!(ArxivId::parse("not-arxiv").is_err());
    }

    #[test]
    fn test_isbn_checksums() {
        assert_eq!(Isbn::parse("978-0-306-40615-7").unwrap().as_str(), "9780306406157");
        assert_eq!(Isbn::parse("0-306-40615-2").unwrap().as_str(), "0306406152");
        assert_eq!(Isbn::parse("ISBN: 0-8044-2957-X").unwrap().as_str(), "080442957X");
        assert!(Isbn::parse("978-0-306-40615-8").is_err());
        assert!(Isbn::parse("12345").is_err());
    }
}

//! Post-merge keyword cleanup.

use crate::record::{Field, Record};
use std::borrow::Cow;

/// arXiv category labels that contain the default keyword separator
const COMMA_LABELS: [(&str, &str); 2] = [
    (
        "Computational Engineering, Finance, and Science",
        "Computational Engineering / Finance / Science",
    ),
    (
        "Distributed, Parallel, and Cluster Computing",
        "Distributed / Parallel / Cluster Computing",
    ),
];

/// Splits, deduplicates and re-joins the keywords field of a merged record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordNormalizer {
    separator: char,
}

impl Default for KeywordNormalizer {
    fn default() -> Self {
        Self { separator: ',' }
    }
}

impl KeywordNormalizer {
    #[must_use]
    pub const fn new(separator: char) -> Self {
        Self { separator }
    }

    #[must_use]
    pub const fn separator(&self) -> char {
        self.separator
    }

    /// Normalize a keyword list string
    #[must_use]
    pub fn normalize_keywords(&self, keywords: &str) -> String {
        let substituted = substitute_labels(keywords);

        let mut seen: Vec<&str> = Vec::new();
        for keyword in substituted.split(self.separator).map(str::trim) {
            if !keyword.is_empty() && !seen.contains(&keyword) {
                seen.push(keyword);
            }
        }

        seen.join(&format!("{} ", self.separator))
    }

    /// Return a copy of `record` with its keywords normalized
    #[must_use]
    pub fn normalize(&self, record: &Record) -> Record {
        match record.field(&Field::Keywords) {
            Some(keywords) => {
                let normalized = self.normalize_keywords(keywords);
                if normalized == keywords {
                    return record.clone();
                }
                let (entry_type, mut fields) = record.clone().into_parts();
                if normalized.is_empty() {
                    fields.remove(&Field::Keywords);
                } else {
                    fields.insert(Field::Keywords, normalized);
                }
                Record::from_parts(entry_type, fields)
            }
            None => record.clone(),
        }
    }

    /// Original arXiv label for a keyword that was substituted during
    /// normalization, keeping any suffix such as `(cs.DC)`; other keywords
    /// come back unchanged.
    #[must_use]
    pub fn display_label<'a>(&self, keyword: &'a str) -> Cow<'a, str> {
        COMMA_LABELS
            .iter()
            .find_map(|(label, replacement)| {
                keyword
                    .strip_prefix(replacement)
                    .map(|rest| Cow::Owned(format!("{label}{rest}")))
            })
            .unwrap_or(Cow::Borrowed(keyword))
    }
}

/// Replace comma-bearing arXiv labels so that splitting on `,` keeps them whole
pub(crate) fn substitute_labels(keywords: &str) -> String {
    let mut substituted = keywords.to_string();
    for (label, replacement) in COMMA_LABELS {
        substituted = substituted.replace(label, replacement);
    }
    substituted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::EntryType;

    #[test]
    fn test_deduplicates_case_sensitively() {
        let normalizer = KeywordNormalizer::default();
        assert_eq!(
            normalizer.normalize_keywords("cs.AI, cs.LG,cs.AI , CS.AI,,"),
            "cs.AI, cs.LG, CS.AI"
        );
    }

    #[test]
    fn test_comma_labels_survive_the_split() {
        let normalizer = KeywordNormalizer::default();
        let keywords = "Distributed, Parallel, and Cluster Computing (cs.DC), Machine Learning (cs.LG)";
        assert_eq!(
            normalizer.normalize_keywords(keywords),
            "Distributed / Parallel / Cluster Computing (cs.DC), Machine Learning (cs.LG)"
        );
    }

    #[test]
    fn test_custom_separator() {
        let normalizer = KeywordNormalizer::new(';');
        assert_eq!(normalizer.normalize_keywords("a;b; a;c"), "a; b; c");
    }

    #[test]
    fn test_normalize_record_is_idempotent() {
        let normalizer = KeywordNormalizer::default();
        let record = Record::new(EntryType::Article)
            .with_field(Field::Keywords, "q-bio.CB, Cell Behavior (q-bio.CB), q-bio.CB");
        let once = normalizer.normalize(&record);
        assert_eq!(once.field(&Field::Keywords), Some("q-bio.CB, Cell Behavior (q-bio.CB)"));
        assert_eq!(normalizer.normalize(&once), once);
    }

    #[test]
    fn test_separator_only_keywords_are_dropped() {
        let normalizer = KeywordNormalizer::default();
        let record = Record::new(EntryType::Article).with_field(Field::Keywords, " , ,");
        assert!(!normalizer.normalize(&record).has_field(&Field::Keywords));
    }

    #[test]
    fn test_display_label() {
        let normalizer = KeywordNormalizer::default();
        assert_eq!(
            normalizer.display_label("Computational Engineering / Finance / Science"),
            "Computational Engineering, Finance, and Science"
        );
        assert_eq!(normalizer.display_label("cs.LG"), "cs.LG");
    }

    #[test]
    fn test_display_label_keeps_category_suffix() {
        let normalizer = KeywordNormalizer::default();
        let normalized = normalizer.normalize_keywords(
            "Distributed, Parallel, and Cluster Computing (cs.DC), Machine Learning (cs.LG)",
        );
        let labels: Vec<Cow<'_, str>> = normalized
            .split(", ")
            .map(|keyword| normalizer.display_label(keyword))
            .collect();
        assert_eq!(
            labels,
            ["Distributed, Parallel, and Cluster Computing (cs.DC)", "Machine Learning (cs.LG)"]
        );
    }
}

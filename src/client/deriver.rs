//! Identifier derivation for follow-up lookups.

use crate::record::{Field, Record};
use std::fmt::Debug;

/// Prefix of the DOIs arXiv registers for its own preprints
pub const ARXIV_DOI_PREFIX: &str = "10.48550/arXiv.";

/// Extracts the identifier a supplementary lookup should use.
///
/// Derivation is pure and cheap; `None` means the step does not apply to
/// this record and no task is created for it.
pub trait IdentifierDeriver: Debug + Send + Sync {
    fn name(&self) -> &str;

    fn derive(&self, record: &Record) -> Option<String>;
}

/// The DOI arXiv issues for every preprint
#[derive(Debug, Clone, Copy, Default)]
pub struct AutomaticDoiDeriver;

impl IdentifierDeriver for AutomaticDoiDeriver {
    fn name(&self) -> &str {
        "automatic-doi"
    }

    fn derive(&self, record: &Record) -> Option<String> {
        record
            .arxiv_id()
            .map(|id| format!("{ARXIV_DOI_PREFIX}{}", id.normalized_without_version()))
    }
}

/// A publisher DOI the authors attached to their preprint
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualDoiDeriver;

impl IdentifierDeriver for ManualDoiDeriver {
    fn name(&self) -> &str {
        "manual-doi"
    }

    fn derive(&self, record: &Record) -> Option<String> {
        let doi = record.field(&Field::Doi)?.trim();
        let is_automatic = doi
            .to_lowercase()
            .contains(&ARXIV_DOI_PREFIX.to_lowercase());
        (!doi.is_empty() && !is_automatic).then(|| doi.to_string())
    }
}

/// Hands a field's value to the step adapter unchanged
#[derive(Debug, Clone)]
pub struct FieldDeriver {
    field: Field,
}

impl FieldDeriver {
    #[must_use]
    pub const fn new(field: Field) -> Self {
        Self { field }
    }
}

impl IdentifierDeriver for FieldDeriver {
    fn name(&self) -> &str {
        self.field.name()
    }

    fn derive(&self, record: &Record) -> Option<String> {
        record
            .field(&self.field)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::EntryType;

    #[test]
    fn test_automatic_doi_drops_version() {
        let record = Record::new(EntryType::Article).with_field(Field::Eprint, "2101.00001v3");
        assert_eq!(
            AutomaticDoiDeriver.derive(&record).as_deref(),
            Some("10.48550/arXiv.2101.00001")
        );
    }

    #[test]
    fn test_automatic_doi_needs_arxiv_origin() {
        let record = Record::new(EntryType::Book).with_field(Field::Isbn, "9780306406157");
        assert!(AutomaticDoiDeriver.derive(&record).is_none());
    }

    #[test]
    fn test_manual_doi_skips_arxiv_doi() {
        let automatic = Record::new(EntryType::Article).with_field(Field::Doi, "10.48550/ARXIV.2101.00001");
        assert!(ManualDoiDeriver.derive(&automatic).is_none());

        let manual = Record::new(EntryType::Article).with_field(Field::Doi, "10.1103/PhysRevD.76.013009");
        assert_eq!(ManualDoiDeriver.derive(&manual).as_deref(), Some("10.1103/PhysRevD.76.013009"));
    }

    #[test]
    fn test_field_deriver() {
        let record = Record::new(EntryType::Book).with_field(Field::Isbn, " 0-306-40615-2 ");
        let deriver = FieldDeriver::new(Field::Isbn);
        assert_eq!(deriver.name(), "isbn");
        assert_eq!(deriver.derive(&record).as_deref(), Some("0-306-40615-2"));
        assert!(FieldDeriver::new(Field::Doi).derive(&record).is_none());
    }
}

//! # Merge Policy
//!
//! Field-level reconciliation of a base record with a supplementary one.
//! Fields named in the [`FieldPrioritySet`] are overwritten by the
//! supplement; every other field is only filled in when the base lacks it.
//! Merging never removes a field and never touches its inputs.

use crate::record::{Field, Record};
use std::collections::BTreeSet;
use std::fmt;

/// Named, immutable set of fields a supplementary source may overwrite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPrioritySet {
    name: String,
    fields: BTreeSet<Field>,
}

impl FieldPrioritySet {
    pub fn new(name: impl Into<String>, fields: impl IntoIterator<Item = Field>) -> Self {
        Self {
            name: name.into(),
            fields: fields.into_iter().collect(),
        }
    }

    /// The arXiv-issued DOI record has the better keywords and the
    /// "Family, Given" author list.
    #[must_use]
    pub fn automatic_doi() -> Self {
        Self::new("automatic-doi", [Field::Keywords, Field::Author])
    }

    /// A publisher DOI is authoritative for its own identifier, publisher
    /// and citation key.
    #[must_use]
    pub fn manual_doi() -> Self {
        Self::new("manual-doi", [Field::Doi, Field::Publisher, Field::CitationKey])
    }

    /// Keeps the caller's citation key when a fetched record is laid over
    /// their partial entry.
    #[must_use]
    pub fn entry_preserving() -> Self {
        Self::new("entry-preserving", [Field::CitationKey])
    }

    /// Never overwrite, only fill gaps.
    #[must_use]
    pub fn fill_only() -> Self {
        Self::new("fill-only", [])
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn contains(&self, field: &Field) -> bool {
        self.fields.contains(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }
}

impl fmt::Display for FieldPrioritySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.fields.iter().map(Field::name).collect();
        write!(f, "{} [{}]", self.name, names.join(", "))
    }
}

/// Merge `supplement` into a copy of `base`.
///
/// The base entry type is kept. Empty supplement values are skipped, so a
/// prioritized field is never blanked out.
#[must_use]
pub fn merge(base: &Record, supplement: &Record, priority: &FieldPrioritySet) -> Record {
    let (entry_type, mut fields) = base.clone().into_parts();

    for (field, value) in supplement.fields() {
        if value.trim().is_empty() {
            continue;
        }

        let base_is_empty = fields.get(field).map_or(true, |v| v.trim().is_empty());
        if priority.contains(field) || base_is_empty {
            fields.insert(field.clone(), value.to_string());
        }
    }

    Record::from_parts(entry_type, fields)
}

/// Fold several supplements into `base`, in the given order.
#[must_use]
pub fn merge_all<'a, I>(base: &Record, supplements: I) -> Record
where
    I: IntoIterator<Item = (&'a Record, &'a FieldPrioritySet)>,
{
    supplements
        .into_iter()
        .fold(base.clone(), |acc, (supplement, priority)| merge(&acc, supplement, priority))
}

use proptest::prelude::*;
use rust_bib_enrich::{merge, EntryType, Field, FieldPrioritySet, KeywordNormalizer, Record};
use std::collections::BTreeSet;

fn field_strategy() -> impl Strategy<Value = Field> {
    prop_oneof![
        prop::sample::select(Field::STANDARD.to_vec()),
        "[a-z]{3,8}".prop_map(|name| Field::Other(format!("x{name}"))),
    ]
}

fn record_strategy() -> impl Strategy<Value = Record> {
    prop::collection::vec((field_strategy(), "[A-Za-z0-9 ]{0,12}"), 0..10).prop_map(|pairs| {
        pairs
            .into_iter()
            .fold(Record::new(EntryType::Article), |record, (field, value)| {
                record.with_field(field, value)
            })
    })
}

fn priority_strategy() -> impl Strategy<Value = FieldPrioritySet> {
    prop::collection::vec(field_strategy(), 0..6)
        .prop_map(|fields| FieldPrioritySet::new("generated", fields))
}

/// Merge policy properties
mod merge_props {
    use super::*;

    proptest! {
        #[test]
        fn test_merge_leaves_inputs_untouched(
            base in record_strategy(),
            supplement in record_strategy(),
            priority in priority_strategy(),
        ) {
            let base_before = base.clone();
            let supplement_before = supplement.clone();
            let _ = merge::merge(&base, &supplement, &priority);
            prop_assert_eq!(base, base_before);
            prop_assert_eq!(supplement, supplement_before);
        }

        #[test]
        fn test_unprioritized_base_values_survive(
            base in record_strategy(),
            supplement in record_strategy(),
            priority in priority_strategy(),
        ) {
            let merged = merge::merge(&base, &supplement, &priority);
            for (field, value) in base.fields() {
                if !priority.contains(field) {
                    prop_assert_eq!(merged.field(field), Some(value));
                }
            }
        }

        #[test]
        fn test_prioritized_supplement_values_win(
            base in record_strategy(),
            supplement in record_strategy(),
            priority in priority_strategy(),
        ) {
            let merged = merge::merge(&base, &supplement, &priority);
            for (field, value) in supplement.fields() {
                if priority.contains(field) || !base.has_field(field) {
                    prop_assert_eq!(merged.field(field), Some(value));
                }
            }
        }

        #[test]
        fn test_merged_fields_are_the_union(
            base in record_strategy(),
            supplement in record_strategy(),
            priority in priority_strategy(),
        ) {
            let merged = merge::merge(&base, &supplement, &priority);
            let expected: BTreeSet<&Field> =
                base.fields().chain(supplement.fields()).map(|(field, _)| field).collect();
            let actual: BTreeSet<&Field> = merged.fields().map(|(field, _)| field).collect();
            prop_assert_eq!(actual, expected);
            prop_assert_eq!(merged.entry_type(), base.entry_type());
        }

        #[test]
        fn test_fill_only_never_overwrites(
            base in record_strategy(),
            supplement in record_strategy(),
        ) {
            let merged = merge::merge(&base, &supplement, &FieldPrioritySet::fill_only());
            for (field, value) in base.fields() {
                prop_assert_eq!(merged.field(field), Some(value));
            }
        }
    }
}

/// Keyword normalizer properties
mod keyword_props {
    use super::*;

    proptest! {
        #[test]
        fn test_normalization_is_idempotent(
            keywords in prop::collection::vec("[a-z.]{0,8}", 0..8),
            separator in prop::sample::select(vec![',', ';', '|']),
        ) {
            let normalizer = KeywordNormalizer::new(separator);
            let joined = keywords.join(&separator.to_string());
            let once = normalizer.normalize_keywords(&joined);
            let twice = normalizer.normalize_keywords(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn test_normalized_keywords_are_unique(
            keywords in prop::collection::vec("[a-z]{1,5}", 1..10),
        ) {
            let normalizer = KeywordNormalizer::default();
            let normalized = normalizer.normalize_keywords(&keywords.join(","));
            let parts: Vec<&str> = normalized.split(", ").collect();
            let unique: BTreeSet<&str> = parts.iter().copied().collect();
            prop_assert_eq!(parts.len(), unique.len());
            prop_assert_eq!(parts[0], keywords[0].as_str());
        }
    }
}

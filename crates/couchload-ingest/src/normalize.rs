//! Identifier assignment
//!
//! The normalizer is the only place a record's identifier is set after it
//! leaves its reader. A record that already carries one is passed through
//! untouched, which makes normalization idempotent.

use crate::record::{coerce_identifier, Record};
use crate::report::Warning;
use std::collections::HashMap;
use tracing::debug;

/// Records with resolved identifiers plus what was noticed on the way
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    pub records: Vec<Record>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    id_field: Option<String>,
    positional: bool,
}

impl Normalizer {
    /// `id_field` names the field to take identifiers from. Without one,
    /// records get their 1-based position when `positional` is set.
    pub fn new(id_field: Option<&str>, positional: bool) -> Self {
        Self {
            id_field: id_field.map(str::to_string),
            positional,
        }
    }

    pub fn normalize(&self, records: Vec<Record>) -> Normalized {
        let mut warnings = Vec::new();
        let mut normalized = Vec::with_capacity(records.len());

        for (index, mut record) in records.into_iter().enumerate() {
            let position = index + 1;

            if !record.has_id() {
                match self.id_field {
                    Some(ref field) => match record.get(field).and_then(coerce_identifier) {
                        Some(id) => record.set_id(id),
                        None => warnings.push(Warning::MissingIdentifier {
                            position,
                            field: field.clone(),
                        }),
                    },
                    None if self.positional => record.set_id(position.to_string()),
                    None => {},
                }
            }

            normalized.push(record);
        }

        warnings.extend(duplicate_warnings(&normalized));

        debug!(
            records = normalized.len(),
            warnings = warnings.len(),
            id_field = ?self.id_field,
            "Normalized records"
        );

        Normalized {
            records: normalized,
            warnings,
        }
    }
}

/// One warning per identifier used more than once, in first-seen order
fn duplicate_warnings(records: &[Record]) -> Vec<Warning> {
    let mut order: Vec<&str> = Vec::new();
    let mut seen: HashMap<&str, Vec<usize>> = HashMap::new();

    for (index, record) in records.iter().enumerate() {
        if let Some(id) = record.id() {
            let positions = seen.entry(id).or_default();
            if positions.is_empty() {
                order.push(id);
            }
            positions.push(index + 1);
        }
    }

    order
        .into_iter()
        .filter_map(|id| {
            let positions = seen.remove(id)?;
            (positions.len() > 1).then(|| Warning::DuplicateIdentifier {
                identifier: id.to_string(),
                positions,
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::source::tabular;
    use proptest::prelude::*;
    use serde_json::{json, Value};
    use std::path::Path;

    fn record(value: Value) -> Record {
        Record::from_value(value)
    }

    fn ids(normalized: &Normalized) -> Vec<Option<String>> {
        normalized
            .records
            .iter()
            .map(|r| r.id().map(str::to_string))
            .collect()
    }

    #[test]
    fn test_positional_identifiers() {
        let out = Normalizer::new(None, true)
            .normalize(vec![record(json!({"a": 1})), record(json!({"a": 2}))]);
        assert_eq!(ids(&out), vec![Some("1".to_string()), Some("2".to_string())]);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_identifier_from_field_is_coerced() {
        let out = Normalizer::new(Some("sku"), true).normalize(vec![
            record(json!({"sku": "A-1"})),
            record(json!({"sku": 42})),
        ]);
        assert_eq!(ids(&out), vec![Some("A-1".to_string()), Some("42".to_string())]);
        // the source field stays in the document
        assert_eq!(out.records[0].get("sku"), Some(&json!("A-1")));
    }

    #[test]
    fn test_missing_field_is_soft() {
        let out = Normalizer::new(Some("sku"), true).normalize(vec![
            record(json!({"sku": "A"})),
            record(json!({"name": "no sku"})),
            record(json!({"sku": ""})),
        ]);

        assert_eq!(ids(&out), vec![Some("A".to_string()), None, None]);
        assert_eq!(
            out.warnings,
            vec![
                Warning::MissingIdentifier {
                    position: 2,
                    field: "sku".to_string()
                },
                Warning::MissingIdentifier {
                    position: 3,
                    field: "sku".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_existing_identifier_is_never_overwritten() {
        let out = Normalizer::new(Some("sku"), true)
            .normalize(vec![record(json!({"_id": "keep", "sku": "other"}))]);
        assert_eq!(ids(&out), vec![Some("keep".to_string())]);

        let out = Normalizer::new(None, true).normalize(vec![
            record(json!({"n": 1})),
            record(json!({"_id": "explicit"})),
        ]);
        assert_eq!(ids(&out), vec![Some("1".to_string()), Some("explicit".to_string())]);
    }

    #[test]
    fn test_non_positional_leaves_records_alone() {
        let out = Normalizer::new(None, false).normalize(vec![record(json!({"filename": "a.pdf"}))]);
        assert_eq!(ids(&out), vec![None]);
    }

    #[test]
    fn test_duplicates_are_reported() {
        let out = Normalizer::new(Some("k"), true).normalize(vec![
            record(json!({"k": "x"})),
            record(json!({"k": "y"})),
            record(json!({"k": "x"})),
        ]);

        assert_eq!(
            out.warnings,
            vec![Warning::DuplicateIdentifier {
                identifier: "x".to_string(),
                positions: vec![1, 3],
            }]
        );
    }

    #[test]
    fn test_scalar_wrap_keeps_position() {
        let out = Normalizer::new(None, true)
            .normalize(vec![record(json!({"a": 1})), record(json!("Action"))]);
        assert_eq!(out.records[1].to_document().unwrap(), json!({"_id": "2", "value": "Action"}));
    }

    #[test]
    fn test_blank_id_column_yields_single_identifier() {
        let csv = "_id,name\n,alice\n";
        let parsed = tabular::parse(Path::new("rows.csv"), csv.as_bytes(), None).unwrap();
        let out = Normalizer::new(None, true).normalize(parsed.records);

        let rendered = serde_json::to_string(&out.records[0]).unwrap();
        assert_eq!(rendered, r#"{"_id":"1","name":"alice"}"#);
    }

    #[test]
    fn test_null_id_key_yields_field_identifier() {
        let out = Normalizer::new(Some("sku"), true)
            .normalize(vec![record(json!({"_id": null, "sku": "A"}))]);

        let rendered = serde_json::to_string(&out.records[0]).unwrap();
        assert_eq!(rendered, r#"{"_id":"A","sku":"A"}"#);
    }

    fn arb_field_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            "[a-z0-9]{0,6}".prop_map(Value::String),
            any::<i64>().prop_map(|n| json!(n)),
            any::<bool>().prop_map(Value::Bool),
        ]
    }

    fn arb_records() -> impl Strategy<Value = Vec<Record>> {
        prop::collection::vec(
            (proptest::option::of(arb_field_value()), any::<bool>()),
            0..40,
        )
        .prop_map(|rows| {
            rows.into_iter()
                .map(|(key, has_other)| {
                    let mut record = Record::new();
                    if let Some(key) = key {
                        record.insert("key", key);
                    }
                    if has_other {
                        record.insert("other", json!("x"));
                    }
                    record
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(
            records in arb_records(),
            use_field in any::<bool>(),
        ) {
            let normalizer = Normalizer::new(use_field.then_some("key"), true);
            let once = normalizer.normalize(records.clone());
            let twice = normalizer.normalize(once.records.clone());

            prop_assert_eq!(once.records.len(), records.len());
            prop_assert_eq!(&once.records, &twice.records);
        }

        #[test]
        fn prop_explicit_identifiers_survive(
            records in arb_records(),
            use_field in any::<bool>(),
        ) {
            let mut records = records;
            for (i, record) in records.iter_mut().enumerate() {
                if i % 3 == 0 {
                    record.insert("_id", json!(format!("explicit-{}", i)));
                }
            }

            let before: Vec<Option<String>> =
                records.iter().map(|r| r.id().map(str::to_string)).collect();
            let out = Normalizer::new(use_field.then_some("key"), true).normalize(records);

            for (before, after) in before.iter().zip(out.records.iter()) {
                if let Some(id) = before {
                    prop_assert_eq!(Some(id.as_str()), after.id());
                }
            }
        }
    }
}

//! Core domain types for the fetch pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Key
// ---------------------------------------------------------------------------

/// A `(partition, item)` pair identifying one fetchable unit of work.
///
/// Field order matters: the derived `Ord` compares `partition` first and
/// `item` second, which is the resumption order of the keyspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key {
    /// Outer index (e.g. a surah number), 1-based.
    pub partition: u32,
    /// Inner index within the partition (e.g. an ayah number), 1-based.
    pub item: u32,
}

impl Key {
    pub const fn new(partition: u32, item: u32) -> Self {
        Self { partition, item }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.partition, self.item)
    }
}

impl std::str::FromStr for Key {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (p, i) = s
            .split_once(':')
            .ok_or_else(|| format!("expected `partition:item`, got `{s}`"))?;
        let partition = p
            .trim()
            .parse()
            .map_err(|e| format!("invalid partition `{p}`: {e}"))?;
        let item = i
            .trim()
            .parse()
            .map_err(|e| format!("invalid item `{i}`: {e}"))?;
        Ok(Self { partition, item })
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One set of named text fields extracted from a page.
///
/// Values are optional so that sources with optional annotations
/// (e.g. a footnote that only some verses carry) serialize them as `null`.
pub type FieldSet = BTreeMap<String, Option<String>>;

/// The normalized payload stored for one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Record {
    /// A single text value.
    Text(String),
    /// One named field set.
    Fields(FieldSet),
    /// Zero-to-many sub-records, e.g. word-level tokens of one verse.
    Tokens(Vec<FieldSet>),
}

/// How a source's extracted field sets are folded into a [`Record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordShape {
    Text,
    Fields,
    Tokens,
}

impl RecordShape {
    /// Build a record from already-normalized field sets.
    ///
    /// Returns `None` when nothing content-bearing remains; such keys are
    /// treated as missing rather than stored as empty records.
    pub fn build(self, sets: Vec<FieldSet>) -> Option<Record> {
        match self {
            RecordShape::Text => sets
                .into_iter()
                .flat_map(|set| set.into_values())
                .flatten()
                .find(|value| !value.is_empty())
                .map(Record::Text),
            RecordShape::Fields => sets
                .into_iter()
                .find(has_content)
                .map(Record::Fields),
            RecordShape::Tokens => {
                let tokens: Vec<FieldSet> = sets.into_iter().filter(has_content).collect();
                if tokens.is_empty() {
                    None
                } else {
                    Some(Record::Tokens(tokens))
                }
            }
        }
    }
}

/// `true` if at least one field holds a non-empty value.
fn has_content(set: &FieldSet) -> bool {
    set.values()
        .any(|value| value.as_deref().is_some_and(|v| !v.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(pairs: &[(&str, Option<&str>)]) -> FieldSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
            .collect()
    }

    #[test]
    fn key_ordering_is_partition_then_item() {
        assert!(Key::new(1, 7) < Key::new(2, 1));
        assert!(Key::new(2, 1) < Key::new(2, 2));
        assert_eq!(Key::new(3, 3), Key::new(3, 3));
    }

    #[test]
    fn key_parse_and_display() {
        let key: Key = "2:255".parse().expect("parse key");
        assert_eq!(key, Key::new(2, 255));
        assert_eq!(key.to_string(), "2:255");
        assert!("2-255".parse::<Key>().is_err());
        assert!("x:1".parse::<Key>().is_err());
    }

    #[test]
    fn text_shape_takes_first_non_empty_value() {
        let record = RecordShape::Text.build(vec![set(&[("arabic", Some("بِسْمِ"))])]);
        assert_eq!(record, Some(Record::Text("بِسْمِ".into())));

        let empty = RecordShape::Text.build(vec![set(&[("arabic", Some(""))])]);
        assert_eq!(empty, None);
    }

    #[test]
    fn fields_shape_keeps_null_annotations() {
        let record = RecordShape::Fields
            .build(vec![set(&[("arabic", Some("a")), ("hashiyah", None)])])
            .expect("record");
        let json = serde_json::to_string(&record).expect("serialize");
        assert_eq!(json, r#"{"arabic":"a","hashiyah":null}"#);
    }

    #[test]
    fn tokens_shape_drops_empty_tokens() {
        let record = RecordShape::Tokens.build(vec![
            set(&[("arabic", Some("a")), ("urdu", Some("b"))]),
            set(&[("arabic", Some("")), ("urdu", None)]),
        ]);
        match record {
            Some(Record::Tokens(tokens)) => assert_eq!(tokens.len(), 1),
            other => panic!("unexpected record: {other:?}"),
        }

        assert_eq!(RecordShape::Tokens.build(Vec::new()), None);
    }

    #[test]
    fn untagged_record_deserializes_each_shape() {
        let text: Record = serde_json::from_str(r#""verse""#).expect("text");
        assert_eq!(text, Record::Text("verse".into()));

        let fields: Record = serde_json::from_str(r#"{"urdu":"x"}"#).expect("fields");
        assert!(matches!(fields, Record::Fields(_)));

        let tokens: Record = serde_json::from_str(r#"[{"arabic":"a","urdu":"b"}]"#).expect("tokens");
        assert!(matches!(tokens, Record::Tokens(ref t) if t.len() == 1));
    }
}

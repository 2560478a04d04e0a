pub mod criteria;
pub mod grouping;
pub mod parent;
pub mod runner;

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StackError;

/// One media item as returned by the asset service.
///
/// The raw record is kept so criteria can address any field by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Asset {
    id: String,
    original_file_name: String,
    fields: Map<String, Value>,
}

impl Asset {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn original_file_name(&self) -> &str {
        &self.original_file_name
    }

    /// Field by its service name. JSON `null` reads as absent.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    pub fn stack_count(&self) -> Option<&Value> {
        self.field("stackCount")
    }

    /// True when the asset already belongs to a stack.
    pub fn is_stacked(&self) -> bool {
        self.stack_count().is_some()
    }
}

impl TryFrom<Map<String, Value>> for Asset {
    type Error = StackError;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        let id = match fields.get("id") {
            Some(Value::String(id)) => id.clone(),
            _ => return Err(StackError::InvalidAsset("missing string field `id`".to_string())),
        };
        let original_file_name = match fields.get("originalFileName") {
            Some(Value::String(name)) => name.clone(),
            _ => {
                return Err(StackError::InvalidAsset(format!(
                    "asset {} has no string field `originalFileName`",
                    id
                )));
            }
        };

        Ok(Asset {
            id,
            original_file_name,
            fields,
        })
    }
}

impl TryFrom<Value> for Asset {
    type Error = StackError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Asset::try_from(fields),
            other => Err(StackError::InvalidAsset(format!(
                "expected a JSON object, got {}",
                other
            ))),
        }
    }
}

impl From<Asset> for Map<String, Value> {
    fn from(asset: Asset) -> Self {
        asset.fields
    }
}

/// A parsed timestamp that compares by wall-clock time and offset.
///
/// `10:00+02:00` and `08:00Z` are the same instant but different values, so
/// they do not compare equal. Spellings of the same value still do.
#[derive(Debug, Clone, Copy)]
pub struct Timestamp(pub DateTime<FixedOffset>);

impl Timestamp {
    fn exact(&self) -> (NaiveDateTime, i32) {
        (self.0.naive_local(), self.0.offset().local_minus_utc())
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.exact() == other.exact()
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.exact().cmp(&other.exact())
    }
}

impl Hash for Timestamp {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.exact().hash(state);
    }
}

/// One resolved criterion value.
///
/// Variant order is part of the ordering, so values of different kinds in the
/// same position still compare totally.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyPart {
    Bool(bool),
    Integer(i64),
    Timestamp(Timestamp),
    Text(String),
}

impl KeyPart {
    /// Convert an untransformed field value.
    pub fn from_value(value: &Value) -> KeyPart {
        match value {
            Value::Bool(b) => KeyPart::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => KeyPart::Integer(i),
                None => KeyPart::Text(n.to_string()),
            },
            Value::String(s) => match DateTime::parse_from_rfc3339(s) {
                Ok(ts) => KeyPart::Timestamp(Timestamp(ts)),
                Err(_) => KeyPart::Text(s.clone()),
            },
            other => KeyPart::Text(other.to_string()),
        }
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Bool(b) => write!(f, "{}", b),
            KeyPart::Integer(i) => write!(f, "{}", i),
            KeyPart::Timestamp(ts) => write!(f, "{}", ts.0.to_rfc3339()),
            KeyPart::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Grouping key of an asset.
///
/// `Unmatched` sorts before every matched key and equals every other
/// `Unmatched`, so unmatched assets end up in a single run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CriteriaKey {
    Unmatched,
    Matched(Vec<KeyPart>),
}

impl CriteriaKey {
    pub fn is_matched(&self) -> bool {
        matches!(self, CriteriaKey::Matched(_))
    }
}

impl fmt::Display for CriteriaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CriteriaKey::Unmatched => write!(f, "<unmatched>"),
            CriteriaKey::Matched(parts) => {
                let parts: Vec<String> = parts.iter().map(|p| p.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

/// Assets sharing one criteria key
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub key: CriteriaKey,
    pub assets: Vec<Asset>,
}

/// A ranked group: the parent followed by its children.
#[derive(Debug, Clone, PartialEq)]
pub struct Stack {
    pub key: CriteriaKey,
    pub parent: Asset,
    pub children: Vec<Asset>,
}


#[cfg(test)]
mod tests {
    use super::test_support::asset;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_field_reads_as_absent() {
        let a = asset("1", "IMG_1.jpg", json!({ "thumbhash": null, "stackCount": 2 }));
        assert!(a.field("thumbhash").is_none());
        assert!(a.field("missing").is_none());
        assert!(a.is_stacked());
    }

    #[test]
    fn test_asset_requires_id_and_file_name() {
        assert!(Asset::try_from(json!({ "id": "1" })).is_err());
        assert!(Asset::try_from(json!({ "originalFileName": "a.jpg" })).is_err());
        assert!(Asset::try_from(json!([1, 2])).is_err());
    }

    #[test]
    fn test_asset_deserializes_from_service_record() {
        let a: Asset = serde_json::from_value(json!({
            "id": "abc",
            "originalFileName": "IMG_2482.jpg",
            "stackCount": null,
            "localDateTime": "2023-05-01T10:00:00.000Z"
        }))
        .unwrap();
        assert_eq!(a.id(), "abc");
        assert!(!a.is_stacked());
        let back = serde_json::to_value(&a).unwrap();
        assert_eq!(back["localDateTime"], "2023-05-01T10:00:00.000Z");
    }

    #[test]
    fn test_equivalent_timestamps_compare_equal() {
        let a = KeyPart::from_value(&json!("2023-05-01T10:00:00Z"));
        let b = KeyPart::from_value(&json!("2023-05-01T10:00:00.000Z"));
        assert_eq!(a, b);
        assert_eq!(KeyPart::from_value(&json!("IMG")), KeyPart::Text("IMG".to_string()));
        assert_eq!(KeyPart::from_value(&json!(7)), KeyPart::Integer(7));
    }

    #[test]
    fn test_same_instant_with_other_offset_is_a_different_time() {
        let local = KeyPart::from_value(&json!("2023-05-01T10:00:00+02:00"));
        let utc = KeyPart::from_value(&json!("2023-05-01T08:00:00Z"));
        assert_ne!(local, utc);
        assert_eq!(
            KeyPart::from_value(&json!("2023-05-01T08:00:00+00:00")),
            utc
        );
    }

    #[test]
    fn test_unmatched_sorts_first() {
        let matched = CriteriaKey::Matched(vec![KeyPart::Text(String::new())]);
        assert!(CriteriaKey::Unmatched < matched);
        assert_eq!(CriteriaKey::Unmatched, CriteriaKey::Unmatched);
    }
}

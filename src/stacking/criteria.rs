//! Criteria engine: turns a declarative list of field rules into a grouping
//! key per asset.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::{Asset, CriteriaKey, KeyPart};
use crate::error::StackError;

/// Take one segment of the value after splitting on `separator`.
/// Negative indices count from the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitRule {
    pub separator: String,
    pub index: i64,
}

/// Capture group `index` of `pattern`, matched from the start of the value.
#[derive(Debug, Clone)]
pub struct RegexRule {
    pub pattern: Regex,
    pub source: String,
    pub index: usize,
}

/// One entry of the criteria list. List order defines key order.
#[derive(Debug, Clone)]
pub struct CriterionSpec {
    pub key: String,
    pub split: Option<SplitRule>,
    pub regex: Option<RegexRule>,
}

/// Why an asset could not be keyed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMiss {
    /// The field is absent or null.
    MissingField { key: String },
    /// The split index points past the available segments.
    SplitOutOfRange { key: String, value: String },
    /// The pattern did not match, or the capture group did not participate.
    RegexMismatch { value: String, pattern: String },
}

#[derive(Deserialize)]
struct RawCriterion {
    key: String,
    split: Option<RawSplit>,
    regex: Option<RawRegex>,
}

#[derive(Deserialize)]
struct RawSplit {
    key: String,
    index: i64,
}

#[derive(Deserialize)]
struct RawRegex {
    key: String,
    index: Option<usize>,
}

impl CriterionSpec {
    /// A plain field lookup with no transform.
    pub fn field(key: &str) -> Self {
        CriterionSpec {
            key: key.to_string(),
            split: None,
            regex: None,
        }
    }

    pub fn with_split(mut self, separator: &str, index: i64) -> Result<Self, StackError> {
        if separator.is_empty() {
            return Err(StackError::InvalidCriteria(format!(
                "empty split separator for key `{}`",
                self.key
            )));
        }
        self.split = Some(SplitRule {
            separator: separator.to_string(),
            index,
        });
        Ok(self)
    }

    pub fn with_regex(mut self, pattern: &str, index: usize) -> Result<Self, StackError> {
        // anchored at the start only, like a prefix match
        let compiled = Regex::new(&format!("^(?:{})", pattern)).map_err(|e| {
            StackError::InvalidCriteria(format!("bad regex for key `{}`: {}", self.key, e))
        })?;
        if index >= compiled.captures_len() {
            return Err(StackError::InvalidCriteria(format!(
                "regex `{}` for key `{}` has no capture group {}",
                pattern, self.key, index
            )));
        }
        self.regex = Some(RegexRule {
            pattern: compiled,
            source: pattern.to_string(),
            index,
        });
        Ok(self)
    }

    fn from_raw(raw: RawCriterion) -> Result<Self, StackError> {
        if raw.key.is_empty() {
            return Err(StackError::InvalidCriteria("criterion with empty key".to_string()));
        }
        let mut criterion = CriterionSpec::field(&raw.key);
        if let Some(split) = raw.split {
            criterion = criterion.with_split(&split.key, split.index)?;
        }
        if let Some(regex) = raw.regex {
            criterion = criterion.with_regex(&regex.key, regex.index.unwrap_or(1))?;
        }
        Ok(criterion)
    }

    /// Apply this rule to one asset.
    fn extract(&self, asset: &Asset) -> Result<KeyPart, KeyMiss> {
        let value = asset.field(&self.key).ok_or_else(|| KeyMiss::MissingField {
            key: self.key.clone(),
        })?;

        if self.split.is_none() && self.regex.is_none() {
            return Ok(KeyPart::from_value(value));
        }

        let mut text = value_text(value);

        if let Some(split) = &self.split {
            text = split_segment(&text, split).ok_or_else(|| KeyMiss::SplitOutOfRange {
                key: self.key.clone(),
                value: text.clone(),
            })?;
        }

        if let Some(rule) = &self.regex {
            let captured = rule
                .pattern
                .captures(&text)
                .and_then(|caps| caps.get(rule.index))
                .map(|m| m.as_str().to_string());
            text = captured.ok_or_else(|| KeyMiss::RegexMismatch {
                value: text.clone(),
                pattern: rule.source.clone(),
            })?;
        }

        Ok(KeyPart::Text(text))
    }
}

/// Group by file name stem plus exact capture time.
pub fn default_criteria() -> Vec<CriterionSpec> {
    vec![
        CriterionSpec {
            key: "originalFileName".to_string(),
            split: Some(SplitRule {
                separator: ".".to_string(),
                index: 0,
            }),
            regex: None,
        },
        CriterionSpec::field("localDateTime"),
    ]
}

/// Parse and validate a JSON criteria list.
pub fn parse_criteria(json: &str) -> Result<Vec<CriterionSpec>, StackError> {
    let raw: Vec<RawCriterion> = serde_json::from_str(json)
        .map_err(|e| StackError::InvalidCriteria(format!("malformed criteria JSON: {}", e)))?;
    if raw.is_empty() {
        return Err(StackError::InvalidCriteria("criteria list is empty".to_string()));
    }
    raw.into_iter().map(CriterionSpec::from_raw).collect()
}

/// Resolve the key parts of an asset, stopping at the first miss.
pub fn resolve(asset: &Asset, criteria: &[CriterionSpec]) -> Result<Vec<KeyPart>, KeyMiss> {
    criteria.iter().map(|c| c.extract(asset)).collect()
}

/// Resolve an asset's grouping key.
///
/// Missing fields yield `Unmatched`. A regex mismatch also yields `Unmatched`
/// when `skip_unmatched` is set and is an error otherwise.
pub fn resolve_key(
    asset: &Asset,
    criteria: &[CriterionSpec],
    skip_unmatched: bool,
) -> Result<CriteriaKey, StackError> {
    match resolve(asset, criteria) {
        Ok(parts) => Ok(CriteriaKey::Matched(parts)),
        Err(KeyMiss::RegexMismatch { value, pattern }) if !skip_unmatched => {
            Err(StackError::CriteriaMismatch {
                key: pattern,
                samples: vec![value],
            })
        }
        Err(_) => Ok(CriteriaKey::Unmatched),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn split_segment(text: &str, rule: &SplitRule) -> Option<String> {
    let segments: Vec<&str> = text.split(rule.separator.as_str()).collect();
    let len = segments.len() as i64;
    let index = if rule.index < 0 { len + rule.index } else { rule.index };
    if index < 0 || index >= len {
        return None;
    }
    segments.get(index as usize).map(|s| s.to_string())
}

pub mod merge;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TagError;

pub use merge::{merge, MergeResult};

// ─── Vocabulary ─────────────────────────────────────────────────────────────

/// The fixed set of tag keys a caller may request. Keys are case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagKey {
    Owner,
    Application,
    Environment,
    CostCenter,
}

impl TagKey {
    pub const ALL: [TagKey; 4] = [
        TagKey::Owner,
        TagKey::Application,
        TagKey::Environment,
        TagKey::CostCenter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TagKey::Owner => "owner",
            TagKey::Application => "application",
            TagKey::Environment => "environment",
            TagKey::CostCenter => "cost-center",
        }
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TagKey {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TagKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| TagError::InvalidInput(format!("unknown tag key '{}'", s)))
    }
}

// ─── Tag sets ───────────────────────────────────────────────────────────────

/// A key/value tag mapping. Ordered so reports and audit lines are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeMap<String, String>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Drop entries whose value is empty or whitespace. A blank requested
    /// value means "leave this tag alone", never "clear it".
    pub fn without_blanks(&self) -> TagSet {
        self.0
            .iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        TagSet(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<BTreeMap<String, String>> for TagSet {
    fn from(map: BTreeMap<String, String>) -> Self {
        TagSet(map)
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", k, v)?;
        }
        write!(f, "}}")
    }
}

/// Tag values gathered for the four vocabulary keys. `None` and blank
/// strings both mean "do not change".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestedTags {
    pub owner: Option<String>,
    pub application: Option<String>,
    pub environment: Option<String>,
    pub cost_center: Option<String>,
}

impl RequestedTags {
    pub fn value(&self, key: TagKey) -> Option<&str> {
        match key {
            TagKey::Owner => self.owner.as_deref(),
            TagKey::Application => self.application.as_deref(),
            TagKey::Environment => self.environment.as_deref(),
            TagKey::CostCenter => self.cost_center.as_deref(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.to_tag_set().is_empty()
    }

    /// Build the request tag set with blank values already excluded.
    pub fn to_tag_set(&self) -> TagSet {
        TagKey::ALL
            .into_iter()
            .filter_map(|k| self.value(k).map(|v| (k.as_str(), v)))
            .collect::<TagSet>()
            .without_blanks()
    }
}

// ─── Diff ───────────────────────────────────────────────────────────────────

/// One requested key whose value moved during a merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagChange {
    pub key: String,
    pub old: Option<String>,
    pub new: String,
}

/// Keys whose merged value differs from the pre-merge value. Only used for
/// reporting; the full merged set is always what gets submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagDiff {
    pub changes: Vec<TagChange>,
}

impl TagDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.changes.iter().map(|c| c.key.as_str())
    }

    /// The new values, as a tag set.
    pub fn to_tag_set(&self) -> TagSet {
        self.changes
            .iter()
            .map(|c| (c.key.clone(), c.new.clone()))
            .collect()
    }
}

impl fmt::Display for TagDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_tag_set())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_key_round_trips_through_str() {
        for key in TagKey::ALL {
            assert_eq!(key.as_str().parse::<TagKey>().unwrap(), key);
        }
        assert!("Owner".parse::<TagKey>().is_err());
        assert!("cost_center".parse::<TagKey>().is_err());
    }

    #[test]
    fn requested_tags_drop_blank_values() {
        let requested = RequestedTags {
            owner: Some("".to_string()),
            application: Some("billing".to_string()),
            environment: Some("   ".to_string()),
            cost_center: None,
        };
        let set = requested.to_tag_set();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("application"), Some("billing"));
        assert!(!requested.is_blank());
        assert!(RequestedTags::default().is_blank());
    }

    #[test]
    fn values_are_not_trimmed() {
        let requested = RequestedTags {
            owner: Some(" alice ".to_string()),
            ..Default::default()
        };
        assert_eq!(requested.to_tag_set().get("owner"), Some(" alice "));
    }

    #[test]
    fn tag_set_display_is_sorted() {
        let set: TagSet = [("owner", "alice"), ("application", "billing")]
            .into_iter()
            .collect();
        assert_eq!(set.to_string(), "{application: billing, owner: alice}");
    }

    #[test]
    fn tag_set_deserializes_from_plain_map() {
        let set: TagSet = serde_json::from_str(r#"{"owner":"alice"}"#).unwrap();
        assert_eq!(set.get("owner"), Some("alice"));
    }
}

//! Model records and list filters

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Filter value meaning "no constraint on this field"
pub const FILTER_ALL: &str = "all";

/// Category a model is filed under
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
    Display, EnumString, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "lowercase", from = "String")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Category {
    Character,
    Vehicle,
    Architecture,
    Furniture,
    Nature,
    Prop,
    #[default]
    Other,
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_default()
    }
}

/// Metadata of a stored 3D asset, as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: Category,
    pub file_size: u64,
    pub file_id: String,
    pub original_name: String,
    pub upload_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ModelRecord {
    /// Description, treating an empty string as absent
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref().filter(|d| !d.is_empty())
    }

    /// Whether the record carries the given tag (case-insensitive)
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

/// Field → value constraints applied to the model list query.
///
/// Absent, empty and [`FILTER_ALL`] values are kept in the set (so they can
/// overwrite an earlier constraint) but never reach the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelFilters {
    entries: BTreeMap<String, Option<String>>,
}

impl ModelFilters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: Option<impl Into<String>>) {
        self.entries.insert(key.into(), value.map(Into::into));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(|v| v.as_deref())
    }

    /// Merge `changes` into this set, returning whether anything changed.
    pub fn merge(&mut self, changes: &ModelFilters) -> bool {
        let mut changed = false;
        for (key, value) in &changes.entries {
            if self.entries.get(key) != Some(value) {
                self.entries.insert(key.clone(), value.clone());
                changed = true;
            }
        }
        changed
    }

    /// Pairs that constrain the query, in key order
    pub fn query_pairs(&self) -> Vec<(&str, &str)> {
        self.entries
            .iter()
            .filter_map(|(key, value)| match value.as_deref() {
                Some(v) if !v.is_empty() && v != FILTER_ALL => Some((key.as_str(), v)),
                _ => None,
            })
            .collect()
    }

    /// Whether no entry constrains the query
    pub fn is_unconstrained(&self) -> bool {
        self.query_pairs().is_empty()
    }
}

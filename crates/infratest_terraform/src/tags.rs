//! Autoscaling group tag records.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// One ASG tag as exposed by the `autoscaling_group_tags` output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AsgTag {
    pub key: String,
    pub value: String,
    #[serde(deserialize_with = "bool_or_string")]
    pub propagate_at_launch: bool,
}

impl AsgTag {
    pub fn new(key: impl Into<String>, value: impl Into<String>, propagate_at_launch: bool) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            propagate_at_launch,
        }
    }

    /// Tag copied onto launched instances.
    pub fn propagated(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, value, true)
    }
}

/// Tag output in either schema the module has exposed: a list of records or
/// a flat `key -> value` map.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum AsgTags {
    Records(Vec<AsgTag>),
    Map(BTreeMap<String, String>),
}

impl AsgTags {
    /// Whether `tag` is present. The map schema has no propagate flag, so
    /// only key and value are compared there.
    pub fn contains(&self, tag: &AsgTag) -> bool {
        match self {
            Self::Records(records) => records.contains(tag),
            Self::Map(map) => map.get(&tag.key) == Some(&tag.value),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Records(records) => records.len(),
            Self::Map(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Terraform sometimes renders booleans inside tag maps as strings.
fn bool_or_string<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Text(s) => match s.to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "invalid propagate_at_launch value: {}",
                other
            ))),
        },
    }
}

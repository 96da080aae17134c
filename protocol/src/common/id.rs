//! Record identifiers
//!
//! The portal backend is inconsistent about ID types: the same collection may
//! return `42` in one response and `"42"` in another. Both forms are carried
//! as one string newtype so lookups and comparisons never depend on the wire
//! representation.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// False for empty IDs and for the stringified JS sentinels that leak
    /// out of some legacy endpoints.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && self.0 != "null" && self.0 != "undefined"
    }

    /// Read an ID out of a raw JSON value, accepting numbers and strings.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(Self::new(s.as_str())),
            serde_json::Value::Number(n) => Some(Self::new(n.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self::new(value.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireId {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match WireId::deserialize(deserializer)? {
            WireId::Text(s) => Self::new(s),
            WireId::Signed(n) => Self::new(n.to_string()),
            WireId::Unsigned(n) => Self::new(n.to_string()),
        })
    }
}

//! Key layout for current- and legacy-format records.

use serde::{Deserialize, Serialize};

/// Namespaces under which flag records are stored.
///
/// Keys take the form `{prefix}:{name}`; prefixes never contain the
/// separator, so a prefix scan for `"{prefix}:"` stays inside one
/// namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeySpace {
    /// Prefix for current-format JSON records.
    pub prefix: String,
    /// Prefix for legacy `|`-delimited records.
    pub legacy_prefix: String,
}

impl Default for KeySpace {
    fn default() -> Self {
        Self {
            prefix: "rollout".to_string(),
            legacy_prefix: "feature".to_string(),
        }
    }
}

impl KeySpace {
    pub fn key(&self, name: &str) -> String {
        format!("{}:{name}", self.prefix)
    }

    pub fn legacy_key(&self, name: &str) -> String {
        format!("{}:{name}", self.legacy_prefix)
    }

    pub fn scan_prefix(&self) -> String {
        format!("{}:", self.prefix)
    }

    pub fn legacy_scan_prefix(&self) -> String {
        format!("{}:", self.legacy_prefix)
    }

    /// Flag name for a current-format key, if the key belongs here.
    pub fn name_of<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(&self.prefix)?.strip_prefix(':')
    }

    /// Flag name for a legacy-format key, if the key belongs there.
    pub fn legacy_name_of<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(&self.legacy_prefix)?.strip_prefix(':')
    }
}

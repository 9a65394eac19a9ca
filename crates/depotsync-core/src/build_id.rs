use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque revision token published by the distribution service.
///
/// Build ids are compared for equality only; no ordering is implied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildId(String);

impl BuildId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Pulls the value token out of a `"buildid"  "1234"` line.
    pub(crate) fn from_keyed_line(line: &str) -> Option<Self> {
        let value = line.split_whitespace().nth(1)?;
        Some(Self(value.trim_matches('"').to_string()))
    }

    pub(crate) fn is_placeholder(&self) -> bool {
        self.0.is_empty() || self.0 == "0"
    }
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

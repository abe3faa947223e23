//! Content hash identifiers.

use std::fmt;
use std::str::FromStr;

/// Identifier returned by the content store for a stored byte sequence.
///
/// Equality is total over the full string: two hashes are the same object
/// only if every character matches. No prefix or case folding is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Wrap a hash string produced by a store.
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// The hash as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the hash, returning the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ContentHash {
    type Err = String;

    /// Parse a hash from user input (e.g. one line of a results file).
    ///
    /// Surrounding whitespace is trimmed; blank input is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("empty content hash".to_string());
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(format!("content hash contains whitespace: '{trimmed}'"));
        }
        Ok(Self(trimmed.to_string()))
    }
}

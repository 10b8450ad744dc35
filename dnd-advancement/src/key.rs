//! Content keys for classes, subclasses, feats, and spells.
//!
//! Rules content is identified by a `name|source` pair (e.g. `Fighter|PHB`).
//! Everything in the crate parses those strings through [`ContentKey`] so the
//! split happens in exactly one place.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Source book assumed when a key has no `|source` suffix.
pub const DEFAULT_SOURCE: &str = "PHB";

/// Error type for content key parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("Content key has an empty name: {0:?}")]
    EmptyName(String),
    #[error("Content key has too many separators: {0:?}")]
    TooManyParts(String),
}

/// Typed `(name, source)` identifier for a piece of rules content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentKey {
    pub name: String,
    pub source: String,
}

impl ContentKey {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Key with the default source book.
    pub fn phb(name: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_SOURCE)
    }

    /// Parse a `name|source` string.
    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        let mut parts = raw.split('|');
        let name = parts.next().unwrap_or_default().trim();
        let source = parts.next().map(str::trim).filter(|s| !s.is_empty());

        if parts.next().is_some() {
            return Err(KeyError::TooManyParts(raw.to_string()));
        }
        if name.is_empty() {
            return Err(KeyError::EmptyName(raw.to_string()));
        }

        Ok(Self::new(name, source.unwrap_or(DEFAULT_SOURCE)))
    }

    /// Lowercased name, used to index rules tables.
    pub fn table_id(&self) -> String {
        self.name.to_lowercase()
    }

    /// Case-insensitive comparison of name and source.
    pub fn matches(&self, other: &ContentKey) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
            && self.source.eq_ignore_ascii_case(&other.source)
    }

    /// Case-insensitive comparison of the name only.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.name, self.source)
    }
}

impl FromStr for ContentKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ContentKey {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentKey> for String {
    fn from(key: ContentKey) -> Self {
        key.to_string()
    }
}

/// Normalize free text into a map key: lowercase, runs of
/// non-alphanumerics collapsed into one `_`, no leading or trailing `_`.
pub fn normalize_key(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_sep = false;

    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_sep = true;
        }
    }

    out
}

/// Key under which a feature choice made at `level` is stored on the character.
///
/// The level is part of the key so that a feature offering the same choice at
/// several levels (Expertise at 1 and 6) keeps one entry per grant.
pub fn feature_choice_key(feature_name: &str, level: u8) -> String {
    normalize_key(&format!("{feature_name} {level}"))
}

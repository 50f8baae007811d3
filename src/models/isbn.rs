//! Normalized book identifier.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// An ISBN reduced to its decimal digits and the `X` check character.
///
/// Scanners and people type ISBNs with hyphens, spaces and prefixes
/// (`ISBN 978-4-...`); all of that is stripped before the value is used
/// as a key anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Isbn(String);

impl Isbn {
    /// Normalize and validate raw scanner or form input.
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = Self::normalize(raw);
        if normalized.is_empty() {
            return Err(AppError::validation(format!(
                "'{}' does not contain an ISBN",
                raw.trim()
            )));
        }
        Ok(Self(normalized))
    }

    /// Strip every character that is not a decimal digit or `X`.
    pub fn normalize(raw: &str) -> String {
        raw.chars()
            .filter(|c| c.is_ascii_digit() || *c == 'X')
            .collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Isbn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Isbn {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

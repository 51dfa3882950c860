//! License token type.
//!
//! Tokens are opaque to every consumer. Freshly issued tokens are derived
//! from a random UUID v4 and grouped for readability, but any token the
//! authority hands out is accepted as long as it passes the charset check.

use crate::TypeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Maximum accepted token length.
const MAX_TOKEN_LEN: usize = 128;

/// Prefix for tokens issued by [`LicenseToken::generate`].
const TOKEN_PREFIX: &str = "KW";

/// Opaque identifier for one license.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LicenseToken(String);

impl LicenseToken {
    /// Issues a new random token of the form `KW-XXXXX-XXXXX-XXXXX-XXXXX`.
    #[must_use]
    pub fn generate() -> Self {
        let raw = Uuid::new_v4().simple().to_string().to_uppercase();
        let groups: Vec<&str> = (0..4).map(|i| &raw[i * 5..i * 5 + 5]).collect();
        Self(format!("{TOKEN_PREFIX}-{}", groups.join("-")))
    }

    /// Parses a token, trimming surrounding whitespace.
    ///
    /// Accepts ASCII alphanumerics, `-` and `_`; anything else would not
    /// survive a URL path segment unescaped.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(TypeError::InvalidToken("token is empty".to_string()));
        }
        if trimmed.len() > MAX_TOKEN_LEN {
            return Err(TypeError::InvalidToken(format!(
                "token longer than {MAX_TOKEN_LEN} characters"
            )));
        }
        if let Some(bad) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(TypeError::InvalidToken(format!(
                "unexpected character {bad:?}"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LicenseToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LicenseToken {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for LicenseToken {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<LicenseToken> for String {
    fn from(token: LicenseToken) -> Self {
        token.0
    }
}

impl AsRef<str> for LicenseToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

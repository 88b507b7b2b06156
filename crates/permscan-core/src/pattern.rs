//! Site search patterns
//!
//! Grammar (leading/trailing `*` decide the variant, the key is the pattern
//! with every `*` removed):
//!
//! | pattern        | variant               |
//! |----------------|-----------------------|
//! | empty, `*`     | `All`                 |
//! | `*teams*`      | `Contains("teams")`   |
//! | `*/hr`         | `EndsWith("/hr")`     |
//! | `https://x/s*` | `StartsWith(..)`      |
//! | `https://x/*/a`| `Affix { .. }`        |
//! | `a*b*c`        | `Affix { .. }`        |
//! | no `*`         | `Exact(..)`           |

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

const WILDCARD: char = '*';

/// Parsed resource search pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum SearchPattern {
    /// Every resource in the tenant
    All,
    /// Resource id contains the key
    Contains(String),
    /// Resource id ends with the key
    EndsWith(String),
    /// Resource id starts with the key
    StartsWith(String),
    /// Interior wildcards only: id starts with `prefix`, contains each of
    /// `middle` in order after it, and ends with `suffix`
    Affix {
        /// Text before the first `*`
        prefix: String,
        /// Non-empty segments between the first and last `*`
        middle: Vec<String>,
        /// Text after the last `*`
        suffix: String,
    },
    /// Direct single-resource lookup
    Exact(String),
}

impl SearchPattern {
    /// Parse a user-supplied pattern
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.chars().all(|c| c == WILDCARD) {
            return Self::All;
        }

        let key: String = raw.chars().filter(|c| *c != WILDCARD).collect();
        let leading = raw.starts_with(WILDCARD);
        let trailing = raw.ends_with(WILDCARD);

        match (leading, trailing) {
            (true, true) => Self::Contains(key),
            (true, false) => Self::EndsWith(key),
            (false, true) => Self::StartsWith(key),
            (false, false) if raw.contains(WILDCARD) => {
                let mut parts: Vec<&str> = raw.split(WILDCARD).collect();
                let suffix = parts.pop().unwrap_or_default().to_string();
                let prefix = parts.first().copied().unwrap_or_default().to_string();
                let middle = parts
                    .iter()
                    .skip(1)
                    .filter(|p| !p.is_empty())
                    .map(|p| (*p).to_string())
                    .collect();
                Self::Affix {
                    prefix,
                    middle,
                    suffix,
                }
            }
            (false, false) => Self::Exact(raw.to_string()),
        }
    }

    /// True if resolution needs the full tenant listing
    #[inline]
    #[must_use]
    pub fn needs_listing(&self) -> bool {
        !matches!(self, Self::Exact(_))
    }

    /// Check a resource id against the pattern (case-sensitive)
    #[must_use]
    pub fn matches(&self, id: &str) -> bool {
        match self {
            Self::All => true,
            Self::Contains(key) => id.contains(key.as_str()),
            Self::EndsWith(key) => id.ends_with(key.as_str()),
            Self::StartsWith(key) => id.starts_with(key.as_str()),
            Self::Affix {
                prefix,
                middle,
                suffix,
            } => {
                if id.len() < prefix.len() + suffix.len()
                    || !id.starts_with(prefix.as_str())
                    || !id.ends_with(suffix.as_str())
                {
                    return false;
                }
                let mut rest = &id[prefix.len()..id.len() - suffix.len()];
                for segment in middle {
                    match rest.find(segment.as_str()) {
                        Some(at) => rest = &rest[at + segment.len()..],
                        None => return false,
                    }
                }
                true
            }
            Self::Exact(key) => id == key,
        }
    }
}

impl Default for SearchPattern {
    fn default() -> Self {
        Self::All
    }
}

impl FromStr for SearchPattern {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for SearchPattern {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for SearchPattern {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<SearchPattern> for String {
    fn from(p: SearchPattern) -> Self {
        p.to_string()
    }
}

impl fmt::Display for SearchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("*"),
            Self::Contains(key) => write!(f, "*{key}*"),
            Self::EndsWith(key) => write!(f, "*{key}"),
            Self::StartsWith(key) => write!(f, "{key}*"),
            Self::Affix {
                prefix,
                middle,
                suffix,
            } => {
                write!(f, "{prefix}*")?;
                for segment in middle {
                    write!(f, "{segment}*")?;
                }
                f.write_str(suffix)
            }
            Self::Exact(key) => f.write_str(key),
        }
    }
}

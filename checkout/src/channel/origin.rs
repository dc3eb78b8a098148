//! Message origin, the channel's trust boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalised `scheme://host[:port]`
///
/// Scheme and host are case-insensitive and a trailing slash is dropped,
/// so two origins are the same exactly when they compare equal.
///
/// ```
/// use checkout::channel::Origin;
///
/// assert_eq!(Origin::new("HTTP://LocalHost:3000/"), Origin::new("http://localhost:3000"));
/// assert_ne!(Origin::new("http://localhost:3000"), Origin::new("http://localhost:3001"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Origin(String);

impl Origin {
    /// Normalises `raw`
    #[must_use]
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().trim_end_matches('/').to_ascii_lowercase())
    }

    /// Normalised text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Origin {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl From<Origin> for String {
    fn from(origin: Origin) -> Self {
        origin.0
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

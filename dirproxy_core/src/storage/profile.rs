use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Key of a configured directory profile. The empty string is the
/// default (unnamed) profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(String);

impl ProfileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// `None` maps onto the default profile.
    pub fn resolve(id: Option<&str>) -> Self {
        Self(id.unwrap_or_default().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_default(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_default() {
            write!(f, "<default>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<&str> for ProfileId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ProfileId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

fn default_connect_timeout_ms() -> u64 {
    30_000
}

/// How to reach one directory backend as the application's proxy account.
///
/// Stored as JSON, e.g.
/// `{ "id":"corp", "urls":["ldaps://dc1.corp:636"], "proxy_dn":"cn=proxy,o=corp", "search_base":["o=corp"] }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryProfile {
    pub id: ProfileId,
    pub urls: Vec<String>,
    #[serde(default)]
    pub proxy_dn: String,
    #[serde(default)]
    pub search_base: Vec<String>,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl DirectoryProfile {
    pub fn new(id: impl Into<ProfileId>, urls: Vec<String>) -> Self {
        Self {
            id: id.into(),
            urls,
            proxy_dn: String::new(),
            search_base: Vec::new(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }

    /// Returns the unique identifier.
    pub fn id(&self) -> &ProfileId {
        &self.id
    }
}

// ── Registry identity types ──
//
// Every group and rule is keyed either by its server-assigned id or by a
// temporary id allocated while its create request is in flight. The two
// namespaces are separate enum variants, so they can never collide.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

// ── GroupKey ────────────────────────────────────────────────────────

/// Key of a firewall group in the registry.
///
/// Displays as the server id, or `temp-N` for a pending create.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKey {
    Server(String),
    Temp(u64),
}

impl GroupKey {
    pub fn server(id: impl Into<String>) -> Self {
        Self::Server(id.into())
    }

    /// Server id, if this key is persisted.
    pub fn server_id(&self) -> Option<&str> {
        match self {
            Self::Server(id) => Some(id),
            Self::Temp(_) => None,
        }
    }

    pub fn is_temp(&self) -> bool {
        matches!(self, Self::Temp(_))
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(id) => write!(f, "{id}"),
            Self::Temp(n) => write!(f, "temp-{n}"),
        }
    }
}

impl FromStr for GroupKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.strip_prefix("temp-")
            .and_then(|n| n.parse().ok())
            .map_or_else(|| Self::Server(s.to_owned()), Self::Temp))
    }
}

impl From<&str> for GroupKey {
    fn from(s: &str) -> Self {
        Self::Server(s.to_owned())
    }
}

impl Serialize for GroupKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ── RuleKey ─────────────────────────────────────────────────────────

/// Key of a firewall rule within its group.
///
/// Displays as the numeric server id, or `creating-N` for a pending create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleKey {
    Server(u64),
    Temp(u64),
}

impl RuleKey {
    pub fn server_id(self) -> Option<u64> {
        match self {
            Self::Server(id) => Some(id),
            Self::Temp(_) => None,
        }
    }

    pub fn is_temp(self) -> bool {
        matches!(self, Self::Temp(_))
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(id) => write!(f, "{id}"),
            Self::Temp(n) => write!(f, "creating-{n}"),
        }
    }
}

/// Returned when a rule key is neither a number nor `creating-N`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid rule id: {0:?}")]
pub struct ParseRuleKeyError(pub String);

impl FromStr for RuleKey {
    type Err = ParseRuleKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(n) = s.strip_prefix("creating-") {
            return n
                .parse()
                .map(Self::Temp)
                .map_err(|_| ParseRuleKeyError(s.to_owned()));
        }
        s.parse()
            .map(Self::Server)
            .map_err(|_| ParseRuleKeyError(s.to_owned()))
    }
}

impl From<u64> for RuleKey {
    fn from(id: u64) -> Self {
        Self::Server(id)
    }
}

impl Serialize for RuleKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

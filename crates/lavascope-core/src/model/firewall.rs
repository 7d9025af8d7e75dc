// ── Firewall registry entries ──
//
// Wire payloads come straight from `lavascope-api`; the registry wraps
// each one with the lifecycle flags of any in-flight mutation.

use serde::Serialize;

pub use lavascope_api::types::{Group, IpType, Protocol, Rule, RuleAction};

/// In-flight mutation flags of a group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct GroupLifecycle {
    pub creating: bool,
    pub updating: bool,
    pub deleting: bool,
}

impl GroupLifecycle {
    pub fn creating() -> Self {
        Self {
            creating: true,
            ..Self::default()
        }
    }

    /// Any flag set. Reconciliation never removes or overwrites such an entry.
    pub fn in_flight(self) -> bool {
        self.creating || self.updating || self.deleting
    }
}

/// In-flight mutation flags of a rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RuleLifecycle {
    pub creating: bool,
    pub deleting: bool,
}

impl RuleLifecycle {
    pub fn creating() -> Self {
        Self {
            creating: true,
            deleting: false,
        }
    }

    pub fn in_flight(self) -> bool {
        self.creating || self.deleting
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupEntry {
    pub group: Group,
    pub lifecycle: GroupLifecycle,
}

impl GroupEntry {
    /// A settled entry, as inserted by reconciliation or promotion.
    pub fn settled(group: Group) -> Self {
        Self {
            group,
            lifecycle: GroupLifecycle::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleEntry {
    pub rule: Rule,
    pub lifecycle: RuleLifecycle,
}

impl RuleEntry {
    pub fn settled(rule: Rule) -> Self {
        Self {
            rule,
            lifecycle: RuleLifecycle::default(),
        }
    }
}

// ── Domain model ──

pub mod entity_id;
pub mod firewall;

pub use entity_id::{GroupKey, ParseRuleKeyError, RuleKey};
pub use firewall::{
    Group, GroupEntry, GroupLifecycle, IpType, Protocol, Rule, RuleAction, RuleEntry,
    RuleLifecycle,
};

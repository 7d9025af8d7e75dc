// Wire types for the Vultr v2 firewall endpoints.
//
// Field names follow the JSON exactly (snake_case); the response
// envelopes wrap payloads under `firewall_group(s)` / `firewall_rule(s)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Enums ────────────────────────────────────────────────────────────

/// IP family of a firewall rule.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IpType {
    V4,
    V6,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Default,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RuleAction {
    #[default]
    Accept,
    Drop,
}

/// Base protocol understood by the Vultr firewall.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Protocol {
    Icmp,
    Tcp,
    Udp,
    Gre,
    Esp,
    Ah,
}

// ── Entities ─────────────────────────────────────────────────────────

/// Firewall group as returned by `/firewalls`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
    #[serde(default)]
    pub instance_count: u32,
    #[serde(default)]
    pub rule_count: u32,
    #[serde(default)]
    pub max_rule_count: u32,
}

/// Firewall rule as returned by `/firewalls/{id}/rules`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: u64,
    pub ip_type: IpType,
    #[serde(default)]
    pub action: RuleAction,
    pub protocol: Protocol,
    #[serde(default)]
    pub port: String,
    #[serde(default)]
    pub subnet: String,
    #[serde(default)]
    pub subnet_size: u8,
    /// `""`, `"cloudflare"`, or a load balancer id.
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub notes: String,
}

// ── Pagination ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Links {
    #[serde(default)]
    pub next: String,
    #[serde(default)]
    pub prev: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub links: Links,
}

/// A collected listing: every item across all pages plus the last page's meta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: Meta,
}

// ── Response envelopes ───────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ListGroupsResponse {
    #[serde(default)]
    pub firewall_groups: Vec<Group>,
    #[serde(default)]
    pub meta: Meta,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListRulesResponse {
    #[serde(default)]
    pub firewall_rules: Vec<Rule>,
    #[serde(default)]
    pub meta: Meta,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupResponse {
    pub firewall_group: Group,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleResponse {
    pub firewall_rule: Rule,
}

// ── Request bodies ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateGroupRequest {
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateGroupRequest {
    pub description: String,
}

/// Body of `POST /firewalls/{id}/rules`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRuleRequest {
    pub ip_type: IpType,
    pub protocol: Protocol,
    pub subnet: String,
    pub subnet_size: u8,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub port: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
}

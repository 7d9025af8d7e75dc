// ── Editable drafts ──
//
// A group carries an editable description and one new-rule draft per IP
// family. Drafts are stored next to the group entries, keyed the same
// way, and survive reconciliation untouched.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use lavascope_api::types::CreateRuleRequest;

use crate::error::CoreError;
use crate::model::{IpType, Protocol};

// ── Choices ─────────────────────────────────────────────────────────

/// Protocol picked in the rule editor: a raw protocol or a named service.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ProtocolChoice {
    Ssh,
    Http,
    Https,
    #[serde(rename = "http3")]
    #[strum(serialize = "http3")]
    Http3,
    Mysql,
    Postgresql,
    DnsUdp,
    DnsTcp,
    MsRdp,
    Icmp,
    Tcp,
    Udp,
    Gre,
    Esp,
    Ah,
}

impl ProtocolChoice {
    /// Base protocol and default port of a named service.
    pub fn resolve(self) -> (Protocol, Option<&'static str>) {
        match self {
            Self::Ssh => (Protocol::Tcp, Some("22")),
            Self::Http => (Protocol::Tcp, Some("80")),
            Self::Https => (Protocol::Tcp, Some("443")),
            Self::Http3 => (Protocol::Udp, Some("443")),
            Self::Mysql => (Protocol::Tcp, Some("3306")),
            Self::Postgresql => (Protocol::Tcp, Some("5432")),
            Self::DnsUdp => (Protocol::Udp, Some("53")),
            Self::DnsTcp => (Protocol::Tcp, Some("53")),
            Self::MsRdp => (Protocol::Tcp, Some("3389")),
            Self::Icmp => (Protocol::Icmp, None),
            Self::Tcp => (Protocol::Tcp, None),
            Self::Udp => (Protocol::Udp, None),
            Self::Gre => (Protocol::Gre, None),
            Self::Esp => (Protocol::Esp, None),
            Self::Ah => (Protocol::Ah, None),
        }
    }
}

/// Where rule traffic may originate.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SourceType {
    Anywhere,
    MyIp,
    Custom,
    Cloudflare,
    LoadBalancer,
}

// ── RuleDraft ───────────────────────────────────────────────────────

/// The new-rule form for one IP family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDraft {
    pub ip_type: IpType,
    pub protocol: ProtocolChoice,
    /// Explicit port; empty means the service default.
    pub port: String,
    pub source_type: SourceType,
    /// Free text whose meaning depends on `source_type`: `address[/mask]`
    /// for custom and my-ip, a load balancer id for load-balancer.
    pub source_text: String,
    pub notes: String,
}

impl RuleDraft {
    /// The blank form: SSH from anywhere.
    pub fn initial(ip_type: IpType) -> Self {
        let anywhere = match ip_type {
            IpType::V4 => "0.0.0.0/0",
            IpType::V6 => "::/0",
        };
        Self {
            ip_type,
            protocol: ProtocolChoice::Ssh,
            port: "22".into(),
            source_type: SourceType::Anywhere,
            source_text: anywhere.into(),
            notes: String::new(),
        }
    }

    /// Translate the form into a wire request. Nothing is sent on error.
    pub fn to_create_rule(&self) -> Result<CreateRuleRequest, CoreError> {
        let (protocol, default_port) = self.protocol.resolve();
        let port = match self.port.trim() {
            "" => default_port.unwrap_or_default().to_owned(),
            explicit => explicit.to_owned(),
        };

        let (subnet, subnet_size, source) = match self.source_type {
            SourceType::Anywhere => {
                let unspecified = match self.ip_type {
                    IpType::V4 => "0.0.0.0",
                    IpType::V6 => "::",
                };
                (unspecified.to_owned(), 0, String::new())
            }
            SourceType::Cloudflare => (String::new(), 0, "cloudflare".to_owned()),
            SourceType::LoadBalancer => {
                let id = self.source_text.trim();
                if id.is_empty() {
                    return Err(CoreError::validation("load balancer id is required"));
                }
                (String::new(), 0, id.to_owned())
            }
            SourceType::Custom | SourceType::MyIp => {
                let (addr, mask) = parse_subnet(self.ip_type, &self.source_text)?;
                (addr, mask, String::new())
            }
        };

        Ok(CreateRuleRequest {
            ip_type: self.ip_type,
            protocol,
            subnet,
            subnet_size,
            port,
            source,
            notes: self.notes.clone(),
        })
    }
}

/// Parse `address[/mask]`; a missing mask means a single host.
fn parse_subnet(ip_type: IpType, text: &str) -> Result<(String, u8), CoreError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CoreError::validation("source address is required"));
    }

    let max_mask: u8 = match ip_type {
        IpType::V4 => 32,
        IpType::V6 => 128,
    };
    let (addr, mask) = match text.split_once('/') {
        None => (text, max_mask),
        Some((addr, raw)) => {
            let mask = raw
                .trim()
                .parse::<u8>()
                .map_err(|_| CoreError::validation(format!("Invalid subnet size: {raw}")))?;
            (addr.trim(), mask)
        }
    };

    let parsed: IpAddr = addr
        .parse()
        .map_err(|_| CoreError::validation(format!("Invalid address: {addr}")))?;
    let family_ok = matches!(
        (ip_type, parsed),
        (IpType::V4, IpAddr::V4(_)) | (IpType::V6, IpAddr::V6(_))
    );
    if !family_ok {
        return Err(CoreError::validation(format!(
            "{addr} is not an {ip_type} address"
        )));
    }
    if mask > max_mask {
        return Err(CoreError::validation(format!(
            "Invalid subnet size: {mask} (max {max_mask})"
        )));
    }

    Ok((addr.to_owned(), mask))
}

// ── Drafts per group ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleDrafts {
    pub v4: RuleDraft,
    pub v6: RuleDraft,
}

impl Default for RuleDrafts {
    fn default() -> Self {
        Self {
            v4: RuleDraft::initial(IpType::V4),
            v6: RuleDraft::initial(IpType::V6),
        }
    }
}

impl RuleDrafts {
    pub fn get(&self, ip_type: IpType) -> &RuleDraft {
        match ip_type {
            IpType::V4 => &self.v4,
            IpType::V6 => &self.v6,
        }
    }

    pub fn get_mut(&mut self, ip_type: IpType) -> &mut RuleDraft {
        match ip_type {
            IpType::V4 => &mut self.v4,
            IpType::V6 => &mut self.v6,
        }
    }
}

/// Editable state of one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupDrafts {
    pub description: String,
    pub rules: RuleDrafts,
}

impl GroupDrafts {
    pub fn for_description(description: &str) -> Self {
        Self {
            description: description.to_owned(),
            rules: RuleDrafts::default(),
        }
    }
}

// ── Display ─────────────────────────────────────────────────────────

/// Friendly label for a stored rule's protocol and port.
pub fn protocol_label(protocol: Protocol, port: &str) -> String {
    if port == "53" {
        return "DNS".into();
    }
    let named = match (protocol, port) {
        (Protocol::Tcp, "22") => Some("SSH"),
        (Protocol::Tcp, "80") => Some("HTTP"),
        (Protocol::Tcp, "443") => Some("HTTPS"),
        (Protocol::Tcp, "3306") => Some("MySQL"),
        (Protocol::Tcp, "5432") => Some("PostgreSQL"),
        (Protocol::Tcp, "3389") => Some("MS RDP"),
        (Protocol::Udp, "443") => Some("HTTP3"),
        _ => None,
    };
    named.map_or_else(|| protocol.to_string().to_uppercase(), str::to_owned)
}

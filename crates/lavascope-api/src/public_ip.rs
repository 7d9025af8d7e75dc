// Public-IP discovery: race several plain-text "what is my IP" endpoints.
//
// Every endpoint is queried concurrently; the first valid answer wins and
// the remaining in-flight requests are dropped (which cancels them).

use std::net::IpAddr;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::Error;
use crate::types::IpType;

pub const DEFAULT_IPV4_ENDPOINTS: &[&str] = &[
    "https://api.ipify.org",
    "https://ipv4.seeip.org",
    "https://ipv4.ip.sb",
    "https://4.ipw.cn",
];

pub const DEFAULT_IPV6_ENDPOINTS: &[&str] = &[
    "https://api6.ipify.org",
    "https://ipv6.seeip.org",
    "https://ipv6.ip.sb",
    "https://6.ipw.cn",
];

/// Built-in endpoint list for an address family.
pub fn default_endpoints(family: IpType) -> Vec<String> {
    let list = match family {
        IpType::V4 => DEFAULT_IPV4_ENDPOINTS,
        IpType::V6 => DEFAULT_IPV6_ENDPOINTS,
    };
    list.iter().map(|s| (*s).to_owned()).collect()
}

/// The winning answer and which endpoint produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedAddress {
    pub value: IpAddr,
    pub source: String,
}

impl ResolvedAddress {
    pub fn ip_type(&self) -> IpType {
        match self.value {
            IpAddr::V4(_) => IpType::V4,
            IpAddr::V6(_) => IpType::V6,
        }
    }
}

/// Why a single endpoint lost the race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointFailure {
    pub endpoint: String,
    pub reason: String,
}

/// Race every endpoint; return the first trimmed body that parses as an IP.
///
/// Each request is bound to `timeout` on its own. When every endpoint fails
/// the error lists all of them, in completion order.
pub async fn resolve(
    http: &reqwest::Client,
    endpoints: &[String],
    timeout: Duration,
) -> Result<ResolvedAddress, Error> {
    let mut tasks: FuturesUnordered<_> = endpoints
        .iter()
        .map(|endpoint| async move {
            info!("fetching public address from {endpoint}");
            let outcome = tokio::time::timeout(timeout, fetch_one(http, endpoint)).await;
            let result = match outcome {
                Ok(inner) => inner,
                Err(_) => Err(format!(
                    "timed out after {}ms",
                    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
                )),
            };
            (endpoint.as_str(), result)
        })
        .collect();

    let mut failures = Vec::new();
    while let Some((endpoint, result)) = tasks.next().await {
        match result {
            Ok(value) => {
                debug!(
                    endpoint,
                    pending = tasks.len(),
                    "public address resolved; dropping remaining requests"
                );
                return Ok(ResolvedAddress {
                    value,
                    source: endpoint.to_owned(),
                });
            }
            Err(reason) => {
                warn!("{endpoint} failed: {reason}");
                failures.push(EndpointFailure {
                    endpoint: endpoint.to_owned(),
                    reason,
                });
            }
        }
    }

    Err(Error::AllEndpointsFailed { failures })
}

async fn fetch_one(http: &reqwest::Client, endpoint: &str) -> Result<IpAddr, String> {
    let resp = http.get(endpoint).send().await.map_err(|e| e.to_string())?;
    let status = resp.status();
    if !status.is_success() {
        return Err(format!("HTTP {status}"));
    }
    let body = resp.text().await.map_err(|e| e.to_string())?;
    let text = body.trim();
    if text.is_empty() {
        return Err("empty response".into());
    }
    text.parse::<IpAddr>()
        .map_err(|_| format!("not an IP address: {text:?}"))
}

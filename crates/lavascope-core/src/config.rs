// ── Runtime connection configuration ──
//
// Describes how to reach the Vultr API. Carries the credential and
// tuning knobs, never touches disk. The CLI builds a `ControllerConfig`
// from its profile and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

/// Configuration for one Vultr account.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// API base URL (e.g., `https://api.vultr.com/v2`).
    pub base_url: Url,
    /// Bearer token. `None` makes every remote call fail with an auth error.
    pub api_key: Option<SecretString>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Background refresh period. Zero disables it.
    pub refresh_interval: Duration,
    /// Optional outbound proxy.
    pub proxy: Option<Url>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(lavascope_api::client::DEFAULT_BASE_URL)
                .expect("default base URL is valid"),
            api_key: None,
            timeout: lavascope_api::transport::DEFAULT_TIMEOUT,
            refresh_interval: Duration::from_secs(60),
            proxy: None,
        }
    }
}

impl ControllerConfig {
    /// Transport settings shared by the API client and the public-IP resolver.
    pub fn transport(&self) -> lavascope_api::TransportConfig {
        lavascope_api::TransportConfig::default()
            .with_timeout(self.timeout)
            .with_proxy(self.proxy.clone())
    }
}

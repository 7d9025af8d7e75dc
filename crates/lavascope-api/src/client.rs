// Hand-crafted async HTTP client for the Vultr v2 firewall API.
//
// Base URL: https://api.vultr.com/v2/
// Auth: Authorization: Bearer <token>

use std::future::Future;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::Error;
use crate::transport::TransportConfig;
use crate::types;

/// Default Vultr API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.vultr.com/v2";

/// Page size requested from list endpoints.
const PER_PAGE: u32 = 100;

// ── Error response shape from the Vultr API ──────────────────────────

#[derive(serde::Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the Vultr firewall endpoints.
///
/// The API token is attached per request. A client without a token can be
/// built, but every call fails with [`Error::MissingApiKey`] before any
/// network traffic happens.
pub struct VultrClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<SecretString>,
    timeout: Duration,
}

impl VultrClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from a base URL, optional token and transport config.
    pub fn new(
        base_url: &str,
        api_key: Option<SecretString>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Self::with_client(base_url, api_key, http, transport.timeout)
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn with_client(
        base_url: &str,
        api_key: Option<SecretString>,
        http: reqwest::Client,
        timeout: Duration,
    ) -> Result<Self, Error> {
        Ok(Self {
            http,
            base_url: Self::normalize_base_url(base_url)?,
            api_key,
            timeout,
        })
    }

    /// Ensure the base URL ends with `/` so relative joins keep the `/v2` path.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        let path = url.path().trim_end_matches('/').to_owned();
        url.set_path(&format!("{path}/"));
        Ok(url)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_ref()
            .is_some_and(|k| !k.expose_secret().is_empty())
    }

    // ── URL builder ──────────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    // ── Request plumbing ─────────────────────────────────────────────

    /// Start an authenticated request. Fails locally when no token is set.
    fn request(&self, method: reqwest::Method, path: &str) -> Result<reqwest::RequestBuilder, Error> {
        let token = self
            .api_key
            .as_ref()
            .map(ExposeSecret::expose_secret)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::MissingApiKey {
                endpoint: format!("/{path}"),
            })?;

        let url = self.url(path)?;
        debug!("{method} {url}");

        Ok(self
            .http
            .request(method, url)
            .bearer_auth(token)
            .timeout(self.timeout))
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, Error> {
        req.send().await.map_err(|e| self.map_transport(e))
    }

    fn map_transport(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout {
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else {
            Error::Transport(e)
        }
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let req = self.request(reqwest::Method::GET, path)?;
        let resp = self.send(req).await?;
        self.handle_response(resp).await
    }

    async fn get_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, Error> {
        let req = self.request(reqwest::Method::GET, path)?.query(params);
        let resp = self.send(req).await?;
        self.handle_response(resp).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let req = self.request(reqwest::Method::POST, path)?.json(body);
        let resp = self.send(req).await?;
        self.handle_response(resp).await
    }

    async fn put_no_response<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<(), Error> {
        let req = self.request(reqwest::Method::PUT, path)?.json(body);
        let resp = self.send(req).await?;
        self.handle_empty(resp).await
    }

    async fn delete(&self, path: &str) -> Result<(), Error> {
        let req = self.request(reqwest::Method::DELETE, path)?;
        let resp = self.send(req).await?;
        self.handle_empty(resp).await
    }

    // ── Response handling ────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await.map_err(|e| self.map_transport(e))?;
            serde_json::from_str(&body).map_err(|e| {
                let preview: String = body.chars().take(200).collect();
                Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body,
                }
            })
        } else {
            Err(Self::parse_error(status, resp).await)
        }
    }

    async fn handle_empty(&self, resp: reqwest::Response) -> Result<(), Error> {
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::parse_error(status, resp).await)
        }
    }

    /// `{"error": "..."}` supplies the message; otherwise the reason phrase.
    async fn parse_error(status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
        let raw = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&raw)
            .ok()
            .and_then(|e| e.error)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_owned());

        Error::Http {
            status: status.as_u16(),
            message,
        }
    }

    // ── Pagination helper ────────────────────────────────────────────

    /// Follow `meta.links.next` cursors until exhausted, collecting every item.
    ///
    /// Stops on an empty or repeated cursor so a misbehaving server cannot
    /// loop forever.
    pub async fn paginate_all<T, F, Fut>(&self, fetch: F) -> Result<types::Page<T>, Error>
    where
        F: Fn(Option<String>) -> Fut,
        Fut: Future<Output = Result<(Vec<T>, types::Meta), Error>>,
    {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let (page, meta) = fetch(cursor.clone()).await?;
            items.extend(page);

            let next = meta.links.next.clone();
            if next.is_empty() || cursor.as_deref() == Some(next.as_str()) {
                return Ok(types::Page { items, meta });
            }
            cursor = Some(next);
        }
    }

    fn page_params(cursor: Option<String>) -> Vec<(&'static str, String)> {
        let mut params = vec![("per_page", PER_PAGE.to_string())];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor));
        }
        params
    }

    // ━━ Public API ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    // ── Groups ───────────────────────────────────────────────────────

    pub async fn list_groups_page(
        &self,
        cursor: Option<String>,
    ) -> Result<types::ListGroupsResponse, Error> {
        self.get_with_params("firewalls", &Self::page_params(cursor))
            .await
    }

    /// Every firewall group on the account, across all pages.
    pub async fn list_groups(&self) -> Result<types::Page<types::Group>, Error> {
        self.paginate_all(|cursor| async move {
            let resp = self.list_groups_page(cursor).await?;
            Ok((resp.firewall_groups, resp.meta))
        })
        .await
    }

    pub async fn get_group(&self, group_id: &str) -> Result<types::Group, Error> {
        let resp: types::GroupResponse = self.get(&format!("firewalls/{group_id}")).await?;
        Ok(resp.firewall_group)
    }

    pub async fn create_group(&self, description: &str) -> Result<types::Group, Error> {
        let body = types::CreateGroupRequest {
            description: description.to_owned(),
        };
        let resp: types::GroupResponse = self.post("firewalls", &body).await?;
        Ok(resp.firewall_group)
    }

    pub async fn update_group(&self, group_id: &str, description: &str) -> Result<(), Error> {
        let body = types::UpdateGroupRequest {
            description: description.to_owned(),
        };
        self.put_no_response(&format!("firewalls/{group_id}"), &body)
            .await
    }

    pub async fn delete_group(&self, group_id: &str) -> Result<(), Error> {
        self.delete(&format!("firewalls/{group_id}")).await
    }

    // ── Rules ────────────────────────────────────────────────────────

    pub async fn list_rules_page(
        &self,
        group_id: &str,
        cursor: Option<String>,
    ) -> Result<types::ListRulesResponse, Error> {
        self.get_with_params(
            &format!("firewalls/{group_id}/rules"),
            &Self::page_params(cursor),
        )
        .await
    }

    /// Every rule of one group, across all pages.
    pub async fn list_rules(&self, group_id: &str) -> Result<types::Page<types::Rule>, Error> {
        self.paginate_all(|cursor| async move {
            let resp = self.list_rules_page(group_id, cursor).await?;
            Ok((resp.firewall_rules, resp.meta))
        })
        .await
    }

    pub async fn get_rule(&self, group_id: &str, rule_id: u64) -> Result<types::Rule, Error> {
        let resp: types::RuleResponse = self
            .get(&format!("firewalls/{group_id}/rules/{rule_id}"))
            .await?;
        Ok(resp.firewall_rule)
    }

    pub async fn create_rule(
        &self,
        group_id: &str,
        request: &types::CreateRuleRequest,
    ) -> Result<types::Rule, Error> {
        let resp: types::RuleResponse = self
            .post(&format!("firewalls/{group_id}/rules"), request)
            .await?;
        Ok(resp.firewall_rule)
    }

    pub async fn delete_rule(&self, group_id: &str, rule_id: u64) -> Result<(), Error> {
        self.delete(&format!("firewalls/{group_id}/rules/{rule_id}"))
            .await
    }
}

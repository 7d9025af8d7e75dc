// ── Controller facade ──
//
// Owns the registry, the remote service and the mutation coordinator.
// Runs explicit refreshes, the optional periodic refresh task, and vends
// registry subscriptions.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use lavascope_api::VultrClient;

use crate::config::ControllerConfig;
use crate::error::CoreError;
use crate::model::{GroupEntry, GroupKey, RuleEntry, RuleKey};
use crate::mutation::MutationCoordinator;
use crate::notify::Notifier;
use crate::remote::{self, FirewallService};
use crate::store::{ReconcileReport, Registry, RegistrySnapshot};
use crate::stream::RegistryStream;

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`.
pub struct Controller<S = VultrClient> {
    inner: Arc<ControllerInner<S>>,
}

impl<S> Clone for Controller<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ControllerInner<S> {
    service: Arc<S>,
    registry: Arc<Registry>,
    mutations: MutationCoordinator<S>,
    request_timeout: Duration,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Controller<VultrClient> {
    /// Build a controller talking to the Vultr API and start the periodic
    /// refresh when `config.refresh_interval` is non-zero.
    pub async fn new(
        config: &ControllerConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, CoreError> {
        let client = VultrClient::new(
            config.base_url.as_str(),
            config.api_key.clone(),
            &config.transport(),
        )?;
        let controller = Self::with_service(client, notifier, config.timeout);
        controller.spawn_refresh(config.refresh_interval).await;
        Ok(controller)
    }
}

impl<S: FirewallService> Controller<S> {
    /// Build a controller around any firewall service.
    pub fn with_service(
        service: S,
        notifier: Arc<dyn Notifier>,
        request_timeout: Duration,
    ) -> Self {
        let service = Arc::new(service);
        let registry = Arc::new(Registry::new());
        let cancel = CancellationToken::new();
        let mutations = MutationCoordinator::new(
            Arc::clone(&service),
            Arc::clone(&registry),
            notifier,
            request_timeout,
            cancel.child_token(),
        );

        Self {
            inner: Arc::new(ControllerInner {
                service,
                registry,
                mutations,
                request_timeout,
                cancel,
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }

    pub fn service(&self) -> &Arc<S> {
        &self.inner.service
    }

    pub fn mutations(&self) -> &MutationCoordinator<S> {
        &self.inner.mutations
    }

    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.inner.registry.snapshot()
    }

    pub fn subscribe(&self) -> RegistryStream {
        self.inner.registry.subscribe()
    }

    // ── Refresh ──────────────────────────────────────────────────

    /// Fetch the group list and merge it. On failure the registry is untouched.
    pub async fn refresh_groups(&self) -> Result<ReconcileReport, CoreError> {
        let page = self.remote(self.inner.service.list_groups()).await?;
        Ok(self.inner.registry.reconcile_groups(page.items))
    }

    /// Fetch one group's rules and merge them. Placeholders have no rules to fetch.
    pub async fn refresh_rules(&self, group: &GroupKey) -> Result<ReconcileReport, CoreError> {
        let Some(id) = group.server_id() else {
            return Ok(ReconcileReport::default());
        };
        let page = self.remote(self.inner.service.list_rules(id)).await?;
        Ok(self.inner.registry.reconcile_rules(group, page.items))
    }

    /// Fetch a single group and merge it without touching other entries.
    pub async fn fetch_group(&self, key: &GroupKey) -> Result<GroupEntry, CoreError> {
        if let Some(id) = key.server_id() {
            let group = self
                .remote(self.inner.service.get_group(id))
                .await
                .map_err(|e| not_found_on_404(e, "group", key.to_string()))?;
            self.inner.registry.merge_group(group);
        }
        self.snapshot()
            .group(key)
            .cloned()
            .ok_or_else(|| CoreError::NotFound {
                entity: "group",
                key: key.to_string(),
            })
    }

    /// Fetch a single rule of a known group and merge it.
    pub async fn fetch_rule(&self, group: &GroupKey, rule: RuleKey) -> Result<RuleEntry, CoreError> {
        if let (Some(group_id), Some(rule_id)) = (group.server_id(), rule.server_id()) {
            let fetched = self
                .remote(self.inner.service.get_rule(group_id, rule_id))
                .await
                .map_err(|e| not_found_on_404(e, "rule", rule.to_string()))?;
            self.inner.registry.merge_rule(group, fetched);
        }
        self.snapshot()
            .rule(group, rule)
            .cloned()
            .ok_or_else(|| CoreError::NotFound {
                entity: "rule",
                key: rule.to_string(),
            })
    }

    /// Refresh groups, then the rules of every persisted group.
    ///
    /// A failed group fetch aborts; failed rule fetches are logged and skipped.
    pub async fn refresh_all(&self) -> Result<ReconcileReport, CoreError> {
        let mut report = self.refresh_groups().await?;

        let keys: Vec<GroupKey> = self
            .snapshot()
            .groups()
            .keys()
            .filter(|k| !k.is_temp())
            .cloned()
            .collect();

        for key in keys {
            match self.refresh_rules(&key).await {
                Ok(r) => report.absorb(r),
                Err(e) => warn!(group = %key, error = %e, "rule refresh failed"),
            }
        }

        debug!(?report, "full refresh complete");
        Ok(report)
    }

    /// Start the periodic refresh task. Zero disables it.
    pub async fn spawn_refresh(&self, interval: Duration) {
        if interval.is_zero() {
            return;
        }
        let handle = tokio::spawn(refresh_task(
            self.clone(),
            interval,
            self.inner.cancel.child_token(),
        ));
        self.inner.task_handles.lock().await.push(handle);
    }

    async fn remote<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, lavascope_api::Error>>,
    ) -> Result<T, CoreError> {
        remote::bounded(call, self.inner.request_timeout, &self.inner.cancel).await
    }

    /// Cancel background tasks and in-flight remote calls, then join the tasks.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("controller shut down");
    }
}

fn not_found_on_404(err: CoreError, entity: &'static str, key: String) -> CoreError {
    match err {
        CoreError::Http { status: 404, .. } => CoreError::NotFound { entity, key },
        other => other,
    }
}

// ── Background tasks ─────────────────────────────────────────────

async fn refresh_task<S: FirewallService>(
    controller: Controller<S>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(interval);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = controller.refresh_all().await {
                    warn!(error = %e, "periodic refresh failed");
                }
            }
        }
    }
}

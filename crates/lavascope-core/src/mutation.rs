// ── Mutation coordinator ──
//
// Drives create / update / delete against the remote service. Each
// mutation writes its optimistic state to the registry first, then again
// when the remote call settles: promotion on create success, removal on
// delete success, rollback on any failure. A second mutation on an entity
// that is already busy is rejected before any remote call.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::draft::RuleDraft;
use crate::error::CoreError;
use crate::model::{Group, GroupKey, Rule, RuleAction, RuleKey};
use crate::notify::Notifier;
use crate::remote::{self, FirewallService};
use crate::store::{Claim, GroupOp, Registry};

pub struct MutationCoordinator<S> {
    service: Arc<S>,
    registry: Arc<Registry>,
    notifier: Arc<dyn Notifier>,
    request_timeout: Duration,
    cancel: CancellationToken,
}

impl<S: FirewallService> MutationCoordinator<S> {
    pub fn new(
        service: Arc<S>,
        registry: Arc<Registry>,
        notifier: Arc<dyn Notifier>,
        request_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            service,
            registry,
            notifier,
            request_timeout,
            cancel,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    // ── Groups ───────────────────────────────────────────────────────

    /// Create a group behind a `temp-N` placeholder.
    pub async fn create_group(&self, description: &str) -> Result<Group, CoreError> {
        let temp = self.registry.begin_group_create(description);
        debug!(key = %temp, "group placeholder inserted");

        match self.remote(self.service.create_group(description)).await {
            Ok(group) => {
                let key = self.registry.promote_group(&temp, group.clone());
                info!(%key, "group created");
                self.notifier
                    .success(&format!("Created group {}", display_name(&group)));
                Ok(group)
            }
            Err(e) => {
                self.registry.remove_group(&temp);
                self.notifier.failure("Failed to create group", &e);
                Err(e)
            }
        }
    }

    /// Change a group's description. Applied locally once the server accepts it.
    pub async fn update_group(&self, key: &GroupKey, description: &str) -> Result<(), CoreError> {
        let id = self.claim_group(key, GroupOp::Update)?;

        match self.remote(self.service.update_group(id, description)).await {
            Ok(()) => {
                self.registry.patch_group(key, |entry| {
                    description.clone_into(&mut entry.group.description);
                    entry.lifecycle.updating = false;
                });
                info!(%key, "group updated");
                self.notifier.success(&format!("Updated group {key}"));
                Ok(())
            }
            Err(e) => {
                self.registry
                    .patch_group_lifecycle(key, |l| GroupOp::Update.release(l));
                self.notifier.failure("Failed to update group", &e);
                Err(e)
            }
        }
    }

    pub async fn delete_group(&self, key: &GroupKey) -> Result<(), CoreError> {
        let id = self.claim_group(key, GroupOp::Delete)?;

        match self.remote(self.service.delete_group(id)).await {
            Ok(()) => {
                self.registry.remove_group(key);
                info!(%key, "group deleted");
                self.notifier.success(&format!("Deleted group {key}"));
                Ok(())
            }
            Err(e) => {
                self.registry
                    .patch_group_lifecycle(key, |l| GroupOp::Delete.release(l));
                self.notifier.failure("Failed to delete group", &e);
                Err(e)
            }
        }
    }

    // ── Rules ────────────────────────────────────────────────────────

    /// Create a rule from a draft behind a `creating-N` placeholder.
    ///
    /// The group's draft for the rule's IP family is reset as soon as the
    /// request is dispatched and is not restored if the create fails.
    pub async fn create_rule(&self, group: &GroupKey, draft: &RuleDraft) -> Result<Rule, CoreError> {
        let request = draft.to_create_rule()?;
        let placeholder = Rule {
            id: 0,
            ip_type: request.ip_type,
            action: RuleAction::Accept,
            protocol: request.protocol,
            port: request.port.clone(),
            subnet: request.subnet.clone(),
            subnet_size: request.subnet_size,
            source: request.source.clone(),
            notes: request.notes.clone(),
        };

        let temp = self
            .registry
            .begin_rule_create(group, placeholder)
            .map_err(|claim| rejection(claim, "group", group.to_string(), "add rules to"))?;
        let Some(group_id) = group.server_id() else {
            self.registry.remove_rule(group, temp);
            return Err(conflict("group", group.to_string(), "add rules to"));
        };
        debug!(%group, rule = %temp, "rule placeholder inserted");

        match self.remote(self.service.create_rule(group_id, &request)).await {
            Ok(rule) => {
                let key = self.registry.promote_rule(group, temp, rule.clone());
                info!(%group, rule = %key, "rule created");
                self.notifier
                    .success(&format!("Created rule {key} in group {group}"));
                Ok(rule)
            }
            Err(e) => {
                self.registry.remove_rule(group, temp);
                self.notifier.failure("Failed to create rule", &e);
                Err(e)
            }
        }
    }

    pub async fn delete_rule(&self, group: &GroupKey, rule: RuleKey) -> Result<(), CoreError> {
        match self.registry.claim_rule_delete(group, rule) {
            Claim::Claimed => {}
            other => return Err(rejection(other, "rule", rule.to_string(), "delete")),
        }
        let (Some(group_id), Some(rule_id)) = (group.server_id(), rule.server_id()) else {
            self.registry
                .patch_rule_lifecycle(group, rule, |l| l.deleting = false);
            return Err(conflict("rule", rule.to_string(), "delete"));
        };

        match self.remote(self.service.delete_rule(group_id, rule_id)).await {
            Ok(()) => {
                self.registry.remove_rule(group, rule);
                info!(%group, %rule, "rule deleted");
                self.notifier
                    .success(&format!("Deleted rule {rule} from group {group}"));
                Ok(())
            }
            Err(e) => {
                self.registry
                    .patch_rule_lifecycle(group, rule, |l| l.deleting = false);
                self.notifier.failure("Failed to delete rule", &e);
                Err(e)
            }
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────

    /// Set the group's flag for `op`; returns the server id on success.
    fn claim_group<'k>(&self, key: &'k GroupKey, op: GroupOp) -> Result<&'k str, CoreError> {
        let operation = match op {
            GroupOp::Update => "update",
            GroupOp::Delete => "delete",
        };
        match self.registry.claim_group(key, op) {
            Claim::Claimed => {}
            other => return Err(rejection(other, "group", key.to_string(), operation)),
        }
        // Placeholders are always creating, so a claimed key is persisted
        key.server_id().ok_or_else(|| {
            self.registry.patch_group_lifecycle(key, |l| op.release(l));
            conflict("group", key.to_string(), operation)
        })
    }

    async fn remote<T>(
        &self,
        call: impl Future<Output = Result<T, lavascope_api::Error>>,
    ) -> Result<T, CoreError> {
        remote::bounded(call, self.request_timeout, &self.cancel).await
    }
}

fn display_name(group: &Group) -> &str {
    if group.description.is_empty() {
        &group.id
    } else {
        &group.description
    }
}

fn conflict(entity: &'static str, key: String, operation: &'static str) -> CoreError {
    CoreError::Conflict {
        entity,
        key,
        operation,
    }
}

fn rejection(claim: Claim, entity: &'static str, key: String, operation: &'static str) -> CoreError {
    match claim {
        Claim::Missing => CoreError::NotFound { entity, key },
        Claim::Busy | Claim::Claimed => conflict(entity, key, operation),
    }
}

// ── Remote firewall capability ──
//
// The coordinator and controller talk to the API through this trait, so
// tests can substitute an in-memory service for `VultrClient`.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use lavascope_api::types::{CreateRuleRequest, Group, Page, Rule};
use lavascope_api::{Error, VultrClient};

use crate::error::{CoreError, TransportKind};

/// Run a remote call bound to `timeout` and to `cancel`. Cancellation wins
/// over a response that is ready in the same poll.
pub(crate) async fn bounded<T>(
    call: impl Future<Output = Result<T, Error>>,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<T, CoreError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(CoreError::from(Error::Aborted)),
        outcome = tokio::time::timeout(timeout, call) => match outcome {
            Ok(result) => result.map_err(CoreError::from),
            Err(_) => Err(CoreError::Transport {
                kind: TransportKind::Timeout,
                message: format!("no response after {}ms", timeout.as_millis()),
            }),
        },
    }
}

/// Firewall operations the engine needs from a remote service.
pub trait FirewallService: Send + Sync + 'static {
    fn list_groups(&self) -> impl Future<Output = Result<Page<Group>, Error>> + Send;

    fn get_group(&self, group_id: &str) -> impl Future<Output = Result<Group, Error>> + Send;

    fn create_group(&self, description: &str)
    -> impl Future<Output = Result<Group, Error>> + Send;

    fn update_group(
        &self,
        group_id: &str,
        description: &str,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    fn delete_group(&self, group_id: &str) -> impl Future<Output = Result<(), Error>> + Send;

    fn list_rules(&self, group_id: &str)
    -> impl Future<Output = Result<Page<Rule>, Error>> + Send;

    fn get_rule(
        &self,
        group_id: &str,
        rule_id: u64,
    ) -> impl Future<Output = Result<Rule, Error>> + Send;

    fn create_rule(
        &self,
        group_id: &str,
        request: &CreateRuleRequest,
    ) -> impl Future<Output = Result<Rule, Error>> + Send;

    fn delete_rule(
        &self,
        group_id: &str,
        rule_id: u64,
    ) -> impl Future<Output = Result<(), Error>> + Send;
}

impl FirewallService for VultrClient {
    fn list_groups(&self) -> impl Future<Output = Result<Page<Group>, Error>> + Send {
        VultrClient::list_groups(self)
    }

    fn get_group(&self, group_id: &str) -> impl Future<Output = Result<Group, Error>> + Send {
        VultrClient::get_group(self, group_id)
    }

    fn create_group(
        &self,
        description: &str,
    ) -> impl Future<Output = Result<Group, Error>> + Send {
        VultrClient::create_group(self, description)
    }

    fn update_group(
        &self,
        group_id: &str,
        description: &str,
    ) -> impl Future<Output = Result<(), Error>> + Send {
        VultrClient::update_group(self, group_id, description)
    }

    fn delete_group(&self, group_id: &str) -> impl Future<Output = Result<(), Error>> + Send {
        VultrClient::delete_group(self, group_id)
    }

    fn list_rules(&self, group_id: &str) -> impl Future<Output = Result<Page<Rule>, Error>> + Send {
        VultrClient::list_rules(self, group_id)
    }

    fn get_rule(
        &self,
        group_id: &str,
        rule_id: u64,
    ) -> impl Future<Output = Result<Rule, Error>> + Send {
        VultrClient::get_rule(self, group_id, rule_id)
    }

    fn create_rule(
        &self,
        group_id: &str,
        request: &CreateRuleRequest,
    ) -> impl Future<Output = Result<Rule, Error>> + Send {
        VultrClient::create_rule(self, group_id, request)
    }

    fn delete_rule(
        &self,
        group_id: &str,
        rule_id: u64,
    ) -> impl Future<Output = Result<(), Error>> + Send {
        VultrClient::delete_rule(self, group_id, rule_id)
    }
}

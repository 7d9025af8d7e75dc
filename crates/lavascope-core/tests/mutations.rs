#![allow(clippy::unwrap_used)]
// Coordinator and controller behaviour against an in-memory firewall service.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::TimeZone;
use pretty_assertions::assert_eq;
use tokio::sync::Notify;

use lavascope_api::Error;
use lavascope_api::types::{CreateRuleRequest, Meta, Page};
use lavascope_core::{
    Controller, CoreError, ErrorClass, FirewallService, Group, GroupKey, IpType, Notifier,
    ProtocolChoice, RegistrySnapshot, RegistryStream, Rule, RuleAction, RuleDraft, RuleKey,
    SourceType, TransportKind,
};

// ── Fake service ────────────────────────────────────────────────────

#[derive(Default)]
struct FakeService {
    groups: Mutex<Vec<Group>>,
    rules: Mutex<HashMap<String, Vec<Rule>>>,
    /// When set, every mutation fails with this HTTP status and message.
    fail: Mutex<Option<(u16, String)>>,
    /// When set, every mutation waits for a permit before answering.
    gate: Option<Arc<Notify>>,
    /// When set, list calls never answer.
    stall_lists: bool,
    mutation_calls: AtomicUsize,
    next_group: AtomicU64,
    next_rule: AtomicU64,
}

impl FakeService {
    fn gated() -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let service = Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::default()
        };
        (service, gate)
    }

    fn with_group(self, id: &str, description: &str) -> Self {
        self.groups.lock().unwrap().push(group(id, description));
        self
    }

    fn with_rules(self, group_id: &str, rules: Vec<Rule>) -> Self {
        self.rules.lock().unwrap().insert(group_id.into(), rules);
        self
    }

    fn stalled() -> Self {
        Self {
            stall_lists: true,
            ..Self::default()
        }
    }

    fn failing(self, status: u16, message: &str) -> Self {
        *self.fail.lock().unwrap() = Some((status, message.into()));
        self
    }

    async fn enter(&self) -> Result<(), Error> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let fail = self.fail.lock().unwrap().clone();
        match fail {
            Some((status, message)) => Err(Error::Http { status, message }),
            None => Ok(()),
        }
    }

    fn calls(&self) -> usize {
        self.mutation_calls.load(Ordering::SeqCst)
    }

    async fn listed<T>(&self, items: Vec<T>) -> Result<Page<T>, Error> {
        if self.stall_lists {
            std::future::pending::<()>().await;
        }
        Ok(page(items))
    }
}

fn not_found() -> Error {
    Error::Http {
        status: 404,
        message: "Not found".into(),
    }
}

fn page<T>(items: Vec<T>) -> Page<T> {
    Page {
        items,
        meta: Meta::default(),
    }
}

impl FirewallService for FakeService {
    fn list_groups(&self) -> impl Future<Output = Result<Page<Group>, Error>> + Send {
        let groups = self.groups.lock().unwrap().clone();
        self.listed(groups)
    }

    fn get_group(&self, group_id: &str) -> impl Future<Output = Result<Group, Error>> + Send {
        let found = self
            .groups
            .lock()
            .unwrap()
            .iter()
            .find(|g| g.id == group_id)
            .cloned();
        async move { found.ok_or_else(not_found) }
    }

    fn create_group(
        &self,
        description: &str,
    ) -> impl Future<Output = Result<Group, Error>> + Send {
        async move {
            self.enter().await?;
            let n = self.next_group.fetch_add(1, Ordering::SeqCst);
            let created = group(&format!("fwg-{}", 123 + n), description);
            self.groups.lock().unwrap().push(created.clone());
            Ok(created)
        }
    }

    fn update_group(
        &self,
        group_id: &str,
        description: &str,
    ) -> impl Future<Output = Result<(), Error>> + Send {
        async move {
            self.enter().await?;
            for g in self.groups.lock().unwrap().iter_mut() {
                if g.id == group_id {
                    g.description = description.into();
                }
            }
            Ok(())
        }
    }

    fn delete_group(&self, group_id: &str) -> impl Future<Output = Result<(), Error>> + Send {
        async move {
            self.enter().await?;
            self.groups.lock().unwrap().retain(|g| g.id != group_id);
            Ok(())
        }
    }

    fn list_rules(&self, group_id: &str) -> impl Future<Output = Result<Page<Rule>, Error>> + Send {
        let rules = self
            .rules
            .lock()
            .unwrap()
            .get(group_id)
            .cloned()
            .unwrap_or_default();
        self.listed(rules)
    }

    fn get_rule(
        &self,
        group_id: &str,
        rule_id: u64,
    ) -> impl Future<Output = Result<Rule, Error>> + Send {
        let found = self
            .rules
            .lock()
            .unwrap()
            .get(group_id)
            .and_then(|rules| rules.iter().find(|r| r.id == rule_id).cloned());
        async move { found.ok_or_else(not_found) }
    }

    fn create_rule(
        &self,
        group_id: &str,
        request: &CreateRuleRequest,
    ) -> impl Future<Output = Result<Rule, Error>> + Send {
        async move {
            self.enter().await?;
            let id = 1000 + self.next_rule.fetch_add(1, Ordering::SeqCst);
            let created = Rule {
                id,
                ip_type: request.ip_type,
                action: RuleAction::Accept,
                protocol: request.protocol,
                port: request.port.clone(),
                subnet: request.subnet.clone(),
                subnet_size: request.subnet_size,
                source: request.source.clone(),
                notes: request.notes.clone(),
            };
            self.rules
                .lock()
                .unwrap()
                .entry(group_id.into())
                .or_default()
                .push(created.clone());
            Ok(created)
        }
    }

    fn delete_rule(
        &self,
        group_id: &str,
        rule_id: u64,
    ) -> impl Future<Output = Result<(), Error>> + Send {
        async move {
            self.enter().await?;
            if let Some(rules) = self.rules.lock().unwrap().get_mut(group_id) {
                rules.retain(|r| r.id != rule_id);
            }
            Ok(())
        }
    }
}

// ── Recording notifier ──────────────────────────────────────────────

#[derive(Default)]
struct RecordingNotifier {
    successes: Mutex<Vec<String>>,
    failures: Mutex<Vec<(String, ErrorClass)>>,
}

impl Notifier for RecordingNotifier {
    fn success(&self, message: &str) {
        self.successes.lock().unwrap().push(message.into());
    }

    fn failure(&self, message: &str, error: &CoreError) {
        self.failures
            .lock()
            .unwrap()
            .push((message.into(), error.class()));
    }
}

impl RecordingNotifier {
    fn counts(&self) -> (usize, usize) {
        (
            self.successes.lock().unwrap().len(),
            self.failures.lock().unwrap().len(),
        )
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn group(id: &str, description: &str) -> Group {
    let ts = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    Group {
        id: id.into(),
        description: description.into(),
        date_created: ts,
        date_modified: ts,
        instance_count: 0,
        rule_count: 0,
        max_rule_count: 50,
    }
}

fn rule(id: u64, port: &str) -> Rule {
    Rule {
        id,
        ip_type: IpType::V4,
        action: RuleAction::Accept,
        protocol: lavascope_core::Protocol::Tcp,
        port: port.into(),
        subnet: "0.0.0.0".into(),
        subnet_size: 0,
        source: String::new(),
        notes: String::new(),
    }
}

fn setup(service: FakeService) -> (Controller<FakeService>, Arc<RecordingNotifier>) {
    setup_with_timeout(service, Duration::from_secs(5))
}

fn setup_with_timeout(
    service: FakeService,
    timeout: Duration,
) -> (Controller<FakeService>, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let controller = Controller::with_service(service, notifier.clone(), timeout);
    (controller, notifier)
}

async fn wait_for(stream: &mut RegistryStream, pred: impl Fn(&RegistrySnapshot) -> bool) {
    loop {
        if pred(&stream.latest()) {
            return;
        }
        stream.changed().await.unwrap();
    }
}

fn fwg1() -> GroupKey {
    GroupKey::server("fwg-1")
}

fn https_anywhere() -> RuleDraft {
    RuleDraft {
        ip_type: IpType::V4,
        protocol: ProtocolChoice::Https,
        port: String::new(),
        source_type: SourceType::Anywhere,
        source_text: String::new(),
        notes: "web".into(),
    }
}

// ── Group creation ──────────────────────────────────────────────────

#[tokio::test]
async fn create_group_promotes_placeholder() {
    let (service, gate) = FakeService::gated();
    let (controller, notifier) = setup(service);
    let mut stream = controller.subscribe();

    let c = controller.clone();
    let task = tokio::spawn(async move { c.mutations().create_group("web").await });

    wait_for(&mut stream, |s| !s.is_empty()).await;
    let pending = controller.snapshot();
    let placeholder = pending.group(&GroupKey::Temp(0)).unwrap();
    assert!(placeholder.lifecycle.creating);
    assert_eq!(placeholder.group.description, "web");

    gate.notify_one();
    let created = task.await.unwrap().unwrap();

    assert_eq!(created.id, "fwg-123");
    let snap = controller.snapshot();
    assert_eq!(snap.groups().len(), 1);
    let entry = snap.group(&GroupKey::server("fwg-123")).unwrap();
    assert!(!entry.lifecycle.creating);
    assert!(snap.group(&GroupKey::Temp(0)).is_none());
    assert_eq!(notifier.counts(), (1, 0));
}

#[tokio::test]
async fn failed_create_group_removes_placeholder() {
    let (controller, notifier) = setup(FakeService::default().failing(500, "boom"));

    let err = controller.mutations().create_group("web").await.unwrap_err();

    assert!(matches!(err, CoreError::Http { status: 500, .. }));
    assert!(controller.snapshot().is_empty());
    assert_eq!(notifier.counts(), (0, 1));
}

#[tokio::test]
async fn refresh_during_create_keeps_single_placeholder() {
    let (service, gate) = FakeService::gated();
    let (controller, _) = setup(service.with_group("fwg-1", "existing"));
    controller.refresh_groups().await.unwrap();
    let mut stream = controller.subscribe();

    let c = controller.clone();
    let task = tokio::spawn(async move { c.mutations().create_group("web").await });
    wait_for(&mut stream, |s| s.group(&GroupKey::Temp(0)).is_some()).await;

    // Server does not know the new group yet
    let report = controller.refresh_groups().await.unwrap();
    assert_eq!(report.retained, 1);
    assert_eq!(controller.snapshot().groups().len(), 2);

    // Rules cannot be added to a group that is still being created
    let err = controller
        .mutations()
        .create_rule(&GroupKey::Temp(0), &https_anywhere())
        .await
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::Conflict);

    gate.notify_one();
    task.await.unwrap().unwrap();

    let report = controller.refresh_groups().await.unwrap();
    assert!(report.is_noop());
    let keys: Vec<_> = controller.snapshot().groups().keys().cloned().collect();
    assert_eq!(keys, vec![GroupKey::server("fwg-1"), GroupKey::server("fwg-123")]);
}

#[tokio::test]
async fn concurrent_creates_get_distinct_temp_ids() {
    let (service, gate) = FakeService::gated();
    let (controller, _) = setup(service);
    let mut stream = controller.subscribe();

    let a = controller.clone();
    let first = tokio::spawn(async move { a.mutations().create_group("a").await });
    let b = controller.clone();
    let second = tokio::spawn(async move { b.mutations().create_group("b").await });

    wait_for(&mut stream, |s| s.groups().len() == 2).await;
    let snap = controller.snapshot();
    assert!(snap.group(&GroupKey::Temp(0)).is_some());
    assert!(snap.group(&GroupKey::Temp(1)).is_some());

    gate.notify_one();
    gate.notify_one();
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    let snap = controller.snapshot();
    assert_eq!(snap.groups().len(), 2);
    assert!(snap.groups().keys().all(|k| !k.is_temp()));
}

// ── Group update / delete ───────────────────────────────────────────

#[tokio::test]
async fn delete_rejected_by_server_restores_group() {
    let service = FakeService::default()
        .with_group("fwg-1", "web")
        .failing(403, "Forbidden");
    let (controller, notifier) = setup(service);
    controller.refresh_groups().await.unwrap();

    let err = controller.mutations().delete_group(&fwg1()).await.unwrap_err();

    match err {
        CoreError::Http { status, ref message } => {
            assert_eq!(status, 403);
            assert_eq!(message, "Forbidden");
        }
        other => panic!("expected Http error, got: {other:?}"),
    }
    let snap = controller.snapshot();
    let entry = snap.group(&fwg1()).unwrap();
    assert!(!entry.lifecycle.deleting);
    assert_eq!(notifier.counts(), (0, 1));
}

#[tokio::test]
async fn second_mutation_on_busy_group_is_rejected() {
    let (service, gate) = FakeService::gated();
    let (controller, notifier) = setup(service.with_group("fwg-1", "web"));
    controller.refresh_groups().await.unwrap();
    let mut stream = controller.subscribe();

    let c = controller.clone();
    let task = tokio::spawn(async move { c.mutations().delete_group(&fwg1()).await });
    wait_for(&mut stream, |s| {
        s.group(&fwg1()).is_some_and(|e| e.lifecycle.deleting)
    })
    .await;

    let again = controller.mutations().delete_group(&fwg1()).await;
    let update = controller.mutations().update_group(&fwg1(), "x").await;
    assert!(matches!(again, Err(CoreError::Conflict { .. })));
    assert!(matches!(update, Err(CoreError::Conflict { .. })));
    assert_eq!(controller.service().calls(), 1);

    // A refresh while deleting must not drop or reset the entry
    controller.refresh_groups().await.unwrap();
    assert!(controller.snapshot().group(&fwg1()).unwrap().lifecycle.deleting);

    gate.notify_one();
    task.await.unwrap().unwrap();
    assert!(controller.snapshot().group(&fwg1()).is_none());
    assert_eq!(notifier.counts(), (1, 0));
}

#[tokio::test]
async fn update_applies_description_and_survives_refresh() {
    let (controller, _) = setup(FakeService::default().with_group("fwg-1", "web"));
    controller.refresh_groups().await.unwrap();

    controller
        .mutations()
        .update_group(&fwg1(), "web servers")
        .await
        .unwrap();

    let entry = controller.snapshot().group(&fwg1()).cloned().unwrap();
    assert_eq!(entry.group.description, "web servers");
    assert!(!entry.lifecycle.updating);

    controller.refresh_groups().await.unwrap();
    let entry = controller.snapshot().group(&fwg1()).cloned().unwrap();
    assert_eq!(entry.group.description, "web servers");
}

#[tokio::test]
async fn failed_update_keeps_prior_description() {
    let service = FakeService::default()
        .with_group("fwg-1", "web")
        .failing(400, "bad description");
    let (controller, notifier) = setup(service);
    controller.refresh_groups().await.unwrap();

    let err = controller
        .mutations()
        .update_group(&fwg1(), "renamed")
        .await
        .unwrap_err();

    assert_eq!(err.user_message(), "bad description");
    let entry = controller.snapshot().group(&fwg1()).cloned().unwrap();
    assert_eq!(entry.group.description, "web");
    assert!(!entry.lifecycle.updating);
    assert_eq!(notifier.counts(), (0, 1));
}

#[tokio::test]
async fn mutations_on_unknown_group_are_not_found() {
    let (controller, notifier) = setup(FakeService::default());

    let err = controller.mutations().delete_group(&fwg1()).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::NotFound);
    assert_eq!(controller.service().calls(), 0);
    assert_eq!(notifier.counts(), (0, 0));
}

// ── Rules ───────────────────────────────────────────────────────────

#[tokio::test]
async fn create_rule_promotes_and_resets_draft() {
    let (controller, notifier) = setup(FakeService::default().with_group("fwg-1", "web"));
    controller.refresh_all().await.unwrap();
    let registry = controller.registry();
    registry.set_rule_draft(&fwg1(), IpType::V4, https_anywhere());

    let created = controller
        .mutations()
        .create_rule(&fwg1(), &https_anywhere())
        .await
        .unwrap();

    assert_eq!(created.port, "443");
    let snap = controller.snapshot();
    let rules = snap.rules(&fwg1()).unwrap();
    assert_eq!(rules.len(), 1);
    let entry = &rules[&RuleKey::Server(created.id)];
    assert!(!entry.lifecycle.creating);
    assert_eq!(
        snap.drafts(&fwg1()).unwrap().rules.v4,
        RuleDraft::initial(IpType::V4)
    );
    assert_eq!(notifier.counts(), (1, 0));
}

#[tokio::test]
async fn failed_create_rule_removes_placeholder_and_keeps_draft_cleared() {
    let service = FakeService::default()
        .with_group("fwg-1", "web")
        .failing(400, "Invalid port");
    let (controller, notifier) = setup(service);
    controller.refresh_all().await.unwrap();
    controller
        .registry()
        .set_rule_draft(&fwg1(), IpType::V4, https_anywhere());

    let err = controller
        .mutations()
        .create_rule(&fwg1(), &https_anywhere())
        .await
        .unwrap_err();

    assert_eq!(err.user_message(), "Invalid port");
    let snap = controller.snapshot();
    assert!(snap.rules(&fwg1()).unwrap().is_empty());
    assert_eq!(
        snap.drafts(&fwg1()).unwrap().rules.v4,
        RuleDraft::initial(IpType::V4)
    );
    assert_eq!(notifier.counts(), (0, 1));
}

#[tokio::test]
async fn invalid_draft_is_never_sent() {
    let (controller, notifier) = setup(FakeService::default().with_group("fwg-1", "web"));
    controller.refresh_all().await.unwrap();
    let mut bad = https_anywhere();
    bad.source_type = SourceType::Custom;
    bad.source_text = "10.0.0.0/abc".into();
    controller
        .registry()
        .set_rule_draft(&fwg1(), IpType::V4, bad.clone());

    let err = controller
        .mutations()
        .create_rule(&fwg1(), &bad)
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::Validation);
    assert_eq!(controller.service().calls(), 0);
    let snap = controller.snapshot();
    assert_eq!(snap.drafts(&fwg1()).unwrap().rules.v4, bad);
    assert!(snap.rules(&fwg1()).unwrap().is_empty());
    assert_eq!(notifier.counts(), (0, 0));
}

#[tokio::test]
async fn delete_rule_guards_and_settles() {
    let (service, gate) = FakeService::gated();
    let service = service
        .with_group("fwg-1", "web")
        .with_rules("fwg-1", vec![rule(5, "22"), rule(6, "80")]);
    let (controller, _) = setup(service);
    controller.refresh_all().await.unwrap();
    let mut stream = controller.subscribe();

    let c = controller.clone();
    let task =
        tokio::spawn(async move { c.mutations().delete_rule(&fwg1(), RuleKey::Server(5)).await });
    wait_for(&mut stream, |s| {
        s.rule(&fwg1(), RuleKey::Server(5))
            .is_some_and(|r| r.lifecycle.deleting)
    })
    .await;

    let again = controller
        .mutations()
        .delete_rule(&fwg1(), RuleKey::Server(5))
        .await;
    assert!(matches!(again, Err(CoreError::Conflict { .. })));

    // The server still reports rule 5; the deleting flag must survive
    controller.refresh_rules(&fwg1()).await.unwrap();
    assert!(
        controller
            .snapshot()
            .rule(&fwg1(), RuleKey::Server(5))
            .unwrap()
            .lifecycle
            .deleting
    );

    gate.notify_one();
    task.await.unwrap().unwrap();

    let snap = controller.snapshot();
    assert!(snap.rule(&fwg1(), RuleKey::Server(5)).is_none());
    assert!(snap.rule(&fwg1(), RuleKey::Server(6)).is_some());
}

#[tokio::test]
async fn group_delete_waits_for_pending_rule_create() {
    let (service, gate) = FakeService::gated();
    let (controller, _) = setup(service.with_group("fwg-1", "web"));
    controller.refresh_all().await.unwrap();
    let mut stream = controller.subscribe();

    let c = controller.clone();
    let task =
        tokio::spawn(async move { c.mutations().create_rule(&fwg1(), &https_anywhere()).await });
    wait_for(&mut stream, |s| {
        s.rules(&fwg1()).is_some_and(|m| !m.is_empty())
    })
    .await;

    let err = controller.mutations().delete_group(&fwg1()).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Conflict);
    assert_eq!(controller.service().calls(), 1);

    gate.notify_one();
    task.await.unwrap().unwrap();
    assert!(!controller.snapshot().group(&fwg1()).unwrap().lifecycle.deleting);
}

#[tokio::test]
async fn rule_created_after_group_vanished_leaves_no_rule_slot() {
    let (service, gate) = FakeService::gated();
    let (controller, _) = setup(service.with_group("fwg-1", "web"));
    controller.refresh_all().await.unwrap();
    let mut stream = controller.subscribe();

    let c = controller.clone();
    let task =
        tokio::spawn(async move { c.mutations().create_rule(&fwg1(), &https_anywhere()).await });
    wait_for(&mut stream, |s| {
        s.rules(&fwg1()).is_some_and(|m| !m.is_empty())
    })
    .await;

    // The group disappears server-side while the rule create is pending
    controller.service().groups.lock().unwrap().clear();
    let report = controller.refresh_groups().await.unwrap();
    assert_eq!(report.removed, 1);

    gate.notify_one();
    task.await.unwrap().unwrap();

    let snap = controller.snapshot();
    assert!(snap.group(&fwg1()).is_none());
    assert!(snap.rules(&fwg1()).is_none());
}

// ── Single-entity fetch ─────────────────────────────────────────────

#[tokio::test]
async fn fetch_group_merges_without_listing() {
    let service = FakeService::default()
        .with_group("fwg-1", "web")
        .with_group("fwg-2", "db");
    let (controller, _) = setup(service);

    let entry = controller.fetch_group(&fwg1()).await.unwrap();

    assert_eq!(entry.group.description, "web");
    let snap = controller.snapshot();
    assert_eq!(snap.groups().len(), 1);
    assert!(snap.drafts(&fwg1()).is_some());
}

#[tokio::test]
async fn fetch_unknown_group_or_rule_is_not_found() {
    let service = FakeService::default()
        .with_group("fwg-1", "web")
        .with_rules("fwg-1", vec![rule(5, "22")]);
    let (controller, _) = setup(service);

    let err = controller
        .fetch_group(&GroupKey::server("fwg-404"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { entity: "group", .. }));

    controller.fetch_group(&fwg1()).await.unwrap();
    let found = controller.fetch_rule(&fwg1(), RuleKey::Server(5)).await.unwrap();
    assert_eq!(found.rule.port, "22");
    let err = controller
        .fetch_rule(&fwg1(), RuleKey::Server(6))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { entity: "rule", .. }));
}

// ── Refresh timeouts and cancellation ───────────────────────────────

#[tokio::test(start_paused = true)]
async fn stalled_refresh_times_out_and_keeps_state() {
    let (controller, _) = setup_with_timeout(FakeService::stalled(), Duration::from_millis(50));

    let err = controller.refresh_groups().await.unwrap_err();

    assert!(matches!(
        err,
        CoreError::Transport {
            kind: TransportKind::Timeout,
            ..
        }
    ));
    assert!(controller.snapshot().is_empty());
}

#[tokio::test]
async fn shutdown_aborts_stalled_refresh() {
    let (controller, _) = setup_with_timeout(FakeService::stalled(), Duration::from_secs(60));

    let c = controller.clone();
    let task = tokio::spawn(async move { c.refresh_all().await });
    tokio::task::yield_now().await;

    controller.shutdown().await;
    let err = task.await.unwrap().unwrap_err();

    assert!(matches!(
        err,
        CoreError::Transport {
            kind: TransportKind::Aborted,
            ..
        }
    ));
}

#[tokio::test]
async fn shutdown_joins_periodic_refresh_stuck_on_the_network() {
    let (controller, _) = setup_with_timeout(FakeService::stalled(), Duration::from_secs(60));
    controller.spawn_refresh(Duration::from_millis(10)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    tokio::time::timeout(Duration::from_secs(2), controller.shutdown())
        .await
        .unwrap();
}

// ── Mutation timeouts and cancellation ──────────────────────────────

#[tokio::test(start_paused = true)]
async fn timed_out_delete_rolls_back() {
    let (service, _gate) = FakeService::gated();
    let (controller, notifier) =
        setup_with_timeout(service.with_group("fwg-1", "web"), Duration::from_millis(50));
    controller.refresh_groups().await.unwrap();

    let err = controller.mutations().delete_group(&fwg1()).await.unwrap_err();

    assert!(matches!(
        err,
        CoreError::Transport {
            kind: TransportKind::Timeout,
            ..
        }
    ));
    assert!(!controller.snapshot().group(&fwg1()).unwrap().lifecycle.deleting);
    assert_eq!(notifier.counts(), (0, 1));
}

#[tokio::test]
async fn shutdown_aborts_in_flight_mutation() {
    let (service, _gate) = FakeService::gated();
    let (controller, _) = setup(service.with_group("fwg-1", "web"));
    controller.refresh_groups().await.unwrap();
    let mut stream = controller.subscribe();

    let c = controller.clone();
    let task = tokio::spawn(async move { c.mutations().delete_group(&fwg1()).await });
    wait_for(&mut stream, |s| {
        s.group(&fwg1()).is_some_and(|e| e.lifecycle.deleting)
    })
    .await;

    controller.shutdown().await;
    let err = task.await.unwrap().unwrap_err();

    assert!(matches!(
        err,
        CoreError::Transport {
            kind: TransportKind::Aborted,
            ..
        }
    ));
    assert!(!controller.snapshot().group(&fwg1()).unwrap().lifecycle.deleting);
}

// ── Refresh ─────────────────────────────────────────────────────────

#[tokio::test]
async fn refresh_all_loads_groups_and_rules() {
    let service = FakeService::default()
        .with_group("fwg-1", "web")
        .with_group("fwg-2", "db")
        .with_rules("fwg-1", vec![rule(5, "22")]);
    let (controller, _) = setup(service);

    let report = controller.refresh_all().await.unwrap();

    assert_eq!(report.inserted, 3);
    let snap = controller.snapshot();
    assert_eq!(snap.groups().len(), 2);
    assert_eq!(snap.rules(&fwg1()).unwrap().len(), 1);
    assert!(snap.rules(&GroupKey::server("fwg-2")).unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn periodic_refresh_picks_up_server_changes() {
    let (controller, _) = setup(FakeService::default().with_group("fwg-1", "web"));
    controller.spawn_refresh(Duration::from_secs(30)).await;
    assert!(controller.snapshot().is_empty());

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert!(controller.snapshot().group(&fwg1()).is_some());

    controller.service().groups.lock().unwrap().clear();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(controller.snapshot().is_empty());

    controller.shutdown().await;
}

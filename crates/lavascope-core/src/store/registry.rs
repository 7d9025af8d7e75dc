// ── Entity registry ──
//
// One immutable snapshot behind a `watch` channel. Every write goes
// through `send_if_modified`, which serialises writers and publishes the
// new snapshot in a single step. Collections inside the snapshot are
// `Arc`s, so a write clones only the collection it touches and readers
// holding an older snapshot keep a consistent view.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tokio::sync::watch;

use crate::draft::{GroupDrafts, RuleDraft};
use crate::model::{
    Group, GroupEntry, GroupKey, GroupLifecycle, IpType, Rule, RuleEntry, RuleKey, RuleLifecycle,
};
use crate::stream::RegistryStream;

pub type GroupMap = BTreeMap<GroupKey, GroupEntry>;
pub type RuleMap = BTreeMap<RuleKey, RuleEntry>;

// ── Snapshot ────────────────────────────────────────────────────────

/// Point-in-time view of every group, rule and draft.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    pub(crate) groups: Arc<GroupMap>,
    pub(crate) rules: Arc<BTreeMap<GroupKey, Arc<RuleMap>>>,
    pub(crate) drafts: Arc<BTreeMap<GroupKey, GroupDrafts>>,
}

impl RegistrySnapshot {
    pub fn groups(&self) -> &GroupMap {
        &self.groups
    }

    pub fn group(&self, key: &GroupKey) -> Option<&GroupEntry> {
        self.groups.get(key)
    }

    /// Rules of one group. `None` until the group's rules were fetched or
    /// a rule was created in it.
    pub fn rules(&self, key: &GroupKey) -> Option<&RuleMap> {
        self.rules.get(key).map(AsRef::as_ref)
    }

    pub fn rule(&self, group: &GroupKey, rule: RuleKey) -> Option<&RuleEntry> {
        self.rules.get(group)?.get(&rule)
    }

    pub fn drafts(&self, key: &GroupKey) -> Option<&GroupDrafts> {
        self.drafts.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    // ── Copy-on-write access ─────────────────────────────────────────

    pub(crate) fn groups_mut(&mut self) -> &mut GroupMap {
        Arc::make_mut(&mut self.groups)
    }

    pub(crate) fn drafts_mut(&mut self) -> &mut BTreeMap<GroupKey, GroupDrafts> {
        Arc::make_mut(&mut self.drafts)
    }

    /// Rule map of a group, creating the slot if absent.
    pub(crate) fn rules_mut(&mut self, key: &GroupKey) -> &mut RuleMap {
        let all = Arc::make_mut(&mut self.rules);
        Arc::make_mut(all.entry(key.clone()).or_default())
    }

    /// Rule map of a group, only if the slot exists.
    pub(crate) fn existing_rules_mut(&mut self, key: &GroupKey) -> Option<&mut RuleMap> {
        if !self.rules.contains_key(key) {
            return None;
        }
        Arc::make_mut(&mut self.rules).get_mut(key).map(Arc::make_mut)
    }

    /// Insert or replace a group entry, seeding drafts for a new key.
    pub(crate) fn put_group(&mut self, key: GroupKey, entry: GroupEntry) -> bool {
        if !self.drafts.contains_key(&key) {
            let drafts = GroupDrafts::for_description(&entry.group.description);
            self.drafts_mut().insert(key.clone(), drafts);
        }
        self.groups_mut().insert(key, entry).is_none()
    }

    fn has_rule_creating(&self, key: &GroupKey) -> bool {
        self.rules(key)
            .is_some_and(|m| m.values().any(|e| e.lifecycle.creating))
    }

    /// Remove a group together with its rules and drafts.
    pub(crate) fn take_group(&mut self, key: &GroupKey) -> Option<GroupEntry> {
        if !self.groups.contains_key(key) {
            return None;
        }
        let removed = self.groups_mut().remove(key);
        if self.rules.contains_key(key) {
            Arc::make_mut(&mut self.rules).remove(key);
        }
        if self.drafts.contains_key(key) {
            self.drafts_mut().remove(key);
        }
        removed
    }
}

// ── Claims ──────────────────────────────────────────────────────────

/// Outcome of an atomic check-and-set of a lifecycle flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Claim {
    /// The flag is now set; the caller owns the mutation.
    Claimed,
    /// A conflicting mutation is already in flight.
    Busy,
    /// The target does not exist.
    #[default]
    Missing,
}

/// Group mutations that set a lifecycle flag on an existing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum GroupOp {
    Update,
    Delete,
}

impl GroupOp {
    fn flag(self, lifecycle: &mut GroupLifecycle) -> &mut bool {
        match self {
            Self::Update => &mut lifecycle.updating,
            Self::Delete => &mut lifecycle.deleting,
        }
    }

    /// Clear the flag this operation set.
    pub fn release(self, lifecycle: &mut GroupLifecycle) {
        *self.flag(lifecycle) = false;
    }
}

// ── Registry ────────────────────────────────────────────────────────

/// Canonical client-side view of groups, rules and drafts.
pub struct Registry {
    state: watch::Sender<Arc<RegistrySnapshot>>,
    next_group_temp: AtomicU64,
    next_rule_temp: AtomicU64,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let (state, _) = watch::channel(Arc::new(RegistrySnapshot::default()));
        Self {
            state,
            next_group_temp: AtomicU64::new(0),
            next_rule_temp: AtomicU64::new(0),
        }
    }

    /// Current snapshot (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> RegistryStream {
        RegistryStream::new(self.state.subscribe())
    }

    /// Apply one indivisible write. `f` returns whether it changed anything
    /// plus a result; subscribers are notified only on change. `f` must not
    /// mutate when it reports no change.
    pub(crate) fn write<R: Default>(
        &self,
        f: impl FnOnce(&mut RegistrySnapshot) -> (bool, R),
    ) -> R {
        let mut out = R::default();
        self.state.send_if_modified(|snap| {
            let (modified, result) = f(Arc::make_mut(snap));
            out = result;
            modified
        });
        out
    }

    // ── Temp ids ─────────────────────────────────────────────────────

    pub fn allocate_group_temp(&self) -> GroupKey {
        GroupKey::Temp(self.next_group_temp.fetch_add(1, Ordering::Relaxed))
    }

    pub fn allocate_rule_temp(&self) -> RuleKey {
        RuleKey::Temp(self.next_rule_temp.fetch_add(1, Ordering::Relaxed))
    }

    // ── Groups ───────────────────────────────────────────────────────

    /// Insert or replace a group entry. Returns `true` if the key was new.
    pub fn upsert_group(&self, key: GroupKey, entry: GroupEntry) -> bool {
        self.write(|s| {
            if s.groups.get(&key) == Some(&entry) {
                return (false, false);
            }
            (true, s.put_group(key, entry))
        })
    }

    /// Remove a group, its rules and its drafts.
    pub fn remove_group(&self, key: &GroupKey) -> Option<GroupEntry> {
        self.write(|s| {
            let removed = s.take_group(key);
            (removed.is_some(), removed)
        })
    }

    /// Edit a group entry in place. No-op if absent.
    pub fn patch_group(&self, key: &GroupKey, f: impl FnOnce(&mut GroupEntry)) -> bool {
        self.write(|s| {
            let Some(current) = s.groups.get(key) else {
                return (false, false);
            };
            let mut next = current.clone();
            f(&mut next);
            if next == *current {
                return (false, true);
            }
            s.groups_mut().insert(key.clone(), next);
            (true, true)
        })
    }

    pub fn patch_group_lifecycle(
        &self,
        key: &GroupKey,
        f: impl FnOnce(&mut GroupLifecycle),
    ) -> bool {
        self.patch_group(key, |entry| f(&mut entry.lifecycle))
    }

    pub fn set_draft_description(&self, key: &GroupKey, description: &str) -> bool {
        self.write(|s| match s.drafts.get(key) {
            Some(d) if d.description != description => {
                if let Some(d) = s.drafts_mut().get_mut(key) {
                    description.clone_into(&mut d.description);
                }
                (true, true)
            }
            Some(_) => (false, true),
            None => (false, false),
        })
    }

    /// Insert a `temp-N` placeholder marked creating. Returns its key.
    pub fn begin_group_create(&self, description: &str) -> GroupKey {
        let key = self.allocate_group_temp();
        let now = Utc::now();
        let placeholder = Group {
            id: key.to_string(),
            description: description.to_owned(),
            date_created: now,
            date_modified: now,
            instance_count: 0,
            rule_count: 0,
            max_rule_count: 0,
        };
        self.write(|s| {
            s.put_group(
                key.clone(),
                GroupEntry {
                    group: placeholder,
                    lifecycle: GroupLifecycle::creating(),
                },
            );
            (true, ())
        });
        key
    }

    /// Swap a placeholder for the server's group in one write.
    pub fn promote_group(&self, temp: &GroupKey, group: Group) -> GroupKey {
        let key = GroupKey::Server(group.id.clone());
        self.write(|s| {
            s.take_group(temp);
            let existing = s.groups.get(&key).map(|e| e.lifecycle);
            let entry = GroupEntry {
                group,
                lifecycle: existing.unwrap_or_default(),
            };
            s.put_group(key.clone(), entry);
            (true, ())
        });
        key
    }

    /// Set the flag for `op` if the group is idle. A delete also waits for
    /// the group's pending rule creates.
    pub fn claim_group(&self, key: &GroupKey, op: GroupOp) -> Claim {
        self.write(|s| match s.groups.get(key) {
            None => (false, Claim::Missing),
            Some(entry) if entry.lifecycle.in_flight() => (false, Claim::Busy),
            Some(_) if op == GroupOp::Delete && s.has_rule_creating(key) => (false, Claim::Busy),
            Some(_) => {
                if let Some(entry) = s.groups_mut().get_mut(key) {
                    *op.flag(&mut entry.lifecycle) = true;
                }
                (true, Claim::Claimed)
            }
        })
    }

    // ── Rules ────────────────────────────────────────────────────────

    /// Insert or replace a rule entry, creating the group's slot if needed.
    pub fn upsert_rule(&self, group: &GroupKey, key: RuleKey, entry: RuleEntry) -> bool {
        self.write(|s| {
            if s.rule(group, key) == Some(&entry) {
                return (false, false);
            }
            (true, s.rules_mut(group).insert(key, entry).is_none())
        })
    }

    pub fn remove_rule(&self, group: &GroupKey, key: RuleKey) -> Option<RuleEntry> {
        self.write(|s| {
            if s.rule(group, key).is_none() {
                return (false, None);
            }
            let removed = s.existing_rules_mut(group).and_then(|m| m.remove(&key));
            (removed.is_some(), removed)
        })
    }

    pub fn patch_rule_lifecycle(
        &self,
        group: &GroupKey,
        key: RuleKey,
        f: impl FnOnce(&mut RuleLifecycle),
    ) -> bool {
        self.write(|s| {
            let Some(current) = s.rule(group, key) else {
                return (false, false);
            };
            let mut next = current.lifecycle;
            f(&mut next);
            if next == current.lifecycle {
                return (false, true);
            }
            if let Some(entry) = s.existing_rules_mut(group).and_then(|m| m.get_mut(&key)) {
                entry.lifecycle = next;
            }
            (true, true)
        })
    }

    pub fn set_rule_draft(&self, group: &GroupKey, ip_type: IpType, draft: RuleDraft) -> bool {
        self.write(|s| match s.drafts.get(group) {
            Some(d) if *d.rules.get(ip_type) != draft => {
                if let Some(d) = s.drafts_mut().get_mut(group) {
                    *d.rules.get_mut(ip_type) = draft;
                }
                (true, true)
            }
            Some(_) => (false, true),
            None => (false, false),
        })
    }

    pub fn reset_rule_draft(&self, group: &GroupKey, ip_type: IpType) -> bool {
        self.set_rule_draft(group, ip_type, RuleDraft::initial(ip_type))
    }

    /// Guard, reset the draft and insert a `creating-N` placeholder, all in
    /// one write. Rejected while the group is being created or deleted.
    pub fn begin_rule_create(&self, group: &GroupKey, placeholder: Rule) -> Result<RuleKey, Claim> {
        let (claim, key) = self.write(|s| {
            match s.groups.get(group) {
                None => return (false, (Claim::Missing, None)),
                Some(e) if e.lifecycle.creating || e.lifecycle.deleting => {
                    return (false, (Claim::Busy, None));
                }
                Some(_) => {}
            }

            let ip_type = placeholder.ip_type;
            if let Some(d) = s.drafts_mut().get_mut(group) {
                *d.rules.get_mut(ip_type) = RuleDraft::initial(ip_type);
            }

            let key = self.allocate_rule_temp();
            s.rules_mut(group).insert(
                key,
                RuleEntry {
                    rule: placeholder,
                    lifecycle: RuleLifecycle::creating(),
                },
            );
            (true, (Claim::Claimed, Some(key)))
        });
        key.ok_or(claim)
    }

    /// Swap a rule placeholder for the server's rule in one write. No-op
    /// once the group is gone.
    pub fn promote_rule(&self, group: &GroupKey, temp: RuleKey, rule: Rule) -> RuleKey {
        let key = RuleKey::Server(rule.id);
        self.write(|s| {
            if !s.groups.contains_key(group) {
                return (false, ());
            }
            let rules = s.rules_mut(group);
            rules.remove(&temp);
            let existing = rules.get(&key).map(|e| e.lifecycle);
            let entry = RuleEntry {
                rule,
                lifecycle: existing.unwrap_or_default(),
            };
            rules.insert(key, entry);
            (true, ())
        });
        key
    }

    /// Mark a rule deleting if it and its group are idle.
    pub fn claim_rule_delete(&self, group: &GroupKey, key: RuleKey) -> Claim {
        self.write(|s| {
            let Some(group_entry) = s.groups.get(group) else {
                return (false, Claim::Missing);
            };
            let Some(rule) = s.rule(group, key) else {
                return (false, Claim::Missing);
            };
            if group_entry.lifecycle.creating
                || group_entry.lifecycle.deleting
                || rule.lifecycle.in_flight()
            {
                return (false, Claim::Busy);
            }
            if let Some(entry) = s.existing_rules_mut(group).and_then(|m| m.get_mut(&key)) {
                entry.lifecycle.deleting = true;
            }
            (true, Claim::Claimed)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use crate::model::{Protocol, RuleAction};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    pub(crate) fn group(id: &str, description: &str) -> Group {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
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

    pub(crate) fn rule(id: u64, port: &str) -> Rule {
        Rule {
            id,
            ip_type: IpType::V4,
            action: RuleAction::Accept,
            protocol: Protocol::Tcp,
            port: port.into(),
            subnet: "0.0.0.0".into(),
            subnet_size: 0,
            source: String::new(),
            notes: String::new(),
        }
    }

    #[test]
    fn upsert_seeds_drafts_from_description() {
        let reg = Registry::new();
        let key = GroupKey::server("fwg-1");
        assert!(reg.upsert_group(key.clone(), GroupEntry::settled(group("fwg-1", "web"))));

        let snap = reg.snapshot();
        let drafts = snap.drafts(&key).unwrap();
        assert_eq!(drafts.description, "web");
        assert_eq!(drafts.rules.v4, RuleDraft::initial(IpType::V4));
    }

    #[test]
    fn writes_to_missing_targets_are_noops() {
        let reg = Registry::new();
        let key = GroupKey::server("nope");
        assert!(!reg.patch_group_lifecycle(&key, |l| l.deleting = true));
        assert!(!reg.set_draft_description(&key, "x"));
        assert!(!reg.reset_rule_draft(&key, IpType::V4));
        assert!(reg.remove_rule(&key, RuleKey::Server(1)).is_none());
        assert!(reg.snapshot().is_empty());
    }

    #[test]
    fn upsert_rule_creates_slot() {
        let reg = Registry::new();
        let key = GroupKey::server("fwg-1");
        reg.upsert_rule(&key, RuleKey::Server(5), RuleEntry::settled(rule(5, "22")));
        assert_eq!(reg.snapshot().rules(&key).unwrap().len(), 1);
    }

    #[test]
    fn remove_group_cascades() {
        let reg = Registry::new();
        let key = GroupKey::server("fwg-1");
        reg.upsert_group(key.clone(), GroupEntry::settled(group("fwg-1", "web")));
        reg.upsert_rule(&key, RuleKey::Server(5), RuleEntry::settled(rule(5, "22")));

        assert!(reg.remove_group(&key).is_some());
        let snap = reg.snapshot();
        assert!(snap.group(&key).is_none());
        assert!(snap.rules(&key).is_none());
        assert!(snap.drafts(&key).is_none());
    }

    #[test]
    fn old_snapshots_are_unaffected_by_later_writes() {
        let reg = Registry::new();
        let key = GroupKey::server("fwg-1");
        reg.upsert_group(key.clone(), GroupEntry::settled(group("fwg-1", "web")));
        let before = reg.snapshot();

        reg.patch_group_lifecycle(&key, |l| l.deleting = true);

        assert!(!before.group(&key).unwrap().lifecycle.deleting);
        assert!(reg.snapshot().group(&key).unwrap().lifecycle.deleting);
    }

    #[test]
    fn temp_ids_are_monotonic() {
        let reg = Registry::new();
        let a = reg.begin_group_create("a");
        let b = reg.begin_group_create("b");
        assert_eq!(a, GroupKey::Temp(0));
        assert_eq!(b, GroupKey::Temp(1));
        reg.remove_group(&a);
        assert_eq!(reg.begin_group_create("c"), GroupKey::Temp(2));
    }

    #[test]
    fn promote_group_leaves_exactly_one_entry() {
        let reg = Registry::new();
        let temp = reg.begin_group_create("web");
        let key = reg.promote_group(&temp, group("fwg-123", "web"));

        let snap = reg.snapshot();
        assert_eq!(snap.groups().len(), 1);
        assert!(snap.group(&temp).is_none());
        assert!(!snap.group(&key).unwrap().lifecycle.creating);
    }

    #[test]
    fn claim_group_is_exclusive() {
        let reg = Registry::new();
        let key = GroupKey::server("fwg-1");
        reg.upsert_group(key.clone(), GroupEntry::settled(group("fwg-1", "web")));

        assert_eq!(reg.claim_group(&key, GroupOp::Delete), Claim::Claimed);
        assert_eq!(reg.claim_group(&key, GroupOp::Delete), Claim::Busy);
        assert_eq!(reg.claim_group(&key, GroupOp::Update), Claim::Busy);
        assert_eq!(
            reg.claim_group(&GroupKey::server("other"), GroupOp::Update),
            Claim::Missing
        );

        reg.patch_group_lifecycle(&key, |l| GroupOp::Delete.release(l));
        assert_eq!(reg.claim_group(&key, GroupOp::Update), Claim::Claimed);
    }

    #[test]
    fn begin_rule_create_resets_draft_and_guards_parent() {
        let reg = Registry::new();
        let key = GroupKey::server("fwg-1");
        reg.upsert_group(key.clone(), GroupEntry::settled(group("fwg-1", "web")));

        let mut draft = RuleDraft::initial(IpType::V4);
        draft.notes = "typed".into();
        reg.set_rule_draft(&key, IpType::V4, draft);

        let temp = reg.begin_rule_create(&key, rule(0, "22")).unwrap();
        assert_eq!(temp, RuleKey::Temp(0));
        let snap = reg.snapshot();
        assert_eq!(
            snap.drafts(&key).unwrap().rules.v4,
            RuleDraft::initial(IpType::V4)
        );
        assert!(snap.rule(&key, temp).unwrap().lifecycle.creating);

        reg.patch_group_lifecycle(&key, |l| l.deleting = true);
        assert_eq!(
            reg.begin_rule_create(&key, rule(0, "22")),
            Err(Claim::Busy)
        );
    }

    #[test]
    fn claim_rule_delete_rejects_placeholders() {
        let reg = Registry::new();
        let key = GroupKey::server("fwg-1");
        reg.upsert_group(key.clone(), GroupEntry::settled(group("fwg-1", "web")));
        let temp = reg.begin_rule_create(&key, rule(0, "22")).unwrap();

        assert_eq!(reg.claim_rule_delete(&key, temp), Claim::Busy);
        assert_eq!(reg.claim_rule_delete(&key, RuleKey::Server(9)), Claim::Missing);

        let real = reg.promote_rule(&key, temp, rule(9, "22"));
        assert_eq!(reg.claim_rule_delete(&key, real), Claim::Claimed);
        assert_eq!(reg.claim_rule_delete(&key, real), Claim::Busy);
    }

    #[test]
    fn group_delete_waits_for_pending_rule_creates() {
        let reg = Registry::new();
        let key = GroupKey::server("fwg-1");
        reg.upsert_group(key.clone(), GroupEntry::settled(group("fwg-1", "web")));
        let temp = reg.begin_rule_create(&key, rule(0, "22")).unwrap();

        assert_eq!(reg.claim_group(&key, GroupOp::Delete), Claim::Busy);
        assert_eq!(reg.claim_group(&key, GroupOp::Update), Claim::Claimed);
        reg.patch_group_lifecycle(&key, |l| GroupOp::Update.release(l));

        reg.promote_rule(&key, temp, rule(9, "22"));
        assert_eq!(reg.claim_group(&key, GroupOp::Delete), Claim::Claimed);
    }

    #[test]
    fn promote_rule_after_group_removal_writes_nothing() {
        let reg = Registry::new();
        let key = GroupKey::server("fwg-1");
        reg.upsert_group(key.clone(), GroupEntry::settled(group("fwg-1", "web")));
        let temp = reg.begin_rule_create(&key, rule(0, "22")).unwrap();
        reg.remove_group(&key);
        let mut stream = reg.subscribe();

        reg.promote_rule(&key, temp, rule(9, "22"));

        assert!(!stream.has_changed());
        let snap = reg.snapshot();
        assert!(snap.group(&key).is_none());
        assert!(snap.rules(&key).is_none());
    }

    #[test]
    fn promote_rule_keeps_lifecycle_of_refreshed_entry() {
        let reg = Registry::new();
        let key = GroupKey::server("fwg-1");
        reg.upsert_group(key.clone(), GroupEntry::settled(group("fwg-1", "web")));
        let temp = reg.begin_rule_create(&key, rule(0, "22")).unwrap();
        reg.upsert_rule(&key, RuleKey::Server(9), RuleEntry::settled(rule(9, "22")));
        reg.patch_rule_lifecycle(&key, RuleKey::Server(9), |l| l.deleting = true);

        let real = reg.promote_rule(&key, temp, rule(9, "22"));

        let snap = reg.snapshot();
        let rules = snap.rules(&key).unwrap();
        assert_eq!(rules.len(), 1);
        assert!(rules[&real].lifecycle.deleting);
        assert!(!rules[&real].lifecycle.creating);
    }

    #[test]
    fn subscribers_see_only_real_changes() {
        let reg = Registry::new();
        let key = GroupKey::server("fwg-1");
        let entry = GroupEntry::settled(group("fwg-1", "web"));
        let mut stream = reg.subscribe();

        reg.upsert_group(key.clone(), entry.clone());
        assert!(stream.has_changed());
        stream.mark_seen();

        reg.upsert_group(key, entry);
        assert!(!stream.has_changed());
    }
}

// ── Reconciliation of fetched server lists ──
//
// Merges an authoritative list into one registry scope: new items are
// inserted, known items get their payload replaced, and local items the
// server no longer reports are pruned. Entries with a mutation in flight
// keep their lifecycle and are never pruned. Each merge is a single
// registry write.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use super::registry::Registry;
use crate::model::{Group, GroupEntry, GroupKey, Rule, RuleEntry, RuleKey};

/// What one merge changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
    /// In-flight entries kept despite being absent from the server list.
    pub retained: usize,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.inserted == 0 && self.updated == 0 && self.removed == 0
    }

    fn changed(&self) -> bool {
        !self.is_noop()
    }

    pub(crate) fn absorb(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.removed += other.removed;
        self.retained += other.retained;
    }
}

/// Payload / lifecycle split shared by group and rule entries.
trait Reconcilable {
    type Payload: PartialEq;

    fn in_flight(&self) -> bool;
    fn payload(&self) -> &Self::Payload;
    fn set_payload(&mut self, payload: Self::Payload);
}

impl Reconcilable for GroupEntry {
    type Payload = Group;

    fn in_flight(&self) -> bool {
        self.lifecycle.in_flight()
    }
    fn payload(&self) -> &Group {
        &self.group
    }
    fn set_payload(&mut self, payload: Group) {
        self.group = payload;
    }
}

impl Reconcilable for RuleEntry {
    type Payload = Rule;

    fn in_flight(&self) -> bool {
        self.lifecycle.in_flight()
    }
    fn payload(&self) -> &Rule {
        &self.rule
    }
    fn set_payload(&mut self, payload: Rule) {
        self.rule = payload;
    }
}

/// Plan a merge without mutating, so a no-op merge publishes nothing.
struct MergePlan<K, P> {
    upserts: Vec<(K, P, bool)>,
    removals: Vec<K>,
    report: ReconcileReport,
}

fn plan_merge<K, E>(local: &BTreeMap<K, E>, incoming: Vec<(K, E::Payload)>) -> MergePlan<K, E::Payload>
where
    K: Ord + Clone,
    E: Reconcilable,
{
    let mut report = ReconcileReport::default();
    let mut upserts = Vec::new();
    let mut seen = BTreeSet::new();

    for (key, payload) in incoming {
        if !seen.insert(key.clone()) {
            continue;
        }
        match local.get(&key) {
            None => {
                report.inserted += 1;
                upserts.push((key, payload, true));
            }
            Some(existing) if *existing.payload() == payload => {}
            Some(_) => {
                report.updated += 1;
                upserts.push((key, payload, false));
            }
        }
    }

    let mut removals = Vec::new();
    for (key, entry) in local {
        if seen.contains(key) {
            continue;
        }
        if entry.in_flight() {
            report.retained += 1;
        } else {
            report.removed += 1;
            removals.push(key.clone());
        }
    }

    MergePlan {
        upserts,
        removals,
        report,
    }
}

impl Registry {
    /// Merge a fetched group list. Removing a group drops its rules and drafts.
    pub fn reconcile_groups(&self, groups: Vec<Group>) -> ReconcileReport {
        let incoming: Vec<_> = groups
            .into_iter()
            .map(|g| (GroupKey::Server(g.id.clone()), g))
            .collect();

        let report = self.write(|s| {
            let plan = plan_merge(s.groups(), incoming);
            if !plan.report.changed() {
                return (false, plan.report);
            }
            for key in plan.removals {
                s.take_group(&key);
            }
            for (key, group, is_new) in plan.upserts {
                if is_new {
                    s.put_group(key, GroupEntry::settled(group));
                } else if let Some(entry) = s.groups_mut().get_mut(&key) {
                    entry.set_payload(group);
                }
            }
            (true, plan.report)
        });

        debug!(?report, "reconciled groups");
        report
    }

    /// Merge a fetched rule list for one group. No-op if the group is gone.
    pub fn reconcile_rules(&self, group: &GroupKey, rules: Vec<Rule>) -> ReconcileReport {
        let incoming: Vec<_> = rules
            .into_iter()
            .map(|r| (RuleKey::Server(r.id), r))
            .collect();

        let report = self.write(|s| {
            if s.group(group).is_none() {
                return (false, ReconcileReport::default());
            }
            let empty = BTreeMap::new();
            let local = s.rules(group).unwrap_or(&empty);
            let plan = plan_merge(local, incoming);
            // First fetch of an empty group still creates the slot
            let first_fetch = s.rules(group).is_none();
            if !plan.report.changed() && !first_fetch {
                return (false, plan.report);
            }
            let map = s.rules_mut(group);
            for key in plan.removals {
                map.remove(&key);
            }
            for (key, rule, is_new) in plan.upserts {
                if is_new {
                    map.insert(key, RuleEntry::settled(rule));
                } else if let Some(entry) = map.get_mut(&key) {
                    entry.set_payload(rule);
                }
            }
            (true, plan.report)
        });

        debug!(group = %group, ?report, "reconciled rules");
        report
    }
}

impl Registry {
    /// Merge one fetched group. Other groups are left alone.
    pub fn merge_group(&self, group: Group) -> ReconcileReport {
        let key = GroupKey::Server(group.id.clone());
        self.write(|s| match s.groups().get(&key) {
            None => {
                s.put_group(key, GroupEntry::settled(group));
                (true, ReconcileReport { inserted: 1, ..ReconcileReport::default() })
            }
            Some(existing) if existing.group == group => (false, ReconcileReport::default()),
            Some(_) => {
                if let Some(entry) = s.groups_mut().get_mut(&key) {
                    entry.set_payload(group);
                }
                (true, ReconcileReport { updated: 1, ..ReconcileReport::default() })
            }
        })
    }

    /// Merge one fetched rule into a known group. No-op if the group is gone.
    pub fn merge_rule(&self, group: &GroupKey, rule: Rule) -> ReconcileReport {
        let key = RuleKey::Server(rule.id);
        self.write(|s| {
            if s.group(group).is_none() {
                return (false, ReconcileReport::default());
            }
            match s.rule(group, key) {
                Some(existing) if existing.rule == rule => (false, ReconcileReport::default()),
                Some(_) => {
                    if let Some(entry) = s.rules_mut(group).get_mut(&key) {
                        entry.set_payload(rule);
                    }
                    (true, ReconcileReport { updated: 1, ..ReconcileReport::default() })
                }
                None => {
                    s.rules_mut(group).insert(key, RuleEntry::settled(rule));
                    (true, ReconcileReport { inserted: 1, ..ReconcileReport::default() })
                }
            }
        })
    }
}

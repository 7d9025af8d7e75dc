//! Optimistic firewall state engine between `lavascope-api` and the CLI.
//!
//! - **[`Registry`]**: one immutable [`RegistrySnapshot`] of groups, rules
//!   and drafts behind a `tokio::sync::watch` channel. Every write is a single
//!   `send_if_modified` step, so readers never observe a partial update.
//!
//! - **Reconciliation** ([`Registry::reconcile_groups`],
//!   [`Registry::reconcile_rules`]): folds a fetched server list into one
//!   scope, leaving entries with a mutation in flight untouched.
//!
//! - **[`MutationCoordinator`]**: optimistic create / update / delete with
//!   temp-id placeholders, promotion, and rollback on failure.
//!
//! - **[`Controller`]**: facade owning the registry, the coordinator and the
//!   remote [`FirewallService`]; runs explicit and periodic refreshes.

pub mod config;
pub mod controller;
pub mod draft;
pub mod error;
pub mod model;
pub mod mutation;
pub mod notify;
pub mod remote;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::ControllerConfig;
pub use controller::Controller;
pub use draft::{GroupDrafts, ProtocolChoice, RuleDraft, RuleDrafts, SourceType, protocol_label};
pub use error::{CoreError, ErrorClass, TransportKind};
pub use model::{
    Group, GroupEntry, GroupKey, GroupLifecycle, IpType, Protocol, Rule, RuleAction, RuleEntry,
    RuleKey, RuleLifecycle,
};
pub use mutation::MutationCoordinator;
pub use notify::{Notifier, TracingNotifier};
pub use remote::FirewallService;
pub use store::{Claim, GroupOp, ReconcileReport, Registry, RegistrySnapshot};
pub use stream::RegistryStream;

// ── Registry store ──
//
// The canonical client-side state plus the merge logic that folds fetched
// server lists into it.

mod reconcile;
mod registry;

pub use reconcile::ReconcileReport;
pub use registry::{Claim, GroupMap, GroupOp, Registry, RegistrySnapshot, RuleMap};

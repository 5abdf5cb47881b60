//! runnergrid-engine — the reconciliation engine.
//!
//! Splits into a pure capacity planner and a concurrent reconciler:
//!
//! - [`plan`] maps one ASG's configuration, its fresh provider reading
//!   and the tick's [`ClusterState`](runnergrid_gitlab::ClusterState)
//!   to a [`Decision`]. It never blocks and has no side effects.
//! - [`Reconciler`] runs one worker per ASG per tick: read the group,
//!   account its allocation, plan, and write the new target when the
//!   decision calls for one. A failing group never stalls the others.

mod planner;
mod reconciler;

pub use planner::{plan, Decision};
pub use reconciler::Reconciler;

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Declarative topic reconciliation.
//!
//! Computes the delta between a desired set of topic definitions and live
//! cluster state, then applies it all-or-nothing: creates first, edits
//! second, nothing at all when any edit would touch an immutable
//! attribute. Confirmation is requested exactly once per actionable plan.

use crate::admin::{AdminError, TopicAdmin, TopicFilter};
use crate::confirm::Confirm;
use crate::diff::TopicDiff;
use crate::topic::TopicSpec;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Reconciliation errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("duplicate topic name in desired set: {0}")]
    DuplicateTopic(String),

    #[error(
        "changes to partitions or replication factor cannot be applied to existing topics: {}",
        .0.join(", ")
    )]
    ImmutableChange(Vec<String>),

    #[error("plan invariant violated: {0}")]
    InvariantViolated(String),

    #[error("apply rejected by operator")]
    Aborted,

    #[error(transparent)]
    Admin(#[from] AdminError),
}

/// The computed delta: three disjoint, collectively exhaustive sequences
/// over the desired set, plus the diff backing each edit.
#[derive(Debug, Default)]
pub struct Plan {
    pub to_create: Vec<TopicSpec>,
    pub to_edit: Vec<TopicSpec>,
    pub to_ignore: Vec<TopicSpec>,
    /// Diff per `to_edit` entry, keyed by topic name.
    pub diffs: BTreeMap<String, TopicDiff>,
}

impl Plan {
    /// True when there is nothing to create and nothing to edit.
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_edit.is_empty()
    }

    /// Names of edits blocked by immutable-attribute changes.
    pub fn blocked(&self) -> Vec<String> {
        self.diffs
            .values()
            .filter(|diff| !diff.is_valid())
            .map(|diff| diff.name.clone())
            .collect()
    }
}

/// Summary counts reported after a (possibly no-op) apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyReport {
    pub unchanged: usize,
    pub created: usize,
    pub changed: usize,
}

/// Classify every desired topic as create, edit or ignore.
///
/// The listing is restricted to the desired names as an efficiency
/// filter; correctness does not depend on the broker honoring it.
pub fn plan(desired: &[TopicSpec], admin: &dyn TopicAdmin) -> Result<Plan, ReconcileError> {
    let mut names: HashSet<&str> = HashSet::with_capacity(desired.len());
    for topic in desired {
        if !names.insert(topic.name.as_str()) {
            return Err(ReconcileError::DuplicateTopic(topic.name.clone()));
        }
    }

    let filter = TopicFilter::one_of(names.iter().copied());
    let existing: HashSet<String> = admin
        .list_topics(&filter)?
        .into_iter()
        .map(|t| t.name)
        .collect();

    let mut plan = Plan::default();
    for topic in desired {
        if !existing.contains(&topic.name) {
            plan.to_create.push(topic.clone());
            continue;
        }
        let diff = admin.diff(topic)?;
        if diff.has_changes() || !diff.is_valid() {
            plan.diffs.insert(topic.name.clone(), diff);
            plan.to_edit.push(topic.clone());
        } else {
            plan.to_ignore.push(topic.clone());
        }
    }

    check_invariant(&plan, desired)?;
    Ok(plan)
}

/// Defensive internal-consistency check: the three sequences must be
/// pairwise disjoint by name and their union must equal the desired set.
/// Never expected to fire in correct operation.
fn check_invariant(plan: &Plan, desired: &[TopicSpec]) -> Result<(), ReconcileError> {
    let create: HashSet<&str> = plan.to_create.iter().map(|t| t.name.as_str()).collect();
    let edit: HashSet<&str> = plan.to_edit.iter().map(|t| t.name.as_str()).collect();
    let ignore: HashSet<&str> = plan.to_ignore.iter().map(|t| t.name.as_str()).collect();

    if !create.is_disjoint(&edit) || !create.is_disjoint(&ignore) || !edit.is_disjoint(&ignore) {
        return Err(ReconcileError::InvariantViolated(
            "create/edit/ignore sequences overlap".into(),
        ));
    }

    let total = create.len() + edit.len() + ignore.len();
    if total != desired.len() {
        return Err(ReconcileError::InvariantViolated(format!(
            "plan covers {} topics, desired set has {}",
            total,
            desired.len()
        )));
    }

    Ok(())
}

/// Apply a plan all-or-nothing.
///
/// Empty plans short-circuit without prompting. Any blocked edit aborts
/// the whole plan before the first mutating call. Admin failures
/// propagate without local rollback; the cluster stays authoritative.
pub fn apply(
    plan: &Plan,
    admin: &mut dyn TopicAdmin,
    confirm: &dyn Confirm,
) -> Result<ApplyReport, ReconcileError> {
    if plan.is_empty() {
        tracing::info!("no changes detected, nothing to apply");
        return Ok(ApplyReport {
            unchanged: plan.to_ignore.len(),
            created: 0,
            changed: 0,
        });
    }

    let blocked = plan.blocked();
    if !blocked.is_empty() {
        return Err(ReconcileError::ImmutableChange(blocked));
    }

    if !confirm.ask("Apply changes?") {
        return Err(ReconcileError::Aborted);
    }

    // Create before edit: new topics must exist before any alteration can
    // target them. The two sets are disjoint by construction.
    if !plan.to_create.is_empty() {
        admin.create(&plan.to_create)?;
    }
    if !plan.to_edit.is_empty() {
        admin.alter(&plan.to_edit)?;
    }

    tracing::info!(
        created = plan.to_create.len(),
        changed = plan.to_edit.len(),
        unchanged = plan.to_ignore.len(),
        "applied topic changes"
    );

    Ok(ApplyReport {
        unchanged: plan.to_ignore.len(),
        created: plan.to_create.len(),
        changed: plan.to_edit.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::testing::MemoryAdmin;
    use crate::confirm::testing::ScriptedConfirm;
    use crate::confirm::AutoApprove;

    fn desired_orders() -> TopicSpec {
        TopicSpec::new("orders")
            .partitions(3)
            .replication(2)
            .config_entry("retention.ms", "86400000")
    }

    #[test]
    fn test_plan_partition_is_disjoint_and_exhaustive() {
        let admin = MemoryAdmin::with_topics(vec![
            desired_orders(),
            TopicSpec::new("payments").config_entry("retention.ms", "1000"),
        ]);
        let desired = vec![
            desired_orders(),                                       // unchanged
            TopicSpec::new("payments"),                             // config removal -> edit
            TopicSpec::new("shipments").partitions(6),              // absent -> create
        ];

        let plan = plan(&desired, &admin).expect("plan");

        assert_eq!(plan.to_create.len(), 1);
        assert_eq!(plan.to_edit.len(), 1);
        assert_eq!(plan.to_ignore.len(), 1);
        assert_eq!(plan.to_create[0].name, "shipments");
        assert_eq!(plan.to_edit[0].name, "payments");
        assert_eq!(plan.to_ignore[0].name, "orders");
        assert!(plan.diffs.contains_key("payments"));
        assert!(!plan.diffs.contains_key("orders"));
    }

    #[test]
    fn test_plan_rejects_duplicates_before_cluster_contact() {
        let admin = MemoryAdmin::new();
        let desired = vec![TopicSpec::new("orders"), TopicSpec::new("orders")];

        assert!(matches!(
            plan(&desired, &admin),
            Err(ReconcileError::DuplicateTopic(name)) if name == "orders"
        ));
    }

    #[test]
    fn test_empty_plan_skips_confirmation() {
        let mut admin = MemoryAdmin::with_topics(vec![desired_orders()]);
        let desired = vec![desired_orders()];

        let p = plan(&desired, &admin).expect("plan");
        assert!(p.is_empty());

        let confirm = ScriptedConfirm::new(false);
        let report = apply(&p, &mut admin, &confirm).expect("no-op apply");

        assert_eq!(confirm.times_asked(), 0);
        assert!(admin.mutations.is_empty());
        assert_eq!(
            report,
            ApplyReport {
                unchanged: 1,
                created: 0,
                changed: 0
            }
        );
    }

    #[test]
    fn test_apply_asks_exactly_once() {
        let mut admin = MemoryAdmin::with_topics(vec![desired_orders()]);
        let desired = vec![
            desired_orders().config_entry("cleanup.policy", "compact"),
            TopicSpec::new("shipments"),
        ];

        let p = plan(&desired, &admin).expect("plan");
        let confirm = ScriptedConfirm::new(true);
        let report = apply(&p, &mut admin, &confirm).expect("apply");

        assert_eq!(confirm.times_asked(), 1);
        assert_eq!(report.created, 1);
        assert_eq!(report.changed, 1);
    }

    #[test]
    fn test_rejection_applies_nothing() {
        let mut admin = MemoryAdmin::new();
        let desired = vec![TopicSpec::new("orders")];

        let p = plan(&desired, &admin).expect("plan");
        let confirm = ScriptedConfirm::new(false);

        assert!(matches!(
            apply(&p, &mut admin, &confirm),
            Err(ReconcileError::Aborted)
        ));
        assert!(admin.mutations.is_empty());
    }

    #[test]
    fn test_scenario_a_create_missing_topic() {
        let mut admin = MemoryAdmin::new();
        let desired = vec![desired_orders()];

        let p = plan(&desired, &admin).expect("plan");
        assert_eq!(p.to_create.len(), 1);
        assert!(p.to_edit.is_empty());
        assert!(p.to_ignore.is_empty());

        apply(&p, &mut admin, &AutoApprove).expect("apply");

        let live = admin.get("orders").expect("created");
        assert_eq!(live.partitions, 3);
        assert_eq!(live.config.get("retention.ms").map(String::as_str), Some("86400000"));
    }

    #[test]
    fn test_scenario_b_edit_config_value() {
        let mut admin = MemoryAdmin::with_topics(vec![desired_orders()]);
        let desired = vec![desired_orders().config_entry("retention.ms", "3600000")];

        let p = plan(&desired, &admin).expect("plan");
        assert!(p.to_create.is_empty());
        assert_eq!(p.to_edit.len(), 1);
        assert!(p.diffs["orders"].is_valid());

        apply(&p, &mut admin, &AutoApprove).expect("apply");

        let live = admin.get("orders").expect("live");
        assert_eq!(live.config.get("retention.ms").map(String::as_str), Some("3600000"));
    }

    #[test]
    fn test_scenario_c_immutable_change_aborts_whole_plan() {
        let mut admin = MemoryAdmin::with_topics(vec![desired_orders()]);
        // Partition bump on an existing topic, plus an otherwise fine create.
        let desired = vec![
            desired_orders().partitions(6),
            TopicSpec::new("shipments"),
        ];

        let p = plan(&desired, &admin).expect("plan");
        let confirm = ScriptedConfirm::new(true);
        let err = apply(&p, &mut admin, &confirm).expect_err("blocked");

        assert!(matches!(err, ReconcileError::ImmutableChange(ref names) if names == &["orders"]));
        assert_eq!(confirm.times_asked(), 0);
        assert!(admin.mutations.is_empty());
        assert!(admin.get("shipments").is_err());
    }

    #[test]
    fn test_concurrent_create_conflict_propagates() {
        let mut admin = MemoryAdmin::new();
        let desired = vec![TopicSpec::new("orders")];
        let p = plan(&desired, &admin).expect("plan");

        // Another actor wins the race before apply.
        admin
            .create(&[TopicSpec::new("orders")])
            .expect("concurrent create");
        admin.mutations.clear();

        assert!(matches!(
            apply(&p, &mut admin, &AutoApprove),
            Err(ReconcileError::Admin(AdminError::TopicAlreadyExists(_)))
        ));
    }
}

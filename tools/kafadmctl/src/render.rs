// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Human-readable rendering for plans, diffs and topic details.

use colored::Colorize;
use kafadm::reconcile::Plan;
use kafadm::{TopicDiff, TopicSpec};
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "Topic")]
    topic: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

/// Render the reconciliation plan as one table, unchanged topics included.
pub fn plan_table(plan: &Plan) -> String {
    let mut rows = Vec::new();

    for topic in &plan.to_create {
        rows.push(PlanRow {
            topic: topic.name.clone(),
            action: "create".to_string(),
            detail: format!(
                "{} partition(s), replication {}",
                topic.partitions, topic.replication
            ),
        });
    }
    for topic in &plan.to_edit {
        let detail = plan
            .diffs
            .get(&topic.name)
            .map(diff_summary)
            .unwrap_or_default();
        rows.push(PlanRow {
            topic: topic.name.clone(),
            action: "edit".to_string(),
            detail,
        });
    }
    for topic in &plan.to_ignore {
        rows.push(PlanRow {
            topic: topic.name.clone(),
            action: "unchanged".to_string(),
            detail: String::new(),
        });
    }

    Table::new(rows).to_string()
}

/// One line per changed config key, `old -> new`.
pub fn diff_lines(diff: &TopicDiff) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some((live, wanted)) = diff.partition_change {
        lines.push(format!("partitions: {live} -> {wanted} (immutable)"));
    }
    if let Some((live, wanted)) = diff.replication_change {
        lines.push(format!("replication: {live} -> {wanted} (immutable)"));
    }
    for change in &diff.config_changes {
        let old = change.old.as_deref().unwrap_or("(unset)");
        let new = change.new.as_deref().unwrap_or("(removed)");
        lines.push(format!("{}: {} -> {}", change.key, old, new));
    }
    lines
}

fn diff_summary(diff: &TopicDiff) -> String {
    diff_lines(diff).join(", ")
}

#[derive(Tabled)]
struct ConfigRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Render one topic's definition: header line plus config table.
pub fn topic_details(spec: &TopicSpec) -> String {
    let mut out = format!(
        "{}\n  Partitions:  {}\n  Replication: {}\n",
        format!("Topic: {}", spec.name).cyan().bold(),
        spec.partitions,
        spec.replication
    );

    if spec.config.is_empty() {
        out.push_str(&format!("  {}\n", "No per-topic config set".yellow()));
    } else {
        let rows: Vec<ConfigRow> = spec
            .config
            .iter()
            .map(|(key, value)| ConfigRow {
                key: key.clone(),
                value: value.clone(),
            })
            .collect();
        out.push_str(&Table::new(rows).to_string());
        out.push('\n');
    }

    out
}

/// Format a latency sample in milliseconds.
pub fn format_ms(ms: f64) -> String {
    format!("{ms:.2}ms")
}

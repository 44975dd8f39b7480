use crate::block::{collect_footprints, group_footprints, order_blocks, ScheduleBlock};
use crate::error::Result;
use devbench_protocol::{DependencyGraphRecord, DevelopmentStep, NodeId, TraceRecord};
use std::collections::BTreeSet;

/// Development schedule plus the merged call graph behind each step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DevelopmentPlan {
    pub steps: Vec<DevelopmentStep>,
    pub dependency_graphs: Vec<DependencyGraphRecord>,
}

fn sorted(nodes: &BTreeSet<NodeId>) -> Vec<NodeId> {
    nodes.iter().cloned().collect()
}

/// Walk ordered blocks, claiming each core node for the first block that contains it.
///
/// Steps are numbered from 0 and only blocks that claim something produce a step.
pub fn plan_development(blocks: &[ScheduleBlock]) -> DevelopmentPlan {
    let mut plan = DevelopmentPlan::default();
    let mut claimed: BTreeSet<NodeId> = BTreeSet::new();

    for block in blocks {
        let classes = &block.classification;
        let nodes_to_develop: BTreeSet<NodeId> =
            classes.core_nodes.difference(&claimed).cloned().collect();

        if !nodes_to_develop.is_empty() {
            let step = plan.steps.len();
            log::debug!(
                "Step {step}: {} new of {} core nodes ({} tests)",
                nodes_to_develop.len(),
                classes.core_nodes.len(),
                block.test_ids.len()
            );
            plan.steps.push(DevelopmentStep {
                step,
                test_ids: block.test_ids.clone(),
                root_nodes: block.root_nodes.clone(),
                test_nodes: sorted(&classes.test_nodes),
                core_nodes: sorted(&classes.core_nodes),
                target_test_nodes: sorted(&classes.target_test_nodes),
                dependent_test_nodes: sorted(&classes.dependent_test_nodes),
                target_core_nodes: sorted(&classes.target_core_nodes),
                dependent_core_nodes: sorted(&classes.dependent_core_nodes),
                nodes_to_develop: sorted(&nodes_to_develop),
            });
            plan.dependency_graphs.push(DependencyGraphRecord {
                step,
                dependency_graph: block.graph.to_node_link(),
            });
        }

        claimed.extend(classes.core_nodes.iter().cloned());
    }

    plan
}

/// Full scheduling pass: trace filtering, grouping, ordering, claiming.
pub fn build_schedule(traces: &[TraceRecord]) -> Result<DevelopmentPlan> {
    let footprints = collect_footprints(traces);
    let mut blocks = group_footprints(&footprints)?;
    order_blocks(&mut blocks);
    let plan = plan_development(&blocks);
    log::info!(
        "Scheduled {} development steps from {} blocks",
        plan.steps.len(),
        blocks.len()
    );
    Ok(plan)
}

/// Union of `nodes-to-develop` across steps.
pub fn collect_nodes_to_develop(steps: &[DevelopmentStep]) -> BTreeSet<NodeId> {
    steps
        .iter()
        .flat_map(|step| step.nodes_to_develop.iter().cloned())
        .collect()
}

use crate::error::Result;
use devbench_graph::{core_nodes, CallGraph, Classification};
use devbench_protocol::{NodeId, TraceRecord};
use std::collections::{BTreeSet, HashMap};

/// One usable trace: its root appears in its own call graph.
#[derive(Debug, Clone)]
pub struct TraceFootprint {
    pub test_id: String,
    pub root: NodeId,
    pub graph: CallGraph,
    pub core: BTreeSet<NodeId>,
}

/// Traces sharing an identical core-node set, merged.
#[derive(Debug, Clone)]
pub struct ScheduleBlock {
    pub test_ids: Vec<String>,
    pub root_nodes: Vec<NodeId>,
    pub graph: CallGraph,
    pub classification: Classification,
}

impl ScheduleBlock {
    pub fn core_count(&self) -> usize {
        self.classification.core_nodes.len()
    }
}

/// Build per-trace graphs, dropping traces whose root never shows up in its own graph.
pub fn collect_footprints(traces: &[TraceRecord]) -> Vec<TraceFootprint> {
    let mut footprints = Vec::with_capacity(traces.len());
    for trace in traces {
        let graph = CallGraph::from_trace(trace);
        if !graph.contains(&trace.test_func_id) {
            log::debug!(
                "Skipping {}: root {} not in its call graph",
                trace.test_id,
                trace.test_func_id
            );
            continue;
        }
        let core = core_nodes(&graph);
        footprints.push(TraceFootprint {
            test_id: trace.test_id.clone(),
            root: trace.test_func_id.clone(),
            graph,
            core,
        });
    }
    log::info!(
        "Collected {} call graphs from {} traces",
        footprints.len(),
        traces.len()
    );
    footprints
}

/// Group footprints by exact core-node set. Groups keep the order in which their first member
/// was seen; members keep input order.
pub fn group_footprints(footprints: &[TraceFootprint]) -> Result<Vec<ScheduleBlock>> {
    let mut groups: Vec<Vec<&TraceFootprint>> = Vec::new();
    let mut group_of: HashMap<&BTreeSet<NodeId>, usize> = HashMap::new();

    for footprint in footprints {
        match group_of.get(&footprint.core) {
            Some(&idx) => groups[idx].push(footprint),
            None => {
                group_of.insert(&footprint.core, groups.len());
                groups.push(vec![footprint]);
            }
        }
    }

    groups
        .into_iter()
        .map(|members| -> Result<ScheduleBlock> {
            let graphs: Vec<&CallGraph> = members.iter().map(|m| &m.graph).collect();
            let graph = CallGraph::merge(&graphs)?;
            let test_ids = members.iter().map(|m| m.test_id.clone()).collect();
            let root_nodes: Vec<NodeId> = members.iter().map(|m| m.root.clone()).collect();
            let classification = Classification::compute(&graph, &root_nodes);
            Ok(ScheduleBlock {
                test_ids,
                root_nodes,
                graph,
                classification,
            })
        })
        .collect()
}

/// Stable sort by ascending core-node count; equal sizes keep discovery order.
pub fn order_blocks(blocks: &mut [ScheduleBlock]) {
    blocks.sort_by_key(ScheduleBlock::core_count);
}

use std::fmt::Display;
use std::sync::Arc;

use crate::config::ReducerConfig;
use crate::execution::{ExecutionMetadata, StageMonitor};
use crate::operator::group_fold::{node_groups, NodeAccumulator, NodeGroups};
use crate::operator::{Operator, StreamElement};
use crate::record::{IntermediateRecord, NodeId, RankedNode};
use crate::structure::{BlockStructure, OperatorStructure};

/// The reducer: compute the new rank of every node of a grouped stream of intermediate records.
///
/// `new_rank = (1 - damping) / total_nodes + damping * sum(contributions)`
///
/// A node without contributions gets `(1 - damping) / total_nodes`. A node that received
/// contributions but no `ADJ` record (an edge towards a node missing from the graph) is emitted
/// as a dangling node, so that it is part of the input of the next iteration.
#[derive(Debug)]
pub struct RankUpdate<PreviousOperator> {
    groups: NodeGroups<PreviousOperator>,
    config: ReducerConfig,
    monitor: Arc<StageMonitor>,
}

impl<PreviousOperator> RankUpdate<PreviousOperator>
where
    PreviousOperator: Operator<Out = IntermediateRecord>,
{
    pub(crate) fn new(prev: PreviousOperator, config: ReducerConfig) -> Self {
        Self {
            groups: node_groups(prev),
            config,
            monitor: Default::default(),
        }
    }

    fn ranked(&self, node: NodeId, acc: NodeAccumulator) -> RankedNode {
        let adjacency = acc.adjacency.unwrap_or_else(|| {
            warn!("node {node:?} has contributions but no adjacency list, treating it as dangling");
            self.monitor.record_missing_adjacency();
            Default::default()
        });
        RankedNode {
            rank: self.config.rank(acc.contributions),
            node,
            adjacency,
        }
    }
}

impl<PreviousOperator: Operator> Display for RankUpdate<PreviousOperator> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> RankUpdate", self.groups)
    }
}

impl<PreviousOperator> Operator for RankUpdate<PreviousOperator>
where
    PreviousOperator: Operator<Out = IntermediateRecord>,
{
    type Out = RankedNode;

    fn setup(&mut self, metadata: &mut ExecutionMetadata) {
        self.groups.setup(metadata);
        self.monitor = metadata.monitor.clone();
    }

    fn next(&mut self) -> StreamElement<RankedNode> {
        self.groups
            .next()
            .map(|(node, acc)| self.ranked(node, acc))
    }

    fn structure(&self) -> BlockStructure {
        self.groups.structure().add_operator(
            OperatorStructure::new::<RankedNode, _>("RankUpdate").with_subtitle(format!(
                "damping = {}, total_nodes = {}",
                self.config.damping(),
                self.config.total_nodes()
            )),
        )
    }
}

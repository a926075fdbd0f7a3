use std::fmt::Display;

use crate::config::MapperConfig;
use crate::execution::ExecutionMetadata;
use crate::operator::{Operator, StreamElement};
use crate::record::{IntermediateRecord, NodeRecord};
use crate::structure::{BlockStructure, OperatorStructure};

/// Records emitted by the mapper for a single node.
///
/// The first record is always the `ADJ` record of the node, even when the adjacency is empty.
/// Then, if the node has successors, one `PR` record per outgoing edge carrying
/// `rank / outdegree`. The rank of a dangling node is not redistributed.
pub fn node_contributions(record: NodeRecord, config: &MapperConfig) -> Vec<IntermediateRecord> {
    let NodeRecord {
        node,
        rank,
        adjacency,
    } = record;
    let rank = rank.unwrap_or_else(|| config.initial_rank());

    let mut out = Vec::with_capacity(adjacency.outdegree() + 1);
    out.push(IntermediateRecord::adjacency(node, adjacency.clone()));
    if !adjacency.is_empty() {
        let contribution = rank / adjacency.outdegree() as f64;
        out.extend(
            adjacency
                .iter()
                .map(|neighbor| IntermediateRecord::contribution(neighbor.clone(), contribution)),
        );
    }
    out
}

/// The mapper: fan out every node into its adjacency record and its rank contributions.
#[derive(Debug)]
pub struct Contributions<PreviousOperator> {
    prev: PreviousOperator,
    config: MapperConfig,
    // records of the current node not yet returned by next()
    frontiter: Option<std::vec::IntoIter<IntermediateRecord>>,
}

impl<PreviousOperator> Contributions<PreviousOperator> {
    pub(crate) fn new(prev: PreviousOperator, config: MapperConfig) -> Self {
        Self {
            prev,
            config,
            frontiter: None,
        }
    }
}

impl<PreviousOperator: Operator> Display for Contributions<PreviousOperator> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> Contributions", self.prev)
    }
}

impl<PreviousOperator> Operator for Contributions<PreviousOperator>
where
    PreviousOperator: Operator<Out = NodeRecord>,
{
    type Out = IntermediateRecord;

    fn setup(&mut self, metadata: &mut ExecutionMetadata) {
        self.prev.setup(metadata);
    }

    fn next(&mut self) -> StreamElement<IntermediateRecord> {
        loop {
            if let Some(inner) = self.frontiter.as_mut() {
                match inner.next() {
                    Some(item) => return StreamElement::Item(item),
                    None => self.frontiter = None,
                }
            }
            match self.prev.next() {
                StreamElement::Item(record) => {
                    self.frontiter = Some(node_contributions(record, &self.config).into_iter());
                }
                StreamElement::Terminate => return StreamElement::Terminate,
            }
        }
    }

    fn structure(&self) -> BlockStructure {
        self.prev.structure().add_operator(
            OperatorStructure::new::<IntermediateRecord, _>("Contributions").with_subtitle(
                format!("total_nodes = {}", self.config.total_nodes()),
            ),
        )
    }
}

use std::fmt::Display;

use crate::execution::ExecutionMetadata;
use crate::operator::group_fold::{node_groups, NodeAccumulator, NodeGroups};
use crate::operator::{Operator, StreamElement};
use crate::record::{IntermediateRecord, NodeId, Payload};
use crate::structure::{BlockStructure, OperatorStructure};

/// Records emitted by the combiner when the group of `node` is flushed: the `ADJ` record if the
/// group had one, followed by a single `PR` record with the partial sum if it is not zero.
///
/// A zero sum is dropped since the reducer treats a node without contributions as a node whose
/// contributions sum to zero.
pub fn combined_records(node: NodeId, acc: NodeAccumulator) -> Vec<IntermediateRecord> {
    let mut out = Vec::with_capacity(2);
    let partial_sum = (acc.contributions != 0.0).then_some(acc.contributions);
    match (acc.adjacency, partial_sum) {
        (Some(adjacency), Some(sum)) => {
            out.push(IntermediateRecord::adjacency(node.clone(), adjacency));
            out.push(IntermediateRecord::contribution(node, sum));
        }
        (Some(adjacency), None) => out.push(IntermediateRecord::adjacency(node, adjacency)),
        (None, Some(sum)) => out.push(IntermediateRecord::contribution(node, sum)),
        (None, None) => {}
    }
    out
}

/// The combiner: pre-aggregate the contributions of every key of a grouped stream.
///
/// This is an optimization only: running it zero, one or many times, on any partitioning of the
/// records of a key, does not change the result of the reducer.
#[derive(Debug)]
pub struct Combine<PreviousOperator> {
    groups: NodeGroups<PreviousOperator>,
    // records of the last flushed group not yet returned by next()
    frontiter: Option<std::vec::IntoIter<IntermediateRecord>>,
}

impl<PreviousOperator> Combine<PreviousOperator>
where
    PreviousOperator: Operator<Out = IntermediateRecord>,
{
    pub(crate) fn new(prev: PreviousOperator) -> Self {
        Self {
            groups: node_groups(prev),
            frontiter: None,
        }
    }
}

impl<PreviousOperator: Operator> Display for Combine<PreviousOperator> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> Combine", self.groups)
    }
}

impl<PreviousOperator> Operator for Combine<PreviousOperator>
where
    PreviousOperator: Operator<Out = IntermediateRecord>,
{
    type Out = IntermediateRecord;

    fn setup(&mut self, metadata: &mut ExecutionMetadata) {
        self.groups.setup(metadata);
    }

    fn next(&mut self) -> StreamElement<IntermediateRecord> {
        loop {
            if let Some(inner) = self.frontiter.as_mut() {
                match inner.next() {
                    Some(item) => return StreamElement::Item(item),
                    None => self.frontiter = None,
                }
            }
            match self.groups.next() {
                StreamElement::Item((node, acc)) => {
                    self.frontiter = Some(combined_records(node, acc).into_iter());
                }
                StreamElement::Terminate => return StreamElement::Terminate,
            }
        }
    }

    fn structure(&self) -> BlockStructure {
        self.groups
            .structure()
            .add_operator(OperatorStructure::new::<IntermediateRecord, _>("Combine"))
    }
}

/// Sum of the `PR` values of a list of records. Used to compare the output of different combiner
/// configurations.
pub fn contribution_total<'a>(records: impl IntoIterator<Item = &'a IntermediateRecord>) -> f64 {
    records
        .into_iter()
        .map(|record| match &record.payload {
            Payload::Contributions(values) => values.iter().sum::<f64>(),
            Payload::Joined { contributions, .. } => contributions.iter().sum::<f64>(),
            Payload::Adjacency(_) => 0.0,
        })
        .sum()
}

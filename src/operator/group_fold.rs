use std::fmt::{Debug, Display};
use std::sync::Arc;

use thiserror::Error;

use crate::execution::{ExecutionMetadata, StageMonitor};
use crate::operator::{Operator, StreamElement};
use crate::record::{Adjacency, IntermediateRecord, NodeId, Payload};
use crate::structure::{BlockStructure, OperatorStructure};

/// A group violates the invariants of the protocol. This stops the stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    #[error("node {node:?} received more than one ADJ record")]
    DuplicateAdjacency { node: NodeId },
    #[error("the contributions to node {node:?} sum to a non-finite value")]
    SumOverflow { node: NodeId },
}

/// An element of a stream that can be split into a key and a value.
pub trait KeyedItem {
    type Key: PartialEq + Debug;
    type Value;

    fn key(&self) -> &Self::Key;
    fn into_kv(self) -> (Self::Key, Self::Value);
}

impl<K: PartialEq + Debug, V> KeyedItem for (K, V) {
    type Key = K;
    type Value = V;

    fn key(&self) -> &K {
        &self.0
    }

    fn into_kv(self) -> (K, V) {
        self
    }
}

impl KeyedItem for IntermediateRecord {
    type Key = NodeId;
    type Value = Payload;

    fn key(&self) -> &NodeId {
        &self.node
    }

    fn into_kv(self) -> (NodeId, Payload) {
        (self.node, self.payload)
    }
}

/// Fold the runs of consecutive items with the same key, emitting one `(key, accumulator)` pair
/// per run.
///
/// The stream **must** be grouped: all the items with the same key have to be contiguous. This is
/// guaranteed by the shuffle of the external runtime and cannot be checked here; a key that appears
/// in two separate runs produces two separate groups.
///
/// Only the accumulator of the current key is kept in memory. A group is flushed as soon as the
/// first item of the next key arrives, and the last group is flushed when the stream terminates.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct GroupFold<Key, Acc, F, PreviousOperator> {
    prev: PreviousOperator,
    #[derivative(Debug = "ignore")]
    fold: F,
    init: Acc,
    current: Option<(Key, Acc)>,
    received_end: bool,
    stage: &'static str,
    monitor: Arc<StageMonitor>,
}

impl<Key, Acc, F, PreviousOperator> GroupFold<Key, Acc, F, PreviousOperator>
where
    PreviousOperator: Operator,
    PreviousOperator::Out: KeyedItem<Key = Key>,
{
    pub(crate) fn new(prev: PreviousOperator, init: Acc, fold: F) -> Self {
        Self {
            prev,
            fold,
            init,
            current: None,
            received_end: false,
            stage: "",
            monitor: Default::default(),
        }
    }
}

impl<Key: Debug, Acc, F, PreviousOperator> GroupFold<Key, Acc, F, PreviousOperator> {
    /// Give up the stage: nothing else is emitted, not even the pending group.
    fn abort(&mut self, error: IntegrityError) -> StreamElement<(Key, Acc)> {
        self.monitor.fail(error);
        self.current = None;
        self.received_end = true;
        StreamElement::Terminate
    }

    fn flushed(&self, group: (Key, Acc)) -> StreamElement<(Key, Acc)> {
        debug!("{}: flushing group {:?}", self.stage, group.0);
        self.monitor.record_group();
        StreamElement::Item(group)
    }
}

impl<Key, Acc, F, PreviousOperator: Operator> Display
    for GroupFold<Key, Acc, F, PreviousOperator>
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} -> GroupFold<{} -> {}>",
            self.prev,
            std::any::type_name::<PreviousOperator::Out>(),
            std::any::type_name::<Acc>()
        )
    }
}

impl<Key, Acc, F, PreviousOperator> Operator for GroupFold<Key, Acc, F, PreviousOperator>
where
    PreviousOperator: Operator,
    PreviousOperator::Out: KeyedItem<Key = Key>,
    Key: PartialEq + Debug,
    Acc: Clone,
    F: FnMut(
        &Key,
        &mut Acc,
        <PreviousOperator::Out as KeyedItem>::Value,
    ) -> Result<(), IntegrityError>,
{
    type Out = (Key, Acc);

    fn setup(&mut self, metadata: &mut ExecutionMetadata) {
        self.prev.setup(metadata);
        self.stage = metadata.stage;
        self.monitor = metadata.monitor.clone();
    }

    fn next(&mut self) -> StreamElement<(Key, Acc)> {
        while !self.received_end {
            match self.prev.next() {
                StreamElement::Item(item) => {
                    if let Some((key, acc)) = self.current.as_mut() {
                        if key == item.key() {
                            let (_, value) = item.into_kv();
                            if let Err(e) = (self.fold)(&*key, acc, value) {
                                return self.abort(e);
                            }
                            continue;
                        }
                    }

                    // the key changed: start the new group and flush the previous one
                    let (key, value) = item.into_kv();
                    let mut acc = self.init.clone();
                    if let Err(e) = (self.fold)(&key, &mut acc, value) {
                        return self.abort(e);
                    }
                    if let Some(group) = self.current.replace((key, acc)) {
                        return self.flushed(group);
                    }
                }
                StreamElement::Terminate => self.received_end = true,
            }
        }

        // the end of the stream closes the last group
        match self.current.take() {
            Some(group) => self.flushed(group),
            None => StreamElement::Terminate,
        }
    }

    fn structure(&self) -> BlockStructure {
        self.prev
            .structure()
            .add_operator(OperatorStructure::new::<(Key, Acc), _>("GroupFold"))
    }
}

/// Everything a node receives within one iteration: its adjacency list and the sum of its
/// contributions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeAccumulator {
    pub adjacency: Option<Adjacency>,
    pub contributions: f64,
}

impl NodeAccumulator {
    /// Add an intermediate payload to the accumulator of `node`.
    pub fn accumulate(&mut self, node: &NodeId, payload: Payload) -> Result<(), IntegrityError> {
        match payload {
            Payload::Adjacency(adjacency) => self.set_adjacency(node, adjacency),
            Payload::Contributions(values) => self.add(node, &values),
            Payload::Joined {
                adjacency,
                contributions,
            } => {
                self.add(node, &contributions)?;
                self.set_adjacency(node, adjacency)
            }
        }
    }

    fn set_adjacency(&mut self, node: &NodeId, adjacency: Adjacency) -> Result<(), IntegrityError> {
        if self.adjacency.is_some() {
            return Err(IntegrityError::DuplicateAdjacency { node: node.clone() });
        }
        self.adjacency = Some(adjacency);
        Ok(())
    }

    /// The sum must stay finite: `inf` is not a valid value in a `PR` record.
    fn add(&mut self, node: &NodeId, values: &[f64]) -> Result<(), IntegrityError> {
        for value in values {
            self.contributions += value;
        }
        if !self.contributions.is_finite() {
            return Err(IntegrityError::SumOverflow { node: node.clone() });
        }
        Ok(())
    }
}

/// Fold function of the groups of intermediate records.
pub(crate) type NodeFold =
    fn(&NodeId, &mut NodeAccumulator, Payload) -> Result<(), IntegrityError>;

/// Groups of intermediate records, folded into a [`NodeAccumulator`] per node.
pub(crate) type NodeGroups<PreviousOperator> =
    GroupFold<NodeId, NodeAccumulator, NodeFold, PreviousOperator>;

pub(crate) fn node_groups<PreviousOperator>(prev: PreviousOperator) -> NodeGroups<PreviousOperator>
where
    PreviousOperator: Operator<Out = IntermediateRecord>,
{
    let fold: NodeFold = |node, acc, payload| acc.accumulate(node, payload);
    GroupFold::new(prev, NodeAccumulator::default(), fold)
}

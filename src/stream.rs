use std::fmt::Display;
use std::io::Write;
use std::str::FromStr;

use crate::config::{MapperConfig, ReducerConfig};
use crate::execution::{ExecutionMetadata, StageError, StageMonitor, StageReport};
use crate::operator::sink::{CollectVecSink, Sink, StreamOutput, StreamOutputRef, WriteLines};
use crate::operator::source::Source;
use crate::operator::{
    Combine, Contributions, GroupFold, InputLine, IntegrityError, KeyedItem, Operator,
    ParseRecords, RankUpdate, StreamElement,
};
use crate::record::{IntermediateRecord, MalformedRecord, NodeRecord};
use crate::structure::BlockStructure;

/// Entry point of a stage: it owns the metadata shared by the operators of the chain.
#[derive(Debug, Clone)]
pub struct StageContext {
    metadata: ExecutionMetadata,
}

impl StageContext {
    /// Create the context of a stage. `stage` is the name used in the logs.
    pub fn new(stage: &'static str) -> Self {
        Self {
            metadata: ExecutionMetadata::new(stage),
        }
    }

    /// Start a new stream from the given source.
    pub fn stream<S: Source>(&self, source: S) -> Stream<S> {
        Stream {
            operators: source,
            metadata: self.metadata.clone(),
        }
    }

    /// The counters of the stage.
    pub fn monitor(&self) -> &StageMonitor {
        &self.metadata.monitor
    }
}

/// A chain of operators that process the lines of a stage.
///
/// The type of the chain is `OperatorChain`, and the type of the elements of the stream is the
/// output type of its last operator. Nothing is computed until the stream is executed.
#[derive(Debug)]
pub struct Stream<OperatorChain> {
    pub(crate) operators: OperatorChain,
    metadata: ExecutionMetadata,
}

impl<OperatorChain: Operator> Stream<OperatorChain> {
    /// Add a new operator to the chain. This consumes the stream and returns a new one with the
    /// operator added.
    pub(crate) fn add_operator<Op, GetOp>(self, get_operator: GetOp) -> Stream<Op>
    where
        Op: Operator,
        GetOp: FnOnce(OperatorChain) -> Op,
    {
        Stream {
            operators: get_operator(self.operators),
            metadata: self.metadata,
        }
    }

    /// Parse every line into a `T`, skipping and counting the lines that cannot be parsed.
    pub fn parse<T>(self) -> Stream<ParseRecords<T, OperatorChain>>
    where
        T: FromStr<Err = MalformedRecord>,
        OperatorChain::Out: InputLine,
    {
        self.add_operator(ParseRecords::new)
    }

    /// Fold the runs of consecutive elements with the same key.
    ///
    /// The input **must** be grouped by key: see [`GroupFold`].
    pub fn group_fold<Key, Acc, F>(
        self,
        init: Acc,
        fold: F,
    ) -> Stream<GroupFold<Key, Acc, F, OperatorChain>>
    where
        OperatorChain::Out: KeyedItem<Key = Key>,
        Key: PartialEq + std::fmt::Debug,
        Acc: Clone,
        F: FnMut(
            &Key,
            &mut Acc,
            <OperatorChain::Out as KeyedItem>::Value,
        ) -> Result<(), IntegrityError>,
    {
        self.add_operator(|prev| GroupFold::new(prev, init, fold))
    }

    /// Write every element on its own line.
    pub fn write_lines<W: Write>(self, writer: W) -> Stream<WriteLines<W, OperatorChain>>
    where
        OperatorChain::Out: Display,
    {
        self.add_operator(|prev| WriteLines::new(prev, writer))
    }

    /// The structure of the chain, from the source to the last operator.
    pub fn structure(&self) -> BlockStructure {
        self.operators.structure()
    }

    /// Run the chain to completion, collecting all the elements in a vector.
    pub fn collect_vec(self) -> Result<Vec<OperatorChain::Out>, StageError> {
        let output = StreamOutputRef::default();
        let stream = self.add_operator(|prev| CollectVecSink::new(prev, output.clone()));
        stream.execute()?;
        Ok(StreamOutput::from(output).get().unwrap_or_default())
    }
}

impl<OperatorChain> Stream<OperatorChain>
where
    OperatorChain: Operator<Out = NodeRecord>,
{
    /// The mapper: emit the adjacency record and the rank contributions of every node.
    pub fn contributions(self, config: MapperConfig) -> Stream<Contributions<OperatorChain>> {
        self.add_operator(|prev| Contributions::new(prev, config))
    }
}

impl<OperatorChain> Stream<OperatorChain>
where
    OperatorChain: Operator<Out = IntermediateRecord>,
{
    /// The combiner: sum the contributions of every key of a grouped stream.
    pub fn combine(self) -> Stream<Combine<OperatorChain>> {
        self.add_operator(Combine::new)
    }

    /// The reducer: compute the new rank of every node of a grouped stream.
    pub fn reduce_ranks(self, config: ReducerConfig) -> Stream<RankUpdate<OperatorChain>> {
        self.add_operator(|prev| RankUpdate::new(prev, config))
    }
}

impl<OperatorChain: Sink> Stream<OperatorChain> {
    /// Pull all the elements through the chain.
    ///
    /// Returns the counters of the stage, or the first fatal error recorded by the operators.
    pub fn execute(self) -> Result<StageReport, StageError> {
        let Stream {
            mut operators,
            mut metadata,
        } = self;
        operators.setup(&mut metadata);
        info!("{}: running {}", metadata.stage, operators);

        while let StreamElement::Item(()) = operators.next() {}

        match metadata.monitor.take_fault() {
            Some(error) => Err(error),
            None => Ok(metadata.monitor.report()),
        }
    }
}

use std::fmt::Display;

use crate::execution::ExecutionMetadata;
use crate::operator::sink::{Sink, StreamOutputRef};
use crate::operator::{Operator, StreamElement};
use crate::structure::{BlockStructure, OperatorKind, OperatorStructure};

#[derive(Derivative)]
#[derivative(Debug)]
pub struct CollectVecSink<PreviousOperator: Operator> {
    prev: PreviousOperator,
    #[derivative(Debug = "ignore")]
    result: Option<Vec<PreviousOperator::Out>>,
    #[derivative(Debug = "ignore")]
    output: StreamOutputRef<Vec<PreviousOperator::Out>>,
}

impl<PreviousOperator: Operator> CollectVecSink<PreviousOperator> {
    pub(crate) fn new(
        prev: PreviousOperator,
        output: StreamOutputRef<Vec<PreviousOperator::Out>>,
    ) -> Self {
        Self {
            prev,
            result: Some(Vec::new()),
            output,
        }
    }
}

impl<PreviousOperator: Operator> Display for CollectVecSink<PreviousOperator> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> CollectVecSink", self.prev)
    }
}

impl<PreviousOperator: Operator> Operator for CollectVecSink<PreviousOperator> {
    type Out = ();

    fn setup(&mut self, metadata: &mut ExecutionMetadata) {
        self.prev.setup(metadata);
    }

    fn next(&mut self) -> StreamElement<()> {
        match self.prev.next() {
            StreamElement::Item(item) => {
                if let Some(result) = self.result.as_mut() {
                    result.push(item);
                }
                StreamElement::Item(())
            }
            StreamElement::Terminate => {
                if let Some(result) = self.result.take() {
                    *self.output.lock() = Some(result);
                }
                StreamElement::Terminate
            }
        }
    }

    fn structure(&self) -> BlockStructure {
        self.prev.structure().add_operator(
            OperatorStructure::new::<PreviousOperator::Out, _>("CollectVecSink")
                .with_kind(OperatorKind::Sink),
        )
    }
}

impl<PreviousOperator: Operator> Sink for CollectVecSink<PreviousOperator> {}

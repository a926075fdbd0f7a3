use std::fmt::Display;
use std::io::Write;
use std::sync::Arc;

use crate::execution::{ExecutionMetadata, StageMonitor};
use crate::operator::sink::Sink;
use crate::operator::{Operator, StreamElement};
use crate::structure::{BlockStructure, OperatorKind, OperatorStructure};

/// Sink that writes every element on its own line, using its `Display` representation.
///
/// The writer is flushed when the stream terminates. A write error stops the stage: the remaining
/// elements are not pulled.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct WriteLines<W: Write, PreviousOperator> {
    prev: PreviousOperator,
    #[derivative(Debug = "ignore")]
    writer: W,
    monitor: Arc<StageMonitor>,
    terminated: bool,
}

impl<W: Write, PreviousOperator> WriteLines<W, PreviousOperator> {
    pub(crate) fn new(prev: PreviousOperator, writer: W) -> Self {
        Self {
            prev,
            writer,
            monitor: Default::default(),
            terminated: false,
        }
    }

    fn stop(&mut self, error: std::io::Error) -> StreamElement<()> {
        self.monitor.fail(error);
        self.terminated = true;
        StreamElement::Terminate
    }
}

impl<W: Write, PreviousOperator: Operator> Display for WriteLines<W, PreviousOperator> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} -> WriteLines<{}>",
            self.prev,
            std::any::type_name::<W>()
        )
    }
}

impl<W, PreviousOperator> Operator for WriteLines<W, PreviousOperator>
where
    W: Write,
    PreviousOperator: Operator,
    PreviousOperator::Out: Display,
{
    type Out = ();

    fn setup(&mut self, metadata: &mut ExecutionMetadata) {
        self.prev.setup(metadata);
        self.monitor = metadata.monitor.clone();
    }

    fn next(&mut self) -> StreamElement<()> {
        if self.terminated {
            return StreamElement::Terminate;
        }
        match self.prev.next() {
            StreamElement::Item(item) => {
                if let Err(e) = writeln!(self.writer, "{item}") {
                    return self.stop(e);
                }
                self.monitor.record_output();
                StreamElement::Item(())
            }
            StreamElement::Terminate => {
                self.terminated = true;
                if let Err(e) = self.writer.flush() {
                    return self.stop(e);
                }
                StreamElement::Terminate
            }
        }
    }

    fn structure(&self) -> BlockStructure {
        self.prev.structure().add_operator(
            OperatorStructure::new::<PreviousOperator::Out, _>(format!(
                "WriteLines<{}>",
                std::any::type_name::<W>()
            ))
            .with_kind(OperatorKind::Sink),
        )
    }
}

impl<W, PreviousOperator> Sink for WriteLines<W, PreviousOperator>
where
    W: Write,
    PreviousOperator: Operator,
    PreviousOperator::Out: Display,
{
}

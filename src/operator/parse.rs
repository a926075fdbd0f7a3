use std::fmt::Display;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

use crate::execution::{ExecutionMetadata, StageMonitor};
use crate::operator::{Operator, StreamElement};
use crate::record::MalformedRecord;
use crate::structure::{BlockStructure, OperatorStructure};

/// A line of text that may know where it was read from.
pub trait InputLine: AsRef<str> {
    /// Position of the line in the input, starting from 1, if the source keeps track of it.
    fn line_number(&self) -> Option<usize> {
        None
    }
}

impl InputLine for String {}

impl InputLine for &str {}

/// Parse every line into a record, dropping the lines that cannot be parsed.
///
/// A malformed line produces no output at all: it is logged, counted and skipped.
#[derive(Debug)]
pub struct ParseRecords<T, PreviousOperator> {
    prev: PreviousOperator,
    stage: &'static str,
    position: usize,
    monitor: Arc<StageMonitor>,
    _out: PhantomData<T>,
}

impl<T, PreviousOperator> ParseRecords<T, PreviousOperator> {
    pub(crate) fn new(prev: PreviousOperator) -> Self {
        Self {
            prev,
            stage: "",
            position: 0,
            monitor: Default::default(),
            _out: Default::default(),
        }
    }
}

impl<T, PreviousOperator> ParseRecords<T, PreviousOperator>
where
    PreviousOperator: Operator,
    PreviousOperator::Out: InputLine,
{
    /// Number of `line` in the input, or its position in the stream if the source does not know.
    fn line_number(&self, line: &PreviousOperator::Out) -> usize {
        line.line_number().unwrap_or(self.position)
    }
}

impl<T, PreviousOperator: Operator> Display for ParseRecords<T, PreviousOperator> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> ParseRecords<{}>", self.prev, std::any::type_name::<T>())
    }
}

impl<T, PreviousOperator> Operator for ParseRecords<T, PreviousOperator>
where
    T: FromStr<Err = MalformedRecord>,
    PreviousOperator: Operator,
    PreviousOperator::Out: InputLine,
{
    type Out = T;

    fn setup(&mut self, metadata: &mut ExecutionMetadata) {
        self.prev.setup(metadata);
        self.stage = metadata.stage;
        self.monitor = metadata.monitor.clone();
    }

    #[inline]
    fn next(&mut self) -> StreamElement<T> {
        loop {
            match self.prev.next() {
                StreamElement::Item(line) => {
                    self.position += 1;
                    match line.as_ref().parse() {
                        Ok(record) => return StreamElement::Item(record),
                        Err(e) => {
                            debug!(
                                "{}: skipping malformed line {}: {e}: {:?}",
                                self.stage,
                                self.line_number(&line),
                                line.as_ref()
                            );
                            self.monitor.record_malformed();
                        }
                    }
                }
                StreamElement::Terminate => return StreamElement::Terminate,
            }
        }
    }

    fn structure(&self) -> BlockStructure {
        self.prev
            .structure()
            .add_operator(OperatorStructure::new::<T, _>("ParseRecords"))
    }
}

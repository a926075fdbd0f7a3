use std::fmt::Display;
use std::io::BufRead;
use std::sync::Arc;

use crate::execution::{ExecutionMetadata, StageMonitor};
use crate::operator::source::Source;
use crate::operator::{InputLine, Operator, StreamElement};
use crate::record::strip_line_terminator;
use crate::structure::{BlockStructure, OperatorKind, OperatorStructure};

/// A line of the input, without its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// Position of the line in the input, starting from 1. Blank lines are counted.
    pub number: usize,
    pub text: String,
}

impl AsRef<str> for Line {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl PartialEq<&str> for Line {
    fn eq(&self, other: &&str) -> bool {
        self.text == *other
    }
}

impl InputLine for Line {
    fn line_number(&self) -> Option<usize> {
        Some(self.number)
    }
}

/// Source that reads a text stream line by line.
///
/// The line terminators are removed and blank lines are skipped. A line that is not valid UTF-8 is
/// counted as malformed and skipped, while an i/o error stops the stage.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct LineSource<R: BufRead> {
    #[derivative(Debug = "ignore")]
    reader: R,
    buffer: Vec<u8>,
    line_number: usize,
    monitor: Arc<StageMonitor>,
    terminated: bool,
}

impl<R: BufRead> LineSource<R> {
    /// Create a new source that reads the lines from `reader`.
    ///
    /// ## Example
    ///
    /// ```
    /// # use rankflow::StageContext;
    /// # use rankflow::operator::source::LineSource;
    /// let ctx = StageContext::new("example");
    /// let lines = ctx
    ///     .stream(LineSource::new("A\tB\n\nB\tA\n".as_bytes()))
    ///     .collect_vec()
    ///     .unwrap();
    /// assert_eq!(lines, vec!["A\tB", "B\tA"]);
    /// ```
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::new(),
            line_number: 0,
            monitor: Default::default(),
            terminated: false,
        }
    }
}

impl<R: BufRead> Display for LineSource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LineSource<{}>", std::any::type_name::<R>())
    }
}

impl<R: BufRead> Operator for LineSource<R> {
    type Out = Line;

    fn setup(&mut self, metadata: &mut ExecutionMetadata) {
        self.monitor = metadata.monitor.clone();
    }

    fn next(&mut self) -> StreamElement<Line> {
        while !self.terminated {
            self.buffer.clear();
            match self.reader.read_until(b'\n', &mut self.buffer) {
                Ok(0) => self.terminated = true,
                Ok(_) => {
                    self.line_number += 1;
                    let line = match std::str::from_utf8(&self.buffer) {
                        Ok(line) => strip_line_terminator(line),
                        Err(e) => {
                            debug!("skipping line {}: {e}", self.line_number);
                            self.monitor.record_line();
                            self.monitor.record_malformed();
                            continue;
                        }
                    };
                    if line.is_empty() {
                        continue;
                    }
                    self.monitor.record_line();
                    return StreamElement::Item(Line {
                        number: self.line_number,
                        text: line.to_string(),
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => {
                    self.monitor.fail(e);
                    self.terminated = true;
                }
            }
        }
        StreamElement::Terminate
    }

    fn structure(&self) -> BlockStructure {
        let operator =
            OperatorStructure::new::<Line, _>("LineSource").with_kind(OperatorKind::Source);
        BlockStructure::default().add_operator(operator)
    }
}

impl<R: BufRead> Source for LineSource<R> {}

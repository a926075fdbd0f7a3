use std::fmt::Display;

use crate::execution::ExecutionMetadata;
use crate::operator::source::Source;
use crate::operator::{Operator, StreamElement};
use crate::structure::{BlockStructure, OperatorKind, OperatorStructure};

/// Source that emits the items of an iterator, in order.
///
/// Mostly useful for feeding already-parsed records to a stage.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct IteratorSource<It: Iterator> {
    #[derivative(Debug = "ignore")]
    inner: It,
    terminated: bool,
}

impl<It: Iterator> IteratorSource<It> {
    pub fn new<I: IntoIterator<IntoIter = It>>(inner: I) -> Self {
        Self {
            inner: inner.into_iter(),
            terminated: false,
        }
    }
}

impl<It: Iterator> Display for IteratorSource<It> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IteratorSource<{}>", std::any::type_name::<It::Item>())
    }
}

impl<It: Iterator> Operator for IteratorSource<It> {
    type Out = It::Item;

    fn setup(&mut self, _metadata: &mut ExecutionMetadata) {}

    fn next(&mut self) -> StreamElement<It::Item> {
        if self.terminated {
            return StreamElement::Terminate;
        }
        match self.inner.next() {
            Some(item) => StreamElement::Item(item),
            None => {
                self.terminated = true;
                StreamElement::Terminate
            }
        }
    }

    fn structure(&self) -> BlockStructure {
        let operator =
            OperatorStructure::new::<It::Item, _>("IteratorSource").with_kind(OperatorKind::Source);
        BlockStructure::default().add_operator(operator)
    }
}

impl<It: Iterator> Source for IteratorSource<It> {}

#[cfg(test)]
mod tests {
    use crate::execution::ExecutionMetadata;
    use crate::operator::source::IteratorSource;
    use crate::operator::{Operator, StreamElement};

    #[test]
    fn iterator_source_is_fused() {
        let mut source = IteratorSource::new(vec![1, 2]);
        source.setup(&mut ExecutionMetadata::new("test"));
        assert_eq!(source.next(), StreamElement::Item(1));
        assert_eq!(source.next(), StreamElement::Item(2));
        assert_eq!(source.next(), StreamElement::Terminate);
        assert_eq!(source.next(), StreamElement::Terminate);
    }
}

//! Operators that can be chained to build a stage.
//!
//! A stage is a chain of operators nested like the iterators of `std`: the last operator pulls
//! elements from the previous one by calling [`Operator::next`], until the source is exhausted
//! and [`StreamElement::Terminate`] flows down the chain.
use std::fmt::Display;

pub use combine::{combined_records, contribution_total, Combine};
pub use contributions::{node_contributions, Contributions};
pub use group_fold::{GroupFold, IntegrityError, KeyedItem, NodeAccumulator};
pub use parse::{InputLine, ParseRecords};
pub use rank::RankUpdate;

use crate::execution::ExecutionMetadata;
use crate::structure::BlockStructure;

mod combine;
mod contributions;
mod group_fold;
mod parse;
mod rank;
pub mod sink;
pub mod source;

/// An element of the stream: an item or the marker of its end.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamElement<Out> {
    /// A normal element containing just the value of the message.
    Item(Out),
    /// The stream has ended, and no more elements will arrive.
    Terminate,
}

/// An operator represents a unit of computation.
///
/// Each operator owns the previous operator of the chain (if any) and when `next` is called it
/// asks the previous operator for as many elements as it needs to produce its own.
pub trait Operator: Display {
    /// The type of the elements produced by this operator.
    type Out;

    /// Setup the operator chain. This is called before any call to `next` and it's used to pass
    /// the shared metadata of the stage to all the operators of the chain.
    fn setup(&mut self, metadata: &mut ExecutionMetadata);

    /// Take a value from the previous operator, process it and return it.
    ///
    /// Once `Terminate` has been returned, every following call returns `Terminate` again.
    fn next(&mut self) -> StreamElement<Self::Out>;

    /// A more refined representation of the operator and its predecessors.
    fn structure(&self) -> BlockStructure;
}

impl<Out> StreamElement<Out> {
    /// Change the type of the element inside the `StreamElement`.
    pub fn map<NewOut>(self, f: impl FnOnce(Out) -> NewOut) -> StreamElement<NewOut> {
        match self {
            StreamElement::Item(item) => StreamElement::Item(f(item)),
            StreamElement::Terminate => StreamElement::Terminate,
        }
    }

    /// A string representation of the variant of this `StreamElement`.
    pub fn variant_str(&self) -> &'static str {
        match self {
            StreamElement::Item(_) => "Item",
            StreamElement::Terminate => "Terminate",
        }
    }
}

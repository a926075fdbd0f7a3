//! Operators that produce the elements of a stage.
pub use iterator::IteratorSource;
pub use lines::{Line, LineSource};

use crate::operator::Operator;

mod iterator;
mod lines;

/// An operator that does not pull from a previous operator.
pub trait Source: Operator {}

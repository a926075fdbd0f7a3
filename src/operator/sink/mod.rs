//! Operators that consume the elements of a stage.
use std::sync::Arc;

use parking_lot::Mutex;

pub use collect_vec::CollectVecSink;
pub use writer::WriteLines;

use crate::operator::Operator;

mod collect_vec;
mod writer;

/// The last operator of a chain: it consumes the elements and produces nothing.
pub trait Sink: Operator<Out = ()> {}

pub(crate) type StreamOutputRef<Out> = Arc<Mutex<Option<Out>>>;

/// The result of a sink, available once the stage has been executed.
#[derive(Debug)]
pub struct StreamOutput<Out> {
    result: StreamOutputRef<Out>,
}

impl<Out> From<StreamOutputRef<Out>> for StreamOutput<Out> {
    fn from(value: StreamOutputRef<Out>) -> Self {
        Self { result: value }
    }
}

impl<Out> StreamOutput<Out> {
    /// Take the result. `None` if the stage did not run to completion or the result was already
    /// taken.
    pub fn get(self) -> Option<Out> {
        self.result.lock().take()
    }
}

//! Contract between the stages and the runtime that schedules them.
//!
//! The stages only ever see one partition of one iteration. Splitting the input, sorting and
//! grouping the intermediate records by key, moving them between machines and deciding when to
//! stop iterating is the job of an external runtime, described by [`IterationDriver`].
use crate::config::ReducerConfig;
use crate::execution::StageError;

pub use crate::config::{DAMPING_ENV_VAR, TOTAL_NODES_ENV_VAR};

/// Shape of the mapper input on the first iteration: `node\tneighbor1,neighbor2,...`
pub const FIRST_ITERATION_SHAPE: &str = "node\\tadjacency";
/// Shape of the mapper input on the following iterations, i.e. the reducer output:
/// `node\trank\tneighbor1,neighbor2,...`
pub const STEADY_STATE_SHAPE: &str = "node\\trank\\tadjacency";

/// The runtime that runs the iterations of the computation.
///
/// One iteration is: run the mapper on every partition of the current ranks, optionally run the
/// combiner on every sorted map output, shuffle the intermediate records so that every key is
/// contiguous in exactly one reducer partition, run the reducer, and decide whether to continue.
pub trait IterationDriver {
    /// Configuration of the reducer for the given iteration, starting from 1.
    fn reducer_config(&self, iteration: usize) -> ReducerConfig;

    /// Group the intermediate lines produced by the mappers (or combiners) into the reducer
    /// partitions. Every key must end up in exactly one partition, with all its lines contiguous.
    fn shuffle(&mut self, lines: Vec<String>) -> Result<Vec<Vec<String>>, StageError>;

    /// Whether the computation has converged, given the output of two consecutive iterations.
    fn has_converged(&self, previous: &[String], current: &[String]) -> bool;
}

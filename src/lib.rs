//! Streaming stages for computing PageRank as an iterative map/combine/reduce pipeline.
//!
//! Every stage is a chain of pull-based [`Operator`](operator::Operator)s that reads one
//! key-grouped partition line by line and writes its output line by line:
//!
//! - the **mapper** turns `node\trank\tadjacency` records into one `ADJ` record plus one `PR`
//!   contribution per outgoing edge;
//! - the optional **combiner** sums the contributions of each key before the shuffle;
//! - the **reducer** folds a whole group into the next rank of the node.
//!
//! Partitioning, sorting, shuffling and the iteration loop belong to the external runtime, see
//! [`driver::IterationDriver`].
//!
//! ```
//! use rankflow::config::ReducerConfig;
//! use rankflow::stage::reduce_stage;
//!
//! let config = ReducerConfig::new(0.85, 3).unwrap();
//! let input = "A\tADJ\tB\nA\tPR\t0.3333333333333333\n";
//! let mut output = Vec::new();
//! reduce_stage(config, input.as_bytes(), &mut output).unwrap();
//! assert_eq!(String::from_utf8(output).unwrap(), "A\t0.333333\tB\n");
//! ```
#[macro_use]
extern crate derivative;
#[macro_use]
extern crate log;

pub mod config;
pub mod driver;
pub mod execution;
pub mod operator;
pub mod record;
pub mod stage;
mod stream;
pub mod structure;

pub use config::{MapperConfig, ReducerConfig};
pub use execution::{ExecutionMetadata, StageError, StageReport};
pub use stream::{StageContext, Stream};

pub mod prelude {
    pub use super::config::{ConfigError, MapperConfig, ReducerConfig};
    pub use super::execution::{StageError, StageReport};
    pub use super::operator::sink::StreamOutput;
    pub use super::operator::source::{IteratorSource, LineSource};
    pub use super::record::{Adjacency, IntermediateRecord, NodeId, NodeRecord, Payload, Tag};
    pub use super::stage::{combine_stage, map_stage, reduce_stage};
    pub use super::{StageContext, Stream};
}

#![allow(dead_code)] // not all tests use all the members

use std::collections::BTreeMap;
use std::str::FromStr;

use itertools::{process_results, Itertools};
use log::*;
use rand::rngs::SmallRng;
use rand::Rng;

use rankflow::config::{MapperConfig, ReducerConfig};
use rankflow::driver::IterationDriver;
use rankflow::record::NodeRecord;
use rankflow::stage::{combine_stage, map_stage, reduce_stage};
use rankflow::{StageError, StageReport};

/// Helper functions for running the integration tests.
pub struct TestHelper;

impl TestHelper {
    pub fn setup() {
        let _ = env_logger::Builder::new()
            .filter(None, log::LevelFilter::Debug)
            .is_test(true)
            .try_init();
    }

    /// Number of map and reduce partitions to try, from `RANKFLOW_TEST_PARTITIONS`.
    pub fn partitions() -> Vec<usize> {
        Self::parse_list_from_env("RANKFLOW_TEST_PARTITIONS").unwrap_or_else(|| vec![1, 3])
    }

    /// Parse a list of arguments from an environment variable.
    ///
    /// The list should be comma separated without spaces.
    fn parse_list_from_env(var_name: &str) -> Option<Vec<usize>> {
        let content = std::env::var(var_name).ok()?;
        if content.is_empty() {
            return Some(Vec::new());
        }
        let values = content.split(',').map(usize::from_str).collect_vec();
        process_results(values.into_iter(), |values| values.collect_vec()).ok()
    }
}

/// Run a stage on a list of lines, returning the output lines.
pub fn run_stage<F>(lines: &[String], stage: F) -> (Vec<String>, StageReport)
where
    F: FnOnce(&[u8], &mut Vec<u8>) -> Result<StageReport, StageError>,
{
    let input = lines.iter().map(|l| format!("{l}\n")).join("");
    let mut output = Vec::new();
    let report = stage(input.as_bytes(), &mut output).unwrap();
    let output = String::from_utf8(output).unwrap();
    (output.lines().map(String::from).collect(), report)
}

pub fn lines(text: &str) -> Vec<String> {
    text.lines().map(String::from).collect()
}

/// The key of an intermediate line: everything before the first tab.
pub fn key_of(line: &str) -> &str {
    line.split('\t').next().unwrap_or_default()
}

/// Stable sort by key: all the lines of a key become contiguous.
pub fn sort_by_key(mut lines: Vec<String>) -> Vec<String> {
    lines.sort_by(|a, b| key_of(a).cmp(key_of(b)));
    lines
}

/// Split `lines` into `parts` partitions, sending every line to a random partition.
pub fn random_partitions(lines: &[String], parts: usize, rng: &mut SmallRng) -> Vec<Vec<String>> {
    let mut partitions = vec![Vec::new(); parts];
    for line in lines {
        partitions[rng.random_range(0..parts)].push(line.clone());
    }
    partitions
}

/// Parse the reducer output into a map from node to rank.
pub fn ranks(lines: &[String]) -> BTreeMap<String, f64> {
    lines
        .iter()
        .map(|line| {
            let record: NodeRecord = line.parse().unwrap();
            (record.node, record.rank.unwrap())
        })
        .collect()
}

/// An in-memory runtime: it runs every stage of every partition in sequence.
#[derive(Debug, Clone)]
pub struct LocalDriver {
    pub damping: f64,
    pub total_nodes: u64,
    pub partitions: usize,
    pub combiner_passes: usize,
    pub tolerance: f64,
}

impl LocalDriver {
    pub fn new(damping: f64, total_nodes: u64) -> Self {
        Self {
            damping,
            total_nodes,
            partitions: 1,
            combiner_passes: 0,
            tolerance: 1e-4,
        }
    }

    pub fn partitions(self, partitions: usize) -> Self {
        Self { partitions, ..self }
    }

    pub fn combiner_passes(self, combiner_passes: usize) -> Self {
        Self {
            combiner_passes,
            ..self
        }
    }

    /// Run one iteration on the given ranks, returning the new ranks sorted by node.
    pub fn iteration(&mut self, iteration: usize, input: &[String]) -> Vec<String> {
        let mapper = MapperConfig::new(self.total_nodes).unwrap();
        let mut intermediate = Vec::new();
        for chunk in input.chunks(input.len().div_ceil(self.partitions).max(1)) {
            let (mut out, _) = run_stage(chunk, |r, w| map_stage(mapper, r, w));
            for _ in 0..self.combiner_passes {
                (out, _) = run_stage(&sort_by_key(out), |r, w| combine_stage(r, w));
            }
            intermediate.extend(out);
        }

        let config = self.reducer_config(iteration);
        let mut output = Vec::new();
        for partition in self.shuffle(intermediate).unwrap() {
            let (out, report) = run_stage(&partition, |r, w| reduce_stage(config, r, w));
            debug!("iteration {iteration}: {report}");
            output.extend(out);
        }
        output.sort();
        output
    }

    /// Iterate until convergence or for at most `max_iterations`.
    pub fn run(&mut self, graph: &[String], max_iterations: usize) -> (Vec<String>, usize) {
        let mut current = graph.to_vec();
        for iteration in 1..=max_iterations {
            let next = self.iteration(iteration, &current);
            if iteration > 1 && self.has_converged(&current, &next) {
                return (next, iteration);
            }
            current = next;
        }
        (current, max_iterations)
    }
}

impl IterationDriver for LocalDriver {
    fn reducer_config(&self, _iteration: usize) -> ReducerConfig {
        ReducerConfig::new(self.damping, self.total_nodes).unwrap()
    }

    fn shuffle(&mut self, lines: Vec<String>) -> Result<Vec<Vec<String>>, StageError> {
        let mut partitions = vec![Vec::new(); self.partitions];
        let sorted = sort_by_key(lines);
        let groups = sorted
            .into_iter()
            .chunk_by(|line| key_of(line).to_string());
        for (i, (_, group)) in groups.into_iter().enumerate() {
            partitions[i % self.partitions].extend(group);
        }
        Ok(partitions)
    }

    fn has_converged(&self, previous: &[String], current: &[String]) -> bool {
        let previous = ranks(previous);
        let current = ranks(current);
        let delta: f64 = current
            .iter()
            .map(|(node, rank)| (rank - previous.get(node).copied().unwrap_or_default()).abs())
            .sum();
        delta < self.tolerance
    }
}

use std::collections::{BTreeMap, HashMap};

use itertools::Itertools;
use rankflow::config::{MapperConfig, ReducerConfig};
use rankflow::record::NodeRecord;
use rankflow::stage::{map_stage, reduce_stage};
use utils::{lines, ranks, run_stage, sort_by_key, LocalDriver, TestHelper};

mod utils;

const THREE_CYCLE: &str = "A\tB\nB\tC\nC\tA\n";

// A -> B, C; B -> C; C -> A; D -> C; E is dangling and only reachable from D
const SMALL_WEB: &str = "A\tB,C\nB\tC\nC\tA\nD\tC,E\nE\t\n";

/// Plain power iteration, to check the stages against.
fn power_iteration(graph: &str, damping: f64, iterations: usize) -> BTreeMap<String, f64> {
    let graph: Vec<NodeRecord> = graph.lines().map(|l| l.parse().unwrap()).collect();
    let n = graph.len() as f64;
    let mut rank: HashMap<String, f64> = graph.iter().map(|r| (r.node.clone(), 1.0 / n)).collect();
    for _ in 0..iterations {
        let mut next: HashMap<String, f64> = graph
            .iter()
            .map(|r| (r.node.clone(), (1.0 - damping) / n))
            .collect();
        for record in &graph {
            let share = rank[&record.node] / record.adjacency.outdegree() as f64;
            for neighbor in record.adjacency.iter() {
                *next.get_mut(neighbor).unwrap() += damping * share;
            }
        }
        rank = next;
    }
    rank.into_iter().collect()
}

#[test]
fn three_cycle_is_a_fixed_point() {
    TestHelper::setup();
    for partitions in TestHelper::partitions() {
        let mut driver = LocalDriver::new(0.85, 3).partitions(partitions);
        let out = driver.iteration(1, &lines(THREE_CYCLE));
        assert_eq!(
            out,
            vec!["A\t0.333333\tB", "B\t0.333333\tC", "C\t0.333333\tA"]
        );
        // and it stays there
        assert_eq!(driver.iteration(2, &out), out);
    }
}

#[test]
fn dangling_node_keeps_only_teleport_mass() {
    TestHelper::setup();
    let mapper = MapperConfig::new(4).unwrap();
    let (mapped, _) = run_stage(&lines("D\t0.5\t"), |r, w| map_stage(mapper, r, w));
    assert_eq!(mapped, vec!["D\tADJ\t"]);

    let reducer = ReducerConfig::new(0.85, 4).unwrap();
    let (reduced, _) = run_stage(&mapped, |r, w| reduce_stage(reducer, r, w));
    assert_eq!(reduced, vec!["D\t0.037500\t"]);
}

#[test]
fn rank_is_conserved_without_damping() {
    TestHelper::setup();
    let graph = lines("A\tB,C\nB\tC\nC\tA\n");
    let mapper = MapperConfig::new(3).unwrap();
    let reducer = ReducerConfig::new_unchecked(1.0, 3);

    let mut current = graph;
    for _ in 0..10 {
        let (mapped, _) = run_stage(&current, |r, w| map_stage(mapper, r, w));
        let (reduced, _) = run_stage(&sort_by_key(mapped), |r, w| reduce_stage(reducer, r, w));
        let total: f64 = ranks(&reduced).values().sum();
        assert!((total - 1.0).abs() < 1e-4, "total rank {total}");
        current = reduced;
    }
}

#[test]
fn reducer_output_is_mapper_input() {
    TestHelper::setup();
    let mut driver = LocalDriver::new(0.85, 5);
    let first = driver.iteration(1, &lines(SMALL_WEB));
    for line in &first {
        let record: NodeRecord = line.parse().unwrap();
        assert!(record.rank.is_some());
    }
    let nodes = first.iter().map(|l| l.split('\t').next().unwrap()).collect_vec();
    assert_eq!(nodes, vec!["A", "B", "C", "D", "E"]);
    // 0.15 / 5 + 0.85 * (0.2 / 2)
    assert_eq!(first[4], "E\t0.115000\t");

    let second = driver.iteration(2, &first);
    assert_eq!(second.len(), first.len());
}

#[test]
fn matches_power_iteration() {
    TestHelper::setup();
    let expected = power_iteration(SMALL_WEB, 0.85, 15);
    for partitions in TestHelper::partitions() {
        for combiner_passes in 0..=2 {
            let mut driver = LocalDriver::new(0.85, 5)
                .partitions(partitions)
                .combiner_passes(combiner_passes);
            let mut current = lines(SMALL_WEB);
            for iteration in 1..=15 {
                current = driver.iteration(iteration, &current);
            }
            let got = ranks(&current);
            assert_eq!(got.keys().collect_vec(), expected.keys().collect_vec());
            for (node, rank) in &got {
                assert!(
                    (rank - expected[node]).abs() < 1e-5,
                    "node {node}: got {rank}, expected {}",
                    expected[node]
                );
            }
        }
    }
}

#[test]
fn dangling_mass_is_not_redistributed() {
    TestHelper::setup();
    let mut driver = LocalDriver::new(0.85, 5);
    let (out, _) = driver.run(&lines(SMALL_WEB), 50);
    let total: f64 = ranks(&out).values().sum();
    assert!(total < 1.0, "total rank {total}");

    let mut driver = LocalDriver::new(0.85, 3);
    let (out, iterations) = driver.run(&lines(THREE_CYCLE), 50);
    assert_eq!(iterations, 2);
    let total: f64 = ranks(&out).values().sum();
    assert!((total - 1.0).abs() < 1e-5);
}

#[test]
fn malformed_lines_are_skipped() {
    TestHelper::setup();
    let mapper = MapperConfig::new(3).unwrap();
    let (clean, _) = run_stage(&lines(THREE_CYCLE), |r, w| map_stage(mapper, r, w));

    let mut dirty = lines(THREE_CYCLE);
    dirty.insert(1, "garbage".to_string());
    dirty.push("X\t-0.5\tA".to_string());
    let (out, report) = run_stage(&dirty, |r, w| map_stage(mapper, r, w));

    assert_eq!(out, clean);
    assert_eq!(report.lines_read, 5);
    assert_eq!(report.malformed, 2);
}

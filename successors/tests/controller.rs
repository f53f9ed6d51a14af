use std::collections::BTreeSet;
use std::io::Write;

use successors::config::Config;
use successors::engine::trace::{Trace, TraceEngine};
use successors::report::PathOutcome;
use successors::{Address, ExecutionController, PathSet};

const PATH0: [u64; 5] = [0x1000, 0x1001, 0x1002, 0x1004, 0x1006];
const PATH1: [u64; 7] = [0x1000, 0x1001, 0x1002, 0x1004, 0x1005, 0x1007, 0x1008];

fn paths() -> PathSet {
    PathSet::from_raw(vec![PATH0.to_vec(), PATH1.to_vec()]).unwrap()
}

fn addrs(values: &[u64]) -> BTreeSet<Address> {
    values.iter().copied().map(Address).collect()
}

#[test]
fn directed_end_to_end() {
    let engine = TraceEngine::new(vec![
        Trace::linear(&PATH0, vec![0x100a]),
        Trace::linear(&PATH0, vec![0x100c]),
        // follows path 1 for a while, then leaves it
        Trace::linear(&[0x1000, 0x1001, 0x1002, 0x1004, 0x1005, 0x1009], vec![0x2000]),
    ]);
    let report = ExecutionController::new(engine, Config::default())
        .execute_directed(paths())
        .unwrap();

    assert_eq!(report.paths[0].id, 0);
    assert_eq!(report.paths[0].last_address, Address(0x1006));
    assert_eq!(
        report.paths[0].outcome,
        PathOutcome::Feasible(addrs(&[0x100a, 0x100c]))
    );
    assert_eq!(report.paths[1].id, 1);
    assert_eq!(report.paths[1].outcome, PathOutcome::Infeasible);
    assert_eq!(
        report.to_string(),
        "--Results Sorted by Pathlen--\n\
         Path 0[len=5] ending with 0x1006 has the following successors 0x100a,0x100c\n\
         Path 1[len=7] is infeasible\n"
    );
}

#[test]
fn directed_respects_max_solves() {
    let engine = TraceEngine::new(vec![Trace::linear(&PATH0, vec![0x100c, 0x100a, 0x100e])]);
    let report = ExecutionController::new(engine, Config::default())
        .execute_directed(paths())
        .unwrap();
    let PathOutcome::Feasible(found) = &report.get(0).unwrap().outcome else {
        panic!("path 0 should be feasible");
    };
    assert_eq!(found.len(), 1);

    let engine = TraceEngine::new(vec![Trace::linear(&PATH0, vec![0x100c, 0x100a, 0x100e])]);
    let config = Config {
        directed_max_solves: 2,
        ..Config::default()
    };
    let report = ExecutionController::new(engine, config)
        .execute_directed(paths())
        .unwrap();
    assert_eq!(
        report.get(0).unwrap().outcome,
        PathOutcome::Feasible(addrs(&[0x100a, 0x100c]))
    );
}

#[test]
fn forked_state_keeps_progress() {
    let parent = Trace::linear(&[0x1000, 0x1001], vec![0x1002])
        .fork(Trace::linear(&[0x1002, 0x1004, 0x1006], vec![0x100a]))
        .fork(Trace::linear(&[0x1002, 0x1004, 0x1005, 0x1007, 0x1008], vec![0x2000]));
    let report = ExecutionController::new(TraceEngine::new(vec![parent]), Config::default())
        .execute_directed(paths())
        .unwrap();
    assert_eq!(
        report.get(0).unwrap().outcome,
        PathOutcome::Feasible(addrs(&[0x100a]))
    );
    assert_eq!(
        report.get(1).unwrap().outcome,
        PathOutcome::Feasible(addrs(&[0x2000]))
    );
}

#[test]
fn state_that_only_starts_midway_is_pruned() {
    // a fresh state is matched from the first path address, so a trace
    // starting in the middle of path 0 never completes it
    let engine = TraceEngine::new(vec![Trace::linear(&[0x1002, 0x1004, 0x1006], vec![0x100a])]);
    let report = ExecutionController::new(engine, Config::default())
        .execute_directed(paths())
        .unwrap();
    assert!(report
        .paths
        .iter()
        .all(|p| p.outcome == PathOutcome::Infeasible));
}

#[test]
fn shorter_path_exhausted_without_pruning() {
    let paths = PathSet::from_raw(vec![PATH0[..3].to_vec(), PATH0.to_vec()]).unwrap();
    let engine = TraceEngine::new(vec![Trace::linear(&PATH0, vec![0x100a])]);
    let report = ExecutionController::new(engine, Config::default())
        .execute_directed(paths)
        .unwrap();
    // path 0 completes at 0x1002 and its successor is 0x1004
    assert_eq!(
        report.get(0).unwrap().outcome,
        PathOutcome::Feasible(addrs(&[0x1004]))
    );
    assert_eq!(
        report.get(1).unwrap().outcome,
        PathOutcome::Feasible(addrs(&[0x100a]))
    );
}

#[test]
fn completed_path_without_successor_is_infeasible() {
    let engine = TraceEngine::new(vec![Trace::linear(&PATH0, vec![])]);
    let report = ExecutionController::new(engine, Config::default())
        .execute_directed(paths())
        .unwrap();
    assert_eq!(report.get(0).unwrap().outcome, PathOutcome::Infeasible);
    assert_eq!(
        report.to_string(),
        "--Results Sorted by Pathlen--\n\
         Path 0[len=5] is infeasible\n\
         Path 1[len=7] is infeasible\n"
    );
}

#[test]
fn directed_paths_from_file() {
    let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    writeln!(file, "# path 0").unwrap();
    writeln!(file, "0x1000,0x1001,0x1002,0x1004,0x1006").unwrap();
    writeln!(file, "0x1000 0x1001").unwrap();
    let paths = PathSet::load(file.path()).unwrap();

    let engine = TraceEngine::new(vec![Trace::linear(&PATH0, vec![0x100a])]);
    let report = ExecutionController::new(engine, Config::default())
        .execute_directed(paths)
        .unwrap();
    let order: Vec<usize> = report.paths.iter().map(|p| p.id).collect();
    assert_eq!(order, vec![1, 0]);
    assert_eq!(
        report.get(1).unwrap().outcome,
        PathOutcome::Feasible(addrs(&[0x1002]))
    );
}

#[test]
fn directed_paths_from_json_file() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, r#"[["0x1000", "0x1001"], [4096]]"#).unwrap();
    let paths = PathSet::load(file.path()).unwrap();
    assert_eq!(paths.len(), 2);
    assert_eq!(paths.get(1).unwrap().last_address(), Address(0x1000));
}

#[test]
fn undirected_collects_distinct_successors() {
    let engine = TraceEngine::new(vec![
        Trace::linear(&[0x08048000, 0x08048080], vec![0x08048085]),
        Trace::linear(&[0x08048010, 0x08048080], vec![0x08048085]),
        Trace::linear(&[0x08048080], vec![0x08048090]),
    ]);
    let report = ExecutionController::new(engine, Config::default())
        .execute(Address(0x08048080))
        .unwrap();
    assert_eq!(report.targets, addrs(&[0x08048085, 0x08048090]));
    assert_eq!(
        report.to_string(),
        "Determined that the instruction at 0x8048080 can jump to the following addresses: 0x8048085,0x8048090"
    );
}

#[test]
fn undirected_without_hits() {
    let engine = TraceEngine::new(vec![Trace::linear(&[0x1000, 0x1001], vec![0x1002])]);
    let report = ExecutionController::new(engine, Config::default())
        .execute(Address(0x08048080))
        .unwrap();
    assert!(report.targets.is_empty());
    assert_eq!(
        report.to_string(),
        "No successors found for the instruction at 0x8048080"
    );
}

#[test]
fn undirected_hit_without_successor() {
    let engine = TraceEngine::new(vec![Trace::linear(&[0x1000, 0x08048080], vec![])]);
    let report = ExecutionController::new(engine, Config::default())
        .execute(Address(0x08048080))
        .unwrap();
    assert!(report.targets.is_empty());
}

#[test]
fn undirected_caps_values_per_hit() {
    let config = Config {
        undirected_max_solves: 2,
        trace_rip: true,
        ..Config::default()
    };
    let engine = TraceEngine::new(vec![Trace::linear(&[0x10], vec![0x40, 0x30, 0x20])]);
    let report = ExecutionController::new(engine, config)
        .execute(Address(0x10))
        .unwrap();
    assert_eq!(report.targets.len(), 2);
}

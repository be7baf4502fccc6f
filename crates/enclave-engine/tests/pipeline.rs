//! Integration tests: the full pipeline against the in-process backend.
//!
//! These run the same task queue the binary runs -- clean, create tables,
//! neighbor graph, seeding, iterations, finalize -- over a synthetic unit
//! grid, and assert the normative properties of a run: history length,
//! conservation, determinism, neighbor symmetry, persisted row counts,
//! single producer execution, and cache reuse.

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::missing_panics_doc,
    clippy::too_many_lines
)]

use enclave_engine::config::{RunConfig, StorageBackend};
use enclave_engine::pipeline::build_pipeline;
use enclave_engine::state::RunState;
use enclave_model::{verify_conservation, ConservationResult};
use enclave_scheduler::{RunReport, Scheduler};
use enclave_store::{completion_channel, CompletionReceiver, MemoryGateway};

fn memory_config(width: u32, height: u32, iterations: u32) -> RunConfig {
    let mut config = RunConfig::default();
    config.run.radius = 1.1; // 4-neighborhood on a unit grid
    config.run.groups = 2;
    config.run.tolerance = 0.5;
    config.run.iterations = iterations;
    config.run.seed = 42;
    config.run.empty_fraction = 0.2;
    config.neighbors.pool_size = 4;
    config.storage.backend = StorageBackend::Memory;
    config.storage.grid_width = width;
    config.storage.grid_height = height;
    config.validate().expect("test config must be valid");
    config
}

fn fresh_gateway(config: &RunConfig) -> (MemoryGateway, CompletionReceiver) {
    let (tx, rx) = completion_channel();
    let cells = MemoryGateway::unit_grid(config.storage.grid_width, config.storage.grid_height);
    let gateway = MemoryGateway::new(tx).with_source_cells(
        &config.source.table,
        &config.source.id_column,
        &config.source.geometry_column,
        &cells,
    );
    (gateway, rx)
}

async fn run_pipeline(
    config: &RunConfig,
    gateway: &mut MemoryGateway,
    completions: &mut CompletionReceiver,
) -> (RunState, RunReport) {
    let mut state = RunState::new(config.clone());
    let mut scheduler = Scheduler::new();
    scheduler.enqueue_all(build_pipeline(config));
    let report = scheduler
        .run(&mut state, gateway, completions)
        .await
        .expect("pipeline run should succeed");
    (state, report)
}

fn column_index(gateway: &MemoryGateway, table: &str, column: &str) -> usize {
    gateway
        .table(table)
        .expect("table should exist")
        .columns
        .iter()
        .position(|c| c == column)
        .expect("column should exist")
}

#[tokio::test]
async fn full_run_records_history_and_persists_rows() {
    let config = memory_config(5, 5, 4);
    let (mut gateway, mut completions) = fresh_gateway(&config);
    let (state, report) = run_pipeline(&config, &mut gateway, &mut completions).await;

    // Seed state plus one state per iteration.
    assert_eq!(state.history.len(), 5);
    assert_eq!(report.leaked_correlations, 0);

    // Conservation holds between every pair of consecutive states.
    for (before, after) in state.history.iter().zip(state.history.iter().skip(1)) {
        assert_eq!(
            verify_conservation(before, after),
            ConservationResult::Balanced
        );
    }

    // The graph covers all cells and is symmetric.
    let graph = state.graph.as_ref().expect("graph should be installed");
    assert_eq!(graph.len(), 25);
    for (cell, neighbors) in graph.iter() {
        assert!(!neighbors.is_empty());
        for &neighbor in neighbors {
            assert!(
                graph.neighbors(neighbor).contains(&cell),
                "graph must be symmetric: {neighbor} -> {cell}"
            );
        }
    }

    // Output table: 25 copied t=0 rows plus 25 per iteration.
    let out = gateway.table("schelling").expect("output table");
    assert_eq!(out.rows.len(), 25 + 4 * 25);

    // t=0 rows were all seeded away from the -1 initializer.
    let t_index = column_index(&gateway, "schelling", "t");
    let pop_index = column_index(&gateway, "schelling", "pop");
    for row in &out.rows {
        if row[t_index].as_i64() == Some(0) {
            let pop = row[pop_index].as_i64().expect("pop should be set");
            assert!(pop >= 0, "t=0 row still holds the initializer");
        }
    }

    // Neighbor side table: directed 4-neighborhood pairs of a 5x5 grid.
    let neighbors = gateway.table("schelling_neighbor").expect("side table");
    assert_eq!(neighbors.rows.len(), 80);
}

#[tokio::test]
async fn identical_seeds_reproduce_identical_histories() {
    let config = memory_config(4, 4, 3);

    let (mut gateway_a, mut completions_a) = fresh_gateway(&config);
    let (state_a, _) = run_pipeline(&config, &mut gateway_a, &mut completions_a).await;

    let (mut gateway_b, mut completions_b) = fresh_gateway(&config);
    let (state_b, _) = run_pipeline(&config, &mut gateway_b, &mut completions_b).await;

    let history_a: Vec<_> = state_a.history.iter().collect();
    let history_b: Vec<_> = state_b.history.iter().collect();
    assert_eq!(history_a, history_b);
}

#[tokio::test]
async fn fetch_cells_runs_once_for_all_dependents() {
    let config = memory_config(3, 3, 2);
    let (mut gateway, mut completions) = fresh_gateway(&config);
    run_pipeline(&config, &mut gateway, &mut completions).await;

    // Both the graph builder and the seeder need the cell list; the
    // producer still runs exactly once.
    let selects = gateway
        .ops()
        .iter()
        .filter(|op| op.starts_with("select from blocks"))
        .count();
    assert_eq!(selects, 1);
}

#[tokio::test]
async fn cached_neighbors_skip_the_proximity_fan_out() {
    let config = memory_config(4, 4, 2);
    let (mut gateway, mut completions) = fresh_gateway(&config);
    run_pipeline(&config, &mut gateway, &mut completions).await;

    let ops_after_first = gateway.ops().len();
    let first_proximity = gateway
        .ops()
        .iter()
        .filter(|op| op.starts_with("proximity"))
        .count();
    assert_eq!(first_proximity, 16);

    // Second run against the same store, loading the persisted graph.
    let mut config = config;
    config.neighbors.reuse = true;
    let (state, _) = run_pipeline(&config, &mut gateway, &mut completions).await;

    let second_ops = &gateway.ops()[ops_after_first..];
    assert!(
        second_ops.iter().all(|op| !op.starts_with("proximity")),
        "reuse run must not issue proximity queries"
    );
    assert!(state.graph.is_some());
    assert_eq!(state.history.len(), 3);
}

#[tokio::test]
async fn empty_neighbor_cache_falls_back_to_computation() {
    let mut config = memory_config(3, 3, 2);
    config.neighbors.reuse = true;

    // Fresh store: the side table exists but holds nothing, so the load
    // warns and the first iteration front-inserts the builder.
    let (mut gateway, mut completions) = fresh_gateway(&config);
    let (state, _) = run_pipeline(&config, &mut gateway, &mut completions).await;

    let proximity = gateway
        .ops()
        .iter()
        .filter(|op| op.starts_with("proximity"))
        .count();
    assert_eq!(proximity, 9);
    assert!(state.graph.is_some());
    assert_eq!(state.history.len(), 3);
}

#[tokio::test]
async fn settled_run_skips_remaining_iterations() {
    let mut config = memory_config(5, 5, 6);
    // Full tolerance: nobody ever moves, so the first iteration settles.
    config.run.tolerance = 1.0;
    config.run.stop_when_settled = true;

    let (mut gateway, mut completions) = fresh_gateway(&config);
    let (state, _) = run_pipeline(&config, &mut gateway, &mut completions).await;

    assert!(state.settled);
    // Seed state plus the single iteration that detected settlement.
    assert_eq!(state.history.len(), 2);

    let out = gateway.table("schelling").expect("output table");
    assert_eq!(out.rows.len(), 25 + 25);
}

#[tokio::test]
async fn seeded_labels_match_the_persisted_rows() {
    let config = memory_config(4, 4, 1);
    let (mut gateway, mut completions) = fresh_gateway(&config);
    let (state, _) = run_pipeline(&config, &mut gateway, &mut completions).await;

    let seed_state = state.history.get(0).expect("seed state");
    let out = gateway.table("schelling").expect("output table");
    let gid_index = column_index(&gateway, "schelling", "gid");
    let t_index = column_index(&gateway, "schelling", "t");
    let pop_index = column_index(&gateway, "schelling", "pop");

    for row in &out.rows {
        if row[t_index].as_i64() != Some(0) {
            continue;
        }
        let gid = row[gid_index].as_i64().expect("gid");
        let pop = row[pop_index].as_i64().expect("pop");
        let expected = seed_state.label(enclave_types::CellId(gid));
        assert_eq!(pop, i64::from(expected.into_inner()));
    }
}

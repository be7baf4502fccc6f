//! Third phase: obtain the neighbor graph.
//!
//! [`ComputeNeighbors`] issues one proximity query per cell with a bounded
//! pool of W queries outstanding. The pool is self-refilling: every result
//! handler records its hits, persists them to the side table, and dispatches
//! the next pending cell, so the pool stays saturated until the work list is
//! exhausted without ever turning into a synchronous loop. Once every cell
//! has reported, the accumulated graph is symmetrized and installed.
//!
//! [`LoadNeighbors`] is the cache path: it reads the side table persisted
//! by a previous run. An empty cache is only a warning -- the first task
//! that needs the graph will front-insert [`ComputeNeighbors`] and compute
//! it after all.

use enclave_scheduler::{discard_result, SchedulerError, Task, TaskContext, TaskList};
use enclave_store::{
    ColumnSpec, ColumnType, Row, SelectDescriptor, SqlValue, StoreOp, StoreValue,
};
use enclave_types::{CellId, NeighborGraph};

use crate::pipeline::{FetchCells, Maintenance, NEIGHBOR_COLUMNS};
use crate::state::{BuildState, RunState};

/// Builds the neighbor graph with a bounded, self-refilling query pool and
/// persists the `(cell, neighbor, distance)` rows for reuse across runs.
pub struct ComputeNeighbors {
    retried: bool,
}

impl ComputeNeighbors {
    /// A fresh builder task.
    pub const fn new() -> Self {
        Self { retried: false }
    }
}

impl Default for ComputeNeighbors {
    fn default() -> Self {
        Self::new()
    }
}

impl Task<RunState> for ComputeNeighbors {
    fn name(&self) -> &'static str {
        "compute_neighbors"
    }

    fn run(self: Box<Self>, tc: &mut TaskContext<'_, RunState>) -> Result<(), SchedulerError> {
        // Cached-result guard: dependents may front-insert this task even
        // when another instance already produced the graph.
        if tc.state.graph.is_some() {
            return Ok(());
        }

        if tc.state.cells.is_none() {
            if self.retried {
                return Err(SchedulerError::MissingDependency {
                    task: "compute_neighbors",
                    dependency: "cell list",
                });
            }
            let next: TaskList<RunState> =
                vec![Box::new(FetchCells), Box::new(Self { retried: true })];
            tc.enqueue_front_all(next);
            return Ok(());
        }

        let cells = tc.state.cells.clone().unwrap_or_default();
        let total = cells.len();
        let pool_size = tc.state.config.neighbors.pool_size.max(1);
        tracing::info!(
            total,
            radius = tc.state.config.run.radius,
            pool_size,
            "computing neighbor graph"
        );

        if total == 0 {
            tracing::warn!("source produced no cells; installing an empty graph");
            tc.state.graph = Some(NeighborGraph::new());
            return Ok(());
        }

        tc.state.build = Some(BuildState {
            pending: cells.into_iter().collect(),
            total,
            done: 0,
            graph: NeighborGraph::new(),
        });

        // Saturate the pool; completions keep it full from here on.
        for _ in 0..pool_size {
            if !dispatch_next_proximity(tc)? {
                break;
            }
        }

        tc.enqueue_front(Box::new(Maintenance));
        Ok(())
    }
}

/// Dispatch the proximity query for the next pending cell, if any.
///
/// Returns `false` once the work list is exhausted.
fn dispatch_next_proximity(tc: &mut TaskContext<'_, RunState>) -> Result<bool, SchedulerError> {
    let Some((origin, op)) = next_proximity_op(tc.state) else {
        return Ok(false);
    };
    tc.dispatch(
        op,
        Box::new(move |tc, value| on_proximity_result(tc, origin, value)),
    )?;
    Ok(true)
}

fn next_proximity_op(state: &mut RunState) -> Option<(CellId, StoreOp)> {
    let build = state.build.as_mut()?;
    let cell = build.pending.pop_front()?;
    let config = &state.config;
    let op = StoreOp::ProximityQuery {
        table: config.source.table.clone(),
        id_column: config.source.id_column.clone(),
        geometry_column: config.source.geometry_column.clone(),
        origin: cell.id,
        geometry: cell.geometry,
        radius: config.run.radius,
        filter: config.source.filter.clone(),
    };
    Some((cell.id, op))
}

/// Record one proximity result, persist its rows, refill the pool, and
/// install the graph when the last cell reports.
fn on_proximity_result(
    tc: &mut TaskContext<'_, RunState>,
    origin: CellId,
    value: StoreValue,
) -> Result<(), SchedulerError> {
    let StoreValue::Neighbors(hits) = value else {
        return Err(SchedulerError::task(
            "compute_neighbors",
            "unexpected result shape",
        ));
    };

    // The store may echo the probe cell itself back (distance zero); a
    // cell's own label must never count toward its like fraction.
    let rows: Vec<Row> = hits
        .iter()
        .filter(|hit| hit.id != origin)
        .map(|hit| {
            vec![
                SqlValue::Int(origin.into_inner()),
                SqlValue::Int(hit.id.into_inner()),
                SqlValue::Float(hit.distance),
            ]
        })
        .collect();

    {
        let build = tc.state.build.as_mut().ok_or_else(|| {
            SchedulerError::task("compute_neighbors", "proximity result with no build in progress")
        })?;
        build.graph.insert_isolated(origin);
        for hit in hits.iter().filter(|hit| hit.id != origin) {
            build.graph.insert(origin, hit.id);
        }
        build.done = build.done.saturating_add(1);
        tracing::debug!(
            done = build.done,
            total = build.total,
            cell = %origin,
            hits = rows.len(),
            "proximity result recorded"
        );
    }

    if !rows.is_empty() {
        let table = tc.state.config.neighbors_table();
        let columns = NEIGHBOR_COLUMNS.map(str::to_owned).to_vec();
        tc.dispatch(
            StoreOp::InsertRows {
                table,
                columns,
                rows,
            },
            discard_result(),
        )?;
    }

    dispatch_next_proximity(tc)?;

    let finished = tc
        .state
        .build
        .as_ref()
        .is_some_and(|build| build.done == build.total);
    if finished {
        if let Some(build) = tc.state.build.take() {
            let mut graph = build.graph;
            graph.symmetrize();
            tracing::info!(
                cells = graph.len(),
                edges = graph.edge_count(),
                "neighbor graph installed"
            );
            tc.state.graph = Some(graph);
        }
    }
    Ok(())
}

/// Loads the neighbor graph from the side table persisted by an earlier
/// run, avoiding the full proximity fan-out.
pub struct LoadNeighbors;

impl Task<RunState> for LoadNeighbors {
    fn name(&self) -> &'static str {
        "load_neighbors"
    }

    fn run(self: Box<Self>, tc: &mut TaskContext<'_, RunState>) -> Result<(), SchedulerError> {
        if tc.state.graph.is_some() {
            return Ok(());
        }

        let table = tc.state.config.neighbors_table();
        let descriptor = SelectDescriptor {
            table,
            columns: vec![
                ColumnSpec::new(NEIGHBOR_COLUMNS[0], ColumnType::BigInt),
                ColumnSpec::new(NEIGHBOR_COLUMNS[1], ColumnType::BigInt),
            ],
            where_clause: None,
            order_by: Some(format!("{}, {}", NEIGHBOR_COLUMNS[0], NEIGHBOR_COLUMNS[1])),
        };

        tc.dispatch(
            StoreOp::SelectRows { descriptor },
            Box::new(|tc, value| {
                let StoreValue::Rows(rows) = value else {
                    return Err(SchedulerError::task("load_neighbors", "unexpected result shape"));
                };
                if rows.is_empty() {
                    tracing::warn!(
                        "neighbor cache is empty; the graph will be computed on demand"
                    );
                    return Ok(());
                }
                let mut graph = NeighborGraph::new();
                let count = rows.len();
                for row in rows {
                    let (Some(cell), Some(neighbor)) = (
                        row.first().and_then(SqlValue::as_i64),
                        row.get(1).and_then(SqlValue::as_i64),
                    ) else {
                        return Err(SchedulerError::task(
                            "load_neighbors",
                            "non-integer neighbor pair",
                        ));
                    };
                    graph.insert(CellId(cell), CellId(neighbor));
                }
                graph.symmetrize();
                tracing::info!(
                    cells = graph.len(),
                    pairs = count,
                    "neighbor graph loaded from cache"
                );
                tc.state.graph = Some(graph);
                Ok(())
            }),
        )?;
        Ok(())
    }
}

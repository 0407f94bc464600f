use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog;
use crate::config::ResolvedConfig;
use crate::domain::{DsoId, DsoRecord, TileCell};
use crate::error::HipsError;
use crate::fetch::{FetchEngine, FetchOutcome, TileSource};
use crate::healpix;
use crate::manifest::{
    CellOutcome, CellRecord, Completeness, ObjectManifest, OrderManifest, TileTally,
};
use crate::properties::{BaseProperties, synthesize};
use crate::resolution;
use crate::store::Store;
use crate::tiles::TileAddressing;

/// Fetch progress is reported every this many tiles.
const PROGRESS_EVERY: usize = 25;

#[derive(Debug, Clone)]
pub struct ProvisionOptions {
    pub force: bool,
    pub dry_run: bool,
    /// Restrict the run to these ids; empty means the whole catalog.
    pub only: Vec<DsoId>,
    pub workers: usize,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            force: false,
            dry_run: false,
            only: Vec::new(),
            workers: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderPlan {
    pub order: u8,
    pub cells: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ObjectOutcome {
    Completed { max_order: u8, tiles: TileTally },
    Failed { reason: String },
    AlreadyDone,
    Planned { max_order: u8, orders: Vec<OrderPlan> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectReport {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub outcome: ObjectOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub already_done: usize,
    pub planned: usize,
    pub tiles: TileTally,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProvisionReport {
    pub started_at: String,
    pub output_base: String,
    pub dry_run: bool,
    pub objects: Vec<ObjectReport>,
    pub summary: RunSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectState {
    Complete,
    /// Processed, but the manifest is stale, unreadable or records gaps.
    Partial,
    /// Properties without a manifest.
    MetadataOnly,
    Absent,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusEntry {
    pub id: String,
    pub name: String,
    pub state: ObjectState,
    pub max_order: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tiles: Option<TileTally>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResult {
    pub output_base: String,
    pub objects: Vec<StatusEntry>,
}

#[derive(Debug, Clone, Copy)]
pub enum ProgressSinkKind {
    Provision,
    Status,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

fn emit(sink: &dyn ProgressSink, message: String) {
    sink.event(ProgressEvent {
        message,
        elapsed: None,
    });
}

struct TileTask {
    cell: TileCell,
    url: String,
    path: Utf8PathBuf,
}

pub struct App<S: TileSource> {
    store: Store,
    source: S,
    addressing: TileAddressing,
    tile_timeout: Duration,
    properties_timeout: Duration,
    did_prefix: String,
}

impl<S: TileSource> App<S> {
    pub fn new(config: &ResolvedConfig, source: S) -> Self {
        Self {
            store: Store::new(config.output_base.clone()),
            source,
            addressing: TileAddressing::new(&config.base_url, config.layout, config.tile_format),
            tile_timeout: config.tile_timeout,
            properties_timeout: config.properties_timeout,
            did_prefix: config.creator_did_prefix.clone(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Provision every selected object that is not already complete.
    ///
    /// Startup preconditions fail the whole run before any network
    /// activity; everything after that is reported per object.
    pub fn provision(
        &self,
        records: Vec<DsoRecord>,
        options: ProvisionOptions,
        sink: &dyn ProgressSink,
    ) -> Result<ProvisionReport, HipsError> {
        self.store.check_working_dir()?;
        catalog::validate(&records)?;
        let selected = catalog::select(records, &options.only)?;

        emit(
            sink,
            format!("phase=Verify; checking {} objects", selected.len()),
        );
        let mut pending = Vec::new();
        let mut objects = Vec::with_capacity(selected.len());
        let mut summary = RunSummary {
            total: selected.len(),
            ..RunSummary::default()
        };
        for record in selected {
            if !options.force && self.object_state(&record) == ObjectState::Complete {
                debug!(id = %record.id, "already provisioned; skipping");
                summary.already_done += 1;
                objects.push(ObjectReport {
                    id: record.id.to_string(),
                    name: record.name.clone(),
                    outcome: ObjectOutcome::AlreadyDone,
                });
            } else {
                pending.push(record);
            }
        }
        emit(
            sink,
            format!(
                "phase=Verify; total={} done={} pending={}",
                summary.total,
                summary.already_done,
                pending.len()
            ),
        );

        let base = BaseProperties::new(self.addressing.properties_url(), self.properties_timeout);
        for record in pending {
            let outcome = if options.dry_run {
                summary.planned += 1;
                self.plan(&record)
            } else {
                let started = Instant::now();
                match self.process_object(&record, &base, &options, sink) {
                    Ok(tiles) => {
                        info!(id = %record.id, stored = tiles.stored(), failed = tiles.failed, "object provisioned");
                        sink.event(ProgressEvent {
                            message: format!(
                                "phase=Store; {} completed: {} tiles",
                                record.id,
                                tiles.stored()
                            ),
                            elapsed: Some(started.elapsed()),
                        });
                        summary.completed += 1;
                        summary.tiles.add(&tiles);
                        ObjectOutcome::Completed {
                            max_order: resolution::max_order(record.fov),
                            tiles,
                        }
                    }
                    Err(err) => {
                        warn!(id = %record.id, error = %err, "object failed");
                        emit(sink, format!("phase=Store; {} failed: {err}", record.id));
                        summary.failed += 1;
                        ObjectOutcome::Failed {
                            reason: err.to_string(),
                        }
                    }
                }
            };
            objects.push(ObjectReport {
                id: record.id.to_string(),
                name: record.name.clone(),
                outcome,
            });
        }

        Ok(ProvisionReport {
            started_at: Utc::now().to_rfc3339(),
            output_base: self.store.root().to_string(),
            dry_run: options.dry_run,
            objects,
            summary,
        })
    }

    /// Completion state of every record, in catalog order.
    pub fn status(
        &self,
        records: &[DsoRecord],
        sink: &dyn ProgressSink,
    ) -> Result<StatusResult, HipsError> {
        catalog::validate(records)?;
        emit(
            sink,
            format!("phase=Verify; scanning {}", self.store.root()),
        );
        let objects = records
            .iter()
            .map(|record| StatusEntry {
                id: record.id.to_string(),
                name: record.name.clone(),
                state: self.object_state(record),
                max_order: resolution::max_order(record.fov),
                tiles: self
                    .store
                    .read_manifest(&record.id)
                    .ok()
                    .flatten()
                    .map(|manifest| manifest.tally()),
            })
            .collect();
        Ok(StatusResult {
            output_base: self.store.root().to_string(),
            objects,
        })
    }

    pub fn object_state(&self, record: &DsoRecord) -> ObjectState {
        let has_properties = self.store.has_properties(&record.id);
        let manifest = match self.store.read_manifest(&record.id) {
            Ok(manifest) => manifest,
            Err(err) => {
                debug!(id = %record.id, error = %err, "unreadable manifest");
                return ObjectState::Partial;
            }
        };
        let Some(manifest) = manifest else {
            return if has_properties {
                ObjectState::MetadataOnly
            } else {
                ObjectState::Absent
            };
        };
        if !has_properties {
            return ObjectState::Partial;
        }
        let max_order = resolution::max_order(record.fov);
        let expected = coverage(record, max_order);
        let object_dir = self.store.object_dir(&record.id);
        match manifest.check(max_order, &expected, &object_dir, &self.addressing) {
            Completeness::Complete => ObjectState::Complete,
            other => {
                debug!(id = %record.id, state = ?other, "object incomplete");
                ObjectState::Partial
            }
        }
    }

    fn plan(&self, record: &DsoRecord) -> ObjectOutcome {
        let max_order = resolution::max_order(record.fov);
        let orders = coverage(record, max_order)
            .iter()
            .enumerate()
            .map(|(order, cells)| OrderPlan {
                order: order as u8,
                cells: cells.len(),
            })
            .collect();
        ObjectOutcome::Planned { max_order, orders }
    }

    fn process_object(
        &self,
        record: &DsoRecord,
        base: &BaseProperties,
        options: &ProvisionOptions,
        sink: &dyn ProgressSink,
    ) -> Result<TileTally, HipsError> {
        emit(
            sink,
            format!("phase=Resolve; {} ({})", record.name, record.id),
        );
        let object_dir = self.store.ensure_object_dir(&record.id)?;
        let max_order = resolution::max_order(record.fov);

        emit(
            sink,
            format!("phase=Prepare; {} properties, max order {max_order}", record.id),
        );
        let base_text = base.get(&self.source);
        let properties = synthesize(
            record,
            max_order,
            &base_text,
            &self.did_prefix,
            self.addressing.format(),
        );
        self.store.write_properties(&record.id, &properties)?;

        let expected = coverage(record, max_order);
        // 404s from a matching earlier run stay resolved unless forced.
        let known_missing = if options.force {
            HashSet::new()
        } else {
            self.store
                .read_manifest(&record.id)
                .ok()
                .flatten()
                .map(|manifest| manifest.missing_cells(max_order, &expected))
                .unwrap_or_default()
        };
        let mut tasks = VecDeque::new();
        for (order, cells) in expected.iter().enumerate() {
            emit(
                sink,
                format!("phase=Resolve; {} order {order}: {} tiles", record.id, cells.len()),
            );
            for &index in cells {
                let cell = TileCell::new(order as u8, index);
                if known_missing.contains(&cell) {
                    continue;
                }
                tasks.push_back(TileTask {
                    cell,
                    url: self.addressing.url(cell),
                    path: self.addressing.local_path(&object_dir, cell),
                });
            }
        }

        let results: HashMap<TileCell, FetchOutcome> = self
            .fetch_all(record, tasks, options.workers.max(1), sink)
            .into_iter()
            .collect();

        let mut tally = TileTally::default();
        let orders = expected
            .iter()
            .enumerate()
            .map(|(order, cells)| OrderManifest {
                order: order as u8,
                cells: cells
                    .iter()
                    .map(|&index| {
                        let cell = TileCell::new(order as u8, index);
                        let outcome = match results.get(&cell) {
                            Some(outcome) => CellOutcome::from(outcome),
                            None if known_missing.contains(&cell) => CellOutcome::Missing,
                            None => CellOutcome::Failed,
                        };
                        tally.record(outcome);
                        CellRecord { index, outcome }
                    })
                    .collect(),
            })
            .collect();

        let manifest = ObjectManifest {
            id: record.id.to_string(),
            max_order,
            tool: format!("hips-provision/{}", env!("CARGO_PKG_VERSION")),
            provisioned_at: Utc::now().to_rfc3339(),
            orders,
        };
        self.store.write_manifest(&record.id, &manifest)?;
        Ok(tally)
    }

    /// Run every task through a pool of `workers` threads. The calling
    /// thread drains the result channel and owns progress reporting; the
    /// pool is joined before returning.
    fn fetch_all(
        &self,
        record: &DsoRecord,
        tasks: VecDeque<TileTask>,
        workers: usize,
        sink: &dyn ProgressSink,
    ) -> Vec<(TileCell, FetchOutcome)> {
        let total = tasks.len();
        let mut results = Vec::with_capacity(total);
        let mut report = |cell: TileCell, outcome: FetchOutcome| {
            if let FetchOutcome::TransientFailure { reason } = &outcome {
                emit(
                    sink,
                    format!(
                        "phase=Fetch; {} order {} cell {} failed: {reason}",
                        record.id, cell.order, cell.index
                    ),
                );
            }
            results.push((cell, outcome));
            let done = results.len();
            if done % PROGRESS_EVERY == 0 || done == total {
                emit(sink, format!("phase=Fetch; {} {done}/{total} tiles", record.id));
            }
        };

        if workers <= 1 || total <= 1 {
            let engine = FetchEngine::new(&self.source, self.tile_timeout);
            for task in tasks {
                let outcome = engine.fetch(&task.url, &task.path);
                report(task.cell, outcome);
            }
            return results;
        }

        let queue = Mutex::new(tasks);
        let (tx, rx) = mpsc::channel();
        thread::scope(|scope| {
            for _ in 0..workers.min(total) {
                let tx = tx.clone();
                let queue = &queue;
                scope.spawn(move || {
                    let engine = FetchEngine::new(&self.source, self.tile_timeout);
                    loop {
                        let next = match queue.lock() {
                            Ok(mut queue) => queue.pop_front(),
                            Err(_) => None,
                        };
                        let Some(task) = next else {
                            break;
                        };
                        let outcome = engine.fetch(&task.url, &task.path);
                        if tx.send((task.cell, outcome)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);
            for (cell, outcome) in rx {
                report(cell, outcome);
            }
        });
        results
    }
}

/// Cone coverage for each order `0..=max_order` of one object.
pub fn coverage(record: &DsoRecord, max_order: u8) -> Vec<Vec<u64>> {
    healpix::query_cone_per_order(record.ra, record.dec, record.search_radius(), max_order)
}

//! Execution strategies for simulation units
//!
//! Every [`Runner`] maps a unit function over a sequence of units and returns
//! one result per unit in submission order. Units never read each other's
//! output, so the strategies are interchangeable.

use crate::core::result::SimulationResult;
use crate::core::simulation::{SimulationUnit, Units};
use crate::types::{SmrtError, SmrtResult};
use std::sync::Arc;

/// Per-worker settings handed to every unit evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerContext {
    /// Cap on the threads numerical kernels may use inside this worker, `None` for no cap
    pub max_numerical_threads: Option<usize>,
    pub worker_index: usize,
}

impl WorkerContext {
    /// Context of the calling thread, uncapped
    pub fn local() -> Self {
        Self {
            max_numerical_threads: None,
            worker_index: 0,
        }
    }

    pub fn capped(max_numerical_threads: usize, worker_index: usize) -> Self {
        Self {
            max_numerical_threads: Some(max_numerical_threads),
            worker_index,
        }
    }

    /// Whether kernels may fan out over several threads
    pub fn allows_nested_parallelism(&self) -> bool {
        self.max_numerical_threads.map_or(true, |n| n > 1)
    }
}

impl Default for WorkerContext {
    fn default() -> Self {
        Self::local()
    }
}

/// Function evaluated for each unit
pub type UnitFunction = Arc<dyn Fn(&SimulationUnit, &WorkerContext) -> SmrtResult<SimulationResult> + Send + Sync>;

pub trait Runner: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether units may run concurrently on several workers
    fn is_multi_worker(&self) -> bool;

    fn run(&self, function: UnitFunction, units: Units<'_>) -> SmrtResult<Vec<SimulationResult>>;
}

impl std::fmt::Debug for dyn Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Runner({})", self.name())
    }
}

/// In-order evaluation on the calling thread
#[derive(Debug, Clone, Default)]
pub struct SequentialRunner {
    pub progressbar: bool,
}

impl SequentialRunner {
    pub fn new(progressbar: bool) -> Self {
        Self { progressbar }
    }
}

impl Runner for SequentialRunner {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn is_multi_worker(&self) -> bool {
        false
    }

    fn run(&self, function: UnitFunction, units: Units<'_>) -> SmrtResult<Vec<SimulationResult>> {
        let total = units.len();
        log::info!("Running {} simulation(s) sequentially", total);

        let progress = if self.progressbar {
            let bar = indicatif::ProgressBar::new(total as u64);
            let style = indicatif::ProgressStyle::with_template("{bar:40} {pos}/{len} [{elapsed_precise}]")
                .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar());
            bar.set_style(style);
            Some(bar)
        } else {
            None
        };

        let ctx = WorkerContext::local();
        let mut results = Vec::with_capacity(total);
        for (i, unit) in units.enumerate() {
            log::trace!("Solving unit {}/{}", i + 1, total);
            results.push(function(&unit, &ctx)?);
            if let Some(bar) = &progress {
                bar.inc(1);
            }
        }
        if let Some(bar) = progress {
            bar.finish_and_clear();
        }
        Ok(results)
    }
}

/// Local worker pool
#[derive(Debug, Clone)]
pub struct LocalParallelRunner {
    /// Pool size, `None` for all available cores
    pub n_jobs: Option<usize>,
    /// Thread cap for numerical kernels inside each worker, 0 to disable the cap
    pub max_numerical_threads: usize,
}

impl Default for LocalParallelRunner {
    fn default() -> Self {
        Self {
            n_jobs: None,
            max_numerical_threads: 1,
        }
    }
}

impl LocalParallelRunner {
    pub fn new(n_jobs: Option<usize>, max_numerical_threads: usize) -> Self {
        Self {
            n_jobs,
            max_numerical_threads,
        }
    }

    fn cap(&self) -> Option<usize> {
        (self.max_numerical_threads > 0).then_some(self.max_numerical_threads)
    }
}

impl Runner for LocalParallelRunner {
    fn name(&self) -> &'static str {
        "local_parallel"
    }

    fn is_multi_worker(&self) -> bool {
        self.n_jobs != Some(1)
    }

    fn run(&self, function: UnitFunction, units: Units<'_>) -> SmrtResult<Vec<SimulationResult>> {
        use rayon::prelude::*;

        let units: Vec<SimulationUnit> = units.collect();
        let cap = self.cap();
        let mut builder = rayon::ThreadPoolBuilder::new()
            .thread_name(|i| format!("smrt-worker-{}", i))
            .start_handler(move |i| log::debug!("Worker {} started, numerical threads cap: {:?}", i, cap));
        if let Some(n) = self.n_jobs {
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|e| SmrtError::Execution(format!("cannot build the worker pool: {}", e)))?;

        log::info!(
            "Running {} simulation(s) on {} local worker(s)",
            units.len(),
            pool.current_num_threads()
        );

        pool.install(|| {
            units
                .par_iter()
                .map(|unit| {
                    let ctx = WorkerContext {
                        max_numerical_threads: cap,
                        worker_index: rayon::current_thread_index().unwrap_or(0),
                    };
                    function(unit, &ctx)
                })
                .collect::<SmrtResult<Vec<_>>>()
        })
    }
}

/// A batch of units shipped to a remote worker
#[derive(Clone)]
pub struct BatchTask {
    pub function: UnitFunction,
    pub units: Vec<SimulationUnit>,
    pub context: WorkerContext,
}

impl BatchTask {
    pub fn execute(&self) -> SmrtResult<Vec<SimulationResult>> {
        self.units.iter().map(|unit| (self.function)(unit, &self.context)).collect()
    }
}

/// Connection to a cluster that runs batches and hands back their results
pub trait ClusterClient: Send + Sync {
    type Handle: Send;

    fn submit(&self, task: BatchTask) -> SmrtResult<Self::Handle>;

    /// Results of every handle, in the order of `handles`
    fn gather(&self, handles: Vec<Self::Handle>) -> SmrtResult<Vec<Vec<SimulationResult>>>;
}

/// Chunked submission to a cluster
#[derive(Debug, Clone)]
pub struct DistributedRunner<C> {
    client: C,
    pub chunk: usize,
}

impl<C: ClusterClient> DistributedRunner<C> {
    pub fn new(client: C) -> Self {
        Self { client, chunk: 10 }
    }

    pub fn with_chunk(mut self, chunk: usize) -> SmrtResult<Self> {
        if chunk == 0 {
            return Err(SmrtError::Configuration("chunk must be positive".to_string()));
        }
        self.chunk = chunk;
        Ok(self)
    }
}

impl<C: ClusterClient> Runner for DistributedRunner<C> {
    fn name(&self) -> &'static str {
        "distributed"
    }

    fn is_multi_worker(&self) -> bool {
        true
    }

    fn run(&self, function: UnitFunction, units: Units<'_>) -> SmrtResult<Vec<SimulationResult>> {
        let units: Vec<SimulationUnit> = units.collect();
        let chunk = self.chunk.max(1);
        log::info!(
            "Submitting {} simulation(s) in batches of {}",
            units.len(),
            chunk
        );

        let mut handles = Vec::with_capacity(units.len().div_ceil(chunk));
        for (i, batch) in units.chunks(chunk).enumerate() {
            let task = BatchTask {
                function: function.clone(),
                units: batch.to_vec(),
                // remote tasks always run single-threaded kernels
                context: WorkerContext::capped(1, i),
            };
            handles.push(self.client.submit(task)?);
        }

        let batches = self.client.gather(handles)?;
        let results: Vec<SimulationResult> = batches.into_iter().flatten().collect();
        if results.len() != units.len() {
            return Err(SmrtError::Execution(format!(
                "cluster returned {} results for {} simulations",
                results.len(),
                units.len()
            )));
        }
        Ok(results)
    }
}

/// In-process cluster backed by a tokio runtime; each batch runs on a blocking task
pub struct LocalCluster {
    runtime: tokio::runtime::Runtime,
}

impl LocalCluster {
    pub fn new(worker_threads: usize) -> SmrtResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .max_blocking_threads(worker_threads.max(1))
            .thread_name("smrt-cluster")
            .build()?;
        Ok(Self { runtime })
    }
}

impl std::fmt::Debug for LocalCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCluster").finish()
    }
}

impl ClusterClient for LocalCluster {
    type Handle = tokio::task::JoinHandle<SmrtResult<Vec<SimulationResult>>>;

    fn submit(&self, task: BatchTask) -> SmrtResult<Self::Handle> {
        log::trace!("Submitting batch {} ({} units)", task.context.worker_index, task.units.len());
        Ok(self.runtime.spawn_blocking(move || task.execute()))
    }

    fn gather(&self, handles: Vec<Self::Handle>) -> SmrtResult<Vec<Vec<SimulationResult>>> {
        self.runtime.block_on(async move {
            let mut out = Vec::with_capacity(handles.len());
            for handle in handles {
                let batch = handle
                    .await
                    .map_err(|e| SmrtError::Execution(format!("batch failed to complete: {}", e)))??;
                out.push(batch);
            }
            Ok(out)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::data_array::DataArray;
    use crate::core::microstructure::Homogeneous;
    use crate::core::sensor::{ChannelMap, SensorConfiguration};
    use crate::core::snowpack::{Layer, Snowpack};
    use crate::types::Mode;

    fn units(n: usize) -> Vec<SimulationUnit> {
        let sensor = Arc::new(SensorConfiguration::passive(&[37e9], &[55.0]).unwrap());
        (0..n)
            .map(|i| {
                let layer = Layer::new(1.0 + i as f64, 260.0, 300.0, Arc::new(Homogeneous { frac_volume: 0.3 })).unwrap();
                SimulationUnit {
                    sensor: sensor.clone(),
                    snowpack: Arc::new(Snowpack::new(vec![layer])),
                    atmosphere: None,
                }
            })
            .collect()
    }

    fn thickness_function() -> UnitFunction {
        Arc::new(|unit: &SimulationUnit, _ctx: &WorkerContext| {
            let d = unit.snowpack.layers[0].thickness;
            if d > 100.0 {
                return Err(SmrtError::Execution("too thick".to_string()));
            }
            Ok(SimulationResult::new(Mode::Passive, DataArray::scalar(d), ChannelMap::new()))
        })
    }

    fn values(results: &[SimulationResult]) -> Vec<f64> {
        results.iter().filter_map(|r| r.data().value()).collect()
    }

    fn run_with(runner: &dyn Runner, n: usize) -> SmrtResult<Vec<SimulationResult>> {
        let list = units(n);
        let len = list.len();
        runner.run(thickness_function(), Units::new(list.into_iter(), len))
    }

    #[test]
    fn test_strategies_preserve_order() {
        let expected: Vec<f64> = (0..23).map(|i| 1.0 + i as f64).collect();

        let sequential = run_with(&SequentialRunner::default(), 23).unwrap();
        assert_eq!(values(&sequential), expected);

        let parallel = run_with(&LocalParallelRunner::new(Some(4), 1), 23).unwrap();
        assert_eq!(values(&parallel), expected);

        let cluster = LocalCluster::new(3).unwrap();
        let distributed = DistributedRunner::new(cluster).with_chunk(5).unwrap();
        assert_eq!(values(&run_with(&distributed, 23).unwrap()), expected);
    }

    #[test]
    fn test_failure_aborts_batch() {
        assert!(run_with(&SequentialRunner::default(), 120).is_err());
        assert!(run_with(&LocalParallelRunner::default(), 120).is_err());
        let distributed = DistributedRunner::new(LocalCluster::new(2).unwrap());
        assert!(run_with(&distributed, 120).is_err());
    }

    #[test]
    fn test_worker_context_caps() {
        let seen: UnitFunction = Arc::new(|_unit: &SimulationUnit, ctx: &WorkerContext| {
            let cap = ctx.max_numerical_threads.map_or(0.0, |n| n as f64);
            Ok(SimulationResult::new(Mode::Passive, DataArray::scalar(cap), ChannelMap::new()))
        });
        let list = units(4);
        let results = LocalParallelRunner::new(Some(2), 1)
            .run(seen.clone(), Units::new(list.clone().into_iter(), 4))
            .unwrap();
        assert!(values(&results).iter().all(|&c| c == 1.0));

        let results = LocalParallelRunner::new(Some(2), 0)
            .run(seen.clone(), Units::new(list.clone().into_iter(), 4))
            .unwrap();
        assert!(values(&results).iter().all(|&c| c == 0.0));

        let distributed = DistributedRunner::new(LocalCluster::new(2).unwrap());
        let results = distributed.run(seen, Units::new(list.into_iter(), 4)).unwrap();
        assert!(values(&results).iter().all(|&c| c == 1.0));
        assert!(!WorkerContext::capped(1, 0).allows_nested_parallelism());
        assert!(WorkerContext::local().allows_nested_parallelism());
    }

    #[test]
    fn test_invalid_chunk() {
        let cluster = LocalCluster::new(1).unwrap();
        assert!(DistributedRunner::new(cluster).with_chunk(0).is_err());
    }
}

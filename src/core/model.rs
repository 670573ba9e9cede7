//! Model: an EM model per layer plus a radiative transfer solver
//!
//! A [`Model`] is built with [`make_model`] and driven with [`Model::run`]:
//! the run is expanded into independent simulation units, each unit builds its
//! layer EM models and calls the solver, a [`Runner`] evaluates the units and
//! the per-unit results are folded back into one labeled result.
//!
//! ```no_run
//! use smrt::core::model::{make_model, RunOptions};
//! # fn demo(sensor: smrt::SensorConfiguration, snowpack: smrt::Snowpack) -> smrt::SmrtResult<()> {
//! let model = make_model("iba", "first_order")?;
//! let result = model.run(&sensor, snowpack, RunOptions::default())?;
//! println!("{:?}", result.as_passive()?.tb_v(&Default::default())?);
//! # Ok(())
//! # }
//! ```

use crate::core::assembler::fold_results;
use crate::core::atmosphere::Atmosphere;
use crate::core::plugin::{Options, Resolved};
use crate::core::registry::{default_registry, PluginRegistry};
use crate::core::result::SimulationResult;
use crate::core::runner::{LocalParallelRunner, Runner, SequentialRunner, UnitFunction, WorkerContext};
use crate::core::sensor::SensorConfiguration;
use crate::core::simulation::{prepare_simulations, Expansion, SimulationUnit, SnowpackDimension, SnowpackInput};
use crate::core::snowpack::{Layer, Snowpack};
use crate::emmodel::{EmModel, EmModelConstructor, EmModelSpec};
use crate::rtsolver::{RtSolver, RtSolverConstructor, RtSolverSpec};
use crate::types::{SmrtError, SmrtResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// EM model identifier: one for every layer, or one per layer
#[derive(Debug, Clone)]
pub enum EmModelSelection {
    Single(EmModelSpec),
    PerLayer(Vec<EmModelSpec>),
}

impl From<&str> for EmModelSelection {
    fn from(name: &str) -> Self {
        EmModelSelection::Single(name.into())
    }
}

impl From<EmModelSpec> for EmModelSelection {
    fn from(spec: EmModelSpec) -> Self {
        EmModelSelection::Single(spec)
    }
}

impl From<Vec<&str>> for EmModelSelection {
    fn from(names: Vec<&str>) -> Self {
        EmModelSelection::PerLayer(names.into_iter().map(EmModelSpec::from).collect())
    }
}

impl From<Vec<EmModelSpec>> for EmModelSelection {
    fn from(specs: Vec<EmModelSpec>) -> Self {
        EmModelSelection::PerLayer(specs)
    }
}

/// Construction options of the EM models, shared or one set per layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmModelOptions {
    Shared(Options),
    PerLayer(Vec<Options>),
}

impl Default for EmModelOptions {
    fn default() -> Self {
        EmModelOptions::Shared(Options::new())
    }
}

impl From<Options> for EmModelOptions {
    fn from(options: Options) -> Self {
        EmModelOptions::Shared(options)
    }
}

impl From<Vec<Options>> for EmModelOptions {
    fn from(options: Vec<Options>) -> Self {
        EmModelOptions::PerLayer(options)
    }
}

impl EmModelOptions {
    fn update(&mut self, extra: &Options) {
        match self {
            EmModelOptions::Shared(options) => options.update(extra),
            EmModelOptions::PerLayer(list) => list.iter_mut().for_each(|options| options.update(extra)),
        }
    }
}

#[derive(Clone)]
enum EmModels {
    Single(EmModelConstructor),
    PerLayer(Vec<EmModelConstructor>),
}

#[derive(Clone)]
enum Solver {
    Constructor(RtSolverConstructor),
    Instance(Arc<dyn RtSolver>),
}

/// Options of [`Model::run`]
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Name (and values) of the axis created for a batch of snowpacks
    pub snowpack_dimension: Option<SnowpackDimension>,
    /// Progress bar, sequential runs only
    pub progressbar: bool,
    /// Evaluate on a local worker pool
    pub parallel_computation: bool,
    /// Explicit strategy, overrides `parallel_computation`; a multi-worker
    /// strategy cannot be combined with `progressbar`
    pub runner: Option<Arc<dyn Runner>>,
    /// Legacy argument, the atmosphere now belongs to the snowpack
    pub atmosphere: Option<Arc<dyn Atmosphere>>,
}

impl RunOptions {
    pub fn with_snowpack_dimension(mut self, dimension: SnowpackDimension) -> Self {
        self.snowpack_dimension = Some(dimension);
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn Runner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn parallel(mut self) -> Self {
        self.parallel_computation = true;
        self
    }
}

#[derive(Clone)]
pub struct Model {
    registry: Arc<PluginRegistry>,
    emmodel_names: Vec<String>,
    emmodels: EmModels,
    solver_name: String,
    solver: Solver,
    emmodel_options: EmModelOptions,
    rtsolver_options: Options,
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("emmodel", &self.emmodel_names)
            .field("rtsolver", &self.solver_name)
            .field("emmodel_options", &self.emmodel_options)
            .field("rtsolver_options", &self.rtsolver_options)
            .finish()
    }
}

fn spec_name<C, I>(spec: &crate::core::plugin::PluginSpec<C, I>, default: &str) -> String {
    use crate::core::plugin::PluginSpec;
    match spec {
        PluginSpec::Default => default.to_string(),
        PluginSpec::Name(name) => name.clone(),
        PluginSpec::Constructor(_) => "custom".to_string(),
        PluginSpec::Instance(_) => "instance".to_string(),
    }
}

/// Build a model with the built-in plug-ins
pub fn make_model(emmodel: impl Into<EmModelSelection>, rtsolver: impl Into<RtSolverSpec>) -> SmrtResult<Model> {
    Model::with_registry(default_registry(), emmodel, rtsolver)
}

/// Build the EM model of one layer from an identifier
pub fn make_emmodel(
    registry: &PluginRegistry,
    spec: EmModelSpec,
    sensor: &SensorConfiguration,
    layer: &Layer,
    options: &Options,
) -> SmrtResult<Box<dyn EmModel>> {
    let ctor = resolve_emmodel(registry, spec)?;
    ctor(sensor, layer, options)
}

fn resolve_emmodel(registry: &PluginRegistry, spec: EmModelSpec) -> SmrtResult<EmModelConstructor> {
    match registry.emmodels.resolve(spec)? {
        Resolved::Constructor(ctor) => Ok(ctor),
        Resolved::Instance(never) => match never {},
    }
}

impl Model {
    pub fn with_registry(
        registry: Arc<PluginRegistry>,
        emmodel: impl Into<EmModelSelection>,
        rtsolver: impl Into<RtSolverSpec>,
    ) -> SmrtResult<Model> {
        let (emmodel_names, emmodels) = match emmodel.into() {
            EmModelSelection::Single(spec) => {
                let name = spec_name(&spec, "iba");
                (vec![name], EmModels::Single(resolve_emmodel(&registry, spec)?))
            }
            EmModelSelection::PerLayer(specs) => {
                if specs.is_empty() {
                    return Err(SmrtError::Configuration("the list of EM models is empty".to_string()));
                }
                let names = specs.iter().map(|s| spec_name(s, "iba")).collect();
                let ctors = specs
                    .into_iter()
                    .map(|spec| resolve_emmodel(&registry, spec))
                    .collect::<SmrtResult<Vec<_>>>()?;
                (names, EmModels::PerLayer(ctors))
            }
        };

        let rtsolver = rtsolver.into();
        let solver_name = match &rtsolver {
            RtSolverSpec::Instance(solver) => solver.name().to_string(),
            spec => spec_name(spec, "first_order"),
        };
        let solver = match registry.rtsolvers.resolve(rtsolver)? {
            Resolved::Constructor(ctor) => Solver::Constructor(ctor),
            Resolved::Instance(solver) => Solver::Instance(solver),
        };

        log::info!("Created model with EM model {:?} and RT solver '{}'", emmodel_names, solver_name);
        Ok(Model {
            registry,
            emmodel_names,
            emmodels,
            solver_name,
            solver,
            emmodel_options: EmModelOptions::default(),
            rtsolver_options: Options::new(),
        })
    }

    pub fn with_emmodel_options(mut self, options: impl Into<EmModelOptions>) -> Self {
        self.emmodel_options = options.into();
        self
    }

    pub fn with_rtsolver_options(mut self, options: Options) -> Self {
        self.rtsolver_options = options;
        self
    }

    pub fn emmodel_options(&self) -> &EmModelOptions {
        &self.emmodel_options
    }

    pub fn rtsolver_options(&self) -> &Options {
        &self.rtsolver_options
    }

    /// Replace the EM model options when `options` is given, then merge `extra`
    pub fn set_emmodel_options(&mut self, options: Option<EmModelOptions>, extra: &Options) {
        if let Some(options) = options {
            self.emmodel_options = options;
        }
        self.emmodel_options.update(extra);
    }

    /// Replace the solver options when `options` is given, then merge `extra`
    pub fn set_rtsolver_options(&mut self, options: Option<Options>, extra: &Options) {
        if let Some(options) = options {
            self.rtsolver_options = options;
        }
        self.rtsolver_options.update(extra);
    }

    /// One EM model per layer of `snowpack`
    pub fn make_emmodels(
        &self,
        sensor: &SensorConfiguration,
        snowpack: &Snowpack,
    ) -> SmrtResult<Vec<Box<dyn EmModel>>> {
        let nlayer = snowpack.nlayer();
        if let EmModels::PerLayer(ctors) = &self.emmodels {
            if ctors.len() != nlayer {
                return Err(SmrtError::ShapeMismatch(format!(
                    "{} EM models given for a snowpack of {} layers",
                    ctors.len(),
                    nlayer
                )));
            }
        }
        if let EmModelOptions::PerLayer(list) = &self.emmodel_options {
            if list.len() != nlayer {
                return Err(SmrtError::ShapeMismatch(format!(
                    "{} sets of EM model options given for a snowpack of {} layers",
                    list.len(),
                    nlayer
                )));
            }
        }

        snowpack
            .layers
            .iter()
            .enumerate()
            .map(|(i, layer)| {
                let ctor = match &self.emmodels {
                    EmModels::Single(ctor) => *ctor,
                    EmModels::PerLayer(ctors) => ctors[i],
                };
                let options = match &self.emmodel_options {
                    EmModelOptions::Shared(options) => options,
                    EmModelOptions::PerLayer(list) => &list[i],
                };
                ctor(sensor, layer, options)
            })
            .collect()
    }

    fn solver(&self) -> SmrtResult<Arc<dyn RtSolver>> {
        match &self.solver {
            Solver::Constructor(ctor) => ctor(&self.rtsolver_options),
            Solver::Instance(solver) if solver.reentrant() => Ok(solver.clone()),
            Solver::Instance(solver) => Err(SmrtError::Configuration(format!(
                "the solver '{}' keeps state between calls and cannot be used as an instance",
                solver.name()
            ))),
        }
    }

    /// Solve one unit: build the layer EM models and call the solver
    pub fn run_single_simulation(&self, unit: &SimulationUnit, ctx: &WorkerContext) -> SmrtResult<SimulationResult> {
        let emmodels = self.make_emmodels(&unit.sensor, &unit.snowpack)?;
        let solver = self.solver()?;
        solver.solve(&unit.snowpack, &emmodels, &unit.sensor, unit.atmosphere.as_deref(), ctx)
    }

    /// Expand a run into units using the solver's broadcast capability
    pub fn prepare_simulations<'a>(
        &self,
        sensor: &SensorConfiguration,
        snowpack: SnowpackInput,
        snowpack_dimension: Option<SnowpackDimension>,
    ) -> SmrtResult<Expansion<'a>> {
        let native = self.solver()?.broadcast_capability();
        prepare_simulations(sensor, snowpack, snowpack_dimension, native)
    }

    fn select_runner(&self, options: &RunOptions) -> SmrtResult<Arc<dyn Runner>> {
        if options.progressbar && options.parallel_computation {
            return Err(SmrtError::Configuration(
                "Parallel computation is incompatible with progressbar".to_string(),
            ));
        }
        let runner: Arc<dyn Runner> = match &options.runner {
            Some(runner) => runner.clone(),
            None if options.parallel_computation => Arc::new(LocalParallelRunner::default()),
            None => Arc::new(SequentialRunner::new(options.progressbar)),
        };
        if options.progressbar && runner.is_multi_worker() {
            return Err(SmrtError::Configuration(format!(
                "the {} runner is incompatible with progressbar",
                runner.name()
            )));
        }
        if let Solver::Instance(solver) = &self.solver {
            if runner.is_multi_worker() {
                return Err(SmrtError::Configuration(format!(
                    "the solver instance '{}' cannot be shared by the {} runner, give the solver by name",
                    solver.name(),
                    runner.name()
                )));
            }
        }
        Ok(runner)
    }

    /// Run the model for `sensor` over one or many snowpacks
    pub fn run(
        &self,
        sensor: &SensorConfiguration,
        snowpack: impl Into<SnowpackInput>,
        options: RunOptions,
    ) -> SmrtResult<SimulationResult> {
        if options.atmosphere.is_some() {
            return Err(SmrtError::Deprecated(
                "the atmosphere argument of run is no longer supported, attach the atmosphere to the snowpack"
                    .to_string(),
            ));
        }
        let runner = self.select_runner(&options)?;
        let expansion = self.prepare_simulations(sensor, snowpack.into(), options.snowpack_dimension)?;

        log::info!(
            "Running {} simulation(s) with the {} runner",
            expansion.units.len(),
            runner.name()
        );
        let model = self.clone();
        let function: UnitFunction = Arc::new(move |unit: &SimulationUnit, ctx: &WorkerContext| {
            model.run_single_simulation(unit, ctx)
        });
        let results = runner.run(function, expansion.units)?;
        fold_results(results, &expansion.axes)
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }
}

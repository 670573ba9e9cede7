//! Radiative transfer solvers

pub mod first_order;

pub use first_order::FirstOrder;

use crate::core::atmosphere::Atmosphere;
use crate::core::plugin::{Options, PluginSpec, Registry};
use crate::core::result::SimulationResult;
use crate::core::runner::WorkerContext;
use crate::core::sensor::SensorConfiguration;
use crate::core::snowpack::Snowpack;
use crate::emmodel::EmModel;
use crate::types::SmrtResult;
use std::sync::Arc;

/// Propagates intensity through the layers of a snowpack
pub trait RtSolver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Sensor axes solved in one call; the others are split before solving
    fn broadcast_capability(&self) -> &'static [&'static str] {
        &[]
    }

    /// Whether one instance can be shared between simulations
    fn reentrant(&self) -> bool {
        false
    }

    fn solve(
        &self,
        snowpack: &Snowpack,
        emmodels: &[Box<dyn EmModel>],
        sensor: &SensorConfiguration,
        atmosphere: Option<&dyn Atmosphere>,
        ctx: &WorkerContext,
    ) -> SmrtResult<SimulationResult>;
}

impl std::fmt::Debug for dyn RtSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RtSolver({})", self.name())
    }
}

pub type RtSolverConstructor = fn(&Options) -> SmrtResult<Arc<dyn RtSolver>>;

pub type RtSolverSpec = PluginSpec<RtSolverConstructor, Arc<dyn RtSolver>>;

pub fn builtin_rtsolvers() -> Registry<RtSolverConstructor> {
    let mut registry: Registry<RtSolverConstructor> = Registry::new("rtsolver");
    registry
        .register("first_order", FirstOrder::from_options)
        .register("nonscattering", FirstOrder::nonscattering_from_options)
        .set_default("first_order");
    registry
}

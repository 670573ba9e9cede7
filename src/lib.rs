//! smrt: microwave emission and backscatter of layered media
//!
//! A [`Model`] combines an electromagnetic model applied to every layer of a
//! [`Snowpack`] with a radiative transfer solver. Running a model over a
//! [`SensorConfiguration`] and one or many snowpacks expands the run into
//! independent simulations, evaluates them with a chosen [`Runner`] and folds
//! the outputs into one labeled [`SimulationResult`].

pub mod core;
pub mod emmodel;
pub mod interface;
pub mod io;
pub mod rtsolver;
pub mod types;

// Re-export main types and functions for easier access
pub use types::{Label, Mode, Polarization, SmrtError, SmrtResult};

pub use crate::core::{
    make_model, make_snowpack, make_substrate, ActiveResult, Model, ModelConfig, Options, PassiveResult,
    RunOptions, Runner, SensorConfiguration, SimulationResult, Snowpack, Substrate,
};
pub use emmodel::EmModel;
pub use interface::{make_interface, Interface};
pub use io::{open_result, save_result};
pub use rtsolver::RtSolver;

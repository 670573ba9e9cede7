//! Orchestration: plug-in resolution, simulation expansion, execution and
//! result assembly

pub mod assembler;
pub mod atmosphere;
pub mod config;
pub mod data_array;
pub mod microstructure;
pub mod model;
pub mod permittivity;
pub mod plugin;
pub mod registry;
pub mod result;
pub mod runner;
pub mod sensor;
pub mod simulation;
pub mod snowpack;
pub mod substrate;
pub mod table;

// Re-export main types
pub use assembler::{concat_results, fold_results, unfold_results};
pub use atmosphere::{Atmosphere, SimpleIsotropicAtmosphere};
pub use config::ModelConfig;
pub use data_array::{DataArray, Selection, Selector, Value};
pub use microstructure::{Exponential, Homogeneous, Microstructure};
pub use model::{make_emmodel, make_model, EmModelOptions, EmModelSelection, Model, RunOptions};
pub use plugin::{Options, ParamValue, PluginSpec};
pub use registry::{default_registry, PluginRegistry};
pub use result::{ActiveResult, PassiveResult, SimulationResult};
pub use runner::{
    ClusterClient, DistributedRunner, LocalCluster, LocalParallelRunner, Runner, SequentialRunner, WorkerContext,
};
pub use sensor::SensorConfiguration;
pub use simulation::{AxisDescriptor, AxisOrigin, SensitivityStudy, SimulationUnit, SnowpackDimension, SnowpackInput};
pub use snowpack::{make_snowpack, Layer, Snowpack};
pub use substrate::{make_substrate, Substrate};
pub use table::{ChannelAxis, Table};

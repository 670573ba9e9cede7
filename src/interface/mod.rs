//! Boundaries between layers and at the bottom of the snowpack
//!
//! Every boundary behavior implements [`Interface`]. The four boundary operations
//! default to [`SmrtError::Unsupported`]; an implementation opts in to the subset
//! it supports and advertises it through [`Interface::capabilities`].

pub mod flat;
pub mod lambertian;
pub mod reflector;
pub mod transparent;

pub use flat::Flat;
pub use lambertian::Lambertian;
pub use reflector::Reflector;
pub use transparent::Transparent;

use crate::core::plugin::{build_broadcast, Options, PluginSpec, Registry, Resolved};
use crate::types::{SmrtError, SmrtResult};
use ndarray::{Array1, Array2, Array3};
use num_complex::Complex64;
use std::sync::Arc;

/// Boundary operations an interface implements
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub specular_reflection: bool,
    pub coherent_transmission: bool,
    pub diffuse_reflection: bool,
    pub ft_even_diffuse_reflection: bool,
}

/// Boundary behavior between medium 1 (above) and medium 2 (below)
#[allow(clippy::too_many_arguments)]
pub trait Interface: std::fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    /// Specular reflectivity, one value per polarization (V, H[, U])
    fn specular_reflection_matrix(
        &self,
        _frequency: f64,
        _eps_1: Complex64,
        _eps_2: Complex64,
        _mu1: f64,
        _npol: usize,
    ) -> SmrtResult<Array1<f64>> {
        Err(unsupported(self.name(), "specular_reflection_matrix"))
    }

    /// Coherent transmissivity, one value per polarization
    fn coherent_transmission_matrix(
        &self,
        _frequency: f64,
        _eps_1: Complex64,
        _eps_2: Complex64,
        _mu1: f64,
        _npol: usize,
    ) -> SmrtResult<Array1<f64>> {
        Err(unsupported(self.name(), "coherent_transmission_matrix"))
    }

    /// Diffuse reflection matrix (npol x npol) for the given geometry
    fn diffuse_reflection_matrix(
        &self,
        _frequency: f64,
        _eps_1: Complex64,
        _eps_2: Complex64,
        _mu_s: f64,
        _mu_i: f64,
        _dphi: f64,
        _npol: usize,
    ) -> SmrtResult<Array2<f64>> {
        Err(unsupported(self.name(), "diffuse_reflection_matrix"))
    }

    /// Even Fourier modes of the diffuse reflection matrix, shape (m_max + 1, npol, npol)
    fn ft_even_diffuse_reflection_matrix(
        &self,
        _frequency: f64,
        _eps_1: Complex64,
        _eps_2: Complex64,
        _mu_s: f64,
        _mu_i: f64,
        _m_max: usize,
        _npol: usize,
    ) -> SmrtResult<Array3<f64>> {
        Err(unsupported(self.name(), "ft_even_diffuse_reflection_matrix"))
    }
}

pub(crate) fn unsupported(name: &str, operation: &str) -> SmrtError {
    SmrtError::Unsupported(format!("interface '{}' does not implement {}", name, operation))
}

/// Polarization vector (V, H[, U]) with the third Stokes term taken as the geometric mean
pub(crate) fn polarized_vector(v: f64, h: f64, npol: usize) -> SmrtResult<Array1<f64>> {
    match npol {
        2 => Ok(Array1::from(vec![v, h])),
        3 => Ok(Array1::from(vec![v, h, (v * h).max(0.0).sqrt()])),
        _ => Err(SmrtError::Configuration(format!("invalid value of npol: {}", npol))),
    }
}

pub type InterfaceConstructor = fn(&Options) -> SmrtResult<Arc<dyn Interface>>;

/// Caller-side identification of an interface
pub type InterfaceSpec = PluginSpec<InterfaceConstructor, Arc<dyn Interface>>;

/// Registry of the built-in boundaries; `flat` is the default
pub fn builtin_interfaces() -> Registry<InterfaceConstructor> {
    let mut registry: Registry<InterfaceConstructor> = Registry::new("interface");
    registry
        .register("flat", Flat::from_options)
        .register("transparent", Transparent::from_options)
        .register("reflector", Reflector::from_options)
        .register("lambertian", Lambertian::from_options)
        .set_default("flat");
    registry
}

/// Resolve an interface identifier into ready instances.
///
/// An instance is returned unchanged. Otherwise, when `broadcast` is set and some
/// options are sequences, one interface is built per index.
pub fn make_interface(
    registry: &Registry<InterfaceConstructor>,
    spec: InterfaceSpec,
    options: &Options,
    broadcast: bool,
) -> SmrtResult<Vec<Arc<dyn Interface>>> {
    match registry.resolve(spec)? {
        Resolved::Instance(interface) => Ok(vec![interface]),
        Resolved::Constructor(ctor) => {
            let built = build_broadcast(options, broadcast, ctor)?;
            log::debug!("Built {} {} instance(s)", built.len(), registry.kind());
            Ok(built)
        }
    }
}

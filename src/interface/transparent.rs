use super::{polarized_vector, Capabilities, Interface};
use crate::core::plugin::Options;
use crate::types::SmrtResult;
use ndarray::Array1;
use num_complex::Complex64;
use std::sync::Arc;

/// Boundary that neither reflects nor attenuates
#[derive(Debug, Clone, Default)]
pub struct Transparent;

impl Transparent {
    pub fn from_options(options: &Options) -> SmrtResult<Arc<dyn Interface>> {
        options.check_known("transparent", &[])?;
        Ok(Arc::new(Transparent))
    }
}

impl Interface for Transparent {
    fn name(&self) -> &'static str {
        "transparent"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            specular_reflection: true,
            coherent_transmission: true,
            ..Default::default()
        }
    }

    fn specular_reflection_matrix(
        &self,
        _frequency: f64,
        _eps_1: Complex64,
        _eps_2: Complex64,
        _mu1: f64,
        npol: usize,
    ) -> SmrtResult<Array1<f64>> {
        polarized_vector(0.0, 0.0, npol)
    }

    fn coherent_transmission_matrix(
        &self,
        _frequency: f64,
        _eps_1: Complex64,
        _eps_2: Complex64,
        _mu1: f64,
        npol: usize,
    ) -> SmrtResult<Array1<f64>> {
        polarized_vector(1.0, 1.0, npol)
    }
}

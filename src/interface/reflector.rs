use super::{polarized_vector, Capabilities, Interface};
use crate::core::plugin::Options;
use crate::types::{SmrtError, SmrtResult};
use ndarray::{Array1, Array2};
use num_complex::Complex64;
use std::f64::consts::PI;
use std::sync::Arc;

/// Boundary with a prescribed specular reflectivity and an optional isotropic
/// backscattering coefficient
#[derive(Debug, Clone)]
pub struct Reflector {
    pub specular_reflection: f64,
    /// Linear backscattering coefficient (sigma0)
    pub backscattering_coefficient: f64,
}

impl Reflector {
    pub fn new(specular_reflection: f64, backscattering_coefficient: f64) -> SmrtResult<Self> {
        if !(0.0..=1.0).contains(&specular_reflection) {
            return Err(SmrtError::Configuration(format!(
                "specular_reflection must be in [0, 1], got {}",
                specular_reflection
            )));
        }
        Ok(Self {
            specular_reflection,
            backscattering_coefficient,
        })
    }

    pub fn from_options(options: &Options) -> SmrtResult<Arc<dyn Interface>> {
        options.check_known("reflector", &["specular_reflection", "backscattering_coefficient"])?;
        Ok(Arc::new(Reflector::new(
            options.require_f64("specular_reflection")?,
            options.get_f64("backscattering_coefficient")?.unwrap_or(0.0),
        )?))
    }
}

impl Interface for Reflector {
    fn name(&self) -> &'static str {
        "reflector"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            specular_reflection: true,
            coherent_transmission: true,
            diffuse_reflection: true,
            ft_even_diffuse_reflection: false,
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
        polarized_vector(self.specular_reflection, self.specular_reflection, npol)
    }

    fn coherent_transmission_matrix(
        &self,
        _frequency: f64,
        _eps_1: Complex64,
        _eps_2: Complex64,
        _mu1: f64,
        npol: usize,
    ) -> SmrtResult<Array1<f64>> {
        let t = 1.0 - self.specular_reflection;
        polarized_vector(t, t, npol)
    }

    fn diffuse_reflection_matrix(
        &self,
        _frequency: f64,
        _eps_1: Complex64,
        _eps_2: Complex64,
        _mu_s: f64,
        mu_i: f64,
        _dphi: f64,
        npol: usize,
    ) -> SmrtResult<Array2<f64>> {
        let mut m = Array2::zeros((npol, npol));
        let value = self.backscattering_coefficient / (4.0 * PI * mu_i);
        m[[0, 0]] = value;
        m[[1, 1]] = value;
        Ok(m)
    }
}

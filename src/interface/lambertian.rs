use super::{polarized_vector, Capabilities, Interface};
use crate::core::plugin::Options;
use crate::types::{SmrtError, SmrtResult};
use ndarray::{Array1, Array2, Array3};
use num_complex::Complex64;
use std::f64::consts::PI;
use std::sync::Arc;

/// Perfectly rough boundary scattering isotropically into the upper half-space.
///
/// There is no specular component.
#[derive(Debug, Clone)]
pub struct Lambertian {
    pub albedo: f64,
}

impl Lambertian {
    pub fn from_options(options: &Options) -> SmrtResult<Arc<dyn Interface>> {
        options.check_known("lambertian", &["albedo"])?;
        let albedo = options.require_f64("albedo")?;
        if !(0.0..=1.0).contains(&albedo) {
            return Err(SmrtError::Configuration(format!("albedo must be in [0, 1], got {}", albedo)));
        }
        Ok(Arc::new(Lambertian { albedo }))
    }

    fn diffuse_value(&self, mu_i: f64) -> f64 {
        self.albedo * mu_i / PI
    }
}

impl Interface for Lambertian {
    fn name(&self) -> &'static str {
        "lambertian"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            specular_reflection: false,
            coherent_transmission: true,
            diffuse_reflection: true,
            ft_even_diffuse_reflection: true,
        }
    }

    fn coherent_transmission_matrix(
        &self,
        _frequency: f64,
        _eps_1: Complex64,
        _eps_2: Complex64,
        _mu1: f64,
        npol: usize,
    ) -> SmrtResult<Array1<f64>> {
        let t = 1.0 - self.albedo;
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
        m[[0, 0]] = self.diffuse_value(mu_i);
        m[[1, 1]] = self.diffuse_value(mu_i);
        Ok(m)
    }

    fn ft_even_diffuse_reflection_matrix(
        &self,
        _frequency: f64,
        _eps_1: Complex64,
        _eps_2: Complex64,
        _mu_s: f64,
        mu_i: f64,
        m_max: usize,
        npol: usize,
    ) -> SmrtResult<Array3<f64>> {
        // azimuth independent: only the m = 0 mode is non-zero
        let mut m = Array3::zeros((m_max + 1, npol, npol));
        m[[0, 0, 0]] = self.diffuse_value(mu_i);
        m[[0, 1, 1]] = self.diffuse_value(mu_i);
        Ok(m)
    }
}

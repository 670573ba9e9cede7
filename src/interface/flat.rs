use super::{polarized_vector, Capabilities, Interface};
use crate::core::permittivity::fresnel_reflectivity;
use crate::core::plugin::Options;
use crate::types::SmrtResult;
use ndarray::Array1;
use num_complex::Complex64;
use std::sync::Arc;

/// Smooth boundary following the Fresnel coefficients
#[derive(Debug, Clone, Default)]
pub struct Flat;

impl Flat {
    pub fn from_options(options: &Options) -> SmrtResult<Arc<dyn Interface>> {
        options.check_known("flat", &[])?;
        Ok(Arc::new(Flat))
    }
}

impl Interface for Flat {
    fn name(&self) -> &'static str {
        "flat"
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
        eps_1: Complex64,
        eps_2: Complex64,
        mu1: f64,
        npol: usize,
    ) -> SmrtResult<Array1<f64>> {
        let (rv, rh) = fresnel_reflectivity(eps_1, eps_2, mu1);
        polarized_vector(rv, rh, npol)
    }

    fn coherent_transmission_matrix(
        &self,
        _frequency: f64,
        eps_1: Complex64,
        eps_2: Complex64,
        mu1: f64,
        npol: usize,
    ) -> SmrtResult<Array1<f64>> {
        let (rv, rh) = fresnel_reflectivity(eps_1, eps_2, mu1);
        polarized_vector(1.0 - rv, 1.0 - rh, npol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_conservation() {
        let eps_1 = Complex64::new(1.0, 0.0);
        let eps_2 = Complex64::new(3.2, 0.01);
        for &mu in &[1.0, 0.8, 0.5, 0.2] {
            let r = Flat.specular_reflection_matrix(10e9, eps_1, eps_2, mu, 2).unwrap();
            let t = Flat.coherent_transmission_matrix(10e9, eps_1, eps_2, mu, 2).unwrap();
            assert!((r[0] + t[0] - 1.0).abs() < 1e-12);
            assert!((r[1] + t[1] - 1.0).abs() < 1e-12);
            assert!(r[1] >= r[0]);
        }
    }

    #[test]
    fn test_no_diffuse_reflection() {
        let eps = Complex64::new(1.0, 0.0);
        assert!(!Flat.capabilities().diffuse_reflection);
        assert!(Flat.diffuse_reflection_matrix(10e9, eps, eps, 1.0, 1.0, 0.0, 2).is_err());
    }
}

//! Substrate at the bottom of the snowpack
//!
//! A [`Substrate`] wraps a boundary behavior ([`Interface`]) and adds the
//! temperature and the permittivity of the medium below. Each boundary operation
//! evaluates the permittivity at the call frequency and delegates to the wrapped
//! interface with that permittivity as medium 2.

use crate::core::permittivity::PermittivityModel;
use crate::core::plugin::{build_broadcast, Options, Registry, Resolved};
use crate::interface::{unsupported, Capabilities, Interface, InterfaceConstructor, InterfaceSpec};
use crate::types::{SmrtError, SmrtResult};
use ndarray::{Array1, Array2, Array3};
use num_complex::Complex64;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Substrate {
    interface: Arc<dyn Interface>,
    pub temperature: Option<f64>,
    pub permittivity_model: Option<PermittivityModel>,
}

impl Substrate {
    pub fn new(
        interface: Arc<dyn Interface>,
        temperature: Option<f64>,
        permittivity_model: Option<PermittivityModel>,
    ) -> Self {
        Self {
            interface,
            temperature,
            permittivity_model,
        }
    }

    pub fn name(&self) -> &'static str {
        self.interface.name()
    }

    pub fn interface(&self) -> &Arc<dyn Interface> {
        &self.interface
    }

    pub fn capabilities(&self) -> Capabilities {
        self.interface.capabilities()
    }

    /// Permittivity of the substrate medium at `frequency`, `None` without a model
    pub fn permittivity(&self, frequency: f64) -> SmrtResult<Option<Complex64>> {
        self.permittivity_model
            .as_ref()
            .map(|model| model.evaluate(frequency, self.temperature))
            .transpose()
    }

    fn medium2_permittivity(&self, frequency: f64) -> SmrtResult<Complex64> {
        self.permittivity(frequency)?
            .ok_or_else(|| SmrtError::MissingPermittivityModel(self.name().to_string()))
    }

    fn check(&self, supported: bool, operation: &str) -> SmrtResult<()> {
        if supported {
            Ok(())
        } else {
            Err(unsupported(self.name(), operation))
        }
    }

    pub fn specular_reflection_matrix(
        &self,
        frequency: f64,
        eps_1: Complex64,
        mu1: f64,
        npol: usize,
    ) -> SmrtResult<Array1<f64>> {
        self.check(self.capabilities().specular_reflection, "specular_reflection_matrix")?;
        let eps_2 = self.medium2_permittivity(frequency)?;
        self.interface.specular_reflection_matrix(frequency, eps_1, eps_2, mu1, npol)
    }

    /// Emissivity of the substrate seen from the layer above (coherent transmission)
    pub fn emissivity_matrix(
        &self,
        frequency: f64,
        eps_1: Complex64,
        mu1: f64,
        npol: usize,
    ) -> SmrtResult<Array1<f64>> {
        self.check(self.capabilities().coherent_transmission, "coherent_transmission_matrix")?;
        let eps_2 = self.medium2_permittivity(frequency)?;
        self.interface.coherent_transmission_matrix(frequency, eps_1, eps_2, mu1, npol)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn diffuse_reflection_matrix(
        &self,
        frequency: f64,
        eps_1: Complex64,
        mu_s: f64,
        mu_i: f64,
        dphi: f64,
        npol: usize,
    ) -> SmrtResult<Array2<f64>> {
        self.check(self.capabilities().diffuse_reflection, "diffuse_reflection_matrix")?;
        let eps_2 = self.medium2_permittivity(frequency)?;
        self.interface
            .diffuse_reflection_matrix(frequency, eps_1, eps_2, mu_s, mu_i, dphi, npol)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn ft_even_diffuse_reflection_matrix(
        &self,
        frequency: f64,
        eps_1: Complex64,
        mu_s: f64,
        mu_i: f64,
        m_max: usize,
        npol: usize,
    ) -> SmrtResult<Array3<f64>> {
        self.check(
            self.capabilities().ft_even_diffuse_reflection,
            "ft_even_diffuse_reflection_matrix",
        )?;
        let eps_2 = self.medium2_permittivity(frequency)?;
        self.interface
            .ft_even_diffuse_reflection_matrix(frequency, eps_1, eps_2, mu_s, mu_i, m_max, npol)
    }
}

/// Build substrates from an interface identifier.
///
/// `options` are the boundary's own parameters; sequence-valued options produce
/// one substrate per index sharing the same temperature and permittivity model.
pub fn make_substrate(
    registry: &Registry<InterfaceConstructor>,
    spec: InterfaceSpec,
    permittivity_model: Option<PermittivityModel>,
    temperature: Option<f64>,
    options: &Options,
) -> SmrtResult<Vec<Substrate>> {
    let interfaces = match registry.resolve(spec)? {
        Resolved::Instance(interface) => vec![interface],
        Resolved::Constructor(ctor) => build_broadcast(options, true, ctor)?,
    };
    Ok(interfaces
        .into_iter()
        .map(|interface| Substrate::new(interface, temperature, permittivity_model.clone()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::{builtin_interfaces, Flat, Lambertian};

    #[test]
    fn test_missing_permittivity_model() {
        let substrate = Substrate::new(Arc::new(Flat), Some(270.0), None);
        let eps_1 = Complex64::new(1.5, 0.0);
        let err = substrate.specular_reflection_matrix(10e9, eps_1, 0.8, 2).unwrap_err();
        assert!(matches!(err, SmrtError::MissingPermittivityModel(_)));
        let err = substrate.emissivity_matrix(10e9, eps_1, 0.8, 2).unwrap_err();
        assert!(matches!(err, SmrtError::MissingPermittivityModel(_)));
    }

    #[test]
    fn test_delegates_with_medium2_permittivity() {
        let model = PermittivityModel::function(|frequency, temperature| {
            assert_eq!(temperature, Some(270.0));
            Ok(Complex64::new(1.0 + frequency * 1e-10, 0.0))
        });
        let substrate = Substrate::new(Arc::new(Flat), Some(270.0), Some(model));
        let eps_1 = Complex64::new(1.0, 0.0);

        // eps_2 = 4 at 30 GHz
        let r = substrate.specular_reflection_matrix(30e9, eps_1, 1.0, 2).unwrap();
        assert!((r[0] - 1.0 / 9.0).abs() < 1e-12);
        let e = substrate.emissivity_matrix(30e9, eps_1, 1.0, 2).unwrap();
        assert!((e[1] - 8.0 / 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_unsupported_operation_before_permittivity() {
        let substrate = Substrate::new(Arc::new(Lambertian { albedo: 0.3 }), None, None);
        let eps_1 = Complex64::new(1.0, 0.0);
        let err = substrate.specular_reflection_matrix(10e9, eps_1, 0.8, 2).unwrap_err();
        assert!(matches!(err, SmrtError::Unsupported(_)));
    }

    #[test]
    fn test_make_substrate_broadcast() {
        let registry = builtin_interfaces();
        let options = Options::new()
            .with("specular_reflection", vec![0.2, 0.4, 0.6])
            .with("backscattering_coefficient", 0.05);
        let substrates = make_substrate(
            &registry,
            "reflector".into(),
            Some(PermittivityModel::from(5.0)),
            Some(265.0),
            &options,
        )
        .unwrap();
        assert_eq!(substrates.len(), 3);

        let eps_1 = Complex64::new(1.0, 0.0);
        for (i, substrate) in substrates.iter().enumerate() {
            assert_eq!(substrate.temperature, Some(265.0));
            let r = substrate.specular_reflection_matrix(10e9, eps_1, 1.0, 2).unwrap();
            assert!((r[0] - 0.2 * (i + 1) as f64).abs() < 1e-12);
        }
    }
}

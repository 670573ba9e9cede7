//! First-order radiative transfer
//!
//! Passive: zeroth-order emission of every layer attenuated on its way up, with
//! Fresnel transmission at the interfaces, substrate emission, reflected sky
//! and an optional atmosphere. Active: single scattering in each layer at the
//! backscatter geometry plus the diffuse reflection of the substrate.

use super::RtSolver;
use crate::core::atmosphere::Atmosphere;
use crate::core::data_array::DataArray;
use crate::core::permittivity::{fresnel_reflectivity, refracted_cosine};
use crate::core::plugin::Options;
use crate::core::result::SimulationResult;
use crate::core::runner::WorkerContext;
use crate::core::sensor::{SensorConfiguration, POLARIZATION, POLARIZATION_INC, THETA, THETA_INC};
use crate::core::snowpack::Snowpack;
use crate::emmodel::EmModel;
use crate::types::{Label, Mode, SmrtError, SmrtResult};
use ndarray::{Array, IxDyn};
use num_complex::Complex64;
use std::f64::consts::PI;
use std::sync::Arc;

const NPOL: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirstOrder {
    /// When unset, layers only absorb
    pub scattering: bool,
}

impl Default for FirstOrder {
    fn default() -> Self {
        Self { scattering: true }
    }
}

impl FirstOrder {
    pub fn from_options(options: &Options) -> SmrtResult<Arc<dyn RtSolver>> {
        options.check_known("first_order", &[])?;
        Ok(Arc::new(FirstOrder::default()))
    }

    pub fn nonscattering_from_options(options: &Options) -> SmrtResult<Arc<dyn RtSolver>> {
        options.check_known("nonscattering", &[])?;
        Ok(Arc::new(FirstOrder { scattering: false }))
    }
}

/// Per-layer quantities along one viewing direction
struct Stack {
    /// Cosine of the propagation angle in each layer
    mu: Vec<f64>,
    /// Extinction coefficient of each layer
    ke: Vec<f64>,
    /// Power transmissivity (V, H) of the interface at the top of each layer
    trans: Vec<[f64; NPOL]>,
    /// Power reflectivity (V, H) of the surface, seen from the air
    surface_reflectivity: [f64; NPOL],
}

impl FirstOrder {
    fn stack(&self, emmodels: &[Box<dyn EmModel>], mu0: f64) -> Stack {
        let air = Complex64::new(1.0, 0.0);
        let n = emmodels.len();
        let mut mu = Vec::with_capacity(n);
        let mut ke = Vec::with_capacity(n);
        let mut trans = Vec::with_capacity(n);
        let mut surface_reflectivity = [0.0; NPOL];

        let mut eps_above = air;
        let mut mu_above = mu0;
        for (l, em) in emmodels.iter().enumerate() {
            let eps = em.effective_permittivity();
            let (rv, rh) = fresnel_reflectivity(eps_above, eps, mu_above);
            if l == 0 {
                surface_reflectivity = [rv, rh];
            }
            trans.push([1.0 - rv, 1.0 - rh]);

            let mu_l = refracted_cosine(air, eps, mu0).re.clamp(1e-6, 1.0);
            mu.push(mu_l);
            ke.push(if self.scattering { em.ke(&[mu_l])[0] } else { em.ka() });

            eps_above = eps;
            mu_above = mu_l;
        }
        Stack {
            mu,
            ke,
            trans,
            surface_reflectivity,
        }
    }

    /// Brightness temperature (V, H) above the atmosphere at incidence cosine `mu0`
    fn emission(
        &self,
        snowpack: &Snowpack,
        emmodels: &[Box<dyn EmModel>],
        atmosphere: Option<&dyn Atmosphere>,
        frequency: f64,
        mu0: f64,
    ) -> SmrtResult<[f64; NPOL]> {
        let stack = self.stack(emmodels, mu0);
        let n = emmodels.len();

        let mut tb = [0.0; NPOL];
        if let (Some(substrate), Some(last)) = (&snowpack.substrate, emmodels.last()) {
            let emissivity = substrate.emissivity_matrix(frequency, last.effective_permittivity(), stack.mu[n - 1], NPOL)?;
            let temperature = substrate
                .temperature
                .unwrap_or(snowpack.layers[n - 1].temperature);
            for p in 0..NPOL {
                tb[p] = emissivity[p] * temperature;
            }
        }

        for l in (0..n).rev() {
            let layer = &snowpack.layers[l];
            let ke = stack.ke[l];
            let att = (-ke * layer.thickness / stack.mu[l]).exp();
            let albedo_complement = if ke > 0.0 { emmodels[l].ka() / ke } else { 0.0 };
            for p in 0..NPOL {
                tb[p] = tb[p] * att + albedo_complement * layer.temperature * (1.0 - att);
                tb[p] *= stack.trans[l][p];
            }
        }

        if let Some(atmosphere) = atmosphere {
            let tbdown = atmosphere.tbdown(frequency, mu0, NPOL);
            let tbup = atmosphere.tbup(frequency, mu0, NPOL);
            let trans = atmosphere.trans(frequency, mu0, NPOL);
            for p in 0..NPOL {
                tb[p] += stack.surface_reflectivity[p] * tbdown[p];
                tb[p] = tb[p] * trans[p] + tbup[p];
            }
        }
        Ok(tb)
    }

    /// Backscattered intensity [pol_s, pol_i] at incidence cosine `mu0`
    fn backscatter(
        &self,
        snowpack: &Snowpack,
        emmodels: &[Box<dyn EmModel>],
        frequency: f64,
        mu0: f64,
    ) -> SmrtResult<[[f64; NPOL]; NPOL]> {
        let stack = self.stack(emmodels, mu0);
        let n = emmodels.len();
        let mut intensity = [[0.0; NPOL]; NPOL];
        // two-way transmission down to the top of the current layer
        let mut two_way = [1.0; NPOL];

        for l in 0..n {
            for p in 0..NPOL {
                two_way[p] *= stack.trans[l][p];
            }
            let mu = stack.mu[l];
            let ke = stack.ke[l];
            let att2 = (-2.0 * ke * snowpack.layers[l].thickness / mu).exp();

            if self.scattering && ke > 0.0 {
                let phase = emmodels[l].phase(-mu, mu, PI, NPOL)?;
                for p in 0..NPOL {
                    for q in 0..NPOL {
                        intensity[p][q] += two_way[p] * two_way[q] * phase[[p, q]] * (1.0 - att2) / (2.0 * ke);
                    }
                }
            }
            for p in 0..NPOL {
                two_way[p] *= att2.sqrt();
            }
        }

        if let (Some(substrate), Some(last)) = (&snowpack.substrate, emmodels.last()) {
            if substrate.capabilities().diffuse_reflection {
                let mu = stack.mu[n - 1];
                let diffuse =
                    substrate.diffuse_reflection_matrix(frequency, last.effective_permittivity(), mu, mu, PI, NPOL)?;
                for p in 0..NPOL {
                    for q in 0..NPOL {
                        intensity[p][q] += two_way[p] * two_way[q] * diffuse[[p, q]];
                    }
                }
            }
        }
        Ok(intensity)
    }

    fn map_angles<T: Send>(
        &self,
        thetas: &[f64],
        ctx: &WorkerContext,
        f: impl Fn(f64) -> SmrtResult<T> + Send + Sync,
    ) -> SmrtResult<Vec<T>> {
        if ctx.allows_nested_parallelism() && thetas.len() > 1 {
            use rayon::prelude::*;
            thetas.par_iter().map(|t| f(t.to_radians().cos())).collect()
        } else {
            thetas.iter().map(|t| f(t.to_radians().cos())).collect()
        }
    }
}

fn labels<T: Copy + Into<Label>>(values: &[T]) -> Vec<Label> {
    values.iter().map(|&v| v.into()).collect()
}

fn dim_names(sensor: &SensorConfiguration) -> Vec<String> {
    sensor.result_dims().into_iter().map(String::from).collect()
}

impl RtSolver for FirstOrder {
    fn name(&self) -> &'static str {
        if self.scattering {
            "first_order"
        } else {
            "nonscattering"
        }
    }

    fn broadcast_capability(&self) -> &'static [&'static str] {
        &[THETA, THETA_INC, POLARIZATION, POLARIZATION_INC]
    }

    fn reentrant(&self) -> bool {
        true
    }

    fn solve(
        &self,
        snowpack: &Snowpack,
        emmodels: &[Box<dyn EmModel>],
        sensor: &SensorConfiguration,
        atmosphere: Option<&dyn Atmosphere>,
        ctx: &WorkerContext,
    ) -> SmrtResult<SimulationResult> {
        if emmodels.len() != snowpack.nlayer() {
            return Err(SmrtError::ShapeMismatch(format!(
                "{} EM models for {} layers",
                emmodels.len(),
                snowpack.nlayer()
            )));
        }
        if emmodels.is_empty() {
            return Err(SmrtError::Configuration("the snowpack has no layer".to_string()));
        }
        let frequency = sensor.frequency_value()?;
        let ntheta = sensor.theta.len();

        let data = match sensor.mode {
            Mode::Passive => {
                let tbs = self.map_angles(&sensor.theta, ctx, |mu0| {
                    self.emission(snowpack, emmodels, atmosphere, frequency, mu0)
                })?;
                let npol = sensor.polarization.len();
                let values = Array::from_shape_fn(IxDyn(&[npol, ntheta]), |idx| {
                    tbs[idx[1]][sensor.polarization[idx[0]].index()]
                });
                DataArray::new(
                    dim_names(sensor),
                    vec![labels(&sensor.polarization), labels(&sensor.theta)],
                    values,
                )?
            }
            Mode::Active => {
                let intensities = self.map_angles(&sensor.theta, ctx, |mu0| {
                    self.backscatter(snowpack, emmodels, frequency, mu0)
                })?;
                let (ninc, npol) = (sensor.polarization_inc.len(), sensor.polarization.len());
                let values = Array::from_shape_fn(IxDyn(&[ninc, npol, ntheta]), |idx| {
                    let q = sensor.polarization_inc[idx[0]].index();
                    let p = sensor.polarization[idx[1]].index();
                    intensities[idx[2]][p][q]
                });
                DataArray::new(
                    dim_names(sensor),
                    vec![
                        labels(&sensor.polarization_inc),
                        labels(&sensor.polarization),
                        labels(&sensor.theta),
                    ],
                    values,
                )?
            }
        };
        log::trace!("{} solved {} angle(s) at {:.2} GHz", self.name(), ntheta, frequency * 1e-9);
        Ok(SimulationResult::new(sensor.mode, data, sensor.channel_map.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::microstructure::Exponential;
    use crate::core::permittivity::PermittivityModel;
    use crate::core::snowpack::Layer;
    use crate::core::substrate::Substrate;
    use crate::emmodel::iba::{Iba, MixingFormula};
    use crate::interface::{Flat, Reflector};

    fn snowpack() -> Snowpack {
        let layers = [(0.1, 200.0), (100.0, 400.0)]
            .iter()
            .map(|&(d, rho)| {
                let ms = Arc::new(Exponential::new(rho / 917.0, 5e-5).unwrap());
                Layer::new(d, 250.0, rho, ms).unwrap()
            })
            .collect();
        Snowpack::new(layers)
    }

    fn emmodels(sensor: &SensorConfiguration, sp: &Snowpack) -> Vec<Box<dyn EmModel>> {
        sp.layers
            .iter()
            .map(|layer| Box::new(Iba::new(sensor, layer, MixingFormula::default()).unwrap()) as Box<dyn EmModel>)
            .collect()
    }

    #[test]
    fn test_passive_brightness_temperature_range() {
        let sensor = SensorConfiguration::passive(&[37e9], &[40.0, 55.0]).unwrap();
        let sp = snowpack();
        let em = emmodels(&sensor, &sp);
        let res = FirstOrder::default()
            .solve(&sp, &em, &sensor, None, &WorkerContext::local())
            .unwrap();
        let data = res.data();
        assert_eq!(data.shape(), &[2, 2]);
        for &tb in data.data().iter() {
            assert!(tb.is_finite() && tb > 0.0 && tb < 250.0);
        }
        // V above H at oblique incidence
        assert!(data.data()[[0, 1]] > data.data()[[1, 1]]);
    }

    #[test]
    fn test_nonscattering_is_warmer() {
        let sensor = SensorConfiguration::passive(&[37e9], &[55.0]).unwrap();
        let sp = snowpack();
        let em = emmodels(&sensor, &sp);
        let ctx = WorkerContext::local();
        let scattering = FirstOrder::default().solve(&sp, &em, &sensor, None, &ctx).unwrap();
        let absorbing = FirstOrder { scattering: false }.solve(&sp, &em, &sensor, None, &ctx).unwrap();
        assert!(absorbing.data().data()[[0, 0]] > scattering.data().data()[[0, 0]]);
    }

    #[test]
    fn test_active_backscatter() {
        let sensor = SensorConfiguration::active(&[13e9], &[30.0, 40.0]).unwrap();
        let sp = snowpack();
        let em = emmodels(&sensor, &sp);
        let res = FirstOrder::default()
            .solve(&sp, &em, &sensor, None, &WorkerContext::capped(1, 0))
            .unwrap();
        let data = res.data().data();
        assert_eq!(data.shape(), &[2, 2, 2]);
        assert!(data[[0, 0, 0]] > 0.0);
        assert!(data[[0, 1, 0]].abs() < 1e-12 * data[[0, 0, 0]]);
    }

    #[test]
    fn test_substrate_contributions() {
        let sensor = SensorConfiguration::passive(&[10e9], &[50.0]).unwrap();
        let ms = Arc::new(Exponential::new(0.3, 1e-4).unwrap());
        let layer = Layer::new(0.2, 260.0, 275.0, ms).unwrap();
        let soil = Substrate::new(Arc::new(Flat), Some(270.0), Some(PermittivityModel::constant(5.0, 0.5)));
        let sp = Snowpack::new(vec![layer]).with_substrate(soil);
        let em = emmodels(&sensor, &sp);
        let ctx = WorkerContext::local();
        let with_soil = FirstOrder::default().solve(&sp, &em, &sensor, None, &ctx).unwrap();
        let bare = Snowpack::new(sp.layers.clone());
        let without = FirstOrder::default().solve(&bare, &em, &sensor, None, &ctx).unwrap();
        assert!(with_soil.data().data()[[0, 0]] > without.data().data()[[0, 0]] + 50.0);

        // a reflector without permittivity cannot be evaluated
        let active = SensorConfiguration::active(&[10e9], &[40.0]).unwrap();
        let reflector = Substrate::new(Arc::new(Reflector::new(0.5, 0.1).unwrap()), Some(270.0), None);
        let sp = Snowpack::new(sp.layers.clone()).with_substrate(reflector);
        let em = emmodels(&active, &sp);
        let err = FirstOrder::default().solve(&sp, &em, &active, None, &ctx).unwrap_err();
        assert!(matches!(err, SmrtError::MissingPermittivityModel(_)));
    }

    #[test]
    fn test_layer_count_mismatch() {
        let sensor = SensorConfiguration::passive(&[37e9], &[55.0]).unwrap();
        let sp = snowpack();
        let mut em = emmodels(&sensor, &sp);
        em.pop();
        let err = FirstOrder::default()
            .solve(&sp, &em, &sensor, None, &WorkerContext::local())
            .unwrap_err();
        assert!(matches!(err, SmrtError::ShapeMismatch(_)));
    }
}

//! Improved Born Approximation (Mätzler 1998; Mätzler and Wiesmann 1999)
//!
//! The absorption coefficient is derived from the effective permittivity given
//! by the mixing formula (Polder-van Santen by default). Any microstructure whose
//! autocorrelation function has a Fourier transform can be used.

use super::EmModel;
use crate::core::microstructure::Microstructure;
use crate::core::permittivity::{depolarization_factors, maxwell_garnett, polder_van_santen};
use crate::core::plugin::Options;
use crate::core::sensor::SensorConfiguration;
use crate::core::snowpack::Layer;
use crate::types::{SmrtError, SmrtResult, C_SPEED};
use ndarray::Array2;
use num_complex::Complex64;
use std::f64::consts::PI;
use std::sync::Arc;

/// Samples of the scattering-angle cosine used to integrate ks
const KS_SAMPLES: usize = 65;

/// Mixing formula giving the effective permittivity of the layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MixingFormula {
    #[default]
    PolderVanSanten,
    MaxwellGarnett,
}

impl MixingFormula {
    fn from_name(name: &str) -> SmrtResult<Self> {
        match name {
            "polder_van_santen" => Ok(MixingFormula::PolderVanSanten),
            "maxwell_garnett" => Ok(MixingFormula::MaxwellGarnett),
            other => Err(SmrtError::Configuration(format!(
                "Unknown effective_permittivity_model '{}'",
                other
            ))),
        }
    }

    fn evaluate(&self, frac_volume: f64, e0: Complex64, eps: Complex64) -> Complex64 {
        match self {
            MixingFormula::PolderVanSanten => polder_van_santen(frac_volume, e0, eps),
            MixingFormula::MaxwellGarnett => maxwell_garnett(frac_volume, e0, eps),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Iba {
    k0: f64,
    effective_permittivity: Complex64,
    iba_coeff: f64,
    ks: f64,
    ka: f64,
    microstructure: Arc<dyn Microstructure>,
}

impl Iba {
    pub fn new(sensor: &SensorConfiguration, layer: &Layer, mixing: MixingFormula) -> SmrtResult<Self> {
        let frequency = sensor.frequency_value()?;
        let e0 = layer.permittivity(0, frequency)?;
        let eps = layer.permittivity(1, frequency)?;
        let k0 = 2.0 * PI * frequency / C_SPEED;

        let effective_permittivity = mixing.evaluate(layer.frac_volume, e0, eps);
        if effective_permittivity.im < 0.0 {
            return Err(SmrtError::NonPhysicalPermittivity(format!(
                "the imaginary part of the effective permittivity must be positive, got {}",
                effective_permittivity
            )));
        }

        let iba_coeff = compute_iba_coeff(k0, e0, eps, effective_permittivity);
        let mut iba = Iba {
            k0,
            effective_permittivity,
            iba_coeff,
            ks: 0.0,
            ka: 2.0 * k0 * effective_permittivity.sqrt().im,
            microstructure: layer.microstructure.clone(),
        };
        iba.ks = iba.compute_ks()?;
        if !(iba.ks >= 0.0) {
            log::warn!("IBA scattering coefficient has an invalid value {}", iba.ks);
        }
        log::trace!(
            "IBA at {:.2} GHz: eff={:.4}, ks={:.4e}, ka={:.4e}",
            frequency * 1e-9,
            effective_permittivity,
            iba.ks,
            iba.ka
        );
        Ok(iba)
    }

    pub fn from_options(
        sensor: &SensorConfiguration,
        layer: &Layer,
        options: &Options,
    ) -> SmrtResult<Box<dyn EmModel>> {
        options.check_known("iba", &["effective_permittivity_model"])?;
        let mixing = match options.get_text("effective_permittivity_model")? {
            Some(name) => MixingFormula::from_name(name)?,
            None => MixingFormula::default(),
        };
        Ok(Box::new(Iba::new(sensor, layer, mixing)?))
    }

    /// Microstructure term at the wavevector difference for scattering cosine `cos_t`
    fn microstructure_term(&self, cos_t: f64) -> SmrtResult<f64> {
        let k_diff = 2.0 * self.k0 * (0.5 - 0.5 * cos_t).max(0.0).sqrt() * self.effective_permittivity.sqrt().norm();
        self.microstructure.require_ft_autocorrelation(k_diff)
    }

    /// Integrate p11 + p22 over the scattering angle with incidence at zenith
    fn compute_ks(&self) -> SmrtResult<f64> {
        let h = 2.0 / (KS_SAMPLES - 1) as f64;
        let mut integral = 0.0;
        for i in 0..KS_SAMPLES {
            let mu = -1.0 + i as f64 * h;
            let p = self.iba_coeff * self.microstructure_term(mu)?;
            let y = p * mu * mu + p;
            let w = if i == 0 || i == KS_SAMPLES - 1 {
                1.0
            } else if i % 2 == 1 {
                4.0
            } else {
                2.0
            };
            integral += w * y;
        }
        Ok(integral * h / 3.0 / 4.0)
    }
}

fn compute_iba_coeff(k0: f64, e0: Complex64, eps: Complex64, effective_permittivity: Complex64) -> f64 {
    let quasi = (2.0 * effective_permittivity + e0) / 3.0;
    let y2: f64 = depolarization_factors()
        .iter()
        .map(|&d| (quasi / (quasi + (eps - e0) * d)).norm_sqr())
        .sum::<f64>()
        / 3.0;
    (eps - e0).norm_sqr() * y2 * k0.powi(4) / (4.0 * PI)
}

/// Rotation matrix between the scattering plane and the meridian planes.
/// `rows` x `cols` is (3, npol) or (npol, 3).
fn l_matrix(cos_phi: f64, sin_phi_sign: f64, rows: usize, cols: usize) -> Array2<f64> {
    let cos2 = cos_phi * cos_phi;
    let sin2 = 1.0 - cos2;
    let sin_2phi = 2.0 * cos_phi * sin2.max(0.0).sqrt() * sin_phi_sign;
    let s05 = 0.5 * sin_2phi;
    let cos_2phi = 2.0 * cos2 - 1.0;

    let full = [
        [cos2, sin2, s05],
        [sin2, cos2, -s05],
        [-sin_2phi, sin_2phi, cos_2phi],
    ];
    Array2::from_shape_fn((rows, cols), |(i, j)| full[i][j])
}

impl EmModel for Iba {
    fn name(&self) -> &'static str {
        "iba"
    }

    fn effective_permittivity(&self) -> Complex64 {
        self.effective_permittivity
    }

    fn ks(&self) -> f64 {
        self.ks
    }

    fn ka(&self) -> f64 {
        self.ka
    }

    /// Rayleigh phase matrix rotated into the meridian frame, times the
    /// microstructure term
    fn phase(&self, mu_s: f64, mu_i: f64, dphi: f64, npol: usize) -> SmrtResult<Array2<f64>> {
        if npol != 2 && npol != 3 {
            return Err(SmrtError::Configuration(format!("invalid value of npol: {}", npol)));
        }
        let sin_ti = (1.0 - mu_i * mu_i).max(0.0).sqrt();
        let sin_t = (1.0 - mu_s * mu_s).max(0.0).sqrt();
        let cos_pd = dphi.cos();
        let sin_pd_sign = if dphi >= PI { -1.0 } else { 1.0 };

        let cos_big_t = (mu_s * mu_i + sin_t * sin_ti * cos_pd).clamp(-1.0, 1.0);
        let cos_big_t2 = cos_big_t * cos_big_t;
        let sin_big_t = (1.0 - cos_big_t2).sqrt();

        let cost_sinti = mu_s * sin_ti;
        let costi_sint = mu_i * sin_t;
        let mut cos_i1 = cost_sinti - costi_sint * cos_pd;
        let mut cos_i2 = costi_sint - cost_sinti * cos_pd;
        if sin_big_t >= 1e-6 {
            cos_i1 /= sin_big_t;
            cos_i2 /= sin_big_t;
        }
        cos_i1 = cos_i1.clamp(-1.0, 1.0);
        cos_i2 = cos_i2.clamp(-1.0, 1.0);

        // both directions at zenith: keep the azimuth dependency
        if sin_t < 1e-6 && sin_ti < 1e-6 {
            cos_i1 = 1.0;
            cos_i2 = cos_pd;
        }

        let mut rli = l_matrix(cos_i1, -sin_pd_sign, 3, npol);
        rli.row_mut(0).mapv_inplace(|v| v * cos_big_t2);
        rli.row_mut(2).mapv_inplace(|v| v * cos_big_t);
        let ls = l_matrix(-cos_i2, sin_pd_sign, npol, 3);

        let scale = self.iba_coeff * self.microstructure_term(cos_big_t)?;
        Ok(ls.dot(&rli) * scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::microstructure::{Exponential, Homogeneous};

    fn layer(density: f64, corr_length: f64) -> Layer {
        let ms = Arc::new(Exponential::new(density / 917.0, corr_length).unwrap());
        Layer::new(1.0, 260.0, density, ms).unwrap()
    }

    fn sensor() -> SensorConfiguration {
        SensorConfiguration::passive(&[37e9], &[55.0]).unwrap()
    }

    #[test]
    fn test_iba_coefficients() {
        let iba = Iba::new(&sensor(), &layer(300.0, 1e-4), MixingFormula::default()).unwrap();
        assert!(iba.ks() > 0.0);
        assert!(iba.ka() > 0.0);
        let eff = iba.effective_permittivity();
        assert!(eff.re > 1.0 && eff.re < 3.2);
        assert_eq!(iba.ke(&[0.5, 0.8]).len(), 2);
        assert!((iba.ke(&[0.5])[0] - iba.ks() - iba.ka()).abs() < 1e-15);
    }

    #[test]
    fn test_scattering_grows_with_grain_size() {
        let small = Iba::new(&sensor(), &layer(300.0, 5e-5), MixingFormula::default()).unwrap();
        let large = Iba::new(&sensor(), &layer(300.0, 2e-4), MixingFormula::default()).unwrap();
        assert!(large.ks() > small.ks());
    }

    #[test]
    fn test_backscatter_phase_is_diagonal() {
        let iba = Iba::new(&sensor(), &layer(300.0, 1e-4), MixingFormula::default()).unwrap();
        let mu = 40f64.to_radians().cos();
        let p = iba.phase(-mu, mu, PI, 2).unwrap();
        assert!(p[[0, 0]] > 0.0);
        assert!((p[[0, 0]] - p[[1, 1]]).abs() < 1e-12 * p[[0, 0]]);
        assert!(p[[0, 1]].abs() < 1e-12 * p[[0, 0]]);
        assert!(p[[1, 0]].abs() < 1e-12 * p[[0, 0]]);
    }

    #[test]
    fn test_ft_even_phase_mode0_is_azimuthal_mean() {
        let iba = Iba::new(&sensor(), &layer(300.0, 1e-4), MixingFormula::default()).unwrap();
        let (mu_s, mu_i) = (0.6, 0.8);
        let ft = iba.ft_even_phase(mu_s, mu_i, 2, 2).unwrap();
        let n = 720;
        let mean: f64 = (0..n)
            .map(|i| {
                let dphi = 2.0 * PI * (i as f64 + 0.5) / n as f64;
                iba.phase(mu_s, mu_i, dphi, 2).unwrap()[[1, 1]]
            })
            .sum::<f64>()
            / n as f64;
        assert!((ft[[0, 1, 1]] - mean).abs() < 1e-4 * mean.abs());
    }

    #[test]
    fn test_missing_transform() {
        let ms = Arc::new(Homogeneous { frac_volume: 0.3 });
        let layer = Layer::new(1.0, 260.0, 275.0, ms).unwrap();
        let err = Iba::new(&sensor(), &layer, MixingFormula::default()).unwrap_err();
        assert!(matches!(err, SmrtError::MissingMicrostructureTransform(_)));
    }

    #[test]
    fn test_options() {
        let opts = Options::new().with("effective_permittivity_model", "maxwell_garnett");
        let mg = Iba::from_options(&sensor(), &layer(300.0, 1e-4), &opts).unwrap();
        let pvs = Iba::from_options(&sensor(), &layer(300.0, 1e-4), &Options::new()).unwrap();
        assert!(mg.effective_permittivity().re < pvs.effective_permittivity().re);

        let bad = Options::new().with("effective_permittivity_model", "bruggeman_2d");
        assert!(Iba::from_options(&sensor(), &layer(300.0, 1e-4), &bad).is_err());
    }
}

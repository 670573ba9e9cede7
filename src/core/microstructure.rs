//! Microstructure models of two-phase media

use crate::core::plugin::Options;
use crate::types::{SmrtError, SmrtResult};
use std::f64::consts::PI;
use std::sync::Arc;

/// Statistical description of the medium geometry
pub trait Microstructure: std::fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Fractional volume of the inclusions
    fn frac_volume(&self) -> f64;

    /// Fourier transform of the autocorrelation function at wavenumber `k`.
    ///
    /// Models that do not define it return `None`.
    fn ft_autocorrelation_function(&self, _k: f64) -> Option<f64> {
        None
    }

    /// Same as [`Microstructure::ft_autocorrelation_function`] but failing when the
    /// transform is not defined
    fn require_ft_autocorrelation(&self, k: f64) -> SmrtResult<f64> {
        self.ft_autocorrelation_function(k)
            .ok_or_else(|| SmrtError::MissingMicrostructureTransform(self.name().to_string()))
    }
}

pub type MicrostructureConstructor = fn(&Options) -> SmrtResult<Arc<dyn Microstructure>>;

/// Exponential autocorrelation function (Debye-like medium)
#[derive(Debug, Clone)]
pub struct Exponential {
    pub frac_volume: f64,
    /// Correlation length (m)
    pub corr_length: f64,
}

impl Exponential {
    pub fn new(frac_volume: f64, corr_length: f64) -> SmrtResult<Self> {
        if !(0.0..=1.0).contains(&frac_volume) {
            return Err(SmrtError::Configuration(format!(
                "frac_volume must be in [0, 1], got {}",
                frac_volume
            )));
        }
        if corr_length <= 0.0 {
            return Err(SmrtError::Configuration(format!(
                "corr_length must be positive, got {}",
                corr_length
            )));
        }
        Ok(Self { frac_volume, corr_length })
    }

    pub fn from_options(options: &Options) -> SmrtResult<Arc<dyn Microstructure>> {
        options.check_known("exponential", &["frac_volume", "corr_length"])?;
        Ok(Arc::new(Self::new(
            options.require_f64("frac_volume")?,
            options.require_f64("corr_length")?,
        )?))
    }
}

impl Microstructure for Exponential {
    fn name(&self) -> &'static str {
        "exponential"
    }

    fn frac_volume(&self) -> f64 {
        self.frac_volume
    }

    fn ft_autocorrelation_function(&self, k: f64) -> Option<f64> {
        let x = self.frac_volume * (1.0 - self.frac_volume);
        let l = self.corr_length;
        Some(x * 8.0 * PI * l.powi(3) / (1.0 + (k * l).powi(2)).powi(2))
    }
}

/// Medium without scatterers description; scattering theories cannot use it
#[derive(Debug, Clone)]
pub struct Homogeneous {
    pub frac_volume: f64,
}

impl Homogeneous {
    pub fn from_options(options: &Options) -> SmrtResult<Arc<dyn Microstructure>> {
        options.check_known("homogeneous", &["frac_volume"])?;
        Ok(Arc::new(Homogeneous {
            frac_volume: options.require_f64("frac_volume")?,
        }))
    }
}

impl Microstructure for Homogeneous {
    fn name(&self) -> &'static str {
        "homogeneous"
    }

    fn frac_volume(&self) -> f64 {
        self.frac_volume
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_exponential_ft_at_zero() {
        let ms = Exponential::new(0.3, 1e-4).unwrap();
        let expected = 0.3 * 0.7 * 8.0 * PI * 1e-12;
        assert_relative_eq!(ms.ft_autocorrelation_function(0.0).unwrap(), expected, max_relative = 1e-12);
        // decreasing with k
        assert!(ms.ft_autocorrelation_function(1e4).unwrap() < expected);
    }

    #[test]
    fn test_homogeneous_has_no_transform() {
        let ms = Homogeneous { frac_volume: 0.2 };
        assert!(matches!(
            ms.require_ft_autocorrelation(1.0),
            Err(SmrtError::MissingMicrostructureTransform(_))
        ));
    }

    #[test]
    fn test_exponential_from_options() {
        let options = Options::new().with("frac_volume", 0.2).with("corr_length", 5e-5);
        let ms = Exponential::from_options(&options).unwrap();
        assert_eq!(ms.name(), "exponential");

        let bad = options.clone().with("stickiness", 0.1);
        assert!(matches!(Exponential::from_options(&bad), Err(SmrtError::Configuration(_))));
    }
}

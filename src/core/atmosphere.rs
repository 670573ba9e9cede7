//! Atmosphere above the snowpack

use crate::core::plugin::Options;
use crate::types::SmrtResult;

/// Radiative contribution of the atmosphere, per polarization (V, H)
pub trait Atmosphere: std::fmt::Debug + Send + Sync {
    /// Upwelling brightness temperature (K)
    fn tbup(&self, frequency: f64, costheta: f64, npol: usize) -> Vec<f64>;

    /// Downwelling brightness temperature (K)
    fn tbdown(&self, frequency: f64, costheta: f64, npol: usize) -> Vec<f64>;

    /// Transmissivity
    fn trans(&self, frequency: f64, costheta: f64, npol: usize) -> Vec<f64>;
}

/// Angle and frequency independent atmosphere
#[derive(Debug, Clone)]
pub struct SimpleIsotropicAtmosphere {
    pub tbdown: f64,
    pub tbup: f64,
    pub trans: f64,
}

impl SimpleIsotropicAtmosphere {
    pub fn new(tbdown: f64, tbup: f64, trans: f64) -> Self {
        Self { tbdown, tbup, trans }
    }

    pub fn from_options(options: &Options) -> SmrtResult<Self> {
        options.check_known("simple_isotropic_atmosphere", &["tbdown", "tbup", "trans"])?;
        Ok(Self {
            tbdown: options.get_f64("tbdown")?.unwrap_or(0.0),
            tbup: options.get_f64("tbup")?.unwrap_or(0.0),
            trans: options.get_f64("trans")?.unwrap_or(1.0),
        })
    }
}

impl Atmosphere for SimpleIsotropicAtmosphere {
    fn tbup(&self, _frequency: f64, _costheta: f64, npol: usize) -> Vec<f64> {
        vec![self.tbup; npol]
    }

    fn tbdown(&self, _frequency: f64, _costheta: f64, npol: usize) -> Vec<f64> {
        vec![self.tbdown; npol]
    }

    fn trans(&self, _frequency: f64, _costheta: f64, npol: usize) -> Vec<f64> {
        vec![self.trans; npol]
    }
}

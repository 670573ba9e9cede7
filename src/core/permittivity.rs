use crate::types::{SmrtError, SmrtResult, FREEZING_POINT};
use num_complex::Complex64;
use std::sync::Arc;

/// Signature of a permittivity function of (frequency [Hz], temperature [K])
pub type PermittivityFn = dyn Fn(f64, Option<f64>) -> SmrtResult<Complex64> + Send + Sync;

/// Permittivity of a medium, either fixed or computed from frequency and temperature
#[derive(Clone)]
pub enum PermittivityModel {
    Constant(Complex64),
    Function(Arc<PermittivityFn>),
}

impl PermittivityModel {
    pub fn constant(re: f64, im: f64) -> Self {
        PermittivityModel::Constant(Complex64::new(re, im))
    }

    pub fn function<F>(f: F) -> Self
    where
        F: Fn(f64, Option<f64>) -> SmrtResult<Complex64> + Send + Sync + 'static,
    {
        PermittivityModel::Function(Arc::new(f))
    }

    /// Pure ice, Mätzler (2006)
    pub fn ice() -> Self {
        PermittivityModel::function(|frequency, temperature| {
            let t = temperature.ok_or_else(|| {
                SmrtError::Configuration("ice permittivity requires a temperature".to_string())
            })?;
            ice_permittivity_matzler06(frequency, t)
        })
    }

    pub fn evaluate(&self, frequency: f64, temperature: Option<f64>) -> SmrtResult<Complex64> {
        match self {
            PermittivityModel::Constant(eps) => Ok(*eps),
            PermittivityModel::Function(f) => f(frequency, temperature),
        }
    }
}

impl std::fmt::Debug for PermittivityModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermittivityModel::Constant(eps) => write!(f, "Constant({})", eps),
            PermittivityModel::Function(_) => write!(f, "Function(..)"),
        }
    }
}

impl From<Complex64> for PermittivityModel {
    fn from(eps: Complex64) -> Self {
        PermittivityModel::Constant(eps)
    }
}

impl From<f64> for PermittivityModel {
    fn from(eps: f64) -> Self {
        PermittivityModel::Constant(Complex64::new(eps, 0.0))
    }
}

/// Ice permittivity after Mätzler (2006), Thermal Microwave Radiation, section 5.
///
/// Valid below the freezing point; warmer temperatures are rejected.
pub fn ice_permittivity_matzler06(frequency: f64, temperature: f64) -> SmrtResult<Complex64> {
    if temperature > FREEZING_POINT + 1e-6 {
        return Err(SmrtError::NonPhysicalPermittivity(format!(
            "ice permittivity is undefined above the freezing point (T={} K)",
            temperature
        )));
    }
    let freqghz = frequency * 1e-9;

    let theta = 300.0 / temperature - 1.0;
    let alpha = (0.00504 + 0.0062 * theta) * (-22.1 * theta).exp();
    let b1 = 0.0207;
    let b = 335.0;
    let b2 = 1.16e-11;
    let db = (-9.963 + 0.0372 * (temperature - 273.16)).exp();
    let beta = b1 / temperature * (b / temperature).exp() / ((b / temperature).exp() - 1.0).powi(2)
        + b2 * freqghz.powi(2)
        + db;

    let real = 3.1884 + 9.1e-4 * (temperature - FREEZING_POINT);
    let imag = alpha / freqghz + beta * freqghz;
    Ok(Complex64::new(real, imag))
}

/// Depolarization factors of spherical inclusions
pub fn depolarization_factors() -> [f64; 3] {
    [1.0 / 3.0; 3]
}

/// Polder–van Santen (symmetric Bruggeman) mixing formula for spheres.
///
/// `e0` is the background permittivity, `eps` the inclusion permittivity.
pub fn polder_van_santen(frac_volume: f64, e0: Complex64, eps: Complex64) -> Complex64 {
    // 2 eff^2 - b eff - e0 eps = 0
    let b = e0 * (2.0 - 3.0 * frac_volume) + eps * (3.0 * frac_volume - 1.0);
    let disc = (b * b + 8.0 * e0 * eps).sqrt();
    let root1 = (b + disc) / 4.0;
    let root2 = (b - disc) / 4.0;
    if root1.re >= root2.re {
        root1
    } else {
        root2
    }
}

/// Maxwell Garnett mixing formula for spheres
pub fn maxwell_garnett(frac_volume: f64, e0: Complex64, eps: Complex64) -> Complex64 {
    let diff = eps - e0;
    e0 + 3.0 * frac_volume * e0 * diff / (eps + 2.0 * e0 - frac_volume * diff)
}

/// Cosine of the refracted angle in medium 2 (Snell's law with complex permittivities)
pub fn refracted_cosine(eps_1: Complex64, eps_2: Complex64, mu1: f64) -> Complex64 {
    let sin2_1 = 1.0 - mu1 * mu1;
    let sin2_2 = eps_1 / eps_2 * sin2_1;
    (Complex64::new(1.0, 0.0) - sin2_2).sqrt()
}

/// Fresnel power reflection coefficients (V, H) from medium 1 to medium 2
pub fn fresnel_reflectivity(eps_1: Complex64, eps_2: Complex64, mu1: f64) -> (f64, f64) {
    let n1 = eps_1.sqrt();
    let n2 = eps_2.sqrt();
    let mu2 = refracted_cosine(eps_1, eps_2, mu1);

    let rv = (n2 * mu1 - n1 * mu2) / (n2 * mu1 + n1 * mu2);
    let rh = (n1 * mu1 - n2 * mu2) / (n1 * mu1 + n2 * mu2);
    (rv.norm_sqr(), rh.norm_sqr())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ice_permittivity_range() {
        let eps = ice_permittivity_matzler06(37e9, 260.0).unwrap();
        assert!(eps.re > 3.1 && eps.re < 3.2);
        assert!(eps.im > 0.0 && eps.im < 0.01);
        assert!(ice_permittivity_matzler06(37e9, 280.0).is_err());
    }

    #[test]
    fn test_polder_van_santen_limits() {
        let e0 = Complex64::new(1.0, 0.0);
        let eps = Complex64::new(3.18, 1e-3);
        assert_relative_eq!(polder_van_santen(0.0, e0, eps).re, 1.0, epsilon = 1e-12);
        assert_relative_eq!(polder_van_santen(1.0, e0, eps).re, 3.18, epsilon = 1e-12);

        let mid = polder_van_santen(0.3, e0, eps);
        assert!(mid.re > 1.0 && mid.re < 3.18);
        assert!(mid.im > 0.0);
    }

    #[test]
    fn test_maxwell_garnett_limits() {
        let e0 = Complex64::new(1.0, 0.0);
        let eps = Complex64::new(3.18, 0.0);
        assert_relative_eq!(maxwell_garnett(0.0, e0, eps).re, 1.0, epsilon = 1e-12);
        assert_relative_eq!(maxwell_garnett(1.0, e0, eps).re, 3.18, epsilon = 1e-12);
        // below Polder-van Santen for dilute ice in air
        assert!(maxwell_garnett(0.3, e0, eps).re < polder_van_santen(0.3, e0, eps).re);
    }

    #[test]
    fn test_fresnel_normal_incidence() {
        let eps_1 = Complex64::new(1.0, 0.0);
        let eps_2 = Complex64::new(4.0, 0.0);
        let (rv, rh) = fresnel_reflectivity(eps_1, eps_2, 1.0);
        // ((n2 - n1) / (n2 + n1))^2 = (1/3)^2
        assert_relative_eq!(rv, 1.0 / 9.0, epsilon = 1e-12);
        assert_relative_eq!(rh, 1.0 / 9.0, epsilon = 1e-12);
    }

    #[test]
    fn test_fresnel_same_medium() {
        let eps = Complex64::new(1.5, 0.0);
        let (rv, rh) = fresnel_reflectivity(eps, eps, 0.6);
        assert!(rv < 1e-15 && rh < 1e-15);
    }

    #[test]
    fn test_constant_model() {
        let model = PermittivityModel::from(5.0);
        assert_eq!(model.evaluate(10e9, None).unwrap(), Complex64::new(5.0, 0.0));
    }
}

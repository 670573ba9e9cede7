//! Electromagnetic models
//!
//! An EM model is built once per layer for a given sensor and exposes the
//! effective permittivity, the extinction coefficient and the phase matrix the
//! solvers propagate through the layer.

pub mod iba;

pub use iba::Iba;

use crate::core::plugin::{Options, PluginSpec, Registry};
use crate::core::sensor::SensorConfiguration;
use crate::core::snowpack::Layer;
use crate::types::{SmrtError, SmrtResult};
use ndarray::{Array1, Array2, Array3};
use num_complex::Complex64;
use rustfft::FftPlanner;

/// Number of azimuth samples used by [`generic_ft_even_matrix`]
pub const N_AZIMUTH: usize = 64;

/// Per-layer electromagnetic model
pub trait EmModel: std::fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn effective_permittivity(&self) -> Complex64;

    /// Scattering coefficient (1/m)
    fn ks(&self) -> f64;

    /// Absorption coefficient (1/m)
    fn ka(&self) -> f64;

    /// Extinction coefficient for each stream cosine in `mu`
    fn ke(&self, mu: &[f64]) -> Array1<f64> {
        Array1::from_elem(mu.len(), self.ks() + self.ka())
    }

    /// Phase matrix (npol x npol) for one scattering geometry, indexed [pol_s, pol_i]
    fn phase(&self, mu_s: f64, mu_i: f64, dphi: f64, npol: usize) -> SmrtResult<Array2<f64>>;

    /// Even Fourier modes of the phase matrix, shape (m_max + 1, npol, npol)
    fn ft_even_phase(&self, mu_s: f64, mu_i: f64, m_max: usize, npol: usize) -> SmrtResult<Array3<f64>> {
        generic_ft_even_matrix(|dphi| self.phase(mu_s, mu_i, dphi, npol), m_max, npol)
    }
}

/// Builds the EM model of one layer
pub type EmModelConstructor = fn(&SensorConfiguration, &Layer, &Options) -> SmrtResult<Box<dyn EmModel>>;

pub type EmModelSpec = PluginSpec<EmModelConstructor>;

pub fn builtin_emmodels() -> Registry<EmModelConstructor> {
    let mut registry: Registry<EmModelConstructor> = Registry::new("emmodel");
    registry.register("iba", Iba::from_options).set_default("iba");
    registry
}

/// Azimuthal Fourier decomposition of a phase function sampled over [0, 2π).
///
/// Elements coupling the third Stokes component with V or H are odd in the
/// azimuth and take the sine coefficient; all others take the cosine
/// coefficient. Mode 0 is the azimuthal mean.
pub fn generic_ft_even_matrix(
    phase: impl Fn(f64) -> SmrtResult<Array2<f64>>,
    m_max: usize,
    npol: usize,
) -> SmrtResult<Array3<f64>> {
    let n = N_AZIMUTH.max(2 * m_max + 2);
    if m_max >= n / 2 {
        return Err(SmrtError::Configuration(format!(
            "m_max={} is too high for {} azimuth samples",
            m_max, n
        )));
    }

    let mut samples = Vec::with_capacity(n);
    for i in 0..n {
        let dphi = 2.0 * std::f64::consts::PI * i as f64 / n as f64;
        let p = phase(dphi)?;
        if p.shape() != [npol, npol] {
            return Err(SmrtError::ShapeMismatch(format!(
                "phase matrix has shape {:?}, expected [{}, {}]",
                p.shape(),
                npol,
                npol
            )));
        }
        samples.push(p);
    }

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n);
    let mut out = Array3::<f64>::zeros((m_max + 1, npol, npol));
    let mut buffer = vec![Complex64::new(0.0, 0.0); n];

    for i in 0..npol {
        for j in 0..npol {
            for (b, p) in buffer.iter_mut().zip(&samples) {
                *b = Complex64::new(p[[i, j]], 0.0);
            }
            fft.process(&mut buffer);

            let odd = (i == 2) != (j == 2);
            out[[0, i, j]] = if odd { 0.0 } else { buffer[0].re / n as f64 };
            for m in 1..=m_max {
                out[[m, i, j]] = if odd {
                    -2.0 * buffer[m].im / n as f64
                } else {
                    2.0 * buffer[m].re / n as f64
                };
            }
        }
    }
    Ok(out)
}

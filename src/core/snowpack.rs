//! Layered media: layers, snowpack and the `make_snowpack` helper

use crate::core::atmosphere::Atmosphere;
use crate::core::microstructure::{Microstructure, MicrostructureConstructor};
use crate::core::permittivity::PermittivityModel;
use crate::core::plugin::{Options, Registry};
use crate::core::substrate::Substrate;
use crate::types::{SmrtError, SmrtResult, DENSITY_OF_ICE, FREEZING_POINT};
use num_complex::Complex64;
use std::sync::Arc;

/// Shape of the inclusions, used by the mixing formulas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InclusionShape {
    #[default]
    Spheres,
}

/// One homogeneous layer of the medium
#[derive(Debug, Clone)]
pub struct Layer {
    /// Thickness (m)
    pub thickness: f64,
    /// Physical temperature (K)
    pub temperature: f64,
    /// Density (kg/m3)
    pub density: f64,
    pub frac_volume: f64,
    pub microstructure: Arc<dyn Microstructure>,
    pub inclusion_shape: InclusionShape,
    background_permittivity: PermittivityModel,
    inclusion_permittivity: PermittivityModel,
}

impl Layer {
    pub fn new(
        thickness: f64,
        temperature: f64,
        density: f64,
        microstructure: Arc<dyn Microstructure>,
    ) -> SmrtResult<Self> {
        if thickness <= 0.0 {
            return Err(SmrtError::Configuration(format!(
                "layer thickness must be positive, got {}",
                thickness
            )));
        }
        if temperature <= 0.0 {
            return Err(SmrtError::Configuration(format!(
                "layer temperature must be positive, got {}",
                temperature
            )));
        }
        Ok(Self {
            thickness,
            temperature,
            density,
            frac_volume: microstructure.frac_volume(),
            microstructure,
            inclusion_shape: InclusionShape::Spheres,
            background_permittivity: PermittivityModel::from(1.0),
            inclusion_permittivity: PermittivityModel::ice(),
        })
    }

    /// Replace the permittivity models of the background (air) and inclusions (ice)
    pub fn with_permittivities(mut self, background: PermittivityModel, inclusion: PermittivityModel) -> Self {
        self.background_permittivity = background;
        self.inclusion_permittivity = inclusion;
        self
    }

    /// Permittivity of constituent `index` (0: background, 1: inclusions)
    pub fn permittivity(&self, index: usize, frequency: f64) -> SmrtResult<Complex64> {
        let model = match index {
            0 => &self.background_permittivity,
            1 => &self.inclusion_permittivity,
            _ => {
                return Err(SmrtError::Configuration(format!(
                    "a layer has two constituents, index {} is invalid",
                    index
                )))
            }
        };
        model.evaluate(frequency, Some(self.temperature))
    }
}

/// Ordered stack of layers (top first) over an optional substrate
#[derive(Debug, Clone)]
pub struct Snowpack {
    pub layers: Vec<Layer>,
    pub substrate: Option<Substrate>,
    pub atmosphere: Option<Arc<dyn Atmosphere>>,
}

impl Snowpack {
    pub fn new(layers: Vec<Layer>) -> Self {
        Self {
            layers,
            substrate: None,
            atmosphere: None,
        }
    }

    pub fn with_substrate(mut self, substrate: Substrate) -> Self {
        self.substrate = Some(substrate);
        self
    }

    pub fn with_atmosphere(mut self, atmosphere: Arc<dyn Atmosphere>) -> Self {
        self.atmosphere = Some(atmosphere);
        self
    }

    pub fn nlayer(&self) -> usize {
        self.layers.len()
    }

    /// Depth of the bottom of each layer
    pub fn z(&self) -> Vec<f64> {
        self.layers
            .iter()
            .scan(0.0, |depth, layer| {
                *depth += layer.thickness;
                Some(*depth)
            })
            .collect()
    }
}

const LAYER_KEYS: [&str; 2] = ["density", "temperature"];

/// Build a snowpack from per-layer parameters.
///
/// `options` must contain `density` and may contain `temperature` (default: the
/// freezing point) plus the microstructure parameters. Every option is either a
/// scalar used for all layers or a sequence with one value per layer.
pub fn make_snowpack(
    registry: &Registry<MicrostructureConstructor>,
    thickness: &[f64],
    microstructure_model: &str,
    options: &Options,
) -> SmrtResult<Snowpack> {
    if thickness.is_empty() {
        return Err(SmrtError::Configuration("a snowpack needs at least one layer".to_string()));
    }
    if let Some(n) = options.broadcast_len()? {
        if n != thickness.len() {
            return Err(SmrtError::ShapeMismatch(format!(
                "per-layer arguments have {} elements but there are {} layers",
                n,
                thickness.len()
            )));
        }
    }
    let microstructure_ctor = registry.get(microstructure_model)?;

    let mut layers = Vec::with_capacity(thickness.len());
    for (i, &d) in thickness.iter().enumerate() {
        let layer_options = options.at(i)?;
        let density = layer_options.require_f64("density")?;
        let temperature = layer_options.get_f64("temperature")?.unwrap_or(FREEZING_POINT);
        let frac_volume = density / DENSITY_OF_ICE;

        let mut ms_options = Options::new().with("frac_volume", frac_volume);
        for key in layer_options.keys().filter(|k| !LAYER_KEYS.contains(k)) {
            if let Some(value) = layer_options.get(key) {
                ms_options.insert(key, value.clone());
            }
        }
        let microstructure = microstructure_ctor(&ms_options)?;
        layers.push(Layer::new(d, temperature, density, microstructure)?);
    }

    log::debug!(
        "Created snowpack with {} {} layer(s), total depth {:.3} m",
        layers.len(),
        microstructure_model,
        thickness.iter().sum::<f64>()
    );
    Ok(Snowpack::new(layers))
}

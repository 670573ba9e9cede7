//! Expansion of a run into independent simulation units
//!
//! A sensor is split along every axis the solver cannot batch, and each narrow
//! sensor is paired with every snowpack of the batch. The order of the units
//! (sensor axes outermost, snowpacks innermost) is the order the results are
//! folded back in.

use crate::core::atmosphere::Atmosphere;
use crate::core::sensor::SensorConfiguration;
use crate::core::snowpack::Snowpack;
use crate::types::{Label, SmrtError, SmrtResult};
use indexmap::IndexMap;
use std::sync::Arc;

/// Name of the axis created for a batch of snowpacks when none is given
pub const SNOWPACK_AXIS: &str = "snowpack";

/// Where a fold axis comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisOrigin {
    /// A batch of snowpacks, or any axis a caller concatenates along
    Batch,
    /// Sensor axis the unit results do not carry (frequency)
    Sensor,
    /// Sensor axis the unit results keep at length one
    SensorDim,
}

/// Named axis with ordered coordinate values
#[derive(Debug, Clone, PartialEq)]
pub struct AxisDescriptor {
    pub name: String,
    pub values: Vec<Label>,
    pub origin: AxisOrigin,
}

impl AxisDescriptor {
    pub fn new(name: &str, values: Vec<Label>) -> Self {
        Self {
            name: name.to_string(),
            values,
            origin: AxisOrigin::Batch,
        }
    }

    pub fn sensor(name: &str, values: Vec<Label>) -> Self {
        Self {
            origin: AxisOrigin::Sensor,
            ..Self::new(name, values)
        }
    }

    pub fn sensor_dim(name: &str, values: Vec<Label>) -> Self {
        Self {
            origin: AxisOrigin::SensorDim,
            ..Self::new(name, values)
        }
    }

    /// Whether the axis splits a sensor configuration
    pub fn is_sensor_axis(&self) -> bool {
        self.origin != AxisOrigin::Batch
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Minimal unit of independent work
#[derive(Debug, Clone)]
pub struct SimulationUnit {
    pub sensor: Arc<SensorConfiguration>,
    pub snowpack: Arc<Snowpack>,
    pub atmosphere: Option<Arc<dyn Atmosphere>>,
}

/// Snowpacks swept over a named variable
#[derive(Debug, Clone)]
pub struct SensitivityStudy {
    pub variable: String,
    pub values: Vec<Label>,
    pub snowpacks: Vec<Arc<Snowpack>>,
}

impl SensitivityStudy {
    pub fn new(variable: &str, values: Vec<Label>, snowpacks: Vec<Snowpack>) -> SmrtResult<Self> {
        if values.len() != snowpacks.len() {
            return Err(SmrtError::ShapeMismatch(format!(
                "sensitivity study on '{}' has {} values but {} snowpacks",
                variable,
                values.len(),
                snowpacks.len()
            )));
        }
        Ok(Self {
            variable: variable.to_string(),
            values,
            snowpacks: snowpacks.into_iter().map(Arc::new).collect(),
        })
    }
}

/// The snowpack argument of a run
#[derive(Debug, Clone)]
pub enum SnowpackInput {
    Single(Arc<Snowpack>),
    Sequence(Vec<Arc<Snowpack>>),
    /// Name → snowpack, the names become the coordinates of the snowpack axis
    Mapping(IndexMap<String, Arc<Snowpack>>),
    Study(SensitivityStudy),
}

impl From<Snowpack> for SnowpackInput {
    fn from(snowpack: Snowpack) -> Self {
        SnowpackInput::Single(Arc::new(snowpack))
    }
}

impl From<Vec<Snowpack>> for SnowpackInput {
    fn from(snowpacks: Vec<Snowpack>) -> Self {
        SnowpackInput::Sequence(snowpacks.into_iter().map(Arc::new).collect())
    }
}

impl From<SensitivityStudy> for SnowpackInput {
    fn from(study: SensitivityStudy) -> Self {
        SnowpackInput::Study(study)
    }
}

/// Explicit name (and optionally values) of the snowpack axis
#[derive(Debug, Clone, PartialEq)]
pub struct SnowpackDimension {
    pub name: String,
    pub values: Option<Vec<Label>>,
}

impl SnowpackDimension {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            values: None,
        }
    }

    pub fn with_values(name: &str, values: Vec<Label>) -> Self {
        Self {
            name: name.to_string(),
            values: Some(values),
        }
    }
}

/// Single-pass sequence of simulation units with a known length
pub struct Units<'a> {
    inner: Box<dyn Iterator<Item = SimulationUnit> + Send + 'a>,
    remaining: usize,
}

impl<'a> Units<'a> {
    pub fn new(inner: impl Iterator<Item = SimulationUnit> + Send + 'a, len: usize) -> Self {
        Self {
            inner: Box::new(inner),
            remaining: len,
        }
    }
}

impl Iterator for Units<'_> {
    type Item = SimulationUnit;

    fn next(&mut self) -> Option<SimulationUnit> {
        let unit = self.inner.next();
        if unit.is_some() {
            self.remaining = self.remaining.saturating_sub(1);
        }
        unit
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Units<'_> {}

/// Units to run and the axes to fold their results along, outermost first
pub struct Expansion<'a> {
    pub units: Units<'a>,
    pub axes: Vec<AxisDescriptor>,
}

fn normalize(
    snowpack: SnowpackInput,
    snowpack_dimension: Option<SnowpackDimension>,
) -> SmrtResult<(Vec<Arc<Snowpack>>, Option<AxisDescriptor>)> {
    let (snowpacks, default_axis) = match snowpack {
        SnowpackInput::Single(sp) if snowpack_dimension.is_none() => return Ok((vec![sp], None)),
        // an explicit dimension turns a single snowpack into a batch of one
        SnowpackInput::Single(sp) => (vec![sp], None),
        SnowpackInput::Sequence(snowpacks) => (snowpacks, None),
        SnowpackInput::Mapping(map) => {
            let names = map.keys().map(|k| Label::from(k.as_str())).collect();
            (map.into_values().collect(), Some(AxisDescriptor::new(SNOWPACK_AXIS, names)))
        }
        SnowpackInput::Study(study) => {
            let axis = AxisDescriptor::new(&study.variable, study.values);
            (study.snowpacks, Some(axis))
        }
    };

    let axis = match (snowpack_dimension, default_axis) {
        (Some(dim), _) => {
            if dim.name.trim().is_empty() {
                return Err(SmrtError::ShapeMismatch(
                    "the first element of snowpack_dimension must be an axis name".to_string(),
                ));
            }
            let values = dim
                .values
                .unwrap_or_else(|| (0..snowpacks.len()).map(Label::from).collect());
            AxisDescriptor::new(&dim.name, values)
        }
        (None, Some(axis)) => axis,
        (None, None) => AxisDescriptor::new(SNOWPACK_AXIS, (0..snowpacks.len()).map(Label::from).collect()),
    };

    if axis.len() != snowpacks.len() {
        return Err(SmrtError::ShapeMismatch(format!(
            "The list of snowpacks ({}) must have the same length as the snowpack_dimension '{}' ({})",
            snowpacks.len(),
            axis.name,
            axis.len()
        )));
    }
    Ok((snowpacks, Some(axis)))
}

/// Split `sensor` along `axes` recursively, in order
fn split_sensor(sensor: &SensorConfiguration, axes: &[AxisDescriptor]) -> SmrtResult<Vec<Arc<SensorConfiguration>>> {
    match axes.split_first() {
        None => Ok(vec![Arc::new(sensor.clone())]),
        Some((axis, rest)) => {
            let mut out = Vec::new();
            for sub in sensor.iterate(&axis.name)? {
                out.extend(split_sensor(&sub, rest)?);
            }
            Ok(out)
        }
    }
}

/// Expand a run into simulation units.
///
/// `native_axes` lists the sensor axes the solver batches itself; every other
/// multi-valued sensor axis is split here.
pub fn prepare_simulations<'a>(
    sensor: &SensorConfiguration,
    snowpack: SnowpackInput,
    snowpack_dimension: Option<SnowpackDimension>,
    native_axes: &[&str],
) -> SmrtResult<Expansion<'a>> {
    let (snowpacks, snowpack_axis) = normalize(snowpack, snowpack_dimension)?;

    let mut axes: Vec<AxisDescriptor> = sensor
        .configurations()
        .into_iter()
        .filter(|axis| !native_axes.contains(&axis.name.as_str()))
        .collect();
    let sensors = split_sensor(sensor, &axes)?;
    axes.extend(snowpack_axis);

    let len = sensors.len() * snowpacks.len();
    log::debug!(
        "Expanded into {} simulation(s) along {:?}",
        len,
        axes.iter().map(|a| a.name.as_str()).collect::<Vec<_>>()
    );

    let units = sensors.into_iter().flat_map(move |sensor| {
        snowpacks
            .clone()
            .into_iter()
            .map(move |snowpack| SimulationUnit {
                sensor: sensor.clone(),
                atmosphere: snowpack.atmosphere.clone(),
                snowpack,
            })
    });
    Ok(Expansion {
        units: Units::new(units, len),
        axes,
    })
}

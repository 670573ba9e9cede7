//! Sensor configurations
//!
//! A [`SensorConfiguration`] lists the frequencies, angles and polarizations of
//! one measurement setup. It can be split along any of its axes into narrower
//! configurations, which is how simulations are expanded for solvers that cannot
//! batch an axis natively.

use crate::core::simulation::AxisDescriptor;
use crate::types::{Label, Mode, Polarization, SmrtError, SmrtResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Coordinates identifying a channel in the result array
pub type ChannelCoords = IndexMap<String, Label>;

/// Channel name → coordinates
pub type ChannelMap = IndexMap<String, ChannelCoords>;

pub const FREQUENCY: &str = "frequency";
pub const POLARIZATION: &str = "polarization";
pub const POLARIZATION_INC: &str = "polarization_inc";
pub const THETA: &str = "theta";
pub const THETA_INC: &str = "theta_inc";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfiguration {
    pub mode: Mode,
    /// Frequencies (Hz)
    pub frequency: Vec<f64>,
    /// Viewing angles (degrees); incidence angles for an active sensor
    pub theta: Vec<f64>,
    pub polarization: Vec<Polarization>,
    /// Incident polarizations, empty for a passive sensor
    pub polarization_inc: Vec<Polarization>,
    #[serde(default)]
    pub channel_map: ChannelMap,
}

impl SensorConfiguration {
    /// Radiometer observing V and H at every frequency and angle
    pub fn passive(frequency: &[f64], theta: &[f64]) -> SmrtResult<Self> {
        Self::validated(SensorConfiguration {
            mode: Mode::Passive,
            frequency: frequency.to_vec(),
            theta: theta.to_vec(),
            polarization: vec![Polarization::V, Polarization::H],
            polarization_inc: Vec::new(),
            channel_map: ChannelMap::new(),
        })
    }

    /// Monostatic radar with the four V/H polarization combinations
    pub fn active(frequency: &[f64], theta_inc: &[f64]) -> SmrtResult<Self> {
        Self::validated(SensorConfiguration {
            mode: Mode::Active,
            frequency: frequency.to_vec(),
            theta: theta_inc.to_vec(),
            polarization: vec![Polarization::V, Polarization::H],
            polarization_inc: vec![Polarization::V, Polarization::H],
            channel_map: ChannelMap::new(),
        })
    }

    fn validated(sensor: Self) -> SmrtResult<Self> {
        if sensor.frequency.is_empty() || sensor.theta.is_empty() {
            return Err(SmrtError::Configuration(
                "a sensor needs at least one frequency and one angle".to_string(),
            ));
        }
        if let Some(f) = sensor.frequency.iter().find(|f| **f <= 0.0 || !f.is_finite()) {
            return Err(SmrtError::Configuration(format!("invalid frequency: {}", f)));
        }
        if let Some(t) = sensor.theta.iter().find(|t| !(0.0..90.0).contains(*t)) {
            return Err(SmrtError::Configuration(format!(
                "angles must be in [0, 90) degrees, got {}",
                t
            )));
        }
        if sensor.polarization.is_empty() {
            return Err(SmrtError::Configuration("a sensor needs at least one polarization".to_string()));
        }
        if sensor.mode == Mode::Active && sensor.polarization_inc.is_empty() {
            return Err(SmrtError::Configuration(
                "an active sensor needs at least one incident polarization".to_string(),
            ));
        }
        Ok(sensor)
    }

    pub fn with_polarization(mut self, polarization: &[Polarization]) -> SmrtResult<Self> {
        self.polarization = polarization.to_vec();
        Self::validated(self)
    }

    pub fn with_polarization_inc(mut self, polarization_inc: &[Polarization]) -> SmrtResult<Self> {
        if self.mode == Mode::Passive {
            return Err(SmrtError::Configuration(
                "a passive sensor has no incident polarization".to_string(),
            ));
        }
        self.polarization_inc = polarization_inc.to_vec();
        Self::validated(self)
    }

    pub fn with_channel(mut self, name: &str, coords: ChannelCoords) -> Self {
        self.channel_map.insert(name.to_string(), coords);
        self
    }

    /// Name one channel per frequency and polarization (e.g. `37V`, `13VV`),
    /// with the angle appended when several angles are configured.
    pub fn with_named_channels(mut self) -> Self {
        let multi_angle = self.theta.len() > 1;
        let angle_axis = self.angle_axis();
        let mut channel_map = ChannelMap::new();

        for &f in &self.frequency {
            for &theta in &self.theta {
                let suffix = if multi_angle { format!("{}", theta) } else { String::new() };
                match self.mode {
                    Mode::Passive => {
                        for &pol in &self.polarization {
                            let mut coords = ChannelCoords::new();
                            coords.insert(FREQUENCY.to_string(), Label::from(f));
                            coords.insert(POLARIZATION.to_string(), pol.label());
                            coords.insert(angle_axis.to_string(), Label::from(theta));
                            channel_map.insert(format!("{}{}{}", format_ghz(f), pol, suffix), coords);
                        }
                    }
                    Mode::Active => {
                        for &pol_inc in &self.polarization_inc {
                            for &pol in &self.polarization {
                                let mut coords = ChannelCoords::new();
                                coords.insert(FREQUENCY.to_string(), Label::from(f));
                                coords.insert(POLARIZATION_INC.to_string(), pol_inc.label());
                                coords.insert(POLARIZATION.to_string(), pol.label());
                                coords.insert(angle_axis.to_string(), Label::from(theta));
                                channel_map.insert(
                                    format!("{}{}{}{}", format_ghz(f), pol_inc, pol, suffix),
                                    coords,
                                );
                            }
                        }
                    }
                }
            }
        }
        self.channel_map = channel_map;
        self
    }

    /// Name of the angle axis: `theta` for radiometers, `theta_inc` for radars
    pub fn angle_axis(&self) -> &'static str {
        match self.mode {
            Mode::Passive => THETA,
            Mode::Active => THETA_INC,
        }
    }

    /// Axis names in declaration order
    pub fn axes(&self) -> Vec<&'static str> {
        match self.mode {
            Mode::Passive => vec![FREQUENCY, POLARIZATION, THETA],
            Mode::Active => vec![FREQUENCY, POLARIZATION_INC, POLARIZATION, THETA_INC],
        }
    }

    /// Coordinate values along `axis`
    pub fn axis_values(&self, axis: &str) -> Option<Vec<Label>> {
        let angle_axis = self.angle_axis();
        match axis {
            FREQUENCY => Some(self.frequency.iter().map(|&f| Label::from(f)).collect()),
            POLARIZATION => Some(self.polarization.iter().map(|p| p.label()).collect()),
            POLARIZATION_INC if self.mode == Mode::Active => {
                Some(self.polarization_inc.iter().map(|p| p.label()).collect())
            }
            a if a == angle_axis => Some(self.theta.iter().map(|&t| Label::from(t)).collect()),
            _ => None,
        }
    }

    /// Dimensions of a solver result, in order. Frequency is solved one value
    /// at a time and never appears.
    pub fn result_dims(&self) -> Vec<&'static str> {
        self.axes().into_iter().filter(|axis| *axis != FREQUENCY).collect()
    }

    /// Multi-valued axes, in declaration order
    pub fn configurations(&self) -> Vec<AxisDescriptor> {
        let result_dims = self.result_dims();
        self.axes()
            .into_iter()
            .filter_map(|axis| {
                self.axis_values(axis)
                    .filter(|values| values.len() > 1)
                    .map(|values| {
                        if result_dims.contains(&axis) {
                            AxisDescriptor::sensor_dim(axis, values)
                        } else {
                            AxisDescriptor::sensor(axis, values)
                        }
                    })
            })
            .collect()
    }

    /// One configuration per value of `axis`. Channels whose coordinate on that
    /// axis differs from the value are dropped from each narrower configuration.
    pub fn iterate(&self, axis: &str) -> SmrtResult<Vec<SensorConfiguration>> {
        let values = self.axis_values(axis).ok_or_else(|| {
            SmrtError::Configuration(format!(
                "sensor in mode {} has no axis '{}' (axes: {:?})",
                self.mode,
                axis,
                self.axes()
            ))
        })?;

        let mut out = Vec::with_capacity(values.len());
        for (i, value) in values.iter().enumerate() {
            let mut sub = self.clone();
            match axis {
                FREQUENCY => sub.frequency = vec![self.frequency[i]],
                POLARIZATION => sub.polarization = vec![self.polarization[i]],
                POLARIZATION_INC => sub.polarization_inc = vec![self.polarization_inc[i]],
                _ => sub.theta = vec![self.theta[i]],
            }
            sub.channel_map
                .retain(|_, coords| coords.get(axis).map_or(true, |c| c.matches(value)));
            out.push(sub);
        }
        Ok(out)
    }

    /// The single frequency of this configuration
    pub fn frequency_value(&self) -> SmrtResult<f64> {
        match self.frequency.as_slice() {
            [f] => Ok(*f),
            _ => Err(SmrtError::ShapeMismatch(format!(
                "a single frequency is required, the sensor has {}",
                self.frequency.len()
            ))),
        }
    }

    /// Cosines of the configured angles
    pub fn mu(&self) -> Vec<f64> {
        self.theta.iter().map(|t| t.to_radians().cos()).collect()
    }
}

fn format_ghz(frequency: f64) -> String {
    let ghz = frequency * 1e-9;
    if (ghz - ghz.round()).abs() < 1e-9 {
        format!("{}", ghz.round() as i64)
    } else {
        format!("{}", ghz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::simulation::AxisOrigin;

    #[test]
    fn test_configurations_only_multi_valued() {
        let sensor = SensorConfiguration::passive(&[19e9, 37e9], &[55.0]).unwrap();
        let axes = sensor.configurations();
        assert_eq!(axes.len(), 2);
        assert_eq!(axes[0].name, FREQUENCY);
        assert_eq!(axes[1].name, POLARIZATION);
        assert_eq!(axes[0].origin, AxisOrigin::Sensor);
        assert_eq!(axes[1].origin, AxisOrigin::SensorDim);
        assert_eq!(sensor.result_dims(), vec![POLARIZATION, THETA]);
    }

    #[test]
    fn test_iterate_restricts_channels() {
        let sensor = SensorConfiguration::passive(&[19e9, 37e9], &[55.0])
            .unwrap()
            .with_named_channels();
        assert_eq!(sensor.channel_map.len(), 4);
        assert!(sensor.channel_map.contains_key("37V"));

        let subs = sensor.iterate(FREQUENCY).unwrap();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].frequency, vec![19e9]);
        assert_eq!(subs[0].channel_map.keys().collect::<Vec<_>>(), vec!["19V", "19H"]);
        assert_eq!(subs[1].channel_map.keys().collect::<Vec<_>>(), vec!["37V", "37H"]);
    }

    #[test]
    fn test_active_channel_names() {
        let sensor = SensorConfiguration::active(&[13e9], &[30.0, 40.0])
            .unwrap()
            .with_polarization(&[Polarization::V])
            .unwrap()
            .with_polarization_inc(&[Polarization::V])
            .unwrap()
            .with_named_channels();
        let names: Vec<_> = sensor.channel_map.keys().cloned().collect();
        assert_eq!(names, vec!["13VV30", "13VV40"]);
        assert_eq!(sensor.channel_map["13VV40"][THETA_INC], Label::from(40.0));
        assert_eq!(sensor.angle_axis(), THETA_INC);
    }

    #[test]
    fn test_invalid_sensor() {
        assert!(SensorConfiguration::passive(&[], &[55.0]).is_err());
        assert!(SensorConfiguration::passive(&[37e9], &[95.0]).is_err());
        assert!(SensorConfiguration::active(&[-1.0], &[40.0]).is_err());
        let passive = SensorConfiguration::passive(&[37e9], &[55.0]).unwrap();
        assert!(passive.with_polarization_inc(&[Polarization::V]).is_err());
    }

    #[test]
    fn test_unknown_axis() {
        let sensor = SensorConfiguration::passive(&[37e9], &[55.0]).unwrap();
        assert!(matches!(sensor.iterate(THETA_INC), Err(SmrtError::Configuration(_))));
        assert!(matches!(sensor.frequency_value(), Ok(f) if f == 37e9));
    }

    #[test]
    fn test_format_ghz() {
        assert_eq!(format_ghz(37e9), "37");
        assert_eq!(format_ghz(36.5e9), "36.5");
    }
}

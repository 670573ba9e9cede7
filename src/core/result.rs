//! Simulation results and their query surface
//!
//! A result holds a labeled array produced by a solver (or folded from many
//! solver outputs) and the channel map of the sensor. Passive results expose
//! brightness temperatures, active results expose backscattering coefficients.

use crate::core::data_array::{db, DataArray, Selection, Selector, Value};
use crate::core::sensor::{ChannelMap, POLARIZATION, POLARIZATION_INC, THETA, THETA_INC};
use crate::core::table::{channel_table, ChannelAxis, Table};
use crate::types::{Label, Mode, SmrtError, SmrtResult};
use std::f64::consts::PI;

/// Selection merged with the coordinates of `channel`, keeping only the
/// channel coordinates that are dimensions of `data`. Channel coordinates take
/// precedence over the caller's filters.
fn merged_selection(
    data: &DataArray,
    channel_map: &ChannelMap,
    channel: Option<&str>,
    selection: &Selection,
) -> SmrtResult<Selection> {
    let mut merged = selection.clone();
    if let Some(channel) = channel {
        let coords = channel_map.get(channel).ok_or_else(|| {
            SmrtError::Selection(format!(
                "unknown channel '{}' (channels: {:?})",
                channel,
                channel_map.keys().collect::<Vec<_>>()
            ))
        })?;
        for (dim, label) in coords {
            if data.has_dim(dim) {
                merged.insert(dim, Selector::One(label.clone()));
            }
        }
    }
    Ok(merged)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PassiveResult {
    data: DataArray,
    channel_map: ChannelMap,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveResult {
    data: DataArray,
    channel_map: ChannelMap,
}

/// Result of one or many simulations
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationResult {
    Passive(PassiveResult),
    Active(ActiveResult),
}

impl SimulationResult {
    pub fn new(mode: Mode, data: DataArray, channel_map: ChannelMap) -> Self {
        match mode {
            Mode::Passive => SimulationResult::Passive(PassiveResult { data, channel_map }),
            Mode::Active => SimulationResult::Active(ActiveResult { data, channel_map }),
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            SimulationResult::Passive(_) => Mode::Passive,
            SimulationResult::Active(_) => Mode::Active,
        }
    }

    pub fn data(&self) -> &DataArray {
        match self {
            SimulationResult::Passive(r) => &r.data,
            SimulationResult::Active(r) => &r.data,
        }
    }

    pub fn channel_map(&self) -> &ChannelMap {
        match self {
            SimulationResult::Passive(r) => &r.channel_map,
            SimulationResult::Active(r) => &r.channel_map,
        }
    }

    pub fn into_parts(self) -> (Mode, DataArray, ChannelMap) {
        match self {
            SimulationResult::Passive(r) => (Mode::Passive, r.data, r.channel_map),
            SimulationResult::Active(r) => (Mode::Active, r.data, r.channel_map),
        }
    }

    pub fn dims(&self) -> &[String] {
        self.data().dims()
    }

    /// Coordinates along `dim`
    pub fn coord(&self, dim: &str) -> Option<&[Label]> {
        self.data().coords(dim)
    }

    /// All coordinates, in dimension order
    pub fn coords(&self) -> Vec<(&str, &[Label])> {
        self.data().all_coords().collect()
    }

    /// Label selection, optionally narrowed to a named channel
    pub fn sel_data(&self, channel: Option<&str>, selection: &Selection) -> SmrtResult<DataArray> {
        let merged = merged_selection(self.data(), self.channel_map(), channel, selection)?;
        self.data().sel(&merged)
    }

    pub fn as_passive(&self) -> SmrtResult<&PassiveResult> {
        match self {
            SimulationResult::Passive(r) => Ok(r),
            SimulationResult::Active(_) => Err(SmrtError::Configuration(
                "brightness temperature is only available for a passive result".to_string(),
            )),
        }
    }

    pub fn as_active(&self) -> SmrtResult<&ActiveResult> {
        match self {
            SimulationResult::Active(r) => Ok(r),
            SimulationResult::Passive(_) => Err(SmrtError::Configuration(
                "backscattering coefficients are only available for an active result".to_string(),
            )),
        }
    }
}

impl PassiveResult {
    pub fn data(&self) -> &DataArray {
        &self.data
    }

    pub fn channel_map(&self) -> &ChannelMap {
        &self.channel_map
    }

    pub fn sel_data(&self, channel: Option<&str>, selection: &Selection) -> SmrtResult<DataArray> {
        let merged = merged_selection(&self.data, &self.channel_map, channel, selection)?;
        self.data.sel(&merged)
    }

    /// Brightness temperature (K)
    pub fn tb(&self, channel: Option<&str>, selection: &Selection) -> SmrtResult<Value> {
        Ok(Value::squeezed(self.sel_data(channel, selection)?))
    }

    pub fn tb_v(&self, selection: &Selection) -> SmrtResult<Value> {
        self.tb(None, &selection.clone().with(POLARIZATION, "V"))
    }

    pub fn tb_h(&self, selection: &Selection) -> SmrtResult<Value> {
        self.tb(None, &selection.clone().with(POLARIZATION, "H"))
    }

    /// Ratio of two polarizations, `ratio` is written `"H_V"` for H over V
    pub fn polarization_ratio(&self, ratio: &str, selection: &Selection) -> SmrtResult<Value> {
        let (num, den) = match ratio.split_once('_') {
            Some((num, den)) if !num.is_empty() && !den.is_empty() => (num, den),
            _ => {
                return Err(SmrtError::Configuration(format!(
                    "polarization ratio must be written as 'H_V' or 'V_H', got '{}'",
                    ratio
                )))
            }
        };
        let num = self.sel_data(None, &selection.clone().with(POLARIZATION, num))?;
        let den = self.sel_data(None, &selection.clone().with(POLARIZATION, den))?;
        Ok(Value::squeezed(num.zip_map(&den, |a, b| a / b)?))
    }

    pub fn tb_as_table(&self, channel_axis: Option<ChannelAxis>, selection: &Selection) -> SmrtResult<Table> {
        channel_table("Tb", channel_axis, self.channel_map.keys().map(|k| k.as_str()).collect(), |ch| {
            self.sel_data(ch, selection)
        })
    }
}

fn describe(selector: &Selector) -> String {
    match selector {
        Selector::One(label) => label.to_string(),
        Selector::Many(labels) => format!(
            "[{}]",
            labels.iter().map(|l| l.to_string()).collect::<Vec<_>>().join(", ")
        ),
    }
}

fn same_angles(a: &Selector, b: &Selector) -> bool {
    match (a, b) {
        (Selector::One(a), Selector::One(b)) => a.matches(b),
        (Selector::Many(a), Selector::Many(b)) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.matches(y)),
        _ => false,
    }
}

impl ActiveResult {
    pub fn data(&self) -> &DataArray {
        &self.data
    }

    pub fn channel_map(&self) -> &ChannelMap {
        &self.channel_map
    }

    pub fn sel_data(&self, channel: Option<&str>, selection: &Selection) -> SmrtResult<DataArray> {
        let merged = merged_selection(&self.data, &self.channel_map, channel, selection)?;
        self.data.sel(&merged)
    }

    /// Backscattering coefficient σ = 4π cos(θ) I, θ taken from a `theta` or
    /// `theta_inc` filter (which must agree when both are given), otherwise
    /// from every incidence angle of the array.
    fn backscatter(&self, channel: Option<&str>, selection: &Selection) -> SmrtResult<DataArray> {
        let mut merged = merged_selection(&self.data, &self.channel_map, channel, selection)?;
        let theta = merged.remove(THETA);
        let theta_inc = merged.remove(THETA_INC);
        let angle = match (theta, theta_inc) {
            (Some(theta), Some(theta_inc)) => {
                if !same_angles(&theta, &theta_inc) {
                    return Err(SmrtError::InconsistentAngle {
                        theta: describe(&theta),
                        theta_inc: describe(&theta_inc),
                    });
                }
                Some(theta)
            }
            (theta, theta_inc) => theta.or(theta_inc),
        };

        let intensity = self.data.sel(&merged)?;
        let sigma = intensity.scale_along(THETA_INC, |label| {
            let theta = label.as_f64().ok_or_else(|| {
                SmrtError::Selection(format!("incidence angle label {} is not numeric", label))
            })?;
            Ok(4.0 * PI * theta.to_radians().cos())
        })?;

        match angle {
            None => Ok(sigma),
            Some(angle) => {
                let mut by_angle = Selection::new();
                by_angle.insert(THETA_INC, angle);
                sigma.sel(&by_angle)
            }
        }
    }

    /// Backscattering coefficient (linear)
    pub fn sigma(&self, channel: Option<&str>, selection: &Selection) -> SmrtResult<Value> {
        Ok(Value::squeezed(self.backscatter(channel, selection)?))
    }

    /// Backscattering coefficient (dB)
    pub fn sigma_db(&self, channel: Option<&str>, selection: &Selection) -> SmrtResult<Value> {
        Ok(self.sigma(channel, selection)?.map(db))
    }

    fn sigma_pair(&self, pol_inc: &str, pol: &str, selection: &Selection) -> SmrtResult<Value> {
        let selection = selection.clone().with(POLARIZATION_INC, pol_inc).with(POLARIZATION, pol);
        self.sigma(None, &selection)
    }

    pub fn sigma_vv(&self, selection: &Selection) -> SmrtResult<Value> {
        self.sigma_pair("V", "V", selection)
    }

    pub fn sigma_vv_db(&self, selection: &Selection) -> SmrtResult<Value> {
        Ok(self.sigma_vv(selection)?.map(db))
    }

    pub fn sigma_hh(&self, selection: &Selection) -> SmrtResult<Value> {
        self.sigma_pair("H", "H", selection)
    }

    pub fn sigma_hh_db(&self, selection: &Selection) -> SmrtResult<Value> {
        Ok(self.sigma_hh(selection)?.map(db))
    }

    pub fn sigma_hv(&self, selection: &Selection) -> SmrtResult<Value> {
        self.sigma_pair("H", "V", selection)
    }

    pub fn sigma_hv_db(&self, selection: &Selection) -> SmrtResult<Value> {
        Ok(self.sigma_hv(selection)?.map(db))
    }

    pub fn sigma_vh(&self, selection: &Selection) -> SmrtResult<Value> {
        self.sigma_pair("V", "H", selection)
    }

    pub fn sigma_vh_db(&self, selection: &Selection) -> SmrtResult<Value> {
        Ok(self.sigma_vh(selection)?.map(db))
    }

    pub fn sigma_as_table(&self, channel_axis: Option<ChannelAxis>, selection: &Selection) -> SmrtResult<Table> {
        channel_table("sigma", channel_axis, self.channel_names(), |ch| self.backscatter(ch, selection))
    }

    pub fn sigma_db_as_table(&self, channel_axis: Option<ChannelAxis>, selection: &Selection) -> SmrtResult<Table> {
        channel_table("sigma", channel_axis, self.channel_names(), |ch| {
            Ok(self.backscatter(ch, selection)?.mapv(db))
        })
    }

    fn channel_names(&self) -> Vec<&str> {
        self.channel_map.keys().map(|k| k.as_str()).collect()
    }
}

//! Folding per-unit results back into one labeled result
//!
//! Results arrive in the flattening order of the expansion (the last axis
//! varies fastest). Folding concatenates consecutive groups along the innermost
//! axis first, then along each enclosing axis. New axes end up leading,
//! outermost first; sensor axes the unit results already carry are joined in
//! place.

use crate::core::data_array::DataArray;
use crate::core::result::SimulationResult;
use crate::core::sensor::ChannelMap;
use crate::core::simulation::{AxisDescriptor, AxisOrigin};
use crate::types::{Label, SmrtError, SmrtResult};

/// Concatenate results along `axis`.
///
/// All results must share the same mode. Results that already carry the axis
/// are joined along it, otherwise the axis becomes a new leading dimension.
///
/// Along a sensor axis the channel maps are united: each part holds the
/// channels a sensor split left it, so the union is the map before the split.
/// Along any other axis, when the channel maps differ, every channel is tagged
/// with the axis value of the result it comes from and a channel present in
/// several results keeps the last one.
pub fn concat_results(results: Vec<SimulationResult>, axis: &AxisDescriptor) -> SmrtResult<SimulationResult> {
    let mode = match results.first() {
        Some(first) => first.mode(),
        None => return Err(SmrtError::ShapeMismatch("no result to concatenate".to_string())),
    };
    if let Some(other) = results.iter().find(|r| r.mode() != mode) {
        return Err(SmrtError::ShapeMismatch(format!(
            "cannot concatenate {} and {} results",
            mode,
            other.mode()
        )));
    }

    if results.len() != axis.len() {
        return Err(SmrtError::ShapeMismatch(format!(
            "{} results to concatenate along '{}' but {} coordinate values",
            results.len(),
            axis.name,
            axis.len()
        )));
    }

    let unite = axis.is_sensor_axis() || results.iter().all(|r| r.data().has_dim(&axis.name));
    let same_channels = results.windows(2).all(|w| w[0].channel_map() == w[1].channel_map());
    let mut channel_map = ChannelMap::new();
    let mut parts = Vec::with_capacity(results.len());
    for (i, result) in results.into_iter().enumerate() {
        let (_, data, map) = result.into_parts();
        if unite {
            channel_map.extend(map);
        } else if !same_channels {
            for (name, mut coords) in map {
                coords.insert(axis.name.clone(), axis.values[i].clone());
                channel_map.insert(name, coords);
            }
        } else if i == 0 {
            channel_map = map;
        }
        parts.push(data);
    }

    let data = DataArray::concat(&parts, &axis.name, axis.values.clone())?;
    Ok(SimulationResult::new(mode, data, channel_map))
}

/// Fold a flat sequence of results along `axes` (outermost first).
pub fn fold_results(mut results: Vec<SimulationResult>, axes: &[AxisDescriptor]) -> SmrtResult<SimulationResult> {
    for axis in axes.iter().rev() {
        let n = axis.len();
        if n == 0 || results.len() % n != 0 {
            return Err(SmrtError::ShapeMismatch(format!(
                "{} results cannot be grouped by the {} values of '{}'",
                results.len(),
                n,
                axis.name
            )));
        }
        log::debug!("Folding {} result(s) along '{}' ({})", results.len(), axis.name, n);

        let mut folded = Vec::with_capacity(results.len() / n);
        let mut iter = results.into_iter();
        loop {
            let group: Vec<_> = iter.by_ref().take(n).collect();
            if group.is_empty() {
                break;
            }
            folded.push(concat_results(group, axis)?);
        }
        results = folded;
    }

    let count = results.len();
    match (results.pop(), count) {
        (Some(result), 1) => Ok(result),
        _ => Err(SmrtError::ShapeMismatch(format!(
            "folding left {} results instead of one",
            count
        ))),
    }
}

/// Channels of one slice at `value` along `axis`: channels tagged with another
/// value are dropped and the tag is removed from the others.
fn restrict_channels(map: &ChannelMap, axis: &str, value: &Label) -> ChannelMap {
    map.iter()
        .filter(|(_, coords)| coords.get(axis).map_or(true, |v| v.matches(value)))
        .map(|(name, coords)| {
            let mut coords = coords.clone();
            coords.shift_remove(axis);
            (name.clone(), coords)
        })
        .collect()
}

/// Channels of one slice along a sensor axis, as the split sensor holds them
fn filter_channels(map: &ChannelMap, axis: &str, value: &Label) -> ChannelMap {
    map.iter()
        .filter(|(_, coords)| coords.get(axis).map_or(true, |v| v.matches(value)))
        .map(|(name, coords)| (name.clone(), coords.clone()))
        .collect()
}

/// Split a folded result back into the flat sequence [`fold_results`] consumed.
pub fn unfold_results(result: SimulationResult, axes: &[AxisDescriptor]) -> SmrtResult<Vec<SimulationResult>> {
    let mut results = vec![result];
    for axis in axes {
        let mut split = Vec::with_capacity(results.len() * axis.len());
        for result in &results {
            let labels = result.coord(&axis.name).ok_or_else(|| {
                SmrtError::Selection(format!("no dimension '{}' to unfold", axis.name))
            })?;
            if labels.len() != axis.len() {
                return Err(SmrtError::ShapeMismatch(format!(
                    "dimension '{}' has {} values, expected {}",
                    axis.name,
                    labels.len(),
                    axis.len()
                )));
            }
            for (i, value) in axis.values.iter().enumerate() {
                let data = match axis.origin {
                    AxisOrigin::SensorDim => result.data().take(&axis.name, &[i])?,
                    AxisOrigin::Sensor | AxisOrigin::Batch => result.data().isel(&axis.name, i)?,
                };
                let channels = if axis.is_sensor_axis() {
                    filter_channels(result.channel_map(), &axis.name, value)
                } else {
                    restrict_channels(result.channel_map(), &axis.name, value)
                };
                split.push(SimulationResult::new(result.mode(), data, channels));
            }
        }
        results = split;
    }
    Ok(results)
}

//! Result persistence
//!
//! A result is stored as one self-describing JSON document: the mode, the
//! dimension names with their coordinates, the shape, the values in row-major
//! order and the channel map.

use crate::core::data_array::DataArray;
use crate::core::result::SimulationResult;
use crate::core::sensor::{ChannelMap, THETA_INC};
use crate::types::{Label, Mode, SmrtError, SmrtResult};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum Coordinate {
    Number(f64),
    Time { time: DateTime<Utc> },
    Text(String),
}

impl From<&Label> for Coordinate {
    fn from(label: &Label) -> Self {
        match label {
            Label::Number(v) => Coordinate::Number(*v),
            Label::Text(s) => Coordinate::Text(s.clone()),
            Label::Time(t) => Coordinate::Time { time: *t },
        }
    }
}

impl From<Coordinate> for Label {
    fn from(coordinate: Coordinate) -> Self {
        match coordinate {
            Coordinate::Number(v) => Label::Number(v),
            Coordinate::Text(s) => Label::Text(s),
            Coordinate::Time { time } => Label::Time(time),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ResultFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mode: Option<String>,
    dims: Vec<String>,
    coords: IndexMap<String, Vec<Coordinate>>,
    shape: Vec<usize>,
    values: Vec<f64>,
    #[serde(default)]
    channel_map: IndexMap<String, IndexMap<String, Coordinate>>,
}

/// Polarization coordinates are single letters
fn polarization_label(dim: &str, coordinate: Coordinate) -> SmrtResult<Label> {
    match coordinate {
        Coordinate::Text(s) => match s.chars().next() {
            Some(c) => Ok(Label::Text(c.to_string())),
            None => Err(SmrtError::Configuration(format!("empty polarization label along '{}'", dim))),
        },
        other => Err(SmrtError::Configuration(format!(
            "polarization label {:?} along '{}' is not text",
            other, dim
        ))),
    }
}

impl SimulationResult {
    /// Write the result to `path`
    pub fn save(&self, path: impl AsRef<Path>) -> SmrtResult<()> {
        save_result(self, path)
    }
}

pub fn save_result(result: &SimulationResult, path: impl AsRef<Path>) -> SmrtResult<()> {
    let data = result.data();
    let file = ResultFile {
        mode: Some(result.mode().code().to_string()),
        dims: data.dims().to_vec(),
        coords: data
            .all_coords()
            .map(|(dim, labels)| (dim.to_string(), labels.iter().map(Coordinate::from).collect()))
            .collect(),
        shape: data.shape().to_vec(),
        values: data.data().iter().copied().collect(),
        channel_map: result
            .channel_map()
            .iter()
            .map(|(name, coords)| {
                let coords = coords.iter().map(|(k, v)| (k.clone(), Coordinate::from(v))).collect();
                (name.clone(), coords)
            })
            .collect(),
    };

    let path = path.as_ref();
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(writer, &file)?;
    log::debug!("Saved {} result {:?} to {}", result.mode(), data.shape(), path.display());
    Ok(())
}

/// Read a result written by [`save_result`].
///
/// Polarization coordinates are coerced to one-letter text. Without a recorded
/// mode, a `theta_inc` dimension marks an active result.
pub fn open_result(path: impl AsRef<Path>) -> SmrtResult<SimulationResult> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let mut file: ResultFile = serde_json::from_reader(reader)?;

    let mut coords = Vec::with_capacity(file.dims.len());
    for dim in &file.dims {
        let values = file
            .coords
            .shift_remove(dim)
            .ok_or_else(|| SmrtError::ShapeMismatch(format!("no coordinates for dimension '{}'", dim)))?;
        let labels = if dim.starts_with("polarization") {
            values
                .into_iter()
                .map(|c| polarization_label(dim, c))
                .collect::<SmrtResult<Vec<_>>>()?
        } else {
            values.into_iter().map(Label::from).collect()
        };
        coords.push(labels);
    }

    let values = ArrayD::from_shape_vec(IxDyn(&file.shape), file.values)
        .map_err(|e| SmrtError::ShapeMismatch(format!("stored values do not fit the shape: {}", e)))?;
    let data = DataArray::new(file.dims, coords, values)?;

    let mode = match file.mode.as_deref().and_then(Mode::from_code) {
        Some(mode) => mode,
        None if data.has_dim(THETA_INC) => Mode::Active,
        None => Mode::Passive,
    };
    let channel_map: ChannelMap = file
        .channel_map
        .into_iter()
        .map(|(name, coords)| (name, coords.into_iter().map(|(k, v)| (k, Label::from(v))).collect()))
        .collect();

    log::debug!("Opened {} result {:?} from {}", mode, data.shape(), path.display());
    Ok(SimulationResult::new(mode, data, channel_map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sensor::{ChannelCoords, POLARIZATION, POLARIZATION_INC, THETA};
    use chrono::TimeZone;

    #[test]
    fn test_save_open_round_trip() {
        let data = DataArray::new(
            vec!["time".to_string(), POLARIZATION.to_string(), THETA.to_string()],
            vec![
                vec![Label::from(Utc.with_ymd_and_hms(2020, 1, 15, 0, 0, 0).unwrap())],
                vec!["V".into(), "H".into()],
                vec![40.0.into(), 55.0.into()],
            ],
            ArrayD::from_shape_vec(IxDyn(&[1, 2, 2]), vec![250.0, 240.0, 230.0, 210.0]).unwrap(),
        )
        .unwrap();
        let mut channels = ChannelMap::new();
        let mut coords = ChannelCoords::new();
        coords.insert(POLARIZATION.to_string(), "V".into());
        coords.insert(THETA.to_string(), 55.0.into());
        channels.insert("37V55".to_string(), coords);
        let result = SimulationResult::new(Mode::Passive, data, channels);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.json");
        result.save(&path).unwrap();
        assert_eq!(open_result(&path).unwrap(), result);
    }

    #[test]
    fn test_open_coerces_polarization_and_guesses_mode() {
        let text = r#"{
            "dims": ["polarization_inc", "polarization", "theta_inc"],
            "coords": {"polarization_inc": ["VV"], "polarization": ["Vertical", "H"], "theta_inc": [30.0]},
            "shape": [1, 2, 1],
            "values": [0.1, 0.01]
        }"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        std::fs::write(&path, text).unwrap();

        let result = open_result(&path).unwrap();
        assert_eq!(result.mode(), Mode::Active);
        assert_eq!(result.coord(POLARIZATION).unwrap(), &[Label::from("V"), Label::from("H")]);
        assert_eq!(result.coord(POLARIZATION_INC).unwrap(), &[Label::from("V")]);
    }
}

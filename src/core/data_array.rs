//! Labeled multi-dimensional arrays
//!
//! [`DataArray`] keeps a dense `ndarray` buffer together with one name and one
//! coordinate vector per axis. It supports the small algebra the results need:
//! label selection, squeezing, concatenation (along a new leading axis or an
//! existing one) and elementwise transforms.

use crate::types::{Label, SmrtError, SmrtResult};
use indexmap::IndexMap;
use ndarray::{ArrayD, Axis, Dimension, IxDyn};
use serde::{Deserialize, Serialize};

/// Selection along one dimension
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// Pick a single label, the dimension is dropped
    One(Label),
    /// Pick several labels in the given order, the dimension is kept
    Many(Vec<Label>),
}

fn same_labels(a: &[Label], b: &[Label]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.matches(y))
}

/// Dimension name → selector
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection(IndexMap<String, Selector>);

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, dim: &str, label: impl Into<Label>) -> Self {
        self.0.insert(dim.to_string(), Selector::One(label.into()));
        self
    }

    pub fn with_many(mut self, dim: &str, labels: Vec<Label>) -> Self {
        self.0.insert(dim.to_string(), Selector::Many(labels));
        self
    }

    pub fn insert(&mut self, dim: &str, selector: Selector) {
        self.0.insert(dim.to_string(), selector);
    }

    pub fn get(&self, dim: &str) -> Option<&Selector> {
        self.0.get(dim)
    }

    pub fn remove(&mut self, dim: &str) -> Option<Selector> {
        self.0.shift_remove(dim)
    }

    pub fn contains(&self, dim: &str) -> bool {
        self.0.contains_key(dim)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Selector)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keep only the entries whose dimension satisfies `keep`
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.0.retain(|dim, _| keep(dim));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataArray {
    dims: Vec<String>,
    coords: Vec<Vec<Label>>,
    data: ArrayD<f64>,
}

impl DataArray {
    pub fn new(dims: Vec<String>, coords: Vec<Vec<Label>>, data: ArrayD<f64>) -> SmrtResult<Self> {
        if dims.len() != data.ndim() || coords.len() != data.ndim() {
            return Err(SmrtError::ShapeMismatch(format!(
                "{} dimension names and {} coordinate vectors for a {}-d array",
                dims.len(),
                coords.len(),
                data.ndim()
            )));
        }
        for (i, (dim, labels)) in dims.iter().zip(&coords).enumerate() {
            if labels.len() != data.shape()[i] {
                return Err(SmrtError::ShapeMismatch(format!(
                    "dimension '{}' has {} coordinates but length {}",
                    dim,
                    labels.len(),
                    data.shape()[i]
                )));
            }
            if dims[..i].contains(dim) {
                return Err(SmrtError::ShapeMismatch(format!("duplicate dimension '{}'", dim)));
            }
        }
        Ok(Self { dims, coords, data })
    }

    /// 0-d array
    pub fn scalar(value: f64) -> Self {
        Self {
            dims: Vec::new(),
            coords: Vec::new(),
            data: ArrayD::from_elem(IxDyn(&[]), value),
        }
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn axis_of(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == dim)
    }

    pub fn has_dim(&self, dim: &str) -> bool {
        self.axis_of(dim).is_some()
    }

    pub fn coords(&self, dim: &str) -> Option<&[Label]> {
        self.axis_of(dim).map(|ax| self.coords[ax].as_slice())
    }

    /// All coordinates, in dimension order
    pub fn all_coords(&self) -> impl Iterator<Item = (&str, &[Label])> {
        self.dims.iter().map(|d| d.as_str()).zip(self.coords.iter().map(|c| c.as_slice()))
    }

    /// The single value of a 0-d or one-element array
    pub fn value(&self) -> Option<f64> {
        if self.data.len() == 1 {
            self.data.iter().next().copied()
        } else {
            None
        }
    }

    fn label_index(&self, axis: usize, label: &Label) -> SmrtResult<usize> {
        self.coords[axis].iter().position(|c| c.matches(label)).ok_or_else(|| {
            SmrtError::Selection(format!(
                "label {} not found along dimension '{}'",
                label, self.dims[axis]
            ))
        })
    }

    fn require_axis(&self, dim: &str) -> SmrtResult<usize> {
        self.axis_of(dim).ok_or_else(|| {
            SmrtError::Selection(format!("no dimension '{}' (dimensions: {:?})", dim, self.dims))
        })
    }

    /// Label-based selection. A `One` selector drops its dimension.
    pub fn sel(&self, selection: &Selection) -> SmrtResult<DataArray> {
        let mut out = self.clone();
        for (dim, selector) in selection.iter() {
            let axis = out.require_axis(dim)?;
            out = match selector {
                Selector::One(label) => {
                    let index = out.label_index(axis, label)?;
                    out.isel_axis(axis, index)
                }
                Selector::Many(labels) => {
                    let indices = labels
                        .iter()
                        .map(|label| out.label_index(axis, label))
                        .collect::<SmrtResult<Vec<_>>>()?;
                    out.take_axis(axis, &indices)
                }
            };
        }
        Ok(out)
    }

    /// Position-based selection of a single index, dropping the dimension
    pub fn isel(&self, dim: &str, index: usize) -> SmrtResult<DataArray> {
        let axis = self.require_axis(dim)?;
        if index >= self.shape()[axis] {
            return Err(SmrtError::Selection(format!(
                "index {} out of range along '{}' of length {}",
                index,
                dim,
                self.shape()[axis]
            )));
        }
        Ok(self.isel_axis(axis, index))
    }

    fn isel_axis(&self, axis: usize, index: usize) -> DataArray {
        let mut dims = self.dims.clone();
        let mut coords = self.coords.clone();
        dims.remove(axis);
        coords.remove(axis);
        DataArray {
            dims,
            coords,
            data: self.data.index_axis(Axis(axis), index).to_owned(),
        }
    }

    fn take_axis(&self, axis: usize, indices: &[usize]) -> DataArray {
        let mut coords = self.coords.clone();
        coords[axis] = indices.iter().map(|&i| self.coords[axis][i].clone()).collect();
        DataArray {
            dims: self.dims.clone(),
            coords,
            data: self.data.select(Axis(axis), indices),
        }
    }

    /// Drop every length-1 dimension
    pub fn squeeze(&self) -> DataArray {
        let mut out = self.clone();
        for axis in (0..self.ndim()).rev() {
            if self.shape()[axis] == 1 {
                out = out.isel_axis(axis, 0);
            }
        }
        out
    }

    /// Join `parts` along `dim`, labeled by `labels` (one label per part).
    ///
    /// When no part has `dim`, the parts are stacked along a new leading axis.
    /// When every part already has it, they are joined along that axis in place
    /// and a part of length one there must carry its label. The other dimensions
    /// must agree in name, order and coordinates across parts.
    pub fn concat(parts: &[DataArray], dim: &str, labels: Vec<Label>) -> SmrtResult<DataArray> {
        let first = parts
            .first()
            .ok_or_else(|| SmrtError::ShapeMismatch("cannot concatenate an empty sequence".to_string()))?;
        if parts.len() != labels.len() {
            return Err(SmrtError::ShapeMismatch(format!(
                "{} arrays to concatenate along '{}' but {} coordinate values",
                parts.len(),
                dim,
                labels.len()
            )));
        }
        let axis = first.axis_of(dim);

        for part in &parts[1..] {
            if part.dims != first.dims {
                return Err(SmrtError::ShapeMismatch(format!(
                    "cannot concatenate arrays with dimensions {:?} and {:?}",
                    first.dims, part.dims
                )));
            }
            for (i, name) in first.dims.iter().enumerate() {
                if Some(i) == axis {
                    continue;
                }
                if !same_labels(&first.coords[i], &part.coords[i]) {
                    return Err(SmrtError::ShapeMismatch(format!(
                        "coordinates of '{}' differ between the arrays to concatenate along '{}': {:?} and {:?}",
                        name, dim, first.coords[i], part.coords[i]
                    )));
                }
            }
        }

        match axis {
            None => {
                let views: Vec<_> = parts.iter().map(|p| p.data.view()).collect();
                let data =
                    ndarray::stack(Axis(0), &views).map_err(|e| SmrtError::ShapeMismatch(e.to_string()))?;

                let mut dims = Vec::with_capacity(first.ndim() + 1);
                dims.push(dim.to_string());
                dims.extend(first.dims.iter().cloned());
                let mut coords = Vec::with_capacity(first.ndim() + 1);
                coords.push(labels);
                coords.extend(first.coords.iter().cloned());
                DataArray::new(dims, coords, data)
            }
            Some(axis) => {
                let mut joined = Vec::new();
                for (part, label) in parts.iter().zip(&labels) {
                    if let [only] = part.coords[axis].as_slice() {
                        if !only.matches(label) {
                            return Err(SmrtError::ShapeMismatch(format!(
                                "array labeled {} along '{}' is concatenated as {}",
                                only, dim, label
                            )));
                        }
                    }
                    joined.extend(part.coords[axis].iter().cloned());
                }

                let views: Vec<_> = parts.iter().map(|p| p.data.view()).collect();
                let data = ndarray::concatenate(Axis(axis), &views)
                    .map_err(|e| SmrtError::ShapeMismatch(e.to_string()))?;
                let mut coords = first.coords.clone();
                coords[axis] = joined;
                DataArray::new(first.dims.clone(), coords, data)
            }
        }
    }

    /// Position-based selection keeping the dimension
    pub fn take(&self, dim: &str, indices: &[usize]) -> SmrtResult<DataArray> {
        let axis = self.require_axis(dim)?;
        let len = self.shape()[axis];
        if let Some(index) = indices.iter().find(|&&i| i >= len) {
            return Err(SmrtError::Selection(format!(
                "index {} out of range along '{}' of length {}",
                index, dim, len
            )));
        }
        Ok(self.take_axis(axis, indices))
    }

    pub fn mapv(&self, f: impl Fn(f64) -> f64) -> DataArray {
        DataArray {
            dims: self.dims.clone(),
            coords: self.coords.clone(),
            data: self.data.mapv(f),
        }
    }

    /// Elementwise combination of two arrays with identical dimensions
    pub fn zip_map(&self, other: &DataArray, f: impl Fn(f64, f64) -> f64) -> SmrtResult<DataArray> {
        if self.dims != other.dims || self.shape() != other.shape() {
            return Err(SmrtError::ShapeMismatch(format!(
                "elementwise operation on {:?}{:?} and {:?}{:?}",
                self.dims,
                self.shape(),
                other.dims,
                other.shape()
            )));
        }
        let mut data = self.data.clone();
        data.zip_mut_with(&other.data, |a, &b| *a = f(*a, b));
        Ok(DataArray {
            dims: self.dims.clone(),
            coords: self.coords.clone(),
            data,
        })
    }

    /// Multiply each slice along `dim` by `factor(label)`
    pub fn scale_along(&self, dim: &str, factor: impl Fn(&Label) -> SmrtResult<f64>) -> SmrtResult<DataArray> {
        let axis = self.require_axis(dim)?;
        let mut out = self.clone();
        for (i, label) in self.coords[axis].iter().enumerate() {
            let k = factor(label)?;
            out.data.index_axis_mut(Axis(axis), i).mapv_inplace(|v| v * k);
        }
        Ok(out)
    }

    /// Iterate over (coordinates, value) pairs in row-major order
    pub fn indexed_iter(&self) -> impl Iterator<Item = (Vec<&Label>, f64)> + '_ {
        self.data.indexed_iter().map(move |(index, &value)| {
            let labels = index
                .slice()
                .iter()
                .enumerate()
                .map(|(axis, &i)| &self.coords[axis][i])
                .collect();
            (labels, value)
        })
    }
}

/// Outcome of a scalar-returning accessor after squeezing
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(f64),
    Array(DataArray),
}

impl Value {
    /// Apply the squeeze rule: a single value becomes a bare number
    pub fn squeezed(array: DataArray) -> Value {
        let array = array.squeeze();
        match (array.ndim(), array.value()) {
            (0, Some(v)) => Value::Scalar(v),
            _ => Value::Array(array),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            Value::Array(_) => None,
        }
    }

    pub fn as_array(&self) -> Option<&DataArray> {
        match self {
            Value::Scalar(_) => None,
            Value::Array(a) => Some(a),
        }
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Value {
        match self {
            Value::Scalar(v) => Value::Scalar(f(*v)),
            Value::Array(a) => Value::Array(a.mapv(f)),
        }
    }
}

/// Decibels from a linear power ratio
pub fn db(value: f64) -> f64 {
    10.0 * value.log10()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    fn sample() -> DataArray {
        let data = Array::from_shape_vec(IxDyn(&[2, 3]), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        DataArray::new(
            vec!["polarization".into(), "theta".into()],
            vec![
                vec![Label::from("V"), Label::from("H")],
                vec![Label::from(30.0), Label::from(40.0), Label::from(50.0)],
            ],
            data,
        )
        .unwrap()
    }

    #[test]
    fn test_sel_one_drops_dimension() {
        let a = sample();
        let v = a.sel(&Selection::new().with("polarization", "H")).unwrap();
        assert_eq!(v.dims(), &["theta".to_string()]);
        assert_eq!(v.data().as_slice().unwrap(), &[4.0, 5.0, 6.0]);

        let s = a
            .sel(&Selection::new().with("polarization", "V").with("theta", 40.0))
            .unwrap();
        assert_eq!(s.ndim(), 0);
        assert_eq!(s.value(), Some(2.0));
    }

    #[test]
    fn test_sel_many_keeps_dimension() {
        let a = sample();
        let v = a
            .sel(&Selection::new().with_many("theta", vec![Label::from(50.0), Label::from(30.0)]))
            .unwrap();
        assert_eq!(v.shape(), &[2, 2]);
        assert_eq!(v.coords("theta").unwrap()[0], Label::from(50.0));
        assert_eq!(v.data()[[1, 0]], 6.0);
    }

    #[test]
    fn test_sel_missing_label() {
        let a = sample();
        let err = a.sel(&Selection::new().with("theta", 45.0)).unwrap_err();
        assert!(matches!(err, SmrtError::Selection(_)));
        let err = a.sel(&Selection::new().with("frequency", 1.0)).unwrap_err();
        assert!(matches!(err, SmrtError::Selection(_)));
    }

    #[test]
    fn test_squeeze_rule() {
        let a = sample();
        let one = a.sel(&Selection::new().with_many("theta", vec![Label::from(40.0)])).unwrap();
        assert_eq!(one.shape(), &[2, 1]);
        assert_eq!(one.squeeze().dims(), &["polarization".to_string()]);

        let single = one.sel(&Selection::new().with_many("polarization", vec![Label::from("V")])).unwrap();
        assert_eq!(Value::squeezed(single), Value::Scalar(2.0));
    }

    #[test]
    fn test_concat_new_leading_axis() {
        let a = sample();
        let b = a.mapv(|v| v * 10.0);
        let c = DataArray::concat(&[a.clone(), b], "snowpack", vec![Label::from(0usize), Label::from(1usize)]).unwrap();
        assert_eq!(c.dims()[0], "snowpack");
        assert_eq!(c.shape(), &[2, 2, 3]);
        assert_eq!(c.isel("snowpack", 1).unwrap().data()[[1, 2]], 60.0);
        assert_eq!(c.isel("snowpack", 0).unwrap(), a);
    }

    #[test]
    fn test_concat_mismatch() {
        let a = sample();
        let b = a.sel(&Selection::new().with("polarization", "V")).unwrap();
        let err = DataArray::concat(&[a.clone(), b], "x", vec![Label::from(0usize), Label::from(1usize)]).unwrap_err();
        assert!(matches!(err, SmrtError::ShapeMismatch(_)));
        let err = DataArray::concat(&[a], "x", vec![]).unwrap_err();
        assert!(matches!(err, SmrtError::ShapeMismatch(_)));
    }

    #[test]
    fn test_concat_existing_axis() {
        let a = sample();
        let parts: Vec<_> = [30.0, 40.0, 50.0]
            .iter()
            .map(|&t| a.sel(&Selection::new().with_many("theta", vec![Label::from(t)])).unwrap())
            .collect();
        let labels = vec![Label::from(30.0), Label::from(40.0), Label::from(50.0)];
        let joined = DataArray::concat(&parts, "theta", labels).unwrap();
        assert_eq!(joined, a);
        assert_eq!(joined.take("theta", &[1]).unwrap(), parts[1]);
    }

    #[test]
    fn test_concat_rejects_mislabeled_parts() {
        let a = sample();
        let at = |t: f64| a.sel(&Selection::new().with_many("theta", vec![Label::from(t)])).unwrap();

        // theta differs between parts stacked along a new axis
        let err = DataArray::concat(&[at(40.0), at(50.0)], "snowpack", vec![Label::from(0usize), Label::from(1usize)])
            .unwrap_err();
        assert!(matches!(err, SmrtError::ShapeMismatch(_)));

        // a part sits at another angle than the one it is concatenated as
        let err = DataArray::concat(&[at(30.0), at(50.0)], "theta", vec![Label::from(30.0), Label::from(40.0)])
            .unwrap_err();
        assert!(matches!(err, SmrtError::ShapeMismatch(_)));
    }

    #[test]
    fn test_scale_along() {
        let a = sample();
        let scaled = a
            .scale_along("theta", |label| Ok(label.as_f64().unwrap_or(0.0)))
            .unwrap();
        assert_eq!(scaled.data()[[0, 2]], 150.0);
        assert_eq!(scaled.data()[[1, 0]], 120.0);
    }

    #[test]
    fn test_db() {
        assert!((db(100.0) - 20.0).abs() < 1e-12);
        let v = Value::Scalar(0.1).map(db).as_f64().unwrap();
        assert!((v + 10.0).abs() < 1e-12);
    }
}

//! Flat tabular export of labeled results

use crate::core::data_array::DataArray;
use crate::types::{Label, SmrtError, SmrtResult};

/// Where channel names go in an exported table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelAxis {
    /// One column per channel
    Column,
    /// An extra `channel` index level
    Index,
}

impl std::str::FromStr for ChannelAxis {
    type Err = SmrtError;

    fn from_str(s: &str) -> SmrtResult<Self> {
        match s {
            "column" => Ok(ChannelAxis::Column),
            "index" => Ok(ChannelAxis::Index),
            _ => Err(SmrtError::Configuration(
                "channel_axis argument must be \"column\" or \"index\"".to_string(),
            )),
        }
    }
}

/// Rows of values addressed by a multi-level index
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub index_names: Vec<String>,
    pub columns: Vec<String>,
    pub index: Vec<Vec<Label>>,
    pub rows: Vec<Vec<f64>>,
}

impl Table {
    /// One row per element, indexed by the array coordinates
    pub fn from_array(array: &DataArray, name: &str) -> Table {
        let mut index = Vec::with_capacity(array.len());
        let mut rows = Vec::with_capacity(array.len());
        for (labels, value) in array.indexed_iter() {
            index.push(labels.into_iter().cloned().collect());
            rows.push(vec![value]);
        }
        Table {
            index_names: array.dims().to_vec(),
            columns: vec![name.to_string()],
            index,
            rows,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let j = self.column_position(name)?;
        Some(self.rows.iter().map(|row| row[j]).collect())
    }

    /// Value at the row whose index matches `labels`
    pub fn get(&self, labels: &[Label], column: &str) -> Option<f64> {
        let j = self.column_position(column)?;
        self.find_row(labels).map(|i| self.rows[i][j])
    }

    fn find_row(&self, labels: &[Label]) -> Option<usize> {
        self.index.iter().position(|row| {
            row.len() == labels.len() && row.iter().zip(labels).all(|(a, b)| a.matches(b))
        })
    }

    /// Append the columns of `other`, keeping only the index entries present in both
    pub fn inner_join(self, other: &Table) -> SmrtResult<Table> {
        if self.index_names != other.index_names {
            return Err(SmrtError::ShapeMismatch(format!(
                "cannot join tables indexed by {:?} and {:?}",
                self.index_names, other.index_names
            )));
        }
        let mut columns = self.columns;
        columns.extend(other.columns.iter().cloned());
        let mut index = Vec::new();
        let mut rows = Vec::new();
        for (labels, mut row) in self.index.into_iter().zip(self.rows) {
            if let Some(i) = other.find_row(&labels) {
                row.extend(other.rows[i].iter().copied());
                index.push(labels);
                rows.push(row);
            }
        }
        Ok(Table {
            index_names: self.index_names,
            columns,
            index,
            rows,
        })
    }

    /// Move the columns into a new innermost `channel` index level
    pub fn stack(self, name: &str) -> Table {
        let mut index_names = self.index_names;
        index_names.push("channel".to_string());
        let mut index = Vec::with_capacity(self.rows.len() * self.columns.len());
        let mut rows = Vec::with_capacity(index.capacity());
        for (labels, row) in self.index.into_iter().zip(self.rows) {
            for (column, value) in self.columns.iter().zip(row) {
                let mut l = labels.clone();
                l.push(Label::from(column.as_str()));
                index.push(l);
                rows.push(vec![value]);
            }
        }
        Table {
            index_names,
            columns: vec![name.to_string()],
            index,
            rows,
        }
    }
}

/// Build a table from per-channel selections.
///
/// Without a channel axis the whole selection is exported under `name`.
pub fn channel_table(
    name: &str,
    channel_axis: Option<ChannelAxis>,
    channels: Vec<&str>,
    select: impl Fn(Option<&str>) -> SmrtResult<DataArray>,
) -> SmrtResult<Table> {
    let axis = match channel_axis {
        None => return Ok(Table::from_array(&select(None)?, name)),
        Some(axis) => axis,
    };
    if channels.is_empty() {
        return Err(SmrtError::Configuration(
            "No channel information is given in the result. Unable to index the result by channel.".to_string(),
        ));
    }

    let mut table: Option<Table> = None;
    for channel in channels {
        let part = Table::from_array(&select(Some(channel))?, channel);
        table = Some(match table {
            None => part,
            Some(t) => t.inner_join(&part)?,
        });
    }
    let table = table.ok_or_else(|| SmrtError::Configuration("empty channel map".to_string()))?;

    Ok(match axis {
        ChannelAxis::Column => table,
        ChannelAxis::Index => table.stack(name),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    fn theta_array(values: &[(f64, f64)]) -> DataArray {
        let (thetas, data): (Vec<f64>, Vec<f64>) = values.iter().cloned().unzip();
        DataArray::new(
            vec!["theta".into()],
            vec![thetas.into_iter().map(Label::from).collect()],
            Array::from_shape_vec(IxDyn(&[data.len()]), data).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_column_inner_join() {
        let table = channel_table("Tb", Some(ChannelAxis::Column), vec!["a", "b"], |ch| {
            Ok(match ch {
                Some("a") => theta_array(&[(30.0, 1.0), (40.0, 2.0), (50.0, 3.0)]),
                _ => theta_array(&[(40.0, 20.0), (50.0, 30.0)]),
            })
        })
        .unwrap();
        assert_eq!(table.columns, vec!["a", "b"]);
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.get(&[Label::from(50.0)], "b"), Some(30.0));
        assert_eq!(table.column("a"), Some(vec![2.0, 3.0]));
    }

    #[test]
    fn test_index_stack() {
        let table = channel_table("Tb", Some(ChannelAxis::Index), vec!["a", "b"], |_| {
            Ok(DataArray::scalar(7.0))
        })
        .unwrap();
        assert_eq!(table.index_names, vec!["channel"]);
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.get(&[Label::from("b")], "Tb"), Some(7.0));
    }

    #[test]
    fn test_no_channels() {
        let err = channel_table("Tb", Some(ChannelAxis::Column), vec![], |_| Ok(DataArray::scalar(1.0))).unwrap_err();
        assert!(matches!(err, SmrtError::Configuration(_)));
        let table = channel_table("Tb", None, vec![], |_| Ok(DataArray::scalar(1.0))).unwrap();
        assert_eq!(table.rows, vec![vec![1.0]]);
        assert!("row".parse::<ChannelAxis>().is_err());
    }
}

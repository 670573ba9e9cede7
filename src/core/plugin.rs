//! Plugin registry and construction options
//!
//! Scattering theories, solvers, boundaries and microstructures are looked up by
//! exact name in a [`Registry`] populated once at start-up. Construction options
//! are an ordered map of scalar or sequence values; sequence values are
//! broadcast so that one instance is built per index.

use crate::types::{SmrtError, SmrtResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

/// A single construction argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
    Sequence(Vec<ParamValue>),
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Number(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(v: Vec<f64>) -> Self {
        ParamValue::Sequence(v.into_iter().map(ParamValue::Number).collect())
    }
}

impl From<&[f64]> for ParamValue {
    fn from(v: &[f64]) -> Self {
        ParamValue::from(v.to_vec())
    }
}

/// Ordered construction options (keyword arguments)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options(IndexMap<String, ParamValue>);

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion
    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<ParamValue>) {
        self.0.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    /// Merge `other` into `self`, entries of `other` taking precedence
    pub fn update(&mut self, other: &Options) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    /// Numeric parameter, `None` when absent
    pub fn get_f64(&self, name: &str) -> SmrtResult<Option<f64>> {
        match self.0.get(name) {
            None => Ok(None),
            Some(ParamValue::Number(v)) => Ok(Some(*v)),
            Some(other) => Err(SmrtError::Configuration(format!(
                "Parameter {} must be a number, got {:?}",
                name, other
            ))),
        }
    }

    /// Numeric parameter that must be present
    pub fn require_f64(&self, name: &str) -> SmrtResult<f64> {
        self.get_f64(name)?
            .ok_or_else(|| SmrtError::Configuration(format!("Parameter {} must be specified", name)))
    }

    pub fn get_text(&self, name: &str) -> SmrtResult<Option<&str>> {
        match self.0.get(name) {
            None => Ok(None),
            Some(ParamValue::Text(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(SmrtError::Configuration(format!(
                "Parameter {} must be a text value, got {:?}",
                name, other
            ))),
        }
    }

    /// Fail on any key not in `allowed`
    pub fn check_known(&self, owner: &str, allowed: &[&str]) -> SmrtResult<()> {
        for key in self.0.keys() {
            if !allowed.contains(&key.as_str()) {
                return Err(SmrtError::Configuration(format!(
                    "Unknown parameter '{}' for {} (accepted: {:?})",
                    key, owner, allowed
                )));
            }
        }
        Ok(())
    }

    /// Length implied by the sequence-valued arguments, `None` when every argument is scalar.
    ///
    /// All sequences must have the same length.
    pub fn broadcast_len(&self) -> SmrtResult<Option<usize>> {
        let mut n: Option<(usize, &str)> = None;
        for (key, value) in &self.0 {
            if let ParamValue::Sequence(seq) = value {
                match n {
                    None => n = Some((seq.len(), key.as_str())),
                    Some((len, first)) if len != seq.len() => {
                        return Err(SmrtError::ShapeMismatch(format!(
                            "Sequence arguments must have the same length: '{}' has {} elements but '{}' has {}",
                            first,
                            len,
                            key,
                            seq.len()
                        )));
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(n.map(|(len, _)| len))
    }

    /// Options for index `i`: the i-th element of every sequence, scalars unchanged
    pub fn at(&self, i: usize) -> SmrtResult<Options> {
        let mut out = IndexMap::with_capacity(self.0.len());
        for (key, value) in &self.0 {
            let v = match value {
                ParamValue::Sequence(seq) => seq.get(i).cloned().ok_or_else(|| {
                    SmrtError::ShapeMismatch(format!(
                        "Index {} out of range for argument '{}' of length {}",
                        i,
                        key,
                        seq.len()
                    ))
                })?,
                scalar => scalar.clone(),
            };
            out.insert(key.clone(), v);
        }
        Ok(Options(out))
    }

    /// Split the options into one set per index. Returns `None` when nothing is
    /// sequence-valued.
    pub fn broadcast(&self) -> SmrtResult<Option<Vec<Options>>> {
        match self.broadcast_len()? {
            None => Ok(None),
            Some(n) => (0..n).map(|i| self.at(i)).collect::<SmrtResult<Vec<_>>>().map(Some),
        }
    }
}

/// How a plugin is identified by the caller
#[derive(Clone)]
pub enum PluginSpec<C, I = Infallible> {
    /// The registry's documented default
    Default,
    /// Look up by registered name
    Name(String),
    /// A constructor supplied directly
    Constructor(C),
    /// An instance already built by the caller
    Instance(I),
}

impl<C, I> std::fmt::Debug for PluginSpec<C, I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PluginSpec::Default => write!(f, "Default"),
            PluginSpec::Name(name) => write!(f, "Name({:?})", name),
            PluginSpec::Constructor(_) => write!(f, "Constructor(..)"),
            PluginSpec::Instance(_) => write!(f, "Instance(..)"),
        }
    }
}

impl<C, I> From<&str> for PluginSpec<C, I> {
    fn from(name: &str) -> Self {
        PluginSpec::Name(name.to_string())
    }
}

impl<C, I> From<String> for PluginSpec<C, I> {
    fn from(name: String) -> Self {
        PluginSpec::Name(name)
    }
}

/// Outcome of resolving a [`PluginSpec`]
pub enum Resolved<C, I> {
    Constructor(C),
    Instance(I),
}

/// Name → constructor table for one kind of plugin
#[derive(Clone)]
pub struct Registry<C> {
    kind: &'static str,
    default: Option<&'static str>,
    entries: IndexMap<String, C>,
}

impl<C: Clone> Registry<C> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            default: None,
            entries: IndexMap::new(),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn register(&mut self, name: &str, constructor: C) -> &mut Self {
        if self.entries.insert(name.to_string(), constructor).is_some() {
            log::warn!("{} '{}' registered twice, keeping the last one", self.kind, name);
        }
        self
    }

    pub fn set_default(&mut self, name: &'static str) -> &mut Self {
        self.default = Some(name);
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(|k| k.as_str()).collect()
    }

    /// Exact-name lookup
    pub fn get(&self, name: &str) -> SmrtResult<C> {
        self.entries.get(name).cloned().ok_or_else(|| SmrtError::PluginNotFound {
            kind: self.kind.to_string(),
            name: name.to_string(),
        })
    }

    /// Turn a caller-supplied identifier into a constructor or a ready instance
    pub fn resolve<I>(&self, spec: PluginSpec<C, I>) -> SmrtResult<Resolved<C, I>> {
        match spec {
            PluginSpec::Default => match self.default {
                Some(name) => self.get(name).map(Resolved::Constructor),
                None => Err(SmrtError::Configuration(format!(
                    "No default {} is defined, a {} must be given",
                    self.kind, self.kind
                ))),
            },
            PluginSpec::Name(name) if name.trim().is_empty() => Err(SmrtError::Configuration(format!(
                "The {} must be either the name of a registered {}, a constructor or an instance",
                self.kind, self.kind
            ))),
            PluginSpec::Name(name) => self.get(&name).map(Resolved::Constructor),
            PluginSpec::Constructor(c) => Ok(Resolved::Constructor(c)),
            PluginSpec::Instance(i) => Ok(Resolved::Instance(i)),
        }
    }
}

/// Build one instance, or one per index when any option is sequence-valued.
pub fn build_broadcast<T>(
    options: &Options,
    broadcast: bool,
    mut build: impl FnMut(&Options) -> SmrtResult<T>,
) -> SmrtResult<Vec<T>> {
    if broadcast {
        if let Some(per_index) = options.broadcast()? {
            return per_index.iter().map(|o| build(o)).collect();
        }
    }
    Ok(vec![build(options)?])
}

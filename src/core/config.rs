//! JSON model description
//!
//! ```json
//! {
//!   "emmodel": "iba",
//!   "rtsolver": "first_order",
//!   "emmodel_options": {"effective_permittivity_model": "maxwell_garnett"}
//! }
//! ```

use crate::core::model::{EmModelOptions, EmModelSelection, Model};
use crate::core::plugin::{Options, PluginSpec};
use crate::core::registry::{default_registry, PluginRegistry};
use crate::types::{SmrtError, SmrtResult};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::sync::Arc;

/// EM model name, or one name per layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmModelNames {
    One(String),
    PerLayer(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    pub emmodel: EmModelNames,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtsolver: Option<String>,
    #[serde(default)]
    pub emmodel_options: EmModelOptions,
    #[serde(default)]
    pub rtsolver_options: Options,
    /// Set when the legacy key appears, whatever its value (`null` included)
    #[serde(default, skip_serializing, deserialize_with = "key_present")]
    emmodel_kwargs: bool,
    #[serde(default, skip_serializing, deserialize_with = "key_present")]
    rtsolver_kwargs: bool,
}

fn key_present<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    IgnoredAny::deserialize(deserializer)?;
    Ok(true)
}

impl ModelConfig {
    pub fn new(emmodel: &str, rtsolver: &str) -> Self {
        Self {
            emmodel: EmModelNames::One(emmodel.to_string()),
            rtsolver: Some(rtsolver.to_string()),
            emmodel_options: EmModelOptions::default(),
            rtsolver_options: Options::new(),
            emmodel_kwargs: false,
            rtsolver_kwargs: false,
        }
    }

    pub fn from_json(text: &str) -> SmrtResult<Self> {
        let config: ModelConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> SmrtResult<Self> {
        let path = path.as_ref();
        log::debug!("Reading model configuration from {}", path.display());
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn to_json(&self) -> SmrtResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn validate(&self) -> SmrtResult<()> {
        if self.emmodel_kwargs {
            return Err(SmrtError::Deprecated(
                "use emmodel_options instead of emmodel_kwargs".to_string(),
            ));
        }
        if self.rtsolver_kwargs {
            return Err(SmrtError::Deprecated(
                "use rtsolver_options instead of rtsolver_kwargs".to_string(),
            ));
        }
        Ok(())
    }

    pub fn build(&self) -> SmrtResult<Model> {
        self.build_with_registry(default_registry())
    }

    pub fn build_with_registry(&self, registry: Arc<PluginRegistry>) -> SmrtResult<Model> {
        self.validate()?;
        let emmodel = match &self.emmodel {
            EmModelNames::One(name) => EmModelSelection::from(name.as_str()),
            EmModelNames::PerLayer(names) => {
                EmModelSelection::PerLayer(names.iter().map(|n| PluginSpec::Name(n.clone())).collect())
            }
        };
        let rtsolver = match &self.rtsolver {
            Some(name) => PluginSpec::Name(name.clone()),
            None => PluginSpec::Default,
        };
        Ok(Model::with_registry(registry, emmodel, rtsolver)?
            .with_emmodel_options(self.emmodel_options.clone())
            .with_rtsolver_options(self.rtsolver_options.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_build() {
        let config = ModelConfig::from_json(
            r#"{"emmodel": ["iba", "iba"], "emmodel_options": [{}, {"effective_permittivity_model": "maxwell_garnett"}]}"#,
        )
        .unwrap();
        assert_eq!(config.rtsolver, None);
        assert!(matches!(config.emmodel_options, EmModelOptions::PerLayer(ref l) if l.len() == 2));
        let model = config.build().unwrap();
        assert!(format!("{:?}", model).contains("first_order"));
    }

    #[test]
    fn test_legacy_keys_rejected() {
        let err = ModelConfig::from_json(r#"{"emmodel": "iba", "emmodel_kwargs": {}}"#).unwrap_err();
        assert!(matches!(err, SmrtError::Deprecated(_)));
        let err = ModelConfig::from_json(r#"{"emmodel": "iba", "rtsolver_kwargs": {"a": 1}}"#).unwrap_err();
        assert!(matches!(err, SmrtError::Deprecated(_)));

        // an explicit null still names the legacy key
        let err = ModelConfig::from_json(r#"{"emmodel": "iba", "emmodel_kwargs": null}"#).unwrap_err();
        assert!(matches!(err, SmrtError::Deprecated(_)));
        let err = ModelConfig::from_json(r#"{"emmodel": "iba", "rtsolver_kwargs": null}"#).unwrap_err();
        assert!(matches!(err, SmrtError::Deprecated(_)));
    }

    #[test]
    fn test_unknown_key_and_file() {
        let err = ModelConfig::from_json(r#"{"emmodel": "iba", "solver": "x"}"#).unwrap_err();
        assert!(matches!(err, SmrtError::Serialization(_)));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let config = ModelConfig::new("iba", "nonscattering");
        std::fs::write(&path, config.to_json().unwrap()).unwrap();
        assert_eq!(ModelConfig::from_file(&path).unwrap(), config);
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Speed of light in vacuum (m/s)
pub const C_SPEED: f64 = 299_792_458.0;

/// Density of pure ice (kg/m3)
pub const DENSITY_OF_ICE: f64 = 917.0;

/// Freezing point of water (K)
pub const FREEZING_POINT: f64 = 273.15;

/// Sensor mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Radar, backscatter
    #[serde(rename = "A")]
    Active,
    /// Radiometer, brightness temperature
    #[serde(rename = "P")]
    Passive,
}

impl Mode {
    /// Single letter code used in persisted results
    pub fn code(&self) -> char {
        match self {
            Mode::Active => 'A',
            Mode::Passive => 'P',
        }
    }

    pub fn from_code(code: &str) -> Option<Mode> {
        match code {
            "A" => Some(Mode::Active),
            "P" => Some(Mode::Passive),
            _ => None,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Linear polarizations handled by the solvers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarization {
    V,
    H,
}

impl Polarization {
    /// Row/column of this polarization in the (V, H, U) Stokes ordering
    pub fn index(&self) -> usize {
        match self {
            Polarization::V => 0,
            Polarization::H => 1,
        }
    }

    pub fn label(&self) -> Label {
        Label::Text(self.to_string())
    }
}

impl std::fmt::Display for Polarization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Polarization::V => write!(f, "V"),
            Polarization::H => write!(f, "H"),
        }
    }
}

impl std::str::FromStr for Polarization {
    type Err = SmrtError;

    fn from_str(s: &str) -> SmrtResult<Self> {
        match s.trim().to_uppercase().as_str() {
            "V" => Ok(Polarization::V),
            "H" => Ok(Polarization::H),
            _ => Err(SmrtError::Configuration(format!("Invalid polarization: {}", s))),
        }
    }
}

/// Coordinate value along a labeled dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Label {
    Number(f64),
    Text(String),
    Time(DateTime<Utc>),
}

impl Label {
    /// Label equality used by selections. Numbers compare with a relative tolerance
    /// so that values recomputed from degrees or GHz still match.
    pub fn matches(&self, other: &Label) -> bool {
        match (self, other) {
            (Label::Number(a), Label::Number(b)) => {
                approx::relative_eq!(*a, *b, epsilon = 1e-12, max_relative = 1e-9)
            }
            (Label::Text(a), Label::Text(b)) => a == b,
            (Label::Time(a), Label::Time(b)) => a == b,
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Label::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Label::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Number(v) => write!(f, "{}", v),
            Label::Text(s) => write!(f, "{}", s),
            Label::Time(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

impl From<f64> for Label {
    fn from(v: f64) -> Self {
        Label::Number(v)
    }
}

impl From<usize> for Label {
    fn from(v: usize) -> Self {
        Label::Number(v as f64)
    }
}

impl From<i32> for Label {
    fn from(v: i32) -> Self {
        Label::Number(v as f64)
    }
}

impl From<&str> for Label {
    fn from(v: &str) -> Self {
        Label::Text(v.to_string())
    }
}

impl From<String> for Label {
    fn from(v: String) -> Self {
        Label::Text(v)
    }
}

impl From<Polarization> for Label {
    fn from(p: Polarization) -> Self {
        p.label()
    }
}

impl From<DateTime<Utc>> for Label {
    fn from(t: DateTime<Utc>) -> Self {
        Label::Time(t)
    }
}

/// Error types for emission and backscatter simulations
#[derive(Debug, thiserror::Error)]
pub enum SmrtError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Plugin not found: no {kind} named '{name}' is registered")]
    PluginNotFound { kind: String, name: String },

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("No permittivity_model has been given to the substrate '{0}'")]
    MissingPermittivityModel(String),

    #[error("Non-physical permittivity: {0}")]
    NonPhysicalPermittivity(String),

    #[error("The Fourier transform of the autocorrelation function of microstructure '{0}' is not defined")]
    MissingMicrostructureTransform(String),

    #[error("theta and theta_inc must be the same when returning backscatter (theta={theta}, theta_inc={theta_inc})")]
    InconsistentAngle { theta: String, theta_inc: String },

    #[error("Deprecated: {0}")]
    Deprecated(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Selection error: {0}")]
    Selection(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for simulation operations
pub type SmrtResult<T> = Result<T, SmrtError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_matching() {
        assert!(Label::from(37e9).matches(&Label::Number(37.0e9 + 1e-3)));
        assert!(!Label::from(37e9).matches(&Label::Number(19e9)));
        assert!(Label::from("V").matches(&Label::from("V".to_string())));
        assert!(!Label::from("V").matches(&Label::from(1.0)));
    }

    #[test]
    fn test_polarization_parsing() {
        assert_eq!("v".parse::<Polarization>().unwrap(), Polarization::V);
        assert_eq!(" H ".parse::<Polarization>().unwrap(), Polarization::H);
        assert!("X".parse::<Polarization>().is_err());
    }

    #[test]
    fn test_mode_codes() {
        assert_eq!(Mode::from_code("A"), Some(Mode::Active));
        assert_eq!(Mode::from_code("P"), Some(Mode::Passive));
        assert_eq!(Mode::from_code("X"), None);
        assert_eq!(Mode::Passive.to_string(), "P");
    }
}

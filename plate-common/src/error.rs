use thiserror::Error;

/// Validation failures for a [`SimulationConfig`](crate::SimulationConfig).
///
/// Every variant names the offending field using its `section.key` path in the
/// TOML file so the message can be shown to the user unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be a finite number (got {value})")]
    NotFinite { field: &'static str, value: f64 },

    #[error("{field} must be strictly positive (got {value})")]
    NonPositive { field: &'static str, value: f64 },

    #[error("{field} must not be negative (got {value})")]
    Negative { field: &'static str, value: f64 },

    #[error("{field} must lie in (0, 1] (got {value})")]
    NotAFraction { field: &'static str, value: f64 },

    #[error("{field} must be greater than zero")]
    ZeroCount { field: &'static str },

    #[error("{field} = {value} m lies outside the plate (0..={limit} m)")]
    OutsidePlate {
        field: String,
        value: f64,
        limit: f64,
    },

    #[error("{field} = {value} m exceeds the plate extent of {limit} m")]
    ExceedsPlate {
        field: &'static str,
        value: f64,
        limit: f64,
    },

    #[error("could not parse toggle instant '{token}' in {field}")]
    InvalidToggleInstant { field: &'static str, token: String },

    #[error("at least one sensor must be configured")]
    NoSensors,
}

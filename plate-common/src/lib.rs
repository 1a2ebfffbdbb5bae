pub mod calibration;
pub mod config;
pub mod error;
pub mod snapshot;

// Re-export key types for easier use by dependent crates
pub use calibration::{source_input_power, source_power_density};
pub use config::{
    SimulationConfig, PlateConfig, MaterialConfig, BoundaryConfig, TimingConfig, SourceConfig,
    PerturbationConfig, SensorConfig, OutputConfig, ToggleTimes, parse_toggle_instants,
};
pub use error::ConfigError;
pub use snapshot::{FieldSnapshot, SensorHistory, SensorSample, SensorTrace};

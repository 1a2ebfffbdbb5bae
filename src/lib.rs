//! Transient heat conduction on a thin plate with a switchable heat source,
//! a point perturbation, convective losses and fixed thermistors.
//!
//! [`PlateSimulation`] owns the run; callers drive it in batches with
//! [`PlateSimulation::advance_batch`] and read snapshots between batches.

pub mod error;
pub mod grid;
pub mod kernel;
pub mod sim_params;
pub mod simulation;
pub mod thermal_state;
pub mod toggle;

pub use error::{SimResult, SimulationError};
pub use grid::{PlateGrid, MaterialField, SourceFootprint, PerturbationPoint, SensorProbe};
pub use sim_params::SimParams;
pub use simulation::{BatchOutcome, PlateSimulation, RunRecord, RunState, StopHandle};
pub use thermal_state::ControlSignal;
pub use toggle::ToggleSchedule;

// Shared configuration and output types
pub use plate_sim_common::{
    ConfigError, FieldSnapshot, SensorHistory, SensorSample, SensorTrace, SimulationConfig,
};

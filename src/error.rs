use plate_sim_common::ConfigError;
use thiserror::Error;

use crate::simulation::RunState;

/// Failures raised by the engine. Construction errors are fatal: fix the
/// configuration and build a new simulation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("grid of {nx}x{ny} cells is below the 3x3 minimum needed for an interior stencil")]
    NumericalDivergence { nx: usize, ny: usize },

    #[error("cannot {action} while {state:?}")]
    InvalidTransition { action: &'static str, state: RunState },

    #[error("run already completed at step {step}; reset before starting again")]
    AlreadyCompleted { step: u64 },
}

pub type SimResult<T> = Result<T, SimulationError>;

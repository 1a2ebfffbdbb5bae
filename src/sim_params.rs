use plate_sim_common::SimulationConfig;
use serde::{Deserialize, Serialize};

use crate::error::{SimResult, SimulationError};

/// Smallest grid that still has an interior cell.
pub const MIN_GRID_DIM: usize = 3;

/// Simulation parameters derived from the configuration, used on every step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)] // Serialize so the run setup can be saved alongside results
pub struct SimParams {
    // Plate & Grid
    pub lx: f64,
    pub ly: f64,
    pub thickness: f64,
    pub nx: usize,
    pub ny: usize,
    pub dx: f64,
    pub dy: f64, // Always equal to dx

    // Cell geometry
    pub face_area_up_down: f64,    // dx * e, side face exposed on the top/bottom edges
    pub face_area_left_right: f64, // dy * e, side face exposed on the left/right edges
    pub face_area_top: f64,        // dx * dy, one plate face
    pub cell_volume: f64,

    // Material
    pub k: f64,
    pub cp: f64,
    pub rho_nominal: f64,
    pub rho_band: f64,
    pub alpha_nominal: f64,
    pub alpha_band: f64,

    // Boundary
    pub h: f64,
    pub ambient_temperature: f64,
    pub initial_temperature: f64,

    // Time
    pub dt: f64,
    pub duration: f64,
    pub steps_per_frame: u32,
}

impl SimParams {
    /// Validates `config` and derives the grid, cell geometry and stable `dt`.
    pub fn derive(config: &SimulationConfig) -> SimResult<Self> {
        config.validate()?;

        let plate = &config.plate;
        let resolution = config.timing.resolution as usize;

        // --- Grid: resolution applies to the shorter side ---
        let (nx, ny, dx) = if plate.lx < plate.ly {
            let dx = plate.lx / resolution as f64;
            (resolution, to_index(plate.ly / dx), dx)
        } else {
            let dx = plate.ly / resolution as f64;
            (to_index(plate.lx / dx), resolution, dx)
        };
        let dy = dx;
        if nx < MIN_GRID_DIM || ny < MIN_GRID_DIM {
            return Err(SimulationError::NumericalDivergence { nx, ny });
        }

        // --- Material ---
        let material = &config.material;
        let rho_band = material.rho * material.density_reduction;
        let alpha_nominal = material.k / (material.rho * material.cp);
        let alpha_band = material.k / (rho_band * material.cp);

        Ok(SimParams {
            lx: plate.lx,
            ly: plate.ly,
            thickness: plate.thickness,
            nx,
            ny,
            dx,
            dy,
            face_area_up_down: dx * plate.thickness,
            face_area_left_right: dy * plate.thickness,
            face_area_top: dx * dy,
            cell_volume: dx * dy * plate.thickness,
            k: material.k,
            cp: material.cp,
            rho_nominal: material.rho,
            rho_band,
            alpha_nominal,
            alpha_band,
            h: config.boundary.h,
            ambient_temperature: config.boundary.ambient_temperature,
            initial_temperature: config.initial_temperature(),
            dt: stable_time_step(dx, dy, &[alpha_nominal, alpha_band]),
            duration: config.timing.duration,
            steps_per_frame: config.timing.steps_per_frame,
        })
    }

    pub fn num_cells(&self) -> usize {
        self.nx * self.ny
    }

    /// Number of steps after which the run reports completion.
    pub fn total_steps(&self) -> u64 {
        // First step index whose time exceeds the duration.
        let mut steps = (self.duration / self.dt).floor() as u64;
        while steps as f64 * self.dt <= self.duration {
            steps += 1;
        }
        steps
    }
}

/// Explicit-scheme time step: `min(d²/(8·alpha))` over both spacings and
/// every diffusivity present in the field.
pub fn stable_time_step(dx: f64, dy: f64, alphas: &[f64]) -> f64 {
    alphas
        .iter()
        .flat_map(|&alpha| [dx * dx / (8.0 * alpha), dy * dy / (8.0 * alpha)])
        .fold(f64::INFINITY, f64::min)
}

/// Nearest cell index of a continuous coordinate ratio, rounding half to even.
#[inline]
pub fn to_index(ratio: f64) -> usize {
    ratio.round_ties_even().max(0.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn reference_plate_grid() {
        let params = SimParams::derive(&SimulationConfig::reference()).unwrap();
        assert_eq!((params.nx, params.ny), (50, 50));
        assert!((params.dx - 0.002).abs() < 1e-15);
        assert_eq!(params.dx, params.dy);
        assert!((params.cell_volume - 0.002 * 0.002 * 0.001).abs() < 1e-20);
        // Band diffusivity is the larger one, so it sets dt.
        let expected_dt = params.dx * params.dx / (8.0 * params.alpha_band);
        assert_eq!(params.dt, expected_dt);
        assert!(params.alpha_band > params.alpha_nominal);
    }

    #[test]
    fn resolution_applies_to_shorter_side() {
        let mut config = SimulationConfig::reference();
        config.plate.lx = 0.2;
        config.plate.ly = 0.05;
        config.timing.resolution = 10;
        config.source.width = 0.01;
        config.source.height = 0.01;
        config.source.y = 0.025;
        for sensor in &mut config.sensors {
            sensor.y = 0.025;
        }
        config.perturbation.y = 0.01;
        let params = SimParams::derive(&config).unwrap();
        assert_eq!((params.nx, params.ny), (40, 10));
        assert!((params.dx - 0.005).abs() < 1e-15);

        config.plate.lx = 0.05;
        config.plate.ly = 0.2;
        config.source.x = 0.025;
        config.source.y = 0.1;
        for sensor in &mut config.sensors {
            sensor.x = 0.025;
        }
        let params = SimParams::derive(&config).unwrap();
        assert_eq!((params.nx, params.ny), (10, 40));
    }

    #[test]
    fn tiny_grid_is_rejected() {
        let mut config = SimulationConfig::reference();
        config.timing.resolution = 2;
        assert_eq!(
            SimParams::derive(&config),
            Err(SimulationError::NumericalDivergence { nx: 2, ny: 2 })
        );
    }

    #[test]
    fn invalid_config_surfaces_as_config_error() {
        let mut config = SimulationConfig::reference();
        config.material.rho = 0.0;
        assert!(matches!(SimParams::derive(&config), Err(SimulationError::Config(_))));
    }

    #[test]
    fn total_steps_is_first_step_past_duration() {
        let params = SimParams::derive(&SimulationConfig::reference()).unwrap();
        let n = params.total_steps();
        assert!(n as f64 * params.dt > params.duration);
        assert!((n - 1) as f64 * params.dt <= params.duration);
    }

    proptest! {
        #[test]
        fn dt_respects_every_diffusivity(
            k in 1.0_f64..500.0,
            rho in 100.0_f64..20000.0,
            cp in 100.0_f64..5000.0,
            reduction in 0.05_f64..1.0,
            resolution in 3_u32..80,
        ) {
            let mut config = SimulationConfig::reference();
            config.material.k = k;
            config.material.rho = rho;
            config.material.cp = cp;
            config.material.density_reduction = reduction;
            config.timing.resolution = resolution;
            let params = SimParams::derive(&config).unwrap();
            for alpha in [params.alpha_nominal, params.alpha_band] {
                prop_assert!(params.dt <= params.dx * params.dx / (8.0 * alpha));
                prop_assert!(params.dt <= params.dy * params.dy / (8.0 * alpha));
            }
        }
    }
}

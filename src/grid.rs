use std::ops::Range;

use log::debug;
use plate_sim_common::{source_power_density, SimulationConfig};

use crate::sim_params::{to_index, SimParams};

// Row-major index of cell (row, col) in a grid `nx` columns wide
#[inline(always)]
pub fn cell_index(row: usize, col: usize, nx: usize) -> usize {
    row * nx + col
}

/// Nearest cell of a physical position, clamped onto the grid.
#[inline]
pub fn position_to_cell(x: f64, y: f64, params: &SimParams) -> (usize, usize) {
    let row = to_index(y / params.dy).min(params.ny - 1);
    let col = to_index(x / params.dx).min(params.nx - 1);
    (row, col)
}

/// Per-cell density and diffusivity.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialField {
    pub rho: Vec<f64>,
    pub alpha: Vec<f64>,
    /// Rows carrying the reduced-density anomaly.
    pub band_rows: Range<usize>,
}

impl MaterialField {
    /// Uniform plate with a two-row anomaly band through the middle. The band
    /// spans every column except the outer two.
    pub fn with_anomaly_band(params: &SimParams) -> Self {
        let (nx, ny) = (params.nx, params.ny);
        let mut rho = vec![params.rho_nominal; nx * ny];
        let mut alpha = vec![params.alpha_nominal; nx * ny];

        let start = (ny / 2).saturating_sub(1);
        let band_rows = start..(start + 2).min(ny);
        for row in band_rows.clone() {
            for col in 1..nx - 1 {
                let idx = cell_index(row, col, nx);
                rho[idx] = params.rho_band;
                alpha[idx] = params.alpha_band;
            }
        }

        Self { rho, alpha, band_rows }
    }
}

/// Rectangular window heated by the source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFootprint {
    pub rows: Range<usize>,
    pub cols: Range<usize>,
    /// Heated volume `cells · dx · dy · e` [m³].
    pub volume: f64,
    /// Power density deposited in each footprint cell while enabled [W/m³].
    pub power_density: f64,
}

impl SourceFootprint {
    pub fn from_config(config: &SimulationConfig, params: &SimParams) -> Self {
        let source = &config.source;
        let (row, col) = position_to_cell(source.x, source.y, params);
        let half_cols = to_index(source.width / params.dx) / 2;
        let half_rows = to_index(source.height / params.dy) / 2;

        let cols = col.saturating_sub(half_cols)..(col + half_cols + 1).min(params.nx);
        let rows = row.saturating_sub(half_rows)..(row + half_rows + 1).min(params.ny);
        let cells = rows.len() * cols.len();
        let volume = cells as f64 * params.dx * params.dy * params.thickness;

        Self {
            power_density: source_power_density(source.current, source.coupling, volume),
            rows,
            cols,
            volume,
        }
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.rows.contains(&row) && self.cols.contains(&col)
    }
}

/// Single cell heated by the perturbation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerturbationPoint {
    pub row: usize,
    pub col: usize,
    /// `power / (dx · dy · e)` [W/m³].
    pub power_density: f64,
}

/// A thermistor reading one cell.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorProbe {
    pub label: String,
    pub row: usize,
    pub col: usize,
}

/// Everything about the plate that is fixed for the lifetime of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateGrid {
    pub material: MaterialField,
    pub source: SourceFootprint,
    pub perturbation: PerturbationPoint,
    pub sensors: Vec<SensorProbe>,
}

impl PlateGrid {
    /// Builds the per-cell fields. `params` must come from `SimParams::derive`
    /// on the same configuration.
    pub fn build(config: &SimulationConfig, params: &SimParams) -> Self {
        let material = MaterialField::with_anomaly_band(params);
        let source = SourceFootprint::from_config(config, params);

        let pert = &config.perturbation;
        let (row, col) = position_to_cell(pert.x, pert.y, params);
        let perturbation = PerturbationPoint {
            row,
            col,
            power_density: pert.power / params.cell_volume,
        };

        let sensors = config
            .sensors
            .iter()
            .enumerate()
            .map(|(n, s)| {
                let (row, col) = position_to_cell(s.x, s.y, params);
                SensorProbe { label: config.sensor_label(n), row, col }
            })
            .collect();

        debug!(
            "Source footprint rows {:?} cols {:?} ({:.3e} m³, {:.3e} W/m³), perturbation at ({}, {}), anomaly rows {:?}",
            source.rows, source.cols, source.volume, source.power_density, row, col, material.band_rows
        );

        Self { material, source, perturbation, sensors }
    }

    /// Row-major indices of every sensor cell.
    pub fn sensor_indices(&self, nx: usize) -> impl Iterator<Item = usize> + '_ {
        self.sensors.iter().map(move |s| cell_index(s.row, s.col, nx))
    }
}

use log::debug;

use crate::grid::{cell_index, PlateGrid};
use crate::sim_params::SimParams;

/// Requests that change the source/perturbation gates. Scheduled toggles and
/// external callers both go through [`ThermalState::apply_control`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    TogglePower,
    TogglePerturbation,
    SetPower(bool),
    SetPerturbation(bool),
}

/// Holds the temperature field and the per-step heat inputs.
#[derive(Debug)] // Not Clone: large buffers shouldn't be copied casually
pub struct ThermalState {
    // --- Ping-Pong Buffers ---
    /// Field at the current step; read by the kernel.
    pub current: Vec<f64>,
    /// Field at the next step; written by the kernel.
    pub next: Vec<f64>,

    // --- Heat inputs (W/m³), rebuilt from the gates every step ---
    pub source_power: Vec<f64>,
    pub perturbation_power: Vec<f64>,

    pub step_count: u64,
    pub power_enabled: bool,
    pub perturbation_enabled: bool,

    initial_temperature: f64,
}

impl ThermalState {
    /// Allocates every buffer once, filled with the initial temperature.
    pub fn new(params: &SimParams) -> Self {
        let cells = params.num_cells();
        Self {
            current: vec![params.initial_temperature; cells],
            next: vec![params.initial_temperature; cells],
            source_power: vec![0.0; cells],
            perturbation_power: vec![0.0; cells],
            step_count: 0,
            power_enabled: false,
            perturbation_enabled: false,
            initial_temperature: params.initial_temperature,
        }
    }

    /// Swaps the current and next buffers. No data is copied.
    #[inline]
    pub fn swap_buffers(&mut self) {
        std::mem::swap(&mut self.current, &mut self.next);
    }

    /// The single mutation path for both gates.
    pub fn apply_control(&mut self, signal: ControlSignal) {
        match signal {
            ControlSignal::TogglePower => self.power_enabled = !self.power_enabled,
            ControlSignal::TogglePerturbation => self.perturbation_enabled = !self.perturbation_enabled,
            ControlSignal::SetPower(on) => self.power_enabled = on,
            ControlSignal::SetPerturbation(on) => self.perturbation_enabled = on,
        }
        debug!(
            "Step {}: {:?} -> power {}, perturbation {}",
            self.step_count, signal, self.power_enabled, self.perturbation_enabled
        );
    }

    /// Writes the source footprint and perturbation cell according to the
    /// current gates. Only the affected cells are touched.
    pub fn refresh_heat_inputs(&mut self, grid: &PlateGrid, params: &SimParams) {
        let nx = params.nx;
        let source_value = if self.power_enabled { grid.source.power_density } else { 0.0 };
        for row in grid.source.rows.clone() {
            let start = cell_index(row, grid.source.cols.start, nx);
            let end = cell_index(row, grid.source.cols.end, nx);
            self.source_power[start..end].fill(source_value);
        }

        let pert = &grid.perturbation;
        self.perturbation_power[cell_index(pert.row, pert.col, nx)] =
            if self.perturbation_enabled { pert.power_density } else { 0.0 };
    }

    /// Restores the freshly constructed state without reallocating.
    pub fn reset(&mut self) {
        self.current.fill(self.initial_temperature);
        self.next.fill(self.initial_temperature);
        self.source_power.fill(0.0);
        self.perturbation_power.fill(0.0);
        self.step_count = 0;
        self.power_enabled = false;
        self.perturbation_enabled = false;
    }

    /// Reads the current temperature at each row-major index.
    pub fn sample<'a>(&'a self, indices: impl Iterator<Item = usize> + 'a) -> impl Iterator<Item = f64> + 'a {
        indices.map(move |idx| self.current[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plate_sim_common::SimulationConfig;

    fn setup(current: f64) -> (SimParams, PlateGrid, ThermalState) {
        let mut config = SimulationConfig::reference();
        config.source.current = current;
        config.perturbation.power = 0.25;
        let params = SimParams::derive(&config).unwrap();
        let grid = PlateGrid::build(&config, &params);
        let state = ThermalState::new(&params);
        (params, grid, state)
    }

    #[test]
    fn swap_exchanges_buffers_without_copying() {
        let (_, _, mut state) = setup(0.0);
        state.next[7] = 99.0;
        let next_ptr = state.next.as_ptr();
        state.swap_buffers();
        assert_eq!(state.current[7], 99.0);
        assert_eq!(state.current.as_ptr(), next_ptr);
    }

    #[test]
    fn control_signals_share_one_path() {
        let (_, _, mut state) = setup(0.0);
        state.apply_control(ControlSignal::TogglePower);
        assert!(state.power_enabled);
        state.apply_control(ControlSignal::TogglePower);
        assert!(!state.power_enabled);
        state.apply_control(ControlSignal::SetPerturbation(true));
        state.apply_control(ControlSignal::SetPerturbation(true));
        assert!(state.perturbation_enabled);
        state.apply_control(ControlSignal::TogglePerturbation);
        assert!(!state.perturbation_enabled);
    }

    #[test]
    fn heat_inputs_follow_the_gates() {
        let (params, grid, mut state) = setup(2.0);
        let centre = cell_index(25, 25, params.nx);
        let pert = cell_index(grid.perturbation.row, grid.perturbation.col, params.nx);

        state.refresh_heat_inputs(&grid, &params);
        assert!(state.source_power.iter().all(|&p| p == 0.0));
        assert_eq!(state.perturbation_power[pert], 0.0);

        state.apply_control(ControlSignal::SetPower(true));
        state.apply_control(ControlSignal::SetPerturbation(true));
        state.refresh_heat_inputs(&grid, &params);
        assert_eq!(state.source_power[centre], grid.source.power_density);
        let heated = state.source_power.iter().filter(|&&p| p > 0.0).count();
        assert_eq!(heated, grid.source.rows.len() * grid.source.cols.len());
        assert_eq!(state.perturbation_power[pert], grid.perturbation.power_density);

        state.apply_control(ControlSignal::TogglePower);
        state.refresh_heat_inputs(&grid, &params);
        assert!(state.source_power.iter().all(|&p| p == 0.0));
    }

    #[test]
    fn reset_restores_initial_values() {
        let (params, grid, mut state) = setup(2.0);
        state.apply_control(ControlSignal::SetPower(true));
        state.refresh_heat_inputs(&grid, &params);
        state.current[3] = 50.0;
        state.next[4] = 60.0;
        state.step_count = 12;
        state.reset();
        assert!(state.current.iter().chain(&state.next).all(|&t| t == params.initial_temperature));
        assert!(state.source_power.iter().all(|&p| p == 0.0));
        assert_eq!(state.step_count, 0);
        assert!(!state.power_enabled && !state.perturbation_enabled);
    }
}

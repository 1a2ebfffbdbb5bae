use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, trace};
use plate_sim_common::{FieldSnapshot, SensorHistory, SimulationConfig};

use crate::error::{SimResult, SimulationError};
use crate::grid::{cell_index, PlateGrid};
use crate::kernel::{self, HeatInputs};
use crate::sim_params::SimParams;
use crate::thermal_state::{ControlSignal, ThermalState};
use crate::toggle::ToggleSchedule;

/// Lifecycle of a run. `Running` is entered only from `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
}

/// What a call to [`PlateSimulation::advance_batch`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// The simulation was not running; nothing happened.
    Idle,
    /// `steps` kernel steps were applied and the run continues.
    Advanced { steps: u32 },
    /// The configured duration was exceeded. Returned exactly once per run.
    Completed { steps: u32, time: f64 },
    /// A stop requested through a [`StopHandle`] was honoured before the batch.
    Stopped(RunRecord),
}

/// Final field and sensor traces of a run, handed out when it is stopped.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub field: FieldSnapshot,
    pub history: SensorHistory,
}

/// Requests a stop from any thread. The request takes effect at the start of
/// the next batch; a batch already in progress runs to completion.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// Manages the state and execution of the plate simulation.
pub struct PlateSimulation {
    /// The simulation configuration the run was built from.
    config: SimulationConfig,
    /// Derived scalars (grid, geometry, dt).
    params: SimParams,
    /// Per-cell material, source footprint, perturbation and sensors.
    grid: PlateGrid,
    /// Temperature buffers, heat inputs, gates and step counter.
    state: ThermalState,
    /// Scheduled source toggles.
    power_schedule: ToggleSchedule,
    /// Scheduled perturbation toggles.
    perturbation_schedule: ToggleSchedule,
    /// Sensor readings, one sample per step.
    history: SensorHistory,
    run_state: RunState,
    /// Set once the duration has been exceeded; cleared by stop/reset.
    completed: bool,
    stop_request: StopHandle,
}

impl PlateSimulation {
    /// Validates the configuration and builds every buffer for the run.
    pub fn new(config: SimulationConfig) -> SimResult<Self> {
        let params = SimParams::derive(&config)?;
        let grid = PlateGrid::build(&config, &params);
        let state = ThermalState::new(&params);

        let power_schedule = ToggleSchedule::new(&config.source_toggle_instants()?, params.dt);
        let perturbation_schedule =
            ToggleSchedule::new(&config.perturbation_toggle_instants()?, params.dt);
        let history = SensorHistory::new(grid.sensors.iter().map(|s| s.label.clone()));

        info!(
            "Plate {:.3} x {:.3} m -> grid {} x {} (dx = {:.3e} m), dt = {:.3e} s, ~{} steps",
            params.lx, params.ly, params.nx, params.ny, params.dx, params.dt, params.total_steps()
        );
        debug!(
            "Source toggles at steps {:?}, perturbation toggles at steps {:?}",
            power_schedule.steps(),
            perturbation_schedule.steps()
        );

        Ok(Self {
            config,
            params,
            grid,
            state,
            power_schedule,
            perturbation_schedule,
            history,
            run_state: RunState::Idle,
            completed: false,
            stop_request: StopHandle::default(),
        })
    }

    /// Idle -> Running. History accumulated so far is kept.
    pub fn start(&mut self) -> SimResult<()> {
        if self.run_state == RunState::Running {
            return Err(SimulationError::InvalidTransition { action: "start", state: self.run_state });
        }
        if self.completed {
            return Err(SimulationError::AlreadyCompleted { step: self.state.step_count });
        }
        // A stale request from a previous run must not cancel this one.
        self.stop_request.take();
        self.run_state = RunState::Running;
        info!("Simulation started at step {}.", self.state.step_count);
        Ok(())
    }

    /// Performs up to `steps` simulation steps.
    pub fn advance_batch(&mut self, steps: u32) -> BatchOutcome {
        if self.run_state != RunState::Running {
            return BatchOutcome::Idle;
        }
        if self.stop_request.take() {
            info!("Stop requested; halting at step {}.", self.state.step_count);
            return BatchOutcome::Stopped(self.stop());
        }

        for done in 0..steps {
            let step = self.state.step_count;

            // --- 1. Scheduled toggles ---
            if self.power_schedule.should_toggle(step) {
                self.apply_control(ControlSignal::TogglePower);
            }
            if self.perturbation_schedule.should_toggle(step) {
                self.apply_control(ControlSignal::TogglePerturbation);
            }

            // --- 2. Heat inputs from the gates ---
            self.state.refresh_heat_inputs(&self.grid, &self.params);

            // --- 3. Termination ---
            let time = step as f64 * self.params.dt;
            if time > self.params.duration {
                self.record_sensors();
                self.run_state = RunState::Idle;
                self.completed = true;
                info!("Simulation completed at step {} ({:.3} s).", step, time);
                return BatchOutcome::Completed { steps: done, time };
            }

            // --- 4. Kernel, swap, sample ---
            kernel::advance(
                &self.state.current,
                &mut self.state.next,
                &self.grid.material,
                HeatInputs {
                    source: &self.state.source_power,
                    perturbation: &self.state.perturbation_power,
                },
                &self.params,
            );
            self.state.swap_buffers();
            self.state.step_count += 1;
            self.record_sensors();
        }

        trace!("Batch of {} steps done, now at step {}.", steps, self.state.step_count);
        BatchOutcome::Advanced { steps }
    }

    /// Forces the run to Idle and restores the initial state. The last field
    /// and the sensor traces are returned for inspection or export.
    pub fn stop(&mut self) -> RunRecord {
        let record = RunRecord { field: self.snapshot(), history: self.history.clone() };
        self.restore_initial_state();
        record
    }

    /// Same as [`stop`](Self::stop), discarding the record.
    pub fn reset(&mut self) {
        self.restore_initial_state();
    }

    fn restore_initial_state(&mut self) {
        let steps = self.state.step_count;
        self.run_state = RunState::Idle;
        self.completed = false;
        self.state.reset();
        self.history.clear();
        debug!("Simulation reset after {} steps.", steps);
    }

    /// Flips or sets a gate. Used by the schedules and by external callers.
    pub fn apply_control(&mut self, signal: ControlSignal) {
        self.state.apply_control(signal);
    }

    /// Handle that can stop the run from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop_request.clone()
    }

    fn record_sensors(&mut self) {
        let time = self.state.step_count as f64 * self.params.dt;
        let readings = self.state.sample(self.grid.sensor_indices(self.params.nx));
        self.history.record(time, readings);
    }

    /// Copy of the current field.
    pub fn snapshot(&self) -> FieldSnapshot {
        FieldSnapshot::new(
            self.simulated_time(),
            self.state.step_count,
            self.params.nx,
            self.params.ny,
            self.params.dx,
            self.state.current.clone(),
        )
    }

    /// Borrowed view of the current field, row-major.
    pub fn temperature_field(&self) -> &[f64] {
        &self.state.current
    }

    /// Temperature of cell (`row`, `col`).
    pub fn temperature_at(&self, row: usize, col: usize) -> f64 {
        self.state.current[cell_index(row, col, self.params.nx)]
    }

    /// Thermal energy `Σ rho·cp·T·V` over every cell except the outer ring [J].
    pub fn total_energy(&self) -> f64 {
        let p = &self.params;
        (1..p.ny - 1)
            .flat_map(|i| (1..p.nx - 1).map(move |j| cell_index(i, j, p.nx)))
            .map(|idx| self.grid.material.rho[idx] * p.cp * self.state.current[idx] * p.cell_volume)
            .sum()
    }

    pub fn history(&self) -> &SensorHistory {
        &self.history
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn grid(&self) -> &PlateGrid {
        &self.grid
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn step_count(&self) -> u64 {
        self.state.step_count
    }

    pub fn simulated_time(&self) -> f64 {
        self.state.step_count as f64 * self.params.dt
    }

    pub fn power_enabled(&self) -> bool {
        self.state.power_enabled
    }

    pub fn perturbation_enabled(&self) -> bool {
        self.state.perturbation_enabled
    }
}

//! Explicit finite-volume update of the plate temperature.
//!
//! One call advances the field by `dt`. Only cells `1..=ny-2` × `1..=nx-2`
//! are written; the outer ring keeps whatever value it started with.

use rayon::prelude::*;

use crate::grid::MaterialField;
use crate::sim_params::SimParams;

/// Which stencil a cell receives, based on its distance to the outer ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    /// Five-point Laplacian with the scalar conductivity.
    Interior,
    TopEdge,
    BottomEdge,
    LeftEdge,
    RightEdge,
    /// Two inward neighbours and two exposed side faces.
    Corner,
}

/// Classifies an updatable cell. Edge checks take precedence over corners so
/// narrow grids fall through in a fixed order.
#[inline(always)]
pub fn classify(i: usize, j: usize, nx: usize, ny: usize) -> CellKind {
    let inner_col = j > 1 && j < nx - 2;
    let inner_row = i > 1 && i < ny - 2;
    if i == 1 && inner_col {
        CellKind::TopEdge
    } else if i == ny - 2 && inner_col {
        CellKind::BottomEdge
    } else if j == 1 && inner_row {
        CellKind::LeftEdge
    } else if j == nx - 2 && inner_row {
        CellKind::RightEdge
    } else if (i == 1 || i == ny - 2) && (j == 1 || j == nx - 2) {
        CellKind::Corner
    } else {
        CellKind::Interior
    }
}

/// Power fields injected during the step [W/m³].
#[derive(Debug, Clone, Copy)]
pub struct HeatInputs<'a> {
    pub source: &'a [f64],
    pub perturbation: &'a [f64],
}

/// Computes `next` from `current` for one time step.
///
/// Rows are independent, so they are processed in parallel. Every buffer must
/// hold exactly `nx * ny` values; nothing is checked or allocated here.
pub fn advance(
    current: &[f64],
    next: &mut [f64],
    material: &MaterialField,
    heat: HeatInputs<'_>,
    params: &SimParams,
) {
    let nx = params.nx;
    let ny = params.ny;

    next.par_chunks_mut(nx)
        .enumerate()
        .skip(1)
        .take(ny - 2)
        .for_each(|(i, row_out)| {
            for j in 1..nx - 1 {
                row_out[j] = updated_cell(current, material, heat, params, i, j);
            }
        });
}

/// New temperature of cell (`i`, `j`).
#[inline(always)]
fn updated_cell(
    t: &[f64],
    material: &MaterialField,
    heat: HeatInputs<'_>,
    p: &SimParams,
    i: usize,
    j: usize,
) -> f64 {
    let nx = p.nx;
    let idx = i * nx + j;
    let here = t[idx];
    let up = idx - nx; // row i - 1
    let down = idx + nx; // row i + 1

    let dt_rho_cp = p.dt / (material.rho[idx] * p.cp);
    let conv = dt_rho_cp * p.h / p.cell_volume; // per unit exposed area
    let diff = p.dt * material.alpha[idx] / (p.dx * p.dy);
    let exposed = p.ambient_temperature - here;

    let mut value = here;
    match classify(i, j, nx, p.ny) {
        CellKind::TopEdge => {
            value += diff * (t[down] + t[idx + 1] + t[idx - 1] - 3.0 * here);
            value += conv * exposed * p.face_area_up_down;
        }
        CellKind::BottomEdge => {
            value += diff * (t[up] + t[idx + 1] + t[idx - 1] - 3.0 * here);
            value += conv * exposed * p.face_area_up_down;
        }
        CellKind::LeftEdge => {
            value += diff * (t[down] + t[up] + t[idx + 1] - 3.0 * here);
            value += conv * exposed * p.face_area_left_right;
        }
        CellKind::RightEdge => {
            value += diff * (t[down] + t[up] + t[idx - 1] - 3.0 * here);
            value += conv * exposed * p.face_area_left_right;
        }
        CellKind::Corner => {
            let vertical = if i == 1 { t[down] } else { t[up] };
            let horizontal = if j == 1 { t[idx + 1] } else { t[idx - 1] };
            value += diff * (vertical + horizontal - 2.0 * here);
            value += 2.0 * conv * exposed * p.face_area_up_down;
        }
        CellKind::Interior => {
            value += dt_rho_cp * p.k * (t[down] + t[up] + t[idx + 1] + t[idx - 1] - 4.0 * here)
                / (p.dx * p.dy);
        }
    }

    // Heat injection, then loss through both plate faces
    value += dt_rho_cp * (heat.source[idx] + heat.perturbation[idx]);
    value += conv * exposed * 2.0 * p.face_area_top;
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{cell_index, MaterialField};
    use plate_sim_common::SimulationConfig;

    fn small_plate(resolution: u32, h: f64) -> SimParams {
        let mut config = SimulationConfig::reference();
        config.timing.resolution = resolution;
        config.boundary.h = h;
        SimParams::derive(&config).unwrap()
    }

    fn energy(t: &[f64], material: &MaterialField, p: &SimParams) -> f64 {
        let mut total = 0.0;
        for i in 1..p.ny - 1 {
            for j in 1..p.nx - 1 {
                let idx = cell_index(i, j, p.nx);
                total += material.rho[idx] * p.cp * t[idx] * p.cell_volume;
            }
        }
        total
    }

    #[test]
    fn classification_of_a_six_by_five_grid() {
        let (nx, ny) = (6, 5);
        assert_eq!(classify(1, 1, nx, ny), CellKind::Corner);
        assert_eq!(classify(1, 4, nx, ny), CellKind::Corner);
        assert_eq!(classify(3, 1, nx, ny), CellKind::Corner);
        assert_eq!(classify(3, 4, nx, ny), CellKind::Corner);
        assert_eq!(classify(1, 2, nx, ny), CellKind::TopEdge);
        assert_eq!(classify(3, 3, nx, ny), CellKind::BottomEdge);
        assert_eq!(classify(2, 1, nx, ny), CellKind::LeftEdge);
        assert_eq!(classify(2, 4, nx, ny), CellKind::RightEdge);
        assert_eq!(classify(2, 2, nx, ny), CellKind::Interior);
        assert_eq!(classify(2, 3, nx, ny), CellKind::Interior);
    }

    #[test]
    fn single_interior_cell_of_minimum_grid_is_a_corner() {
        assert_eq!(classify(1, 1, 3, 3), CellKind::Corner);
    }

    #[test]
    fn minimum_grid_steps_with_doubled_side_convection() {
        let p = small_plate(3, 5.0);
        assert_eq!((p.nx, p.ny), (3, 3));
        let material = MaterialField::with_anomaly_band(&p);
        let zeros = vec![0.0; 9];
        let mut current = vec![p.ambient_temperature; 9];
        current[4] = 40.0;
        let mut next = current.clone();
        advance(&current, &mut next, &material, HeatInputs { source: &zeros, perturbation: &zeros }, &p);

        let rho = material.rho[4];
        let c = p.dt / (rho * p.cp);
        let conv = c * p.h / p.cell_volume;
        let diff = p.dt * material.alpha[4] / (p.dx * p.dy);
        let amb = p.ambient_temperature;
        let expected = 40.0
            + diff * (amb + amb - 2.0 * 40.0)
            + 2.0 * conv * (amb - 40.0) * p.face_area_up_down
            + conv * (amb - 40.0) * 2.0 * p.face_area_top;
        assert!((next[4] - expected).abs() < 1e-12);
        assert!(next[4] < 40.0);
        // Ring untouched
        for idx in [0, 1, 2, 3, 5, 6, 7, 8] {
            assert_eq!(next[idx], amb);
        }
    }

    #[test]
    fn edge_cells_lose_heat_through_one_side_face() {
        let p = small_plate(12, 50.0);
        let material = MaterialField::with_anomaly_band(&p);
        let zeros = vec![0.0; p.num_cells()];
        let amb = p.ambient_temperature;

        let top = cell_index(1, 4, p.nx);
        let left = cell_index(5, 1, p.nx);
        assert_eq!(classify(1, 4, p.nx, p.ny), CellKind::TopEdge);
        assert_eq!(classify(5, 1, p.nx, p.ny), CellKind::LeftEdge);
        assert_eq!(material.rho[top], p.rho_nominal);
        assert_eq!(material.rho[left], p.rho_band);

        let mut current = vec![amb; p.num_cells()];
        current[top] = 60.0;
        current[left] = 70.0;
        let mut next = current.clone();
        advance(&current, &mut next, &material, HeatInputs { source: &zeros, perturbation: &zeros }, &p);

        let expected = |idx: usize, hot: f64, side_face: f64| {
            let c = p.dt / (material.rho[idx] * p.cp);
            let conv = c * p.h / p.cell_volume;
            let diff = p.dt * material.alpha[idx] / (p.dx * p.dy);
            hot + diff * (3.0 * amb - 3.0 * hot)
                + conv * (amb - hot) * side_face
                + conv * (amb - hot) * 2.0 * p.face_area_top
        };
        assert!((next[top] - expected(top, 60.0, p.face_area_up_down)).abs() < 1e-12);
        assert!((next[left] - expected(left, 70.0, p.face_area_left_right)).abs() < 1e-12);

        // The side face alone must account for a measurable share of the loss.
        let without_side = |idx: usize, hot: f64| expected(idx, hot, 0.0);
        assert!(without_side(top, 60.0) - next[top] > 1e-9);
        assert!(without_side(left, 70.0) - next[left] > 1e-9);
    }

    #[test]
    fn uniform_ambient_field_is_steady() {
        let p = small_plate(12, 5.0);
        let material = MaterialField::with_anomaly_band(&p);
        let zeros = vec![0.0; p.num_cells()];
        let current = vec![p.ambient_temperature; p.num_cells()];
        let mut next = vec![-1.0; p.num_cells()];
        advance(&current, &mut next, &material, HeatInputs { source: &zeros, perturbation: &zeros }, &p);
        for i in 1..p.ny - 1 {
            for j in 1..p.nx - 1 {
                assert!((next[cell_index(i, j, p.nx)] - p.ambient_temperature).abs() < 1e-12);
            }
        }
        // The ring of `next` is never written.
        assert_eq!(next[0], -1.0);
        assert_eq!(next[p.num_cells() - 1], -1.0);
    }

    #[test]
    fn injected_power_raises_only_heated_cells() {
        let p = small_plate(10, 0.0);
        let material = MaterialField::with_anomaly_band(&p);
        let zeros = vec![0.0; p.num_cells()];
        let mut source = zeros.clone();
        let hot = cell_index(4, 4, p.nx);
        source[hot] = 1.0e7;
        let current = vec![p.ambient_temperature; p.num_cells()];
        let mut next = current.clone();
        advance(&current, &mut next, &material, HeatInputs { source: &source, perturbation: &zeros }, &p);

        let expected_rise = p.dt / (material.rho[hot] * p.cp) * 1.0e7;
        assert!((next[hot] - p.ambient_temperature - expected_rise).abs() < 1e-12);
        assert_eq!(next[cell_index(4, 5, p.nx)], p.ambient_temperature);
    }

    #[test]
    fn conduction_alone_conserves_energy() {
        let p = small_plate(16, 0.0);
        let material = MaterialField::with_anomaly_band(&p);
        let zeros = vec![0.0; p.num_cells()];
        let heat = HeatInputs { source: &zeros, perturbation: &zeros };

        let mut current = vec![p.ambient_temperature; p.num_cells()];
        // A hot blob straddling the anomaly band and touching an edge cell.
        for i in 3..10 {
            for j in 1..6 {
                current[cell_index(i, j, p.nx)] = 80.0 + (i * j) as f64;
            }
        }
        let mut next = current.clone();
        let e0 = energy(&current, &material, &p);
        let mut previous = e0;
        for _ in 0..200 {
            advance(&current, &mut next, &material, heat, &p);
            std::mem::swap(&mut current, &mut next);
            let e = energy(&current, &material, &p);
            assert!(e <= previous + 1e-9 * e0.abs());
            previous = e;
        }
        assert!((previous - e0).abs() <= 1e-9 * e0.abs());
    }
}

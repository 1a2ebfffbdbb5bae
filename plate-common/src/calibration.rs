//! Bench calibration of the thermoelectric heat source.

/// Quadratic coefficient of the current-to-power fit [W/A²].
pub const POWER_FIT_QUADRATIC: f64 = 0.3123;
/// Linear coefficient of the current-to-power fit [W/A].
pub const POWER_FIT_LINEAR: f64 = 1.0217;

/// Electrical power drawn by the source at `current` amperes, in watts.
///
/// `P_in = 0.3123·I² + 1.0217·I`
pub fn source_input_power(current: f64) -> f64 {
    POWER_FIT_QUADRATIC * (current * current) + POWER_FIT_LINEAR * current
}

/// Volumetric power density deposited in the source footprint [W/m³].
pub fn source_power_density(current: f64, coupling: f64, footprint_volume: f64) -> f64 {
    (coupling * source_input_power(current)) / footprint_volume
}

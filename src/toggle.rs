/// Converts scheduled toggle instants into step indices for a fixed `dt`.
///
/// An instant `t` fires at step `round(t / dt)`. Several instants rounding to
/// the same step collapse into a single toggle.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ToggleSchedule {
    steps: Vec<u64>,
}

impl ToggleSchedule {
    pub fn new(instants: &[f64], dt: f64) -> Self {
        let mut steps: Vec<u64> = instants.iter().map(|&t| instant_to_step(t, dt)).collect();
        steps.sort_unstable();
        steps.dedup();
        Self { steps }
    }

    /// Returns true iff `step` is one of the scheduled indices.
    #[inline]
    pub fn should_toggle(&self, step: u64) -> bool {
        self.steps.iter().any(|&s| s == step)
    }

    /// Scheduled step indices, ascending.
    pub fn steps(&self) -> &[u64] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Step index of a continuous instant, rounding half to even.
pub fn instant_to_step(t: f64, dt: f64) -> u64 {
    (t / dt).round_ties_even().max(0.0) as u64
}

use serde::{Serialize, Deserialize};

/// A read-only copy of the temperature field at a specific time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)] // Derive traits for easy saving/loading
pub struct FieldSnapshot {
    /// The simulated time (in seconds) at which the snapshot was taken.
    pub time: f64,
    /// Number of completed simulation steps.
    pub step: u64,
    /// Grid columns (x direction).
    pub nx: usize,
    /// Grid rows (y direction).
    pub ny: usize,
    /// Cell spacing in meters (`dx == dy`).
    pub dx: f64,
    /// Row-major temperatures in °C; row `i` holds `y = i·dx`.
    pub temperatures: Vec<f64>,
    /// Coldest and hottest cell, used to scale a colour map.
    pub min: f64,
    pub max: f64,
}

impl FieldSnapshot {
    pub fn new(time: f64, step: u64, nx: usize, ny: usize, dx: f64, temperatures: Vec<f64>) -> Self {
        let (min, max) = temperatures
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &t| (lo.min(t), hi.max(t)));
        FieldSnapshot { time, step, nx, ny, dx, temperatures, min, max }
    }

    /// Temperature of the cell at `row`, `col`.
    pub fn at(&self, row: usize, col: usize) -> f64 {
        self.temperatures[row * self.nx + col]
    }
}

/// One reading of a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    pub time: f64,
    pub temperature: f64,
}

/// Ordered readings of one sensor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorTrace {
    pub label: String,
    pub samples: Vec<SensorSample>,
}

/// Readings of every sensor, appended in lock-step.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorHistory {
    pub traces: Vec<SensorTrace>,
}

impl SensorHistory {
    pub fn new(labels: impl IntoIterator<Item = String>) -> Self {
        SensorHistory {
            traces: labels
                .into_iter()
                .map(|label| SensorTrace { label, samples: Vec::new() })
                .collect(),
        }
    }

    /// Appends one reading per sensor, in sensor order.
    pub fn record(&mut self, time: f64, temperatures: impl IntoIterator<Item = f64>) {
        for (trace, temperature) in self.traces.iter_mut().zip(temperatures) {
            trace.samples.push(SensorSample { time, temperature });
        }
    }

    /// Drops every sample but keeps the sensor labels.
    pub fn clear(&mut self) {
        self.traces.iter_mut().for_each(|t| t.samples.clear());
    }

    /// Number of samples per sensor.
    pub fn len(&self) -> usize {
        self.traces.first().map_or(0, |t| t.samples.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.traces.iter().map(|t| t.label.as_str())
    }

    /// Rows of `(time, [temperature per sensor])`, ready for tabular export.
    pub fn rows(&self) -> impl Iterator<Item = (f64, Vec<f64>)> + '_ {
        (0..self.len()).map(move |n| {
            let time = self.traces[0].samples[n].time;
            let temps = self.traces.iter().map(|t| t.samples[n].temperature).collect();
            (time, temps)
        })
    }
}

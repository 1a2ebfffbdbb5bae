use serde::{Deserialize, Serialize};
use anyhow::{Context, Result};
use crate::error::ConfigError;
use std::path::Path;

// Physical extent of the plate, in meters
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct PlateConfig {
    pub lx: f64,
    pub ly: f64,
    pub thickness: f64,
}

// Bulk material properties, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct MaterialConfig {
    /// Thermal conductivity [W/(m·K)].
    pub k: f64,
    /// Nominal density [kg/m³].
    pub rho: f64,
    /// Specific heat [J/(kg·K)].
    pub cp: f64,
    /// Multiplier applied to `rho` inside the anomaly band.
    #[serde(default = "default_density_reduction")]
    pub density_reduction: f64,
}

// Convective exchange with the surrounding air
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct BoundaryConfig {
    /// Convection coefficient [W/(m²·K)].
    pub h: f64,
    /// Temperature of the surrounding air [°C].
    pub ambient_temperature: f64,
    /// Uniform starting temperature of the plate [°C]. Defaults to ambient.
    #[serde(default)]
    pub initial_temperature: Option<f64>,
}

// Discretization and run length
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct TimingConfig {
    /// Number of cells along the shorter side of the plate.
    pub resolution: u32,
    /// Simulation steps performed per external frame.
    pub steps_per_frame: u32,
    /// Total simulated duration [s].
    pub duration: f64,
    /// Wall-clock spacing between frames when a caller paces the run.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
}

/// Toggle instants, either as a TOML array or as a comma-separated string
/// (`"0, 12.5, 30"`).
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ToggleTimes {
    List(Vec<f64>),
    Text(String),
}

impl Default for ToggleTimes {
    fn default() -> Self {
        ToggleTimes::List(Vec::new())
    }
}

impl ToggleTimes {
    /// Resolves the instants in seconds, in the order they were written.
    pub fn instants(&self, field: &'static str) -> Result<Vec<f64>, ConfigError> {
        let instants = match self {
            ToggleTimes::List(values) => values.clone(),
            ToggleTimes::Text(text) => parse_toggle_instants(text, field)?,
        };
        for &t in &instants {
            if !t.is_finite() {
                return Err(ConfigError::NotFinite { field, value: t });
            }
            if t < 0.0 {
                return Err(ConfigError::Negative { field, value: t });
            }
        }
        Ok(instants)
    }
}

/// Parses a comma-separated list of seconds. Blank entries are ignored so that
/// an empty string means "never toggle".
pub fn parse_toggle_instants(text: &str, field: &'static str) -> Result<Vec<f64>, ConfigError> {
    text.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            token.parse::<f64>().map_err(|_| ConfigError::InvalidToggleInstant {
                field,
                token: token.to_string(),
            })
        })
        .collect()
}

// Thermoelectric heat source driven by a current
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SourceConfig {
    /// Center of the source footprint [m].
    pub x: f64,
    pub y: f64,
    /// Footprint size [m].
    pub width: f64,
    pub height: f64,
    /// Drive current [A].
    pub current: f64,
    /// Fraction of the electrical input that reaches the plate.
    #[serde(default = "default_coupling")]
    pub coupling: f64,
    #[serde(default)]
    pub toggle_times: ToggleTimes,
}

// Single-cell perturbation
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct PerturbationConfig {
    /// Power delivered to the perturbation cell when enabled [W].
    pub power: f64,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub toggle_times: ToggleTimes,
}

// Thermistor position
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SensorConfig {
    #[serde(default)]
    pub label: Option<String>,
    pub x: f64,
    pub y: f64,
}

// Configuration for output settings, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct OutputConfig {
    #[serde(default = "default_base_filename")]
    pub base_filename: String,
    #[serde(default = "default_true")]
    pub save_history: bool,
    #[serde(default = "default_true")]
    pub save_field: bool,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            base_filename: default_base_filename(),
            save_history: true,
            save_field: true,
            format: None,
        }
    }
}

// Main simulation configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub plate: PlateConfig,
    pub material: MaterialConfig,
    pub boundary: BoundaryConfig,
    pub timing: TimingConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub perturbation: PerturbationConfig,
    pub sensors: Vec<SensorConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

impl SimulationConfig {
    /// Loads the simulation configuration from a TOML file and validates it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .with_context(|| format!("Failed to read config file '{}'", path_ref.display()))?;
        Self::from_toml_str(&config_str)
            .with_context(|| format!("Invalid configuration in '{}'", path_ref.display()))
    }

    /// Parses and validates a configuration held in memory.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(config_str)
            .context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every physical and geometric parameter, reporting the first
    /// offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let plate = &self.plate;
        positive("plate.lx", plate.lx)?;
        positive("plate.ly", plate.ly)?;
        positive("plate.thickness", plate.thickness)?;

        let material = &self.material;
        positive("material.k", material.k)?;
        positive("material.rho", material.rho)?;
        positive("material.cp", material.cp)?;
        finite("material.density_reduction", material.density_reduction)?;
        if material.density_reduction <= 0.0 || material.density_reduction > 1.0 {
            return Err(ConfigError::NotAFraction {
                field: "material.density_reduction",
                value: material.density_reduction,
            });
        }

        non_negative("boundary.h", self.boundary.h)?;
        finite("boundary.ambient_temperature", self.boundary.ambient_temperature)?;
        if let Some(initial) = self.boundary.initial_temperature {
            finite("boundary.initial_temperature", initial)?;
        }

        if self.timing.resolution == 0 {
            return Err(ConfigError::ZeroCount { field: "timing.resolution" });
        }
        if self.timing.steps_per_frame == 0 {
            return Err(ConfigError::ZeroCount { field: "timing.steps_per_frame" });
        }
        positive("timing.duration", self.timing.duration)?;

        // --- Source ---
        let source = &self.source;
        self.within_plate("source.x", source.x, plate.lx)?;
        self.within_plate("source.y", source.y, plate.ly)?;
        positive("source.width", source.width)?;
        positive("source.height", source.height)?;
        if source.width > plate.lx {
            return Err(ConfigError::ExceedsPlate { field: "source.width", value: source.width, limit: plate.lx });
        }
        if source.height > plate.ly {
            return Err(ConfigError::ExceedsPlate { field: "source.height", value: source.height, limit: plate.ly });
        }
        finite("source.current", source.current)?;
        non_negative("source.coupling", source.coupling)?;
        source.toggle_times.instants("source.toggle_times")?;

        // --- Perturbation ---
        let perturbation = &self.perturbation;
        finite("perturbation.power", perturbation.power)?;
        self.within_plate("perturbation.x", perturbation.x, plate.lx)?;
        self.within_plate("perturbation.y", perturbation.y, plate.ly)?;
        perturbation.toggle_times.instants("perturbation.toggle_times")?;

        // --- Sensors ---
        if self.sensors.is_empty() {
            return Err(ConfigError::NoSensors);
        }
        for (n, sensor) in self.sensors.iter().enumerate() {
            self.within_plate(format!("sensors[{}].x", n), sensor.x, plate.lx)?;
            self.within_plate(format!("sensors[{}].y", n), sensor.y, plate.ly)?;
        }

        Ok(())
    }

    fn within_plate(&self, field: impl Into<String>, value: f64, limit: f64) -> Result<(), ConfigError> {
        if !value.is_finite() || value < 0.0 || value > limit {
            return Err(ConfigError::OutsidePlate { field: field.into(), value, limit });
        }
        Ok(())
    }

    /// Starting temperature of every cell.
    pub fn initial_temperature(&self) -> f64 {
        self.boundary.initial_temperature.unwrap_or(self.boundary.ambient_temperature)
    }

    /// Source toggle instants in seconds.
    pub fn source_toggle_instants(&self) -> Result<Vec<f64>, ConfigError> {
        self.source.toggle_times.instants("source.toggle_times")
    }

    /// Perturbation toggle instants in seconds.
    pub fn perturbation_toggle_instants(&self) -> Result<Vec<f64>, ConfigError> {
        self.perturbation.toggle_times.instants("perturbation.toggle_times")
    }

    /// Display label of sensor `n`, falling back to `T{n+1}`.
    pub fn sensor_label(&self, n: usize) -> String {
        self.sensors
            .get(n)
            .and_then(|s| s.label.clone())
            .unwrap_or_else(|| format!("T{}", n + 1))
    }

    /// Reference aluminium plate: 10 cm square, 50 cells per side, centered
    /// source covering 10% of the area, three sensors on the horizontal axis.
    pub fn reference() -> Self {
        let side = 0.1;
        let source_side = side * 0.1f64.sqrt();
        SimulationConfig {
            plate: PlateConfig { lx: side, ly: side, thickness: 0.001 },
            material: MaterialConfig {
                k: 200.0,
                rho: 2700.0,
                cp: 900.0,
                density_reduction: default_density_reduction(),
            },
            boundary: BoundaryConfig {
                h: 5.0,
                ambient_temperature: 23.0,
                initial_temperature: None,
            },
            timing: TimingConfig {
                resolution: 50,
                steps_per_frame: 100,
                duration: 1.0,
                frame_interval_ms: default_frame_interval_ms(),
            },
            source: SourceConfig {
                x: side / 2.0,
                y: side / 2.0,
                width: source_side,
                height: source_side,
                current: 0.0,
                coupling: default_coupling(),
                toggle_times: ToggleTimes::default(),
            },
            perturbation: PerturbationConfig {
                power: 0.0,
                x: 0.024,
                y: 0.024,
                toggle_times: ToggleTimes::default(),
            },
            sensors: vec![
                SensorConfig { label: None, x: 0.02, y: side / 2.0 },
                SensorConfig { label: None, x: side / 2.0, y: side / 2.0 },
                SensorConfig { label: None, x: 0.08, y: side / 2.0 },
            ],
            output: OutputConfig::default(),
        }
    }
}

fn finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotFinite { field, value })
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value <= 0.0 {
        return Err(ConfigError::NonPositive { field, value });
    }
    Ok(())
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value < 0.0 {
        return Err(ConfigError::Negative { field, value });
    }
    Ok(())
}

// Default functions for optional fields
fn default_density_reduction() -> f64 {
    0.70
}

fn default_coupling() -> f64 {
    1.0
}

fn default_frame_interval_ms() -> u64 {
    200
}

fn default_base_filename() -> String {
    "plate_run".to_string()
}

fn default_true() -> bool {
    true
}

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info, trace, warn};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use plate_sim_engine::{
    BatchOutcome, FieldSnapshot, PlateSimulation, RunRecord, SensorHistory, SimulationConfig,
};

/// Headless driver: runs a plate simulation to completion and saves the
/// thermistor traces and the final temperature field.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the TOML configuration.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Pace batches at `timing.frame_interval_ms` like an interactive display.
    #[arg(long)]
    realtime: bool,

    /// Stop after this many frames even if the run has not completed.
    #[arg(long)]
    max_frames: Option<u64>,
}

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();
    let args = Args::parse();

    info!("Starting Plate Simulation Engine...");

    // --- Load Configuration ---
    let config = SimulationConfig::load(&args.config)?;
    info!("Using {} Rayon threads.", rayon::current_num_threads());

    // --- Initialize Simulation ---
    let mut sim = PlateSimulation::new(config)?;
    debug!("Simulation Parameters: {:#?}", sim.params());
    for probe in &sim.grid().sensors {
        let placement = if sim.grid().source.contains(probe.row, probe.col) {
            "under the source"
        } else {
            "outside the source"
        };
        info!("Sensor {} at cell ({}, {}), {}.", probe.label, probe.row, probe.col, placement);
    }

    let steps_per_frame = sim.params().steps_per_frame;
    let frame_interval = Duration::from_millis(sim.config().timing.frame_interval_ms);
    let total_steps = sim.params().total_steps();

    // --- Simulation Loop ---
    sim.start()?;
    let start_time = Instant::now();
    let mut previous_print_time = start_time;
    let mut frame: u64 = 0;

    let record = loop {
        let frame_start = Instant::now();
        let outcome = sim.advance_batch(steps_per_frame);
        frame += 1;

        match outcome {
            BatchOutcome::Completed { time, .. } => {
                info!("Run completed at t = {:.3} s after {} frames.", time, frame);
                break sim.stop();
            }
            BatchOutcome::Stopped(record) => break record,
            BatchOutcome::Idle => anyhow::bail!("Simulation left the running state unexpectedly."),
            BatchOutcome::Advanced { .. } => {}
        }

        if args.max_frames.is_some_and(|max| frame >= max) {
            warn!("Frame limit of {} reached before completion; stopping early.", frame);
            break sim.stop();
        }

        // Print status periodically
        let now = Instant::now();
        if now.duration_since(previous_print_time).as_secs_f64() >= 5.0 {
            let snapshot = sim.snapshot();
            info!(
                "Step [{}/{}] ({:.2} s) | T range {:.2}..{:.2} °C | Elapsed: {:.2} s",
                sim.step_count(),
                total_steps,
                sim.simulated_time(),
                snapshot.min,
                snapshot.max,
                start_time.elapsed().as_secs_f64()
            );
            previous_print_time = now;
        } else {
            trace!("Frame {} computed in {:.2} ms", frame, frame_start.elapsed().as_secs_f64() * 1000.0);
        }

        if args.realtime {
            if let Some(remaining) = frame_interval.checked_sub(frame_start.elapsed()) {
                std::thread::sleep(remaining);
            }
        }
    };

    info!(
        "Simulation finished in {:.3} seconds ({} samples per sensor).",
        start_time.elapsed().as_secs_f64(),
        record.history.len()
    );
    for probe in &sim.grid().sensors {
        info!("Final {} = {:.2} °C", probe.label, record.field.at(probe.row, probe.col));
    }

    // --- Save Recorded Data ---
    save_outputs(sim.config(), &record)?;

    info!("Simulation Complete.");
    Ok(())
}

fn save_outputs(config: &SimulationConfig, record: &RunRecord) -> Result<()> {
    let output = &config.output;

    if output.save_history {
        let filename = format!("{}_sensors.csv", output.base_filename);
        write_history_csv(&filename, &record.history)?;
        info!("Sensor traces saved to {}", filename);
    } else {
        info!("Skipping sensor traces as per config (save_history is false).");
    }

    if output.save_field {
        let format = output.format.as_deref().unwrap_or("json");
        write_field(&output.base_filename, format, &record.field)?;
    } else {
        info!("Skipping final field as per config (save_field is false).");
    }
    Ok(())
}

/// Writes `time_s,<label>,...` followed by one row per sample.
fn write_history_csv(filename: &str, history: &SensorHistory) -> Result<()> {
    let writer = csv::Writer::from_path(filename)
        .with_context(|| format!("Error creating CSV file '{}'", filename))?;
    write_history(writer, history)
}

/// Time keeps full precision since `dt` can drop below the temperature rounding.
fn write_history<W: Write>(mut writer: csv::Writer<W>, history: &SensorHistory) -> Result<()> {

    let mut header = vec!["time_s".to_string()];
    header.extend(history.labels().map(str::to_string));
    writer.write_record(&header)?;

    for (time, temperatures) in history.rows() {
        let mut row = Vec::with_capacity(temperatures.len() + 1);
        row.push(time.to_string());
        row.extend(temperatures.iter().map(|t| format!("{:.4}", t)));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_field(base_filename: &str, format: &str, field: &FieldSnapshot) -> Result<()> {
    match format {
        "json" => write_field_json(base_filename, field),
        "bincode" => {
            // Binary format (much more compact)
            let filename = format!("{}_field.bin", base_filename);
            let file = File::create(&filename)
                .with_context(|| format!("Error creating field file '{}'", filename))?;
            bincode::serialize_into(BufWriter::new(file), field)
                .context("Error serializing field to bincode")?;
            info!("Final field saved to {} (binary format)", filename);
            Ok(())
        }
        "messagepack" => {
            // MessagePack format (compact and cross-platform)
            let filename = format!("{}_field.msgpack", base_filename);
            let mut file = BufWriter::new(
                File::create(&filename)
                    .with_context(|| format!("Error creating field file '{}'", filename))?,
            );
            rmp_serde::encode::write(&mut file, field)
                .context("Error serializing field to MessagePack")?;
            file.flush()?;
            info!("Final field saved to {} (MessagePack format)", filename);
            Ok(())
        }
        other => {
            error!("Unknown output format: {}. Using JSON instead.", other);
            write_field_json(base_filename, field)
        }
    }
}

fn write_field_json(base_filename: &str, field: &FieldSnapshot) -> Result<()> {
    let filename = format!("{}_field.json", base_filename);
    let json_string = serde_json::to_string(field).context("Error serializing field to JSON")?;
    let mut file = File::create(&filename)
        .with_context(|| format!("Error creating field file '{}'", filename))?;
    file.write_all(json_string.as_bytes())
        .with_context(|| format!("Error writing field JSON to '{}'", filename))?;
    info!("Final field saved to {} ({} KB)", filename, json_string.len() / 1024);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_text(history: &SensorHistory) -> String {
        let mut buffer = Vec::new();
        write_history(csv::Writer::from_writer(&mut buffer), history).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn fine_time_steps_stay_distinct_in_csv() {
        let mut history = SensorHistory::new(["T1".to_string(), "T2".to_string()]);
        let dt = 2.5e-5;
        for step in 1..=3 {
            history.record(step as f64 * dt, [23.0, 24.123456]);
        }

        let text = csv_text(&history);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "time_s,T1,T2");
        let times: Vec<f64> = lines[1..]
            .iter()
            .map(|line| line.split(',').next().unwrap().parse().unwrap())
            .collect();
        assert_eq!(times, vec![dt, 2.0 * dt, 3.0 * dt]);
        assert!(lines[1].ends_with(",23.0000,24.1235"));
    }
}

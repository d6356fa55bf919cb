//! `gnssrec` - CLI for gnssrecorder
//!
//! This binary replays recorded event streams into GeoPackage sessions and
//! summarizes finished recordings.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::fs::File;
use std::io::{self, BufRead, BufReader};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};

use gnssrecorder::cli::{Cli, Command, ConfigCommand, InspectCommand, RecordCommand};
use gnssrecorder::{init_logging, inspect, Config, GnssEvent, Recorder};

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    match cli.command {
        Command::Record(cmd) => {
            let config = Config::load_from(cli.config)?;
            handle_record(config, &cmd)
        }
        Command::Inspect(cmd) => handle_inspect(&cmd),
        Command::Config(cmd) => handle_config(cli.config, cmd),
    }
}

fn handle_record(config: Config, cmd: &RecordCommand) -> Result<()> {
    let reader: Box<dyn BufRead> = if cmd.reads_stdin() {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(&cmd.input)
            .with_context(|| format!("failed to open {}", cmd.input.display()))?;
        Box::new(BufReader::new(file))
    };

    let output_dir = cmd
        .output_dir
        .clone()
        .unwrap_or_else(|| config.output_dir());
    let recorder = Recorder::new(config);
    recorder
        .start_session(&output_dir)
        .with_context(|| format!("failed to start recording in {}", output_dir.display()))?;

    let mut skipped = 0u64;
    for (index, line) in reader.lines().enumerate() {
        let line = line.context("failed to read input")?;
        if line.trim().is_empty() {
            continue;
        }
        let event: GnssEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(e) if cmd.strict => {
                recorder.stop_session()?;
                bail!("line {}: {e}", index + 1);
            }
            Err(e) => {
                warn!("Skipping line {}: {}", index + 1, e);
                skipped += 1;
                continue;
            }
        };
        if let Err(e) = recorder.submit(event) {
            warn!("Line {} not recorded: {}", index + 1, e);
        }
    }

    let path = recorder
        .stop_session()?
        .context("recording session was not open")?;
    let stats = recorder.stats();
    info!(
        "Submitted {} events, skipped {} lines, {} write failures",
        stats.submitted, skipped, stats.write_failures
    );
    println!("{}", path.display());
    Ok(())
}

fn handle_inspect(cmd: &InspectCommand) -> Result<()> {
    let summary = inspect(&cmd.file)?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let counts = &summary.counts;
    println!("Recording: {}", summary.path.display());
    println!();
    println!("[Rows]");
    println!("  Observation points: {}", counts.observation_points);
    println!("  Satellite rows:     {}", counts.satellite_measurements);
    println!("  Clock rows:         {}", counts.clock_records);
    println!("  Motion rows:        {}", counts.motion_samples);
    println!();
    println!("[Relations]");
    println!("  Satellite -> clock: {}", counts.measurement_clock_links);
    println!("  Point -> satellite: {}", counts.point_measurement_links);
    println!();
    match summary.bounding_box {
        Some(bbox) => println!(
            "Extent: lon {:.6}..{:.6}, lat {:.6}..{:.6}",
            bbox.min_x, bbox.max_x, bbox.min_y, bbox.max_y
        ),
        None => println!("Extent: none (no observation points)"),
    }
    Ok(())
}

fn handle_config(config_path: Option<std::path::PathBuf>, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::load_from(config_path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Recording]");
                println!("  Output directory:   {}", config.output_dir().display());
                println!("  File prefix:        {}", config.recording.file_prefix);
                println!("  Extension:          {}", config.recording.extension);
                println!(
                    "  Remove side files:  {}",
                    config.recording.remove_journal_files
                );
                println!();
                println!("[Writer]");
                match config.writer.queue_capacity {
                    0 => println!("  Queue capacity:     unbounded"),
                    n => println!("  Queue capacity:     {n}"),
                }
                println!();
                println!("[Correlation]");
                println!("  Policy:             {}", config.correlation.policy);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file
                .or(config_path)
                .unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}

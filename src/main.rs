use anyhow::Result;
use clap::Parser;
use log::{debug, info};
use particle_common::{ForceMode, SimulationConfig, SnapshotFormat};
use particle_engine::output::{open_sink, save_final_positions, save_summary};
use particle_engine::Simulation;
use std::path::PathBuf;

/// Command-line arguments. Values given here override the config file.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of particles
    #[arg(short = 'n')]
    num_particles: Option<usize>,

    /// Trajectory output file
    #[arg(short = 'o')]
    output: Option<String>,

    /// Optional path to a config.toml file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for particle placement and velocities
    #[arg(long)]
    seed: Option<u64>,

    /// Use the quadratic all-pairs force evaluation instead of bins
    #[arg(long)]
    all_pairs: bool,

    /// Snapshot format: text, json, bincode or messagepack
    #[arg(long, value_parser = parse_format)]
    format: Option<SnapshotFormat>,
}

fn parse_format(s: &str) -> Result<SnapshotFormat, String> {
    match s.to_ascii_lowercase().as_str() {
        "text" => Ok(SnapshotFormat::Text),
        "json" => Ok(SnapshotFormat::Json),
        "bincode" => Ok(SnapshotFormat::Bincode),
        "messagepack" | "msgpack" => Ok(SnapshotFormat::MessagePack),
        other => Err(format!("unknown snapshot format '{}'", other)),
    }
}

fn load_config(args: &Args) -> Result<SimulationConfig> {
    let mut config = match &args.config {
        Some(path) => SimulationConfig::load(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(n) = args.num_particles {
        config.initial_conditions.num_particles = n;
    }
    if let Some(output) = &args.output {
        config.output.trajectory_path = output.clone();
    }
    if args.seed.is_some() {
        config.initial_conditions.seed = args.seed;
    }
    if args.all_pairs {
        config.engine.force_mode = ForceMode::AllPairs;
    }
    if let Some(format) = args.format {
        config.output.format = format;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();

    let args = Args::parse();
    let config = load_config(&args)?;
    debug!("Configuration: {:#?}", config);

    let mut sim = Simulation::new(&config)?;
    let mut sink = open_sink(config.output.format, &config.output.trajectory_path, sim.params())?;

    let summary = sim.run(sink.as_mut())?;
    println!("{}", summary);

    if config.output.save_final_positions {
        let filename = format!("{}_final_positions.csv", config.output.trajectory_path);
        save_final_positions(&filename, sim.particles())?;
    }
    if let Some(path) = &config.output.summary_path {
        save_summary(path, &summary)?;
    }

    info!("Simulation Complete.");
    Ok(())
}

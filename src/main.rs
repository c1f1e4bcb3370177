//! Headless command-line runner for the intersection simulator

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use intersection_sim::simulation::{CsvSink, Direction, SimWorld};

#[derive(Parser, Debug)]
#[command(author, version, about = "Adaptive four-way intersection simulator")]
struct Args {
    /// Simulated seconds to run
    #[arg(long, default_value_t = 120)]
    seconds: u32,

    /// Frame length in seconds
    #[arg(long, default_value_t = 0.05)]
    delta: f32,

    /// RNG seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Append per-cycle statistics to this CSV file
    #[arg(long)]
    stats_csv: Option<PathBuf>,

    /// Start under rainy weather
    #[arg(long)]
    rain: bool,

    /// Dispatch an ambulance from this approach halfway through the run
    #[arg(long)]
    ambulance: Option<Direction>,

    /// Simulate an accident after this many simulated seconds
    #[arg(long)]
    accident_at: Option<u32>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut world = match args.seed {
        Some(seed) => SimWorld::new_with_seed(seed),
        None => SimWorld::new(),
    };
    if let Some(path) = &args.stats_csv {
        world = world.with_sink(Box::new(CsvSink::open(path)?));
    }
    if args.rain {
        world.toggle_weather();
    }
    world.start();

    let mut ambulance_pending = args.ambulance;
    let mut accident_pending = args.accident_at;
    while world.elapsed_secs() < args.seconds {
        world.tick(args.delta);
        if let Some(direction) = ambulance_pending {
            if world.elapsed_secs() >= args.seconds / 2 {
                let outcome = world.spawn_ambulance(direction);
                log::info!("{}", outcome.message());
                ambulance_pending = None;
            }
        }
        if let Some(at) = accident_pending {
            if world.elapsed_secs() >= at {
                let outcome = world.trigger_accident();
                log::info!("{}", outcome.message());
                accident_pending = None;
            }
        }
    }
    world.print_summary();
    Ok(())
}

use anyhow::{Context, bail};
use env_logger::Builder;
use log::{LevelFilter, info};

use lora_adaptation_simulator::common::scenario::load_scenario;
use lora_adaptation_simulator::simulation::Network;

const USAGE: &str = "usage: lora-adaptation-simulator <scenario.toml|scenario.json> [seed]";

fn main() -> anyhow::Result<()> {
    // Logging setup
    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter(Some("lora_adaptation_simulator"), LevelFilter::Debug)
        .parse_default_env()
        .init();

    let mut args = std::env::args().skip(1);
    let Some(scenario_path) = args.next() else {
        bail!(USAGE);
    };

    let mut scenario = load_scenario(&scenario_path).with_context(|| format!("Could not load scenario {}", scenario_path))?;
    if let Some(seed) = args.next() {
        scenario.seed = seed.parse().with_context(|| format!("Invalid seed '{}'\n{}", seed, USAGE))?;
    }

    info!("Starting run of {} with seed {}", scenario_path, scenario.seed);
    let report = Network::run(&scenario).context("Could not set up the simulation")?;
    info!(
        "Finished: PDR {:.3}, {:.3} mJ per successful uplink, {} uplinks",
        report.metrics.pdr, report.metrics.mean_energy_per_success_mj, report.metrics.attempted
    );

    println!("{}", serde_json::to_string_pretty(&report).context("Could not serialize the run report")?);
    Ok(())
}

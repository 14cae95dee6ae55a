use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

mod api;
mod config;
mod marble;
mod sampler;
mod simulation;
mod spatial;
mod types;

use config::SimulationConfig;
use simulation::Simulation;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port for the API server
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Configuration file path (YAML or JSON). If not specified, searches for config.yaml, config.yml, or config.json in current directory.
    #[arg(short, long)]
    config: Option<String>,

    /// Seed for the random source (overrides rng_seed from the config file)
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    let mut rng = match args.seed.or(config.rng_seed) {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let sim = Simulation::with_config(&mut rng, config);
    let (marble_count, _, active_tip_count) = sim.stats();
    info!(
        marbles = marble_count,
        roots = active_tip_count,
        target_hue = sim.state.target_hue,
        "Field generated"
    );

    let api_state = api::ApiState::new(sim, rng);
    api::run_server(api_state, args.port).await
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Load configuration from file or use default
fn load_config(config_path: Option<&str>) -> Result<SimulationConfig, Box<dyn std::error::Error>> {
    if let Some(path) = config_path {
        // User specified a config file
        SimulationConfig::from_file(path)
            .map_err(|e| format!("Failed to load config from {}: {}", path, e).into())
    } else {
        // Try default paths
        Ok(SimulationConfig::from_default_paths())
    }
}

use clap::Parser;
use starhold_core::catalog::Catalog;
use starhold_core::config::GameConfig;
use starhold_core::id::PlayerId;
use starhold_core::time::{Clock, SystemClock};
use starhold_core::worldgen::generate_world;
use starhold_server::{LogSink, ServerError, TickDriver};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless Starhold universe server", long_about = None)]
struct Args {
    /// Directory holding config.{ron,toml,json} and optional buildings.*
    #[arg(long)]
    data: Option<PathBuf>,

    /// Players to seed, each given a home planet
    #[arg(long, default_value_t = 2)]
    players: u32,

    /// Override the world seed from the config
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many seconds. Runs until killed when absent.
    #[arg(long)]
    run_secs: Option<u64>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = run(Args::parse()) {
        error!(target: "starhold::server", error = %e, "server failed");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), ServerError> {
    let (mut config, catalog) = match &args.data {
        Some(dir) => {
            let data = starhold_data::load_game_data(dir)?;
            (data.config, data.catalog)
        }
        None => (GameConfig::default(), Catalog::default()),
    };
    if let Some(seed) = args.seed {
        config.world.seed = seed;
    }

    let players: Vec<(PlayerId, String)> = (1..=args.players)
        .map(|n| (PlayerId(n), format!("Player {n}")))
        .collect();

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let world = generate_world(config, catalog, &players, clock.now())?;
    info!(
        target: "starhold::server",
        planets = world.universe.planet_count(),
        players = players.len(),
        "universe ready"
    );

    let driver = TickDriver::spawn(world.universe, clock, Box::new(LogSink))?;
    match args.run_secs {
        Some(secs) => {
            std::thread::sleep(Duration::from_secs(secs));
            driver.shutdown()
        }
        None => loop {
            std::thread::park();
        },
    }
}

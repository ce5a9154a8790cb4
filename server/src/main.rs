use clap::Parser;
use log::{error, info};
use server::game::GameParameters;
use server::network::{BoxError, Server};
use server::rng::{Draw, SharedRng};
use shared::{DEFAULT_HOST, DEFAULT_PORT};
use std::sync::Arc;

// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = DEFAULT_HOST)]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Seed for a reproducible game
    #[arg(short, long)]
    seed: Option<u64>,

    /// Number of rolls per player (5-10), drawn at random if omitted
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(5..=10))]
    turns: Option<u32>,

    /// Target score (20-50), drawn at random if omitted
    #[arg(short = 'g', long, value_parser = clap::value_parser!(u32).range(20..=50))]
    target: Option<u32>,
}

/// Main-method of the server.
/// Parses command-line arguments, binds the listener and plays one game.
#[tokio::main]
async fn main() -> Result<(), BoxError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let rng: Arc<dyn Draw> = match args.seed {
        Some(seed) => {
            info!("Using seed {}", seed);
            Arc::new(SharedRng::seeded(seed))
        }
        None => Arc::new(SharedRng::from_entropy()),
    };

    // Flags override the matching generated value; the other is still drawn.
    let params = match (args.turns, args.target) {
        (None, None) => None,
        (turns, target) => {
            let generated = GameParameters::generate(rng.as_ref());
            Some(GameParameters::new(
                target.unwrap_or(generated.target_score),
                turns.unwrap_or(generated.max_turns),
            ))
        }
    };

    info!("Starting server...");
    let address = format!("{}:{}", args.host, args.port);
    let server = match Server::bind(&address, rng, params).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to listen on {}: {}", address, e);
            return Err(e);
        }
    };

    // Handle shutdown gracefully
    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down gracefully...");
            shutdown.trigger();
        }
    });

    match server.run().await {
        Ok(Some(_)) => info!("Game finished, server exiting"),
        Ok(None) => info!("Server stopped before the game finished"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e);
        }
    }

    Ok(())
}

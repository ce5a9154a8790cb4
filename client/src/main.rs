use clap::Parser;
use client::network::{Client, Finish};
use log::info;
use shared::{DEFAULT_HOST, DEFAULT_PORT};
use tokio::io::{stdin, stdout, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = format!("{}:{}", DEFAULT_HOST, DEFAULT_PORT))]
    server: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let mut client = Client::connect(&args.server).await?;
    let mut console = BufReader::new(stdin());
    let mut display = stdout();

    match client.run(&mut console, &mut display).await? {
        Finish::GameOver => info!("Game over"),
        Finish::ServerClosed => info!("Server closed the connection"),
        Finish::ConsoleClosed => info!("No more console input, leaving the game"),
    }

    Ok(())
}

use clap::Parser;
use log::info;
use server::config::GameSettings;
use server::network::Server;
use shared::DEFAULT_PORT;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// JSON settings file (frame time, respawn rate, universe size, walls)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Maximum number of concurrent clients
    #[arg(short, long, default_value = "64")]
    max_clients: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let settings = match &args.settings {
        Some(path) => {
            info!("Loading settings from {}", path.display());
            GameSettings::load(path)?
        }
        None => GameSettings::default(),
    };
    info!(
        "Universe {} wide, {} walls, {}ms per frame, respawn after {} frames",
        settings.universe_size,
        settings.walls.len(),
        settings.ms_per_frame,
        settings.respawn_rate
    );

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::start(&address, &settings, args.max_clients).await?;

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down");
    server.stop();

    Ok(())
}

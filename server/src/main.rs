use arena_server::config::GameConfig;
use arena_server::network::Server;
use clap::Parser;
use log::{error, info};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Simulation ticks per second
    #[clap(short, long, default_value = "10")]
    tick_rate: u32,
    /// Maximum concurrent clients across all rooms
    #[clap(short, long, default_value = "64")]
    max_clients: usize,
    /// Players plus bots allowed in one room
    #[clap(long, default_value = "8")]
    max_room_users: usize,
    /// Maximum NPC groups kept alive per room
    #[clap(long, default_value = "30")]
    max_npc_groups: usize,
    /// Maximum bots spawned per room
    #[clap(long, default_value = "4")]
    max_bots: usize,
    /// Disable bot players
    #[clap(long)]
    no_bots: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = GameConfig {
        tick_rate: args.tick_rate,
        max_clients: args.max_clients,
        max_room_users: args.max_room_users,
        max_npc_groups: args.max_npc_groups,
        max_bots: args.max_bots,
        bots_enabled: !args.no_bots,
        ..Default::default()
    };
    info!("Starting arena server with {:?}", config);

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, config).await?;
    let shutdown = server.shutdown_handle();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down gracefully...");
                shutdown.shutdown();
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    server.run().await?;
    Ok(())
}

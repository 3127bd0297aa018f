//! diode-sender — entry point.
//!
//! ```text
//! diode-sender                   Run with diode-sender.toml (or defaults)
//! diode-sender --config <path>   Load a custom config TOML
//! diode-sender --gen-config      Write default config to stdout
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use diode_core::queue::RedisQueue;
use diode_core::sender::Sender;

use crate::config::AppConfig;

mod config;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "diode-sender", about = "One-way diode transport — sending end")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "diode-sender.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        println!("{}", toml::to_string_pretty(&AppConfig::default())?);
        return Ok(());
    }

    let config = AppConfig::load(&cli.config);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("diode-sender v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "receiver: {}:{}",
        config.network.receiver_host, config.network.receiver_port
    );
    info!("source queue: {}", config.queue.source_queue);

    let target = resolve_receiver(&config).await?;
    let queue = RedisQueue::connect(&config.redis_endpoint()).await?;

    let bind_addr = format!("{}:0", config.network.bind_interface);
    let mut sender = Sender::bind(&bind_addr, target, queue, config.to_pipeline_config()).await?;

    tokio::select! {
        result = sender.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("interrupt received — shutting down"),
    }

    Ok(())
}

async fn resolve_receiver(config: &AppConfig) -> Result<SocketAddr, std::io::Error> {
    let addr = format!(
        "{}:{}",
        config.network.receiver_host, config.network.receiver_port
    );
    tokio::net::lookup_host(&addr)
        .await?
        .next()
        .ok_or_else(|| std::io::Error::other(format!("cannot resolve {addr}")))
}

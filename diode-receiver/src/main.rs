//! diode-receiver — entry point.
//!
//! ```text
//! diode-receiver                   Run with diode-receiver.toml (or defaults)
//! diode-receiver --config <path>   Load a custom config TOML
//! diode-receiver --gen-config      Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use diode_core::queue::RedisQueue;
use diode_core::receiver::Receiver;

use crate::config::AppConfig;

mod config;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "diode-receiver", about = "One-way diode transport — receiving end")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "diode-receiver.toml")]
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

    info!("diode-receiver v{}", env!("CARGO_PKG_VERSION"));
    info!("listening on {}", config.bind_addr());
    info!("sink queue: {}", config.queue.sink_queue);

    let queue = RedisQueue::connect(&config.redis_endpoint()).await?;
    let mut receiver =
        Receiver::bind(&config.bind_addr(), queue, config.to_pipeline_config()).await?;

    tokio::select! {
        result = receiver.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("interrupt received — shutting down"),
    }

    Ok(())
}

//! reqguard demo server.
//!
//! ```text
//! curl -H 'Accept: application/xml' -d 'email=test@gmail.com' -d 'str=mystring' \
//!     'localhost:8888/inpath?query=inquery'
//! ```
//!
//! `str=err` answers with an opaque error, `str=interr` with a server error
//! whose internal cause only shows up in the log.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use reqguard::config::{load_config, AppConfig};
use reqguard::observability::{logging, metrics};
use reqguard::HttpServer;

#[derive(Parser)]
#[command(name = "reqguard")]
#[command(about = "Demo server for the request trust & error-formatting layer", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_tracing(&config.observability.log_level);
    tracing::info!("reqguard v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Trust or schema faults abort here, before anything is served.
    let server = HttpServer::new(config.clone())?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

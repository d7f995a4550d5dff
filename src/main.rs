//! goroute: configuration-driven HTTP/HTTPS edge router.
//!
//! ```text
//!     Client Request
//!     ──────────────▶ net::listener ─▶ http::server ─▶ routing (first prefix match)
//!                                                         │
//!                                     ┌───────────────────┴──────────────────┐
//!                                     ▼                                      ▼
//!                              http::proxy (URL)                 http::static_files (DIR)
//!                                     │                                      │
//!                                     ▼                                      ▼
//!                               upstream server                 filesystem + cache (memcached)
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use goroute::config::{load_config, NO_ENV_FILE};
use goroute::observability::logging;
use goroute::{net, HttpServer, Shutdown};

/// Configuration-driven HTTP/HTTPS edge router.
#[derive(Parser, Debug)]
#[command(name = "goroute", version, about)]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(long, default_value = "./goroute.json")]
    config: PathBuf,

    /// Path to a JSON object mapping `$NAME$` placeholders to environment
    /// variable names, or NONE to skip interpolation.
    #[arg(long, default_value = NO_ENV_FILE)]
    env: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "goroute failed");
            eprintln!("goroute: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "goroute starting");

    let env_path = (cli.env != NO_ENV_FILE).then(|| Path::new(&cli.env));
    let config = load_config(&cli.config, env_path)?;

    tracing::info!(
        config = %cli.config.display(),
        routes = config.routes.len(),
        tls = config.security.enabled,
        caching = config.cache.enabled,
        "Configuration loaded"
    );

    let listener = net::bind(&config).await?;
    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    shutdown.trigger_on_ctrl_c();

    server.run(listener, shutdown.subscribe()).await?;
    Ok(())
}

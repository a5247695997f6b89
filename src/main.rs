#![cfg(not(tarpaulin_include))]

use sheets_proxy::{Config, app};

/// Main entry point for the proxy server
///
/// Reads configuration from the environment (and `.env`), sets up logging
/// with `info` as the default level, then serves until the process is
/// stopped.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    app::run(config).await
}

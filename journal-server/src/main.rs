//! Journal Server - Main entry point.

use anyhow::Result;
use journal_common::config::Config;
use journal_common::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Load and validate configuration
    let config = Config::load_and_validate()?;

    init_logging(&config.observability.log_level, &config.observability.log_format);

    tracing::info!("Journal Server v{}", env!("CARGO_PKG_VERSION"));

    journal_server::start_server(&config).await
}

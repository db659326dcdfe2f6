//! Entry point for the SmartTax engine binary.
//!
//! Running this binary starts an HTTP server exposing the tax engine.
//! Configuration is read from `SMARTTAX_*` environment variables; see
//! [`smarttax_engine::config`].

use anyhow::Result;
use smarttax_engine::{api, config::ServerConfig, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::from_env()?;
    logging::init_logging(&config.log_level)?;
    if let Err(err) = api::serve(config).await {
        tracing::error!(error = %format!("{err:#}"), "server stopped");
        return Err(err);
    }
    Ok(())
}

//! Server configuration read from the environment.

use crate::tax::FY2024_25;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;

pub const BIND_ADDR_VAR: &str = "SMARTTAX_BIND_ADDR";
pub const RATE_TABLE_DIR_VAR: &str = "SMARTTAX_RATE_TABLE_DIR";
pub const DEFAULT_FISCAL_YEAR_VAR: &str = "SMARTTAX_DEFAULT_FISCAL_YEAR";
pub const LOG_VAR: &str = "SMARTTAX_LOG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Directory of additional JSON rate tables, if any.
    pub rate_table_dir: Option<PathBuf>,
    /// Rate table used when a request names no fiscal year.
    pub default_fiscal_year: String,
    /// Fallback log filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bind_addr = lookup(BIND_ADDR_VAR).unwrap_or_else(|| "127.0.0.1:8000".to_string());
        let bind_addr = bind_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("{BIND_ADDR_VAR}={bind_addr} is not a socket address"))?;
        Ok(Self {
            bind_addr,
            rate_table_dir: lookup(RATE_TABLE_DIR_VAR)
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from),
            default_fiscal_year: lookup(DEFAULT_FISCAL_YEAR_VAR)
                .unwrap_or_else(|| FY2024_25.to_string()),
            log_level: lookup(LOG_VAR).unwrap_or_else(|| "info".to_string()),
        })
    }
}

use std::env;
use std::net::IpAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::config_env::{parse_ip_list_env, parse_u32_env, require_env};

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub database_url: String,
    pub database_max_connections: u32,
    pub migrations_dir: PathBuf,
    pub files_dir: PathBuf,
    pub trusted_proxy_ips: Vec<IpAddr>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    MissingVar(String),
    #[error("invalid integer in env var {0}")]
    ParseInt(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bind_addr: env::var("API_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            database_url: require_env("DATABASE_URL")?,
            database_max_connections: parse_u32_env("DATABASE_MAX_CONNECTIONS", 10)?,
            migrations_dir: env::var("MIGRATIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../db/migrations")
                }),
            files_dir: env::var("FILES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("files")),
            trusted_proxy_ips: parse_ip_list_env("TRUSTED_PROXY_IPS")?,
        })
    }
}

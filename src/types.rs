use crate::error::{BlacklistError, Result};
use crate::{BlacklistEngine, FileStorage, HashConfig, RedbStorage};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::info;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AddRequest {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ContainResponse {
    /// All of the URL's filter bits are set
    pub filter_hit: bool,
    /// The URL is in the exact blacklist (only checked on a filter hit)
    pub exact_hit: bool,
    /// Both of the above
    pub blacklisted: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatsResponse {
    pub array_size: usize,
    pub hash_functions: usize,
    pub bits_set: usize,
    pub blacklisted: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

/// Shared by every connection and every HTTP handler.
pub struct AppState {
    pub engine: BlacklistEngine,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageKind {
    /// `params.txt`, `bloom.txt` and `blacklist.txt` in the data directory
    Files,
    /// `blacklist.redb` in the data directory
    Redb,
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "files" | "file" => Ok(StorageKind::Files),
            "redb" => Ok(StorageKind::Redb),
            other => Err(format!("unknown storage kind '{other}'")),
        }
    }
}

#[derive(Builder, Clone, Debug)]
#[builder(pattern = "owned")]
pub struct ServerConfig {
    #[builder(default = "\"127.0.0.1\".to_string()")]
    pub server_host: String,
    #[builder(default = "5555")]
    pub server_port: u16,
    /// HTTP API port, the API is off when unset
    #[builder(default)]
    pub http_port: Option<u16>,
    #[builder(default = "\"data\".to_string()")]
    pub data_dir: String,
    #[builder(default = "StorageKind::Files")]
    pub storage: StorageKind,
    #[builder(default = "1024")]
    pub array_size: usize,
    #[builder(default = "vec![1, 2]")]
    pub hash_repeats: Vec<u32>,
}

fn env_or(var_name: &str, default: &str) -> String {
    std::env::var(var_name).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(var_name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| BlacklistError::EnvParseError {
        var_name: var_name.to_string(),
        value: value.to_string(),
        error: e.to_string(),
    })
}

/// Parses space separated repeat counts such as `"1 2 3"`.
pub fn parse_repeats(var_name: &str, value: &str) -> Result<Vec<u32>> {
    value
        .split_whitespace()
        .map(|token| parse_env(var_name, token))
        .collect()
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let http_port = match std::env::var("HTTP_PORT") {
            Ok(value) if !value.trim().is_empty() => {
                Some(parse_env("HTTP_PORT", value.trim())?)
            }
            _ => None,
        };

        Ok(Self {
            server_host: env_or("SERVER_HOST", "127.0.0.1"),
            server_port: parse_env("SERVER_PORT", &env_or("SERVER_PORT", "5555"))?,
            http_port,
            data_dir: env_or("BLACKLIST_DATA_DIR", "data"),
            storage: parse_env(
                "BLACKLIST_STORAGE",
                &env_or("BLACKLIST_STORAGE", "files"),
            )?,
            array_size: parse_env(
                "BLOOM_ARRAY_SIZE",
                &env_or("BLOOM_ARRAY_SIZE", "1024"),
            )?,
            hash_repeats: parse_repeats(
                "BLOOM_HASH_REPEATS",
                &env_or("BLOOM_HASH_REPEATS", "1 2"),
            )?,
        })
    }

    pub fn hash_config(&self) -> Result<HashConfig> {
        HashConfig::new(self.array_size, self.hash_repeats.clone())
    }

    /// Opens the configured backend and the engine on top of it.
    pub fn open_engine(&self) -> Result<BlacklistEngine> {
        let config = self.hash_config()?;
        let engine = match self.storage {
            StorageKind::Files => {
                BlacklistEngine::open(config, FileStorage::open(&self.data_dir)?)?
            }
            StorageKind::Redb => {
                std::fs::create_dir_all(&self.data_dir)?;
                let path = Path::new(&self.data_dir).join("blacklist.redb");
                BlacklistEngine::open(config, RedbStorage::open(path)?)?
            }
        };
        info!(run_mode = ?engine.run_mode(), data_dir = %self.data_dir, "Engine opened");
        Ok(engine)
    }

    pub fn tcp_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn http_addr(&self) -> Option<String> {
        self.http_port
            .map(|port| format!("{}:{}", self.server_host, port))
    }
}

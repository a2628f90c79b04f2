use anyhow::Context;
use serde::Deserialize;

pub struct AppConfig {
    pub database_url: String,
    pub rpc_url: String,
    /// Base58 keypair of the platform wallet. Boost payments are
    /// expected on its pubkey and it pays the mint fees on chain.
    pub platform_wallet: String,
    pub collections_csv: String,
    pub settings_yaml: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let rpc_url = std::env::var("RPC_URL").context("RPC_URL must be set")?;

        let platform_wallet =
            std::env::var("PLATFORM_WALLET").context("PLATFORM_WALLET must be set")?;

        let collections_csv =
            std::env::var("COLLECTIONS_CSV").context("COLLECTIONS_CSV must be set")?;

        let settings_yaml =
            std::env::var("SETTINGS_YAML").unwrap_or_else(|_| "settings.yaml".to_string());

        Ok(Self {
            database_url,
            rpc_url,
            platform_wallet,
            collections_csv,
            settings_yaml,
        })
    }
}

/// Service tunables, loaded from a YAML file at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketSettings {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_worker_poll_secs")]
    pub worker_poll_secs: u64,
    #[serde(default = "default_worker_batch")]
    pub worker_batch: i64,
}

impl MarketSettings {
    pub async fn from_yaml_file(path: &str) -> anyhow::Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read settings from `{}`", path))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid settings YAML in `{}`", path))
    }
}

impl Default for MarketSettings {
    fn default() -> Self {
        MarketSettings {
            bind_address: default_bind_address(),
            worker_poll_secs: default_worker_poll_secs(),
            worker_batch: default_worker_batch(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_worker_poll_secs() -> u64 {
    2
}

fn default_worker_batch() -> i64 {
    8
}

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use common::{Collection, Database, TransactionFetcher};

use crate::config::MarketSettings;
use crate::rate_limit::RateLimiter;
use crate::verification::MAX_ATTEMPTS_PER_MINUTE;

pub struct AppState {
    pub db: Database,
    pub fetcher: Arc<dyn TransactionFetcher>,
    pub rate_limiter: RateLimiter,
    /// Base58 pubkey of the platform wallet, the expected recipient of
    /// boost payments.
    pub platform_wallet: String,
    pub settings: MarketSettings,
}

impl AppState {
    pub fn new(
        db: Database,
        fetcher: Arc<dyn TransactionFetcher>,
        platform_wallet: String,
        settings: MarketSettings,
    ) -> Self {
        AppState {
            db,
            fetcher,
            rate_limiter: RateLimiter::new(MAX_ATTEMPTS_PER_MINUTE, Duration::from_secs(60)),
            platform_wallet,
            settings,
        }
    }

    pub async fn initialize_data_from_files(&self, collections_csv: &str) -> Result<()> {
        let collections = Collection::load_from_csv(collections_csv)
            .await
            .with_context(|| format!("Failed to load collections from `{}`", collections_csv))?;

        for collection in &collections {
            self.db.save_collection(collection).await.with_context(|| {
                format!("Failed to save collection `{}` to database", collection.name)
            })?;
        }

        Ok(())
    }
}

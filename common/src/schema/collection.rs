use chrono::NaiveDateTime;
use rand::Rng;
use serde::{Deserialize, Serialize};
use solana_sdk::{native_token::LAMPORTS_PER_SOL, signature::Keypair, signer::Signer};
use tokio_stream::StreamExt;

/// An NFT collection listed on the marketplace. Mint fees for a
/// collection are paid to its `treasury_wallet`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Collection {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub symbol: String,
    pub treasury_wallet: String,
    pub creator_wallet: String,
    pub mint_price_lamports: i64,
    #[serde(default)]
    pub base_uri: String,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

impl Collection {
    pub async fn load_from_csv(path: &str) -> anyhow::Result<Vec<Collection>> {
        let content = tokio::fs::read_to_string(path).await?;
        let mut rdr = csv_async::AsyncReaderBuilder::new()
            .has_headers(true)
            .create_deserializer(content.as_bytes());
        let mut records = rdr.deserialize::<Collection>();
        let mut collections = Vec::new();
        while let Some(record) = records.next().await {
            match record {
                Ok(collection) => collections.push(collection),
                Err(e) => {
                    log::error!("Error deserializing collection: {}", e);
                    continue;
                }
            }
        }
        if collections.is_empty() {
            return Err(anyhow::anyhow!("No collections found in the CSV file"));
        }
        log::debug!("Loaded {} collections from CSV", collections.len());
        Ok(collections)
    }

    //Remove in production
    pub async fn generate_test_collections_csv_async(
        path: &str,
        count: i64,
    ) -> anyhow::Result<()> {
        let file = tokio::fs::File::create(path).await?;
        let mut wtr = csv_async::AsyncSerializer::from_writer(file);

        let mut rng = rand::rng();

        for i in 0..count {
            let treasury = Keypair::new().pubkey();
            let creator = Keypair::new().pubkey();
            let mint_price_lamports: i64 =
                rng.random_range((LAMPORTS_PER_SOL / 100) as i64..(2 * LAMPORTS_PER_SOL) as i64);

            let collection = Collection {
                id: 0,
                name: format!("Test Collection {}", i + 1),
                symbol: format!("TST{}", i + 1),
                treasury_wallet: treasury.to_string(),
                creator_wallet: creator.to_string(),
                mint_price_lamports,
                base_uri: format!("https://example.com/collections/{}", i + 1),
                created_at: None,
            };
            wtr.serialize(collection).await?;
        }
        wtr.flush().await?;
        log::info!("Test collections CSV generated at {}", path);
        Ok(())
    }
}

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_PROCESSING: &str = "processing";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_FAILED: &str = "failed";

/// A batch mint request held server-side and polled by the client.
/// `completed_quantity`/`failed_quantity` are recomputed from the item
/// rows after every item transition so the two levels always reconcile.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MintJob {
    pub id: i64,
    pub collection_id: i64,
    pub wallet_address: String,
    pub payment_signature: String,
    pub total_quantity: i64,
    pub completed_quantity: i64,
    pub failed_quantity: i64,
    pub status: String, // "pending", "processing", "completed", "failed"
    pub error_message: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl MintJob {
    pub fn new(
        collection_id: i64,
        wallet_address: String,
        payment_signature: String,
        total_quantity: i64,
    ) -> Self {
        MintJob {
            id: 0,
            collection_id,
            wallet_address,
            payment_signature,
            total_quantity,
            completed_quantity: 0,
            failed_quantity: 0,
            status: STATUS_PENDING.to_string(),
            error_message: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// All items have reached a terminal state.
    pub fn is_settled(&self) -> bool {
        self.completed_quantity + self.failed_quantity >= self.total_quantity
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MintJobItem {
    pub id: i64,
    pub job_id: i64,
    pub item_index: i64,
    pub status: String, // "pending", "processing", "completed", "failed"
    pub nft_mint_address: Option<String>,
    pub error_message: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

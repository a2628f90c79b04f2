use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const TARGET_NFT: &str = "nft";
pub const TARGET_COLLECTION: &str = "collection";

pub const ACTION_LIKE: &str = "like";
pub const ACTION_UNLIKE: &str = "unlike";

pub fn is_known_target_type(target_type: &str) -> bool {
    matches!(target_type, TARGET_NFT | TARGET_COLLECTION)
}

/// One like relation. Uniqueness on (user_wallet, target_type, target_id)
/// is enforced by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Like {
    pub id: i64,
    pub user_wallet: String,
    pub target_type: String, // "nft", "collection"
    pub target_id: i64,
    pub created_at: Option<NaiveDateTime>,
}

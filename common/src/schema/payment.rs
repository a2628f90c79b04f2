use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const PAYMENT_TYPE_MINT_FEE: &str = "mint_fee";
pub const PAYMENT_TYPE_BOOST: &str = "boost";

pub fn is_known_payment_type(payment_type: &str) -> bool {
    matches!(payment_type, PAYMENT_TYPE_MINT_FEE | PAYMENT_TYPE_BOOST)
}

/// A verified on-chain payment. Rows are inserted only after the
/// transaction passed verification and are never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: i64,
    pub tx_signature: String,
    pub wallet_address: String,
    pub payment_type: String, // "mint_fee", "boost"
    pub amount_lamports: i64,
    pub recipient: String,
    pub collection_id: Option<i64>,
    pub verified: bool,
    pub created_at: Option<NaiveDateTime>,
}

impl Payment {
    pub fn new(
        tx_signature: String,
        wallet_address: String,
        payment_type: String,
        amount_lamports: i64,
        recipient: String,
        collection_id: Option<i64>,
    ) -> Self {
        Payment {
            id: 0, // set by DB
            tx_signature,
            wallet_address,
            payment_type,
            amount_lamports,
            recipient,
            collection_id,
            verified: true,
            created_at: None,
        }
    }
}

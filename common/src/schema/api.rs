//! Wire types shared between the service handlers and the client SDK.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::schema::{MintJob, MintJobItem};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyPaymentRequest {
    pub tx_signature: String,
    pub wallet_address: String,
    pub payment_type: String,
    /// Expected transfer amount in SOL.
    pub expected_amount: f64,
    #[serde(default)]
    pub collection_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub tx_signature: String,
    pub payment_type: String,
    pub amount_lamports: i64,
    pub recipient: String,
    pub verified_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyPaymentResponse {
    pub verified: bool,
    pub payment_id: i64,
    pub receipt: PaymentReceipt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeRequest {
    pub wallet_address: String,
    /// Base58 ed25519 signature of the canonical like message, made with
    /// the wallet's key. See [`crate::like_message`].
    pub signature: String,
    pub target_type: String,
    pub target_id: i64,
    pub action: String, // "like", "unlike"
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeCountResponse {
    pub target_type: String,
    pub target_id: i64,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMintJobRequest {
    pub collection_id: i64,
    pub wallet_address: String,
    pub quantity: i64,
    /// Signature of the verified mint-fee payment backing this job.
    pub payment_signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintJobStatusResponse {
    pub job: MintJob,
    pub items: Vec<MintJobItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

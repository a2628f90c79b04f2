use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const SEVERITY_INFO: &str = "info";
pub const SEVERITY_MEDIUM: &str = "medium";
pub const SEVERITY_HIGH: &str = "high";
pub const SEVERITY_CRITICAL: &str = "critical";

/// Audit row written for both failed and successful payment
/// verifications, rate-limit hits and replay attempts.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SecurityEvent {
    pub id: i64,
    pub wallet_address: String,
    pub event_type: String,
    pub severity: String, // "info", "medium", "high", "critical"
    pub details: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl SecurityEvent {
    pub fn new(
        wallet_address: &str,
        event_type: &str,
        severity: &str,
        details: Option<String>,
    ) -> Self {
        SecurityEvent {
            id: 0,
            wallet_address: wallet_address.to_string(),
            event_type: event_type.to_string(),
            severity: severity.to_string(),
            details,
            created_at: None,
        }
    }
}

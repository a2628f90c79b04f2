use std::fmt;
use std::time::Duration;

use chrono::Utc;
use common::{
    FetchError, PAYMENT_TYPE_BOOST, PAYMENT_TYPE_MINT_FEE, Payment, PaymentInsert, PaymentReceipt,
    SEVERITY_CRITICAL, SEVERITY_HIGH, SEVERITY_INFO, SEVERITY_MEDIUM, SecurityEvent,
    TransactionFetcher, TransactionRecord, VerifyPaymentRequest, VerifyPaymentResponse,
    is_known_payment_type, lamports_to_sol, sol_to_lamports,
};
use tokio::time::sleep;

use crate::error::ApiError;
use crate::state::AppState;

/// Accepted difference between the expected and the actual transfer
/// amount, 0.01 SOL.
pub const PAYMENT_TOLERANCE_LAMPORTS: i64 = 10_000_000;
/// Transactions older than this are rejected regardless of amount.
pub const MAX_TRANSACTION_AGE_SECS: i64 = 5 * 60;
/// Verification attempts allowed per wallet per minute.
pub const MAX_ATTEMPTS_PER_MINUTE: usize = 10;

const FETCH_ATTEMPTS: u32 = 3;
const FETCH_RETRY_DELAY: Duration = Duration::from_millis(500);

/// A reason the on-chain checks rejected a transaction. Each maps to a
/// human-readable message; the technical context goes to the audit log.
#[derive(Debug, PartialEq)]
pub enum VerifyFailure {
    ExecutionFailed(String),
    Unconfirmed,
    TooOld { age_secs: i64 },
    RecipientNotInTransaction,
    AmountMismatch { expected_lamports: i64, actual_lamports: i64 },
}

impl fmt::Display for VerifyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyFailure::ExecutionFailed(err) => {
                write!(f, "transaction failed on chain ({err})")
            }
            VerifyFailure::Unconfirmed => write!(f, "transaction is not confirmed yet"),
            VerifyFailure::TooOld { age_secs } => write!(
                f,
                "transaction is too old ({age_secs}s, limit is {MAX_TRANSACTION_AGE_SECS}s)"
            ),
            VerifyFailure::RecipientNotInTransaction => {
                write!(f, "expected recipient was not paid by this transaction")
            }
            VerifyFailure::AmountMismatch {
                expected_lamports,
                actual_lamports,
            } => write!(
                f,
                "amount mismatch: expected {} SOL, recipient received {} SOL",
                lamports_to_sol(*expected_lamports),
                lamports_to_sol(*actual_lamports)
            ),
        }
    }
}

/// Run the on-chain checks in order: execution error, freshness,
/// recipient balance delta. Returns the recipient's actual lamport
/// delta on success.
pub fn check_transaction(
    record: &TransactionRecord,
    recipient: &str,
    expected_lamports: i64,
    now_unix: i64,
) -> Result<i64, VerifyFailure> {
    if let Some(err) = &record.err {
        return Err(VerifyFailure::ExecutionFailed(err.clone()));
    }

    let block_time = record.block_time.ok_or(VerifyFailure::Unconfirmed)?;
    let age_secs = now_unix - block_time;
    if age_secs > MAX_TRANSACTION_AGE_SECS {
        return Err(VerifyFailure::TooOld { age_secs });
    }

    let actual_lamports = record
        .balance_change(recipient)
        .ok_or(VerifyFailure::RecipientNotInTransaction)?;
    if (actual_lamports - expected_lamports).abs() > PAYMENT_TOLERANCE_LAMPORTS {
        return Err(VerifyFailure::AmountMismatch {
            expected_lamports,
            actual_lamports,
        });
    }

    Ok(actual_lamports)
}

/// Fetch a transaction, retrying transport failures a bounded number of
/// times. "Not found" is terminal; only an RPC hiccup is worth
/// retrying, so a transient outage is not mistaken for a bogus
/// signature.
pub async fn fetch_with_retry(
    fetcher: &dyn TransactionFetcher,
    tx_signature: &str,
) -> Result<TransactionRecord, FetchError> {
    let mut attempt = 0;
    loop {
        match fetcher.fetch_transaction(tx_signature).await {
            Ok(record) => return Ok(record),
            Err(FetchError::Transport(msg)) if attempt + 1 < FETCH_ATTEMPTS => {
                attempt += 1;
                log::warn!(
                    "RPC transport error for {} (attempt {}/{}): {}",
                    tx_signature,
                    attempt,
                    FETCH_ATTEMPTS,
                    msg
                );
                sleep(FETCH_RETRY_DELAY).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Full verification pipeline: validate, rate-limit, resolve recipient,
/// fetch, check, record. The UNIQUE index on the signature column turns
/// the final insert into the atomic replay check.
pub async fn verify_payment(
    state: &AppState,
    request: &VerifyPaymentRequest,
) -> Result<VerifyPaymentResponse, ApiError> {
    validate_request(request)?;

    if !state.rate_limiter.check(&request.wallet_address) {
        record_event(
            state,
            &request.wallet_address,
            "verification_rate_limited",
            SEVERITY_HIGH,
            Some(format!(
                "more than {} verification attempts in one minute",
                MAX_ATTEMPTS_PER_MINUTE
            )),
        )
        .await;
        return Err(ApiError::RateLimited);
    }

    let recipient = resolve_recipient(state, request).await?;
    let expected_lamports = sol_to_lamports(request.expected_amount);

    let record = match fetch_with_retry(state.fetcher.as_ref(), &request.tx_signature).await {
        Ok(record) => record,
        Err(FetchError::NotFound) => {
            record_event(
                state,
                &request.wallet_address,
                "verification_failed",
                SEVERITY_MEDIUM,
                Some(format!("transaction {} not found", request.tx_signature)),
            )
            .await;
            return Err(ApiError::Verification(
                "transaction not found on chain".to_string(),
            ));
        }
        Err(FetchError::Transport(msg)) => {
            record_event(
                state,
                &request.wallet_address,
                "verification_rpc_error",
                SEVERITY_MEDIUM,
                Some(msg.clone()),
            )
            .await;
            return Err(ApiError::Internal(anyhow::anyhow!(
                "RPC unavailable while verifying {}: {}",
                request.tx_signature,
                msg
            )));
        }
    };

    let now_unix = Utc::now().timestamp();
    if let Err(failure) = check_transaction(&record, &recipient, expected_lamports, now_unix) {
        record_event(
            state,
            &request.wallet_address,
            "verification_failed",
            SEVERITY_MEDIUM,
            Some(format!("{}: {}", request.tx_signature, failure)),
        )
        .await;
        return Err(ApiError::Verification(failure.to_string()));
    }

    let payment = Payment::new(
        request.tx_signature.clone(),
        request.wallet_address.clone(),
        request.payment_type.clone(),
        expected_lamports,
        recipient.clone(),
        request.collection_id,
    );

    match state.db.save_payment(&payment).await? {
        PaymentInsert::Created(payment_id) => {
            record_event(
                state,
                &request.wallet_address,
                "payment_verified",
                SEVERITY_INFO,
                Some(format!(
                    "{}: {} lamports to {}",
                    request.payment_type, expected_lamports, recipient
                )),
            )
            .await;

            Ok(VerifyPaymentResponse {
                verified: true,
                payment_id,
                receipt: PaymentReceipt {
                    tx_signature: request.tx_signature.clone(),
                    payment_type: request.payment_type.clone(),
                    amount_lamports: expected_lamports,
                    recipient,
                    verified_at: Utc::now().naive_utc(),
                },
            })
        }
        PaymentInsert::DuplicateSignature => {
            record_event(
                state,
                &request.wallet_address,
                "payment_replay_detected",
                SEVERITY_CRITICAL,
                Some(format!("signature {} reused", request.tx_signature)),
            )
            .await;
            Err(ApiError::Replay)
        }
    }
}

fn validate_request(request: &VerifyPaymentRequest) -> Result<(), ApiError> {
    if request.tx_signature.trim().is_empty() {
        return Err(ApiError::Validation(
            "Transaction signature is required.".to_string(),
        ));
    }
    if request.wallet_address.trim().is_empty() {
        return Err(ApiError::Validation(
            "Wallet address is required.".to_string(),
        ));
    }
    if !is_known_payment_type(&request.payment_type) {
        return Err(ApiError::Validation(format!(
            "Payment type must be either '{}' or '{}'.",
            PAYMENT_TYPE_MINT_FEE, PAYMENT_TYPE_BOOST
        )));
    }
    if !request.expected_amount.is_finite() || request.expected_amount <= 0.0 {
        return Err(ApiError::Validation(
            "Expected amount must be a positive number of SOL.".to_string(),
        ));
    }
    if request.payment_type == PAYMENT_TYPE_MINT_FEE && request.collection_id.is_none() {
        return Err(ApiError::Validation(
            "collection_id is required for mint fee payments.".to_string(),
        ));
    }
    Ok(())
}

/// Mint fees go to the collection's treasury, boosts to the platform
/// wallet.
async fn resolve_recipient(
    state: &AppState,
    request: &VerifyPaymentRequest,
) -> Result<String, ApiError> {
    match request.payment_type.as_str() {
        PAYMENT_TYPE_BOOST => Ok(state.platform_wallet.clone()),
        PAYMENT_TYPE_MINT_FEE => {
            let collection_id = request.collection_id.ok_or_else(|| {
                ApiError::Validation("collection_id is required for mint fee payments.".to_string())
            })?;
            let collection = state
                .db
                .get_collection(collection_id)
                .await?
                .ok_or_else(|| {
                    ApiError::NotFound(format!("Collection {} not found.", collection_id))
                })?;
            if collection.treasury_wallet.trim().is_empty() {
                return Err(ApiError::NotFound(format!(
                    "Collection {} has no treasury wallet.",
                    collection_id
                )));
            }
            Ok(collection.treasury_wallet)
        }
        _ => Err(ApiError::Validation("Unknown payment type.".to_string())),
    }
}

/// Audit failures must not fail the request; they are logged and
/// dropped.
async fn record_event(
    state: &AppState,
    wallet_address: &str,
    event_type: &str,
    severity: &str,
    details: Option<String>,
) {
    let event = SecurityEvent::new(wallet_address, event_type, severity, details);
    if let Err(e) = state.db.save_security_event(&event).await {
        log::warn!("Failed to record security event {}: {:#}", event_type, e);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use actix_web::http::StatusCode;
    use actix_web::ResponseError;
    use async_trait::async_trait;
    use common::{Collection, Database};

    use super::*;
    use crate::config::MarketSettings;

    const PLATFORM: &str = "platform-wallet";
    const TREASURY: &str = "collection-treasury";

    struct FakeFetcher {
        records: HashMap<String, TransactionRecord>,
    }

    #[async_trait]
    impl TransactionFetcher for FakeFetcher {
        async fn fetch_transaction(
            &self,
            tx_signature: &str,
        ) -> Result<TransactionRecord, FetchError> {
            self.records
                .get(tx_signature)
                .cloned()
                .ok_or(FetchError::NotFound)
        }
    }

    struct FlakyFetcher {
        failures_before_success: u32,
        calls: AtomicU32,
        record: TransactionRecord,
    }

    #[async_trait]
    impl TransactionFetcher for FlakyFetcher {
        async fn fetch_transaction(
            &self,
            _tx_signature: &str,
        ) -> Result<TransactionRecord, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                Err(FetchError::Transport("connection reset".to_string()))
            } else {
                Ok(self.record.clone())
            }
        }
    }

    fn payment_record(recipient: &str, lamports: i64, block_time: i64) -> TransactionRecord {
        TransactionRecord {
            slot: 100,
            block_time: Some(block_time),
            err: None,
            account_keys: vec!["payer".to_string(), recipient.to_string()],
            pre_balances: vec![10_000_000_000, 0],
            post_balances: vec![10_000_000_000 - lamports as u64, lamports as u64],
        }
    }

    async fn state_with(records: HashMap<String, TransactionRecord>) -> AppState {
        let db = Database::open_in_memory().await.unwrap();
        let collection = Collection {
            id: 0,
            name: "Apes".to_string(),
            symbol: "APE".to_string(),
            treasury_wallet: TREASURY.to_string(),
            creator_wallet: "creator".to_string(),
            mint_price_lamports: 1_000_000_000,
            base_uri: String::new(),
            created_at: None,
        };
        db.save_collection(&collection).await.unwrap();

        AppState::new(
            db,
            Arc::new(FakeFetcher { records }),
            PLATFORM.to_string(),
            MarketSettings::default(),
        )
    }

    fn mint_fee_request(signature: &str, amount: f64) -> VerifyPaymentRequest {
        VerifyPaymentRequest {
            tx_signature: signature.to_string(),
            wallet_address: "buyer-wallet".to_string(),
            payment_type: PAYMENT_TYPE_MINT_FEE.to_string(),
            expected_amount: amount,
            collection_id: Some(1),
        }
    }

    #[test]
    fn check_accepts_amount_within_tolerance() {
        let now = 1_000_000;
        let record = payment_record(TREASURY, 1_000_000_000, now - 60);

        // Exact amount and ±0.01 SOL both pass.
        assert!(check_transaction(&record, TREASURY, 1_000_000_000, now).is_ok());
        assert!(check_transaction(&record, TREASURY, 1_005_000_000, now).is_ok());
        assert!(check_transaction(&record, TREASURY, 995_000_000, now).is_ok());

        // Beyond the tolerance fails.
        let result = check_transaction(&record, TREASURY, 1_020_000_000, now);
        assert!(matches!(result, Err(VerifyFailure::AmountMismatch { .. })));
    }

    #[test]
    fn check_rejects_old_transaction_regardless_of_amount() {
        let now = 1_000_000;
        let record = payment_record(TREASURY, 1_000_000_000, now - MAX_TRANSACTION_AGE_SECS - 1);

        let result = check_transaction(&record, TREASURY, 1_000_000_000, now);
        assert!(matches!(result, Err(VerifyFailure::TooOld { .. })));
    }

    #[test]
    fn check_rejects_failed_and_unconfirmed_transactions() {
        let now = 1_000_000;

        let mut failed = payment_record(TREASURY, 1_000_000_000, now - 60);
        failed.err = Some("InstructionError(0)".to_string());
        assert!(matches!(
            check_transaction(&failed, TREASURY, 1_000_000_000, now),
            Err(VerifyFailure::ExecutionFailed(_))
        ));

        let mut unconfirmed = payment_record(TREASURY, 1_000_000_000, now - 60);
        unconfirmed.block_time = None;
        assert_eq!(
            check_transaction(&unconfirmed, TREASURY, 1_000_000_000, now),
            Err(VerifyFailure::Unconfirmed)
        );
    }

    #[test]
    fn check_rejects_absent_recipient() {
        let now = 1_000_000;
        let record = payment_record("someone-else", 1_000_000_000, now - 60);

        assert_eq!(
            check_transaction(&record, TREASURY, 1_000_000_000, now),
            Err(VerifyFailure::RecipientNotInTransaction)
        );
    }

    #[tokio::test]
    async fn same_signature_verifies_once_then_replays() {
        let now = Utc::now().timestamp();
        let mut records = HashMap::new();
        records.insert("abc".to_string(), payment_record(TREASURY, 1_000_000_000, now));
        let state = state_with(records).await;

        let request = mint_fee_request("abc", 1.0);

        let first = verify_payment(&state, &request).await.unwrap();
        assert!(first.verified);
        assert!(first.payment_id > 0);
        assert_eq!(first.receipt.recipient, TREASURY);

        let second = verify_payment(&state, &request).await.unwrap_err();
        assert_eq!(second.status_code(), StatusCode::BAD_REQUEST);
        assert!(second.to_string().contains("already been used"));

        // The critical replay event is on the audit trail.
        let events = state.db.get_security_events().await.unwrap();
        assert!(
            events
                .iter()
                .any(|e| e.event_type == "payment_replay_detected"
                    && e.severity == SEVERITY_CRITICAL)
        );
    }

    #[tokio::test]
    async fn boost_payment_resolves_platform_wallet() {
        let now = Utc::now().timestamp();
        let mut records = HashMap::new();
        records.insert("boost-sig".to_string(), payment_record(PLATFORM, 500_000_000, now));
        let state = state_with(records).await;

        let request = VerifyPaymentRequest {
            tx_signature: "boost-sig".to_string(),
            wallet_address: "seller-wallet".to_string(),
            payment_type: PAYMENT_TYPE_BOOST.to_string(),
            expected_amount: 0.5,
            collection_id: None,
        };

        let response = verify_payment(&state, &request).await.unwrap();
        assert_eq!(response.receipt.recipient, PLATFORM);
    }

    #[tokio::test]
    async fn unknown_collection_is_not_found() {
        let state = state_with(HashMap::new()).await;

        let mut request = mint_fee_request("sig", 1.0);
        request.collection_id = Some(99);

        let error = verify_payment(&state, &request).await.unwrap_err();
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_transaction_is_a_verification_failure() {
        let state = state_with(HashMap::new()).await;

        let error = verify_payment(&state, &mint_fee_request("ghost", 1.0))
            .await
            .unwrap_err();
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert!(error.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn eleventh_attempt_in_a_minute_is_rate_limited() {
        let state = state_with(HashMap::new()).await;

        for i in 0..MAX_ATTEMPTS_PER_MINUTE {
            let _ = verify_payment(&state, &mint_fee_request(&format!("sig-{i}"), 1.0)).await;
        }

        let error = verify_payment(&state, &mint_fee_request("sig-final", 1.0))
            .await
            .unwrap_err();
        assert_eq!(error.status_code(), StatusCode::TOO_MANY_REQUESTS);

        let events = state.db.get_security_events().await.unwrap();
        assert!(
            events
                .iter()
                .any(|e| e.event_type == "verification_rate_limited" && e.severity == SEVERITY_HIGH)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_are_retried_then_succeed() {
        let now = Utc::now().timestamp();
        let fetcher = FlakyFetcher {
            failures_before_success: 2,
            calls: AtomicU32::new(0),
            record: payment_record(TREASURY, 1_000_000_000, now),
        };

        let record = fetch_with_retry(&fetcher, "sig").await.unwrap();
        assert_eq!(record.balance_change(TREASURY), Some(1_000_000_000));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_are_bounded() {
        let now = Utc::now().timestamp();
        let fetcher = FlakyFetcher {
            failures_before_success: 10,
            calls: AtomicU32::new(0),
            record: payment_record(TREASURY, 1_000_000_000, now),
        };

        let error = fetch_with_retry(&fetcher, "sig").await.unwrap_err();
        assert!(matches!(error, FetchError::Transport(_)));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn validation_errors_reject_before_any_lookup() {
        let state = state_with(HashMap::new()).await;

        let mut request = mint_fee_request("sig", 1.0);
        request.payment_type = "subscription".to_string();
        let error = verify_payment(&state, &request).await.unwrap_err();
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);

        let mut request = mint_fee_request("sig", -1.0);
        request.collection_id = Some(1);
        let error = verify_payment(&state, &request).await.unwrap_err();
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);

        let mut request = mint_fee_request("sig", 1.0);
        request.collection_id = None;
        let error = verify_payment(&state, &request).await.unwrap_err();
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }
}

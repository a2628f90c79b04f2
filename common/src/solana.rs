use std::str::FromStr;

use async_trait::async_trait;
use solana_client::client_error::ClientErrorKind;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::signature::Signature;
use solana_transaction_status::{EncodedTransaction, UiMessage, UiTransactionEncoding};

/// The slice of a confirmed transaction that payment verification needs.
/// Balances are index-aligned with `account_keys`.
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub slot: u64,
    pub block_time: Option<i64>,
    pub err: Option<String>,
    pub account_keys: Vec<String>,
    pub pre_balances: Vec<u64>,
    pub post_balances: Vec<u64>,
}

impl TransactionRecord {
    /// Lamport balance change of `address` in this transaction, or None
    /// if the address was not involved.
    pub fn balance_change(&self, address: &str) -> Option<i64> {
        let index = self.account_keys.iter().position(|key| key == address)?;
        let pre = *self.pre_balances.get(index)? as i64;
        let post = *self.post_balances.get(index)? as i64;
        Some(post - pre)
    }
}

/// Transport failures are kept apart from "no such transaction" so the
/// caller can retry the former without mistaking an RPC hiccup for a
/// bogus signature.
#[derive(Debug)]
pub enum FetchError {
    NotFound,
    Transport(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::NotFound => write!(f, "transaction not found"),
            FetchError::Transport(msg) => write!(f, "rpc transport error: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}

#[async_trait]
pub trait TransactionFetcher: Send + Sync {
    async fn fetch_transaction(&self, tx_signature: &str) -> Result<TransactionRecord, FetchError>;
}

pub struct SolanaRpc {
    client: RpcClient,
}

impl SolanaRpc {
    pub fn new(rpc_url: &str) -> Self {
        Self {
            client: RpcClient::new(rpc_url.to_string()),
        }
    }
}

#[async_trait]
impl TransactionFetcher for SolanaRpc {
    async fn fetch_transaction(&self, tx_signature: &str) -> Result<TransactionRecord, FetchError> {
        let signature = Signature::from_str(tx_signature).map_err(|_| FetchError::NotFound)?;

        let confirmed = self
            .client
            .get_transaction(&signature, UiTransactionEncoding::Json)
            .await
            .map_err(|e| match &e.kind {
                ClientErrorKind::Io(_) | ClientErrorKind::Reqwest(_) => {
                    FetchError::Transport(e.to_string())
                }
                _ => FetchError::NotFound,
            })?;

        let meta = confirmed.transaction.meta.ok_or_else(|| {
            FetchError::Transport("transaction metadata missing in RPC response".to_string())
        })?;

        let account_keys = match &confirmed.transaction.transaction {
            EncodedTransaction::Json(ui_tx) => match &ui_tx.message {
                UiMessage::Raw(raw) => raw.account_keys.clone(),
                UiMessage::Parsed(parsed) => parsed
                    .account_keys
                    .iter()
                    .map(|key| key.pubkey.clone())
                    .collect(),
            },
            _ => {
                return Err(FetchError::Transport(
                    "unexpected transaction encoding in RPC response".to_string(),
                ));
            }
        };

        Ok(TransactionRecord {
            slot: confirmed.slot,
            block_time: confirmed.block_time,
            err: meta.err.map(|e| e.to_string()),
            account_keys,
            pre_balances: meta.pre_balances,
            post_balances: meta.post_balances,
        })
    }
}

use std::time::Duration;

use common::{
    CreateMintJobRequest, ErrorResponse, Like, LikeRequest, LikeResponse, MintJobStatusResponse,
    VerifyPaymentRequest, VerifyPaymentResponse,
};
use serde::Serialize;
use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(String),

    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid response body: {0}")]
    Decode(String),
}

/// JSON client for the marketplace service.
pub struct MarketApi {
    http: reqwest::Client,
    base_url: String,
}

impl MarketApi {
    /// Create a client targeting the given base URL (e.g.
    /// `http://127.0.0.1:8080`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ClientError::Http(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn verify_payment(
        &self,
        request: &VerifyPaymentRequest,
    ) -> Result<VerifyPaymentResponse, ClientError> {
        self.post_json("/payments/verify", request).await
    }

    pub async fn toggle_like(&self, request: &LikeRequest) -> Result<LikeResponse, ClientError> {
        self.post_json("/likes", request).await
    }

    pub async fn create_mint_job(
        &self,
        request: &CreateMintJobRequest,
    ) -> Result<MintJobStatusResponse, ClientError> {
        self.post_json("/mint-jobs", request).await
    }

    pub async fn mint_job_status(&self, job_id: i64) -> Result<MintJobStatusResponse, ClientError> {
        self.get_json(&format!("/mint-jobs/{job_id}")).await
    }

    /// The wallet's server-confirmed likes, for seeding a
    /// [`crate::LikeReconciler`].
    pub async fn wallet_likes(&self, wallet: &str) -> Result<Vec<Like>, ClientError> {
        self.get_json(&format!("/wallets/{wallet}/likes")).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;
        Self::decode(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorResponse>()
                .await
                .map(|body| body.error)
                .unwrap_or_else(|_| status.to_string());
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

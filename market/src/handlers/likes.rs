use std::str::FromStr;

use actix_web::{HttpResponse, get, post, web};
use common::{
    ACTION_LIKE, ACTION_UNLIKE, LikeCountResponse, LikeRequest, LikeResponse, is_known_target_type,
    like_message,
};
use solana_sdk::{pubkey::Pubkey, signature::Signature};

use crate::error::ApiError;
use crate::state::AppState;

/// Identity is wallet-based: the request carries the wallet's ed25519
/// signature over the canonical like message. Duplicate likes and
/// absent unlikes come back as `success: false` with a code rather than
/// an HTTP error, so the client reconciler treats them as confirmation.
#[post("/likes")]
pub async fn toggle_like(
    request: web::Json<LikeRequest>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    if !is_known_target_type(&request.target_type) {
        return Err(ApiError::Validation(
            "Target type must be either 'nft' or 'collection'.".to_string(),
        ));
    }
    if !matches!(request.action.as_str(), ACTION_LIKE | ACTION_UNLIKE) {
        return Err(ApiError::Validation(
            "Action must be either 'like' or 'unlike'.".to_string(),
        ));
    }

    verify_like_signature(&request)?;

    let response = match request.action.as_str() {
        ACTION_LIKE => {
            let created = app_state
                .db
                .insert_like(&request.wallet_address, &request.target_type, request.target_id)
                .await?;
            if created {
                LikeResponse {
                    success: true,
                    code: None,
                    message: None,
                }
            } else {
                LikeResponse {
                    success: false,
                    code: Some("already_liked".to_string()),
                    message: Some("You already liked this.".to_string()),
                }
            }
        }
        _ => {
            let removed = app_state
                .db
                .delete_like(&request.wallet_address, &request.target_type, request.target_id)
                .await?;
            if removed {
                LikeResponse {
                    success: true,
                    code: None,
                    message: None,
                }
            } else {
                LikeResponse {
                    success: false,
                    code: Some("not_liked".to_string()),
                    message: Some("You have not liked this.".to_string()),
                }
            }
        }
    };

    Ok(HttpResponse::Ok().json(response))
}

/// Everything a wallet has liked. Clients use this to seed the
/// reconciler's server-confirmed set.
#[get("/wallets/{wallet}/likes")]
pub async fn wallet_likes(
    path: web::Path<String>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let wallet = path.into_inner();
    let likes = app_state.db.get_likes_by_wallet(&wallet).await?;
    Ok(HttpResponse::Ok().json(likes))
}

#[get("/likes/{target_type}/{target_id}/count")]
pub async fn like_count(
    path: web::Path<(String, i64)>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let (target_type, target_id) = path.into_inner();
    if !is_known_target_type(&target_type) {
        return Err(ApiError::Validation(
            "Target type must be either 'nft' or 'collection'.".to_string(),
        ));
    }

    let count = app_state.db.count_likes(&target_type, target_id).await?;

    Ok(HttpResponse::Ok().json(LikeCountResponse {
        target_type,
        target_id,
        count,
    }))
}

fn verify_like_signature(request: &LikeRequest) -> Result<(), ApiError> {
    let pubkey = Pubkey::from_str(&request.wallet_address)
        .map_err(|_| ApiError::Auth("Wallet address is not a valid public key.".to_string()))?;
    let signature = Signature::from_str(&request.signature)
        .map_err(|_| ApiError::Auth("Signature is not a valid base58 signature.".to_string()))?;

    let message = like_message(&request.action, &request.target_type, request.target_id);
    if !signature.verify(pubkey.as_ref(), message.as_bytes()) {
        return Err(ApiError::Auth(
            "Signature does not match the wallet.".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use actix_web::{App, test};
    use common::{Database, FetchError, TARGET_NFT, TransactionFetcher, TransactionRecord};
    use solana_sdk::{signature::Keypair, signer::Signer};

    use super::*;
    use crate::config::MarketSettings;

    struct NoChain;

    #[async_trait::async_trait]
    impl TransactionFetcher for NoChain {
        async fn fetch_transaction(&self, _: &str) -> Result<TransactionRecord, FetchError> {
            Err(FetchError::NotFound)
        }
    }

    async fn test_state() -> web::Data<AppState> {
        let db = Database::open_in_memory().await.unwrap();
        web::Data::new(AppState::new(
            db,
            Arc::new(NoChain),
            "platform".to_string(),
            MarketSettings::default(),
        ))
    }

    fn signed_request(wallet: &Keypair, action: &str, target_id: i64) -> LikeRequest {
        let message = like_message(action, TARGET_NFT, target_id);
        LikeRequest {
            wallet_address: wallet.pubkey().to_string(),
            signature: wallet.sign_message(message.as_bytes()).to_string(),
            target_type: TARGET_NFT.to_string(),
            target_id,
            action: action.to_string(),
        }
    }

    #[actix_web::test]
    async fn like_then_duplicate_then_unlike() {
        let state = test_state().await;
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .service(toggle_like)
                .service(like_count),
        )
        .await;

        let wallet = Keypair::new();

        let req = test::TestRequest::post()
            .uri("/likes")
            .set_json(signed_request(&wallet, ACTION_LIKE, 42))
            .to_request();
        let body: LikeResponse = test::call_and_read_body_json(&app, req).await;
        assert!(body.success);

        let req = test::TestRequest::post()
            .uri("/likes")
            .set_json(signed_request(&wallet, ACTION_LIKE, 42))
            .to_request();
        let body: LikeResponse = test::call_and_read_body_json(&app, req).await;
        assert!(!body.success);
        assert_eq!(body.code.as_deref(), Some("already_liked"));

        let req = test::TestRequest::get()
            .uri("/likes/nft/42/count")
            .to_request();
        let body: LikeCountResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.count, 1);

        let req = test::TestRequest::post()
            .uri("/likes")
            .set_json(signed_request(&wallet, ACTION_UNLIKE, 42))
            .to_request();
        let body: LikeResponse = test::call_and_read_body_json(&app, req).await;
        assert!(body.success);

        let req = test::TestRequest::get()
            .uri("/likes/nft/42/count")
            .to_request();
        let body: LikeCountResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.count, 0);
    }

    #[actix_web::test]
    async fn forged_signature_is_unauthorized() {
        let state = test_state().await;
        let app = test::init_service(App::new().app_data(state.clone()).service(toggle_like)).await;

        let wallet = Keypair::new();
        let other = Keypair::new();

        // Signed by a different key than the claimed wallet.
        let mut request = signed_request(&other, ACTION_LIKE, 42);
        request.wallet_address = wallet.pubkey().to_string();

        let req = test::TestRequest::post()
            .uri("/likes")
            .set_json(request)
            .to_request();
        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), actix_web::http::StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn signature_over_wrong_action_is_rejected() {
        let state = test_state().await;
        let app = test::init_service(App::new().app_data(state.clone()).service(toggle_like)).await;

        let wallet = Keypair::new();

        // Signature covers "like" but the request says "unlike", so a
        // captured signature cannot be replayed for the other action.
        let mut request = signed_request(&wallet, ACTION_LIKE, 42);
        request.action = ACTION_UNLIKE.to_string();

        let req = test::TestRequest::post()
            .uri("/likes")
            .set_json(request)
            .to_request();
        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), actix_web::http::StatusCode::UNAUTHORIZED);
    }
}

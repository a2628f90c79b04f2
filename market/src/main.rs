mod config;
mod error;
mod handlers;
mod minting;
mod rate_limit;
mod state;
mod verification;

use std::sync::Arc;

use actix_jwt_auth_middleware::{Authority, TokenSigner, use_jwt::UseJWTOnApp};
use actix_state_guards::UseStateGuardOnScope;
use actix_web::{
    App, HttpServer, error::InternalError, http::StatusCode, middleware::Logger, web,
};
use common::{AdminUser, Database, NftMinter, SolanaRpc};
use dotenv::dotenv;
use ed25519_compact::KeyPair;
use jwt_compact::alg::Ed25519;
use pretty_env_logger::env_logger::{Builder, Env};

use crate::config::{AppConfig, MarketSettings};
use crate::state::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    if cli::run_cli().await {
        return Ok(());
    }

    let logger_env = Env::default().default_filter_or("debug");
    let mut logger_builder = Builder::from_env(logger_env);
    logger_builder.init();

    let config = AppConfig::from_env().map_err(|e| {
        log::error!("Application initialization failed: {:#}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;

    let settings = match MarketSettings::from_yaml_file(&config.settings_yaml).await {
        Ok(settings) => settings,
        Err(e) => {
            log::warn!("Falling back to default settings: {:#}", e);
            MarketSettings::default()
        }
    };

    let db = Database::new(&config.database_url).await.map_err(|e| {
        log::error!("Application initialization failed: {:#}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;
    log::info!("Database initialized successfully");

    let platform_keypair =
        solana_sdk::signature::Keypair::from_base58_string(&config.platform_wallet);
    let minter = Arc::new(NftMinter::new(&config.rpc_url, platform_keypair));
    let platform_wallet = minter.payer_pubkey().to_string();
    log::info!("Platform wallet: {}", platform_wallet);

    let state = AppState::new(
        db,
        Arc::new(SolanaRpc::new(&config.rpc_url)),
        platform_wallet,
        settings,
    );

    state
        .initialize_data_from_files(&config.collections_csv)
        .await
        .map_err(|e| {
            log::error!("Data initialization failed: {:#}", e);
            std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
        })?;

    log::info!("Collections seeded successfully");

    let bind_address = state.settings.bind_address.clone();
    let data = web::Data::new(state);

    // Spawn the mint worker
    {
        let worker_state = data.clone();
        let worker_minter = minter.clone();
        tokio::spawn(async move {
            minting::start_mint_worker(worker_state, worker_minter).await;
        });
    }

    //Authorization
    let KeyPair {
        pk: public_key,
        sk: secret_key,
    } = KeyPair::generate();

    HttpServer::new(move || {
        let authority = Authority::<AdminUser, Ed25519, _, _>::new()
            .refresh_authorizer(|| async move { Ok(()) })
            .token_signer(Some(
                TokenSigner::new()
                    .signing_key(secret_key.clone())
                    .algorithm(Ed25519)
                    .build()
                    .expect("Failed to generate TokenSigner"),
            ))
            .verifying_key(public_key)
            .build()
            .expect("Failed to create Authority");

        App::new()
            .app_data(data.clone())
            .wrap(Logger::new("%a %t %r %s  %{Referer}i %Dms"))
            .service(handlers::index)
            .service(handlers::login)
            .service(handlers::verify_payment)
            .service(handlers::toggle_like)
            .service(handlers::like_count)
            .service(handlers::wallet_likes)
            .service(handlers::create_mint_job)
            .service(handlers::get_mint_job)
            .service(handlers::get_collections)
            .service(handlers::get_collection_by_id)
            .use_jwt(
                authority,
                web::scope("/admin").use_state_guard(
                    |user: AdminUser| async move {
                        if user.is_superuser() {
                            Ok(())
                        } else {
                            Err(InternalError::new(
                                "Administrator privileges required",
                                StatusCode::UNAUTHORIZED,
                            ))
                        }
                    },
                    web::scope("")
                        .service(handlers::get_payments)
                        .service(handlers::get_security_events)
                        .service(handlers::get_all_mint_jobs),
                ),
            )
    })
    .bind(bind_address)?
    .run()
    .await
}

use actix_jwt_auth_middleware::TokenSigner;
use actix_web::Error;
use actix_web::{HttpResponse, error::InternalError, http::StatusCode, post, web};
use common::AdminUser;
use jwt_compact::alg::Ed25519;

use crate::state::AppState;

#[derive(Debug, serde::Deserialize)]
pub struct LoginData {
    pub username: String,
    pub password: String,
}

#[post("/login")]
pub async fn login(
    login_data: web::Json<LoginData>,
    app_state: web::Data<AppState>,
    cookie_signer: web::Data<TokenSigner<AdminUser, Ed25519>>,
) -> Result<HttpResponse, Error> {
    let maybe_user = app_state
        .db
        .get_admin_user(&login_data.username)
        .await
        .map_err(|e| {
            log::error!("Failed to look up user {}: {:#}", login_data.username, e);
            InternalError::new(
                "Failed to look up user. Please try again later.",
                StatusCode::INTERNAL_SERVER_ERROR,
            )
        })?;

    let user = match maybe_user {
        Some(user) => user,
        None => {
            log::warn!("Login attempt for unknown user {}", login_data.username);
            return Ok(HttpResponse::Unauthorized().body("Invalid username or password"));
        }
    };

    if let Err(err) = user.verify_password(&login_data.password) {
        log::warn!(
            "Invalid password for user {}: {:?}",
            login_data.username,
            err
        );
        return Ok(HttpResponse::Unauthorized().body("Invalid username or password"));
    }

    let access_cookie = cookie_signer.create_access_cookie(&user).map_err(|err| {
        log::error!("Failed to create access token: {:?}", err);
        InternalError::new("Token error", StatusCode::INTERNAL_SERVER_ERROR)
    })?;

    let refresh_cookie = cookie_signer.create_refresh_cookie(&user).map_err(|err| {
        log::error!("Failed to create refresh token: {:?}", err);
        InternalError::new("Token error", StatusCode::INTERNAL_SERVER_ERROR)
    })?;

    Ok(HttpResponse::Ok()
        .cookie(access_cookie)
        .cookie(refresh_cookie)
        .body("Login successful."))
}

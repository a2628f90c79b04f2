use actix_web::{HttpResponse, post, web};
use common::VerifyPaymentRequest;

use crate::error::ApiError;
use crate::state::AppState;
use crate::verification;

#[post("/payments/verify")]
pub async fn verify_payment(
    request: web::Json<VerifyPaymentRequest>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let response = verification::verify_payment(&app_state, &request).await?;
    Ok(HttpResponse::Ok().json(response))
}

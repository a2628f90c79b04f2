use actix_web::{HttpResponse, get, post, web};
use common::{CreateMintJobRequest, MintJob, MintJobStatusResponse, PAYMENT_TYPE_MINT_FEE};

use crate::error::ApiError;
use crate::state::AppState;

/// Largest batch a single job may mint.
const MAX_JOB_QUANTITY: i64 = 100;

/// A job is only accepted against a verified mint-fee payment for the
/// same wallet and collection, and each payment backs at most one job.
#[post("/mint-jobs")]
pub async fn create_mint_job(
    request: web::Json<CreateMintJobRequest>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    if request.quantity < 1 || request.quantity > MAX_JOB_QUANTITY {
        return Err(ApiError::Validation(format!(
            "Quantity must be between 1 and {}.",
            MAX_JOB_QUANTITY
        )));
    }
    if request.wallet_address.trim().is_empty() {
        return Err(ApiError::Validation(
            "Wallet address is required.".to_string(),
        ));
    }

    let collection = app_state
        .db
        .get_collection(request.collection_id)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("Collection {} not found.", request.collection_id))
        })?;

    let payment = app_state
        .db
        .get_verified_payment(
            &request.payment_signature,
            &request.wallet_address,
            PAYMENT_TYPE_MINT_FEE,
        )
        .await?
        .ok_or_else(|| {
            ApiError::Validation(
                "No verified mint fee payment found for this wallet and signature.".to_string(),
            )
        })?;

    if payment.collection_id != Some(collection.id) {
        return Err(ApiError::Validation(
            "The mint fee payment was made for a different collection.".to_string(),
        ));
    }

    if app_state
        .db
        .get_mint_job_by_payment(&request.payment_signature)
        .await?
        .is_some()
    {
        return Err(ApiError::Validation(
            "This payment already backs a mint job.".to_string(),
        ));
    }

    let job = MintJob::new(
        collection.id,
        request.wallet_address.clone(),
        request.payment_signature.clone(),
        request.quantity,
    );
    let job_id = app_state.db.create_mint_job(&job).await?;

    job_status_response(&app_state, job_id).await
}

/// The polling surface: the job row, its items and their mint addresses
/// once populated.
#[get("/mint-jobs/{job_id}")]
pub async fn get_mint_job(
    path: web::Path<i64>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let job_id = path.into_inner();
    job_status_response(&app_state, job_id).await
}

async fn job_status_response(
    app_state: &web::Data<AppState>,
    job_id: i64,
) -> Result<HttpResponse, ApiError> {
    let job = app_state
        .db
        .get_mint_job(job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Mint job {} not found.", job_id)))?;
    let items = app_state.db.get_mint_job_items(job_id).await?;

    Ok(HttpResponse::Ok().json(MintJobStatusResponse { job, items }))
}

use actix_web::{HttpResponse, get, web};

use crate::error::ApiError;
use crate::state::AppState;

#[get("/collections")]
pub async fn get_collections(app_state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let collections = app_state.db.get_collections().await?;
    Ok(HttpResponse::Ok().json(collections))
}

#[get("/collections/{collection_id}")]
pub async fn get_collection_by_id(
    path: web::Path<i64>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let collection_id = path.into_inner();

    let collection = app_state
        .db
        .get_collection(collection_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Collection {} not found.", collection_id)))?;

    Ok(HttpResponse::Ok().json(collection))
}

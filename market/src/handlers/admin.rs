use actix_web::{Error, HttpResponse, error::InternalError, get, http::StatusCode, web};
use serde::Deserialize;

use crate::state::AppState;

#[get("/payments")]
pub async fn get_payments(app_state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let payments = app_state.db.get_all_payments().await.map_err(|e| {
        log::error!("Failed to get payments: {}", e);
        InternalError::new(
            "Failed to get payments. Please try again later.",
            StatusCode::INTERNAL_SERVER_ERROR,
        )
    })?;

    Ok(HttpResponse::Ok().json(payments))
}

#[derive(Debug, Deserialize)]
struct SecurityEventQuery {
    #[serde(default)]
    severity: Option<String>,
}

#[get("/security-events")]
pub async fn get_security_events(
    query: web::Query<SecurityEventQuery>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    // Validate `severity` if provided
    if let Some(ref severity) = query.severity {
        let valid_severities = ["info", "medium", "high", "critical"];
        if !valid_severities.contains(&severity.as_str()) {
            return Err(InternalError::new(
                "Severity must be one of 'info', 'medium', 'high', or 'critical'.",
                StatusCode::BAD_REQUEST,
            )
            .into());
        }
    }

    let events = app_state.db.get_security_events().await.map_err(|e| {
        log::error!("Failed to get security events: {}", e);
        InternalError::new(
            "Failed to get security events. Please try again later.",
            StatusCode::INTERNAL_SERVER_ERROR,
        )
    })?;

    let events: Vec<_> = match query.severity.as_deref() {
        Some(severity) => events
            .into_iter()
            .filter(|event| event.severity == severity)
            .collect(),
        None => events,
    };

    Ok(HttpResponse::Ok().json(events))
}

#[get("/mint-jobs")]
pub async fn get_all_mint_jobs(app_state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let jobs = app_state.db.get_mint_jobs().await.map_err(|e| {
        log::error!("Failed to get mint jobs: {}", e);
        InternalError::new(
            "Failed to get mint jobs. Please try again later.",
            StatusCode::INTERNAL_SERVER_ERROR,
        )
    })?;

    Ok(HttpResponse::Ok().json(jobs))
}

//! Request handlers.
//!
//! Empty results are answered with a `warning` envelope and 404, never with
//! an error; only failures to scrape or to reach the store are errors.

use axum::extract::{OriginalUri, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use remit_rates::store::DEFAULT_HISTORY_LIMIT;

use super::state::SharedState;
use crate::types::{ApiError, ApiResult, PathError, PublicRate, Status};

/// Upper bound on `?limit=` for history queries.
pub const MAX_HISTORY_LIMIT: usize = 1000;

fn warning(message: &str, key: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "status": Status::Warning,
            "message": message,
            key: [],
        })),
    )
        .into_response()
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn test() -> Json<Value> {
    Json(json!({
        "status": Status::Success,
        "message": "API is up",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Run every provider now and return what was scraped, without saving.
pub async fn test_scraper(
    State(state): State<SharedState>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<Response> {
    let report = state
        .orchestrator
        .scrape_report()
        .await
        .map_err(|e| ApiError::from(e).at(uri.path()))?;

    if report.quotes.is_empty() {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({
                "status": Status::Warning,
                "message": "No rates found",
                "results": [],
                "failures": report.failures,
            })),
        )
            .into_response());
    }

    Ok(Json(json!({
        "status": Status::Success,
        "results": report.quotes,
        "failures": report.failures,
    }))
    .into_response())
}

/// Raw rows of the latest stored batch.
pub async fn test_db(
    State(state): State<SharedState>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<Response> {
    let rows = state
        .with_store(|store| store.latest_rates())
        .await
        .map_err(|e| ApiError::from(e).at(uri.path()))?;

    if rows.is_empty() {
        return Ok(warning("No rates in the database", "rates"));
    }
    Ok(Json(json!({ "status": Status::Success, "rates": rows })).into_response())
}

/// Latest stored rates.
pub async fn get_rates(
    State(state): State<SharedState>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<Response> {
    let rows = state
        .with_store(|store| store.latest_rates())
        .await
        .map_err(|e| ApiError::from(e).at(uri.path()))?;

    if rows.is_empty() {
        return Ok(warning("No rates available", "rates"));
    }
    let rates: Vec<PublicRate> = rows.into_iter().map(PublicRate::from).collect();
    Ok(Json(json!({ "status": Status::Success, "rates": rates })).into_response())
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

/// Stored history of one provider, newest first.
pub async fn rates_history(
    State(state): State<SharedState>,
    OriginalUri(uri): OriginalUri,
    Path(service): Path<String>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Response> {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if limit == 0 {
        return Err(ApiError::BadRequest("limit must be at least 1".into()).at(uri.path()));
    }
    let limit = limit.min(MAX_HISTORY_LIMIT);

    let lookup = service.clone();
    let rows = state
        .with_store(move |store| store.rates_history(&lookup, limit))
        .await
        .map_err(|e| ApiError::from(e).at(uri.path()))?;

    let rates: Vec<PublicRate> = rows.into_iter().map(PublicRate::from).collect();
    Ok(Json(json!({
        "status": Status::Success,
        "service": service,
        "rates": rates,
    }))
    .into_response())
}

/// Scrape, save the new batch, and return the latest stored rates.
pub async fn refresh_rates(
    State(state): State<SharedState>,
    OriginalUri(uri): OriginalUri,
) -> ApiResult<Response> {
    let path = uri.path();
    let quotes = state
        .orchestrator
        .scrape_all_rates()
        .await
        .map_err(|e| ApiError::from(e).at(path))?;

    if quotes.is_empty() {
        return Ok(warning("No new rates found", "rates"));
    }

    let saved = state
        .with_store(move |store| store.save_rates(&quotes))
        .await
        .map_err(|e| ApiError::from(e).at(path))?;
    let rows = state
        .with_store(|store| store.latest_rates())
        .await
        .map_err(|e| ApiError::from(e).at(path))?;

    tracing::info!(saved, "rates refreshed");
    Ok(Json(json!({
        "status": Status::Success,
        "message": format!("{saved} rates updated"),
        "rates": rows,
    }))
    .into_response())
}

pub async fn not_found(OriginalUri(uri): OriginalUri) -> PathError {
    ApiError::NotFound("no such route".into()).at(uri.path())
}

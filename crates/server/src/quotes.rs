use axum::{
    extract::{Path, State},
    Json,
};
use lynco_core::domain::quote::{QuoteId, QuoteSummary};
use lynco_core::lifecycle::{CreateQuoteInput, CreatedQuote, QuoteDetail, StatusUpdateInput};
use serde::Serialize;

use crate::api::{Ack, ApiError, ApiJson, AppState, CorrelationId};

#[derive(Debug, Serialize)]
pub struct QuoteList {
    pub quotes: Vec<QuoteSummary>,
}

pub async fn create(
    State(state): State<AppState>,
    correlation: CorrelationId,
    ApiJson(input): ApiJson<CreateQuoteInput>,
) -> Result<Json<CreatedQuote>, ApiError> {
    state
        .lifecycle()
        .create(&input)
        .await
        .map(Json)
        .map_err(|error| state.reject(error, &correlation))
}

pub async fn list(
    State(state): State<AppState>,
    correlation: CorrelationId,
) -> Result<Json<QuoteList>, ApiError> {
    let quotes =
        state.lifecycle().list().await.map_err(|error| state.reject(error, &correlation))?;
    Ok(Json(QuoteList { quotes }))
}

pub async fn detail(
    State(state): State<AppState>,
    correlation: CorrelationId,
    Path(id): Path<String>,
) -> Result<Json<QuoteDetail>, ApiError> {
    state
        .lifecycle()
        .fetch_internal(&QuoteId(id))
        .await
        .map(Json)
        .map_err(|error| state.reject(error, &correlation))
}

pub async fn update_status(
    State(state): State<AppState>,
    correlation: CorrelationId,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<StatusUpdateInput>,
) -> Result<Json<Ack>, ApiError> {
    state
        .lifecycle()
        .update_status(&QuoteId(id), &input)
        .await
        .map_err(|error| state.reject(error, &correlation))?;
    Ok(Json(Ack { ok: true }))
}

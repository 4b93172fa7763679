use crate::{error::AppError, prediction::TextPrediction, server::AppState};
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::Value;
use std::time::Instant;
use tracing::instrument;

const ROUTE: &str = "/predict-text";

#[instrument(skip(state, payload))]
pub async fn predict_text(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<TextPrediction>, AppError> {
    state.metrics.record_request(ROUTE);
    let Json(body) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let text = body
        .get("text")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::BadRequest("Missing 'text' field".to_string()))?;

    let start = Instant::now();
    let prediction = state.text.predict(text).await?;
    state
        .metrics
        .record_prediction_duration(start.elapsed().as_millis() as u64, ROUTE);

    tracing::info!("Text classified as {:?}", prediction.prediction);
    Ok(Json(prediction))
}

use crate::{error::AppError, server::AppState};
use axum::extract::State;
use prometheus::{Encoder, TextEncoder};

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, AppError> {
    let metric_families = state.metrics.registry.gather();

    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| AppError::Metrics(e.to_string()))?;

    String::from_utf8(buffer).map_err(|e| AppError::Metrics(e.to_string()))
}

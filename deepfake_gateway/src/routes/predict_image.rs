use crate::{
    error::AppError, prediction::ImagePrediction, routes::upload::take_file_field,
    server::AppState,
};
use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use std::time::Instant;
use tracing::instrument;

const ROUTE: &str = "/predict-image";

#[instrument(skip(state, multipart))]
pub async fn predict_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ImagePrediction>, AppError> {
    state.metrics.record_request(ROUTE);
    let upload = take_file_field(multipart, "file").await?;
    tracing::debug!(
        "Received image {:?} ({} bytes)",
        upload.file_name,
        upload.bytes.len()
    );

    let start = Instant::now();
    let prediction = state.image.predict(&upload.bytes).await?;
    state
        .metrics
        .record_prediction_duration(start.elapsed().as_millis() as u64, ROUTE);

    Ok(Json(prediction))
}

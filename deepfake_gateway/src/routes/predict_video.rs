use crate::{
    error::AppError, prediction::VideoPrediction, routes::upload::take_file_field,
    server::AppState,
};
use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use std::time::Instant;
use tracing::instrument;

const ROUTE: &str = "/predict-video";

#[instrument(skip(state, multipart))]
pub async fn predict_video(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<VideoPrediction>, AppError> {
    state.metrics.record_request(ROUTE);
    let upload = take_file_field(multipart, "video").await?;

    let start = Instant::now();
    let analysis = state
        .video
        .predict(&upload.bytes, upload.file_name.as_deref())
        .await?;
    state
        .metrics
        .record_prediction_duration(start.elapsed().as_millis() as u64, ROUTE);
    state.metrics.record_sampled_frames(analysis.frames_sampled);

    Ok(Json(analysis.prediction))
}

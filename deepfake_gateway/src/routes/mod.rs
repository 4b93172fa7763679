mod health;
mod metrics;
mod predict_image;
mod predict_text;
mod predict_video;
mod progress_ws;
mod upload;

use crate::server::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub use health::healthcheck;
pub use metrics::metrics_handler;
pub use predict_image::predict_image;
pub use predict_text::predict_text;
pub use predict_video::predict_video;
pub use progress_ws::progress_ws;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/predict-text", post(predict_text))
        .route("/predict-image", post(predict_image))
        .route("/predict-video", post(predict_video))
        .route("/ws", get(progress_ws))
        .route("/health", get(healthcheck))
        .route("/metrics", get(metrics_handler))
}

use crate::server::AppState;
use axum::{extract::State, response::IntoResponse, response::Json};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
pub struct Status {
    status: String,
    progress_listeners: usize,
}

pub async fn healthcheck(State(state): State<AppState>) -> impl IntoResponse {
    Json(Status {
        status: "Available".into(),
        progress_listeners: state.progress.listener_count(),
    })
}

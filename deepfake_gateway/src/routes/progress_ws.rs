use crate::{
    progress::{ProgressEvent, WsMessage},
    server::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};

pub async fn progress_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let receiver = state.progress.subscribe();
    ws.on_upgrade(move |socket| forward_progress(socket, receiver))
}

async fn forward_progress(
    socket: WebSocket,
    mut receiver: broadcast::Receiver<ProgressEvent>,
) {
    let (mut sender, mut incoming) = socket.split();
    tracing::debug!("Progress listener connected");

    loop {
        tokio::select! {
            event = receiver.recv() => match event {
                Ok(event) => {
                    let payload = match serde_json::to_string(&WsMessage::Progress(event)) {
                        Ok(payload) => payload,
                        Err(e) => {
                            tracing::error!("Failed to serialize progress event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Progress listener lagged by {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            message = incoming.next() => match message {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::debug!("Progress listener disconnected");
}

use crate::config::Config;
use crate::prediction::{
    ImagePredictionAdapter, RandomBreakdown, TextPredictionAdapter, VideoPredictionAdapter,
};
use crate::progress::ProgressHub;
use crate::server::{AppState, HttpServer};
use crate::telemetry::Metrics;
use crate::video_source::OpenCvFrameExtractor;

use deepfake_models::{OrtImageClassifier, OrtVideoClassifier, TfidfTextClassifier};
use std::{error::Error, sync::Arc};
use tokio::{signal, sync::broadcast};

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let text_classifier = match TfidfTextClassifier::load(&config.models.text) {
        Ok(model) => Arc::new(model),
        Err(e) => {
            tracing::error!("Failed to load text model: {:?}", e);
            return Err(Box::new(e));
        }
    };

    let image_classifier = match OrtImageClassifier::new(&config.models.image) {
        Ok(model) => Arc::new(model),
        Err(e) => {
            tracing::error!("Failed to load image model: {:?}", e);
            return Err(Box::new(e));
        }
    };

    let video_classifier = match OrtVideoClassifier::new(&config.models.video) {
        Ok(model) => Arc::new(model),
        Err(e) => {
            tracing::error!("Failed to load video model: {:?}", e);
            return Err(Box::new(e));
        }
    };
    tracing::info!("Models loaded");

    let progress = ProgressHub::new(config.progress.capacity);
    let metrics = Arc::new(Metrics::new()?);

    let state = AppState {
        text: TextPredictionAdapter::new(text_classifier),
        image: ImagePredictionAdapter::new(image_classifier, Arc::new(RandomBreakdown)),
        video: VideoPredictionAdapter::new(
            video_classifier,
            Arc::new(OpenCvFrameExtractor),
            progress.clone(),
            config.video.sample_request()?,
            config.video.scratch_dir.clone(),
        ),
        progress,
        metrics,
    };

    let server = HttpServer::new(state, &config.server, &config.static_dir).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_handle = server.run(shutdown_tx.subscribe()).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    match server_handle.await {
        Ok(Err(e)) => tracing::error!("Server exited with error: {:?}", e),
        Err(e) => tracing::error!("Server task failed: {:?}", e),
        Ok(Ok(())) => {}
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

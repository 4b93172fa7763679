use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use deepfake_gateway::{
    config::ServerConfig,
    prediction::{
        Breakdown, BreakdownSource, ImagePredictionAdapter, TextPredictionAdapter,
        VideoPredictionAdapter,
    },
    progress::ProgressHub,
    sampler::{FrameExtractor, FrameSampler, SampleRequest, SampledFrame, VideoSource},
    server::{build_router, AppState},
    telemetry::Metrics,
    OpenCvFrameExtractor,
};
use deepfake_models::{
    ClassProbabilities, ImageClassifier, ModelError, TextClassifier, VideoClassifier,
};
use image::RgbImage;
use serde_json::Value;
use std::{
    io::Cursor,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};
use tower::ServiceExt;

const BOUNDARY: &str = "deepfake-test-boundary";

struct FixedText(Vec<f32>);

#[async_trait]
impl TextClassifier for FixedText {
    async fn classify(&self, _text: &str) -> Result<ClassProbabilities, ModelError> {
        Ok(ClassProbabilities::new(self.0.clone()))
    }
}

struct FixedImage(Vec<f32>);

#[async_trait]
impl ImageClassifier for FixedImage {
    async fn classify(&self, _image: RgbImage) -> Result<ClassProbabilities, ModelError> {
        Ok(ClassProbabilities::new(self.0.clone()))
    }
}

struct FixedVideo {
    probabilities: Vec<f32>,
    frames_seen: Arc<AtomicUsize>,
}

#[async_trait]
impl VideoClassifier for FixedVideo {
    async fn classify(&self, frames: Vec<RgbImage>) -> Result<ClassProbabilities, ModelError> {
        if frames.is_empty() {
            return Err(ModelError::EmptyInput);
        }
        self.frames_seen.store(frames.len(), Ordering::SeqCst);
        Ok(ClassProbabilities::new(self.probabilities.clone()))
    }
}

/// In-memory clip of `total` solid frames.
struct SolidClip {
    total: usize,
    position: Option<usize>,
}

impl VideoSource for SolidClip {
    type Error = String;

    fn frame_count(&self) -> Option<usize> {
        Some(self.total)
    }

    fn grab(&mut self) -> Result<bool, String> {
        let next = self.position.map_or(0, |p| p + 1);
        if next >= self.total {
            return Ok(false);
        }
        self.position = Some(next);
        Ok(true)
    }

    fn retrieve(&mut self) -> Result<RgbImage, String> {
        let position = self.position.ok_or("nothing grabbed")?;
        Ok(RgbImage::from_pixel(4, 4, image::Rgb([position as u8, 0, 0])))
    }
}

/// Samples a [`SolidClip`] instead of decoding the upload, after checking the
/// upload was persisted.
struct SolidClipExtractor {
    total: usize,
    saw_upload: AtomicBool,
}

impl FrameExtractor for SolidClipExtractor {
    fn extract(
        &self,
        path: &Path,
        request: &SampleRequest,
        progress: ProgressHub,
    ) -> Vec<SampledFrame> {
        self.saw_upload.store(path.exists(), Ordering::SeqCst);
        let clip = SolidClip {
            total: self.total,
            position: None,
        };
        FrameSampler::new(Some(clip), request, progress).collect()
    }
}

struct FixedBreakdown;

impl BreakdownSource for FixedBreakdown {
    fn breakdown(&self) -> Breakdown {
        Breakdown {
            metadata: 75,
            noise: 50,
            compression: 90,
        }
    }
}

struct TestApp {
    router: Router,
    scratch_dir: PathBuf,
    progress: ProgressHub,
    frames_seen: Arc<AtomicUsize>,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.scratch_dir);
    }
}

fn test_app() -> TestApp {
    test_app_with(Arc::new(OpenCvFrameExtractor))
}

fn test_app_with(extractor: Arc<dyn FrameExtractor>) -> TestApp {
    let frames_seen = Arc::new(AtomicUsize::new(0));
    let scratch_dir =
        std::env::temp_dir().join(format!("gateway-routes-{}", uuid::Uuid::new_v4()));
    let progress = ProgressHub::new(16);

    let state = AppState {
        text: TextPredictionAdapter::new(Arc::new(FixedText(vec![0.2, 0.8]))),
        image: ImagePredictionAdapter::new(
            Arc::new(FixedImage(vec![0.9, 0.1])),
            Arc::new(FixedBreakdown),
        ),
        video: VideoPredictionAdapter::new(
            Arc::new(FixedVideo {
                probabilities: vec![0.4, 0.6],
                frames_seen: frames_seen.clone(),
            }),
            extractor,
            progress.clone(),
            SampleRequest::new(4).unwrap(),
            scratch_dir.clone(),
        ),
        progress: progress.clone(),
        metrics: Arc::new(Metrics::new().unwrap()),
    };
    let server_config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        max_upload_bytes: 10 * 1024 * 1024,
    };

    TestApp {
        router: build_router(state, &server_config, Path::new("static")),
        scratch_dir,
        progress,
        frames_seen,
    }
}

fn multipart_body(field: &str, file_name: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn json_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn png_bytes() -> Vec<u8> {
    let image = RgbImage::from_pixel(8, 8, image::Rgb([120, 30, 200]));
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn predict_text_returns_label_and_probabilities() {
    let app = test_app();

    let response = app
        .router
        .clone()
        .oneshot(json_request("/predict-text", r#"{"text": "breaking news"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["prediction"], "Fake");
    let fake = json["probability"]["Fake"].as_f64().unwrap();
    let real = json["probability"]["Real"].as_f64().unwrap();
    assert!((fake + real - 1.0).abs() < 1e-6);
    assert!((fake - 0.8).abs() < 1e-6);
}

#[tokio::test]
async fn predict_text_without_text_field_is_rejected() {
    let app = test_app();

    for body in [r#"{}"#, r#"{"text": 42}"#] {
        let response = app
            .router
            .clone()
            .oneshot(json_request("/predict-text", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Missing 'text' field");
    }
}

#[tokio::test]
async fn predict_text_with_malformed_json_is_rejected() {
    let app = test_app();

    let response = app
        .router
        .clone()
        .oneshot(json_request("/predict-text", "{not json"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());
}

#[tokio::test]
async fn predict_image_without_file_is_rejected() {
    let app = test_app();

    let response = app
        .router
        .clone()
        .oneshot(multipart_request(
            "/predict-image",
            multipart_body("other", "a.png", &png_bytes()),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No file uploaded");
}

#[tokio::test]
async fn predict_image_without_multipart_body_is_rejected() {
    let app = test_app();

    let response = app
        .router
        .clone()
        .oneshot(json_request("/predict-image", "{}"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No file uploaded");
}

#[tokio::test]
async fn predict_image_with_undecodable_file_fails() {
    let app = test_app();

    let response = app
        .router
        .clone()
        .oneshot(multipart_request(
            "/predict-image",
            multipart_body("file", "notes.txt", b"plain text, not pixels"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(response)
        .await
        .starts_with("Something went wrong:"));
}

#[tokio::test]
async fn predict_image_returns_verdict_and_breakdown() {
    let app = test_app();

    let response = app
        .router
        .clone()
        .oneshot(multipart_request(
            "/predict-image",
            multipart_body("file", "face.png", &png_bytes()),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["prediction"], "Real");
    assert!((json["confidence"].as_f64().unwrap() - 0.9).abs() < 1e-6);
    assert!((json["authenticity_score"].as_f64().unwrap() - 90.0).abs() < 1e-4);
    assert_eq!(json["breakdown"]["metadata"], 75);
    assert_eq!(json["breakdown"]["noise"], 50);
    assert_eq!(json["breakdown"]["compression"], 90);
}

#[tokio::test]
async fn predict_video_without_video_field_is_rejected() {
    let app = test_app();

    let response = app
        .router
        .clone()
        .oneshot(multipart_request(
            "/predict-video",
            multipart_body("file", "clip.mp4", b"bytes"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No file uploaded");
}

#[tokio::test]
async fn predict_video_with_unreadable_file_reports_no_frames() {
    let app = test_app();

    let response = app
        .router
        .clone()
        .oneshot(multipart_request(
            "/predict-video",
            multipart_body("video", "clip.mp4", b"this is not an mp4 container"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"],
        "No valid frames extracted"
    );

    let leftovers = std::fs::read_dir(&app.scratch_dir)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn predict_video_classifies_sampled_frames() {
    let extractor = Arc::new(SolidClipExtractor {
        total: 40,
        saw_upload: AtomicBool::new(false),
    });
    let app = test_app_with(extractor.clone());
    let mut progress = app.progress.subscribe();

    let response = app
        .router
        .clone()
        .oneshot(multipart_request(
            "/predict-video",
            multipart_body("video", "clip.mp4", b"container bytes"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["result"], "Fake");
    assert!((json["confidence"].as_f64().unwrap() - 0.6).abs() < 1e-6);
    assert!((json["fake_probability"].as_f64().unwrap() - 0.6).abs() < 1e-6);
    assert!((json["real_probability"].as_f64().unwrap() - 0.4).abs() < 1e-6);

    assert!(extractor.saw_upload.load(Ordering::SeqCst));
    assert_eq!(app.frames_seen.load(Ordering::SeqCst), 4);

    let mut percentages = Vec::new();
    while let Ok(event) = progress.try_recv() {
        percentages.push(event.progress);
    }
    assert_eq!(percentages, vec![25, 50, 75, 100]);

    let leftovers = std::fs::read_dir(&app.scratch_dir)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn health_reports_available() {
    let app = test_app();

    let response = app
        .router
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "Available");
    assert_eq!(json["progress_listeners"], 0);
}

#[tokio::test]
async fn metrics_count_prediction_requests() {
    let app = test_app();

    app.router
        .clone()
        .oneshot(json_request("/predict-text", r#"{"text": "hello"}"#))
        .await
        .unwrap();
    let response = app
        .router
        .clone()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("requests_total"));
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = test_app();

    let response = app
        .router
        .clone()
        .oneshot(Request::get("/does-not-exist").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

mod error;
mod routes;
mod scratch;
mod video_source;

pub mod app;
pub mod config;
pub mod prediction;
pub mod progress;
pub mod sampler;
pub mod server;
pub mod telemetry;

pub use app::start_app;
pub use error::AppError;
pub use video_source::OpenCvFrameExtractor;

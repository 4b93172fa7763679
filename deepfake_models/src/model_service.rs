use crate::{classification::ClassProbabilities, error::ModelError};
use async_trait::async_trait;
use image::RgbImage;

/// Text authenticity classifier. Class 0 is authentic, class 1 fabricated.
#[async_trait]
pub trait TextClassifier: Send + Sync + 'static {
    async fn classify(&self, text: &str) -> Result<ClassProbabilities, ModelError>;
}

/// Single image deepfake classifier. Class 0 is real, class 1 deepfake.
#[async_trait]
pub trait ImageClassifier: Send + Sync + 'static {
    async fn classify(&self, image: RgbImage) -> Result<ClassProbabilities, ModelError>;
}

/// Video clip deepfake classifier over an ordered frame sequence.
/// Class 0 is real, class 1 fake.
#[async_trait]
pub trait VideoClassifier: Send + Sync + 'static {
    async fn classify(&self, frames: Vec<RgbImage>) -> Result<ClassProbabilities, ModelError>;
}

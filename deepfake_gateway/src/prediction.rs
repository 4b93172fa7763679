use crate::{
    progress::ProgressHub,
    sampler::{FrameExtractor, SampleRequest, SampledFrame},
    scratch::{ScratchError, ScratchFile},
};
use deepfake_models::{
    ClassProbabilities, ImageClassifier, ModelError, TextClassifier, VideoClassifier,
};
use image::RgbImage;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{io::Cursor, path::PathBuf, sync::Arc};
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("No valid frames extracted")]
    NoValidFrames,
    #[error("Failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
    #[error("Scratch file error: {0}")]
    Scratch(#[from] ScratchError),
    #[error("Frame sampling task failed: {0}")]
    SamplingTask(#[from] tokio::task::JoinError),
    #[error("Model returned {0} classes, expected 2")]
    UnexpectedClassCount(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Real,
    Fake,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageLabel {
    Real,
    Deepfake,
}

const IMAGE_LABELS: [ImageLabel; 2] = [ImageLabel::Real, ImageLabel::Deepfake];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextProbability {
    #[serde(rename = "Fake")]
    pub fake: f32,
    #[serde(rename = "Real")]
    pub real: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextPrediction {
    pub prediction: Verdict,
    pub probability: TextProbability,
}

/// Cosmetic sub-scores shown next to an image verdict. They are random and
/// carry no information about the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakdown {
    pub metadata: u8,
    pub noise: u8,
    pub compression: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePrediction {
    pub prediction: ImageLabel,
    pub confidence: f32,
    pub authenticity_score: f32,
    pub breakdown: Breakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoPrediction {
    pub result: Verdict,
    pub confidence: f32,
    pub fake_probability: f32,
    pub real_probability: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoAnalysis {
    pub prediction: VideoPrediction,
    pub frames_sampled: usize,
}

pub trait BreakdownSource: Send + Sync + 'static {
    fn breakdown(&self) -> Breakdown;
}

/// Uniform integers: metadata in 50..=99, noise in 20..=80, compression in 80..=99.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomBreakdown;

impl BreakdownSource for RandomBreakdown {
    fn breakdown(&self) -> Breakdown {
        let mut rng = rand::rng();
        Breakdown {
            metadata: rng.random_range(50..=99),
            noise: rng.random_range(20..=80),
            compression: rng.random_range(80..=99),
        }
    }
}

fn binary_probabilities(probs: &ClassProbabilities) -> Result<(f32, f32), PredictionError> {
    match probs.as_slice() {
        &[first, second] => Ok((first, second)),
        other => Err(PredictionError::UnexpectedClassCount(other.len())),
    }
}

pub fn text_prediction(probs: &ClassProbabilities) -> Result<TextPrediction, PredictionError> {
    let (real, fake) = binary_probabilities(probs)?;
    let prediction = match probs.argmax() {
        Some((1, _)) => Verdict::Fake,
        _ => Verdict::Real,
    };
    Ok(TextPrediction {
        prediction,
        probability: TextProbability { fake, real },
    })
}

pub fn image_prediction(
    probs: &ClassProbabilities,
    breakdown: Breakdown,
) -> Result<ImagePrediction, PredictionError> {
    binary_probabilities(probs)?;
    let (class_id, confidence) = probs
        .argmax()
        .ok_or(PredictionError::UnexpectedClassCount(0))?;
    let prediction = IMAGE_LABELS[class_id];
    let authenticity_score = match prediction {
        ImageLabel::Deepfake => 100.0 - confidence * 100.0,
        ImageLabel::Real => confidence * 100.0,
    };
    Ok(ImagePrediction {
        prediction,
        confidence,
        authenticity_score,
        breakdown,
    })
}

pub fn video_prediction(probs: &ClassProbabilities) -> Result<VideoPrediction, PredictionError> {
    let (real, fake) = binary_probabilities(probs)?;
    Ok(VideoPrediction {
        result: if fake > 0.5 { Verdict::Fake } else { Verdict::Real },
        confidence: real.max(fake),
        fake_probability: fake,
        real_probability: real,
    })
}

fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, PredictionError> {
    let image = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?
        .decode()?;
    Ok(image.to_rgb8())
}

#[derive(Clone)]
pub struct TextPredictionAdapter {
    classifier: Arc<dyn TextClassifier>,
}

impl TextPredictionAdapter {
    pub fn new(classifier: Arc<dyn TextClassifier>) -> Self {
        Self { classifier }
    }

    #[instrument(skip(self, text))]
    pub async fn predict(&self, text: &str) -> Result<TextPrediction, PredictionError> {
        let probs = self.classifier.classify(text).await?;
        text_prediction(&probs)
    }
}

#[derive(Clone)]
pub struct ImagePredictionAdapter {
    classifier: Arc<dyn ImageClassifier>,
    breakdown: Arc<dyn BreakdownSource>,
}

impl ImagePredictionAdapter {
    pub fn new(classifier: Arc<dyn ImageClassifier>, breakdown: Arc<dyn BreakdownSource>) -> Self {
        Self {
            classifier,
            breakdown,
        }
    }

    #[instrument(skip(self, image_data))]
    pub async fn predict(&self, image_data: &[u8]) -> Result<ImagePrediction, PredictionError> {
        let image = decode_rgb(image_data)?;
        tracing::debug!("Decoded {}x{} image", image.width(), image.height());
        let probs = self.classifier.classify(image).await?;
        image_prediction(&probs, self.breakdown.breakdown())
    }
}

#[derive(Clone)]
pub struct VideoPredictionAdapter {
    classifier: Arc<dyn VideoClassifier>,
    extractor: Arc<dyn FrameExtractor>,
    progress: ProgressHub,
    request: SampleRequest,
    scratch_dir: PathBuf,
}

impl VideoPredictionAdapter {
    pub fn new(
        classifier: Arc<dyn VideoClassifier>,
        extractor: Arc<dyn FrameExtractor>,
        progress: ProgressHub,
        request: SampleRequest,
        scratch_dir: PathBuf,
    ) -> Self {
        Self {
            classifier,
            extractor,
            progress,
            request,
            scratch_dir,
        }
    }

    async fn extract_frames(&self, scratch: &ScratchFile) -> Result<Vec<SampledFrame>, PredictionError> {
        let path = scratch.path().to_path_buf();
        let request = self.request;
        let progress = self.progress.clone();
        let extractor = self.extractor.clone();

        let frames =
            tokio::task::spawn_blocking(move || extractor.extract(&path, &request, progress))
                .await?;

        Ok(frames)
    }

    #[instrument(skip(self, video_data))]
    pub async fn predict(
        &self,
        video_data: &[u8],
        file_name: Option<&str>,
    ) -> Result<VideoAnalysis, PredictionError> {
        let scratch = ScratchFile::persist(&self.scratch_dir, file_name, video_data).await?;
        let frames = self.extract_frames(&scratch).await?;
        drop(scratch);

        if frames.is_empty() {
            return Err(PredictionError::NoValidFrames);
        }
        let frames_sampled = frames.len();
        tracing::info!("Extracted {} frames", frames_sampled);

        let images = frames.into_iter().map(|frame| frame.image).collect();
        let probs = self.classifier.classify(images).await?;

        Ok(VideoAnalysis {
            prediction: video_prediction(&probs)?,
            frames_sampled,
        })
    }
}

use crate::{
    classification::ClassProbabilities,
    config::{OnnxModelConfig, Validatable},
    error::ModelError,
    model_service::{ImageClassifier, VideoClassifier},
    preprocess::ImageProcessorConfig,
};
use async_trait::async_trait;
use image::RgbImage;
use ndarray::{ArrayD, ArrayViewD, Axis};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

/// Round-robin pool of ONNX sessions for one model file.
#[derive(Clone)]
pub struct OrtSessionPool {
    sessions: Arc<Vec<Arc<Mutex<Session>>>>,
    counter: Arc<AtomicUsize>,
    output_name: Arc<str>,
}

impl OrtSessionPool {
    pub fn new(model_config: &OnnxModelConfig) -> Result<Self, ModelError> {
        let num_instances = model_config.num_instances.max(1);
        let sessions = (0..num_instances)
            .map(|_| {
                let builder = Session::builder()?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?;
                #[cfg(feature = "cuda")]
                let builder = builder.with_execution_providers([
                    ort::execution_providers::CUDAExecutionProvider::default().build(),
                ])?;
                let session = builder.commit_from_file(model_config.get_path())?;
                Ok(Arc::new(Mutex::new(session)))
            })
            .collect::<Result<Vec<_>, ort::Error>>()?;

        tracing::info!(
            "Created {} ONNX sessions for {:?}",
            num_instances,
            model_config.get_path()
        );

        Ok(Self {
            sessions: Arc::new(sessions),
            counter: Arc::new(AtomicUsize::new(0)),
            output_name: Arc::from(model_config.output_name.as_str()),
        })
    }

    pub fn run_inference(&self, input: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, ModelError> {
        let index = self.counter.fetch_add(1, Ordering::SeqCst) % self.sessions.len();
        let mut session = self.sessions[index]
            .lock()
            .map_err(|e| ModelError::SessionPoisoned(e.to_string()))?;

        tracing::debug!("Handling request with session {}", index);
        let owned_buffer;
        let input_view = if input.is_standard_layout() {
            input.view()
        } else {
            owned_buffer = input.to_owned();
            owned_buffer.view()
        };

        let tensor_ref = TensorRef::from_array_view(input_view)?;
        let outputs = session.run(ort::inputs![tensor_ref])?;

        let output = named_output(&self.output_name, outputs.get(&*self.output_name))?;
        let (shape, data) = output.try_extract_tensor::<f32>()?;

        ArrayD::from_shape_vec(shape.to_ixdyn(), data.to_vec())
            .map_err(|e| ModelError::InvalidOutput(format!("invalid tensor shape: {}", e)))
    }
}

fn named_output<T>(name: &str, output: Option<T>) -> Result<T, ModelError> {
    output.ok_or_else(|| ModelError::InvalidOutput(format!("model has no output named {:?}", name)))
}

/// Logits of the first item in a `[batch, classes]` output.
fn first_logits(output: &ArrayD<f32>) -> Result<Vec<f32>, ModelError> {
    match output.ndim() {
        1 => Ok(output.iter().copied().collect()),
        2 if output.shape()[0] > 0 => Ok(output.index_axis(Axis(0), 0).iter().copied().collect()),
        _ => Err(ModelError::InvalidOutput(format!(
            "expected [batch, classes] logits, got shape {:?}",
            output.shape()
        ))),
    }
}

#[derive(Clone)]
pub struct OrtImageClassifier {
    pool: OrtSessionPool,
    processor: Arc<ImageProcessorConfig>,
}

impl OrtImageClassifier {
    pub fn new(model_config: &OnnxModelConfig) -> Result<Self, ModelError> {
        let processor = ImageProcessorConfig::from_file(&model_config.get_preprocessor_path())?;
        Ok(Self {
            pool: OrtSessionPool::new(model_config)?,
            processor: Arc::new(processor),
        })
    }

    fn classify_blocking(&self, image: &RgbImage) -> Result<ClassProbabilities, ModelError> {
        let input = self.processor.image_batch(image);
        let output = self.pool.run_inference(input.view().into_dyn())?;
        Ok(ClassProbabilities::from_logits(&first_logits(&output)?))
    }
}

#[async_trait]
impl ImageClassifier for OrtImageClassifier {
    async fn classify(&self, image: RgbImage) -> Result<ClassProbabilities, ModelError> {
        let classifier = self.clone();
        tokio::task::spawn_blocking(move || classifier.classify_blocking(&image)).await?
    }
}

#[derive(Clone)]
pub struct OrtVideoClassifier {
    pool: OrtSessionPool,
    processor: Arc<ImageProcessorConfig>,
}

impl OrtVideoClassifier {
    pub fn new(model_config: &OnnxModelConfig) -> Result<Self, ModelError> {
        let processor = ImageProcessorConfig::from_file(&model_config.get_preprocessor_path())?;
        Ok(Self {
            pool: OrtSessionPool::new(model_config)?,
            processor: Arc::new(processor),
        })
    }

    fn classify_blocking(&self, frames: &[RgbImage]) -> Result<ClassProbabilities, ModelError> {
        let input = self.processor.video_batch(frames)?;
        let output = self.pool.run_inference(input.view().into_dyn())?;
        Ok(ClassProbabilities::from_logits(&first_logits(&output)?))
    }
}

#[async_trait]
impl VideoClassifier for OrtVideoClassifier {
    async fn classify(&self, frames: Vec<RgbImage>) -> Result<ClassProbabilities, ModelError> {
        let classifier = self.clone();
        tokio::task::spawn_blocking(move || classifier.classify_blocking(&frames)).await?
    }
}

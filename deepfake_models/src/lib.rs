mod classification;
mod error;
mod model_service;
mod ort_service;
mod preprocess;
mod text;

pub mod config;

pub use classification::ClassProbabilities;
pub use error::ModelError;
pub use model_service::{ImageClassifier, TextClassifier, VideoClassifier};
pub use ort_service::{OrtImageClassifier, OrtSessionPool, OrtVideoClassifier};
pub use preprocess::{ImageProcessorConfig, SizeSpec};
pub use text::{LogisticRegression, TfidfTextClassifier, TfidfVectorizer};

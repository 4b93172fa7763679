use serde::Deserialize;
use std::path::PathBuf;

pub trait Validatable {
    fn get_path(&self) -> PathBuf;

    fn validate(&self) -> Result<(), String> {
        if !self.get_path().exists() {
            return Err(format!("Model file not found: {:?}", self.get_path()));
        }
        Ok(())
    }
}

/// An ONNX export of a Hugging Face classifier together with its
/// `preprocessor_config.json`.
#[derive(Debug, Deserialize, Clone)]
pub struct OnnxModelConfig {
    pub model_dir: PathBuf,
    pub onnx_file: String,
    #[serde(default = "default_preprocessor_file")]
    pub preprocessor_file: String,
    #[serde(default = "default_output_name")]
    pub output_name: String,
    #[serde(default = "default_model_instances")]
    pub num_instances: usize,
}

fn default_preprocessor_file() -> String {
    "preprocessor_config.json".to_string()
}

fn default_output_name() -> String {
    "logits".to_string()
}

fn default_model_instances() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().min(4))
        .unwrap_or(2)
}

impl OnnxModelConfig {
    pub fn get_preprocessor_path(&self) -> PathBuf {
        self.model_dir.join(&self.preprocessor_file)
    }
}

impl Validatable for OnnxModelConfig {
    fn get_path(&self) -> PathBuf {
        self.model_dir.join(&self.onnx_file)
    }

    fn validate(&self) -> Result<(), String> {
        if self.num_instances == 0 {
            return Err("num_instances must be at least 1".to_string());
        }
        for path in [self.get_path(), self.get_preprocessor_path()] {
            if !path.exists() {
                return Err(format!("Model file not found: {:?}", path));
            }
        }
        Ok(())
    }
}

/// Pretrained TF-IDF vectorizer and logistic regression, exported to JSON.
#[derive(Debug, Deserialize, Clone)]
pub struct TextModelConfig {
    pub model_dir: PathBuf,
    pub vectorizer_file: String,
    pub classifier_file: String,
}

impl TextModelConfig {
    pub fn get_vectorizer_path(&self) -> PathBuf {
        self.model_dir.join(&self.vectorizer_file)
    }
}

impl Validatable for TextModelConfig {
    fn get_path(&self) -> PathBuf {
        self.model_dir.join(&self.classifier_file)
    }

    fn validate(&self) -> Result<(), String> {
        for path in [self.get_vectorizer_path(), self.get_path()] {
            if !path.exists() {
                return Err(format!("Model file not found: {:?}", path));
            }
        }
        Ok(())
    }
}

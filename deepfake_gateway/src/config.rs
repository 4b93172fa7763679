use crate::sampler::{SampleRequest, SamplerError, DEFAULT_TARGET_FRAMES};
use deepfake_models::config::{OnnxModelConfig, TextModelConfig, Validatable};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(deserialize_with = "deserialize_log_level")]
    pub log_level: LogLevel,
    pub models: ModelsConfig,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

fn deserialize_log_level<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.try_into().map_err(serde::de::Error::custom)
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_max_upload_bytes() -> usize {
    100 * 1024 * 1024
}

impl ServerConfig {
    pub fn get_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelsConfig {
    pub text: TextModelConfig,
    pub image: OnnxModelConfig,
    pub video: OnnxModelConfig,
}

impl ModelsConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.text.validate()?;
        self.image.validate()?;
        self.video.validate()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct VideoConfig {
    #[serde(default = "default_num_frames")]
    pub num_frames: usize,
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
}

fn default_num_frames() -> usize {
    DEFAULT_TARGET_FRAMES
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from("uploads")
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            num_frames: default_num_frames(),
            scratch_dir: default_scratch_dir(),
        }
    }
}

impl VideoConfig {
    pub fn sample_request(&self) -> Result<SampleRequest, SamplerError> {
        SampleRequest::new(self.num_frames)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProgressConfig {
    #[serde(default = "default_progress_capacity")]
    pub capacity: usize,
}

fn default_progress_capacity() -> usize {
    64
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            capacity: default_progress_capacity(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub enum LogLevel {
    Debug,
    Info,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            other => Err(format!(
                "{} is not a supported minimum log level. Use either `debug` or `info`.",
                other
            )),
        }
    }
}

pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let base_path = std::env::current_dir().map_err(|e| {
        config::ConfigError::Message(format!("Failed to determine the current directory: {}", e))
    })?;
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;

    let config = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(
            config::File::from(
                configuration_directory.join(format!("{}.yaml", environment.as_str())),
            )
            .required(false),
        )
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let config: Config = config.try_deserialize::<Config>()?;

    if let Err(e) = config.video.sample_request() {
        return Err(config::ConfigError::Message(e.to_string()));
    }
    if let Err(e) = config.models.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        return Err(config::ConfigError::Message(e));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::try_from("DEBUG".to_string()), Ok(LogLevel::Debug));
        assert!(LogLevel::try_from("trace".to_string()).is_err());
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!(
            Environment::try_from("Production".to_string())
                .unwrap()
                .as_str(),
            "production"
        );
        assert!(Environment::try_from("staging".to_string()).is_err());
    }

    #[test]
    fn test_video_defaults() {
        let video = VideoConfig::default();

        assert_eq!(video.num_frames, 16);
        assert_eq!(video.scratch_dir, PathBuf::from("uploads"));
        assert_eq!(video.sample_request().unwrap().target_count(), 16);
    }

    #[test]
    fn test_zero_frames_is_rejected() {
        let video = VideoConfig {
            num_frames: 0,
            scratch_dir: default_scratch_dir(),
        };

        assert!(video.sample_request().is_err());
    }

    #[test]
    fn test_deserialize_from_yaml() {
        let yaml = r#"
server:
  host: 127.0.0.1
  port: 5000
log_level: Info
models:
  text:
    model_dir: models/text
    vectorizer_file: vectorizer.json
    classifier_file: classifier.json
  image:
    model_dir: models/image
    onnx_file: model.onnx
  video:
    model_dir: models/video
    onnx_file: model.onnx
    num_instances: 1
video:
  num_frames: 8
"#;
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.get_address(), "127.0.0.1:5000");
        assert_eq!(config.server.max_upload_bytes, 100 * 1024 * 1024);
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.models.image.output_name, "logits");
        assert_eq!(config.models.video.num_instances, 1);
        assert_eq!(config.video.num_frames, 8);
        assert_eq!(config.video.scratch_dir, PathBuf::from("uploads"));
        assert_eq!(config.progress.capacity, 64);
        assert_eq!(config.static_dir, PathBuf::from("static"));
        assert!(config.models.validate().is_err());
    }
}

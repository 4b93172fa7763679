//! Text authenticity model: a pretrained TF-IDF vectorizer feeding a binary
//! logistic regression. Both artifacts are JSON exports of fitted
//! scikit-learn estimators.

use crate::{
    classification::ClassProbabilities,
    config::{TextModelConfig, Validatable},
    error::ModelError,
    model_service::TextClassifier,
};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use std::{collections::HashMap, fs::File, io::BufReader, path::Path};

/// Sparse feature vector as `(feature index, value)` pairs sorted by index.
pub type SparseVector = Vec<(usize, f32)>;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Norm {
    L1,
    L2,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f32>,
    #[serde(default = "default_true")]
    lowercase: bool,
    #[serde(default = "default_ngram_range")]
    ngram_range: (usize, usize),
    #[serde(default)]
    sublinear_tf: bool,
    #[serde(default = "default_norm")]
    norm: Option<Norm>,
}

fn default_true() -> bool {
    true
}

fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}

fn default_norm() -> Option<Norm> {
    Some(Norm::L2)
}

/// Word tokens of two or more word characters, as matched by `\b\w\w+\b`.
fn tokenize(text: &str) -> Vec<&str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|token| token.chars().nth(1).is_some())
        .collect()
}

impl TfidfVectorizer {
    pub fn num_features(&self) -> usize {
        self.idf.len()
    }

    fn validate(&self) -> Result<(), ModelError> {
        let (min_n, max_n) = self.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(ModelError::InvalidArtifact(format!(
                "invalid ngram_range ({}, {})",
                min_n, max_n
            )));
        }
        if let Some((term, index)) = self.vocabulary.iter().find(|(_, &i)| i >= self.idf.len()) {
            return Err(ModelError::InvalidArtifact(format!(
                "vocabulary term {:?} maps to index {} but only {} idf weights exist",
                term,
                index,
                self.idf.len()
            )));
        }
        Ok(())
    }

    fn analyze(&self, text: &str) -> Vec<String> {
        let text = if self.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };
        let tokens = tokenize(&text);
        let (min_n, max_n) = self.ngram_range;

        let mut terms = Vec::new();
        for n in min_n..=max_n {
            terms.extend(tokens.windows(n).map(|window| window.join(" ")));
        }
        terms
    }

    pub fn transform(&self, text: &str) -> SparseVector {
        let mut counts: HashMap<usize, f32> = HashMap::new();
        for term in self.analyze(text) {
            if let Some(&index) = self.vocabulary.get(&term) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }

        let mut features: SparseVector = counts
            .into_iter()
            .map(|(index, tf)| {
                let tf = if self.sublinear_tf { 1.0 + tf.ln() } else { tf };
                (index, tf * self.idf[index])
            })
            .collect();
        features.sort_by_key(|(index, _)| *index);

        let norm = match self.norm {
            Some(Norm::L2) => features.iter().map(|(_, v)| v * v).sum::<f32>().sqrt(),
            Some(Norm::L1) => features.iter().map(|(_, v)| v.abs()).sum::<f32>(),
            None => 1.0,
        };
        if norm > 0.0 {
            for (_, value) in features.iter_mut() {
                *value /= norm;
            }
        }
        features
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogisticRegression {
    coef: Vec<f32>,
    intercept: f32,
}

impl LogisticRegression {
    pub fn decision_function(&self, features: &SparseVector) -> f32 {
        features
            .iter()
            .map(|(index, value)| self.coef.get(*index).copied().unwrap_or(0.0) * value)
            .sum::<f32>()
            + self.intercept
    }

    /// `[P(real), P(fake)]`.
    pub fn predict_proba(&self, features: &SparseVector) -> ClassProbabilities {
        let fake = 1.0 / (1.0 + (-self.decision_function(features)).exp());
        ClassProbabilities::new(vec![1.0 - fake, fake])
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, ModelError> {
    let file = File::open(path).map_err(|source| ModelError::ReadArtifact {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| ModelError::ParseArtifact {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Clone)]
pub struct TfidfTextClassifier {
    vectorizer: TfidfVectorizer,
    classifier: LogisticRegression,
}

impl TfidfTextClassifier {
    pub fn new(
        vectorizer: TfidfVectorizer,
        classifier: LogisticRegression,
    ) -> Result<Self, ModelError> {
        vectorizer.validate()?;
        if classifier.coef.len() != vectorizer.num_features() {
            return Err(ModelError::InvalidArtifact(format!(
                "classifier expects {} features but vectorizer produces {}",
                classifier.coef.len(),
                vectorizer.num_features()
            )));
        }
        Ok(Self {
            vectorizer,
            classifier,
        })
    }

    pub fn load(config: &TextModelConfig) -> Result<Self, ModelError> {
        let vectorizer: TfidfVectorizer = load_json(&config.get_vectorizer_path())?;
        let classifier: LogisticRegression = load_json(&config.get_path())?;
        let model = Self::new(vectorizer, classifier)?;
        tracing::info!(
            "Loaded text model with {} features",
            model.vectorizer.num_features()
        );
        Ok(model)
    }
}

#[async_trait]
impl TextClassifier for TfidfTextClassifier {
    async fn classify(&self, text: &str) -> Result<ClassProbabilities, ModelError> {
        let features = self.vectorizer.transform(text);
        tracing::debug!("Text vectorized into {} non-zero features", features.len());
        Ok(self.classifier.predict_proba(&features))
    }
}

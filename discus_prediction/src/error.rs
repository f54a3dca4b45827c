use std::path::PathBuf;
use thiserror::Error;

/// Failures that stop the service from starting.
#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("Model file not found: {0:?}")]
    MissingFile(PathBuf),
    #[error("ONNX Runtime error: {0}")]
    Runtime(#[from] ort::Error),
    #[error("Model must have exactly one input and one output, found {inputs} and {outputs}")]
    Arity { inputs: usize, outputs: usize },
    #[error("Model {0} `{1}` is not a tensor")]
    NotTensor(&'static str, String),
    #[error("Model {kind} shape {actual:?} is incompatible with expected {expected:?}")]
    IncompatibleShape {
        kind: &'static str,
        expected: Vec<i64>,
        actual: Vec<i64>,
    },
    #[error("Failed to load labels from {path:?}: {source}")]
    Labels {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Label set has {labels} entries but the classifier outputs {classes} scores")]
    LabelMismatch { labels: usize, classes: usize },
}

/// Failures of a single prediction. None of them affect other requests.
#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("Error reading image: {0}")]
    Read(#[from] std::io::Error),
    #[error("Error decoding image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Model returned {actual} scores, expected {expected}")]
    OutputShape { expected: usize, actual: usize },
    #[error("Model returned non-finite scores")]
    NonFiniteScores,
    #[error("Prediction task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

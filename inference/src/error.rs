use std::path::PathBuf;

use thiserror::Error;

/// Failures while building a model from a parameter source.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read parameter file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parameter source ended before tensor `{tensor}`")]
    MissingTensor { tensor: &'static str },
    #[error("line {line}: `{token}` is not a 32-bit integer")]
    Parse { line: usize, token: String },
    #[error("tensor `{tensor}` expects {expected} values, found {found}")]
    Shape {
        tensor: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("unexpected data after the last tensor on line {line}")]
    TrailingData { line: usize },
}

/// Failures while reading images or labelled samples.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read dataset {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: `{token}` is not an integer")]
    Parse { line: usize, token: String },
    #[error("line {line}: expected {expected} values, found {found}")]
    Length {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("line {line}: label {value} is not a digit class")]
    Label { line: usize, value: i64 },
    #[error("line {line}: pixel {value} is outside 0..=255")]
    Pixel { line: usize, value: i64 },
    #[error("malformed JSON pixel array")]
    Json(#[from] serde_json::Error),
}

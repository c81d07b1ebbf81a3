//! Parameter-file loader.
//!
//! The file holds ten lines of whitespace-separated, pre-scaled integers, one
//! line per tensor in [`TENSORS`] order. Any missing line, malformed token or
//! wrong value count fails the whole load.

use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::ModelError;
use crate::model::{LeNet5, ModelParameters, TENSORS};

/// A model together with the digest of the file it came from.
#[derive(Debug)]
pub struct LoadedModel {
    pub model: LeNet5,
    /// Hex-encoded SHA-256 of the raw parameter file.
    pub digest: String,
}

impl ModelParameters {
    /// Parses the text parameter format.
    pub fn parse(text: &str) -> Result<Self, ModelError> {
        let mut params = Self::default();
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(idx, line)| (idx + 1, line))
            .filter(|(_, line)| !line.trim().is_empty());

        for (slot, (tensor, expected)) in params.tensors_mut().into_iter().zip(TENSORS) {
            let (line_no, line) = lines.next().ok_or(ModelError::MissingTensor { tensor })?;
            let values = line
                .split_whitespace()
                .map(|token| {
                    token.parse::<i32>().map_err(|_| ModelError::Parse {
                        line: line_no,
                        token: token.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            if values.len() != expected {
                return Err(ModelError::Shape {
                    tensor,
                    expected,
                    found: values.len(),
                });
            }
            *slot = values;
        }

        if let Some((line, _)) = lines.next() {
            return Err(ModelError::TrailingData { line });
        }
        Ok(params)
    }
}

/// Reads, validates and builds a model from a parameter file.
pub fn load_model(path: impl AsRef<Path>) -> Result<LoadedModel, ModelError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let digest = hex::encode(Sha256::digest(&bytes));
    tracing::debug!(path = %path.display(), %digest, "read parameter file");

    let text = String::from_utf8_lossy(&bytes);
    let model = LeNet5::try_from(ModelParameters::parse(&text)?)?;
    tracing::info!(
        "Loaded {} parameters from {}",
        LeNet5::parameter_count(),
        path.display()
    );

    Ok(LoadedModel { model, digest })
}

/// Renders parameters in the format [`ModelParameters::parse`] reads.
pub fn to_text(params: &ModelParameters) -> String {
    let mut out = String::new();
    for tensor in params.tensors() {
        let line: Vec<String> = tensor.iter().map(i32::to_string).collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }
    out
}

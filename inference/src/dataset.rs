//! MNIST sample loading and fixed-point normalization.

use std::fs;
use std::path::Path;

use crate::error::DatasetError;
use crate::tensor::{Image, DIGIT_SIDE, NUM_CLASSES, SCALE};

/// Pixels in one unpadded digit.
pub const PIXELS: usize = DIGIT_SIDE * DIGIT_SIDE;

/// A labelled, normalized input.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Sample {
    pub label: u8,
    pub image: Image,
}

/// Maps a raw 0–255 pixel to fixed point, truncating.
#[inline]
pub fn normalize(pixel: u8) -> i32 {
    i32::from(pixel) * SCALE / 255
}

/// Builds a padded input from 784 raw pixels in row-major order.
pub fn image_from_pixels(pixels: &[u8; PIXELS]) -> Image {
    let mut digit = [[0; DIGIT_SIDE]; DIGIT_SIDE];
    for (row, chunk) in digit.iter_mut().zip(pixels.chunks_exact(DIGIT_SIDE)) {
        for (dst, &p) in row.iter_mut().zip(chunk) {
            *dst = normalize(p);
        }
    }
    Image::from_digit(&digit)
}

fn pixel(line: usize, value: i64) -> Result<u8, DatasetError> {
    u8::try_from(value).map_err(|_| DatasetError::Pixel { line, value })
}

fn parse_int(line: usize, token: &str) -> Result<i64, DatasetError> {
    token.trim().parse::<i64>().map_err(|_| DatasetError::Parse {
        line,
        token: token.trim().to_string(),
    })
}

fn to_pixels(line: usize, values: &[i64]) -> Result<[u8; PIXELS], DatasetError> {
    if values.len() != PIXELS {
        return Err(DatasetError::Length {
            line,
            expected: PIXELS,
            found: values.len(),
        });
    }
    let mut pixels = [0u8; PIXELS];
    for (dst, &v) in pixels.iter_mut().zip(values) {
        *dst = pixel(line, v)?;
    }
    Ok(pixels)
}

/// Parses MNIST CSV rows of the form `label,p0,…,p783`.
///
/// Blank lines are skipped, as is a header on the first non-blank row
/// (first field not numeric).
pub fn parse_csv(text: &str) -> Result<Vec<Sample>, DatasetError> {
    let mut samples = Vec::new();
    let mut header_allowed = true;
    for (idx, row) in text.lines().enumerate() {
        let line = idx + 1;
        let row = row.trim();
        if row.is_empty() {
            continue;
        }
        let mut fields = row.split(',');
        let first = fields.next().unwrap_or_default().trim();
        if std::mem::take(&mut header_allowed) && first.parse::<i64>().is_err() {
            tracing::debug!("Skipping CSV header on line {}: {}", line, first);
            continue;
        }

        let label = parse_int(line, first)?;
        if !(0..NUM_CLASSES as i64).contains(&label) {
            return Err(DatasetError::Label { line, value: label });
        }
        let values = fields
            .map(|token| parse_int(line, token))
            .collect::<Result<Vec<_>, _>>()?;

        samples.push(Sample {
            label: label as u8,
            image: image_from_pixels(&to_pixels(line, &values)?),
        });
    }
    Ok(samples)
}

/// Reads an MNIST CSV file.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<Sample>, DatasetError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let samples = parse_csv(&text)?;
    tracing::info!("Loaded {} samples from {}", samples.len(), path.display());
    Ok(samples)
}

/// Parses a single unlabelled digit of 784 raw pixels.
///
/// Accepts a JSON array, comma-separated values or whitespace-separated
/// values.
pub fn parse_pixels(contents: &str) -> Result<[u8; PIXELS], DatasetError> {
    let trimmed = contents.trim();
    let values: Vec<i64> = if trimmed.starts_with('[') {
        tracing::debug!("Parsing JSON pixel array");
        serde_json::from_str(trimmed)?
    } else if trimmed.contains(',') {
        trimmed
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| parse_int(1, s))
            .collect::<Result<_, _>>()?
    } else {
        trimmed
            .split_whitespace()
            .map(|s| parse_int(1, s))
            .collect::<Result<_, _>>()?
    };
    to_pixels(1, &values)
}

/// Reads a single unlabelled digit file and normalizes it.
pub fn load_image(path: impl AsRef<Path>) -> Result<Image, DatasetError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!("Loading digit image from: {}", path.display());
    Ok(image_from_pixels(&parse_pixels(&contents)?))
}

//! Forward-pass orchestration and class selection.

use std::io::{self, Write};

use serde::Serialize;

use crate::activation::{argmax, log_softmax};
use crate::layers::{conv1, conv3, conv5_flatten, fc6, fc7, subsample2, subsample4};
use crate::model::LeNet5;
use crate::tensor::{
    Conv1Output, Conv3Output, Conv5Output, Fc6Output, Fc7Output, Image, Subsample2Output,
    Subsample4Output, NUM_CLASSES, SCALE,
};

/// Every intermediate tensor of one forward pass, in pipeline order.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Activations {
    pub conv1: Conv1Output,
    pub subsample2: Subsample2Output,
    pub conv3: Conv3Output,
    pub subsample4: Subsample4Output,
    pub conv5: Conv5Output,
    pub fc6: Fc6Output,
    pub fc7: Fc7Output,
}

impl Activations {
    /// Predicted class from the raw fc7 scores.
    pub fn class(&self) -> usize {
        argmax(self.fc7.as_slice())
    }

    /// Class plus raw and log-softmax scores of this pass.
    pub fn prediction(&self) -> Prediction {
        let logits = self.fc7.0;
        let scores = logits.map(|v| v as f32 / SCALE as f32);

        Prediction {
            class: argmax(&logits),
            logits,
            log_probs: log_softmax(&scores),
        }
    }

    /// Writes one line per layer: the layer name, then its values in
    /// channel-major, row-major order, separated by single spaces.
    pub fn write_text<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write_layer(out, "conv1", self.conv1.iter())?;
        write_layer(out, "subsample2", self.subsample2.iter())?;
        write_layer(out, "conv3", self.conv3.iter())?;
        write_layer(out, "subsample4", self.subsample4.iter())?;
        write_layer(out, "conv5", self.conv5.as_slice())?;
        write_layer(out, "fc6", self.fc6.as_slice())?;
        write_layer(out, "fc7", self.fc7.as_slice())
    }
}

fn write_layer<'a, W: Write>(
    out: &mut W,
    name: &str,
    values: impl IntoIterator<Item = &'a i32>,
) -> io::Result<()> {
    write!(out, "{name}")?;
    for v in values {
        write!(out, " {v}")?;
    }
    writeln!(out)
}

/// Predicted class together with its diagnostic scores.
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct Prediction {
    pub class: usize,
    /// Raw fixed-point fc7 outputs.
    pub logits: [i32; NUM_CLASSES],
    /// Log-softmax of `logits / SCALE`.
    pub log_probs: [f32; NUM_CLASSES],
}

/// Runs all seven layers and returns every intermediate tensor.
///
/// The input border must be zero; a non-zero border is a caller bug.
pub fn forward_trace(model: &LeNet5, input: &Image) -> Activations {
    debug_assert!(input.has_zero_border(), "input border must be zero padding");

    let conv1 = conv1(input, model);
    let subsample2 = subsample2(&conv1, model);
    let conv3 = conv3(&subsample2, model);
    let subsample4 = subsample4(&conv3, model);
    let conv5 = conv5_flatten(&subsample4, model);
    let fc6 = fc6(&conv5, model);
    let fc7 = fc7(&fc6, model);
    tracing::trace!(logits = ?fc7.0, "forward pass complete");

    Activations {
        conv1,
        subsample2,
        conv3,
        subsample4,
        conv5,
        fc6,
        fc7,
    }
}

/// Predicted class index in `0..10`. Ties go to the lowest index.
pub fn forward(model: &LeNet5, input: &Image) -> usize {
    forward_trace(model, input).class()
}

/// Predicted class plus raw and log-softmax scores.
pub fn predict(model: &LeNet5, input: &Image) -> Prediction {
    forward_trace(model, input).prediction()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelParameters;

    #[test]
    fn zero_model_on_zero_input_picks_class_zero() {
        let activations = forward_trace(&LeNet5::zeroed(), &Image::zeroed());

        assert_eq!(activations.fc7.0, [0; 10]);
        assert_eq!(activations.class(), 0);
    }

    #[test]
    fn prediction_scores_agree_with_class() {
        let mut params = ModelParameters::zeroed();
        params.fc7_biases = vec![0, 100, 0, 2500, 0, 0, -300, 0, 0, 0];
        let model = LeNet5::try_from(params).unwrap();

        let prediction = predict(&model, &Image::zeroed());

        assert_eq!(prediction.class, 3);
        assert_eq!(prediction.logits[3], 2500);
        assert_eq!(argmax(&prediction.log_probs), 3);
        let total: f32 = prediction.log_probs.iter().map(|v| v.exp()).sum();
        assert!((total - 1.0).abs() < 1e-5);
    }

    #[test]
    fn write_text_dumps_every_layer_in_order() {
        let mut params = ModelParameters::zeroed();
        params.fc7_biases[6] = -42;
        let activations = forward_trace(&LeNet5::try_from(params).unwrap(), &Image::zeroed());

        let mut out = Vec::new();
        activations.write_text(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let layers: Vec<(&str, usize)> = text
            .lines()
            .map(|line| {
                let mut fields = line.split(' ');
                (fields.next().unwrap(), fields.count())
            })
            .collect();
        assert_eq!(
            layers,
            [
                ("conv1", 6 * 28 * 28),
                ("subsample2", 6 * 14 * 14),
                ("conv3", 16 * 10 * 10),
                ("subsample4", 16 * 5 * 5),
                ("conv5", 120),
                ("fc6", 84),
                ("fc7", 10),
            ]
        );
        assert_eq!(text.lines().last(), Some("fc7 0 0 0 0 0 0 -42 0 0 0"));
    }
}

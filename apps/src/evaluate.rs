// Copyright 2024 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use lenet5_inference::dataset::Sample;
use lenet5_inference::tensor::NUM_CLASSES;
use lenet5_inference::{forward, LeNet5};
use rayon::prelude::*;
use serde::Serialize;

/// Accuracy bookkeeping over a labelled sample set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    pub total: usize,
    pub correct: usize,
    /// `confusion[label][predicted]`
    pub confusion: [[usize; NUM_CLASSES]; NUM_CLASSES],
}

impl Evaluation {
    fn single(label: u8, predicted: usize) -> Self {
        let mut eval = Self::default();
        eval.record(label, predicted);
        eval
    }

    /// Counts one classification. Pairs outside `0..10` still count towards
    /// `total` but never towards `correct` or the confusion matrix.
    pub fn record(&mut self, label: u8, predicted: usize) {
        self.total += 1;
        let label = usize::from(label);
        match self.confusion.get_mut(label).and_then(|row| row.get_mut(predicted)) {
            Some(count) => {
                *count += 1;
                if label == predicted {
                    self.correct += 1;
                }
            }
            None => tracing::warn!(
                "Ignoring out-of-range pair: label {}, predicted {}",
                label,
                predicted
            ),
        }
    }

    pub fn merge(mut self, other: Self) -> Self {
        self.total += other.total;
        self.correct += other.correct;
        for (row, other_row) in self.confusion.iter_mut().zip(other.confusion) {
            for (count, other_count) in row.iter_mut().zip(other_row) {
                *count += other_count;
            }
        }
        self
    }

    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

/// Classifies every sample, one whole forward pass per rayon task.
pub fn evaluate(model: &LeNet5, samples: &[Sample]) -> Evaluation {
    samples
        .par_iter()
        .map(|sample| Evaluation::single(sample.label, forward(model, &sample.image)))
        .reduce(Evaluation::default, Evaluation::merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lenet5_inference::{Image, ModelParameters};

    fn sample(label: u8) -> Sample {
        Sample {
            label,
            image: Image::zeroed(),
        }
    }

    #[test_log::test]
    fn counts_hits_against_biased_model() {
        let mut params = ModelParameters::zeroed();
        params.fc7_biases[2] = 500;
        let model = LeNet5::try_from(params).unwrap();
        let samples: Vec<Sample> = [2, 2, 5, 2].into_iter().map(sample).collect();

        let eval = evaluate(&model, &samples);

        assert_eq!(eval.total, 4);
        assert_eq!(eval.correct, 3);
        assert_eq!(eval.confusion[2][2], 3);
        assert_eq!(eval.confusion[5][2], 1);
        assert!((eval.accuracy() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_set_has_zero_accuracy() {
        let eval = evaluate(&LeNet5::zeroed(), &[]);
        assert_eq!(eval, Evaluation::default());
        assert_eq!(eval.accuracy(), 0.0);
    }

    #[test_log::test]
    fn out_of_range_pairs_count_as_misses() {
        let mut eval = Evaluation::default();
        eval.record(12, 3);
        eval.record(4, NUM_CLASSES);
        eval.record(10, 10);
        eval.record(4, 4);

        assert_eq!(eval.total, 4);
        assert_eq!(eval.correct, 1);
        assert_eq!(eval.confusion.iter().flatten().sum::<usize>(), 1);
        assert_eq!(eval.confusion[4][4], 1);
    }

    #[test]
    fn merge_adds_counts() {
        let merged = Evaluation::single(1, 1).merge(Evaluation::single(1, 7));

        assert_eq!(merged.total, 2);
        assert_eq!(merged.correct, 1);
        assert_eq!(merged.confusion[1][7], 1);
    }
}

//! Immutable parameter store for the five parameterized layers.
//!
//! Weights and biases use the same fixed-point convention as activations.
//! A [`LeNet5`] can only be built from a complete [`ModelParameters`] set, so
//! inference never runs against a partially populated model.

use crate::error::ModelError;
use crate::tensor::{
    CONV1_CHANNELS, CONV3_CHANNELS, CONV5_CHANNELS, FC6_UNITS, KERNEL, NUM_CLASSES,
};

/// Weights and biases of one convolution, `CO` filters over `CI` channels.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ConvParams<const CO: usize, const CI: usize, const K: usize> {
    weights: Box<[[[[i32; K]; K]; CI]; CO]>,
    biases: [i32; CO],
}

impl<const CO: usize, const CI: usize, const K: usize> ConvParams<CO, CI, K> {
    pub const WEIGHT_LEN: usize = CO * CI * K * K;

    /// Fills the filters from row-major `filter → channel → row → column` data.
    pub fn from_flat(
        name: (&'static str, &'static str),
        weights: &[i32],
        biases: &[i32],
    ) -> Result<Self, ModelError> {
        check_len(name.0, Self::WEIGHT_LEN, weights.len())?;
        check_len(name.1, CO, biases.len())?;

        let mut boxed: Box<[[[[i32; K]; K]; CI]; CO]> = bytemuck::zeroed_box();
        bytemuck::cast_slice_mut::<_, i32>(boxed.as_mut_slice()).copy_from_slice(weights);

        let mut bias = [0; CO];
        bias.copy_from_slice(biases);

        Ok(Self {
            weights: boxed,
            biases: bias,
        })
    }

    pub fn zeroed() -> Self {
        Self {
            weights: bytemuck::zeroed_box(),
            biases: [0; CO],
        }
    }

    pub fn weights(&self) -> &[[[[i32; K]; K]; CI]; CO] {
        &self.weights
    }

    pub fn biases(&self) -> &[i32; CO] {
        &self.biases
    }
}

/// Weight matrix (`M × N`) and bias vector of a fully-connected layer.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DenseParams<const M: usize, const N: usize> {
    weights: Box<[[i32; N]; M]>,
    biases: [i32; M],
}

impl<const M: usize, const N: usize> DenseParams<M, N> {
    pub const WEIGHT_LEN: usize = M * N;

    /// Fills the matrix from row-major `output → input` data.
    pub fn from_flat(
        name: (&'static str, &'static str),
        weights: &[i32],
        biases: &[i32],
    ) -> Result<Self, ModelError> {
        check_len(name.0, Self::WEIGHT_LEN, weights.len())?;
        check_len(name.1, M, biases.len())?;

        let mut boxed: Box<[[i32; N]; M]> = bytemuck::zeroed_box();
        bytemuck::cast_slice_mut::<_, i32>(boxed.as_mut_slice()).copy_from_slice(weights);

        let mut bias = [0; M];
        bias.copy_from_slice(biases);

        Ok(Self {
            weights: boxed,
            biases: bias,
        })
    }

    pub fn zeroed() -> Self {
        Self {
            weights: bytemuck::zeroed_box(),
            biases: [0; M],
        }
    }

    pub fn weights(&self) -> &[[i32; N]; M] {
        &self.weights
    }

    pub fn biases(&self) -> &[i32; M] {
        &self.biases
    }
}

fn check_len(tensor: &'static str, expected: usize, found: usize) -> Result<(), ModelError> {
    if expected == found {
        Ok(())
    } else {
        Err(ModelError::Shape {
            tensor,
            expected,
            found,
        })
    }
}

pub type Conv1Params = ConvParams<CONV1_CHANNELS, 1, KERNEL>;
pub type Conv3Params = ConvParams<CONV3_CHANNELS, CONV1_CHANNELS, KERNEL>;
pub type Conv5Params = ConvParams<CONV5_CHANNELS, CONV3_CHANNELS, KERNEL>;
pub type Fc6Params = DenseParams<FC6_UNITS, CONV5_CHANNELS>;
pub type Fc7Params = DenseParams<NUM_CLASSES, FC6_UNITS>;

/// Tensor names paired with their cardinality, in parameter-file order.
pub const TENSORS: [(&str, usize); 10] = [
    ("conv1.weights", Conv1Params::WEIGHT_LEN),
    ("conv1.biases", CONV1_CHANNELS),
    ("conv3.weights", Conv3Params::WEIGHT_LEN),
    ("conv3.biases", CONV3_CHANNELS),
    ("conv5.weights", Conv5Params::WEIGHT_LEN),
    ("conv5.biases", CONV5_CHANNELS),
    ("fc6.weights", Fc6Params::WEIGHT_LEN),
    ("fc6.biases", FC6_UNITS),
    ("fc7.weights", Fc7Params::WEIGHT_LEN),
    ("fc7.biases", NUM_CLASSES),
];

/// Flat, unvalidated parameter tensors as produced by a loader.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct ModelParameters {
    pub conv1_weights: Vec<i32>,
    pub conv1_biases: Vec<i32>,
    pub conv3_weights: Vec<i32>,
    pub conv3_biases: Vec<i32>,
    pub conv5_weights: Vec<i32>,
    pub conv5_biases: Vec<i32>,
    pub fc6_weights: Vec<i32>,
    pub fc6_biases: Vec<i32>,
    pub fc7_weights: Vec<i32>,
    pub fc7_biases: Vec<i32>,
}

impl ModelParameters {
    /// Every tensor at its full size, filled with zeros.
    pub fn zeroed() -> Self {
        let mut params = Self::default();
        for (slot, (_, len)) in params.tensors_mut().into_iter().zip(TENSORS) {
            *slot = vec![0; len];
        }
        params
    }

    /// Every tensor, in [`TENSORS`] order.
    pub fn tensors(&self) -> [&Vec<i32>; 10] {
        [
            &self.conv1_weights,
            &self.conv1_biases,
            &self.conv3_weights,
            &self.conv3_biases,
            &self.conv5_weights,
            &self.conv5_biases,
            &self.fc6_weights,
            &self.fc6_biases,
            &self.fc7_weights,
            &self.fc7_biases,
        ]
    }

    /// Mutable access to every tensor, in [`TENSORS`] order.
    pub fn tensors_mut(&mut self) -> [&mut Vec<i32>; 10] {
        [
            &mut self.conv1_weights,
            &mut self.conv1_biases,
            &mut self.conv3_weights,
            &mut self.conv3_biases,
            &mut self.conv5_weights,
            &mut self.conv5_biases,
            &mut self.fc6_weights,
            &mut self.fc6_biases,
            &mut self.fc7_weights,
            &mut self.fc7_biases,
        ]
    }
}

/// The pre-trained network. Read-only once built; share it by reference
/// across any number of concurrent forward passes.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct LeNet5 {
    conv1: Conv1Params,
    conv3: Conv3Params,
    conv5: Conv5Params,
    fc6: Fc6Params,
    fc7: Fc7Params,
}

impl LeNet5 {
    /// A model whose weights and biases are all zero.
    pub fn zeroed() -> Self {
        Self {
            conv1: ConvParams::zeroed(),
            conv3: ConvParams::zeroed(),
            conv5: ConvParams::zeroed(),
            fc6: DenseParams::zeroed(),
            fc7: DenseParams::zeroed(),
        }
    }

    pub fn conv1(&self) -> &Conv1Params {
        &self.conv1
    }

    pub fn conv3(&self) -> &Conv3Params {
        &self.conv3
    }

    pub fn conv5(&self) -> &Conv5Params {
        &self.conv5
    }

    pub fn fc6(&self) -> &Fc6Params {
        &self.fc6
    }

    pub fn fc7(&self) -> &Fc7Params {
        &self.fc7
    }

    pub fn parameter_count() -> usize {
        TENSORS.iter().map(|(_, len)| len).sum()
    }
}

impl TryFrom<ModelParameters> for LeNet5 {
    type Error = ModelError;

    fn try_from(params: ModelParameters) -> Result<Self, Self::Error> {
        Ok(Self {
            conv1: ConvParams::from_flat(
                (TENSORS[0].0, TENSORS[1].0),
                &params.conv1_weights,
                &params.conv1_biases,
            )?,
            conv3: ConvParams::from_flat(
                (TENSORS[2].0, TENSORS[3].0),
                &params.conv3_weights,
                &params.conv3_biases,
            )?,
            conv5: ConvParams::from_flat(
                (TENSORS[4].0, TENSORS[5].0),
                &params.conv5_weights,
                &params.conv5_biases,
            )?,
            fc6: DenseParams::from_flat(
                (TENSORS[6].0, TENSORS[7].0),
                &params.fc6_weights,
                &params.fc6_biases,
            )?,
            fc7: DenseParams::from_flat(
                (TENSORS[8].0, TENSORS[9].0),
                &params.fc7_weights,
                &params.fc7_biases,
            )?,
        })
    }
}

//! The seven LeNet-5 layer operators and the kernels they share.
//!
//! Every operator is a pure function from one tensor (plus the read-only
//! model) to the next. Rescaling is `accumulator / SCALE + bias` with
//! integer division truncating toward zero; this ordering and rounding rule
//! define the reference outputs and must not be replaced by rounding.

use crate::activation::{identity, relu};
use crate::model::{ConvParams, DenseParams, LeNet5};
use crate::tensor::{
    Conv1Output, Conv3Output, Conv5Output, Fc6Output, Fc7Output, FeatureMap, Image,
    Subsample2Output, Subsample4Output, Vector, CONV5_CHANNELS, POOL, SCALE,
};

/// Activation applied to a rescaled, biased accumulator.
pub type Activation = fn(i64) -> i64;

/// Drops one `SCALE` factor from a product sum, truncating toward zero.
#[inline]
pub fn rescale(acc: i64) -> i64 {
    acc / i64::from(SCALE)
}

/// Narrows a layer result back to storage width, saturating at the bounds.
#[inline]
fn narrow(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Valid (unpadded, stride 1) convolution of `CI` channels with `CO` filters.
///
/// Products are summed in an `i64`. Precondition: for every output position
/// `CI * K * K * max|weight| * max|input|` stays below `2^63`, and the
/// rescaled result fits in `i32`; values outside `i32` saturate.
pub fn convolve<
    const CI: usize,
    const HI: usize,
    const WI: usize,
    const CO: usize,
    const HO: usize,
    const WO: usize,
    const K: usize,
>(
    input: &FeatureMap<CI, HI, WI>,
    params: &ConvParams<CO, CI, K>,
    activation: Activation,
) -> FeatureMap<CO, HO, WO> {
    const { assert!(HO + K == HI + 1 && WO + K == WI + 1, "output side must be input - kernel + 1") };

    let mut output = FeatureMap::<CO, HO, WO>::zeroed();
    for (k, (filter, &bias)) in params.weights().iter().zip(params.biases()).enumerate() {
        for i in 0..HO {
            for j in 0..WO {
                let mut acc = 0i64;
                for (plane, kernel) in input.0.iter().zip(filter) {
                    for (m, kernel_row) in kernel.iter().enumerate() {
                        let window = &plane[i + m][j..j + K];
                        for (&x, &w) in window.iter().zip(kernel_row) {
                            acc += i64::from(x) * i64::from(w);
                        }
                    }
                }
                output.0[k][i][j] = narrow(activation(rescale(acc) + i64::from(bias)));
            }
        }
    }
    output
}

/// Non-overlapping `POOL × POOL` mean, computed as a truncating integer
/// division of the window sum. No activation follows.
pub fn subsample<
    const C: usize,
    const H: usize,
    const W: usize,
    const HO: usize,
    const WO: usize,
>(
    input: &FeatureMap<C, H, W>,
) -> FeatureMap<C, HO, WO> {
    const { assert!(HO * POOL == H && WO * POOL == W, "pooled side must be input / 2") };

    let window = (POOL * POOL) as i64;
    let mut output = FeatureMap::<C, HO, WO>::zeroed();
    for (plane_in, plane_out) in input.0.iter().zip(output.0.iter_mut()) {
        for (i, row_out) in plane_out.iter_mut().enumerate() {
            for (j, value) in row_out.iter_mut().enumerate() {
                let mut sum = 0i64;
                for row in &plane_in[i * POOL..i * POOL + POOL] {
                    for &x in &row[j * POOL..j * POOL + POOL] {
                        sum += i64::from(x);
                    }
                }
                *value = narrow(sum / window);
            }
        }
    }
    output
}

/// Fully-connected layer: `(Σ input[i] * weight[m][i]) / SCALE + bias[m]`.
///
/// Same accumulator precondition as [`convolve`] with `N` terms per sum.
pub fn dense<const N: usize, const M: usize>(
    input: &Vector<N>,
    params: &DenseParams<M, N>,
    activation: Activation,
) -> Vector<M> {
    let mut output = Vector::<M>::zeroed();
    for ((value, row), &bias) in output.0.iter_mut().zip(params.weights()).zip(params.biases()) {
        let acc: i64 = input
            .0
            .iter()
            .zip(row)
            .map(|(&x, &w)| i64::from(x) * i64::from(w))
            .sum();
        *value = narrow(activation(rescale(acc) + i64::from(bias)));
    }
    output
}

/// Reinterprets a `C × 1 × 1` map as a length-`C` vector.
pub fn flatten<const C: usize>(map: &FeatureMap<C, 1, 1>) -> Vector<C> {
    Vector(std::array::from_fn(|c| map.0[c][0][0]))
}

/// Layer 1: 1×32×32 → 6×28×28, ReLU.
pub fn conv1(input: &Image, model: &LeNet5) -> Conv1Output {
    convolve(input, model.conv1(), relu)
}

/// Layer 2: 6×28×28 → 6×14×14.
pub fn subsample2(input: &Conv1Output, _model: &LeNet5) -> Subsample2Output {
    subsample(input)
}

/// Layer 3: 6×14×14 → 16×10×10, ReLU.
pub fn conv3(input: &Subsample2Output, model: &LeNet5) -> Conv3Output {
    convolve(input, model.conv3(), relu)
}

/// Layer 4: 16×10×10 → 16×5×5.
pub fn subsample4(input: &Conv3Output, _model: &LeNet5) -> Subsample4Output {
    subsample(input)
}

/// Layer 5: 16×5×5 → 120, ReLU. The 5×5 kernel covers the whole map, so
/// the 120×1×1 result is addressed as a flat vector from here on.
pub fn conv5_flatten(input: &Subsample4Output, model: &LeNet5) -> Conv5Output {
    let map: FeatureMap<CONV5_CHANNELS, 1, 1> = convolve(input, model.conv5(), relu);
    flatten(&map)
}

/// Layer 6: 120 → 84, ReLU.
pub fn fc6(input: &Conv5Output, model: &LeNet5) -> Fc6Output {
    dense(input, model.fc6(), relu)
}

/// Layer 7: 84 → 10, raw scores.
pub fn fc7(input: &Fc6Output, model: &LeNet5) -> Fc7Output {
    dense(input, model.fc7(), identity)
}

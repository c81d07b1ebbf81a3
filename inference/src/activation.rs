//! Activation functions and class selection.

/// Rectified-linear unit, for stored values and wide accumulators alike.
#[inline]
pub fn relu<T: Ord + Default>(x: T) -> T {
    x.max(T::default())
}

/// Identity, for layers that emit raw values.
#[inline]
pub fn identity(x: i64) -> i64 {
    x
}

/// Numerically stable log-softmax over a score vector.
///
/// Subtracts the maximum before exponentiating so large scores cannot
/// overflow `exp`. Used for reporting only; classification reads the raw
/// scores through [`argmax`].
pub fn log_softmax<const N: usize>(scores: &[f32; N]) -> [f32; N] {
    let mut out = [0.0f32; N];
    if N == 0 {
        return out;
    }

    let max_value = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let sum_exp: f32 = scores.iter().map(|&s| (s - max_value).exp()).sum();
    let log_sum = sum_exp.ln();

    for (o, &s) in out.iter_mut().zip(scores) {
        *o = s - max_value - log_sum;
    }
    out
}

/// Index of the largest value; the lowest index wins ties.
///
/// Returns 0 for an empty slice.
pub fn argmax<T: PartialOrd + Copy>(values: &[T]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

//! Fixed-point tensors for every boundary of the LeNet-5 pipeline.
//!
//! A stored `i32` represents the real value `stored / SCALE`. Shapes are const
//! generic parameters, so a layer can only be handed the tensor it was built
//! for and mismatches are rejected by the compiler rather than at runtime.

/// Implicit decimal factor shared by activations, weights and biases.
pub const SCALE: i32 = 1000;

/// Side of the zero-padded network input.
pub const INPUT_SIDE: usize = 32;
/// Side of the digit content inside the padded input.
pub const DIGIT_SIDE: usize = 28;
/// Zero border around the digit content.
pub const INPUT_PADDING: usize = (INPUT_SIDE - DIGIT_SIDE) / 2;

/// Kernel side shared by the three convolutions.
pub const KERNEL: usize = 5;
/// Subsampling window side (and stride).
pub const POOL: usize = 2;

pub const CONV1_CHANNELS: usize = 6;
pub const CONV1_SIDE: usize = INPUT_SIDE - KERNEL + 1;
pub const SUBSAMPLE2_SIDE: usize = CONV1_SIDE / POOL;
pub const CONV3_CHANNELS: usize = 16;
pub const CONV3_SIDE: usize = SUBSAMPLE2_SIDE - KERNEL + 1;
pub const SUBSAMPLE4_SIDE: usize = CONV3_SIDE / POOL;
pub const CONV5_CHANNELS: usize = 120;
pub const FC6_UNITS: usize = 84;
pub const NUM_CLASSES: usize = 10;

/// Channel-major rank-3 tensor (`C × H × W`).
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FeatureMap<const C: usize, const H: usize, const W: usize>(pub [[[i32; W]; H]; C]);

impl<const C: usize, const H: usize, const W: usize> FeatureMap<C, H, W> {
    pub const CHANNELS: usize = C;
    pub const HEIGHT: usize = H;
    pub const WIDTH: usize = W;

    pub fn zeroed() -> Self {
        Self([[[0; W]; H]; C])
    }

    pub fn channel(&self, c: usize) -> &[[i32; W]; H] {
        &self.0[c]
    }

    /// Row-major iterator over every element.
    pub fn iter(&self) -> impl Iterator<Item = &i32> + '_ {
        self.0.iter().flat_map(|plane| plane.iter().flatten())
    }

    pub fn len(&self) -> usize {
        C * H * W
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Flat rank-1 tensor used from the flattening convolution onward.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Vector<const N: usize>(pub [i32; N]);

impl<const N: usize> Vector<N> {
    pub const LEN: usize = N;

    pub fn zeroed() -> Self {
        Self([0; N])
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.0
    }
}

/// Padded single-channel network input.
pub type Image = FeatureMap<1, INPUT_SIDE, INPUT_SIDE>;
pub type Conv1Output = FeatureMap<CONV1_CHANNELS, CONV1_SIDE, CONV1_SIDE>;
pub type Subsample2Output = FeatureMap<CONV1_CHANNELS, SUBSAMPLE2_SIDE, SUBSAMPLE2_SIDE>;
pub type Conv3Output = FeatureMap<CONV3_CHANNELS, CONV3_SIDE, CONV3_SIDE>;
pub type Subsample4Output = FeatureMap<CONV3_CHANNELS, SUBSAMPLE4_SIDE, SUBSAMPLE4_SIDE>;
pub type Conv5Output = Vector<CONV5_CHANNELS>;
pub type Fc6Output = Vector<FC6_UNITS>;
/// Raw class scores; the classification signal.
pub type Fc7Output = Vector<NUM_CLASSES>;

impl Image {
    /// Builds a padded input from 28×28 fixed-point digit content.
    ///
    /// The content lands in the central region; the border stays zero so the
    /// first 5×5 convolution yields a 28×28 map.
    pub fn from_digit(digit: &[[i32; DIGIT_SIDE]; DIGIT_SIDE]) -> Self {
        let mut image = Self::zeroed();
        for (row, src) in digit.iter().enumerate() {
            let dst = &mut image.0[0][row + INPUT_PADDING];
            dst[INPUT_PADDING..INPUT_PADDING + DIGIT_SIDE].copy_from_slice(src);
        }
        image
    }

    /// True when every border pixel is zero.
    pub fn has_zero_border(&self) -> bool {
        let plane = &self.0[0];
        plane.iter().enumerate().all(|(row, values)| {
            values.iter().enumerate().all(|(col, &v)| {
                let inside = (INPUT_PADDING..INPUT_PADDING + DIGIT_SIDE).contains(&row)
                    && (INPUT_PADDING..INPUT_PADDING + DIGIT_SIDE).contains(&col);
                inside || v == 0
            })
        })
    }
}

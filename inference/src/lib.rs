//! Fixed-point LeNet-5 inference over 32×32 grayscale digits.
//!
//! Activations, weights and biases are `i32` values carrying an implicit
//! factor of [`SCALE`]. The pipeline is
//! `conv1 → subsample2 → conv3 → subsample4 → conv5_flatten → fc6 → fc7`,
//! followed by an argmax over the raw fc7 scores.
//!
//! ```
//! use lenet5_inference::{forward, Image, LeNet5};
//!
//! let model = LeNet5::zeroed();
//! assert_eq!(forward(&model, &Image::zeroed()), 0);
//! ```

pub mod activation;
pub mod dataset;
pub mod error;
pub mod forward;
pub mod layers;
pub mod model;
pub mod params;
pub mod tensor;

pub use error::{DatasetError, ModelError};
pub use forward::{forward, forward_trace, predict, Activations, Prediction};
pub use model::{LeNet5, ModelParameters};
pub use params::{load_model, LoadedModel};
pub use tensor::{Image, SCALE};

use lenet5_inference::activation::argmax;
use lenet5_inference::dataset::{image_from_pixels, PIXELS};
use lenet5_inference::layers::{conv1, conv3, conv5_flatten, fc6, fc7, subsample2, subsample4};
use lenet5_inference::params::to_text;
use lenet5_inference::tensor::{FeatureMap, Vector};
use lenet5_inference::{
    forward, forward_trace, load_model, predict, Image, LeNet5, ModelError, ModelParameters,
    SCALE,
};

// Linear congruential generator for reproducible fixtures.
struct Lcg(u64);

impl Lcg {
    fn next_in(&mut self, lo: i32, hi: i32) -> i32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let span = (hi - lo + 1) as u64;
        lo + ((self.0 >> 33) % span) as i32
    }
}

fn random_model(seed: u64) -> LeNet5 {
    let mut rng = Lcg(seed);
    let mut params = ModelParameters::zeroed();
    for tensor in params.tensors_mut() {
        for v in tensor.iter_mut() {
            *v = rng.next_in(-250, 250);
        }
    }
    LeNet5::try_from(params).unwrap()
}

fn random_image(seed: u64) -> Image {
    let mut rng = Lcg(seed);
    let mut pixels = [0u8; PIXELS];
    for p in pixels.iter_mut() {
        *p = rng.next_in(0, 255) as u8;
    }
    image_from_pixels(&pixels)
}

fn shape<const C: usize, const H: usize, const W: usize>(_: &FeatureMap<C, H, W>) -> (usize, usize, usize) {
    (C, H, W)
}

fn len<const N: usize>(_: &Vector<N>) -> usize {
    N
}

#[test_log::test]
fn all_zero_model_and_input_predict_class_zero() {
    let model = LeNet5::zeroed();
    let activations = forward_trace(&model, &Image::zeroed());

    assert_eq!(activations.fc7.0, [0; 10]);
    assert_eq!(forward(&model, &Image::zeroed()), 0);
}

#[test_log::test]
fn elevated_fc7_bias_wins_regardless_of_input() {
    let mut params = ModelParameters::zeroed();
    params.fc7_biases[9] = SCALE;
    let model = LeNet5::try_from(params).unwrap();

    for seed in [1, 2, 3] {
        let activations = forward_trace(&model, &random_image(seed));
        assert_eq!(activations.fc7.0, [0, 0, 0, 0, 0, 0, 0, 0, 0, 1000]);
        assert_eq!(activations.class(), 9);
    }
    assert_eq!(forward(&model, &Image::zeroed()), 9);
}

#[test_log::test]
fn repeated_passes_are_identical() {
    let model = random_model(7);
    let image = random_image(11);

    let first = forward_trace(&model, &image);
    let second = forward_trace(&model, &image);

    assert_eq!(first, second);
    assert_eq!(forward(&model, &image), first.class());
    assert_eq!(predict(&model, &image), predict(&model, &image));
}

#[test_log::test]
fn layer_outputs_have_documented_shapes() {
    let model = random_model(3);
    let image = random_image(5);

    let l1 = conv1(&image, &model);
    let l2 = subsample2(&l1, &model);
    let l3 = conv3(&l2, &model);
    let l4 = subsample4(&l3, &model);
    let l5 = conv5_flatten(&l4, &model);
    let l6 = fc6(&l5, &model);
    let l7 = fc7(&l6, &model);

    assert_eq!(shape(&l1), (6, 28, 28));
    assert_eq!(shape(&l2), (6, 14, 14));
    assert_eq!(shape(&l3), (16, 10, 10));
    assert_eq!(shape(&l4), (16, 5, 5));
    assert_eq!(len(&l5), 120);
    assert_eq!(len(&l6), 84);
    assert_eq!(len(&l7), 10);

    let trace = forward_trace(&model, &image);
    assert_eq!(trace.conv1, l1);
    assert_eq!(trace.subsample4, l4);
    assert_eq!(trace.fc7, l7);
}

#[test_log::test]
fn rectified_layers_never_emit_negatives() {
    let model = random_model(19);
    let trace = forward_trace(&model, &random_image(23));

    assert!(trace.conv1.iter().all(|&v| v >= 0));
    assert!(trace.conv3.iter().all(|&v| v >= 0));
    assert!(trace.conv5.0.iter().all(|&v| v >= 0));
    assert!(trace.fc6.0.iter().all(|&v| v >= 0));
    // Subsampling of non-negative maps stays non-negative.
    assert!(trace.subsample2.iter().all(|&v| v >= 0));
}

#[test_log::test]
fn conv1_is_bit_reproducible() {
    let model = random_model(29);
    let image = random_image(31);

    let a = conv1(&image, &model);
    let b = conv1(&image, &model);

    assert_eq!(a, b);
}

#[test_log::test]
fn prediction_matches_argmax_of_logits() {
    let model = random_model(37);
    let image = random_image(41);

    let prediction = predict(&model, &image);

    assert_eq!(prediction.class, argmax(&prediction.logits));
    assert_eq!(prediction.class, forward(&model, &image));
    assert!(prediction.log_probs.iter().all(|v| v.is_finite() && *v <= 0.0));
}

#[test_log::test]
fn concurrent_passes_share_one_model() {
    let model = random_model(43);
    let images: Vec<Image> = (0..4).map(random_image).collect();
    let expected: Vec<usize> = images.iter().map(|img| forward(&model, img)).collect();

    let got: Vec<usize> = std::thread::scope(|s| {
        let handles: Vec<_> = images
            .iter()
            .map(|img| {
                let model = &model;
                s.spawn(move || forward(model, img))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(got, expected);
}

#[test_log::test]
fn model_round_trips_through_parameter_file() {
    let mut params = ModelParameters::zeroed();
    params.fc7_biases[4] = 2 * SCALE;
    params.conv1_weights[12] = -333;

    let path = std::env::temp_dir().join(format!("lenet5-params-{}.txt", std::process::id()));
    std::fs::write(&path, to_text(&params)).unwrap();
    let loaded = load_model(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(loaded.model, LeNet5::try_from(params).unwrap());
    assert_eq!(loaded.digest.len(), 64);
    assert_eq!(forward(&loaded.model, &Image::zeroed()), 4);
}

#[test_log::test]
fn missing_parameter_file_fails_before_inference() {
    let path = std::env::temp_dir().join("lenet5-params-does-not-exist.txt");

    assert!(matches!(load_model(&path), Err(ModelError::Io { .. })));
}

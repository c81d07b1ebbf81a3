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

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use lenet5_inference::dataset::{load_csv, load_image};
use lenet5_inference::{forward_trace, load_model, Activations, Image, LeNet5, Prediction};
use serde::Serialize;

mod evaluate;

/// Fixed-point LeNet-5 digit classifier
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Path to the parameter file (ten lines of pre-scaled integers).
    #[clap(long, env = "LENET5_PARAMS")]
    params: PathBuf,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify a single digit.
    Predict(PredictArgs),
    /// Measure accuracy over a labelled MNIST CSV file.
    Evaluate(EvaluateArgs),
}

#[derive(Args, Debug)]
struct PredictArgs {
    /// Digit file with 784 raw pixels (JSON array, comma- or space-separated).
    #[clap(long, conflicts_with = "dataset")]
    image: Option<PathBuf>,
    /// MNIST CSV file (`label,p0,...,p783`) to take the digit from.
    #[clap(long)]
    dataset: Option<PathBuf>,
    /// Row of the CSV file to classify, counting from zero.
    #[clap(long, default_value_t = 0)]
    index: usize,
    /// Print the result as JSON.
    #[clap(long)]
    json: bool,
    /// Write every intermediate layer output to this file, one line per layer.
    #[clap(long, value_name = "PATH")]
    dump_activations: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    /// MNIST CSV file (`label,p0,...,p783`).
    #[clap(long, env = "LENET5_DATASET")]
    dataset: PathBuf,
    /// Evaluate at most this many samples.
    #[clap(long)]
    limit: Option<usize>,
    /// Worker threads; defaults to one per core.
    #[clap(long)]
    threads: Option<usize>,
    /// Print the result as JSON.
    #[clap(long)]
    json: bool,
}

#[derive(Serialize)]
struct PredictReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<u8>,
    #[serde(flatten)]
    prediction: Prediction,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("Loaded environment variables from {:?}", path),
        Err(e) if e.not_found() => tracing::debug!("No .env file found"),
        Err(e) => bail!("failed to load .env file: {}", e),
    }
    let cli = Cli::parse();

    let loaded = load_model(&cli.params)
        .with_context(|| format!("failed to load model from {}", cli.params.display()))?;
    tracing::info!("Model parameters sha256: {}", loaded.digest);

    match cli.command {
        Command::Predict(args) => run_predict(&loaded.model, args),
        Command::Evaluate(args) => run_evaluate(&loaded.model, args),
    }
}

fn run_predict(model: &LeNet5, args: PredictArgs) -> Result<()> {
    let (image, label): (Image, Option<u8>) = if let Some(path) = args.image {
        let image = load_image(&path)
            .with_context(|| format!("failed to read digit from {}", path.display()))?;
        (image, None)
    } else if let Some(path) = args.dataset {
        let mut samples = load_csv(&path)
            .with_context(|| format!("failed to read dataset {}", path.display()))?;
        if args.index >= samples.len() {
            bail!(
                "index {} is out of range for {} samples",
                args.index,
                samples.len()
            );
        }
        let sample = samples.swap_remove(args.index);
        (sample.image, Some(sample.label))
    } else {
        bail!("Must specify either --image or --dataset");
    };

    let activations = forward_trace(model, &image);
    if let Some(path) = &args.dump_activations {
        dump_activations(&activations, path)
            .with_context(|| format!("failed to write activations to {}", path.display()))?;
        tracing::info!("Wrote layer activations to {}", path.display());
    }
    let prediction = activations.prediction();
    tracing::info!("Predicted digit: {}", prediction.class);

    if args.json {
        let report = PredictReport { label, prediction };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for (digit, (logit, log_prob)) in prediction
        .logits
        .iter()
        .zip(prediction.log_probs.iter())
        .enumerate()
    {
        println!("  Digit {digit}: {logit:>10} {log_prob:>10.4}");
    }
    match label {
        Some(label) => println!("Predicted {} (label {label})", prediction.class),
        None => println!("Predicted {}", prediction.class),
    }
    Ok(())
}

fn dump_activations(activations: &Activations, path: &Path) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    activations.write_text(&mut out)?;
    out.flush()?;
    Ok(())
}

fn run_evaluate(model: &LeNet5, args: EvaluateArgs) -> Result<()> {
    let mut samples = load_csv(&args.dataset)
        .with_context(|| format!("failed to read dataset {}", args.dataset.display()))?;
    if let Some(limit) = args.limit {
        samples.truncate(limit);
    }
    if samples.is_empty() {
        bail!("dataset {} contains no samples", args.dataset.display());
    }

    let eval = match args.threads {
        Some(threads) => rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .context("failed to build worker pool")?
            .install(|| evaluate::evaluate(model, &samples)),
        None => evaluate::evaluate(model, &samples),
    };

    for (label, row) in eval.confusion.iter().enumerate() {
        tracing::debug!("label {}: {:?}", label, row);
    }
    tracing::info!(
        "Evaluated {} samples, {} correct",
        eval.total,
        eval.correct
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&eval)?);
    } else {
        println!(
            "Accuracy: {}/{} = {:.2}%",
            eval.correct,
            eval.total,
            eval.accuracy() * 100.0
        );
    }
    Ok(())
}
